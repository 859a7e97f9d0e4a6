use chrono::{DateTime, Local};
use regex::Regex;
use std::sync::LazyLock;

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

/// Make a virtual path usable as part of a real filename.
pub fn sanitize_path(path: &str) -> String {
    NON_ALNUM.replace_all(path, "_").to_string()
}

/// `20240131-235959`, the prefix used for every file a session leaves behind.
pub fn file_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d-%H%M%S").to_string()
}

/// Split a `NAME=value` word. The name has to look like a shell identifier.
pub fn split_assignment(word: &str) -> Option<(String, String)> {
    let (name, value) = word.split_once('=')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name.to_string(), value.to_string()))
}

/// Longest common prefix of a set of names.
pub fn common_prefix<S: AsRef<str>>(names: &[S]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let mut prefix: &str = first.as_ref();
    for name in &names[1..] {
        let name = name.as_ref();
        let len = prefix
            .char_indices()
            .zip(name.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, a), _)| i + a.len_utf8())
            .unwrap_or(0);
        prefix = &prefix[..len];
    }
    prefix.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/tmp/evil file.sh"), "_tmp_evil_file_sh");
        assert_eq!(sanitize_path("../../etc"), "______etc");
    }

    #[test]
    fn test_file_timestamp() {
        let t = Local.with_ymd_and_hms(2024, 1, 31, 23, 59, 58).unwrap();
        assert_eq!(file_timestamp(t), "20240131-235958");
    }

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("FOO=bar=baz"), Some(("FOO".into(), "bar=baz".into())));
        assert_eq!(split_assignment("_X="), Some(("_X".into(), "".into())));
        assert_eq!(split_assignment("--opt=1"), None);
        assert_eq!(split_assignment("1A=2"), None);
        assert_eq!(split_assignment("plain"), None);
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(common_prefix(&["passwd", "passwd-", "pam.d"]), "pa");
        assert_eq!(common_prefix(&["group"]), "group");
        assert_eq!(common_prefix::<&str>(&[]), "");
        assert_eq!(common_prefix(&["abc", "xyz"]), "");
    }
}
