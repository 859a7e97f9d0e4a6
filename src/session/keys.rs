/// A keystroke as the shell sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Tab,
    CtrlC,
    CtrlD,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Escape {
    #[default]
    None,
    // Saw ESC
    Start,
    // Inside "ESC [" until a final byte
    Csi,
}

/// Turns raw terminal bytes into [`Key`]s. Escape sequences (arrows,
/// function keys) are swallowed; partial UTF-8 and CRLF pairs may span
/// chunks.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    escape: Escape,
    last_cr: bool,
    utf8: Vec<u8>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<Key> {
        let mut keys = Vec::new();
        for &byte in data {
            if let Some(key) = self.byte(byte) {
                keys.push(key);
            }
        }
        keys
    }

    fn byte(&mut self, byte: u8) -> Option<Key> {
        match self.escape {
            Escape::Start => {
                self.escape = if byte == b'[' || byte == b'O' { Escape::Csi } else { Escape::None };
                return None;
            }
            Escape::Csi => {
                if (0x40..=0x7e).contains(&byte) {
                    self.escape = Escape::None;
                }
                return None;
            }
            Escape::None => {}
        }

        let after_cr = std::mem::take(&mut self.last_cr);

        if !self.utf8.is_empty() || byte >= 0x80 {
            return self.utf8_byte(byte);
        }

        match byte {
            b'\r' => {
                self.last_cr = true;
                Some(Key::Enter)
            }
            b'\n' if after_cr => None,
            b'\n' => Some(Key::Enter),
            0x7f | 0x08 => Some(Key::Backspace),
            b'\t' => Some(Key::Tab),
            0x03 => Some(Key::CtrlC),
            0x04 => Some(Key::CtrlD),
            0x1b => {
                self.escape = Escape::Start;
                None
            }
            0x20..=0x7e => Some(Key::Char(byte as char)),
            // Remaining control bytes have no binding
            _ => None,
        }
    }

    fn utf8_byte(&mut self, byte: u8) -> Option<Key> {
        self.utf8.push(byte);
        match std::str::from_utf8(&self.utf8) {
            Ok(s) => {
                let key = s.chars().next().map(Key::Char);
                self.utf8.clear();
                key
            }
            Err(e) if e.error_len().is_some() || self.utf8.len() >= 4 => {
                // Not decodable, drop it. A byte that cannot continue the
                // sequence is read again on its own.
                let restart = self.utf8.len() > 1 && !(0x80..0xc0).contains(&byte);
                self.utf8.clear();
                if restart {
                    self.byte(byte)
                } else {
                    None
                }
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<Key> {
        s.chars().map(Key::Char).collect()
    }

    #[test]
    fn test_plain_line() {
        let mut decoder = KeyDecoder::new();
        let mut expected = chars("ls -la");
        expected.push(Key::Enter);
        assert_eq!(decoder.feed(b"ls -la\r\n"), expected);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.feed(b"a\r"), vec![Key::Char('a'), Key::Enter]);
        assert_eq!(decoder.feed(b"\nb\n"), vec![Key::Char('b'), Key::Enter]);
    }

    #[test]
    fn test_control_keys() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(
            decoder.feed(b"\x03\x04\t\x7f\x08"),
            vec![Key::CtrlC, Key::CtrlD, Key::Tab, Key::Backspace, Key::Backspace]
        );
    }

    #[test]
    fn test_escape_sequences_swallowed() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.feed(b"\x1b[A\x1b[1;5Cx\x1bOPy"), vec![Key::Char('x'), Key::Char('y')]);
    }

    #[test]
    fn test_utf8_across_chunks() {
        let mut decoder = KeyDecoder::new();
        let bytes = "é".as_bytes();
        assert_eq!(decoder.feed(&bytes[..1]), vec![]);
        assert_eq!(decoder.feed(&bytes[1..]), vec![Key::Char('é')]);
        assert_eq!(decoder.feed(b"\xff z"), vec![Key::Char(' '), Key::Char('z')]);
    }

    #[test]
    fn test_broken_sequence_keeps_next_key() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.feed(b"\xc3z"), vec![Key::Char('z')]);
        assert_eq!(decoder.feed(b"\xe2\x82\r"), vec![Key::Enter]);
        assert_eq!(decoder.feed(b"\xc3\xc3\xa9"), vec![Key::Char('é')]);
    }
}
