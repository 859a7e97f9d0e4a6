use crate::shell::ast::{Statement, Token};
use crate::shell::context::Environment;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("bash: syntax error: unexpected end of file")]
    UnexpectedEof,
    #[error("-bash: syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),
}

const PUNCTUATION: &str = "();<>|&";

static VAR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$(?:([_a-zA-Z0-9]+)|\{([_a-zA-Z0-9]+)\})$").unwrap());

#[derive(Debug, PartialEq)]
enum Lexeme {
    Word { text: String, expand: bool },
    Punct(String),
}

/// Split one input line into statements. `;`, `&&` and `||` all just end
/// the current statement.
pub fn parse_line(line: &str, env: &Environment) -> Result<Vec<Statement>, SyntaxError> {
    let mut statements = Vec::new();
    let mut tokens = Vec::new();

    for lexeme in lex(line)? {
        match lexeme {
            Lexeme::Punct(p) => {
                // Parentheses are ignored, a token made only of them vanishes
                let stripped = p.trim_matches(|c: char| c == '(' || c == ')');
                if stripped.is_empty() {
                    continue;
                }
                match stripped {
                    ";" | "&&" | "||" => {
                        if tokens.is_empty() {
                            return Err(SyntaxError::UnexpectedToken(stripped.to_string()));
                        }
                        statements.push(Statement { tokens: std::mem::take(&mut tokens) });
                    }
                    "|" => tokens.push(Token::Pipe),
                    op => tokens.push(Token::Op(op.to_string())),
                }
            }
            Lexeme::Word { text, expand } => {
                if !expand {
                    tokens.push(Token::Word(text));
                } else if let Some(word) = expand_word(text, env) {
                    tokens.push(Token::Word(word));
                }
            }
        }
    }

    if !tokens.is_empty() {
        statements.push(Statement { tokens });
    }
    Ok(statements)
}

/// `$?` is always 0, `$NAME`/`${NAME}` take the bound value, unbound
/// references disappear.
fn expand_word(text: String, env: &Environment) -> Option<String> {
    if text == "$?" {
        return Some("0".to_string());
    }
    let Some(caps) = VAR_REF.captures(&text) else {
        return Some(text);
    };
    let name = caps.get(1).or_else(|| caps.get(2))?.as_str();
    env.get(name).cloned()
}

fn lex(line: &str) -> Result<Vec<Lexeme>, SyntaxError> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    // Distinguishes "" (an empty word) from nothing at all
    let mut token_started = false;
    let mut expand = true;

    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_single_quote {
            if c == '\'' {
                in_single_quote = false;
            } else {
                current.push(c);
            }
            continue;
        }

        if in_double_quote {
            match c {
                '"' => in_double_quote = false,
                '\\' => match chars.next() {
                    Some(n @ ('"' | '\\' | '$' | '`')) => current.push(n),
                    Some(n) => {
                        current.push('\\');
                        current.push(n);
                    }
                    None => return Err(SyntaxError::UnexpectedEof),
                },
                _ => current.push(c),
            }
            continue;
        }

        match c {
            '\\' => {
                let Some(n) = chars.next() else {
                    return Err(SyntaxError::UnexpectedEof);
                };
                if n == '$' {
                    expand = false;
                }
                current.push(n);
                token_started = true;
            }
            '\'' => {
                in_single_quote = true;
                token_started = true;
                expand = false;
            }
            '"' => {
                in_double_quote = true;
                token_started = true;
            }
            c if c.is_whitespace() => {
                if token_started {
                    out.push(Lexeme::Word { text: std::mem::take(&mut current), expand });
                    token_started = false;
                    expand = true;
                }
            }
            c if PUNCTUATION.contains(c) => {
                if token_started {
                    out.push(Lexeme::Word { text: std::mem::take(&mut current), expand });
                    token_started = false;
                    expand = true;
                }
                let mut punct = String::from(c);
                while let Some(&n) = chars.peek() {
                    if !PUNCTUATION.contains(n) {
                        break;
                    }
                    punct.push(n);
                    chars.next();
                }
                out.push(Lexeme::Punct(punct));
            }
            _ => {
                current.push(c);
                token_started = true;
            }
        }
    }

    if in_single_quote || in_double_quote {
        return Err(SyntaxError::UnexpectedEof);
    }
    if token_started {
        out.push(Lexeme::Word { text: current, expand });
    }
    Ok(out)
}
