use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    // A word after quote removal and variable substitution
    Word(String),
    // "ls | grep x"
    Pipe,
    // Any other unquoted operator: ">", ">>", "<", "&"
    Op(String),
}

impl Token {
    pub fn word(s: &str) -> Self {
        Token::Word(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Token::Word(w) => w,
            Token::Pipe => "|",
            Token::Op(op) => op,
        }
    }
}

/// One command-and-arguments unit between separators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statement {
    pub tokens: Vec<Token>,
}

impl Statement {
    pub fn words(&self) -> Vec<&str> {
        self.tokens.iter().map(Token::as_str).collect()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.words().join(" "))
    }
}

/// A pipeline stage as written, before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub name: String,
    pub args: Vec<String>,
    // "echo logs > file.txt"
    pub redirect: Option<String>,
}
