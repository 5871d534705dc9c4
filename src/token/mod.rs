use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Ellipsis,

    // Operators
    Assign,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Ampersand,
    AndAnd,
    OrOr,
    Increment,
    Decrement,

    // Keywords
    Char,
    Int,
    Double,
    Void,
    If,
    Else,
    While,
    For,
    Break,
    Return,
    Sizeof,

    // Literals
    Identifier,
    Integer,
    Real,
    Character,
    String,

    Done,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "char" => TokenKind::Char,
            "int" => TokenKind::Int,
            "double" => TokenKind::Double,
            "void" => TokenKind::Void,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "break" => TokenKind::Break,
            "return" => TokenKind::Return,
            "sizeof" => TokenKind::Sizeof,
            _ => return None,
        };
        Some(kind)
    }

    /// `char`, `int` and `double` start a declaration or a cast.
    pub fn is_specifier(self) -> bool {
        matches!(self, TokenKind::Char | TokenKind::Int | TokenKind::Double)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::Done => write!(f, "end of input"),
            _ => write!(f, "{}", self.text),
        }
    }
}
