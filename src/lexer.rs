use crate::{
    error::CompileError,
    token::{Token, TokenKind},
    Result,
};
use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_until, take_while},
    character::complete::{alpha1, char, digit1, multispace1, none_of, not_line_ending, one_of},
    combinator::{opt, recognize},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

// Longest spellings first so that "<=" wins over "<".
const OPERATORS: &[(&str, TokenKind)] = &[
    ("...", TokenKind::Ellipsis),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("++", TokenKind::Increment),
    ("--", TokenKind::Decrement),
    ("==", TokenKind::Equal),
    ("!=", TokenKind::NotEqual),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("=", TokenKind::Assign),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("!", TokenKind::Bang),
    ("&", TokenKind::Ampersand),
    ("(", TokenKind::LeftParen),
    (")", TokenKind::RightParen),
    ("[", TokenKind::LeftBracket),
    ("]", TokenKind::RightBracket),
    ("{", TokenKind::LeftBrace),
    ("}", TokenKind::RightBrace),
    (",", TokenKind::Comma),
    (";", TokenKind::Semicolon),
];

pub struct Lexer<'a> {
    input: &'a str,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;
            if self.input.is_empty() {
                break;
            }
            let token = self.next_token()?;
            tokens.push(token);
        }

        tokens.push(Token::new(TokenKind::Done, "", self.line, self.column));
        Ok(tokens)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            if let Ok((remaining, _)) = multispace1::<&str, ()>(self.input) {
                self.advance(remaining);
                continue;
            }

            if self.input.starts_with("/*") {
                match block_comment(self.input) {
                    Ok((remaining, _)) => {
                        self.advance(remaining);
                        continue;
                    }
                    Err(_) => {
                        return Err(CompileError::lexer_error(
                            self.line,
                            "unterminated comment",
                        ))
                    }
                }
            }

            if let Ok((remaining, _)) = line_comment(self.input) {
                self.advance(remaining);
                continue;
            }

            return Ok(());
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);

        if let Ok((remaining, word)) = identifier(self.input) {
            let kind = TokenKind::keyword(word).unwrap_or(TokenKind::Identifier);
            let token = Token::new(kind, word, line, column);
            self.advance(remaining);
            return Ok(token);
        }

        if let Ok((remaining, number)) = number(self.input) {
            let kind = if number.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
                TokenKind::Real
            } else {
                TokenKind::Integer
            };
            let token = Token::new(kind, number, line, column);
            self.advance(remaining);
            return Ok(token);
        }

        if self.input.starts_with('\'') {
            return match character(self.input) {
                Ok((remaining, text)) => {
                    let token = Token::new(TokenKind::Character, text, line, column);
                    self.advance(remaining);
                    Ok(token)
                }
                _ => Err(CompileError::lexer_error(
                    line,
                    "malformed character literal",
                )),
            };
        }

        if self.input.starts_with('"') {
            return match string(self.input) {
                Ok((remaining, text)) => {
                    let token = Token::new(TokenKind::String, text, line, column);
                    self.advance(remaining);
                    Ok(token)
                }
                Err(_) => Err(CompileError::lexer_error(
                    line,
                    "unterminated string literal",
                )),
            };
        }

        for (spelling, kind) in OPERATORS {
            if self.input.starts_with(spelling) {
                let input = self.input;
                let token = Token::new(*kind, *spelling, line, column);
                self.advance(&input[spelling.len()..]);
                return Ok(token);
            }
        }

        match self.input.chars().next() {
            Some(ch) => Err(CompileError::lexer_error(
                line,
                format!("unexpected character '{}'", ch),
            )),
            None => Ok(Token::new(TokenKind::Done, "", line, column)),
        }
    }

    fn advance(&mut self, remaining: &'a str) {
        let consumed = &self.input[..self.input.len() - remaining.len()];
        for ch in consumed.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.input = remaining;
    }
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    delimited(tag("/*"), take_until("*/"), tag("*/"))(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    preceded(tag("//"), not_line_ending)(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    let exponent = tuple((one_of("eE"), opt(one_of("+-")), digit1));
    recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        opt(exponent),
    )))(input)
}

/// Exactly one character or one escape between single quotes.
fn character(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('\''),
        alt((
            recognize(none_of("\\'\n")),
            recognize(pair(char('\\'), one_of("ntr0\\'\""))),
        )),
        char('\''),
    ))(input)
}

fn string(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('"'),
        opt(escaped(none_of("\\\"\n"), '\\', one_of("ntr0\\'\""))),
        char('"'),
    ))(input)
}

/// Strip the quotes from a character or string literal and resolve its
/// escape sequences.
pub fn unescape(literal: &str) -> String {
    let body = &literal[1..literal.len() - 1];
    let mut value = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('0') => value.push('\0'),
            Some(other) => value.push(other),
            None => value.push('\\'),
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("int x; double *p_1"),
            vec![
                TokenKind::Int,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Double,
                TokenKind::Star,
                TokenKind::Identifier,
                TokenKind::Done,
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            kinds("a<=b && c++ ... !="),
            vec![
                TokenKind::Identifier,
                TokenKind::LessEqual,
                TokenKind::Identifier,
                TokenKind::AndAnd,
                TokenKind::Identifier,
                TokenKind::Increment,
                TokenKind::Ellipsis,
                TokenKind::NotEqual,
                TokenKind::Done,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("42 3.25 1e3").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[1].kind, TokenKind::Real);
        assert_eq!(tokens[1].text, "3.25");
        assert_eq!(tokens[2].kind, TokenKind::Real);
    }

    #[test]
    fn test_literals_and_escapes() {
        let tokens = Lexer::new(r#"'\n' "a\"b" """#).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Character);
        assert_eq!(unescape(&tokens[0].text), "\n");
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(unescape(&tokens[1].text), "a\"b");
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(unescape(&tokens[2].text), "");
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = Lexer::new("/* one\ntwo */ x // trailing\n  y")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].text, "x");
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].text, "y");
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[1].column, 3);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Lexer::new("int @").tokenize(),
            Err(CompileError::Lexical { line: 1, .. })
        ));
        assert!(Lexer::new("/* never closed").tokenize().is_err());
        assert!(Lexer::new("\"open").tokenize().is_err());
        for literal in ["'ab'", "''", "'\\n\\t'", "'a"] {
            assert!(
                matches!(Lexer::new(literal).tokenize(), Err(CompileError::Lexical { .. })),
                "{}",
                literal
            );
        }
        assert_eq!(kinds("'a' '\\''")[..2], [TokenKind::Character, TokenKind::Character]);
        assert!(Lexer::new("''").tokenize().is_err());
    }
}
