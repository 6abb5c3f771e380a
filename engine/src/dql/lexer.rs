//! Tokenizer for DQL statements.

use crate::error::{Error, Result};
use serde_json::Number;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare identifier or keyword
    Ident(String),
    /// Back-tick quoted identifier
    QuotedIdent(String),
    String(String),
    Number(Number),
    /// `:name` placeholder
    Param(String),
    Star,
    Comma,
    Dot,
    Colon,
    Minus,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl Token {
    /// True if this token is the given keyword (case-insensitive).
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(word) if word.eq_ignore_ascii_case(keyword))
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Split a statement into tokens. The returned list always ends with `Eof`.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    index: usize,
    brace_depth: usize,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            index: 0,
            brace_depth: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.index)
            .map(|&(pos, _)| pos)
            .unwrap_or(self.input.len())
    }

    fn push(&mut self, token: Token, position: usize) {
        self.tokens.push(Spanned { token, position });
    }

    fn run(mut self) -> Result<Vec<Spanned>> {
        while let Some(c) = self.peek() {
            let start = self.offset();
            match c {
                c if c.is_whitespace() => self.index += 1,
                '\'' | '"' => {
                    let s = self.quoted(c)?;
                    self.push(Token::String(s), start);
                }
                '`' => {
                    let s = self.quoted('`')?;
                    self.push(Token::QuotedIdent(s), start);
                }
                ':' => {
                    self.index += 1;
                    if self.colon_is_param() {
                        let name = self.word();
                        self.push(Token::Param(name), start);
                    } else {
                        self.push(Token::Colon, start);
                    }
                }
                c if c.is_ascii_digit() => {
                    let number = self.number()?;
                    self.push(Token::Number(number), start);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.word();
                    self.push(Token::Ident(word), start);
                }
                _ => {
                    let token = self.symbol(c, start)?;
                    self.push(token, start);
                }
            }
        }
        let end = self.input.len();
        self.push(Token::Eof, end);
        Ok(self.tokens)
    }

    /// Inside an object literal a colon after a key is a separator; anywhere
    /// else a colon followed by a name starts a parameter.
    fn colon_is_param(&self) -> bool {
        let starts_name = self
            .peek()
            .map(|c| c.is_alphabetic() || c == '_')
            .unwrap_or(false);
        if !starts_name {
            return false;
        }
        if self.brace_depth == 0 {
            return true;
        }
        !matches!(
            self.tokens.last().map(|t| &t.token),
            Some(Token::String(_) | Token::Ident(_) | Token::QuotedIdent(_))
        )
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.index += 1;
            } else {
                break;
            }
        }
        word
    }

    /// Read a quoted run; a doubled quote character stands for itself.
    fn quoted(&mut self, quote: char) -> Result<String> {
        let start = self.offset();
        self.index += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(Error::syntax(start, "unterminated quoted text")),
                Some(c) if c == quote => {
                    if self.peek_at(1) == Some(quote) {
                        out.push(quote);
                        self.index += 2;
                    } else {
                        self.index += 1;
                        return Ok(out);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.index += 1;
                }
            }
        }
    }

    fn number(&mut self) -> Result<Number> {
        let start = self.offset();
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            let exponent_sign =
                (c == '+' || c == '-') && matches!(text.chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit() || exponent_sign {
                text.push(c);
            } else if c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                is_float = true;
                text.push(c);
            } else if c == 'e' || c == 'E' {
                is_float = true;
                text.push(c);
            } else {
                break;
            }
            self.index += 1;
        }

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Number::from(n));
            }
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or_else(|| Error::syntax(start, format!("invalid number '{}'", text)))
    }

    fn symbol(&mut self, c: char, start: usize) -> Result<Token> {
        let next = self.peek_at(1);
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('>')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('=', _) => (Token::Eq, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('*', _) => (Token::Star, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            ('-', _) => (Token::Minus, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => {
                self.brace_depth += 1;
                (Token::LBrace, 1)
            }
            ('}', _) => {
                self.brace_depth = self.brace_depth.saturating_sub(1);
                (Token::RBrace, 1)
            }
            _ => return Err(Error::syntax(start, format!("unexpected character '{}'", c))),
        };
        self.index += width;
        Ok(token)
    }
}
