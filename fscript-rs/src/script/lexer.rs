//! FScript tokenizer.
//!
//! Works on one source line at a time.  The interpreter hands the lexer a new
//! line whenever execution moves, so loop bodies and function bodies are
//! re-tokenized every time they run.  End-of-line is returned repeatedly once
//! the text is exhausted; end-of-stream is never produced here, the
//! interpreter synthesises it when the cursor runs out of lines.

use std::fmt;

use thiserror::Error;

use super::value::ValueKind;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Double(f64),
    Str(String),
    Null,

    // Names
    Ident(String),
    /// Identifier immediately followed by `(`; the paren is the next token.
    Call(String),
    /// Identifier immediately followed by `[`; the bracket is the next token.
    Array(String),

    // Keywords
    Decl(ValueKind),
    If,
    Then,
    Elsif,
    Else,
    EndIf,
    While,
    EndWhile,
    Return,
    Function,
    EndFunction,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,
    And, // &&
    Or,  // ||
    Bang,

    // Structure
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Assign,

    Eol,
    Eof,
}

impl Token {
    fn keyword(word: &str) -> Option<Token> {
        Some(match word {
            "int" => Token::Decl(ValueKind::Int),
            "double" => Token::Decl(ValueKind::Double),
            "string" => Token::Decl(ValueKind::Str),
            "object" => Token::Decl(ValueKind::Object),
            "if" => Token::If,
            "then" => Token::Then,
            "elsif" => Token::Elsif,
            "else" => Token::Else,
            "endif" => Token::EndIf,
            "while" => Token::While,
            "endwhile" => Token::EndWhile,
            "return" => Token::Return,
            "function" => Token::Function,
            "endfunction" => Token::EndFunction,
            "null" => Token::Null,
            _ => return None,
        })
    }

    /// `true` for end-of-line and end-of-stream.
    pub fn ends_line(&self) -> bool {
        matches!(self, Token::Eol | Token::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Int(n) => return write!(f, "{n}"),
            Token::Double(x) => return write!(f, "{x}"),
            Token::Str(s) => return write!(f, "{s:?}"),
            Token::Ident(n) | Token::Call(n) | Token::Array(n) => return f.write_str(n),
            Token::Decl(kind) => kind.keyword(),
            Token::Null => "null",
            Token::If => "if",
            Token::Then => "then",
            Token::Elsif => "elsif",
            Token::Else => "else",
            Token::EndIf => "endif",
            Token::While => "while",
            Token::EndWhile => "endwhile",
            Token::Return => "return",
            Token::Function => "function",
            Token::EndFunction => "endfunction",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Bang => "!",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Assign => "=",
            Token::Eol => "<end of line>",
            Token::Eof => "<end of input>",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("Unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Integer literal out of range: {0}")]
    IntOutOfRange(String),
    #[error("Malformed number: {0}")]
    BadNumber(String),
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Lexer {
    line: String,
    pos: usize,
    /// One pushed-back token and the offset it started at.
    pushed: Option<(Token, usize)>,
    last_start: usize,
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tokenizing `text` from the beginning.
    pub fn set_line(&mut self, text: &str) {
        self.reset_to(text, 0);
    }

    /// Start tokenizing `text` from byte `offset`.
    pub fn reset_to(&mut self, text: &str, offset: usize) {
        self.line.clear();
        self.line.push_str(text);
        self.pos = offset.min(self.line.len());
        self.pushed = None;
        self.last_start = self.pos;
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Offset of the next token to be returned.
    pub fn offset(&self) -> usize {
        match &self.pushed {
            Some((_, start)) => *start,
            None => self.pos,
        }
    }

    /// Un-consume `tok`.  Only one token can be pending at a time.
    pub fn push_back(&mut self, tok: Token) {
        self.pushed = Some((tok, self.last_start));
    }

    fn peek(&self) -> Option<u8> {
        self.line.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some((tok, _)) = self.pushed.take() {
            return Ok(tok);
        }
        self.skip_ws();
        self.last_start = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(Token::Eol);
        };
        self.pos += 1;

        let tok = match ch {
            b'#' => {
                self.pos = self.line.len();
                Token::Eol
            }
            b'0'..=b'9' => return self.read_number(),
            b'"' => return self.read_string(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.read_word(),
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'!' => {
                if self.eat(b'=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            b'<' => {
                if self.eat(b'=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.eat(b'=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'&' if self.eat(b'&') => Token::And,
            b'|' if self.eat(b'|') => Token::Or,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b',' => Token::Comma,
            _ => {
                let c = self.line[self.last_start..]
                    .chars()
                    .next()
                    .unwrap_or(ch as char);
                return Err(LexError::UnexpectedChar(c));
            }
        };
        Ok(tok)
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.last_start;
        let mut is_double = false;
        self.skip_digits();
        let bytes = self.line.as_bytes();
        if bytes.get(self.pos) == Some(&b'.')
            && matches!(bytes.get(self.pos + 1), Some(b'0'..=b'9'))
        {
            is_double = true;
            self.pos += 1;
            self.skip_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_double = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.skip_digits();
        }
        let text = &self.line[start..self.pos];
        if is_double {
            text.parse()
                .map(Token::Double)
                .map_err(|_| LexError::BadNumber(text.to_owned()))
        } else {
            text.parse()
                .map(Token::Int)
                .map_err(|_| LexError::IntOutOfRange(text.to_owned()))
        }
    }

    fn read_string(&mut self) -> Result<Token, LexError> {
        let mut s = String::new();
        let mut chars = self.line[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(Token::Str(s));
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, '"')) => s.push('"'),
                    Some((_, '\\')) => s.push('\\'),
                    Some((_, other)) => {
                        s.push('\\');
                        s.push(other);
                    }
                    None => break,
                },
                c => s.push(c),
            }
        }
        self.pos = self.line.len();
        Err(LexError::UnterminatedString)
    }

    fn read_word(&mut self) -> Token {
        let start = self.last_start;
        while matches!(
            self.peek(),
            Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')
        ) {
            self.pos += 1;
        }
        let word = &self.line[start..self.pos];
        if let Some(kw) = Token::keyword(word) {
            return kw;
        }
        let name = word.to_owned();
        match self.peek() {
            Some(b'(') => Token::Call(name),
            Some(b'[') => Token::Array(name),
            _ => Token::Ident(name),
        }
    }
}

/// Tokenize a whole line, stopping at the first end-of-line.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new();
    lexer.set_line(text);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token()?;
        if tok == Token::Eol {
            return Ok(tokens);
        }
        tokens.push(tok);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
