//! Tokenizer for template source.
//!
//! Text outside `{{ }}` becomes a single [`Token::Text`]; inside an action the
//! source is split into fields, variables, literals, identifiers and
//! punctuation. Trim
//! markers (`{{- ` and ` -}}`) are applied here, so the parser never sees them.

use super::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Text(String),
    Open,
    Close,
    /// `.` (empty path) or a field chain such as `.A.B`.
    Field(Vec<String>),
    /// `$`, `$x` or `$x.A.B`: the variable name and any field chain after it.
    Var(String, Vec<String>),
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Pipe,
    LParen,
    RParen,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Spanned {
    pub token: Token,
    pub line: usize,
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const TRIM_CLOSE: &str = "-}}";

pub(super) fn lex(src: &str) -> Result<Vec<Spanned>, TemplateError> {
    Lexer {
        src,
        pos: 0,
        line: 1,
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Spanned>, TemplateError> {
        let mut trim_leading = false;

        loop {
            let rest = self.rest();
            let Some(idx) = rest.find(OPEN) else {
                let text = if trim_leading { rest.trim_start() } else { rest };
                self.push_text(text);
                return Ok(self.tokens);
            };

            let raw_text = &rest[..idx];
            let after_open = &rest[idx + OPEN.len()..];
            let trim_trailing = has_left_trim_marker(after_open);

            let mut text = raw_text;
            if trim_leading {
                text = text.trim_start();
            }
            if trim_trailing {
                text = text.trim_end();
            }
            self.push_text(text);
            self.line += raw_text.matches('\n').count();

            self.pos += idx + OPEN.len();
            if trim_trailing {
                self.pos += 1;
            }

            trim_leading = if self.at_comment() {
                self.lex_comment()?
            } else {
                let line = self.line;
                self.tokens.push(Spanned {
                    token: Token::Open,
                    line,
                });
                self.lex_action()?
            };
        }
    }

    fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.tokens.push(Spanned {
                token: Token::Text(text.to_string()),
                line: self.line,
            });
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn at_comment(&self) -> bool {
        self.rest().trim_start().starts_with("/*")
    }

    /// Skips `/* ... */` and the closing delimiter. Returns whether the
    /// delimiter trims the text that follows.
    fn lex_comment(&mut self) -> Result<bool, TemplateError> {
        let rest = self.rest();
        let start = rest.len() - rest.trim_start().len();
        let body = &rest[start..];
        let Some(end) = body[2..].find("*/").map(|i| i + 2) else {
            return Err(self.error("unclosed comment"));
        };
        self.line += body[..end].matches('\n').count();
        self.pos += start + end + 2;

        let tail = self.rest();
        if tail.starts_with(CLOSE) {
            self.pos += CLOSE.len();
            Ok(false)
        } else if let Some(stripped) = tail.strip_prefix(' ')
            && stripped.starts_with(TRIM_CLOSE)
        {
            self.pos += 1 + TRIM_CLOSE.len();
            Ok(true)
        } else {
            Err(self.error("comment ends before closing delimiter"))
        }
    }

    /// Tokenizes up to and including the closing delimiter. Returns whether
    /// the delimiter trims the text that follows.
    fn lex_action(&mut self) -> Result<bool, TemplateError> {
        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                return Err(self.error("unclosed action"));
            };

            if c.is_whitespace() {
                if rest[c.len_utf8()..].starts_with(TRIM_CLOSE) {
                    self.pos += c.len_utf8() + TRIM_CLOSE.len();
                    self.push(Token::Close);
                    return Ok(true);
                }
                if c == '\n' {
                    self.line += 1;
                }
                self.pos += c.len_utf8();
                continue;
            }

            if rest.starts_with(CLOSE) {
                self.pos += CLOSE.len();
                self.push(Token::Close);
                return Ok(false);
            }

            match c {
                '|' => {
                    self.pos += 1;
                    self.push(Token::Pipe);
                }
                '(' => {
                    self.pos += 1;
                    self.push(Token::LParen);
                }
                ')' => {
                    self.pos += 1;
                    self.push(Token::RParen);
                }
                ',' => {
                    self.pos += 1;
                    self.push(Token::Comma);
                }
                '=' => {
                    self.pos += 1;
                    self.push(Token::Assign);
                }
                ':' => {
                    if !rest.starts_with(":=") {
                        return Err(self.error("expected :="));
                    }
                    self.pos += 2;
                    self.push(Token::Declare);
                }
                '$' => self.lex_variable()?,
                '.' => self.lex_field()?,
                '"' => self.lex_quoted()?,
                '`' => self.lex_raw()?,
                '-' | '0'..='9' => self.lex_number()?,
                c if is_ident_start(c) => {
                    let ident = take_while(rest, is_ident_char);
                    self.pos += ident.len();
                    self.push(Token::Ident(ident.to_string()));
                }
                other => return Err(self.error(format!("unexpected {other:?} in action"))),
            }
        }
    }

    fn push(&mut self, token: Token) {
        self.tokens.push(Spanned {
            token,
            line: self.line,
        });
    }

    fn lex_variable(&mut self) -> Result<(), TemplateError> {
        let name_len = 1 + take_while(&self.rest()[1..], is_ident_char).len();
        let name = self.rest()[..name_len].to_string();
        self.pos += name_len;

        let mut path = Vec::new();
        while let Some(after_dot) = self.rest().strip_prefix('.') {
            let field = take_while(after_dot, is_ident_char);
            if field.is_empty() || !field.starts_with(is_ident_start) {
                return Err(self.error(format!("bad field name after {name}")));
            }
            path.push(field.to_string());
            self.pos += 1 + field.len();
        }
        self.push(Token::Var(name, path));
        Ok(())
    }

    fn lex_field(&mut self) -> Result<(), TemplateError> {
        let mut path = Vec::new();
        while let Some(after_dot) = self.rest().strip_prefix('.') {
            let name = take_while(after_dot, is_ident_char);
            if name.is_empty() {
                if !path.is_empty() {
                    return Err(self.error("field name missing after '.'"));
                }
                self.pos += 1;
                break;
            }
            if !name.starts_with(is_ident_start) {
                return Err(self.error(format!("bad field name {name:?}")));
            }
            path.push(name.to_string());
            self.pos += 1 + name.len();
        }
        self.push(Token::Field(path));
        Ok(())
    }

    fn lex_quoted(&mut self) -> Result<(), TemplateError> {
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    self.push(Token::Str(value));
                    return Ok(());
                }
                '\\' => {
                    let escaped = match chars.next() {
                        Some((_, 'n')) => '\n',
                        Some((_, 't')) => '\t',
                        Some((_, 'r')) => '\r',
                        Some((_, '"')) => '"',
                        Some((_, '\\')) => '\\',
                        Some((_, other)) => {
                            return Err(self.error(format!("unknown escape sequence \\{other}")));
                        }
                        None => break,
                    };
                    value.push(escaped);
                }
                '\n' => break,
                c => value.push(c),
            }
        }
        Err(self.error("unterminated quoted string"))
    }

    fn lex_raw(&mut self) -> Result<(), TemplateError> {
        let body = &self.rest()[1..];
        let Some(end) = body.find('`') else {
            return Err(self.error("unterminated raw quoted string"));
        };
        let value = body[..end].to_string();
        let newlines = value.matches('\n').count();
        self.pos += end + 2;
        self.push(Token::Str(value));
        self.line += newlines;
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), TemplateError> {
        let rest = self.rest();
        let sign = usize::from(rest.starts_with('-'));
        let digits = take_while(&rest[sign..], |c| c.is_ascii_alphanumeric() || c == '.');
        let literal = &rest[..sign + digits.len()];
        let bad = || self.error(format!("bad number syntax: {literal:?}"));

        let token = if let Ok(value) = literal.parse::<i64>() {
            Token::Int(value)
        } else if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            let value = i64::from_str_radix(hex, 16).map_err(|_| bad())?;
            Token::Int(if sign == 1 { -value } else { value })
        } else if digits.starts_with(|c: char| c.is_ascii_digit())
            && let Ok(value) = literal.parse::<f64>()
            && value.is_finite()
        {
            Token::Float(value)
        } else {
            return Err(bad());
        };
        self.pos += literal.len();
        self.push(token);
        Ok(())
    }
}

/// `{{-` only trims when followed by whitespace; `{{-3}}` is a number.
fn has_left_trim_marker(after_open: &str) -> bool {
    after_open
        .strip_prefix('-')
        .and_then(|s| s.chars().next())
        .is_some_and(char::is_whitespace)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn take_while(s: &str, pred: impl Fn(char) -> bool) -> &str {
    let end = s.find(|c: char| !pred(c)).unwrap_or(s.len());
    &s[..end]
}
