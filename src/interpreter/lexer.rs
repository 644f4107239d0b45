//! Indentation-aware tokenizer.
//!
//! Produces a flat token stream with synthetic `Indent`/`Dedent`/`Newline`
//! tokens so the parser can treat suites as bracketed blocks. Newlines
//! inside parentheses, brackets and braces are joined implicitly; blank and
//! comment-only lines disappear.

use crate::errors::PyError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Newline,
    Indent,
    Dedent,
    EndOfInput,
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: u32,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    bracket_depth: usize,
    indents: Vec<usize>,
    tokens: Vec<Token>,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, PyError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        bracket_depth: 0,
        indents: vec![0],
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn run(&mut self) -> Result<(), PyError> {
        let mut at_line_start = true;
        loop {
            if at_line_start && self.bracket_depth == 0 {
                if !self.handle_line_start()? {
                    break;
                }
                at_line_start = false;
                continue;
            }
            let Some(c) = self.peek() else {
                break;
            };
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' => self.skip_comment(),
                '\n' => {
                    self.advance();
                    self.line += 1;
                    if self.bracket_depth == 0 {
                        self.push(Tok::Newline, self.line - 1);
                        at_line_start = true;
                    }
                }
                '\'' | '"' => self.lex_string(c)?,
                '0'..='9' => self.lex_number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.lex_name(),
                _ => self.lex_operator()?,
            }
        }
        // close out any dangling logical line and open suites
        if self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.tok, Tok::Newline))
        {
            self.push(Tok::Newline, self.line);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent, self.line);
        }
        self.push(Tok::EndOfInput, self.line);
        Ok(())
    }

    /// Measure indentation and emit Indent/Dedent tokens. Returns false at
    /// end of input.
    fn handle_line_start(&mut self) -> Result<bool, PyError> {
        loop {
            let mut width = 0usize;
            loop {
                match self.peek() {
                    Some(' ') => {
                        width += 1;
                        self.advance();
                    }
                    Some('\t') => {
                        width += 8 - (width % 8);
                        self.advance();
                    }
                    Some('\r') => {
                        self.advance();
                    }
                    _ => break,
                }
            }
            match self.peek() {
                None => return Ok(false),
                Some('\n') => {
                    // blank line: no tokens at all
                    self.advance();
                    self.line += 1;
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {
                    let current = *self.indents.last().unwrap_or(&0);
                    if width > current {
                        self.indents.push(width);
                        self.push(Tok::Indent, self.line);
                    } else if width < current {
                        while *self.indents.last().unwrap_or(&0) > width {
                            self.indents.pop();
                            self.push(Tok::Dedent, self.line);
                        }
                        if *self.indents.last().unwrap_or(&0) != width {
                            return Err(PyError::syntax(
                                "unindent does not match any outer indentation level",
                                self.line,
                            ));
                        }
                    }
                    return Ok(true);
                }
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<(), PyError> {
        let start_line = self.line;
        self.advance();
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(PyError::syntax(
                        "EOL while scanning string literal",
                        start_line,
                    ));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.peek().ok_or_else(|| {
                        PyError::syntax("EOL while scanning string literal", start_line)
                    })?;
                    let resolved = match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        other => {
                            // unknown escapes pass through verbatim
                            out.push('\\');
                            other
                        }
                    };
                    out.push(resolved);
                    self.advance();
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
        self.push(Tok::Str(out), start_line);
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), PyError> {
        let start_line = self.line;
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '.' && !is_float && self.peek_ahead(1).is_some_and(|n| n.is_ascii_digit())
            {
                is_float = true;
                text.push(c);
                self.advance();
            } else if (c == 'e' || c == 'E')
                && self
                    .peek_ahead(1)
                    .is_some_and(|n| n.is_ascii_digit() || n == '+' || n == '-')
            {
                is_float = true;
                text.push(c);
                self.advance();
                let sign = self.peek().unwrap_or('0');
                if sign == '+' || sign == '-' {
                    text.push(sign);
                    self.advance();
                }
            } else {
                break;
            }
        }
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| PyError::syntax("invalid number literal", start_line))?;
            self.push(Tok::Float(value), start_line);
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| PyError::syntax("integer literal too large", start_line))?;
            self.push(Tok::Int(value), start_line);
        }
        Ok(())
    }

    fn lex_name(&mut self) {
        let start_line = self.line;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        self.push(Tok::Name(text), start_line);
    }

    fn lex_operator(&mut self) -> Result<(), PyError> {
        let line = self.line;
        let c = self.peek().unwrap_or('\0');
        let next = self.peek_ahead(1);
        let (tok, width) = match (c, next) {
            ('*', Some('*')) => (Tok::DoubleStar, 2),
            ('*', Some('=')) => (Tok::StarAssign, 2),
            ('/', Some('/')) => (Tok::DoubleSlash, 2),
            ('/', Some('=')) => (Tok::SlashAssign, 2),
            ('+', Some('=')) => (Tok::PlusAssign, 2),
            ('-', Some('=')) => (Tok::MinusAssign, 2),
            ('=', Some('=')) => (Tok::EqEq, 2),
            ('!', Some('=')) => (Tok::NotEq, 2),
            ('<', Some('=')) => (Tok::Le, 2),
            ('>', Some('=')) => (Tok::Ge, 2),
            ('+', _) => (Tok::Plus, 1),
            ('-', _) => (Tok::Minus, 1),
            ('*', _) => (Tok::Star, 1),
            ('/', _) => (Tok::Slash, 1),
            ('%', _) => (Tok::Percent, 1),
            ('=', _) => (Tok::Assign, 1),
            ('<', _) => (Tok::Lt, 1),
            ('>', _) => (Tok::Gt, 1),
            ('(', _) => (Tok::LParen, 1),
            (')', _) => (Tok::RParen, 1),
            ('[', _) => (Tok::LBracket, 1),
            (']', _) => (Tok::RBracket, 1),
            ('{', _) => (Tok::LBrace, 1),
            ('}', _) => (Tok::RBrace, 1),
            (',', _) => (Tok::Comma, 1),
            (':', _) => (Tok::Colon, 1),
            ('.', _) => (Tok::Dot, 1),
            (';', _) => (Tok::Semicolon, 1),
            _ => {
                return Err(PyError::syntax(
                    format!("invalid character {c:?} in input"),
                    line,
                ));
            }
        };
        match tok {
            Tok::LParen | Tok::LBracket | Tok::LBrace => self.bracket_depth += 1,
            Tok::RParen | Tok::RBracket | Tok::RBrace => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
            }
            _ => {}
        }
        for _ in 0..width {
            self.advance();
        }
        self.push(tok, line);
        Ok(())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn push(&mut self, tok: Tok, line: u32) {
        self.tokens.push(Token { tok, line });
    }
}
