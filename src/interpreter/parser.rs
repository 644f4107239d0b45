//! Recursive-descent parser producing the statement list the executor
//! walks one node at a time.

use crate::errors::PyError;
use crate::interpreter::ast::{BinOp, BoolOp, CmpOp, Expr, Param, Stmt, Target, UnaryOp};
use crate::interpreter::lexer::{Tok, Token, tokenize};

const KEYWORDS: &[&str] = &[
    "and", "as", "break", "class", "continue", "def", "del", "elif", "else", "for", "if",
    "import", "in", "is", "not", "or", "pass", "print", "return", "while", "True", "False",
    "None",
];

pub fn parse(source: &str) -> Result<Vec<Stmt>, PyError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn module(&mut self) -> Result<Vec<Stmt>, PyError> {
        let mut stmts = Vec::new();
        loop {
            if self.check(&Tok::EndOfInput) {
                return Ok(stmts);
            }
            if self.check(&Tok::Newline) {
                self.advance();
                continue;
            }
            stmts.extend(self.statement()?);
        }
    }

    /// One statement "line": a compound statement, or a `;`-separated run
    /// of simple statements.
    fn statement(&mut self) -> Result<Vec<Stmt>, PyError> {
        if let Some(kw) = self.peek_keyword() {
            match kw.as_str() {
                "if" => return Ok(vec![self.if_stmt()?]),
                "while" => return Ok(vec![self.while_stmt()?]),
                "for" => return Ok(vec![self.for_stmt()?]),
                "def" => return Ok(vec![self.def_stmt()?]),
                "class" => return Ok(vec![self.class_stmt()?]),
                _ => {}
            }
        }
        self.simple_stmt_line()
    }

    fn simple_stmt_line(&mut self) -> Result<Vec<Stmt>, PyError> {
        let mut stmts = vec![self.simple_stmt()?];
        while self.check(&Tok::Semicolon) {
            self.advance();
            if self.check(&Tok::Newline) || self.check(&Tok::EndOfInput) {
                break;
            }
            stmts.push(self.simple_stmt()?);
        }
        self.expect_newline()?;
        Ok(stmts)
    }

    fn simple_stmt(&mut self) -> Result<Stmt, PyError> {
        let line = self.line();
        if let Some(kw) = self.peek_keyword() {
            match kw.as_str() {
                "print" => {
                    self.advance();
                    let mut values = Vec::new();
                    if !self.at_stmt_end() {
                        values.push(self.expression()?);
                        while self.check(&Tok::Comma) {
                            self.advance();
                            if self.at_stmt_end() {
                                break;
                            }
                            values.push(self.expression()?);
                        }
                    }
                    return Ok(Stmt::Print { values, line });
                }
                "del" => {
                    self.advance();
                    let mut names = vec![self.name()?];
                    while self.check(&Tok::Comma) {
                        self.advance();
                        names.push(self.name()?);
                    }
                    return Ok(Stmt::Del { names, line });
                }
                "import" => {
                    self.advance();
                    let mut module = self.name()?;
                    while self.check(&Tok::Dot) {
                        self.advance();
                        module.push('.');
                        module.push_str(&self.name()?);
                    }
                    let alias = if self.peek_keyword().as_deref() == Some("as") {
                        self.advance();
                        Some(self.name()?)
                    } else {
                        None
                    };
                    return Ok(Stmt::Import {
                        module,
                        alias,
                        line,
                    });
                }
                "return" => {
                    self.advance();
                    let value = if self.at_stmt_end() {
                        None
                    } else {
                        Some(self.testlist()?)
                    };
                    return Ok(Stmt::Return { value, line });
                }
                "break" => {
                    self.advance();
                    return Ok(Stmt::Break { line });
                }
                "continue" => {
                    self.advance();
                    return Ok(Stmt::Continue { line });
                }
                "pass" => {
                    self.advance();
                    return Ok(Stmt::Pass { line });
                }
                _ => {}
            }
        }
        self.expr_stmt()
    }

    fn expr_stmt(&mut self) -> Result<Stmt, PyError> {
        let line = self.line();
        let first = self.testlist()?;
        if self.check(&Tok::Assign) {
            self.advance();
            let target = self.as_target(first, line)?;
            let value = self.testlist()?;
            return Ok(Stmt::Assign {
                target,
                value,
                line,
            });
        }
        let aug = match self.peek_tok() {
            Some(Tok::PlusAssign) => Some(BinOp::Add),
            Some(Tok::MinusAssign) => Some(BinOp::Sub),
            Some(Tok::StarAssign) => Some(BinOp::Mul),
            Some(Tok::SlashAssign) => Some(BinOp::Div),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            let target = self.as_target(first, line)?;
            let value = self.testlist()?;
            return Ok(Stmt::AugAssign {
                target,
                op,
                value,
                line,
            });
        }
        Ok(Stmt::Expr { value: first, line })
    }

    fn as_target(&self, expr: Expr, line: u32) -> Result<Target, PyError> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Attribute { value, attr } => Ok(Target::Attribute(value, attr)),
            Expr::Index { value, index } => Ok(Target::Index(value, index)),
            _ => Err(PyError::syntax("can't assign to this expression", line)),
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, PyError> {
        let line = self.line();
        self.keyword("if")?;
        let mut branches = vec![(self.expression()?, self.suite()?)];
        let mut orelse = Vec::new();
        loop {
            match self.peek_keyword().as_deref() {
                Some("elif") => {
                    self.advance();
                    branches.push((self.expression()?, self.suite()?));
                }
                Some("else") => {
                    self.advance();
                    orelse = self.suite()?;
                    break;
                }
                _ => break,
            }
        }
        Ok(Stmt::If {
            branches,
            orelse,
            line,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, PyError> {
        let line = self.line();
        self.keyword("while")?;
        let test = self.expression()?;
        let body = self.suite()?;
        Ok(Stmt::While { test, body, line })
    }

    fn for_stmt(&mut self) -> Result<Stmt, PyError> {
        let line = self.line();
        self.keyword("for")?;
        let target = self.name()?;
        self.keyword("in")?;
        let iter = self.testlist()?;
        let body = self.suite()?;
        Ok(Stmt::For {
            target,
            iter,
            body,
            line,
        })
    }

    fn def_stmt(&mut self) -> Result<Stmt, PyError> {
        let line = self.line();
        self.keyword("def")?;
        let name = self.name()?;
        self.expect(Tok::LParen)?;
        let mut params = Vec::new();
        let mut saw_default = false;
        while !self.check(&Tok::RParen) {
            let pname = self.name()?;
            let default = if self.check(&Tok::Assign) {
                self.advance();
                saw_default = true;
                Some(self.expression()?)
            } else {
                if saw_default {
                    return Err(PyError::syntax(
                        "non-default argument follows default argument",
                        line,
                    ));
                }
                None
            };
            params.push(Param {
                name: pname,
                default,
            });
            if self.check(&Tok::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Tok::RParen)?;
        let body = self.suite()?;
        Ok(Stmt::Def {
            name,
            params,
            body,
            line,
        })
    }

    fn class_stmt(&mut self) -> Result<Stmt, PyError> {
        let line = self.line();
        self.keyword("class")?;
        let name = self.name()?;
        if self.check(&Tok::LParen) {
            // single base accepted and ignored (everything is old-style here)
            self.advance();
            if !self.check(&Tok::RParen) {
                self.name()?;
            }
            self.expect(Tok::RParen)?;
        }
        let body = self.suite()?;
        Ok(Stmt::Class { name, body, line })
    }

    /// `':' simple-statements NEWLINE` or an indented block.
    fn suite(&mut self) -> Result<Vec<Stmt>, PyError> {
        self.expect(Tok::Colon)?;
        if self.check(&Tok::Newline) {
            self.advance();
            self.expect(Tok::Indent)?;
            let mut stmts = Vec::new();
            while !self.check(&Tok::Dedent) {
                if self.check(&Tok::Newline) {
                    self.advance();
                    continue;
                }
                stmts.extend(self.statement()?);
            }
            self.advance(); // Dedent
            if stmts.is_empty() {
                return Err(PyError::syntax("expected an indented block", self.line()));
            }
            Ok(stmts)
        } else {
            self.simple_stmt_line()
        }
    }

    /// `expr {',' expr}` folding into a tuple when more than one.
    fn testlist(&mut self) -> Result<Expr, PyError> {
        let first = self.expression()?;
        if !self.check(&Tok::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.check(&Tok::Comma) {
            self.advance();
            if self.at_stmt_end() || self.check(&Tok::Assign) {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn expression(&mut self) -> Result<Expr, PyError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, PyError> {
        let mut left = self.and_expr()?;
        while self.peek_keyword().as_deref() == Some("or") {
            self.advance();
            let right = self.and_expr()?;
            left = Expr::BoolOp {
                left: Box::new(left),
                op: BoolOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, PyError> {
        let mut left = self.not_expr()?;
        while self.peek_keyword().as_deref() == Some("and") {
            self.advance();
            let right = self.not_expr()?;
            left = Expr::BoolOp {
                left: Box::new(left),
                op: BoolOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, PyError> {
        if self.peek_keyword().as_deref() == Some("not") {
            self.advance();
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, PyError> {
        let left = self.arith()?;
        let mut ops = Vec::new();
        loop {
            let op = match self.peek_tok() {
                Some(Tok::EqEq) => CmpOp::Eq,
                Some(Tok::NotEq) => CmpOp::Ne,
                Some(Tok::Lt) => CmpOp::Lt,
                Some(Tok::Le) => CmpOp::Le,
                Some(Tok::Gt) => CmpOp::Gt,
                Some(Tok::Ge) => CmpOp::Ge,
                Some(Tok::Name(n)) if n == "in" => CmpOp::In,
                Some(Tok::Name(n)) if n == "is" => {
                    self.advance();
                    let op = if self.peek_keyword().as_deref() == Some("not") {
                        self.advance();
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    };
                    ops.push((op, self.arith()?));
                    continue;
                }
                Some(Tok::Name(n)) if n == "not" => {
                    self.advance();
                    self.keyword("in")?;
                    ops.push((CmpOp::NotIn, self.arith()?));
                    continue;
                }
                _ => break,
            };
            self.advance();
            ops.push((op, self.arith()?));
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                ops,
            })
        }
    }

    fn arith(&mut self) -> Result<Expr, PyError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek_tok() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, PyError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek_tok() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::DoubleSlash) => BinOp::FloorDiv,
                Some(Tok::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, PyError> {
        match self.peek_tok() {
            Some(Tok::Minus) => {
                self.advance();
                let operand = self.factor()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            Some(Tok::Plus) => {
                self.advance();
                let operand = self.factor()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Pos,
                    operand: Box::new(operand),
                })
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, PyError> {
        let base = self.postfix()?;
        if self.check(&Tok::DoubleStar) {
            self.advance();
            // right-associative, binds tighter than unary on the right
            let exponent = self.factor()?;
            return Ok(Expr::Binary {
                left: Box::new(base),
                op: BinOp::Pow,
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, PyError> {
        let mut value = self.atom()?;
        loop {
            match self.peek_tok() {
                Some(Tok::LParen) => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(&Tok::RParen) {
                        args.push(self.expression()?);
                        if self.check(&Tok::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    self.expect(Tok::RParen)?;
                    value = Expr::Call {
                        func: Box::new(value),
                        args,
                    };
                }
                Some(Tok::LBracket) => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(Tok::RBracket)?;
                    value = Expr::Index {
                        value: Box::new(value),
                        index: Box::new(index),
                    };
                }
                Some(Tok::Dot) => {
                    self.advance();
                    let attr = self.name()?;
                    value = Expr::Attribute {
                        value: Box::new(value),
                        attr,
                    };
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn atom(&mut self) -> Result<Expr, PyError> {
        let line = self.line();
        let tok = self
            .peek_tok()
            .cloned()
            .ok_or_else(|| PyError::syntax("unexpected end of input", line))?;
        match tok {
            Tok::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            Tok::Float(f) => {
                self.advance();
                Ok(Expr::Float(f))
            }
            Tok::Str(s) => {
                self.advance();
                // adjacent string literals concatenate
                let mut text = s;
                while let Some(Tok::Str(next)) = self.peek_tok() {
                    text.push_str(next);
                    self.advance();
                }
                Ok(Expr::Str(text))
            }
            Tok::Name(name) => {
                match name.as_str() {
                    "None" => {
                        self.advance();
                        return Ok(Expr::None);
                    }
                    "True" => {
                        self.advance();
                        return Ok(Expr::True);
                    }
                    "False" => {
                        self.advance();
                        return Ok(Expr::False);
                    }
                    kw if KEYWORDS.contains(&kw) => {
                        return Err(PyError::syntax("invalid syntax", line));
                    }
                    _ => {}
                }
                self.advance();
                Ok(Expr::Name(name))
            }
            Tok::LParen => {
                self.advance();
                if self.check(&Tok::RParen) {
                    self.advance();
                    return Ok(Expr::Tuple(vec![]));
                }
                let inner = self.testlist()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&Tok::RBracket) {
                    items.push(self.expression()?);
                    if self.check(&Tok::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(Tok::RBracket)?;
                Ok(Expr::List(items))
            }
            Tok::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(&Tok::RBrace) {
                    let key = self.expression()?;
                    self.expect(Tok::Colon)?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if self.check(&Tok::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(Tok::RBrace)?;
                Ok(Expr::Dict(entries))
            }
            _ => Err(PyError::syntax("invalid syntax", line)),
        }
    }

    // --- token plumbing ---

    fn peek_tok(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_keyword(&self) -> Option<String> {
        match self.peek_tok() {
            Some(Tok::Name(name)) if KEYWORDS.contains(&name.as_str()) => Some(name.clone()),
            _ => None,
        }
    }

    fn line(&self) -> u32 {
        self.tokens.get(self.pos).map(|t| t.line).unwrap_or(1)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, tok: &Tok) -> bool {
        self.peek_tok() == Some(tok)
    }

    fn expect(&mut self, tok: Tok) -> Result<(), PyError> {
        if self.check(&tok) {
            self.advance();
            Ok(())
        } else {
            Err(PyError::syntax("invalid syntax", self.line()))
        }
    }

    fn expect_newline(&mut self) -> Result<(), PyError> {
        match self.peek_tok() {
            Some(Tok::Newline) => {
                self.advance();
                Ok(())
            }
            Some(Tok::EndOfInput) | None => Ok(()),
            _ => Err(PyError::syntax("invalid syntax", self.line())),
        }
    }

    fn keyword(&mut self, kw: &str) -> Result<(), PyError> {
        if self.peek_keyword().as_deref() == Some(kw) {
            self.advance();
            Ok(())
        } else {
            Err(PyError::syntax("invalid syntax", self.line()))
        }
    }

    fn name(&mut self) -> Result<String, PyError> {
        match self.peek_tok() {
            Some(Tok::Name(name)) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(PyError::syntax("invalid syntax", self.line())),
        }
    }

    fn at_stmt_end(&self) -> bool {
        matches!(
            self.peek_tok(),
            Some(Tok::Newline) | Some(Tok::Semicolon) | Some(Tok::EndOfInput) | None
        )
    }
}
