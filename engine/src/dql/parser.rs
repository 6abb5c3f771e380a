//! Recursive-descent parser for DQL statements.

use super::ast::{
    BinaryOp, ConflictPolicy, Evict, Expr, Function, Insert, OrderBy, Path, Select, Statement,
    Update,
};
use super::lexer::{tokenize, Spanned, Token};
use crate::error::{Error, Result};
use serde_json::Value;

/// Parse one statement.
pub fn parse(input: &str) -> Result<Statement> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        index: 0,
    };
    let statement = parser.statement()?;
    if *parser.peek() != Token::Eof {
        return Err(parser.error("unexpected input after end of statement"));
    }
    Ok(statement)
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.index].token
    }

    fn peek_next(&self) -> &Token {
        let next = (self.index + 1).min(self.tokens.len() - 1);
        &self.tokens[next].token
    }

    fn position(&self) -> usize {
        self.tokens[self.index].position
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::syntax(self.position(), message)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.index].token.clone();
        if token != Token::Eof {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword)))
        }
    }

    fn statement(&mut self) -> Result<Statement> {
        if self.eat_keyword("SELECT") {
            self.select().map(Statement::Select)
        } else if self.eat_keyword("INSERT") {
            self.insert().map(Statement::Insert)
        } else if self.eat_keyword("UPDATE") {
            self.update().map(Statement::Update)
        } else if self.eat_keyword("EVICT") {
            self.evict().map(Statement::Evict)
        } else if self.eat_keyword("ALTER") {
            self.alter_system()
        } else {
            Err(self.error("expected SELECT, INSERT, UPDATE, EVICT or ALTER"))
        }
    }

    fn select(&mut self) -> Result<Select> {
        self.expect(Token::Star, "'*'")?;
        self.expect_keyword("FROM")?;
        let collection = self.collection_name()?;
        let filter = self.where_clause()?;

        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let path = self.path()?;
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(OrderBy { path, descending });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        let limit = if self.eat_keyword("LIMIT") {
            Some(self.unsigned("LIMIT")?)
        } else {
            None
        };
        let offset = if self.eat_keyword("OFFSET") {
            Some(self.unsigned("OFFSET")?)
        } else {
            None
        };

        Ok(Select {
            collection,
            filter,
            order_by,
            limit,
            offset,
        })
    }

    fn insert(&mut self) -> Result<Insert> {
        self.expect_keyword("INTO")?;
        let collection = self.collection_name()?;
        self.expect_keyword("DOCUMENTS")?;

        let mut documents = Vec::new();
        loop {
            self.expect(Token::LParen, "'(' before document")?;
            documents.push(self.expr()?);
            self.expect(Token::RParen, "')' after document")?;
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        let mut on_conflict = ConflictPolicy::default();
        if self.eat_keyword("ON") {
            self.expect_keyword("ID")?;
            self.expect_keyword("CONFLICT")?;
            self.expect_keyword("DO")?;
            on_conflict = if self.eat_keyword("FAIL") {
                ConflictPolicy::Fail
            } else if self.eat_keyword("NOTHING") {
                ConflictPolicy::DoNothing
            } else if self.eat_keyword("UPDATE") {
                ConflictPolicy::Update
            } else {
                return Err(self.error("expected FAIL, NOTHING or UPDATE"));
            };
        }

        Ok(Insert {
            collection,
            documents,
            on_conflict,
        })
    }

    fn update(&mut self) -> Result<Update> {
        let collection = self.collection_name()?;
        self.expect_keyword("SET")?;

        let mut assignments = Vec::new();
        loop {
            let path = self.path()?;
            self.expect(Token::Eq, "'=' in SET clause")?;
            assignments.push((path, self.expr()?));
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        let filter = self.where_clause()?;
        Ok(Update {
            collection,
            assignments,
            filter,
        })
    }

    fn evict(&mut self) -> Result<Evict> {
        self.expect_keyword("FROM")?;
        let collection = self.collection_name()?;
        let filter = self.where_clause()?;
        Ok(Evict { collection, filter })
    }

    fn alter_system(&mut self) -> Result<Statement> {
        self.expect_keyword("SYSTEM")?;
        self.expect_keyword("SET")?;
        let name = match self.advance() {
            Token::Ident(name) | Token::QuotedIdent(name) => name.to_ascii_uppercase(),
            _ => return Err(self.error("expected a setting name")),
        };
        self.expect(Token::Eq, "'=' in ALTER SYSTEM")?;
        let value = match self.unary()? {
            Expr::Literal(value) => value,
            Expr::Negate(inner) => match *inner {
                Expr::Literal(Value::Number(n)) => negate_number(&n)
                    .ok_or_else(|| self.error("setting value out of range"))?,
                _ => return Err(self.error("setting value must be a literal")),
            },
            _ => return Err(self.error("setting value must be a literal")),
        };
        Ok(Statement::AlterSystem { name, value })
    }

    fn where_clause(&mut self) -> Result<Option<Expr>> {
        if self.eat_keyword("WHERE") {
            Ok(Some(self.expr()?))
        } else {
            Ok(None)
        }
    }

    fn collection_name(&mut self) -> Result<String> {
        match self.peek().clone() {
            Token::Ident(name) | Token::QuotedIdent(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected a collection name")),
        }
    }

    fn unsigned(&mut self, clause: &str) -> Result<usize> {
        match self.peek().clone() {
            Token::Number(n) => {
                let value = n
                    .as_u64()
                    .and_then(|v| usize::try_from(v).ok())
                    .ok_or_else(|| {
                        self.error(format!("{} requires a non-negative integer", clause))
                    })?;
                self.advance();
                Ok(value)
            }
            _ => Err(self.error(format!("{} requires a non-negative integer", clause))),
        }
    }

    fn path(&mut self) -> Result<Path> {
        let first = match self.peek().clone() {
            Token::Ident(name) | Token::QuotedIdent(name) => name,
            _ => return Err(self.error("expected a field name")),
        };
        self.advance();
        self.path_rest(vec![first])
    }

    fn path_rest(&mut self, mut path: Path) -> Result<Path> {
        while self.eat(&Token::Dot) {
            match self.advance() {
                Token::Ident(segment) | Token::QuotedIdent(segment) => path.push(segment),
                Token::Number(n) if n.is_u64() => path.push(n.to_string()),
                _ => return Err(self.error("expected a field name after '.'")),
            }
        }
        Ok(path)
    }

    fn expr(&mut self) -> Result<Expr> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.eat_keyword("OR") {
            let right = self.and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.not()?;
        while self.eat_keyword("AND") {
            let right = self.not()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat_keyword("NOT") {
            Ok(Expr::Not(Box::new(self.not()?)))
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.unary()?;

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let op = match self.peek() {
            Token::Eq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.unary()?;
        Ok(binary(op, left, right))
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            Ok(Expr::Negate(Box::new(self.unary()?)))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(n)))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::Param(name) => {
                self.advance();
                Ok(Expr::Param(name))
            }
            Token::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBrace => self.object(),
            Token::LBracket => self.array(),
            Token::Ident(word) => {
                if word.eq_ignore_ascii_case("true") {
                    self.advance();
                    Ok(Expr::Literal(Value::Bool(true)))
                } else if word.eq_ignore_ascii_case("false") {
                    self.advance();
                    Ok(Expr::Literal(Value::Bool(false)))
                } else if word.eq_ignore_ascii_case("null") {
                    self.advance();
                    Ok(Expr::Literal(Value::Null))
                } else if *self.peek_next() == Token::LParen {
                    self.call(&word)
                } else {
                    self.advance();
                    Ok(Expr::Path(self.path_rest(vec![word])?))
                }
            }
            Token::QuotedIdent(name) => {
                self.advance();
                Ok(Expr::Path(self.path_rest(vec![name])?))
            }
            _ => Err(self.error("expected an expression")),
        }
    }

    fn call(&mut self, name: &str) -> Result<Expr> {
        let function = Function::from_name(name)
            .ok_or_else(|| self.error(format!("unknown function '{}'", name)))?;
        self.advance();
        self.expect(Token::LParen, "'('")?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen, "')' after arguments")?;
        }

        if args.len() != function.arity() {
            return Err(self.error(format!(
                "{}() takes {} argument(s), got {}",
                function.name(),
                function.arity(),
                args.len()
            )));
        }
        Ok(Expr::Call { function, args })
    }

    fn object(&mut self) -> Result<Expr> {
        self.expect(Token::LBrace, "'{'")?;
        let mut entries = Vec::new();
        if !self.eat(&Token::RBrace) {
            loop {
                let key = match self.advance() {
                    Token::String(key) | Token::Ident(key) | Token::QuotedIdent(key) => key,
                    _ => return Err(self.error("expected an object key")),
                };
                self.expect(Token::Colon, "':' after object key")?;
                entries.push((key, self.expr()?));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RBrace, "'}'")?;
        }
        Ok(Expr::Object(entries))
    }

    fn array(&mut self) -> Result<Expr> {
        self.expect(Token::LBracket, "'['")?;
        let mut items = Vec::new();
        if !self.eat(&Token::RBracket) {
            loop {
                items.push(self.expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RBracket, "']'")?;
        }
        Ok(Expr::Array(items))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub(crate) fn negate_number(n: &serde_json::Number) -> Option<Value> {
    if let Some(i) = n.as_i64() {
        i.checked_neg().map(Value::from)
    } else {
        n.as_f64()
            .and_then(|f| serde_json::Number::from_f64(-f))
            .map(Value::Number)
    }
}
