//! Recursive-descent parser for the expression sublanguage.
//!
//! Grammar (lowest to highest precedence):
//! ```text
//! expr   := or
//! or     := and ( "||" and )*
//! and    := not ( "&&" not )*
//! not    := "!" not | cmp
//! cmp    := add ( ("==" | "!=" | "<" | "<=" | ">" | ">=") add )?
//! add    := mul ( ("+" | "-") mul )*
//! mul    := unary ( ("*" | "/") unary )*
//! unary  := "-" unary | primary
//! primary:= literal | "len" "(" expr ")" | "is_null" "(" expr ")"
//!         | path | "(" expr ")"
//! path   := ident ( "." ident | "[" (ident | string) "]" )*
//! ```

use super::ast::{BinaryOp, Expr, PathSegment, UnaryOp};
use super::error::ExprError;
use super::token::{Lexer, Token};

pub(super) struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn pos_at(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExprError> {
        if self.peek() == expected {
            self.bump();
            Ok(())
        } else {
            Err(ExprError::Parse {
                pos: self.pos_at(),
                message: format!("expected {expected:?}, found {:?}", self.peek()),
            })
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Token::Or {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_not()?;
        while *self.peek() == Token::And {
            self.bump();
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if *self.peek() == Token::Not {
            self.bump();
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Token::Eq => BinaryOp::Eq,
            Token::Ne => BinaryOp::Ne,
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_add()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if *self.peek() == Token::Minus {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let pos = self.pos_at();
        match self.bump() {
            Token::Null => Ok(Expr::Null),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if name == "len" && *self.peek() == Token::LParen => {
                self.bump();
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Len(Box::new(inner)))
            }
            Token::Ident(name) if name == "is_null" && *self.peek() == Token::LParen => {
                self.bump();
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::IsNull(Box::new(inner)))
            }
            Token::Ident(name) => self.parse_path_tail(name),
            other => Err(ExprError::Parse {
                pos,
                message: format!("unexpected token {other:?}"),
            }),
        }
    }

    fn parse_path_tail(&mut self, head: String) -> Result<Expr, ExprError> {
        let mut segments = vec![PathSegment::Field(head)];
        loop {
            match self.peek() {
                Token::Dot => {
                    self.bump();
                    match self.bump() {
                        Token::Ident(name) => segments.push(PathSegment::Field(name)),
                        other => {
                            return Err(ExprError::Parse {
                                pos: self.pos_at(),
                                message: format!("expected identifier after '.', found {other:?}"),
                            })
                        }
                    }
                }
                Token::LBracket => {
                    self.bump();
                    let key = match self.bump() {
                        Token::Ident(name) => name,
                        Token::Str(s) => s,
                        other => {
                            return Err(ExprError::Parse {
                                pos: self.pos_at(),
                                message: format!("expected bracket key, found {other:?}"),
                            })
                        }
                    };
                    self.expect(&Token::RBracket)?;
                    segments.push(PathSegment::Index(key));
                }
                _ => break,
            }
        }
        Ok(Expr::Path(segments))
    }
}

/// Parse an expression string into an AST.
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if *parser.peek() != Token::Eof {
        return Err(ExprError::Parse {
            pos: parser.pos_at(),
            message: format!("trailing tokens starting at {:?}", parser.peek()),
        });
    }
    Ok(expr)
}
