use super::lexer::{Spanned, Token};
use super::{Expr, PatternError, PatternErrorKind};

/// Recursive descent over
///
/// ```text
/// expr   := term ( '|' term )*
/// term   := factor ( '&' factor )*
/// factor := WORD | '(' expr ')'
/// ```
pub(crate) struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, tokens: Vec<Spanned>) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expr, PatternError> {
        if self.tokens.is_empty() {
            return Ok(Expr::Never);
        }
        let expr = self.expr()?;
        if let Some(next) = self.tokens.get(self.pos) {
            let kind = match next.token {
                Token::RParen => PatternErrorKind::UnbalancedParen,
                Token::Word(_) | Token::LParen => PatternErrorKind::MissingOperator,
                Token::And | Token::Or => PatternErrorKind::UnexpectedToken,
            };
            return Err(self.error(kind, next.pos));
        }
        Ok(expr)
    }

    fn expr(&mut self) -> Result<Expr, PatternError> {
        let mut lhs = self.term()?;
        while self.eat(&Token::Or) {
            let rhs = self.term()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, PatternError> {
        let mut lhs = self.factor()?;
        while self.eat(&Token::And) {
            let rhs = self.factor()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, PatternError> {
        let Some(next) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error(PatternErrorKind::UnexpectedEnd, self.src.len()));
        };
        self.pos += 1;
        match next.token {
            Token::Word(w) => Ok(Expr::Word(w)),
            Token::LParen => {
                let inner = self.expr()?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    // Unclosed group: report where it was opened.
                    Err(self.error(PatternErrorKind::UnbalancedParen, next.pos))
                }
            }
            Token::RParen | Token::And | Token::Or => {
                Err(self.error(PatternErrorKind::UnexpectedToken, next.pos))
            }
        }
    }

    fn eat(&mut self, want: &Token) -> bool {
        match self.tokens.get(self.pos) {
            Some(s) if &s.token == want => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn error(&self, kind: PatternErrorKind, position: usize) -> PatternError {
        PatternError {
            kind,
            position,
            pattern: self.src.to_string(),
        }
    }
}
