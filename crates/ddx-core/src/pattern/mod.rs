//! Diagnosis patterns: boolean keyword expressions over a suggestion string.
//!
//! A pattern such as `diverticulitis | ((gastro & intestinal) & inflammation)`
//! is made of bare words combined with `&` (AND, binds tighter) and `|` (OR),
//! grouped with parentheses. A word matches when it occurs, case-insensitively,
//! as a substring of the suggestion.
//!
//! Patterns compile into a closed [`Expr`] tree. Nothing in a pattern is ever
//! executed; the only operations are containment, AND and OR.

mod lexer;
mod parser;

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternErrorKind {
    UnbalancedParen,
    UnexpectedToken,
    UnexpectedEnd,
    MissingOperator,
}

impl fmt::Display for PatternErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatternErrorKind::UnbalancedParen => "unbalanced parenthesis",
            PatternErrorKind::UnexpectedToken => "unexpected token",
            PatternErrorKind::UnexpectedEnd => "unexpected end of pattern",
            PatternErrorKind::MissingOperator => "missing '&' or '|' between terms",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pattern {pattern:?}: {kind} at byte {position}")]
pub struct PatternError {
    pub kind: PatternErrorKind,
    pub position: usize,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Compiled form of an empty pattern.
    Never,
    Word(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// `candidate` must already be lower-cased.
    fn eval(&self, candidate: &str) -> bool {
        match self {
            Expr::Never => false,
            Expr::Word(w) => candidate.contains(w.as_str()),
            Expr::And(a, b) => a.eval(candidate) && b.eval(candidate),
            Expr::Or(a, b) => a.eval(candidate) || b.eval(candidate),
        }
    }

    fn collect_words<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Never => {}
            Expr::Word(w) => out.push(w),
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_words(out);
                b.collect_words(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Never => f.write_str("<never>"),
            Expr::Word(w) => write!(f, "{:?}", w),
            Expr::And(a, b) => write!(f, "({} & {})", a, b),
            Expr::Or(a, b) => write!(f, "({} | {})", a, b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    expr: Expr,
}

impl Pattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let tokens = lexer::tokenize(source);
        let expr = parser::Parser::new(source, tokens).parse()?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn matches(&self, suggestion: &str) -> bool {
        self.expr.eval(&suggestion.to_lowercase())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// True for a blank pattern, which never matches.
    pub fn is_empty(&self) -> bool {
        self.expr == Expr::Never
    }

    pub fn words(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.expr.collect_words(&mut out);
        out
    }
}

pub fn compile(source: &str) -> Result<Pattern, PatternError> {
    Pattern::compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(p: &str, s: &str) -> bool {
        compile(p).unwrap().matches(s)
    }

    fn err_kind(p: &str) -> PatternErrorKind {
        compile(p).unwrap_err().kind
    }

    #[test]
    fn nested_or_matches_conjunction_branch() {
        let p = "diverticulitis | ((gastro & intestinal) | gi)";
        assert!(matches(p, "acute gastro intestinal flare"));
        assert!(matches(p, "Diverticulitis"));
        assert!(!matches(p, "gastroenteritis"));
        // "gi" is a plain substring test, like every word.
        assert!(matches(p, "vagina"));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let p = compile("a | b & c").unwrap();
        assert_eq!(p.expr().to_string(), r#"("a" | ("b" & "c"))"#);
        assert!(p.matches("a"));
        assert!(!p.matches("b"));
        assert!(p.matches("cb"));
    }

    #[test]
    fn matching_is_case_insensitive_both_ways() {
        assert!(matches("COPD", "copd exacerbation"));
        assert!(matches("copd", "COPD Exacerbation"));
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        for src in ["", "   ", "\n\t"] {
            let p = compile(src).unwrap();
            assert!(p.is_empty());
            assert!(!p.matches(""));
            assert!(!p.matches("anything at all"));
        }
    }

    #[test]
    fn malformed_patterns_fail_at_compile_time() {
        assert_eq!(err_kind("(a & b"), PatternErrorKind::UnbalancedParen);
        assert_eq!(err_kind("a & b)"), PatternErrorKind::UnbalancedParen);
        assert_eq!(err_kind("()"), PatternErrorKind::UnexpectedToken);
        assert_eq!(err_kind("a && b"), PatternErrorKind::UnexpectedToken);
        assert_eq!(err_kind("| a"), PatternErrorKind::UnexpectedToken);
        assert_eq!(err_kind("a |"), PatternErrorKind::UnexpectedEnd);
        assert_eq!(err_kind("heart failure"), PatternErrorKind::MissingOperator);
        assert_eq!(err_kind("a (b)"), PatternErrorKind::MissingOperator);
    }

    #[test]
    fn error_reports_position_and_source() {
        let err = compile("pneumonia | (cough & fever").unwrap_err();
        assert_eq!(err.position, 12);
        assert_eq!(err.pattern, "pneumonia | (cough & fever");
        assert!(err.to_string().contains("unbalanced parenthesis"));
    }

    #[test]
    fn code_like_input_is_only_ever_a_word() {
        let p = compile("__import__('os').system('x')").unwrap_err();
        assert_eq!(p.kind, PatternErrorKind::MissingOperator);

        let p = compile("os.system").unwrap();
        assert_eq!(p.words(), vec!["os.system"]);
        assert!(p.matches("call os.system now"));
        assert!(!p.matches("os"));
    }

    #[test]
    fn literal_structure_agrees_with_direct_evaluation() {
        let words = ["cough", "fever", "rash"];
        let candidates = ["cough", "fever and cough", "rash", "", "COUGH, RASH"];
        for a in words {
            for b in words {
                for c in words {
                    let p = compile(&format!("({} & {}) | {}", a, b, c)).unwrap();
                    for s in candidates {
                        let l = s.to_lowercase();
                        let expected = (l.contains(a) && l.contains(b)) || l.contains(c);
                        assert_eq!(p.matches(s), expected, "{} on {:?}", p.source(), s);
                    }
                }
            }
        }
    }
}
