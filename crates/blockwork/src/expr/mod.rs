//! Reference evaluator for code nodes.
//!
//! Literals (`1.5`, `'text'`, `"text"`, `true`, `blank`), identifiers,
//! member access `a.key`, 1-based item indexing `a[n]`, inclusive slices
//! `a[start:end:step]`, calls `f(x, y)` and `+ - * /`.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::resolve::{Env, Evaluate};
use chumsky::prelude::*;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

mod eval;
mod lexer;
mod parser;

pub use lexer::{Token, lexer};
pub use parser::{ArithmeticOperator, Expr, parser};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

fn syntax_errors<T: std::fmt::Display>(source: &str, errors: &[T]) -> Error {
    let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
    Error::Syntax(format!("`{source}`: {}", messages.join("; ")))
}

pub fn parse(source: &str) -> Result<Expr> {
    let (tokens, errors) = lexer().parse(source).into_output_errors();
    if !errors.is_empty() {
        return Err(syntax_errors(source, &errors));
    }
    let tokens = tokens.unwrap_or_default();

    let end = source.len();
    let input = tokens.map(Span::from(end..end), |Spanned { node, span }| (node, span));
    let (expr, errors) = parser().parse(input).into_output_errors();
    if !errors.is_empty() {
        return Err(syntax_errors(source, &errors));
    }
    expr.ok_or_else(|| Error::Syntax(format!("`{source}`: empty expression")))
}

/// [`Evaluate`] implementation with a per-source parse cache.
#[derive(Default)]
pub struct Evaluator {
    parsed: RefCell<FxHashMap<Arc<str>, Rc<Expr>>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn expression(&self, source: &str) -> Result<Rc<Expr>> {
        if let Some(expr) = self.parsed.borrow().get(source) {
            return Ok(expr.clone());
        }
        let expr = Rc::new(parse(source)?);
        log::trace!("parsed `{source}`");
        self.parsed
            .borrow_mut()
            .insert(Arc::from(source), expr.clone());
        Ok(expr)
    }

    /// Number of distinct sources parsed so far.
    pub fn cached(&self) -> usize {
        self.parsed.borrow().len()
    }
}

impl Evaluate for Evaluator {
    fn evaluate(&self, source: &str, env: &Env) -> Result<Node> {
        let expr = self.expression(source)?;
        eval::eval(&expr, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::node::Block;
    use crate::resolve::Resolver;
    use crate::scope::ScopeIndex;
    use crate::settings::Settings;

    #[test]
    fn parses_once_per_source() {
        let evaluator = Rc::new(Evaluator::new());
        let resolver = Resolver::new(ScopeIndex::new(), evaluator.clone(), Settings::default());
        let first = Cell::writable(Node::code("x * 2"));
        let second = Cell::writable(Node::code("x * 2"));
        let block = Block::new(
            [
                ("x", Cell::fixed(Node::number(4.0))),
                ("a", first.clone()),
                ("b", second.clone()),
            ],
            [],
        )
        .unwrap();
        let root = Cell::writable(Node::Block(block.clone()));
        resolver.scope().adopt(&root, &block);

        assert_eq!(resolver.resolve_shallow(&first), Ok(Node::number(8.0)));
        assert_eq!(resolver.resolve_shallow(&second), Ok(Node::number(8.0)));
        assert_eq!(evaluator.cached(), 1);
    }

    #[test]
    fn syntax_errors_name_the_source() {
        let error = parse("1 +").unwrap_err();
        assert!(matches!(&error, Error::Syntax(message) if message.starts_with("`1 +`")));
    }
}
