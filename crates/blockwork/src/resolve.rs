//! Resolution engine.
//!
//! Shallow resolution evaluates one level of code or conditional into a
//! concrete node. Deep resolution recurses into blocks and produces a
//! [`Static`] tree, catching each child's failure in place so one broken
//! child never hides its siblings.

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::node::{Block, Node};
use crate::scope::ScopeIndex;
use crate::settings::Settings;
use crate::static_node::{Static, StaticBlock};
use std::rc::Rc;

/// Evaluates the source text of a code node.
///
/// The grammar belongs to the implementor; the crate only hands over an
/// [`Env`] bound to the position of the code cell.
pub trait Evaluate {
    fn evaluate(&self, source: &str, env: &Env) -> Result<Node>;
}

impl<F> Evaluate for F
where
    F: Fn(&str, &Env) -> Result<Node>,
{
    fn evaluate(&self, source: &str, env: &Env) -> Result<Node> {
        self(source, env)
    }
}

/// Scope access for one evaluation, bound to the cell being resolved.
pub struct Env<'a> {
    resolver: &'a Resolver,
    origin: &'a Cell,
}

impl<'a> Env<'a> {
    /// The cell whose code is being evaluated.
    pub fn origin(&self) -> &Cell {
        self.origin
    }

    pub fn resolver(&self) -> &'a Resolver {
        self.resolver
    }

    pub fn lookup(&self, name: &str) -> Result<Cell> {
        self.resolver.scope.lookup(name, self.origin)
    }

    pub fn resolve(&self, cell: &Cell) -> Result<Node> {
        self.resolver.resolve_shallow(cell)
    }

    pub fn resolve_deep(&self, cell: &Cell) -> Result<Static> {
        self.resolver.resolve_deep(cell)
    }
}

#[derive(Clone)]
pub struct Resolver {
    scope: ScopeIndex,
    evaluator: Rc<dyn Evaluate>,
    settings: Rc<Settings>,
    depth: Rc<std::cell::Cell<usize>>,
}

struct DepthGuard {
    depth: Rc<std::cell::Cell<usize>>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

struct DepthReset {
    depth: Rc<std::cell::Cell<usize>>,
    saved: usize,
}

impl Drop for DepthReset {
    fn drop(&mut self) {
        self.depth.set(self.saved);
    }
}

impl Resolver {
    pub fn new(scope: ScopeIndex, evaluator: Rc<dyn Evaluate>, settings: Settings) -> Self {
        Self {
            scope,
            evaluator,
            settings: Rc::new(settings),
            depth: Rc::new(std::cell::Cell::new(0)),
        }
    }

    pub fn scope(&self) -> &ScopeIndex {
        &self.scope
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn enter(&self) -> Result<DepthGuard> {
        let depth = self.depth.get();
        if depth >= self.settings.max_resolve_depth {
            return Err(Error::DepthExceeded(self.settings.max_resolve_depth));
        }
        self.depth.set(depth + 1);
        Ok(DepthGuard {
            depth: self.depth.clone(),
        })
    }

    /// Run `f` as a top-level resolution. Anything memoized inside must not
    /// depend on how deep its first reader happened to be.
    pub(crate) fn detached<T>(&self, f: impl FnOnce() -> T) -> T {
        let _reset = DepthReset {
            saved: self.depth.replace(0),
            depth: self.depth.clone(),
        };
        f()
    }

    /// Resolve one level: pick a conditional's branch or evaluate code.
    /// Any other node is returned unchanged. Not memoized; see [`Resolver::computed`].
    pub fn resolve_shallow(&self, cell: &Cell) -> Result<Node> {
        let node = cell.get()?;
        self.resolve_node(node, cell)
    }

    /// Resolve `node` as if it were held by `origin`.
    pub fn resolve_node(&self, node: Node, origin: &Cell) -> Result<Node> {
        let _depth = self.enter()?;
        match node {
            Node::Conditional(conditional) => {
                let condition = self.resolve_deep(&conditional.condition)?;
                if condition.is_truthy() {
                    self.resolve_shallow(&conditional.then)
                } else if let Some(otherwise) = &conditional.otherwise {
                    self.resolve_shallow(otherwise)
                } else {
                    Ok(Node::Blank)
                }
            }
            Node::Code(code) => {
                log::trace!("evaluating `{}` in {origin:?}", code.source());
                let env = Env {
                    resolver: self,
                    origin,
                };
                let result = self.evaluator.evaluate(code.source(), &env)?;
                if result.is_unevaluated() {
                    self.resolve_node(result, origin)
                } else {
                    Ok(result)
                }
            }
            node => Ok(node),
        }
    }

    /// Resolve into a [`Static`] tree.
    ///
    /// Failures at the top propagate. Inside a block, each child's failure
    /// becomes a [`Static::Error`] at that child's position only.
    pub fn resolve_deep(&self, cell: &Cell) -> Result<Static> {
        match self.resolve_shallow(cell)? {
            Node::Blank => Ok(Static::Blank),
            Node::Literal(primitive) => Ok(Static::Primitive(primitive)),
            Node::Block(block) => Ok(Static::Block(self.resolve_block(&block))),
            Node::Function(_) => Err(Error::CannotResolveFunction),
            Node::Code(_) | Node::Conditional(_) => {
                unreachable!("shallow resolution returns concrete nodes")
            }
        }
    }

    pub fn resolve_block(&self, block: &Block) -> StaticBlock {
        StaticBlock {
            values: block
                .values()
                .iter()
                .map(|entry| (entry.key.clone(), self.resolve_child(&entry.cell)))
                .collect(),
            items: block
                .items()
                .iter()
                .map(|item| self.resolve_child(item))
                .collect(),
        }
    }

    fn resolve_child(&self, cell: &Cell) -> Static {
        self.resolve_deep(cell).unwrap_or_else(|error| {
            log::debug!("{cell:?} failed to resolve: {error}");
            Static::Error(error.to_string())
        })
    }

    /// A derived cell caching `resolve_shallow(cell)` until something it
    /// read (a scope block, a referenced cell) changes.
    pub fn computed(&self, cell: &Cell) -> Cell {
        let resolver = self.clone();
        let source = cell.clone();
        Cell::derived(move || resolver.detached(|| resolver.resolve_shallow(&source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Conditional, Function};

    /// Code is a bare identifier, or `fail` which always errors.
    fn identifier_evaluator(source: &str, env: &Env) -> Result<Node> {
        if source == "fail" {
            return Err(Error::custom("failed on purpose"));
        }
        let cell = env.lookup(source)?;
        env.resolve(&cell)
    }

    fn resolver() -> Resolver {
        Resolver::new(
            ScopeIndex::new(),
            Rc::new(identifier_evaluator),
            Settings::default(),
        )
    }

    fn block_cell(resolver: &Resolver, values: Vec<(&str, Cell)>, items: Vec<Cell>) -> Cell {
        let block = Block::new(values, items).unwrap();
        let cell = Cell::writable(Node::Block(block.clone()));
        resolver.scope().adopt(&cell, &block);
        cell
    }

    #[test]
    fn code_reads_its_scope() {
        let resolver = resolver();
        let reference = Cell::writable(Node::code("x"));
        let _root = block_cell(
            &resolver,
            vec![("x", Cell::fixed(Node::number(7.0))), ("y", reference.clone())],
            vec![],
        );
        assert_eq!(resolver.resolve_shallow(&reference), Ok(Node::number(7.0)));
    }

    #[test]
    fn one_failing_child_does_not_fail_the_block() {
        let resolver = resolver();
        let root = block_cell(
            &resolver,
            vec![
                ("x", Cell::fixed(Node::number(1.0))),
                ("y", Cell::writable(Node::code("fail"))),
            ],
            vec![Cell::writable(Node::code("missing"))],
        );

        let resolved = resolver.resolve_deep(&root).unwrap();
        let block = resolved.as_block().unwrap();
        assert_eq!(block.len(), 3);
        assert_eq!(block.get("x"), Some(&Static::number(1.0)));
        assert_eq!(
            block.get("y"),
            Some(&Static::Error("failed on purpose".to_string()))
        );
        assert_eq!(
            block.item(1),
            Some(&Static::Error("unbound identifier `missing`".to_string()))
        );
    }

    #[test]
    fn functions_do_not_resolve_statically() {
        let resolver = resolver();
        let function = Function::new("id", |arguments| Ok(arguments[0].clone()));
        let top = Cell::fixed(Node::Function(function.clone()));
        assert_eq!(resolver.resolve_deep(&top), Err(Error::CannotResolveFunction));

        let root = block_cell(&resolver, vec![("f", top)], vec![]);
        let resolved = resolver.resolve_deep(&root).unwrap();
        assert!(resolved.as_block().unwrap().get("f").unwrap().is_error());
    }

    #[test]
    fn conditional_selects_a_branch() {
        let resolver = resolver();
        let flag = Cell::writable(Node::truth());
        let conditional = Cell::writable(Node::Conditional(Conditional {
            condition: flag.clone(),
            then: Cell::fixed(Node::text("yes")),
            otherwise: None,
        }));

        assert_eq!(resolver.resolve_shallow(&conditional), Ok(Node::text("yes")));
        flag.set(Node::number(0.0)).unwrap();
        assert_eq!(resolver.resolve_shallow(&conditional), Ok(Node::Blank));
        flag.set(Node::Block(Block::default())).unwrap();
        assert_eq!(resolver.resolve_shallow(&conditional), Ok(Node::Blank));
    }

    #[test]
    fn conditional_condition_failure_aborts() {
        let resolver = resolver();
        let conditional = Cell::writable(Node::Conditional(Conditional {
            condition: Cell::writable(Node::code("fail")),
            then: Cell::fixed(Node::truth()),
            otherwise: Some(Cell::fixed(Node::Blank)),
        }));
        assert_eq!(
            resolver.resolve_shallow(&conditional),
            Err(Error::custom("failed on purpose"))
        );
    }

    #[test]
    fn self_reference_hits_the_depth_limit() {
        let resolver = Resolver::new(
            ScopeIndex::new(),
            Rc::new(identifier_evaluator),
            Settings {
                max_resolve_depth: 8,
                ..Settings::default()
            },
        );
        let looping = Cell::writable(Node::code("a"));
        let _root = block_cell(&resolver, vec![("a", looping.clone())], vec![]);

        assert_eq!(resolver.resolve_shallow(&looping), Err(Error::DepthExceeded(8)));
        // The counter unwinds, so unrelated resolutions still work.
        assert_eq!(
            resolver.resolve_shallow(&Cell::fixed(Node::Blank)),
            Ok(Node::Blank)
        );
    }

    #[test]
    fn computed_cell_recomputes_when_a_read_identifier_changes() {
        struct Counting(Rc<std::cell::Cell<usize>>);

        impl Evaluate for Counting {
            fn evaluate(&self, source: &str, env: &Env) -> Result<Node> {
                self.0.set(self.0.get() + 1);
                identifier_evaluator(source, env)
            }
        }

        let evaluations = Rc::new(std::cell::Cell::new(0));
        let resolver = Resolver::new(
            ScopeIndex::new(),
            Rc::new(Counting(evaluations.clone())),
            Settings::default(),
        );
        let x = Cell::writable(Node::number(1.0));
        let code = Cell::writable(Node::code("x"));
        let _root = block_cell(&resolver, vec![("x", x.clone()), ("y", code.clone())], vec![]);

        let computed = resolver.computed(&code);
        assert_eq!(computed.get(), Ok(Node::number(1.0)));
        assert_eq!(computed.get(), Ok(Node::number(1.0)));
        assert_eq!(evaluations.get(), 1);

        x.set(Node::number(2.0)).unwrap();
        assert_eq!(computed.get(), Ok(Node::number(2.0)));
        assert_eq!(evaluations.get(), 2);
    }
}
