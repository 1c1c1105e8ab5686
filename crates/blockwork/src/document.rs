//! A document: a root block under a builtin scope, with one shared scope
//! index and resolver.
//!
//! Cells built through the document are attached to their owners as they
//! are created, so lookups and edits work on them straight away.

use crate::cell::Cell;
use crate::edit;
use crate::error::Result;
use crate::expr::Evaluator;
use crate::node::{Block, Conditional, Function, Node, Primitive, ValueEntry};
use crate::resolve::{Evaluate, Resolver};
use crate::scope::ScopeIndex;
use crate::settings::Settings;
use crate::static_node::Static;
use std::rc::Rc;
use std::sync::Arc;

pub struct Document {
    scope: ScopeIndex,
    resolver: Resolver,
    builtins: Cell,
    root: Cell,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Document {
    /// A document evaluating code with the bundled [`Evaluator`].
    pub fn new(settings: Settings) -> Self {
        Self::with_evaluator(settings, Rc::new(Evaluator::new()))
    }

    pub fn with_evaluator(settings: Settings, evaluator: Rc<dyn Evaluate>) -> Self {
        let scope = ScopeIndex::new();
        let builtins = Cell::writable(Node::Block(Block::default()));
        scope.mark_case_insensitive(&builtins, settings.case_insensitive_builtins);
        let root = Cell::writable(Node::Block(Block::default()));
        scope.attach(&root, &builtins);
        let resolver = Resolver::new(scope.clone(), evaluator, settings);
        Self {
            scope,
            resolver,
            builtins,
            root,
        }
    }

    pub fn root(&self) -> &Cell {
        &self.root
    }

    /// Scope block holding registered functions; the root's parent.
    pub fn builtins(&self) -> &Cell {
        &self.builtins
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn scope(&self) -> &ScopeIndex {
        &self.scope
    }

    pub fn settings(&self) -> &Settings {
        self.resolver.settings()
    }

    /// Bind `function` in the builtin scope under its own name, replacing
    /// any earlier binding of that name.
    pub fn register_function(&self, function: Function) -> Result<Cell> {
        let name: Arc<str> = function.name().into();
        let cell = Cell::fixed(Node::Function(function));
        let builtins = self.builtins.peek()?.expect_block()?.clone();

        let mut values = builtins.values().to_vec();
        match values.iter_mut().find(|entry| entry.key == name) {
            Some(entry) => {
                self.scope.detach(&entry.cell);
                entry.cell = cell.clone();
            }
            None => values.push(ValueEntry::new(name.clone(), cell.clone())),
        }
        self.builtins.set(Node::Block(Block::from_parts(
            values,
            builtins.items().to_vec(),
        )))?;
        self.scope.attach(&cell, &self.builtins);

        log::debug!("registered builtin `{name}`");
        Ok(cell)
    }

    pub fn literal(&self, primitive: Primitive) -> Cell {
        Cell::writable(Node::Literal(primitive))
    }

    pub fn number(&self, number: f64) -> Cell {
        Cell::writable(Node::number(number))
    }

    pub fn text(&self, text: impl Into<Arc<str>>) -> Cell {
        Cell::writable(Node::text(text))
    }

    pub fn blank(&self) -> Cell {
        Cell::writable(Node::Blank)
    }

    pub fn code(&self, source: impl Into<Arc<str>>) -> Cell {
        Cell::writable(Node::code(source))
    }

    pub fn block<K: Into<Arc<str>>>(
        &self,
        values: impl IntoIterator<Item = (K, Cell)>,
        items: impl IntoIterator<Item = Cell>,
    ) -> Result<Cell> {
        Ok(self.block_cell(Block::new(values, items)?))
    }

    /// A writable cell holding `block`, e.g. the output of a transform,
    /// with its children attached.
    pub fn block_cell(&self, block: Block) -> Cell {
        let cell = Cell::writable(Node::Block(block.clone()));
        self.scope.adopt(&cell, &block);
        cell
    }

    pub fn conditional(&self, condition: Cell, then: Cell, otherwise: Option<Cell>) -> Cell {
        let node = Node::Conditional(Conditional {
            condition,
            then,
            otherwise,
        });
        let cell = Cell::writable(node.clone());
        self.scope.adopt_node(&cell, &node);
        cell
    }

    /// Replace the node of a writable cell. Children of the new node are
    /// attached to `cell`; children it no longer holds are detached.
    pub fn set(&self, cell: &Cell, node: Node) -> Result<()> {
        let previous = cell.peek()?;
        cell.set(node.clone())?;

        let kept = children(&node);
        for dropped in children(&previous) {
            if !kept.contains(&dropped) && self.scope.parent_of(&dropped).as_ref() == Some(cell) {
                self.scope.detach(&dropped);
            }
        }
        self.scope.adopt_node(cell, &node);
        Ok(())
    }

    pub fn mark_case_insensitive(&self, cell: &Cell, enabled: bool) {
        self.scope.mark_case_insensitive(cell, enabled);
    }

    pub fn lookup(&self, name: &str, from: &Cell) -> Result<Cell> {
        self.scope.lookup(name, from)
    }

    pub fn resolve_shallow(&self, cell: &Cell) -> Result<Node> {
        self.resolver.resolve_shallow(cell)
    }

    pub fn resolve_deep(&self, cell: &Cell) -> Result<Static> {
        self.resolver.resolve_deep(cell)
    }

    /// Deep resolution of the whole root block.
    pub fn to_static(&self) -> Result<Static> {
        self.resolve_deep(&self.root)
    }

    pub fn computed(&self, cell: &Cell) -> Cell {
        self.resolver.computed(cell)
    }

    // The root sits under the builtin scope for lookups only; it is never
    // one of the builtin block's children, so edits must not look at it.
    fn is_top(&self, cell: &Cell) -> bool {
        *cell == self.root || *cell == self.builtins
    }

    pub fn insert_before(&self, reference: &Cell, child: Cell) -> Result<Cell> {
        if self.is_top(reference) {
            return Ok(reference.clone());
        }
        edit::insert_before(&self.scope, reference, child)
    }

    pub fn insert_after(&self, reference: &Cell, child: Cell) -> Result<Cell> {
        if self.is_top(reference) {
            return Ok(reference.clone());
        }
        edit::insert_after(&self.scope, reference, child)
    }

    pub fn assign_key(&self, child: &Cell, key: &str) -> Result<Cell> {
        if self.is_top(child) {
            return Ok(child.clone());
        }
        edit::assign_key(&self.scope, child, key)
    }

    pub fn remove_key(&self, child: &Cell) -> Result<Cell> {
        if self.is_top(child) {
            return Ok(child.clone());
        }
        edit::remove_key(&self.scope, child)
    }

    pub fn wrap_with_block(&self, child: &Cell) -> Result<Cell> {
        if self.is_top(child) {
            return Ok(child.clone());
        }
        edit::wrap_with_block(&self.scope, child)
    }

    pub fn unwrap_block_if_single_child(&self, wrapper: &Cell) -> Result<Cell> {
        if self.is_top(wrapper) {
            return Ok(wrapper.clone());
        }
        edit::unwrap_block_if_single_child(&self.scope, wrapper)
    }

    pub fn remove_child(&self, child: &Cell) -> Result<Cell> {
        if self.is_top(child) {
            return Ok(child.clone());
        }
        edit::remove_child(&self.scope, child)
    }
}

fn children(node: &Node) -> Vec<Cell> {
    match node {
        Node::Block(block) => block.children().cloned().collect(),
        Node::Conditional(conditional) => conditional.children().cloned().collect(),
        Node::Blank | Node::Literal(_) | Node::Function(_) | Node::Code(_) => Vec::new(),
    }
}
