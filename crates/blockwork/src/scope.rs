//! Parent/scope side table.
//!
//! Blocks never point back at their owners. The owning block cell of every
//! attached child lives here instead, keyed by the child's identity, so a
//! block value stays an immutable snapshot while any child can still answer
//! "who owns me". Case-insensitive scope marks are kept here too because
//! they belong to the cell, not to whichever block value it holds now.

use crate::cell::{Cell, CellId, WeakCell};
use crate::error::{Error, Result};
use crate::node::{Block, Node};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct ScopeIndex {
    table: Rc<RefCell<ScopeTable>>,
}

#[derive(Default)]
struct ScopeTable {
    parents: FxHashMap<CellId, WeakCell>,
    case_insensitive: FxHashSet<CellId>,
}

impl ScopeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `parent` as the owner of `child`, replacing any previous owner.
    pub fn attach(&self, child: &Cell, parent: &Cell) {
        self.table
            .borrow_mut()
            .parents
            .insert(child.id(), parent.downgrade());
    }

    pub fn detach(&self, child: &Cell) {
        self.table.borrow_mut().parents.remove(&child.id());
    }

    pub fn parent_of(&self, child: &Cell) -> Option<Cell> {
        let parent = self.table.borrow().parents.get(&child.id())?.upgrade();
        if parent.is_none() {
            self.detach(child);
        }
        parent
    }

    pub fn has_parent(&self, child: &Cell) -> bool {
        self.parent_of(child).is_some()
    }

    /// Attach every child of `block` to `parent`.
    pub fn adopt(&self, parent: &Cell, block: &Block) {
        let mut table = self.table.borrow_mut();
        for child in block.children() {
            table.parents.insert(child.id(), parent.downgrade());
        }
    }

    /// Attach the direct children of `node`, whatever kind of node owns them.
    pub fn adopt_node(&self, parent: &Cell, node: &Node) {
        match node {
            Node::Block(block) => self.adopt(parent, block),
            Node::Conditional(conditional) => {
                for child in conditional.children() {
                    self.attach(child, parent);
                }
            }
            Node::Blank | Node::Literal(_) | Node::Function(_) | Node::Code(_) => {}
        }
    }

    pub fn mark_case_insensitive(&self, cell: &Cell, enabled: bool) {
        let mut table = self.table.borrow_mut();
        if enabled {
            table.case_insensitive.insert(cell.id());
        } else {
            table.case_insensitive.remove(&cell.id());
        }
    }

    pub fn is_case_insensitive(&self, cell: &Cell) -> bool {
        self.table.borrow().case_insensitive.contains(&cell.id())
    }

    /// Owners of `cell`, nearest first. `cell` itself is not included.
    pub fn ancestors(&self, cell: &Cell) -> Ancestors {
        Ancestors {
            index: self.clone(),
            current: Some(cell.clone()),
        }
    }

    /// Find the cell bound to `name`, walking up from the owner of `from`.
    ///
    /// Each ancestor holding a block is scanned in declaration order; the
    /// first value entry whose key matches exactly, or case-insensitively
    /// when that ancestor is marked so, wins. Ancestors holding anything
    /// other than a block are passed through.
    pub fn lookup(&self, name: &str, from: &Cell) -> Result<Cell> {
        for ancestor in self.ancestors(from) {
            let node = ancestor.get()?;
            let Node::Block(block) = node else {
                continue;
            };
            let case_insensitive = self.is_case_insensitive(&ancestor);
            let found = block.values().iter().find(|entry| {
                &*entry.key == name || (case_insensitive && eq_ignore_case(&entry.key, name))
            });
            if let Some(entry) = found {
                log::trace!("`{name}` bound in {ancestor:?}");
                return Ok(entry.cell.clone());
            }
        }
        Err(Error::UnboundIdentifier(name.to_string()))
    }

    /// Number of recorded parent associations.
    pub fn len(&self) -> usize {
        self.table.borrow().parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

pub struct Ancestors {
    index: ScopeIndex,
    current: Option<Cell>,
}

impl Iterator for Ancestors {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        let current = self.current.take()?;
        let parent = self.index.parent_of(&current)?;
        self.current = Some(parent.clone());
        Some(parent)
    }
}
