//! Cells: identity-stable child slots.
//!
//! A cell is the unit of identity for parenthood, focus and mutation. Two
//! handles are equal when they point at the same slot, never because the
//! nodes they currently hold are equal.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::reactive::{Memo, Signal};
use std::rc::{Rc, Weak};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(Ulid);

impl CellId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
pub struct Cell {
    inner: Rc<CellInner>,
}

struct CellInner {
    id: CellId,
    source: CellSource,
}

enum CellSource {
    /// Read-only, the node never changes.
    Fixed(Node),
    Writable(Signal<Node>),
    /// Read-only, recomputed lazily from whatever it reads.
    Derived(Memo<Result<Node>>),
}

impl Cell {
    fn with_source(source: CellSource) -> Self {
        Self {
            inner: Rc::new(CellInner {
                id: CellId::new(),
                source,
            }),
        }
    }

    pub fn fixed(node: Node) -> Self {
        Self::with_source(CellSource::Fixed(node))
    }

    pub fn writable(node: Node) -> Self {
        Self::with_source(CellSource::Writable(Signal::new(node)))
    }

    pub fn derived(compute: impl Fn() -> Result<Node> + 'static) -> Self {
        Self::with_source(CellSource::Derived(Memo::new(compute)))
    }

    pub fn id(&self) -> CellId {
        self.inner.id
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.inner.source, CellSource::Writable(_))
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.inner.source, CellSource::Derived(_))
    }

    /// Current node; subscribes the current observer. A derived cell read
    /// from inside its own computation fails with [`Error::Cycle`].
    pub fn get(&self) -> Result<Node> {
        match &self.inner.source {
            CellSource::Fixed(node) => Ok(node.clone()),
            CellSource::Writable(signal) => Ok(signal.get()),
            CellSource::Derived(memo) => memo.try_get().unwrap_or(Err(Error::Cycle)),
        }
    }

    /// Current node without creating a dependency.
    pub fn peek(&self) -> Result<Node> {
        match &self.inner.source {
            CellSource::Fixed(node) => Ok(node.clone()),
            CellSource::Writable(signal) => Ok(signal.peek()),
            CellSource::Derived(memo) => memo.try_peek().unwrap_or(Err(Error::Cycle)),
        }
    }

    pub fn set(&self, node: Node) -> Result<()> {
        match &self.inner.source {
            CellSource::Writable(signal) => {
                signal.set(node);
                Ok(())
            }
            CellSource::Fixed(_) | CellSource::Derived(_) => Err(Error::ReadOnlyCell),
        }
    }

    pub fn downgrade(&self) -> WeakCell {
        WeakCell {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Cell {}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let kind = match self.inner.source {
            CellSource::Fixed(_) => "fixed",
            CellSource::Writable(_) => "writable",
            CellSource::Derived(_) => "derived",
        };
        write!(f, "Cell({kind} {})", self.inner.id)
    }
}

/// Non-owning cell handle, used by the parent side table.
#[derive(Clone)]
pub struct WeakCell {
    id: CellId,
    inner: Weak<CellInner>,
}

impl WeakCell {
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Cell> {
        self.inner.upgrade().map(|inner| Cell { inner })
    }
}

impl std::fmt::Debug for WeakCell {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "WeakCell({})", self.id)
    }
}
