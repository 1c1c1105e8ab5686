//! Block transforms over canonical entries.
//!
//! A value entry is identified by its key, an item by its 1-based position
//! among the items. Transforms that produce blocks keep each entry's kind:
//! values stay values under the same key, items stay items.

use crate::cell::Cell;
use crate::error::{Error, Expected, Result};
use crate::node::{Block, Node, Primitive, ValueEntry};
use crate::resolve::Resolver;
use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryId {
    Key(Arc<str>),
    /// 1-based.
    Position(usize),
}

impl EntryId {
    pub fn to_node(&self) -> Node {
        match self {
            EntryId::Key(key) => Node::text(key.clone()),
            EntryId::Position(position) => Node::number(*position as f64),
        }
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EntryId::Key(key) => write!(f, "{key}"),
            EntryId::Position(position) => write!(f, "{position}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEntry {
    pub id: EntryId,
    pub cell: Cell,
}

impl CanonicalEntry {
    /// The id as a fixed cell, the form transform callbacks receive it in.
    pub fn id_cell(&self) -> Cell {
        Cell::fixed(self.id.to_node())
    }
}

pub fn canonical_entries(block: &Block) -> Vec<CanonicalEntry> {
    let values = block.values().iter().map(|entry| CanonicalEntry {
        id: EntryId::Key(entry.key.clone()),
        cell: entry.cell.clone(),
    });
    let items = block
        .items()
        .iter()
        .enumerate()
        .map(|(index, item)| CanonicalEntry {
            id: EntryId::Position(index + 1),
            cell: item.clone(),
        });
    values.chain(items).collect()
}

/// Rebuild a block from entries taken out of one source block, so keys
/// are already unique. Relative order within each kind is kept.
fn from_entries(entries: impl IntoIterator<Item = CanonicalEntry>) -> Block {
    let mut values = Vec::new();
    let mut items = Vec::new();
    for CanonicalEntry { id, cell } in entries {
        match id {
            EntryId::Key(key) => values.push(ValueEntry { key, cell }),
            EntryId::Position(_) => items.push(cell),
        }
    }
    Block::from_parts(values, items)
}

/// Lazily map every entry. Each child of the result is a derived cell that
/// calls `f(value, id)` and shallowly resolves the returned cell where that
/// cell lives, so code handed back by `f` runs in its own scope. The derived
/// cell recomputes when anything it read changes.
pub fn block_map<F>(resolver: &Resolver, block: &Block, f: F) -> Block
where
    F: Fn(&Cell, &Cell) -> Result<Cell> + 'static,
{
    let f = Rc::new(f);
    from_entries(canonical_entries(block).into_iter().map(|entry| {
        let id_cell = entry.id_cell();
        let CanonicalEntry { id, cell } = entry;
        let (f, resolver) = (f.clone(), resolver.clone());
        let mapped = Cell::derived(move || {
            let result = f(&cell, &id_cell)?;
            resolver.detached(|| resolver.resolve_shallow(&result))
        });
        CanonicalEntry { id, cell: mapped }
    }))
}

/// Keep the entries `predicate` accepts. Evaluated once, now.
pub fn block_filter<P>(block: &Block, mut predicate: P) -> Result<Block>
where
    P: FnMut(&Cell, &Cell) -> Result<bool>,
{
    let mut kept = Vec::new();
    for entry in canonical_entries(block) {
        if predicate(&entry.cell, &entry.id_cell())? {
            kept.push(entry);
        }
    }
    Ok(from_entries(kept))
}

/// Left fold in canonical order. Without an `init` (one resolving to `Blank`
/// counts as none) the first entry seeds the accumulator and `reducer` is not
/// called for it.
pub fn block_reduce<R>(
    resolver: &Resolver,
    block: &Block,
    mut reducer: R,
    init: Option<&Cell>,
) -> Result<Cell>
where
    R: FnMut(&Cell, &Cell, &Cell) -> Result<Cell>,
{
    let init = match init {
        Some(init) if !resolver.resolve_shallow(init)?.is_blank() => Some(init.clone()),
        _ => None,
    };
    let mut entries = canonical_entries(block).into_iter();
    let mut accumulator = match init.or_else(|| entries.next().map(|first| first.cell)) {
        Some(accumulator) => accumulator,
        None => return Ok(Cell::fixed(Node::Blank)),
    };
    for entry in entries {
        accumulator = reducer(&accumulator, &entry.cell, &entry.id_cell())?;
    }
    Ok(accumulator)
}

pub type KeySelector<'a> = &'a dyn Fn(&Cell, &Cell) -> Result<Cell>;

enum SortValue {
    Number(f64),
    Text(String),
    Other,
}

struct SortKey {
    rank: u8,
    value: SortValue,
    index: usize,
}

impl SortKey {
    fn new(node: &Node, index: usize) -> Self {
        let (rank, value) = match node {
            Node::Literal(Primitive::Number(number)) => (0, SortValue::Number(*number)),
            Node::Literal(Primitive::Text(text)) => (1, SortValue::Text(text.to_lowercase())),
            Node::Literal(Primitive::True) => (2, SortValue::Other),
            Node::Blank => (4, SortValue::Other),
            _ => (3, SortValue::Other),
        };
        Self { rank, value, index }
    }

    fn compare(&self, other: &Self) -> Ordering {
        let by_value = match (&self.value, &other.value) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        };
        self.rank
            .cmp(&other.rank)
            .then(by_value)
            .then(self.index.cmp(&other.index))
    }
}

/// Stable sort by each entry's resolved node, or by the resolved node of
/// `key(value, id)`. Numbers sort before text, text before `true`, `true`
/// before other values, and `Blank` last. Text compares case-insensitively.
///
/// The order is sorted per kind, not across the whole block: values and
/// items keep their kind, so the sorted sequence is split back into sorted
/// values followed by sorted items. `{a: 5}` with items `[3]` stays
/// `{a: 5}` then `[3]`.
pub fn block_sort(resolver: &Resolver, block: &Block, key: Option<KeySelector<'_>>) -> Result<Block> {
    let mut keyed = Vec::with_capacity(block.len());
    for (index, entry) in canonical_entries(block).into_iter().enumerate() {
        let node = match key {
            Some(key) => resolver.resolve_shallow(&key(&entry.cell, &entry.id_cell())?)?,
            None => resolver.resolve_shallow(&entry.cell)?,
        };
        keyed.push((SortKey::new(&node, index), entry));
    }
    keyed.sort_by(|(a, _), (b, _)| a.compare(b));
    Ok(from_entries(keyed.into_iter().map(|(_, entry)| entry)))
}

/// Numbers of every entry, skipping `Blank`s.
pub fn numbers_opt(resolver: &Resolver, block: &Block) -> Result<Vec<f64>> {
    let mut numbers = Vec::new();
    for child in block.children() {
        match resolver.resolve_shallow(child)? {
            Node::Blank => {}
            Node::Literal(Primitive::Number(number)) => numbers.push(number),
            other => return Err(Error::type_mismatch(Expected::NumberOrBlank, other.kind())),
        }
    }
    Ok(numbers)
}

/// Texts of every entry, skipping `Blank`s.
pub fn texts_opt(resolver: &Resolver, block: &Block) -> Result<Vec<Arc<str>>> {
    let mut texts = Vec::new();
    for child in block.children() {
        match resolver.resolve_shallow(child)? {
            Node::Blank => {}
            Node::Literal(Primitive::Text(text)) => texts.push(text),
            other => return Err(Error::type_mismatch(Expected::TextOrBlank, other.kind())),
        }
    }
    Ok(texts)
}
