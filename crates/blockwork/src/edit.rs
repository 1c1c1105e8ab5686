//! Structural edits.
//!
//! Every edit follows the same steps: find the owning block cell through the
//! [`ScopeIndex`], read its current block, locate the target by identity,
//! build a new block and write it back with `set`. Blocks are never mutated
//! in place.
//!
//! Each edit returns the cell that should receive focus next. Edits whose
//! preconditions do not hold (root target, key collision, wrapper that is not
//! a single-item block) are silent no-ops that return the target unchanged.

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::node::{Block, Node, Position, ValueEntry};
use crate::scope::ScopeIndex;

struct Located {
    parent: Cell,
    block: Block,
    position: Position,
}

fn locate(scope: &ScopeIndex, child: &Cell) -> Result<Option<Located>> {
    let Some(parent) = scope.parent_of(child) else {
        return Ok(None);
    };
    let Node::Block(block) = parent.peek()? else {
        log::debug!("{child:?} is owned by non-block {parent:?}, nothing to edit");
        return Ok(None);
    };
    let Some(position) = block.position_of(child) else {
        log::warn!("{child:?} is recorded under {parent:?} but is not among its children");
        return Ok(None);
    };
    Ok(Some(Located {
        parent,
        block,
        position,
    }))
}

fn replace_at(block: &Block, position: Position, replacement: Cell) -> Block {
    let mut values = block.values().to_vec();
    let mut items = block.items().to_vec();
    match position {
        Position::Value(index) => values[index].cell = replacement,
        Position::Item(index) => items[index] = replacement,
    }
    Block::from_parts(values, items)
}

fn remove_at(block: &Block, position: Position) -> Block {
    let mut values = block.values().to_vec();
    let mut items = block.items().to_vec();
    match position {
        Position::Value(index) => {
            values.remove(index);
        }
        Position::Item(index) => {
            items.remove(index);
        }
    }
    Block::from_parts(values, items)
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Before,
    After,
}

pub fn insert_before(scope: &ScopeIndex, reference: &Cell, child: Cell) -> Result<Cell> {
    insert_adjacent(scope, reference, child, Side::Before)
}

pub fn insert_after(scope: &ScopeIndex, reference: &Cell, child: Cell) -> Result<Cell> {
    insert_adjacent(scope, reference, child, Side::After)
}

/// Insert `child` as an item next to `reference`. Values and items are
/// separate orderings, so a value-entry reference puts the new item at the
/// front of the items regardless of side.
///
/// A child that already sits in a block is moved: it is removed from its
/// current block first, so it never has two owners. A cell cannot be
/// inserted next to itself or inside its own subtree.
fn insert_adjacent(scope: &ScopeIndex, reference: &Cell, child: Cell, side: Side) -> Result<Cell> {
    if child == *reference || scope.ancestors(reference).any(|ancestor| ancestor == child) {
        log::debug!("{child:?} cannot be inserted next to itself or inside itself");
        return Ok(reference.clone());
    }
    let Some(target) = locate(scope, reference)? else {
        return Ok(reference.clone());
    };
    if !target.parent.is_writable() {
        return Err(Error::ReadOnlyCell);
    }

    if let Some(Located {
        parent: owner,
        block,
        position,
    }) = locate(scope, &child)?
    {
        owner.set(Node::Block(remove_at(&block, position)))?;
        scope.detach(&child);
        log::debug!("moved {child:?} out of {owner:?}");
    }

    // The move may have changed the reference's block.
    let Some(Located {
        parent,
        block,
        position,
    }) = locate(scope, reference)?
    else {
        return Ok(reference.clone());
    };

    let index = match (position, side) {
        (Position::Value(_), _) => 0,
        (Position::Item(index), Side::Before) => index,
        (Position::Item(index), Side::After) => index + 1,
    };
    let mut items = block.items().to_vec();
    items.insert(index, child.clone());
    parent.set(Node::Block(Block::from_parts(block.values().to_vec(), items)))?;
    scope.attach(&child, &parent);

    log::debug!("inserted {child:?} {side:?} {reference:?} at item {index}");
    Ok(child)
}

/// Give `child` the value key `key`, keeping its identity and children.
/// An item moves to the end of the values; a value is renamed in place.
/// A key already used by a sibling leaves the block untouched.
pub fn assign_key(scope: &ScopeIndex, child: &Cell, key: &str) -> Result<Cell> {
    let Some(Located {
        parent,
        block,
        position,
    }) = locate(scope, child)?
    else {
        return Ok(child.clone());
    };
    if block.contains_key(key) {
        log::debug!("key `{key}` already taken in {parent:?}, {child:?} unchanged");
        return Ok(child.clone());
    }

    let mut values = block.values().to_vec();
    let mut items = block.items().to_vec();
    match position {
        Position::Value(index) => values[index].key = key.into(),
        Position::Item(index) => {
            items.remove(index);
            values.push(ValueEntry::new(key, child.clone()));
        }
    }
    parent.set(Node::Block(Block::from_parts(values, items)))?;

    log::debug!("assigned key `{key}` to {child:?}");
    Ok(child.clone())
}

/// Turn a value entry back into an item at the front of the items.
pub fn remove_key(scope: &ScopeIndex, child: &Cell) -> Result<Cell> {
    let Some(Located {
        parent,
        block,
        position: Position::Value(index),
    }) = locate(scope, child)?
    else {
        return Ok(child.clone());
    };

    let mut values = block.values().to_vec();
    let entry = values.remove(index);
    let mut items = block.items().to_vec();
    items.insert(0, entry.cell);
    parent.set(Node::Block(Block::from_parts(values, items)))?;

    log::debug!("removed key `{}` from {child:?}", entry.key);
    Ok(child.clone())
}

/// Replace `child` with a new block cell whose only item is `child`.
pub fn wrap_with_block(scope: &ScopeIndex, child: &Cell) -> Result<Cell> {
    let Some(Located {
        parent,
        block,
        position,
    }) = locate(scope, child)?
    else {
        return Ok(child.clone());
    };

    let wrapper = Cell::writable(Node::Block(Block::from_items([child.clone()])));
    parent.set(Node::Block(replace_at(&block, position, wrapper.clone())))?;
    scope.attach(&wrapper, &parent);
    scope.attach(child, &wrapper);

    log::debug!("wrapped {child:?} in {wrapper:?}");
    Ok(child.clone())
}

/// Replace `wrapper` with its sole item when it holds a block with no
/// values and exactly one item.
pub fn unwrap_block_if_single_child(scope: &ScopeIndex, wrapper: &Cell) -> Result<Cell> {
    let Node::Block(inner) = wrapper.peek()? else {
        return Ok(wrapper.clone());
    };
    let ([], [item]) = (inner.values(), inner.items()) else {
        return Ok(wrapper.clone());
    };
    let Some(Located {
        parent,
        block,
        position,
    }) = locate(scope, wrapper)?
    else {
        return Ok(wrapper.clone());
    };

    parent.set(Node::Block(replace_at(&block, position, item.clone())))?;
    scope.attach(item, &parent);
    scope.detach(wrapper);

    log::debug!("unwrapped {item:?} from {wrapper:?}");
    Ok(item.clone())
}

/// Remove `child` from its block. Focus goes to the previous sibling in
/// canonical order, else the next one, else the parent.
pub fn remove_child(scope: &ScopeIndex, child: &Cell) -> Result<Cell> {
    let Some(Located {
        parent,
        block,
        position,
    }) = locate(scope, child)?
    else {
        return Ok(child.clone());
    };

    let index = block.canonical_index(position);
    let focus = index
        .checked_sub(1)
        .and_then(|previous| block.children().nth(previous))
        .or_else(|| block.children().nth(index + 1))
        .cloned()
        .unwrap_or_else(|| parent.clone());

    parent.set(Node::Block(remove_at(&block, position)))?;
    scope.detach(child);

    log::debug!("removed {child:?} from {parent:?}, focus {focus:?}");
    Ok(focus)
}
