//! Node model.
//!
//! Nodes are immutable values held by cells. A [`Block`] snapshot can be
//! shared freely; structural edits build a new block and write it back to
//! the owning cell instead of mutating the arrays in place.

use crate::cell::Cell;
use crate::error::{Error, Expected, Result};
use serde::{Serialize, Serializer};
use std::rc::Rc;
use std::sync::Arc;

/// Scalar payload of a literal. There is no `false`: absence of truth is `Blank`.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    True,
    Number(f64),
    Text(Arc<str>),
}

impl Primitive {
    pub fn kind(&self) -> NodeKind {
        match self {
            Primitive::True => NodeKind::True,
            Primitive::Number(_) => NodeKind::Number,
            Primitive::Text(_) => NodeKind::Text,
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Primitive::True => "true".to_string(),
            Primitive::Number(number) => {
                if number.is_finite() && *number == number.trunc() && number.abs() < 1e15 {
                    format!("{}", *number as i64)
                } else {
                    format!("{number}")
                }
            }
            Primitive::Text(text) => text.to_string(),
        }
    }
}

impl Serialize for Primitive {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Primitive::True => serializer.serialize_bool(true),
            Primitive::Number(number) => serializer.serialize_f64(*number),
            Primitive::Text(text) => serializer.serialize_str(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Blank,
    True,
    Number,
    Text,
    Block,
    Function,
    Code,
    Conditional,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            NodeKind::Blank => "blank",
            NodeKind::True => "true",
            NodeKind::Number => "number",
            NodeKind::Text => "text",
            NodeKind::Block => "block",
            NodeKind::Function => "function",
            NodeKind::Code => "code",
            NodeKind::Conditional => "conditional",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Blank,
    Literal(Primitive),
    Block(Block),
    Function(Function),
    /// Unevaluated source text, resolved against the scope of its cell.
    Code(Code),
    /// Unevaluated if/then/else.
    Conditional(Conditional),
}

impl Node {
    pub fn number(number: f64) -> Self {
        Node::Literal(Primitive::Number(number))
    }

    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Node::Literal(Primitive::Text(text.into()))
    }

    pub fn truth() -> Self {
        Node::Literal(Primitive::True)
    }

    /// `true` for `true`, `Blank` for `false`.
    pub fn boolean(value: bool) -> Self {
        if value { Node::truth() } else { Node::Blank }
    }

    pub fn code(source: impl Into<Arc<str>>) -> Self {
        Node::Code(Code::new(source))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Blank => NodeKind::Blank,
            Node::Literal(primitive) => primitive.kind(),
            Node::Block(_) => NodeKind::Block,
            Node::Function(_) => NodeKind::Function,
            Node::Code(_) => NodeKind::Code,
            Node::Conditional(_) => NodeKind::Conditional,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Blank)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Node::Block(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Node::Function(_))
    }

    /// Code and conditionals still need resolution before they have a value.
    pub fn is_unevaluated(&self) -> bool {
        matches!(self, Node::Code(_) | Node::Conditional(_))
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Node::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Node::Literal(Primitive::Number(number)) => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Arc<str>> {
        match self {
            Node::Literal(Primitive::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn expect_literal(&self) -> Result<&Primitive> {
        match self {
            Node::Literal(primitive) => Ok(primitive),
            other => Err(Error::type_mismatch(Expected::Literal, other.kind())),
        }
    }

    pub fn expect_number(&self) -> Result<f64> {
        self.as_number()
            .ok_or_else(|| Error::type_mismatch(Expected::Number, self.kind()))
    }

    pub fn expect_text(&self) -> Result<&Arc<str>> {
        self.as_text()
            .ok_or_else(|| Error::type_mismatch(Expected::Text, self.kind()))
    }

    /// `true` is true and `Blank` is false; anything else is a mismatch.
    pub fn expect_boolean(&self) -> Result<bool> {
        match self {
            Node::Literal(Primitive::True) => Ok(true),
            Node::Blank => Ok(false),
            other => Err(Error::type_mismatch(Expected::Boolean, other.kind())),
        }
    }

    pub fn expect_block(&self) -> Result<&Block> {
        self.as_block()
            .ok_or_else(|| Error::type_mismatch(Expected::Block, self.kind()))
    }

    pub fn expect_function(&self) -> Result<&Function> {
        match self {
            Node::Function(function) => Ok(function),
            other => Err(Error::type_mismatch(Expected::Function, other.kind())),
        }
    }
}

impl From<Primitive> for Node {
    fn from(primitive: Primitive) -> Self {
        Node::Literal(primitive)
    }
}

impl From<Block> for Node {
    fn from(block: Block) -> Self {
        Node::Block(block)
    }
}

impl From<Function> for Node {
    fn from(function: Function) -> Self {
        Node::Function(function)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueEntry {
    pub key: Arc<str>,
    pub cell: Cell,
}

impl ValueEntry {
    pub fn new(key: impl Into<Arc<str>>, cell: Cell) -> Self {
        Self {
            key: key.into(),
            cell,
        }
    }
}

/// Where a child sits inside its block. Indices are 0-based within their partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Value(usize),
    Item(usize),
}

/// Keyed values (unique keys, insertion order) followed by positional items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    values: Rc<Vec<ValueEntry>>,
    items: Rc<Vec<Cell>>,
}

impl Block {
    pub fn new<K: Into<Arc<str>>>(
        values: impl IntoIterator<Item = (K, Cell)>,
        items: impl IntoIterator<Item = Cell>,
    ) -> Result<Self> {
        let mut entries: Vec<ValueEntry> = Vec::new();
        for (key, cell) in values {
            let key = key.into();
            if entries.iter().any(|entry| entry.key == key) {
                return Err(Error::DuplicateKey(key.to_string()));
            }
            entries.push(ValueEntry { key, cell });
        }
        Ok(Self::from_parts(entries, items.into_iter().collect()))
    }

    pub fn from_items(items: impl IntoIterator<Item = Cell>) -> Self {
        Self::from_parts(Vec::new(), items.into_iter().collect())
    }

    /// Callers guarantee the keys are unique.
    pub(crate) fn from_parts(values: Vec<ValueEntry>, items: Vec<Cell>) -> Self {
        debug_assert!(
            values
                .iter()
                .enumerate()
                .all(|(index, entry)| values[..index].iter().all(|other| other.key != entry.key)),
            "duplicate value key"
        );
        Self {
            values: Rc::new(values),
            items: Rc::new(items),
        }
    }

    pub fn values(&self) -> &[ValueEntry] {
        &self.values
    }

    pub fn items(&self) -> &[Cell] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.values.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.values
            .iter()
            .find(|entry| &*entry.key == key)
            .map(|entry| &entry.cell)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Item at a 1-based position.
    pub fn item(&self, position: usize) -> Option<&Cell> {
        position.checked_sub(1).and_then(|index| self.items.get(index))
    }

    /// All children in canonical order: values, then items.
    pub fn children(&self) -> impl Iterator<Item = &Cell> {
        self.values
            .iter()
            .map(|entry| &entry.cell)
            .chain(self.items.iter())
    }

    /// Locate a child by identity.
    pub fn position_of(&self, child: &Cell) -> Option<Position> {
        if let Some(index) = self.values.iter().position(|entry| entry.cell == *child) {
            return Some(Position::Value(index));
        }
        self.items
            .iter()
            .position(|item| item == child)
            .map(Position::Item)
    }

    pub fn canonical_index(&self, position: Position) -> usize {
        match position {
            Position::Value(index) => index,
            Position::Item(index) => self.values.len() + index,
        }
    }
}

#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    call: Rc<dyn Fn(&[Cell]) -> Result<Cell>>,
}

impl Function {
    pub fn new(
        name: impl Into<Arc<str>>,
        call: impl Fn(&[Cell]) -> Result<Cell> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            call: Rc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, arguments: &[Cell]) -> Result<Cell> {
        (self.call)(arguments)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.call) as *const () == Rc::as_ptr(&other.call) as *const ()
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    source: Arc<str>,
}

impl Code {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &Arc<str> {
        &self.source
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub condition: Cell,
    pub then: Cell,
    /// A missing else branch resolves to `Blank`.
    pub otherwise: Option<Cell>,
}

impl Conditional {
    pub fn children(&self) -> impl Iterator<Item = &Cell> {
        [&self.condition, &self.then]
            .into_iter()
            .chain(self.otherwise.as_ref())
    }
}
