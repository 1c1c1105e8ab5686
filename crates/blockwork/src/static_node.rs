//! Fully resolved, error-tolerant mirror of a document.
//!
//! A [`Static::Error`] marks the one position where resolution failed; its
//! siblings and ancestors still carry concrete values.

use crate::node::Primitive;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Static {
    Blank,
    Primitive(Primitive),
    Block(StaticBlock),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StaticBlock {
    pub values: Vec<(Arc<str>, Static)>,
    pub items: Vec<Static>,
}

impl StaticBlock {
    pub fn len(&self) -> usize {
        self.values.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&Static> {
        self.values
            .iter()
            .find(|(existing, _)| &**existing == key)
            .map(|(_, value)| value)
    }

    /// Item at a 1-based position.
    pub fn item(&self, position: usize) -> Option<&Static> {
        position.checked_sub(1).and_then(|index| self.items.get(index))
    }
}

impl Static {
    pub fn number(number: f64) -> Self {
        Static::Primitive(Primitive::Number(number))
    }

    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Static::Primitive(Primitive::Text(text.into()))
    }

    pub fn truth() -> Self {
        Static::Primitive(Primitive::True)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Static::Error(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Static::Primitive(Primitive::Number(number)) => Some(*number),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&StaticBlock> {
        match self {
            Static::Block(block) => Some(block),
            _ => None,
        }
    }

    /// Blank, errors, empty blocks, zero, NaN and empty text are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Static::Blank | Static::Error(_) => false,
            Static::Primitive(Primitive::True) => true,
            Static::Primitive(Primitive::Number(number)) => *number != 0.0 && !number.is_nan(),
            Static::Primitive(Primitive::Text(text)) => !text.is_empty(),
            Static::Block(block) => !block.is_empty(),
        }
    }

    /// JSON rendering: values become object members in declaration order,
    /// items go under `"items"`, errors become `{"error": message}`. When a
    /// value is itself keyed `items`, the array moves to the first free key
    /// of `_items`, `__items`, ... so neither side is lost.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Map, Value, json};
        match self {
            Static::Blank => Value::Null,
            Static::Primitive(Primitive::True) => Value::Bool(true),
            Static::Primitive(Primitive::Number(number)) => json!(number),
            Static::Primitive(Primitive::Text(text)) => Value::String(text.to_string()),
            Static::Error(message) => json!({ "error": message }),
            Static::Block(block) => {
                let mut object = Map::new();
                for (key, value) in &block.values {
                    object.insert(key.to_string(), value.to_json());
                }
                if !block.items.is_empty() {
                    let mut key = "items".to_string();
                    while object.contains_key(&key) {
                        key.insert(0, '_');
                    }
                    object.insert(
                        key,
                        Value::Array(block.items.iter().map(Static::to_json).collect()),
                    );
                }
                Value::Object(object)
            }
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Static::Blank => String::new(),
            Static::Primitive(primitive) => primitive.to_display_string(),
            Static::Error(message) => format!("<error: {message}>"),
            Static::Block(block) => {
                let entries: Vec<_> = block
                    .values
                    .iter()
                    .map(|(key, value)| format!("{key}: {}", value.to_display_string()))
                    .chain(block.items.iter().map(Static::to_display_string))
                    .collect();
                format!("[{}]", entries.join(", "))
            }
        }
    }
}

impl std::fmt::Display for Static {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}
