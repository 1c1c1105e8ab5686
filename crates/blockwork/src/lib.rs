//! Reactive block documents.
//!
//! A document is a tree of [`Cell`]s. Each cell holds a [`Node`]: blank, a
//! literal, a [`Block`] of keyed values followed by positional items, a
//! function, or unevaluated code and conditionals that are resolved lazily
//! against the enclosing blocks. Parent links live in a side table
//! ([`ScopeIndex`]) so block values stay immutable snapshots.

pub mod cell;
pub mod document;
pub mod edit;
pub mod error;
pub mod expr;
pub mod node;
pub mod reactive;
pub mod resolve;
pub mod scope;
pub mod settings;
pub mod static_node;
pub mod transform;

pub use cell::{Cell, CellId, WeakCell};
pub use document::Document;
pub use error::{Error, Expected, Result};
pub use expr::Evaluator;
pub use node::{Block, Code, Conditional, Function, Node, NodeKind, Position, Primitive, ValueEntry};
pub use resolve::{Env, Evaluate, Resolver};
pub use scope::ScopeIndex;
pub use settings::Settings;
pub use static_node::{Static, StaticBlock};
pub use transform::{
    CanonicalEntry, EntryId, KeySelector, block_filter, block_map, block_reduce, block_sort,
    canonical_entries, numbers_opt, texts_opt,
};
