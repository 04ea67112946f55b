//! Tagwire message model
//!
//! This crate sits on top of `tagwire-proto` and supplies what generated
//! message code would: schemas, immutable snapshots and mutable builders.
//! It performs no I/O of its own; bytes only enter or leave through the
//! codec at `parse_from` / `to_bytes`.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────┐
//!   │ BuilderTree (arena of builder nodes) │
//!   │ - Clean/Dirty state per node         │
//!   │ - one invalidation per dirty period  │
//!   └──────────────────────────────────────┘
//!                 │ build()
//!                 ↓
//!   ┌──────────────────────────────────────┐
//!   │ Arc<Message> (immutable snapshot)    │
//!   │ - shares storage with its builder    │
//!   └──────────────────────────────────────┘
//!                 │ Encode / parse_from
//!                 ↓
//!   ┌──────────────────────────────────────┐
//!   │ tagwire-proto (WireWriter/WireReader)│
//!   └──────────────────────────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - Static Schemas: a [`MessageType`] is a `static` item describing the
//!   fields; values are a closed [`Value`] enum checked against it
//! - Snapshots Never Change: a built [`Message`] is immutable and can be
//!   shared across threads
//! - Lazy Rebuilds: mutating a builder only marks it (and, once, each
//!   ancestor) dirty; the work happens at the next `build()`
//! - Nothing Is Lost: fields the schema does not recognize are kept and
//!   written back out
//!
//! # Modules
//!
//! - [`schema`]: message types and field declarations
//! - [`value`]: field values
//! - [`fields`]: field storage and decode dispatch
//! - [`message`]: immutable snapshots
//! - [`builder`]: the builder tree
//! - [`error`]: error types

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod builder;
pub mod error;
pub mod fields;
pub mod message;
pub mod schema;
pub mod value;

pub use builder::{BuilderTree, ChildSlot, NodeId, NodeMut, NodeState};
pub use error::FieldError;
pub use fields::{merge_messages, FieldMap, FieldValue};
pub use message::Message;
pub use schema::{Cardinality, FieldKind, FieldSpec, MessageType};
pub use value::Value;
