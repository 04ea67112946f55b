//! Copy-on-write builder tree.
//!
//! Builders live in a [`BuilderTree`] arena and are addressed by
//! [`NodeId`] handles. A node for an embedded message field records its
//! parent as a plain handle, so the tree holds no reference cycles and
//! dropping the arena drops everything.
//!
//! # State Machine
//!
//! ```text
//!            setter / child notification
//!  ┌───────┐ ──────────────────────────> ┌───────┐
//!  │ Clean │                              │ Dirty │ ── further setters: no-op
//!  └───────┘ <────────────────────────── └───────┘
//!                      build()
//! ```
//!
//! - **Clean**: the cached snapshot matches the node's fields exactly;
//!   [`BuilderTree::build`] returns it without doing any work.
//! - **Dirty**: something changed since the snapshot was cached.
//!
//! Only the Clean → Dirty transition notifies the parent, which runs the
//! same transition on itself. A burst of mutations on a deeply nested
//! builder therefore costs one notification per ancestor, not one per
//! mutation.
//!
//! # Copy-on-Write
//!
//! A built snapshot shares the node's field storage. The next mutation
//! copies the storage once (`Arc::make_mut`) and every later mutation until
//! the next build is in place. Snapshots already handed out never change.

use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use tagwire_proto::{Encode, UnknownFieldSet};

use crate::{
    error::{FieldError, Result},
    fields::FieldMap,
    message::Message,
    schema::{FieldSpec, MessageType},
    value::Value,
};

/// Handle to a builder node. Handles of removed nodes are detected and
/// rejected with [`FieldError::StaleNode`], even after their slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Whether a node's cached snapshot is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Cached snapshot reflects the current fields
    Clean,
    /// Fields changed since the snapshot was cached
    Dirty,
}

/// Field (and element, for repeated fields) a child builder fills in its
/// parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChildSlot {
    /// Field number in the parent
    pub field: u32,
    /// Element index for repeated fields
    pub index: Option<usize>,
}

impl ChildSlot {
    const fn single(field: u32) -> Self {
        Self { field, index: None }
    }

    const fn element(field: u32, index: usize) -> Self {
        Self { field, index: Some(index) }
    }
}

#[derive(Debug)]
struct Node {
    ty: &'static MessageType,
    fields: Arc<FieldMap>,
    unknown: Arc<UnknownFieldSet>,
    cached: Arc<Message>,
    state: NodeState,
    parent: Option<(NodeId, ChildSlot)>,
    children: BTreeMap<ChildSlot, NodeId>,
    invalidations: u64,
}

impl Node {
    fn from_snapshot(snapshot: &Arc<Message>, parent: Option<(NodeId, ChildSlot)>) -> Self {
        Self {
            ty: snapshot.message_type(),
            fields: Arc::clone(snapshot.shared_fields()),
            unknown: Arc::clone(snapshot.shared_unknown()),
            cached: Arc::clone(snapshot),
            state: NodeState::Clean,
            parent,
            children: BTreeMap::new(),
            invalidations: 0,
        }
    }

    fn spec(&self, field: u32) -> Result<&'static FieldSpec> {
        self.ty.spec(field)
    }

    fn fields_mut(&mut self) -> &mut FieldMap {
        Arc::make_mut(&mut self.fields)
    }

    /// Write a child's snapshot into the slot it fills, unless the slot
    /// already holds that exact snapshot
    fn store_child(&mut self, slot: ChildSlot, built: Arc<Message>) -> Result<()> {
        let current = match slot.index {
            None => self.fields.single(slot.field),
            Some(index) => self.fields.repeated(slot.field).get(index),
        };
        if matches!(current, Some(Value::Message(m)) if Arc::ptr_eq(m, &built)) {
            return Ok(());
        }
        let spec = self.spec(slot.field)?;
        match slot.index {
            None => self.fields_mut().set(spec, Value::Message(built)),
            Some(index) => self.fields_mut().set_repeated(spec, index, Value::Message(built)),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of builder nodes.
///
/// Every operation takes the [`NodeId`] of the node it acts on. Mutations
/// validate against the node's schema before touching anything, so a
/// failed call leaves the tree unchanged.
#[derive(Debug, Default)]
pub struct BuilderTree {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl BuilderTree {
    /// Empty arena
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live builder nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if no node is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// True if `id` refers to a live node
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    // Arena plumbing

    fn insert(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return NodeId { index, generation: slot.generation };
        }
        self.slots.push(Slot { generation: 0, node: Some(node) });
        NodeId { index: self.slots.len() - 1, generation: 0 }
    }

    fn get(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(FieldError::StaleNode)
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(FieldError::StaleNode)
    }

    /// Free `id` and every node below it
    fn free_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(slot) = self.slots.get_mut(id.index) else { continue };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.live -= 1;
                pending.extend(node.children.into_values());
            }
        }
    }

    /// Cut the child filling `slot` of `parent` loose. The child keeps its
    /// contents and becomes a root.
    fn detach(&mut self, parent: NodeId, slot: ChildSlot) -> Result<bool> {
        let Some(child) = self.get_mut(parent)?.children.remove(&slot) else {
            return Ok(false);
        };
        if let Ok(node) = self.get_mut(child) {
            node.parent = None;
        }
        tracing::trace!(?parent, ?child, field = slot.field, "detached child builder");
        Ok(true)
    }

    // Dirty propagation

    fn mark_dirty(&mut self, id: NodeId) -> Result<()> {
        let node = self.get_mut(id)?;
        if node.state == NodeState::Dirty {
            return Ok(());
        }
        node.state = NodeState::Dirty;
        tracing::trace!(node = ?id, "builder became dirty");
        match node.parent {
            Some((parent, _)) => self.notify_parent(parent),
            None => Ok(()),
        }
    }

    fn notify_parent(&mut self, parent: NodeId) -> Result<()> {
        let node = self.get_mut(parent)?;
        node.invalidations += 1;
        tracing::trace!(?parent, invalidations = node.invalidations, "parent invalidated");
        self.mark_dirty(parent)
    }

    // Creation

    /// New root builder holding the default instance of `ty`
    pub fn new_builder(&mut self, ty: &'static MessageType) -> NodeId {
        self.insert(Node::from_snapshot(&ty.default_instance(), None))
    }

    /// New root builder starting from `message`. No field is copied until
    /// the builder is mutated.
    pub fn builder_from(&mut self, message: &Arc<Message>) -> NodeId {
        self.insert(Node::from_snapshot(message, None))
    }

    /// Builder for singular message field `field` of `node`.
    ///
    /// Returns the existing child builder if there is one. Otherwise the
    /// child starts from the field's current value; an unset field is first
    /// set to the empty message, which counts as a mutation of `node`.
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`], [`FieldError::NotSingular`] or
    /// [`FieldError::NotMessage`] if the field does not qualify.
    pub fn nested_builder(&mut self, node: NodeId, field: u32) -> Result<NodeId> {
        let slot = ChildSlot::single(field);
        let parent = self.get_mut(node)?;
        if let Some(&child) = parent.children.get(&slot) {
            return Ok(child);
        }
        let spec = parent.spec(field)?;
        spec.expect_singular()?;
        let ty = spec.expect_message()?;

        let current = parent.fields.single(field).and_then(Value::as_message).map(Arc::clone);
        let start = match current {
            Some(current) => current,
            None => {
                let empty = ty.default_instance();
                parent.fields_mut().set(spec, Value::Message(Arc::clone(&empty)))?;
                self.mark_dirty(node)?;
                empty
            },
        };
        Ok(self.attach(node, slot, &start))
    }

    /// Builder for element `index` of repeated message field `field`.
    ///
    /// # Errors
    ///
    /// [`FieldError::NotRepeated`], [`FieldError::NotMessage`] or
    /// [`FieldError::IndexOutOfRange`] if there is no such element.
    pub fn repeated_builder(&mut self, node: NodeId, field: u32, index: usize) -> Result<NodeId> {
        let slot = ChildSlot::element(field, index);
        let parent = self.get(node)?;
        if let Some(&child) = parent.children.get(&slot) {
            return Ok(child);
        }
        let spec = parent.spec(field)?;
        spec.expect_repeated()?;
        spec.expect_message()?;

        let elements = parent.fields.repeated(field);
        let start = match elements.get(index) {
            Some(Value::Message(current)) => Arc::clone(current),
            _ => {
                return Err(FieldError::IndexOutOfRange {
                    number: field,
                    index,
                    len: elements.len(),
                })
            },
        };
        Ok(self.attach(node, slot, &start))
    }

    /// Append an empty message to repeated field `field` and return a
    /// builder for it.
    ///
    /// # Errors
    ///
    /// [`FieldError::NotRepeated`] or [`FieldError::NotMessage`].
    pub fn add_builder(&mut self, node: NodeId, field: u32) -> Result<NodeId> {
        let parent = self.get_mut(node)?;
        let spec = parent.spec(field)?;
        spec.expect_repeated()?;
        let empty = spec.expect_message()?.default_instance();
        parent.fields_mut().push(spec, Value::Message(Arc::clone(&empty)))?;
        let index = parent.fields.repeated(field).len() - 1;
        self.mark_dirty(node)?;
        Ok(self.attach(node, ChildSlot::element(field, index), &empty))
    }

    fn attach(&mut self, parent: NodeId, slot: ChildSlot, start: &Arc<Message>) -> NodeId {
        let child = self.insert(Node::from_snapshot(start, Some((parent, slot))));
        if let Ok(node) = self.get_mut(parent) {
            node.children.insert(slot, child);
        }
        tracing::trace!(?parent, ?child, field = slot.field, "attached child builder");
        child
    }

    // Mutation

    /// Set singular field `field`. A child builder for the field is
    /// detached first.
    ///
    /// A detached child builder stays live in the tree as a root, keeping its
    /// contents, until it is passed to [`BuilderTree::remove`].
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`], [`FieldError::NotSingular`] or
    /// [`FieldError::KindMismatch`]; nothing changes on error.
    pub fn set(&mut self, node: NodeId, field: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let target = self.get_mut(node)?;
        let spec = target.spec(field)?;
        target.fields_mut().set(spec, value)?;
        self.detach(node, ChildSlot::single(field))?;
        self.mark_dirty(node)
    }

    /// Set singular message field `field` to `message`, detaching any child
    /// builder as [`BuilderTree::set`] does.
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::set`], plus [`FieldError::NotMessage`].
    pub fn set_message(&mut self, node: NodeId, field: u32, message: Arc<Message>) -> Result<()> {
        self.get(node)?.spec(field)?.expect_message()?;
        self.set(node, field, Value::Message(message))
    }

    /// Append `value` to repeated field `field`.
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`], [`FieldError::NotRepeated`] or
    /// [`FieldError::KindMismatch`].
    pub fn push(&mut self, node: NodeId, field: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let target = self.get_mut(node)?;
        let spec = target.spec(field)?;
        target.fields_mut().push(spec, value)?;
        self.mark_dirty(node)
    }

    /// Replace element `index` of repeated field `field`. A child builder
    /// for that element is detached first; see [`BuilderTree::set`].
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::push`], plus [`FieldError::IndexOutOfRange`].
    pub fn set_repeated(
        &mut self,
        node: NodeId,
        field: u32,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        let target = self.get_mut(node)?;
        let spec = target.spec(field)?;
        target.fields_mut().set_repeated(spec, index, value)?;
        self.detach(node, ChildSlot::element(field, index))?;
        self.mark_dirty(node)
    }

    /// Unset field `field`, detaching any child builders filling it. Does
    /// nothing (and leaves the node's state alone) if the field was not set.
    ///
    /// A detached child builder stays live in the tree as a root, keeping its
    /// contents, until it is passed to [`BuilderTree::remove`].
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`].
    pub fn clear_field(&mut self, node: NodeId, field: u32) -> Result<()> {
        let target = self.get_mut(node)?;
        target.spec(field)?;
        let slots: Vec<ChildSlot> =
            target.children.keys().copied().filter(|slot| slot.field == field).collect();
        let removed = target.fields.contains(field) && target.fields_mut().remove(field).is_some();
        let mut changed = removed;
        for slot in slots {
            changed |= self.detach(node, slot)?;
        }
        if changed {
            self.mark_dirty(node)?;
        }
        Ok(())
    }

    /// Merge `other` into `node`: scalars set in `other` overwrite, repeated
    /// fields append, embedded messages merge (through their child builder
    /// when one exists) and unknown fields append. The node becomes dirty
    /// only if `other` carries any field.
    ///
    /// # Errors
    ///
    /// [`FieldError::TypeMismatch`] if `other` is of a different type.
    pub fn merge_from(&mut self, node: NodeId, other: &Message) -> Result<()> {
        let target = self.get_mut(node)?;
        if target.ty != other.message_type() {
            return Err(FieldError::TypeMismatch {
                expected: target.ty.name(),
                found: other.message_type().name(),
            });
        }
        if other.field_count() == 0 && other.unknown_fields().is_empty() {
            return Ok(());
        }

        // Singular messages with a live child builder merge into the child
        let routed: Vec<(NodeId, Arc<Message>)> = target
            .children
            .iter()
            .filter(|(slot, _)| slot.index.is_none())
            .filter_map(|(slot, &child)| match other.get(slot.field) {
                Some(Value::Message(sub)) => Some((child, Arc::clone(sub))),
                _ => None,
            })
            .collect();
        let skip: Vec<u32> = target
            .children
            .keys()
            .filter(|slot| slot.index.is_none() && other.has(slot.field))
            .map(|slot| slot.field)
            .collect();

        if other.field_count() > skip.len() {
            target.fields_mut().merge_filtered(other.field_map(), |number| skip.contains(&number));
        }
        if !other.unknown_fields().is_empty() {
            Arc::make_mut(&mut target.unknown).merge(other.unknown_fields());
        }
        self.mark_dirty(node)?;

        for (child, sub) in routed {
            self.merge_from(child, &sub)?;
        }
        Ok(())
    }

    /// Parse `bytes` as a message of the node's type and merge it in, the
    /// same as if the node's encoding and `bytes` had been parsed as one.
    ///
    /// # Errors
    ///
    /// [`FieldError::Wire`] on malformed input; the node is unchanged.
    pub fn merge_from_bytes(&mut self, node: NodeId, bytes: &[u8]) -> Result<()> {
        let ty = self.get(node)?.ty;
        let parsed = Message::parse_from(ty, bytes)?;
        self.merge_from(node, &parsed)
    }

    /// Reset `node` to the default instance of its type, discarding every
    /// child builder below it. The node ends up clean; its parent, if any,
    /// is notified when it had been holding the old contents.
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn clear(&mut self, node: NodeId) -> Result<()> {
        let target = self.get_mut(node)?;
        let was_clean = target.state == NodeState::Clean;
        let parent = target.parent;
        let children = std::mem::take(&mut target.children);

        let invalidations = target.invalidations;
        *target = Node::from_snapshot(&target.ty.default_instance(), parent);
        target.invalidations = invalidations;

        for child in children.into_values() {
            self.free_subtree(child);
        }
        if let (true, Some((parent, _))) = (was_clean, parent) {
            self.notify_parent(parent)?;
        }
        tracing::trace!(?node, "builder cleared");
        Ok(())
    }

    /// Drop `node` and every builder below it. Built snapshots are not
    /// affected; edits not yet built are lost.
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        if let Some((parent, slot)) = self.get(node)?.parent {
            self.detach(parent, slot)?;
        }
        self.free_subtree(node);
        Ok(())
    }

    // Snapshots

    /// Snapshot of `node`.
    ///
    /// A clean node returns its cached snapshot (the same `Arc` every
    /// time). A dirty node builds its child builders first, then caches and
    /// returns a new snapshot.
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn build(&mut self, node: NodeId) -> Result<Arc<Message>> {
        let target = self.get(node)?;
        if target.state == NodeState::Clean {
            return Ok(Arc::clone(&target.cached));
        }
        let children: Vec<(ChildSlot, NodeId)> =
            target.children.iter().map(|(&slot, &child)| (slot, child)).collect();

        for (slot, child) in children {
            let built = self.build(child)?;
            self.get_mut(node)?.store_child(slot, built)?;
        }

        let target = self.get_mut(node)?;
        let snapshot = Arc::new(Message::from_parts(
            target.ty,
            Arc::clone(&target.fields),
            Arc::clone(&target.unknown),
        ));
        target.cached = Arc::clone(&snapshot);
        target.state = NodeState::Clean;
        tracing::debug!(
            ?node,
            message = target.ty.name(),
            fields = snapshot.field_count(),
            "built snapshot"
        );
        Ok(snapshot)
    }

    /// Build `node` and encode the snapshot.
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`] or an encoding error.
    pub fn to_bytes(&mut self, node: NodeId) -> Result<Vec<u8>> {
        Ok(self.build(node)?.encode_to_vec()?)
    }

    // Inspection

    /// Current state of `node`
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn state(&self, node: NodeId) -> Result<NodeState> {
        Ok(self.get(node)?.state)
    }

    /// Number of notifications `node` has received from child builders
    /// turning dirty
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn invalidation_count(&self, node: NodeId) -> Result<u64> {
        Ok(self.get(node)?.invalidations)
    }

    /// Parent of `node`, or `None` for a root
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(node)?.parent.map(|(parent, _)| parent))
    }

    /// Slot `node` fills in its parent, or `None` for a root
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn slot(&self, node: NodeId) -> Result<Option<ChildSlot>> {
        Ok(self.get(node)?.parent.map(|(_, slot)| slot))
    }

    /// Schema of `node`
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn message_type(&self, node: NodeId) -> Result<&'static MessageType> {
        Ok(self.get(node)?.ty)
    }

    /// Borrowing handle with typed setters for `node`
    ///
    /// # Errors
    ///
    /// [`FieldError::StaleNode`].
    pub fn node(&mut self, node: NodeId) -> Result<NodeMut<'_>> {
        self.get(node)?;
        Ok(NodeMut { tree: self, id: node })
    }
}

/// Mutable view of one builder node.
///
/// Setters return `&mut Self` so calls chain:
///
/// ```
/// use tagwire_core::{
///     schema::{FieldKind, FieldSpec, MessageType},
///     BuilderTree,
/// };
///
/// static USER_FIELDS: [FieldSpec; 2] = [
///     FieldSpec::singular(1, "id", FieldKind::UInt64),
///     FieldSpec::singular(2, "name", FieldKind::String),
/// ];
/// static USER: MessageType = MessageType::new("User", &USER_FIELDS);
///
/// let mut tree = BuilderTree::new();
/// let root = tree.new_builder(&USER);
/// tree.node(root)?.set_uint64(1, 7)?.set_string(2, "ada")?;
/// assert_eq!(tree.to_bytes(root)?, [0x08, 0x07, 0x12, 0x03, b'a', b'd', b'a']);
/// # Ok::<(), tagwire_core::FieldError>(())
/// ```
#[derive(Debug)]
pub struct NodeMut<'a> {
    tree: &'a mut BuilderTree,
    id: NodeId,
}

macro_rules! typed_setters {
    ($($set:ident, $push:ident: $ty:ty => $variant:ident;)*) => {
        $(
            #[doc = concat!("Set a singular `", stringify!($variant), "` field")]
            ///
            /// # Errors
            ///
            /// As [`BuilderTree::set`].
            pub fn $set(&mut self, field: u32, value: $ty) -> Result<&mut Self> {
                self.set(field, Value::$variant(value.into()))
            }

            #[doc = concat!("Append to a repeated `", stringify!($variant), "` field")]
            ///
            /// # Errors
            ///
            /// As [`BuilderTree::push`].
            pub fn $push(&mut self, field: u32, value: $ty) -> Result<&mut Self> {
                self.push(field, Value::$variant(value.into()))
            }
        )*
    };
}

impl NodeMut<'_> {
    /// Handle of the node
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// See [`BuilderTree::set`]
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::set`].
    pub fn set(&mut self, field: u32, value: impl Into<Value>) -> Result<&mut Self> {
        self.tree.set(self.id, field, value)?;
        Ok(self)
    }

    /// See [`BuilderTree::push`]
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::push`].
    pub fn push(&mut self, field: u32, value: impl Into<Value>) -> Result<&mut Self> {
        self.tree.push(self.id, field, value)?;
        Ok(self)
    }

    /// See [`BuilderTree::set_message`]. Keep [`NodeMut::id`] of a
    /// [`NodeMut::nested`] handle if its builder should be removed once
    /// replaced.
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::set_message`].
    pub fn set_message(&mut self, field: u32, message: Arc<Message>) -> Result<&mut Self> {
        self.tree.set_message(self.id, field, message)?;
        Ok(self)
    }

    /// See [`BuilderTree::clear_field`]
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::clear_field`].
    pub fn clear_field(&mut self, field: u32) -> Result<&mut Self> {
        self.tree.clear_field(self.id, field)?;
        Ok(self)
    }

    /// Handle for the builder of singular message field `field`
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::nested_builder`].
    pub fn nested(&mut self, field: u32) -> Result<NodeMut<'_>> {
        let id = self.tree.nested_builder(self.id, field)?;
        Ok(NodeMut { tree: &mut *self.tree, id })
    }

    /// Handle for a new element of repeated message field `field`
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::add_builder`].
    pub fn add(&mut self, field: u32) -> Result<NodeMut<'_>> {
        let id = self.tree.add_builder(self.id, field)?;
        Ok(NodeMut { tree: &mut *self.tree, id })
    }

    /// See [`BuilderTree::build`]
    ///
    /// # Errors
    ///
    /// As [`BuilderTree::build`].
    pub fn build(&mut self) -> Result<Arc<Message>> {
        self.tree.build(self.id)
    }

    typed_setters! {
        set_int32, push_int32: i32 => Int32;
        set_int64, push_int64: i64 => Int64;
        set_uint32, push_uint32: u32 => UInt32;
        set_uint64, push_uint64: u64 => UInt64;
        set_sint32, push_sint32: i32 => SInt32;
        set_sint64, push_sint64: i64 => SInt64;
        set_fixed32, push_fixed32: u32 => Fixed32;
        set_fixed64, push_fixed64: u64 => Fixed64;
        set_sfixed32, push_sfixed32: i32 => SFixed32;
        set_sfixed64, push_sfixed64: i64 => SFixed64;
        set_float, push_float: f32 => Float;
        set_double, push_double: f64 => Double;
        set_bool, push_bool: bool => Bool;
        set_enum, push_enum: i32 => Enum;
        set_string, push_string: &str => String;
        set_bytes, push_bytes: impl Into<Bytes> => Bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    static LEAF: MessageType = MessageType::new("Leaf", &[]);
    static TRUNK_FIELDS: [FieldSpec; 2] = [
        FieldSpec::singular(1, "leaf", FieldKind::Message(&LEAF)),
        FieldSpec::repeated(2, "leaves", FieldKind::Message(&LEAF)),
    ];
    static TRUNK: MessageType = MessageType::new("Trunk", &TRUNK_FIELDS);

    #[test]
    fn reused_slot_rejects_old_handle() {
        let mut tree = BuilderTree::new();
        let first = tree.new_builder(&LEAF);
        tree.remove(first).unwrap();
        assert!(tree.is_empty());

        let second = tree.new_builder(&LEAF);
        assert_eq!(second.index, first.index);
        assert_ne!(second.generation, first.generation);
        assert_eq!(tree.state(first), Err(FieldError::StaleNode));
        assert_eq!(tree.state(second), Ok(NodeState::Clean));
    }

    #[test]
    fn remove_frees_the_whole_subtree() {
        let mut tree = BuilderTree::new();
        let root = tree.new_builder(&TRUNK);
        let child = tree.nested_builder(root, 1).unwrap();
        let element = tree.add_builder(root, 2).unwrap();
        assert_eq!(tree.len(), 3);

        tree.remove(child).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(child));
        assert!(tree.contains(element));

        tree.remove(root).unwrap();
        assert!(tree.is_empty());
        assert!(!tree.contains(element));
    }

    #[test]
    fn child_slots_are_recorded() {
        let mut tree = BuilderTree::new();
        let root = tree.new_builder(&TRUNK);
        let child = tree.nested_builder(root, 1).unwrap();
        let element = tree.add_builder(root, 2).unwrap();

        assert_eq!(tree.parent(child), Ok(Some(root)));
        assert_eq!(tree.slot(child), Ok(Some(ChildSlot::single(1))));
        assert_eq!(tree.slot(element), Ok(Some(ChildSlot::element(2, 0))));
        assert_eq!(tree.nested_builder(root, 1), Ok(child));
        assert_eq!(tree.repeated_builder(root, 2, 0), Ok(element));
        assert_eq!(tree.parent(root), Ok(None));
    }

    #[test]
    fn builder_requests_are_validated() {
        let mut tree = BuilderTree::new();
        let root = tree.new_builder(&TRUNK);
        assert_eq!(tree.nested_builder(root, 2), Err(FieldError::NotSingular(2)));
        assert_eq!(tree.add_builder(root, 1), Err(FieldError::NotRepeated(1)));
        assert_eq!(
            tree.repeated_builder(root, 2, 0),
            Err(FieldError::IndexOutOfRange { number: 2, index: 0, len: 0 })
        );
        assert_eq!(
            tree.nested_builder(root, 3),
            Err(FieldError::UnknownField { message: "Trunk", number: 3 })
        );
        assert_eq!(tree.len(), 1);
    }
}
