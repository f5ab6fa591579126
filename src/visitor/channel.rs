//! Replacement channels
//!
//! Every child the walker is about to visit gets a [`ReplacementChannel`]
//! naming the exact slot it was read from. Committing a replacement consumes
//! the channel, so each one is used at most once.

use tracing::debug;

use crate::document::{
    DictionaryNode, Node, NodeId, SchemaDocument, SchemaField, SchemaList, SchemaMap, SlotMap,
};
use crate::error::{Result, VisitError};

/// What happened to a visited value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Left in place (possibly after descending into it)
    Unchanged,
    /// Swapped for another node
    Replaced,
    /// Removed from its container
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotTarget {
    Root,
    ReadOnly,
    Field { owner: NodeId, field: SchemaField },
    SchemaElement { owner: NodeId, list: SchemaList, index: usize },
    SchemaEntry { owner: NodeId, map: SchemaMap, key: String },
    Extension { owner: NodeId, key: String },
    ListElement { owner: NodeId, index: usize },
    MapEntry { owner: NodeId, key: String },
    ReferenceMember { owner: NodeId, key: String },
    /// Member of an object node, a dictionary, or a schema's derived members
    ObjectMember { owner: NodeId, index: usize },
}

/// Single-use handle that writes a replacement back into the container a
/// value was read from
#[derive(Debug)]
pub struct ReplacementChannel {
    target: SlotTarget,
    path: String,
}

impl ReplacementChannel {
    fn new(target: SlotTarget, path: impl Into<String>) -> Self {
        Self {
            target,
            path: path.into(),
        }
    }

    /// The traversal root. Refuses every replacement.
    pub(crate) fn root(path: impl Into<String>) -> Self {
        Self::new(SlotTarget::Root, path)
    }

    /// Element of a forward-only sequence. Refuses every replacement.
    pub(crate) fn read_only(path: impl Into<String>) -> Self {
        Self::new(SlotTarget::ReadOnly, path)
    }

    pub(crate) fn field(owner: NodeId, field: SchemaField, path: impl Into<String>) -> Self {
        Self::new(SlotTarget::Field { owner, field }, path)
    }

    pub(crate) fn schema_element(
        owner: NodeId,
        list: SchemaList,
        index: usize,
        path: impl Into<String>,
    ) -> Self {
        Self::new(SlotTarget::SchemaElement { owner, list, index }, path)
    }

    pub(crate) fn schema_entry(
        owner: NodeId,
        map: SchemaMap,
        key: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(
            SlotTarget::SchemaEntry {
                owner,
                map,
                key: key.into(),
            },
            path,
        )
    }

    pub(crate) fn extension(
        owner: NodeId,
        key: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(SlotTarget::Extension { owner, key: key.into() }, path)
    }

    pub(crate) fn list_element(owner: NodeId, index: usize, path: impl Into<String>) -> Self {
        Self::new(SlotTarget::ListElement { owner, index }, path)
    }

    pub(crate) fn map_entry(
        owner: NodeId,
        key: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(SlotTarget::MapEntry { owner, key: key.into() }, path)
    }

    pub(crate) fn reference_member(
        owner: NodeId,
        key: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(SlotTarget::ReferenceMember { owner, key: key.into() }, path)
    }

    pub(crate) fn object_member(owner: NodeId, index: usize, path: impl Into<String>) -> Self {
        Self::new(SlotTarget::ObjectMember { owner, index }, path)
    }

    /// Path of the slot this channel writes to
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether committing through this channel can succeed at all
    pub fn accepts_replacement(&self) -> bool {
        !matches!(self.target, SlotTarget::Root | SlotTarget::ReadOnly)
    }

    /// Delete the value from its container
    pub fn delete(self, doc: &mut SchemaDocument) -> Result<Outcome> {
        self.replace(doc, None)
    }

    /// Put `value` where the visited value was. `None` deletes: list
    /// elements are removed without reinsertion, keyed entries lose their
    /// key, single-valued slots and object members become empty.
    pub fn replace(self, doc: &mut SchemaDocument, value: Option<NodeId>) -> Result<Outcome> {
        let ReplacementChannel { target, path } = self;
        let detached = || VisitError::DetachedSlot { path: path.clone() };

        match target {
            SlotTarget::Root => return Err(VisitError::unsupported("Cannot replace the root.")),
            SlotTarget::ReadOnly => {
                return Err(VisitError::unsupported("Cannot replace enumerable item."))
            }
            SlotTarget::Field { owner, field } => {
                let schema = doc.schema_mut(owner).ok_or_else(detached)?;
                *schema.field_mut(field) = value;
            }
            SlotTarget::SchemaElement { owner, list, index } => {
                let schema = doc.schema_mut(owner).ok_or_else(detached)?;
                if !replace_or_delete(schema.list_mut(list), index, value) {
                    return Err(detached());
                }
            }
            SlotTarget::SchemaEntry { owner, map, key } => {
                let schema = doc.schema_mut(owner).ok_or_else(detached)?;
                assign_or_remove(schema.map_mut(map), key, value);
            }
            SlotTarget::Extension { owner, key } => {
                let schema = doc.schema_mut(owner).ok_or_else(detached)?;
                match value {
                    Some(value) => schema.set_extension(key, value),
                    None => {
                        schema.remove_extension(&key);
                    }
                }
            }
            SlotTarget::ListElement { owner, index } => match doc.get_mut(owner) {
                Some(Node::List(items)) => {
                    if !replace_or_delete(items, index, value) {
                        return Err(detached());
                    }
                }
                _ => return Err(detached()),
            },
            SlotTarget::MapEntry { owner, key } => match doc.get_mut(owner) {
                Some(Node::Map(entries))
                | Some(Node::Dictionary(DictionaryNode { entries, .. })) => {
                    assign_or_remove(entries, key, value)
                }
                _ => return Err(detached()),
            },
            SlotTarget::ReferenceMember { owner, key } => match doc.get_mut(owner) {
                Some(Node::Reference(reference)) => {
                    assign_or_remove(&mut reference.members, key, value)
                }
                _ => return Err(detached()),
            },
            SlotTarget::ObjectMember { owner, index } => {
                let members = match doc.get_mut(owner) {
                    Some(Node::Object(object)) => &mut object.members,
                    Some(Node::Dictionary(dictionary)) => &mut dictionary.object.members,
                    Some(Node::Schema(schema)) => match schema.derived.as_mut() {
                        Some(derived) => &mut derived.members,
                        None => return Err(detached()),
                    },
                    _ => return Err(detached()),
                };
                let member = members.get_mut(index).ok_or_else(detached)?;
                member.value = value;
            }
        }

        let outcome = if value.is_some() {
            Outcome::Replaced
        } else {
            Outcome::Deleted
        };
        debug!(path = %path, ?outcome, "committed replacement");
        Ok(outcome)
    }
}

/// Remove the element at `index` and reinsert `value` at the same position,
/// keeping every other element where it was
fn replace_or_delete(items: &mut Vec<NodeId>, index: usize, value: Option<NodeId>) -> bool {
    if index >= items.len() {
        return false;
    }
    items.remove(index);
    if let Some(value) = value {
        items.insert(index, value);
    }
    true
}

fn assign_or_remove(entries: &mut SlotMap, key: String, value: Option<NodeId>) {
    match value {
        Some(value) => {
            entries.insert(key, value);
        }
        None => {
            entries.shift_remove(&key);
        }
    }
}
