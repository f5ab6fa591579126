//! Structural fallback
//!
//! Nodes outside the core schema vocabulary are walked by their container
//! shape. Every container is iterated over a snapshot taken before the first
//! child is visited; replacements go through channels into the live
//! container.

use tracing::trace;

use super::{Outcome, ReferenceVisitor, ReplacementChannel, Traversal};
use crate::document::{is_reserved_schema_member, Member, Node, NodeId, SlotMap};
use crate::error::Result;

/// Point-in-time copy of a container's children
enum Snapshot {
    MapEntries(Vec<(String, NodeId)>),
    /// Entries first, declared members after
    DictionaryEntries(Vec<(String, NodeId)>),
    ReferenceMembers(Vec<(String, NodeId)>),
    ListElements(Vec<NodeId>),
    SequenceElements(Vec<NodeId>),
    ObjectMembers,
    Leaf,
}

fn entries(map: &SlotMap) -> Vec<(String, NodeId)> {
    map.iter().map(|(k, v)| (k.clone(), *v)).collect()
}

impl<'a, V> Traversal<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    pub(super) async fn visit_structure(&mut self, id: NodeId, path: &str) -> Result<()> {
        let snapshot = match self.doc.get(id) {
            Some(Node::Map(map)) => Snapshot::MapEntries(entries(map)),
            Some(Node::Dictionary(dictionary)) => {
                Snapshot::DictionaryEntries(entries(&dictionary.entries))
            }
            Some(Node::Reference(reference)) => {
                Snapshot::ReferenceMembers(entries(&reference.members))
            }
            Some(Node::List(items)) => Snapshot::ListElements(items.clone()),
            Some(Node::Sequence(items)) => Snapshot::SequenceElements(items.clone()),
            Some(Node::Object(_)) => Snapshot::ObjectMembers,
            Some(Node::Scalar(_)) | Some(Node::Schema(_)) | None => Snapshot::Leaf,
        };

        match snapshot {
            Snapshot::MapEntries(entries) => {
                for (key, value) in entries {
                    let child_path = format!("{}/{}", path, key);
                    let channel =
                        ReplacementChannel::map_entry(id, key.clone(), child_path.clone());
                    self.visit(Some(value), child_path, Some(key), channel).await?;
                }
            }
            Snapshot::DictionaryEntries(entries) => {
                for (key, value) in entries {
                    let child_path = format!("{}/{}", path, key);
                    let channel =
                        ReplacementChannel::map_entry(id, key.clone(), child_path.clone());
                    self.visit(Some(value), child_path, Some(key), channel).await?;
                }
                self.visit_members(id, path).await?;
            }
            Snapshot::ReferenceMembers(entries) => {
                for (key, value) in entries {
                    let child_path = format!("{}/{}", path, key);
                    let channel =
                        ReplacementChannel::reference_member(id, key.clone(), child_path.clone());
                    self.visit(Some(value), child_path, Some(key), channel).await?;
                }
            }
            Snapshot::ListElements(items) => {
                let mut live_index = 0;
                for (i, item) in items.into_iter().enumerate() {
                    let child_path = format!("{}[{}]", path, i);
                    let channel =
                        ReplacementChannel::list_element(id, live_index, child_path.clone());
                    let outcome = self.visit(Some(item), child_path, None, channel).await?;
                    if outcome != Outcome::Deleted {
                        live_index += 1;
                    }
                }
            }
            Snapshot::SequenceElements(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    let child_path = format!("{}[{}]", path, i);
                    let channel = ReplacementChannel::read_only(child_path.clone());
                    self.visit(Some(item), child_path, None, channel).await?;
                }
            }
            Snapshot::ObjectMembers => self.visit_members(id, path).await?,
            Snapshot::Leaf => {}
        }
        Ok(())
    }

    /// Walk the declared members of an object node or dictionary, or the
    /// derived members of a schema. For schemas, members named like a core slot or keyword
    /// were already handled and are skipped.
    pub(super) async fn visit_members(&mut self, id: NodeId, path: &str) -> Result<()> {
        let (members, is_schema): (Vec<(usize, String, NodeId)>, bool) = match self.doc.get(id) {
            Some(Node::Object(object)) => (walkable(&object.members), false),
            Some(Node::Dictionary(dictionary)) => (walkable(&dictionary.object.members), false),
            Some(Node::Schema(schema)) => match &schema.derived {
                Some(derived) => (walkable(&derived.members), true),
                None => return Ok(()),
            },
            _ => return Ok(()),
        };

        for (index, name, value) in members {
            if is_schema && is_reserved_schema_member(&name) {
                trace!(path = %path, member = %name, "skipping core schema member");
                continue;
            }
            let child_path = format!("{}/{}", path, name);
            let channel = ReplacementChannel::object_member(id, index, child_path.clone());
            self.visit(Some(value), child_path, Some(name), channel).await?;
        }
        Ok(())
    }
}

fn walkable(members: &[Member]) -> Vec<(usize, String, NodeId)> {
    members
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_walkable())
        .filter_map(|(i, m)| m.value.map(|v| (i, m.name.clone(), v)))
        .collect()
}
