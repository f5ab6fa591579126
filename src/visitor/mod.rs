//! Reference visitor
//!
//! Walks every node reachable from a root exactly once, hands each
//! reference-capable node ([`Node::Schema`] and [`Node::Reference`]) to a
//! [`ReferenceVisitor`], and commits whatever the visitor returns back into
//! the parent container.
//!
//! ## Visit order
//!
//! For a schema node, children are visited in this fixed order:
//!
//! 1. single-valued slots: `additionalItems`, `additionalProperties`,
//!    `items`, `not`, `x-dictionaryKey`, `discriminator`
//! 2. ordered slots: `items[i]`, `allOf[i]`, `anyOf[i]`, `oneOf[i]`
//! 3. keyed slots: `properties`, `patternProperties`, `definitions`
//! 4. extension data
//! 5. derived members (structural fallback, core names excluded)
//!
//! Every other node kind goes through the structural fallback in
//! [`structural`]. When the visitor substitutes a node the walker does not
//! descend into either the old or the new node.

mod channel;
mod refs;
mod structural;

pub use channel::{Outcome, ReplacementChannel};
pub use refs::{CollectedReference, ReferenceCollector, ReferenceRewriter};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::checked::CheckedSet;
use crate::document::{Node, NodeId, SchemaDocument, SchemaField, SchemaList, SchemaMap};
use crate::error::{Result, VisitError};

/// Path of the traversal root
pub const ROOT_PATH: &str = "#";

/// Hook called for every reference-capable node.
///
/// Return `Some(reference)` to keep the node and let the walker descend into
/// it. Returning another id replaces the node in its parent; returning `None`
/// deletes it. Either way the walker does not descend any further from this
/// node. The hook is called at most once per node per traversal.
#[async_trait]
pub trait ReferenceVisitor: Send {
    async fn visit_reference(
        &mut self,
        doc: &mut SchemaDocument,
        reference: NodeId,
        path: &str,
        type_name_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<NodeId>>;
}

/// Adapter turning a synchronous closure into a [`ReferenceVisitor`]
pub struct FnVisitor<F> {
    f: F,
}

/// Build a visitor from a closure
/// `(doc, reference, path, type_name_hint) -> Result<Option<NodeId>>`
pub fn from_fn<F>(f: F) -> FnVisitor<F>
where
    F: FnMut(&mut SchemaDocument, NodeId, &str, Option<&str>) -> Result<Option<NodeId>> + Send,
{
    FnVisitor { f }
}

#[async_trait]
impl<F> ReferenceVisitor for FnVisitor<F>
where
    F: FnMut(&mut SchemaDocument, NodeId, &str, Option<&str>) -> Result<Option<NodeId>> + Send,
{
    async fn visit_reference(
        &mut self,
        doc: &mut SchemaDocument,
        reference: NodeId,
        path: &str,
        type_name_hint: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<Option<NodeId>> {
        (self.f)(doc, reference, path, type_name_hint)
    }
}

/// Visit everything reachable from `root`
pub async fn visit<V>(doc: &mut SchemaDocument, root: NodeId, visitor: &mut V) -> Result<()>
where
    V: ReferenceVisitor + ?Sized,
{
    visit_with_cancel(doc, root, visitor, &CancellationToken::none()).await
}

/// Visit everything reachable from `root`, stopping with
/// [`VisitError::Cancelled`] once `cancel` fires
pub async fn visit_with_cancel<V>(
    doc: &mut SchemaDocument,
    root: NodeId,
    visitor: &mut V,
    cancel: &CancellationToken,
) -> Result<()>
where
    V: ReferenceVisitor + ?Sized,
{
    visit_from(doc, root, ROOT_PATH, visitor, cancel).await
}

/// Same as [`visit_with_cancel`] with a custom root path
pub async fn visit_from<V>(
    doc: &mut SchemaDocument,
    root: NodeId,
    root_path: &str,
    visitor: &mut V,
    cancel: &CancellationToken,
) -> Result<()>
where
    V: ReferenceVisitor + ?Sized,
{
    let mut traversal = Traversal {
        visitor,
        doc,
        checked: CheckedSet::new(),
        cancel,
    };
    traversal
        .visit(
            Some(root),
            root_path.to_string(),
            None,
            ReplacementChannel::root(root_path),
        )
        .await?;
    debug!(visited = traversal.checked.len(), "traversal complete");
    Ok(())
}

/// Owns a visitor and runs traversals with it
pub struct Walker<V> {
    visitor: V,
}

impl<V: ReferenceVisitor> Walker<V> {
    pub fn new(visitor: V) -> Self {
        Self { visitor }
    }

    pub async fn visit(&mut self, doc: &mut SchemaDocument, root: NodeId) -> Result<()> {
        visit(doc, root, &mut self.visitor).await
    }

    pub async fn visit_with_cancel(
        &mut self,
        doc: &mut SchemaDocument,
        root: NodeId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        visit_with_cancel(doc, root, &mut self.visitor, cancel).await
    }

    /// Visit the document's own root
    pub async fn visit_document(
        &mut self,
        doc: &mut SchemaDocument,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match doc.root() {
            Some(root) => visit_with_cancel(doc, root, &mut self.visitor, cancel).await,
            None => Ok(()),
        }
    }

    pub fn visitor(&self) -> &V {
        &self.visitor
    }

    pub fn visitor_mut(&mut self) -> &mut V {
        &mut self.visitor
    }

    pub fn into_inner(self) -> V {
        self.visitor
    }
}

/// State of one traversal. Dropped, with its checked set, when the
/// traversal returns.
pub(crate) struct Traversal<'a, V: ?Sized> {
    visitor: &'a mut V,
    doc: &'a mut SchemaDocument,
    checked: CheckedSet,
    cancel: &'a CancellationToken,
}

impl<'a, V> Traversal<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    fn visit<'s>(
        &'s mut self,
        value: Option<NodeId>,
        path: String,
        type_name_hint: Option<String>,
        channel: ReplacementChannel,
    ) -> BoxFuture<'s, Result<Outcome>> {
        async move {
            if self.cancel.is_cancelled() {
                return Err(VisitError::Cancelled);
            }
            let Some(id) = value else {
                return Ok(Outcome::Unchanged);
            };
            let reference_capable = match self.doc.get(id) {
                Some(node) => node.is_reference_capable(),
                None => return Ok(Outcome::Unchanged),
            };
            if !self.checked.should_visit(Some(id)) {
                trace!(path = %path, node = %id, "already visited");
                return Ok(Outcome::Unchanged);
            }

            if reference_capable {
                let replacement = self
                    .visitor
                    .visit_reference(
                        &mut *self.doc,
                        id,
                        &path,
                        type_name_hint.as_deref(),
                        self.cancel,
                    )
                    .await?;
                if replacement != Some(id) {
                    return channel.replace(self.doc, replacement);
                }
            }

            if matches!(self.doc.get(id), Some(Node::Schema(_))) {
                self.visit_schema(id, &path).await?;
            } else {
                self.visit_structure(id, &path).await?;
            }
            Ok(Outcome::Unchanged)
        }
        .boxed()
    }

    async fn visit_schema(&mut self, id: NodeId, path: &str) -> Result<()> {
        trace!(path = %path, node = %id, "visiting schema slots");

        for field in SchemaField::ALL {
            let value = self.doc.schema(id).and_then(|s| s.field(field));
            if value.is_some() {
                let child_path = format!("{}/{}", path, field.json_name());
                let channel = ReplacementChannel::field(id, field, child_path.clone());
                self.visit(value, child_path, None, channel).await?;
            }
        }

        for list in SchemaList::ALL {
            let snapshot = match self.doc.schema(id) {
                Some(schema) => schema.list(list).clone(),
                None => return Ok(()),
            };
            // Deleted elements shift everything after them one slot left
            let mut live_index = 0;
            for (i, item) in snapshot.into_iter().enumerate() {
                let child_path = format!("{}/{}[{}]", path, list.json_name(), i);
                let channel =
                    ReplacementChannel::schema_element(id, list, live_index, child_path.clone());
                if self.visit(Some(item), child_path, None, channel).await? != Outcome::Deleted {
                    live_index += 1;
                }
            }
        }

        for map in SchemaMap::ALL {
            let entries: Vec<(String, NodeId)> = match self.doc.schema(id) {
                Some(schema) => schema.map(map).iter().map(|(k, v)| (k.clone(), *v)).collect(),
                None => return Ok(()),
            };
            for (key, value) in entries {
                let child_path = format!("{}/{}/{}", path, map.json_name(), key);
                let hint = map.keys_are_type_names().then(|| key.clone());
                let channel = ReplacementChannel::schema_entry(id, map, key, child_path.clone());
                self.visit(Some(value), child_path, hint, channel).await?;
            }
        }

        let extensions: Vec<(String, NodeId)> = self
            .doc
            .schema(id)
            .and_then(|s| s.extension_data.as_ref())
            .map(|data| data.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        for (key, value) in extensions {
            let child_path = format!("{}/{}", path, key);
            let channel = ReplacementChannel::extension(id, key.clone(), child_path.clone());
            self.visit(Some(value), child_path, Some(key), channel).await?;
        }

        self.visit_members(id, path).await
    }
}
