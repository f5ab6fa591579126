//! Ready-made reference visitors

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::ReferenceVisitor;
use crate::cancel::CancellationToken;
use crate::document::{Node, NodeId, SchemaDocument};
use crate::error::Result;

/// A `$ref` found during traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedReference {
    /// Where the referencing node sits in the document
    pub path: String,
    /// The `$ref` target
    pub reference_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name_hint: Option<String>,
    #[serde(skip)]
    pub node: Option<NodeId>,
}

/// Records every `$ref` without touching the document
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    references: Vec<CollectedReference>,
}

impl ReferenceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn references(&self) -> &[CollectedReference] {
        &self.references
    }

    pub fn into_references(self) -> Vec<CollectedReference> {
        self.references
    }
}

#[async_trait]
impl ReferenceVisitor for ReferenceCollector {
    async fn visit_reference(
        &mut self,
        doc: &mut SchemaDocument,
        reference: NodeId,
        path: &str,
        type_name_hint: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<Option<NodeId>> {
        if let Some(target) = doc.get(reference).and_then(Node::reference_path) {
            self.references.push(CollectedReference {
                path: path.to_string(),
                reference_path: target.to_string(),
                type_name_hint: type_name_hint.map(str::to_string),
                node: Some(reference),
            });
        }
        Ok(Some(reference))
    }
}

/// Rewrites `$ref` targets starting with one prefix to start with another.
/// Nodes are edited in place, so the walker keeps descending.
#[derive(Debug)]
pub struct ReferenceRewriter {
    from: String,
    to: String,
    rewritten: usize,
}

impl ReferenceRewriter {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rewritten: 0,
        }
    }

    /// Number of references changed so far
    pub fn rewritten(&self) -> usize {
        self.rewritten
    }

    fn rewrite(&self, target: &str) -> Option<String> {
        target
            .strip_prefix(self.from.as_str())
            .map(|rest| format!("{}{}", self.to, rest))
    }
}

#[async_trait]
impl ReferenceVisitor for ReferenceRewriter {
    async fn visit_reference(
        &mut self,
        doc: &mut SchemaDocument,
        reference: NodeId,
        path: &str,
        _type_name_hint: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<Option<NodeId>> {
        let slot = match doc.get_mut(reference) {
            Some(Node::Schema(schema)) => schema.reference_path.as_mut(),
            Some(Node::Reference(plain)) => Some(&mut plain.reference_path),
            _ => None,
        };
        if let Some(target) = slot {
            if let Some(updated) = self.rewrite(target.as_str()) {
                debug!(path = %path, from = %target, to = %updated, "rewriting reference");
                *target = updated;
                self.rewritten += 1;
            }
        }
        Ok(Some(reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{JsonReference, JsonSchema};
    use crate::visitor::visit;

    fn document() -> (SchemaDocument, NodeId) {
        let mut doc = SchemaDocument::new();
        let a = doc.insert(JsonSchema::reference("#/definitions/A"));
        let b = doc.insert(JsonReference::new("#/components/B"));
        let mut root = JsonSchema::new();
        root.properties.insert("a".into(), a);
        root.set_extension("x-b", b);
        let root = doc.insert(root);
        (doc, root)
    }

    #[tokio::test]
    async fn test_collects_schema_and_plain_references() {
        let (mut doc, root) = document();
        let mut collector = ReferenceCollector::new();
        visit(&mut doc, root, &mut collector).await.unwrap();

        let found: Vec<(&str, &str)> = collector
            .references()
            .iter()
            .map(|r| (r.path.as_str(), r.reference_path.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("#/properties/a", "#/definitions/A"),
                ("#/x-b", "#/components/B"),
            ]
        );
        assert_eq!(collector.references()[0].type_name_hint.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_rewrites_matching_prefix_only() {
        let (mut doc, root) = document();
        let mut rewriter = ReferenceRewriter::new("#/definitions/", "#/$defs/");
        visit(&mut doc, root, &mut rewriter).await.unwrap();

        assert_eq!(rewriter.rewritten(), 1);
        let a = doc.schema(root).unwrap().properties["a"];
        assert_eq!(
            doc.schema(a).unwrap().reference_path.as_deref(),
            Some("#/$defs/A")
        );
    }
}
