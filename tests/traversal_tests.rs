//! Traversal Tests
//!
//! End-to-end behaviour of the reference visitor on parsed and hand-built
//! documents: visit order, cycles, replacement, deletion, cancellation and
//! hook failures.

use std::time::Duration;

use async_trait::async_trait;
use schema_walk::visitor::{from_fn, visit, visit_with_cancel, ReferenceVisitor};
use schema_walk::{
    codec, CancellationToken, JsonReference, JsonSchema, Member, Node, NodeId, ObjectNode,
    ReferenceCollector, Result, SchemaDocument, VisitError,
};

fn load(fixture: &str) -> SchemaDocument {
    codec::from_str(fixture).unwrap()
}

/// Records every hook call and keeps every node
#[derive(Default)]
struct Recorder {
    calls: Vec<(String, Option<String>)>,
}

#[async_trait]
impl ReferenceVisitor for Recorder {
    async fn visit_reference(
        &mut self,
        _doc: &mut SchemaDocument,
        reference: NodeId,
        path: &str,
        type_name_hint: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<Option<NodeId>> {
        self.calls
            .push((path.to_string(), type_name_hint.map(str::to_string)));
        Ok(Some(reference))
    }
}

impl Recorder {
    fn paths(&self) -> Vec<&str> {
        self.calls.iter().map(|(p, _)| p.as_str()).collect()
    }

    fn hint_for(&self, path: &str) -> Option<&str> {
        self.calls
            .iter()
            .find(|(p, _)| p == path)
            .and_then(|(_, h)| h.as_deref())
    }
}

// =============================================================================
// Visit Order
// =============================================================================

#[tokio::test]
async fn test_schema_slots_visited_in_fixed_order() {
    let mut doc = load(include_str!("fixtures/all_slots.json"));
    let root = doc.root().unwrap();
    let mut recorder = Recorder::default();

    visit(&mut doc, root, &mut recorder).await.unwrap();

    assert_eq!(
        recorder.paths(),
        vec![
            "#",
            "#/additionalItems",
            "#/additionalProperties",
            "#/items",
            "#/not",
            "#/x-dictionaryKey",
            "#/discriminator/mapping/cat",
            "#/allOf[0]",
            "#/allOf[1]",
            "#/anyOf[0]",
            "#/oneOf[0]",
            "#/properties/name",
            "#/patternProperties/^x-",
            "#/definitions/Name",
            "#/x-extra",
        ]
    );
}

#[tokio::test]
async fn test_type_name_hints() {
    let mut doc = load(include_str!("fixtures/all_slots.json"));
    let root = doc.root().unwrap();
    let mut recorder = Recorder::default();

    visit(&mut doc, root, &mut recorder).await.unwrap();

    assert_eq!(recorder.hint_for("#"), None);
    assert_eq!(recorder.hint_for("#/not"), None);
    assert_eq!(recorder.hint_for("#/items"), None);
    assert_eq!(recorder.hint_for("#/discriminator/mapping/cat"), Some("cat"));
    assert_eq!(recorder.hint_for("#/allOf[0]"), None);
    assert_eq!(recorder.hint_for("#/properties/name"), Some("name"));
    assert_eq!(recorder.hint_for("#/patternProperties/^x-"), None);
    assert_eq!(recorder.hint_for("#/definitions/Name"), Some("Name"));
    assert_eq!(recorder.hint_for("#/x-extra"), Some("x-extra"));
}

#[tokio::test]
async fn test_references_in_extension_regions_are_found() {
    let mut doc = load(include_str!("fixtures/messages_components.json"));
    let root = doc.root().unwrap();
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
            ("#/items/properties/Ok", "#/messages/Ok"),
            ("#/components/IdMessage/properties/Id", "#/components/Id"),
            ("#/messages/Ok/anyOf[0]", "#/components/IdMessage"),
        ]
    );
}

// =============================================================================
// Cycles and Shared Sub-trees
// =============================================================================

#[tokio::test]
async fn test_cycle_terminates_and_visits_once() {
    let mut doc = SchemaDocument::new();
    let a = doc.insert(JsonSchema::new());
    let b = doc.insert(JsonSchema::new());
    doc.schema_mut(a).unwrap().properties.insert("next".into(), b);
    doc.schema_mut(b).unwrap().all_of.push(a);
    doc.schema_mut(b).unwrap().not = Some(b);
    let mut root = JsonSchema::new();
    root.definitions.insert("A".into(), a);
    root.definitions.insert("B".into(), b);
    let root = doc.insert(root);
    doc.schema_mut(a).unwrap().item = Some(root);

    let mut recorder = Recorder::default();
    visit(&mut doc, root, &mut recorder).await.unwrap();

    assert_eq!(
        recorder.paths(),
        vec!["#", "#/definitions/A", "#/definitions/A/properties/next"]
    );
}

#[tokio::test]
async fn test_shared_subtree_hook_called_once() {
    let mut doc = SchemaDocument::new();
    let shared = doc.insert(JsonSchema::reference("#/definitions/Shared"));
    let mut root = JsonSchema::new();
    root.properties.insert("first".into(), shared);
    root.properties.insert("second".into(), shared);
    root.any_of.push(shared);
    let root = doc.insert(root);

    let mut recorder = Recorder::default();
    visit(&mut doc, root, &mut recorder).await.unwrap();

    // ordered slots come before keyed slots
    assert_eq!(recorder.paths(), vec!["#", "#/anyOf[0]"]);
    let schema = doc.schema(root).unwrap();
    assert_eq!(schema.properties["second"], shared);
    assert_eq!(schema.any_of, vec![shared]);
}

#[tokio::test]
async fn test_separate_traversals_have_separate_checked_sets() {
    let mut doc = load(include_str!("fixtures/all_slots.json"));
    let root = doc.root().unwrap();

    let mut first = Recorder::default();
    visit(&mut doc, root, &mut first).await.unwrap();
    let mut second = Recorder::default();
    visit(&mut doc, root, &mut second).await.unwrap();

    assert_eq!(first.paths(), second.paths());
}

// =============================================================================
// Replacement and Deletion
// =============================================================================

#[tokio::test]
async fn test_replacement_is_committed_without_descent() {
    let mut doc = SchemaDocument::new();
    let inner = doc.insert(JsonSchema::reference("#/definitions/Inner"));
    let mut original = JsonSchema::reference("#/definitions/Original");
    original.properties.insert("inner".into(), inner);
    let original = doc.insert(original);
    let deep = doc.insert(JsonSchema::reference("#/definitions/Deep"));
    let mut replacement = JsonSchema::new();
    replacement.properties.insert("deep".into(), deep);
    let replacement = doc.insert(replacement);
    let mut root = JsonSchema::new();
    root.properties.insert("a".into(), original);
    root.properties.insert("b".into(), inner);
    let root = doc.insert(root);

    let mut paths = Vec::new();
    let mut visitor = from_fn(|_doc, reference, path, _hint| {
        paths.push(path.to_string());
        Ok(if reference == original {
            Some(replacement)
        } else {
            Some(reference)
        })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    assert_eq!(paths, vec!["#", "#/properties/a", "#/properties/b"]);
    let schema = doc.schema(root).unwrap();
    assert_eq!(schema.properties["a"], replacement);
    assert_eq!(
        schema.properties.keys().collect::<Vec<_>>(),
        vec!["a", "b"]
    );
}

#[tokio::test]
async fn test_tuple_items_visited_before_all_of_and_deleted_in_place() {
    let mut doc = codec::from_str(
        r##"{"items":[{"$ref":"#/a"},{"$ref":"#/b"},{"$ref":"#/c"}],"allOf":[{"$ref":"#/d"}]}"##,
    )
    .unwrap();
    let root = doc.root().unwrap();

    let mut paths = Vec::new();
    let mut visitor = from_fn(|_doc, reference, path, _hint| {
        paths.push(path.to_string());
        Ok(if path == "#/items[0]" { None } else { Some(reference) })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    assert_eq!(
        paths,
        vec!["#", "#/items[0]", "#/items[1]", "#/items[2]", "#/allOf[0]"]
    );
    assert_eq!(doc.schema(root).unwrap().items.len(), 2);
    assert_eq!(
        codec::to_string(&doc).unwrap(),
        r##"{"items":[{"$ref":"#/b"},{"$ref":"#/c"}],"allOf":[{"$ref":"#/d"}]}"##
    );
}

#[tokio::test]
async fn test_single_valued_slots_replace_and_delete() {
    let mut doc = codec::from_str(
        r##"{"not":{"$ref":"#/n"},"additionalProperties":{"$ref":"#/ap"}}"##,
    )
    .unwrap();
    let root = doc.root().unwrap();
    let swapped = doc.insert(JsonSchema::reference("#/R"));

    let mut visitor = from_fn(|_doc, reference, path, _hint| {
        Ok(match path {
            "#/not" => Some(swapped),
            "#/additionalProperties" => None,
            _ => Some(reference),
        })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    let schema = doc.schema(root).unwrap();
    assert_eq!(schema.not, Some(swapped));
    assert!(schema.additional_properties_schema.is_none());
    assert_eq!(codec::to_string(&doc).unwrap(), r##"{"not":{"$ref":"#/R"}}"##);
}

#[tokio::test]
async fn test_reference_members_replace_and_delete() {
    let mut doc = codec::from_str(
        r##"{"x-link":{"$ref":"#/target","x-a":{"$ref":"#/a"},"x-b":{"$ref":"#/b"}}}"##,
    )
    .unwrap();
    let root = doc.root().unwrap();
    let swapped = doc.insert(JsonReference::new("#/replaced"));

    let mut paths = Vec::new();
    let mut visitor = from_fn(|_doc, reference, path, _hint| {
        paths.push(path.to_string());
        Ok(match path {
            "#/x-link/x-a" => Some(swapped),
            "#/x-link/x-b" => None,
            _ => Some(reference),
        })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    assert_eq!(paths, vec!["#", "#/x-link", "#/x-link/x-a", "#/x-link/x-b"]);
    assert_eq!(
        codec::to_string(&doc).unwrap(),
        r##"{"x-link":{"$ref":"#/target","x-a":{"$ref":"#/replaced"}}}"##
    );
}

#[tokio::test]
async fn test_discriminator_mapping_entry_replaced() {
    let mut doc = load(include_str!("fixtures/all_slots.json"));
    let root = doc.root().unwrap();
    let swapped = doc.insert(JsonReference::new("#/definitions/Dog"));

    let mut visitor = from_fn(|_doc, reference, path, _hint| {
        Ok(if path == "#/discriminator/mapping/cat" {
            Some(swapped)
        } else {
            Some(reference)
        })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    let printed = codec::to_value(&doc).unwrap();
    assert_eq!(
        printed["discriminator"]["mapping"]["cat"],
        serde_json::json!({ "$ref": "#/definitions/Dog" })
    );
    assert_eq!(printed["discriminator"]["propertyName"], "kind");
}

#[tokio::test]
async fn test_list_deletion_keeps_sibling_indices() {
    let mut doc = SchemaDocument::new();
    let ids: Vec<NodeId> = (0..4)
        .map(|i| doc.insert(JsonSchema::reference(format!("#/definitions/D{}", i))))
        .collect();
    let swapped = doc.insert(JsonSchema::reference("#/definitions/Swapped"));
    let mut root = JsonSchema::new();
    root.one_of = ids.clone();
    let root = doc.insert(root);

    let (first, second, third, fourth) = (ids[0], ids[1], ids[2], ids[3]);
    let mut paths = Vec::new();
    let mut visitor = from_fn(|_doc, reference, path, _hint| {
        paths.push(path.to_string());
        Ok(match reference {
            r if r == first || r == third => None,
            r if r == fourth => Some(swapped),
            r => Some(r),
        })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    assert_eq!(
        paths,
        vec!["#", "#/oneOf[0]", "#/oneOf[1]", "#/oneOf[2]", "#/oneOf[3]"]
    );
    assert_eq!(doc.schema(root).unwrap().one_of, vec![second, swapped]);
}

#[tokio::test]
async fn test_deleted_definition_disappears_from_output() {
    let mut doc = codec::from_str(
        r##"{ "definitions": { "abc": { "$ref": "#/definitions/Gone" } } }"##,
    )
    .unwrap();
    let root = doc.root().unwrap();

    let mut visitor = from_fn(|_doc, reference, path, _hint| {
        Ok(if path == "#/definitions/abc" {
            None
        } else {
            Some(reference)
        })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    assert!(doc.schema(root).unwrap().definitions.is_empty());
    let mut recorder = Recorder::default();
    visit(&mut doc, root, &mut recorder).await.unwrap();
    assert_eq!(recorder.paths(), vec!["#"]);
    assert_eq!(codec::to_string(&doc).unwrap(), "{}");
}

#[tokio::test]
async fn test_deleting_last_extension_leaves_none() {
    let mut doc =
        codec::from_str(r##"{ "type": "object", "x-link": { "$ref": "#/x" } }"##).unwrap();
    let root = doc.root().unwrap();

    let mut visitor = from_fn(|_doc, reference, path, _hint| {
        Ok(if path == "#/x-link" { None } else { Some(reference) })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    assert!(doc.schema(root).unwrap().extension_data.is_none());
    assert_eq!(codec::to_string(&doc).unwrap(), r#"{"type":"object"}"#);
}

#[tokio::test]
async fn test_root_replacement_is_rejected() {
    let mut doc = load(include_str!("fixtures/all_slots.json"));
    let root = doc.root().unwrap();
    let other = doc.insert(JsonSchema::new());
    let before = codec::to_string(&doc).unwrap();

    let mut visitor = from_fn(move |_doc, _reference, _path, _hint| Ok(Some(other)));
    let err = visit(&mut doc, root, &mut visitor).await.unwrap_err();

    match err {
        VisitError::UnsupportedMutation(message) => assert_eq!(message, "Cannot replace the root."),
        other => panic!("Expected UnsupportedMutation, got {:?}", other),
    }
    assert_eq!(doc.root(), Some(root));
    assert_eq!(codec::to_string(&doc).unwrap(), before);
}

#[tokio::test]
async fn test_root_deletion_is_rejected() {
    let mut doc = SchemaDocument::with_root(JsonSchema::new());
    let root = doc.root().unwrap();

    let mut visitor = from_fn(|_doc, _reference, _path, _hint| Ok(None));
    let err = visit(&mut doc, root, &mut visitor).await.unwrap_err();

    assert!(matches!(err, VisitError::UnsupportedMutation(_)));
    assert!(doc.schema(root).is_some());
}

// =============================================================================
// Derived Members
// =============================================================================

#[tokio::test]
async fn test_derived_members_walked_without_core_names() {
    let mut doc = SchemaDocument::new();
    let custom = doc.insert(JsonSchema::reference("#/definitions/Custom"));
    let shadow = doc.insert(JsonSchema::reference("#/definitions/Shadow"));
    let replacement = doc.insert(JsonSchema::reference("#/definitions/Replaced"));
    let mut root = JsonSchema::new();
    root.derived = Some(
        ObjectNode::new("OperationSchema")
            .with_member(Member::new("x-custom", Some(custom)))
            .with_member(Member::new("properties", Some(shadow))),
    );
    let root = doc.insert(root);

    let mut hints = Vec::new();
    let mut visitor = from_fn(|_doc, reference, path, hint| {
        hints.push((path.to_string(), hint.map(str::to_string)));
        Ok(if reference == custom {
            Some(replacement)
        } else {
            Some(reference)
        })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    assert_eq!(
        hints,
        vec![
            ("#".to_string(), None),
            ("#/x-custom".to_string(), Some("x-custom".to_string())),
        ]
    );
    let derived = doc.schema(root).unwrap().derived.as_ref().unwrap();
    assert_eq!(derived.member("x-custom").unwrap().value, Some(replacement));
}

#[tokio::test]
async fn test_object_member_deletion_clears_value() {
    let mut doc = SchemaDocument::new();
    let get = doc.insert(JsonSchema::reference("#/definitions/Get"));
    let object = doc.insert(ObjectNode::new("PathItem").with_member(Member::new("get", Some(get))));
    let mut root = JsonSchema::new();
    root.set_extension("x-path", object);
    let root = doc.insert(root);

    let mut visitor = from_fn(move |_doc, reference, _path, _hint| {
        Ok(if reference == get { None } else { Some(reference) })
    });
    visit(&mut doc, root, &mut visitor).await.unwrap();

    match doc.get(object) {
        Some(Node::Object(object)) => assert_eq!(object.member("get").unwrap().value, None),
        other => panic!("Expected object, got {:?}", other),
    }
}

// =============================================================================
// Cancellation and Failures
// =============================================================================

/// Deletes the first node it sees below the root, then cancels
struct DeleteThenCancel {
    calls: usize,
}

#[async_trait]
impl ReferenceVisitor for DeleteThenCancel {
    async fn visit_reference(
        &mut self,
        _doc: &mut SchemaDocument,
        reference: NodeId,
        path: &str,
        _type_name_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<NodeId>> {
        self.calls += 1;
        if path == "#" {
            return Ok(Some(reference));
        }
        cancel.cancel();
        Ok(None)
    }
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let mut doc = load(include_str!("fixtures/all_slots.json"));
    let root = doc.root().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut recorder = Recorder::default();
    let err = visit_with_cancel(&mut doc, root, &mut recorder, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(recorder.calls.is_empty());
}

#[tokio::test]
async fn test_cancel_during_traversal_stops_mutation() {
    let mut doc = codec::from_str(
        r##"{ "definitions": { "A": { "$ref": "#/a" }, "B": { "$ref": "#/b" } } }"##,
    )
    .unwrap();
    let root = doc.root().unwrap();
    let cancel = CancellationToken::new();

    let mut visitor = DeleteThenCancel { calls: 0 };
    let err = visit_with_cancel(&mut doc, root, &mut visitor, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, VisitError::Cancelled));
    assert_eq!(visitor.calls, 2);
    let definitions = &doc.schema(root).unwrap().definitions;
    assert!(!definitions.contains_key("A"));
    assert!(definitions.contains_key("B"));
}

#[tokio::test]
async fn test_elapsed_timeout_cancels() {
    let mut doc = load(include_str!("fixtures/all_slots.json"));
    let root = doc.root().unwrap();
    let cancel = CancellationToken::with_timeout(Duration::ZERO);

    let mut recorder = Recorder::default();
    let err = visit_with_cancel(&mut doc, root, &mut recorder, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(recorder.calls.is_empty());
}

#[tokio::test]
async fn test_hook_failure_keeps_earlier_replacements() {
    let mut doc = codec::from_str(
        r##"{ "definitions": {
            "A": { "$ref": "#/a" },
            "B": { "$ref": "#/b" },
            "C": { "$ref": "#/c" }
        } }"##,
    )
    .unwrap();
    let root = doc.root().unwrap();

    let mut visitor = from_fn(|_doc, reference, path, _hint| match path {
        "#/definitions/A" => Ok(None),
        "#/definitions/B" => Err(anyhow::anyhow!("resolver unavailable").into()),
        _ => Ok(Some(reference)),
    });
    let err = visit(&mut doc, root, &mut visitor).await.unwrap_err();

    assert!(matches!(err, VisitError::Hook(_)));
    assert_eq!(err.to_string(), "resolver unavailable");
    let definitions = &doc.schema(root).unwrap().definitions;
    assert_eq!(definitions.keys().collect::<Vec<_>>(), vec!["B", "C"]);
}

// =============================================================================
// Async Hooks
// =============================================================================

/// Suspends before answering, like a hook resolving an external document
struct Suspending {
    resolved: usize,
}

#[async_trait]
impl ReferenceVisitor for Suspending {
    async fn visit_reference(
        &mut self,
        doc: &mut SchemaDocument,
        reference: NodeId,
        _path: &str,
        _type_name_hint: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<Option<NodeId>> {
        tokio::task::yield_now().await;
        if doc.get(reference).and_then(Node::reference_path).is_some() {
            self.resolved += 1;
        }
        Ok(Some(reference))
    }
}

#[tokio::test]
async fn test_suspending_hook() {
    let mut doc = load(include_str!("fixtures/messages_components.json"));
    let root = doc.root().unwrap();
    let mut visitor = Suspending { resolved: 0 };

    visit(&mut doc, root, &mut visitor).await.unwrap();

    assert_eq!(visitor.resolved, 3);
}

#[tokio::test]
async fn test_independent_documents_walk_concurrently() {
    let handles: Vec<_> = [
        include_str!("fixtures/all_slots.json"),
        include_str!("fixtures/messages_components.json"),
    ]
    .into_iter()
    .map(|source| {
        let mut doc = load(source);
        tokio::spawn(async move {
            let root = doc.root().unwrap();
            let mut collector = ReferenceCollector::new();
            visit(&mut doc, root, &mut collector)
                .await
                .map(|_| collector.into_references().len())
        })
    })
    .collect();

    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap());
    }
    assert_eq!(counts, vec![13, 3]);
}
