//! Extension data generation
//!
//! Builds schema nodes from type descriptors and merges their extension
//! annotations into `extension_data`. Sources are applied in declaration
//! order (annotations first, then providers) and a later source wins when
//! two of them supply the same key.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use crate::codec::insert_value;
use crate::document::{JsonSchema, NodeId, SchemaDocument, SlotMap};

/// Declarative extension data attached to a type or property
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionAnnotation {
    /// One key/value pair
    Single { key: String, value: Value },
    /// Any number of pairs
    Multi(IndexMap<String, Value>),
}

impl ExtensionAnnotation {
    pub fn single(key: impl Into<String>, value: impl Into<Value>) -> Self {
        ExtensionAnnotation::Single {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn multi<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        ExtensionAnnotation::Multi(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn entries(&self) -> Vec<(String, Value)> {
        match self {
            ExtensionAnnotation::Single { key, value } => vec![(key.clone(), value.clone())],
            ExtensionAnnotation::Multi(entries) => entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Supplies extension data computed at generation time
pub trait ExtensionDataProvider: Send + Sync {
    fn extension_data(&self) -> IndexMap<String, Value>;
}

/// A property of a described type
pub struct PropertyDescriptor {
    pub name: String,
    /// Value of the generated `type` keyword
    pub type_name: Option<String>,
    pub annotations: Vec<ExtensionAnnotation>,
    pub providers: Vec<Box<dyn ExtensionDataProvider>>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            annotations: Vec::new(),
            providers: Vec::new(),
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn annotate(mut self, annotation: ExtensionAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn provider(mut self, provider: impl ExtensionDataProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

/// A type to generate an object schema for
pub struct TypeDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub annotations: Vec<ExtensionAnnotation>,
    pub providers: Vec<Box<dyn ExtensionDataProvider>>,
    pub properties: Vec<PropertyDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            annotations: Vec::new(),
            providers: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn annotate(mut self, annotation: ExtensionAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn provider(mut self, provider: impl ExtensionDataProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }
}

/// Generate an object schema for `ty` into `doc` and return its id.
/// The document root is left untouched.
pub fn generate_schema(doc: &mut SchemaDocument, ty: &TypeDescriptor) -> NodeId {
    let mut schema = JsonSchema::new()
        .with_keyword("type", Value::from("object"))
        .with_keyword("title", Value::from(ty.name.as_str()));
    if let Some(description) = &ty.description {
        schema
            .keywords
            .insert("description".to_string(), Value::from(description.as_str()));
    }

    for property in &ty.properties {
        let mut child = JsonSchema::new();
        if let Some(type_name) = &property.type_name {
            child
                .keywords
                .insert("type".to_string(), Value::from(type_name.as_str()));
        }
        child.extension_data =
            merge_extension_data(doc, &property.annotations, &property.providers);
        let child = doc.insert(child);
        schema.properties.insert(property.name.clone(), child);
    }

    schema.extension_data = merge_extension_data(doc, &ty.annotations, &ty.providers);
    trace!(
        type_name = %ty.name,
        properties = ty.properties.len(),
        "generated schema"
    );
    doc.insert(schema)
}

/// Generate a document whose root is the schema for `ty`
pub fn generate_document(ty: &TypeDescriptor) -> SchemaDocument {
    let mut doc = SchemaDocument::new();
    let root = generate_schema(&mut doc, ty);
    doc.set_root(root);
    doc
}

/// Merge annotations and providers into an extension map; `None` when
/// nothing was supplied
pub fn merge_extension_data(
    doc: &mut SchemaDocument,
    annotations: &[ExtensionAnnotation],
    providers: &[Box<dyn ExtensionDataProvider>],
) -> Option<SlotMap> {
    let mut merged: IndexMap<String, Value> = IndexMap::new();
    for (key, value) in annotations.iter().flat_map(ExtensionAnnotation::entries) {
        merged.insert(key, value);
    }
    for provider in providers {
        merged.extend(provider.extension_data());
    }

    if merged.is_empty() {
        return None;
    }
    Some(
        merged
            .into_iter()
            .map(|(key, value)| {
                let id = insert_value(doc, &value);
                (key, id)
            })
            .collect(),
    )
}
