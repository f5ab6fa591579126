//! JSON codec for schema documents
//!
//! Converts between `serde_json::Value` and a [`SchemaDocument`].
//!
//! - Members of a schema that hold schemas become child slots; every other
//!   recognised keyword is kept verbatim in [`JsonSchema::keywords`].
//! - Unrecognised members land in `extension_data`, parsed generically:
//!   objects with a string `$ref` become [`JsonReference`] nodes, other
//!   objects become maps, arrays become lists.
//! - `null` entries of `properties`, `patternProperties` and `definitions`
//!   are dropped. Empty keyed slots and empty extension data are omitted on
//!   output.
//! - Member order is preserved for parsed schemas.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::document::{
    JsonReference, JsonSchema, Member, Node, NodeId, ObjectNode, SchemaDocument, SchemaField,
    SchemaList, SchemaMap, SlotMap,
};
use crate::error::CodecError;

/// Keywords stored verbatim on the schema rather than as extension data
pub const SCHEMA_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "id",
    "type",
    "title",
    "description",
    "format",
    "default",
    "enum",
    "const",
    "required",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
    "readOnly",
    "writeOnly",
    "deprecated",
    "example",
    "examples",
    "nullable",
    "x-nullable",
    "x-enumNames",
    "x-abstract",
];

type CodecResult<T> = std::result::Result<T, CodecError>;

/// Parse JSON text into a document
pub fn from_str(text: &str) -> CodecResult<SchemaDocument> {
    let value: Value = serde_json::from_str(text)?;
    from_value(&value)
}

/// Build a document whose root schema is `value`
pub fn from_value(value: &Value) -> CodecResult<SchemaDocument> {
    let Value::Object(object) = value else {
        return Err(CodecError::InvalidDocument(format!(
            "root must be a JSON object, found {}",
            json_kind(value)
        )));
    };
    let mut doc = SchemaDocument::new();
    let root = parse_schema(&mut doc, object);
    doc.set_root(root);
    Ok(doc)
}

/// Print the document's root
pub fn to_value(doc: &SchemaDocument) -> CodecResult<Value> {
    let root = doc
        .root()
        .ok_or_else(|| CodecError::InvalidDocument("document has no root".to_string()))?;
    node_to_value(doc, root)
}

/// Print any node of the document
pub fn node_to_value(doc: &SchemaDocument, id: NodeId) -> CodecResult<Value> {
    Printer {
        doc,
        on_stack: HashSet::new(),
    }
    .print(id, "#")
}

pub fn to_string_pretty(doc: &SchemaDocument) -> CodecResult<String> {
    Ok(serde_json::to_string_pretty(&to_value(doc)?)?)
}

pub fn to_string(doc: &SchemaDocument) -> CodecResult<String> {
    Ok(serde_json::to_string(&to_value(doc)?)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn field_for(key: &str) -> Option<SchemaField> {
    SchemaField::ALL
        .into_iter()
        .filter(|f| *f != SchemaField::Item && *f != SchemaField::Discriminator)
        .find(|f| f.json_name() == key)
}

fn list_for(key: &str) -> Option<SchemaList> {
    SchemaList::ALL
        .into_iter()
        .filter(|l| *l != SchemaList::Items)
        .find(|l| l.json_name() == key)
}

fn map_for(key: &str) -> Option<SchemaMap> {
    SchemaMap::ALL.into_iter().find(|m| m.json_name() == key)
}

fn parse_schema(doc: &mut SchemaDocument, object: &Map<String, Value>) -> NodeId {
    let mut schema = JsonSchema::new();

    for (key, value) in object {
        schema.member_order.push(key.clone());

        if key == "$ref" {
            if let Value::String(path) = value {
                schema.reference_path = Some(path.clone());
                continue;
            }
        }

        if let Some(field) = field_for(key) {
            match value {
                Value::Object(child) => *schema.field_mut(field) = Some(parse_schema(doc, child)),
                other => {
                    schema.keywords.insert(key.clone(), other.clone());
                }
            }
            continue;
        }

        if let Some(list) = list_for(key) {
            match value {
                Value::Array(items) => {
                    *schema.list_mut(list) =
                        items.iter().map(|item| parse_schema_or_value(doc, item)).collect();
                }
                other => {
                    schema.keywords.insert(key.clone(), other.clone());
                }
            }
            continue;
        }

        if let Some(map) = map_for(key) {
            match value {
                Value::Object(entries) => {
                    let slot = schema.map_mut(map);
                    for (name, entry) in entries {
                        if entry.is_null() {
                            continue;
                        }
                        let id = parse_schema_or_value(doc, entry);
                        slot.insert(name.clone(), id);
                    }
                }
                other => {
                    schema.keywords.insert(key.clone(), other.clone());
                }
            }
            continue;
        }

        match key.as_str() {
            "items" => match value {
                Value::Object(child) => schema.item = Some(parse_schema(doc, child)),
                Value::Array(items) => {
                    schema.items = items
                        .iter()
                        .map(|item| parse_schema_or_value(doc, item))
                        .collect();
                }
                other => {
                    schema.keywords.insert(key.clone(), other.clone());
                }
            },
            "discriminator" => schema.discriminator = Some(parse_discriminator(doc, value)),
            _ if SCHEMA_KEYWORDS.contains(&key.as_str()) => {
                schema.keywords.insert(key.clone(), value.clone());
            }
            _ => {
                let id = insert_value(doc, value);
                schema.set_extension(key.clone(), id);
            }
        }
    }

    doc.insert(schema)
}

/// Values inside schema-typed slots: objects are schemas, booleans and
/// anything else stay scalars
fn parse_schema_or_value(doc: &mut SchemaDocument, value: &Value) -> NodeId {
    match value {
        Value::Object(object) => parse_schema(doc, object),
        other => doc.insert(Node::Scalar(other.clone())),
    }
}

fn parse_discriminator(doc: &mut SchemaDocument, value: &Value) -> NodeId {
    match value {
        Value::Object(members) => {
            let mut object = ObjectNode::new("Discriminator");
            for (name, member) in members {
                let id = insert_value(doc, member);
                object.members.push(Member::new(name.clone(), Some(id)));
            }
            doc.insert(object)
        }
        other => doc.insert(Node::Scalar(other.clone())),
    }
}

/// Insert a plain JSON value as nodes, recognising `$ref` objects
pub(crate) fn insert_value(doc: &mut SchemaDocument, value: &Value) -> NodeId {
    match value {
        Value::Object(object) => match object.get("$ref") {
            Some(Value::String(path)) => {
                let mut reference = JsonReference::new(path.clone());
                for (key, member) in object.iter().filter(|(k, _)| k.as_str() != "$ref") {
                    let id = insert_value(doc, member);
                    reference.members.insert(key.clone(), id);
                }
                doc.insert(reference)
            }
            _ => {
                let mut map = SlotMap::new();
                for (key, member) in object {
                    let id = insert_value(doc, member);
                    map.insert(key.clone(), id);
                }
                doc.insert(Node::Map(map))
            }
        },
        Value::Array(items) => {
            let ids = items.iter().map(|item| insert_value(doc, item)).collect();
            doc.insert(Node::List(ids))
        }
        other => doc.insert(Node::Scalar(other.clone())),
    }
}

// =============================================================================
// Printing
// =============================================================================

struct Printer<'a> {
    doc: &'a SchemaDocument,
    /// Nodes on the current print path; a repeat is a cycle
    on_stack: HashSet<NodeId>,
}

impl<'a> Printer<'a> {
    fn print(&mut self, id: NodeId, path: &str) -> CodecResult<Value> {
        let doc = self.doc;
        let node = doc.get(id).ok_or_else(|| {
            CodecError::InvalidDocument(format!("{} at {} is not in the document", id, path))
        })?;
        if !self.on_stack.insert(id) {
            return Err(CodecError::Cycle {
                path: path.to_string(),
            });
        }

        let value = match node {
            Node::Schema(schema) => Value::Object(self.print_schema(schema, path)?),
            Node::Reference(reference) => {
                let mut out = Map::new();
                out.insert("$ref".to_string(), Value::String(reference.reference_path.clone()));
                self.print_entries(&reference.members, path, &mut out)?;
                Value::Object(out)
            }
            Node::Object(object) => {
                let mut out = Map::new();
                self.print_members(object, path, false, &mut out)?;
                Value::Object(out)
            }
            Node::Map(map) => {
                let mut out = Map::new();
                self.print_entries(map, path, &mut out)?;
                Value::Object(out)
            }
            Node::Dictionary(dictionary) => {
                let mut out = Map::new();
                self.print_entries(&dictionary.entries, path, &mut out)?;
                self.print_members(&dictionary.object, path, false, &mut out)?;
                Value::Object(out)
            }
            Node::List(items) | Node::Sequence(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.print(*item, &format!("{}[{}]", path, i)))
                    .collect::<CodecResult<Vec<_>>>()?,
            ),
            Node::Scalar(value) => value.clone(),
        };

        self.on_stack.remove(&id);
        Ok(value)
    }

    fn print_entries(
        &mut self,
        entries: &SlotMap,
        path: &str,
        out: &mut Map<String, Value>,
    ) -> CodecResult<()> {
        for (key, value) in entries {
            let printed = self.print(*value, &format!("{}/{}", path, key))?;
            out.insert(key.clone(), printed);
        }
        Ok(())
    }

    fn print_members(
        &mut self,
        object: &ObjectNode,
        path: &str,
        skip_reserved: bool,
        out: &mut Map<String, Value>,
    ) -> CodecResult<()> {
        for member in object.members.iter().filter(|m| m.is_walkable()) {
            if skip_reserved && crate::document::is_reserved_schema_member(&member.name) {
                continue;
            }
            if let Some(value) = member.value {
                let printed = self.print(value, &format!("{}/{}", path, member.name))?;
                out.insert(member.name.clone(), printed);
            }
        }
        Ok(())
    }

    fn print_schema(&mut self, schema: &JsonSchema, path: &str) -> CodecResult<Map<String, Value>> {
        let mut out = Map::new();

        if let Some(reference) = &schema.reference_path {
            out.insert("$ref".to_string(), Value::String(reference.clone()));
        }
        for (key, value) in &schema.keywords {
            out.insert(key.clone(), value.clone());
        }
        for field in SchemaField::ALL {
            if let Some(child) = schema.field(field) {
                let printed = self.print(child, &format!("{}/{}", path, field.json_name()))?;
                out.insert(field.json_name().to_string(), printed);
            }
        }
        for list in SchemaList::ALL {
            let items = schema.list(list);
            if items.is_empty() {
                continue;
            }
            let printed = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.print(*item, &format!("{}/{}[{}]", path, list.json_name(), i))
                })
                .collect::<CodecResult<Vec<_>>>()?;
            out.insert(list.json_name().to_string(), Value::Array(printed));
        }
        for map in SchemaMap::ALL {
            let entries = schema.map(map);
            if entries.is_empty() {
                continue;
            }
            let mut printed = Map::new();
            self.print_entries(entries, &format!("{}/{}", path, map.json_name()), &mut printed)?;
            out.insert(map.json_name().to_string(), Value::Object(printed));
        }
        if let Some(extension_data) = &schema.extension_data {
            self.print_entries(extension_data, path, &mut out)?;
        }
        if let Some(derived) = &schema.derived {
            self.print_members(derived, path, true, &mut out)?;
        }

        Ok(reorder(out, &schema.member_order))
    }
}

/// Put members back in source order; members the source did not have
/// follow in canonical order
fn reorder(out: Map<String, Value>, order: &[String]) -> Map<String, Value> {
    if order.is_empty() {
        return out;
    }
    let mut remaining: IndexMap<String, Value> = out.into_iter().collect();
    let mut ordered = Map::new();
    for key in order {
        if let Some(value) = remaining.shift_remove(key) {
            ordered.insert(key.clone(), value);
        }
    }
    ordered.extend(remaining);
    ordered
}
