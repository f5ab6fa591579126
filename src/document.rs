//! Schema document node model
//!
//! Nodes live in a [`SchemaDocument`] arena and are addressed by [`NodeId`].
//! The id is the node's identity: the same id reachable from two parents is
//! one shared node, two ids holding equal content are two nodes. Cycles are
//! plain id links back up the graph.

use indexmap::IndexMap;
use serde_json::Value;

/// Index of a node inside its [`SchemaDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Keyed child slot, insertion ordered. Values are never null: an absent
/// entry is a missing key.
pub type SlotMap = IndexMap<String, NodeId>;

// =============================================================================
// Schema slots
// =============================================================================

/// Single-valued child slots of a [`JsonSchema`], in visit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaField {
    AdditionalItems,
    AdditionalProperties,
    Item,
    Not,
    DictionaryKey,
    Discriminator,
}

impl SchemaField {
    pub const ALL: [SchemaField; 6] = [
        SchemaField::AdditionalItems,
        SchemaField::AdditionalProperties,
        SchemaField::Item,
        SchemaField::Not,
        SchemaField::DictionaryKey,
        SchemaField::Discriminator,
    ];

    /// Member name in the JSON document
    pub fn json_name(&self) -> &'static str {
        match self {
            SchemaField::AdditionalItems => "additionalItems",
            SchemaField::AdditionalProperties => "additionalProperties",
            SchemaField::Item => "items",
            SchemaField::Not => "not",
            SchemaField::DictionaryKey => "x-dictionaryKey",
            SchemaField::Discriminator => "discriminator",
        }
    }
}

/// Ordered multi-valued child slots of a [`JsonSchema`], in visit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaList {
    Items,
    AllOf,
    AnyOf,
    OneOf,
}

impl SchemaList {
    pub const ALL: [SchemaList; 4] = [
        SchemaList::Items,
        SchemaList::AllOf,
        SchemaList::AnyOf,
        SchemaList::OneOf,
    ];

    pub fn json_name(&self) -> &'static str {
        match self {
            SchemaList::Items => "items",
            SchemaList::AllOf => "allOf",
            SchemaList::AnyOf => "anyOf",
            SchemaList::OneOf => "oneOf",
        }
    }
}

/// Keyed multi-valued child slots of a [`JsonSchema`], in visit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaMap {
    Properties,
    PatternProperties,
    Definitions,
}

impl SchemaMap {
    pub const ALL: [SchemaMap; 3] = [
        SchemaMap::Properties,
        SchemaMap::PatternProperties,
        SchemaMap::Definitions,
    ];

    pub fn json_name(&self) -> &'static str {
        match self {
            SchemaMap::Properties => "properties",
            SchemaMap::PatternProperties => "patternProperties",
            SchemaMap::Definitions => "definitions",
        }
    }

    /// Whether entry keys double as type name hints for the visitor.
    /// Pattern keys are regexes, not names.
    pub fn keys_are_type_names(&self) -> bool {
        !matches!(self, SchemaMap::PatternProperties)
    }
}

/// Member names owned by the core schema model. Derived schema members with
/// one of these names are never walked a second time.
pub const RESERVED_SCHEMA_MEMBERS: &[&str] = &[
    "$ref",
    "$schema",
    "$id",
    "id",
    "type",
    "title",
    "description",
    "format",
    "required",
    "enum",
    "default",
    "additionalItems",
    "additionalProperties",
    "items",
    "not",
    "x-dictionaryKey",
    "discriminator",
    "allOf",
    "anyOf",
    "oneOf",
    "properties",
    "patternProperties",
    "definitions",
];

pub fn is_reserved_schema_member(name: &str) -> bool {
    RESERVED_SCHEMA_MEMBERS.contains(&name)
}

// =============================================================================
// Node kinds
// =============================================================================

/// The core schema node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonSchema {
    /// Raw `$ref` target. Never followed by the walker.
    pub reference_path: Option<String>,
    /// Recognised keywords without schema children (`type`, `required`,
    /// boolean `additionalProperties`, ...)
    pub keywords: IndexMap<String, Value>,

    pub additional_items_schema: Option<NodeId>,
    pub additional_properties_schema: Option<NodeId>,
    /// Single-schema form of `items`
    pub item: Option<NodeId>,
    /// Tuple form of `items`
    pub items: Vec<NodeId>,
    pub all_of: Vec<NodeId>,
    pub any_of: Vec<NodeId>,
    pub one_of: Vec<NodeId>,
    pub not: Option<NodeId>,
    pub dictionary_key: Option<NodeId>,
    /// Discriminator as found in the document: text or structured object
    pub discriminator: Option<NodeId>,

    pub properties: SlotMap,
    pub pattern_properties: SlotMap,
    pub definitions: SlotMap,

    /// Unrecognised document members. `None` until something is added.
    pub extension_data: Option<SlotMap>,

    /// Members contributed by a custom schema kind
    pub derived: Option<ObjectNode>,

    /// Member order seen by the parser
    pub(crate) member_order: Vec<String>,
}

impl JsonSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema consisting only of a `$ref`
    pub fn reference(path: impl Into<String>) -> Self {
        Self {
            reference_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_keyword(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keywords.insert(name.into(), value);
        self
    }

    pub fn field(&self, field: SchemaField) -> Option<NodeId> {
        match field {
            SchemaField::AdditionalItems => self.additional_items_schema,
            SchemaField::AdditionalProperties => self.additional_properties_schema,
            SchemaField::Item => self.item,
            SchemaField::Not => self.not,
            SchemaField::DictionaryKey => self.dictionary_key,
            SchemaField::Discriminator => self.discriminator,
        }
    }

    pub fn field_mut(&mut self, field: SchemaField) -> &mut Option<NodeId> {
        match field {
            SchemaField::AdditionalItems => &mut self.additional_items_schema,
            SchemaField::AdditionalProperties => &mut self.additional_properties_schema,
            SchemaField::Item => &mut self.item,
            SchemaField::Not => &mut self.not,
            SchemaField::DictionaryKey => &mut self.dictionary_key,
            SchemaField::Discriminator => &mut self.discriminator,
        }
    }

    pub fn list(&self, list: SchemaList) -> &Vec<NodeId> {
        match list {
            SchemaList::Items => &self.items,
            SchemaList::AllOf => &self.all_of,
            SchemaList::AnyOf => &self.any_of,
            SchemaList::OneOf => &self.one_of,
        }
    }

    pub fn list_mut(&mut self, list: SchemaList) -> &mut Vec<NodeId> {
        match list {
            SchemaList::Items => &mut self.items,
            SchemaList::AllOf => &mut self.all_of,
            SchemaList::AnyOf => &mut self.any_of,
            SchemaList::OneOf => &mut self.one_of,
        }
    }

    pub fn map(&self, map: SchemaMap) -> &SlotMap {
        match map {
            SchemaMap::Properties => &self.properties,
            SchemaMap::PatternProperties => &self.pattern_properties,
            SchemaMap::Definitions => &self.definitions,
        }
    }

    pub fn map_mut(&mut self, map: SchemaMap) -> &mut SlotMap {
        match map {
            SchemaMap::Properties => &mut self.properties,
            SchemaMap::PatternProperties => &mut self.pattern_properties,
            SchemaMap::Definitions => &mut self.definitions,
        }
    }

    /// Add or overwrite one extension member
    pub fn set_extension(&mut self, key: impl Into<String>, value: NodeId) {
        self.extension_data
            .get_or_insert_with(SlotMap::new)
            .insert(key.into(), value);
    }

    /// Remove one extension member. The mapping itself goes back to `None`
    /// once its last entry is gone.
    pub fn remove_extension(&mut self, key: &str) -> Option<NodeId> {
        let data = self.extension_data.as_mut()?;
        let removed = data.shift_remove(key);
        if data.is_empty() {
            self.extension_data = None;
        }
        removed
    }

    pub fn extension(&self, key: &str) -> Option<NodeId> {
        self.extension_data.as_ref()?.get(key).copied()
    }
}

/// A pointer-bearing node that is not a schema, e.g. a `{"$ref": ...}`
/// object inside an extension region
#[derive(Debug, Clone, PartialEq)]
pub struct JsonReference {
    pub reference_path: String,
    /// Sibling members of `$ref`, walked as a keyed mapping
    pub members: SlotMap,
}

impl JsonReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            reference_path: path.into(),
            members: SlotMap::new(),
        }
    }
}

/// One declared member of an [`ObjectNode`]
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub value: Option<NodeId>,
    /// Never serialized nor walked
    pub ignored: bool,
    /// Declared but currently not serialized, so not walked either
    pub skip_serializing: bool,
}

impl Member {
    pub fn new(name: impl Into<String>, value: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            value,
            ignored: false,
            skip_serializing: false,
        }
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn skip_serializing(mut self) -> Self {
        self.skip_serializing = true;
        self
    }

    /// Whether the structural walker should descend into this member
    pub fn is_walkable(&self) -> bool {
        !self.ignored && !self.skip_serializing && self.value.is_some()
    }
}

/// Structured object whose shape is only known at runtime through its
/// member descriptors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectNode {
    pub type_name: String,
    pub members: Vec<Member>,
}

impl ObjectNode {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.name == name)
    }
}

/// Keyed mapping that also declares its own members, e.g. an OpenAPI path
/// item holding both operations and `x-` entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictionaryNode {
    pub entries: SlotMap,
    pub object: ObjectNode,
}

impl DictionaryNode {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            entries: SlotMap::new(),
            object: ObjectNode::new(type_name),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: NodeId) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.object.members.push(member);
        self
    }
}

/// Every kind of value a document can hold
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Schema(JsonSchema),
    Reference(JsonReference),
    Object(ObjectNode),
    /// Keyed mapping
    Map(SlotMap),
    /// Keyed mapping with declared members; entries are walked first
    Dictionary(DictionaryNode),
    /// Ordered sequence, mutable by index
    List(Vec<NodeId>),
    /// Forward-only sequence; children can be visited but not replaced
    Sequence(Vec<NodeId>),
    /// Primitive or text leaf
    Scalar(Value),
}

impl Node {
    pub fn is_reference_capable(&self) -> bool {
        matches!(self, Node::Schema(_) | Node::Reference(_))
    }

    /// `$ref` target of a reference-capable node, if it has one
    pub fn reference_path(&self) -> Option<&str> {
        match self {
            Node::Schema(schema) => schema.reference_path.as_deref(),
            Node::Reference(reference) => Some(&reference.reference_path),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<&JsonSchema> {
        match self {
            Node::Schema(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn as_schema_mut(&mut self) -> Option<&mut JsonSchema> {
        match self {
            Node::Schema(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Schema(_) => "schema",
            Node::Reference(_) => "reference",
            Node::Object(_) => "object",
            Node::Map(_) => "map",
            Node::Dictionary(_) => "dictionary",
            Node::List(_) => "list",
            Node::Sequence(_) => "sequence",
            Node::Scalar(_) => "scalar",
        }
    }
}

impl From<JsonSchema> for Node {
    fn from(schema: JsonSchema) -> Self {
        Node::Schema(schema)
    }
}

impl From<JsonReference> for Node {
    fn from(reference: JsonReference) -> Self {
        Node::Reference(reference)
    }
}

impl From<ObjectNode> for Node {
    fn from(object: ObjectNode) -> Self {
        Node::Object(object)
    }
}

impl From<DictionaryNode> for Node {
    fn from(dictionary: DictionaryNode) -> Self {
        Node::Dictionary(dictionary)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Scalar(value)
    }
}

// =============================================================================
// Document arena
// =============================================================================

/// Arena owning every node of one schema document
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl SchemaDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document whose root is `node`
    pub fn with_root(node: impl Into<Node>) -> Self {
        let mut doc = Self::new();
        let root = doc.insert(node);
        doc.root = Some(root);
        doc
    }

    /// Allocate a node. Ids are never reused.
    pub fn insert(&mut self, node: impl Into<Node>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node.into());
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn schema(&self, id: NodeId) -> Option<&JsonSchema> {
        self.get(id)?.as_schema()
    }

    pub fn schema_mut(&mut self, id: NodeId) -> Option<&mut JsonSchema> {
        self.get_mut(id)?.as_schema_mut()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// Number of allocated nodes, reachable or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
