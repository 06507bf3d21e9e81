//! block tree data model
//!
//! A form is stored as an ordered list of [BlockNode]s. A node is either a container (it owns child nodes) or a
//! content leaf (it carries a literal markup payload), never both. [Inner] encodes that choice so the invariant
//! holds by construction.
use indexmap::IndexMap;
use serde::Serialize;

/// Block-specific attributes, untyped until normalized by [crate::settings]
pub type Attributes = IndexMap<String, serde_json::Value>;

/// Prefix shared by all form field block types
pub const FIELD_PREFIX: &str = "llms/form-field-";
/// Anchor for the password strength meter
pub const PASSWORD_FIELD: &str = "llms/form-field-user-password";
pub const USERNAME_FIELD: &str = "llms/form-field-user-username";
/// Pointer to externally stored content, the pointer lives in [REFERENCE_ATTR]
pub const REFERENCE_BLOCK: &str = "core/block";
pub const REFERENCE_ATTR: &str = "ref";
/// Raw markup block, its subtype lives in the `type` attribute
pub const HTML_BLOCK: &str = "core/html";
pub const VISIBILITY_ATTR: &str = "llms_visibility";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockNode {
    /// Block type, empty for anonymous nodes
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Attributes,
    #[serde(flatten)]
    pub inner: Inner,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Inner {
    /// Child blocks in semantic order (may be empty)
    Children(Vec<BlockNode>),
    /// Literal markup payload
    RawContent(String),
}

impl BlockNode {
    pub fn container(kind: impl Into<String>, attributes: Attributes, children: Vec<BlockNode>) -> Self {
        Self {
            kind: kind.into(),
            attributes,
            inner: Inner::Children(children),
        }
    }

    /// A node without children or content
    pub fn empty(kind: impl Into<String>, attributes: Attributes) -> Self {
        Self::container(kind, attributes, vec![])
    }

    pub fn markup(kind: impl Into<String>, attributes: Attributes, raw: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes,
            inner: Inner::RawContent(raw.into()),
        }
    }

    /// Anonymous markup leaf
    pub fn freeform(raw: impl Into<String>) -> Self {
        Self::markup("", Attributes::new(), raw)
    }

    pub fn is_anonymous(&self) -> bool {
        self.kind.is_empty()
    }

    pub fn children(&self) -> &[BlockNode] {
        match &self.inner {
            Inner::Children(children) => children,
            Inner::RawContent(_) => &[],
        }
    }

    /// Mutable access to the child list
    ///
    /// A content leaf has no children, `None` is returned for it.
    pub fn children_mut(&mut self) -> Option<&mut Vec<BlockNode>> {
        match &mut self.inner {
            Inner::Children(children) => Some(children),
            Inner::RawContent(_) => None,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children().is_empty()
    }

    pub fn raw_content(&self) -> Option<&str> {
        match &self.inner {
            Inner::RawContent(raw) => Some(raw),
            Inner::Children(_) => None,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// String attribute, `None` when absent, empty or not a string
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key)
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn attr_truthy(&self, key: &str) -> bool {
        self.attr(key).is_some_and(is_truthy)
    }

    pub fn is_field(&self) -> bool {
        self.kind.starts_with(FIELD_PREFIX)
    }

    pub fn is_reference(&self) -> bool {
        self.kind == REFERENCE_BLOCK
    }

    /// Raw markup block whose subtype is exactly `html`
    pub fn is_html_field(&self) -> bool {
        self.kind == HTML_BLOCK
            && self.attr("type").and_then(serde_json::Value::as_str) == Some("html")
    }
}

/// Boolean interpretation of loosely typed attribute values
///
/// `true`, non-zero numbers and the strings `1`, `true`, `on`, `yes` (any case) are true. Everything else is false.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Build [Attributes] from a `serde_json::json!` object
///
/// Anything but an object yields empty attributes.
pub fn attributes(value: serde_json::Value) -> Attributes {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => Attributes::new(),
    }
}
