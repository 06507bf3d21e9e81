//! synthetic companion fields
//!
//! The password field can ask for a strength meter. The meter is its own field and only ever added at the top
//! level of a form, right after the top-level block the password field lives in. When the password field is
//! nested in columns the meter therefore ends up below the columns, not next to the password input.
use crate::block::{Attributes, BlockNode, PASSWORD_FIELD, VISIBILITY_ATTR};
use crate::render::{custom_field_node, LeafRenderer};
use crate::settings::FieldSettings;
use serde_json::Value;

pub const METER_ID: &str = "llms-password-strength-meter";

/// Find the anchor field
///
/// Returns the top-level index of the anchor, or of the top-level container the anchor is nested in, together
/// with the anchor itself.
pub fn find_anchor(nodes: &[BlockNode]) -> Option<(usize, &BlockNode)> {
    nodes
        .iter()
        .enumerate()
        .find_map(|(index, node)| find_in(node).map(|anchor| (index, anchor)))
}

fn find_in(node: &BlockNode) -> Option<&BlockNode> {
    if node.kind == PASSWORD_FIELD {
        return Some(node);
    }

    node.children().iter().find_map(find_in)
}

pub struct DynamicFieldInjector<'a> {
    leaf: &'a dyn LeafRenderer,
}

impl<'a> DynamicFieldInjector<'a> {
    pub fn new(leaf: &'a dyn LeafRenderer) -> Self {
        Self { leaf }
    }

    /// Add the strength meter after the anchor's top-level block when the anchor enables it
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn inject(&self, mut nodes: Vec<BlockNode>) -> Vec<BlockNode> {
        let Some((index, anchor)) = find_anchor(&nodes) else {
            return nodes;
        };

        if !anchor.attr_truthy("meter") {
            return nodes;
        }

        let meter = custom_field_node(&meter_settings(anchor), self.leaf);
        tracing::debug!(after = index, "adding password strength meter");
        nodes.insert(index + 1, meter);
        nodes
    }
}

fn meter_settings(anchor: &BlockNode) -> FieldSettings {
    let copied = [
        ("description", anchor.attr("meter_description")),
        (
            "min_length",
            anchor
                .attr("html_attrs")
                .and_then(|attrs| attrs.get("minlength")),
        ),
        ("min_strength", anchor.attr("min_strength")),
        (VISIBILITY_ATTR, anchor.attr(VISIBILITY_ATTR)),
    ];

    let mut attrs = Attributes::new();
    attrs.insert("type".to_string(), "html".into());
    attrs.insert("id".to_string(), METER_ID.into());
    attrs.insert("classes".to_string(), METER_ID.into());
    for (key, value) in copied {
        if let Some(value) = value.filter(|value| !is_empty(value)) {
            attrs.insert(key.to_string(), value.clone());
        }
    }

    FieldSettings::from_attributes(attrs)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}
