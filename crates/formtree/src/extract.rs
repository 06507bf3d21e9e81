//! flatten a composed form into field settings
use crate::block::BlockNode;
use crate::settings::{FieldSettings, SettingsMapper};
use crate::visit::VisitLeaves;
use serde_json::Value;

pub struct FieldExtractor<'a> {
    mapper: &'a SettingsMapper<'a>,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(mapper: &'a SettingsMapper<'a>) -> Self {
        Self { mapper }
    }

    /// Settings of all field leaves in tree order
    ///
    /// Field blocks and raw markup blocks of type `html` (synthetic fields) are collected. Fields excluded by a
    /// settings hook are skipped.
    pub fn extract(&self, nodes: &[BlockNode]) -> Vec<FieldSettings> {
        let mut fields = vec![];
        nodes.visit_leaves(&mut |node: &BlockNode| {
            if node.is_field() || node.is_html_field() {
                fields.extend(self.mapper.to_settings(node));
            }
        });

        tracing::trace!(count = fields.len(), "fields extracted");
        fields
    }
}

/// First field whose setting `key` equals `value`
pub fn field_by<'f>(fields: &'f [FieldSettings], key: &str, value: &Value) -> Option<&'f FieldSettings> {
    field_index_by(fields, key, value).map(|index| &fields[index])
}

/// Index of the first field whose setting `key` equals `value`
pub fn field_index_by(fields: &[FieldSettings], key: &str, value: &Value) -> Option<usize> {
    fields
        .iter()
        .position(|field| field.get(key).as_ref() == Some(value))
}
