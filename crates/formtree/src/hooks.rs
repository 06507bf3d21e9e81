//! extension points
//!
//! Each extension point is an ordered list of callbacks. Callbacks run in registration order, each one receiving
//! the value returned by the previous one.
use crate::block::BlockNode;
use crate::context::{AccessPlan, FormContext};
use crate::settings::FieldSettings;

type SettingsFilter = Box<dyn Fn(FieldSettings, &BlockNode) -> Option<FieldSettings>>;
type VisibleFilter = Box<dyn Fn(bool, &BlockNode) -> bool>;
type BlocksFilter = Box<dyn Fn(Vec<BlockNode>, &str, &FormContext) -> Vec<BlockNode>>;
type FieldsFilter = Box<dyn Fn(Vec<FieldSettings>, &str, &FormContext) -> Vec<FieldSettings>>;
type MarkupFilter = Box<dyn Fn(String, &str, &FormContext) -> String>;
type FreeEnrollFilter = Box<dyn Fn(Vec<FieldSettings>, &AccessPlan) -> Vec<FieldSettings>>;

#[derive(Default)]
pub struct Hooks {
    settings: Vec<SettingsFilter>,
    block_visible: Vec<VisibleFilter>,
    form_blocks: Vec<BlocksFilter>,
    form_fields: Vec<FieldsFilter>,
    additional_fields: Vec<FieldsFilter>,
    form_markup: Vec<MarkupFilter>,
    free_enroll_fields: Vec<FreeEnrollFilter>,
}

impl Hooks {
    /// Transform a field's settings after they were mapped from a block
    ///
    /// Returning `None` excludes the field from the form.
    pub fn on_settings(
        &mut self,
        filter: impl Fn(FieldSettings, &BlockNode) -> Option<FieldSettings> + 'static,
    ) -> &mut Self {
        self.settings.push(Box::new(filter));
        self
    }

    /// Override the result of a visibility probe
    pub fn on_block_visible(
        &mut self,
        filter: impl Fn(bool, &BlockNode) -> bool + 'static,
    ) -> &mut Self {
        self.block_visible.push(Box::new(filter));
        self
    }

    /// Modify the composed block list of a form
    pub fn on_form_blocks(
        &mut self,
        filter: impl Fn(Vec<BlockNode>, &str, &FormContext) -> Vec<BlockNode> + 'static,
    ) -> &mut Self {
        self.form_blocks.push(Box::new(filter));
        self
    }

    /// Modify the extracted field list of a form
    pub fn on_form_fields(
        &mut self,
        filter: impl Fn(Vec<FieldSettings>, &str, &FormContext) -> Vec<FieldSettings> + 'static,
    ) -> &mut Self {
        self.form_fields.push(Box::new(filter));
        self
    }

    /// Add fields to a form programmatically
    ///
    /// The first callback receives an empty list.
    pub fn on_additional_fields(
        &mut self,
        filter: impl Fn(Vec<FieldSettings>, &str, &FormContext) -> Vec<FieldSettings> + 'static,
    ) -> &mut Self {
        self.additional_fields.push(Box::new(filter));
        self
    }

    pub fn on_form_markup(
        &mut self,
        filter: impl Fn(String, &str, &FormContext) -> String + 'static,
    ) -> &mut Self {
        self.form_markup.push(Box::new(filter));
        self
    }

    pub fn on_free_enroll_fields(
        &mut self,
        filter: impl Fn(Vec<FieldSettings>, &AccessPlan) -> Vec<FieldSettings> + 'static,
    ) -> &mut Self {
        self.free_enroll_fields.push(Box::new(filter));
        self
    }
}

impl Hooks {
    pub fn apply_settings(&self, settings: FieldSettings, node: &BlockNode) -> Option<FieldSettings> {
        self.settings
            .iter()
            .try_fold(settings, |settings, filter| filter(settings, node))
    }

    pub fn apply_block_visible(&self, visible: bool, node: &BlockNode) -> bool {
        self.block_visible
            .iter()
            .fold(visible, |visible, filter| filter(visible, node))
    }

    pub fn apply_form_blocks(
        &self,
        blocks: Vec<BlockNode>,
        location: &str,
        context: &FormContext,
    ) -> Vec<BlockNode> {
        self.form_blocks
            .iter()
            .fold(blocks, |blocks, filter| filter(blocks, location, context))
    }

    pub fn apply_form_fields(
        &self,
        fields: Vec<FieldSettings>,
        location: &str,
        context: &FormContext,
    ) -> Vec<FieldSettings> {
        self.form_fields
            .iter()
            .fold(fields, |fields, filter| filter(fields, location, context))
    }

    pub fn additional_fields(&self, location: &str, context: &FormContext) -> Vec<FieldSettings> {
        self.additional_fields
            .iter()
            .fold(vec![], |fields, filter| filter(fields, location, context))
    }

    pub fn apply_form_markup(&self, markup: String, location: &str, context: &FormContext) -> String {
        self.form_markup
            .iter()
            .fold(markup, |markup, filter| filter(markup, location, context))
    }

    pub fn apply_free_enroll_fields(
        &self,
        fields: Vec<FieldSettings>,
        plan: &AccessPlan,
    ) -> Vec<FieldSettings> {
        self.free_enroll_fields
            .iter()
            .fold(fields, |fields, filter| filter(fields, plan))
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("settings", &self.settings.len())
            .field("block_visible", &self.block_visible.len())
            .field("form_blocks", &self.form_blocks.len())
            .field("form_fields", &self.form_fields.len())
            .field("additional_fields", &self.additional_fields.len())
            .field("form_markup", &self.form_markup.len())
            .field("free_enroll_fields", &self.free_enroll_fields.len())
            .finish()
    }
}
