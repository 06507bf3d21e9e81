//! form composition
//!
//! [FormEngine::compose_form] runs the composition passes once and returns a [ComposedForm]. Both the field list
//! (used to validate a submission) and the markup (shown to the user) are derived from that same value, so what
//! gets validated is what was shown.
//!
//! ```text
//! stored content ─ parse ─ resolve references ─ cascade visibility ─ inject meter ─ form_blocks hook
//!                                                                                        │
//!                                          ┌─────────────────────────────────────────────┤
//!                                          │                                             │
//!                             extract fields (+ programmatic)             render markup (+ programmatic)
//! ```
use crate::block::{BlockNode, USERNAME_FIELD};
use crate::context::{AccessPlan, FormContext};
use crate::extract::{self, FieldExtractor};
use crate::hooks::Hooks;
use crate::inject::DynamicFieldInjector;
use crate::location::{LocationRegistry, CHECKOUT};
use crate::parse::parse;
use crate::probe::{RenderMode, VisibilityProbe};
use crate::reference::{ReferenceResolver, DEFAULT_MAX_DEPTH};
use crate::render::{custom_field_node, BasicFieldRenderer, LeafRenderer, RenderProbe, RenderWalk};
use crate::settings::{FieldSettings, Overlay, SettingsMapper};
use crate::store::ContentStore;
use crate::visibility::cascade;
use serde::Serialize;
use serde_json::Value;

/// The transformed tree of one form plus its programmatic fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedForm {
    pub location: String,
    pub blocks: Vec<BlockNode>,
    /// Fields registered through the `additional_fields` hook
    pub additional_fields: Vec<FieldSettings>,
}

pub struct FormEngine<S> {
    store: S,
    registry: LocationRegistry,
    hooks: Hooks,
    leaf: Box<dyn LeafRenderer>,
    mode: RenderMode,
    max_reference_depth: usize,
}

impl<S: ContentStore> FormEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: LocationRegistry::default(),
            hooks: Hooks::default(),
            leaf: Box::new(BasicFieldRenderer),
            mode: RenderMode::default(),
            max_reference_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_registry(mut self, registry: LocationRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_leaf_renderer(mut self, leaf: impl LeafRenderer + 'static) -> Self {
        self.leaf = Box::new(leaf);
        self
    }

    pub fn with_max_reference_depth(mut self, depth: usize) -> Self {
        self.max_reference_depth = depth;
        self
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &LocationRegistry {
        &self.registry
    }

    pub fn is_location_valid(&self, location: &str) -> bool {
        self.registry.is_valid(location)
    }

    /// Transform raw content into the tree fields and markup are derived from
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn compose(&self, content: &str) -> Vec<BlockNode> {
        let nodes = parse(content);
        let nodes = ReferenceResolver::new(&self.store)
            .with_max_depth(self.max_reference_depth)
            .resolve(nodes);
        let nodes = cascade(nodes, None);
        DynamicFieldInjector::new(self.leaf.as_ref()).inject(nodes)
    }

    /// Look up and compose the form of `location`, `None` when no form resolves
    #[tracing::instrument(level = "debug", skip(self, context))]
    pub fn compose_form(&self, location: &str, context: &FormContext) -> Option<ComposedForm> {
        if !self.registry.is_valid(location) {
            tracing::debug!("unknown form location");
            return None;
        }

        let Some(stored) = self.store.form_content(location, context) else {
            tracing::debug!("no form stored for location");
            return None;
        };

        let blocks = self.compose(&stored.content);
        let blocks = self.hooks.apply_form_blocks(blocks, location, context);
        let additional_fields = self.hooks.additional_fields(location, context);

        Some(ComposedForm {
            location: location.to_string(),
            blocks,
            additional_fields,
        })
    }

    pub fn fields_of(&self, form: &ComposedForm, context: &FormContext) -> Vec<FieldSettings> {
        self.fields_with(form, context, None)
    }

    /// Field list of a composed form, `overlay` gets the last word on every tree-derived field
    pub fn fields_with(
        &self,
        form: &ComposedForm,
        context: &FormContext,
        overlay: Option<Overlay<'_>>,
    ) -> Vec<FieldSettings> {
        let probe = RenderProbe::new(&self.mode, context.viewer, &self.hooks);
        let mut mapper = SettingsMapper::new(&self.hooks, &probe);
        if let Some(overlay) = overlay {
            mapper = mapper.with_overlay(overlay);
        }

        let mut fields = FieldExtractor::new(&mapper).extract(&form.blocks);
        fields.extend(form.additional_fields.iter().cloned());

        self.hooks.apply_form_fields(fields, &form.location, context)
    }

    /// Markup of a composed form
    ///
    /// Only the checkout form hides blocks the viewer can't see. Other forms show every block.
    pub fn markup_of(&self, form: &ComposedForm, context: &FormContext) -> String {
        let markup = {
            let _filter = self.mode.with_visibility_filter(form.location == CHECKOUT);

            let probe = RenderProbe::new(&self.mode, context.viewer, &self.hooks);
            let mapper = SettingsMapper::new(&self.hooks, &probe);
            let walk = RenderWalk::new(&self.mode, context.viewer, self.leaf.as_ref(), &mapper);

            let mut markup = walk.render_nodes(&form.blocks);
            for field in &form.additional_fields {
                markup.push_str(&walk.render_node(&custom_field_node(field, self.leaf.as_ref())));
            }
            markup
        };

        self.hooks.apply_form_markup(markup, &form.location, context)
    }

    /// Settings of all fields of the form at `location`, `None` when no form resolves
    pub fn get_form_fields(&self, location: &str, context: &FormContext) -> Option<Vec<FieldSettings>> {
        self.compose_form(location, context)
            .map(|form| self.fields_of(&form, context))
    }

    /// Rendered form at `location`, empty when no form resolves
    pub fn get_form_markup(&self, location: &str, context: &FormContext) -> String {
        self.compose_form(location, context)
            .map(|form| self.markup_of(&form, context))
            .unwrap_or_default()
    }

    /// Fields for one-click enrollment into a free access plan
    ///
    /// The checkout form is turned into hidden fields. Fields the viewer can't see are removed. A student who
    /// already filled out everything required is enrolled right away, everyone else is sent to checkout.
    pub fn get_free_enrollment_fields(&self, plan: &AccessPlan, context: &FormContext) -> Vec<FieldSettings> {
        let context = FormContext {
            plan: Some(plan.clone()),
            ..context.clone()
        };

        let probe = RenderProbe::new(&self.mode, context.viewer, &self.hooks);
        let hide: Overlay<'_> = &|mut settings: FieldSettings, node: &BlockNode| {
            if !probe.is_visible(node) {
                tracing::trace!(kind = %node.kind, "field not visible, left out of free enrollment");
                return None;
            }
            settings.kind = "hidden".to_string();
            Some(settings)
        };

        let mut fields = self
            .compose_form(CHECKOUT, &context)
            .map(|form| self.fields_with(&form, &context, Some(hide)))
            .unwrap_or_default();

        fields.push(
            FieldSettings::named("hidden", "free_checkout_redirect")
                .with_value(plan.redirect_url.clone())
                .transient(),
        );
        fields.push(
            FieldSettings::named("hidden", "llms_plan_id")
                .with_id("llms-plan-id")
                .with_value(plan.id)
                .transient(),
        );

        self.hooks.apply_free_enroll_fields(fields, plan)
    }

    pub fn get_free_enrollment_markup(&self, plan: &AccessPlan, context: &FormContext) -> String {
        self.get_free_enrollment_fields(plan, context)
            .iter()
            .map(|field| self.leaf.render_leaf(field))
            .collect()
    }

    /// Whether any location's form asks for a username
    pub fn usernames_enabled(&self, context: &FormContext) -> bool {
        self.registry.ids().any(|location| {
            self.compose_form(location, context)
                .is_some_and(|form| contains_kind(&form.blocks, USERNAME_FIELD))
        })
    }

    /// See [extract::field_by]
    pub fn field_by<'f>(&self, fields: &'f [FieldSettings], key: &str, value: &Value) -> Option<&'f FieldSettings> {
        extract::field_by(fields, key, value)
    }
}

fn contains_kind(nodes: &[BlockNode], kind: &str) -> bool {
    nodes
        .iter()
        .any(|node| node.kind == kind || contains_kind(node.children(), kind))
}

impl<S> std::fmt::Debug for FormEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormEngine")
            .field("registry", &self.registry.ids().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .field("mode", &self.mode)
            .field("max_reference_depth", &self.max_reference_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::attributes;
    use crate::location::REGISTRATION;
    use crate::store::{MemoryStore, Status, StoredForm};
    use crate::visibility::{Viewer, Visibility};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SCENARIO: &str = r#"<!-- wp:block {"ref":42} /-->
<!-- wp:group {"llms_visibility":"logged_out"} -->
<!-- wp:llms/form-field-text {"id":"nickname"} /-->
<!-- wp:llms/form-field-user-password {"id":"password","required":true,"meter":true} /-->
<!-- /wp:group -->"#;

    const FREE_ENROLL: &str = r#"<!-- wp:llms/form-field-user-first-name {"field":"text","id":"first_name","required":true} /-->
<!-- wp:llms/form-field-user-email {"field":"email","id":"email_address","llms_visibility":"logged_out"} /-->"#;

    fn brackets(settings: &FieldSettings) -> String {
        format!("[{}]", settings.id.as_deref().unwrap_or_default())
    }

    fn store(forms: &[(&str, &str)]) -> MemoryStore {
        let mut store = MemoryStore::default();
        store.insert_reusable("42", "");
        for (location, content) in forms {
            store.insert_form(StoredForm {
                location: location.to_string(),
                status: Status::Publish,
                core: true,
                title: String::new(),
                content: content.to_string(),
            });
        }
        store
    }

    fn engine(forms: &[(&str, &str)]) -> FormEngine<MemoryStore> {
        FormEngine::new(store(forms)).with_leaf_renderer(brackets)
    }

    fn guest() -> FormContext {
        FormContext::default()
    }

    fn member() -> FormContext {
        FormContext::for_viewer(Viewer {
            logged_in: true,
            ..Default::default()
        })
    }

    fn ids(fields: &[FieldSettings]) -> Vec<&str> {
        fields.iter().filter_map(|field| field.id.as_deref()).collect()
    }

    #[test]
    fn scenario_composition() {
        let engine = engine(&[]);
        let blocks = engine.compose(SCENARIO);

        let kinds: Vec<_> = blocks.iter().map(|node| node.kind.as_str()).collect();
        assert_eq!(kinds, vec!["core/group", "core/html"]);

        for field in blocks[0].children() {
            assert_eq!(Visibility::of(field), Some(Visibility::LoggedOut));
        }
        assert_eq!(blocks[1].attr("llms_visibility"), Some(&json!("logged_out")));
        assert_eq!(blocks[1].raw_content(), Some("[llms-password-strength-meter]"));
    }

    #[test]
    fn fields_follow_tree_order() {
        let engine = engine(&[(CHECKOUT, SCENARIO)]);

        let fields = engine.get_form_fields(CHECKOUT, &guest()).expect("form");
        assert_eq!(ids(&fields), vec!["nickname", "password", "llms-password-strength-meter"]);
        assert!(fields[1].required);

        // still validated for members, but never required from them
        let fields = engine.get_form_fields(CHECKOUT, &member()).expect("form");
        assert_eq!(fields.len(), 3);
        assert!(!fields[1].required);
    }

    #[test]
    fn missing_form() {
        let engine = engine(&[(CHECKOUT, SCENARIO)]);

        assert!(engine.get_form_fields(REGISTRATION, &guest()).is_none());
        assert!(engine.get_form_fields("nowhere", &guest()).is_none());
        assert_eq!(engine.get_form_markup(REGISTRATION, &guest()), "");
    }

    #[test]
    fn only_checkout_markup_is_filtered() {
        let engine = engine(&[(CHECKOUT, SCENARIO), (REGISTRATION, SCENARIO)]);

        assert_eq!(
            engine.get_form_markup(CHECKOUT, &guest()),
            "[nickname][password][llms-password-strength-meter]"
        );
        assert_eq!(engine.get_form_markup(CHECKOUT, &member()), "");
        assert_eq!(
            engine.get_form_markup(REGISTRATION, &member()),
            "[nickname][password][llms-password-strength-meter]"
        );
    }

    #[test]
    fn programmatic_fields_are_shown_and_validated() {
        let mut engine = engine(&[(CHECKOUT, SCENARIO)]);
        engine
            .hooks_mut()
            .on_additional_fields(|mut fields, location, _| {
                if location == CHECKOUT {
                    fields.push(FieldSettings::named("text", "coupon"));
                }
                fields
            })
            .on_form_markup(|markup, _, _| format!("<form>{markup}</form>"));

        let form = engine.compose_form(CHECKOUT, &guest()).expect("form");
        assert_eq!(
            ids(&engine.fields_of(&form, &guest())),
            vec!["nickname", "password", "llms-password-strength-meter", "coupon"]
        );
        assert_eq!(
            engine.markup_of(&form, &guest()),
            "<form>[nickname][password][llms-password-strength-meter][coupon]</form>"
        );
    }

    #[test]
    fn added_blocks_are_shown_and_validated() {
        let mut engine = engine(&[(REGISTRATION, SCENARIO)]);
        engine.hooks_mut().on_form_blocks(|mut blocks, _, _| {
            blocks.push(BlockNode::empty(
                "llms/form-field-text",
                attributes(json!({"id": "promo", "required": true})),
            ));
            blocks
        });

        let form = engine.compose_form(REGISTRATION, &member()).expect("form");
        let fields = engine.fields_of(&form, &member());
        assert_eq!(
            ids(&fields),
            vec!["nickname", "password", "llms-password-strength-meter", "promo"]
        );
        assert!(fields[3].required);
        assert_eq!(
            engine.markup_of(&form, &member()),
            "[nickname][password][llms-password-strength-meter][promo]"
        );
    }

    #[test]
    fn field_hooks_run_in_registration_order() {
        let mut engine = engine(&[(CHECKOUT, SCENARIO)]);
        engine
            .hooks_mut()
            .on_form_fields(|mut fields, _, _| {
                fields.retain(|field| field.kind != "html");
                fields.push(FieldSettings::named("text", "first"));
                fields
            })
            .on_form_fields(|mut fields, location, _| {
                let last = fields.last().and_then(|field| field.id.clone()).unwrap_or_default();
                fields.push(FieldSettings::named("text", format!("{location}_after_{last}")));
                fields
            });

        let fields = engine.get_form_fields(CHECKOUT, &guest()).expect("form");
        assert_eq!(
            ids(&fields),
            vec!["nickname", "password", "first", "checkout_after_first"]
        );
    }

    #[test]
    fn free_enrollment_hook_sees_the_complete_list() {
        let mut engine = engine(&[(CHECKOUT, FREE_ENROLL)]);
        engine.hooks_mut().on_free_enroll_fields(|mut fields, plan| {
            fields.retain(|field| field.name.as_deref() != Some("free_checkout_redirect"));
            fields.push(FieldSettings::named("hidden", format!("plan_{}", plan.id)));
            fields
        });
        let plan = AccessPlan::new(7, "/courses/1".into());

        let fields = engine.get_free_enrollment_fields(&plan, &member());
        assert_eq!(ids(&fields), vec!["first_name", "llms-plan-id", "plan_7"]);
    }

    #[test]
    fn free_enrollment_fields() {
        let engine = engine(&[(CHECKOUT, FREE_ENROLL)]);
        let plan = AccessPlan::new(7, "https://example.com/course".into());

        let fields = engine.get_free_enrollment_fields(&plan, &member());
        assert_eq!(ids(&fields), vec!["first_name", "free_checkout_redirect", "llms-plan-id"]);
        assert!(fields.iter().all(|field| field.kind == "hidden"));
        assert_eq!(fields[1].get("value"), Some(json!("https://example.com/course")));
        assert_eq!(fields[2].get("value"), Some(json!(7)));

        let fields = engine.get_free_enrollment_fields(&plan, &guest());
        assert_eq!(fields.len(), 4);

        assert_eq!(
            engine.get_free_enrollment_markup(&plan, &member()),
            "[first_name][free_checkout_redirect][llms-plan-id]"
        );
    }

    #[test]
    fn free_enrollment_without_checkout_form() {
        let engine = engine(&[]);
        let plan = AccessPlan::new(1, "/".into());

        let fields = engine.get_free_enrollment_fields(&plan, &member());
        assert_eq!(ids(&fields), vec!["free_checkout_redirect", "llms-plan-id"]);
    }

    #[test]
    fn usernames() {
        assert!(!engine(&[(CHECKOUT, SCENARIO)]).usernames_enabled(&guest()));

        let with_username = engine(&[(
            REGISTRATION,
            r#"<!-- wp:columns --><!-- wp:column --><!-- wp:llms/form-field-user-username {"id":"user_login"} /--><!-- /wp:column --><!-- /wp:columns -->"#,
        )]);
        assert!(with_username.usernames_enabled(&guest()));
    }

    #[test]
    fn field_lookup() {
        let engine = engine(&[(CHECKOUT, SCENARIO)]);
        let fields = engine.get_form_fields(CHECKOUT, &guest()).expect("form");

        let meter = engine
            .field_by(&fields, "type", &json!("html"))
            .expect("meter");
        assert_eq!(meter.id.as_deref(), Some("llms-password-strength-meter"));
        assert!(engine.field_by(&fields, "id", &json!("coupon")).is_none());
    }
}
