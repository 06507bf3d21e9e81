//! markup rendering
//!
//! The engine decides which fields exist and with which settings. Turning one field's settings into markup is
//! left to a [LeafRenderer]. [RenderWalk] walks a composed tree, hands field leaves to the leaf renderer and
//! copies raw markup. In probe mode the walk only answers whether a node would render at all.
use crate::block::{BlockNode, Inner, HTML_BLOCK};
use crate::hooks::Hooks;
use crate::probe::{rendered_truthy, RenderMode, VisibilityProbe};
use crate::settings::{FieldSettings, SettingsMapper};
use crate::visibility::{Viewer, Visibility};

/// Renders a single field
pub trait LeafRenderer {
    fn render_leaf(&self, settings: &FieldSettings) -> String;
}

// blanket impl for Fn
impl<F> LeafRenderer for F
where
    F: Fn(&FieldSettings) -> String,
{
    fn render_leaf(&self, settings: &FieldSettings) -> String {
        self(settings)
    }
}

/// Wrap `settings` in a raw markup block carrying the field's rendered markup
pub fn custom_field_node(settings: &FieldSettings, leaf: &dyn LeafRenderer) -> BlockNode {
    BlockNode::markup(HTML_BLOCK, settings.to_attributes(), leaf.render_leaf(settings))
}

pub struct RenderWalk<'a> {
    mode: &'a RenderMode,
    viewer: Viewer,
    leaf: Option<&'a dyn LeafRenderer>,
    mapper: Option<&'a SettingsMapper<'a>>,
}

impl<'a> RenderWalk<'a> {
    pub fn new(
        mode: &'a RenderMode,
        viewer: Viewer,
        leaf: &'a dyn LeafRenderer,
        mapper: &'a SettingsMapper<'a>,
    ) -> Self {
        Self {
            mode,
            viewer,
            leaf: Some(leaf),
            mapper: Some(mapper),
        }
    }

    /// A walk that can only be used in probe mode
    fn probing(mode: &'a RenderMode, viewer: Viewer) -> Self {
        Self {
            mode,
            viewer,
            leaf: None,
            mapper: None,
        }
    }

    pub fn render_nodes(&self, nodes: &[BlockNode]) -> String {
        nodes.iter().map(|node| self.render_node(node)).collect()
    }

    pub fn render_node(&self, node: &BlockNode) -> String {
        if self.mode.filters_visibility() && !self.viewer.can_see(Visibility::of(node).as_ref()) {
            tracing::trace!(kind = %node.kind, "node hidden from viewer");
            return String::new();
        }

        if self.mode.is_probing() {
            return "1".to_string();
        }

        if node.is_field() {
            if node.has_children() {
                return node
                    .children()
                    .iter()
                    .map(|child| self.render_node(child))
                    .collect::<Vec<_>>()
                    .join("\n");
            }

            let (Some(leaf), Some(mapper)) = (self.leaf, self.mapper) else {
                return String::new();
            };
            return mapper
                .to_settings(node)
                .map(|settings| leaf.render_leaf(&settings))
                .unwrap_or_default();
        }

        match &node.inner {
            Inner::RawContent(raw) => raw.clone(),
            Inner::Children(children) => self.render_nodes(children),
        }
    }
}

/// [VisibilityProbe] rendering the node in probe mode
pub struct RenderProbe<'a> {
    mode: &'a RenderMode,
    viewer: Viewer,
    hooks: &'a Hooks,
}

impl<'a> RenderProbe<'a> {
    pub fn new(mode: &'a RenderMode, viewer: Viewer, hooks: &'a Hooks) -> Self {
        Self {
            mode,
            viewer,
            hooks,
        }
    }
}

impl VisibilityProbe for RenderProbe<'_> {
    fn is_visible(&self, node: &BlockNode) -> bool {
        let rendered = match self.mode.probe() {
            Ok(_guard) => RenderWalk::probing(self.mode, self.viewer).render_node(node),
            Err(error) => {
                tracing::warn!(%error, kind = %node.kind, "nested visibility probe, assuming visible");
                return true;
            }
        };

        self.hooks
            .apply_block_visible(rendered_truthy(&rendered), node)
    }
}

/// Minimal html for a field
///
/// Enough to show a form on the command line, real applications bring their own [LeafRenderer].
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicFieldRenderer;

impl LeafRenderer for BasicFieldRenderer {
    fn render_leaf(&self, settings: &FieldSettings) -> String {
        let id = settings.id.as_deref().unwrap_or_default();
        let name = settings.name.as_deref().unwrap_or_default();
        let value = settings.extra.get("value").map(attribute_value);

        let mut classes = vec!["llms-form-field".to_string(), format!("type-{}", settings.kind)];
        classes.extend(settings.classes.iter().cloned());
        let classes = escape(&classes.join(" "));

        match settings.kind.as_str() {
            "hidden" => format!(
                r#"<input type="hidden" id="{}" name="{}" value="{}">"#,
                escape(id),
                escape(name),
                escape(&value.unwrap_or_default()),
            ),
            "html" => {
                let content = settings
                    .extra
                    .get("value")
                    .or_else(|| settings.extra.get("description"))
                    .map(attribute_value)
                    .unwrap_or_default();
                format!(r#"<div class="{classes}" id="{}">{content}</div>"#, escape(id))
            }
            kind => {
                let mut input = format!(
                    r#"<input type="{}" id="{}" name="{}""#,
                    escape(kind),
                    escape(id),
                    escape(name)
                );
                for (key, attribute) in &settings.attributes {
                    if !is_attribute_name(key) {
                        tracing::debug!(%key, "invalid html attribute name, skipping it");
                        continue;
                    }
                    input.push_str(&format!(r#" {key}="{}""#, escape(&attribute_value(attribute))));
                }
                if let Some(value) = value {
                    input.push_str(&format!(r#" value="{}""#, escape(&value)));
                }
                if settings.required {
                    input.push_str(" required");
                }
                input.push('>');

                let label = match settings.extra.get("label").map(attribute_value) {
                    Some(label) if !label.is_empty() => {
                        let marker = if settings.required {
                            r#"<span class="llms-required">*</span>"#
                        } else {
                            ""
                        };
                        format!(r#"<label for="{}">{}{marker}</label>"#, escape(id), escape_text(&label))
                    }
                    _ => String::new(),
                };

                format!(r#"<div class="{classes}">{label}{input}</div>"#)
            }
        }
    }
}

fn attribute_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape(raw: &str) -> String {
    html_escape::encode_quoted_attribute(raw).into_owned()
}

fn escape_text(raw: &str) -> String {
    html_escape::encode_text(raw).into_owned()
}

/// Attribute names are written into the tag as they are, anything but `[A-Za-z0-9_:.-]` is refused
fn is_attribute_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::parse;
    use pretty_assertions::assert_eq;

    fn names(settings: &FieldSettings) -> String {
        format!("[{}]", settings.name.as_deref().unwrap_or("?"))
    }

    #[test]
    fn walk_renders_fields_and_markup_in_order() {
        let nodes = parse(
            r#"<!-- wp:group --><div><!-- wp:llms/form-field-text {"id":"a"} /--><!-- wp:llms/form-field-text {"id":"b","llms_visibility":"logged_in"} /--></div><!-- /wp:group --><!-- wp:html --><hr><!-- /wp:html -->"#,
        );

        let hooks = Hooks::default();
        let mode = RenderMode::default();
        let probe = RenderProbe::new(&mode, Viewer::default(), &hooks);
        let mapper = SettingsMapper::new(&hooks, &probe);
        let walk = RenderWalk::new(&mode, Viewer::default(), &names, &mapper);

        assert_eq!(walk.render_nodes(&nodes), "<div>[a]</div><hr>");

        let _unfiltered = mode.with_visibility_filter(false);
        assert_eq!(walk.render_nodes(&nodes), "<div>[a][b]</div><hr>");
    }

    #[test]
    fn probe_follows_viewer_and_hooks() {
        let node = &parse(r#"<!-- wp:llms/form-field-text {"llms_visibility":"logged_out"} /-->"#)[0];

        let mut hooks = Hooks::default();
        let mode = RenderMode::default();
        let guest = Viewer::default();
        let member = Viewer {
            logged_in: true,
            ..Default::default()
        };

        assert!(RenderProbe::new(&mode, guest, &hooks).is_visible(node));
        assert!(!RenderProbe::new(&mode, member, &hooks).is_visible(node));
        assert!(!mode.is_probing());

        hooks.on_block_visible(|_, _| true);
        assert!(RenderProbe::new(&mode, member, &hooks).is_visible(node));
    }

    #[test]
    fn nested_probe_is_refused() {
        let node = &parse(r#"<!-- wp:llms/form-field-text {"llms_visibility":"logged_in"} /-->"#)[0];
        let hooks = Hooks::default();
        let mode = RenderMode::default();

        let _outer = mode.probe().expect("outer probe");
        // hidden for guests, but a nested probe can't render and falls back to visible
        assert!(RenderProbe::new(&mode, Viewer::default(), &hooks).is_visible(node));
        assert!(mode.is_probing());
    }

    #[test]
    fn basic_renderer() {
        let settings = FieldSettings::named("hidden", "llms_plan_id")
            .with_id("llms-plan-id")
            .with_value(7);
        assert_eq!(
            BasicFieldRenderer.render_leaf(&settings),
            r#"<input type="hidden" id="llms-plan-id" name="llms_plan_id" value="7">"#
        );

        let mut settings = FieldSettings::named("email", "email_address");
        settings.required = true;
        settings
            .extra
            .insert("label".into(), "Email <Address>".into());
        assert_eq!(
            BasicFieldRenderer.render_leaf(&settings),
            r#"<div class="llms-form-field type-email"><label for="email_address">Email &lt;Address&gt;<span class="llms-required">*</span></label><input type="email" id="email_address" name="email_address" required></div>"#
        );
    }

    #[test]
    fn basic_renderer_keeps_attributes_inside_the_tag() {
        let mut settings = FieldSettings::named("text", "nickname");
        settings
            .attributes
            .insert("placeholder".into(), "a' onfocus='x".into());
        settings
            .attributes
            .insert("x><script>alert(1)</script".into(), "y".into());
        settings.attributes.insert("data-kind".into(), "\"quoted\"".into());

        let markup = BasicFieldRenderer.render_leaf(&settings);

        assert!(!markup.contains("a' onfocus"), "{markup}");
        assert!(!markup.contains("<script>"), "{markup}");
        assert!(markup.contains(r#" data-kind="&quot;quoted&quot;""#), "{markup}");
        assert_eq!(markup.matches('<').count(), 3, "{markup}");
    }
}
