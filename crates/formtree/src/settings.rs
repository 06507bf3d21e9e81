//! canonical field settings
//!
//! Field blocks store their configuration under block specific attribute names. [SettingsMapper] turns a block
//! into a [FieldSettings] record understood by the validator and the field renderer.
use crate::block::{is_truthy, Attributes, BlockNode, VISIBILITY_ATTR};
use crate::hooks::Hooks;
use crate::probe::VisibilityProbe;
use crate::visibility::Visibility;
use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;

/// Block attribute names and the settings keys they are renamed to
const RENAMES: [(&str, &str); 3] = [
    ("field", "type"),
    ("className", "classes"),
    ("html_attrs", "attributes"),
];

const DEFAULT_KIND: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSettings {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// html attributes of the rendered input
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    pub required: bool,
    #[serde(rename = "llms_visibility", skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    pub data_store_key: DataStoreKey,
    /// everything else, passed through untouched
    #[serde(flatten)]
    pub extra: Attributes,
}

/// Whether and where a submitted value is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStoreKey {
    /// value is only used during the request
    Transient,
    Key(String),
}

impl Serialize for DataStoreKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataStoreKey::Transient => serializer.serialize_bool(false),
            DataStoreKey::Key(key) => serializer.serialize_str(key),
        }
    }
}

impl FieldSettings {
    /// A storeable field of `kind` identified by `name`
    pub fn named(kind: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: kind.into(),
            id: Some(name.clone()),
            name: Some(name.clone()),
            classes: vec![],
            attributes: Attributes::new(),
            required: false,
            visibility: None,
            data_store_key: DataStoreKey::Key(name),
            extra: Attributes::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.extra.insert("value".to_string(), value.into());
        self
    }

    pub fn transient(mut self) -> Self {
        self.data_store_key = DataStoreKey::Transient;
        self
    }

    /// Build settings from canonical keys
    ///
    /// Missing `name`/`id` are filled from each other, `type` defaults to `text` and unknown keys end up in
    /// [FieldSettings::extra].
    pub fn from_attributes(mut attrs: Attributes) -> Self {
        let kind = take_string(&mut attrs, "type").unwrap_or_else(|| DEFAULT_KIND.to_string());
        let mut id = take_string(&mut attrs, "id");
        let mut name = take_string(&mut attrs, "name");
        let classes = attrs
            .shift_remove("classes")
            .map(class_list)
            .unwrap_or_default();
        let attributes = match attrs.shift_remove("attributes") {
            Some(Value::Object(map)) => map.into_iter().collect(),
            _ => Attributes::new(),
        };
        let required = attrs.shift_remove("required").is_some_and(|v| is_truthy(&v));
        let visibility = take_string(&mut attrs, VISIBILITY_ATTR).map(|v| Visibility::parse(&v));
        let data_store_value = attrs.shift_remove("data_store_key");

        if name.is_none() {
            name = id.clone();
        }
        if id.is_none() {
            id = name.clone();
        }

        let data_store_key = match data_store_value {
            Some(Value::Bool(false)) => DataStoreKey::Transient,
            Some(Value::String(key)) if !key.is_empty() => DataStoreKey::Key(key),
            _ => match &name {
                Some(name) if !matches!(kind.as_str(), "html" | "button") => {
                    DataStoreKey::Key(name.clone())
                }
                _ => DataStoreKey::Transient,
            },
        };

        Self {
            kind,
            id,
            name,
            classes,
            attributes,
            required,
            visibility,
            data_store_key,
            extra: attrs,
        }
    }

    /// Settings as block attributes, the inverse of [FieldSettings::from_attributes]
    pub fn to_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("type".to_string(), self.kind.clone().into());
        if let Some(id) = &self.id {
            attrs.insert("id".to_string(), id.clone().into());
        }
        if let Some(name) = &self.name {
            attrs.insert("name".to_string(), name.clone().into());
        }
        if !self.classes.is_empty() {
            attrs.insert("classes".to_string(), self.classes.join(" ").into());
        }
        if !self.attributes.is_empty() {
            let map: serde_json::Map<String, Value> = self.attributes.clone().into_iter().collect();
            attrs.insert("attributes".to_string(), Value::Object(map));
        }
        attrs.insert("required".to_string(), self.required.into());
        if let Some(visibility) = &self.visibility {
            attrs.insert(VISIBILITY_ATTR.to_string(), visibility.as_str().into());
        }
        let data_store_key = match &self.data_store_key {
            DataStoreKey::Transient => Value::Bool(false),
            DataStoreKey::Key(key) => key.clone().into(),
        };
        attrs.insert("data_store_key".to_string(), data_store_key);
        attrs.extend(self.extra.clone());
        attrs
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "type" => Some(self.kind.clone().into()),
            "id" => self.id.clone().map(Value::from),
            "name" => self.name.clone().map(Value::from),
            "required" => Some(self.required.into()),
            VISIBILITY_ATTR => self.visibility.as_ref().map(|v| v.as_str().into()),
            _ => self.to_attributes().shift_remove(key),
        }
    }
}

fn take_string(attrs: &mut Attributes, key: &str) -> Option<String> {
    match attrs.shift_remove(key)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Style classes from a whitespace separated string or a list, duplicates removed
fn class_list(value: Value) -> Vec<String> {
    let tokens: IndexSet<String> = match value {
        Value::String(s) => s.split_whitespace().map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect(),
        _ => IndexSet::new(),
    };

    tokens.into_iter().collect()
}

/// Last word on a field's settings, runs after all settings hooks
pub type Overlay<'a> = &'a dyn Fn(FieldSettings, &BlockNode) -> Option<FieldSettings>;

/// Converts field blocks into [FieldSettings]
pub struct SettingsMapper<'a> {
    hooks: &'a Hooks,
    probe: &'a dyn VisibilityProbe,
    overlay: Option<Overlay<'a>>,
}

impl<'a> SettingsMapper<'a> {
    pub fn new(hooks: &'a Hooks, probe: &'a dyn VisibilityProbe) -> Self {
        Self {
            hooks,
            probe,
            overlay: None,
        }
    }

    /// Run `overlay` after all registered settings hooks
    pub fn with_overlay(mut self, overlay: Overlay<'a>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Map a block to field settings, `None` when a hook excluded the field
    pub fn to_settings(&self, node: &BlockNode) -> Option<FieldSettings> {
        let mut attrs = node.attributes.clone();
        for (block_key, settings_key) in RENAMES {
            if let Some(value) = attrs.shift_remove(block_key) {
                attrs.insert(settings_key.to_string(), value);
            }
        }

        // a user can't be forced to fill out a field they can never see
        if attrs.get("required").is_some_and(is_truthy) && !self.probe.is_visible(node) {
            tracing::debug!(kind = %node.kind, "required field is not visible, marking it optional");
            attrs.insert("required".to_string(), Value::Bool(false));
        }

        let settings = FieldSettings::from_attributes(attrs);
        let Some(settings) = self.hooks.apply_settings(settings, node) else {
            tracing::trace!(kind = %node.kind, "field excluded by settings hook");
            return None;
        };

        match self.overlay {
            Some(overlay) => overlay(settings, node),
            None => Some(settings),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::attributes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn visible(_: &BlockNode) -> bool {
        true
    }

    fn hidden(_: &BlockNode) -> bool {
        false
    }

    fn field(attrs: Value) -> BlockNode {
        BlockNode::empty("llms/form-field-text", attributes(attrs))
    }

    #[test]
    fn block_keys_are_renamed() {
        let hooks = Hooks::default();
        let mapper = SettingsMapper::new(&hooks, &visible);

        let settings = mapper
            .to_settings(&field(json!({
                "field": "email",
                "id": "email_address",
                "className": "wide  wide llms-cols-6",
                "html_attrs": {"minlength": 6},
                "label": "Email",
            })))
            .expect("settings");

        assert_eq!(settings.kind, "email");
        assert_eq!(settings.name.as_deref(), Some("email_address"));
        assert_eq!(settings.classes, vec!["wide", "llms-cols-6"]);
        assert_eq!(settings.attributes, attributes(json!({"minlength": 6})));
        assert_eq!(settings.extra, attributes(json!({"label": "Email"})));
        assert_eq!(
            settings.data_store_key,
            DataStoreKey::Key("email_address".into())
        );
    }

    #[test]
    fn required_but_invisible_becomes_optional() {
        let hooks = Hooks::default();
        let node = field(json!({"id": "phone", "required": true, "llms_visibility": "logged_in"}));

        let shown = SettingsMapper::new(&hooks, &visible).to_settings(&node).expect("settings");
        assert!(shown.required);

        let not_shown = SettingsMapper::new(&hooks, &hidden).to_settings(&node).expect("settings");
        assert!(!not_shown.required);
        assert_eq!(not_shown.visibility, Some(Visibility::LoggedIn));
    }

    #[test]
    fn optional_fields_are_not_probed() {
        let hooks = Hooks::default();
        let probe = |_: &BlockNode| -> bool { panic!("must not probe optional fields") };
        let settings = SettingsMapper::new(&hooks, &probe)
            .to_settings(&field(json!({"id": "nickname"})))
            .expect("settings");
        assert!(!settings.required);
    }

    #[test]
    fn hooks_and_overlay_can_exclude() {
        let mut hooks = Hooks::default();
        hooks.on_settings(|settings, node| {
            (node.attr_str("id") != Some("secret")).then_some(settings)
        });

        let mapper = SettingsMapper::new(&hooks, &visible);
        assert!(mapper.to_settings(&field(json!({"id": "secret"}))).is_none());

        let hide_all = |mut settings: FieldSettings, _: &BlockNode| {
            settings.kind = "hidden".into();
            Some(settings)
        };
        let settings = SettingsMapper::new(&hooks, &visible)
            .with_overlay(&hide_all)
            .to_settings(&field(json!({"id": "first_name", "field": "text"})))
            .expect("settings");
        assert_eq!(settings.kind, "hidden");
    }

    #[test]
    fn html_fields_are_transient() {
        let settings = FieldSettings::from_attributes(attributes(json!({
            "type": "html",
            "id": "llms-password-strength-meter",
        })));
        assert_eq!(settings.name.as_deref(), Some("llms-password-strength-meter"));
        assert_eq!(settings.data_store_key, DataStoreKey::Transient);
    }

    #[test]
    fn attributes_round_trip() {
        let settings = FieldSettings::named("hidden", "llms_plan_id")
            .with_id("llms-plan-id")
            .with_value(7)
            .transient();

        assert_eq!(FieldSettings::from_attributes(settings.to_attributes()), settings);
        assert_eq!(settings.get("value"), Some(json!(7)));
        assert_eq!(settings.get("id"), Some(json!("llms-plan-id")));
    }
}
