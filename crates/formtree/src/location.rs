//! known form locations
use indexmap::IndexMap;
use serde::Serialize;

pub const CHECKOUT: &str = "checkout";
pub const REGISTRATION: &str = "registration";
pub const ACCOUNT: &str = "account";

/// A slot for which exactly one active form resolves
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: String,
    /// Human readable name
    pub name: String,
    pub description: String,
    /// Title displayed above the form
    pub title: String,
    /// Block content a new form for this location starts with
    pub template: String,
    /// Metadata identifying stored content as this location's core form
    pub meta: IndexMap<String, String>,
}

impl Location {
    fn core(id: &str, name: &str, description: &str, title: &str, show_title: bool, template: &str) -> Self {
        let meta = [
            ("_llms_form_location", id),
            ("_llms_form_show_title", if show_title { "yes" } else { "no" }),
            ("_llms_form_is_core", "yes"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            title: title.to_string(),
            template: template.to_string(),
            meta,
        }
    }

    /// A location without name or template, configured afterwards
    pub fn new(id: &str) -> Self {
        Self::core(id, id, "", "", true, "")
    }

    pub fn set_show_title(&mut self, show_title: bool) {
        let value = if show_title { "yes" } else { "no" };
        self.meta
            .insert("_llms_form_show_title".to_string(), value.to_string());
    }

    pub fn shows_title(&self) -> bool {
        self.meta.get("_llms_form_show_title").map(String::as_str) == Some("yes")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRegistry {
    locations: IndexMap<String, Location>,
}

impl Default for LocationRegistry {
    fn default() -> Self {
        let locations = [
            Location::core(
                CHECKOUT,
                "Checkout",
                "Handles new user registration and existing user information updates during checkout and enrollment.",
                "Billing Information",
                true,
                CHECKOUT_TEMPLATE,
            ),
            Location::core(
                REGISTRATION,
                "Registration",
                "Handles new user registration and existing user information updates for open registration.",
                "Register",
                true,
                REGISTRATION_TEMPLATE,
            ),
            Location::core(
                ACCOUNT,
                "Account",
                "Handles user account information updates on the edit account area of the student dashboard.",
                "Edit Account Information",
                false,
                ACCOUNT_TEMPLATE,
            ),
        ];

        Self {
            locations: locations
                .into_iter()
                .map(|location| (location.id.clone(), location))
                .collect(),
        }
    }
}

impl LocationRegistry {
    pub fn get(&self, id: &str) -> Option<&Location> {
        self.locations.get(id)
    }

    pub fn is_valid(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    /// Add a location or replace the one with the same id, returns the replaced location
    pub fn insert(&mut self, location: Location) -> Option<Location> {
        self.locations.insert(location.id.clone(), location)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }
}

const CHECKOUT_TEMPLATE: &str = r#"<!-- wp:llms/form-field-user-email {"field":"email","id":"email_address","name":"email_address","label":"Email Address","required":true,"llms_visibility":"logged_out"} /-->

<!-- wp:llms/form-field-user-password {"field":"password","id":"password","name":"password","label":"Password","required":true,"meter":true,"meter_description":"A strong password is required.","min_strength":"strong","html_attrs":{"minlength":8},"llms_visibility":"logged_out"} /-->

<!-- wp:columns -->
<div class="wp-block-columns"><!-- wp:column -->
<div class="wp-block-column"><!-- wp:llms/form-field-user-first-name {"field":"text","id":"first_name","name":"first_name","label":"First Name","required":true} /--></div>
<!-- /wp:column -->

<!-- wp:column -->
<div class="wp-block-column"><!-- wp:llms/form-field-user-last-name {"field":"text","id":"last_name","name":"last_name","label":"Last Name","required":true} /--></div>
<!-- /wp:column --></div>
<!-- /wp:columns -->

<!-- wp:llms/form-field-user-address-street {"field":"text","id":"llms_billing_address_1","name":"llms_billing_address_1","label":"Address","required":true} /-->

<!-- wp:llms/form-field-user-address-city {"field":"text","id":"llms_billing_city","name":"llms_billing_city","label":"City","required":true} /-->

<!-- wp:llms/form-field-user-address-country {"field":"select","id":"llms_billing_country","name":"llms_billing_country","label":"Country","required":true} /-->
"#;

const REGISTRATION_TEMPLATE: &str = r#"<!-- wp:llms/form-field-user-email {"field":"email","id":"email_address","name":"email_address","label":"Email Address","required":true} /-->

<!-- wp:llms/form-field-user-password {"field":"password","id":"password","name":"password","label":"Password","required":true,"meter":true,"min_strength":"strong","html_attrs":{"minlength":8}} /-->

<!-- wp:columns -->
<div class="wp-block-columns"><!-- wp:column -->
<div class="wp-block-column"><!-- wp:llms/form-field-user-first-name {"field":"text","id":"first_name","name":"first_name","label":"First Name","required":true} /--></div>
<!-- /wp:column -->

<!-- wp:column -->
<div class="wp-block-column"><!-- wp:llms/form-field-user-last-name {"field":"text","id":"last_name","name":"last_name","label":"Last Name","required":true} /--></div>
<!-- /wp:column --></div>
<!-- /wp:columns -->
"#;

const ACCOUNT_TEMPLATE: &str = r#"<!-- wp:llms/form-field-user-email {"field":"email","id":"email_address","name":"email_address","label":"Email Address","required":true} /-->

<!-- wp:columns -->
<div class="wp-block-columns"><!-- wp:column -->
<div class="wp-block-column"><!-- wp:llms/form-field-user-first-name {"field":"text","id":"first_name","name":"first_name","label":"First Name","required":true} /--></div>
<!-- /wp:column -->

<!-- wp:column -->
<div class="wp-block-column"><!-- wp:llms/form-field-user-last-name {"field":"text","id":"last_name","name":"last_name","label":"Last Name","required":true} /--></div>
<!-- /wp:column --></div>
<!-- /wp:columns -->

<!-- wp:llms/form-field-user-password {"field":"password","id":"password","name":"password","label":"New Password","meter":true,"min_strength":"strong","html_attrs":{"minlength":8}} /-->
"#;
