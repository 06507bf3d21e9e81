//! form configuration from hcl documents
//!
//! [FormDocuments] collects the root blocks of one or more `.forms.hcl` files and remembers which file each
//! block came from. Each block gets a stable index used to point at it in error messages.
//! [FormConfig::new] validates the blocks and builds the location registry and form store from them:
//!
//! ```hcl
//! location "checkout" {
//!   title      = "Checkout"
//!   show_title = false
//! }
//!
//! form "checkout" {
//!   status  = "publish"
//!   content = <<-EOT
//!     <!-- wp:llms/form-field-user-email {"id":"email_address","required":true} /-->
//!     <!-- wp:block {"ref":"address"} /-->
//!   EOT
//! }
//!
//! reusable "address" {
//!   content = "<!-- wp:llms/form-field-user-address-street /-->"
//! }
//! ```
use crate::location::{Location, LocationRegistry};
use crate::store::{MemoryStore, Status, StoredForm};
use hcl::eval::Evaluate;
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub type Source = Option<PathBuf>;
pub type SourceBlock<'a> = (usize, &'a Source, &'a Block);
pub type SourceAttribute<'a> = (usize, &'a Source, &'a Attribute);

#[derive(Default, Debug)]
pub struct FormDocuments {
    sources: Vec<Source>,
    root_attributes: Vec<(usize, Attribute)>,
    root_blocks: Vec<(usize, Block)>,
}

impl FormDocuments {
    /// Inserts and indexes an hcl document
    pub fn insert(&mut self, document: Body, path: impl Into<Option<PathBuf>>) {
        let source_index = self.sources.len();
        self.sources.push(path.into());

        for structure in document.into_iter() {
            match structure {
                Structure::Block(block) => self.root_blocks.push((source_index, block)),
                Structure::Attribute(attribute) => {
                    self.root_attributes.push((source_index, attribute))
                }
            }
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = SourceAttribute> {
        self.root_attributes
            .iter()
            .enumerate()
            .map(|(index, (source_index, attribute))| {
                (index, &self.sources[*source_index], attribute)
            })
    }

    pub fn get_block(&self, index: usize) -> Option<SourceBlock> {
        self.root_blocks
            .get(index)
            .map(|(source_index, block)| (index, &self.sources[*source_index], block))
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .enumerate()
            .map(|(index, (source_index, block))| (index, &self.sources[*source_index], block))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl FormDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path = %file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let body = hcl_edit::parser::parse_body(&file_contents)?;

        self.insert(body, Some(file_path));
        Ok(())
    }

    /// Load all `*.forms.hcl` files of a directory, in file name order
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let mut files = vec![];
        for dir_entry in std::fs::read_dir(dir_path)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            if dir_entry.file_name().to_string_lossy().ends_with(".forms.hcl") {
                files.push(dir_entry.path());
            }
        }

        if files.is_empty() {
            return Err(LoadError::NoFilesFound);
        }

        files.sort();
        for file_path in files {
            self.load_file(&file_path)?;
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No form files found in directory")]
    NoFilesFound,
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl file")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
}

impl From<Body> for FormDocuments {
    fn from(value: Body) -> Self {
        let mut documents = FormDocuments::default();
        documents.insert(value, None);
        documents
    }
}

/// Utility macro to create [FormDocuments]
///
/// Create from a single document
/// ```
/// # use formtree::form_documents;
/// form_documents!(r#"reusable "42" { content = "" }"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use formtree::form_documents;
/// let documents = form_documents! {
///   "one.forms.hcl" => "location \"one\" {}",
///   "two.forms.hcl" => "location \"two\" {}"
/// };
/// assert_eq!(documents.source_count(), 2);
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use formtree::form_documents;
/// form_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! form_documents {
    // single document without source
    { $expr:expr } => {
        $crate::form_documents::FormDocuments::from(hcl_edit::parser::parse_body($expr).expect("body must parse"))
    };
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::form_documents::FormDocuments::default();
        $(
            docs.insert(hcl_edit::parser::parse_body($expr).expect("body must parse"), Some(std::path::PathBuf::from($source)));
        )+

        docs
    }};
}

/// Locations, forms and reusable content declared by [FormDocuments]
#[derive(Debug)]
pub struct FormConfig {
    pub registry: LocationRegistry,
    pub store: MemoryStore,
}

impl FormConfig {
    /// Validate all blocks and build registry and store
    ///
    /// Locations declared in the documents are added to the built-in ones, or change them when the label
    /// matches. Locations are processed first, so a form may name a location declared in another file.
    pub fn new(documents: &FormDocuments) -> Result<Self, FormDocumentErrors> {
        let mut e = FormDocumentErrors::new();
        let mut registry = LocationRegistry::default();
        let mut store = MemoryStore::default();

        for (index, _source, _attribute) in documents.attributes() {
            e.log(Issue::RootAttribute(index));
        }

        let mut labeled = vec![];
        for (index, _source, block) in documents.blocks() {
            let kind = block.ident.value().as_str();
            if !matches!(kind, "location" | "form" | "reusable") {
                e.log(Issue::UnknownBlockType(index));
                continue;
            }

            let Some(label) = block.labels.first() else {
                e.log(Issue::LabelMissing(index));
                continue;
            };

            if block.labels.len() > 1 {
                e.log(Issue::TooManyLabels(index));
                continue;
            }

            labeled.push((index, kind, label.as_str().to_string(), block));
        }

        let mut locations: HashMap<String, usize> = HashMap::new();
        for (index, _, label, block) in labeled.iter().filter(|(_, kind, ..)| *kind == "location") {
            if let Some(existing) = locations.insert(label.clone(), *index) {
                e.log(Issue::LocationCollision {
                    existing,
                    new: *index,
                });
                continue;
            }

            let mut attributes = BlockAttributes::new(*index, block, &mut e);
            let mut location = registry
                .get(label)
                .cloned()
                .unwrap_or_else(|| Location::new(label));

            if let Some(name) = attributes.string("name") {
                location.name = name;
            }
            if let Some(description) = attributes.string("description") {
                location.description = description;
            }
            if let Some(title) = attributes.string("title") {
                location.title = title;
            }
            if let Some(template) = attributes.string("template") {
                location.template = template;
            }
            if let Some(show_title) = attributes.bool("show_title") {
                location.set_show_title(show_title);
            }
            attributes.finish();

            tracing::debug!(location = %label, "location configured");
            registry.insert(location);
        }

        let mut reusable: HashMap<String, usize> = HashMap::new();
        for (index, kind, label, block) in &labeled {
            match *kind {
                "form" => {
                    let mut attributes = BlockAttributes::new(*index, block, &mut e);
                    let content = attributes.string("content");
                    let status = attributes.string("status");
                    let core = attributes.bool("core").unwrap_or(true);
                    let title = attributes.string("title");
                    attributes.finish();

                    let Some(location) = registry.get(label) else {
                        e.log(Issue::UnknownLocation {
                            block: *index,
                            location: label.clone(),
                        });
                        continue;
                    };

                    let status = match status.as_deref().map(str::parse::<Status>) {
                        None => Status::default(),
                        Some(Ok(status)) => status,
                        Some(Err(_)) => {
                            e.log(Issue::UnknownStatus {
                                block: *index,
                                status: status.unwrap_or_default(),
                            });
                            continue;
                        }
                    };

                    let Some(content) = content else {
                        e.log(Issue::MissingContent(*index));
                        continue;
                    };

                    store.insert_form(StoredForm {
                        location: location.id.clone(),
                        status,
                        core,
                        title: title.unwrap_or_else(|| location.title.clone()),
                        content,
                    });
                }
                "reusable" => {
                    if let Some(existing) = reusable.insert(label.clone(), *index) {
                        e.log(Issue::ReusableCollision {
                            existing,
                            new: *index,
                        });
                        continue;
                    }

                    let mut attributes = BlockAttributes::new(*index, block, &mut e);
                    let content = attributes.string("content");
                    attributes.finish();

                    match content {
                        Some(content) => {
                            store.insert_reusable(label.clone(), content);
                        }
                        None => e.log(Issue::MissingContent(*index)),
                    }
                }
                _ => {}
            }
        }

        if !e.issues.is_empty() {
            return Err(e);
        }

        Ok(Self { registry, store })
    }
}

/// Evaluated attributes of one block, taken out one by one
///
/// Attributes left over when [BlockAttributes::finish] is called are unknown.
struct BlockAttributes<'e> {
    block: usize,
    values: IndexMap<String, hcl::Value>,
    errors: &'e mut FormDocumentErrors,
}

impl<'e> BlockAttributes<'e> {
    fn new(index: usize, block: &Block, errors: &'e mut FormDocumentErrors) -> Self {
        let context = hcl::eval::Context::new();
        let mut values = IndexMap::new();

        for attribute in block.body.attributes() {
            let key = attribute.key.value().as_str().to_string();
            let expression = hcl::Expression::from(attribute.value.clone());

            match expression.evaluate(&context) {
                Ok(value) => {
                    values.insert(key, value);
                }
                Err(error) => errors.log(Issue::InvalidAttribute {
                    block: index,
                    key,
                    reason: error.to_string(),
                }),
            }
        }

        Self {
            block: index,
            values,
            errors,
        }
    }

    fn string(&mut self, key: &str) -> Option<String> {
        match self.values.shift_remove(key)? {
            hcl::Value::String(value) => Some(value),
            _ => {
                self.invalid(key, "expected a string");
                None
            }
        }
    }

    fn bool(&mut self, key: &str) -> Option<bool> {
        match self.values.shift_remove(key)? {
            hcl::Value::Bool(value) => Some(value),
            _ => {
                self.invalid(key, "expected a bool");
                None
            }
        }
    }

    fn invalid(&mut self, key: &str, reason: &str) {
        self.errors.log(Issue::InvalidAttribute {
            block: self.block,
            key: key.to_string(),
            reason: reason.to_string(),
        });
    }

    fn finish(self) {
        for key in self.values.into_keys() {
            self.errors.log(Issue::UnknownAttribute {
                block: self.block,
                key,
            });
        }
    }
}

#[derive(derive_new::new, Debug)]
pub struct FormDocumentErrors {
    #[new(default)]
    issues: Vec<Issue>,
}

impl FormDocumentErrors {
    pub fn log(&mut self, issue: Issue) {
        tracing::trace!(?issue, "issue found");
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

impl std::error::Error for FormDocumentErrors {}

impl std::fmt::Display for FormDocumentErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.issues.as_slice() {
            [] => f.write_str("no issues"),
            [issue] => issue.fmt(f),
            [issue, rest @ ..] => write!(f, "{issue} (and {} more issues)", rest.len()),
        }
    }
}

/// A problem found in [FormDocuments], blocks are referred to by their index
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Issue {
    #[error("root attribute #{0} is not allowed, only `location`, `form` and `reusable` blocks are")]
    RootAttribute(usize),
    #[error("block #{0} has an unknown type")]
    UnknownBlockType(usize),
    #[error("block #{0} needs a label")]
    LabelMissing(usize),
    #[error("block #{0} has more than one label")]
    TooManyLabels(usize),
    #[error("location block #{new} declares the same location as block #{existing}")]
    LocationCollision { existing: usize, new: usize },
    #[error("reusable block #{new} declares the same id as block #{existing}")]
    ReusableCollision { existing: usize, new: usize },
    #[error("attribute `{key}` of block #{block} is invalid: {reason}")]
    InvalidAttribute {
        block: usize,
        key: String,
        reason: String,
    },
    #[error("block #{block} has unknown attribute `{key}`")]
    UnknownAttribute { block: usize, key: String },
    #[error("block #{0} has no `content`")]
    MissingContent(usize),
    #[error("form block #{block} is for unknown location `{location}`")]
    UnknownLocation { block: usize, location: String },
    #[error("form block #{block} has unknown status `{status}`")]
    UnknownStatus { block: usize, status: String },
}
