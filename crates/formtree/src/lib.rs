//! # formtree - form composition engine
//!
//! Turns the stored block content of a form into the list of fields a submission is validated against and into
//! the markup shown to the user.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `formtree` works internally.
//!
//! ### Block terms
//!
//! Form content is a tree of blocks serialized as html comments:
//!
//! ```text
//! <!-- wp:columns -->                                     opener of a container
//! <div class="wp-block-columns">                          wrapper markup, kept as an anonymous child
//! <!-- wp:llms/form-field-text {"id":"first_name"} /-->   void block, attributes are a json object
//! </div>
//! <!-- /wp:columns -->                                    closer
//! ```
//!
//! - a `block` has a type (`namespace/name`, a bare `name` is `core/name`) and attributes
//! - a `container` has child blocks, a `content leaf` has raw markup, never both
//! - a `field` is a block whose type starts with `llms/form-field-`
//! - a `reference` (`core/block` with a `ref` attribute) stands in for content stored elsewhere
//!
//! See [block] for the model and [parse] for the format.
//!
//! ### Composition
//!
//! see [engine::FormEngine::compose]
//!
//! Each pass takes the tree and returns the transformed tree:
//!
//! 1. [parse::parse] the stored content. Malformed content yields an empty form.
//! 2. [reference::ReferenceResolver] replaces reference blocks by the blocks they point to.
//! 3. [visibility::cascade] copies a container's `llms_visibility` onto descendants that don't set their own.
//! 4. [inject::DynamicFieldInjector] adds the password strength meter after the block holding the password field.
//!
//! The result is held by an [engine::ComposedForm] together with fields added programmatically through
//! [hooks::Hooks].
//!
//! ### Fields and markup
//!
//! Both outputs are derived from the same [engine::ComposedForm]:
//!
//! - [extract::FieldExtractor] collects field leaves in tree order and maps each one with
//!   [settings::SettingsMapper] into [settings::FieldSettings]
//! - [render::RenderWalk] renders the tree, handing field leaves to a [render::LeafRenderer]
//!
//! A required field that the viewer can't see is never required from them. Whether a field is visible is answered
//! by rendering it in probe mode ([probe]).
//!
//! ### Configuration
//!
//! Locations, forms and reusable content are declared in `.forms.hcl` files, see [form_documents].
//!
pub mod block;
pub mod context;
pub mod engine;
pub mod extract;
pub mod form_documents;
pub mod hooks;
pub mod inject;
pub mod location;
pub mod parse;
pub mod probe;
pub mod reference;
pub mod render;
pub mod settings;
pub mod store;
pub mod visibility;
mod visit;
