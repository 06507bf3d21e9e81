//! stored form content
//!
//! The engine never owns persistence. It asks a [ContentStore] for the content of a location's form and for the
//! content behind reference blocks. [MemoryStore] is the store used by the cli and in tests, [CachedStore]
//! memoizes lookups for the duration of one request.
use crate::context::FormContext;
use crate::location::LocationRegistry;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Publish,
    Draft,
}

impl std::str::FromStr for Status {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(Status::Publish),
            "draft" => Ok(Status::Draft),
            other => Err(StoreError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct StoredContent {
    pub content: String,
    pub status: Status,
}

pub trait ContentStore {
    /// Content of the active form for `location`, `None` when there is no such form
    fn form_content(&self, location: &str, context: &FormContext) -> Option<StoredContent>;

    /// Content a reference block points to
    fn referenced_content(&self, reference: &str) -> Option<StoredContent>;
}

impl<T: ContentStore + ?Sized> ContentStore for &T {
    fn form_content(&self, location: &str, context: &FormContext) -> Option<StoredContent> {
        (**self).form_content(location, context)
    }

    fn referenced_content(&self, reference: &str) -> Option<StoredContent> {
        (**self).referenced_content(reference)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("unknown form location `{0}`")]
    UnknownLocation(String),
    #[error("a form for location `{0}` already exists")]
    AlreadyExists(String),
    #[error("unknown form status `{0}`, expected `publish` or `draft`")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredForm {
    pub location: String,
    pub status: Status,
    /// Core forms are the ones resolved for a location
    pub core: bool,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    forms: Vec<StoredForm>,
    reusable: IndexMap<String, String>,
}

impl MemoryStore {
    pub fn insert_form(&mut self, form: StoredForm) {
        tracing::debug!(location = %form.location, status = ?form.status, "form stored");
        self.forms.push(form);
    }

    /// Store content for reference blocks, returns the previous content for `id`
    pub fn insert_reusable(
        &mut self,
        id: impl Into<String>,
        content: impl Into<String>,
    ) -> Option<String> {
        self.reusable.insert(id.into(), content.into())
    }

    pub fn forms(&self) -> &[StoredForm] {
        &self.forms
    }

    fn existing_core_form(&mut self, location: &str) -> Option<&mut StoredForm> {
        self.forms
            .iter_mut()
            .rev()
            .find(|form| form.core && form.location == location)
    }

    /// Store the template of `location` as its published core form
    ///
    /// An existing form is only replaced with `recreate`.
    pub fn create(
        &mut self,
        registry: &LocationRegistry,
        location: &str,
        recreate: bool,
    ) -> Result<(), StoreError> {
        let Some(definition) = registry.get(location) else {
            return Err(StoreError::UnknownLocation(location.to_string()));
        };

        let form = StoredForm {
            location: definition.id.clone(),
            status: Status::Publish,
            core: true,
            title: definition.title.clone(),
            content: definition.template.clone(),
        };

        match self.existing_core_form(location) {
            Some(_) if !recreate => Err(StoreError::AlreadyExists(location.to_string())),
            Some(existing) => {
                tracing::info!(location, "recreating form");
                *existing = form;
                Ok(())
            }
            None => {
                tracing::info!(location, "creating form");
                self.insert_form(form);
                Ok(())
            }
        }
    }

    /// [MemoryStore::create] for every known location
    pub fn install(
        &mut self,
        registry: &LocationRegistry,
        recreate: bool,
    ) -> IndexMap<String, Result<(), StoreError>> {
        registry
            .ids()
            .map(|id| (id.to_string(), self.create(registry, id, recreate)))
            .collect()
    }
}

impl ContentStore for MemoryStore {
    /// Published forms resolve for everyone, drafts only for viewers that can manage forms. The most recently
    /// stored match wins.
    fn form_content(&self, location: &str, context: &FormContext) -> Option<StoredContent> {
        let include_drafts = context.viewer.can_manage_forms;

        self.forms
            .iter()
            .rev()
            .filter(|form| form.core && form.location == location)
            .find(|form| form.status == Status::Publish || include_drafts)
            .map(|form| StoredContent::new(form.content.clone(), form.status))
    }

    fn referenced_content(&self, reference: &str) -> Option<StoredContent> {
        self.reusable
            .get(reference)
            .map(|content| StoredContent::new(content.clone(), Status::Publish))
    }
}

/// Request scoped memoization of another store
///
/// Form lookups are keyed by location and by whether drafts are visible, the only part of the context a lookup
/// depends on.
#[derive(Debug)]
pub struct CachedStore<S> {
    inner: S,
    forms: RefCell<HashMap<(String, bool), Option<StoredContent>>>,
    references: RefCell<HashMap<String, Option<StoredContent>>>,
}

impl<S: ContentStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            forms: Default::default(),
            references: Default::default(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ContentStore> ContentStore for CachedStore<S> {
    fn form_content(&self, location: &str, context: &FormContext) -> Option<StoredContent> {
        let key = (location.to_string(), context.viewer.can_manage_forms);
        if let Some(cached) = self.forms.borrow().get(&key) {
            tracing::trace!(location, "form content served from cache");
            return cached.clone();
        }

        let content = self.inner.form_content(location, context);
        self.forms.borrow_mut().insert(key, content.clone());
        content
    }

    fn referenced_content(&self, reference: &str) -> Option<StoredContent> {
        if let Some(cached) = self.references.borrow().get(reference) {
            return cached.clone();
        }

        let content = self.inner.referenced_content(reference);
        self.references
            .borrow_mut()
            .insert(reference.to_string(), content.clone());
        content
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::visibility::Viewer;
    use std::cell::Cell;

    fn form(location: &str, status: Status, content: &str) -> StoredForm {
        StoredForm {
            location: location.into(),
            status,
            core: true,
            title: String::new(),
            content: content.into(),
        }
    }

    fn manager() -> FormContext {
        FormContext::for_viewer(Viewer {
            logged_in: true,
            can_manage_forms: true,
        })
    }

    #[test]
    fn drafts_are_only_visible_to_managers() {
        let mut store = MemoryStore::default();
        store.insert_form(form("checkout", Status::Publish, "published"));
        store.insert_form(form("checkout", Status::Draft, "draft"));

        let guest = store.form_content("checkout", &FormContext::default()).expect("form");
        assert_eq!(guest.content, "published");

        let preview = store.form_content("checkout", &manager()).expect("form");
        assert_eq!(preview.content, "draft");
        assert_eq!(preview.status, Status::Draft);

        assert!(store.form_content("account", &manager()).is_none());
    }

    #[test]
    fn custom_forms_are_ignored() {
        let mut store = MemoryStore::default();
        store.insert_form(StoredForm {
            core: false,
            ..form("checkout", Status::Publish, "custom")
        });

        assert!(store.form_content("checkout", &FormContext::default()).is_none());
    }

    #[test]
    fn create_and_recreate() {
        let registry = LocationRegistry::default();
        let mut store = MemoryStore::default();

        assert_eq!(
            store.create(&registry, "nowhere", false),
            Err(StoreError::UnknownLocation("nowhere".into()))
        );

        let installed = store.install(&registry, false);
        assert!(installed.values().all(Result::is_ok));
        assert_eq!(store.forms().len(), 3);

        assert_eq!(
            store.create(&registry, "checkout", false),
            Err(StoreError::AlreadyExists("checkout".into()))
        );
        assert_eq!(store.create(&registry, "checkout", true), Ok(()));
        assert_eq!(store.forms().len(), 3);
    }

    struct CountingStore {
        lookups: Cell<usize>,
    }

    impl ContentStore for CountingStore {
        fn form_content(&self, _: &str, _: &FormContext) -> Option<StoredContent> {
            self.lookups.set(self.lookups.get() + 1);
            Some(StoredContent::new("content".into(), Status::Publish))
        }

        fn referenced_content(&self, _: &str) -> Option<StoredContent> {
            self.lookups.set(self.lookups.get() + 1);
            None
        }
    }

    #[test]
    fn cached_store_looks_up_once_per_key() {
        let cached = CachedStore::new(CountingStore {
            lookups: Cell::new(0),
        });

        cached.form_content("checkout", &FormContext::default());
        cached.form_content("checkout", &FormContext::default());
        cached.form_content("checkout", &manager());
        cached.referenced_content("42");
        cached.referenced_content("42");

        assert_eq!(cached.into_inner().lookups.get(), 3);
    }
}
