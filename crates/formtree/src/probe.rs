//! visibility probing
//!
//! Whether a field is visible is answered by rendering it in probe mode: a visible node renders to a truthy
//! marker, a hidden node to nothing. The mode lives in [RenderMode] and is only ever switched through guards,
//! so it is restored on every exit path. Probing is not reentrant: a probe must not trigger another probe.
use crate::block::BlockNode;
use std::cell::Cell;

/// Answers whether a node currently renders to a non-empty result
pub trait VisibilityProbe {
    fn is_visible(&self, node: &BlockNode) -> bool;
}

// blanket impl for Fn
impl<F> VisibilityProbe for F
where
    F: Fn(&BlockNode) -> bool,
{
    fn is_visible(&self, node: &BlockNode) -> bool {
        self(node)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ProbeError {
    #[error("visibility probe started while another probe is running")]
    Reentrant,
}

/// Render mode flags shared by the render walk and the probe
#[derive(Debug)]
pub struct RenderMode {
    probing: Cell<bool>,
    filter_visibility: Cell<bool>,
}

impl Default for RenderMode {
    fn default() -> Self {
        Self {
            probing: Cell::new(false),
            filter_visibility: Cell::new(true),
        }
    }
}

impl RenderMode {
    pub fn is_probing(&self) -> bool {
        self.probing.get()
    }

    /// Whether hidden nodes are dropped while rendering
    pub fn filters_visibility(&self) -> bool {
        self.filter_visibility.get()
    }

    /// Switch into probe mode until the guard is dropped
    pub fn probe(&self) -> Result<ProbeGuard<'_>, ProbeError> {
        if self.probing.replace(true) {
            return Err(ProbeError::Reentrant);
        }

        Ok(ProbeGuard { mode: self })
    }

    /// Set visibility filtering until the guard is dropped, the previous value is restored afterwards
    pub fn with_visibility_filter(&self, enabled: bool) -> FilterGuard<'_> {
        let previous = self.filter_visibility.replace(enabled);
        FilterGuard {
            mode: self,
            previous,
        }
    }
}

#[must_use = "probe mode ends when the guard is dropped"]
pub struct ProbeGuard<'m> {
    mode: &'m RenderMode,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.mode.probing.set(false);
    }
}

#[must_use = "the filter setting is restored when the guard is dropped"]
pub struct FilterGuard<'m> {
    mode: &'m RenderMode,
    previous: bool,
}

impl Drop for FilterGuard<'_> {
    fn drop(&mut self) {
        self.mode.filter_visibility.set(self.previous);
    }
}

/// Interpret a probe render result
pub(crate) fn rendered_truthy(rendered: &str) -> bool {
    matches!(
        rendered.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
