//! per-request context passed through the engine
use crate::visibility::Viewer;

/// Access plan a free enrollment is made for
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct AccessPlan {
    pub id: u64,
    /// Where to send the student after enrolling
    pub redirect_url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormContext {
    pub viewer: Viewer,
    pub plan: Option<AccessPlan>,
}

impl FormContext {
    pub fn for_viewer(viewer: Viewer) -> Self {
        Self { viewer, plan: None }
    }
}
