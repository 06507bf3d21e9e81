//! block-level visibility
//!
//! A node may restrict which viewers see (and therefore validate) it via the `llms_visibility` attribute.
//! [cascade] pushes a container's restriction down onto descendants that do not set their own.
use crate::block::{BlockNode, VISIBILITY_ATTR};

/// Value of the visibility attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// No restriction
    Off,
    LoggedIn,
    LoggedOut,
    /// Restriction defined outside of this crate, visible to everyone here
    Other(String),
}

impl Visibility {
    pub fn parse(value: &str) -> Self {
        match value {
            "off" => Visibility::Off,
            "logged_in" | "logged-in" => Visibility::LoggedIn,
            "logged_out" | "logged-out" => Visibility::LoggedOut,
            other => Visibility::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Visibility::Off => "off",
            Visibility::LoggedIn => "logged_in",
            Visibility::LoggedOut => "logged_out",
            Visibility::Other(other) => other,
        }
    }

    /// Visibility attribute of `node`, `None` when absent or empty
    pub fn of(node: &BlockNode) -> Option<Self> {
        node.attr_str(VISIBILITY_ATTR).map(Self::parse)
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Visibility {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The person a form is composed for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewer {
    pub logged_in: bool,
    /// May preview draft forms
    pub can_manage_forms: bool,
}

impl Viewer {
    pub fn can_see(&self, visibility: Option<&Visibility>) -> bool {
        match visibility {
            None | Some(Visibility::Off) => true,
            Some(Visibility::LoggedIn) => self.logged_in,
            Some(Visibility::LoggedOut) => !self.logged_in,
            Some(Visibility::Other(other)) => {
                tracing::trace!(visibility = %other, "unknown visibility rule, treating as visible");
                true
            }
        }
    }
}

/// Cascade visibility attributes down into child blocks
///
/// A node without a visibility attribute (or with `off`) takes over `inherited`. A node with a visibility
/// passes it on to its children, so the closest explicit restriction wins and a child can change it but
/// never drop it by leaving the attribute out.
#[tracing::instrument(level = "trace", skip_all)]
pub fn cascade(nodes: Vec<BlockNode>, inherited: Option<&str>) -> Vec<BlockNode> {
    nodes
        .into_iter()
        .map(|node| cascade_node(node, inherited))
        .collect()
}

fn cascade_node(mut node: BlockNode, inherited: Option<&str>) -> BlockNode {
    if let Some(inherited) = inherited.filter(|value| !value.is_empty()) {
        let own = node.attr_str(VISIBILITY_ATTR);
        if own.is_none() || own == Some("off") {
            node.attributes
                .insert(VISIBILITY_ATTR.to_string(), inherited.into());
        }
    }

    let visibility = node.attr_str(VISIBILITY_ATTR).map(str::to_string);
    if let Some(children) = node.children_mut() {
        let taken = std::mem::take(children);
        *children = cascade(taken, visibility.as_deref());
    }

    node
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::{attributes, Attributes};
    use crate::parse::parse;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(visibility: Option<&str>) -> BlockNode {
        let attrs = match visibility {
            Some(v) => attributes(json!({ "llms_visibility": v })),
            None => Attributes::new(),
        };
        BlockNode::empty("llms/form-field-text", attrs)
    }

    fn group(visibility: Option<&str>, children: Vec<BlockNode>) -> BlockNode {
        let attrs = match visibility {
            Some(v) => attributes(json!({ "llms_visibility": v })),
            None => Attributes::new(),
        };
        BlockNode::container("core/group", attrs, children)
    }

    #[test]
    fn child_inherits_container_visibility() {
        let tree = cascade(vec![group(Some("logged_in"), vec![field(None)])], None);
        assert_eq!(
            Visibility::of(&tree[0].children()[0]),
            Some(Visibility::LoggedIn)
        );
    }

    #[test]
    fn off_is_overridden_explicit_value_is_kept() {
        let tree = cascade(
            vec![group(
                Some("logged_out"),
                vec![field(Some("off")), field(Some("logged_in"))],
            )],
            None,
        );

        let children = tree[0].children();
        assert_eq!(Visibility::of(&children[0]), Some(Visibility::LoggedOut));
        assert_eq!(Visibility::of(&children[1]), Some(Visibility::LoggedIn));
    }

    #[test]
    fn closest_restriction_is_passed_on() {
        let tree = cascade(
            vec![group(
                Some("logged_out"),
                vec![group(Some("logged_in"), vec![field(None)])],
            )],
            None,
        );

        let nested = &tree[0].children()[0].children()[0];
        assert_eq!(Visibility::of(nested), Some(Visibility::LoggedIn));
    }

    #[test]
    fn unrestricted_tree_is_untouched() {
        let tree = vec![group(None, vec![field(None), field(Some("off"))])];
        assert_eq!(cascade(tree.clone(), None), tree);
    }

    #[test]
    fn cascade_is_idempotent() {
        let tree = parse(
            r#"<!-- wp:columns {"llms_visibility":"logged_in"} -->
<!-- wp:column -->
<!-- wp:llms/form-field-text {"llms_visibility":"off"} /-->
<!-- wp:group {"llms_visibility":"logged_out"} --><!-- wp:llms/form-field-text /--><!-- /wp:group -->
<!-- /wp:column -->
<!-- /wp:columns -->
<!-- wp:llms/form-field-text /-->"#,
        );

        let once = cascade(tree, None);
        let twice = cascade(once.clone(), None);
        assert_eq!(once, twice);
    }

    #[test]
    fn viewer_rules() {
        let guest = Viewer::default();
        let member = Viewer {
            logged_in: true,
            ..Default::default()
        };

        assert!(guest.can_see(None));
        assert!(guest.can_see(Some(&Visibility::LoggedOut)));
        assert!(!guest.can_see(Some(&Visibility::LoggedIn)));
        assert!(member.can_see(Some(&Visibility::LoggedIn)));
        assert!(!member.can_see(Some(&Visibility::LoggedOut)));
        assert!(member.can_see(Some(&Visibility::Other("enrolled".into()))));
        assert_eq!(Visibility::parse("logged-out"), Visibility::LoggedOut);
    }
}
