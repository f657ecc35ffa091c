//! Capability model: `(action, resource)` pairs and the checks the UI and
//! route handlers use to decide what a principal may do.
//!
//! Every check takes `Option<&Principal>` so callers can pass "no user" and
//! get `false` back instead of branching themselves.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::principal::Principal;

/// CRUD action names understood by the backends.
pub mod actions {
    pub const CREATE: &str = "create";
    pub const READ: &str = "read";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
}

/// Resource names understood by the backends.
pub mod resources {
    pub const POST: &str = "post";
    pub const USER: &str = "user";
    pub const PERMISSION: &str = "permission";
    pub const ASSET: &str = "asset";
}

/// One permitted operation. Equality is exact and case-sensitive on both fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub action: Cow<'static, str>,
    pub resource: Cow<'static, str>,
}

impl Capability {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: Cow::Owned(action.into()),
            resource: Cow::Owned(resource.into()),
        }
    }

    pub const fn from_static(action: &'static str, resource: &'static str) -> Self {
        Self {
            action: Cow::Borrowed(action),
            resource: Cow::Borrowed(resource),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

/// Legacy flat encoding: `"<action> <resource>"`.
impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.resource)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed capability '{0}': expected \"<action> <resource>\"")]
pub struct ParseCapabilityError(pub String);

impl FromStr for Capability {
    type Err = ParseCapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(action), Some(resource), None) => Ok(Capability::new(action, resource)),
            _ => Err(ParseCapabilityError(s.to_string())),
        }
    }
}

// Post permissions
pub const CREATE_POST: Capability = Capability::from_static(actions::CREATE, resources::POST);
pub const READ_POST: Capability = Capability::from_static(actions::READ, resources::POST);
pub const UPDATE_POST: Capability = Capability::from_static(actions::UPDATE, resources::POST);
pub const DELETE_POST: Capability = Capability::from_static(actions::DELETE, resources::POST);

// User permissions
pub const CREATE_USER: Capability = Capability::from_static(actions::CREATE, resources::USER);
pub const READ_USER: Capability = Capability::from_static(actions::READ, resources::USER);
pub const UPDATE_USER: Capability = Capability::from_static(actions::UPDATE, resources::USER);
pub const DELETE_USER: Capability = Capability::from_static(actions::DELETE, resources::USER);

// Permission management permissions
pub const CREATE_PERMISSION: Capability = Capability::from_static(actions::CREATE, resources::PERMISSION);
pub const READ_PERMISSION: Capability = Capability::from_static(actions::READ, resources::PERMISSION);
pub const UPDATE_PERMISSION: Capability = Capability::from_static(actions::UPDATE, resources::PERMISSION);
pub const DELETE_PERMISSION: Capability = Capability::from_static(actions::DELETE, resources::PERMISSION);

// Asset permissions
pub const CREATE_ASSET: Capability = Capability::from_static(actions::CREATE, resources::ASSET);
pub const READ_ASSET: Capability = Capability::from_static(actions::READ, resources::ASSET);
pub const UPDATE_ASSET: Capability = Capability::from_static(actions::UPDATE, resources::ASSET);
pub const DELETE_ASSET: Capability = Capability::from_static(actions::DELETE, resources::ASSET);

pub fn has_capability(principal: Option<&Principal>, capability: &Capability) -> bool {
    principal.is_some_and(|p| p.permissions().contains(capability))
}

pub fn has_any_capability(principal: Option<&Principal>, capabilities: &[Capability]) -> bool {
    capabilities.iter().any(|c| has_capability(principal, c))
}

/// True when every capability is held. An empty list is satisfied by any
/// present principal, never by an absent one.
pub fn has_all_capabilities(principal: Option<&Principal>, capabilities: &[Capability]) -> bool {
    principal.is_some() && capabilities.iter().all(|c| has_capability(principal, c))
}

pub fn has_action(principal: Option<&Principal>, action: &str, resource: &str) -> bool {
    principal.is_some_and(|p| {
        p.permissions()
            .iter()
            .any(|c| c.action() == action && c.resource() == resource)
    })
}

/// Any of `actions` on one resource.
pub fn has_any_action(principal: Option<&Principal>, actions: &[&str], resource: &str) -> bool {
    actions.iter().any(|action| has_action(principal, action, resource))
}

pub fn has_action_on_any_resource(principal: Option<&Principal>, action: &str) -> bool {
    principal.is_some_and(|p| p.permissions().iter().any(|c| c.action() == action))
}

pub fn has_any_action_on_resource(principal: Option<&Principal>, resource: &str) -> bool {
    principal.is_some_and(|p| p.permissions().iter().any(|c| c.resource() == resource))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Principal {
        Principal::new(
            "123",
            "testuser",
            [
                Capability::new("create", "post"),
                Capability::new("read", "user"),
                Capability::new("update", "asset"),
            ],
        )
    }

    #[test]
    fn exact_match_only() {
        let p = user();
        assert!(has_capability(Some(&p), &CREATE_POST));
        assert!(!has_capability(Some(&p), &DELETE_POST));
        assert!(has_capability(Some(&p), &READ_USER));
        // Case-sensitive
        assert!(!has_capability(Some(&p), &Capability::new("Create", "post")));
        assert!(!has_capability(Some(&p), &Capability::new("create", "Post")));
    }

    #[test]
    fn absent_principal_never_matches() {
        assert!(!has_capability(None, &CREATE_POST));
        assert!(!has_any_capability(None, &[CREATE_POST, READ_USER]));
        assert!(!has_all_capabilities(None, &[]));
        assert!(!has_action(None, "create", "post"));
        assert!(!has_action_on_any_resource(None, "create"));
        assert!(!has_any_action_on_resource(None, "post"));
    }

    #[test]
    fn any_and_all_agree_with_single_checks() {
        let p = user();
        let lists: Vec<Vec<Capability>> = vec![
            vec![],
            vec![DELETE_POST],
            vec![DELETE_POST, READ_USER],
            vec![CREATE_POST, READ_USER, UPDATE_ASSET],
            vec![CREATE_POST, CREATE_USER],
        ];
        for list in lists {
            let any = list.iter().any(|c| has_capability(Some(&p), c));
            let all = list.iter().all(|c| has_capability(Some(&p), c));
            assert_eq!(has_any_capability(Some(&p), &list), any, "{list:?}");
            assert_eq!(has_all_capabilities(Some(&p), &list), all, "{list:?}");
        }
    }

    #[test]
    fn empty_requirement_list() {
        let p = user();
        assert!(!has_any_capability(Some(&p), &[]));
        assert!(has_all_capabilities(Some(&p), &[]));
    }

    #[test]
    fn action_helpers() {
        let p = user();
        assert!(has_action(Some(&p), "create", "post"));
        assert!(!has_action(Some(&p), "delete", "post"));
        assert!(has_any_action(Some(&p), &["delete", "update"], "asset"));
        assert!(!has_any_action(Some(&p), &["delete", "read"], "asset"));
        assert!(has_action_on_any_resource(Some(&p), "read"));
        assert!(!has_action_on_any_resource(Some(&p), "delete"));
        assert!(has_any_action_on_resource(Some(&p), "asset"));
        assert!(!has_any_action_on_resource(Some(&p), "permission"));
    }

    #[test]
    fn legacy_string_form() {
        let cap: Capability = "delete post".parse().unwrap();
        assert_eq!(cap, DELETE_POST);
        assert_eq!(cap.to_string(), "delete post");
        assert_eq!("  read   user ".parse::<Capability>().unwrap(), READ_USER);

        assert!("deletepost".parse::<Capability>().is_err());
        assert!("".parse::<Capability>().is_err());
        assert!("read user extra".parse::<Capability>().is_err());
    }

    #[test]
    fn owned_and_static_capabilities_compare_equal() {
        assert_eq!(Capability::new("read", "asset"), READ_ASSET);
        assert_eq!(
            serde_json::to_value(&READ_ASSET).unwrap(),
            serde_json::json!({"action": "read", "resource": "asset"})
        );
    }
}
