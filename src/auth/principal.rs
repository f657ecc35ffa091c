use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::permissions::Capability;

/// The authenticated actor as reported by the auth service's `GET /me`.
///
/// Held as an immutable snapshot next to the session's tokens. The
/// capability set is de-duplicated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WirePrincipal")]
pub struct Principal {
    pub id: String,
    #[serde(rename = "username")]
    pub display_name: String,
    permissions: BTreeSet<Capability>,
}

impl Principal {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        permissions: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn permissions(&self) -> &BTreeSet<Capability> {
        &self.permissions
    }

    /// Returns false when the pair was already present.
    pub fn grant(&mut self, capability: Capability) -> bool {
        self.permissions.insert(capability)
    }
}

/// What the auth service sends. Permissions may still arrive in the legacy
/// `"<action> <resource>"` form; they are converted here once.
#[derive(Deserialize)]
struct WirePrincipal {
    id: WireId,
    #[serde(rename = "username", alias = "displayName", alias = "display_name")]
    display_name: String,
    #[serde(default)]
    permissions: Vec<WireCapability>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireCapability {
    Structured { action: String, resource: String },
    Legacy(String),
}

impl From<WirePrincipal> for Principal {
    fn from(wire: WirePrincipal) -> Self {
        let id = match wire.id {
            WireId::Text(s) => s,
            WireId::Number(n) => n.to_string(),
        };

        let permissions: BTreeSet<Capability> = wire.permissions.into_iter().filter_map(|p| match p {
            WireCapability::Structured { action, resource } => Some(Capability::new(action, resource)),
            WireCapability::Legacy(raw) => match raw.parse::<Capability>() {
                Ok(cap) => Some(cap),
                Err(e) => {
                    tracing::warn!("Dropping permission for principal '{}': {}", id, e);
                    None
                }
            },
        }).collect();

        Principal {
            id,
            display_name: wire.display_name,
            permissions,
        }
    }
}
