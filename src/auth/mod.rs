pub mod permissions;
pub mod principal;
pub mod tokens;

pub use permissions::{
    has_action, has_action_on_any_resource, has_all_capabilities, has_any_action,
    has_any_action_on_resource, has_any_capability, has_capability, Capability,
};
pub use principal::Principal;
pub use tokens::{AuthTokens, LoginRequest, RefreshRequest, TokenPair};
