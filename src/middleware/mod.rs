pub mod cookies;
pub mod guard;
pub mod response;
pub mod session_layer;

pub use guard::{navigation, protect, require_capability, CurrentUser, NavItem};
pub use response::{ApiResponse, ApiResult};
pub use session_layer::session_cookie_middleware;
