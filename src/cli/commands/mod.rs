#[cfg(feature = "dev-auth")]
pub mod dev_auth;
pub mod serve;
