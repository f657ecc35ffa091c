pub mod app;
pub mod auth;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
#[cfg(feature = "dev-auth")]
pub mod devauth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod session;
