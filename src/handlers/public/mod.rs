pub mod health;
pub mod login;

pub use health::health;
pub use login::{login_form, login_submit, logout, LoginForm};
