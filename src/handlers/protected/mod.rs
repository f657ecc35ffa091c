pub mod dashboard;
pub mod resources;

pub use dashboard::{dashboard, me};
pub use resources::{assets_list, post_delete, post_get, posts_list, users_list};
