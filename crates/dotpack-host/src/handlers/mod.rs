//! One handler per request type.
//!
//! Handlers never fail outward: collaborator errors become error-carrying
//! responses or log entries, and each handler posts at most one notification
//! of each kind.

pub mod details;
pub mod install;
pub mod projects;
pub mod ready;
pub mod search;
pub mod sources;

pub use details::handle_package_details;
pub use install::{handle_install, handle_uninstall};
pub use projects::{handle_get_projects, handle_refresh_project_cache};
pub use ready::handle_ready;
pub use search::{handle_load_more, handle_search};
pub use sources::handle_get_package_sources;
