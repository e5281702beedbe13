pub mod projects;
pub mod serve;
pub mod version;
