pub mod repo;
pub mod repo_types;
