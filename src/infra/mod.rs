pub mod import;
pub mod mapping_store;
pub mod sqlite;
