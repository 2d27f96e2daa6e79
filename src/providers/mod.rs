pub mod exchangerate_api;
pub mod file_source;
pub mod postgrest;
