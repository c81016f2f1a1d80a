pub mod file_type;
pub mod security;
