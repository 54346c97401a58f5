pub mod config;
pub mod map;
pub mod script;
