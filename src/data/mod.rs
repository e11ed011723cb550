pub mod config;
pub mod manifest;
pub mod settings;
pub mod states;
