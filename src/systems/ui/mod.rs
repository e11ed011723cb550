//! Floating panel windows placed by `systems::spatial`.
pub mod window;
