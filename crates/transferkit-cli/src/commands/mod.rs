//! CLI command handlers

pub mod content;
pub mod extract;
pub mod providers;
pub mod show;
