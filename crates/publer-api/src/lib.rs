//! Publer tool server: credential handling, configuration, and the HTTP tool surface.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod monitoring;
pub mod server;
pub mod tools;
