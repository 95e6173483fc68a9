//! Core types and traits for the Publer tool server.
//!
//! Job records serialize with a `status` discriminator so tool handlers can return them as-is.

mod job;
mod traits;

pub use job::*;
pub use traits::*;
