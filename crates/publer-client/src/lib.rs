//! Publer API forwarding client.

mod client;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::PublerClient;
pub use publer_types::{ForwardError, Forwarder, Headers, QueryParams};

#[cfg(feature = "test-util")]
pub use mock::{MockForwarder, MockReply};
