//! Talking to the article store through the host shell.

pub mod background;
pub mod client;
pub mod store;
pub mod transport;

pub use client::{Lookup, SyncClient};
