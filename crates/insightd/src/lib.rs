//! Grant Insight daemon library - exposes modules for testing.

pub mod nonce;
pub mod routes;
pub mod server;
