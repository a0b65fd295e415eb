//! Grant Insight common library.
//!
//! Core building blocks for the consultation daemon: input sanitization,
//! client identity, the safety layer (rate limiting, circuit breakers,
//! retries), intent classification, relevance scoring, and the
//! consultation/search engines that tie them together.

pub mod cache;
pub mod consult;
pub mod content;
pub mod conversation;
pub mod error;
pub mod identity;
pub mod intent;
pub mod provider;
pub mod relevance;
pub mod safety;
pub mod sanitize;
pub mod search;
pub mod settings;
pub mod templates;

pub use error::GiError;
pub use settings::Settings;
