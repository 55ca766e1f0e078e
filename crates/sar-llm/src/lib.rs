//! Streaming LLM client used by the SAR assistant.
//!
//! The crate is organized in layers: the conversation data model (`types`),
//! unified stream events (`stream`), the provider seam (`provider`), the
//! client with its middleware chain (`client`), and concrete adapters
//! (`openai_compat`).

pub mod client;
pub mod errors;
pub mod openai_compat;
pub mod provider;
pub mod stream;
pub mod types;
pub mod utils;

pub use client::*;
pub use errors::*;
pub use openai_compat::*;
pub use provider::*;
pub use stream::*;
pub use types::*;
pub use utils::{ResponseSeed, SseEvent, SseParser, StreamAccumulator};
