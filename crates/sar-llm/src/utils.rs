//! Provider utility helpers (SSE parsing, stream accumulation).

pub mod sse;
pub mod stream_accumulator;

pub use sse::*;
pub use stream_accumulator::*;
