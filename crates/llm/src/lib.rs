//! Choreo RCA LLM
//!
//! Incremental handling of structured model output while it streams:
//! - `partial_json` - best-effort decoding of an incomplete JSON text
//! - `delta_parser` - `message` delta extraction and `actions` tracking
//! - `chat_stream` - model chunks to caller-facing chat events

pub mod chat_stream;
pub mod delta_parser;
pub mod partial_json;

pub use chat_stream::{ChatStreamAssembler, ModelChunk};
pub use delta_parser::StreamingDeltaParser;
pub use partial_json::{LenientJsonDecoder, PartialJsonDecoder};
