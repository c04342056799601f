//! Agentflow Core
//!
//! Foundational error types and streaming primitives for the Agentflow
//! workspace. This crate has zero dependencies on application-level code
//! (providers, tools, orchestration).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `streaming` - Finite chat chunk stream (`ChatChunk`, `ChatStream`, `ChatStreamSender`)
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/tokio-sync/thiserror** - keeps build times minimal
//! 2. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::{chat_channel, ChatChunk, ChatStream, ChatStreamSender};
