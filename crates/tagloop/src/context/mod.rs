//! Conversation history and its compression policy.
//!
//! - [`history`]: typed [`HistoryEntry`](history::HistoryEntry) variants and
//!   the append-only [`History`](history::History).
//! - [`compression`]: the [`CompressionPolicy`](compression::CompressionPolicy)
//!   that keeps long sessions bounded.

pub mod compression;
pub mod history;
