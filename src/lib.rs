//! hdspush - Live HDS fragment pusher
//!
//! Watches the directories a live Adobe HDS encoder writes into, splits each
//! segment index (`.f4x`) into individually addressable fragments, and pushes
//! them, along with bootstrap and manifest files, to an origin.
//!
//! This library crate exposes the pipeline for the binary and for
//! integration testing; box decoding lives in `hdspush-f4v`.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod recency;
pub mod upload;
pub mod watch;

pub use error::{Error, Result};
