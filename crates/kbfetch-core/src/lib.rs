//! kbfetch Core - Object Download Host
//!
//! This crate fetches remote knowledge-base objects and documents into a
//! local store. It guarantees at most one in-flight fetch per object id,
//! runs fetches on a bounded pool, and reports progress and completion
//! through events delivered to every subscriber. A standalone file fetcher covers plain URL
//! downloads.

mod auth;
mod error;
mod file_fetch;
mod host;
mod pool;
mod services;
mod storage;
mod worker;

pub use auth::*;
pub use error::*;
pub use file_fetch::*;
pub use host::*;
pub use pool::*;
pub use services::*;
pub use storage::*;
pub use worker::*;

pub use kbfetch_types as types;
