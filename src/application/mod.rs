//! Application layer: the sync client façade and its error type.

pub mod client;
pub mod error;

pub use client::SyncClient;
