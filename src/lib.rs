//! Client-side data synchronization for the dayboard API.
//!
//! Server state for habits, reminders, projects and tags is held in a keyed
//! [`cache`] store, fetched by the [`query`] executor with in-flight
//! deduplication, and kept consistent after writes by the [`mutation`]
//! executor's invalidation graph. [`filter`] compiles list filter state into
//! request parameters and debounces search input.

pub mod api;
pub mod application;
pub mod cache;
pub mod config;
pub mod filter;
pub mod infra;
pub mod mutation;
pub mod query;
pub mod util;
