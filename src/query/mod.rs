//! Query execution on top of the cache store.

mod executor;
pub mod pagination;
mod retry;

pub use executor::{QueryExecutor, QueryFn, QueryOptions};
pub use pagination::{Page, PageCollection};
pub use retry::RetryPolicy;

pub(crate) use executor::{
    METRIC_INVALIDATION, METRIC_QUERY_DEDUP, METRIC_QUERY_ERROR, METRIC_QUERY_FETCH,
    METRIC_QUERY_FETCH_MS,
};
