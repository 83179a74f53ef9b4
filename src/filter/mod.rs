//! Filter state of list surfaces and debounced search input.

mod compiler;
mod debounce;

pub use compiler::{
    AdvancedFilter, FilterMode, FilterSpec, QueryParams, QuickFilter, SearchMode, Searchable,
};
pub use debounce::Debouncer;
