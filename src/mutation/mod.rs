//! Mutations and their cache effects.

mod executor;
pub mod graph;

pub use executor::{Mutation, MutationExecutor};
pub use graph::{DirectWrite, HabitMark, MutationDescriptor, MutationKind, descriptor};

pub(crate) use executor::{METRIC_MUTATION, METRIC_MUTATION_ERROR};
