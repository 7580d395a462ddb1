//! Mutation service: validated, transactional writes.
//!
//! # Modules
//!
//! - `commands`: Serializable [`Mutation`] descriptions and their outcomes
//! - `mutation`: [`MutationService`] and the subset-reorder merge

pub mod commands;
pub mod mutation;

pub use commands::{Mutation, MutationOutcome};
pub use mutation::{merge_subset_order, Clock, MutationService};
