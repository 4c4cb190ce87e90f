//! Sheet domain model.
//!
//! # Responsibility
//! - Define the fixed form schema and the plain-data sheet document.
//! - Define pip, relationship and tab records used by services.
//!
//! # Invariants
//! - Every label stored in a document comes from the `FormSchema`.
//! - Models hold no presentation state.

pub mod document;
pub mod dot_grid;
pub mod relationship;
pub mod schema;
pub mod tab;
