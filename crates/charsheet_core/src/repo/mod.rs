//! Persistence contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the storage contract the session manager depends on.
//! - Keep SQL details out of the service layer.
//!
//! # Invariants
//! - Repositories store opaque text blobs; decoding belongs to `codec`.

pub mod session_repo;
