//! Engine services.
//!
//! # Responsibility
//! - Enforce budgets and dot-grid rules on the live editor.
//! - Manage tabs, relationship registries and session persistence.
//! - Keep FFI/CLI layers free of storage and codec details.

pub mod budget;
pub mod relationship_registry;
pub mod session_service;
pub mod sheet_editor;
