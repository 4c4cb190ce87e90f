//! Flutter-facing bindings for the character sheet engine.

pub mod api;
