//! Repository layer: the metadata-driven CRUD engine.
//!
//! # Responsibility
//! - Translate between entity accessors and adapter-level row operations.
//! - Keep entity types persistence-agnostic behind registered bindings.
//!
//! # Invariants
//! - Insert-vs-update branching is decided solely by identity presence.
//! - The repository never builds SQL; criteria pass to the adapter as data.

pub mod repository;
