// crates/schema-gate-config/src/lib.rs
// ============================================================================
// Module: Schema Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for schema-gate.toml semantics.
// Dependencies: schema-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! `schema-gate-config` defines the configuration model for Schema Gate
//! hosts. Loading is strict and fail-closed; validated settings map directly
//! into the core runtime types.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
