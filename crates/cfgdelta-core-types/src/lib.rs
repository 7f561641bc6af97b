//! Core types shared across cfgdelta facilities
//!
//! This crate provides the canonical schema constants used by the logging
//! facility in `cfgdelta-core` and by the boundary logging in
//! `cfgdelta-engine`, so that every crate names structured fields and
//! lifecycle events the same way.

pub mod schema;
