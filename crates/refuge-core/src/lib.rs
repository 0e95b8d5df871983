//! Core types and rules for the Refuge resident registry.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the resident model, label derivation, the family graph, the
//! relationship suggestion scorer and the lifecycle controller that ties
//! them together.

pub mod bsn;
pub mod clock;
pub mod derive;
pub mod error;
pub mod family;
pub mod label;
pub mod lifecycle;
pub mod population;
pub mod resident;
pub mod store;
pub mod suggest;

pub use error::{Error, Result};
