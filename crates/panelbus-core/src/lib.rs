//! panelbus Core - Shared types for control-panel signal dispatch
//!
//! This crate provides the core domain types shared between
//! the protocol crate and the daemon (panelbusd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod module;
pub mod oid;
pub mod panel;
pub mod state;
pub mod value;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use module::Module;
pub use oid::Oid;
pub use panel::{Panel, PanelDescriptor, PanelSpec};
pub use state::{StateEntry, StateStore};
pub use value::{SignalValue, ValueType};
