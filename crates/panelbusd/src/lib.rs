//! panelbus daemon - panel dispatch actors and module lifecycle
//!
//! - `dispatch` - Per-panel dispatcher: parse, resolve, coerce, apply
//! - `reporter` - Diagnostic event sink (`tracing` or in-memory)
//! - `runtime` - Panel actors, module lifecycle fan-out, inbound routing
//! - `config` - TOML configuration and path resolution
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │ dyn Transport  (inbound line stream, port writes)           │
//!  └──────┬───────────────────────────────────────────▲───────────┘
//!         │ InboundLine                               │ ForwardPayload
//!  ┌──────▼──────────────┐                            │
//!  │ InboundRouter       │  one per transport,        │
//!  │ (RoutingTable)      │  ports of every module     │
//!  └──────┬──────────────┘                            │
//!  ┌──────▼───────────────────────────────────────────┴───────────┐
//!  │ ModuleRuntime (per module)                                   │
//!  │   PanelActor per enabled panel: Dispatcher + StateStore      │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! No `.unwrap()`, `.expect()` or `panic!()` outside tests; every fallible
//! operation returns `Result` and channel closure maps to an error.

pub mod config;
pub mod dispatch;
pub mod reporter;
pub mod runtime;

pub use config::{ConfigError, SystemConfig};
pub use dispatch::{DispatchError, Dispatcher, Outcome, OutcomeKind, ResolutionScope, ScopeKind};
pub use reporter::{MemoryReporter, ReportEvent, Reporter, TracingReporter};
pub use runtime::{
    InboundRouter, ModuleRuntime, PanelError, PanelHandle, RoutingTable, RuntimeSettings,
};
