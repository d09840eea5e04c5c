//! Rulegraph engine: the visual automation rule compiler.
//!
//! ```text
//!   host edit ──► EditorSession ──► MutationObserver
//!                      │                   │ structural?
//!                      │                   ▼
//!                      │            Propagator (pass 1: forward types,
//!                      │                        pass 2: pickers / variables,
//!                      │                        connection sweep) ── fixpoint
//!                      ▼
//!             emit::emit_script  +  diagram::write_diagram
//!                      │
//!                      ▼
//!          onScriptChanged / onDiagramChanged listeners
//! ```
//!
//! Everything here is single-threaded and synchronous. A mutation cycle always
//! leaves the graph type-consistent before control returns to the host.

pub mod block;
pub mod config;
pub mod debug;
pub mod diagram;
pub mod emit;
pub mod error;
pub mod graph;
pub mod observer;
pub mod propagate;
pub mod registry;
pub mod session;
pub mod variables;

pub use block::{Block, BlockId, BlockKind, Picker, Position, Socket};
pub use config::EditorConfig;
pub use error::EngineError;
pub use graph::BlockGraph;
pub use propagate::{PropagationReport, Propagator};
pub use registry::BlockRegistry;
pub use session::{Connection, EditorSession, FieldEdit};
pub use variables::{Variable, VariableId};
