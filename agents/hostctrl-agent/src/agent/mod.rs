//! Agent module
//!
//! This module contains the idempotent Host Agent states, the change reports they return,
//! and the local helpers they rely on (command runner, sldreg parsing, discovery state tracking).

pub mod context;
pub mod discovery;
pub mod handler;
pub mod report;
pub mod runner;
pub mod sda;
pub mod sldreg;
pub mod state;

pub use context::Context;
pub use discovery::DiscoveryRequest;
pub use handler::StateHandler;
pub use report::{ChangeReport, Changes, StateResult};
pub use sda::SdaRequest;
