//! Core types - small abstractions shared across the codebase.

mod kind;
mod mode;
mod shutdown;
mod state;

pub use kind::DocumentKind;
pub use mode::BuildMode;
pub use shutdown::setup_shutdown_handler;
pub use state::{DocumentState, InvalidTransition};
