#![forbid(unsafe_code)]

//! Single-threaded runtime pieces for imodal.
//!
//! - [`reactive`]: observable values with change notification.
//! - [`tick`]: the render-tick queue used to defer work until the renderer
//!   has observed a change.
//! - [`logging`]: `tracing` subscriber installation.

pub mod logging;
pub mod reactive;
pub mod tick;

pub use logging::{LogFormat, LoggingError, init_logging};
pub use reactive::{Observable, Subscription};
pub use tick::TickQueue;
