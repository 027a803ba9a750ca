#![forbid(unsafe_code)]

//! Test support for imodal.
//!
//! - [`ScriptedTransport`]: replays canned page responses and failures and
//!   records every request it was handed.
//! - [`page`] / [`props`]: page-object fixtures.
//! - [`TraceCapture`]: collects span names and event messages emitted while a
//!   test runs.

mod fixtures;
mod scripted;
mod trace;

pub use fixtures::{mounted, page, props};
pub use scripted::{ScriptedReply, ScriptedTransport};
pub use trace::{CapturedTrace, TraceCapture};
