//! Logging infrastructure for structured console and file output.
//!
//! Library code logs through plain [`tracing`] macros. Events sent to the
//! `packsync::stage` target render as section headers on the console.

mod subscriber;
mod utils;

pub use subscriber::init_subscriber;
