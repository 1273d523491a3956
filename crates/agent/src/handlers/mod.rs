//! Dispatch handler implementations.
//!
//! - [`LogHandler`]: console sink, everything goes to `tracing`.
//! - [`InteractiveRenderer`]: terminal sink that renders to a writer and
//!   records what it rendered into the session history.

pub mod interactive;
pub mod log;
pub mod table;

pub use interactive::InteractiveRenderer;
pub use log::LogHandler;
