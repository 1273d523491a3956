//! The genbi reasoning loop and its event dispatch pipeline.
//!
//! A turn follows a **Plan → Act → Observe** cycle:
//!
//! 1. **Receive** a user query for a session
//! 2. **Send** the session's conversation to the model
//! 3. **If tool calls**: execute them, dispatch each observation, loop back to 2
//! 4. **If text**: dispatch it as the final answer and return it
//!
//! Every observation is classified by [`EventClassifier`] and routed by the
//! [`Dispatcher`] to a [`DispatchHandler`](genbi_core::DispatchHandler).

pub mod classifier;
pub mod dispatch;
pub mod handlers;
pub mod loop_runner;
pub mod prompt;
pub mod replay;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use classifier::EventClassifier;
pub use dispatch::{DispatchStats, Dispatcher};
pub use handlers::{InteractiveRenderer, LogHandler};
pub use loop_runner::{MAX_ITERATIONS_MESSAGE, ReasoningLoop};
pub use replay::{ReplaySummary, replay, replay_wire};
