//! Chat-completion providers for genbi.
//!
//! All providers implement [`genbi_core::Provider`].

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
