//! An abstraction layer for different LLMs.
//!
//! This crate establishes an unified protocol for the agent to interact
//! with various supported LLMs, so that the agent can seamlessly switch
//! between them without modifying the core codebase.
//!
//! The protocol is deliberately narrow: a provider receives a system prompt,
//! the current user message and the prior turns of the conversation, and
//! produces one piece of text. Everything else (tokenization, sampling,
//! transport) belongs to the provider.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;

pub use error::*;
pub use provider::*;
pub use request::*;
