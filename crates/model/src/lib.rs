//! An abstraction layer for the LLMs that back a team of agents.
//!
//! This crate establishes an unified protocol for the engine to talk to
//! various model providers, so that agents can seamlessly switch between
//! them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.
//!
//! Users of this crate may add some extra functionalities or wrappers,
//! depending on their own use cases. Those extra code should be placed
//! in their own crate.

#![deny(missing_docs)]

mod error;
mod format;
mod message;
mod provider;
mod request;
mod response;

pub use error::*;
pub use format::*;
pub use message::*;
pub use provider::*;
pub use request::*;
pub use response::*;
