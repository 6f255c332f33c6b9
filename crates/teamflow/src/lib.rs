//! An out-of-the-box team of agents that assembles the engine, the model
//! providers and the behaviour-test harness.
//!
//! The crate includes a CLI tool that runs a workflow described in a JSON
//! file. And you can also use it as a library to run workflows from your
//! own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod session;

pub use config::{ConfigError, MemberConfig, WorkflowConfig};
pub use session::{Session, SessionBuilder};

/// Re-exports of [`teamflow_core`] crate.
pub mod core {
    pub use teamflow_core::*;
}

/// Re-exports of [`teamflow_bdd`] crate.
pub mod bdd {
    pub use teamflow_bdd::*;
}

/// Re-exports of [`teamflow_openai_model`] crate.
pub mod openai {
    pub use teamflow_openai_model::*;
}
