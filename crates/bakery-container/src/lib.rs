//! Container engine integration
//!
//! The pipelines only see the [`ContainerEngine`] trait; [`DockerEngine`]
//! implements it against a local Docker daemon through bollard.

pub mod context;
pub mod docker;
pub mod engine;
pub mod error;
pub mod progress;

pub use context::ContextBuilder;
pub use docker::DockerEngine;
pub use engine::{ContainerEngine, HistoryEntry, ImageHandle, ImageId};
pub use error::{ContainerError, Result};
pub use progress::BuildProgress;
