//! Build and rebase pipelines
//!
//! [`BuildPipeline`] bakes a docker context into an image; [`RebasePipeline`]
//! moves an existing image onto a freshly pulled base. Both talk to the
//! outside world only through the capability traits of `bakery-container`
//! and `bakery-chef`.

pub mod build;
pub mod error;
pub mod options;
pub mod outcome;
pub mod rebase;
pub mod secure;

#[cfg(test)]
pub(crate) mod testing;

pub use build::BuildPipeline;
pub use error::{BakeError, Phase, PipelineError, Result, Warning};
pub use options::{BuildOptions, DEFAULT_BASE_IMAGE, RebaseOptions, RebaseStrategy};
pub use outcome::{
    BaseSource, BuildOutcome, CleanupStatus, RebaseOutcome, RemoteCleanup, ResolutionStatus,
};
pub use rebase::{LayerPlan, RebasePipeline, plan_history_walk};
pub use secure::{SecureGuard, SecureStager, SecureStagingState};
