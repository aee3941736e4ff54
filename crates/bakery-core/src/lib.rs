//! bakery core model
//!
//! Image references and the on-disk docker contexts that the build and
//! rebase pipelines operate on.

pub mod context;
pub mod error;
pub mod image;

pub use context::{BuildContext, ChefMode};
pub use error::{CoreError, Result};
pub use image::{DEFAULT_TAG, ImageReference, sanitize, split_image_tag, validate_tag};
