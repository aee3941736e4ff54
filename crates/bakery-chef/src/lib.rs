//! Chef tooling clients
//!
//! Berkshelf resolves cookbook dependencies and knife deletes the node and
//! client a server-mode build registered. Both are driven as subprocesses
//! behind the [`DependencyResolver`] and [`RemoteIdentityStore`] traits so the
//! pipelines can run against fakes.

pub mod berks;
pub mod command;
pub mod error;
pub mod identity;
pub mod knife;
pub mod resolver;

pub use berks::Berks;
pub use error::{ChefError, Result};
pub use identity::{DeleteStatus, RemoteIdentityStore};
pub use knife::Knife;
pub use resolver::DependencyResolver;
