//! Command implementations behind the `resxsync` binary, exposed for tests.

pub mod discovery;
pub mod error;
pub mod exchange;
pub mod scan;
pub mod status;
pub mod sync;
pub mod validation;
pub mod workspace;

pub use error::CommandError;
pub use workspace::{ProjectOptions, Workspace};
