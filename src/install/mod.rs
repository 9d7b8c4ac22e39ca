//! Model slot replacement with backup, verification and rollback.

mod errors;
mod installer;
mod slot;

pub use errors::InstallError;
pub use installer::{FailureKind, InstallPhase, InstallReport, ModelInstaller, RestoreReport};
pub use slot::{FileStatus, ModelSlot, SlotStatus};
pub(crate) use slot::sha256_hex;
