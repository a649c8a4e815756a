//! Service layer for gitstore
//!
//! Collaborator capabilities (backend, filesystem, progress) and the
//! repository session that ties them to the reconciliation commands.

pub mod backend;
pub mod filesystem;
pub mod git2_backend;
pub mod progress;
pub mod session;

pub use backend::{Author, CheckoutTarget, VcsBackend};
pub use filesystem::{LocalFs, VirtualFs};
pub use git2_backend::Git2Backend;
pub use progress::{ProgressEvent, ProgressObserver, RecordingObserver};
pub use session::{RepositorySession, SessionSnapshot};
