//! Writer-side index management: the writer lock, commits, merges and
//! recovery of the last commit point on open.

mod deleter;
#[allow(clippy::module_inception)]
mod index;
mod lock;
mod recovery;

pub use index::{Index, IndexSnapshot, IndexState};
pub use lock::WriterLock;
