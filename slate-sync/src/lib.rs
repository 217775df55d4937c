//! # slate-sync
//!
//! Output-tree population and remote store access.
//!
//! Call [`copy::copy_tree`] to rebuild the output tree from the source tree,
//! [`copy::copy_file`] / [`copy::remove_file`] for single watcher events, and
//! [`store::connect`] to open the remote store session for a run.

pub mod copy;
pub mod error;
pub mod hash;
pub mod store;
pub mod theme;

pub use copy::{copy_file, copy_subtree, copy_tree, remove_file, CopySummary};
pub use error::SyncError;
pub use store::{connect, LocalOnlyStore, RemoteStore};
pub use theme::ThemeStore;
