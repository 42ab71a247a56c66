//! Reconciles a built profile with its local checkout through symbolic links.

pub mod applier;
pub mod planner;

pub use applier::{apply, relative_path, remove_path};
pub use planner::{SymlinkMap, plan};
