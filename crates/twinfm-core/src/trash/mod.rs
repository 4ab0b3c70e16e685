//! System trash support.
//!
//! [`TrashAdapter`] moves paths into a freedesktop.org trash directory
//! (`files/` for bodies, `info/` for `.trashinfo` records) so that the
//! desktop's own trash UI can show and restore them. It never deletes
//! anything permanently on behalf of a caller.

pub mod adapter;
pub mod info;

pub use adapter::{TrashAdapter, TrashRecord};
pub use info::TrashInfo;
