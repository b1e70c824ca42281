// ==============================================================================
// Source Database
// ==============================================================================
//
// The parser for the analyzed language is an external collaborator; this trait
// is the seam it plugs into. `load_file` is what lets the search-path resolver
// pull additional files (bootstrap scripts) into an analysis session without
// knowing how they get parsed.

use std::path::Path;
use std::sync::Arc;

use derive_more::Debug;

use crate::Module;

/// Handle for a loaded module. Cheap to copy and hash; the identity half of
/// [`crate::NodeKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("FileId({_0})")]
pub struct FileId(u32);

impl From<u32> for FileId {
    #[inline]
    fn from(value: u32) -> Self {
        FileId(value)
    }
}

impl From<FileId> for u32 {
    #[inline]
    fn from(value: FileId) -> Self {
        value.0
    }
}

impl From<FileId> for usize {
    #[inline]
    fn from(value: FileId) -> Self {
        value.0 as usize
    }
}

pub trait SourceDb {
    /// The lowered module for a previously loaded file. Returns a shared
    /// handle so callers can hold the module across `&mut` session use.
    fn module(&self, file: FileId) -> Arc<Module>;

    /// Load (and lower) a file by path. `None` on any failure: missing file,
    /// unreadable contents, parse error. Implementations may cache.
    fn load_file(&self, path: &Path) -> Option<FileId>;
}
