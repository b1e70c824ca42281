// ==============================================================================
// Evaluation Sessions
// ==============================================================================
//
// One session per top-level analysis request. The guard, the caches and the
// collected diagnostics all live here and die here — there is no ambient
// process-wide state. A session is single-threaded by construction (`&mut`
// everywhere); hosts that parallelize run one session per worker.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use derive_more::Debug;

use scry_ast::{FileId, NodeKey};

use crate::{MemoCache, RecursionGuard, ValueSet};

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(0);

/// Distinguishes independent top-level requests. The caches are keyed by
/// living inside a session, so the id is only needed where results cross a
/// session boundary (logging, host-side bookkeeping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[debug("SessionId({_0})")]
pub struct SessionId(u32);

impl SessionId {
    fn fresh() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Non-fatal outcomes collected during evaluation and path resolution.
/// Blocked recursion is designed control flow, not an error; heuristic
/// failures degrade the result instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    BlockedRecursion {
        key: NodeKey,
    },
    /// A search-path manipulation was detected but its argument could not be
    /// evaluated in the sandbox.
    SandboxFailure {
        detail: String,
    },
    /// Inferring the value of a detected path assignment failed.
    PathInferenceFailed {
        detail: String,
    },
    UnreadableFile {
        path: PathBuf,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::BlockedRecursion { key } => {
                write!(f, "caught recursion at {key:?}")
            }
            Diagnostic::SandboxFailure { detail } => {
                write!(
                    f,
                    "search path manipulation detected, but failed to evaluate: {detail}"
                )
            }
            Diagnostic::PathInferenceFailed { detail } => {
                write!(f, "could not infer assigned search path values: {detail}")
            }
            Diagnostic::UnreadableFile { path } => {
                write!(f, "could not read {}", path.display())
            }
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// The interpreter's own module search path, provided by the host.
    /// Stage 1 input to the resolver; never modified here.
    pub base_sys_path: Vec<PathBuf>,
    pub guard: RecursionGuard,
    pub eval_cache: MemoCache<NodeKey, ValueSet>,
    /// Whole-resolver results per file. `Vec<PathBuf>` is the resolver's
    /// `SearchPath`; the alias lives in `scry_paths`.
    pub search_path_cache: MemoCache<FileId, Vec<PathBuf>>,
    diagnostics: Vec<Diagnostic>,
}

impl Session {
    pub fn new(base_sys_path: Vec<PathBuf>) -> Self {
        Session {
            id: SessionId::fresh(),
            base_sys_path,
            guard: RecursionGuard::new(),
            eval_cache: MemoCache::new(),
            search_path_cache: MemoCache::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Record a non-fatal diagnostic and mirror it to the log.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn base_sys_path(&self) -> &[PathBuf] {
        &self.base_sys_path
    }
}
