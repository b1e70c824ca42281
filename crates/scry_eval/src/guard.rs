// ==============================================================================
// Recursion Guard
// ==============================================================================

use scry_ast::NodeKey;

/// One entry on the guard stack. The frame below it is the frame that induced
/// it, so the stack itself is the chain of active evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub key: NodeKey,
}

/// Per-session stack of active evaluation positions.
///
/// `enter`/`exit` form a scoped acquisition: callers must pop on every exit
/// path from the wrapped evaluation, or the leaked frame will falsely block
/// unrelated evaluations for the rest of the session.
#[derive(Debug, Default)]
pub struct RecursionGuard {
    frames: Vec<Frame>,
}

impl RecursionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true ("blocked") if `key` is already anywhere on the stack;
    /// otherwise pushes a frame for it and returns false.
    pub fn enter(&mut self, key: NodeKey) -> bool {
        if self.frames.iter().any(|frame| frame.key == key) {
            return true;
        }
        self.frames.push(Frame { key });
        false
    }

    /// Pop the most recently pushed frame. Exiting without a matching enter
    /// is a contract violation internal to this crate, not a recoverable
    /// error.
    pub fn exit(&mut self) {
        let popped = self.frames.pop();
        debug_assert!(popped.is_some(), "recursion guard: exit without enter");
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
