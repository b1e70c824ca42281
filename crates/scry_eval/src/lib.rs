// ==============================================================================
// Recursion-Safe, Memoized Evaluation Substrate
// ==============================================================================
//
// Type inference over duck-typed code recurses without any static termination
// guarantee: functions call themselves while their own arguments are being
// evaluated, imports cycle, attribute chains loop back into their defining
// scope. This crate does not decide what anything evaluates to — that is the
// inference rule set's job, behind the `InferenceRules` trait. It guarantees
// that any such evaluation terminates (recursion guard), is not recomputed
// (memo caches), and can be forked and retried safely (everything is scoped
// to one `Session`).

pub mod cache;
pub mod guard;
pub mod session;


#[cfg(test)]
mod pbt;

use std::collections::BTreeSet;

use smol_str::SmolStr;
use thiserror::Error;

use scry_ast::{FileId, NodeId, NodeKey, SourceDb};

pub use cache::MemoCache;
pub use guard::RecursionGuard;
pub use session::{Diagnostic, Session, SessionId};

// ==============================================================================
// Values
// ==============================================================================

/// The value model at the inference-rule boundary. The substrate only ever
/// needs to ask one question of a value — "is this a string, and what does it
/// say" — so everything non-string is an opaque tagged object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Str(SmolStr),
    /// Non-string result; the tag is only for debugging output.
    Object(SmolStr),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Object(_) => None,
        }
    }
}

/// Result set of one evaluation. A `BTreeSet` keeps iteration deterministic,
/// which the resolver relies on for reproducible search paths.
pub type ValueSet = BTreeSet<Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The inference rule set signalled failure. Never cached: the next call
    /// with the same key retries.
    #[error("inference rules failed: {0}")]
    Rules(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

// ==============================================================================
// Inference-Rule Boundary
// ==============================================================================

/// An element of a lazily unpacked iterable value.
#[derive(Debug, Clone)]
pub enum LazyValue {
    Known(ValueSet),
    /// Not yet inferred; `infer` routes through the guarded, memoized path.
    Deferred(NodeId),
}

impl LazyValue {
    pub fn infer(
        &self,
        db: &dyn SourceDb,
        session: &mut Session,
        rules: &dyn InferenceRules,
        file: FileId,
    ) -> EvalResult<ValueSet> {
        match self {
            LazyValue::Known(values) => Ok(values.clone()),
            LazyValue::Deferred(node) => guarded_evaluate(db, session, rules, file, *node),
        }
    }
}

/// The host's inference rule set. Hosts implement `evaluate`; recursive
/// sub-evaluations inside it must go back through [`guarded_evaluate`] so the
/// guard and caches see them.
pub trait InferenceRules {
    fn evaluate(
        &self,
        db: &dyn SourceDb,
        session: &mut Session,
        file: FileId,
        node: NodeId,
    ) -> EvalResult<ValueSet>;

    /// Unpack `values` (inferred for the expression at `at`) into a lazy
    /// sequence of elements. The default is structural: list and tuple
    /// displays defer to their element nodes, anything else yields the value
    /// set whole.
    fn iterate(&self, db: &dyn SourceDb, file: FileId, values: &ValueSet, at: NodeId) -> Vec<LazyValue> {
        let module = db.module(file);
        match module[at].kind {
            scry_ast::NodeKind::List | scry_ast::NodeKind::Tuple => {
                module[at].child_nodes().map(LazyValue::Deferred).collect()
            }
            _ => vec![LazyValue::Known(values.clone())],
        }
    }
}

// ==============================================================================
// Guarded, Memoized Evaluation
// ==============================================================================

/// Evaluate `node` through the recursion guard and the session's evaluation
/// cache.
///
/// Re-entry into a position already on the guard stack yields an empty set
/// for that call only, plus a [`Diagnostic::BlockedRecursion`] on the
/// session; it is never written to the cache, so a later evaluation outside
/// the blocking stack computes the real answer. Rule-set failures propagate
/// and are likewise not cached.
pub fn guarded_evaluate(
    db: &dyn SourceDb,
    session: &mut Session,
    rules: &dyn InferenceRules,
    file: FileId,
    node: NodeId,
) -> EvalResult<ValueSet> {
    let module = db.module(file);

    // Parameter references recur naturally (default-value chains re-visit the
    // same parameter across call sites); tracking them only produces false
    // positives.
    if module[node].kind.is_param() {
        return rules.evaluate(db, session, file, node);
    }

    let key = NodeKey::of(file, &module, node);
    if session.guard.enter(key) {
        session.report(Diagnostic::BlockedRecursion { key });
        return Ok(ValueSet::new());
    }

    let result = evaluate_memoized(db, session, rules, file, node, key);
    // Pop on every path out of the wrapped evaluation, including Err: a
    // leaked frame would falsely block unrelated later evaluations.
    session.guard.exit();
    result
}

fn evaluate_memoized(
    db: &dyn SourceDb,
    session: &mut Session,
    rules: &dyn InferenceRules,
    file: FileId,
    node: NodeId,
    key: NodeKey,
) -> EvalResult<ValueSet> {
    if let Some(hit) = session.eval_cache.lookup(&key) {
        return Ok(hit);
    }

    // Provisional default: anything re-entering this key mid-computation
    // (through a path the guard exempts) observes an empty set instead of
    // diverging. Overwritten or removed below, never left behind.
    session.eval_cache.begin(key, ValueSet::new());

    match rules.evaluate(db, session, file, node) {
        Ok(values) => {
            session.eval_cache.finish(key, values.clone());
            Ok(values)
        }
        Err(err) => {
            session.eval_cache.cancel(&key);
            Err(err)
        }
    }
}
