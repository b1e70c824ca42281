// ==============================================================================
// Module Search-Path Resolution
// ==============================================================================
//
// Computes the ordered list of directories used to resolve imports for one
// analyzed file. Five heuristics run in order, each appending to the
// accumulating path (never merged or deduplicated — later stages must be able
// to shadow the interpreter's base path by preceding it):
//
//   1. the host-provided base interpreter path,
//   2. isolated-environment detection with legacy link-file expansion,
//   3. static self-inspection of the file for `sys.path` manipulations
//      (inference for assignments, sandboxed evaluation for append/insert),
//   4. web-framework project layout detection,
//   5. project bootstrap scripts, themselves scanned with stage 3.
//
// Every heuristic failure is swallowed at its own stage with a diagnostic;
// the resolver as a whole never fails, it degrades to a shorter path.

mod detect;
pub mod sandbox;
mod venv;


pub use detect::{BOOTSTRAP_MARKER, DJANGO_MARKER};
pub use sandbox::{Bindings, SandboxError};
pub use venv::ENV_MARKER;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use smol_str::SmolStr;

use scry_ast::{Child, FileId, Module, NodeId, NodeKind, SourceDb};
use scry_eval::{guarded_evaluate, Diagnostic, InferenceRules, Session};

/// Ordered directory list; duplicates permitted, earlier entries win on name
/// collision.
pub type SearchPath = Vec<PathBuf>;

/// Object and attribute naming the process-wide module search path variable
/// in analyzed sources (`sys.path`).
const SEARCH_PATH_OBJECT: &str = "sys";
const SEARCH_PATH_ATTR: &str = "path";

/// Resolve the import search path for `file`.
///
/// Memoized per (session, file): stages 3–5 parse extra files and run the
/// sandbox, which is too expensive to repeat. The provisional cache default
/// is the base path, so a bootstrap script whose own resolution chains back
/// into this file terminates with the plain interpreter path instead of
/// looping.
pub fn resolve_search_path(
    db: &dyn SourceDb,
    session: &mut Session,
    rules: &dyn InferenceRules,
    file: FileId,
) -> SearchPath {
    if let Some(hit) = session.search_path_cache.lookup(&file) {
        return hit;
    }
    session
        .search_path_cache
        .begin(file, session.base_sys_path.clone());

    let resolved = resolve_uncached(db, session, rules, file);
    session.search_path_cache.finish(file, resolved.clone());
    resolved
}

fn resolve_uncached(
    db: &dyn SourceDb,
    session: &mut Session,
    rules: &dyn InferenceRules,
    file: FileId,
) -> SearchPath {
    let module = db.module(file);
    let Some(file_path) = module.path.clone() else {
        // No on-disk location: no heuristics, just the interpreter path.
        return session.base_sys_path.clone();
    };

    let mut result = venv::environment_search_path(&file_path, session.base_sys_path());
    result.extend(path_modifications(db, session, rules, file, &file_path));
    result.extend(detect::framework_paths(&file_path));

    // Bootstrap-script contributions are an unordered set by design; BTreeSet
    // keeps the appended tail reproducible.
    let mut script_contributions: BTreeSet<PathBuf> = BTreeSet::new();
    for script in detect::bootstrap_script_candidates(&file_path, session) {
        let Some(script_file) = db.load_file(&script) else {
            session.report(Diagnostic::UnreadableFile { path: script });
            continue;
        };
        for path in path_modifications(db, session, rules, script_file, &script) {
            script_contributions.insert(path);
        }
    }
    result.extend(script_contributions);

    result
}

// ==============================================================================
// Stage 3 — Static Self-Inspection
// ==============================================================================

/// Scan `file` for manipulations of the module search path variable and
/// collect the contributed directories, in source order.
///
/// Deliberately tolerant: a false positive merely widens the search path,
/// which costs little, while a false negative only degrades completeness.
fn path_modifications(
    db: &dyn SourceDb,
    session: &mut Session,
    rules: &dyn InferenceRules,
    file: FileId,
    file_path: &Path,
) -> Vec<PathBuf> {
    let module = db.module(file);
    let mut found = Vec::new();

    for &attr in module.used_names(SEARCH_PATH_ATTR) {
        if !is_search_path_attr(&module, attr) {
            continue;
        }
        if let Some((method, call)) = enclosing_method_call(&module, attr) {
            found.extend(call_contribution(
                &module, session, &method, call, file_path,
            ));
        } else if let Some(value) = assigned_value(&module, attr) {
            found.extend(assignment_contribution(db, session, rules, file, value));
        }
        // Any other shape is ignored.
    }
    found
}

fn is_search_path_attr(module: &Module, node: NodeId) -> bool {
    let NodeKind::Attribute(name) = &module[node].kind else {
        return false;
    };
    if name != SEARCH_PATH_ATTR {
        return false;
    }
    module[node].child_nodes().next().is_some_and(
        |object| matches!(&module[object].kind, NodeKind::Name(n) if n == SEARCH_PATH_OBJECT),
    )
}

/// `sys.path.append(..)` / `sys.path.insert(..)`: the method attribute
/// hanging off the search-path attribute, called with arguments.
fn enclosing_method_call(module: &Module, attr: NodeId) -> Option<(SmolStr, NodeId)> {
    let method_id = module[attr].parent?;
    let NodeKind::Attribute(method) = &module[method_id].kind else {
        return None;
    };
    if !matches!(method.as_str(), "append" | "insert") {
        return None;
    }
    if module[method_id].child_nodes().next() != Some(attr) {
        return None;
    }

    let call = module[method_id].parent?;
    if !matches!(module[call].kind, NodeKind::Call) {
        return None;
    }
    if module[call].child_nodes().next() != Some(method_id) {
        return None;
    }
    Some((method.clone(), call))
}

fn call_contribution(
    module: &Module,
    session: &mut Session,
    method: &str,
    call: NodeId,
    file_path: &Path,
) -> Option<PathBuf> {
    let args = call_args(module, call);
    let arg = match method {
        "append" => args.first().copied(),
        // First argument is the position index.
        "insert" => args.get(1).copied(),
        _ => None,
    }?;

    let bindings = Bindings { file_path };
    match sandbox::evaluate(module, arg, &bindings) {
        Ok(text) => Some(absolutize(PathBuf::from(text), file_path)),
        Err(err) => {
            session.report(Diagnostic::SandboxFailure {
                detail: err.to_string(),
            });
            None
        }
    }
}

fn call_args(module: &Module, call: NodeId) -> Vec<NodeId> {
    match module[call].children.get(1) {
        Some(Child::Group(slots)) => slots
            .iter()
            .filter_map(|slot| match slot {
                Child::Node(id) => Some(*id),
                Child::Group(_) => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `sys.path = ..`, `sys.path += ..`, `sys.path[0:0] = ..`: the value node
/// of an assignment whose target reaches the search-path attribute, possibly
/// through a subscript.
fn assigned_value(module: &Module, attr: NodeId) -> Option<NodeId> {
    let mut target = attr;
    if let Some(parent) = module[attr].parent {
        if matches!(module[parent].kind, NodeKind::Subscript)
            && module[parent].child_nodes().next() == Some(attr)
        {
            target = parent;
        }
    }

    let assign = module[target].parent?;
    let NodeKind::Assign(_) = module[assign].kind else {
        return None;
    };
    let mut operands = module[assign].child_nodes();
    if operands.next()? != target {
        return None;
    }
    operands.next()
}

/// Infer the assigned expression through the guarded path and unpack it as an
/// iterable of strings. Non-strings are discarded; inference failures degrade
/// to a diagnostic.
fn assignment_contribution(
    db: &dyn SourceDb,
    session: &mut Session,
    rules: &dyn InferenceRules,
    file: FileId,
    value: NodeId,
) -> Vec<PathBuf> {
    let values = match guarded_evaluate(db, session, rules, file, value) {
        Ok(values) => values,
        Err(err) => {
            session.report(Diagnostic::PathInferenceFailed {
                detail: err.to_string(),
            });
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    for lazy in rules.iterate(db, file, &values, value) {
        match lazy.infer(db, session, rules, file) {
            Ok(element) => found.extend(
                element
                    .iter()
                    .filter_map(|value| value.as_str())
                    .map(PathBuf::from),
            ),
            Err(err) => session.report(Diagnostic::PathInferenceFailed {
                detail: err.to_string(),
            }),
        }
    }
    found
}

fn absolutize(path: PathBuf, file_path: &Path) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        file_path.parent().unwrap_or(Path::new("")).join(path)
    }
}
