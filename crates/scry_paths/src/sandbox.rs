// ==============================================================================
// Sandboxed Expression Evaluation
// ==============================================================================
//
// `search_path.append(...)` arguments are evaluated by a tiny explicit
// interpreter over a whitelisted grammar subset, never a general-purpose
// evaluator: string literals, the `__file__` binding, string concatenation,
// and the path-construction helpers `join`/`dirname`/`abspath` (bare or at
// the end of an attribute chain like `os.path.join`). Everything else is an
// enumerable error the caller degrades to a diagnostic.

use std::path::{Path, PathBuf};

use smol_str::SmolStr;
use thiserror::Error;

use scry_ast::{BinOp, Child, Module, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("unsupported expression kind")]
    Unsupported,
    #[error("unknown name `{0}`")]
    UnknownName(SmolStr),
    #[error("`{0}` is not a path helper")]
    UnknownHelper(SmolStr),
    #[error("wrong number of arguments for `{0}`")]
    Arity(SmolStr),
}

/// Names visible inside the sandbox. Deliberately just the analyzed file's
/// own location — the side-effect surface of the whole interpreter.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub file_path: &'a Path,
}

impl Bindings<'_> {
    fn file_dir(&self) -> &Path {
        self.file_path.parent().unwrap_or(Path::new(""))
    }
}

pub fn evaluate(
    module: &Module,
    node: NodeId,
    bindings: &Bindings<'_>,
) -> Result<String, SandboxError> {
    match &module[node].kind {
        NodeKind::StringLit(text) => Ok(text.to_string()),
        NodeKind::Name(name) if name == "__file__" => {
            Ok(bindings.file_path.display().to_string())
        }
        NodeKind::Name(name) => Err(SandboxError::UnknownName(name.clone())),
        NodeKind::BinOp(BinOp::Add) => {
            let operands: Vec<NodeId> = module[node].child_nodes().collect();
            match operands.as_slice() {
                [lhs, rhs] => {
                    let mut out = evaluate(module, *lhs, bindings)?;
                    out.push_str(&evaluate(module, *rhs, bindings)?);
                    Ok(out)
                }
                _ => Err(SandboxError::Unsupported),
            }
        }
        NodeKind::Call => evaluate_call(module, node, bindings),
        _ => Err(SandboxError::Unsupported),
    }
}

fn evaluate_call(
    module: &Module,
    call: NodeId,
    bindings: &Bindings<'_>,
) -> Result<String, SandboxError> {
    let children = &module[call].children;
    let (Some(Child::Node(callee)), Some(Child::Group(arg_slots))) =
        (children.first(), children.get(1))
    else {
        return Err(SandboxError::Unsupported);
    };

    let helper = helper_name(module, *callee).ok_or(SandboxError::Unsupported)?;

    let mut args = Vec::with_capacity(arg_slots.len());
    for slot in arg_slots {
        let Child::Node(arg) = slot else {
            return Err(SandboxError::Unsupported);
        };
        args.push(evaluate(module, *arg, bindings)?);
    }

    match helper.as_str() {
        "join" => {
            let (first, rest) = args.split_first().ok_or(SandboxError::Arity(helper))?;
            let mut joined = PathBuf::from(first);
            for part in rest {
                // An absolute component resets the result, matching the
                // helper it stands in for.
                joined.push(part);
            }
            Ok(joined.display().to_string())
        }
        "dirname" => match args.as_slice() {
            [path] => Ok(Path::new(path)
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default()),
            _ => Err(SandboxError::Arity(helper)),
        },
        "abspath" => match args.as_slice() {
            [path] if Path::new(path).is_absolute() => Ok(path.clone()),
            [path] => Ok(bindings.file_dir().join(path).display().to_string()),
            _ => Err(SandboxError::Arity(helper)),
        },
        _ => Err(SandboxError::UnknownHelper(helper)),
    }
}

/// The helper a call resolves to. Attribute chains (`os.path.join`) resolve
/// by their final segment; the object chain itself is not interpreted.
fn helper_name(module: &Module, callee: NodeId) -> Option<SmolStr> {
    match &module[callee].kind {
        NodeKind::Name(name) => Some(name.clone()),
        NodeKind::Attribute(name) => Some(name.clone()),
        _ => None,
    }
}
