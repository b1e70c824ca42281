// ==============================================================================
// Structural Fork
// ==============================================================================
//
// Much, much faster than a deep copy: only identity-sensitive kinds (scopes
// and calls) are duplicated, because only they participate in recursion-guard
// identity and context binding. Everything else is immutable from the
// evaluator's perspective and stays shared between the original and the clone.

use rustc_hash::FxHashMap;

use crate::{Child, Module, NodeId};

/// Selectively clone the subtree rooted at `root` inside `module`'s arena,
/// returning the root of the clone. The root itself is always duplicated
/// (callers fork calls and scopes); the selective policy applies to
/// everything below it.
///
/// Clones keep the original position, so the recursion guard treats a clone
/// and its original as the same logical location. Mutating a clone (its
/// parent binding or children) never touches the original subtree or any
/// sibling fork.
///
/// Parent links on clones point at the clone of the original parent when that
/// clone exists. A child visited before its parent keeps the original
/// (shared) parent link; consumers tolerate this because identity is by
/// position, not by node id.
pub fn fork(module: &mut Module, root: NodeId) -> NodeId {
    let mut visited: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    clone_node(module, root, &mut visited)
}

fn clone_node(module: &mut Module, node: NodeId, visited: &mut FxHashMap<NodeId, NodeId>) -> NodeId {
    let data = module[node].clone();
    let new_id = module.alloc(data);
    // Register before walking children: a child's original parent is `node`,
    // so the lookup below rewires it to `new_id`.
    visited.insert(node, new_id);

    if let Some(parent) = module[new_id].parent {
        if let Some(&cloned_parent) = visited.get(&parent) {
            module.node_mut(new_id).parent = Some(cloned_parent);
        }
    }

    let children = module[new_id].children.clone();
    let children = clone_children(module, children, visited);
    module.node_mut(new_id).children = children;

    new_id
}

fn clone_children(
    module: &mut Module,
    children: Vec<Child>,
    visited: &mut FxHashMap<NodeId, NodeId>,
) -> Vec<Child> {
    children
        .into_iter()
        .map(|child| match child {
            Child::Node(id) if module[id].kind.is_identity_sensitive() => {
                Child::Node(clone_node(module, id, visited))
            }
            // Ordinary nodes are shared by identity, not descended into.
            Child::Node(id) => Child::Node(id),
            Child::Group(inner) => Child::Group(clone_children(module, inner, visited)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Child, ModuleBuilder, NodeKind};

    /// `f(g(x))` with the outer call as the forked root.
    fn call_chain() -> (Module, NodeId, NodeId, NodeId) {
        let mut b = ModuleBuilder::new();
        let x = b.name("x");
        let g = b.name("g");
        let inner = b.call(g, vec![x]);
        let f = b.name("f");
        let outer = b.call(f, vec![inner]);
        let module = b.finish(outer);
        (module, outer, inner, x)
    }

    fn group_nodes(child: &Child) -> Vec<NodeId> {
        match child {
            Child::Group(inner) => inner
                .iter()
                .map(|c| match c {
                    Child::Node(id) => *id,
                    Child::Group(_) => panic!("unexpected nested group"),
                })
                .collect(),
            Child::Node(_) => panic!("expected group"),
        }
    }

    #[test]
    fn clones_calls_and_shares_names() {
        let (mut module, outer, inner, x) = call_chain();
        let before = module.len();

        let clone = fork(&mut module, outer);

        assert_ne!(clone, outer);
        assert_eq!(module[clone].kind, NodeKind::Call);
        // Same position as the original: the guard sees them as one location.
        assert_eq!(module[clone].pos, module[outer].pos);

        // The nested call was cloned; the callee name and the leaf argument
        // were not.
        let cloned_inner = group_nodes(&module[clone].children[1])[0];
        assert_ne!(cloned_inner, inner);
        assert_eq!(module[cloned_inner].kind, NodeKind::Call);
        assert_eq!(module[clone].children[0], module[outer].children[0]);
        assert_eq!(group_nodes(&module[cloned_inner].children[1]), vec![x]);

        // Only the two calls were allocated.
        assert_eq!(module.len(), before + 2);
    }

    #[test]
    fn rewires_cloned_child_parent_to_cloned_parent() {
        let (mut module, outer, inner, _) = call_chain();

        let clone = fork(&mut module, outer);
        let cloned_inner = group_nodes(&module[clone].children[1])[0];

        assert_eq!(module[cloned_inner].parent, Some(clone));
        // Original untouched.
        assert_eq!(module[inner].parent, Some(outer));
    }

    #[test]
    fn fork_root_keeps_shared_parent_link() {
        let mut b = ModuleBuilder::new();
        let f = b.name("f");
        let call = b.call(f, vec![]);
        let root = b.node(NodeKind::Module, vec![Child::Node(call)]);
        let mut module = b.finish(root);

        // Forking below the module root: the clone's parent is the original
        // module node, which was never cloned.
        let clone = fork(&mut module, call);
        assert_eq!(module[clone].parent, Some(root));
    }

    #[test]
    fn mutating_clone_leaves_original_alone() {
        let (mut module, outer, inner, _) = call_chain();
        let original_outer = module[outer].clone();
        let original_inner = module[inner].clone();

        let clone = fork(&mut module, outer);
        let cloned_inner = group_nodes(&module[clone].children[1])[0];

        module.node_mut(clone).parent = Some(cloned_inner);
        module.node_mut(cloned_inner).children.clear();

        assert_eq!(module[outer], original_outer);
        assert_eq!(module[inner], original_inner);
    }

    #[test]
    fn walks_nested_groups() {
        let mut b = ModuleBuilder::new();
        let f = b.name("f");
        let arg_call_callee = b.name("g");
        let arg_call = b.call(arg_call_callee, vec![]);
        let plain = b.name("y");
        // Hand-build a call whose argument group nests another group.
        let outer = b.node(
            NodeKind::Call,
            vec![
                Child::Node(f),
                Child::Group(vec![Child::Group(vec![
                    Child::Node(arg_call),
                    Child::Node(plain),
                ])]),
            ],
        );
        let mut module = b.finish(outer);

        let clone = fork(&mut module, outer);
        let Child::Group(outer_group) = &module[clone].children[1] else {
            panic!("expected group");
        };
        let Child::Group(inner_group) = &outer_group[0] else {
            panic!("expected nested group");
        };

        let Child::Node(cloned_arg_call) = inner_group[0] else {
            panic!("expected node");
        };
        assert_ne!(cloned_arg_call, arg_call);
        assert_eq!(module[cloned_arg_call].kind, NodeKind::Call);
        // The plain name deep inside the nesting is still shared.
        assert_eq!(inner_group[1], Child::Node(plain));
    }

    #[test]
    fn two_forks_are_independent() {
        let (mut module, outer, _, _) = call_chain();

        let fork_a = fork(&mut module, outer);
        let fork_b = fork(&mut module, outer);
        assert_ne!(fork_a, fork_b);

        let snapshot_b = module[fork_b].clone();
        module.node_mut(fork_a).children.clear();
        assert_eq!(module[fork_b], snapshot_b);
    }
}
