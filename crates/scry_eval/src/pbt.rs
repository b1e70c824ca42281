// ==============================================================================
// Property-Based Tests
// ==============================================================================
//
// Random trees and key sequences exercise the two invariants everything else
// leans on: the guard stack stays balanced and blocks exactly on re-entry,
// and forking never perturbs the original arena prefix.

use proptest::prelude::{prop, prop_assert, prop_assert_eq, prop_oneof, proptest, Strategy};

use scry_ast::{fork, FileId, Module, ModuleBuilder, NodeData, NodeId, NodeKey};

use crate::RecursionGuard;

fn key(line: u32, col: u32) -> NodeKey {
    NodeKey {
        file: FileId::from(0),
        line,
        col,
    }
}

#[derive(Debug, Clone)]
enum TreeSpec {
    Name(String),
    Call(Vec<TreeSpec>),
    List(Vec<TreeSpec>),
}

fn arb_tree() -> impl Strategy<Value = TreeSpec> {
    let leaf = "[a-z]{1,5}".prop_map(TreeSpec::Name);
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(TreeSpec::Call),
            prop::collection::vec(inner, 0..4).prop_map(TreeSpec::List),
        ]
    })
}

fn build(spec: &TreeSpec, b: &mut ModuleBuilder) -> NodeId {
    match spec {
        TreeSpec::Name(text) => b.name(text),
        TreeSpec::Call(args) => {
            let args: Vec<NodeId> = args.iter().map(|a| build(a, b)).collect();
            let callee = b.name("f");
            b.call(callee, args)
        }
        TreeSpec::List(items) => {
            let items: Vec<NodeId> = items.iter().map(|i| build(i, b)).collect();
            b.list(items)
        }
    }
}

fn build_module(spec: &TreeSpec) -> (Module, NodeId) {
    let mut b = ModuleBuilder::new();
    let root = build(spec, &mut b);
    (b.finish(root), root)
}

proptest! {
    #[test]
    fn guard_stack_stays_balanced(lines in prop::collection::vec(0u32..64, 1..32)) {
        let mut guard = RecursionGuard::new();
        let mut entered = 0usize;
        for &line in &lines {
            if !guard.enter(key(line, 0)) {
                entered += 1;
            }
        }
        prop_assert_eq!(guard.depth(), entered);
        for _ in 0..entered {
            guard.exit();
        }
        prop_assert_eq!(guard.depth(), 0);
    }

    #[test]
    fn reentering_an_active_key_blocks(lines in prop::collection::vec(0u32..64, 1..32)) {
        let mut guard = RecursionGuard::new();
        for &line in &lines {
            guard.enter(key(line, 0));
        }
        // Every line we pushed is somewhere on the stack now.
        for &line in &lines {
            prop_assert!(guard.enter(key(line, 0)));
        }
    }

    #[test]
    fn fork_never_mutates_the_original(spec in arb_tree()) {
        let (mut module, root) = build_module(&spec);
        let snapshot: Vec<NodeData> =
            module.nodes().map(|(_, data)| data.clone()).collect();

        let clone = fork(&mut module, root);

        // The original arena prefix is byte-for-byte what it was.
        let after: Vec<NodeData> = module
            .nodes()
            .take(snapshot.len())
            .map(|(_, data)| data.clone())
            .collect();
        prop_assert_eq!(&after, &snapshot);

        // The clone mirrors the root's kind and position.
        prop_assert_eq!(&module[clone].kind, &module[root].kind);
        prop_assert_eq!(module[clone].pos, module[root].pos);

        // The root itself is always duplicated; the sharing policy applies
        // to what hangs below it.
        prop_assert!(clone != root);
    }
}
