// ==============================================================================
// Arena-Backed Syntax Tree
// ==============================================================================
//
// The analyzed language is duck-typed and its parser lives outside this
// workspace; hosts lower whatever concrete tree they have into this arena
// representation through `ModuleBuilder`. Everything downstream (the recursion
// guard, the memo caches, the search-path resolver) only depends on the small
// surface defined here: node kinds, positions, parent links and the
// position-based identity key.

mod fork;

pub mod db;
pub mod tests;

pub use db::{FileId, SourceDb};
pub use fork::fork;

use std::collections::HashMap;
use std::ops;
use std::path::PathBuf;

use la_arena::{Arena, Idx};
use smol_str::SmolStr;

pub type NodeId = Idx<NodeData>;

// ==============================================================================
// Positions & Identity
// ==============================================================================

/// Line/column of a node in its source file. The column doubles as the
/// indentation component of the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

/// Identity of "this syntactic position being evaluated", used by the
/// recursion guard and the memo caches.
///
/// Equality is by owning file plus position, never by `NodeId`: a structural
/// fork produces a distinct `NodeId` for the same logical location, and the
/// guard must still recognize re-entry through the clone as a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub file: FileId,
    pub line: u32,
    pub col: u32,
}

impl NodeKey {
    pub fn of(file: FileId, module: &Module, node: NodeId) -> Self {
        let pos = module[node].pos;
        NodeKey {
            file,
            line: pos.line,
            col: pos.col,
        }
    }
}

// ==============================================================================
// Node Kinds
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `target = value`, including slice targets like `xs[0:0] = value`.
    Assign,
    /// `target += value`.
    AugAdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
}

/// Closed set of node kinds. Consumers (guard, fork, resolver, sandbox) match
/// exhaustively, so adding a kind forces every policy decision to be revisited
/// at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of a file. A scope.
    Module,
    /// `def`-style function scope.
    FunctionDef,
    /// Class body scope.
    ClassDef,
    /// Call expression. Children: callee node, then one group of argument
    /// nodes.
    Call,
    /// Function parameter reference. Exempt from recursion tracking: default
    /// value chains re-reference the same parameter across call sites without
    /// ever recursing unboundedly.
    Param(SmolStr),
    Name(SmolStr),
    StringLit(SmolStr),
    IntLit(i64),
    /// Attribute access `obj.<name>`. Child 0 is the object.
    Attribute(SmolStr),
    /// `obj[slice]`. Children: object, slice.
    Subscript,
    Slice,
    List,
    Tuple,
    /// Children: target, value.
    Assign(AssignOp),
    /// Children: lhs, rhs.
    BinOp(BinOp),
    /// Statement wrapper around a single expression child.
    ExprStmt,
}

impl NodeKind {
    /// Kinds that participate in recursion-guard identity and context
    /// binding. Only these are duplicated by [`fork`]; everything else is
    /// shared between the original and its clones.
    pub fn is_identity_sensitive(&self) -> bool {
        matches!(
            self,
            NodeKind::Module | NodeKind::FunctionDef | NodeKind::ClassDef | NodeKind::Call
        )
    }

    pub fn is_param(&self) -> bool {
        matches!(self, NodeKind::Param(_))
    }

    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::Module | NodeKind::FunctionDef | NodeKind::ClassDef
        )
    }
}

// ==============================================================================
// Nodes
// ==============================================================================

/// One slot in a node's ordered child list. Groups model nested ordered
/// sequences (argument lists and the like); [`fork`] walks them recursively
/// the same way it walks top-level children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Node(NodeId),
    Group(Vec<Child>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub kind: NodeKind,
    pub pos: Pos,
    /// Non-owning back-reference into the module's arena. Every non-root node
    /// has exactly one parent after `ModuleBuilder::finish`.
    pub parent: Option<NodeId>,
    pub children: Vec<Child>,
}

impl NodeData {
    /// Iterate the node ids directly reachable from this node's child list,
    /// descending through groups.
    pub fn child_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        fn walk(children: &[Child], out: &mut Vec<NodeId>) {
            for child in children {
                match child {
                    Child::Node(id) => out.push(*id),
                    Child::Group(inner) => walk(inner, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out.into_iter()
    }
}

// ==============================================================================
// Modules
// ==============================================================================

/// A lowered source file: the node arena, its entry (root) node, the on-disk
/// location if the file has one, and an index of used names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    nodes: Arena<NodeData>,
    pub entry: NodeId,
    /// `None` for synthetic modules (untitled buffers, injected snippets).
    /// The search-path resolver falls back to the base interpreter path when
    /// this is absent.
    pub path: Option<PathBuf>,
    used_names: HashMap<SmolStr, Vec<NodeId>>,
}

impl ops::Index<NodeId> for Module {
    type Output = NodeData;
    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index]
    }
}

impl Module {
    /// All nodes whose name text is `name`: `Name` references and attribute
    /// accesses. Order is allocation order, which is deterministic for a
    /// given builder run.
    pub fn used_names(&self, name: &str) -> &[NodeId] {
        self.used_names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Mutable access for hosts that rebind a forked node's context (parent
    /// or children). The arena itself stays append-only.
    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id]
    }

    pub(crate) fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.alloc(data)
    }
}

// ==============================================================================
// Builder
// ==============================================================================

/// Constructs well-formed modules: every node gets a position, and `finish`
/// wires parent links and the used-name index. Hosts with a real parser lower
/// through this; tests drive it directly.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    nodes: Arena<NodeData>,
    path: Option<PathBuf>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        ModuleBuilder {
            nodes: Arena::new(),
            path: Some(path.into()),
        }
    }

    /// Allocate a node with an auto-assigned position (one "line" per node,
    /// allocation order). Parsers lowering real sources use [`node_at`]
    /// instead.
    ///
    /// [`node_at`]: ModuleBuilder::node_at
    pub fn node(&mut self, kind: NodeKind, children: Vec<Child>) -> NodeId {
        let line = self.nodes.len() as u32 + 1;
        self.node_at(kind, Pos { line, col: 0 }, children)
    }

    pub fn node_at(&mut self, kind: NodeKind, pos: Pos, children: Vec<Child>) -> NodeId {
        self.nodes.alloc(NodeData {
            kind,
            pos,
            parent: None,
            children,
        })
    }

    pub fn name(&mut self, text: &str) -> NodeId {
        self.node(NodeKind::Name(text.into()), Vec::new())
    }

    pub fn param(&mut self, text: &str) -> NodeId {
        self.node(NodeKind::Param(text.into()), Vec::new())
    }

    pub fn string_lit(&mut self, text: &str) -> NodeId {
        self.node(NodeKind::StringLit(text.into()), Vec::new())
    }

    pub fn int_lit(&mut self, value: i64) -> NodeId {
        self.node(NodeKind::IntLit(value), Vec::new())
    }

    pub fn attribute(&mut self, object: NodeId, name: &str) -> NodeId {
        self.node(NodeKind::Attribute(name.into()), vec![Child::Node(object)])
    }

    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>) -> NodeId {
        let args = args.into_iter().map(Child::Node).collect();
        self.node(
            NodeKind::Call,
            vec![Child::Node(callee), Child::Group(args)],
        )
    }

    pub fn list(&mut self, items: Vec<NodeId>) -> NodeId {
        let items = items.into_iter().map(Child::Node).collect();
        self.node(NodeKind::List, items)
    }

    pub fn tuple(&mut self, items: Vec<NodeId>) -> NodeId {
        let items = items.into_iter().map(Child::Node).collect();
        self.node(NodeKind::Tuple, items)
    }

    pub fn subscript(&mut self, object: NodeId, slice: NodeId) -> NodeId {
        self.node(
            NodeKind::Subscript,
            vec![Child::Node(object), Child::Node(slice)],
        )
    }

    pub fn slice(&mut self) -> NodeId {
        self.node(NodeKind::Slice, Vec::new())
    }

    pub fn assign(&mut self, op: AssignOp, target: NodeId, value: NodeId) -> NodeId {
        self.node(
            NodeKind::Assign(op),
            vec![Child::Node(target), Child::Node(value)],
        )
    }

    pub fn bin_add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.node(
            NodeKind::BinOp(BinOp::Add),
            vec![Child::Node(lhs), Child::Node(rhs)],
        )
    }

    pub fn expr_stmt(&mut self, expr: NodeId) -> NodeId {
        self.node(NodeKind::ExprStmt, vec![Child::Node(expr)])
    }

    /// Wire parent links and the used-name index, producing the module rooted
    /// at `entry`.
    pub fn finish(mut self, entry: NodeId) -> Module {
        let ids: Vec<NodeId> = self.nodes.iter().map(|(id, _)| id).collect();
        for id in ids {
            let children: Vec<NodeId> = self.nodes[id].child_nodes().collect();
            for child in children {
                self.nodes[child].parent = Some(id);
            }
        }

        let mut used_names: HashMap<SmolStr, Vec<NodeId>> = HashMap::new();
        for (id, data) in self.nodes.iter() {
            let text = match &data.kind {
                NodeKind::Name(text) | NodeKind::Attribute(text) => text.clone(),
                _ => continue,
            };
            used_names.entry(text).or_default().push(id);
        }

        Module {
            nodes: self.nodes,
            entry,
            path: self.path,
            used_names,
        }
    }
}
