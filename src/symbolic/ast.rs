//! # Arena AST Module
//!
//! The canonical representation of a parsed equation. Every node lives in a
//! flat arena (`Vec<Node>`) and is addressed by its integer id (`NodeId`),
//! which doubles as the "id" half of the (label, id) node identity. Parent and
//! child links are arena indices, never owning pointers, so a deep copy of an
//! equation is a structural copy of plain data rather than an object-graph
//! clone.
//!
//! ## Main structures
//!
//! - `Label` — what a node *is*: the equality root, an infix operator, a named
//!   function, a free variable or a numeric literal.
//! - `InfixOp` — the five infix operators with their binding priority
//!   `[^, /, *, -, +]` (0 binds tightest).
//! - `Arena` — the mutable node store used while a tree is under construction.
//! - `Ast` — a finished tree: an arena plus the id of the single `=` root.
//!
//! Invariants a finished `Ast` upholds: exactly one node carries `Label::Equals`
//! (the root), every node is reachable from it, and the structure is acyclic.

use std::collections::HashMap;
use std::fmt;

use strum_macros::EnumIter;

/// Index of a node inside the arena; the integer half of a node identity.
pub type NodeId = usize;

/// The five infix operators, ordered by binding priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum InfixOp {
    Pow,
    Div,
    Mul,
    Sub,
    Add,
}

impl InfixOp {
    pub fn symbol(self) -> char {
        match self {
            InfixOp::Pow => '^',
            InfixOp::Div => '/',
            InfixOp::Mul => '*',
            InfixOp::Sub => '-',
            InfixOp::Add => '+',
        }
    }

    /// Binding priority: 0 = tightest (`^`), 4 = loosest (`+`).
    pub fn priority(self) -> usize {
        match self {
            InfixOp::Pow => 0,
            InfixOp::Div => 1,
            InfixOp::Mul => 2,
            InfixOp::Sub => 3,
            InfixOp::Add => 4,
        }
    }

    pub fn from_char(c: char) -> Option<InfixOp> {
        use strum::IntoEnumIterator;
        InfixOp::iter().find(|op| op.symbol() == c)
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// The label half of a node identity.
#[derive(Clone, Debug, PartialEq)]
pub enum Label {
    /// The synthetic equality root. Exactly one per finished tree.
    Equals,
    /// An infix operator node: `+ - * / ^`.
    Op(InfixOp),
    /// A named function node, e.g. "sin", "sqrt", "log", "frac", "vec".
    Function(String),
    /// A free variable. Backslash symbols keep their source form ("\\alpha").
    Var(String),
    /// A numeric literal.
    Number(f64),
}

impl Label {
    /// The name under which this label is counted in the frequency maps.
    pub fn key(&self) -> String {
        match self {
            Label::Equals => "=".to_string(),
            Label::Op(op) => op.symbol().to_string(),
            Label::Function(name) => name.clone(),
            Label::Var(name) => name.clone(),
            Label::Number(v) => fmt_number(*v),
        }
    }

    pub fn is_operand(&self) -> bool {
        matches!(self, Label::Var(_) | Label::Number(_))
    }
}

/// Renders a float the way the surface notations write it: integral values
/// without a trailing ".0".
pub fn fmt_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One arena slot: a label plus ordered child links and a back link.
///
/// Child order is semantically significant (dividend before divisor, sqrt
/// root before radicand, log base before argument).
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub label: Label,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

/// Mutable node store used while the tree builder is at work.
#[derive(Clone, Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Arena {
        Arena { nodes: Vec::new() }
    }

    pub fn add(&mut self, label: Label) -> NodeId {
        self.nodes.push(Node {
            label,
            children: Vec::new(),
            parent: None,
        });
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn label(&self, id: NodeId) -> &Label {
        &self.nodes[id].label
    }

    pub fn set_label(&mut self, id: NodeId, label: Label) {
        self.nodes[id].label = label;
    }

    /// Appends `child` under `parent`, fixing up the back link.
    pub fn adopt(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    /// Replaces `old` with `new` in `old`'s parent (if any), keeping argument
    /// order. Used by the trig-exponent rewrite where a freshly built `^` node
    /// takes over the slot of the trig node it wraps.
    pub fn replace_in_parent(&mut self, old: NodeId, new: NodeId) {
        if let Some(p) = self.nodes[old].parent {
            let slot = self.nodes[p]
                .children
                .iter()
                .position(|&c| c == old)
                .expect("child link and parent link out of sync");
            self.nodes[p].children[slot] = new;
            self.nodes[new].parent = Some(p);
            self.nodes[old].parent = None;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes that ended up with no parent, in arena order.
    pub fn roots(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .filter(|&id| self.nodes[id].parent.is_none())
            .collect()
    }
}

/// A finished equation tree: arena plus the id of the `=` root.
#[derive(Clone, Debug, PartialEq)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    /// Seals an arena into an `Ast` by attaching the two sides under a fresh
    /// `=` node. `lhs` and `rhs` must be parentless arena roots.
    pub fn seal(mut arena: Arena, lhs: NodeId, rhs: NodeId) -> Ast {
        let root = arena.add(Label::Equals);
        arena.adopt(root, lhs);
        arena.adopt(root, rhs);
        Ast {
            nodes: arena.nodes,
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn label(&self, id: NodeId) -> &Label {
        &self.nodes[id].label
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Number of nodes reachable from the root (detached scratch nodes left
    /// behind by rewrites do not count).
    pub fn node_count(&self) -> usize {
        let mut n = 0;
        self.walk(self.root, &mut |_| n += 1);
        n
    }

    /// Preorder walk over the reachable tree.
    pub fn walk<F: FnMut(NodeId)>(&self, id: NodeId, visit: &mut F) {
        visit(id);
        for i in 0..self.nodes[id].children.len() {
            let c = self.nodes[id].children[i];
            self.walk(c, visit);
        }
    }

    /// Ids of every occurrence of the variable `name`, in preorder.
    pub fn find_var(&self, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(self.root, &mut |id| {
            if let Label::Var(v) = &self.nodes[id].label {
                if v == name {
                    found.push(id);
                }
            }
        });
        found
    }

    /// Structural deep copy: reachable nodes only, renumbered in preorder.
    /// This is the "deep copy" of the solve contract; garbage left by splices
    /// is dropped and ids become sequential again.
    pub fn compacted(&self) -> Ast {
        let mut arena = Arena::new();
        let lhs = self.copy_into(self.children(self.root)[0], &mut arena);
        let rhs = self.copy_into(self.children(self.root)[1], &mut arena);
        Ast::seal(arena, lhs, rhs)
    }

    fn copy_into(&self, id: NodeId, arena: &mut Arena) -> NodeId {
        let new_id = arena.add(self.nodes[id].label.clone());
        for i in 0..self.nodes[id].children.len() {
            let c = self.nodes[id].children[i];
            let new_child = self.copy_into(c, arena);
            arena.adopt(new_id, new_child);
        }
        new_id
    }

    /// Structural equality from the roots down, ignoring arena numbering.
    pub fn equivalent(&self, other: &Ast) -> bool {
        self.subtree_eq(self.root, other, other.root)
    }

    fn subtree_eq(&self, a: NodeId, other: &Ast, b: NodeId) -> bool {
        if self.nodes[a].label != other.nodes[b].label {
            return false;
        }
        let ca = &self.nodes[a].children;
        let cb = &other.nodes[b].children;
        ca.len() == cb.len()
            && ca
                .iter()
                .zip(cb.iter())
                .all(|(&x, &y)| self.subtree_eq(x, other, y))
    }

    /// Recounts labels over the reachable tree: (function map, variable map,
    /// primitive count, total node count). The `=` root contributes only to
    /// the total.
    pub fn count_labels(&self) -> (HashMap<String, usize>, HashMap<String, usize>, usize, usize) {
        let mut functions: HashMap<String, usize> = HashMap::new();
        let mut variables: HashMap<String, usize> = HashMap::new();
        let mut primitives = 0usize;
        let mut total = 0usize;
        self.walk(self.root, &mut |id| {
            total += 1;
            match &self.nodes[id].label {
                Label::Equals => {}
                Label::Op(op) => {
                    *functions.entry(op.symbol().to_string()).or_insert(0) += 1;
                }
                Label::Function(name) => {
                    *functions.entry(name.clone()).or_insert(0) += 1;
                }
                Label::Var(name) => {
                    *variables.entry(name.clone()).or_insert(0) += 1;
                }
                Label::Number(_) => primitives += 1,
            }
        });
        (functions, variables, primitives, total)
    }

    // mutation entry points used by the solve rewriter

    pub(crate) fn add_node(&mut self, label: Label) -> NodeId {
        self.nodes.push(Node {
            label,
            children: Vec::new(),
            parent: None,
        });
        self.nodes.len() - 1
    }

    pub(crate) fn adopt(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    /// Rebinds the two children of the `=` root during a peel step.
    pub(crate) fn rebind_root(&mut self, side_idx: usize, side: NodeId, other: NodeId) {
        let root = self.root;
        let mut children = [side, other];
        if side_idx == 1 {
            children.swap(0, 1);
        }
        for &c in &children {
            self.nodes[c].parent = Some(root);
        }
        self.nodes[root].children = children.to_vec();
    }
}

impl fmt::Display for Ast {
    /// Infix rendering with full parenthesization; the human-readable form.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", crate::symbolic::notation::render_infix(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_eq(arena: &mut Arena, a: Label, b: Label) -> (NodeId, NodeId) {
        (arena.add(a), arena.add(b))
    }

    #[test]
    fn test_seal_and_counts() {
        let mut arena = Arena::new();
        let (x, two) = leaf_eq(
            &mut arena,
            Label::Var("x".to_string()),
            Label::Number(2.0),
        );
        let plus = arena.add(Label::Op(InfixOp::Add));
        arena.adopt(plus, x);
        arena.adopt(plus, two);
        let y = arena.add(Label::Var("y".to_string()));
        let ast = Ast::seal(arena, plus, y);

        assert_eq!(ast.node_count(), 5);
        let (funcs, vars, prims, total) = ast.count_labels();
        assert_eq!(funcs.get("+"), Some(&1));
        assert_eq!(vars.get("x"), Some(&1));
        assert_eq!(vars.get("y"), Some(&1));
        assert_eq!(prims, 1);
        assert_eq!(total, 5);
    }

    #[test]
    fn test_compacted_is_equivalent() {
        let mut arena = Arena::new();
        let _garbage = arena.add(Label::Number(99.0));
        let x = arena.add(Label::Var("x".to_string()));
        let y = arena.add(Label::Var("y".to_string()));
        let ast = Ast::seal(arena, x, y);
        let copy = ast.compacted();
        assert!(ast.equivalent(&copy));
        assert_eq!(copy.node_count(), 3);
    }

    #[test]
    fn test_fmt_number() {
        assert_eq!(fmt_number(2.0), "2");
        assert_eq!(fmt_number(10.0), "10");
        assert_eq!(fmt_number(2.5), "2.5");
    }

    #[test]
    fn test_op_priority_order() {
        use strum::IntoEnumIterator;
        let prios: Vec<usize> = InfixOp::iter().map(|o| o.priority()).collect();
        assert_eq!(prios, vec![0, 1, 2, 3, 4]);
        assert_eq!(InfixOp::from_char('^'), Some(InfixOp::Pow));
        assert_eq!(InfixOp::from_char('='), None);
    }
}
