//! Shared packed parse forest construction from an Earley chart.
//!
//! Follows Scott (2008): nodes are interned by structural identity so every
//! ambiguous derivation sharing a subtree shares a node, and a node's
//! alternative derivations are recorded as separate "families" rather than
//! separate nodes.
use ahash::{AHashMap, AHashSet};
use tinyvec::TinyVec;

use crate::earley::{Cause, EarleyChart, ItemRef};
use crate::grammar::{Grammar, ProductionId};
use crate::symbol::{Nonterminal, Terminal};

/// A stable handle to a node within a [`Forest`].
#[derive(Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Debug, Default)]
pub struct NodeId(pub usize);

/// What a forest node represents.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub enum SppfNodeKind {
    /// A nonterminal deriving the substring `[i, j)`.
    Symbol {
        /// The nonterminal.
        nonterminal: Nonterminal,
        /// Start of the derived span.
        i: usize,
        /// End of the derived span.
        j: usize,
    },
    /// A partial match of `production`'s right-hand side up to `dot` symbols,
    /// spanning `[i, j)`. Only needed for productions with 3 or more RHS
    /// symbols, where a single binary family isn't enough to hold every
    /// matched symbol.
    Intermediate {
        /// The production being matched.
        production: ProductionId,
        /// How many RHS symbols are matched in this node.
        dot: usize,
        /// Start of the matched span.
        i: usize,
        /// End of the matched span.
        j: usize,
    },
    /// A single matched terminal occurrence at position `i` (spanning `[i, i+1)`).
    Terminal {
        /// The terminal.
        terminal: Terminal,
        /// Its position in the sentence.
        i: usize,
    },
    /// The empty derivation at position `i` (spanning `[i, i)`).
    Epsilon {
        /// The position this empty derivation sits at.
        i: usize,
    },
}

/// One alternative way of deriving a node's span: its children, and (for
/// [`SppfNodeKind::Symbol`] nodes only) which production this alternative
/// instantiates. Intermediate/Terminal/Epsilon families never carry a
/// production tag since a production's weight is only ever charged once, at
/// the symbol level.
#[derive(Clone, Debug)]
pub struct Family {
    /// The family's children, in left-to-right order. Terminal and Epsilon
    /// nodes have none; Intermediate and Symbol nodes have one or two.
    pub children: TinyVec<[NodeId; 2]>,
    /// The production this alternative instantiates, if this is a Symbol node.
    pub production: Option<ProductionId>,
}

/// A single node in the forest: what it represents, plus its alternatives.
#[derive(Clone, Debug)]
pub struct SppfNode {
    /// What this node represents.
    pub kind: SppfNodeKind,
    /// This node's alternative derivations. More than one means ambiguity.
    pub families: Vec<Family>,
}

/// A shared packed parse forest: every node reachable from `root`.
pub struct Forest {
    nodes: Vec<SppfNode>,
    root: NodeId,
}

impl Forest {
    /// The forest's root node, representing the start symbol over the whole
    /// input.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Looks up a node by id.
    pub fn node(&self, id: NodeId) -> &SppfNode {
        &self.nodes[id.0]
    }

    /// The number of distinct nodes in the forest.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True iff the forest has no nodes (never true for a forest actually
    /// returned by [`build`]).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

struct Builder<'a> {
    grammar: &'a Grammar,
    chart: &'a EarleyChart,
    interned: AHashMap<SppfNodeKind, NodeId>,
    nodes: Vec<SppfNode>,
    in_progress: AHashSet<ItemRef>,
}

impl<'a> Builder<'a> {
    fn intern(&mut self, kind: SppfNodeKind) -> NodeId {
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(SppfNode {
            kind,
            families: Vec::new(),
        });
        self.interned.insert(kind, id);
        id
    }

    fn add_family(&mut self, node: NodeId, family: Family) {
        let families = &mut self.nodes[node.0].families;
        let duplicate = families.iter().any(|f| {
            f.production == family.production && f.children == family.children
        });
        if !duplicate {
            families.push(family);
        }
    }

    /// Returns the node representing the item at `item_ref`'s derivation so
    /// far (an Epsilon node if its dot is 0, an Intermediate node if its dot
    /// is short of the production's full length, or a Symbol node if it is
    /// complete), building any not-yet-seen ancestors along the way.
    fn populate(&mut self, item_ref: ItemRef) -> NodeId {
        let item = self.chart.state_set(item_ref.position).items()[item_ref.index].clone();
        let production = self.grammar.production(item.production);
        let lhs = production.lhs;
        let rhs_len = production.rhs.len();
        let i = item.origin;
        let j = item_ref.position;

        // An epsilon production is complete the instant it's predicted (dot
        // is vacuously 0 == rhs_len), so it never goes through scan/complete
        // and never gets an edge pushed onto itself. Build its single family
        // directly rather than falling through to the edge-walking loop
        // below, which would find nothing and leave the node family-less
        // (probability 0 instead of the production's own weight).
        if rhs_len == 0 {
            let target = self.intern(SppfNodeKind::Symbol {
                nonterminal: lhs,
                i,
                j,
            });
            let epsilon = self.intern(SppfNodeKind::Epsilon { i });
            let mut children = TinyVec::new();
            children.push(epsilon);
            self.add_family(
                target,
                Family {
                    children,
                    production: Some(item.production),
                },
            );
            return target;
        }

        let target_kind = if item.dot == rhs_len {
            SppfNodeKind::Symbol {
                nonterminal: lhs,
                i,
                j,
            }
        } else {
            SppfNodeKind::Intermediate {
                production: item.production,
                dot: item.dot,
                i,
                j,
            }
        };
        let target = self.intern(target_kind);

        if !self.in_progress.insert(item_ref) {
            // Already being built further up the call stack: this item's
            // derivation is (directly or indirectly) recursive on itself at
            // zero width. Returning the partially built node breaks the
            // cycle instead of recursing forever; any families already
            // discovered through other edges still apply.
            return target;
        }

        for edge in item.edges.clone() {
            let right = match edge.cause {
                Cause::Terminal(t) => self.intern(SppfNodeKind::Terminal { terminal: t, i: j - 1 }),
                Cause::Completion(completed_ref) => self.populate(completed_ref),
            };
            let mut children = TinyVec::new();
            if item.dot == 1 {
                // dot == 1: the previous symbol is the production's very
                // first, so there is nothing to its left. A single-child
                // family (just the matched terminal/symbol node) per §4.4,
                // rather than padding the left slot with an Epsilon node.
                children.push(right);
            } else {
                let left = match edge.predecessor {
                    Some(pred_ref) => self.populate(pred_ref),
                    None => self.intern(SppfNodeKind::Epsilon { i }),
                };
                children.push(left);
                children.push(right);
            }
            let tagged_production = if item.dot == rhs_len {
                Some(item.production)
            } else {
                None
            };
            self.add_family(
                target,
                Family {
                    children,
                    production: tagged_production,
                },
            );
        }

        self.in_progress.remove(&item_ref);
        target
    }
}

/// Builds the forest of every derivation of `grammar`'s start symbol over the
/// whole sentence recorded in `chart`. Returns `None` if the chart did not
/// accept (no complete item spans the whole input from the start symbol).
pub fn build(grammar: &Grammar, chart: &EarleyChart) -> Option<Forest> {
    let accepting = chart.accepting_items(grammar);
    if accepting.is_empty() {
        return None;
    }

    let mut builder = Builder {
        grammar,
        chart,
        interned: AHashMap::default(),
        nodes: Vec::new(),
        in_progress: AHashSet::default(),
    };

    let mut root = None;
    for item_ref in accepting {
        let node = builder.populate(item_ref);
        root = Some(node);
    }

    Some(Forest {
        nodes: builder.nodes,
        root: root.expect("accepting set was non-empty"),
    })
}
