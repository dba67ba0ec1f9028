//! The probability fixpoint: resolves per-node derivation probabilities over
//! a (possibly cyclic) shared packed parse forest by iterative relaxation.
use crate::config::FixpointConfig;
use crate::grammar::Grammar;
use crate::sppf::{Forest, NodeId, SppfNodeKind};

/// Per-node probabilities resolved by [`solve`], indexed by [`NodeId`].
pub struct Probabilities(Vec<f64>);

impl Probabilities {
    /// The resolved probability of `node`.
    pub fn get(&self, node: NodeId) -> f64 {
        self.0[node.0]
    }
}

/// Resolves every node's probability in `forest` by iterating the standard
/// derivation-probability equations to a fixpoint, starting every node's
/// estimate at 1.0 and relaxing downward.
///
/// Terminal and Epsilon nodes are always probability 1 (they match input
/// unconditionally). A Symbol or Intermediate node's probability is the sum,
/// over its families, of that family's production probability (1.0 for
/// families with no production tag) times the product of its children's
/// probabilities.
///
/// Starting from 1 and only ever multiplying by factors in `[0, 1]` makes
/// every node's sequence of estimates monotonically non-increasing; a node
/// whose estimate goes up between passes means a forest invariant was
/// violated (a family referencing a node that isn't actually an ancestor in
/// the derivation order), which is a programming error, not a recoverable
/// input problem, so it panics rather than returning a wrong answer.
pub fn solve(forest: &Forest, grammar: &Grammar, config: FixpointConfig) -> Probabilities {
    let n = forest.len();
    let mut prob = vec![1.0_f64; n];

    for iteration in 0..config.max_iterations {
        let mut max_decrease: f64 = 0.0;

        for idx in 0..n {
            let node = forest.node(NodeId(idx));
            let new_value = match node.kind {
                SppfNodeKind::Terminal { .. } | SppfNodeKind::Epsilon { .. } => 1.0,
                SppfNodeKind::Symbol { .. } | SppfNodeKind::Intermediate { .. } => node
                    .families
                    .iter()
                    .map(|family| {
                        let production_probability =
                            family.production.map(|p| grammar.probability(p)).unwrap_or(1.0);
                        let children_probability: f64 =
                            family.children.iter().map(|c| prob[c.0]).product();
                        production_probability * children_probability
                    })
                    .sum::<f64>()
                    .clamp(0.0, 1.0),
            };

            let delta = prob[idx] - new_value;
            assert!(
                delta >= -1e-12,
                "probability fixpoint increased at node {idx} on iteration {iteration}: {} -> {new_value}",
                prob[idx],
            );
            max_decrease = max_decrease.max(delta.max(0.0));
            prob[idx] = new_value;
        }

        log::trace!("fixpoint iteration {iteration}: max decrease {max_decrease}");
        if max_decrease <= config.tolerance {
            return Probabilities(prob);
        }
    }

    log::warn!(
        "probability fixpoint did not converge within {} iterations",
        config.max_iterations
    );
    Probabilities(prob)
}
