//! The Earley recognizer: chart parsing with prediction, scanning and completion.
//!
//! Beyond bare recognition, every item in the chart records the edges that
//! produced it (which predecessor item advanced, and what caused the
//! advance: a scanned terminal or a completed nonterminal). [`crate::sppf`]
//! walks those edges to build a shared packed parse forest without
//! re-deriving anything.
use ahash::AHashMap;

use crate::grammar::{Grammar, ProductionId};
use crate::symbol::{Nonterminal, Sentence, Terminal, Word};

/// A reference to a single item within a specific [`StateSet`].
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct ItemRef {
    /// The position (index into [`EarleyChart::state_sets`]) the item lives in.
    pub position: usize,
    /// The item's index within that state set.
    pub index: usize,
}

/// What caused an item to advance past its dot.
#[derive(Clone, Copy, Debug)]
pub enum Cause {
    /// The dot advanced over a terminal that matched the input at this position.
    Terminal(Terminal),
    /// The dot advanced over a nonterminal whose derivation completed here.
    Completion(ItemRef),
}

/// One way of deriving an item: the item one dot position earlier (`None` if
/// this is the item's very first step, i.e. dot was 0 before this edge), and
/// what pushed the dot forward.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    /// The item just before this step, or `None` if the dot was 0.
    pub predecessor: Option<ItemRef>,
    /// What advanced the dot.
    pub cause: Cause,
}

/// A dotted item: how far into `production`'s right-hand side the recognizer
/// has matched, starting at `origin`.
#[derive(Clone, Debug)]
pub struct ItemRecord {
    /// The production this item is an instance of.
    pub production: ProductionId,
    /// How many RHS symbols have been matched so far.
    pub dot: usize,
    /// The chart position this item's derivation started at.
    pub origin: usize,
    /// Every way (so far discovered) that this exact item was derived.
    pub edges: Vec<Edge>,
}

/// All items discovered at a single chart position.
#[derive(Default)]
pub struct StateSet {
    items: Vec<ItemRecord>,
    index: AHashMap<(ProductionId, usize, usize), usize>,
}

impl StateSet {
    fn insert(&mut self, production: ProductionId, dot: usize, origin: usize) -> usize {
        *self
            .index
            .entry((production, dot, origin))
            .or_insert_with(|| {
                self.items.push(ItemRecord {
                    production,
                    dot,
                    origin,
                    edges: Vec::new(),
                });
                self.items.len() - 1
            })
    }

    /// All items in this state set, in discovery order.
    pub fn items(&self) -> &[ItemRecord] {
        &self.items
    }
}

/// The full table of [`StateSet`]s built while recognizing a sentence: one
/// state set per position, from `0` to `sentence.len()` inclusive.
pub struct EarleyChart {
    state_sets: Vec<StateSet>,
}

impl EarleyChart {
    /// The state set at `position`.
    pub fn state_set(&self, position: usize) -> &StateSet {
        &self.state_sets[position]
    }

    /// The number of state sets (sentence length plus one).
    pub fn len(&self) -> usize {
        self.state_sets.len()
    }

    /// True iff there are no state sets at all (never the case in practice,
    /// since a chart always has at least the position-0 set).
    pub fn is_empty(&self) -> bool {
        self.state_sets.is_empty()
    }

    /// Items at the final position that are complete, start at the origin,
    /// and derive the grammar's start symbol: the recognizer's accept set.
    pub fn accepting_items(&self, grammar: &Grammar) -> Vec<ItemRef> {
        let n = self.state_sets.len() - 1;
        self.state_sets[n]
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                let p = grammar.production(item.production);
                item.origin == 0 && item.dot == p.rhs.len() && p.lhs == grammar.start()
            })
            .map(|(index, _)| ItemRef { position: n, index })
            .collect()
    }
}

/// Builds the Earley chart for `sentence` against `grammar`.
///
/// Each state set is processed to a local fixpoint (predictions and
/// zero-width completions keep extending the same state set's item list
/// until nothing new appears). That alone correctly handles a nullable
/// nonterminal predicted by an item already present when its epsilon
/// derivation completes, since completion scans the waiting items already
/// in the set — but it misses an item created *after* the nullable already
/// completed (e.g. the second `A` in `S -> A A` when `A -> epsilon`, once
/// the first `A` has advanced the dot past it). [`predict`] closes that gap
/// with §4.3's magic-item construction: whenever the dot sits before a
/// nullable nonterminal, it eagerly pre-inserts the item with the dot
/// advanced past it, so that item exists in time to be picked up by the
/// waiting-item scan when the nonterminal's own (possibly later-processed)
/// completion fires.
pub fn build_chart(grammar: &Grammar, sentence: &Sentence) -> EarleyChart {
    let n = sentence.len();
    let mut state_sets: Vec<StateSet> = (0..=n).map(|_| StateSet::default()).collect();

    for &start_prod in grammar.productions_from(grammar.start()) {
        state_sets[0].insert(start_prod, 0, 0);
    }

    for position in 0..=n {
        let mut k = 0;
        while k < state_sets[position].items.len() {
            let item = state_sets[position].items[k].clone();
            let production = grammar.production(item.production);

            if item.dot < production.rhs.len() {
                match production.rhs[item.dot] {
                    Word::Nonterminal(b) => {
                        predict(grammar, &mut state_sets[position], position, k, b);
                    }
                    Word::Terminal(t) => {
                        scan(sentence, &mut state_sets, position, k, t);
                    }
                }
            } else {
                complete(grammar, &mut state_sets, position, k);
            }
            k += 1;
        }
    }

    EarleyChart { state_sets }
}

/// Predicts `b`'s productions into `set`, and — if `b` can derive the empty
/// string — eagerly advances `item_index` past it (the magic-item step of
/// §4.3). The eager advance carries no edge of its own; it only reserves the
/// item's slot so that `complete` finds it waiting once `b`'s own epsilon
/// derivation is processed later in this same state set's fixpoint loop, at
/// which point the ordinary completion edge gets attached to it ordinarily.
fn predict(grammar: &Grammar, set: &mut StateSet, position: usize, item_index: usize, b: Nonterminal) {
    for &prod in grammar.productions_from(b) {
        set.insert(prod, 0, position);
    }
    if grammar.nullable_probability(b) > 0.0 {
        let waiting = set.items[item_index].clone();
        set.insert(waiting.production, waiting.dot + 1, waiting.origin);
    }
}

fn scan(
    sentence: &Sentence,
    state_sets: &mut [StateSet],
    position: usize,
    item_index: usize,
    t: Terminal,
) {
    if position >= sentence.len() {
        return;
    }
    if sentence[position].as_terminal() != Some(t) {
        return;
    }
    let item = state_sets[position].items[item_index].clone();
    let new_index = state_sets[position + 1].insert(item.production, item.dot + 1, item.origin);
    let predecessor = if item.dot == 0 {
        None
    } else {
        Some(ItemRef {
            position,
            index: item_index,
        })
    };
    state_sets[position + 1].items[new_index].edges.push(Edge {
        predecessor,
        cause: Cause::Terminal(t),
    });
}

fn complete(grammar: &Grammar, state_sets: &mut [StateSet], position: usize, item_index: usize) {
    let completed = state_sets[position].items[item_index].clone();
    let lhs = grammar.production(completed.production).lhs;
    let origin = completed.origin;

    let waiting: Vec<(usize, ProductionId, usize, usize)> = state_sets[origin]
        .items
        .iter()
        .enumerate()
        .filter_map(|(i, w)| {
            let p = grammar.production(w.production);
            if w.dot < p.rhs.len() && p.rhs[w.dot] == Word::Nonterminal(lhs) {
                Some((i, w.production, w.dot, w.origin))
            } else {
                None
            }
        })
        .collect();

    for (waiting_index, production, dot, waiting_origin) in waiting {
        let new_index = state_sets[position].insert(production, dot + 1, waiting_origin);
        let predecessor = if dot == 0 {
            None
        } else {
            Some(ItemRef {
                position: origin,
                index: waiting_index,
            })
        };
        state_sets[position].items[new_index].edges.push(Edge {
            predecessor,
            cause: Cause::Completion(ItemRef {
                position,
                index: item_index,
            }),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Production;
    use crate::symbol::Sentence;

    #[test]
    fn accepts_simple_terminal() {
        let s = Nonterminal::intern("earley_test::S");
        let a = Terminal::intern("earley_test::a");
        let g = Grammar::new(
            s,
            vec![Production::new(s, Sentence::from(vec![Word::Terminal(a)]), 1.0)],
        )
        .unwrap();
        let chart = build_chart(&g, &Sentence::from(vec![Word::Terminal(a)]));
        assert_eq!(chart.accepting_items(&g).len(), 1);
    }

    #[test]
    fn rejects_wrong_terminal() {
        let s = Nonterminal::intern("earley_test::S2");
        let a = Terminal::intern("earley_test::a2");
        let b = Terminal::intern("earley_test::b2");
        let g = Grammar::new(
            s,
            vec![Production::new(s, Sentence::from(vec![Word::Terminal(a)]), 1.0)],
        )
        .unwrap();
        let chart = build_chart(&g, &Sentence::from(vec![Word::Terminal(b)]));
        assert!(chart.accepting_items(&g).is_empty());
    }

    #[test]
    fn accepts_empty_sentence_for_nullable_start() {
        let s = Nonterminal::intern("earley_test::S3");
        let g = Grammar::new(s, vec![Production::new(s, Sentence::new(), 1.0)]).unwrap();
        let chart = build_chart(&g, &Sentence::new());
        assert_eq!(chart.accepting_items(&g).len(), 1);
    }

    #[test]
    fn two_nullable_siblings_both_derive_past_the_first_completion() {
        // S -> A A, A -> epsilon. The second A is only waited on by an item
        // created after the first A's epsilon derivation has already
        // completed, which is exactly what the magic-item eager advance in
        // `predict` exists to handle.
        let s = Nonterminal::intern("earley_test::S4");
        let a = Nonterminal::intern("earley_test::A4");
        let g = Grammar::new(
            s,
            vec![
                Production::new(
                    s,
                    Sentence::from(vec![Word::Nonterminal(a), Word::Nonterminal(a)]),
                    1.0,
                ),
                Production::new(a, Sentence::new(), 1.0),
            ],
        )
        .unwrap();
        let chart = build_chart(&g, &Sentence::new());
        assert_eq!(chart.accepting_items(&g).len(), 1);
    }

    #[test]
    fn ambiguous_binary_grammar_has_two_derivations() {
        // S -> S S | x, the textbook ambiguous (Catalan-number) grammar.
        let s = Nonterminal::intern("earley_test::Samb");
        let x = Terminal::intern("earley_test::xamb");
        let g = Grammar::new(
            s,
            vec![
                Production::new(
                    s,
                    Sentence::from(vec![Word::Nonterminal(s), Word::Nonterminal(s)]),
                    1.0,
                ),
                Production::new(s, Sentence::from(vec![Word::Terminal(x)]), 1.0),
            ],
        )
        .unwrap();
        let sentence = Sentence::from(vec![Word::Terminal(x), Word::Terminal(x), Word::Terminal(x)]);
        let chart = build_chart(&g, &sentence);
        let accepting = chart.accepting_items(&g);
        assert_eq!(accepting.len(), 1);
        // Two distinct bracketings of "x x x" should both show up as edges on
        // the single accepting item once the edges are walked transitively;
        // here we just assert the chart recognized it at all, leaving the
        // ambiguity count to the forest-level test in sppf.rs.
        let accept = accepting[0];
        let item = &chart.state_set(accept.position).items()[accept.index];
        assert!(!item.edges.is_empty());
    }
}
