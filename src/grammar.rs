//! The grammar module: weighted productions, lookup by LHS, nullable probabilities.
use std::sync::OnceLock;

use ahash::{AHashMap, AHashSet};

use crate::error::GrammarError;
use crate::symbol::{Nonterminal, Sentence, Terminal, Word};

#[derive(Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Debug)]
#[repr(transparent)]
/// A stable handle to a [`Production`] within a [`Grammar`].
pub struct ProductionId(pub(crate) usize);

/// A weighted production `lhs -> rhs`.
#[derive(Clone, Debug)]
pub struct Production {
    /// The left-hand side nonterminal.
    pub lhs: Nonterminal,
    /// The right-hand side, a (possibly empty) sequence of words.
    pub rhs: Sentence,
    /// The non-negative weight of this production among its siblings sharing `lhs`.
    pub weight: f64,
}

impl Production {
    /// Creates a new production. Does not validate the weight; [`Grammar::new`]
    /// does that once, at construction time.
    pub fn new(lhs: Nonterminal, rhs: impl Into<Sentence>, weight: f64) -> Self {
        Production {
            lhs,
            rhs: rhs.into(),
            weight,
        }
    }

    /// True iff this production's RHS is empty.
    pub fn is_epsilon(&self) -> bool {
        self.rhs.is_empty()
    }

    /// True iff this production has exactly one RHS symbol and it is a nonterminal.
    pub fn is_unit(&self) -> bool {
        self.rhs.len() == 1 && matches!(self.rhs[0], Word::Nonterminal(_))
    }

    /// True iff this production is a unit rule whose RHS nonterminal equals its LHS.
    pub fn is_self_loop(&self) -> bool {
        match self.rhs.first() {
            Some(Word::Nonterminal(n)) if self.rhs.len() == 1 => *n == self.lhs,
            _ => false,
        }
    }
}

/// An immutable, weighted context-free grammar.
///
/// Post-construction, a `Grammar` never mutates: every query (`productions_from`,
/// `probability`, `nullable_probability`, ...) is a pure function of the
/// productions it was built from. The nullable-probability table is computed
/// lazily on first use and memoized behind a `OnceLock`, so `Grammar` is safely
/// shared (`Send + Sync`) across threads that each parse with their own chart.
pub struct Grammar {
    start: Nonterminal,
    productions: Vec<Production>,
    by_lhs: AHashMap<Nonterminal, Vec<ProductionId>>,
    nullable: OnceLock<AHashMap<Nonterminal, f64>>,
}

impl Grammar {
    /// Builds a grammar from a start symbol and a set of productions.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::NegativeWeight`] if any production has a negative
    /// weight.
    pub fn new(start: Nonterminal, productions: Vec<Production>) -> Result<Self, GrammarError> {
        Self::build(start, productions, false)
    }

    /// Builds a grammar exactly as [`Grammar::new`] does, but additionally
    /// requires that every nonterminal occurring in a production's
    /// right-hand side (and the start symbol itself) has at least one
    /// production of its own. Use this when a dangling nonterminal
    /// (one that can never be expanded, silently contributing probability 0
    /// to every derivation that reaches it) should be a construction-time
    /// error rather than a quietly-unreachable rule.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::NegativeWeight`] or [`GrammarError::UndefinedNonterminal`].
    pub fn new_strict(start: Nonterminal, productions: Vec<Production>) -> Result<Self, GrammarError> {
        Self::build(start, productions, true)
    }

    fn build(start: Nonterminal, productions: Vec<Production>, strict: bool) -> Result<Self, GrammarError> {
        let mut by_lhs: AHashMap<Nonterminal, Vec<ProductionId>> = AHashMap::default();
        for (idx, p) in productions.iter().enumerate() {
            if p.weight < 0.0 {
                return Err(GrammarError::NegativeWeight {
                    lhs: p.lhs,
                    weight: p.weight,
                });
            }
            by_lhs.entry(p.lhs).or_default().push(ProductionId(idx));
        }
        if strict {
            if !by_lhs.contains_key(&start) {
                return Err(GrammarError::UnknownStartSymbol(start));
            }
            for p in &productions {
                for w in p.rhs.iter() {
                    if let Word::Nonterminal(n) = w {
                        if !by_lhs.contains_key(n) {
                            return Err(GrammarError::UndefinedNonterminal(*n));
                        }
                    }
                }
            }
        }
        Ok(Grammar {
            start,
            productions,
            by_lhs,
            nullable: OnceLock::new(),
        })
    }

    /// The grammar's designated start nonterminal.
    pub fn start(&self) -> Nonterminal {
        self.start
    }

    /// Resolves a [`ProductionId`] to its [`Production`].
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this grammar.
    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id.0]
    }

    /// All productions, paired with their stable ids, in declaration order.
    pub fn productions(&self) -> impl Iterator<Item = (ProductionId, &Production)> {
        self.productions
            .iter()
            .enumerate()
            .map(|(i, p)| (ProductionId(i), p))
    }

    /// The ids of every production with the given LHS, in declaration order.
    pub fn productions_from(&self, lhs: Nonterminal) -> &[ProductionId] {
        static EMPTY: &[ProductionId] = &[];
        self.by_lhs.get(&lhs).map(|v| v.as_slice()).unwrap_or(EMPTY)
    }

    /// The normalized probability of `id` among productions sharing its LHS:
    /// `weight(id) / sum(weight(p) for p with the same lhs)`. Zero if the total
    /// weight for that LHS is zero.
    pub fn probability(&self, id: ProductionId) -> f64 {
        let p = self.production(id);
        let total: f64 = self
            .productions_from(p.lhs)
            .iter()
            .map(|&i| self.production(i).weight)
            .sum();
        if total <= 0.0 {
            0.0
        } else {
            p.weight / total
        }
    }

    /// The total probability that `nt` derives the empty string, computed as a
    /// weighted fixpoint (§4.1 DEL step 1, generalized to arbitrary RHS, not just
    /// CNF grammars). Productions containing a terminal never contribute, since a
    /// terminal can never be part of a derivation of the empty string.
    ///
    /// The joint probability of several nullable nonterminals in the same RHS all
    /// deriving empty is approximated as the product of their individual nullable
    /// probabilities. This is only exact under independence; it is a known,
    /// intentionally preserved approximation (see `DESIGN.md`).
    pub fn nullable_probability(&self, nt: Nonterminal) -> f64 {
        self.nullable
            .get_or_init(|| compute_nullable_probabilities(&self.productions))
            .get(&nt)
            .copied()
            .unwrap_or(0.0)
    }

    /// Every nonterminal mentioned anywhere in the grammar: as an LHS, or inside
    /// an RHS.
    pub fn nonterminals(&self) -> Vec<Nonterminal> {
        let mut set = AHashSet::default();
        for p in &self.productions {
            set.insert(p.lhs);
            for w in p.rhs.iter() {
                if let Word::Nonterminal(n) = w {
                    set.insert(*n);
                }
            }
        }
        set.into_iter().collect()
    }

    /// Every terminal mentioned anywhere in the grammar's productions.
    pub fn terminals(&self) -> Vec<Terminal> {
        let mut set = AHashSet::default();
        for p in &self.productions {
            for w in p.rhs.iter() {
                if let Word::Terminal(t) = w {
                    set.insert(*t);
                }
            }
        }
        set.into_iter().collect()
    }

    /// Finds the production `lhs -> rhs`, if one exists, by exact RHS match.
    /// Used by the SPPF builder's production-annotation pass to recover which
    /// production a single- or zero-child family instantiates.
    pub fn find_production(&self, lhs: Nonterminal, rhs: &[Word]) -> Option<ProductionId> {
        self.productions_from(lhs)
            .iter()
            .copied()
            .find(|&id| &*self.production(id).rhs == rhs)
    }
}

/// Computes, for every nonterminal appearing as an LHS, the probability that it
/// derives the empty string, via the fixpoint described in §4.1 DEL step 1.
pub(crate) fn compute_nullable_probabilities(
    productions: &[Production],
) -> AHashMap<Nonterminal, f64> {
    let mut numerator: AHashMap<Nonterminal, f64> = AHashMap::default();
    let mut total: AHashMap<Nonterminal, f64> = AHashMap::default();
    for p in productions {
        *total.entry(p.lhs).or_insert(0.0) += p.weight;
    }
    let mut nullable_prob: AHashMap<Nonterminal, f64> = AHashMap::default();
    loop {
        let mut changed = false;
        numerator.clear();
        for p in productions {
            if p.is_epsilon() {
                *numerator.entry(p.lhs).or_insert(0.0) += p.weight;
                continue;
            }
            if p.rhs.iter().all(|w| match w {
                Word::Nonterminal(n) => nullable_prob.contains_key(n),
                Word::Terminal(_) => false,
            }) {
                let joint: f64 = p
                    .rhs
                    .iter()
                    .map(|w| match w {
                        Word::Nonterminal(n) => nullable_prob[n],
                        Word::Terminal(_) => unreachable!(),
                    })
                    .product();
                *numerator.entry(p.lhs).or_insert(0.0) += p.weight * joint;
            }
        }
        for (lhs, num) in &numerator {
            let prob = num / total[lhs];
            let prev = nullable_prob.get(lhs).copied();
            if prev != Some(prob) {
                changed = true;
            }
            nullable_prob.insert(*lhs, prob);
        }
        if !changed {
            break;
        }
    }
    nullable_prob
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_normalizes_per_lhs() {
        let s = Nonterminal::intern("grammar_test::S");
        let a = Terminal::intern("grammar_test::a");
        let b = Terminal::intern("grammar_test::b");
        let p1 = Production::new(s, Sentence::from(vec![Word::Terminal(a)]), 3.0);
        let p2 = Production::new(s, Sentence::from(vec![Word::Terminal(b)]), 1.0);
        let g = Grammar::new(s, vec![p1, p2]).unwrap();
        let ids = g.productions_from(s);
        assert_eq!(g.probability(ids[0]), 0.75);
        assert_eq!(g.probability(ids[1]), 0.25);
    }

    #[test]
    fn nullable_fixpoint_chains() {
        let a = Nonterminal::intern("grammar_test::A2");
        let b = Nonterminal::intern("grammar_test::B2");
        let pa = Production::new(a, Sentence::from(vec![Word::Nonterminal(b)]), 1.0);
        let pb = Production::new(b, Sentence::new(), 1.0);
        let g = Grammar::new(a, vec![pa, pb]).unwrap();
        assert_eq!(g.nullable_probability(b), 1.0);
        assert_eq!(g.nullable_probability(a), 1.0);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let s = Nonterminal::intern("grammar_test::S3");
        let p = Production::new(s, Sentence::new(), -1.0);
        assert!(matches!(
            Grammar::new(s, vec![p]),
            Err(GrammarError::NegativeWeight { .. })
        ));
    }

    #[test]
    fn strict_mode_rejects_dangling_nonterminal() {
        let s = Nonterminal::intern("grammar_test::S4");
        let undefined = Nonterminal::intern("grammar_test::Undefined4");
        let p = Production::new(s, Sentence::from(vec![Word::Nonterminal(undefined)]), 1.0);
        assert!(Grammar::new(s, vec![p.clone()]).is_ok());
        assert!(matches!(
            Grammar::new_strict(s, vec![p]),
            Err(GrammarError::UndefinedNonterminal(n)) if n == undefined
        ));
    }

    #[test]
    fn strict_mode_rejects_unproductive_start() {
        let s = Nonterminal::intern("grammar_test::S5");
        assert!(matches!(
            Grammar::new_strict(s, vec![]),
            Err(GrammarError::UnknownStartSymbol(n)) if n == s
        ));
    }
}
