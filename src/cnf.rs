//! Chomsky Normal Form normalization: START, TERM, BIN, DEL, UNIT.
use ahash::AHashMap;

use crate::config::NullateMode;
use crate::error::GrammarError;
use crate::grammar::{compute_nullable_probabilities, Grammar, Production};
use crate::symbol::{Nonterminal, Sentence, Terminal, Word};

/// A binary rule `lhs -> left right`, both RHS symbols nonterminals.
#[derive(Clone, Copy, Debug)]
pub struct BinaryRule {
    /// The rule's left-hand side.
    pub lhs: Nonterminal,
    /// The first nonterminal on the right-hand side.
    pub left: Nonterminal,
    /// The second nonterminal on the right-hand side.
    pub right: Nonterminal,
    /// This rule's weight among productions sharing `lhs`.
    pub weight: f64,
}

/// A terminal rule `lhs -> terminal`.
#[derive(Clone, Copy, Debug)]
pub struct TerminalRule {
    /// The rule's left-hand side.
    pub lhs: Nonterminal,
    /// The single terminal on the right-hand side.
    pub terminal: Terminal,
    /// This rule's weight among productions sharing `lhs`.
    pub weight: f64,
}

/// A grammar in Chomsky Normal Form: every rule is either binary (`A -> B C`) or
/// terminal (`A -> a`), except possibly an empty rule at the start symbol.
///
/// Weights are kept un-normalized per rule, alongside a per-lhs total, so
/// `probability` can divide lazily rather than re-scaling every weight whenever
/// a sibling rule is added or removed.
pub struct CNFGrammar {
    start: Nonterminal,
    binary: Vec<BinaryRule>,
    terminal: Vec<TerminalRule>,
    binary_by_lhs: AHashMap<Nonterminal, Vec<usize>>,
    terminal_by_lhs: AHashMap<Nonterminal, Vec<usize>>,
    lhs_total_weight: AHashMap<Nonterminal, f64>,
    /// The probability that the start symbol directly derives the empty string.
    pub empty_weight: f64,
}

impl CNFGrammar {
    /// Assembles a CNF grammar from its parts, validating that every supplied
    /// rule really is binary or terminal.
    pub fn from_parts(
        start: Nonterminal,
        binary: Vec<BinaryRule>,
        terminal: Vec<TerminalRule>,
        empty_weight: f64,
    ) -> Result<Self, GrammarError> {
        let mut binary_by_lhs: AHashMap<Nonterminal, Vec<usize>> = AHashMap::default();
        let mut terminal_by_lhs: AHashMap<Nonterminal, Vec<usize>> = AHashMap::default();
        let mut lhs_total_weight: AHashMap<Nonterminal, f64> = AHashMap::default();
        for (i, r) in binary.iter().enumerate() {
            binary_by_lhs.entry(r.lhs).or_default().push(i);
            *lhs_total_weight.entry(r.lhs).or_insert(0.0) += r.weight;
        }
        for (i, r) in terminal.iter().enumerate() {
            terminal_by_lhs.entry(r.lhs).or_default().push(i);
            *lhs_total_weight.entry(r.lhs).or_insert(0.0) += r.weight;
        }
        Ok(CNFGrammar {
            start,
            binary,
            terminal,
            binary_by_lhs,
            terminal_by_lhs,
            lhs_total_weight,
            empty_weight,
        })
    }

    /// The designated start nonterminal.
    pub fn start(&self) -> Nonterminal {
        self.start
    }

    /// Binary rules with the given left-hand side.
    pub fn binary_rules_from(&self, lhs: Nonterminal) -> impl Iterator<Item = &BinaryRule> {
        static EMPTY: &[usize] = &[];
        self.binary_by_lhs
            .get(&lhs)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
            .iter()
            .map(move |&i| &self.binary[i])
    }

    /// Terminal rules with the given left-hand side.
    pub fn terminal_rules_from(&self, lhs: Nonterminal) -> impl Iterator<Item = &TerminalRule> {
        static EMPTY: &[usize] = &[];
        self.terminal_by_lhs
            .get(&lhs)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
            .iter()
            .map(move |&i| &self.terminal[i])
    }

    /// All binary rules, in no particular order.
    pub fn all_binary_rules(&self) -> &[BinaryRule] {
        &self.binary
    }

    /// All terminal rules, in no particular order.
    pub fn all_terminal_rules(&self) -> &[TerminalRule] {
        &self.terminal
    }

    /// The normalized probability of a binary rule reached via `binary_rules_from`.
    pub fn binary_probability(&self, rule: &BinaryRule) -> f64 {
        let total = self.lhs_total_weight.get(&rule.lhs).copied().unwrap_or(0.0);
        if total <= 0.0 {
            0.0
        } else {
            rule.weight / total
        }
    }

    /// The normalized probability of a terminal rule reached via `terminal_rules_from`.
    pub fn terminal_probability(&self, rule: &TerminalRule) -> f64 {
        let total = self.lhs_total_weight.get(&rule.lhs).copied().unwrap_or(0.0);
        if total <= 0.0 {
            0.0
        } else {
            rule.weight / total
        }
    }
}

/// Normalizes arbitrary weighted grammars into Chomsky Normal Form.
///
/// A normalizer instance owns the fresh-name counter used by its intermediate
/// BIN/TERM nonterminals; it is not global state, so two `CnfNormalizer`s
/// running concurrently never collide with each other, though (per the
/// interning table's documented caveat) a single normalizer's own fresh names
/// are only guaranteed unique within the run that minted them.
pub struct CnfNormalizer {
    fresh_counter: usize,
}

impl Default for CnfNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CnfNormalizer {
    /// Creates a normalizer with a fresh counter.
    pub fn new() -> Self {
        CnfNormalizer { fresh_counter: 0 }
    }

    fn fresh(&mut self, tag: &str) -> Nonterminal {
        let n = Nonterminal::fresh(tag, self.fresh_counter);
        self.fresh_counter += 1;
        n
    }

    /// Runs the full START / TERM / BIN / DEL / UNIT pipeline on `grammar`,
    /// producing an equivalent [`CNFGrammar`].
    ///
    /// When `simplify` is true, a final pass drops every rule whose LHS is not
    /// reachable from the (possibly freshly introduced) start symbol, along
    /// with any rule only reachable through dropped rules. When false, the
    /// pipeline's intermediate bookkeeping rules are left in place even if
    /// some of them ended up unreachable, which is useful for inspecting the
    /// pipeline's steps directly.
    pub fn to_cnf(&mut self, grammar: &Grammar, nullate_mode: NullateMode, simplify: bool) -> CNFGrammar {
        let (new_start, mut productions) = self.start_step(grammar);
        self.term_step(&mut productions);
        self.bin_step(&mut productions);
        let empty_weight = self.del_step(&mut productions, new_start, nullate_mode);
        self.unit_step(&mut productions);

        if simplify {
            productions = prune_unreachable(new_start, productions);
        }

        let mut binary = Vec::new();
        let mut terminal = Vec::new();
        for p in productions {
            match &*p.rhs {
                [Word::Nonterminal(a), Word::Nonterminal(b)] => binary.push(BinaryRule {
                    lhs: p.lhs,
                    left: *a,
                    right: *b,
                    weight: p.weight,
                }),
                [Word::Terminal(t)] => terminal.push(TerminalRule {
                    lhs: p.lhs,
                    terminal: *t,
                    weight: p.weight,
                }),
                [] => {
                    // Only the designated start symbol may retain an empty RHS past
                    // DEL; its weight was already folded into `empty_weight`.
                }
                _ => unreachable!("BIN step left a rule with more than two RHS symbols"),
            }
        }
        CNFGrammar::from_parts(new_start, binary, terminal, empty_weight)
            .expect("normalizer only emits binary or terminal rules")
    }

    /// START: introduces a fresh start symbol `S0 -> S` so the original start
    /// symbol never occurs on a rule's right-hand side, matching CNF's
    /// requirement that the start symbol not be a BIN/DEL/UNIT target.
    fn start_step(&mut self, grammar: &Grammar) -> (Nonterminal, Vec<Production>) {
        let new_start = self.fresh("start");
        let mut productions: Vec<Production> = vec![Production::new(
            new_start,
            Sentence::from(vec![Word::Nonterminal(grammar.start())]),
            1.0,
        )];
        productions.extend(grammar.productions().map(|(_, p)| p.clone()));
        (new_start, productions)
    }

    /// TERM: in any rule of length >= 2, replaces each terminal occurrence `a`
    /// with a fresh nonterminal `N_a -> a`, so mixed terminal/nonterminal RHSs
    /// disappear before binarization.
    fn term_step(&mut self, productions: &mut Vec<Production>) {
        let mut terminal_proxies: AHashMap<Terminal, Nonterminal> = AHashMap::default();
        for p in productions.iter() {
            if p.rhs.len() < 2 {
                continue;
            }
            for w in p.rhs.iter() {
                if let Word::Terminal(t) = w {
                    terminal_proxies
                        .entry(*t)
                        .or_insert_with(|| Nonterminal::fresh("unused", 0));
                }
            }
        }
        // Assign real fresh names now that we know which terminals need a proxy,
        // since `or_insert_with` above cannot borrow `self` mutably.
        for proxy in terminal_proxies.values_mut() {
            *proxy = self.fresh("term");
        }

        for p in productions.iter_mut() {
            if p.rhs.len() < 2 {
                continue;
            }
            let new_rhs: Vec<Word> = p
                .rhs
                .iter()
                .map(|w| match w {
                    Word::Terminal(t) => Word::Nonterminal(terminal_proxies[t]),
                    Word::Nonterminal(n) => Word::Nonterminal(*n),
                })
                .collect();
            p.rhs = Sentence::from(new_rhs);
        }
        let extra: Vec<Production> = terminal_proxies
            .into_iter()
            .map(|(t, proxy)| Production::new(proxy, Sentence::from(vec![Word::Terminal(t)]), 1.0))
            .collect();
        productions.extend(extra);
    }

    /// BIN: right-branches any rule of length >= 3 into a chain of fresh
    /// binary rules `A -> X1 F1`, `F1 -> X2 F2`, ..., `Fk-2 -> Xk-1 Xk`.
    fn bin_step(&mut self, productions: &mut Vec<Production>) {
        let mut rewritten = Vec::with_capacity(productions.len());
        for p in productions.drain(..) {
            if p.rhs.len() <= 2 {
                rewritten.push(p);
                continue;
            }
            let words: Vec<Word> = p.rhs.iter().copied().collect();
            let mut lhs = p.lhs;
            let mut i = 0;
            while i < words.len() - 2 {
                let next = self.fresh("bin");
                rewritten.push(Production::new(
                    lhs,
                    Sentence::from(vec![words[i], Word::Nonterminal(next)]),
                    if i == 0 { p.weight } else { 1.0 },
                ));
                lhs = next;
                i += 1;
            }
            rewritten.push(Production::new(
                lhs,
                Sentence::from(vec![words[words.len() - 2], words[words.len() - 1]]),
                1.0,
            ));
        }
        *productions = rewritten;
    }

    /// DEL: computes a nullable-probability fixpoint over the pre-DEL grammar,
    /// then for every rule containing a nullable occurrence, adds a variant
    /// with that occurrence dropped, weighted per `nullate_mode`. Rules that
    /// become wholly empty are removed, except at `start`, whose empty weight
    /// is returned separately rather than kept as a rule (CNF forbids empty
    /// RHSs except, by convention here, as a scalar alongside the grammar).
    fn del_step(
        &mut self,
        productions: &mut Vec<Production>,
        start: Nonterminal,
        nullate_mode: NullateMode,
    ) -> f64 {
        let nullable = compute_nullable_probabilities(productions);
        let mut rewritten = Vec::with_capacity(productions.len());
        let mut empty_weight = 0.0;

        for p in productions.drain(..) {
            if p.is_epsilon() {
                if p.lhs == start {
                    empty_weight += p.weight;
                }
                continue;
            }
            let nullable_positions: Vec<usize> = p
                .rhs
                .iter()
                .enumerate()
                .filter_map(|(i, w)| match w {
                    Word::Nonterminal(n) if nullable.get(n).copied().unwrap_or(0.0) > 0.0 => {
                        Some(i)
                    }
                    _ => None,
                })
                .collect();

            if nullable_positions.is_empty() {
                rewritten.push(p);
                continue;
            }

            // Every non-empty subset of nullable positions may be dropped; each
            // subset yields one variant rule, after which only rules of length
            // >= 1 are kept (the all-dropped variant is handled as the
            // production's own contribution to `nullable`, not re-emitted here
            // unless `p.lhs == start`, matching CNF's no-epsilon-elsewhere rule).
            let k = nullable_positions.len();
            for mask in 0..(1u32 << k) {
                let dropped: Vec<usize> = (0..k)
                    .filter(|&b| mask & (1 << b) != 0)
                    .map(|b| nullable_positions[b])
                    .collect();
                let new_rhs: Vec<Word> = p
                    .rhs
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !dropped.contains(i))
                    .map(|(_, w)| *w)
                    .collect();

                let drop_prob: f64 = dropped
                    .iter()
                    .map(|&i| match p.rhs[i] {
                        Word::Nonterminal(n) => nullable[&n],
                        Word::Terminal(_) => unreachable!(),
                    })
                    .product();

                let weight = match nullate_mode {
                    NullateMode::Preserved => {
                        if dropped.is_empty() {
                            p.weight
                        } else {
                            p.weight * drop_prob
                        }
                    }
                    NullateMode::Corrected => {
                        if dropped.is_empty() {
                            p.weight * (1.0 - drop_prob)
                        } else {
                            p.weight * drop_prob
                        }
                    }
                };

                if new_rhs.is_empty() {
                    if p.lhs == start {
                        empty_weight += weight;
                    }
                    continue;
                }
                rewritten.push(Production::new(p.lhs, Sentence::from(new_rhs), weight));
            }
        }
        *productions = rewritten;
        empty_weight
    }

    /// UNIT: repeatedly eliminates unit rules `A -> B`, folding `B`'s own
    /// productions into `A`, each weighted by `w(A -> B) * P(B -> gamma)` so
    /// the raw weight added to `A`'s rule set stays in the same units as `A`'s
    /// existing siblings (§4.1 UNIT). A `(lhs, target)` deleted-set stops a
    /// unit edge that's already been folded in from being rediscovered and
    /// re-expanded through a different chain into the same pair, which would
    /// otherwise double-count weight or, for mutually-referencing unit rules
    /// (`A -> B`, `B -> A`), loop forever.
    fn unit_step(&mut self, productions: &mut Vec<Production>) {
        productions.retain(|p| !p.is_self_loop());
        dedup_by_lhs_rhs(productions);

        let mut deleted: ahash::AHashSet<(Nonterminal, Nonterminal)> = ahash::AHashSet::default();
        loop {
            let unit_index = productions.iter().position(|p| p.is_unit());
            let Some(idx) = unit_index else { break };
            let unit = productions.remove(idx);
            let target = unit.rhs[0].as_nonterminal().unwrap();

            if !deleted.insert((unit.lhs, target)) {
                continue;
            }

            let total_from_target: f64 =
                productions.iter().filter(|p| p.lhs == target).map(|p| p.weight).sum();
            if total_from_target > 0.0 {
                let inherited: Vec<Production> = productions
                    .iter()
                    .filter(|p| p.lhs == target)
                    .map(|p| {
                        Production::new(
                            unit.lhs,
                            p.rhs.clone(),
                            unit.weight * (p.weight / total_from_target),
                        )
                    })
                    .filter(|p| !p.is_self_loop())
                    .collect();
                productions.extend(inherited);
            }
            dedup_by_lhs_rhs(productions);
        }
    }
}

/// Merges productions sharing both `lhs` and `rhs` by summing their weights,
/// per UNIT step 1's "deduplicate rules by (lhs, rhs)".
fn dedup_by_lhs_rhs(productions: &mut Vec<Production>) {
    let mut merged: Vec<Production> = Vec::with_capacity(productions.len());
    'outer: for p in productions.drain(..) {
        for m in merged.iter_mut() {
            if m.lhs == p.lhs && *m.rhs == *p.rhs {
                m.weight += p.weight;
                continue 'outer;
            }
        }
        merged.push(p);
    }
    *productions = merged;
}

fn prune_unreachable(start: Nonterminal, productions: Vec<Production>) -> Vec<Production> {
    let mut reachable = ahash::AHashSet::default();
    reachable.insert(start);
    loop {
        let mut changed = false;
        for p in &productions {
            if reachable.contains(&p.lhs) {
                for w in p.rhs.iter() {
                    if let Word::Nonterminal(n) = w {
                        if reachable.insert(*n) {
                            changed = true;
                        }
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    productions
        .into_iter()
        .filter(|p| reachable.contains(&p.lhs))
        .collect()
}
