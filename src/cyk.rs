//! The CYK recognizer: a triangular dynamic-programming table over a CNF grammar.
use ahash::AHashMap;

use crate::cnf::CNFGrammar;
use crate::symbol::{Sentence, Word};
use crate::Nonterminal;

/// Computes the probability that `grammar` generates `sentence`, via the
/// classic CYK triangular table generalized to weighted rules.
///
/// `table[len][i]` holds, for each nonterminal, the probability that it
/// derives the substring of length `len` starting at `i`. The table is built
/// bottom-up from length 1 to the full sentence length; the answer is the
/// start symbol's entry for the whole span, or `empty_weight` when the
/// sentence is empty.
pub fn cyk_probability(grammar: &CNFGrammar, sentence: &Sentence) -> f64 {
    let n = sentence.len();
    if n == 0 {
        return grammar.empty_weight;
    }

    let mut table: Vec<Vec<AHashMap<Nonterminal, f64>>> = vec![vec![AHashMap::default(); n]; n + 1];

    for (i, w) in sentence.iter().enumerate() {
        let Word::Terminal(t) = w else {
            // A sentence may only contain terminals; a nonterminal occurrence
            // here can never be derived and contributes nothing.
            continue;
        };
        let cell = &mut table[1][i];
        for rule in grammar.all_terminal_rules() {
            if rule.terminal == *t {
                *cell.entry(rule.lhs).or_insert(0.0) += grammar.terminal_probability(rule);
            }
        }
    }

    for len in 2..=n {
        for i in 0..=(n - len) {
            for split in 1..len {
                let (left_idx, right_idx) = (i, i + split);
                let left_len = split;
                let right_len = len - split;
                let left_cell = table[left_len][left_idx].clone();
                let right_cell = table[right_len][right_idx].clone();
                for rule in grammar.all_binary_rules() {
                    let (Some(&lp), Some(&rp)) =
                        (left_cell.get(&rule.left), right_cell.get(&rule.right))
                    else {
                        continue;
                    };
                    let contribution = grammar.binary_probability(rule) * lp * rp;
                    *table[len][i].entry(rule.lhs).or_insert(0.0) += contribution;
                }
            }
        }
    }

    table[n][0].get(&grammar.start()).copied().unwrap_or(0.0)
}
