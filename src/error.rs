//! Error types surfaced at grammar construction time.
use crate::symbol::Nonterminal;

#[derive(Debug, thiserror::Error)]
/// The error type for errors in [`Grammar`](crate::grammar::Grammar) or
/// [`CNFGrammar`](crate::cnf::CNFGrammar) construction.
pub enum GrammarError {
    #[error("production {lhs:?} -> ... has negative weight {weight}")]
    /// A production was given a negative weight.
    NegativeWeight {
        /// The offending production's LHS.
        lhs: Nonterminal,
        /// The offending weight.
        weight: f64,
    },
    #[error("start nonterminal {0:?} has no productions")]
    /// The designated start nonterminal has no productions under strict mode.
    UnknownStartSymbol(Nonterminal),
    #[error("nonterminal {0:?} occurs in a right-hand side but has no productions")]
    /// A production's RHS references a nonterminal with no rules of its own,
    /// rejected by [`Grammar::new_strict`](crate::grammar::Grammar::new_strict).
    UndefinedNonterminal(Nonterminal),
    #[error("rule {lhs:?} -> ... is not in Chomsky Normal Form")]
    /// A `CNFGrammar` constructor was given a rule that is not binary or terminal.
    NotChomskyNormalForm {
        /// The offending production's LHS.
        lhs: Nonterminal,
    },
}
