//! A uniform interface over the two recognition strategies: CYK (requires a
//! grammar already in Chomsky Normal Form) and Earley (works on any grammar,
//! and can additionally hand back a parse forest).
use crate::cnf::CNFGrammar;
use crate::config::Config;
use crate::cyk;
use crate::earley;
use crate::fixpoint;
use crate::grammar::Grammar;
use crate::sppf::Forest;
use crate::symbol::Sentence;

/// Something that can answer "how probable is this sentence under this
/// grammar", and whether it accepts the sentence at all.
pub trait Parser {
    /// The total probability the grammar assigns to `sentence`.
    fn parse_probability(&self, sentence: &Sentence) -> f64;

    /// True iff `sentence` has nonzero probability under the grammar.
    fn accepts(&self, sentence: &Sentence) -> bool {
        self.parse_probability(sentence) > 0.0
    }
}

/// Recognizes sentences against a grammar already normalized into Chomsky
/// Normal Form, via the CYK triangular table.
pub struct CykParser<'a> {
    grammar: &'a CNFGrammar,
}

impl<'a> CykParser<'a> {
    /// Wraps a normalized grammar for CYK recognition.
    pub fn new(grammar: &'a CNFGrammar) -> Self {
        CykParser { grammar }
    }
}

impl<'a> Parser for CykParser<'a> {
    fn parse_probability(&self, sentence: &Sentence) -> f64 {
        cyk::cyk_probability(self.grammar, sentence)
    }
}

/// Recognizes sentences against an arbitrary (not necessarily CNF) grammar
/// via Earley's algorithm, and can additionally build the parse forest and
/// resolve per-node derivation probabilities from it.
pub struct EarleyParser<'a> {
    grammar: &'a Grammar,
    config: Config,
}

impl<'a> EarleyParser<'a> {
    /// Wraps a grammar for Earley recognition, using `config` to drive the
    /// probability fixpoint.
    pub fn new(grammar: &'a Grammar, config: Config) -> Self {
        EarleyParser { grammar, config }
    }

    /// Builds the parse forest for `sentence`, or `None` if it is rejected.
    pub fn parse_forest(&self, sentence: &Sentence) -> Option<Forest> {
        let chart = earley::build_chart(self.grammar, sentence);
        crate::sppf::build(self.grammar, &chart)
    }
}

impl<'a> Parser for EarleyParser<'a> {
    fn parse_probability(&self, sentence: &Sentence) -> f64 {
        let Some(forest) = self.parse_forest(sentence) else {
            return 0.0;
        };
        let probabilities = fixpoint::solve(&forest, self.grammar, self.config.fixpoint);
        probabilities.get(forest.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::CnfNormalizer;
    use crate::grammar::Production;
    use crate::symbol::{Nonterminal, Terminal, Word};

    #[test]
    fn cyk_and_earley_agree_on_simple_grammar() {
        let s = Nonterminal::intern("parser_test::S");
        let a = Terminal::intern("parser_test::a");
        let b = Terminal::intern("parser_test::b");
        let g = Grammar::new(
            s,
            vec![Production::new(
                s,
                Sentence::from(vec![Word::Terminal(a), Word::Terminal(b)]),
                1.0,
            )],
        )
        .unwrap();
        let sentence = Sentence::from(vec![Word::Terminal(a), Word::Terminal(b)]);

        let cnf = CnfNormalizer::new().to_cnf(&g, crate::config::NullateMode::Preserved, true);
        let cyk_parser = CykParser::new(&cnf);
        let earley_parser = EarleyParser::new(&g, Config::default());

        let cyk_p = cyk_parser.parse_probability(&sentence);
        let earley_p = earley_parser.parse_probability(&sentence);
        assert!((cyk_p - earley_p).abs() < 1e-9);
        assert!(cyk_parser.accepts(&sentence));
        assert!(earley_parser.accepts(&sentence));
    }

    #[test]
    fn both_reject_unmatched_sentence() {
        let s = Nonterminal::intern("parser_test::S2");
        let a = Terminal::intern("parser_test::a2");
        let g = Grammar::new(
            s,
            vec![Production::new(s, Sentence::from(vec![Word::Terminal(a)]), 1.0)],
        )
        .unwrap();
        let cnf = CnfNormalizer::new().to_cnf(&g, crate::config::NullateMode::Preserved, true);
        let cyk_parser = CykParser::new(&cnf);
        let earley_parser = EarleyParser::new(&g, Config::default());
        let empty = Sentence::new();
        assert!(!cyk_parser.accepts(&empty));
        assert!(!earley_parser.accepts(&empty));
    }
}
