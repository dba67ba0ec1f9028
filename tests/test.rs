use pcfg_core::config::{Config, FixpointConfig, NullateMode};
use pcfg_core::{CnfNormalizer, CykParser, EarleyParser, Grammar, Nonterminal, Parser, Production, Sentence};

fn letters(s: &str) -> Sentence {
    Sentence::from_letters(s)
}

#[test]
fn empty_grammar_rejects_every_nonempty_sentence() {
    let s = Nonterminal::intern("integration::empty::S");
    let grammar = Grammar::new(s, vec![]).unwrap();
    let parser = EarleyParser::new(&grammar, Config::default());
    assert_eq!(parser.parse_probability(&letters("a")), 0.0);
    assert_eq!(parser.parse_probability(&letters("")), 0.0);
    assert!(!parser.accepts(&letters("a")));
}

/// S -> X X (w=2), S -> a (w=8); X -> X X (w=2), X -> a (w=8).
/// A textbook Catalan-ambiguous grammar with known closed-form probabilities.
fn catalan_grammar() -> Grammar {
    let s = Nonterminal::intern("integration::catalan::S");
    let x = Nonterminal::intern("integration::catalan::X");
    let a = pcfg_core::Terminal::intern("a");
    use pcfg_core::Word;
    Grammar::new(
        s,
        vec![
            Production::new(
                s,
                Sentence::from(vec![Word::Nonterminal(x), Word::Nonterminal(x)]),
                2.0,
            ),
            Production::new(s, Sentence::from(vec![Word::Terminal(a)]), 8.0),
            Production::new(
                x,
                Sentence::from(vec![Word::Nonterminal(x), Word::Nonterminal(x)]),
                2.0,
            ),
            Production::new(x, Sentence::from(vec![Word::Terminal(a)]), 8.0),
        ],
    )
    .unwrap()
}

#[test]
fn catalan_grammar_matches_closed_form_probabilities() {
    let grammar = catalan_grammar();
    let earley = EarleyParser::new(&grammar, Config::default());
    let cnf = CnfNormalizer::new().to_cnf(&grammar, NullateMode::Preserved, true);
    let cyk = CykParser::new(&cnf);

    let expected = [
        ("a", 0.8),
        ("aa", 0.128),
        ("aaa", 0.04096),
        ("aaaa", 0.016384),
        ("aaaaa", 0.007340032),
    ];
    for (word, prob) in expected {
        let sentence = letters(word);
        let earley_p = earley.parse_probability(&sentence);
        let cyk_p = cyk.parse_probability(&sentence);
        assert!(
            (earley_p - prob).abs() < 1e-6,
            "earley({word}) = {earley_p}, expected {prob}"
        );
        assert!(
            (cyk_p - prob).abs() < 1e-6,
            "cyk({word}) = {cyk_p}, expected {prob}"
        );
        assert!(
            (earley_p - cyk_p).abs() < 1e-9,
            "earley and cyk disagree on {word}: {earley_p} vs {cyk_p}"
        );
    }
}

#[test]
fn purely_nullable_grammar_only_accepts_empty_string() {
    let s = Nonterminal::intern("integration::nullable::S");
    let grammar = Grammar::new(s, vec![Production::new(s, Sentence::new(), 1.0)]).unwrap();
    let parser = EarleyParser::new(&grammar, Config::default());
    assert_eq!(parser.parse_probability(&letters("")), 1.0);
    assert_eq!(parser.parse_probability(&letters("a")), 0.0);
}

#[test]
fn two_nullable_siblings_accept_the_empty_string() {
    // S -> A A, A -> epsilon. The second A's waiting item is only created
    // after the first A's epsilon derivation has already completed, which
    // regressed acceptance of "" down to probability 0 before the magic-item
    // eager advance was wired into prediction.
    use pcfg_core::Word;
    let s = Nonterminal::intern("integration::two_nullable::S");
    let a = Nonterminal::intern("integration::two_nullable::A");
    let grammar = Grammar::new(
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
    let earley = EarleyParser::new(&grammar, Config::default());
    assert!((earley.parse_probability(&letters("")) - 1.0).abs() < 1e-9);
    assert_eq!(earley.parse_probability(&letters("a")), 0.0);

    let cnf = CnfNormalizer::new().to_cnf(&grammar, NullateMode::Preserved, true);
    let cyk = CykParser::new(&cnf);
    assert!((cyk.parse_probability(&letters("")) - 1.0).abs() < 1e-9);
}

#[test]
fn unit_chain_collapses_to_the_terminal_rule() {
    use pcfg_core::Word;
    let a_nt = Nonterminal::intern("integration::unit::A");
    let b_nt = Nonterminal::intern("integration::unit::B");
    let c_nt = Nonterminal::intern("integration::unit::C");
    let a_t = pcfg_core::Terminal::intern("a");
    let grammar = Grammar::new(
        a_nt,
        vec![
            Production::new(a_nt, Sentence::from(vec![Word::Nonterminal(b_nt)]), 1.0),
            Production::new(b_nt, Sentence::from(vec![Word::Nonterminal(c_nt)]), 1.0),
            Production::new(c_nt, Sentence::from(vec![Word::Terminal(a_t)]), 1.0),
        ],
    )
    .unwrap();
    let parser = EarleyParser::new(&grammar, Config::default());
    assert!((parser.parse_probability(&letters("a")) - 1.0).abs() < 1e-9);

    let cnf = CnfNormalizer::new().to_cnf(&grammar, NullateMode::Preserved, true);
    let cyk = CykParser::new(&cnf);
    assert!((cyk.parse_probability(&letters("a")) - 1.0).abs() < 1e-9);
}

#[test]
fn right_recursion_with_nullable_tail_halves_each_step() {
    use pcfg_core::Word;
    let s = Nonterminal::intern("integration::right_recursion::S");
    let a = pcfg_core::Terminal::intern("a");
    let grammar = Grammar::new(
        s,
        vec![
            Production::new(
                s,
                Sentence::from(vec![Word::Terminal(a), Word::Nonterminal(s)]),
                1.0,
            ),
            Production::new(s, Sentence::new(), 1.0),
        ],
    )
    .unwrap();
    let parser = EarleyParser::new(&grammar, Config::default());
    for k in 0..6usize {
        let word = "a".repeat(k);
        let expected = 0.5_f64.powi(k as i32 + 1);
        let actual = parser.parse_probability(&letters(&word));
        assert!(
            (actual - expected).abs() < 1e-9,
            "k={k}: got {actual}, expected {expected}"
        );
    }
}

#[test]
fn binary_ambiguity_has_multiple_derivations_and_never_increases() {
    use pcfg_core::Word;
    let s = Nonterminal::intern("integration::binary_ambiguity::S");
    let a = pcfg_core::Terminal::intern("a");
    let grammar = Grammar::new(
        s,
        vec![
            Production::new(
                s,
                Sentence::from(vec![Word::Nonterminal(s), Word::Nonterminal(s)]),
                1.0,
            ),
            Production::new(s, Sentence::from(vec![Word::Terminal(a)]), 1.0),
        ],
    )
    .unwrap();
    let parser = EarleyParser::new(&grammar, Config::default());
    let forest = parser.parse_forest(&letters("aaa")).unwrap();
    let root = forest.node(forest.root());
    assert!(root.families.len() >= 2, "\"aaa\" should have >= 2 bracketings");

    // The fixpoint itself asserts monotonicity internally (it panics on any
    // increase); reaching a finite answer here is the property under test.
    let probability = parser.parse_probability(&letters("aaa"));
    assert!((0.0..=1.0).contains(&probability));
}

#[test]
fn fixpoint_config_tolerance_is_honored() {
    let grammar = catalan_grammar();
    let tight = Config {
        nullate_mode: NullateMode::Preserved,
        fixpoint: FixpointConfig {
            tolerance: 1e-15,
            max_iterations: 10_000,
        },
    };
    let loose = Config {
        nullate_mode: NullateMode::Preserved,
        fixpoint: FixpointConfig {
            tolerance: 1e-3,
            max_iterations: 10_000,
        },
    };
    let tight_parser = EarleyParser::new(&grammar, tight);
    let loose_parser = EarleyParser::new(&grammar, loose);
    let sentence = letters("aaaaa");
    let tight_p = tight_parser.parse_probability(&sentence);
    let loose_p = loose_parser.parse_probability(&sentence);
    assert!((tight_p - loose_p).abs() < 1e-2);
}

#[test]
fn acceptance_agrees_with_forest_presence() {
    let grammar = catalan_grammar();
    let parser = EarleyParser::new(&grammar, Config::default());
    for word in ["", "a", "aa", "aaa", "aaaa", "b", "ab"] {
        let sentence = letters(word);
        let accepts = parser.accepts(&sentence);
        let has_forest = parser.parse_forest(&sentence).is_some();
        assert_eq!(
            accepts, has_forest,
            "accepts({word:?}) = {accepts} but forest presence = {has_forest}"
        );
    }
}

#[test]
fn strict_grammar_construction_rejects_dangling_nonterminals() {
    use pcfg_core::Word;
    let s = Nonterminal::intern("integration::strict::S");
    let undefined = Nonterminal::intern("integration::strict::Undefined");
    let productions = vec![Production::new(
        s,
        Sentence::from(vec![Word::Nonterminal(undefined)]),
        1.0,
    )];
    assert!(Grammar::new(s, productions.clone()).is_ok());
    assert!(Grammar::new_strict(s, productions).is_err());
}
