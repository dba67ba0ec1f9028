//! A probabilistic context-free grammar engine.
//!
//! Grammars are built from weighted productions ([`grammar::Grammar`]), then
//! either normalized into Chomsky Normal Form ([`cnf`]) for CYK recognition
//! ([`cyk`]), or recognized directly via Earley's algorithm ([`earley`]),
//! which can additionally build a shared packed parse forest ([`sppf`]) and
//! resolve per-node derivation probabilities over it ([`fixpoint`]).
//! [`parser`] unifies both recognition strategies behind one trait.
//!
//! Symbols (terminals and nonterminals) are interned process-wide
//! ([`symbol`]); this keeps [`grammar::Grammar`], [`cnf::CNFGrammar`] and
//! [`sppf::Forest`] cheap to pass around and safe to share across threads.
pub mod cnf;
pub mod config;
pub mod cyk;
pub mod earley;
pub mod error;
pub mod fixpoint;
pub mod grammar;
pub mod parser;
pub mod sppf;
pub mod symbol;

pub use cnf::{CNFGrammar, CnfNormalizer};
pub use config::{Config, FixpointConfig, NullateMode};
pub use error::GrammarError;
pub use grammar::{Grammar, Production, ProductionId};
pub use parser::{CykParser, EarleyParser, Parser};
pub use sppf::Forest;
pub use symbol::{Nonterminal, Sentence, Terminal, Word};
