//! Interned symbols, words and sentences.
//!
//! Interning is process-wide and append-only, matching the teacher's stance that
//! symbol tables outlive any single [`Grammar`](crate::grammar::Grammar) or parse.
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, OnceLock};

use ahash::RandomState;
use string_interner::backend::StringBackend;
use string_interner::symbol::SymbolU32;
use string_interner::StringInterner;

type Interner = StringInterner<StringBackend<SymbolU32>, RandomState>;

struct Tables {
    nonterminals: Interner,
    terminals: Interner,
}

fn tables() -> &'static Mutex<Tables> {
    static TABLES: OnceLock<Mutex<Tables>> = OnceLock::new();
    TABLES.get_or_init(|| {
        Mutex::new(Tables {
            nonterminals: Interner::new(),
            terminals: Interner::new(),
        })
    })
}

#[derive(Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[repr(transparent)]
/// An interned nonterminal symbol. Equality and hashing are by identity of its name.
pub struct Nonterminal(SymbolU32);

#[derive(Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[repr(transparent)]
/// An interned terminal atom. Equality and hashing are by identity of its name.
pub struct Terminal(SymbolU32);

impl Nonterminal {
    /// Interns `name` as a nonterminal, returning its id.
    pub fn intern(name: &str) -> Self {
        let mut tables = tables().lock().unwrap();
        Nonterminal(tables.nonterminals.get_or_intern(name))
    }

    /// Resolves this nonterminal back to its name.
    pub fn name(self) -> String {
        tables()
            .lock()
            .unwrap()
            .nonterminals
            .resolve(self.0)
            .expect("nonterminal id not present in the global table")
            .to_string()
    }
}

impl Terminal {
    /// Interns `name` as a terminal, returning its id.
    pub fn intern(name: &str) -> Self {
        let mut tables = tables().lock().unwrap();
        Terminal(tables.terminals.get_or_intern(name))
    }

    /// Resolves this terminal back to its name.
    pub fn name(self) -> String {
        tables()
            .lock()
            .unwrap()
            .terminals
            .resolve(self.0)
            .expect("terminal id not present in the global table")
            .to_string()
    }
}

impl Debug for Nonterminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.name())
    }
}

/// A reserved prefix that can never occur in a name interned from surface syntax.
/// Fresh nonterminals minted by the CNF normalizer are interned under this prefix
/// so they are guaranteed not to alias any nonterminal the input grammar declared.
const FRESH_PREFIX: char = '\u{0}';

impl Nonterminal {
    /// Interns a nonterminal guaranteed distinct from any nonterminal interned from
    /// ordinary (non-fresh) names, tagged with `tag` and `counter` for debuggability.
    pub(crate) fn fresh(tag: &str, counter: usize) -> Self {
        Self::intern(&format!("{FRESH_PREFIX}{tag}{counter}"))
    }
}

/// A tagged union of [`Terminal`] and [`Nonterminal`], used as an RHS element.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub enum Word {
    /// A terminal occurrence.
    Terminal(Terminal),
    /// A nonterminal occurrence.
    Nonterminal(Nonterminal),
}

impl Word {
    /// Returns the terminal this word wraps, if any.
    pub fn as_terminal(&self) -> Option<Terminal> {
        match self {
            Word::Terminal(t) => Some(*t),
            Word::Nonterminal(_) => None,
        }
    }

    /// Returns the nonterminal this word wraps, if any.
    pub fn as_nonterminal(&self) -> Option<Nonterminal> {
        match self {
            Word::Nonterminal(n) => Some(*n),
            Word::Terminal(_) => None,
        }
    }
}

/// A finite ordered sequence of [`Word`]s: a production's RHS, or a sentence to parse.
#[derive(Clone, Default, Hash, Eq, PartialEq, Debug)]
pub struct Sentence(Vec<Word>);

impl Sentence {
    /// Builds an empty sentence.
    pub fn new() -> Self {
        Sentence(Vec::new())
    }

    /// Constructs a sentence from a string by mapping each `char` to a terminal
    /// interned under its single-character string form. A convenience boundary
    /// used by tests, mirroring the teacher's habit of exposing small parsing
    /// helpers (`Sentence::from_letters`) rather than requiring callers to build
    /// terminal vectors by hand.
    pub fn from_letters(s: &str) -> Self {
        Sentence(
            s.chars()
                .map(|c| Word::Terminal(Terminal::intern(&c.to_string())))
                .collect(),
        )
    }
}

impl Deref for Sentence {
    type Target = [Word];
    fn deref(&self) -> &[Word] {
        &self.0
    }
}

impl DerefMut for Sentence {
    fn deref_mut(&mut self) -> &mut [Word] {
        &mut self.0
    }
}

impl FromIterator<Word> for Sentence {
    fn from_iter<T: IntoIterator<Item = Word>>(iter: T) -> Self {
        Sentence(iter.into_iter().collect())
    }
}

impl From<Vec<Word>> for Sentence {
    fn from(v: Vec<Word>) -> Self {
        Sentence(v)
    }
}
