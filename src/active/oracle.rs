#[cfg(feature = "random")]
use std::cell::RefCell;

use tracing::warn;

use crate::{
    alphabet::{show_word, CharAlphabet, Word},
    automaton::{AutomatonError, LatticeAutomaton, Semantics, SingleInitial},
    lattice::LatticeOps,
};

/// Default bound on the length of words that an [`ExhaustiveOracle`] compares.
pub const EXHAUSTIVE_MAX_LEN: usize = 12;

/// Answers membership queries, i.e. gives the lattice value of a word in the language that is
/// being learned. An oracle is expected to be a pure function of the word: the learner queries
/// every word at most once and never invalidates the answer.
///
/// Every function `Fn(&[char]) -> O::Element` is a membership oracle.
pub trait MembershipOracle<O: LatticeOps> {
    fn output(&self, word: &[char]) -> O::Element;
}

impl<O: LatticeOps, F: Fn(&[char]) -> O::Element> MembershipOracle<O> for F {
    fn output(&self, word: &[char]) -> O::Element {
        (self)(word)
    }
}

/// Answers equivalence queries. Given a hypothesis, an oracle either accepts it by returning
/// `None` or produces a word on which the hypothesis and the target language differ.
pub trait EquivalenceOracle<O: LatticeOps> {
    fn counterexample(
        &self,
        hypothesis: &LatticeAutomaton<O>,
    ) -> Result<Option<Word>, AutomatonError>;
}

/// An oracle based on a target [`LatticeAutomaton`]. Membership queries run the word through
/// the target and equivalence queries are decided exactly with [`LatticeAutomaton::equivalent`].
#[derive(Debug, Clone)]
pub struct AutomatonOracle<O: LatticeOps, S = SingleInitial> {
    target: LatticeAutomaton<O, S>,
}

impl<O: LatticeOps, S: Semantics<O>> AutomatonOracle<O, S> {
    pub fn new(target: LatticeAutomaton<O, S>) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &LatticeAutomaton<O, S> {
        &self.target
    }

    pub fn alphabet(&self) -> &CharAlphabet {
        self.target.alphabet()
    }
}

impl<O: LatticeOps, S: Semantics<O>> MembershipOracle<O> for AutomatonOracle<O, S> {
    fn output(&self, word: &[char]) -> O::Element {
        self.target.run_word(word).unwrap_or_else(|err| {
            warn!("cannot answer query {}: {err}", show_word(word));
            self.target.lattice().bottom().clone()
        })
    }
}

impl<O: LatticeOps, S: Semantics<O>> EquivalenceOracle<O> for AutomatonOracle<O, S> {
    fn counterexample(
        &self,
        hypothesis: &LatticeAutomaton<O>,
    ) -> Result<Option<Word>, AutomatonError> {
        LatticeAutomaton::equivalent(&self.target, hypothesis)
    }
}

/// An oracle based on a function that gives the value of every word. Equivalence queries are
/// answered by comparing hypothesis and function on all words up to a length bound, so the
/// oracle can only be as good as that bound.
#[derive(Debug, Clone)]
pub struct ExhaustiveOracle<F> {
    alphabet: CharAlphabet,
    function: F,
    max_len: usize,
}

impl<F> ExhaustiveOracle<F> {
    /// Creates an oracle that compares all words of length at most [`EXHAUSTIVE_MAX_LEN`].
    pub fn new(alphabet: CharAlphabet, function: F) -> Self {
        Self::with_max_len(alphabet, function, EXHAUSTIVE_MAX_LEN)
    }

    pub fn with_max_len(alphabet: CharAlphabet, function: F, max_len: usize) -> Self {
        Self {
            alphabet,
            function,
            max_len,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl<O: LatticeOps, F: Fn(&[char]) -> O::Element> MembershipOracle<O> for ExhaustiveOracle<F> {
    fn output(&self, word: &[char]) -> O::Element {
        (self.function)(word)
    }
}

impl<O: LatticeOps, F: Fn(&[char]) -> O::Element> EquivalenceOracle<O> for ExhaustiveOracle<F> {
    fn counterexample(
        &self,
        hypothesis: &LatticeAutomaton<O>,
    ) -> Result<Option<Word>, AutomatonError> {
        LatticeAutomaton::equivalent_by_words(
            &self.alphabet,
            &self.function,
            hypothesis,
            self.max_len,
        )
    }
}

/// An oracle based on a function that gives the value of every word. Equivalence queries
/// compare hypothesis and function on a fixed number of random words, so a hypothesis that is
/// accepted may still be wrong.
#[cfg(feature = "random")]
#[derive(Debug)]
pub struct RandomOracle<F> {
    alphabet: CharAlphabet,
    function: F,
    samples: usize,
    max_len: usize,
    rng: RefCell<fastrand::Rng>,
}

#[cfg(feature = "random")]
impl<F> RandomOracle<F> {
    /// Creates an oracle that tests `samples` words of length `1..=max_len` per equivalence
    /// query, the words are drawn from a generator seeded with `seed`.
    pub fn new(
        alphabet: CharAlphabet,
        function: F,
        samples: usize,
        max_len: usize,
        seed: u64,
    ) -> Self {
        Self {
            alphabet,
            function,
            samples,
            max_len,
            rng: RefCell::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

#[cfg(feature = "random")]
impl<O: LatticeOps, F: Fn(&[char]) -> O::Element> MembershipOracle<O> for RandomOracle<F> {
    fn output(&self, word: &[char]) -> O::Element {
        (self.function)(word)
    }
}

#[cfg(feature = "random")]
impl<O: LatticeOps, F: Fn(&[char]) -> O::Element> EquivalenceOracle<O> for RandomOracle<F> {
    fn counterexample(
        &self,
        hypothesis: &LatticeAutomaton<O>,
    ) -> Result<Option<Word>, AutomatonError> {
        let found = LatticeAutomaton::random_equivalent(
            &self.alphabet,
            &self.function,
            hypothesis,
            self.samples,
            self.max_len,
            &mut self.rng.borrow_mut(),
        )?;
        if found.is_none() {
            tracing::trace!("no difference found in {} random words", self.samples);
        }
        Ok(found)
    }
}
