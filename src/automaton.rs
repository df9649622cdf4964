use std::fmt::Debug;

use thiserror::Error;
use tracing::trace;

use crate::{
    alphabet::CharAlphabet,
    lattice::{Lattice, LatticeOps},
    math, Show,
};

mod equivalence;

mod format;
pub use format::ParseError;

mod nondeterministic;
pub use nondeterministic::LatticeNfa;

/// Errors that are caused by using an automaton with input it does not understand.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum AutomatonError {
    /// The symbol is not part of the automaton's alphabet.
    #[error("symbol `{0}` is not part of the alphabet")]
    InvalidSymbol(char),
    /// The value is not an element of the automaton's lattice.
    #[error("value `{0}` is not an element of the lattice")]
    InvalidValue(String),
    /// There is no state with the given name.
    #[error("state `{0}` does not exist")]
    UnknownState(String),
    /// The state has no outgoing transition on the given symbol.
    #[error("state `{0}` has no transition on `{1}`")]
    MissingTransition(String, char),
    /// No state is marked as initial.
    #[error("automaton has no initial state")]
    NoInitialState,
}

/// The outgoing transition of a state on some symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition<E> {
    /// Value that is met with the accumulated value when the transition is taken.
    pub value: E,
    /// Name of the state the transition leads to.
    pub target: String,
}

/// A state of a [`LatticeAutomaton`], with at most one transition per symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State<E> {
    name: String,
    value: E,
    transitions: math::Map<char, Transition<E>>,
}

impl<E> State<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &E {
        &self.value
    }

    /// The transition on `symbol`, if there is one.
    pub fn transition(&self, symbol: char) -> Option<&Transition<E>> {
        self.transitions.get(&symbol)
    }
}

/// Determines which state a run starts in and which value the state a run ends in
/// contributes. Runs start with the initial value of the initial state as accumulator and
/// finish by taking the meet with the final value of the reached state.
pub trait Semantics<O: LatticeOps>: Clone + Debug {
    /// The value with which a run starting in `state` begins, ⊥ for states that are not initial.
    fn initial_value(&self, lattice: &Lattice<O>, state: &str) -> O::Element;
    /// The value a run contributes when it ends in `state`.
    fn final_value(&self, lattice: &Lattice<O>, state: &State<O::Element>) -> O::Element;
}

/// Semantics with a single designated initial state, which starts with ⊤. The final value
/// of a state is the value that is stored in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SingleInitial(pub String);

impl<O: LatticeOps> Semantics<O> for SingleInitial {
    fn initial_value(&self, lattice: &Lattice<O>, state: &str) -> O::Element {
        if state == self.0 {
            lattice.top().clone()
        } else {
            lattice.bottom().clone()
        }
    }

    fn final_value(&self, _lattice: &Lattice<O>, state: &State<O::Element>) -> O::Element {
        state.value.clone()
    }
}

/// A deterministic automaton whose states and transitions are labeled with elements of a
/// finite [`Lattice`] (LDFA).
///
/// States are identified by their name and kept in insertion order, which is also the order
/// in which they are printed. Every state has at most one transition per symbol; a run that
/// encounters a missing transition yields ⊥.
#[derive(Debug, Clone)]
pub struct LatticeAutomaton<O: LatticeOps, S = SingleInitial> {
    alphabet: CharAlphabet,
    lattice: Lattice<O>,
    semantics: S,
    states: math::OrderedMap<String, State<O::Element>>,
}

impl<O: LatticeOps> LatticeAutomaton<O> {
    /// Creates an automaton without states, where the state named `initial` will be the
    /// initial one.
    pub fn new(alphabet: CharAlphabet, lattice: Lattice<O>, initial: impl Into<String>) -> Self {
        Self::with_semantics(alphabet, lattice, SingleInitial(initial.into()))
    }
}

impl<O: LatticeOps, S: Semantics<O>> LatticeAutomaton<O, S> {
    /// Creates an automaton without states that uses the given semantics.
    pub fn with_semantics(alphabet: CharAlphabet, lattice: Lattice<O>, semantics: S) -> Self {
        Self {
            alphabet,
            lattice,
            semantics,
            states: math::OrderedMap::default(),
        }
    }

    pub fn alphabet(&self) -> &CharAlphabet {
        &self.alphabet
    }

    pub fn lattice(&self) -> &Lattice<O> {
        &self.lattice
    }

    pub fn semantics(&self) -> &S {
        &self.semantics
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// Iterates over all states in insertion order.
    pub fn states(&self) -> impl Iterator<Item = &State<O::Element>> + '_ {
        self.states.values()
    }

    pub fn state(&self, name: &str) -> Option<&State<O::Element>> {
        self.states.get(name)
    }

    /// The transition from `state` on `symbol`, if both exist.
    pub fn transition(&self, state: &str, symbol: char) -> Option<&Transition<O::Element>> {
        self.states.get(state).and_then(|q| q.transition(symbol))
    }

    /// Returns the first state whose initial value lies strictly above ⊥.
    pub fn initial_state(&self) -> Option<&str> {
        let bottom = self.lattice.bottom();
        self.states
            .keys()
            .find(|q| {
                self.lattice
                    .lt(bottom, &self.semantics.initial_value(&self.lattice, q))
            })
            .map(|q| q.as_str())
    }

    fn verify_value(&self, value: &O::Element) -> Result<(), AutomatonError> {
        if self.lattice.contains(value) {
            Ok(())
        } else {
            Err(AutomatonError::InvalidValue(value.show()))
        }
    }

    fn verify_symbol(&self, symbol: char) -> Result<(), AutomatonError> {
        if self.alphabet.contains(symbol) {
            Ok(())
        } else {
            Err(AutomatonError::InvalidSymbol(symbol))
        }
    }

    fn state_mut(&mut self, name: &str) -> Result<&mut State<O::Element>, AutomatonError> {
        self.states
            .get_mut(name)
            .ok_or_else(|| AutomatonError::UnknownState(name.to_string()))
    }

    /// Adds a state with the given value. If the state exists already, only its value is
    /// replaced and its transitions are kept.
    pub fn add_state(
        &mut self,
        name: impl Into<String>,
        value: O::Element,
    ) -> Result<(), AutomatonError> {
        self.verify_value(&value)?;
        let name = name.into();
        match self.states.get_mut(&name) {
            Some(state) => state.value = value,
            None => {
                self.states.insert(
                    name.clone(),
                    State {
                        name,
                        value,
                        transitions: math::Map::default(),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn set_state_value(&mut self, name: &str, value: O::Element) -> Result<(), AutomatonError> {
        self.verify_value(&value)?;
        self.state_mut(name)?.value = value;
        Ok(())
    }

    /// Sets the transition from `source` on `symbol`, replacing any previous one. The target
    /// does not need to exist yet, which allows building automata state by state.
    pub fn add_transition(
        &mut self,
        source: &str,
        symbol: char,
        target: impl Into<String>,
        value: O::Element,
    ) -> Result<(), AutomatonError> {
        self.verify_symbol(symbol)?;
        self.verify_value(&value)?;
        let target = target.into();
        trace!("adding transition {source} --{symbol}|{}--> {target}", value.show());
        self.state_mut(source)?
            .transitions
            .insert(symbol, Transition { value, target });
        Ok(())
    }

    /// Changes the value of an existing transition, keeping its target.
    pub fn set_transition_value(
        &mut self,
        source: &str,
        symbol: char,
        value: O::Element,
    ) -> Result<(), AutomatonError> {
        self.verify_symbol(symbol)?;
        self.verify_value(&value)?;
        self.state_mut(source)?
            .transitions
            .get_mut(&symbol)
            .ok_or_else(|| AutomatonError::MissingTransition(source.to_string(), symbol))?
            .value = value;
        Ok(())
    }

    fn get_state(&self, name: &str) -> Result<&State<O::Element>, AutomatonError> {
        self.states
            .get(name)
            .ok_or_else(|| AutomatonError::UnknownState(name.to_string()))
    }

    /// Computes the value of `word`. The run starts in the initial state with its initial
    /// value, every transition that is taken is met with the accumulated value and finally
    /// the result is met with the final value of the reached state. If a transition is
    /// missing along the way, the word has value ⊥.
    ///
    /// Fails if the word contains a symbol outside of the alphabet or if there is no initial
    /// state.
    pub fn run_word(&self, word: &[char]) -> Result<O::Element, AutomatonError> {
        word.iter().try_for_each(|sym| self.verify_symbol(*sym))?;

        let mut current = self.initial_state().ok_or(AutomatonError::NoInitialState)?;
        let mut value = self.semantics.initial_value(&self.lattice, current);
        for symbol in word {
            let Some(transition) = self.get_state(current)?.transition(*symbol) else {
                return Ok(self.lattice.bottom().clone());
            };
            value = self.lattice.meet(&value, &transition.value);
            current = &transition.target;
        }

        let reached = self.get_state(current)?;
        Ok(self
            .lattice
            .meet(&value, &self.semantics.final_value(&self.lattice, reached)))
    }

    /// Returns the name of the state that is reached by reading `word`, or `None` if
    /// a transition is missing along the way.
    pub fn reached_state(&self, word: &[char]) -> Result<Option<&str>, AutomatonError> {
        word.iter().try_for_each(|sym| self.verify_symbol(*sym))?;

        let mut current = self.initial_state().ok_or(AutomatonError::NoInitialState)?;
        for symbol in word {
            match self.get_state(current)?.transition(*symbol) {
                Some(transition) => current = &transition.target,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Returns true if every state has a transition for every symbol and all targets exist.
    pub fn is_complete(&self) -> bool {
        self.states.values().all(|q| {
            self.alphabet.universe().all(|sym| {
                q.transition(sym)
                    .is_some_and(|t| self.states.contains_key(&t.target))
            })
        })
    }

    /// Names of all states, in insertion order.
    pub fn state_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.states.keys().map(|q| q.as_str())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::prelude::*;

    pub(crate) fn two_state_target() -> LatticeAutomaton<ChainOps> {
        LatticeAutomaton::parse(
            "e=>\ne$2: a|2->e b|1->q\nq$1: a|1->e b|0->q\n",
            CharAlphabet::of_size(2),
            Lattice::linear(2),
        )
        .unwrap()
    }

    /// A target over the subsets of {1, 2}, where the values {1} and {2} are incomparable.
    pub(crate) fn power_set_target() -> LatticeAutomaton<PowerSetOps> {
        LatticeAutomaton::parse(
            "0=>\n0${1}: a|{2}->1 b|{1,2}->0\n1${1,2}: a|{}->0 b|{2}->0\n",
            CharAlphabet::of_size(2),
            Lattice::power_set([1, 2]),
        )
        .unwrap()
    }

    #[test]
    fn run_meets_along_path() {
        let target = two_state_target();
        let cases = [("", 2), ("b", 1), ("bb", 0), ("ba", 1), ("a", 2), ("aab", 1)];
        for (word, expected) in cases {
            let word: Vec<_> = word.chars().collect();
            assert_eq!(target.run_word(&word), Ok(expected), "on {word:?}");
        }
        assert_eq!(target.reached_state(&['b', 'a']), Ok(Some("e")));
        assert_eq!(target.initial_state(), Some("e"));
        assert!(target.is_complete());
    }

    #[test]
    fn missing_transition_yields_bottom() {
        let mut aut = LatticeAutomaton::new(CharAlphabet::of_size(2), Lattice::linear(3), "q0");
        aut.add_state("q0", 3).unwrap();
        aut.add_state("q1", 2).unwrap();
        aut.add_transition("q0", 'a', "q1", 3).unwrap();

        assert_eq!(aut.run_word(&['a']), Ok(2));
        assert_eq!(aut.run_word(&['b']), Ok(0));
        assert_eq!(aut.run_word(&['a', 'a']), Ok(0));
        assert_eq!(aut.reached_state(&['a', 'b']), Ok(None));
        assert!(!aut.is_complete());
    }

    #[test]
    fn invalid_input_is_rejected() {
        let mut aut = LatticeAutomaton::new(CharAlphabet::of_size(2), Lattice::linear(2), "q0");
        assert_eq!(aut.run_word(&[]), Err(AutomatonError::NoInitialState));
        assert_eq!(
            aut.add_state("q0", 7),
            Err(AutomatonError::InvalidValue("7".to_string()))
        );
        aut.add_state("q0", 1).unwrap();
        assert_eq!(
            aut.add_transition("q0", 'z', "q0", 1),
            Err(AutomatonError::InvalidSymbol('z'))
        );
        assert_eq!(
            aut.add_transition("q0", 'a', "q0", 3),
            Err(AutomatonError::InvalidValue("3".to_string()))
        );
        assert_eq!(
            aut.add_transition("nope", 'a', "q0", 1),
            Err(AutomatonError::UnknownState("nope".to_string()))
        );
        assert_eq!(
            aut.set_transition_value("q0", 'b', 1),
            Err(AutomatonError::MissingTransition("q0".to_string(), 'b'))
        );
        assert_eq!(aut.run_word(&['c']), Err(AutomatonError::InvalidSymbol('c')));
        // nothing was changed by the failed calls
        assert_eq!(aut.state("q0").unwrap().transition('a'), None);
    }

    #[test]
    fn updating_values() {
        let mut aut = two_state_target();
        aut.set_transition_value("e", 'b', 2).unwrap();
        aut.set_state_value("q", 1).unwrap();
        assert_eq!(aut.run_word(&['b']), Ok(1));
        assert_eq!(aut.run_word(&['b', 'b']), Ok(0));
        // re-adding a state keeps its transitions
        aut.add_state("q", 2).unwrap();
        assert_eq!(aut.run_word(&['b']), Ok(2));
        assert_eq!(aut.size(), 2);
    }

    #[test]
    fn meet_law_on_power_sets() {
        let lattice = Lattice::power_set([1, 2]);
        let set = |xs: &[u32]| xs.iter().cloned().collect::<std::collections::BTreeSet<_>>();
        let mut aut = LatticeAutomaton::new(CharAlphabet::of_size(1), lattice, "p");
        aut.add_state("p", set(&[1, 2])).unwrap();
        aut.add_state("r", set(&[2])).unwrap();
        aut.add_transition("p", 'a', "r", set(&[1])).unwrap();
        aut.add_transition("r", 'a', "p", set(&[1, 2])).unwrap();

        assert_eq!(aut.run_word(&[]), Ok(set(&[1, 2])));
        assert_eq!(aut.run_word(&['a']), Ok(set(&[])));
        assert_eq!(aut.run_word(&['a', 'a']), Ok(set(&[1])));
    }
}
