use std::fmt::Display;

use itertools::Itertools;
use tracing::trace;

use crate::{
    alphabet::CharAlphabet,
    lattice::{Lattice, LatticeOps},
    math, Show,
};

use super::{AutomatonError, LatticeAutomaton, Semantics, Transition};

#[derive(Debug, Clone, PartialEq, Eq)]
struct NfaState<E> {
    value: E,
    initial: E,
    transitions: math::Map<char, Vec<Transition<E>>>,
}

/// A nondeterministic lattice automaton (LNFA). States carry a value and an initial weight and
/// may have any number of outgoing transitions per symbol. Parallel transitions, i.e. those
/// that agree in source, symbol and target, are kept as a single transition whose value is the
/// join of all of them, which does not change the value of any word.
#[derive(Debug, Clone)]
pub struct LatticeNfa<O: LatticeOps> {
    alphabet: CharAlphabet,
    lattice: Lattice<O>,
    states: math::OrderedMap<String, NfaState<O::Element>>,
}

impl<O: LatticeOps> LatticeNfa<O> {
    pub fn new(alphabet: CharAlphabet, lattice: Lattice<O>) -> Self {
        Self {
            alphabet,
            lattice,
            states: math::OrderedMap::default(),
        }
    }

    pub fn alphabet(&self) -> &CharAlphabet {
        &self.alphabet
    }

    pub fn lattice(&self) -> &Lattice<O> {
        &self.lattice
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    fn verify_value(&self, value: &O::Element) -> Result<(), AutomatonError> {
        if self.lattice.contains(value) {
            Ok(())
        } else {
            Err(AutomatonError::InvalidValue(value.show()))
        }
    }

    fn state(&self, name: &str) -> Result<&NfaState<O::Element>, AutomatonError> {
        self.states
            .get(name)
            .ok_or_else(|| AutomatonError::UnknownState(name.to_string()))
    }

    fn state_mut(&mut self, name: &str) -> Result<&mut NfaState<O::Element>, AutomatonError> {
        self.states
            .get_mut(name)
            .ok_or_else(|| AutomatonError::UnknownState(name.to_string()))
    }

    /// Adds a state that is not initial, or replaces the value of an existing state.
    pub fn add_state(
        &mut self,
        name: impl Into<String>,
        value: O::Element,
    ) -> Result<(), AutomatonError> {
        self.verify_value(&value)?;
        let bottom = self.lattice.bottom().clone();
        self.states
            .entry(name.into())
            .and_modify(|q| q.value = value.clone())
            .or_insert_with(|| NfaState {
                value,
                initial: bottom,
                transitions: math::Map::default(),
            });
        Ok(())
    }

    /// Sets the initial weight of a state. A state is initial iff its weight is above ⊥.
    pub fn set_initial(&mut self, name: &str, weight: O::Element) -> Result<(), AutomatonError> {
        self.verify_value(&weight)?;
        self.state_mut(name)?.initial = weight;
        Ok(())
    }

    /// Adds a transition. If there already is a transition with the same symbol and target,
    /// its value becomes the join of both values.
    pub fn add_transition(
        &mut self,
        source: &str,
        symbol: char,
        target: impl Into<String>,
        value: O::Element,
    ) -> Result<(), AutomatonError> {
        if !self.alphabet.contains(symbol) {
            return Err(AutomatonError::InvalidSymbol(symbol));
        }
        self.verify_value(&value)?;
        let target = target.into();

        let Self {
            lattice, states, ..
        } = self;
        let outgoing = states
            .get_mut(source)
            .ok_or_else(|| AutomatonError::UnknownState(source.to_string()))?
            .transitions
            .entry(symbol)
            .or_default();
        match outgoing.iter_mut().find(|t| t.target == target) {
            Some(existing) => existing.value = lattice.join(&existing.value, &value),
            None => outgoing.push(Transition { value, target }),
        }
        Ok(())
    }

    /// Names and weights of all states whose initial weight lies strictly above ⊥.
    pub fn initial_states(&self) -> impl Iterator<Item = (&str, &O::Element)> + '_ {
        self.states
            .iter()
            .filter(|(_, q)| self.lattice.lt(self.lattice.bottom(), &q.initial))
            .map(|(name, q)| (name.as_str(), &q.initial))
    }

    /// Computes the value of `word` as the join over all runs. A run starting in `q` and
    /// ending in `p` contributes the meet of the initial weight of `q`, every transition
    /// value along the way and the value of `p`. Runs that get stuck contribute ⊥.
    ///
    /// The runs are explored depth first with an explicit stack, whose depth is bounded by
    /// the length of the word.
    pub fn run_word(&self, word: &[char]) -> Result<O::Element, AutomatonError> {
        if let Some(sym) = word.iter().find(|sym| !self.alphabet.contains(**sym)) {
            return Err(AutomatonError::InvalidSymbol(*sym));
        }

        let mut stack: Vec<(&str, usize, O::Element)> = self
            .initial_states()
            .map(|(q, weight)| (q, 0, weight.clone()))
            .collect();
        let mut result = self.lattice.bottom().clone();

        while let Some((q, depth, accumulated)) = stack.pop() {
            let state = self.state(q)?;
            let Some(symbol) = word.get(depth) else {
                let value = self.lattice.meet(&accumulated, &state.value);
                result = self.lattice.join(&result, &value);
                continue;
            };
            for t in state.transitions.get(symbol).into_iter().flatten() {
                stack.push((
                    t.target.as_str(),
                    depth + 1,
                    self.lattice.meet(&accumulated, &t.value),
                ));
            }
        }

        Ok(result)
    }

    /// Returns a new automaton in which `absorbed` is folded into `kept`. The merged state gets
    /// the join of both values and initial weights, it inherits the outgoing transitions of
    /// both states and every transition into `absorbed` is redirected to `kept`.
    pub fn merge_states(&self, kept: &str, absorbed: &str) -> Result<Self, AutomatonError> {
        let first = self.state(kept)?;
        let second = self.state(absorbed)?;
        let redirect = |target: &str| {
            if target == absorbed {
                kept.to_string()
            } else {
                target.to_string()
            }
        };

        let mut merged = Self::new(self.alphabet.clone(), self.lattice.clone());
        for (name, q) in self.states.iter().filter(|(name, _)| *name != absorbed) {
            merged.add_state(name.clone(), q.value.clone())?;
            merged.set_initial(name, q.initial.clone())?;
        }
        merged.add_state(kept, self.lattice.join(&first.value, &second.value))?;
        merged.set_initial(kept, self.lattice.join(&first.initial, &second.initial))?;

        for (name, q) in &self.states {
            let source = redirect(name);
            for sym in self.alphabet.universe() {
                for t in q.transitions.get(&sym).into_iter().flatten() {
                    merged.add_transition(&source, sym, redirect(&t.target), t.value.clone())?;
                }
            }
        }

        trace!(
            "merged {absorbed} into {kept}, now have {} states",
            merged.size()
        );
        Ok(merged)
    }
}

impl<O: LatticeOps, S: Semantics<O>> From<&LatticeAutomaton<O, S>> for LatticeNfa<O> {
    fn from(value: &LatticeAutomaton<O, S>) -> Self {
        let lattice = value.lattice();
        let states = value
            .states()
            .map(|q| {
                let transitions = q
                    .transitions
                    .iter()
                    .map(|(sym, t)| (*sym, vec![t.clone()]))
                    .collect();
                (
                    q.name().to_string(),
                    NfaState {
                        value: value.semantics().final_value(lattice, q),
                        initial: value.semantics().initial_value(lattice, q.name()),
                        transitions,
                    },
                )
            })
            .collect();
        Self {
            alphabet: value.alphabet().clone(),
            lattice: lattice.clone(),
            states,
        }
    }
}

/// Uses the exchange format of [`LatticeAutomaton`], except that the header lists all
/// initial states separated by commas.
impl<O: LatticeOps> Display for LatticeNfa<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}=>", self.initial_states().map(|(q, _)| q).join(","))?;
        for (name, q) in &self.states {
            write!(f, "{name}${}:", q.value.show())?;
            for sym in self.alphabet.universe() {
                for t in q.transitions.get(&sym).into_iter().flatten() {
                    write!(f, " {sym}|{}->{}", t.value.show(), t.target)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
