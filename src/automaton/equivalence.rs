use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::{
    alphabet::{CharAlphabet, Word},
    lattice::LatticeOps,
    math, Show,
};

use super::{AutomatonError, LatticeAutomaton, Semantics};

/// Name of the state that absorbs runs on missing transitions in a simplified automaton.
/// Product states always contain a `*` followed by a nonempty value, so this cannot clash.
const SINK: &str = "*";

fn product_name(state: &str, value: &impl Show) -> String {
    format!("{state}*{}", value.show())
}

impl<O: LatticeOps, S: Semantics<O>> LatticeAutomaton<O, S> {
    /// Builds the product of `self` with the lattice: a state `q*l` records that `q` was
    /// reached with accumulated value `l`. All transitions of the product carry ⊤ and the
    /// value of `q*l` is the meet of `l` with the final value of `q`, so the product assigns
    /// every word the same value as `self` while the value only depends on the reached state.
    ///
    /// Missing transitions are redirected into a sink state with value ⊥, which makes the
    /// product complete.
    pub fn simplify(&self) -> Result<LatticeAutomaton<O>, AutomatonError> {
        let initial = self.initial_state().ok_or(AutomatonError::NoInitialState)?;
        let lattice = &self.lattice;
        let top = lattice.top();

        let mut product = LatticeAutomaton::new(
            self.alphabet.clone(),
            lattice.clone(),
            product_name(initial, &self.semantics.initial_value(lattice, initial)),
        );

        for state in self.states.values() {
            let final_value = self.semantics.final_value(lattice, state);
            for l in lattice.elements() {
                product.add_state(
                    product_name(&state.name, l),
                    lattice.meet(l, &final_value),
                )?;
            }
        }

        let mut needs_sink = false;
        for state in self.states.values() {
            for l in lattice.elements() {
                let source = product_name(&state.name, l);
                for sym in self.alphabet.universe() {
                    let target = match state.transition(sym) {
                        Some(t) => product_name(&t.target, &lattice.meet(l, &t.value)),
                        None => {
                            needs_sink = true;
                            SINK.to_string()
                        }
                    };
                    product.add_transition(&source, sym, target, top.clone())?;
                }
            }
        }

        if needs_sink {
            product.add_state(SINK, lattice.bottom().clone())?;
            for sym in self.alphabet.universe() {
                product.add_transition(SINK, sym, SINK, top.clone())?;
            }
        }

        debug!(
            "simplified automaton with {} states into product with {} states",
            self.size(),
            product.size()
        );
        Ok(product)
    }

    /// Removes all states that cannot be reached from the initial state.
    pub fn trim(&self) -> Result<Self, AutomatonError> {
        let initial = self.initial_state().ok_or(AutomatonError::NoInitialState)?;

        let mut reached = math::Set::default();
        reached.insert(initial);
        let mut queue = VecDeque::from([initial]);
        while let Some(current) = queue.pop_front() {
            for sym in self.alphabet.universe() {
                if let Some(t) = self.transition(current, sym) {
                    if self.states.contains_key(&t.target) && reached.insert(t.target.as_str()) {
                        queue.push_back(&t.target);
                    }
                }
            }
        }

        let states = self
            .states
            .iter()
            .filter(|(name, _)| reached.contains(name.as_str()))
            .map(|(name, state)| (name.clone(), state.clone()))
            .collect();
        Ok(Self {
            alphabet: self.alphabet.clone(),
            lattice: self.lattice.clone(),
            semantics: self.semantics.clone(),
            states,
        })
    }

    /// Decides whether `left` and `right` assign the same value to every word. If they do not,
    /// a shortest word on which they differ is returned.
    ///
    /// Both automata are simplified and trimmed, afterwards the pairs of states that are
    /// reachable by the same word are explored breadth-first. Each pair is visited once, so the
    /// search is bounded by the number of state pairs. Both automata are expected to share the
    /// alphabet of `left`.
    pub fn equivalent<T: Semantics<O>>(
        left: &Self,
        right: &LatticeAutomaton<O, T>,
    ) -> Result<Option<Word>, AutomatonError> {
        let start = std::time::Instant::now();
        let l = left.simplify()?.trim()?;
        let r = right.simplify()?.trim()?;

        let value = |aut: &LatticeAutomaton<O>, q: &str| {
            aut.states
                .get(q)
                .map(|state| state.value.clone())
                .ok_or_else(|| AutomatonError::UnknownState(q.to_string()))
        };
        let successor = |aut: &LatticeAutomaton<O>, q: &str, sym: char| {
            aut.transition(q, sym)
                .map(|t| t.target.clone())
                .ok_or_else(|| AutomatonError::InvalidSymbol(sym))
        };

        let l0 = l.initial_state().ok_or(AutomatonError::NoInitialState)?;
        let r0 = r.initial_state().ok_or(AutomatonError::NoInitialState)?;
        if value(&l, l0)? != value(&r, r0)? {
            return Ok(Some(vec![]));
        }

        let mut managed = math::Set::default();
        managed.insert((l0.to_string(), r0.to_string()));
        let mut queue = VecDeque::from([(l0.to_string(), r0.to_string(), vec![])]);

        while let Some((q, p, word)) = queue.pop_front() {
            for sym in left.alphabet.universe() {
                let q_next = successor(&l, &q, sym)?;
                let p_next = successor(&r, &p, sym)?;
                if managed.contains(&(q_next.clone(), p_next.clone())) {
                    continue;
                }

                let mut extended = word.clone();
                extended.push(sym);
                if value(&l, &q_next)? != value(&r, &p_next)? {
                    debug!(
                        "found distinguishing word {} after {} microseconds",
                        crate::alphabet::show_word(&extended),
                        start.elapsed().as_micros()
                    );
                    return Ok(Some(extended));
                }
                trace!("pairing {q_next} with {p_next}");
                managed.insert((q_next.clone(), p_next.clone()));
                queue.push_back((q_next, p_next, extended));
            }
        }

        debug!(
            "established equivalence in {} microseconds",
            start.elapsed().as_micros()
        );
        Ok(None)
    }

    /// Compares `self` against the function `expected` on all words of length at most
    /// `max_len`, in length-lexicographic order. Returns the first word on which they differ.
    pub fn equivalent_by_words<F>(
        alphabet: &CharAlphabet,
        expected: F,
        hypothesis: &Self,
        max_len: usize,
    ) -> Result<Option<Word>, AutomatonError>
    where
        F: Fn(&[char]) -> O::Element,
    {
        for word in alphabet.words_up_to(max_len) {
            if expected(&word) != hypothesis.run_word(&word)? {
                trace!(
                    "hypothesis disagrees on {}",
                    crate::alphabet::show_word(&word)
                );
                return Ok(Some(word));
            }
        }
        Ok(None)
    }

    /// Compares `self` against the function `expected` on `samples` random words whose length
    /// is drawn uniformly from `1..=max_len`. Returns the first word on which they differ.
    #[cfg(feature = "random")]
    pub fn random_equivalent<F>(
        alphabet: &CharAlphabet,
        expected: F,
        hypothesis: &Self,
        samples: usize,
        max_len: usize,
        rng: &mut fastrand::Rng,
    ) -> Result<Option<Word>, AutomatonError>
    where
        F: Fn(&[char]) -> O::Element,
    {
        if alphabet.is_empty() || max_len == 0 {
            return Ok(None);
        }
        for _ in 0..samples {
            let len = rng.usize(1..=max_len);
            let word: Word = (0..len)
                .map(|_| alphabet[rng.usize(..alphabet.size())])
                .collect();
            if expected(&word) != hypothesis.run_word(&word)? {
                return Ok(Some(word));
            }
        }
        Ok(None)
    }
}
