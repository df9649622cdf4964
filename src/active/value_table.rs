use std::{cell::RefCell, fmt::Display};

use itertools::Itertools;
use tabled::builder::Builder;
use tracing::{debug, trace};

use crate::{
    alphabet::{show_word, CharAlphabet, Word},
    automaton::{AutomatonError, LatticeAutomaton},
    lattice::{Lattice, LatticeOps},
    math, Show,
};

use super::{concat, MembershipOracle, ObservationTable, INITIAL_STATE};

/// Observation table of the classic L* algorithm, applied to lattice values. Two rows are
/// equivalent iff they hold exactly the same values, no lattice structure is used.
///
/// The hypothesis is a Moore machine in disguise: every transition carries ⊤ and the value of
/// a state is the value of its access word.
pub struct ValueTable<O: LatticeOps, M> {
    // the alphabet of what we are learning
    alphabet: CharAlphabet,
    lattice: Lattice<O>,
    // a mapping containing all queries that have been posed so far, together with their output
    queries: RefCell<math::OrderedMap<Word, O::Element>>,
    // the minimal access words forming the base states
    base: Vec<Word>,
    // all known experiments, starting with ε and every symbol
    experiments: Vec<Word>,
    // mapping from a word to its row, where the i-th entry gives the value for
    // the output of concatenating the word and the i-th experiment
    table: math::Map<Word, Vec<O::Element>>,
    // the oracle
    oracle: M,
}

impl<O: LatticeOps, M: MembershipOracle<O>> ValueTable<O, M> {
    pub fn new(alphabet: CharAlphabet, lattice: Lattice<O>, oracle: M) -> Self {
        let experiments = std::iter::once(vec![])
            .chain(alphabet.universe().map(|sym| vec![sym]))
            .collect();
        let mut table = Self {
            alphabet,
            lattice,
            queries: RefCell::new(math::OrderedMap::default()),
            base: vec![vec![]],
            experiments,
            table: math::Map::default(),
            oracle,
        };
        table.update_table();
        table
    }

    /// The access words of the states, in the order in which they were found.
    pub fn base(&self) -> &[Word] {
        &self.base
    }

    pub fn experiments(&self) -> &[Word] {
        &self.experiments
    }

    /// The row of `word`, if it is a base word or a one-symbol extension of one.
    pub fn row(&self, word: &[char]) -> Option<&[O::Element]> {
        self.table.get(word).map(|row| row.as_slice())
    }

    fn output(&self, w: &[char]) -> O::Element {
        if let Some(value) = self.queries.borrow().get(w) {
            return value.clone();
        }
        let value = self.oracle.output(w);
        trace!("{} maps to {}", show_word(w), value.show());
        self.queries.borrow_mut().insert(w.to_vec(), value.clone());
        value
    }

    fn one_letter_extensions(&self) -> impl Iterator<Item = Word> + '_ {
        self.base
            .iter()
            .flat_map(|w| {
                std::iter::once(w.clone())
                    .chain(self.alphabet.universe().map(|a| concat(w, &[a])))
            })
            .unique()
    }

    fn update_table(&mut self) {
        let experiment_count = self.experiments.len();
        let mut updates = vec![];

        for mr in self.one_letter_extensions() {
            let stored = self.table.get(&mr).map(|r| r.len()).unwrap_or(0);
            for e in &self.experiments[stored..] {
                updates.push((mr.clone(), self.output(&concat(&mr, e))));
            }
        }

        for (mr, output) in updates {
            self.table.entry(mr).or_default().push(output);
        }

        if cfg!(debug_assertions) {
            for mr in self.one_letter_extensions() {
                let stored = self.table.get(&mr).map(|r| r.len());
                assert_eq!(
                    stored,
                    Some(experiment_count),
                    "row for {} is incomplete",
                    show_word(&mr)
                );
            }
        }
    }

    fn row_of(&self, word: &[char]) -> &Vec<O::Element> {
        self.table
            .get(word)
            .expect("rows of base words and their extensions are kept up to date")
    }

    /// Extensions whose row differs from every base row, at most one per distinct row.
    fn rows_to_promote(&self) -> Vec<Word> {
        let known: math::Set<_> = self.base.iter().map(|b| self.row_of(b)).collect();
        let mut seen = math::Set::default();
        let mut out = vec![];

        for word in self.one_letter_extensions() {
            let row = self.row_of(&word);
            if !known.contains(row) && seen.insert(row) {
                trace!("promoting {}", show_word(&word));
                out.push(word);
            }
        }
        out
    }
}

impl<O: LatticeOps, M: MembershipOracle<O>> ObservationTable<O> for ValueTable<O, M> {
    /// Promotes extensions with new rows to base words until every extension has the row
    /// of some base word.
    fn close(&mut self) -> bool {
        let start = std::time::Instant::now();
        let mut changed = false;
        loop {
            let todo = self.rows_to_promote();
            if todo.is_empty() {
                break;
            }
            changed = true;
            self.base.extend(todo);
            self.update_table();
        }
        debug!(
            "Closing table took {} microseconds",
            start.elapsed().as_micros()
        );
        changed
    }

    fn hypothesis(&self) -> Result<LatticeAutomaton<O>, AutomatonError> {
        let start = std::time::Instant::now();
        let name = |w: &[char]| match w {
            [] => INITIAL_STATE.to_string(),
            w => show_word(w),
        };
        let observations: math::Map<_, _> =
            self.base.iter().map(|mr| (self.row_of(mr), mr)).collect();

        let mut automaton =
            LatticeAutomaton::new(self.alphabet.clone(), self.lattice.clone(), INITIAL_STATE);
        for mr in &self.base {
            automaton.add_state(name(mr), self.row_of(mr)[0].clone())?;
        }
        for mr in &self.base {
            for a in self.alphabet.universe() {
                let ext = concat(mr, &[a]);
                let target = self
                    .table
                    .get(&ext)
                    .and_then(|row| observations.get(row))
                    .ok_or_else(|| AutomatonError::MissingTransition(name(mr), a))?;
                automaton.add_transition(&name(mr), a, name(target), self.lattice.top().clone())?;
            }
        }

        let duration = start.elapsed().as_micros();
        debug!("Building hypothesis took {duration} microseconds");
        Ok(automaton)
    }

    /// Adds every non-empty suffix of `word` as an experiment.
    fn add_counterexample(&mut self, word: &[char]) -> bool {
        let mut added = false;
        for i in 0..word.len() {
            let suffix = word[i..].to_vec();
            if !self.experiments.contains(&suffix) {
                trace!("Adding experiment {}", show_word(&suffix));
                self.experiments.push(suffix);
                added = true;
            }
        }
        if added {
            self.update_table();
        }
        added
    }

    fn query_count(&self) -> usize {
        self.queries.borrow().len()
    }

    fn size(&self) -> (usize, usize) {
        (self.table.len(), self.experiments.len())
    }

    fn queries(&self) -> Vec<(Word, O::Element)> {
        self.queries
            .borrow()
            .iter()
            .map(|(w, v)| (w.clone(), v.clone()))
            .collect()
    }
}

impl<O: LatticeOps, M: MembershipOracle<O>> Display for ValueTable<O, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = Builder::default();
        let mut header = vec!["MR".to_string()];
        header.extend(self.experiments.iter().map(|e| show_word(e)));
        builder.push_record(header);

        for mr in &self.base {
            let mut row = vec![show_word(mr)];
            row.extend(self.row_of(mr).iter().map(|value| value.show()));
            builder.push_record(row);
        }

        write!(f, "{}", builder.build())
    }
}

#[cfg(test)]
mod tests {
    use crate::{automaton::tests::two_state_target, prelude::*};

    #[test]
    fn initial_rows_and_columns() {
        let target = two_state_target();
        let table = ValueTable::new(
            target.alphabet().clone(),
            target.lattice().clone(),
            AutomatonOracle::new(target.clone()),
        );
        assert_eq!(table.base(), &[Vec::<char>::new()]);
        assert_eq!(table.experiments(), &[vec![], vec!['a'], vec!['b']]);
        // ε, a and b, each with three columns
        assert_eq!(table.size(), (3, 3));
        assert_eq!(table.row(&['b']), Some([1, 1, 0].as_slice()));
        assert_eq!(table.query_count(), 7);
    }

    #[test_log::test]
    fn closes_and_builds_moore_hypothesis() {
        let target = two_state_target();
        let mut table = ValueTable::new(
            target.alphabet().clone(),
            target.lattice().clone(),
            AutomatonOracle::new(target.clone()),
        );
        assert!(table.close());
        assert!(!table.close());
        // one state per combination of target state and accumulated value
        assert_eq!(
            table.base(),
            &[vec![], vec!['b'], vec!['b', 'a'], vec!['b', 'b']]
        );

        let hypothesis = table.hypothesis().unwrap();
        assert_eq!(hypothesis.size(), 4);
        assert!(hypothesis
            .states()
            .flat_map(|q| ['a', 'b'].map(|sym| q.transition(sym).unwrap().value))
            .all(|value| value == 2));
        assert_eq!(table.check_consistency(&hypothesis), Ok(None));
        assert_eq!(LatticeAutomaton::equivalent(&target, &hypothesis), Ok(None));
    }

    #[test]
    fn counterexample_adds_experiments() {
        let target = two_state_target();
        let mut table = ValueTable::new(
            target.alphabet().clone(),
            target.lattice().clone(),
            |w: &[char]| target.run_word(w).unwrap(),
        );
        assert!(table.add_counterexample(&['a', 'b']));
        assert_eq!(table.experiments().len(), 4);
        assert!(!table.add_counterexample(&['b']));
        assert_eq!(table.row(&[]).map(|row| row.len()), Some(4));
        assert!(table.to_string().contains("MR"));
    }
}
