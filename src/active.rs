use crate::{
    alphabet::Word,
    automaton::{AutomatonError, LatticeAutomaton},
    lattice::LatticeOps,
};

mod oracle;
pub use oracle::*;

mod lattice_table;
pub use lattice_table::{LatticeTable, INITIAL_STATE};

mod value_table;
pub use value_table::ValueTable;

mod learner;
pub use learner::{HypothesisChange, Learner, LearnerConfig, LearningResult, Status};

/// The part of an observation table that the learning loop relies on. A table collects the
/// answers to membership queries, can be closed by adding rows and turns its current content
/// into a hypothesis.
pub trait ObservationTable<O: LatticeOps> {
    /// Grows the table until it is closed, i.e. until a hypothesis with a total transition
    /// function can be read off. Returns true if anything was added.
    fn close(&mut self) -> bool;

    /// Builds the hypothesis for the current content. The table should be closed before.
    fn hypothesis(&self) -> Result<LatticeAutomaton<O>, AutomatonError>;

    /// Incorporates a counterexample, returns true if the table changed.
    fn add_counterexample(&mut self, word: &[char]) -> bool;

    /// Number of distinct words for which a membership query was posed.
    fn query_count(&self) -> usize;

    /// The number of rows and columns.
    fn size(&self) -> (usize, usize);

    /// All words that were queried so far together with their value, in the order in which
    /// they were queried.
    fn queries(&self) -> Vec<(Word, O::Element)>;

    /// Compares every queried word against `automaton` and returns the first one, in query
    /// order, on which they disagree.
    fn check_consistency(
        &self,
        automaton: &LatticeAutomaton<O>,
    ) -> Result<Option<Word>, AutomatonError> {
        for (word, value) in self.queries() {
            if automaton.run_word(&word)? != value {
                return Ok(Some(word));
            }
        }
        Ok(None)
    }
}

/// Concatenates two words.
pub(crate) fn concat(left: &[char], right: &[char]) -> Word {
    let mut out = Vec::with_capacity(left.len() + right.len());
    out.extend_from_slice(left);
    out.extend_from_slice(right);
    out
}
