use std::fmt::Display;

use bit_set::BitSet;
use itertools::Itertools;
use owo_colors::OwoColorize;
use tabled::builder::Builder;
use tracing::{debug, trace, warn};

use crate::{
    alphabet::{show_word, CharAlphabet, Word},
    automaton::{AutomatonError, LatticeAutomaton},
    lattice::{Lattice, LatticeOps},
    math::{self, Partition},
    Show,
};

use super::{concat, MembershipOracle, ObservationTable};

/// Name of the state of a hypothesis that corresponds to the empty word.
pub const INITIAL_STATE: &str = "ε";

/// Observation table of the FOL* algorithm.
///
/// Rows are labeled with access words (the set S, starting with ε) and columns with
/// experiments (the set E, starting with ε and every symbol). The cell for row `s` and column
/// `e` holds the value of the word `s·e`. Cells are never compared directly. Instead, for every
/// lattice element `l` the table keeps a boolean view that records whether a cell is at least
/// `l`. Every level partitions the rows by their boolean pattern, and the states of a hypothesis
/// are the classes of the coarsest partition that refines all levels, see
/// [`Self::equivalence_partition`].
///
/// The table only ever grows. Every word is queried at most once, the answers are memoized in
/// the order they were obtained.
pub struct LatticeTable<O: LatticeOps, M> {
    alphabet: CharAlphabet,
    lattice: Lattice<O>,
    oracle: M,
    // access words, ε is always the first row
    rows: Vec<Word>,
    row_index: math::Map<Word, usize>,
    // experiments, ε is always the first column
    columns: Vec<Word>,
    column_set: math::Set<Word>,
    // all membership queries with their answer, in the order in which they were posed
    queries: math::OrderedMap<Word, O::Element>,
    // for every lattice element l and every queried word w, whether l <= T[w]
    levels: math::Map<O::Element, math::Map<Word, bool>>,
    resolve_conflicts: bool,
}

impl<O: LatticeOps, M: MembershipOracle<O>> LatticeTable<O, M> {
    /// Creates a table with the single row ε and the columns ε and every symbol of the
    /// alphabet. The cells are filled right away.
    pub fn new(alphabet: CharAlphabet, lattice: Lattice<O>, oracle: M) -> Self {
        let levels = lattice
            .elements()
            .iter()
            .map(|l| (l.clone(), math::Map::default()))
            .collect();
        let mut table = Self {
            alphabet,
            lattice,
            oracle,
            rows: vec![],
            row_index: math::Map::default(),
            columns: vec![],
            column_set: math::Set::default(),
            queries: math::OrderedMap::default(),
            levels,
            resolve_conflicts: false,
        };

        table.add_row(vec![]);
        table.add_column(vec![]);
        let symbols: Vec<_> = table.alphabet.universe().collect();
        for sym in symbols {
            table.add_column(vec![sym]);
        }
        table
    }

    /// Enables or disables the resolution of potential conflicts as part of [`Self::close`].
    pub fn with_conflict_resolution(mut self, resolve_conflicts: bool) -> Self {
        self.resolve_conflicts = resolve_conflicts;
        self
    }

    pub fn alphabet(&self) -> &CharAlphabet {
        &self.alphabet
    }

    pub fn lattice(&self) -> &Lattice<O> {
        &self.lattice
    }

    /// The access words, in the order in which they were added.
    pub fn rows(&self) -> &[Word] {
        &self.rows
    }

    /// The experiments, in the order in which they were added.
    pub fn columns(&self) -> &[Word] {
        &self.columns
    }

    /// Position of `row` in [`Self::rows`].
    pub fn row_index(&self, row: &[char]) -> Option<usize> {
        self.row_index.get(row).copied()
    }

    fn query(&mut self, word: Word) {
        if self.queries.contains_key(&word) {
            return;
        }
        let value = self.oracle.output(&word);
        if !self.lattice.contains(&value) {
            warn!(
                "oracle answered {} with {}, which is not an element of the lattice",
                show_word(&word),
                value.show()
            );
        }
        trace!("{} maps to {}", show_word(&word), value.show());

        for (l, level) in self.levels.iter_mut() {
            level.insert(word.clone(), self.lattice.leq(l, &value));
        }
        self.queries.insert(word, value);
    }

    /// Adds `row` together with all its cells. Returns false if the row existed before.
    pub fn add_row(&mut self, row: Word) -> bool {
        if self.row_index.contains_key(&row) {
            return false;
        }
        for e in &self.columns.clone() {
            self.query(concat(&row, e));
        }
        trace!("adding row {}", show_word(&row));
        self.row_index.insert(row.clone(), self.rows.len());
        self.rows.push(row);
        true
    }

    /// Adds `column` together with all its cells. Returns false if the column existed before.
    pub fn add_column(&mut self, column: Word) -> bool {
        if !self.column_set.insert(column.clone()) {
            return false;
        }
        for s in &self.rows.clone() {
            self.query(concat(s, &column));
        }
        trace!("adding column {}", show_word(&column));
        self.columns.push(column);
        true
    }

    /// The value of the cell for `row` and `column`, if it was queried.
    pub fn value(&self, row: &[char], column: &[char]) -> Option<&O::Element> {
        self.queries.get(&concat(row, column))
    }

    /// Whether the cell for `row` and `column` is at least `l`. Cells that were not queried
    /// are treated as being below every level.
    pub fn level(&self, l: &O::Element, row: &[char], column: &[char]) -> bool {
        self.levels
            .get(l)
            .and_then(|level| level.get(&concat(row, column)))
            .copied()
            .unwrap_or(false)
    }

    fn cell(&self, row: &[char], column: &[char]) -> &O::Element {
        self.value(row, column)
            .expect("every cell of a row is queried when the row or column is added")
    }

    /// The boolean pattern of `row` at level `l`, bit `i` is set iff the cell in the `i`-th
    /// column is at least `l`.
    pub fn level_row(&self, l: &O::Element, row: &[char]) -> BitSet {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, e)| self.level(l, row, e))
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns true if every cell of `row` lies below `l`. Such a row does not take part in
    /// the partition for level `l`.
    pub fn zero_line(&self, row: &[char], l: &O::Element) -> bool {
        self.level_row(l, row).is_empty()
    }

    /// Returns true if both rows have the same pattern at level `l`.
    pub fn equivalent_rows(&self, left: &[char], right: &[char], l: &O::Element) -> bool {
        self.level_row(l, left) == self.level_row(l, right)
    }

    /// Groups all rows that are not a zero line at level `l` by their pattern. The classes
    /// contain row indices and are ordered by their smallest element.
    pub fn equivalence_classes_in_l(&self, l: &O::Element) -> Partition<usize> {
        let mut classes: math::OrderedMap<BitSet, Vec<usize>> = math::OrderedMap::default();
        for (i, row) in self.rows.iter().enumerate() {
            let pattern = self.level_row(l, row);
            if pattern.is_empty() {
                continue;
            }
            classes.entry(pattern).or_default().push(i);
        }
        Partition::new(classes.into_values())
    }

    /// Combines the partitions of all levels into the coarsest partition of all rows that
    /// refines each of them. Levels on which every row is a zero line do not constrain the
    /// result.
    pub fn equivalence_partition(&self) -> Partition<usize> {
        let partitions: Vec<_> = self
            .lattice
            .elements()
            .iter()
            .map(|l| self.equivalence_classes_in_l(l))
            .filter(|partition| partition.size() > 0)
            .collect();
        Partition::find_minimal_partition(0..self.rows.len(), &partitions)
    }

    /// The column in which `row` reaches its largest value. Starting from ε, a column is
    /// picked whenever its cell lies strictly above the current pick.
    pub fn max_e(&self, row: &[char]) -> &Word {
        let mut best = &self.columns[0];
        let mut best_value = self.cell(row, best);
        for e in &self.columns {
            let value = self.cell(row, e);
            if self.lattice.lt(best_value, value) {
                best = e;
                best_value = value;
            }
        }
        best
    }

    /// The value of `row` in the column given by [`Self::max_e`].
    pub fn row_potential(&self, row: &[char]) -> O::Element {
        self.cell(row, self.max_e(row)).clone()
    }

    /// Returns true if every one-symbol extension of `row` is a row.
    pub fn row_closed(&self, row: &[char]) -> bool {
        self.alphabet
            .universe()
            .all(|sym| self.row_index.contains_key(&concat(row, &[sym])))
    }

    /// Maps every row index to the index of the representative of its class in
    /// [`Self::equivalence_partition`].
    ///
    /// ε always represents its own class. In every other class, the members are visited in
    /// row order starting from the first one, and a member replaces the current pick if its
    /// potential is strictly larger, or if it is equally large and the member is closed or a
    /// prefix of the pick.
    pub fn representative_states(&self) -> Vec<usize> {
        let mut representatives = vec![0; self.rows.len()];
        let potentials: Vec<_> = self.rows.iter().map(|s| self.row_potential(s)).collect();

        for class in self.equivalence_partition().iter() {
            let rep = if class.contains(&0) {
                0
            } else {
                let mut members = class.iter().copied();
                let Some(mut rep) = members.next() else {
                    continue;
                };
                for s in members {
                    let (current, candidate) = (&potentials[rep], &potentials[s]);
                    if self.lattice.lt(current, candidate)
                        || (current == candidate
                            && (self.row_closed(&self.rows[s])
                                || self.rows[rep].starts_with(&self.rows[s])))
                    {
                        rep = s;
                    }
                }
                rep
            };
            for s in class {
                representatives[*s] = rep;
            }
        }
        representatives
    }

    /// The distinct representatives, in row order.
    fn states(representatives: &[usize]) -> Vec<usize> {
        representatives.iter().copied().sorted().dedup().collect()
    }

    /// Adds the one-symbol extensions of all representatives until that adds nothing new.
    fn close_rows(&mut self) -> bool {
        let mut changed = false;
        loop {
            let representatives = self.representative_states();
            let missing: Vec<_> = Self::states(&representatives)
                .into_iter()
                .flat_map(|q| {
                    let row = &self.rows[q];
                    self.alphabet.universe().map(move |sym| concat(row, &[sym]))
                })
                .filter(|ext| !self.row_index.contains_key(ext))
                .collect();
            if missing.is_empty() {
                return changed;
            }
            for ext in missing {
                changed |= self.add_row(ext);
            }
        }
    }

    /// Looks for a row `s2` that extends another row `s1` but has a strictly larger
    /// potential. For the first such pair for which it is new, the part of `s2·max_e(s2)`
    /// beyond `s1` is added as a column. Returns true if a column was added.
    pub fn resolve_conflict(&mut self) -> bool {
        let potentials: Vec<_> = self.rows.iter().map(|s| self.row_potential(s)).collect();
        let mut conflict = None;
        'search: for (i, s1) in self.rows.iter().enumerate() {
            for (j, s2) in self.rows.iter().enumerate() {
                if i == j || !s2.starts_with(s1) || !self.lattice.lt(&potentials[i], &potentials[j])
                {
                    continue;
                }
                let suffix = concat(&s2[s1.len()..], self.max_e(s2));
                if !self.column_set.contains(&suffix) {
                    debug!(
                        "row {} has larger potential than its prefix {}",
                        show_word(s2),
                        show_word(s1)
                    );
                    conflict = Some(suffix);
                    break 'search;
                }
            }
        }
        match conflict {
            Some(suffix) => self.add_column(suffix),
            None => false,
        }
    }

    /// Closes the table. Without conflict resolution this adds the one-symbol extensions of
    /// all representatives until nothing changes. With conflict resolution enabled, closing
    /// and [`Self::resolve_conflict`] alternate until neither changes the table.
    pub fn close(&mut self) -> bool {
        let start = std::time::Instant::now();
        let mut changed = self.close_rows();
        while self.resolve_conflicts && self.resolve_conflict() {
            changed = true;
            self.close_rows();
        }
        debug!(
            "Closing table took {} microseconds, now have {} rows and {} columns",
            start.elapsed().as_micros(),
            self.rows.len(),
            self.columns.len()
        );
        changed
    }

    /// Picks the target of the transition from `state` on `sym`. Among all rows represented by
    /// `state` whose extension by `sym` is a row, the extension with strictly largest potential
    /// wins, starting with `state·sym` itself. Returns the potential and the representative of
    /// the winner.
    pub fn find_next_state(
        &self,
        state: usize,
        sym: char,
        representatives: &[usize],
    ) -> Option<(O::Element, usize)> {
        let own = self.row_index(&concat(&self.rows[state], &[sym]))?;
        let mut best = (self.row_potential(&self.rows[own]), representatives[own]);

        for (s, rep) in representatives.iter().enumerate() {
            if *rep != state {
                continue;
            }
            let Some(ext) = self.row_index(&concat(&self.rows[s], &[sym])) else {
                continue;
            };
            let potential = self.row_potential(&self.rows[ext]);
            if self.lattice.lt(&best.0, &potential) {
                best = (potential, representatives[ext]);
            }
        }
        Some(best)
    }

    /// The name of the hypothesis state for a representative row.
    pub fn state_name(&self, row: usize) -> String {
        match self.rows[row].as_slice() {
            [] => INITIAL_STATE.to_string(),
            word => show_word(word),
        }
    }

    /// Builds the hypothesis from the current representatives. The value of a state is the
    /// largest level at which its ε-cell is set, transitions are chosen by
    /// [`Self::find_next_state`]. Fails with [`AutomatonError::MissingTransition`] if the table
    /// is not closed.
    pub fn create_automaton(&self) -> Result<LatticeAutomaton<O>, AutomatonError> {
        let start = std::time::Instant::now();
        let representatives = self.representative_states();
        let states = Self::states(&representatives);

        let mut automaton =
            LatticeAutomaton::new(self.alphabet.clone(), self.lattice.clone(), INITIAL_STATE);
        for q in &states {
            let row = &self.rows[*q];
            let value = self.lattice.find_max_lattice(|l| self.level(l, row, &[]));
            automaton.add_state(self.state_name(*q), value)?;
        }
        for q in &states {
            let name = self.state_name(*q);
            for sym in self.alphabet.universe() {
                let (value, target) = self
                    .find_next_state(*q, sym, &representatives)
                    .ok_or_else(|| AutomatonError::MissingTransition(name.clone(), sym))?;
                automaton.add_transition(&name, sym, self.state_name(target), value)?;
            }
        }

        debug!(
            "Building hypothesis took {} microseconds",
            start.elapsed().as_micros()
        );
        Ok(automaton)
    }
}

impl<O: LatticeOps, M: MembershipOracle<O>> ObservationTable<O> for LatticeTable<O, M> {
    fn close(&mut self) -> bool {
        LatticeTable::close(self)
    }

    fn hypothesis(&self) -> Result<LatticeAutomaton<O>, AutomatonError> {
        self.create_automaton()
    }

    /// Adds every non-empty suffix of `word` as a column.
    fn add_counterexample(&mut self, word: &[char]) -> bool {
        let mut added = false;
        for i in 0..word.len() {
            added |= self.add_column(word[i..].to_vec());
        }
        added
    }

    fn query_count(&self) -> usize {
        self.queries.len()
    }

    fn size(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    fn queries(&self) -> Vec<(Word, O::Element)> {
        self.queries
            .iter()
            .map(|(w, v)| (w.clone(), v.clone()))
            .collect()
    }
}

/// Prints the table, representatives are marked with `*`, every other row names the
/// representative of its class.
impl<O: LatticeOps, M: MembershipOracle<O>> Display for LatticeTable<O, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let representatives = self.representative_states();
        let mut builder = Builder::default();

        let mut header = vec![String::new(), String::new()];
        header.extend(self.columns.iter().map(|e| show_word(e)));
        builder.push_record(header);

        for (i, row) in self.rows.iter().enumerate() {
            let mut record = if representatives[i] == i {
                vec!["*".to_string(), show_word(row).green().to_string()]
            } else {
                vec![
                    format!("[{}]", show_word(&self.rows[representatives[i]])),
                    show_word(row),
                ]
            };
            record.extend(self.columns.iter().map(|e| self.cell(row, e).show()));
            builder.push_record(record);
        }

        write!(f, "{}", builder.build())
    }
}
