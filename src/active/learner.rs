use tracing::{debug, info, trace, warn};

use crate::{
    alphabet::{show_word, CharAlphabet},
    automaton::{AutomatonError, LatticeAutomaton},
    lattice::{Lattice, LatticeOps},
};

use super::{EquivalenceOracle, LatticeTable, MembershipOracle, ObservationTable, ValueTable};

const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Settings of a learning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnerConfig {
    /// Number of hypotheses that are built and checked before giving up.
    pub max_iterations: usize,
    /// Whether closing a [`LatticeTable`] also resolves conflicts between rows and their
    /// prefixes, see [`LatticeTable::resolve_conflict`]. Has no effect on a [`ValueTable`].
    pub resolve_conflicts: bool,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            resolve_conflicts: false,
        }
    }
}

impl LearnerConfig {
    /// The default configuration, where the environment variables `MAX_ITERATIONS` and
    /// `RESOLVE_CONFLICTS` take precedence if they are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup("MAX_ITERATIONS") {
            match value.trim().parse() {
                Ok(n) => config.max_iterations = n,
                Err(_) => warn!(
                    "ignoring MAX_ITERATIONS={value}, using {}",
                    config.max_iterations
                ),
            }
        }
        if let Some(value) = lookup("RESOLVE_CONFLICTS") {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.resolve_conflicts = true,
                "0" | "false" | "no" | "off" => config.resolve_conflicts = false,
                _ => warn!(
                    "ignoring RESOLVE_CONFLICTS={value}, using {}",
                    config.resolve_conflicts
                ),
            }
        }
        config
    }
}

/// Where a learning run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Running,
    /// The equivalence oracle accepted the last hypothesis.
    Converged,
    /// No hypothesis was accepted, either because the iteration bound was hit or because a
    /// counterexample did not change the table.
    Exhausted,
}

/// Classifies how a hypothesis differs from the one of the previous iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HypothesisChange {
    /// There is no previous hypothesis.
    Initial,
    /// The hypothesis has more states.
    NewState,
    /// The states are named differently, i.e. some class got a new representative.
    RepresentativeChanged,
    /// Some transition leads to a different state.
    EquivalenceChanged,
    /// Nothing but the values changed.
    TransitionValueChanged,
}

impl HypothesisChange {
    pub fn between<O: LatticeOps>(
        previous: Option<&LatticeAutomaton<O>>,
        current: &LatticeAutomaton<O>,
    ) -> Self {
        let Some(previous) = previous else {
            return Self::Initial;
        };
        if previous.size() < current.size() {
            return Self::NewState;
        }
        if !previous.state_names().eq(current.state_names()) {
            return Self::RepresentativeChanged;
        }
        let redirected = previous.state_names().any(|q| {
            previous.alphabet().universe().any(|sym| {
                previous.transition(q, sym).map(|t| &t.target)
                    != current.transition(q, sym).map(|t| &t.target)
            })
        });
        if redirected {
            Self::EquivalenceChanged
        } else {
            Self::TransitionValueChanged
        }
    }
}

/// Everything that is known about a finished learning run.
#[derive(Debug, Clone)]
pub struct LearningResult<O: LatticeOps> {
    /// The last hypothesis. Only guaranteed to be correct if the run converged.
    pub automaton: LatticeAutomaton<O>,
    pub status: Status,
    /// Number of hypotheses that were built and submitted.
    pub iterations: usize,
    pub equivalence_queries: usize,
    /// Number of distinct words that were submitted to the membership oracle.
    pub membership_queries: usize,
    /// Size of the hypothesis in every iteration.
    pub state_counts: Vec<usize>,
    /// How each hypothesis differs from its predecessor.
    pub changes: Vec<HypothesisChange>,
}

impl<O: LatticeOps> LearningResult<O> {
    pub fn converged(&self) -> bool {
        self.status == Status::Converged
    }
}

/// Drives an [`ObservationTable`]: the table is closed, a hypothesis is built and submitted
/// to the equivalence oracle, and a counterexample is fed back into the table. This repeats
/// until the oracle accepts a hypothesis, the iteration bound is reached or a counterexample
/// leaves the table unchanged.
pub struct Learner<O: LatticeOps, T, E> {
    table: T,
    equivalence: E,
    config: LearnerConfig,
    status: Status,
    iterations: usize,
    equivalence_queries: usize,
    state_counts: Vec<usize>,
    changes: Vec<HypothesisChange>,
    hypothesis: Option<LatticeAutomaton<O>>,
}

impl<O, M, E> Learner<O, LatticeTable<O, M>, E>
where
    O: LatticeOps,
    M: MembershipOracle<O>,
    E: EquivalenceOracle<O>,
{
    /// A learner that uses a [`LatticeTable`], i.e. the FOL* algorithm.
    pub fn folstar(
        alphabet: CharAlphabet,
        lattice: Lattice<O>,
        membership: M,
        equivalence: E,
        config: LearnerConfig,
    ) -> Self {
        let table = LatticeTable::new(alphabet, lattice, membership)
            .with_conflict_resolution(config.resolve_conflicts);
        Self::new(table, equivalence, config)
    }
}

impl<O, M, E> Learner<O, ValueTable<O, M>, E>
where
    O: LatticeOps,
    M: MembershipOracle<O>,
    E: EquivalenceOracle<O>,
{
    /// A learner that uses a [`ValueTable`], i.e. plain L* on lattice values.
    pub fn lstar(
        alphabet: CharAlphabet,
        lattice: Lattice<O>,
        membership: M,
        equivalence: E,
        config: LearnerConfig,
    ) -> Self {
        Self::new(
            ValueTable::new(alphabet, lattice, membership),
            equivalence,
            config,
        )
    }
}

impl<O, T, E> Learner<O, T, E>
where
    O: LatticeOps,
    T: ObservationTable<O>,
    E: EquivalenceOracle<O>,
{
    pub fn new(table: T, equivalence: E, config: LearnerConfig) -> Self {
        Self {
            table,
            equivalence,
            config,
            status: Status::Running,
            iterations: 0,
            equivalence_queries: 0,
            state_counts: vec![],
            changes: vec![],
            hypothesis: None,
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The most recent hypothesis, if one was built yet.
    pub fn hypothesis(&self) -> Option<&LatticeAutomaton<O>> {
        self.hypothesis.as_ref()
    }

    /// Performs one iteration. Once the run converged or is exhausted, this does nothing
    /// and returns the final status.
    pub fn step(&mut self) -> Result<Status, AutomatonError> {
        if self.status != Status::Running {
            return Ok(self.status);
        }
        if self.iterations >= self.config.max_iterations {
            warn!(
                "no hypothesis was accepted within {} iterations",
                self.config.max_iterations
            );
            self.status = Status::Exhausted;
            return Ok(self.status);
        }
        self.iterations += 1;

        self.table.close();
        let hypothesis = self.table.hypothesis()?;
        trace!(
            "Iteration {} produced hypothesis\n{hypothesis}",
            self.iterations
        );
        self.state_counts.push(hypothesis.size());
        self.changes
            .push(HypothesisChange::between(self.hypothesis.as_ref(), &hypothesis));

        if cfg!(debug_assertions) {
            if let Some(word) = self.table.check_consistency(&hypothesis)? {
                debug!("hypothesis disagrees with observation on {}", show_word(&word));
            }
        }

        self.equivalence_queries += 1;
        match self.equivalence.counterexample(&hypothesis)? {
            None => {
                info!(
                    "hypothesis with {} states accepted in iteration {}",
                    hypothesis.size(),
                    self.iterations
                );
                self.status = Status::Converged;
            }
            Some(counterexample) => {
                debug!("received counterexample {}", show_word(&counterexample));
                if !self.table.add_counterexample(&counterexample) {
                    // the table is unchanged, so the next hypothesis would be the same
                    warn!(
                        "counterexample {} does not add anything to the table, giving up after {} iterations",
                        show_word(&counterexample),
                        self.iterations
                    );
                    self.status = Status::Exhausted;
                }
            }
        }

        self.hypothesis = Some(hypothesis);
        Ok(self.status)
    }

    /// Iterates until the run converged or the iteration bound is reached. If not a single
    /// iteration was allowed, the hypothesis of the closed initial table is returned.
    pub fn run(mut self) -> Result<LearningResult<O>, AutomatonError> {
        let start = std::time::Instant::now();
        while self.step()? == Status::Running {}

        let automaton = match self.hypothesis.take() {
            Some(hypothesis) => hypothesis,
            None => {
                self.table.close();
                self.table.hypothesis()?
            }
        };

        let duration = start.elapsed().as_millis();
        info!(
            "Learning took {duration}ms, {:?} after {} iterations",
            self.status, self.iterations
        );

        Ok(LearningResult {
            automaton,
            status: self.status,
            iterations: self.iterations,
            equivalence_queries: self.equivalence_queries,
            membership_queries: self.table.query_count(),
            state_counts: self.state_counts,
            changes: self.changes,
        })
    }
}
