//! Active learning of lattice automata.
//!
//! A lattice automaton (LDFA) is a deterministic automaton whose states and transitions carry
//! values from a finite lattice instead of a simple accept/reject bit. Running a word through
//! such an automaton takes the meet of all transition values along the unique path and the
//! value of the state that is reached, see [`automaton::LatticeAutomaton::run_word`]. This
//! generalizes regular languages to multi-valued languages, where every word is mapped to a
//! lattice element.
//!
//! The crate implements an L*-style learner for these languages. Given a
//! [`active::MembershipOracle`] that returns the lattice value of any word and an
//! [`active::EquivalenceOracle`] that compares a hypothesis against an unknown target, the
//! [`active::Learner`] alternates between closing an observation table, building a hypothesis
//! and processing counterexamples until the oracle accepts the hypothesis or an iteration bound
//! is reached.
//!
//! The central piece is the [`active::LatticeTable`]. Rows are compared not on their raw lattice
//! values but level by level: for every lattice element `l` the table derives a boolean view that
//! records whether a cell is at least `l`. Each level induces a partition of the rows and the
//! partitions of all levels are combined by [`math::Partition::find_minimal_partition`] into the
//! coarsest partition that respects all of them.
//!
//! A plain L* table that compares rows by their exact values is available as
//! [`active::ValueTable`].

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use lattice_automata::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        active::{
            AutomatonOracle, EquivalenceOracle, ExhaustiveOracle, HypothesisChange, LatticeTable,
            Learner, LearnerConfig, LearningResult, MembershipOracle, ObservationTable, Status,
            ValueTable,
        },
        alphabet::{CharAlphabet, Word},
        automaton::{
            AutomatonError, LatticeAutomaton, LatticeNfa, ParseError, Semantics, SingleInitial,
            State, Transition,
        },
        lattice::{ChainOps, Lattice, LatticeError, LatticeOps, PairOps, PowerSetOps},
        math,
        math::Partition,
        Show,
    };

    #[cfg(feature = "random")]
    pub use super::{active::RandomOracle, random::generate_random_ldfa};
}

/// This module contains some definitions of mathematical objects which are used throughout the crate and
/// do not really fit to the top level.
pub mod math;

/// Module that contains definitions for dealing with alphabets and words.
pub mod alphabet;

/// Finite lattices and the strategies that define their operations.
pub mod lattice;

/// Deterministic and nondeterministic lattice automata.
pub mod automaton;

/// Active learning of lattice automata, i.e. oracles, observation tables and the learning loop.
pub mod active;

/// Implements the generation of random lattice automata.
#[cfg(feature = "random")]
pub mod random;

/// Helper trait which can be used to display lattice values, symbols and such. The produced
/// representation must not contain whitespace, as it is used in the textual exchange format
/// of automata.
pub trait Show {
    /// Returns a compact human readable representation of `self`.
    fn show(&self) -> String;
}

impl<S: Show> Show for &S {
    fn show(&self) -> String {
        S::show(*self)
    }
}
