use tracing::debug;

use crate::{
    alphabet::CharAlphabet,
    automaton::{AutomatonError, LatticeAutomaton},
    lattice::{Lattice, LatticeOps},
};

/// Generates a complete [`LatticeAutomaton`] with `size` states by drawing every transition at
/// random. The states are named `"0"` up to `"{size - 1}"` and `"0"` is the initial state. For
/// every state and symbol, the target state and the value of the transition are drawn
/// uniformly. If `random_state_values` is set, the value of every state is drawn as well,
/// otherwise all states get ⊤.
///
/// Note that depending on the drawn transitions, some states may be unreachable. An automaton
/// with `size == 0` has no states at all.
pub fn generate_random_ldfa<O: LatticeOps>(
    alphabet: &CharAlphabet,
    lattice: &Lattice<O>,
    size: usize,
    random_state_values: bool,
    rng: &mut fastrand::Rng,
) -> Result<LatticeAutomaton<O>, AutomatonError> {
    let elements = lattice.elements();
    let draw_value = |rng: &mut fastrand::Rng| elements[rng.usize(..elements.len())].clone();

    let mut automaton = LatticeAutomaton::new(alphabet.clone(), lattice.clone(), "0");
    for q in 0..size {
        let value = if random_state_values {
            draw_value(rng)
        } else {
            lattice.top().clone()
        };
        automaton.add_state(q.to_string(), value)?;
    }
    for q in 0..size {
        for sym in alphabet.universe() {
            let target = rng.usize(..size);
            let value = draw_value(rng);
            automaton.add_transition(&q.to_string(), sym, target.to_string(), value)?;
        }
    }

    debug!("generated random automaton with {size} states");
    Ok(automaton)
}
