use lattice_automata::prelude::*;

const TARGET: &str = "e=>\ne$2: a|2->e b|1->q\nq$1: a|1->e b|0->q\n";

fn target() -> LatticeAutomaton<ChainOps> {
    LatticeAutomaton::parse(TARGET, CharAlphabet::of_size(2), Lattice::linear(2)).unwrap()
}

fn agree_up_to<O: LatticeOps>(
    left: &LatticeAutomaton<O>,
    right: &LatticeAutomaton<O>,
    max_len: usize,
) {
    for word in left.alphabet().words_up_to(max_len) {
        assert_eq!(left.run_word(&word), right.run_word(&word), "on {word:?}");
    }
}

fn check_bookkeeping<O: LatticeOps>(result: &LearningResult<O>) {
    assert_eq!(result.state_counts.len(), result.iterations);
    assert_eq!(result.changes.len(), result.iterations);
    assert_eq!(result.equivalence_queries, result.iterations);
    assert_eq!(result.changes.first(), Some(&HypothesisChange::Initial));
    assert_eq!(result.state_counts.last(), Some(&result.automaton.size()));
    assert!(result.membership_queries > 0);
}

#[test_log::test]
fn folstar_learns_scenario() {
    let target = target();
    let oracle = AutomatonOracle::new(target.clone());
    let result = Learner::folstar(
        target.alphabet().clone(),
        target.lattice().clone(),
        oracle.clone(),
        oracle,
        LearnerConfig::default(),
    )
    .run()
    .unwrap();

    assert_eq!(result.status, Status::Converged);
    check_bookkeeping(&result);
    let hypothesis = &result.automaton;
    for (word, expected) in [("", 2), ("b", 1), ("bb", 0), ("ba", 1)] {
        let word: Vec<_> = word.chars().collect();
        assert_eq!(hypothesis.run_word(&word), Ok(expected));
    }
    agree_up_to(&target, hypothesis, 4);
}

#[test_log::test]
fn folstar_learns_scenario_with_empty_sink_value() {
    // as above, but q carries the value 0, so that b is worth 0 as well
    let target = LatticeAutomaton::parse(
        "e=>\ne$2: a|2->e b|1->q\nq$0: a|1->e b|0->q\n",
        CharAlphabet::of_size(2),
        Lattice::linear(2),
    )
    .unwrap();
    let oracle = AutomatonOracle::new(target.clone());
    let result = Learner::folstar(
        target.alphabet().clone(),
        target.lattice().clone(),
        oracle.clone(),
        oracle,
        LearnerConfig::default(),
    )
    .run()
    .unwrap();

    assert!(result.converged());
    assert_eq!(result.iterations, 1);
    check_bookkeeping(&result);
    assert_eq!(
        result.automaton.to_string(),
        "ε=>\nε$2: a|2->ε b|1->b\nb$0: a|1->ε b|0->ε\n"
    );
    assert_eq!(
        LatticeAutomaton::equivalent(&target, &result.automaton),
        Ok(None)
    );
    for (word, expected) in [("", 2), ("b", 0), ("bb", 0), ("ba", 1)] {
        let word: Vec<_> = word.chars().collect();
        assert_eq!(result.automaton.run_word(&word), Ok(expected));
    }
}

#[test_log::test]
fn lstar_learns_scenario() {
    let target = target();
    let oracle = AutomatonOracle::new(target.clone());
    let result = Learner::lstar(
        target.alphabet().clone(),
        target.lattice().clone(),
        oracle.clone(),
        oracle,
        LearnerConfig::default(),
    )
    .run()
    .unwrap();

    assert!(result.converged());
    check_bookkeeping(&result);
    agree_up_to(&target, &result.automaton, 4);
    // without values on transitions every reachable combination of state and value needs
    // its own state
    assert_eq!(result.automaton.size(), 4);
}

#[test_log::test]
fn conflict_resolution_keeps_result() {
    let target = target();
    let oracle = AutomatonOracle::new(target.clone());
    let learn = |resolve_conflicts| {
        Learner::folstar(
            target.alphabet().clone(),
            target.lattice().clone(),
            oracle.clone(),
            oracle.clone(),
            LearnerConfig {
                resolve_conflicts,
                ..Default::default()
            },
        )
        .run()
        .unwrap()
    };
    let plain = learn(false);
    let resolving = learn(true);
    assert!(plain.converged() && resolving.converged());
    assert_eq!(plain.automaton.to_string(), resolving.automaton.to_string());
}

#[test_log::test]
fn closures_as_oracles() {
    let target = target();
    let f = |w: &[char]| target.run_word(w).unwrap();
    let exhaustive = ExhaustiveOracle::new(target.alphabet().clone(), f);
    let result = Learner::folstar(
        target.alphabet().clone(),
        target.lattice().clone(),
        f,
        exhaustive,
        LearnerConfig::default(),
    )
    .run()
    .unwrap();
    assert!(result.converged());
    assert_eq!(result.iterations, 1);
    assert_eq!(
        LatticeAutomaton::equivalent(&target, &result.automaton),
        Ok(None)
    );
}

#[test_log::test]
fn learned_automaton_survives_exchange_format() {
    let target = target();
    let oracle = AutomatonOracle::new(target.clone());
    let learned = Learner::folstar(
        target.alphabet().clone(),
        target.lattice().clone(),
        oracle.clone(),
        oracle,
        LearnerConfig::default(),
    )
    .run()
    .unwrap()
    .automaton;

    let text = learned.to_string();
    let read = LatticeAutomaton::from_reader(
        text.as_bytes(),
        target.alphabet().clone(),
        target.lattice().clone(),
    )
    .unwrap();
    assert_eq!(read.to_string(), text);
    assert_eq!(LatticeAutomaton::equivalent(&target, &read), Ok(None));

    let nfa = LatticeNfa::from(&read);
    for word in target.alphabet().words_up_to(4) {
        assert_eq!(nfa.run_word(&word), target.run_word(&word));
    }
}

#[cfg(feature = "random")]
mod random {
    use super::*;

    fn random_targets(seed: u64) -> Vec<LatticeAutomaton<ChainOps>> {
        let alphabet = CharAlphabet::of_size(2);
        let lattice = Lattice::linear(2);
        let mut rng = fastrand::Rng::with_seed(seed);
        (1..=3)
            .flat_map(|size| std::iter::repeat(size).take(3))
            .map(|size| generate_random_ldfa(&alphabet, &lattice, size, true, &mut rng).unwrap())
            .collect()
    }

    #[test_log::test]
    fn folstar_is_sound_on_random_targets() {
        for target in random_targets(5) {
            let oracle = AutomatonOracle::new(target.clone());
            let result = Learner::folstar(
                target.alphabet().clone(),
                target.lattice().clone(),
                oracle.clone(),
                oracle,
                LearnerConfig::default(),
            )
            .run()
            .unwrap();
            check_bookkeeping(&result);
            assert!(result.converged(), "failed to learn\n{target}");
            agree_up_to(&target, &result.automaton, 5);
        }
    }

    #[test_log::test]
    fn lstar_converges_on_random_targets() {
        for target in random_targets(11) {
            let oracle = AutomatonOracle::new(target.clone());
            let result = Learner::lstar(
                target.alphabet().clone(),
                target.lattice().clone(),
                oracle.clone(),
                oracle,
                LearnerConfig::default(),
            )
            .run()
            .unwrap();
            check_bookkeeping(&result);
            assert!(result.converged(), "failed to learn\n{target}");
            agree_up_to(&target, &result.automaton, 5);
        }
    }

    #[test_log::test]
    fn random_oracle_accepts_correct_hypothesis() {
        let target = target();
        let f = |w: &[char]| target.run_word(w).unwrap();
        let oracle = RandomOracle::new(target.alphabet().clone(), f, 200, 8, 17);
        let result = Learner::folstar(
            target.alphabet().clone(),
            target.lattice().clone(),
            f,
            oracle,
            LearnerConfig::default(),
        )
        .run()
        .unwrap();
        assert!(result.converged());
        assert_eq!(result.iterations, 1);
    }
}
