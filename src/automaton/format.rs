use std::{fmt::Display, io::BufRead};

use thiserror::Error;
use tracing::trace;

use crate::{
    alphabet::CharAlphabet,
    lattice::{Lattice, LatticeOps},
    Show,
};

use super::{AutomatonError, LatticeAutomaton, Semantics};

/// Errors that occur when reading an automaton from its textual exchange format. Parsing never
/// recovers partially, the first problem aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input does not start with a line of the form `initial=>`.
    #[error("missing header line of the form `initial=>`")]
    MissingHeader,
    /// A state line is not of the form `name$value: transitions`.
    #[error("line {line}: malformed state declaration `{content}`")]
    MalformedState { line: usize, content: String },
    /// A transition is not of the form `symbol|value->destination`.
    #[error("line {line}: malformed transition `{token}`")]
    MalformedTransition { line: usize, token: String },
    /// A value that is not an element of the lattice.
    #[error("line {line}: `{token}` is not an element of the lattice")]
    InvalidValue { line: usize, token: String },
    /// A state is referenced but never declared.
    #[error("state `{0}` is referenced but not declared")]
    UnknownDestination(String),
    /// Reading the input failed.
    #[error("could not read input: {0}")]
    Io(String),
    #[error(transparent)]
    Automaton(#[from] AutomatonError),
}

impl From<std::io::Error> for ParseError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

/// Writes the exchange format: a header `initial=>` followed by one line
/// `name$value: sym|value->target ...` per state. States appear in insertion order,
/// transitions in the order of the alphabet.
impl<O: LatticeOps, S: Semantics<O>> Display for LatticeAutomaton<O, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}=>", self.initial_state().unwrap_or_default())?;
        for state in self.states.values() {
            write!(f, "{}${}:", state.name, state.value.show())?;
            for sym in self.alphabet.universe() {
                if let Some(t) = state.transition(sym) {
                    write!(f, " {sym}|{}->{}", t.value.show(), t.target)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

struct StateLine<'a, E> {
    line: usize,
    name: &'a str,
    value: E,
    transitions: Vec<(char, E, &'a str)>,
}

fn parse_value<O: LatticeOps>(
    lattice: &Lattice<O>,
    line: usize,
    token: &str,
) -> Result<O::Element, ParseError> {
    lattice.parse(token).ok_or_else(|| ParseError::InvalidValue {
        line,
        token: token.to_string(),
    })
}

fn parse_state_line<'a, O: LatticeOps>(
    lattice: &Lattice<O>,
    line: usize,
    content: &'a str,
) -> Result<StateLine<'a, O::Element>, ParseError> {
    let malformed = || ParseError::MalformedState {
        line,
        content: content.to_string(),
    };
    let (head, rest) = content.split_once(':').ok_or_else(malformed)?;
    let (name, value) = head.split_once('$').ok_or_else(malformed)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(malformed());
    }
    let value = parse_value(lattice, line, value.trim())?;

    let mut transitions = vec![];
    for token in rest.split_whitespace() {
        let malformed = || ParseError::MalformedTransition {
            line,
            token: token.to_string(),
        };
        let (sym, rest) = token.split_once('|').ok_or_else(malformed)?;
        let (value, target) = rest.split_once("->").ok_or_else(malformed)?;
        let mut chars = sym.chars();
        let (Some(sym), None) = (chars.next(), chars.next()) else {
            return Err(malformed());
        };
        if target.is_empty() {
            return Err(malformed());
        }
        transitions.push((sym, parse_value(lattice, line, value)?, target));
    }

    Ok(StateLine {
        line,
        name,
        value,
        transitions,
    })
}

impl<O: LatticeOps> LatticeAutomaton<O> {
    /// Reads an automaton in the exchange format produced by its [`Display`] implementation.
    /// Blank lines and repeated whitespace are ignored. Every state that is the destination of
    /// a transition or the initial state has to be declared on its own line.
    pub fn parse(
        input: &str,
        alphabet: CharAlphabet,
        lattice: Lattice<O>,
    ) -> Result<Self, ParseError> {
        let mut lines = input
            .lines()
            .enumerate()
            .map(|(i, content)| (i + 1, content.trim()))
            .filter(|(_, content)| !content.is_empty());

        let (_, header) = lines.next().ok_or(ParseError::MissingHeader)?;
        let initial = header
            .strip_suffix("=>")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ParseError::MissingHeader)?;

        let declared = lines
            .map(|(line, content)| parse_state_line(&lattice, line, content))
            .collect::<Result<Vec<_>, _>>()?;

        let mut automaton = Self::new(alphabet, lattice, initial);
        for state in &declared {
            automaton.add_state(state.name, state.value.clone())?;
        }
        if automaton.state(initial).is_none() {
            return Err(ParseError::UnknownDestination(initial.to_string()));
        }

        for state in declared {
            for (sym, value, target) in state.transitions {
                if automaton.state(target).is_none() {
                    return Err(ParseError::UnknownDestination(target.to_string()));
                }
                automaton.add_transition(state.name, sym, target, value)?;
            }
            trace!("parsed state {} from line {}", state.name, state.line);
        }

        Ok(automaton)
    }

    /// Like [`Self::parse`], but reads the input from `reader` first.
    pub fn from_reader<R: BufRead>(
        mut reader: R,
        alphabet: CharAlphabet,
        lattice: Lattice<O>,
    ) -> Result<Self, ParseError> {
        let mut input = String::new();
        reader.read_to_string(&mut input)?;
        Self::parse(&input, alphabet, lattice)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::{automaton::tests::two_state_target, prelude::*};

    #[test]
    fn writes_exchange_format() {
        let target = two_state_target();
        assert_eq!(
            target.to_string(),
            "e=>\ne$2: a|2->e b|1->q\nq$1: a|1->e b|0->q\n"
        );
    }

    #[test]
    fn reads_what_it_writes() {
        let lattice = Lattice::power_set([1, 2]);
        let set = |xs: &[u32]| xs.iter().cloned().collect::<BTreeSet<_>>();
        let mut aut = LatticeAutomaton::new(CharAlphabet::of_size(2), lattice.clone(), "p");
        aut.add_state("p", set(&[1, 2])).unwrap();
        aut.add_state("r", set(&[])).unwrap();
        aut.add_transition("p", 'b', "r", set(&[2])).unwrap();
        aut.add_transition("r", 'a', "p", set(&[1])).unwrap();

        let text = aut.to_string();
        assert_eq!(text, "p=>\np${1,2}: b|{2}->r\nr${}: a|{1}->p\n");
        let read = LatticeAutomaton::parse(&text, CharAlphabet::of_size(2), lattice).unwrap();
        assert_eq!(read.to_string(), text);
        assert_eq!(LatticeAutomaton::equivalent(&aut, &read), Ok(None));
    }

    #[test]
    fn tolerates_whitespace() {
        let input = "\n  e=>\n\ne$2:   a|2->e  b|1->q\n   q$1: a|1->e\tb|0->q   \n\n";
        let parsed =
            LatticeAutomaton::parse(input, CharAlphabet::of_size(2), Lattice::linear(2)).unwrap();
        assert_eq!(parsed.to_string(), two_state_target().to_string());

        let reader = std::io::Cursor::new(input.as_bytes());
        let read =
            LatticeAutomaton::from_reader(reader, CharAlphabet::of_size(2), Lattice::linear(2))
                .unwrap();
        assert_eq!(read.size(), 2);
    }

    #[test]
    fn rejects_malformed_input() {
        let parse = |input: &str| {
            LatticeAutomaton::parse(input, CharAlphabet::of_size(2), Lattice::linear(2)).map(|_| ())
        };

        assert_eq!(parse(""), Err(ParseError::MissingHeader));
        assert_eq!(parse("e\ne$2:"), Err(ParseError::MissingHeader));
        assert_eq!(
            parse("e=>\ne2: a|2->e"),
            Err(ParseError::MalformedState {
                line: 2,
                content: "e2: a|2->e".to_string()
            })
        );
        assert_eq!(
            parse("e=>\ne$2: a2->e"),
            Err(ParseError::MalformedTransition {
                line: 2,
                token: "a2->e".to_string()
            })
        );
        assert_eq!(
            parse("e=>\ne$2: ab|2->e"),
            Err(ParseError::MalformedTransition {
                line: 2,
                token: "ab|2->e".to_string()
            })
        );
        assert_eq!(
            parse("e=>\n\ne$5: a|2->e"),
            Err(ParseError::InvalidValue {
                line: 3,
                token: "5".to_string()
            })
        );
        assert_eq!(
            parse("e=>\ne$2: a|2->q"),
            Err(ParseError::UnknownDestination("q".to_string()))
        );
        assert_eq!(
            parse("x=>\ne$2: a|2->e"),
            Err(ParseError::UnknownDestination("x".to_string()))
        );
        assert_eq!(
            parse("e=>\ne$2: c|2->e"),
            Err(ParseError::Automaton(AutomatonError::InvalidSymbol('c')))
        );
    }
}
