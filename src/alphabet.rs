use itertools::Itertools;

use crate::Show;

/// A finite word over a [`CharAlphabet`]. The empty vector represents the empty word ε.
pub type Word = Vec<char>;

/// Represents an alphabet where a symbol is just a single `char`.
///
/// The order in which symbols are given is preserved, it determines the order in which
/// transitions are created, printed and explored.
#[derive(Clone, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub struct CharAlphabet(pub(crate) Vec<char>);

impl CharAlphabet {
    /// Creates a new [`CharAlphabet`] from the given symbols, duplicates are removed while
    /// keeping the position of their first occurrence.
    pub fn new(symbols: Vec<char>) -> Self {
        Self(symbols.into_iter().unique().collect())
    }

    /// Creates a new [`CharAlphabet`] alphabet of the given size. The symbols are just the first `size` letters
    /// of the alphabet, i.e. 'a' to 'z'.
    pub fn of_size(size: usize) -> Self {
        assert!(size <= 26, "Alphabet is too large");
        Self((0..size).map(|i| (b'a' + i as u8) as char).collect())
    }

    /// Iterates over all symbols in the order they were given.
    pub fn universe(&self) -> impl Iterator<Item = char> + '_ {
        self.0.iter().cloned()
    }

    /// Returns true if the given symbol is present in the alphabet.
    pub fn contains(&self, symbol: char) -> bool {
        self.0.contains(&symbol)
    }

    /// Returns the number of symbols in the alphabet.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the alphabet is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the position of `symbol`, if it is present.
    pub fn position(&self, symbol: char) -> Option<usize> {
        self.0.iter().position(|x| *x == symbol)
    }

    /// Gives all words over the alphabet in length-lexicographic order, see [`FreeMonoid`].
    pub fn words(&self) -> FreeMonoid {
        FreeMonoid::new(self.0.clone())
    }

    /// Gives all words of length at most `max_len` in length-lexicographic order.
    pub fn words_up_to(&self, max_len: usize) -> impl Iterator<Item = Word> {
        self.words().take_while(move |w| w.len() <= max_len)
    }
}

impl std::ops::Index<usize> for CharAlphabet {
    type Output = char;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<char>> for CharAlphabet {
    fn from(value: Vec<char>) -> Self {
        Self::new(value)
    }
}

impl FromIterator<char> for CharAlphabet {
    fn from_iter<T: IntoIterator<Item = char>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Show for char {
    fn show(&self) -> String {
        self.to_string()
    }
}

/// Computes all elements of the free monoid over a set of given symbols.
/// In other words, it builds all finite words in length-lexicographic order
/// meaning words are computed in increasing length and, within one length, in the
/// order of the symbols.
#[derive(Debug, Clone)]
pub struct FreeMonoid {
    symbols: Vec<char>,
    current: Option<Vec<usize>>,
}

impl Iterator for FreeMonoid {
    type Item = Word;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.as_mut()?;
        let out = current.iter().map(|i| self.symbols[*i]).collect();

        if self.symbols.is_empty() {
            // only the empty word exists
            self.current = None;
            return Some(out);
        }

        let mut carry = true;
        let mut i = current.len();
        while carry && i > 0 {
            i -= 1;
            current[i] += 1;
            if current[i] >= self.symbols.len() {
                current[i] = 0;
            } else {
                carry = false;
            }
        }

        if carry {
            *current = vec![0; current.len() + 1];
        }

        Some(out)
    }
}

impl FreeMonoid {
    /// Creates a new instance for the given vec of symbols.
    pub fn new(symbols: Vec<char>) -> Self {
        Self {
            symbols,
            current: Some(vec![]),
        }
    }
}

/// Renders a word, the empty word is displayed as `ε`.
pub(crate) fn show_word(word: &[char]) -> String {
    if word.is_empty() {
        "ε".to_string()
    } else {
        word.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{CharAlphabet, FreeMonoid};

    #[test]
    fn kleene_star() {
        assert_eq!(
            FreeMonoid::new(vec!['a', 'b'])
                .take_while(|e| e.len() <= 2)
                .collect::<Vec<_>>(),
            vec![
                vec![],
                vec!['a'],
                vec!['b'],
                vec!['a', 'a'],
                vec!['a', 'b'],
                vec!['b', 'a'],
                vec!['b', 'b']
            ]
        );
    }

    #[test]
    fn empty_alphabet_only_has_epsilon() {
        let words: Vec<_> = CharAlphabet::new(vec![]).words().collect();
        assert_eq!(words, vec![Vec::<char>::new()]);
    }

    #[test]
    fn words_up_to_counts() {
        let alphabet = CharAlphabet::of_size(3);
        assert_eq!(alphabet.words_up_to(2).count(), 1 + 3 + 9);
        assert_eq!(CharAlphabet::new(vec!['b', 'a', 'b']).size(), 2);
    }
}
