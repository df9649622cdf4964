use std::{collections::BTreeSet, fmt::Debug, hash::Hash};

use itertools::Itertools;
use thiserror::Error;

use crate::Show;

/// Errors that can occur when constructing a [`Lattice`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum LatticeError {
    /// A lattice needs at least one element, otherwise it has neither bottom nor top.
    #[error("cannot build a lattice from an empty set of elements")]
    Empty,
}

/// The capabilities a finite lattice has to provide. An implementor is a small strategy
/// object that knows how to order, combine and parse the elements of one kind of lattice.
///
/// Implementations must ensure that `join` and `meet` are associative, commutative and
/// compatible with `leq`, that is `a <= join(a, b)` and `meet(a, b) <= a`.
pub trait LatticeOps: Clone + Debug {
    /// The type of the lattice elements.
    type Element: Clone + Eq + Hash + Debug + Show;

    /// Returns true iff `left <= right`.
    fn leq(&self, left: &Self::Element, right: &Self::Element) -> bool;
    /// The least upper bound of both elements.
    fn join(&self, left: &Self::Element, right: &Self::Element) -> Self::Element;
    /// The greatest lower bound of both elements.
    fn meet(&self, left: &Self::Element, right: &Self::Element) -> Self::Element;
    /// Complement of `element` relative to the maximal element `top`.
    fn complement(&self, top: &Self::Element, element: &Self::Element) -> Self::Element;
    /// Reads an element from its textual form, which is the one produced by [`Show`].
    fn parse(&self, token: &str) -> Option<Self::Element>;
}

/// A finite lattice, given by an explicit set of elements together with a [`LatticeOps`]
/// strategy. Bottom and top are computed once on construction by a linear scan.
#[derive(Debug, Clone)]
pub struct Lattice<O: LatticeOps> {
    elements: Vec<O::Element>,
    ops: O,
    bottom: O::Element,
    top: O::Element,
}

impl<O: LatticeOps> Lattice<O> {
    /// Builds a lattice over the given elements. Duplicates are removed, the order of the
    /// remaining elements is kept and determines the scan order of [`Self::find_max_lattice`]
    /// and [`Self::find_min_lattice`].
    pub fn new<I: IntoIterator<Item = O::Element>>(
        elements: I,
        ops: O,
    ) -> Result<Self, LatticeError> {
        let elements: Vec<_> = elements.into_iter().unique().collect();
        let Some(first) = elements.first() else {
            return Err(LatticeError::Empty);
        };

        let mut bottom = first;
        let mut top = first;
        for element in &elements {
            if ops.leq(element, bottom) {
                bottom = element;
            }
            if ops.leq(top, element) {
                top = element;
            }
        }
        let (bottom, top) = (bottom.clone(), top.clone());

        Ok(Self {
            elements,
            ops,
            bottom,
            top,
        })
    }

    /// All elements of the lattice.
    pub fn elements(&self) -> &[O::Element] {
        &self.elements
    }

    /// Number of elements in the lattice.
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// The underlying strategy.
    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// The minimal element ⊥.
    pub fn bottom(&self) -> &O::Element {
        &self.bottom
    }

    /// The maximal element ⊤.
    pub fn top(&self) -> &O::Element {
        &self.top
    }

    pub fn leq(&self, left: &O::Element, right: &O::Element) -> bool {
        self.ops.leq(left, right)
    }

    /// Strict order, `left < right` iff `left <= right` and both differ.
    pub fn lt(&self, left: &O::Element, right: &O::Element) -> bool {
        left != right && self.ops.leq(left, right)
    }

    pub fn join(&self, left: &O::Element, right: &O::Element) -> O::Element {
        self.ops.join(left, right)
    }

    pub fn meet(&self, left: &O::Element, right: &O::Element) -> O::Element {
        self.ops.meet(left, right)
    }

    /// Complement of `element` with respect to ⊤.
    pub fn complement(&self, element: &O::Element) -> O::Element {
        self.ops.complement(&self.top, element)
    }

    /// Folds the given elements with `join`, starting from ⊥.
    pub fn join_all<'a, I>(&self, elements: I) -> O::Element
    where
        I: IntoIterator<Item = &'a O::Element>,
        O::Element: 'a,
    {
        elements
            .into_iter()
            .fold(self.bottom.clone(), |acc, x| self.join(&acc, x))
    }

    /// Folds the given elements with `meet`, starting from ⊤.
    pub fn meet_all<'a, I>(&self, elements: I) -> O::Element
    where
        I: IntoIterator<Item = &'a O::Element>,
        O::Element: 'a,
    {
        elements
            .into_iter()
            .fold(self.top.clone(), |acc, x| self.meet(&acc, x))
    }

    pub fn contains(&self, element: &O::Element) -> bool {
        self.elements.contains(element)
    }

    /// Index of `element` in [`Self::elements`].
    pub fn position(&self, element: &O::Element) -> Option<usize> {
        self.elements.iter().position(|e| e == element)
    }

    /// Parses a token into an element, returning `None` if the token is malformed or
    /// does not denote an element of this lattice.
    pub fn parse(&self, token: &str) -> Option<O::Element> {
        self.ops.parse(token).filter(|e| self.contains(e))
    }

    /// Scans all elements and returns the largest one satisfying `predicate`. The scan starts
    /// at ⊥ and moves to an element whenever it lies above the current pick and satisfies the
    /// predicate, so ⊥ is returned if nothing matches.
    pub fn find_max_lattice<P: Fn(&O::Element) -> bool>(&self, predicate: P) -> O::Element {
        let mut current = &self.bottom;
        for element in &self.elements {
            if self.leq(current, element) && predicate(element) {
                current = element;
            }
        }
        current.clone()
    }

    /// Dual of [`Self::find_max_lattice`], starts at ⊤ and defaults to it.
    pub fn find_min_lattice<P: Fn(&O::Element) -> bool>(&self, predicate: P) -> O::Element {
        let mut current = &self.top;
        for element in &self.elements {
            if self.leq(element, current) && predicate(element) {
                current = element;
            }
        }
        current.clone()
    }
}

/// Totally ordered numbers, join is `max` and meet is `min`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainOps;

impl LatticeOps for ChainOps {
    type Element = u32;

    fn leq(&self, left: &u32, right: &u32) -> bool {
        left <= right
    }

    fn join(&self, left: &u32, right: &u32) -> u32 {
        *left.max(right)
    }

    fn meet(&self, left: &u32, right: &u32) -> u32 {
        *left.min(right)
    }

    fn complement(&self, top: &u32, element: &u32) -> u32 {
        top.saturating_sub(*element)
    }

    fn parse(&self, token: &str) -> Option<u32> {
        token.trim().parse().ok()
    }
}

impl Lattice<ChainOps> {
    /// The chain over the given numbers.
    pub fn chain<I: IntoIterator<Item = u32>>(values: I) -> Result<Self, LatticeError> {
        Self::new(values, ChainOps)
    }

    /// The chain `0 < 1 < ... < max`.
    pub fn linear(max: u32) -> Self {
        Self::chain(0..=max).expect("a linear lattice always contains 0")
    }
}

/// Subsets of a finite set of numbers, ordered by inclusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerSetOps;

impl LatticeOps for PowerSetOps {
    type Element = BTreeSet<u32>;

    fn leq(&self, left: &Self::Element, right: &Self::Element) -> bool {
        left.is_subset(right)
    }

    fn join(&self, left: &Self::Element, right: &Self::Element) -> Self::Element {
        left.union(right).cloned().collect()
    }

    fn meet(&self, left: &Self::Element, right: &Self::Element) -> Self::Element {
        left.intersection(right).cloned().collect()
    }

    fn complement(&self, top: &Self::Element, element: &Self::Element) -> Self::Element {
        top.difference(element).cloned().collect()
    }

    fn parse(&self, token: &str) -> Option<Self::Element> {
        let inner = token.trim().strip_prefix('{')?.strip_suffix('}')?.trim();
        if inner.is_empty() {
            return Some(BTreeSet::new());
        }
        inner.split(',').map(|x| x.trim().parse().ok()).collect()
    }
}

impl Lattice<PowerSetOps> {
    /// The lattice of all subsets of `base`.
    pub fn power_set<I: IntoIterator<Item = u32>>(base: I) -> Self {
        let base: Vec<_> = base.into_iter().unique().collect();
        Self::new(
            base.into_iter()
                .powerset()
                .map(|subset| subset.into_iter().collect()),
            PowerSetOps,
        )
        .expect("the power set always contains the empty set")
    }
}

/// Pairs of numbers under the product order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairOps;

impl LatticeOps for PairOps {
    type Element = (u32, u32);

    fn leq(&self, left: &(u32, u32), right: &(u32, u32)) -> bool {
        left.0 <= right.0 && left.1 <= right.1
    }

    fn join(&self, left: &(u32, u32), right: &(u32, u32)) -> (u32, u32) {
        (left.0.max(right.0), left.1.max(right.1))
    }

    fn meet(&self, left: &(u32, u32), right: &(u32, u32)) -> (u32, u32) {
        (left.0.min(right.0), left.1.min(right.1))
    }

    fn complement(&self, top: &(u32, u32), element: &(u32, u32)) -> (u32, u32) {
        (
            top.0.saturating_sub(element.0),
            top.1.saturating_sub(element.1),
        )
    }

    fn parse(&self, token: &str) -> Option<(u32, u32)> {
        let inner = token.trim().strip_prefix('(')?.strip_suffix(')')?;
        let (left, right) = inner.split_once(',')?;
        Some((left.trim().parse().ok()?, right.trim().parse().ok()?))
    }
}

impl Lattice<PairOps> {
    /// The grid `{0..=first} x {0..=second}`.
    pub fn pairs(first: u32, second: u32) -> Self {
        Self::new(
            (0..=first).cartesian_product(0..=second),
            PairOps,
        )
        .expect("the grid always contains (0, 0)")
    }
}

impl Show for u32 {
    fn show(&self) -> String {
        self.to_string()
    }
}

impl Show for BTreeSet<u32> {
    fn show(&self) -> String {
        format!("{{{}}}", self.iter().join(","))
    }
}

impl Show for (u32, u32) {
    fn show(&self) -> String {
        format!("({},{})", self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn set<const N: usize>(xs: [u32; N]) -> BTreeSet<u32> {
        xs.into_iter().collect()
    }

    #[test]
    fn chain_extremes() {
        let lattice = Lattice::chain([2, 0, 3, 1]).unwrap();
        assert_eq!(*lattice.bottom(), 0);
        assert_eq!(*lattice.top(), 3);
        assert_eq!(lattice.complement(&1), 2);
        assert!(lattice.lt(&1, &2));
        assert!(!lattice.lt(&2, &2));
        assert!(matches!(Lattice::chain([]), Err(LatticeError::Empty)));
    }

    #[test]
    fn find_extremal_with_predicate() {
        let lattice = Lattice::linear(4);
        assert_eq!(lattice.find_max_lattice(|l| *l <= 2), 2);
        assert_eq!(lattice.find_max_lattice(|_| false), 0);
        assert_eq!(lattice.find_min_lattice(|l| *l >= 3), 3);
        assert_eq!(lattice.find_min_lattice(|_| false), 4);
    }

    #[test]
    fn power_set_lattice() {
        let lattice = Lattice::power_set([1, 2]);
        assert_eq!(lattice.size(), 4);
        assert_eq!(*lattice.bottom(), set([]));
        assert_eq!(*lattice.top(), set([1, 2]));
        assert_eq!(lattice.join(&set([1]), &set([2])), set([1, 2]));
        assert_eq!(lattice.meet(&set([1]), &set([2])), set([]));
        assert_eq!(lattice.complement(&set([1])), set([2]));
        // incomparable elements are neither below nor above each other
        assert!(!lattice.leq(&set([1]), &set([2])));
        assert!(!lattice.leq(&set([2]), &set([1])));
    }

    #[test]
    fn values_round_trip_through_show() {
        let sets = Lattice::power_set([1, 2, 3]);
        for element in sets.elements() {
            assert_eq!(sets.parse(&element.show()).as_ref(), Some(element));
        }
        assert_eq!(sets.parse("{ }"), Some(set([])));
        assert_eq!(sets.parse("{4}"), None);

        let pairs = Lattice::pairs(2, 1);
        assert_eq!(pairs.size(), 6);
        assert_eq!(*pairs.top(), (2, 1));
        assert_eq!(pairs.parse("(1,1)"), Some((1, 1)));
        assert_eq!(pairs.parse("(3,1)"), None);
        assert_eq!(pairs.parse("1,1"), None);

        let chain = Lattice::linear(2);
        assert_eq!(chain.parse("2"), Some(2));
        assert_eq!(chain.parse("x"), None);
    }

    #[test]
    fn folds() {
        let lattice = Lattice::pairs(2, 2);
        assert_eq!(lattice.join_all(&[(1, 0), (0, 2)]), (1, 2));
        assert_eq!(lattice.meet_all(&[(1, 2), (2, 1)]), (1, 1));
        assert_eq!(lattice.meet_all(&[]), (2, 2));
    }
}
