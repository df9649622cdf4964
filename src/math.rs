use std::{collections::BTreeSet, hash::Hash};

/// Type alias for sets, we use this to hide which type of `HashSet` we are actually using.
pub type Set<S> = fxhash::FxHashSet<S>;
/// Type alias for maps, we use this to hide which type of `HashMap` we are actually using.
pub type Map<K, V> = fxhash::FxHashMap<K, V>;
/// Type alias for maps that remember the order in which keys were inserted.
pub type OrderedMap<K, V> = indexmap::IndexMap<K, V, fxhash::FxBuildHasher>;

/// A partition is a different view on an equivalence relation, by grouping elements of
/// type `I` into their respective classes under the relation.
#[derive(Debug, Clone)]
pub struct Partition<I: Hash + Eq>(Vec<BTreeSet<I>>);

impl<I: Hash + Eq> std::ops::Deref for Partition<I> {
    type Target = Vec<BTreeSet<I>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, I: Hash + Eq> IntoIterator for &'a Partition<I> {
    type Item = &'a BTreeSet<I>;
    type IntoIter = std::slice::Iter<'a, BTreeSet<I>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<I: Hash + Eq> PartialEq for Partition<I> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|o| other.contains(o))
    }
}
impl<I: Hash + Eq> Eq for Partition<I> {}

impl<I: Hash + Eq + Ord + Clone> Partition<I> {
    /// Returns the size of the partition, i.e. the number of classes.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Builds a new partition from an iterator that yields iterators which yield elements
    /// of type `I`. Empty classes are dropped.
    pub fn new<X: IntoIterator<Item = I>, Y: IntoIterator<Item = X>>(iter: Y) -> Self {
        Self(
            iter.into_iter()
                .map(|it| it.into_iter().collect::<BTreeSet<_>>())
                .filter(|class| !class.is_empty())
                .collect(),
        )
    }

    /// The class containing `element`, if there is one.
    pub fn class_of(&self, element: &I) -> Option<&BTreeSet<I>> {
        self.0.iter().find(|class| class.contains(element))
    }

    /// Returns true if every class of `self` is contained in some class of `coarser`.
    /// Elements of `self` that `coarser` does not mention are ignored.
    pub fn refines(&self, coarser: &Partition<I>) -> bool {
        self.0.iter().all(|class| {
            let mentioned: BTreeSet<_> = class
                .iter()
                .filter(|x| coarser.class_of(x).is_some())
                .cloned()
                .collect();
            mentioned.is_empty() || coarser.iter().any(|c| mentioned.is_subset(c))
        })
    }

    /// All elements covered by the partition.
    pub fn elements(&self) -> BTreeSet<I> {
        self.0.iter().flatten().cloned().collect()
    }

    /// Computes the coarsest partition of `universe` that is consistent with every one of the
    /// given `partitions`.
    ///
    /// Starting from the single class `universe`, each class is split by intersecting it with
    /// every class of the next partition in turn. The given partitions need not cover the
    /// universe: elements of a class that no intersection captures are not lost but are put
    /// into the first non-empty intersection. A class that no intersection touches at all is
    /// kept as it is. Empty classes never appear in the result.
    pub fn find_minimal_partition<'a, U, H>(universe: U, partitions: H) -> Self
    where
        U: IntoIterator<Item = I>,
        H: IntoIterator<Item = &'a Partition<I>>,
        I: 'a,
    {
        let universe: BTreeSet<I> = universe.into_iter().collect();
        if universe.is_empty() {
            return Self(vec![]);
        }

        let mut current = vec![universe];
        for partition in partitions {
            let mut refined = Vec::with_capacity(current.len());
            for class in current {
                let mut parts: Vec<BTreeSet<I>> = partition
                    .iter()
                    .map(|other| class.intersection(other).cloned().collect::<BTreeSet<_>>())
                    .filter(|part| !part.is_empty())
                    .collect();

                if parts.is_empty() {
                    refined.push(class);
                    continue;
                }

                let left_over: Vec<_> = class
                    .into_iter()
                    .filter(|x| !parts.iter().any(|part| part.contains(x)))
                    .collect();
                parts[0].extend(left_over);
                refined.extend(parts);
            }
            current = refined;
        }

        Self(current)
    }
}

impl<I: Hash + Eq + Ord> From<Vec<BTreeSet<I>>> for Partition<I> {
    fn from(value: Vec<BTreeSet<I>>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::Partition;

    fn p(classes: Vec<Vec<u32>>) -> Partition<u32> {
        Partition::new(classes)
    }

    #[test]
    fn refinement_of_covering_partitions() {
        let universe = 0..10u32;
        let h = [
            p(vec![vec![0, 1, 2], vec![3, 5, 6], vec![4, 7, 8, 9]]),
            p(vec![vec![0, 2, 3], vec![1, 5], vec![4, 6, 7, 8, 9]]),
        ];
        let result = Partition::find_minimal_partition(universe.clone(), &h);

        assert_eq!(result.elements(), universe.collect::<BTreeSet<_>>());
        for partition in &h {
            assert!(result.refines(partition));
        }
        assert_eq!(
            result,
            p(vec![vec![0, 2], vec![1], vec![3], vec![5], vec![6], vec![4, 7, 8, 9]])
        );
    }

    #[test]
    fn uncovered_elements_join_first_intersection() {
        let h = [p(vec![vec![3], vec![5], vec![4, 6]])];
        let result = Partition::find_minimal_partition([3, 4, 5, 6, 7], &h);
        // 7 is not mentioned by the partition and ends up with 3
        assert_eq!(result, p(vec![vec![3, 7], vec![5], vec![4, 6]]));
    }

    #[test]
    fn untouched_class_is_kept() {
        let h = [p(vec![vec![0, 1], vec![2, 3]]), p(vec![vec![7]])];
        let result = Partition::find_minimal_partition(0..4u32, &h);
        assert_eq!(result, p(vec![vec![0, 1], vec![2, 3]]));
    }

    #[test]
    fn empty_inputs() {
        let none: [Partition<u32>; 0] = [];
        assert_eq!(
            Partition::find_minimal_partition(0..3u32, &none),
            p(vec![vec![0, 1, 2]])
        );
        assert_eq!(
            Partition::find_minimal_partition(std::iter::empty(), &[p(vec![vec![1]])]).size(),
            0
        );
    }
}
