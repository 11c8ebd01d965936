use crate::error::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IterMode {
    /// Every ordered tuple, repetition allowed.
    Product,
    /// Tuples whose positions are pairwise distinct.
    Permutation,
    /// Strictly increasing positions.
    Combination,
    /// Non-decreasing positions.
    CombinationWithReplacement,
}

impl IterMode {
    #[inline]
    fn accepts(self, positions: &[usize]) -> bool {
        match self {
            IterMode::Product => true,
            IterMode::Permutation => positions
                .iter()
                .enumerate()
                .all(|(i, a)| positions[i + 1..].iter().all(|b| a != b)),
            IterMode::Combination => positions.windows(2).all(|w| w[0] < w[1]),
            IterMode::CombinationWithReplacement => positions.windows(2).all(|w| w[0] <= w[1]),
        }
    }
}

///
/// Lazy enumeration of `repeat`-tuples over a list of items.
///
/// Tuples are produced in odometer order of the underlying Cartesian product
/// (the rightmost position moves fastest); permutations and combinations are
/// the subsequences of that order that pass the mode's position filter.
///
/// The cursor is plain mutable state: one instance serves one traversal.
///
#[derive(Debug, Clone)]
pub struct CombinatorialIter<T> {
    items: Vec<T>,
    repeat: usize,
    mode: IterMode,
    positions: Vec<usize>,
    started: bool,
    exhausted: bool,
}

impl<T: Clone> CombinatorialIter<T> {
    pub fn new(items: Vec<T>, repeat: usize, mode: IterMode) -> Result<Self, Error> {
        if repeat < 1 {
            return Err(Error::ZeroRepeat);
        }

        if items.is_empty() {
            return Err(Error::EmptyItems);
        }

        let needs_distinct = match mode {
            IterMode::Permutation | IterMode::Combination => true,
            IterMode::Product | IterMode::CombinationWithReplacement => false,
        };

        if needs_distinct && repeat > items.len() {
            return Err(Error::RepeatExceedsItems {
                repeat,
                items: items.len(),
            });
        }

        Ok(Self {
            items,
            repeat,
            mode,
            positions: vec![0; repeat],
            started: false,
            exhausted: false,
        })
    }

    #[inline]
    pub fn product(items: Vec<T>, repeat: usize) -> Result<Self, Error> {
        Self::new(items, repeat, IterMode::Product)
    }

    #[inline]
    pub fn permutations(items: Vec<T>, repeat: usize) -> Result<Self, Error> {
        Self::new(items, repeat, IterMode::Permutation)
    }

    #[inline]
    pub fn combinations(items: Vec<T>, repeat: usize) -> Result<Self, Error> {
        Self::new(items, repeat, IterMode::Combination)
    }

    #[inline]
    pub fn combinations_with_replacement(items: Vec<T>, repeat: usize) -> Result<Self, Error> {
        Self::new(items, repeat, IterMode::CombinationWithReplacement)
    }

    #[inline]
    pub fn mode(&self) -> IterMode {
        self.mode
    }

    #[inline]
    pub fn repeat(&self) -> usize {
        self.repeat
    }

    #[inline]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Rewind to the state right after construction.
    pub fn reset(&mut self) {
        for pos in self.positions.iter_mut() {
            *pos = 0;
        }

        self.started = false;
        self.exhausted = false;
    }

    // One odometer step over the full product.
    fn step(&mut self) -> bool {
        if self.exhausted {
            return false;
        }

        if !self.started {
            self.started = true;
            return true;
        }

        let max_index = self.items.len() - 1;

        for pos in self.positions.iter_mut().rev() {
            if *pos < max_index {
                *pos += 1;
                return true;
            }

            *pos = 0;
        }

        // every position wrapped around
        self.exhausted = true;
        false
    }

    /// Advance to the next accepted tuple and return its item indices.
    pub fn next_indices(&mut self) -> Option<&[usize]> {
        while self.step() {
            if self.mode.accepts(&self.positions) {
                return Some(self.positions.as_slice());
            }
        }

        None
    }

    /// Items of the current tuple.
    pub fn value(&self) -> Vec<T> {
        self.positions
            .iter()
            .map(|&i| self.items[i].clone())
            .collect()
    }
}

impl<T: Clone> Iterator for CombinatorialIter<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_indices()?;

        Some(self.value())
    }
}

#[test]
fn product_odometer_order_test() {
    let all: Vec<_> = CombinatorialIter::product(vec!['a', 'b', 'c'], 2)
        .unwrap()
        .collect();

    assert_eq!(all.len(), 9);
    assert_eq!(all[0], vec!['a', 'a']);
    assert_eq!(all[1], vec!['a', 'b']);
    assert_eq!(all[2], vec!['a', 'c']);
    assert_eq!(all[3], vec!['b', 'a']);
    assert_eq!(all[8], vec!['c', 'c']);
}

#[test]
fn permutation_count_test() {
    let all: Vec<_> = CombinatorialIter::permutations(vec![1, 2, 3], 2)
        .unwrap()
        .collect();

    assert_eq!(all.len(), 6);
    assert!(all.iter().all(|t| t[0] != t[1]));
    assert_eq!(all[0], vec![1, 2]);
    assert_eq!(all[5], vec![3, 2]);
}

#[test]
fn combination_count_test() {
    let all: Vec<_> = CombinatorialIter::combinations(vec![1, 2, 3], 2)
        .unwrap()
        .collect();

    assert_eq!(all, vec![vec![1, 2], vec![1, 3], vec![2, 3]]);

    let all: Vec<_> = CombinatorialIter::combinations_with_replacement(vec![1, 2, 3], 2)
        .unwrap()
        .collect();

    assert_eq!(all.len(), 6);
    assert!(all.iter().all(|t| t[0] <= t[1]));
}

#[test]
fn single_repeat_test() {
    let all: Vec<_> = CombinatorialIter::combinations(vec![7, 8, 9], 1)
        .unwrap()
        .collect();

    assert_eq!(all, vec![vec![7], vec![8], vec![9]]);
}

#[test]
fn reset_restarts_traversal_test() {
    let mut it = CombinatorialIter::combinations(vec![0usize, 1, 2, 3], 2).unwrap();

    assert_eq!(it.next_indices(), Some(&[0usize, 1][..]));
    assert_eq!(it.next_indices(), Some(&[0usize, 2][..]));

    it.reset();
    assert_eq!(it.next_indices(), Some(&[0usize, 1][..]));
    assert_eq!(it.by_ref().count(), 5);
    assert_eq!(it.next_indices(), None);

    it.reset();
    assert_eq!(it.count(), 6);
}

#[test]
fn invalid_construction_test() {
    assert!(matches!(
        CombinatorialIter::<u8>::product(vec![], 2),
        Err(Error::EmptyItems)
    ));
    assert!(matches!(
        CombinatorialIter::product(vec![1], 0),
        Err(Error::ZeroRepeat)
    ));
    assert!(matches!(
        CombinatorialIter::permutations(vec![1, 2], 3),
        Err(Error::RepeatExceedsItems { repeat: 3, items: 2 })
    ));
    assert!(matches!(
        CombinatorialIter::combinations(vec![1], 2),
        Err(Error::RepeatExceedsItems { .. })
    ));
    assert!(CombinatorialIter::combinations_with_replacement(vec![1], 2).is_ok());
}
