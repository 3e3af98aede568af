// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::slice;

use crate::util::bit_vec::{BitIter, BitVec, Idx};

/// Sets up to this size are kept as a plain vector.
const SMALL_SET_CAPACITY: usize = 32;

pub trait PointsToSet<T> {
    type Iter<'a>: Iterator<Item = T>
    where
        Self: 'a;

    fn new() -> Self;
    fn clear(&mut self);
    fn count(&self) -> usize;
    fn contains(&self, elem: T) -> bool;
    fn is_empty(&self) -> bool;
    fn superset(&self, other: &Self) -> bool;
    fn insert(&mut self, elem: T) -> bool;
    fn union(&mut self, other: &Self) -> bool;
    fn subtract(&mut self, other: &Self) -> bool;
    fn iter<'a>(&'a self) -> Self::Iter<'a>;
}

/// Points-to set stored as a vector while small and as a bit vector
/// once it outgrows `SMALL_SET_CAPACITY`.
#[derive(Clone)]
pub struct HybridPointsToSet<T> {
    points_to: HybridSet<T>,
}

impl<T: Idx> fmt::Debug for HybridPointsToSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.points_to.fmt(f)
    }
}

impl<T: Idx> Default for HybridPointsToSet<T> {
    fn default() -> Self {
        <Self as PointsToSet<T>>::new()
    }
}

impl<'a, T: Idx> IntoIterator for &'a HybridPointsToSet<T> {
    type Item = T;
    type IntoIter = HybridIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points_to.iter()
    }
}

impl<T: Idx> FromIterator<T> for HybridPointsToSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = <Self as PointsToSet<T>>::new();
        for elem in iter {
            set.insert(elem);
        }
        set
    }
}

impl<T: Idx> PointsToSet<T> for HybridPointsToSet<T> {
    type Iter<'a> = HybridIter<'a, T>;

    fn new() -> Self {
        HybridPointsToSet {
            points_to: HybridSet::SmallSet(Vec::new()),
        }
    }

    fn clear(&mut self) {
        self.points_to = HybridSet::SmallSet(Vec::new());
    }

    fn count(&self) -> usize {
        match &self.points_to {
            HybridSet::SmallSet(small) => small.len(),
            HybridSet::LargeSet(large) => large.count(),
        }
    }

    fn contains(&self, elem: T) -> bool {
        self.points_to.contains(elem)
    }

    fn is_empty(&self) -> bool {
        match &self.points_to {
            HybridSet::SmallSet(small) => small.is_empty(),
            HybridSet::LargeSet(large) => large.is_empty(),
        }
    }

    /// Is `self` a superset of `other`?
    fn superset(&self, other: &Self) -> bool {
        match (&self.points_to, &other.points_to) {
            (HybridSet::LargeSet(a), HybridSet::LargeSet(b)) => a.superset(b),
            _ => other.iter().all(|elem| self.contains(elem)),
        }
    }

    /// Adds `elem`, returns true if it was not already in the set.
    fn insert(&mut self, elem: T) -> bool {
        self.points_to.insert(elem)
    }

    fn union(&mut self, other: &Self) -> bool {
        match &other.points_to {
            HybridSet::SmallSet(b) => {
                let mut changed = false;
                for &elem in b.iter() {
                    changed |= self.points_to.insert(elem);
                }
                changed
            }
            HybridSet::LargeSet(b) => match &mut self.points_to {
                HybridSet::LargeSet(a) => a.union(b),
                HybridSet::SmallSet(a) => {
                    let mut large = BitVec::new_empty();
                    for elem in a.iter() {
                        large.insert(*elem);
                    }
                    let changed = large.union(b);
                    self.points_to = HybridSet::LargeSet(large);
                    changed
                }
            },
        }
    }

    fn subtract(&mut self, other: &Self) -> bool {
        match &mut self.points_to {
            HybridSet::LargeSet(a) => match &other.points_to {
                HybridSet::LargeSet(b) => a.subtract(b),
                HybridSet::SmallSet(b) => {
                    let mut changed = false;
                    for &elem in b.iter() {
                        changed |= a.remove(elem);
                    }
                    changed
                }
            },
            HybridSet::SmallSet(a) => {
                let before = a.len();
                a.retain(|&elem| !other.points_to.contains(elem));
                a.len() != before
            }
        }
    }

    fn iter(&self) -> HybridIter<'_, T> {
        self.points_to.iter()
    }
}

#[derive(Clone)]
enum HybridSet<T> {
    SmallSet(Vec<T>),
    LargeSet(BitVec<T>),
}

impl<T: Idx> fmt::Debug for HybridSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallSet(s) => s.fmt(f),
            Self::LargeSet(s) => s.fmt(f),
        }
    }
}

impl<T: Idx> HybridSet<T> {
    fn contains(&self, elem: T) -> bool {
        match self {
            HybridSet::SmallSet(small) => small.contains(&elem),
            HybridSet::LargeSet(large) => large.contains(elem),
        }
    }

    fn insert(&mut self, elem: T) -> bool {
        match self {
            HybridSet::SmallSet(small) if small.contains(&elem) => false,
            HybridSet::SmallSet(small) if small.len() < SMALL_SET_CAPACITY => {
                small.push(elem);
                true
            }
            HybridSet::SmallSet(small) => {
                // Full small set, switch to the dense representation.
                let mut large = BitVec::new_empty();
                for elem in small.iter() {
                    large.insert(*elem);
                }
                large.insert(elem);
                *self = HybridSet::LargeSet(large);
                true
            }
            HybridSet::LargeSet(large) => large.insert(elem),
        }
    }

    fn iter(&self) -> HybridIter<'_, T> {
        match self {
            HybridSet::SmallSet(small) => HybridIter::SmallIter(small.iter()),
            HybridSet::LargeSet(large) => HybridIter::LargeIter(large.iter()),
        }
    }
}

pub enum HybridIter<'a, T: Idx> {
    SmallIter(slice::Iter<'a, T>),
    LargeIter(BitIter<'a, T>),
}

impl<'a, T: Idx> Iterator for HybridIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self {
            HybridIter::SmallIter(small) => small.next().copied(),
            HybridIter::LargeIter(large) => large.next(),
        }
    }
}
