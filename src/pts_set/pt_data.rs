// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use super::points_to::PointsToSet;
use crate::util::bit_vec::Idx;

/// Diff points-to data.
///
/// The points-to set of every key is split in two: the diff part holds
/// elements that have been added but not yet propagated along the key's
/// outgoing constraints, the propa part holds elements that have been.
/// Only the diff is pushed through the graph when a key is processed,
/// so each (key, element) pair is handled once.
///
/// K  (Key):     "owning" variable of a points-to set.
/// D  (Data):    elements in points-to sets.
/// DS (DataSet): the points-to set; a collection of Data.
pub struct DiffPTData<K, D, DS> {
    /// Diff points-to to be propagated.
    pub(crate) diff_pts_map: HashMap<K, DS>,
    /// Points-to already propagated.
    pub(crate) propa_pts_map: HashMap<K, DS>,

    marker: PhantomData<D>,
}

impl<K, D, DS> fmt::Debug for DiffPTData<K, D, DS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "DiffPTData".fmt(f)
    }
}

impl<K, D, DS> DiffPTData<K, D, DS>
where
    K: Hash + Eq + Copy,
    D: Idx,
    DS: PointsToSet<D> + Clone + fmt::Debug,
{
    pub fn new() -> DiffPTData<K, D, DS> {
        DiffPTData {
            diff_pts_map: HashMap::new(),
            propa_pts_map: HashMap::new(),
            marker: PhantomData,
        }
    }

    /// Creates points-to data with an empty set for each of `vars`.
    pub fn with_keys<I: IntoIterator<Item = K>>(vars: I) -> DiffPTData<K, D, DS> {
        let mut pt_data = Self::new();
        for var in vars {
            pt_data.init_pts(var);
        }
        pt_data
    }

    /// Makes sure `var` owns a (possibly empty) points-to set.
    #[inline]
    pub fn init_pts(&mut self, var: K) {
        self.diff_pts_map.entry(var).or_insert_with(DS::new);
        self.propa_pts_map.entry(var).or_insert_with(DS::new);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.diff_pts_map.clear();
        self.propa_pts_map.clear();
    }

    /// Adds element to the points-to set associated with var.
    /// Returns false if elem is already in this set.
    #[inline]
    pub fn add_pts(&mut self, var: K, elem: D) -> bool {
        if let Some(propa) = self.propa_pts_map.get(&var) {
            if propa.contains(elem) {
                return false;
            }
        }
        self.diff_pts_map.entry(var).or_insert_with(DS::new).insert(elem)
    }

    /// Performs diff_pts(dst_var) = diff_pts(dst_var) U (src_ds - propa_pts(dst_var)).
    /// Returns true if the points-to set of `dst_var` grew.
    pub fn union_pts_to(&mut self, dst_var: K, src_ds: &DS) -> bool {
        let propa = self.propa_pts_map.entry(dst_var).or_insert_with(DS::new);
        let mut new = src_ds.clone();
        new.subtract(propa);
        if new.is_empty() {
            return false;
        }
        self.diff_pts_map.entry(dst_var).or_insert_with(DS::new).union(&new)
    }

    /// Returns true if `elem` is in the points-to set of `var`.
    pub fn contains(&self, var: K, elem: D) -> bool {
        self.propa_pts_map.get(&var).map_or(false, |pts| pts.contains(elem))
            || self.diff_pts_map.get(&var).map_or(false, |pts| pts.contains(elem))
    }

    /// Get diff points to.
    #[inline]
    pub fn get_diff_pts(&self, var: K) -> Option<&DS> {
        self.diff_pts_map.get(&var)
    }

    /// Get propagated points to.
    #[inline]
    pub fn get_propa_pts(&self, var: K) -> Option<&DS> {
        self.propa_pts_map.get(&var)
    }

    /// Returns the whole points-to set of `var`, both propagated and pending.
    pub fn get_pts(&self, var: K) -> DS {
        let mut pts = match self.propa_pts_map.get(&var) {
            Some(propa) => propa.clone(),
            None => DS::new(),
        };
        if let Some(diff) = self.diff_pts_map.get(&var) {
            pts.union(diff);
        }
        pts
    }

    /// Moves all diff elems of `var` into its propagated set and returns them.
    pub fn flush(&mut self, var: K) -> DS {
        let diff = match self.diff_pts_map.get_mut(&var) {
            Some(diff) => std::mem::replace(diff, DS::new()),
            None => return DS::new(),
        };
        self.propa_pts_map.entry(var).or_insert_with(DS::new).union(&diff);
        diff
    }

    /// Iterates over every key with a points-to entry.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.propa_pts_map.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.propa_pts_map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.propa_pts_map.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::DiffPTData;
    use crate::pts_set::points_to::{HybridPointsToSet, PointsToSet};

    type TestPTData = DiffPTData<u32, u32, HybridPointsToSet<u32>>;

    fn elems(pts: &HybridPointsToSet<u32>) -> HashSet<u32> {
        pts.iter().collect()
    }

    #[test]
    fn keys_are_prepopulated() {
        let pt_data = TestPTData::with_keys([1, 2, 3]);
        assert_eq!(pt_data.len(), 3);
        assert!(pt_data.get_pts(2).is_empty());
        assert!(pt_data.get_propa_pts(3).is_some());
        // Untouched keys read as empty sets.
        assert!(pt_data.get_pts(42).is_empty());
    }

    #[test]
    fn add_after_flush_is_not_new() {
        let mut pt_data = TestPTData::with_keys([1]);
        assert!(pt_data.add_pts(1, 10));
        assert!(!pt_data.add_pts(1, 10));
        let diff = pt_data.flush(1);
        assert_eq!(elems(&diff), HashSet::from([10]));
        assert!(pt_data.get_diff_pts(1).unwrap().is_empty());
        assert!(!pt_data.add_pts(1, 10));
        assert!(pt_data.contains(1, 10));
        assert!(pt_data.flush(1).is_empty());
    }

    #[test]
    fn union_only_keeps_unpropagated_elements_in_diff() {
        let mut pt_data = TestPTData::with_keys([1, 2]);
        pt_data.add_pts(1, 10);
        pt_data.flush(1);

        let src: HybridPointsToSet<u32> = [10, 11, 12].into_iter().collect();
        assert!(pt_data.union_pts_to(1, &src));
        assert!(!pt_data.union_pts_to(1, &src));
        assert_eq!(elems(pt_data.get_diff_pts(1).unwrap()), HashSet::from([11, 12]));
        assert_eq!(elems(&pt_data.get_pts(1)), HashSet::from([10, 11, 12]));
    }
}
