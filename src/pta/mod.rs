// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use crate::graph::constraint_graph::{ConstraintEdgeId, ConstraintNodeId};
use crate::pts_set::points_to::HybridPointsToSet;
use crate::pts_set::pt_data::DiffPTData;

pub mod andersen;
pub mod propagator;

pub type NodeId = ConstraintNodeId;
pub type EdgeId = ConstraintEdgeId;
pub type PointsTo<T> = HybridPointsToSet<T>;
pub type DiffPTDataTy = DiffPTData<NodeId, NodeId, PointsTo<NodeId>>;

pub trait PointerAnalysis {
    /// Runs the analysis to a fixpoint.
    fn analyze(&mut self);
}
