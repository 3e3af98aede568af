// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Whole-program, inclusion-based (Andersen) points-to analysis over a
//! prebuilt constraint graph, and resolution of function-pointer calls
//! into a call graph.

#![allow(
    clippy::single_match,
    clippy::needless_return,
    clippy::len_zero,
    clippy::new_without_default
)]

pub mod builder;
pub mod graph;
pub mod pta;
pub mod pts_set;
pub mod util;
