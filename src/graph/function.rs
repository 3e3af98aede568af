// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Functions and call sites known to the constraint graph.

use std::fmt;

use crate::util::bit_vec::Idx;

/// Dense index of a function in the constraint graph's function table.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(u32);

impl Idx for FuncId {
    #[inline]
    fn new(idx: usize) -> Self {
        FuncId(u32::new(idx))
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Dense index of a call site in the constraint graph's call-site table.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSiteId(u32);

impl Idx for CallSiteId {
    #[inline]
    fn new(idx: usize) -> Self {
        CallSiteId(u32::new(idx))
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct CallSite {
    /// A human readable label, e.g. the source location of the call.
    pub label: String,
    /// The function containing the call, if known.
    pub caller: Option<FuncId>,
}

impl CallSite {
    pub fn new(label: String, caller: Option<FuncId>) -> Self {
        CallSite { label, caller }
    }
}
