// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::VecDeque;
use std::fmt::{Debug, Formatter, Result};

use super::bit_vec::{BitVec, Idx};

/// FIFO worklist of dirty nodes. A node is queued at most once at a time.
pub struct Worklist<T: Idx> {
    queue: VecDeque<T>,
    queued: BitVec<T>,
}

impl<T: Idx> Debug for Worklist<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_list().entries(self.queue.iter()).finish()
    }
}

impl<T: Idx> Default for Worklist<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Idx> Worklist<T> {
    pub fn new() -> Self {
        Worklist {
            queue: VecDeque::new(),
            queued: BitVec::new_empty(),
        }
    }

    /// Enqueues `elem`. Returns false if it was already waiting in the queue.
    pub fn push(&mut self, elem: T) -> bool {
        if self.queued.insert(elem) {
            self.queue.push_back(elem);
            true
        } else {
            false
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        let elem = self.queue.pop_front()?;
        self.queued.remove(elem);
        Some(elem)
    }

    #[inline]
    pub fn contains(&self, elem: T) -> bool {
        self.queued.contains(elem)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
