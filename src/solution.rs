// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module defines the `Solution` type: a selection of items identified
//! by their original indices, with incrementally maintained weight, profit
//! and cardinality. A solution holds no reference back to the instance it was
//! derived from; it is a plain value that can be cloned, compared and shared
//! across threads.

use bitset_fixed::BitSet;

use crate::common::{Item, ItemPos, Profit, Weight};

/// A selection of items. Items are identified by their *original* index, so
/// a solution remains meaningful while the instance reorders its item vector.
///
/// # Example
/// ```
/// # use balknap::common::Item;
/// # use balknap::solution::Solution;
/// let mut sol = Solution::new(3);
/// sol.set(&Item { j: 0, w: 2, p: 3 }, true);
/// sol.set(&Item { j: 2, w: 4, p: 5 }, true);
/// assert_eq!(2, sol.item_number());
/// assert_eq!(6, sol.weight());
/// assert_eq!(8, sol.profit());
/// assert!(sol.contains(0) && !sol.contains(1) && sol.contains(2));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Solution {
    /// One bit per original item index.
    taken: BitSet,
    /// The total number of items the selection may address.
    n: usize,
    /// The number of selected items.
    count: usize,
    /// The total weight of the selected items.
    weight: Weight,
    /// The total profit of the selected items.
    profit: Profit,
}

impl Solution {
    /// Creates an empty solution able to address `n` items.
    pub fn new(n: usize) -> Solution {
        Solution {
            taken: BitSet::new(n),
            n,
            count: 0,
            weight: 0,
            profit: 0,
        }
    }
    /// Returns the number of selected items.
    pub fn item_number(&self) -> usize {
        self.count
    }
    /// Returns the total weight of the selected items.
    pub fn weight(&self) -> Weight {
        self.weight
    }
    /// Returns the total profit of the selected items.
    pub fn profit(&self) -> Profit {
        self.profit
    }
    /// Returns true iff the item with original index `j` is selected.
    pub fn contains(&self, j: ItemPos) -> bool {
        self.taken[j as usize]
    }
    /// Selects (`value == true`) or deselects (`value == false`) the given
    /// item, adjusting the running totals. Re-selecting an item that is
    /// already in (resp. out of) the requested state is a no-op; this way the
    /// transformations that sweep a whole window may blindly reset it.
    pub fn set(&mut self, item: &Item, value: bool) {
        let idx = item.j as usize;
        if self.taken[idx] == value {
            return;
        }
        self.taken.set(idx, value);
        if value {
            self.count += 1;
            self.weight += item.w;
            self.profit += item.p;
        } else {
            self.count -= 1;
            self.weight -= item.w;
            self.profit -= item.p;
        }
    }
    /// Deselects every item.
    pub fn clear(&mut self) {
        self.taken = BitSet::new(self.n);
        self.count = 0;
        self.weight = 0;
        self.profit = 0;
    }
    /// Replaces this solution by `other` iff `other` is strictly more
    /// profitable. Returns true iff the replacement occurred.
    pub fn update(&mut self, other: &Solution) -> bool {
        if other.profit > self.profit {
            *self = other.clone();
            true
        } else {
            false
        }
    }
    /// Returns the original indices of the selected items, in increasing
    /// order.
    pub fn items(&self) -> Vec<ItemPos> {
        (0..self.n)
            .filter(|&i| self.taken[i])
            .map(|i| i as ItemPos)
            .collect()
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
