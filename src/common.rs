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

//! This module defines the most basic data types that are used throughout all
//! the code of this library. These are also the types a client library is
//! likely to work with.
//!
//! In particular, this module comprises the definition of the following types:
//! - `Weight`, `Profit`, `ItemPos`, `StateCount` (scalar aliases)
//! - `Item`
//! - `Interval`
//! - `SortStatus`

use std::cmp::Ordering;
use std::fmt;

// ----------------------------------------------------------------------------
// --- SCALAR TYPES -----------------------------------------------------------
// ----------------------------------------------------------------------------
/// The weight of an item, or a sum of item weights. All weights are assumed
/// non-negative and all weight sums are assumed to fit within this type.
pub type Weight = i64;
/// The profit of an item, or a sum of item profits. All profits are assumed
/// non-negative and all profit sums are assumed to fit within this type.
pub type Profit = i64;
/// The position of an item inside the item store. This type is *signed*
/// because `f - 1` and `l + 1` are meaningful sentinel positions in several
/// of the algorithms (they denote "before the window" and "past the window").
pub type ItemPos = isize;
/// The number of states held by the dynamic programming engine. Thresholds
/// expressed in this type use `-1` to mean "disabled".
pub type StateCount = i64;

// ----------------------------------------------------------------------------
// --- ITEM -------------------------------------------------------------------
// ----------------------------------------------------------------------------
/// One item of a knapsack instance. The field `j` is the *original* index of
/// the item, which remains stable while the store reorders its item vector;
/// solutions are always expressed in terms of original indices.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Item {
    /// The original index of the item, as given at instance creation.
    pub j: ItemPos,
    /// The weight of the item.
    pub w: Weight,
    /// The profit of the item.
    pub p: Profit,
}
impl Item {
    /// Returns true iff this item is strictly more efficient (higher
    /// profit-to-weight ratio) than `other`. The comparison is carried out
    /// with a cross multiplication so that no floating point is involved.
    ///
    /// # Example
    /// ```
    /// # use balknap::common::Item;
    /// let cheap = Item { j: 0, w: 2, p: 3 };
    /// let dear  = Item { j: 1, w: 4, p: 5 };
    /// assert!(cheap.is_more_efficient_than(&dear));
    /// assert!(!dear.is_more_efficient_than(&cheap));
    /// ```
    pub fn is_more_efficient_than(&self, other: &Item) -> bool {
        self.p * other.w > other.p * self.w
    }
}
impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "j {} w {} p {}", self.j, self.w, self.p)
    }
}

/// The ordering used whenever a range of items must be arranged by strictly
/// decreasing efficiency (most profitable per unit of weight first). Ties are
/// left in their relative order by the stable sorts using this comparator.
pub fn by_decreasing_efficiency(i1: &Item, i2: &Item) -> Ordering {
    (i2.p * i1.w).cmp(&(i1.p * i2.w))
}

// ----------------------------------------------------------------------------
// --- INTERVAL ---------------------------------------------------------------
// ----------------------------------------------------------------------------
/// An inclusive run `[f, l]` of item positions. Intervals are the unit of
/// deferred sorting: the partial sort leaves contiguous bands of items whose
/// exact efficiency order is only refined on demand.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Interval {
    /// First position of the run (inclusive).
    pub f: ItemPos,
    /// Last position of the run (inclusive).
    pub l: ItemPos,
}
impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.f, self.l)
    }
}

// ----------------------------------------------------------------------------
// --- SORT STATUS ------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The degree to which the active window of an instance is ordered by
/// efficiency.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum SortStatus {
    /// No ordering guarantee holds.
    Unsorted,
    /// The break item is in place and every item left (resp. right) of it is
    /// at least (resp. at most) as efficient; the outskirts are organized in
    /// coarse efficiency bands awaiting on-demand refinement.
    PartiallySorted,
    /// The whole active window is sorted by decreasing efficiency.
    FullySorted,
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_item {
    use crate::common::{by_decreasing_efficiency, Item};
    use std::cmp::Ordering;

    #[test]
    fn more_efficient_is_strict() {
        let a = Item { j: 0, w: 2, p: 3 };
        let b = Item { j: 1, w: 4, p: 6 };
        // same ratio: neither dominates the other
        assert!(!a.is_more_efficient_than(&b));
        assert!(!b.is_more_efficient_than(&a));
    }
    #[test]
    fn efficiency_comparison_avoids_rounding() {
        // 1000000/999999 vs 1000001/1000000: too close for a f32 but the
        // cross multiplication tells them apart.
        let a = Item { j: 0, w: 999_999, p: 1_000_000 };
        let b = Item { j: 1, w: 1_000_000, p: 1_000_001 };
        assert!(!a.is_more_efficient_than(&b));
        assert!(b.is_more_efficient_than(&a));
    }
    #[test]
    fn decreasing_efficiency_puts_the_most_efficient_item_first() {
        let mut items = vec![
            Item { j: 0, w: 5, p: 5 },
            Item { j: 1, w: 2, p: 4 },
            Item { j: 2, w: 3, p: 3 },
        ];
        items.sort_by(by_decreasing_efficiency);
        assert_eq!(vec![1, 0, 2], items.iter().map(|i| i.j).collect::<Vec<_>>());
    }
    #[test]
    fn decreasing_efficiency_is_stable_on_ties() {
        let mut items = vec![
            Item { j: 0, w: 2, p: 2 },
            Item { j: 1, w: 3, p: 3 },
            Item { j: 2, w: 1, p: 1 },
        ];
        items.sort_by(by_decreasing_efficiency);
        assert_eq!(vec![0, 1, 2], items.iter().map(|i| i.j).collect::<Vec<_>>());
    }
    #[test]
    fn zero_weight_items_compare_greater_than_anything() {
        let free = Item { j: 0, w: 0, p: 1 };
        let any = Item { j: 1, w: 3, p: 100 };
        assert!(free.is_more_efficient_than(&any));
        assert_eq!(Ordering::Less, by_decreasing_efficiency(&free, &any));
    }
}

#[cfg(test)]
mod test_interval {
    use crate::common::Interval;

    #[test]
    fn intervals_display_like_closed_ranges() {
        let interval = Interval { f: 3, l: 8 };
        assert_eq!("[3,8]", format!("{}", interval));
    }
}

#[cfg(test)]
mod test_sort_status {
    use crate::common::SortStatus;

    #[test]
    fn sort_statuses_are_totally_ordered_by_strength() {
        assert!(SortStatus::Unsorted < SortStatus::PartiallySorted);
        assert!(SortStatus::PartiallySorted < SortStatus::FullySorted);
    }
}
