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

//! This module provides the upper bound calculators used by the reductions
//! and by the dynamic programming engine. All of them are pure functions over
//! integer arithmetic.
//!
//! - `ub_dantzig` is the linear relaxation value of the whole instance: the
//!   break solution completed with a fractional share of the break item.
//! - `ub_dembo` is the localized variant: given a partial profit and a
//!   non-negative residual capacity, it fills the residual fractionally at
//!   the efficiency of a chosen reference item.
//! - `ub_dembo_rev` is the mirror case for *overfull* states (negative
//!   residual): it empties the excess fractionally at the efficiency of the
//!   reference item, rounding so that the result stays an upper bound.

use crate::common::{ItemPos, Profit, SortStatus, Weight};
use crate::instance::Instance;

/// The Dantzig upper bound of the instance: break solution profit plus the
/// fractional completion by the break item. Only meaningful once a break
/// item has been computed (the instance is at least partially sorted).
pub fn ub_dantzig(instance: &Instance) -> Profit {
    debug_assert!(instance.sort_status() >= SortStatus::PartiallySorted);
    let b = instance.break_item();
    let r = instance.break_capacity();
    let mut p = instance.reduced_profit() + instance.break_profit();
    if b <= instance.last_item() && r > 0 {
        let item = instance.item(b);
        p += (item.p * r) / item.w;
    }
    p
}

/// The Dembo upper bound for a state with cumulative profit `pi` and
/// residual capacity `r >= 0`, using the item at position `j` as the slope of
/// the fractional relaxation. When `j` lies past the active window, no item
/// remains to fill the residual and the bound degrades to `pi`.
pub fn ub_dembo(instance: &Instance, j: ItemPos, pi: Profit, r: Weight) -> Profit {
    if j <= instance.last_item() {
        let item = instance.item(j);
        pi + (r * item.p) / item.w
    } else {
        pi
    }
}

/// The reverse Dembo upper bound for an *overfull* state (`r < 0`): the
/// excess weight must be removed, and removing it costs at least the profit
/// it carries at the efficiency of the reference item `j`. The rounding
/// `(r*p + 1)/w - 1` is the ceiling of the (negative) fractional correction,
/// so the result remains a valid upper bound. When `j` lies before the
/// active window, no removable item remains and the bound degrades to `pi`.
pub fn ub_dembo_rev(instance: &Instance, j: ItemPos, pi: Profit, r: Weight) -> Profit {
    if j >= instance.first_item() {
        let item = instance.item(j);
        pi + (r * item.p + 1) / item.w - 1
    } else {
        pi
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_dantzig {
    use crate::bounds::ub_dantzig;
    use crate::instance::Instance;

    #[test]
    fn dantzig_is_the_break_profit_plus_a_fractional_share_of_the_break_item() {
        // sorted by efficiency: (2,6) (3,6) (5,5); capacity 6 -> break item
        // is (5,5) with residual 1, hence 12 + (1*5)/5 = 13.
        let mut instance = Instance::new(6, &[(2, 6), (3, 6), (5, 5)]).unwrap();
        instance.sort_partially();
        assert_eq!(13, ub_dantzig(&instance));
    }
    #[test]
    fn dantzig_without_residual_capacity_is_the_break_profit() {
        let mut instance = Instance::new(5, &[(2, 6), (3, 6), (5, 5)]).unwrap();
        instance.sort_partially();
        assert_eq!(12, ub_dantzig(&instance));
    }
    #[test]
    fn dantzig_when_all_items_fit_is_the_total_profit() {
        let mut instance = Instance::new(100, &[(2, 6), (3, 6), (5, 5)]).unwrap();
        instance.sort_partially();
        assert_eq!(17, ub_dantzig(&instance));
    }
    #[test]
    fn dantzig_dominates_the_optimum() {
        let mut instance =
            Instance::new(10, &[(2, 3), (3, 4), (4, 5), (5, 6), (6, 7)]).unwrap();
        instance.sort_partially();
        // optimum is 13: items (2,3)+(3,4)+(4,5) weigh 9 and bring 12, while
        // (4,5)+(5,6) weigh 9 and bring 11; best is (2,3)+(3,4)+(5,6) = 13.
        assert!(ub_dantzig(&instance) >= 13);
    }
}
