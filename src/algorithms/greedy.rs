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

//! The greedy lower bound: the break solution improved by the single best of
//! two local exchanges. The *backward* exchange removes one item of the break
//! prefix to make room for the break item; the *forward* exchange adds one
//! item located after the break item into the residual capacity. Since every
//! candidate is a feasible solution, the result is a valid lower bound.

use crate::common::{ItemPos, Profit};
use crate::instance::Instance;
use crate::solution::Solution;

/// Computes the greedy solution of a (at least partially) sorted instance.
pub fn greedy(instance: &Instance) -> Solution {
    debug_assert!(instance.break_item() != -1);
    let mut sol = match instance.break_solution() {
        Some(sol) => sol.clone(),
        None => Solution::new(instance.item_number()),
    };
    let b = instance.break_item();
    if b < instance.last_item() {
        let bit = *instance.item(b);
        let mut best: Option<(Profit, ItemPos)> = None;

        // backward: free enough room for the break item by removing one item
        // of the break prefix
        let rb = instance.capacity() - sol.weight() - bit.w;
        for i in instance.first_item()..=b {
            let it = instance.item(i);
            let gain = bit.p - it.p;
            if rb + it.w >= 0 && gain > best.map_or(0, |(g, _)| g) {
                best = Some((gain, i));
            }
        }

        // forward: add one item of the tail into the residual capacity
        let rf = instance.capacity() - sol.weight();
        for i in b + 1..=instance.last_item() {
            let it = instance.item(i);
            if it.w <= rf && it.p > best.map_or(0, |(g, _)| g) {
                best = Some((it.p, i));
            }
        }

        match best {
            None => {}
            Some((_, j)) if j <= b => {
                sol.set(&bit, true);
                let out = *instance.item(j);
                sol.set(&out, false);
            }
            Some((_, j)) => {
                let add = *instance.item(j);
                sol.set(&add, true);
            }
        }
    }
    sol
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_greedy {
    use crate::algorithms::greedy::greedy;
    use crate::instance::Instance;

    #[test]
    fn without_improving_exchange_the_greedy_solution_is_the_break_solution() {
        let mut instance = Instance::new(5, &[(2, 3), (3, 4), (4, 5), (5, 6)]).unwrap();
        instance.sort_partially();
        let sol = greedy(&instance);
        assert_eq!(7, sol.profit());
        assert_eq!(5, sol.weight());
    }
    #[test]
    fn the_forward_exchange_packs_a_tail_item_into_the_residual() {
        // sorted: (4,8) (5,6) (3,1); capacity 8 -> break solution {(4,8)}
        // with residual 4, and the tail item (3,1) fits.
        let mut instance = Instance::new(8, &[(4, 8), (5, 6), (3, 1)]).unwrap();
        instance.sort_partially();
        let sol = greedy(&instance);
        assert_eq!(9, sol.profit());
        assert!(sol.weight() <= 8);
    }
    #[test]
    fn the_backward_exchange_swaps_a_prefix_item_for_the_break_item() {
        // sorted: (3,5) (4,6) (10,1); capacity 6. The break solution is
        // {(3,5)} with residual 3 and break item (4,6). Removing (3,5) frees
        // enough room for (4,6) and gains 1; nothing fits forward.
        let mut instance = Instance::new(6, &[(3, 5), (4, 6), (10, 1)]).unwrap();
        instance.sort_partially();
        let sol = greedy(&instance);
        assert_eq!(6, sol.profit());
        assert_eq!(4, sol.weight());
        assert!(sol.contains(1) && !sol.contains(0));
    }
    #[test]
    fn the_greedy_solution_is_always_feasible() {
        for seed in 0..30i64 {
            let items: Vec<(i64, i64)> = (0..12)
                .map(|i| {
                    let x = seed * 83 + i * 29;
                    (1 + (x * 7 + 5) % 18, 1 + (x * 11 + 3) % 22)
                })
                .collect();
            let capacity = 5 + (seed * 19) % 60;
            let mut instance = Instance::new(capacity, &items).unwrap();
            instance.sort_partially();
            let sol = greedy(&instance);
            assert!(sol.weight() <= capacity, "seed {}", seed);
        }
    }
}
