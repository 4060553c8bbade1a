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

//! The `O(n log n)` exchange lower bound. Both variants start from the break
//! solution and look for the best single swap between a taken item and a left
//! out one; the candidates on each side are first sorted by weight and pruned
//! of dominated items (heavier but not more profitable), which makes the scan
//! a two-pointer sweep. The *forward* variant keeps the selection feasible
//! throughout; the *backward* variant first forces the break item in and
//! looks for the swap restoring feasibility.

use crate::algorithms::greedy::greedy;
use crate::common::{Item, Profit};
use crate::instance::Instance;
use crate::solution::Solution;

/// Keeps, from a weight-sorted list, only the items that are not dominated:
/// an item dominates any heavier item that does not bring strictly more
/// profit.
fn remove_dominated_items(items: &[Item]) -> Vec<Item> {
    let mut kept: Vec<Item> = vec![];
    for &item in items {
        match kept.last_mut() {
            Some(last) if item.w == last.w && item.p > last.p => *last = item,
            Some(last) if !(item.w > last.w && item.p > last.p) => {}
            _ => kept.push(item),
        }
    }
    kept
}

fn taken_and_left(instance: &Instance, sol: &Solution) -> (Vec<Item>, Vec<Item>) {
    let mut taken: Vec<Item> = vec![];
    let mut left: Vec<Item> = vec![];
    for j in 0..instance.item_number() {
        let it = *instance.item(j as isize);
        if sol.contains(it.j) {
            taken.push(it);
        } else {
            left.push(it);
        }
    }
    taken.sort_by(|a, b| a.w.cmp(&b.w));
    left.sort_by(|a, b| a.w.cmp(&b.w));
    (taken, left)
}

/// Applies the best profitable swap between a taken and a left out item that
/// keeps the solution feasible. Returns true iff a swap was applied.
fn best_exchange(sol: &mut Solution, instance: &Instance) -> bool {
    let (taken, left) = taken_and_left(instance, sol);
    let taken = remove_dominated_items(&taken);
    let left = remove_dominated_items(&left);

    let r = instance.capacity() - sol.weight();
    let mut best: Option<(Profit, Item, Item)> = None;
    let mut i2 = 0usize;
    for &out in &taken {
        while i2 < left.len() && left[i2].w <= out.w + r {
            i2 += 1;
        }
        if i2 == 0 {
            continue;
        }
        let inn = left[i2 - 1];
        let gain = inn.p - out.p;
        if gain > best.map_or(-1, |(g, _, _)| g) {
            best = Some((gain, out, inn));
        }
    }
    match best {
        None => false,
        Some((_, out, inn)) => {
            sol.set(&out, false);
            sol.set(&inn, true);
            true
        }
    }
}

/// Applies, to an *overfull* solution, the swap between a taken and a left
/// out item that restores feasibility with the best profit delta. Returns
/// true iff a swap was applied.
fn best_exchange_back(sol: &mut Solution, instance: &Instance) -> bool {
    let (taken, left) = taken_and_left(instance, sol);
    let taken = remove_dominated_items(&taken);
    let left = remove_dominated_items(&left);

    let r = instance.capacity() - sol.weight();
    debug_assert!(r < 0);
    let mut best: Option<(Profit, Item, Item)> = None;
    let mut i2 = 0usize;
    for &out in &taken {
        if out.w <= -r {
            continue;
        }
        while i2 < left.len() && left[i2].w <= out.w + r {
            i2 += 1;
        }
        if i2 == 0 {
            continue;
        }
        let inn = left[i2 - 1];
        let gain = inn.p - out.p;
        if best.map_or(true, |(g, _, _)| gain > g) {
            best = Some((gain, out, inn));
        }
    }
    match best {
        None => false,
        Some((_, out, inn)) => {
            sol.set(&out, false);
            sol.set(&inn, true);
            true
        }
    }
}

/// The break solution improved by the best feasibility-preserving swap.
pub fn forward_greedy_best(instance: &Instance) -> Solution {
    let mut sol = match instance.break_solution() {
        Some(sol) => sol.clone(),
        None => Solution::new(instance.item_number()),
    };
    best_exchange(&mut sol, instance);
    sol
}

/// The break solution extended with the break item, then repaired by the
/// best feasibility-restoring swap. Falls back to the break solution when no
/// swap can repair the overflow.
pub fn backward_greedy_best(instance: &Instance) -> Solution {
    let mut sol = match instance.break_solution() {
        Some(sol) => sol.clone(),
        None => Solution::new(instance.item_number()),
    };
    if instance.break_item() > instance.last_item() {
        return sol;
    }
    let fallback = sol.clone();
    let bit = *instance.item(instance.break_item());
    sol.set(&bit, true);
    if best_exchange_back(&mut sol, instance) {
        sol
    } else {
        fallback
    }
}

/// The best of the greedy solution and both exchange variants.
pub fn bestgreedynlogn(instance: &Instance) -> Solution {
    let mut sol = greedy(instance);
    sol.update(&forward_greedy_best(instance));
    sol.update(&backward_greedy_best(instance));
    sol
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_dominance {
    use crate::algorithms::greedynlogn::remove_dominated_items;
    use crate::common::Item;

    fn item(j: isize, w: i64, p: i64) -> Item {
        Item { j, w, p }
    }

    #[test]
    fn heavier_items_must_bring_strictly_more_profit() {
        let kept = remove_dominated_items(&[item(0, 1, 5), item(1, 2, 5), item(2, 3, 7)]);
        assert_eq!(vec![0, 2], kept.iter().map(|i| i.j).collect::<Vec<_>>());
    }
    #[test]
    fn among_equal_weights_only_the_most_profitable_survives() {
        let kept = remove_dominated_items(&[item(0, 2, 3), item(1, 2, 8), item(2, 2, 5)]);
        assert_eq!(vec![1], kept.iter().map(|i| i.j).collect::<Vec<_>>());
    }
    #[test]
    fn an_empty_list_stays_empty() {
        assert!(remove_dominated_items(&[]).is_empty());
    }
}

#[cfg(test)]
mod test_exchanges {
    use crate::algorithms::greedynlogn::{backward_greedy_best, bestgreedynlogn, forward_greedy_best};
    use crate::instance::Instance;

    fn brute_force(items: &[(i64, i64)], capacity: i64) -> i64 {
        let n = items.len();
        let mut best = 0;
        for mask in 0u32..(1 << n) {
            let mut w = 0;
            let mut p = 0;
            for (i, &(wi, pi)) in items.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    w += wi;
                    p += pi;
                }
            }
            if w <= capacity && p > best {
                best = p;
            }
        }
        best
    }

    #[test]
    fn the_forward_variant_improves_on_the_break_solution_when_a_swap_pays() {
        // sorted: (2,6) (5,7) (6,8); capacity 6. Break solution {(2,6)}
        // with residual 4: swapping (2,6) out for (6,8) nets +2.
        let mut instance = Instance::new(6, &[(2, 6), (5, 7), (6, 8)]).unwrap();
        instance.sort_partially();
        let sol = forward_greedy_best(&instance);
        assert_eq!(8, sol.profit());
        assert!(sol.weight() <= 6);
    }
    #[test]
    fn the_backward_variant_forces_the_break_item_in_and_repairs() {
        // sorted: (4,6) (5,7) (2,1); capacity 7. Break solution {(4,6)} and
        // break item (5,7): forcing it in overflows by 2, and swapping
        // (4,6) out for (2,1) repairs it, for a total profit of 8.
        let mut instance = Instance::new(7, &[(4, 6), (5, 7), (2, 1)]).unwrap();
        instance.sort_partially();
        let sol = backward_greedy_best(&instance);
        assert_eq!(8, sol.profit());
        assert!(sol.weight() <= 7);
    }
    #[test]
    fn all_variants_stay_feasible_and_below_the_optimum() {
        for seed in 0..30i64 {
            let items: Vec<(i64, i64)> = (0..12)
                .map(|i| {
                    let x = seed * 71 + i * 23;
                    (1 + (x * 7 + 1) % 16, 1 + (x * 13 + 5) % 24)
                })
                .collect();
            let capacity = 5 + (seed * 29) % 70;
            let opt = brute_force(&items, capacity);
            let mut instance = Instance::new(capacity, &items).unwrap();
            instance.sort_partially();
            for sol in [
                forward_greedy_best(&instance),
                backward_greedy_best(&instance),
                bestgreedynlogn(&instance),
            ]
            .iter()
            {
                assert!(sol.weight() <= capacity, "seed {}", seed);
                assert!(sol.profit() <= opt, "seed {}", seed);
            }
        }
    }
    #[test]
    fn bestgreedynlogn_dominates_the_plain_greedy() {
        for seed in 0..20i64 {
            let items: Vec<(i64, i64)> = (0..10)
                .map(|i| {
                    let x = seed * 67 + i * 19;
                    (1 + (x * 5 + 1) % 14, 1 + (x * 11 + 7) % 20)
                })
                .collect();
            let capacity = 5 + (seed * 23) % 50;
            let mut instance = Instance::new(capacity, &items).unwrap();
            instance.sort_partially();
            let base = crate::algorithms::greedy::greedy(&instance);
            let best = bestgreedynlogn(&instance);
            assert!(best.profit() >= base.profit(), "seed {}", seed);
        }
    }
}
