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

//! The surrogate-relaxation upper bound. Adding a multiplier `s` to every
//! weight (and `s * k` to the capacity, where `k` bounds the cardinality of
//! the solutions considered) yields a relaxed instance whose Dantzig bound
//! dominates the original optimum; a well chosen `s` makes that bound
//! *tighter* than the plain Dantzig bound. This module binary-searches the
//! multiplier: positive multipliers when at most `b` items fit (greedy by
//! weight), negative ones when any solution beating the lower bound needs at
//! least `b + 1` items (greedy by profit), both otherwise.
//!
//! The search runs on a private copy of the instance and undoes its
//! perturbations on exit. Multiplier candidates that could overflow the
//! weight arithmetic shrink the search interval instead of being evaluated.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bounds::ub_dantzig;
use crate::common::{ItemPos, Profit, Weight};
use crate::instance::Instance;

/// The outcome of the surrogate-relaxation search: the bound itself, the
/// multiplier achieving it and the cardinality bound it was computed with.
#[derive(Copy, Clone, Debug)]
pub struct SurrogateOut {
    /// The relaxed upper bound.
    pub ub: Profit,
    /// The multiplier achieving `ub`.
    pub multiplier: Weight,
    /// The cardinality bound used by the search.
    pub bound: ItemPos,
}

/// The maximum number of items of a feasible solution: the length of the
/// greedy-by-increasing-weight fill. Locates the answer with a quickselect
/// over an index array, falling through to a plain sort on small ranges.
fn max_card(instance: &Instance) -> ItemPos {
    if instance.reduced_item_number() == 1 {
        return 1;
    }
    let mut index: Vec<ItemPos> = (0..instance.item_number() as ItemPos).collect();
    let mut f = instance.first_item();
    let mut l = instance.last_item();
    let mut w: Weight = 0;
    let c = instance.capacity();
    let mut rng = StdRng::seed_from_u64(0);
    while f < l {
        if l - f < 128 {
            index[f as usize..=l as usize].sort_by_key(|&j| instance.item(j).w);
            break;
        }
        let pivot = f + 1 + rng.gen_range(0..(l - f));
        index.swap(pivot as usize, l as usize);
        let mut j = f;
        for i in f..l {
            if instance.item(index[i as usize]).w > instance.item(index[l as usize]).w {
                continue;
            }
            index.swap(i as usize, j as usize);
            j += 1;
        }
        index.swap(j as usize, l as usize);

        let mut w_curr = w;
        for i in f..j {
            w_curr += instance.item(index[i as usize]).w;
        }
        if w_curr + instance.item(index[j as usize]).w <= c {
            f = j + 1;
            w = w_curr + instance.item(index[j as usize]).w;
        } else if w_curr > c {
            l = j - 1;
        } else {
            break;
        }
    }

    let mut k = instance
        .reduced_solution()
        .map_or(0, |sol| sol.item_number() as ItemPos);
    let mut r = instance.capacity();
    for j in instance.first_item()..=instance.last_item() {
        if r < instance.item(index[j as usize]).w {
            k = j;
            break;
        }
        r -= instance.item(index[j as usize]).w;
    }
    k
}

/// The minimum number of items a solution must hold to strictly beat `lb`:
/// the length of the greedy-by-decreasing-profit fill, plus one. Returns -1
/// when even taking everything cannot beat `lb`.
fn min_card(instance: &Instance, lb: Profit) -> ItemPos {
    let lb = lb - instance.reduced_profit();
    let mut index: Vec<ItemPos> = (0..instance.item_number() as ItemPos).collect();
    let mut f = instance.first_item();
    let mut l = instance.last_item();
    let mut p: Profit = 0;
    let mut rng = StdRng::seed_from_u64(0);
    while f < l {
        if l - f < 128 {
            index[f as usize..=l as usize]
                .sort_by(|&a, &b| instance.item(b).p.cmp(&instance.item(a).p));
            break;
        }
        let pivot = f + 1 + rng.gen_range(0..(l - f));
        index.swap(pivot as usize, l as usize);
        let mut j = f;
        for i in f..l {
            if instance.item(index[i as usize]).p < instance.item(index[l as usize]).p {
                continue;
            }
            index.swap(i as usize, j as usize);
            j += 1;
        }
        index.swap(j as usize, l as usize);

        let mut p_curr = p;
        for i in f..j {
            p_curr += instance.item(index[i as usize]).p;
        }
        if p_curr > lb {
            l = j - 1;
        } else if p_curr + instance.item(index[j as usize]).p <= lb {
            f = j + 1;
            p = p_curr + instance.item(index[j as usize]).p;
        } else {
            break;
        }
    }

    let mut k: ItemPos = -1;
    let mut z: Profit = 0;
    for j in instance.first_item()..=instance.last_item() {
        if z + instance.item(index[j as usize]).p > lb {
            k = j + 1;
            break;
        }
        z += instance.item(index[j as usize]).p;
    }
    k
}

/// Binary-searches the multiplier in `[s_min, s_max]` for cardinality bound
/// `k`, keeping the best Dantzig bound seen in `out`. One of the interval
/// ends is always 0: positive searches have `s_min == 0`, negative ones
/// `s_max == 0`. Candidates that could overflow the weight arithmetic shrink
/// the interval. The instance perturbation is reverted before returning.
fn ub_surrogate_solve(
    instance: &mut Instance,
    k: ItemPos,
    s_min: Weight,
    s_max: Weight,
    out: &mut SurrogateOut,
    end: Option<&AtomicBool>,
) {
    out.bound = k;
    let first = instance.first_item();
    let mut applied: Weight = 0;
    let mut s1 = s_min;
    let mut s2 = s_max;

    let mut wmax = instance.item(first).w;
    let mut wmin = wmax;
    let mut pmax = instance.item(first).p;
    for j in first + 1..=instance.last_item() {
        let it = instance.item(j);
        if it.w > wmax {
            wmax = it.w;
        }
        if it.w < wmin {
            wmin = it.w;
        }
        if it.p > pmax {
            pmax = it.p;
        }
    }
    let wlim = if pmax > 0 { Weight::MAX / pmax } else { Weight::MAX };
    let n = instance.item_number() as Weight;

    while s1 <= s2 {
        if end.map_or(false, |end| end.load(Ordering::Relaxed)) {
            break;
        }
        let s = (s1 + s2) / 2;

        // overflow guards: refuse the candidate and narrow the interval
        if s_min == 0 && s != 0 {
            if Weight::MAX / s < k as Weight
                || instance.capacity() > Weight::MAX - s * k as Weight
                || Weight::MAX / n < wmax + s
                || wmax + s > wlim
            {
                s2 = s - 1;
                continue;
            } else {
                wmax += s - applied;
            }
        }
        if s_max == 0 && s != 0 {
            let wabs = (wmax + s).max(-(wmin + s));
            if Weight::MAX / -s < k as Weight || Weight::MAX / n < wabs || wabs > wlim {
                s1 = s + 1;
                continue;
            } else {
                wmax += s - applied;
                wmin += s - applied;
            }
        }

        instance.surrogate(s - applied, k, first);
        applied = s;
        let p = ub_dantzig(instance);
        let b = instance.break_item();

        if p < out.ub {
            out.ub = p;
            out.multiplier = s;
        }
        if b == k && instance.break_capacity() == 0 {
            break;
        }
        if b >= k {
            s1 = s + 1;
        } else {
            s2 = s - 1;
        }
    }
    instance.surrogate(-applied, k, first);
    debug_assert!(instance.first_item() == first);
}

/// Computes the surrogate-relaxation upper bound of `instance` given the
/// lower bound `lb`. The caller's instance is left untouched: the search
/// works on a private copy. When an `end` flag is provided, the bisection
/// stops at the next step once the flag is raised.
pub fn ub_surrogate(instance: &Instance, lb: Profit, end: Option<&AtomicBool>) -> SurrogateOut {
    let mut ins = instance.clone();
    ins.sort_partially();
    let b = ins.break_item();

    let mut out = SurrogateOut {
        ub: Profit::MAX,
        multiplier: 0,
        bound: -1,
    };
    if ins.reduced_item_number() == 0 {
        out.ub = ins.reduced_profit();
        return out;
    }
    out.ub = ub_dantzig(&ins);
    if ins.break_capacity() == 0 || b == ins.last_item() + 1 {
        return out;
    }

    // the ideal interval ends are +/- pmax * wmax, unless that overflows
    let wmax = match ins.max_weight_item() {
        Some(j) => ins.item(j).w,
        None => return out,
    };
    let pmax = match ins.max_profit_item() {
        Some(j) => ins.item(j).p,
        None => return out,
    };
    let s_max = if pmax > 0 && Weight::MAX / pmax > wmax {
        pmax * wmax
    } else {
        Weight::MAX
    };
    let s_min = -s_max;

    if max_card(&ins) == b {
        ub_surrogate_solve(&mut ins, b, 0, s_max, &mut out, end);
    } else if min_card(&ins, lb) == b + 1 {
        ub_surrogate_solve(&mut ins, b + 1, s_min, 0, &mut out, end);
        if out.ub < lb {
            out.ub = lb;
        }
    } else {
        let mut out2 = SurrogateOut {
            ub: out.ub,
            multiplier: 0,
            bound: -1,
        };
        ub_surrogate_solve(&mut ins, b, 0, s_max, &mut out, end);
        ub_surrogate_solve(&mut ins, b + 1, s_min, 0, &mut out2, end);
        if out2.ub < lb {
            out2.ub = lb;
        }
        if out2.ub > out.ub {
            out = out2;
        }
    }
    out
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_cardinality {
    use crate::algorithms::surrogate::{max_card, min_card};
    use crate::instance::Instance;

    #[test]
    fn max_card_counts_the_greedy_by_weight_fill() {
        let mut instance = Instance::new(10, &[(8, 9), (2, 2), (3, 3), (4, 4)]).unwrap();
        instance.sort_partially();
        // lightest first: 2 + 3 + 4 = 9 fits, adding 8 overflows
        assert_eq!(3, max_card(&instance));
    }
    #[test]
    fn min_card_counts_the_greedy_by_profit_fill() {
        let mut instance = Instance::new(10, &[(8, 9), (2, 2), (3, 3), (4, 4)]).unwrap();
        instance.sort_partially();
        // to beat 12: 9 is not enough, 9 + 4 is
        assert_eq!(2, min_card(&instance, 12));
        // to beat 8: the most profitable item suffices
        assert_eq!(1, min_card(&instance, 8));
    }
    #[test]
    fn min_card_is_minus_one_when_the_bound_cannot_be_beaten() {
        let mut instance = Instance::new(10, &[(2, 2), (3, 3)]).unwrap();
        instance.sort_partially();
        assert_eq!(-1, min_card(&instance, 100));
    }
}

#[cfg(test)]
mod test_surrogate_bound {
    use crate::algorithms::surrogate::ub_surrogate;
    use crate::bounds::ub_dantzig;
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
    fn the_surrogate_bound_dominates_the_optimum() {
        for seed in 0..25i64 {
            let items: Vec<(i64, i64)> = (0..12)
                .map(|i| {
                    let x = seed * 61 + i * 17;
                    (1 + (x * 7 + 5) % 20, 1 + (x * 11 + 3) % 25)
                })
                .collect();
            let capacity = 8 + (seed * 31) % 70;
            let opt = brute_force(&items, capacity);
            let instance = Instance::new(capacity, &items).unwrap();
            let out = ub_surrogate(&instance, opt, None);
            assert!(out.ub >= opt, "seed {}: {} < {}", seed, out.ub, opt);
        }
    }
    #[test]
    fn the_surrogate_bound_never_exceeds_dantzig() {
        for seed in 0..25i64 {
            let items: Vec<(i64, i64)> = (0..12)
                .map(|i| {
                    let x = seed * 59 + i * 13;
                    (1 + (x * 5 + 3) % 18, 1 + (x * 7 + 1) % 22)
                })
                .collect();
            let capacity = 8 + (seed * 37) % 60;
            let opt = brute_force(&items, capacity);
            let mut sorted = Instance::new(capacity, &items).unwrap();
            sorted.sort_partially();
            if sorted.break_item() == sorted.last_item() + 1 || sorted.break_capacity() == 0 {
                continue;
            }
            let dantzig = ub_dantzig(&sorted);
            let instance = Instance::new(capacity, &items).unwrap();
            let out = ub_surrogate(&instance, opt, None);
            assert!(out.ub <= dantzig, "seed {}", seed);
            assert!(out.ub >= opt, "seed {}", seed);
        }
    }
    #[test]
    fn the_callers_instance_is_left_untouched() {
        let items = [(4i64, 5i64), (3, 4), (6, 6), (2, 2), (7, 7)];
        let instance = Instance::new(11, &items).unwrap();
        let _ = ub_surrogate(&instance, 10, None);
        for j in 0..5 {
            assert_eq!(items[j as usize].0, instance.item(j).w);
            assert_eq!(items[j as usize].1, instance.item(j).p);
        }
        assert_eq!(11, instance.capacity());
    }
    #[test]
    fn a_raised_end_flag_stops_the_search_immediately() {
        use std::sync::atomic::AtomicBool;
        let items: Vec<(i64, i64)> = (0..40i64)
            .map(|i| (1 + (i * 7 + 5) % 30, 1 + (i * 11 + 3) % 35))
            .collect();
        let instance = Instance::new(100, &items).unwrap();
        let end = AtomicBool::new(true);
        let out = ub_surrogate(&instance, 0, Some(&end));
        // the bisection never ran: the bound is the plain Dantzig bound
        let mut sorted = instance.clone();
        sorted.sort_partially();
        assert_eq!(crate::bounds::ub_dantzig(&sorted), out.ub);
    }
}
