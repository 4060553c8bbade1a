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

//! This module implements the mutable item store at the heart of the solver.
//! An `Instance` owns its item vector together with a reorderable *view* of
//! it: the active window `[f, l]`, the break item, the solutions accumulated
//! by reduction, and the sorting state. All the transformations that the
//! algorithms rely on live here:
//!
//! - `sort` and `sort_partially` order the active window by efficiency,
//!   either completely or just enough to locate the break item in expected
//!   linear time, leaving the outskirts as coarse efficiency bands
//!   (`int_left` / `int_right`) refined on demand by `sort_left` /
//!   `sort_right`;
//! - `reduce1` and `reduce2` fix items whose inclusion or exclusion is
//!   provably sub-optimal given a lower bound;
//! - `fix` applies externally computed per-item verdicts;
//! - `surrogate` perturbs every active weight by a multiplier, the basic step
//!   of the surrogate relaxation;
//! - `set_first_item` / `set_last_item` narrow the active window.
//!
//! Items carry their original index, so the solutions exposed by the store
//! stay meaningful while the item vector is being reordered at will.

use std::fs;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use thiserror::Error;

use crate::bounds::{ub_dembo, ub_dembo_rev};
use crate::common::{by_decreasing_efficiency, Interval, Item, ItemPos, Profit, SortStatus, Weight};
use crate::solution::Solution;

/// The number of items below which the partial sort stops partitioning and
/// simply sorts the remaining range.
const PARTIAL_SORT_LIMIT: ItemPos = 128;

// ----------------------------------------------------------------------------
// --- ERRORS -----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The ways in which building an instance can fail. These are the only fatal
/// conditions of the library: everything downstream of a well-formed instance
/// degrades gracefully instead of erroring.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The instance file could not be read.
    #[error("unable to open instance file {path}: {source}")]
    UnreadableFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The requested instance format is not one of the known ones.
    #[error("unknown instance format: {0}")]
    UnknownFormat(String),
    /// The instance file did not have the shape its format promises.
    #[error("malformed instance file: {0}")]
    Malformed(String),
    /// The capacity is negative.
    #[error("invalid capacity {0}: capacities must be non-negative")]
    InvalidCapacity(Weight),
    /// An item has a negative weight or profit.
    #[error("invalid item (weight {w}, profit {p}): weights and profits must be non-negative")]
    InvalidItem { w: Weight, p: Profit },
}

// ----------------------------------------------------------------------------
// --- INSTANCE ---------------------------------------------------------------
// ----------------------------------------------------------------------------
/// A 0-1 knapsack instance together with its reorderable view. See the
/// module documentation for the role of each piece of state.
#[derive(Clone, Debug)]
pub struct Instance {
    /// The items, in their current (possibly reordered) arrangement.
    items: Vec<Item>,
    /// The knapsack capacity.
    capacity: Weight,
    /// The optimal profit, when the instance file provides it.
    optimum: Option<Profit>,
    /// Position of the break item, or -1 when it has not been computed.
    b: ItemPos,
    /// First position of the active window (inclusive).
    f: ItemPos,
    /// Last position of the active window (inclusive).
    l: ItemPos,
    /// Left edge of the initial sorted core.
    s_init: ItemPos,
    /// Right edge of the initial sorted core.
    t_init: ItemPos,
    /// Left edge of the current sorted core.
    s_prime: ItemPos,
    /// Right edge of the current sorted core.
    t_prime: ItemPos,
    /// How ordered the active window currently is.
    sort_status: SortStatus,
    /// Bands of items left of the sorted core, in order of decreasing
    /// minimum efficiency (the band closest to the core is on top).
    int_left: Vec<Interval>,
    /// Bands of items right of the sorted core, in order of increasing
    /// maximum efficiency (the band closest to the core is on top).
    int_right: Vec<Interval>,
    /// The items permanently fixed to 1 by reduction.
    sol_red: Option<Solution>,
    /// The reduced solution extended with the items `[f, b)`.
    sol_break: Option<Solution>,
}

impl Instance {
    // ------------------------------------------------------------------------
    // --- CREATION -----------------------------------------------------------
    // ------------------------------------------------------------------------

    fn empty(capacity: Weight) -> Instance {
        Instance {
            items: vec![],
            capacity,
            optimum: None,
            b: -1,
            f: 0,
            l: -1,
            s_init: -1,
            t_init: -1,
            s_prime: -1,
            t_prime: -1,
            sort_status: SortStatus::Unsorted,
            int_left: vec![],
            int_right: vec![],
            sol_red: None,
            sol_break: None,
        }
    }

    /// Creates an instance from raw `(weight, profit)` data.
    ///
    /// # Example
    /// ```
    /// # use balknap::instance::Instance;
    /// let instance = Instance::new(5, &[(2, 3), (3, 4), (4, 5), (5, 6)]).unwrap();
    /// assert_eq!(4, instance.item_number());
    /// assert_eq!(5, instance.capacity());
    /// ```
    pub fn new(capacity: Weight, items: &[(Weight, Profit)]) -> Result<Instance, InstanceError> {
        if capacity < 0 {
            return Err(InstanceError::InvalidCapacity(capacity));
        }
        let mut instance = Instance::empty(capacity);
        for &(w, p) in items {
            if w < 0 || p < 0 {
                return Err(InstanceError::InvalidItem { w, p });
            }
            instance.add_item(w, p);
        }
        Ok(instance)
    }

    /// Reads an instance from a file. The recognized formats are `standard`
    /// (`n c` header followed by `w p` lines), `pisinger` (the csv format of
    /// the classical benchmark generator, whose known optimum is retained)
    /// and `subsetsum_standard` (`n c` header followed by weights, each item
    /// being worth its weight).
    pub fn from_file(path: &str, format: &str) -> Result<Instance, InstanceError> {
        let contents = fs::read_to_string(path).map_err(|source| InstanceError::UnreadableFile {
            path: path.to_string(),
            source,
        })?;
        match format {
            "standard" => Self::read_standard(&contents),
            "pisinger" => Self::read_pisinger(&contents),
            "subsetsum_standard" => Self::read_subsetsum_standard(&contents),
            other => Err(InstanceError::UnknownFormat(other.to_string())),
        }
    }

    fn read_standard(contents: &str) -> Result<Instance, InstanceError> {
        let mut tokens = contents.split_whitespace();
        let n = next_number(&mut tokens, "item count")?;
        let capacity = next_number(&mut tokens, "capacity")?;
        let mut items = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let w = next_number(&mut tokens, "item weight")?;
            let p = next_number(&mut tokens, "item profit")?;
            items.push((w, p));
        }
        Instance::new(capacity, &items)
    }

    fn read_subsetsum_standard(contents: &str) -> Result<Instance, InstanceError> {
        let mut tokens = contents.split_whitespace();
        let n = next_number(&mut tokens, "item count")?;
        let capacity = next_number(&mut tokens, "capacity")?;
        let mut items = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let w = next_number(&mut tokens, "item weight")?;
            items.push((w, w));
        }
        Instance::new(capacity, &items)
    }

    fn read_pisinger(contents: &str) -> Result<Instance, InstanceError> {
        let item_re = Regex::new(r"^(\d+),(\d+),(\d+),([01])").unwrap();
        let mut lines = contents.lines();
        let _name = lines
            .next()
            .ok_or_else(|| InstanceError::Malformed("empty pisinger file".to_string()))?;
        let n = tagged_number(lines.next(), "n")?;
        let capacity = tagged_number(lines.next(), "c")?;
        let optimum = tagged_number(lines.next(), "z")?;
        let _time = lines.next();

        let mut items = Vec::with_capacity(n as usize);
        for line in lines {
            if let Some(caps) = item_re.captures(line.trim()) {
                // columns are: index, profit, weight, taken-in-the-optimum
                let p = parse_number(&caps[2])?;
                let w = parse_number(&caps[3])?;
                items.push((w, p));
            }
            if items.len() == n as usize {
                break;
            }
        }
        if items.len() != n as usize {
            return Err(InstanceError::Malformed(format!(
                "expected {} items, found {}",
                n,
                items.len()
            )));
        }
        let mut instance = Instance::new(capacity, &items)?;
        instance.optimum = Some(optimum);
        Ok(instance)
    }

    /// Appends an item to the store. Any sorting guarantee is lost.
    pub fn add_item(&mut self, w: Weight, p: Profit) {
        let j = self.items.len() as ItemPos;
        self.items.push(Item { j, w, p });
        self.l = j;
        self.sort_status = SortStatus::Unsorted;
        self.b = -1;
    }

    /// Returns a value copy of this instance whose active window is the whole
    /// item range and whose reduction and sorting state is cleared. This is
    /// what the auxiliary bound-refinement tasks work on.
    pub fn reset(&self) -> Instance {
        Instance {
            items: self.items.clone(),
            capacity: self.capacity,
            optimum: self.optimum,
            b: -1,
            f: 0,
            l: self.items.len() as ItemPos - 1,
            s_init: -1,
            t_init: -1,
            s_prime: -1,
            t_prime: -1,
            sort_status: SortStatus::Unsorted,
            int_left: vec![],
            int_right: vec![],
            sol_red: None,
            sol_break: None,
        }
    }

    // ------------------------------------------------------------------------
    // --- ACCESSORS ----------------------------------------------------------
    // ------------------------------------------------------------------------

    /// The item currently stored at position `j`.
    pub fn item(&self, j: ItemPos) -> &Item {
        &self.items[j as usize]
    }
    /// The total number of items of the instance.
    pub fn item_number(&self) -> usize {
        self.items.len()
    }
    /// The number of items in the active window.
    pub fn reduced_item_number(&self) -> ItemPos {
        self.l - self.f + 1
    }
    /// The knapsack capacity.
    pub fn capacity(&self) -> Weight {
        self.capacity
    }
    /// The capacity left once the weight of the reduced solution is paid.
    /// Reductions can drive this negative; callers must treat a negative
    /// value as "no solution improves on the bound used for reducing".
    pub fn reduced_capacity(&self) -> Weight {
        self.capacity - self.sol_red.as_ref().map_or(0, |sol| sol.weight())
    }
    /// The profit of the reduced solution.
    pub fn reduced_profit(&self) -> Profit {
        self.sol_red.as_ref().map_or(0, |sol| sol.profit())
    }
    /// First position of the active window.
    pub fn first_item(&self) -> ItemPos {
        self.f
    }
    /// Last position of the active window.
    pub fn last_item(&self) -> ItemPos {
        self.l
    }
    /// Position of the break item (`-1` when not computed; `l + 1` when the
    /// whole window fits).
    pub fn break_item(&self) -> ItemPos {
        self.b
    }
    /// The profit brought by the items `[f, b)` of the break solution.
    pub fn break_profit(&self) -> Profit {
        self.sol_break.as_ref().map_or(0, |sol| sol.profit()) - self.reduced_profit()
    }
    /// The weight of the items `[f, b)` of the break solution.
    pub fn break_weight(&self) -> Weight {
        self.sol_break.as_ref().map_or(0, |sol| sol.weight())
            - self.sol_red.as_ref().map_or(0, |sol| sol.weight())
    }
    /// The capacity left by the break solution.
    pub fn break_capacity(&self) -> Weight {
        self.capacity - self.sol_break.as_ref().map_or(0, |sol| sol.weight())
    }
    /// The items permanently fixed to 1, if any reduction happened yet.
    pub fn reduced_solution(&self) -> Option<&Solution> {
        self.sol_red.as_ref()
    }
    /// The break solution, if a break item has been computed.
    pub fn break_solution(&self) -> Option<&Solution> {
        self.sol_break.as_ref()
    }
    /// How ordered the active window currently is.
    pub fn sort_status(&self) -> SortStatus {
        self.sort_status
    }
    /// Left edge of the current sorted core.
    pub fn s_prime(&self) -> ItemPos {
        self.s_prime
    }
    /// Right edge of the current sorted core.
    pub fn t_prime(&self) -> ItemPos {
        self.t_prime
    }
    /// Left edge of the initial sorted core.
    pub fn s_init(&self) -> ItemPos {
        self.s_init
    }
    /// Right edge of the initial sorted core.
    pub fn t_init(&self) -> ItemPos {
        self.t_init
    }
    /// The bands awaiting refinement on the left of the sorted core.
    pub fn int_left(&self) -> &[Interval] {
        &self.int_left
    }
    /// The bands awaiting refinement on the right of the sorted core.
    pub fn int_right(&self) -> &[Interval] {
        &self.int_right
    }
    /// The known optimal profit, when the instance file provided one.
    pub fn optimum(&self) -> Option<Profit> {
        self.optimum
    }

    /// Position of a most weighty item of the active window.
    pub fn max_weight_item(&self) -> Option<ItemPos> {
        let mut k: Option<ItemPos> = None;
        for j in self.f..=self.l {
            if k.map_or(true, |k| self.item(j).w > self.item(k).w) {
                k = Some(j);
            }
        }
        k
    }
    /// Position of a least weighty item of the active window.
    pub fn min_weight_item(&self) -> Option<ItemPos> {
        let mut k: Option<ItemPos> = None;
        for j in self.f..=self.l {
            if k.map_or(true, |k| self.item(j).w < self.item(k).w) {
                k = Some(j);
            }
        }
        k
    }
    /// Position of a most profitable item of the active window.
    pub fn max_profit_item(&self) -> Option<ItemPos> {
        let mut k: Option<ItemPos> = None;
        for j in self.f..=self.l {
            if k.map_or(true, |k| self.item(j).p > self.item(k).p) {
                k = Some(j);
            }
        }
        k
    }

    fn swap(&mut self, a: ItemPos, b: ItemPos) {
        self.items.swap(a as usize, b as usize);
    }

    fn reduced_solution_mut(&mut self) -> &mut Solution {
        let n = self.items.len();
        self.sol_red.get_or_insert_with(|| Solution::new(n))
    }

    // ------------------------------------------------------------------------
    // --- BREAK ITEM & SORTING -----------------------------------------------
    // ------------------------------------------------------------------------

    fn compute_break_item(&mut self) {
        let mut brk = match &self.sol_red {
            Some(sol) => sol.clone(),
            None => Solution::new(self.items.len()),
        };
        self.b = self.f;
        while self.b <= self.l {
            let it = *self.item(self.b);
            if it.w > self.capacity - brk.weight() {
                break;
            }
            brk.set(&it, true);
            self.b += 1;
        }
        self.sol_break = Some(brk);
    }

    /// Sorts the whole active window by decreasing efficiency and recomputes
    /// the break item. Stable, so equally efficient items keep their order.
    pub fn sort(&mut self) {
        if self.sort_status == SortStatus::FullySorted {
            return;
        }
        self.reduced_solution_mut();
        self.sort_status = SortStatus::FullySorted;
        if self.reduced_item_number() > 1 {
            let (f, l) = (self.f as usize, self.l as usize);
            self.items[f..=l].sort_by(by_decreasing_efficiency);
        }
        self.compute_break_item();
    }

    /// Three-way partition of `[f, l]` around a randomly chosen pivot
    /// efficiency. Returns the equal range: items before it are strictly more
    /// efficient than the pivot, items after it strictly less.
    fn partition(&mut self, mut f: ItemPos, mut l: ItemPos, rng: &mut StdRng) -> (ItemPos, ItemPos) {
        let pivot = f + 1 + rng.gen_range(0..(l - f));
        let w = self.item(pivot).w;
        let p = self.item(pivot).p;
        self.swap(pivot, l);
        let mut j = f;
        while j <= l {
            if self.item(j).p * w > p * self.item(j).w {
                self.swap(j, f);
                f += 1;
                j += 1;
            } else if self.item(j).p * w < p * self.item(j).w {
                self.swap(j, l);
                l -= 1;
            } else {
                j += 1;
            }
        }
        (f, l)
    }

    /// Locates the break item in expected linear time without committing to a
    /// full sort. The quickselect-style recursion accumulates the weight of
    /// each left part: parts that certainly precede the break item are folded
    /// into the consumed capacity and their positions are remembered as
    /// `int_left` bands; parts that certainly follow it become `int_right`
    /// bands. Ranges smaller than the limit fall through to a plain sort.
    pub fn sort_partially(&mut self) {
        self.sort_partially_with_limit(PARTIAL_SORT_LIMIT)
    }

    /// Same as `sort_partially`, with an explicit fall-through limit.
    pub fn sort_partially_with_limit(&mut self, limit: ItemPos) {
        if self.sort_status >= SortStatus::PartiallySorted {
            return;
        }
        self.reduced_solution_mut();

        let mut rng = StdRng::seed_from_u64(0);
        self.int_left.clear();
        self.int_right.clear();

        let mut f = self.f;
        let mut l = self.l;
        let mut c = self.reduced_capacity();
        while f < l {
            if l - f < limit {
                self.items[f as usize..=l as usize].sort_by(by_decreasing_efficiency);
                break;
            }

            let (pf, pl) = self.partition(f, l, &mut rng);
            let mut w: Weight = 0;
            for k in f..pf {
                w += self.item(k).w;
            }

            if w > c {
                if pl + 1 <= l {
                    self.int_right.push(Interval { f: pl + 1, l });
                }
                self.int_right.push(Interval { f: pf, l: pl });
                l = pf - 1;
                continue;
            }

            for k in pf..=pl {
                w += self.item(k).w;
            }
            if w > c {
                break;
            } else {
                c -= w;
                if f <= pf - 1 {
                    self.int_left.push(Interval { f, l: pf - 1 });
                }
                self.int_left.push(Interval { f: pf, l: pl });
                f = pl + 1;
            }
        }

        self.sort_status = SortStatus::PartiallySorted;
        self.compute_break_item();

        if f < self.b {
            self.int_left.push(Interval { f, l: self.b - 1 });
        }
        if self.b < l {
            self.int_right.push(Interval { f: self.b + 1, l });
        }
        self.s_prime = self.b;
        self.t_prime = self.b;
        self.s_init = self.b;
        self.t_init = self.b;

        debug_assert!(self.check_partial_sort());
    }

    /// Pops the next band on the right of the sorted core and merges it in.
    /// Items of the band whose Dembo bound (assuming they are included in the
    /// break configuration) does not beat `lb` are left behind, which fixes
    /// them to 0 once the last band has been consumed.
    pub fn sort_right(&mut self, lb: Profit) {
        let interval = match self.int_right.pop() {
            Some(interval) => interval,
            None => return,
        };
        let bit = *self.item(self.b);
        let mut k = self.t_prime;
        for j in interval.f..=interval.l {
            let it = *self.item(j);
            let p = self.sol_break.as_ref().map_or(0, |sol| sol.profit()) + bit.p + it.p;
            let r = self.break_capacity() - bit.w - it.w;
            debug_assert!(r < 0);
            let ub = ub_dembo_rev(self, self.b, p, r);
            if it.w <= self.reduced_capacity() && ub > lb {
                k += 1;
                self.swap(k, j);
            }
        }
        self.items[(self.t_prime + 1) as usize..(k + 1) as usize].sort_by(by_decreasing_efficiency);
        self.t_prime = k;
        if self.int_right.is_empty() {
            self.l = self.t_prime;
        }
        if self.f >= self.s_prime && self.l <= self.t_prime {
            self.sort_status = if self.s_init == self.t_init {
                SortStatus::FullySorted
            } else {
                SortStatus::Unsorted
            };
        }
    }

    /// Pops the next band on the left of the sorted core and merges it in.
    /// Items of the band whose Dembo bound (assuming they are excluded from
    /// the break configuration) does not beat `lb` are fixed to 1 and join
    /// the reduced solution.
    pub fn sort_left(&mut self, lb: Profit) {
        let interval = match self.int_left.pop() {
            Some(interval) => interval,
            None => return,
        };
        let mut k = self.s_prime;
        for j in (interval.f..=interval.l).rev() {
            let it = *self.item(j);
            let p = self.sol_break.as_ref().map_or(0, |sol| sol.profit()) - it.p;
            let r = self.break_capacity() + it.w;
            debug_assert!(r > 0);
            let ub = ub_dembo(self, self.b, p, r);
            if it.w <= self.reduced_capacity() && ub > lb {
                k -= 1;
                self.swap(k, j);
            } else {
                self.reduced_solution_mut().set(&it, true);
            }
        }
        self.items[k as usize..self.s_prime as usize].sort_by(by_decreasing_efficiency);
        self.s_prime = k;
        if self.int_left.is_empty() {
            self.f = self.s_prime;
        }
        if self.f >= self.s_prime && self.l <= self.t_prime {
            self.sort_status = if self.s_init == self.t_init {
                SortStatus::FullySorted
            } else {
                SortStatus::Unsorted
            };
        }
    }

    /// Refines the left bands until position `s` lies within the sorted core,
    /// then returns the position standing for `s`: the break item when `s`
    /// reaches back into the initial core, `f - 1` when `s` fell off the
    /// window (everything before it was fixed).
    pub fn bound_item_left(&mut self, s: ItemPos, lb: Profit) -> ItemPos {
        while s < self.s_prime && !self.int_left.is_empty() {
            self.sort_left(lb);
        }
        if s < self.f {
            self.f - 1
        } else if s >= self.s_init {
            self.b
        } else {
            s
        }
    }

    /// Refines the right bands until position `t` lies within the sorted
    /// core, then returns the position standing for `t`: the break item when
    /// `t` reaches back into the initial core, `l + 1` when `t` fell off the
    /// window.
    pub fn bound_item_right(&mut self, t: ItemPos, lb: Profit) -> ItemPos {
        while t > self.t_prime && !self.int_right.is_empty() {
            self.sort_right(lb);
        }
        if t >= self.l + 1 {
            self.l + 1
        } else if t <= self.t_init {
            self.b
        } else {
            t
        }
    }

    // ------------------------------------------------------------------------
    // --- REDUCTION ----------------------------------------------------------
    // ------------------------------------------------------------------------

    /// Banishes from the active window every item that no longer fits the
    /// reduced capacity on its own.
    pub fn remove_big_items(&mut self) {
        if self.b != -1 && self.b <= self.l && self.item(self.b).w > self.reduced_capacity() {
            self.b = -1;
        }

        if self.sort_status == SortStatus::FullySorted {
            let rc = self.reduced_capacity();
            let mut not_fixed: Vec<Item> = vec![];
            let mut fixed_0: Vec<Item> = vec![];
            for j in self.f..=self.l {
                let it = *self.item(j);
                if it.w > rc {
                    fixed_0.push(it);
                } else {
                    not_fixed.push(it);
                }
            }
            if !fixed_0.is_empty() {
                let nb = not_fixed.len() as ItemPos;
                let base = self.f as usize;
                for (i, it) in not_fixed.into_iter().chain(fixed_0.into_iter()).enumerate() {
                    self.items[base + i] = it;
                }
                self.l = self.f + nb - 1;
            }
            if self.b == -1 {
                self.compute_break_item();
            }
        } else {
            let mut j = self.f;
            while j <= self.l {
                if self.item(j).w > self.reduced_capacity() {
                    self.swap(j, self.l);
                    self.l -= 1;
                } else {
                    j += 1;
                }
            }
            self.sort_status = SortStatus::Unsorted;
            self.sort_partially();
        }
    }

    /// Fixes every zero-weight item of the active window into the reduced
    /// solution. Such items belong to at least one optimal solution and must
    /// not take part in the efficiency-slope bounds.
    pub fn fix_zero_weight_items(&mut self) {
        let mut fixed = false;
        let mut j = self.f;
        while j <= self.l {
            if self.item(j).w == 0 {
                let it = *self.item(j);
                self.reduced_solution_mut().set(&it, true);
                self.swap(j, self.f);
                self.f += 1;
                fixed = true;
            }
            j += 1;
        }
        if fixed {
            self.sort_status = SortStatus::Unsorted;
            self.b = -1;
        }
    }

    /// First reduction: each item left of the break item is fixed to 1 when
    /// the Dantzig-style bound of the solutions excluding it does not beat
    /// `lb`; symmetrically, each item right of the break item is fixed to 0
    /// when the bound of the solutions including it does not beat `lb`.
    /// Requires a (at least partially) sorted window.
    pub fn reduce1(&mut self, lb: Profit) {
        debug_assert!(self.sort_status >= SortStatus::PartiallySorted);
        debug_assert!(self.b != self.l + 1);
        let bit = *self.item(self.b);

        let mut j = self.f;
        while j < self.b {
            let it = *self.item(j);
            let ub = self.reduced_profit() + self.break_profit() - it.p
                + ((self.break_capacity() + it.w) * bit.p) / bit.w;
            if ub <= lb {
                self.reduced_solution_mut().set(&it, true);
                if j != self.f {
                    self.swap(j, self.f);
                }
                self.f += 1;
                if self.reduced_capacity() < 0 {
                    return;
                }
            }
            j += 1;
        }
        let mut j = self.l;
        while j > self.b {
            let it = *self.item(j);
            let ub = self.reduced_profit() + self.break_profit() + it.p
                + ((self.break_capacity() - it.w) * bit.p) / bit.w;
            if ub <= lb {
                if j != self.l {
                    self.swap(j, self.l);
                }
                self.l -= 1;
            }
            j -= 1;
        }

        self.remove_big_items();
    }

    /// Prefix sums of the item weights and profits, with a leading zero
    /// entry: `isum[j]` accumulates the items at positions `[0, j)`.
    pub fn isum(&self) -> Vec<Item> {
        debug_assert!(self.sort_status == SortStatus::FullySorted);
        let mut isum = Vec::with_capacity(self.items.len() + 1);
        isum.push(Item { j: 0, w: 0, p: 0 });
        for j in 1..=self.items.len() {
            isum.push(Item {
                j: j as ItemPos,
                w: isum[j - 1].w + self.items[j - 1].w,
                p: isum[j - 1].p + self.items[j - 1].p,
            });
        }
        isum
    }

    /// Locates, by binary search in the prefix sums, the break position of a
    /// greedy fill of `target_w`: the last position whose cumulated weight
    /// still fits.
    fn ub_item(&self, isum: &[Item], target_w: Weight) -> ItemPos {
        let f = self.f as usize;
        let l = self.l as usize;
        let off = isum[f..=l].partition_point(|it| it.w <= target_w);
        let idx = f + off;
        if idx == l + 1 {
            (l + 1) as ItemPos
        } else {
            idx as ItemPos - 1
        }
    }

    /// Second, sharper reduction. Requires a fully sorted window. For each
    /// item, the bound of the solutions taking the opposite decision is the
    /// maximum of a forward fractional completion (next item efficiency) and
    /// a reverse one (previous item efficiency) around the break position the
    /// swap would produce.
    pub fn reduce2(&mut self, lb: Profit) {
        debug_assert!(self.sort_status == SortStatus::FullySorted);
        let isum = self.isum();

        let mut not_fixed: Vec<Item> = vec![];
        let mut fixed_1: Vec<Item> = vec![];
        let mut fixed_0: Vec<Item> = vec![];

        for j in self.f..=self.b {
            let it = *self.item(j);
            let bb = self.ub_item(&isum, self.capacity + it.w);
            let ub = if bb == self.l + 1 {
                isum[(self.l + 1) as usize].p - it.p
            } else if bb == self.l {
                let ub1 = isum[bb as usize].p - it.p;
                let ub2 = frac_reverse(
                    isum[(bb + 1) as usize].p - it.p,
                    self.capacity + it.w - isum[(bb + 1) as usize].w,
                    self.item(bb - 1),
                );
                ub1.max(ub2)
            } else if bb == 0 {
                frac_forward(0, self.capacity + it.w, self.item(bb))
            } else {
                let ub1 = frac_forward(
                    isum[bb as usize].p - it.p,
                    self.capacity + it.w - isum[bb as usize].w,
                    self.item(bb + 1),
                );
                let ub2 = frac_reverse(
                    isum[(bb + 1) as usize].p - it.p,
                    self.capacity + it.w - isum[(bb + 1) as usize].w,
                    self.item(bb - 1),
                );
                ub1.max(ub2)
            };
            if ub <= lb {
                self.reduced_solution_mut().set(&it, true);
                fixed_1.push(it);
                if self.reduced_capacity() < 0 {
                    return;
                }
            } else if j != self.b {
                not_fixed.push(it);
            }
        }
        for j in self.b..=self.l {
            if j == self.b {
                if let Some(last) = fixed_1.last() {
                    if last.j == self.item(self.b).j {
                        continue;
                    }
                }
            }
            let it = *self.item(j);
            let bb = self.ub_item(&isum, self.capacity - it.w);
            let ub = if bb == self.l + 1 {
                isum[(self.l + 1) as usize].p + it.p
            } else if bb == self.l {
                let ub1 = isum[bb as usize].p + it.p;
                let ub2 = frac_reverse(
                    isum[(bb + 1) as usize].p + it.p,
                    self.capacity - it.w - isum[(bb + 1) as usize].w,
                    self.item(bb - 1),
                );
                ub1.max(ub2)
            } else if bb == 0 {
                frac_forward(0, self.capacity + it.w, self.item(bb))
            } else {
                let ub1 = frac_forward(
                    isum[bb as usize].p + it.p,
                    self.capacity - it.w - isum[bb as usize].w,
                    self.item(bb + 1),
                );
                let ub2 = frac_reverse(
                    isum[(bb + 1) as usize].p + it.p,
                    self.capacity - it.w - isum[(bb + 1) as usize].w,
                    self.item(bb - 1),
                );
                ub1.max(ub2)
            };
            if ub <= lb {
                fixed_0.push(it);
            } else {
                not_fixed.push(it);
            }
        }

        let j1 = fixed_1.len() as ItemPos;
        let j0 = fixed_0.len() as ItemPos;
        let base = self.f as usize;
        for (i, it) in fixed_1
            .into_iter()
            .chain(not_fixed.into_iter())
            .chain(fixed_0.into_iter())
            .enumerate()
        {
            self.items[base + i] = it;
        }
        self.f += j1;
        self.l -= j0;

        self.remove_big_items();
        self.compute_break_item();
    }

    /// Narrows the active window from the left: the stripped prefix joins the
    /// reduced solution.
    pub fn set_first_item(&mut self, k: ItemPos) {
        debug_assert!(k >= self.f);
        for j in self.f..k {
            let it = *self.item(j);
            self.reduced_solution_mut().set(&it, true);
        }
        self.f = k;
    }

    /// Narrows the active window from the right. The stripped suffix is
    /// simply banished (fixed to 0).
    pub fn set_last_item(&mut self, k: ItemPos) {
        debug_assert!(k <= self.l);
        self.l = k;
    }

    /// Applies externally supplied per-item verdicts over the active window:
    /// `Some(true)` fixes the item to 1 (it joins the reduced solution),
    /// `Some(false)` fixes it to 0, `None` leaves it undecided. The item
    /// array is rearranged into three contiguous regions
    /// `[fixed-1 | undecided | fixed-0]` and the window shrinks accordingly.
    /// Positions past the end of `verdicts` count as undecided.
    pub fn fix(&mut self, verdicts: &[Option<bool>]) {
        let mut not_fixed: Vec<Item> = vec![];
        let mut fixed_1: Vec<Item> = vec![];
        let mut fixed_0: Vec<Item> = vec![];
        for j in self.f..=self.l {
            let it = *self.item(j);
            match verdicts.get(j as usize).copied().flatten() {
                None => not_fixed.push(it),
                Some(true) => {
                    fixed_1.push(it);
                    self.reduced_solution_mut().set(&it, true);
                }
                Some(false) => fixed_0.push(it),
            }
        }

        let j1 = fixed_1.len() as ItemPos;
        let j0 = fixed_0.len() as ItemPos;
        let base = self.f as usize;
        for (i, it) in fixed_1
            .into_iter()
            .chain(not_fixed.into_iter())
            .chain(fixed_0.into_iter())
            .enumerate()
        {
            self.items[base + i] = it;
        }
        self.f += j1;
        self.l -= j0;

        self.remove_big_items();

        if self.sort_status == SortStatus::PartiallySorted {
            self.sort_status = SortStatus::Unsorted;
            self.sort_partially();
        } else {
            self.compute_break_item();
        }
    }

    // ------------------------------------------------------------------------
    // --- SURROGATE ----------------------------------------------------------
    // ------------------------------------------------------------------------

    /// Applies one step of the surrogate relaxation: resets the window to
    /// `[first, n-1]`, clears the corresponding part of the reduced solution,
    /// adds `multiplier` to every active weight and `multiplier * bound` to
    /// the capacity. Items whose weight drops to zero or below are fixed
    /// to 1. The instance is finally re-sorted partially, so the break item
    /// and break solution are valid for the perturbed weights.
    pub fn surrogate(&mut self, multiplier: Weight, bound: ItemPos, first: ItemPos) {
        self.sol_break = None;
        self.optimum = None;
        self.f = first;
        self.l = self.items.len() as ItemPos - 1;
        for j in self.f..=self.l {
            let it = *self.item(j);
            self.reduced_solution_mut().set(&it, false);
        }
        let bound = bound - self.reduced_solution_mut().item_number() as ItemPos;
        for j in self.f..=self.l {
            self.items[j as usize].w += multiplier;
            if self.items[j as usize].w <= 0 {
                let it = *self.item(j);
                self.reduced_solution_mut().set(&it, true);
                self.swap(j, self.f);
                self.f += 1;
            }
        }
        self.capacity += multiplier * bound as Weight;
        let red_weight = self.sol_red.as_ref().map_or(0, |sol| sol.weight());
        if self.capacity <= red_weight {
            self.capacity = red_weight;
        }

        self.sort_status = SortStatus::Unsorted;
        self.sort_partially();
    }

    // ------------------------------------------------------------------------
    // --- INVARIANT CHECK ----------------------------------------------------
    // ------------------------------------------------------------------------

    /// Verifies the partial-sort invariants: a valid break item, efficiency
    /// dominance of the left (resp. right) side of the window over it, and
    /// well-formed interval stacks (contiguous, and ordered by decreasing
    /// minimum / increasing maximum efficiency). Used by `debug_assert!` and
    /// by the tests.
    pub fn check_partial_sort(&self) -> bool {
        if self.reduced_item_number() == 0 {
            return self.b == self.l + 1;
        }

        let mut w_total = self.sol_red.as_ref().map_or(0, |sol| sol.weight());
        for j in self.f..=self.l {
            w_total += self.item(j).w;
        }
        if w_total <= self.capacity {
            return self.b == self.l + 1;
        }

        if self.b < 0 || self.b >= self.items.len() as ItemPos {
            return false;
        }
        let bsol = match &self.sol_break {
            Some(sol) => sol,
            None => return false,
        };
        if bsol.weight() > self.capacity {
            return false;
        }
        if bsol.weight() + self.item(self.b).w <= self.capacity {
            return false;
        }
        for j in self.f..self.b {
            if self.item(j).p * self.item(self.b).w < self.item(self.b).p * self.item(j).w {
                return false;
            }
        }
        for j in self.b + 1..=self.l {
            if self.item(j).p * self.item(self.b).w > self.item(self.b).p * self.item(j).w {
                return false;
            }
        }

        if !self.int_left.is_empty() {
            if self.int_left[self.int_left.len() - 1].l > self.s_prime - 1 {
                return false;
            }
            for w in self.int_left.windows(2) {
                if w[0].l != w[1].f - 1 {
                    return false;
                }
            }
            let mut emin_prev: Option<Item> = None;
            for interval in &self.int_left {
                if interval.f > interval.l {
                    return false;
                }
                let mut emax = *self.item(interval.f);
                let mut emin = *self.item(interval.f);
                for j in interval.f..=interval.l {
                    let it = *self.item(j);
                    if it.is_more_efficient_than(&emax) {
                        emax = it;
                    }
                    if emin.is_more_efficient_than(&it) {
                        emin = it;
                    }
                }
                if let Some(prev) = emin_prev {
                    if emax.is_more_efficient_than(&prev) {
                        return false;
                    }
                }
                emin_prev = Some(emin);
            }
        }
        if !self.int_right.is_empty() {
            if self.int_right[self.int_right.len() - 1].f < self.t_prime + 1 {
                return false;
            }
            for w in self.int_right.windows(2) {
                if w[1].l != w[0].f - 1 {
                    return false;
                }
            }
            let mut emax_prev: Option<Item> = None;
            for interval in &self.int_right {
                if interval.f > interval.l {
                    return false;
                }
                let mut emax = *self.item(interval.f);
                let mut emin = *self.item(interval.f);
                for j in interval.f..=interval.l {
                    let it = *self.item(j);
                    if it.is_more_efficient_than(&emax) {
                        emax = it;
                    }
                    if emin.is_more_efficient_than(&it) {
                        emin = it;
                    }
                }
                if let Some(prev) = emax_prev {
                    if prev.is_more_efficient_than(&emin) {
                        return false;
                    }
                }
                emax_prev = Some(emax);
            }
        }
        true
    }
}

/// Forward fractional completion at the efficiency of `item` (floor
/// rounding). A zero-weight reference would make the completion unbounded:
/// the bound saturates, so the candidate stays unfixed.
fn frac_forward(base: Profit, num: Weight, item: &Item) -> Profit {
    if item.w == 0 {
        Profit::MAX
    } else {
        base + (num * item.p) / item.w
    }
}

/// Reverse fractional correction at the efficiency of `item` (ceiling
/// rounding of the negative share). Saturates on a zero-weight reference.
fn frac_reverse(base: Profit, num: Weight, item: &Item) -> Profit {
    if item.w == 0 {
        Profit::MAX
    } else {
        base + (num * item.p + 1) / item.w - 1
    }
}

// ----------------------------------------------------------------------------
// --- PARSING HELPERS --------------------------------------------------------
// ----------------------------------------------------------------------------

fn parse_number(token: &str) -> Result<i64, InstanceError> {
    token
        .parse::<i64>()
        .map_err(|_| InstanceError::Malformed(format!("expected a number, found {:?}", token)))
}

fn next_number<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<i64, InstanceError> {
    match tokens.next() {
        Some(token) => parse_number(token),
        None => Err(InstanceError::Malformed(format!("missing {}", what))),
    }
}

fn tagged_number(line: Option<&str>, tag: &str) -> Result<i64, InstanceError> {
    let line = line.ok_or_else(|| InstanceError::Malformed(format!("missing {} line", tag)))?;
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some(t) if t == tag => {}
        _ => return Err(InstanceError::Malformed(format!("expected {} line", tag))),
    }
    next_number(&mut tokens, tag)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_creation {
    use crate::instance::{Instance, InstanceError};

    #[test]
    fn a_fresh_instance_spans_all_its_items() {
        let instance = Instance::new(10, &[(1, 1), (2, 2), (3, 3)]).unwrap();
        assert_eq!(0, instance.first_item());
        assert_eq!(2, instance.last_item());
        assert_eq!(3, instance.reduced_item_number());
        assert_eq!(10, instance.reduced_capacity());
    }
    #[test]
    fn items_remember_their_original_index() {
        let instance = Instance::new(10, &[(5, 1), (2, 9)]).unwrap();
        assert_eq!(0, instance.item(0).j);
        assert_eq!(1, instance.item(1).j);
    }
    #[test]
    fn a_negative_capacity_is_rejected() {
        match Instance::new(-1, &[(1, 1)]) {
            Err(InstanceError::InvalidCapacity(-1)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
    #[test]
    fn a_negative_weight_or_profit_is_rejected() {
        assert!(Instance::new(10, &[(-1, 1)]).is_err());
        assert!(Instance::new(10, &[(1, -1)]).is_err());
    }
    #[test]
    fn reset_restores_the_full_window_and_clears_the_reduction() {
        let mut instance = Instance::new(10, &[(3, 3), (4, 4), (5, 5), (6, 6)]).unwrap();
        instance.sort_partially();
        instance.set_first_item(2);
        let fresh = instance.reset();
        assert_eq!(0, fresh.first_item());
        assert_eq!(3, fresh.last_item());
        assert!(fresh.reduced_solution().is_none());
        assert_eq!(10, fresh.reduced_capacity());
        // and the original is untouched
        assert_eq!(2, instance.first_item());
    }
}



#[cfg(test)]
mod test_reduction {
    use crate::instance::Instance;

    /// Straightforward exponential oracle, good enough for tiny instances.
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

    fn window_optimum(instance: &Instance) -> i64 {
        let mut items = vec![];
        for j in instance.first_item()..=instance.last_item() {
            items.push((instance.item(j).w, instance.item(j).p));
        }
        instance.reduced_profit() + brute_force(&items, instance.reduced_capacity())
    }

    #[test]
    fn reduce1_preserves_the_optimum() {
        let items = [(4i64, 6i64), (3, 4), (5, 5), (2, 3), (7, 8), (6, 6), (1, 2)];
        let capacity = 12;
        let opt = brute_force(&items, capacity);
        let mut instance = Instance::new(capacity, &items).unwrap();
        instance.sort_partially();
        instance.reduce1(opt - 1);
        assert!(instance.reduced_capacity() >= 0);
        assert_eq!(opt, window_optimum(&instance));
    }
    #[test]
    fn reduce2_preserves_the_optimum() {
        let items = [(4i64, 6i64), (3, 4), (5, 5), (2, 3), (7, 8), (6, 6), (1, 2)];
        let capacity = 12;
        let opt = brute_force(&items, capacity);
        let mut instance = Instance::new(capacity, &items).unwrap();
        instance.sort();
        instance.reduce2(opt - 1);
        assert!(instance.reduced_capacity() >= 0);
        assert_eq!(opt, window_optimum(&instance));
    }
    #[test]
    fn reduce1_preserves_the_optimum_on_many_random_instances() {
        for seed in 0..40i64 {
            let items: Vec<(i64, i64)> = (0..10)
                .map(|i| {
                    let x = seed * 97 + i * 31;
                    (1 + (x * 7 + 3) % 15, 1 + (x * 11 + 5) % 20)
                })
                .collect();
            let capacity = 1 + (seed * 13) % 40;
            let opt = brute_force(&items, capacity);
            let mut instance = Instance::new(capacity, &items).unwrap();
            instance.sort_partially();
            if instance.break_item() == instance.last_item() + 1 {
                continue;
            }
            instance.reduce1(opt - 1);
            if instance.reduced_capacity() >= 0 {
                assert_eq!(opt, window_optimum(&instance), "seed {}", seed);
            }
        }
    }
    #[test]
    fn reduce2_preserves_the_optimum_on_many_random_instances() {
        for seed in 0..40i64 {
            let items: Vec<(i64, i64)> = (0..10)
                .map(|i| {
                    let x = seed * 89 + i * 37;
                    (1 + (x * 5 + 3) % 15, 1 + (x * 13 + 7) % 20)
                })
                .collect();
            let capacity = 1 + (seed * 17) % 40;
            let opt = brute_force(&items, capacity);
            let mut instance = Instance::new(capacity, &items).unwrap();
            instance.sort();
            if instance.break_item() == instance.last_item() + 1 {
                continue;
            }
            instance.reduce2(opt - 1);
            if instance.reduced_capacity() >= 0 {
                assert_eq!(opt, window_optimum(&instance), "seed {}", seed);
            }
        }
    }
    #[test]
    fn remove_big_items_banishes_oversized_items() {
        let mut instance = Instance::new(5, &[(2, 3), (9, 100), (3, 4), (8, 50)]).unwrap();
        instance.sort_partially();
        instance.remove_big_items();
        for j in instance.first_item()..=instance.last_item() {
            assert!(instance.item(j).w <= instance.reduced_capacity());
        }
        assert!(instance.check_partial_sort());
    }
    #[test]
    fn fix_rearranges_into_three_regions_and_updates_the_window() {
        let mut instance = Instance::new(10, &[(2, 3), (3, 4), (4, 5), (5, 6)]).unwrap();
        instance.sort_partially();
        // fix the item of weight 2 to 1 and the item of weight 5 to 0
        let mut verdicts = vec![None; 4];
        for j in instance.first_item()..=instance.last_item() {
            if instance.item(j).w == 2 {
                verdicts[j as usize] = Some(true);
            }
            if instance.item(j).w == 5 {
                verdicts[j as usize] = Some(false);
            }
        }
        instance.fix(&verdicts);
        assert_eq!(2, instance.reduced_item_number());
        assert_eq!(3, instance.reduced_profit());
        assert_eq!(8, instance.reduced_capacity());
        let active: Vec<i64> = (instance.first_item()..=instance.last_item())
            .map(|j| instance.item(j).w)
            .collect();
        let mut sorted = active.clone();
        sorted.sort_unstable();
        assert_eq!(vec![3, 4], sorted);
    }
    #[test]
    fn set_first_item_moves_the_prefix_into_the_reduced_solution() {
        let mut instance = Instance::new(20, &[(2, 3), (3, 4), (4, 5), (5, 6)]).unwrap();
        instance.sort_partially();
        instance.set_first_item(2);
        assert_eq!(2, instance.first_item());
        assert_eq!(2, instance.reduced_solution().unwrap().item_number());
        instance.set_last_item(2);
        assert_eq!(2, instance.last_item());
        assert_eq!(1, instance.reduced_item_number());
    }
    #[test]
    fn fix_zero_weight_items_moves_them_into_the_reduced_solution() {
        let mut instance = Instance::new(5, &[(0, 7), (3, 4), (0, 2), (4, 5)]).unwrap();
        instance.fix_zero_weight_items();
        assert_eq!(2, instance.first_item());
        assert_eq!(9, instance.reduced_profit());
        assert_eq!(5, instance.reduced_capacity());
        for j in instance.first_item()..=instance.last_item() {
            assert!(instance.item(j).w > 0);
        }
    }
}

#[cfg(test)]
mod test_surrogate_transformation {
    use crate::instance::Instance;

    #[test]
    fn surrogate_perturbs_weights_and_capacity() {
        let mut instance = Instance::new(10, &[(2, 3), (3, 4), (4, 5)]).unwrap();
        instance.sort_partially();
        instance.surrogate(5, 2, 0);
        // every weight grew by 5, the capacity by 5 * 2
        let mut weights: Vec<i64> = (0..3).map(|j| instance.item(j).w).collect();
        weights.sort_unstable();
        assert_eq!(vec![7, 8, 9], weights);
        assert_eq!(20, instance.capacity());
        assert!(instance.check_partial_sort());
    }
    #[test]
    fn surrogate_roundtrip_restores_the_instance() {
        let mut instance = Instance::new(10, &[(2, 3), (3, 4), (4, 5)]).unwrap();
        instance.sort_partially();
        instance.surrogate(5, 2, 0);
        instance.surrogate(-5, 2, 0);
        let mut weights: Vec<i64> = (0..3).map(|j| instance.item(j).w).collect();
        weights.sort_unstable();
        assert_eq!(vec![2, 3, 4], weights);
        assert_eq!(10, instance.capacity());
        assert_eq!(0, instance.first_item());
        assert_eq!(2, instance.last_item());
    }
    #[test]
    fn surrogate_fixes_items_whose_weight_drops_to_zero() {
        let mut instance = Instance::new(10, &[(2, 3), (6, 4), (7, 5)]).unwrap();
        instance.sort_partially();
        instance.surrogate(-2, 2, 0);
        // the item of weight 2 dropped to 0 and is now fixed to 1
        assert_eq!(1, instance.first_item());
        assert_eq!(3, instance.reduced_profit());
    }
}
