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

//! The balanced primal-dual dynamic programming engine. The search starts
//! from the break solution and processes the tail items one by one; for each
//! of them it both *adds* the item to the recorded states and *removes*
//! earlier break-prefix items from the overfull ones, so that the explored
//! states always hover around the capacity. States are keyed by their
//! cumulative weight and profit in an ordered map, pruned against Dembo
//! bounds, and carry a packed partial solution used at the end of a pass to
//! reduce the instance and run again on the residual until the witness
//! selection is fully reconstructed.
//!
//! While the map grows, two optional one-shot triggers may fire: an
//! asynchronous surrogate-relaxation task that can tighten the upper bound,
//! and a synchronous `O(n log n)` greedy that can raise the lower bound.
//! Auxiliary work runs on scoped threads joined before the pass completes,
//! communicates through a mutex-protected record with monotone updates, and
//! honors a shared cooperative end flag.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::algorithms::greedy::greedy;
use crate::algorithms::greedynlogn::bestgreedynlogn;
use crate::algorithms::surrogate::ub_surrogate;
use crate::bounds::{ub_dantzig, ub_dembo, ub_dembo_rev};
use crate::common::{ItemPos, Profit, StateCount, Weight};
use crate::instance::Instance;
use crate::part_solution::{PartSol, PartSolFactory};
use crate::solution::Solution;

// ----------------------------------------------------------------------------
// --- CONFIGURATION ----------------------------------------------------------
// ----------------------------------------------------------------------------

/// The reference item used by the Dembo bounds inside the engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UbPolicy {
    /// Always bound against the break item. Only needs a partial sort.
    Break,
    /// Bound against the item currently being processed (or, for overfull
    /// states, against the last removable item). Sharper, but requires the
    /// window to be fully sorted.
    Moving,
}

/// The engine configuration. Every field has a sensible default; the
/// `with_*` builders allow overriding them one by one.
#[derive(Clone)]
pub struct BalknapParams {
    /// Width of the packed partial-solution window, between 1 and 64.
    pub partial_solution_size: ItemPos,
    /// Whether the initial lower bound is the greedy solution (else the
    /// break solution is used).
    pub greedy: bool,
    /// State-map size at which the `O(n log n)` greedy lower bound fires
    /// (at most once); -1 disables it.
    pub greedynlogn: StateCount,
    /// State-map size at which the surrogate-relaxation upper bound fires
    /// (at most once); -1 disables it.
    pub surrelax: StateCount,
    /// The Dembo bound reference policy.
    pub ub: UbPolicy,
    /// The wall-clock budget, if any.
    pub time_limit: Option<Duration>,
    /// A shared cancellation flag, created internally when absent.
    pub end: Option<Arc<AtomicBool>>,
    /// Whether a raised end flag gracefully stops the search.
    pub stop_if_end: bool,
    /// Whether the engine raises the end flag when its search completes.
    pub set_end: bool,
    /// Logging: 0 prints nothing, 1 the banner and final bounds, 2 every
    /// bound improvement and trigger.
    pub verbosity: u8,
}

impl Default for BalknapParams {
    fn default() -> BalknapParams {
        BalknapParams {
            partial_solution_size: 64,
            greedy: true,
            greedynlogn: -1,
            surrelax: -1,
            ub: UbPolicy::Break,
            time_limit: None,
            end: None,
            stop_if_end: false,
            set_end: true,
            verbosity: 0,
        }
    }
}

impl BalknapParams {
    /// Sets the width of the packed partial-solution window (clamped to
    /// `[1, 64]`).
    pub fn with_partial_solution_size(mut self, size: ItemPos) -> Self {
        self.partial_solution_size = size.max(1).min(64);
        self
    }
    /// Enables or disables the greedy initial lower bound.
    pub fn with_greedy(mut self, greedy: bool) -> Self {
        self.greedy = greedy;
        self
    }
    /// Sets the `O(n log n)` greedy trigger threshold (-1 disables).
    pub fn with_greedynlogn(mut self, threshold: StateCount) -> Self {
        self.greedynlogn = threshold;
        self
    }
    /// Sets the surrogate-relaxation trigger threshold (-1 disables).
    pub fn with_surrelax(mut self, threshold: StateCount) -> Self {
        self.surrelax = threshold;
        self
    }
    /// Sets the Dembo bound reference policy.
    pub fn with_ub(mut self, ub: UbPolicy) -> Self {
        self.ub = ub;
        self
    }
    /// Sets the wall-clock budget.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
    /// Shares a cancellation flag with the caller.
    pub fn with_end(mut self, end: Arc<AtomicBool>, stop_if_end: bool, set_end: bool) -> Self {
        self.end = Some(end);
        self.stop_if_end = stop_if_end;
        self.set_end = set_end;
        self
    }
    /// Sets the logging verbosity.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }
}

// ----------------------------------------------------------------------------
// --- OUTPUT -----------------------------------------------------------------
// ----------------------------------------------------------------------------

/// What the engine returns: the best solution found, the bounds bracketing
/// the optimum (equal on convergence) and the number of passes of the
/// residual recursion.
#[derive(Clone, Debug)]
pub struct BalknapOutput {
    /// The best feasible solution found.
    pub solution: Solution,
    /// The best lower bound (the profit of `solution` on convergence).
    pub lower_bound: Profit,
    /// The best upper bound.
    pub upper_bound: Profit,
    /// How many passes the residual recursion took.
    pub recursive_call_number: usize,
}

/// The record shared between the main loop and the auxiliary tasks. All
/// updates are monotone: the lower bound and the solution profit only
/// increase, the upper bound only decreases. Writers and readers go through
/// the same mutex.
struct SharedOutput {
    critical: Mutex<OutputData>,
    verbosity: u8,
}

struct OutputData {
    lower_bound: Profit,
    upper_bound: Profit,
    solution: Solution,
}

impl SharedOutput {
    fn new(item_number: usize, verbosity: u8) -> SharedOutput {
        SharedOutput {
            critical: Mutex::new(OutputData {
                lower_bound: 0,
                upper_bound: Profit::MAX,
                solution: Solution::new(item_number),
            }),
            verbosity,
        }
    }
    fn lower_bound(&self) -> Profit {
        self.critical.lock().lower_bound
    }
    fn upper_bound(&self) -> Profit {
        self.critical.lock().upper_bound
    }
    fn solution_profit(&self) -> Profit {
        self.critical.lock().solution.profit()
    }
    fn update_lb(&self, lb: Profit, message: &str) {
        let mut data = self.critical.lock();
        if lb > data.lower_bound {
            data.lower_bound = lb;
            if self.verbosity >= 2 {
                println!("LB {} ({})", lb, message);
            }
        }
    }
    fn update_ub(&self, ub: Profit, message: &str) {
        let mut data = self.critical.lock();
        if ub < data.upper_bound {
            data.upper_bound = ub;
            if self.verbosity >= 2 {
                println!("UB {} ({})", ub, message);
            }
        }
    }
    fn update_sol(&self, sol: &Solution, message: &str) {
        let mut data = self.critical.lock();
        if sol.profit() > data.solution.profit() {
            data.solution = sol.clone();
            if sol.profit() > data.lower_bound {
                data.lower_bound = sol.profit();
            }
            if self.verbosity >= 2 {
                println!("LB {} ({})", sol.profit(), message);
            }
        }
    }
    fn snapshot(&self) -> (Profit, Profit, Solution) {
        let data = self.critical.lock();
        (data.lower_bound, data.upper_bound, data.solution.clone())
    }
}

/// The auxiliary-task payload: computes the surrogate-relaxation bound on a
/// fresh copy of the instance and publishes it. The bisection polls the end
/// flag, so raising it cancels the task at its next step.
fn solve_surrogate_relaxation(instance: Instance, shared: &SharedOutput, end: &AtomicBool) {
    let lb = shared.lower_bound();
    let out = ub_surrogate(&instance, lb, Some(end));
    shared.update_ub(out.ub, "surrogate relaxation");
}

// ----------------------------------------------------------------------------
// --- DP STATE ---------------------------------------------------------------
// ----------------------------------------------------------------------------

/// The key of a DP state: cumulative weight (major) and profit (minor). The
/// derived ordering is exactly the lexicographic order the scans rely on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct BalknapState {
    mu: Weight,
    pi: Profit,
}

/// The value attached to a state: `a` is the smallest position from which
/// the state can still be derived by additions only, `a_prec` the watermark
/// of the last remove phase that processed it, and `sol` the packed window
/// decisions used to rebuild the selection.
#[derive(Copy, Clone, Debug)]
struct BalknapValue {
    a: ItemPos,
    a_prec: ItemPos,
    sol: PartSol,
}

/// What a pass asks the driver loop to do next.
enum PassResult {
    /// The search is over (converged, trivially solved, or aborted).
    Stop,
    /// Re-run on the residual instance restricted to `[first, last]` with
    /// the window verdicts applied.
    Recurse {
        first: ItemPos,
        last: ItemPos,
        verdicts: Vec<Option<bool>>,
    },
}

/// How the DP loop of one pass ended.
enum LoopExit {
    /// Normal completion: collapse the upper bound and reconstruct.
    Finished,
    /// Time budget exhausted or external cancellation: return as-is.
    Aborted,
}

// ----------------------------------------------------------------------------
// --- ENGINE -----------------------------------------------------------------
// ----------------------------------------------------------------------------

struct BalknapSolver<'a> {
    params: &'a BalknapParams,
    shared: Arc<SharedOutput>,
    end: Arc<AtomicBool>,
    start: Instant,
    surrelax: StateCount,
    greedynlogn: StateCount,
    recursive_call_number: usize,
}

/// Solves the given instance to optimality (within the time budget). The
/// returned bounds are equal on convergence; on a timeout or external
/// cancellation the gap may stay positive and the solution is the best
/// feasible one found.
pub fn balknap(mut instance: Instance, params: &BalknapParams) -> BalknapOutput {
    if params.verbosity >= 1 {
        let mut banner = String::from("*** balknap");
        if params.partial_solution_size != 64 {
            banner.push_str(&format!(" k {}", params.partial_solution_size));
        }
        if !params.greedy {
            banner.push_str(" g false");
        }
        if params.greedynlogn != -1 {
            banner.push_str(&format!(" gn {}", params.greedynlogn));
        }
        if params.surrelax != -1 {
            banner.push_str(&format!(" s {}", params.surrelax));
        }
        banner.push_str(" ***");
        println!("{}", banner);
    }

    let end = match &params.end {
        Some(end) => Arc::clone(end),
        None => Arc::new(AtomicBool::new(false)),
    };
    let shared = Arc::new(SharedOutput::new(instance.item_number(), params.verbosity));
    let mut solver = BalknapSolver {
        params,
        shared: Arc::clone(&shared),
        end,
        start: Instant::now(),
        surrelax: params.surrelax,
        greedynlogn: params.greedynlogn,
        recursive_call_number: 0,
    };

    instance.fix_zero_weight_items();
    loop {
        solver.recursive_call_number += 1;
        match solver.pass(&mut instance) {
            PassResult::Stop => break,
            PassResult::Recurse {
                first,
                last,
                verdicts,
            } => {
                instance.set_first_item(first);
                instance.set_last_item(last);
                instance.fix(&verdicts);
            }
        }
    }

    let (lower_bound, upper_bound, solution) = shared.snapshot();
    if params.verbosity >= 1 {
        println!(
            "Final LB {} UB {} ({} pass(es))",
            lower_bound, upper_bound, solver.recursive_call_number
        );
    }
    BalknapOutput {
        solution,
        lower_bound,
        upper_bound,
        recursive_call_number: solver.recursive_call_number,
    }
}

impl BalknapSolver<'_> {
    fn time_is_up(&self) -> bool {
        self.params
            .time_limit
            .map_or(false, |limit| self.start.elapsed() >= limit)
    }

    fn trivial_reduced(&self, instance: &Instance) -> PassResult {
        let sol = match instance.reduced_solution() {
            Some(sol) => sol.clone(),
            None => Solution::new(instance.item_number()),
        };
        self.shared.update_sol(&sol, "no item or null capacity (lb)");
        self.shared
            .update_ub(self.shared.lower_bound(), "no item or null capacity (ub)");
        PassResult::Stop
    }

    fn trivial_single(&self, instance: &Instance) -> PassResult {
        let mut sol = match instance.reduced_solution() {
            Some(sol) => sol.clone(),
            None => Solution::new(instance.item_number()),
        };
        let it = *instance.item(instance.first_item());
        if it.w <= instance.reduced_capacity() {
            sol.set(&it, true);
        }
        self.shared.update_sol(&sol, "one item (lb)");
        self.shared
            .update_ub(self.shared.lower_bound(), "one item (ub)");
        PassResult::Stop
    }

    fn trivial_all_fit(&self, instance: &Instance) -> PassResult {
        if let Some(bsol) = instance.break_solution() {
            self.shared
                .update_sol(bsol, "all items fit in the knapsack (lb)");
        }
        self.shared
            .update_ub(self.shared.lower_bound(), "all items fit in the knapsack (ub)");
        PassResult::Stop
    }

    /// Fires the one-shot bound refreshes once the state map is big enough.
    /// The surrogate relaxation runs on its own scoped thread when a spare
    /// hardware thread exists, inline otherwise; the `O(n log n)` greedy
    /// always runs inline and publishes through the shared record.
    fn maybe_refresh<'env>(
        &self,
        scope: &crossbeam::thread::Scope<'env>,
        instance: &Instance,
        surrelax: &mut StateCount,
        greedynlogn: &mut StateCount,
        map_size: usize,
    ) {
        if *surrelax >= 0 && *surrelax <= map_size as StateCount {
            *surrelax = -1;
            if self.params.verbosity >= 2 {
                println!("surrogate relaxation triggered ({} states)", map_size);
            }
            let copy = instance.reset();
            let shared = Arc::clone(&self.shared);
            let end = Arc::clone(&self.end);
            if num_cpus::get() > 1 {
                scope.spawn(move |_| {
                    solve_surrogate_relaxation(copy, &shared, &end);
                });
            } else {
                solve_surrogate_relaxation(copy, &shared, &end);
            }
        }
        if *greedynlogn >= 0 && *greedynlogn <= map_size as StateCount {
            *greedynlogn = -1;
            if self.params.verbosity >= 2 {
                println!("greedynlogn triggered ({} states)", map_size);
            }
            let sol = bestgreedynlogn(instance);
            self.shared.update_sol(&sol, "greedynlogn");
        }
    }

    /// One pass of the engine: sorting, initial bounds, reduction, the DP
    /// loop itself, and the decision to stop or to recurse on the residual.
    fn pass(&mut self, instance: &mut Instance) -> PassResult {
        // trivial cases on the raw window
        if instance.reduced_item_number() == 0 || instance.reduced_capacity() == 0 {
            return self.trivial_reduced(instance);
        }
        if instance.reduced_item_number() == 1 {
            return self.trivial_single(instance);
        }

        // sorting
        match self.params.ub {
            UbPolicy::Break => instance.sort_partially(),
            UbPolicy::Moving => instance.sort(),
        }
        if instance.break_item() == instance.last_item() + 1 {
            return self.trivial_all_fit(instance);
        }

        // initial lower bound
        let initial = if self.params.greedy {
            greedy(instance)
        } else {
            match instance.break_solution() {
                Some(sol) => sol.clone(),
                None => Solution::new(instance.item_number()),
            }
        };
        if self.shared.lower_bound() < initial.profit() {
            self.shared.update_sol(&initial, "initial solution");
        }

        // variable reduction; on later passes the optimum is known, so the
        // reduction may use it minus one and keep every optimal witness
        let lb_red = if self.recursive_call_number == 1 {
            self.shared.lower_bound()
        } else {
            self.shared.lower_bound() - 1
        };
        match self.params.ub {
            UbPolicy::Break => instance.reduce1(lb_red),
            UbPolicy::Moving => instance.reduce2(lb_red),
        }
        if self.params.verbosity >= 2 {
            println!(
                "Reduction: lb {} - n {}/{} - c {}/{}",
                lb_red,
                instance.reduced_item_number(),
                instance.item_number(),
                instance.reduced_capacity(),
                instance.capacity()
            );
        }
        if instance.reduced_capacity() < 0 {
            self.shared
                .update_ub(self.shared.lower_bound(), "negative capacity after reduction");
            return PassResult::Stop;
        }
        if let Some(bsol) = instance.break_solution() {
            if self.shared.solution_profit() < bsol.profit() {
                let bsol = bsol.clone();
                self.shared.update_sol(&bsol, "break solution after reduction");
            }
        }

        // trivial cases on the reduced window
        if instance.reduced_item_number() == 0 || instance.reduced_capacity() == 0 {
            return self.trivial_reduced(instance);
        }
        if instance.reduced_item_number() == 1 {
            return self.trivial_single(instance);
        }
        if instance.break_item() == instance.last_item() + 1 {
            return self.trivial_all_fit(instance);
        }

        let c = instance.capacity();
        let f = instance.first_item();
        let l = instance.last_item();
        let b = instance.break_item();
        let (w_bar, p_bar) = instance
            .break_solution()
            .map_or((0, 0), |sol| (sol.weight(), sol.profit()));

        // initial upper bound
        let ub_init = ub_dantzig(instance).max(self.shared.lower_bound());
        self.shared.update_ub(ub_init, "dantzig upper bound");
        if self.shared.solution_profit() == self.shared.upper_bound() {
            return PassResult::Stop;
        }

        // seed the DP with the break configuration
        let psol_size = self.params.partial_solution_size.max(1).min(64);
        let psolf = PartSolFactory::new(psol_size, b, f, l);
        let mut psol_init = PartSol::default();
        for j in f..b {
            psol_init = psolf.add(psol_init, j);
        }
        let mut map: BTreeMap<BalknapState, BalknapValue> = BTreeMap::new();
        let init_key = BalknapState { mu: w_bar, pi: p_bar };
        let init_val = BalknapValue {
            a: b,
            a_prec: f,
            sol: psol_init,
        };
        map.insert(init_key, init_val);
        let mut best_state = (init_key, init_val);
        let mut last_item = b - 1;
        let mut lb = if self.recursive_call_number == 1 {
            self.shared.lower_bound()
        } else {
            self.shared.lower_bound() - 1
        };

        let mut surrelax = self.surrelax;
        let mut greedynlogn = self.greedynlogn;
        let this: &BalknapSolver<'_> = self;

        let exit = crossbeam::thread::scope(|scope| {
            for t in b..=l {
                this.maybe_refresh(scope, instance, &mut surrelax, &mut greedynlogn, map.len());
                if this.time_is_up() {
                    if this.params.set_end {
                        this.end.store(true, Ordering::Relaxed);
                    }
                    return LoopExit::Aborted;
                }
                if this.params.stop_if_end && this.end.load(Ordering::Relaxed) {
                    return LoopExit::Aborted;
                }
                if this.shared.solution_profit() == this.shared.upper_bound()
                    || best_state.0.pi == this.shared.upper_bound()
                {
                    break;
                }

                let wt = instance.item(t).w;
                let pt = instance.item(t).p;

                // bounding: prune the feasible states and collect the next
                // global upper bound candidate
                let mut ub_t: Profit = -1;
                map.retain(|key, _value| {
                    if key.mu > c {
                        return true;
                    }
                    let ub_local = match this.params.ub {
                        UbPolicy::Break => ub_dembo(instance, b, key.pi, c - key.mu),
                        UbPolicy::Moving => ub_dembo(instance, t, key.pi, c - key.mu),
                    };
                    if ub_local < lb {
                        false
                    } else {
                        if ub_t < ub_local {
                            ub_t = ub_local;
                        }
                        true
                    }
                });
                if ub_t != -1 && this.shared.upper_bound() > ub_t {
                    this.shared.update_ub(ub_t, &format!("it {} (ub)", t - b));
                    if this.shared.solution_profit() == this.shared.upper_bound()
                        || best_state.0.pi == this.shared.upper_bound()
                    {
                        return LoopExit::Finished;
                    }
                }

                if map.is_empty() {
                    break;
                }
                if best_state.0.pi == this.shared.upper_bound() {
                    return LoopExit::Finished;
                }
                if this.params.stop_if_end && this.end.load(Ordering::Relaxed) {
                    return LoopExit::Aborted;
                }

                // add item t: walk the feasible states by decreasing weight
                // and shift each of them by (wt, pt)
                let feasible: Vec<(BalknapState, BalknapValue)> = map
                    .range(
                        ..=BalknapState {
                            mu: c,
                            pi: Profit::MAX,
                        },
                    )
                    .map(|(key, value)| (*key, *value))
                    .collect();
                for (skey, sval) in feasible.iter().rev() {
                    let mu_ = skey.mu + wt;
                    let pi_ = skey.pi + pt;
                    let nsol = psolf.add(sval.sol, t);

                    if mu_ <= c && pi_ > lb {
                        if this.recursive_call_number == 1 {
                            this.shared.update_lb(pi_, &format!("it {} (lb)", t - b));
                            lb = pi_;
                        }
                        best_state = (
                            BalknapState { mu: mu_, pi: pi_ },
                            BalknapValue {
                                a: sval.a,
                                a_prec: f,
                                sol: nsol,
                            },
                        );
                        last_item = t;
                        if best_state.0.pi == this.shared.upper_bound() {
                            return LoopExit::Finished;
                        }
                    }

                    let ub_local = match this.params.ub {
                        UbPolicy::Break => {
                            if mu_ <= c {
                                ub_dembo(instance, b, pi_, c - mu_)
                            } else {
                                ub_dembo_rev(instance, b, pi_, c - mu_)
                            }
                        }
                        UbPolicy::Moving => {
                            if mu_ <= c {
                                ub_dembo(instance, t + 1, pi_, c - mu_)
                            } else {
                                ub_dembo_rev(instance, sval.a - 1, pi_, c - mu_)
                            }
                        }
                    };
                    if ub_local <= lb {
                        continue;
                    }
                    match map.entry(BalknapState { mu: mu_, pi: pi_ }) {
                        Entry::Vacant(entry) => {
                            entry.insert(BalknapValue {
                                a: sval.a,
                                a_prec: f,
                                sol: nsol,
                            });
                        }
                        Entry::Occupied(mut entry) => {
                            if entry.get().a < sval.a {
                                let value = entry.get_mut();
                                value.a = sval.a;
                                value.sol = nsol;
                            }
                        }
                    }
                }

                // remove previously added items: walk the overfull states by
                // decreasing weight; reinsertions below the cursor are
                // themselves visited within this same phase
                let mut cursor: Option<BalknapState> = None;
                loop {
                    let entry = match cursor {
                        None => map.iter().next_back(),
                        Some(key) => map.range(..key).next_back(),
                    };
                    let (skey, sval) = match entry {
                        Some((key, value)) if key.mu > c => (*key, *value),
                        _ => break,
                    };
                    cursor = Some(skey);
                    if skey.mu > c + wt {
                        continue;
                    }

                    this.maybe_refresh(scope, instance, &mut surrelax, &mut greedynlogn, map.len());
                    if this.time_is_up() {
                        if this.params.set_end {
                            this.end.store(true, Ordering::Relaxed);
                        }
                        return LoopExit::Aborted;
                    }
                    if this.params.stop_if_end && this.end.load(Ordering::Relaxed) {
                        return LoopExit::Aborted;
                    }
                    if this.shared.solution_profit() == this.shared.upper_bound()
                        || best_state.0.pi == this.shared.upper_bound()
                    {
                        break;
                    }

                    for j in sval.a_prec..sval.a {
                        let it = *instance.item(j);
                        let mu_ = skey.mu - it.w;
                        let pi_ = skey.pi - it.p;
                        let nsol = psolf.remove(sval.sol, j);

                        if mu_ <= c && pi_ > lb {
                            if this.recursive_call_number == 1 {
                                this.shared.update_lb(pi_, &format!("it {} (lb)", t - b));
                                lb = pi_;
                            }
                            best_state = (
                                BalknapState { mu: mu_, pi: pi_ },
                                BalknapValue {
                                    a: j,
                                    a_prec: f,
                                    sol: nsol,
                                },
                            );
                            last_item = t;
                            if best_state.0.pi == this.shared.upper_bound() {
                                return LoopExit::Finished;
                            }
                        }

                        let ub_local = match this.params.ub {
                            UbPolicy::Break => {
                                if mu_ <= c {
                                    ub_dembo(instance, b, pi_, c - mu_)
                                } else {
                                    ub_dembo_rev(instance, b, pi_, c - mu_)
                                }
                            }
                            UbPolicy::Moving => {
                                if mu_ <= c {
                                    ub_dembo(instance, t + 1, pi_, c - mu_)
                                } else {
                                    ub_dembo_rev(instance, j - 1, pi_, c - mu_)
                                }
                            }
                        };
                        if ub_local <= lb {
                            continue;
                        }
                        match map.entry(BalknapState { mu: mu_, pi: pi_ }) {
                            Entry::Vacant(entry) => {
                                entry.insert(BalknapValue {
                                    a: j,
                                    a_prec: f,
                                    sol: nsol,
                                });
                            }
                            Entry::Occupied(mut entry) => {
                                if entry.get().a < j {
                                    let value = entry.get_mut();
                                    value.a = j;
                                    value.sol = nsol;
                                }
                            }
                        }
                    }
                    if let Some(value) = map.get_mut(&skey) {
                        value.a_prec = sval.a;
                    }
                }
            }
            LoopExit::Finished
        })
        .expect("something went wrong with the auxiliary threads");

        self.surrelax = surrelax;
        self.greedynlogn = greedynlogn;

        match exit {
            LoopExit::Aborted => PassResult::Stop,
            LoopExit::Finished => {
                self.shared
                    .update_ub(self.shared.lower_bound(), "tree search completed");
                if self.params.set_end {
                    self.end.store(true, Ordering::Relaxed);
                }
                if self.shared.lower_bound() == self.shared.solution_profit() {
                    PassResult::Stop
                } else {
                    PassResult::Recurse {
                        first: best_state.1.a,
                        last: last_item,
                        verdicts: psolf.vector(best_state.1.sol),
                    }
                }
            }
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
