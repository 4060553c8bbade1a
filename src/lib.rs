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

//! # BALKNAP
//! Balknap is an exact solver for the binary (0-1) knapsack problem written
//! in Rust. Its core is a *balanced* primal-dual dynamic program: starting
//! from the break solution, the search simultaneously adds items located
//! after the break item and removes items located before it, so that the
//! explored states hover around the capacity instead of sweeping the whole
//! weight range. The engine is supported by instance reduction, partial
//! sorting around the break item, Dantzig/Dembo upper bounds, greedy lower
//! bounds and a surrogate-relaxation bound refined asynchronously while the
//! search runs.
//!
//! ## Organization
//! - `common` defines the basic scalar and item types used everywhere.
//! - `solution` defines the bitset-backed selection type.
//! - `instance` is the mutable item store with its reordering, reduction and
//!   surrogate transformations.
//! - `bounds` provides the Dantzig and Dembo upper bound calculators.
//! - `part_solution` packs a window of item decisions around the break item
//!   into a machine word so that states can carry a reconstruction hint.
//! - `algorithms` hosts the greedy lower bounds, the surrogate-relaxation
//!   upper bound and the balanced dynamic programming engine itself.
pub mod common;
pub mod solution;
pub mod instance;
pub mod bounds;
pub mod part_solution;
pub mod algorithms;

pub use crate::common::{Interval, Item, ItemPos, Profit, SortStatus, StateCount, Weight};
pub use crate::instance::{Instance, InstanceError};
pub use crate::solution::Solution;
pub use crate::part_solution::{PartSol, PartSolFactory};
pub use crate::algorithms::balknap::{balknap, BalknapOutput, BalknapParams, UbPolicy};
