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

//! This module implements the partial-solution codec. A `PartSol` packs the
//! in/out decisions for a contiguous window of item positions around the
//! break item into one machine word, so that every state of the dynamic
//! program can carry a compact reconstruction hint. The window `[x1, x2]` is
//! chosen once per run by the `PartSolFactory`; decisions for positions
//! outside the window are simply not recorded (writes are no-ops).

use crate::common::ItemPos;

/// A packed set of in/out decisions for the item positions of the factory
/// window. The default value records no decision at all.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PartSol(u64);

/// The factory holding the window geometry. All bit manipulations go through
/// it, since the bit index of a position depends on the window placement.
#[derive(Copy, Clone, Debug)]
pub struct PartSolFactory {
    x1: ItemPos,
    x2: ItemPos,
}

impl PartSolFactory {
    /// Builds a factory for a window of at most `size` positions (with
    /// `1 <= size <= 64`) inside `[f, l]`. The window is centered on the
    /// break item `b` when there is room on both sides, and is otherwise
    /// placed flush against the nearest end:
    /// - if the whole range fits, the window is `[f, l]`;
    /// - else if `b` is close to `f`, the window is `[f, f + size - 1]`;
    /// - else if `b` is close to `l`, the window is `[l - size + 1, l]`;
    /// - else the window is `[b - size/2, b - size/2 + size - 1]`.
    pub fn new(size: ItemPos, b: ItemPos, f: ItemPos, l: ItemPos) -> PartSolFactory {
        debug_assert!((1..=64).contains(&size));
        let (x1, x2) = if l - f + 1 < size {
            (f, l)
        } else if b - f + 1 <= size / 2 {
            (f, f + size - 1)
        } else if l - b + 1 <= size / 2 {
            (l - size + 1, l)
        } else {
            (b - size / 2, b - size / 2 + size - 1)
        };
        PartSolFactory { x1, x2 }
    }
    /// The first position covered by the window.
    pub fn x1(&self) -> ItemPos {
        self.x1
    }
    /// The last position covered by the window.
    pub fn x2(&self) -> ItemPos {
        self.x2
    }
    /// The number of positions covered by the window.
    pub fn size(&self) -> ItemPos {
        self.x2 - self.x1 + 1
    }
    /// Returns true iff position `i` lies inside the window and is recorded
    /// as included in `s`.
    pub fn contains(&self, s: PartSol, i: ItemPos) -> bool {
        if i < self.x1 || self.x2 < i {
            return false;
        }
        (s.0 >> (i - self.x1) as u64) & 1 == 1
    }
    /// Records position `i` as included. Outside the window, this is a no-op
    /// returning `s` unchanged.
    pub fn add(&self, s: PartSol, i: ItemPos) -> PartSol {
        if i < self.x1 || self.x2 < i {
            return s;
        }
        debug_assert!(!self.contains(s, i));
        PartSol(s.0 | (1u64 << (i - self.x1) as u64))
    }
    /// Records position `i` as excluded. Outside the window, this is a no-op
    /// returning `s` unchanged.
    pub fn remove(&self, s: PartSol, i: ItemPos) -> PartSol {
        if i < self.x1 || self.x2 < i {
            return s;
        }
        debug_assert!(self.contains(s, i));
        PartSol(s.0 & !(1u64 << (i - self.x1) as u64))
    }
    /// Flips the decision recorded for position `i`. Outside the window, this
    /// is a no-op returning `s` unchanged.
    pub fn toggle(&self, s: PartSol, i: ItemPos) -> PartSol {
        if i < self.x1 || self.x2 < i {
            return s;
        }
        PartSol(s.0 ^ (1u64 << (i - self.x1) as u64))
    }
    /// Expands `s` into one verdict per position of `[0, x2]`:
    /// `None` for positions outside the window (no decision was recorded),
    /// `Some(true)` for recorded inclusions and `Some(false)` for recorded
    /// exclusions.
    pub fn vector(&self, s: PartSol) -> Vec<Option<bool>> {
        (0..=self.x2)
            .map(|i| {
                if i < self.x1 {
                    None
                } else {
                    Some(self.contains(s, i))
                }
            })
            .collect()
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_window_selection {
    use crate::part_solution::PartSolFactory;

    #[test]
    fn small_ranges_are_covered_entirely() {
        let psolf = PartSolFactory::new(64, 10, 3, 20);
        assert_eq!(3, psolf.x1());
        assert_eq!(20, psolf.x2());
        assert_eq!(18, psolf.size());
    }
    #[test]
    fn a_break_item_close_to_the_front_pins_the_window_left() {
        let psolf = PartSolFactory::new(8, 2, 0, 100);
        assert_eq!(0, psolf.x1());
        assert_eq!(7, psolf.x2());
    }
    #[test]
    fn a_break_item_close_to_the_back_pins_the_window_right() {
        let psolf = PartSolFactory::new(8, 98, 0, 100);
        assert_eq!(93, psolf.x1());
        assert_eq!(100, psolf.x2());
    }
    #[test]
    fn otherwise_the_window_is_centered_on_the_break_item() {
        let psolf = PartSolFactory::new(8, 50, 0, 100);
        assert_eq!(46, psolf.x1());
        assert_eq!(53, psolf.x2());
        assert_eq!(8, psolf.size());
    }
}

#[cfg(test)]
mod test_codec {
    use crate::part_solution::{PartSol, PartSolFactory};

    #[test]
    fn add_then_contains_round_trips() {
        let psolf = PartSolFactory::new(8, 4, 0, 10);
        let s = psolf.add(PartSol::default(), 3);
        assert!(psolf.contains(s, 3));
        assert!(!psolf.contains(s, 2));
    }
    #[test]
    fn remove_undoes_add() {
        let psolf = PartSolFactory::new(8, 4, 0, 10);
        let empty = PartSol::default();
        let s = psolf.add(empty, 5);
        assert_eq!(empty, psolf.remove(s, 5));
    }
    #[test]
    fn toggling_twice_is_the_identity() {
        let psolf = PartSolFactory::new(8, 4, 0, 10);
        let s = psolf.add(PartSol::default(), 1);
        assert_eq!(s, psolf.toggle(psolf.toggle(s, 6), 6));
    }
    #[test]
    fn writes_outside_the_window_are_no_ops() {
        let psolf = PartSolFactory::new(4, 6, 0, 20);
        let s = psolf.add(PartSol::default(), psolf.x1());
        assert_eq!(s, psolf.add(s, psolf.x2() + 1));
        assert_eq!(s, psolf.remove(s, psolf.x1() - 1));
        assert_eq!(s, psolf.toggle(s, 20));
        assert!(!psolf.contains(s, psolf.x2() + 1));
    }
    #[test]
    fn a_full_width_window_uses_all_64_bits() {
        let psolf = PartSolFactory::new(64, 40, 0, 200);
        let mut s = PartSol::default();
        for i in psolf.x1()..=psolf.x2() {
            s = psolf.add(s, i);
        }
        for i in psolf.x1()..=psolf.x2() {
            assert!(psolf.contains(s, i));
        }
    }
    #[test]
    fn vector_reports_undecided_excluded_and_included_positions() {
        let psolf = PartSolFactory::new(4, 4, 0, 10);
        // window is [2, 5]
        assert_eq!(2, psolf.x1());
        assert_eq!(5, psolf.x2());
        let s = psolf.add(psolf.add(PartSol::default(), 2), 4);
        let vec = psolf.vector(s);
        assert_eq!(6, vec.len());
        assert_eq!(None, vec[0]);
        assert_eq!(None, vec[1]);
        assert_eq!(Some(true), vec[2]);
        assert_eq!(Some(false), vec[3]);
        assert_eq!(Some(true), vec[4]);
        assert_eq!(Some(false), vec[5]);
    }
}
