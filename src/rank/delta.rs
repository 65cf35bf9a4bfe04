/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Dangling-mass accounting.
//!
//! The rank held by dangling pages at the start of a round has nowhere to
//! flow, so it is collected into a [`GlobalDelta`] and handed back to every
//! page in equal shares one round later (see [`DeltaDistributor`]). After the
//! last round the same distributor is applied once more, with no further
//! propagation, so that the final ranks sum to one.
//!
//! # Fixed-point accumulation
//!
//! Each dangling rank is multiplied by [`DELTA_SCALE`] (10¹⁰) and truncated
//! to an integer before being summed. Integer addition is associative, so the
//! resulting delta is bit-for-bit identical whatever the number of tasks and
//! whatever the order in which their partial sums are combined. The price is
//! an absolute error of at most 10⁻¹⁰ per dangling page.
//!
//! The representable mass is bounded by `u64::MAX` / 10¹⁰ (about 1.8 · 10⁹).
//! A rank beyond that bound, or a total exceeding it, marks the accumulator
//! as overflowed rather than wrapping around.

use crate::store::PageNode;
use dsi_progress_logger::ConcurrentProgressLog;
use rayon::prelude::*;

/// The fixed-point scale of [`GlobalDelta`].
pub const DELTA_SCALE: f64 = 1E10;

/// The total dangling rank observed during a round, in fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalDelta(u64);

impl GlobalDelta {
    pub const ZERO: Self = Self(0);

    /// Creates a delta from its scaled integer representation.
    pub fn from_scaled(scaled: u64) -> Self {
        Self(scaled)
    }

    /// Creates a delta from a rank mass, truncating it to fixed point.
    ///
    /// Returns `None` if the mass is negative, not finite, or not
    /// representable.
    pub fn try_from_mass(mass: f64) -> Option<Self> {
        if mass < 0.0 {
            return None;
        }
        scale(mass).map(Self)
    }

    /// Creates a delta from a rank mass, truncating it to fixed point.
    ///
    /// # Panics
    ///
    /// If the mass is not representable (see [`try_from_mass`](Self::try_from_mass)).
    pub fn from_mass(mass: f64) -> Self {
        Self::try_from_mass(mass)
            .unwrap_or_else(|| panic!("Dangling mass {mass} is not representable"))
    }

    /// Returns the scaled integer representation.
    pub fn scaled(&self) -> u64 {
        self.0
    }

    /// Returns the rank mass.
    pub fn mass(&self) -> f64 {
        self.0 as f64 / DELTA_SCALE
    }

    /// Adds two deltas, returning `None` on overflow.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl std::fmt::Display for GlobalDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} scaled)", self.mass(), self.0)
    }
}

/// Scales a nonnegative rank, truncating toward zero.
#[inline(always)]
fn scale(rank: f64) -> Option<u64> {
    let scaled = rank * DELTA_SCALE;
    // u64::MAX rounds up to 2⁶⁴ as a float; NaN fails the comparison
    if scaled < u64::MAX as f64 {
        Some(scaled as u64)
    } else {
        None
    }
}

/// Per-task accumulator of dangling rank.
///
/// Every task of the emit phase owns one; accumulators are then combined with
/// [`merge`](Self::merge), in any order. Overflow is sticky: since all
/// terms are nonnegative, it is detected exactly when the total is not
/// representable, whatever the grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DanglingAccumulator {
    scaled: u64,
    overflow: bool,
    pages: usize,
}

impl DanglingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the rank of a dangling page.
    #[inline(always)]
    pub fn absorb(&mut self, rank: f64) {
        match scale(rank).and_then(|scaled| self.scaled.checked_add(scaled)) {
            Some(scaled) => self.scaled = scaled,
            None => self.overflow = true,
        }
        self.pages += 1;
    }

    /// Combines two accumulators.
    pub fn merge(self, other: Self) -> Self {
        let sum = self.scaled.checked_add(other.scaled);
        Self {
            scaled: sum.unwrap_or(u64::MAX),
            overflow: self.overflow || other.overflow || sum.is_none(),
            pages: self.pages + other.pages,
        }
    }

    /// Returns the number of dangling pages absorbed.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Returns the accumulated delta, or `None` if it overflowed.
    pub fn delta(&self) -> Option<GlobalDelta> {
        (!self.overflow).then_some(GlobalDelta(self.scaled))
    }
}

/// Gives every page an equal share of a [`GlobalDelta`].
///
/// The share is (1 − α) · δ / *n*. It is applied both at the start of each
/// round, to the delta of the previous round, and once after the last round,
/// to the delta of the last round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaDistributor {
    share: f64,
}

impl DeltaDistributor {
    /// Creates a distributor for the given delta, jump probability α and
    /// number of pages.
    pub fn new(delta: GlobalDelta, alpha: f64, num_pages: usize) -> Self {
        let share = if num_pages == 0 {
            0.0
        } else {
            ((1.0 - alpha) * delta.mass()) / num_pages as f64
        };
        Self { share }
    }

    /// Returns the share each page receives.
    pub fn share(&self) -> f64 {
        self.share
    }

    /// Returns `rank` plus the share.
    #[inline(always)]
    pub fn adjust(&self, rank: f64) -> f64 {
        rank + self.share
    }

    /// Adds the share to the rank of every page.
    ///
    /// No message is emitted: this is the final, propagation-free pass.
    /// Each Rayon task updates `node_granularity` pages.
    pub fn distribute(
        &self,
        nodes: &mut [PageNode],
        node_granularity: usize,
        cpl: &mut impl ConcurrentProgressLog,
    ) {
        cpl.item_name("page");
        cpl.expected_updates(Some(nodes.len()));
        cpl.start(format!("Distributing a share of {} to every page...", self.share));
        nodes
            .par_chunks_mut(node_granularity.max(1))
            .for_each_with(cpl.clone(), |cpl, chunk| {
                for node in chunk.iter_mut() {
                    node.rank = self.adjust(node.rank);
                }
                cpl.update_with_count(chunk.len());
            });
        cpl.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation() {
        let mut acc = DanglingAccumulator::new();
        acc.absorb(1.0);
        assert_eq!(acc.delta(), Some(GlobalDelta::from_scaled(10_000_000_000)));
        acc.absorb(0.123_456_789_012_9);
        // The digits beyond the tenth decimal are truncated
        assert_eq!(acc.delta(), Some(GlobalDelta::from_scaled(11_234_567_890)));
        assert_eq!(acc.pages(), 2);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let ranks = [0.1, 0.2, 0.3, 1E-11, 0.7, 0.05];
        let mut forward = DanglingAccumulator::new();
        ranks.iter().for_each(|&r| forward.absorb(r));

        let (left, right) = ranks.split_at(2);
        let mut a = DanglingAccumulator::new();
        let mut b = DanglingAccumulator::new();
        right.iter().rev().for_each(|&r| b.absorb(r));
        left.iter().for_each(|&r| a.absorb(r));

        assert_eq!(forward, b.merge(a));
        let (a, b) = (a.delta().unwrap(), b.delta().unwrap());
        assert_eq!(forward.delta(), a.checked_add(b));
    }

    #[test]
    fn test_overflow() {
        // Each rank fits, their sum does not
        let mut acc = DanglingAccumulator::new();
        acc.absorb(1E9);
        assert!(acc.delta().is_some());
        acc.absorb(1E9);
        assert_eq!(acc.delta(), None);
        assert_eq!(acc.pages(), 2);
        // Overflow survives further merges
        assert_eq!(acc.merge(DanglingAccumulator::new()).delta(), None);

        let mut a = DanglingAccumulator::new();
        let mut b = DanglingAccumulator::new();
        a.absorb(1E9);
        b.absorb(1E9);
        assert_eq!(a.merge(b).delta(), None);

        let mut huge = DanglingAccumulator::new();
        huge.absorb(1E300);
        assert_eq!(huge.delta(), None);

        let max = GlobalDelta::from_scaled(u64::MAX);
        assert_eq!(max.checked_add(GlobalDelta::ZERO), Some(max));
        assert_eq!(max.checked_add(GlobalDelta::from_scaled(1)), None);
        assert_eq!(GlobalDelta::try_from_mass(2E9), None);
        assert_eq!(GlobalDelta::try_from_mass(-1.0), None);
        assert_eq!(GlobalDelta::try_from_mass(f64::NAN), None);
    }

    #[test]
    fn test_share() {
        let distributor = DeltaDistributor::new(GlobalDelta::from_mass(1.0), 0.15, 1);
        assert!((distributor.adjust(1.0) - 1.85).abs() < 1E-15);
        assert_eq!(DeltaDistributor::new(GlobalDelta::ZERO, 0.15, 10).share(), 0.0);
        assert_eq!(DeltaDistributor::new(GlobalDelta::from_mass(1.0), 0.15, 0).share(), 0.0);
    }
}
