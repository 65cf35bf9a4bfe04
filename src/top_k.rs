/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Selection of the items with largest rank.
//!
//! A [`TopK`] keeps the best *k* items seen so far in a
//! [quaternary heap](dary_heap::QuaternaryHeap) whose top is the weakest
//! retained item, so each insertion costs *O*(log *k*) and memory is bounded
//! by *k* regardless of the length of the input.
//!
//! Selections over disjoint parts of the input can be
//! [merged](TopK::merge); [`par_top_k`] uses this to select in parallel with
//! a Rayon fold/reduce.
//!
//! Items with equal rank are ordered by insertion: the item inserted first
//! is considered larger. Merging preserves this order, provided the left
//! operand saw items preceding those seen by the right operand.

use crate::store::{Graph, PageId};
use dary_heap::QuaternaryHeap;
use rayon::prelude::*;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
struct Entry<T> {
    rank: f64,
    seq: u64,
    item: T,
}

impl<T> Entry<T> {
    /// Compares by rank, and then by reverse insertion order.
    #[inline(always)]
    fn strength(&self, other: &Self) -> Ordering {
        self.rank
            .total_cmp(&other.rank)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.strength(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    /// Reversed, so that the top of the heap is the weakest entry.
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        other.strength(self)
    }
}

/// A bounded selection of the items with largest rank.
///
/// # Examples
///
/// ```
/// use wikirank::top_k::TopK;
///
/// let mut top = TopK::new(2);
/// top.extend([("a", 0.1), ("b", 0.5), ("c", 0.3), ("d", 0.5)]);
/// assert_eq!(top.into_sorted_vec(), vec![("b", 0.5), ("d", 0.5)]);
/// ```
#[derive(Debug, Clone)]
pub struct TopK<T> {
    k: usize,
    pushed: u64,
    heap: QuaternaryHeap<Entry<T>>,
}

impl<T> TopK<T> {
    /// Creates an empty selection retaining at most `k` items.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            pushed: 0,
            // Avoid allocating huge heaps for k = usize::MAX
            heap: QuaternaryHeap::with_capacity(k.min(1 << 16)),
        }
    }

    /// Returns the maximum number of retained items.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of retained items.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the number of items offered so far, retained or not.
    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Returns the smallest retained rank, if any.
    pub fn min_rank(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.rank)
    }

    fn offer(&mut self, entry: Entry<T>) {
        if self.heap.len() < self.k {
            self.heap.push(entry);
        } else if let Some(mut weakest) = self.heap.peek_mut() {
            if entry.strength(&weakest) == Ordering::Greater {
                *weakest = entry;
            }
        }
    }

    /// Offers an item.
    ///
    /// If the selection is full, the item replaces the weakest retained item
    /// only if its rank is strictly larger.
    pub fn push(&mut self, item: T, rank: f64) {
        let seq = self.pushed;
        self.pushed += 1;
        self.offer(Entry { rank, seq, item });
    }

    /// Merges two selections, returning the best `self.k()` items of both.
    ///
    /// Items of `other` are considered inserted after all items of `self`.
    pub fn merge(mut self, other: Self) -> Self {
        let offset = self.pushed;
        self.pushed += other.pushed;
        for mut entry in other.heap.into_vec() {
            entry.seq += offset;
            self.offer(entry);
        }
        self
    }

    /// Returns the retained items in decreasing order of rank.
    pub fn into_sorted_vec(self) -> Vec<(T, f64)> {
        // The heap order is reversed, so ascending heap order is descending
        // rank order
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| (entry.item, entry.rank))
            .collect()
    }
}

impl<T> Extend<(T, f64)> for TopK<T> {
    fn extend<I: IntoIterator<Item = (T, f64)>>(&mut self, iter: I) {
        for (item, rank) in iter {
            self.push(item, rank);
        }
    }
}

/// Returns the `k` items with largest rank of a parallel iterator, in
/// decreasing order of rank.
///
/// Each Rayon task selects from its part of the input; the partial
/// selections are then merged in input order.
pub fn par_top_k<T: Send>(
    iter: impl ParallelIterator<Item = (T, f64)>,
    k: usize,
) -> Vec<(T, f64)> {
    iter.fold(
        || TopK::new(k),
        |mut top, (item, rank)| {
            top.push(item, rank);
            top
        },
    )
    .reduce(|| TopK::new(k), TopK::merge)
    .into_sorted_vec()
}

/// Returns the `k` pages of largest rank, in decreasing order of rank.
///
/// Pages with the same rank are returned in identifier order.
pub fn top_pages(graph: &Graph, k: usize) -> Vec<(PageId, f64)> {
    par_top_k(
        graph
            .nodes()
            .par_iter()
            .map(|node| (node.id.clone(), node.rank)),
        k,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_minimum() {
        let mut top = TopK::new(3);
        top.extend([(1, 0.1), (2, 0.4), (3, 0.2), (4, 0.3), (5, 0.05)]);
        assert_eq!(top.len(), 3);
        assert_eq!(top.pushed(), 5);
        assert_eq!(top.min_rank(), Some(0.2));
        assert_eq!(top.into_sorted_vec(), vec![(2, 0.4), (4, 0.3), (3, 0.2)]);
    }

    #[test]
    fn test_ties_keep_first() {
        let mut top = TopK::new(2);
        top.extend([("x", 1.0), ("y", 1.0), ("z", 1.0)]);
        assert_eq!(top.into_sorted_vec(), vec![("x", 1.0), ("y", 1.0)]);
    }

    #[test]
    fn test_zero() {
        let mut top = TopK::new(0);
        top.push((), 1.0);
        assert!(top.is_empty());
        assert!(top.into_sorted_vec().is_empty());
    }

    #[test]
    fn test_merge_order() {
        let mut left = TopK::new(2);
        left.extend([("a", 0.5), ("b", 0.1)]);
        let mut right = TopK::new(2);
        right.extend([("c", 0.5), ("d", 0.7)]);
        let merged = left.merge(right);
        assert_eq!(merged.pushed(), 4);
        assert_eq!(merged.into_sorted_vec(), vec![("d", 0.7), ("a", 0.5)]);
    }
}
