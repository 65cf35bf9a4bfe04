/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A single round of the PageRank recurrence.
//!
//! A round is a map–shuffle–reduce step over the pages of the graph:
//!
//! 1. _Emit_: pages are split into disjoint slices, one per Rayon task. Each
//!    page adds to its rank its share of the previous round's
//!    [`GlobalDelta`], then emits a [`Full`](RankRecord::Full) record keyed
//!    by itself and, if it has outbound links, a
//!    [`Partial`](RankRecord::Partial) record per link carrying
//!    rank / outdegree. Dangling pages instead feed their rank to the task's
//!    [`DanglingAccumulator`].
//! 2. _Shuffle_: every task routes its messages to a fixed number of
//!    partitions by hashing the destination key, so all messages for a key
//!    reach the same partition.
//! 3. _Aggregate_: each partition, in parallel, groups its messages by key.
//!    A key must have exactly one `Full` record; the new rank is
//!    α / *n* + (1 − α) *S*, where *S* is the sum of the `Partial` amounts.
//!
//! The accumulators are then summed into the delta handed to the next round.
//! The only state crossing the barrier between rounds is the new set of
//! pages and that delta.

use super::delta::{DanglingAccumulator, DeltaDistributor, GlobalDelta};
use super::record::{Message, Outbox, RankRecord};
use crate::store::{Adjacency, PageId, PageNode};
use dsi_progress_logger::ConcurrentProgressLog;
use kahan::KahanSum;
use rayon::prelude::*;
use std::collections::HashMap;

/// A structural error detected while aggregating a round.
///
/// These errors mean that the set of pages is not closed under links (or has
/// been corrupted), so the round cannot produce a meaningful result.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The page is the target of some links but was never defined, so its
    /// adjacency list is unknown.
    #[error("Page {id} received {contributions} contribution(s) but no record of its own")]
    MissingFull { id: String, contributions: usize },
    /// The page was emitted more than once in the same round.
    #[error("Page {id} received {count} records of its own")]
    DuplicateFull { id: String, count: usize },
    /// The rank held by dangling pages is too large for the fixed-point
    /// delta.
    #[error("The rank of {pages} dangling page(s) exceeds the representable dangling mass")]
    DanglingOverflow { pages: usize },
}

/// The parameters of a round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankIterator {
    alpha: f64,
    num_pages: usize,
    distributor: DeltaDistributor,
    partitions: usize,
    node_granularity: usize,
}

/// The result of a round.
#[derive(Debug, Clone)]
pub struct RoundOutput {
    /// The updated pages, sorted by identifier.
    pub nodes: Vec<PageNode>,
    /// The dangling mass observed during the round.
    pub delta: GlobalDelta,
    /// The number of dangling pages.
    pub dangling_pages: usize,
    /// The number of messages exchanged.
    pub messages: usize,
}

/// The records received by a key during aggregation.
struct Slot<'a> {
    full: Option<(&'a PageId, &'a Adjacency)>,
    fulls: usize,
    sum: KahanSum<f64>,
    partials: usize,
}

impl Default for Slot<'_> {
    fn default() -> Self {
        Self {
            full: None,
            fulls: 0,
            sum: KahanSum::new(),
            partials: 0,
        }
    }
}

impl RankIterator {
    /// Creates a round with jump probability `alpha` over `num_pages` pages,
    /// redistributing `delta`, the dangling mass of the previous round.
    pub fn new(alpha: f64, num_pages: usize, delta: GlobalDelta) -> Self {
        Self {
            alpha,
            num_pages,
            distributor: DeltaDistributor::new(delta, alpha, num_pages),
            partitions: rayon::current_num_threads().max(1),
            node_granularity: 1000,
        }
    }

    /// Sets the number of aggregation partitions.
    pub fn partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Sets the number of pages per emit task.
    pub fn node_granularity(mut self, node_granularity: usize) -> Self {
        self.node_granularity = node_granularity.max(1);
        self
    }

    /// Returns the rank of a page after the dangling-share adjustment.
    #[inline(always)]
    pub fn adjusted_rank(&self, rank: f64) -> f64 {
        self.distributor.adjust(rank)
    }

    /// Emits the records of a page.
    pub fn emit<'a>(
        &self,
        node: &'a PageNode,
        outbox: &mut Outbox<'a>,
        dangling: &mut DanglingAccumulator,
    ) {
        let rank = self.adjusted_rank(node.rank);
        outbox.push(
            &node.id,
            RankRecord::Full {
                id: &node.id,
                rank,
                adjacency: &node.adjacency,
            },
        );
        if node.is_dangling() {
            dangling.absorb(rank);
        } else {
            let amount = rank / node.outdegree() as f64;
            for neighbor in node.adjacency.iter() {
                outbox.push(neighbor, RankRecord::Partial { amount });
            }
        }
    }

    /// Returns the new rank of a page whose contributions sum to `sum`.
    #[inline(always)]
    pub fn damped_rank(&self, sum: f64) -> f64 {
        self.alpha / self.num_pages as f64 + (1.0 - self.alpha) * sum
    }

    /// Groups the messages of a partition by key and computes the new ranks.
    ///
    /// Buckets are processed in order, so the summation order of the
    /// contributions to a key depends only on the order of the buckets.
    fn aggregate<'a>(
        &self,
        buckets: Vec<Vec<Message<'a>>>,
    ) -> Result<Vec<PageNode>, InvariantViolation> {
        let mut slots: HashMap<&'a str, Slot<'a>> = HashMap::new();
        for message in buckets.into_iter().flatten() {
            let slot = slots.entry(message.key).or_default();
            match message.record {
                RankRecord::Full { id, adjacency, .. } => {
                    slot.full = Some((id, adjacency));
                    slot.fulls += 1;
                }
                RankRecord::Partial { amount } => {
                    slot.sum += amount;
                    slot.partials += 1;
                }
            }
        }

        let mut slots: Vec<(&str, Slot<'_>)> = slots.into_iter().collect();
        slots.sort_unstable_by_key(|(key, _)| *key);

        slots
            .into_iter()
            .map(|(key, slot)| match (slot.full, slot.fulls) {
                (Some((id, adjacency)), 1) => Ok(PageNode {
                    id: id.clone(),
                    rank: self.damped_rank(slot.sum.sum()),
                    adjacency: adjacency.clone(),
                }),
                (None, _) => Err(InvariantViolation::MissingFull {
                    id: key.to_owned(),
                    contributions: slot.partials,
                }),
                (Some(_), count) => Err(InvariantViolation::DuplicateFull {
                    id: key.to_owned(),
                    count,
                }),
            })
            .collect()
    }

    /// Runs the round over `nodes`, which must be sorted by identifier.
    ///
    /// `cpl` logs the emit phase, page by page.
    pub fn round(
        &self,
        nodes: &[PageNode],
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<RoundOutput, InvariantViolation> {
        cpl.item_name("page");
        cpl.expected_updates(Some(nodes.len()));
        cpl.start("Emitting records...");

        let emitted: Vec<(Outbox, DanglingAccumulator)> = nodes
            .par_chunks(self.node_granularity)
            .map_with(cpl.clone(), |cpl, chunk| {
                let mut outbox = Outbox::new(self.partitions);
                let mut dangling = DanglingAccumulator::new();
                for node in chunk {
                    self.emit(node, &mut outbox, &mut dangling);
                }
                cpl.update_with_count(chunk.len());
                (outbox, dangling)
            })
            .collect();

        cpl.done();

        // Barrier: the dangling mass of the round is known only now
        let dangling = emitted
            .iter()
            .map(|(_, dangling)| *dangling)
            .fold(DanglingAccumulator::new(), DanglingAccumulator::merge);
        let delta = dangling
            .delta()
            .ok_or(InvariantViolation::DanglingOverflow {
                pages: dangling.pages(),
            })?;

        let mut messages = 0;
        let mut partitions: Vec<Vec<Vec<Message>>> = (0..self.partitions)
            .map(|_| Vec::with_capacity(emitted.len()))
            .collect();
        for (outbox, _) in emitted {
            messages += outbox.len();
            for (p, bucket) in outbox.into_buckets().into_iter().enumerate() {
                partitions[p].push(bucket);
            }
        }

        let aggregated = partitions
            .into_par_iter()
            .map(|buckets| self.aggregate(buckets))
            .collect::<Result<Vec<_>, _>>()?;

        let mut new_nodes: Vec<PageNode> = aggregated.into_iter().flatten().collect();
        new_nodes.par_sort_unstable_by(|a, b| a.id.cmp(&b.id));

        Ok(RoundOutput {
            nodes: new_nodes,
            delta,
            dangling_pages: dangling.pages(),
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsi_progress_logger::no_logging;
    use std::sync::Arc;

    fn page(id: &str, rank: f64, adjacency: &[&str]) -> PageNode {
        PageNode {
            id: Arc::from(id),
            rank,
            adjacency: adjacency.iter().map(|&n| Arc::from(n)).collect(),
        }
    }

    #[test]
    fn test_emit() {
        let iterator = RankIterator::new(0.15, 4, GlobalDelta::ZERO).partitions(3);
        let node = page("A", 0.5, &["B", "C"]);
        let mut outbox = Outbox::new(3);
        let mut dangling = DanglingAccumulator::new();
        iterator.emit(&node, &mut outbox, &mut dangling);
        assert_eq!(outbox.len(), 3);
        assert_eq!(dangling.pages(), 0);

        let messages: Vec<Message> = outbox.into_buckets().into_iter().flatten().collect();
        let partials: Vec<(&str, f64)> = messages
            .iter()
            .filter_map(|m| match m.record {
                RankRecord::Partial { amount } => Some((m.key, amount)),
                RankRecord::Full { .. } => None,
            })
            .collect();
        assert_eq!(partials.len(), 2);
        assert!(partials.iter().all(|&(_, amount)| amount == 0.25));
        assert!(messages
            .iter()
            .any(|m| m.key == "A" && matches!(m.record, RankRecord::Full { rank, .. } if rank == 0.5)));
    }

    #[test]
    fn test_emit_dangling() {
        let iterator = RankIterator::new(0.15, 1, GlobalDelta::from_mass(1.0));
        let node = page("A", 1.0, &[]);
        let mut outbox = Outbox::new(1);
        let mut dangling = DanglingAccumulator::new();
        iterator.emit(&node, &mut outbox, &mut dangling);
        // Only the page's own record
        assert_eq!(outbox.len(), 1);
        assert_eq!(dangling.pages(), 1);
        assert!((dangling.delta().unwrap().mass() - 1.85).abs() < 1E-9);
    }

    #[test]
    fn test_no_inbound_links() {
        let nodes = vec![page("A", 0.5, &["B"]), page("B", 0.5, &[])];
        let out = RankIterator::new(0.15, 2, GlobalDelta::ZERO)
            .round(&nodes, no_logging![])
            .unwrap();
        assert_eq!(out.nodes[0].rank, 0.15 / 2.0);
        assert_eq!(out.delta, GlobalDelta::from_mass(0.5));
        assert_eq!(out.dangling_pages, 1);
        assert_eq!(out.messages, 3);
    }

    #[test]
    fn test_missing_full() {
        let nodes = vec![page("A", 1.0, &["Ghost"])];
        let err = RankIterator::new(0.15, 1, GlobalDelta::ZERO)
            .round(&nodes, no_logging![])
            .unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::MissingFull {
                id: "Ghost".to_owned(),
                contributions: 1
            }
        );
    }

    #[test]
    fn test_duplicate_full() {
        let nodes = vec![page("A", 0.5, &[]), page("A", 0.5, &[])];
        let err = RankIterator::new(0.15, 2, GlobalDelta::ZERO)
            .round(&nodes, no_logging![])
            .unwrap_err();
        assert!(matches!(err, InvariantViolation::DuplicateFull { count: 2, .. }));
    }

    #[test]
    fn test_dangling_overflow() {
        let nodes = vec![page("A", 1E9, &[]), page("B", 1E9, &[])];
        for node_granularity in [1, 2] {
            let err = RankIterator::new(0.15, 2, GlobalDelta::ZERO)
                .node_granularity(node_granularity)
                .round(&nodes, no_logging![])
                .unwrap_err();
            assert_eq!(err, InvariantViolation::DanglingOverflow { pages: 2 });
        }
    }
}
