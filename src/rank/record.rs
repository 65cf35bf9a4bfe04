/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Records exchanged during a round.

use crate::store::{Adjacency, PageId};
use std::hash::{BuildHasher, BuildHasherDefault, DefaultHasher};

/// A record routed to the task owning its key.
///
/// Every page emits exactly one [`Full`](RankRecord::Full) record keyed by
/// its own identifier, carrying its adjacency list to the next round, and one
/// [`Partial`](RankRecord::Partial) record per outbound link, keyed by the
/// neighbor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankRecord<'a> {
    /// The authoritative state of a page.
    Full {
        id: &'a PageId,
        /// The rank after the dangling-share adjustment.
        rank: f64,
        adjacency: &'a Adjacency,
    },
    /// The rank mass flowing along one link.
    Partial { amount: f64 },
}

/// A [`RankRecord`] together with its destination key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message<'a> {
    pub key: &'a str,
    pub record: RankRecord<'a>,
}

/// Per-task buffers of messages, one per aggregation partition.
///
/// All messages for a given key land in the same partition, so the partition
/// that owns a key sees every record routed to it.
#[derive(Debug)]
pub struct Outbox<'a> {
    buckets: Vec<Vec<Message<'a>>>,
    hasher: BuildHasherDefault<DefaultHasher>,
}

impl<'a> Outbox<'a> {
    /// Creates an outbox for the given number of partitions.
    ///
    /// # Panics
    ///
    /// Panics if `partitions` is zero.
    pub fn new(partitions: usize) -> Self {
        assert!(partitions > 0, "The number of partitions must be positive");
        Self {
            buckets: (0..partitions).map(|_| Vec::new()).collect(),
            hasher: BuildHasherDefault::default(),
        }
    }

    /// Returns the partition owning `key`.
    ///
    /// The mapping depends only on the key and on the number of partitions.
    #[inline(always)]
    pub fn partition(&self, key: &str) -> usize {
        (self.hasher.hash_one(key) % self.buckets.len() as u64) as usize
    }

    #[inline(always)]
    pub fn push(&mut self, key: &'a str, record: RankRecord<'a>) {
        let p = self.partition(key);
        self.buckets[p].push(Message { key, record });
    }

    /// Returns the total number of buffered messages.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the buckets, in partition order.
    pub fn into_buckets(self) -> Vec<Vec<Message<'a>>> {
        self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_is_by_key() {
        let mut a = Outbox::new(7);
        let b = Outbox::new(7);
        for key in ["Rust", "C", "Haskell", "OCaml", "Zig"] {
            assert_eq!(a.partition(key), b.partition(key));
            a.push(key, RankRecord::Partial { amount: 1.0 });
        }
        assert_eq!(a.len(), 5);
        let buckets = a.into_buckets();
        assert_eq!(buckets.len(), 7);
        for (p, bucket) in buckets.iter().enumerate() {
            for message in bucket {
                assert_eq!(b.partition(message.key), p);
            }
        }
    }
}
