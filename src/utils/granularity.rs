/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/// Granularity of the per-node tasks of an iteration, specified
/// transparently by pages or links.
///
/// During the emit phase of a [`PageRank`](crate::rank::PageRank) round each
/// Rayon task owns a contiguous slice of pages. Pages with many outbound
/// links emit many contribution messages, so it is sometimes more natural to
/// size tasks by links rather than by pages: this enum lets the caller choose,
/// and [`node_granularity`](Self::node_granularity) converts a link-based
/// specification into a number of pages using the average outdegree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Each task is formed by the specified number of pages.
    Nodes(usize),
    /// Each task is formed by a number of pages whose outdegrees sum,
    /// tentatively, to the specified number of links.
    Arcs(u64),
}

impl core::default::Default for Granularity {
    /// Returns a default granularity of 1000 pages.
    fn default() -> Self {
        Self::Nodes(1000)
    }
}

impl Granularity {
    /// Returns the number of pages per task for a graph with the given
    /// number of pages and links.
    ///
    /// The result is always at least one.
    pub fn node_granularity(&self, num_nodes: usize, num_arcs: u64) -> usize {
        match self {
            Self::Nodes(n) => (*n).max(1),
            Self::Arcs(n) => {
                let average_degree = num_arcs as f64 / num_nodes.max(1) as f64;
                if average_degree == 0.0 {
                    return num_nodes.max(1);
                }
                (*n as f64 / average_degree)
                    .min(usize::MAX as f64)
                    .ceil()
                    .max(1.0) as usize
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes() {
        assert_eq!(Granularity::Nodes(10).node_granularity(100, 1000), 10);
        assert_eq!(Granularity::Nodes(0).node_granularity(100, 1000), 1);
    }

    #[test]
    fn test_arcs() {
        // Average outdegree 10
        assert_eq!(Granularity::Arcs(100).node_granularity(100, 1000), 10);
        assert_eq!(Granularity::Arcs(1).node_granularity(100, 1000), 1);
        // No links at all: a single task
        assert_eq!(Granularity::Arcs(100).node_granularity(50, 0), 50);
    }
}
