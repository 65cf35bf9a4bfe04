/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Rank propagation.

pub mod config;
pub mod delta;
pub mod iteration;
pub mod pagerank;
pub mod record;

pub use config::{ConfigError, PageRankConfig};
pub use delta::{DanglingAccumulator, DeltaDistributor, GlobalDelta, DELTA_SCALE};
pub use iteration::{InvariantViolation, RankIterator, RoundOutput};
pub use pagerank::PageRank;
pub use record::{Message, Outbox, RankRecord};
