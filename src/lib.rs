/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
// for now we don't need any new feature but we might remove this in the future
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

pub mod rank;
pub mod store;
pub mod top_k;
pub mod utils;

#[cfg(feature = "cli")]
pub mod cli;

pub mod prelude {
    pub use crate::rank::pagerank::preds;
    pub use crate::rank::{GlobalDelta, PageRank, PageRankConfig};
    pub use crate::store::{Graph, PageNode};
    pub use crate::top_k::TopK;
    pub use crate::utils::Granularity;
}
