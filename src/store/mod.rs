/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Pages, their adjacency lists and their current ranks.
//!
//! A [`Graph`] is a mapping from page identifiers to [`PageNode`]s, stored as
//! a vector sorted by identifier. It can be [built](Graph::build) from the
//! adjacency records produced by link extraction, in which case every page
//! gets rank 1/*n*, or [loaded](Graph::read_ranked) from a file of rank lines
//! holding the state of a previous computation.

pub mod parse;

use anyhow::{Context, Result};
use dsi_progress_logger::{no_logging, ProgressLog};
use kahan::KahanSum;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{BufRead, Write};
use std::sync::Arc;

pub use parse::{parse_adjacency_line, parse_rank_line, ParseRecordError};

/// The identifier of a page.
///
/// Identifiers are reference counted so that adjacency lists and the
/// records of an iteration can share them.
pub type PageId = Arc<str>;

/// The outbound neighbors of a page, without duplicates, in first-seen
/// order. An empty list denotes a dangling page.
pub type Adjacency = Arc<[PageId]>;

/// A page of the graph.
///
/// The adjacency list is fixed at construction; the rank is replaced by
/// every iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    pub id: PageId,
    pub rank: f64,
    pub adjacency: Adjacency,
}

impl PageNode {
    /// Returns true if the page has no outbound links.
    pub fn is_dangling(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Returns the number of outbound links.
    pub fn outdegree(&self) -> usize {
        self.adjacency.len()
    }
}

impl std::fmt::Display for PageNode {
    /// Formats the page as a rank line.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        parse::fmt_rank_line(self, f)
    }
}

/// A page and its outbound links, as produced by link extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyRecord {
    pub id: String,
    pub neighbors: Vec<String>,
}

impl AdjacencyRecord {
    pub fn new<S: Into<String>>(id: impl Into<String>, neighbors: impl IntoIterator<Item = S>) -> Self {
        Self {
            id: id.into(),
            neighbors: neighbors.into_iter().map(Into::into).collect(),
        }
    }
}

/// Counters describing the ingestion of a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Nonempty lines read.
    pub lines: usize,
    /// Lines dropped because they could not be parsed.
    pub malformed: usize,
    /// Records dropped because their page had already been defined.
    pub duplicates: usize,
}

/// A set of pages sorted by identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<PageNode>,
    num_arcs: u64,
}

impl Graph {
    /// Builds a graph from adjacency records.
    ///
    /// Every page referenced as a neighbor but never defined by a record
    /// becomes a dangling page; records defining the same page more than
    /// once are merged; duplicate links are removed. All pages get rank
    /// 1/*n*, where *n* is the number of pages (synthesized ones included).
    pub fn build(records: impl IntoIterator<Item = AdjacencyRecord>) -> Self {
        Self::build_with_logging(records, no_logging![])
    }

    /// Builds a graph from adjacency records, logging progress on `pl`.
    ///
    /// See [`build`](Self::build).
    pub fn build_with_logging(
        records: impl IntoIterator<Item = AdjacencyRecord>,
        pl: &mut impl ProgressLog,
    ) -> Self {
        pl.item_name("record");
        pl.expected_updates(None);
        pl.start("Collecting adjacency records...");

        let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut merged = 0;
        for record in records {
            match adjacency.get_mut(&record.id) {
                Some(neighbors) => {
                    neighbors.extend(record.neighbors);
                    merged += 1;
                }
                None => {
                    adjacency.insert(record.id, record.neighbors);
                }
            }
            pl.light_update();
        }
        pl.done();

        if merged > 0 {
            log::warn!("{merged} records redefined an existing page and were merged");
        }

        let defined = adjacency.len();
        let missing: Vec<String> = adjacency
            .values()
            .flatten()
            .filter(|n| !adjacency.contains_key(*n))
            .cloned()
            .collect();
        for id in missing {
            adjacency.entry(id).or_default();
        }
        let synthesized = adjacency.len() - defined;

        let n = adjacency.len();
        let initial_rank = 1.0 / n as f64;
        let ids: HashMap<&str, PageId> = adjacency
            .keys()
            .map(|id| (id.as_str(), PageId::from(id.as_str())))
            .collect();

        let mut num_arcs = 0;
        let mut duplicate_links = 0;
        let nodes = adjacency
            .iter()
            .map(|(id, neighbors)| {
                let mut seen = HashSet::with_capacity(neighbors.len());
                let links: Adjacency = neighbors
                    .iter()
                    .filter(|n| seen.insert(n.as_str()))
                    .map(|n| ids[n.as_str()].clone())
                    .collect();
                duplicate_links += neighbors.len() - links.len();
                num_arcs += links.len() as u64;
                PageNode {
                    id: ids[id.as_str()].clone(),
                    rank: initial_rank,
                    adjacency: links,
                }
            })
            .collect();

        log::info!(
            "{n} pages ({synthesized} dangling targets synthesized), {num_arcs} links ({duplicate_links} duplicates removed)"
        );

        Self { nodes, num_arcs }
    }

    /// Creates a graph from pages carrying their own ranks.
    ///
    /// Pages are sorted by identifier; if an identifier appears more than
    /// once, only its first occurrence is kept. Returns the graph and the
    /// number of dropped duplicates.
    pub fn from_nodes(nodes: impl IntoIterator<Item = PageNode>) -> (Self, usize) {
        let mut nodes: Vec<PageNode> = nodes.into_iter().collect();
        let len = nodes.len();
        // Stable, so the first occurrence survives deduplication
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes.dedup_by(|later, first| later.id == first.id);
        let duplicates = len - nodes.len();
        (Self::from_sorted_nodes(nodes), duplicates)
    }

    /// Creates a graph from pages already sorted by identifier, without
    /// duplicates.
    pub(crate) fn from_sorted_nodes(nodes: Vec<PageNode>) -> Self {
        debug_assert!(nodes.windows(2).all(|w| w[0].id < w[1].id));
        let num_arcs = nodes.iter().map(|node| node.outdegree() as u64).sum();
        Self { nodes, num_arcs }
    }

    /// Reads adjacency records, one per line, and [builds](Self::build) a
    /// graph.
    ///
    /// Malformed lines are skipped. Only I/O errors are reported.
    pub fn read_adjacency(
        reader: impl BufRead,
        pl: &mut impl ProgressLog,
    ) -> Result<(Self, IngestStats)> {
        let mut stats = IngestStats::default();
        let mut records = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Could not read line {}", i + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            stats.lines += 1;
            match parse_adjacency_line(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::debug!("Skipping line {}: {e}", i + 1);
                    stats.malformed += 1;
                }
            }
        }
        if stats.malformed > 0 {
            log::warn!("Skipped {} malformed adjacency records", stats.malformed);
        }
        Ok((Self::build_with_logging(records, pl), stats))
    }

    /// Reads rank lines, keeping the ranks they carry.
    ///
    /// Malformed lines are skipped; if a page is defined more than once, only
    /// its first definition is kept. Pages referenced as neighbors are
    /// _not_ synthesized: a graph whose neighbors are not all defined will
    /// make the next iteration fail.
    pub fn read_ranked(reader: impl BufRead) -> Result<(Self, IngestStats)> {
        let mut stats = IngestStats::default();
        let mut nodes = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Could not read line {}", i + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            stats.lines += 1;
            match parse_rank_line(&line) {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    log::debug!("Skipping line {}: {e}", i + 1);
                    stats.malformed += 1;
                }
            }
        }
        let (graph, duplicates) = Self::from_nodes(nodes);
        stats.duplicates = duplicates;
        if stats.malformed > 0 {
            log::warn!("Skipped {} malformed rank lines", stats.malformed);
        }
        if stats.duplicates > 0 {
            log::warn!("Skipped {} redefinitions of pages", stats.duplicates);
        }
        log::info!("{} pages, {} links", graph.len(), graph.num_arcs());
        Ok((graph, stats))
    }

    /// Writes the graph as rank lines.
    pub fn write_ranked(&self, mut writer: impl Write) -> Result<()> {
        for node in &self.nodes {
            writeln!(writer, "{node}").context("Could not write rank line")?;
        }
        writer.flush().context("Could not flush rank lines")?;
        Ok(())
    }

    /// Returns the number of pages.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of links.
    pub fn num_arcs(&self) -> u64 {
        self.num_arcs
    }

    /// Returns the pages, sorted by identifier.
    pub fn nodes(&self) -> &[PageNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<PageNode> {
        self.nodes
    }

    /// Returns the page with the given identifier.
    pub fn get(&self, id: &str) -> Option<&PageNode> {
        self.nodes
            .binary_search_by(|node| (*node.id).cmp(id))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Returns the rank of the given page.
    pub fn rank(&self, id: &str) -> Option<f64> {
        self.get(id).map(|node| node.rank)
    }

    /// Returns the sum of all ranks.
    pub fn rank_sum(&self) -> f64 {
        let mut sum = KahanSum::new();
        for node in &self.nodes {
            sum += node.rank;
        }
        sum.sum()
    }

    /// Returns the total rank of dangling pages.
    pub fn dangling_rank(&self) -> f64 {
        let mut sum = KahanSum::new();
        for node in self.nodes.iter().filter(|node| node.is_dangling()) {
            sum += node.rank;
        }
        sum.sum()
    }
}
