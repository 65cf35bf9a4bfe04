/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Iterated PageRank with lagged dangling-mass correction.
//!
//! Denoting with α the _jump probability_ (the complement of the classic
//! damping factor), with *n* the number of pages and with δ⁽ᵗ⁾ the rank held
//! by dangling pages at round *t*, each round computes
//!
//! > *x̃ᵢ* = *xᵢ*⁽ᵗ⁾ + (1 − α) δ⁽ᵗ⁻¹⁾ / *n*
//!
//! > *xᵢ*⁽ᵗ ⁺ ¹⁾ = α / *n* + (1 − α) ∑_(*j* → *i*) *x̃ⱼ* / *d*(*j*)
//!
//! where δ⁽ᵗ⁾ = ∑_(*j* dangling) *x̃ⱼ* and δ⁽⁰⁾ = 0. The mass of dangling
//! pages thus leaves the system during a round and comes back, uniformly,
//! at the start of the next one. After the last round the ranks are
//! completed by one final correction step
//! *xᵢ* ← *xᵢ* + (1 − α) δ / *n* (see [`finish`](PageRank::finish)), after
//! which they sum to one.
//!
//! See the [`iteration`](super::iteration) module for how a single round is
//! carried out.
//!
//! # Stopping criteria
//!
//! The [`run`](PageRank::run) method accepts a composable [`Predicate`] that
//! is evaluated after each round. The classic behavior is a fixed number of
//! rounds ([`MaxIter`](preds::MaxIter)); alternatively,
//! [`L1Norm`](preds::L1Norm) and [`LInfNorm`](preds::LInfNorm) stop when the
//! ℓ₁ or ℓ∞ norm of the difference between successive rank vectors falls
//! below a threshold. Note that threshold-based stopping changes the output
//! with respect to a fixed number of rounds.

pub mod preds {
    //! Predicates implementing stopping conditions.
    //!
    //! The implementation of [PageRank](super::PageRank) requires a
    //! [predicate](Predicate) to stop the algorithm. This module provides a few
    //! such predicates: they evaluate to true if the computation should be
    //! stopped.
    //!
    //! You can combine the predicates using the `and` and `or` methods provided
    //! by the [`Predicate`] trait.
    //!
    //! # Examples
    //! ```
    //! # fn main() -> Result<(), Box<dyn std::error::Error>> {
    //! use predicates::prelude::*;
    //! use wikirank::rank::pagerank::preds::{L1Norm, MaxIter};
    //!
    //! let mut predicate = L1Norm::try_from(1E-9)?.boxed();
    //! predicate = predicate.or(MaxIter::from(100)).boxed();
    //! #     Ok(())
    //! # }
    //! ```

    use anyhow::ensure;
    use predicates::{reflection::PredicateReflection, Predicate};
    use std::fmt::Display;

    #[doc(hidden)]
    /// This structure is passed to stopping predicates to provide the
    /// information that is needed to evaluate them.
    #[derive(Debug)]
    pub struct PredParams {
        pub iteration: usize,
        pub l1_delta: f64,
        pub linf_delta: f64,
    }

    /// Stops after at most the provided number of rounds.
    #[derive(Debug, Clone)]
    pub struct MaxIter {
        max_iter: usize,
    }

    impl MaxIter {
        /// The safety bound used in threshold mode when no number of rounds
        /// is given.
        pub const DEFAULT_MAX_ITER: usize = 100;
    }

    impl From<usize> for MaxIter {
        fn from(max_iter: usize) -> Self {
            MaxIter { max_iter }
        }
    }

    impl Default for MaxIter {
        fn default() -> Self {
            Self::from(Self::DEFAULT_MAX_ITER)
        }
    }

    impl Display for MaxIter {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(max iter: {})", self.max_iter))
        }
    }

    impl PredicateReflection for MaxIter {}

    impl Predicate<PredParams> for MaxIter {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.iteration >= self.max_iter
        }
    }

    fn check_threshold(threshold: f64) -> anyhow::Result<f64> {
        ensure!(!threshold.is_nan());
        ensure!(threshold > 0.0, "The threshold must be positive");
        Ok(threshold)
    }

    /// Stops when the ℓ₁ norm of the difference between successive rank
    /// vectors falls below a given threshold.
    #[derive(Debug, Clone)]
    pub struct L1Norm {
        threshold: f64,
    }

    impl L1Norm {
        pub const DEFAULT_THRESHOLD: f64 = 1E-9;
    }

    impl TryFrom<f64> for L1Norm {
        type Error = anyhow::Error;
        fn try_from(threshold: f64) -> anyhow::Result<Self> {
            Ok(L1Norm {
                threshold: check_threshold(threshold)?,
            })
        }
    }

    impl Default for L1Norm {
        fn default() -> Self {
            L1Norm {
                threshold: Self::DEFAULT_THRESHOLD,
            }
        }
    }

    impl Display for L1Norm {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(ℓ₁ norm: {})", self.threshold))
        }
    }

    impl PredicateReflection for L1Norm {}
    impl Predicate<PredParams> for L1Norm {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.l1_delta <= self.threshold
        }
    }

    /// Stops when the ℓ∞ norm of the difference between successive rank
    /// vectors (the largest change of a single rank) falls below a given
    /// threshold.
    #[derive(Debug, Clone)]
    pub struct LInfNorm {
        threshold: f64,
    }

    impl TryFrom<f64> for LInfNorm {
        type Error = anyhow::Error;
        fn try_from(threshold: f64) -> anyhow::Result<Self> {
            Ok(LInfNorm {
                threshold: check_threshold(threshold)?,
            })
        }
    }

    impl Display for LInfNorm {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(ℓ∞ norm: {})", self.threshold))
        }
    }

    impl PredicateReflection for LInfNorm {}
    impl Predicate<PredParams> for LInfNorm {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.linf_delta <= self.threshold
        }
    }
}

use super::delta::{DeltaDistributor, GlobalDelta};
use super::iteration::{InvariantViolation, RankIterator};
use crate::store::{Graph, PageNode};
use crate::utils::Granularity;
use dsi_progress_logger::{no_logging, ConcurrentProgressLog, ProgressLog};
use kahan::KahanSum;
use predicates::Predicate;
use rayon::prelude::*;

/// Computes PageRank by iterated rounds of message passing.
///
/// The struct is configured via setters and then executed via
/// [`run`](Self::run). After completion the current pages are available via
/// [`graph`](Self::graph), and [`finish`](Self::finish) applies the final
/// dangling-mass correction.
///
/// # Examples
///
/// ```
/// use wikirank::rank::pagerank::{preds, PageRank};
/// use wikirank::store::{AdjacencyRecord, Graph};
///
/// // A → B, B → A, B → C; C is dangling
/// let graph = Graph::build([
///     AdjacencyRecord::new("A", ["B"]),
///     AdjacencyRecord::new("B", ["A", "C"]),
/// ]);
///
/// let mut pr = PageRank::new(graph);
/// pr.alpha(0.15);
/// pr.run(preds::MaxIter::from(10)).unwrap();
/// assert_eq!(pr.iterations(), 10);
///
/// let ranks = pr.finish();
/// assert!((ranks.rank_sum() - 1.0).abs() < 1E-9);
/// ```
#[derive(Debug, Clone)]
pub struct PageRank {
    graph: Graph,
    alpha: f64,
    granularity: Granularity,
    partitions: usize,

    delta: GlobalDelta,
    iteration: usize,
    l1_delta: f64,
    linf_delta: f64,
}

impl PageRank {
    /// The default jump probability.
    pub const DEFAULT_ALPHA: f64 = 0.15;

    /// Creates a new PageRank computation starting from the ranks of `graph`.
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            alpha: Self::DEFAULT_ALPHA,
            granularity: Granularity::default(),
            partitions: rayon::current_num_threads().max(1),
            delta: GlobalDelta::ZERO,
            iteration: 0,
            l1_delta: f64::INFINITY,
            linf_delta: f64::INFINITY,
        }
    }

    /// Sets the jump probability α.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is not in the interval [0 . . 1].
    pub fn alpha(&mut self, alpha: f64) -> &mut Self {
        assert!(
            (0.0..=1.0).contains(&alpha),
            "The jump probability must be in [0 . . 1], got {alpha}"
        );
        self.alpha = alpha;
        self
    }

    /// Sets the parallel task granularity of the per-page passes.
    pub fn granularity(&mut self, granularity: Granularity) -> &mut Self {
        self.granularity = granularity;
        self
    }

    /// Sets the number of partitions messages are routed to.
    ///
    /// The default is the number of threads of the current Rayon pool.
    pub fn partitions(&mut self, partitions: usize) -> &mut Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Sets the dangling mass of the round that produced the current ranks.
    ///
    /// This is only needed when resuming from the output of a previous
    /// round; a computation starting from a freshly built graph uses zero.
    pub fn delta(&mut self, delta: GlobalDelta) -> &mut Self {
        self.delta = delta;
        self
    }

    /// Returns the current pages.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the number of pages.
    pub fn num_pages(&self) -> usize {
        self.graph.len()
    }

    /// Returns the dangling mass reported by the last round.
    pub fn global_delta(&self) -> GlobalDelta {
        self.delta
    }

    /// Returns the number of rounds performed by the last call to
    /// [`run`](Self::run).
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    /// Returns the ℓ₁ norm of the difference between the last two rank
    /// vectors.
    pub fn norm_delta(&self) -> f64 {
        self.l1_delta
    }

    /// Returns the ℓ∞ norm of the difference between the last two rank
    /// vectors.
    pub fn linf_delta(&self) -> f64 {
        self.linf_delta
    }

    fn node_granularity(&self) -> usize {
        self.granularity
            .node_granularity(self.graph.len(), self.graph.num_arcs())
    }

    /// Performs a single round.
    pub fn step(&mut self, cpl: &mut impl ConcurrentProgressLog) -> Result<(), InvariantViolation> {
        let n = self.graph.len();
        let iterator = RankIterator::new(self.alpha, n, self.delta)
            .partitions(self.partitions)
            .node_granularity(self.node_granularity());

        let out = iterator.round(self.graph.nodes(), cpl)?;
        debug_assert_eq!(out.nodes.len(), n);

        let (l1, linf) = self
            .graph
            .nodes()
            .par_iter()
            .zip(out.nodes.par_iter())
            .fold(
                || (KahanSum::<f64>::new(), 0.0f64),
                |(l1, linf), (old, new): (&PageNode, &PageNode)| {
                    debug_assert_eq!(old.id, new.id);
                    let diff = (new.rank - old.rank).abs();
                    (l1 + diff, linf.max(diff))
                },
            )
            .reduce(
                || (KahanSum::<f64>::new(), 0.0f64),
                |(l1_0, linf_0), (l1_1, linf_1)| (l1_0 + l1_1, linf_0.max(linf_1)),
            );

        self.graph = Graph::from_sorted_nodes(out.nodes);
        self.delta = out.delta;
        self.l1_delta = l1.sum();
        self.linf_delta = linf;
        self.iteration += 1;

        log::info!(
            "Iteration {}: {} messages, {} dangling pages, global delta = {}, ℓ₁ delta = {}, ℓ∞ delta = {}",
            self.iteration,
            out.messages,
            out.dangling_pages,
            self.delta,
            self.l1_delta,
            self.linf_delta
        );

        Ok(())
    }

    /// Runs rounds until the given predicate is satisfied.
    pub fn run(
        &mut self,
        predicate: impl Predicate<preds::PredParams>,
    ) -> Result<(), InvariantViolation> {
        self.run_with_logging(predicate, no_logging![], no_logging![], |_| Ok(()))
    }

    /// Runs rounds until the given predicate is satisfied, logging progress
    /// and calling `on_round` after each round.
    ///
    /// `pl` is a sequential [`ProgressLog`] counting rounds. `cpl` is a
    /// [`ConcurrentProgressLog`] used for page-level progress inside each
    /// round. Either can be [`no_logging![]`](dsi_progress_logger::no_logging).
    ///
    /// `on_round` receives the computation after each round, and can be used,
    /// for example, to store intermediate results; an error returned by
    /// `on_round` stops the computation.
    pub fn run_with_logging<E: From<InvariantViolation>>(
        &mut self,
        predicate: impl Predicate<preds::PredParams>,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
        mut on_round: impl FnMut(&Self) -> Result<(), E>,
    ) -> Result<(), E> {
        self.iteration = 0;
        let n = self.graph.len();
        if n == 0 {
            return Ok(());
        }

        log::info!("Alpha: {}", self.alpha);
        log::info!("Pages: {}", n);
        log::info!("Links: {}", self.graph.num_arcs());
        log::info!("Partitions: {}", self.partitions);
        log::info!("Initial global delta: {}", self.delta);
        log::info!("Stopping criterion: {}", predicate);

        pl.item_name("iteration");
        pl.expected_updates(None);
        pl.start(format!(
            "Computing PageRank (alpha={}, granularity={})...",
            self.alpha,
            self.node_granularity()
        ));

        loop {
            self.step(cpl)?;
            on_round(self)?;
            pl.update_and_display();

            if predicate.eval(&preds::PredParams {
                iteration: self.iteration,
                l1_delta: self.l1_delta,
                linf_delta: self.linf_delta,
            }) {
                break;
            }
        }

        pl.done();
        Ok(())
    }

    /// Applies the final dangling-mass correction and returns the pages.
    pub fn finish(self) -> Graph {
        self.finish_with_logging(no_logging![])
    }

    /// Applies the final dangling-mass correction, logging progress on
    /// `cpl`, and returns the pages.
    pub fn finish_with_logging(self, cpl: &mut impl ConcurrentProgressLog) -> Graph {
        let distributor = DeltaDistributor::new(self.delta, self.alpha, self.graph.len());
        let node_granularity = self.node_granularity();
        log::info!(
            "Distributing global delta {} ({} per page)",
            self.delta,
            distributor.share()
        );
        let mut nodes = self.graph.into_nodes();
        distributor.distribute(&mut nodes, node_granularity, cpl);
        Graph::from_sorted_nodes(nodes)
    }
}
