/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{
    create_output, get_thread_pool, open_input, store_top, GlobalArgs, GranularityArgs,
    NumThreadsArg,
};
use crate::rank::{GlobalDelta, PageRank, PageRankConfig};
use crate::store::Graph;
use crate::top_k::top_pages;
use anyhow::{ensure, Context, Result};
use clap::Parser;
use dsi_progress_logger::{concurrent_progress_logger, progress_logger, ProgressLog};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pagerank",
    about = "Computes PageRank by iterated message passing and prints the top pages.",
    long_about = None
)]
pub struct CliArgs {
    /// The rank file to start from (see 'wikirank init').
    pub input: PathBuf,

    #[arg(long)]
    /// The input contains adjacency records without ranks; the initial
    /// graph is built on the fly.
    pub adjacency: bool,

    #[arg(short, long)]
    /// A properties file with keys alpha, pages, iterations, threshold and
    /// top_k; command-line options override its values.
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    /// The jump probability α (must be in the interval [0 . . 1]; default
    /// 0.15).
    pub alpha: Option<f64>,

    #[arg(short = 'n', long)]
    /// The number of rounds; in threshold mode, the maximum number of rounds.
    pub iterations: Option<usize>,

    #[arg(short, long)]
    /// Stop as soon as the ℓ₁ norm of the difference between successive
    /// rank vectors is below this threshold.
    pub threshold: Option<f64>,

    #[arg(short = 'k', long)]
    /// The number of top pages to output (default 100).
    pub top_k: Option<usize>,

    #[arg(long)]
    /// The expected number of pages; the computation fails if the graph has
    /// a different number of pages.
    pub pages: Option<usize>,

    #[arg(long)]
    /// The dangling mass of the round that produced the input ranks, when
    /// resuming a computation.
    pub delta: Option<f64>,

    #[arg(long)]
    /// The number of partitions messages are routed to (default: the number
    /// of threads).
    pub partitions: Option<usize>,

    #[arg(short, long)]
    /// Where to store the final rank file.
    pub output: Option<PathBuf>,

    #[arg(long)]
    /// Where to store the top pages, one '<pageId>\t<rank>' line each
    /// (default: standard output).
    pub top_output: Option<PathBuf>,

    #[arg(long)]
    /// A directory where the rank file of every round is stored as
    /// round-<i>.txt.
    pub dump_dir: Option<PathBuf>,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,

    #[clap(flatten)]
    pub granularity: GranularityArgs,
}

impl CliArgs {
    /// Returns the configuration given by the properties file, if any,
    /// overridden by the command-line options.
    pub fn config(&self) -> Result<PageRankConfig> {
        let mut config = PageRankConfig::default();
        if let Some(path) = &self.config {
            log::info!("Reading configuration from {}", path.display());
            config
                .update_from_properties(open_input(path)?)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = Some(iterations);
        }
        if let Some(threshold) = self.threshold {
            config.threshold = Some(threshold);
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(pages) = self.pages {
            config.page_count = pages;
        }
        Ok(config)
    }
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut config = args.config()?;
    let delta = args
        .delta
        .map(|mass| {
            GlobalDelta::try_from_mass(mass).with_context(|| {
                format!("The dangling mass must be nonnegative and representable, got {mass}")
            })
        })
        .transpose()?;
    // Nothing is read before the parameters are known to be usable
    config.validate_parameters()?;
    let predicate = config.predicate()?;

    let mut pl = progress_logger![display_memory = true];
    if let Some(log_interval) = global_args.log_interval {
        pl.log_interval(log_interval);
    }

    let mut cpl = concurrent_progress_logger![display_memory = true];
    if let Some(log_interval) = global_args.log_interval {
        cpl.log_interval(log_interval);
    }

    let thread_pool = get_thread_pool(args.num_threads.num_threads)?;

    log::info!("Loading pages from {}", args.input.display());
    let reader = open_input(&args.input)?;
    let (graph, stats) = if args.adjacency {
        Graph::read_adjacency(reader, &mut pl)?
    } else {
        Graph::read_ranked(reader)?
    };
    log::info!(
        "Read {} lines ({} malformed, {} duplicates)",
        stats.lines,
        stats.malformed,
        stats.duplicates
    );
    ensure!(
        !graph.is_empty(),
        "No page could be read from {}",
        args.input.display()
    );
    if config.page_count != 0 {
        ensure!(
            config.page_count == graph.len(),
            "Expected {} pages, found {}",
            config.page_count,
            graph.len()
        );
    }
    config.page_count = graph.len();
    config.validate()?;

    let mut pr = PageRank::new(graph);
    pr.alpha(config.alpha)
        .granularity(args.granularity.into_granularity());
    if let Some(partitions) = args.partitions {
        pr.partitions(partitions);
    }
    if let Some(delta) = delta {
        pr.delta(delta);
    }

    let dump_dir = args.dump_dir.as_deref();
    thread_pool.install(|| {
        pr.run_with_logging(predicate, &mut pl, &mut cpl, |pr| -> Result<()> {
            if let Some(dir) = dump_dir {
                let path = dir.join(format!("round-{}.txt", pr.iterations()));
                log::info!(
                    "Storing round {} at {} (global delta {})",
                    pr.iterations(),
                    path.display(),
                    pr.global_delta().mass()
                );
                pr.graph().write_ranked(create_output(&path)?)?;
            }
            Ok(())
        })
    })?;

    log::info!(
        "Completed after {} iteration(s), norm delta = {}, global delta = {}",
        pr.iterations(),
        pr.norm_delta(),
        pr.global_delta()
    );

    let graph = thread_pool.install(|| pr.finish_with_logging(&mut cpl));
    log::info!("Rank sum: {}", graph.rank_sum());

    if let Some(path) = &args.output {
        log::info!("Storing {} pages at {}", graph.len(), path.display());
        graph.write_ranked(create_output(path)?)?;
    }

    let top = thread_pool.install(|| top_pages(&graph, config.top_k));
    store_top(args.top_output.as_deref(), &top)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::ConfigError;

    #[test]
    fn test_command_line_overrides_properties() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pr.properties");
        std::fs::write(&path, "alpha=0.2\niterations=5\ntop_k=7\n")?;
        let args = CliArgs::try_parse_from([
            "pagerank",
            "graph.txt",
            "--config",
            path.to_str().unwrap(),
            "--iterations",
            "12",
        ])?;
        let config = args.config()?;
        assert_eq!(config.alpha, 0.2);
        assert_eq!(config.iterations, Some(12));
        assert_eq!(config.top_k, 7);
        Ok(())
    }

    #[test]
    fn test_invalid_configuration_fails_before_reading() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // Reading this file would fail
        let missing = dir.path().join("missing.txt");
        let missing = missing.to_str().unwrap();

        let args = CliArgs::try_parse_from([
            "pagerank",
            missing,
            "--alpha",
            "1.5",
            "--iterations",
            "10",
        ])?;
        let err = main(GlobalArgs { log_interval: None }, args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::AlphaOutOfRange(_))
        ));

        let args = CliArgs::try_parse_from(["pagerank", missing])?;
        let err = main(GlobalArgs { log_interval: None }, args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingIterations)
        ));
        Ok(())
    }
}
