/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{create_output, open_input, GlobalArgs};
use crate::rank::PageRankConfig;
use crate::store::Graph;
use anyhow::{ensure, Context, Result};
use clap::Parser;
use dsi_progress_logger::{progress_logger, ProgressLog};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    about = "Builds the initial rank file from adjacency records.",
    long_about = "Reads adjacency records of the form '<pageId> [<n1>~<n2>~...]', one per line, adds a dangling page for every link target that is never defined, removes duplicate links and writes every page with rank 1/N in the format '<pageId> <rank> [<n1>~<n2>~...]'. Malformed lines are skipped."
)]
pub struct CliArgs {
    /// The file of adjacency records.
    pub input: PathBuf,

    /// Where to store the initial rank file.
    pub output: PathBuf,

    #[arg(short, long)]
    /// Where to store a properties file recording the number of pages
    /// together with the given configuration.
    pub properties: Option<PathBuf>,

    #[arg(short, long, default_value_t = PageRankConfig::DEFAULT_ALPHA)]
    /// The jump probability α recorded in the properties file.
    pub alpha: f64,

    #[arg(short = 'n', long)]
    /// The number of iterations recorded in the properties file.
    pub iterations: Option<usize>,

    #[arg(short = 'k', long, default_value_t = PageRankConfig::DEFAULT_TOP_K)]
    /// The number of top pages recorded in the properties file.
    pub top_k: usize,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = progress_logger![display_memory = true];
    if let Some(log_interval) = global_args.log_interval {
        pl.log_interval(log_interval);
    }

    log::info!("Reading adjacency records from {}", args.input.display());
    let (graph, stats) = Graph::read_adjacency(open_input(&args.input)?, &mut pl)?;
    log::info!(
        "Read {} records ({} malformed)",
        stats.lines,
        stats.malformed
    );
    ensure!(
        !graph.is_empty(),
        "No page could be built from {}",
        args.input.display()
    );

    log::info!("Storing {} pages at {}", graph.len(), args.output.display());
    graph.write_ranked(create_output(&args.output)?)?;

    if let Some(path) = &args.properties {
        let config = PageRankConfig {
            alpha: args.alpha,
            page_count: graph.len(),
            iterations: args.iterations,
            threshold: None,
            top_k: args.top_k,
        };
        log::info!("Storing properties at {}", path.display());
        let mut writer = create_output(path)?;
        writer
            .write_all(config.to_properties().as_bytes())
            .with_context(|| format!("Could not write properties to {}", path.display()))?;
        writer.flush()?;
    }

    println!("{}", graph.len());
    Ok(())
}
