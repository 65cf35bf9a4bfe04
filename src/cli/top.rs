/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{get_thread_pool, open_input, store_top, GlobalArgs, NumThreadsArg};
use crate::rank::PageRankConfig;
use crate::store::Graph;
use crate::top_k::top_pages;
use anyhow::{ensure, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "top",
    about = "Prints the pages of largest rank of a rank file.",
    long_about = None
)]
pub struct CliArgs {
    /// The rank file.
    pub input: PathBuf,

    #[arg(short = 'k', long, default_value_t = PageRankConfig::DEFAULT_TOP_K)]
    /// The number of pages to print.
    pub top_k: usize,

    #[arg(short, long)]
    /// Where to store the top pages (default: standard output).
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,
}

pub fn main(_global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ensure!(args.top_k > 0, "The number of pages must be positive");
    let thread_pool = get_thread_pool(args.num_threads.num_threads)?;

    log::info!("Loading pages from {}", args.input.display());
    let (graph, _) = Graph::read_ranked(open_input(&args.input)?)?;

    let top = thread_pool.install(|| top_pages(&graph, args.top_k));
    store_top(args.output.as_deref(), &top)?;
    Ok(())
}
