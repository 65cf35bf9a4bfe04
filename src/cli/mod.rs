/*
 * SPDX-FileCopyrightText: 2025 The wikirank developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Command-line interface.

use crate::store::parse::format_ranked_pair;
use crate::store::PageId;
use crate::utils::Granularity;
use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

pub mod init;
pub mod pagerank;
pub mod top;

/// Parses the number of threads from a string.
///
/// This function is meant to be used with `#[arg(...,  value_parser =
/// num_threads_parser)]`.
pub fn num_threads_parser(arg: &str) -> Result<usize> {
    let num_threads = arg.parse::<usize>()?;
    ensure!(num_threads > 0, "Number of threads must be greater than 0");
    Ok(num_threads)
}

/// Shared CLI arguments for commands that specify a number of threads.
#[derive(Args, Debug)]
pub struct NumThreadsArg {
    #[arg(short = 'j', long, default_value_t = rayon::current_num_threads().max(1), value_parser = num_threads_parser)]
    /// The number of threads to use.
    pub num_threads: usize,
}

/// Shared CLI arguments for commands that specify a granularity.
#[derive(Args, Debug)]
pub struct GranularityArgs {
    #[arg(long, conflicts_with("node_granularity"))]
    /// The tentative number of links used to define the size of a parallel
    /// job (advanced option).
    pub arc_granularity: Option<u64>,

    #[arg(long, conflicts_with("arc_granularity"))]
    /// The tentative number of pages used to define the size of a parallel
    /// job (advanced option).
    pub node_granularity: Option<usize>,
}

impl GranularityArgs {
    pub fn into_granularity(&self) -> Granularity {
        match (self.arc_granularity, self.node_granularity) {
            (Some(_), Some(_)) => unreachable!(),
            (Some(arc_granularity), None) => Granularity::Arcs(arc_granularity),
            (None, Some(node_granularity)) => Granularity::Nodes(node_granularity),
            (None, None) => Granularity::default(),
        }
    }
}

/// Creates a [`ThreadPool`](rayon::ThreadPool) with the given number of threads.
pub fn get_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to create thread pool")?;
    log::info!("Using {} threads", thread_pool.current_num_threads());
    Ok(thread_pool)
}

/// Creates all parent directories of the given file path.
pub fn create_parent_dir(file_path: impl AsRef<Path>) -> Result<()> {
    if let Some(parent_dir) = file_path.as_ref().parent() {
        std::fs::create_dir_all(parent_dir).with_context(|| {
            format!(
                "Failed to create the directory {:?}",
                parent_dir.to_string_lossy()
            )
        })?;
    }
    Ok(())
}

/// Opens a file for buffered reading.
pub fn open_input(path: impl AsRef<Path>) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Creates a file for buffered writing, creating its parent directories.
pub fn create_output(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let file =
        File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Returns a writer on the given file, or on standard output if the path is
/// `None`.
pub fn output_or_stdout(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(create_output(path)?),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    })
}

/// Writes pages and ranks as `<pageId>\t<rank>` lines on the given file,
/// or on standard output if the path is `None`.
pub fn store_top(path: Option<&Path>, top: &[(PageId, f64)]) -> Result<()> {
    let mut writer = output_or_stdout(path)?;
    for (id, rank) in top {
        writeln!(writer, "{}", format_ranked_pair(id, *rank)).context("Could not write top pages")?;
    }
    writer.flush().context("Could not write top pages")?;
    Ok(())
}

/// Parses a duration such as `90s`, `1m30s` or `2h 15m`.
fn parse_duration(value: &str) -> Result<Duration> {
    let duration: jiff::SignedDuration = value.parse()?;
    Duration::try_from(duration).with_context(|| format!("Negative duration {value}"))
}

/// Initializes the `env_logger` logger with timestamped lines; the level
/// defaults to `info`.
pub fn init_env_logger() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{} {style}{}{style:#} [{:?}] {} - {}",
                jiff::Timestamp::now().strftime("%F %T%.3f"),
                record.level(),
                std::thread::current().id(),
                record.target(),
                record.args()
            )
        })
        .try_init()?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    #[arg(long, value_parser = parse_duration, global=true, display_order = 1000)]
    /// How often to log progress, e.g., "30s" or "1m30s" (default 10s).
    pub log_interval: Option<Duration>,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    Init(init::CliArgs),
    #[clap(name = "pagerank", visible_alias = "pr")]
    PageRank(pagerank::CliArgs),
    Top(top::CliArgs),
}

#[derive(Parser, Debug)]
#[command(name = "wikirank", version)]
/// Tools computing PageRank over link graphs extracted from Wikipedia dumps.
///
/// Environment (noteworthy environment variables used):
///
/// RUST_LOG: configuration for env_logger
/// <https://docs.rs/env_logger/latest/env_logger/>
pub struct Cli {
    #[command(subcommand)]
    pub command: SubCommands,
    #[clap(flatten)]
    pub args: GlobalArgs,
}

/// The entry point of the command-line interface.
pub fn cli_main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let start = std::time::Instant::now();
    let cli = Cli::parse_from(args);
    match cli.command {
        SubCommands::Init(args) => {
            init::main(cli.args, args)?;
        }
        SubCommands::PageRank(args) => {
            pagerank::main(cli.args, args)?;
        }
        SubCommands::Top(args) => {
            top::main(cli.args, args)?;
        }
    }

    // Whole milliseconds are enough
    let elapsed = Duration::from_millis(start.elapsed().as_millis() as u64);
    log::info!(
        "The command took {:#}",
        jiff::SignedDuration::try_from(elapsed)?
    );

    Ok(())
}
