//! fskit - Filesystem tree operations toolkit
//!
//! Command-line front end over the fs_ops engine: NTFS compression
//! toggling, recursive copy/move, alternate-data-stream discovery, and
//! junction classification.

mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::CliConfig;
use fs_ops::{
    CopyOptions, EnumerateOptions, MoveOptions, ProgressAction, TransferOutcome,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fskit",
    version,
    about = "Filesystem tree operations: compression, copy/move, stream discovery"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a directory tree using the NTFS compression attribute
    Compress {
        path: PathBuf,
        /// Only touch the immediate children and the root
        #[arg(long)]
        shallow: bool,
    },
    /// Clear the compression attribute on a directory tree
    Decompress {
        path: PathBuf,
        /// Only touch the immediate children and the root
        #[arg(long)]
        shallow: bool,
    },
    /// Copy a directory tree
    Copy {
        src: PathBuf,
        dst: PathBuf,
        /// Replace entries that already exist at the destination
        #[arg(long)]
        overwrite: bool,
        /// Match destination timestamps to the source afterwards
        #[arg(long)]
        preserve_dates: bool,
    },
    /// Move a directory tree
    Move {
        src: PathBuf,
        dst: PathBuf,
        /// Replace an existing destination
        #[arg(long)]
        overwrite: bool,
    },
    /// List the alternate data streams of a file or directory
    Streams {
        path: PathBuf,
        /// Emit the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one named alternate data stream
    RemoveStream { path: PathBuf, name: String },
    /// Report whether a path is a directory junction
    IsJunction { path: PathBuf },
}

fn main() -> Result<()> {
    // Initialize logging and panic hook first
    fs_log::init()?;

    // Clean up old logs (7 days)
    if let Err(e) = fs_log::cleanup_old_logs(7) {
        tracing::warn!("Failed to cleanup old logs: {}", e);
    }

    let config = CliConfig::load().unwrap_or_default();
    let cli = Cli::parse();
    run(cli, &config)
}

fn run(cli: Cli, config: &CliConfig) -> Result<()> {
    match cli.command {
        Command::Compress { path, shallow } => {
            fs_ops::compress_tree(&path, enumerate_options(shallow), None)?;
            println!("Compressed {}", path.display());
        }
        Command::Decompress { path, shallow } => {
            fs_ops::decompress_tree(&path, enumerate_options(shallow), None)?;
            println!("Decompressed {}", path.display());
        }
        Command::Copy {
            src,
            dst,
            overwrite,
            preserve_dates,
        } => {
            let options = CopyOptions {
                fail_if_exists: !(overwrite || config.transfer.overwrite),
                no_buffering: false,
                copy_symlinks: config.transfer.copy_symlinks,
            };
            let preserve = preserve_dates || config.transfer.preserve_dates;
            let mut sink = progress_sink(config);
            let result =
                fs_ops::copy_directory(&src, &dst, preserve, options, sink.as_mut().map(as_dyn))?;
            finish_progress(config);
            report_transfer("Copied", &result.destination, &result.outcome);
        }
        Command::Move {
            src,
            dst,
            overwrite,
        } => {
            let options = MoveOptions {
                replace_existing: overwrite || config.transfer.overwrite,
                copy_allowed: true,
            };
            let mut sink = progress_sink(config);
            let result = fs_ops::move_directory(&src, &dst, options, sink.as_mut().map(as_dyn))?;
            finish_progress(config);
            report_transfer("Moved", &result.destination, &result.outcome);
        }
        Command::Streams { path, json } => {
            let streams = fs_ops::alternate_streams(&path)?
                .collect::<fs_ops::Result<Vec<_>>>()?;
            if json || config.output.json {
                println!("{}", serde_json::to_string_pretty(&streams)?);
            } else {
                for stream in &streams {
                    let name = if stream.name.is_empty() {
                        "<unnamed>"
                    } else {
                        stream.name.as_str()
                    };
                    println!("{:>12}  {}", stream.size, name);
                }
                println!("{} stream(s)", streams.len());
            }
        }
        Command::RemoveStream { path, name } => {
            fs_ops::remove_alternate_stream(&path, &name)?;
            println!("Removed stream {} from {}", name, path.display());
        }
        Command::IsJunction { path } => {
            println!("{}", fs_ops::is_junction(&path));
        }
    }
    Ok(())
}

fn enumerate_options(shallow: bool) -> EnumerateOptions {
    EnumerateOptions {
        recursive: !shallow,
        ..Default::default()
    }
}

fn progress_sink(config: &CliConfig) -> Option<impl FnMut(u64) -> ProgressAction> {
    if config.output.progress {
        Some(|bytes: u64| {
            eprint!("\r{} bytes", bytes);
            ProgressAction::Continue
        })
    } else {
        None
    }
}

fn as_dyn<F: FnMut(u64) -> ProgressAction>(f: &mut F) -> &mut dyn FnMut(u64) -> ProgressAction {
    f
}

fn finish_progress(config: &CliConfig) {
    if config.output.progress {
        eprintln!();
    }
}

fn report_transfer(verb: &str, destination: &std::path::Path, outcome: &TransferOutcome) {
    match outcome {
        TransferOutcome::Completed => {
            println!("{} to {}", verb, destination.display());
        }
        TransferOutcome::Canceled { bytes_transferred } => {
            println!("Canceled after {} bytes", bytes_transferred);
        }
    }
}
