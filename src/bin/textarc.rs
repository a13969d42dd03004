//! Command-line interface for textarc

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use textarc::{
    ArchiveError, ArchiveFormat, CancellationToken, Combiner, ProgressInfo,
    DEFAULT_MAX_FILE_SIZE,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "textarc",
    version,
    about = "Combine a directory tree into one portable text archive, and back"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable the progress bar
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Archive a directory into a single file
    Combine {
        /// Directory to archive
        source: PathBuf,
        /// Archive file to write (.txt, .json, .xml, .yaml, .md, optionally .gz)
        output: PathBuf,

        /// Gzip the archive (implied by a .gz output extension)
        #[arg(short, long)]
        compress: bool,

        /// Force an archive format instead of inferring from the extension
        #[arg(short, long, value_name = "FORMAT")]
        format: Option<String>,

        /// List what would be archived without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Extra exclusion patterns (repeatable)
        #[arg(short, long, value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Only archive paths matching these patterns (repeatable)
        #[arg(short, long, value_name = "PATTERN")]
        include: Vec<String>,

        /// Skip files larger than this
        #[arg(short = 's', long, default_value = DEFAULT_MAX_FILE_SIZE)]
        max_size: String,

        /// Maximum directory depth
        #[arg(short = 'd', long, default_value_t = 50)]
        max_depth: usize,

        /// Metadata worker threads (default: CPU count, capped at 32)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Follow symbolic links
        #[arg(short = 'L', long)]
        follow_symlinks: bool,

        /// Skip binary files entirely
        #[arg(long)]
        ignore_binary: bool,

        /// Record SHA-256 checksums in the archive
        #[arg(long)]
        checksum: bool,

        /// Gzip compression level (1-9)
        #[arg(long, default_value_t = 6, value_name = "LEVEL")]
        compression_level: u32,

        /// Do not apply the built-in exclusion list
        #[arg(long)]
        no_default_excludes: bool,
    },
    /// Restore an archive back into a directory tree
    Split {
        /// Archive file to read
        archive: PathBuf,
        /// Directory to restore into
        destination: PathBuf,

        /// Restore permission bits and modification times
        #[arg(short = 'p', long)]
        preserve_permissions: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("textarc=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("textarc=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Interrupted, cleaning up...".yellow());
                cancel.cancel();
            }
        });
    }

    let show_progress = !cli.no_progress;
    let result = tokio::task::spawn_blocking(move || run(cli, cancel, show_progress))
        .await
        .unwrap_or_else(|e| Err(ArchiveError::internal(format!("worker panicked: {e}"))));

    let code = match result {
        Ok(()) => 0,
        Err(ArchiveError::Cancelled) => 130,
        Err(err) => {
            error!("{err}");
            eprintln!("{} {err}", "error:".red().bold());
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli, cancel: CancellationToken, show_progress: bool) -> textarc::Result<()> {
    match cli.command {
        Command::Combine {
            source,
            output,
            compress,
            format,
            dry_run,
            exclude,
            include,
            max_size,
            max_depth,
            jobs,
            follow_symlinks,
            ignore_binary,
            checksum,
            compression_level,
            no_default_excludes,
        } => {
            let format = format
                .as_deref()
                .map(str::parse::<ArchiveFormat>)
                .transpose()?;

            let mut builder = Combiner::builder()
                .max_file_size(max_size)
                .max_depth(max_depth)
                .exclude_patterns(exclude)
                .include_patterns(include)
                .follow_symlinks(follow_symlinks)
                .ignore_binary(ignore_binary)
                .calculate_checksums(checksum)
                .compression_level(compression_level)
                .cancellation(cancel);
            if let Some(jobs) = jobs {
                builder = builder.workers(jobs);
            }
            if no_default_excludes {
                builder = builder.no_default_excludes();
            }

            let bar = progress_bar(show_progress && !dry_run);
            if let Some(bar) = bar.clone() {
                builder = builder.progress_callback(progress_callback(bar));
            }
            let combiner = builder.build()?;

            if dry_run {
                return print_preview(&combiner, &source);
            }

            let report = combiner.combine(&source, &output, compress, format)?;
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }

            println!(
                "{} Combined {} files ({}) into {} [{}{}] in {:.1}s",
                "✓".green().bold(),
                report.files_processed,
                textarc::utils::format_bytes(report.bytes_processed),
                report.output_path.display(),
                report.format,
                if report.compressed { ", gzip" } else { "" },
                report.duration_ms as f64 / 1000.0,
            );
            if report.files_skipped > 0 {
                println!("  {} files skipped", report.files_skipped);
            }
            if report.errors > 0 {
                println!(
                    "{}",
                    format!("  {} files failed and were dropped", report.errors).yellow()
                );
            }
            Ok(())
        }
        Command::Split {
            archive,
            destination,
            preserve_permissions,
        } => {
            let mut builder = Combiner::builder()
                .preserve_permissions(preserve_permissions)
                .cancellation(cancel);

            let bar = progress_bar(show_progress);
            if let Some(bar) = bar.clone() {
                builder = builder.progress_callback(progress_callback(bar));
            }
            let combiner = builder.build()?;

            let report = combiner.split(&archive, &destination)?;
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }

            println!(
                "{} Restored {} files into {} [{}] in {:.1}s",
                "✓".green().bold(),
                report.files_restored,
                report.output_dir.display(),
                report.format,
                report.duration_ms as f64 / 1000.0,
            );
            if report.errors > 0 {
                println!(
                    "{}",
                    format!("  {} entries failed and were skipped", report.errors).yellow()
                );
            }
            if !report.security_blocked.is_empty() {
                println!(
                    "{}",
                    format!(
                        "  {} unsafe entries blocked:",
                        report.security_blocked.len()
                    )
                    .red()
                );
                for blocked in &report.security_blocked {
                    println!("    {}", blocked.red());
                }
            }
            Ok(())
        }
    }
}

fn print_preview(combiner: &Combiner, source: &std::path::Path) -> textarc::Result<()> {
    let entries = combiner.preview(source)?;
    let mut included = 0usize;
    let mut total_bytes = 0u64;

    for entry in &entries {
        match &entry.skip_reason {
            Some(reason) => {
                println!("  {} {} ({})", "skip".dimmed(), entry.path.dimmed(), reason.dimmed());
            }
            None => {
                included += 1;
                total_bytes += entry.size;
                let tag = if entry.is_binary { "bin " } else { "text" };
                println!(
                    "  {} {} ({})",
                    tag.cyan(),
                    entry.path,
                    textarc::utils::format_bytes(entry.size)
                );
            }
        }
    }

    println!(
        "\n{} Would archive {} of {} files ({})",
        "✓".green().bold(),
        included,
        entries.len(),
        textarc::utils::format_bytes(total_bytes),
    );
    Ok(())
}

fn progress_bar(enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    Some(bar)
}

fn progress_callback(bar: ProgressBar) -> textarc::ProgressCallback {
    Arc::new(move |info: ProgressInfo| {
        if let Some(total) = info.total {
            bar.set_length(total as u64);
        }
        bar.set_position(info.processed as u64);
        if let Some(item) = info.current_item {
            bar.set_message(format!("{}: {item}", info.operation));
        }
    })
}
