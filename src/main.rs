//! Main entry point for the lazyzip CLI.
//!
//! Lists or extracts entries from a remote ZIP/EPUB archive without
//! downloading the whole file, and reports how many bytes actually
//! travelled over the network.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use lazyzip::{ArchiveEntry, ArchiveOpener, Cli, DiskStore, RemoteArchive};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if !cli.is_http_url() {
        bail!("expected an http(s) URL, got: {}", cli.url);
    }

    let opener = match &cli.cache_dir {
        Some(dir) => ArchiveOpener::with_store(Arc::new(DiskStore::new(dir)?))?,
        None => ArchiveOpener::new()?,
    };

    let archive = opener.open(&cli.url, None).await?;

    if cli.list || cli.verbose {
        list_entries(&archive, cli.verbose);
    } else {
        extract_entries(&archive, &cli).await?;
    }

    if !cli.is_quiet() {
        eprintln!("\nTotal bytes transferred: {}", format_size(opener.transferred_bytes()));
    }

    Ok(())
}

/// Print the entry table, either names only or an unzip-style table with
/// sizes, compression ratio and timestamps.
fn list_entries(archive: &RemoteArchive, verbose: bool) {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.entries() {
        if verbose {
            let (year, month, day) = entry.mod_date();
            let (hour, minute, _second) = entry.mod_time();

            let ratio = if entry.uncompressed_size > 0 {
                format!(
                    "{:>4}%",
                    100 - (entry.compressed_size * 100 / entry.uncompressed_size)
                )
            } else {
                "  0%".to_string()
            };

            println!(
                "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
                entry.uncompressed_size,
                entry.compressed_size,
                ratio,
                year,
                month,
                day,
                hour,
                minute,
                entry.name
            );

            if !entry.is_directory {
                total_uncompressed += entry.uncompressed_size;
                total_compressed += entry.compressed_size;
                file_count += 1;
            }
        } else {
            println!("{}", entry.name);
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        let total_ratio = if total_uncompressed > 0 {
            format!(
                "{:>4}%",
                100 - (total_compressed * 100 / total_uncompressed)
            )
        } else {
            "  0%".to_string()
        };
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed, total_compressed, total_ratio, "", file_count
        );
    }
}

/// Extract the selected entries (all files when none are named).
async fn extract_entries(archive: &RemoteArchive, cli: &Cli) -> Result<()> {
    let selected: Vec<&ArchiveEntry> = archive
        .entries()
        .iter()
        .filter(|e| {
            if e.is_directory {
                return false;
            }
            if cli.entries.is_empty() {
                return true;
            }
            cli.entries.iter().any(|wanted| {
                let basename = Path::new(&e.name)
                    .file_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                e.name == *wanted || basename == *wanted
            })
        })
        .collect();

    if selected.is_empty() && !cli.entries.is_empty() {
        bail!("no matching entries in archive");
    }

    let show_markers = cli.pipe && selected.len() > 1;
    for entry in selected {
        let bytes = archive.read(entry, None).await?;

        if cli.pipe {
            let mut stdout = tokio::io::stdout();
            if show_markers {
                stdout
                    .write_all(format!("--- {} ---\n", entry.name).as_bytes())
                    .await?;
            }
            stdout.write_all(&bytes).await?;
            continue;
        }

        let output_path = match &cli.extract_dir {
            Some(dir) => PathBuf::from(dir).join(&entry.name),
            None => PathBuf::from(&entry.name),
        };

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        if !cli.is_quiet() {
            println!("  extracting: {}", entry.name);
        }
        tokio::fs::write(&output_path, &bytes).await?;
    }

    Ok(())
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
