//! Duplicate Report Tool
//!
//! This binary lists groups of photos with identical content, using the
//! hashes computed during ingestion. Run it against the metadata database
//! of a server that has finished at least one ingestion pass.

use anyhow::Result;
use clap::Parser;
use photo_cache_server::media_store::{MetadataStore, SqliteMetadataStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dup-report")]
#[command(about = "List groups of photos with identical content")]
struct Args {
    /// Path to the SQLite metadata database file
    #[arg(value_name = "DB_PATH")]
    db_path: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let store = SqliteMetadataStore::new(&args.db_path, 1)?;
    let groups = store.duplicate_groups()?;

    if groups.is_empty() {
        println!("No duplicates found");
        return Ok(());
    }

    for group in &groups {
        println!("{}", group.hash);
        for path in &group.full_paths {
            println!("  {}", path);
        }
    }
    println!();
    println!("{} duplicate groups", groups.len());

    Ok(())
}
