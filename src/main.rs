use anyhow::Result;
use tracing_subscriber::EnvFilter;

use nhl_dataset::{config, pipeline};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nhl_dataset=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = config::resolve_from_args(&args)?;

    let Some(summary) = pipeline::run(&cfg)? else {
        println!("No valid games found in {}", cfg.data_dir.display());
        return Ok(());
    };

    println!("Dataset build complete");
    println!("Output: {}", summary.output_path.display());
    println!(
        "Files: {} read, {} skipped",
        summary.files_seen - summary.files_skipped,
        summary.files_skipped
    );
    println!(
        "Games: {}/{} records kept",
        summary.games_kept, summary.records_seen
    );
    println!("Rows written: {}", summary.rows_written);
    if !summary.records_skipped.is_empty() {
        println!("Skipped records:");
        for (reason, count) in &summary.records_skipped {
            println!(" - {reason}: {count}");
        }
    }

    Ok(())
}
