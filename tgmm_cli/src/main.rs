//! TGMM Lineage Import CLI
//!
//! Import TGMM tracking results against a BigDataViewer dataset.

use anyhow::{Context, Result};
use clap::Parser;
use tgmm_cli::{Args, ModelExport};
use tgmm_core::{SpimDataset, TgmmImporter, TransformProvider};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn run(args: &Args) -> Result<()> {
    let dataset = SpimDataset::load(&args.dataset)
        .with_context(|| format!("Failed to load dataset {}", args.dataset.display()))?;

    if args.list_setups {
        for setup in dataset.view_setups() {
            println!("{}\t{}", setup.id, setup.label());
        }
        return Ok(());
    }

    let folder = args.tgmm.as_ref().context("--tgmm is required")?;
    let first_setup = dataset.view_setups().first().map(|s| s.id);
    let config = args.import_config(first_setup, dataset.num_frames())?;

    info!(
        "View setup {} | {} timepoints | split policy '{}' | dt={}",
        config.view_setup_id,
        dataset.num_frames(),
        config.split_policy,
        config.dt
    );

    let report = TgmmImporter::new(folder, &dataset, config)
        .import()
        .with_context(|| format!("Import of {} failed", folder.display()))?;

    let export = ModelExport::from_report(&report);
    if let Some(path) = &args.export {
        export
            .write_to_file(path)
            .with_context(|| format!("Failed to write export {}", path.display()))?;
        info!("Exported {} spots to {}", export.spots.len(), path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&export.summary)?);
    } else {
        info!(
            "{} tracks, {} edges ({} unlinked by split policy)",
            report.model.track_count(),
            report.model.edge_count(),
            report.edges_unlinked
        );
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides --verbose
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
