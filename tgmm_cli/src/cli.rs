//! Command-line options and their resolution into an [`ImportConfig`].

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tgmm_core::{ImportConfig, RealInterval, SplitPolicy, TimeRange};

/// TGMM lineage importer
#[derive(Parser, Debug)]
#[command(name = "tgmm-import")]
#[command(about = "Import TGMM tracking results into a lineage model", long_about = None)]
pub struct Args {
    /// Image dataset descriptor (BigDataViewer XML)
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// Folder holding the TGMM frame documents
    #[arg(short, long, required_unless_present = "list_setups")]
    pub tgmm: Option<PathBuf>,

    /// View setup whose registrations are used (default: first setup)
    #[arg(short, long)]
    pub setup: Option<u32>,

    /// List the dataset's view setups and exit
    #[arg(long)]
    pub list_setups: bool,

    /// World-space crop box: xMin yMin zMin xMax yMax zMax
    #[arg(long, num_args = 6, value_names = ["X0", "Y0", "Z0", "X1", "Y1", "Z1"], allow_negative_numbers = true)]
    pub crop: Option<Vec<f64>>,

    /// First frame to import (inclusive)
    #[arg(long)]
    pub t_from: Option<usize>,

    /// Last frame to import (inclusive)
    #[arg(long)]
    pub t_to: Option<usize>,

    /// Division handling (keep, farthest, all)
    #[arg(long)]
    pub split: Option<SplitPolicy>,

    /// Time units per frame
    #[arg(long)]
    pub dt: Option<f64>,

    /// Frame file name pattern, printf-style
    #[arg(long)]
    pub pattern: Option<String>,

    /// JSON configuration file; explicit flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Export the model to a JSON file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// JSON summary on stdout
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Merge the config file (if any) with explicit flags.
    ///
    /// `first_setup` is used when neither names a view setup; `num_frames`
    /// closes a half-open `--t-from`/`--t-to` range.
    pub fn import_config(&self, first_setup: Option<u32>, num_frames: usize) -> Result<ImportConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => {
                let setup = match (self.setup, first_setup) {
                    (Some(setup), _) | (None, Some(setup)) => setup,
                    (None, None) => bail!("Dataset has no view setups"),
                };
                ImportConfig {
                    view_setup_id: setup,
                    ..Default::default()
                }
            }
        };

        if let Some(setup) = self.setup {
            config.view_setup_id = setup;
        }
        if let Some(crop) = &self.crop {
            let bounds: [f64; 6] = crop
                .as_slice()
                .try_into()
                .context("--crop takes exactly six values")?;
            config.interval = Some(RealInterval::from_bounds(bounds));
        }
        if self.t_from.is_some() || self.t_to.is_some() {
            let current = config
                .time_range
                .unwrap_or_else(|| TimeRange::new(0, num_frames.saturating_sub(1)));
            config.time_range = Some(TimeRange::new(
                self.t_from.unwrap_or(current.from),
                self.t_to.unwrap_or(current.to),
            ));
        }
        if let Some(policy) = self.split {
            config.split_policy = policy;
        }
        if let Some(dt) = self.dt {
            config.dt = dt;
        }
        if let Some(pattern) = &self.pattern {
            config.pattern = pattern.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
