//! Sekai Asset CLI
//!
//! Command-line interface for extracting CRI containers and restoring
//! Live2D motions, processing many inputs concurrently.

mod batch;

use anyhow::{Context, Result};
use batch::BatchOptions;
use clap::{ArgAction, Parser, Subcommand};
use sekai_asset::acb::extract_acb_file;
use sekai_asset::live2d::{DumpReader, restore_bundle_file};
use sekai_asset::usm::extract_usm_file;
use sekai_asset::{
    DiagnosticSink, MotionRestorer, ParamIdMap, TracingSink, UsmKey, load_param_ids,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sekai-asset")]
#[command(about = "Extract CRI audio/movie containers and restore Live2D motions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Number of inputs processed concurrently (default: number of CPUs)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Show a progress bar
    #[arg(long, global = true)]
    progress: bool,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every track of ACB cue banks
    Acb {
        /// ACB files; streaming .awb archives are looked up next to each
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory, one sub-directory per cue bank
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Demux USM movies into .m2v video and .adx audio
    Usm {
        /// USM files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Decimal mask key; unmasked containers need none
        #[arg(long, env = "SEKAI_USM_KEY")]
        key: Option<UsmKey>,
    },

    /// Print the parameter id map of moc3 models as JSON
    ParamIds {
        /// moc3 files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Restore motion3 documents from motion bundle dumps
    Live2d {
        /// Container dumps (.json)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Directory searched recursively for *.moc3 files
        #[arg(long)]
        models: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = BatchOptions {
        concurrency: cli.concurrency.unwrap_or_else(num_cpus::get),
        progress: cli.progress,
    };
    let sink: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);

    match cli.command {
        Commands::Acb { inputs, output } => acb_command(inputs, output, options, sink).await,
        Commands::Usm {
            inputs,
            output,
            key,
        } => usm_command(inputs, output, key, options, sink).await,
        Commands::ParamIds { inputs } => param_ids_command(&inputs),
        Commands::Live2d {
            inputs,
            output,
            models,
        } => live2d_command(inputs, output, models, options, sink).await,
    }
}

/// `{output}/{acb stem}`
fn acb_output_dir(output: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "acb".to_string());
    output.join(stem)
}

async fn acb_command(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    options: BatchOptions,
    sink: Arc<dyn DiagnosticSink>,
) -> Result<()> {
    let total = inputs.len();
    let summary = batch::run(inputs, options, move |path| {
        let dir = acb_output_dir(&output, path);
        extract_acb_file(path, &dir, sink.clone())
            .with_context(|| format!("extracting {}", path.display()))
    })
    .await?;
    summary.into_result(total)
}

async fn usm_command(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    key: Option<UsmKey>,
    options: BatchOptions,
    sink: Arc<dyn DiagnosticSink>,
) -> Result<()> {
    let total = inputs.len();
    let summary = batch::run(inputs, options, move |path| {
        extract_usm_file(path, &output, key, sink.clone())
            .with_context(|| format!("demuxing {}", path.display()))
    })
    .await?;
    summary.into_result(total)
}

fn param_ids_command(inputs: &[PathBuf]) -> Result<()> {
    let mut ids = ParamIdMap::new();
    for path in inputs {
        let model = ParamIdMap::from_moc3_file(path)
            .with_context(|| format!("reading {}", path.display()))?;
        tracing::debug!(model = %path.display(), ids = model.len(), "read model");
        ids.merge(model);
    }
    println!("{}", serde_json::to_string_pretty(&ids)?);
    Ok(())
}

async fn live2d_command(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    models: Option<PathBuf>,
    options: BatchOptions,
    sink: Arc<dyn DiagnosticSink>,
) -> Result<()> {
    let ids = match models {
        Some(dir) => load_param_ids(&dir, sink.as_ref())
            .with_context(|| format!("scanning models in {}", dir.display()))?,
        None => {
            tracing::warn!("no --models given, curve ids stay hashed");
            ParamIdMap::new()
        }
    };
    tracing::info!(ids = ids.len(), "parameter id map ready");

    let restorer = Arc::new(MotionRestorer::new(Arc::new(ids), sink));
    let total = inputs.len();
    let summary = batch::run(inputs, options, move |path| {
        restore_bundle_file(&DumpReader, &restorer, path, &output)
            .with_context(|| format!("restoring {}", path.display()))
    })
    .await?;
    summary.into_result(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "sekai-asset",
            "--concurrency",
            "4",
            "usm",
            "movie.usm",
            "-o",
            "out",
            "--key",
            "123456789",
        ])
        .unwrap();
        assert_eq!(cli.concurrency, Some(4));
        match cli.command {
            Commands::Usm { inputs, key, .. } => {
                assert_eq!(inputs, vec![PathBuf::from("movie.usm")]);
                assert_eq!(key, Some(UsmKey(123456789)));
            }
            _ => panic!("expected usm command"),
        }
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["sekai-asset", "-vv", "param-ids", "a.moc3"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_acb_output_dir() {
        assert_eq!(
            acb_output_dir(Path::new("out"), Path::new("sound/se_common.acb")),
            PathBuf::from("out/se_common")
        );
    }
}
