use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use account_heatmap::config::Config;
use account_heatmap::pipeline::processing::filter::Selection;
use account_heatmap::pipeline::view::{SpendMetric, SpotMetric};
use account_heatmap::pipeline::{HeatmapFocus, HeatmapPipeline, ViewParams};
use account_heatmap::{logging, observability, server};

#[derive(Parser)]
#[command(name = "account_heatmap")]
#[command(about = "Account heatmap over installed-base and SPOT opportunity exports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the heatmap API
    Serve {
        /// Port to listen on (overrides HEATMAP_PORT and the config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build one heatmap frame and write it out
    Frame {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the filter options offered by the dashboard
    Options,
}

#[derive(clap::Args)]
struct ViewArgs {
    /// Geographic, "Account Spend" or SPOT
    #[arg(long, default_value = "Geographic")]
    focus: HeatmapFocus,
    #[arg(long)]
    show_account_names: bool,
    #[arg(long, default_value = "All")]
    vertical: String,
    #[arg(long, default_value = "All")]
    business_entity: String,
    #[arg(long, default_value = "All")]
    vendor: String,
    #[arg(long, default_value = "Total Spend")]
    color_by: SpendMetric,
    #[arg(long, default_value = "Total Spend")]
    size_by: SpendMetric,
    #[arg(long, default_value = "Budget ($K)")]
    spot_metric: SpotMetric,
}

impl From<ViewArgs> for ViewParams {
    fn from(args: ViewArgs) -> Self {
        ViewParams {
            focus: args.focus,
            show_account_names: args.show_account_names,
            vertical: Selection::from(args.vertical),
            business_entity: Selection::from(args.business_entity),
            vendor: Selection::from(args.vendor),
            color_by: args.color_by,
            size_by: args.size_by,
            spot_metric: args.spot_metric,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

fn output(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn build_pipeline(config: &Config) -> anyhow::Result<HeatmapPipeline> {
    HeatmapPipeline::from_config(config).map_err(|e| {
        error!("Failed to load heatmap data: {}", e);
        anyhow!(e)
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = logging::init_logging();
    if let Err(e) = observability::init() {
        error!("Metrics disabled: {}", e);
    }

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let pipeline = Arc::new(build_pipeline(&config)?);
            server::start_server(pipeline, port)
                .await
                .map_err(|e| anyhow!("server error: {}", e))?;
        }
        Commands::Frame { view, format, out } => {
            let pipeline = build_pipeline(&config)?;
            let frame = pipeline.run(&ViewParams::from(view));

            let mut writer = output(out.as_ref())?;
            match format {
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut writer, &frame)?;
                    writeln!(writer)?;
                }
                OutputFormat::Csv => frame.write_csv(&mut writer)?,
            }
            writer.flush()?;
            info!(rows = frame.rows.len(), unplotted = frame.unplotted, "Frame written");
        }
        Commands::Options => {
            let pipeline = build_pipeline(&config)?;
            println!("{}", serde_json::to_string_pretty(&pipeline.options())?);
        }
    }
    Ok(())
}
