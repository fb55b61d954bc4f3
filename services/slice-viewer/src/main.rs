//! Headless slice viewer.
//!
//! Binds one or more views to a synthetic dataset and drives them with the
//! display tick, logging every applied result. Useful for exercising the
//! query engine and view logic without a GUI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use query_engine::{Dataset, EngineConfig, SyntheticDataset};
use view_controller::{RenderUpdate, ViewConfig, ViewGroup};

#[derive(Parser, Debug)]
#[command(name = "slice-viewer")]
#[command(about = "Progressive slice viewer over a synthetic multi-resolution dataset")]
struct Args {
    /// Logical size of the dataset, e.g. 512,512,128
    #[arg(long, value_delimiter = ',', default_value = "512,512,128")]
    dims: Vec<u64>,

    /// Number of timesteps in the dataset
    #[arg(long, default_value = "1")]
    timesteps: i64,

    /// Artificial delay per refinement step, in milliseconds
    #[arg(long, default_value = "0")]
    step_delay_ms: u64,

    /// Number of views
    #[arg(long, default_value = "1")]
    views: usize,

    /// Canvas width in pixels
    #[arg(long, default_value = "1024")]
    width: u32,

    /// Canvas height in pixels
    #[arg(long, default_value = "768")]
    height: u32,

    /// Stop after this many ticks (default: run until Ctrl+C)
    #[arg(long)]
    ticks: Option<u64>,

    /// Start timestep playback immediately
    #[arg(long)]
    play: bool,

    /// JSON view configuration (default: SLICE_* environment variables)
    #[arg(long, env = "SLICE_VIEW_CONFIG")]
    view_config: Option<PathBuf>,

    /// Print collected metrics in Prometheus format on exit
    #[arg(long)]
    print_metrics: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "SLICE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);
    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let engine = EngineConfig::from_env();
    engine.validate().map_err(anyhow::Error::msg)?;

    let view_config = match &args.view_config {
        Some(path) => ViewConfig::from_json_file(path)?,
        None => ViewConfig::from_env(),
    };
    view_config.validate().map_err(anyhow::Error::msg)?;

    if !(2..=3).contains(&args.dims.len()) {
        anyhow::bail!("--dims needs 2 or 3 sizes, got {}", args.dims.len());
    }

    info!(
        dims = ?args.dims,
        views = args.views,
        tick_ms = engine.tick_interval_ms,
        "Starting slice viewer"
    );

    let mut synthetic = SyntheticDataset::new(args.dims.clone()).with_timesteps(args.timesteps);
    if args.step_delay_ms > 0 {
        synthetic = synthetic.with_step_delay(Duration::from_millis(args.step_delay_ms));
    }
    let dataset: Arc<dyn Dataset> = Arc::new(synthetic);

    let mut group = ViewGroup::with_dataset(args.views, dataset, &engine, &view_config)?;
    for i in 0..group.len() {
        if let Some(view) = group.view_mut(i) {
            view.set_canvas_size(args.width, args.height);
            let name = view.name().to_string();
            view.on_partial_result(Box::new(move |update: &RenderUpdate| {
                info!(
                    view = %name,
                    job_id = update.job_id,
                    level = update.level,
                    max_level = update.max_level,
                    width = update.image.width,
                    height = update.image.height,
                    palette = ?update.palette_range,
                    running = update.running,
                    elapsed_ms = update.elapsed.as_millis() as u64,
                    "Result applied"
                );
            }));
        }
    }

    group.start();
    if args.play {
        group.play();
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(engine.tick_interval());
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                match group.tick().await {
                    Ok(reports) => {
                        for (i, report) in reports.iter().enumerate() {
                            if let Some(job_id) = report.pushed_job {
                                debug!(view = i, job_id, "Job pushed");
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "Tick failed"),
                }
                ticks += 1;
                if args.ticks.is_some_and(|limit| ticks >= limit) {
                    break;
                }
            }
        }
    }

    for view in group.views() {
        info!(
            view = %view.name(),
            request = %view.request_status(),
            response = %view.response_status(),
            offset = %view.offset_status(),
            "Final view status"
        );
    }

    group.stop().await;

    if args.print_metrics {
        println!("{}", prometheus.render());
    }

    info!(ticks, "Slice viewer stopped");
    Ok(())
}
