pub mod types;
pub mod config;
pub mod data;
pub mod processing;
pub mod tooltip;
pub mod render;
pub mod engine;
pub mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the map scene and write it as JSON
    Scene {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE", default_value = "scene.json")]
        out: PathBuf,
    },
    /// Print the tooltip for one interaction event
    Tooltip {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Engine series type: map, scatter, ...
        #[arg(short, long)]
        kind: String,
        #[arg(short, long)]
        name: String,
        /// Index into the marker layer
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Serve the scene, geometry and tooltips over HTTP
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn mount(
    app_config: &config::AppConfig,
    recorder: &mut engine::SceneRecorder,
    notifier: &engine::ResizeNotifier,
) -> Result<engine::Visualization<engine::RecordedChart>> {
    let inputs = data::load_inputs(app_config)?;
    let viz_config = engine::VisualizationConfig {
        points: inputs.points,
        region_metadata: inputs.region_metadata,
        options: processing::MergeOptions {
            strategy: app_config.merge.strategy,
            matching: app_config.merge.matching,
        },
        scene: app_config.scene.clone(),
    };
    Ok(engine::Visualization::new(recorder, notifier, &inputs.geometry, viz_config))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scene { config, out } => {
            info!("Building scene with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;

            let mut recorder = engine::SceneRecorder::new();
            let notifier = engine::ResizeNotifier::new();
            let viz = mount(&app_config, &mut recorder, &notifier)?;

            let json = serde_json::to_string_pretty(viz.scene())?;
            std::fs::write(&out, json)
                .with_context(|| format!("Failed to write scene: {:?}", out))?;

            info!("Wrote scene to {:?}", out);
        }
        Commands::Tooltip { config, kind, name, index } => {
            let app_config = config::AppConfig::load_from_file(&config)?;

            let mut recorder = engine::SceneRecorder::new();
            let notifier = engine::ResizeNotifier::new();
            let viz = mount(&app_config, &mut recorder, &notifier)?;

            let event = tooltip::InteractionEvent { series_type: kind, name, data_index: index };
            println!("{}", viz.tooltip_html(&event));
        }
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;
            let inputs = data::load_inputs(&app_config)?;

            server::start_server(app_config, inputs).await?;
        }
    }

    Ok(())
}
