//! camviz CLI for classifying images and explaining predictions with Grad-CAM.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use camviz_analysis::{SessionResults, SessionStats};
use camviz_core::HeatmapFormat;
use camviz_explain::{
    clear_directory, remove_older_than, ExplainRequest, GradCamExplainer, Prediction,
};
use camviz_models::{ClassifierConfig, ResNet};

/// Backend for explanation passes.
type ExplainBackend = Autodiff<NdArray>;

type Explainer = GradCamExplainer<ExplainBackend, ResNet<ExplainBackend>>;

#[derive(Parser)]
#[command(name = "camviz")]
#[command(author, version)]
#[command(about = "Classify images and explain predictions with Grad-CAM heatmaps")]
#[command(long_about = "camviz: image classification with gradient-weighted class activation maps.

EXAMPLES:
  # Classify images
  camviz classify --config classifier.json photo1.jpg photo2.jpg

  # Classify and save a CSV log of the results
  camviz classify --export-csv reports photo1.jpg photo2.jpg

  # Write heatmaps for every class scoring above 0.6
  camviz explain --config classifier.json --output gradcam_outputs --threshold 0.6 photo1.jpg

  # List the layers that can be observed
  camviz layers --config classifier.json

  # Remove heatmaps older than a day
  camviz clean --dir gradcam_outputs")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ModelArgs {
    /// Classifier config (JSON); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Weights file, overrides the config
    #[arg(long, value_name = "FILE")]
    checkpoint: Option<PathBuf>,

    /// Layer to observe, overrides the config (e.g. layer4.-1.conv3)
    #[arg(long, value_name = "PATH")]
    layer: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify images and print predictions
    Classify {
        #[command(flatten)]
        model: ModelArgs,

        /// Print predictions as JSON
        #[arg(long)]
        json: bool,

        /// Write a CSV log of the results into this directory
        #[arg(long, value_name = "DIR")]
        export_csv: Option<PathBuf>,

        /// Images to classify
        #[arg(required = true, value_name = "IMAGE")]
        images: Vec<PathBuf>,
    },
    /// Classify images and write Grad-CAM heatmaps
    Explain {
        #[command(flatten)]
        model: ModelArgs,

        /// Output directory for heatmaps
        #[arg(long, default_value = "gradcam_outputs", value_name = "DIR")]
        output: PathBuf,

        /// Explain classes scoring strictly above this value
        #[arg(long, value_name = "T")]
        threshold: Option<f32>,

        /// Heatmap format: jpg, png or bmp
        #[arg(long, value_name = "EXT")]
        format: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Write a CSV log of the results into this directory
        #[arg(long, value_name = "DIR")]
        export_csv: Option<PathBuf>,

        /// Images to explain
        #[arg(required = true, value_name = "IMAGE")]
        images: Vec<PathBuf>,
    },
    /// List observable layers and the resolved target layer
    Layers {
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Remove heatmaps from an output directory
    Clean {
        /// Directory to clean
        #[arg(long, default_value = "gradcam_outputs", value_name = "DIR")]
        dir: PathBuf,

        /// Remove files older than this many hours
        #[arg(long, default_value = "24", value_name = "H")]
        older_than_hours: u64,

        /// Remove every file regardless of age
        #[arg(long)]
        all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Classify {
            model,
            json,
            export_csv,
            images,
        } => handle_classify(model, json, export_csv, images),
        Commands::Explain {
            model,
            output,
            threshold,
            format,
            json,
            export_csv,
            images,
        } => handle_explain(model, output, threshold, format, json, export_csv, images),
        Commands::Layers { model } => handle_layers(model),
        Commands::Clean {
            dir,
            older_than_hours,
            all,
        } => handle_clean(dir, older_than_hours, all),
    }
}

fn load_config(args: &ModelArgs) -> Result<ClassifierConfig> {
    let mut config = match &args.config {
        Some(path) => ClassifierConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClassifierConfig::default(),
    };
    if let Some(checkpoint) = &args.checkpoint {
        config.checkpoint = Some(checkpoint.clone());
    }
    if let Some(layer) = &args.layer {
        config.target_layer = layer.clone();
    }
    Ok(config)
}

fn build_explainer(config: &ClassifierConfig) -> Result<Explainer> {
    let device = NdArrayDevice::Cpu;
    let model = config
        .load_classifier::<ExplainBackend>(&device)
        .context("Failed to build classifier")?;

    GradCamExplainer::new(
        model,
        config.labels.clone(),
        &config.target_layer,
        config.preprocess.clone(),
        config.explain.clone(),
        device,
    )
    .context("Failed to set up Grad-CAM")
}

fn identifying_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_prediction(path: &Path, prediction: &Prediction) {
    println!(
        "{}: {} ({:.1}%) in {:.2}s",
        path.display(),
        prediction.label,
        prediction.confidence,
        prediction.processing_time.as_secs_f64()
    );
    for p in prediction.top(3, 50.0) {
        println!("    {:<20} {:5.1}%", p.label, p.probability);
    }
}

fn export_results(results: &SessionResults, dir: Option<&Path>) -> Result<()> {
    let Some(dir) = dir else {
        return Ok(());
    };
    match results
        .export_csv(dir)
        .with_context(|| format!("Failed to export results to {}", dir.display()))?
    {
        Some(path) => println!("Results exported to {}", path.display()),
        None => tracing::warn!("No results to export"),
    }
    Ok(())
}

fn handle_classify(
    args: ModelArgs,
    json: bool,
    export_csv: Option<PathBuf>,
    images: Vec<PathBuf>,
) -> Result<()> {
    let config = load_config(&args)?;
    let explainer = build_explainer(&config)?;
    let mut stats = SessionStats::new();
    let mut results = SessionResults::new();
    let mut failed = 0usize;

    for path in &images {
        match explainer.classify(path) {
            Ok(prediction) => {
                stats.record(&prediction);
                results.record(identifying_name(path), &prediction);
                if json {
                    let value = serde_json::json!({
                        "image": path.display().to_string(),
                        "prediction": prediction,
                    });
                    println!("{}", serde_json::to_string(&value)?);
                } else {
                    print_prediction(path, &prediction);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", path.display(), e);
            }
        }
    }

    let summary = stats.summary();
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!();
        print!("{}", summary.to_string_table());
    }
    export_results(&results, export_csv.as_deref())?;

    if failed == images.len() {
        bail!("No image could be classified");
    }
    Ok(())
}

fn handle_explain(
    args: ModelArgs,
    output: PathBuf,
    threshold: Option<f32>,
    format: Option<String>,
    json: bool,
    export_csv: Option<PathBuf>,
    images: Vec<PathBuf>,
) -> Result<()> {
    let mut config = load_config(&args)?;
    if let Some(format) = format {
        config.explain.format = HeatmapFormat::from_extension(&format)?;
    }
    let explainer = build_explainer(&config)?;
    let mut stats = SessionStats::new();
    let mut results = SessionResults::new();
    let mut failed = 0usize;

    for path in &images {
        let mut request = ExplainRequest::new(path, identifying_name(path), &output);
        request.threshold = threshold;

        let explanation = match explainer.explain(&request) {
            Ok(explanation) => explanation,
            Err(e) if e.is_input_error() => {
                failed += 1;
                eprintln!("{}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(e).context(format!("Failed to explain {}", path.display())),
        };
        stats.record(&explanation.prediction);
        results.record(identifying_name(path), &explanation.prediction);

        if json {
            let failures: Vec<_> = explanation
                .failures()
                .iter()
                .map(|h| {
                    serde_json::json!({
                        "class_index": h.class_index,
                        "label": h.label,
                        "error": h.outcome.as_ref().err().map(|e| e.to_string()),
                    })
                })
                .collect();
            let value = serde_json::json!({
                "image": path.display().to_string(),
                "prediction": explanation.prediction,
                "selected": explanation.selected,
                "heatmaps": explanation.urls(),
                "failures": failures,
            });
            println!("{}", serde_json::to_string(&value)?);
        } else {
            print_prediction(path, &explanation.prediction);
            if explanation.selected.is_empty() {
                println!("    no class above threshold");
            }
            for url in explanation.urls() {
                println!("    heatmap: {}", url);
            }
            for failure in explanation.failures() {
                if let Err(e) = &failure.outcome {
                    println!("    {} failed: {}", failure.label, e);
                }
            }
        }
    }

    if !json {
        println!();
        print!("{}", stats.summary().to_string_table());
    }
    export_results(&results, export_csv.as_deref())?;

    if failed == images.len() {
        bail!("No image could be explained");
    }
    Ok(())
}

fn handle_layers(args: ModelArgs) -> Result<()> {
    let config = load_config(&args)?;
    let explainer = build_explainer(&config)?;

    println!("Observable layers:");
    for name in explainer.layer_names() {
        let marker = if name == explainer.target_layer() { "*" } else { " " };
        println!("  {} {}", marker, name);
    }
    println!(
        "\nTarget layer: {} -> {}",
        config.target_layer,
        explainer.target_layer()
    );
    Ok(())
}

fn handle_clean(dir: PathBuf, older_than_hours: u64, all: bool) -> Result<()> {
    let removed = if all {
        clear_directory(&dir)
    } else {
        remove_older_than(&dir, Duration::from_secs(older_than_hours * 3600))
    }
    .with_context(|| format!("Failed to clean {}", dir.display()))?;

    println!("Removed {} file(s) from {}", removed, dir.display());
    Ok(())
}
