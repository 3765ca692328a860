use anyhow::Result;
use clap::{Parser, ValueEnum};
use facetag_core::{Config, DetectorBackend, OnnxEngine, PipelineError, StoreError};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facetag", about = "Train a face-tagging store and recognize faces in images")]
struct Cli {
    /// Train on images in the training directory
    #[arg(long)]
    train: bool,

    /// Recognize faces in an image (requires --file)
    #[arg(long)]
    test: bool,

    /// Path to the image file for recognition
    #[arg(long)]
    file: Option<PathBuf>,

    /// Face detection model: hog for CPU, cnn for the heavier detector
    #[arg(long, value_enum, default_value = "hog")]
    model: Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Model {
    Hog,
    Cnn,
}

impl From<Model> for DetectorBackend {
    fn from(model: Model) -> Self {
        match model {
            Model::Hog => DetectorBackend::Hog,
            Model::Cnn => DetectorBackend::Cnn,
        }
    }
}

/// Load the ONNX engine once, on first use, for whichever operations run.
fn engine<'a>(
    slot: &'a mut Option<OnnxEngine>,
    config: &Config,
    backend: DetectorBackend,
) -> Result<&'a mut OnnxEngine> {
    match slot {
        Some(engine) => Ok(engine),
        None => {
            let loaded = OnnxEngine::load(
                &config.detector_model_path(backend),
                &config.recognizer_model_path(),
                config.match_threshold,
            )?;
            Ok(slot.insert(loaded))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let backend = DetectorBackend::from(cli.model);

    let mut slot: Option<OnnxEngine> = None;

    if cli.train {
        let store = facetag_core::train(engine(&mut slot, &config, backend)?, &config)?;
        println!("Training complete: {} faces saved.", store.len());
    }

    if cli.test {
        let Some(file) = &cli.file else {
            eprintln!("Please provide --file <image_path> to test");
            return Ok(());
        };

        match facetag_core::recognize(engine(&mut slot, &config, backend)?, &config, file) {
            Ok(result) => {
                std::fs::create_dir_all(&config.output_dir)?;
                let annotated_path = config.annotated_path();
                result.annotated.save(&annotated_path)?;

                // Fire-and-forget handoff to the platform image viewer.
                if let Err(err) = open::that_detached(&annotated_path) {
                    tracing::warn!(error = %err, path = %annotated_path.display(), "could not open image viewer");
                }

                println!("Recognized faces: {:?}", result.names);
            }
            Err(PipelineError::Store(err @ StoreError::Missing(_))) => {
                eprintln!("{err}");
            }
            Err(err) => return Err(err.into()),
        }
    }

    if !cli.train && !cli.test {
        eprintln!("Nothing to do: pass --train and/or --test --file <image_path>");
    }

    Ok(())
}
