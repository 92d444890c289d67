//! Digit Classification Example
//!
//! This example loads a digit model and classifies a single drawing read from
//! an image file, the same way a drawing UI would after each stroke.
//!
//! Usage:
//!   cargo run --example classify_image -- --model <path_to_model> --image <path_to_image> [--debug]

use clap::Parser;
use digit_classifier::{ClassifierConfig, DigitClassifier};
use std::error::Error;

/// Command line parameters for the digit classification example
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the ONNX digit model
    #[arg(short, long)]
    model: String,

    /// Path to the image file to classify
    #[arg(short, long)]
    image: String,

    /// Optional JSON configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Skip graph optimization
    #[arg(long, default_value_t = false)]
    no_optimize: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &args.config {
        Some(path) => ClassifierConfig::from_json_file(path)?,
        None => ClassifierConfig::default(),
    }
    .with_model_path(&args.model)
    .with_optimize(!args.no_optimize);

    let classifier = DigitClassifier::new(config)?;
    let shape = classifier.initialize()?.wait()?;
    println!("Model input: {shape} ({} bytes)", shape.byte_size());

    let drawing = image::open(&args.image)?;
    println!(
        "Drawing: {}x{} {:?}",
        drawing.width(),
        drawing.height(),
        drawing.color()
    );

    let prediction = classifier.classify(&drawing)?.wait()?;
    println!("{prediction}");

    classifier.shutdown().wait()?;
    Ok(())
}
