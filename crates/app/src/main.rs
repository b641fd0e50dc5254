use anyhow::{Context, Result};
use clap::Parser;
use scrawl_core::ScrawlConfig;
use scrawl_ocr::{report, InvoicePipeline, SharedRecognizer};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

/// Extract text from photographed handwritten invoices.
#[derive(Parser, Debug)]
#[command(name = "scrawl", version)]
struct Args {
    /// Images to process
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Configuration file (defaults to the per-user scrawl.toml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print one JSON record per image instead of the console report
    #[arg(long)]
    json: bool,

    /// Send the unenhanced image to the recognizer
    #[arg(long)]
    raw: bool,

    /// Do not write preprocessed_* inspection images
    #[arg(long)]
    no_debug: bool,

    /// Longest side of the processed image (e.g. 1280 or 800 on small machines)
    #[arg(long)]
    max_dimension: Option<u32>,

    /// Images processed at once (defaults to the number of CPUs)
    #[arg(short, long)]
    jobs: Option<NonZeroUsize>,

    /// Tesseract language data directory
    #[arg(long, env = "TESSDATA_PREFIX")]
    tessdata: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;

    let backend = Arc::new(backend_slot(args.tessdata.clone(), config.recognition.languages.clone()));
    // Load up front so a missing model fails once, not per image.
    backend.get().context("recognition backend unavailable")?;

    let jobs = job_count(args.jobs);
    tracing::debug!(jobs, images = args.images.len(), "starting extraction");

    let outcomes = run_bounded(args.images.clone(), jobs, move |path: PathBuf| {
        let pipeline = InvoicePipeline::new(Arc::clone(&backend), config.clone());
        let outcome = pipeline.extract_file(&path);
        (path, outcome)
    })
    .await?;

    let mut failures = 0usize;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(outcome) => {
                let rep = report::format(&outcome.result, !args.json);
                if args.json {
                    println!("{}", rep.record.to_json()?);
                } else {
                    println!("Processing image: {}", path.display());
                    if let Some(artifact) = &outcome.debug_artifact {
                        println!("Preprocessed image saved as: {}", artifact.display());
                    }
                    let (w, h) = outcome.processed_dims;
                    println!("Image size: {w}x{h} pixels\n");
                    print!("{}", rep.rendered.unwrap_or_default());
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("scrawl: {}: {e}", path.display());
            }
        }
    }

    if failures > 0 {
        tracing::warn!(failures, total = args.images.len(), "some images failed");
        std::process::exit(1);
    }
    Ok(())
}

fn job_count(requested: Option<NonZeroUsize>) -> usize {
    requested
        .or_else(|| std::thread::available_parallelism().ok())
        .map_or(1, NonZeroUsize::get)
}

/// Run `work` over `items` on the blocking pool, at most `jobs` at a time so
/// only that many full-resolution images are held in memory. Results come
/// back in input order.
async fn run_bounded<I, T, F>(items: Vec<I>, jobs: usize, work: F) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> T + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let slots = Arc::new(Semaphore::new(jobs.max(1)));
    let mut tasks = Vec::with_capacity(items.len());
    for item in items {
        let permit = Arc::clone(&slots)
            .acquire_owned()
            .await
            .context("job limiter closed")?;
        let work = Arc::clone(&work);
        tasks.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work(item)
        }));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(task.await.context("extraction task panicked")?);
    }
    Ok(results)
}

fn resolve_config(args: &Args) -> Result<ScrawlConfig> {
    let mut config = match &args.config {
        Some(path) => ScrawlConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                tracing::info!(path = %path.display(), "using config file");
                ScrawlConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?
            }
            None => ScrawlConfig::default(),
        },
    };

    if let Some(max) = args.max_dimension {
        config.preprocess.max_dimension = max;
    }
    if args.no_debug {
        config.debug.enabled = false;
    }
    if args.raw {
        config.recognition.use_preprocessing = false;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "scrawl", "scrawl")
        .map(|dirs| dirs.config_dir().join("scrawl.toml"))
}

#[cfg(feature = "tesseract")]
fn backend_slot(tessdata: Option<String>, languages: Vec<String>) -> SharedRecognizer {
    SharedRecognizer::new(move || {
        let backend = scrawl_ocr::TesseractRecognizer::load(tessdata.clone(), &languages)?;
        Ok(Arc::new(backend) as Arc<dyn scrawl_ocr::Recognizer>)
    })
}

#[cfg(not(feature = "tesseract"))]
fn backend_slot(_tessdata: Option<String>, _languages: Vec<String>) -> SharedRecognizer {
    SharedRecognizer::new(|| Err(scrawl_ocr::RecognitionError::NotAvailable))
}
