use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use feroze_backend::indexer::chunker::Chunker;
use feroze_backend::rag::index_manager::IndexManager;
use feroze_backend::rag::{Distance, EmbeddingGenerator};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Metric {
    Euclidean,
    Cosine,
}

impl From<Metric> for Distance {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Euclidean => Distance::Euclidean,
            Metric::Cosine => Distance::Cosine,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "build-index")]
#[command(about = "Build the knowledge-base snapshot from the advisor's source document")]
struct Args {
    /// Source document (.txt, .md, .pdf or .docx)
    #[arg(short, long, env = "DOC_PATH", default_value = "docs/feroze.txt")]
    doc: PathBuf,

    /// Snapshot directory to write
    #[arg(short, long, env = "INDEX_PATH", default_value = "feroze_faiss_index")]
    index: PathBuf,

    /// Maximum chunk size in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 1000)]
    chunk_size: usize,

    /// Overlap between chunks in characters
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 100)]
    chunk_overlap: usize,

    /// Local ONNX export of all-MiniLM-L6-v2
    #[arg(long, env = "EMBEDDING_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Distance metric stored in the snapshot
    #[arg(long, env = "DISTANCE_METRIC", value_enum, default_value_t = Metric::Euclidean)]
    distance: Metric,

    /// Overwrite an existing snapshot
    #[arg(short, long)]
    force: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if args.index.exists() && !args.force {
        anyhow::bail!(
            "Snapshot already exists at {} (use --force to rebuild)",
            args.index.display()
        );
    }

    let chunker = Chunker::new(args.chunk_size, args.chunk_overlap)?;
    let manager = IndexManager::new(args.index.clone(), args.doc.clone(), chunker, args.distance.into());

    println!("Initializing embedding model...");
    let embedder = EmbeddingGenerator::new(args.model_dir.as_deref())?;

    if args.index.exists() {
        std::fs::remove_dir_all(&args.index)?;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} chunks embedded {msg}")?,
    );
    pb.set_message(format!("from {}", args.doc.display()));

    let started = Instant::now();
    let index = manager.rebuild(&embedder, |n| pb.inc(n as u64))?;
    pb.finish_with_message("done");

    println!("\nIndexing complete!");
    println!("  Document:   {}", args.doc.display());
    println!("  Chunks:     {}", index.len());
    println!("  Dimension:  {}", index.dimension());
    println!("  Distance:   {:?}", index.distance());
    println!("  Snapshot:   {}", args.index.display());
    println!("  Elapsed:    {:.1}s", started.elapsed().as_secs_f64());

    Ok(())
}
