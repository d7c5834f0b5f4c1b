//! Model Bridge CLI
//!
//! Convert 3D models to GLB and manage the local model store.

use clap::{Parser, Subcommand};
use model_bridge::{ConversionSession, InputFormat, ModelStore, ViewerReference};
use std::fs;
use std::path::PathBuf;

/// How many history records the listing surfaces by default.
const RECENT_LIMIT: usize = 4;

#[derive(Parser)]
#[command(name = "model-bridge")]
#[command(author, version, about = "Convert 3D models to GLB and hand them off to an AR viewer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a model file to GLB, store it, and print the viewer URL
    Convert {
        /// Input model file (.obj, .stl, .gltf, .glb)
        #[arg(short, long)]
        input: PathBuf,

        /// Companion MTL file for OBJ input
        #[arg(short, long)]
        mtl: Option<PathBuf>,

        /// Output GLB path (defaults to the input name with .glb)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Model store directory
        #[arg(short, long, default_value = "./model-store")]
        store: PathBuf,

        /// Skip persisting to the store
        #[arg(long)]
        no_store: bool,

        /// Base URL of the deployed viewer pages
        #[arg(short, long, default_value = "http://localhost:8080")]
        base_url: String,
    },

    /// List stored conversions, most recent first
    List {
        /// Model store directory
        #[arg(short, long, default_value = "./model-store")]
        store: PathBuf,

        /// Show the full history instead of the most recent entries
        #[arg(long)]
        all: bool,
    },

    /// Promote a history record to the current slot
    Promote {
        /// History identifier (model_<timestamp>)
        id: String,

        /// Model store directory
        #[arg(short, long, default_value = "./model-store")]
        store: PathBuf,
    },

    /// Print a viewer URL without converting anything
    ViewUrl {
        /// Base URL of the deployed viewer pages
        #[arg(short, long, default_value = "http://localhost:8080")]
        base_url: String,

        /// Direct model URL to embed
        #[arg(long, conflicts_with = "id")]
        src: Option<String>,

        /// Display name for a direct URL
        #[arg(long, requires = "src")]
        name: Option<String>,

        /// History identifier to reference
        #[arg(long)]
        id: Option<String>,
    },

    /// Show information about a model file without converting it
    Info {
        /// Input model file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            mtl,
            output,
            store,
            no_store,
            base_url,
        } => convert(input, mtl, output, store, no_store, &base_url)?,
        Commands::List { store, all } => list(&store, all)?,
        Commands::Promote { id, store } => promote(&id, &store)?,
        Commands::ViewUrl {
            base_url,
            src,
            name,
            id,
        } => view_url(&base_url, src, name, id),
        Commands::Info { input } => info(&input)?,
    }

    Ok(())
}

fn convert(
    input: PathBuf,
    mtl: Option<PathBuf>,
    output: Option<PathBuf>,
    store_dir: PathBuf,
    no_store: bool,
    base_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    println!("Loading {}...", input.display());
    let bytes = fs::read(&input)?;
    let mut session = ConversionSession::begin(file_name, bytes)?;

    if let Some(mtl_path) = mtl {
        println!("Loading materials from {}...", mtl_path.display());
        session.supply_materials(fs::read_to_string(mtl_path)?)?;
    }

    let glb = session.convert()?.to_vec();
    if let Some(stats) = session.stats() {
        println!(
            "  Converted: {} vertices, {} triangles",
            stats.vertices, stats.triangles
        );
    }

    let output = output.unwrap_or_else(|| PathBuf::from(session.download_file_name()));
    fs::write(&output, &glb)?;
    println!("  Wrote {} ({} bytes)", output.display(), glb.len());

    if no_store {
        println!("Viewer URL: {}", ViewerReference::CurrentSlot.to_viewer_url(base_url));
        return Ok(());
    }

    let store = ModelStore::open_or_init(&store_dir)?;
    match session.store_if_current(&store)? {
        Some(id) => {
            println!("  Stored as {} (current slot updated)", id);
            println!(
                "Viewer URL: {}",
                ViewerReference::HistoryId(id).to_viewer_url(base_url)
            );
        }
        None => println!("  Conversion superseded, not stored"),
    }

    Ok(())
}

fn list(store_dir: &PathBuf, all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = ModelStore::open_or_init(store_dir)?;

    if let Some(current) = store.get_current()? {
        println!(
            "Current slot: {} ({} bytes, {})",
            current.name,
            current.blob.len(),
            current.timestamp
        );
    } else {
        println!("Current slot: empty");
    }

    let mut history = store.list_history()?;
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let shown = if all { history.len() } else { RECENT_LIMIT.min(history.len()) };

    println!("History ({} of {}):", shown, history.len());
    for record in history.iter().take(shown) {
        println!(
            "  {}  {}  {} bytes",
            record.id,
            record.name,
            record.blob.len()
        );
    }

    Ok(())
}

fn promote(id: &str, store_dir: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let store = ModelStore::open_or_init(store_dir)?;
    if store.promote_to_current(id)? {
        println!("Promoted {} to the current slot", id);
    } else {
        println!("No history record with id {}", id);
    }
    Ok(())
}

fn view_url(base_url: &str, src: Option<String>, name: Option<String>, id: Option<String>) {
    let reference = match (src, id) {
        (Some(url), _) => ViewerReference::DirectUrl { url, name },
        (None, Some(id)) => ViewerReference::HistoryId(id),
        (None, None) => ViewerReference::CurrentSlot,
    };
    println!("{}", reference.to_viewer_url(base_url));
}

fn info(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = InputFormat::from_file_name(&file_name)?;

    let bytes = fs::read(input)?;
    let mut scene = model_bridge::load_model(&bytes, format, None)?;
    let stats = model_bridge::normalize(&mut scene);

    println!("Format: {:?}", format);
    println!("Vertices: {}", stats.vertices);
    println!("Triangles: {}", stats.triangles);
    if format.accepts_materials() {
        println!("Materials: accepts a companion .mtl file");
    }

    Ok(())
}
