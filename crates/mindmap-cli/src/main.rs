use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mindmap_core::NodeId;
use mindmap_events::EventBus;
use mindmap_graph::{EntityStore, hidden_count};
use mindmap_session::{ImageDecoder, Session, SessionSettings};
use mindmap_storage::{Document, Storage};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (defaults to the per-user config location)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a map holding only the default root
    New { file: PathBuf },
    /// Print the visible outline of a map
    Show {
        file: PathBuf,
        /// Also list what folded nodes hide
        #[arg(long)]
        all: bool,
    },
    /// Validate a map file and print its counts
    Check { file: PathBuf },
    /// Copy a map file into the local store
    Import {
        file: PathBuf,
        /// Path to the SQLite database
        #[arg(short, long)]
        db: Option<PathBuf>,
    },
    /// Write the map held by the local store to a file
    Export {
        file: PathBuf,
        /// Path to the SQLite database
        #[arg(short, long)]
        db: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => SessionSettings::load_from(path),
        None => SessionSettings::load(),
    };

    match args.command {
        Command::New { file } => {
            let document = default_document(settings);
            write_document(&file, &document)?;
            println!("Wrote new map to {:?}", file);
        }
        Command::Show { file, all } => {
            let store = load_store(&read_document(&file)?)?;
            print!("{}", outline(&store, all));
        }
        Command::Check { file } => {
            let document = read_document(&file)?;
            let store = load_store(&document)?;
            let images = store.nodes().filter(|n| n.image.is_some()).count();
            let folded = store.nodes().filter(|n| n.folded).count();
            println!("{:?}: ok", file);
            println!("  document: {}", document.document_id);
            println!("  nodes:    {}", store.len());
            println!("  edges:    {}", store.edges().len());
            println!("  roots:    {}", store.roots().len());
            println!("  folded:   {}", folded);
            println!("  images:   {}", images);
        }
        Command::Import { file, db } => {
            let document = read_document(&file)?;
            document.validate()?;
            let storage = open_storage(db, &settings)?;
            storage.save_document(&document)?;
            println!("Imported {} nodes from {:?}", document.node_count(), file);
        }
        Command::Export { file, db } => {
            let storage = open_storage(db, &settings)?;
            let Some(document) = storage.load_document()? else {
                bail!("local store holds no map");
            };
            write_document(&file, &document)?;
            println!("Exported {} nodes to {:?}", document.node_count(), file);
        }
    }

    Ok(())
}

fn default_document(settings: SessionSettings) -> Document {
    let session = Session::with_parts(settings, None, ImageDecoder::inline(), EventBus::new());
    let document = session.export_document();
    session.teardown();
    document
}

fn read_document(path: &Path) -> Result<Document> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    Document::from_json(&json).with_context(|| format!("parsing {:?}", path))
}

fn write_document(path: &Path, document: &Document) -> Result<()> {
    std::fs::write(path, document.to_json()?).with_context(|| format!("writing {:?}", path))
}

fn load_store(document: &Document) -> Result<EntityStore> {
    let mut next = 0;
    let snapshot = document.clone().into_snapshot(|| {
        next += 1;
        NodeId(next)
    })?;
    Ok(EntityStore::from_snapshot(snapshot)?)
}

fn open_storage(db: Option<PathBuf>, settings: &SessionSettings) -> Result<Storage> {
    let path = db
        .or_else(|| settings.resolved_store_path())
        .context("no database path given and no data directory available")?;
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    tracing::info!("Using local store {:?}", path);
    Ok(Storage::open(path)?)
}

/// Indented tree, one node per line. Folded nodes carry `[+N]` for what they hide.
fn outline(store: &EntityStore, all: bool) -> String {
    let mut out = String::new();
    for root in store.roots() {
        write_node(store, root, 0, all, &mut out);
    }
    out
}

fn write_node(store: &EntityStore, id: NodeId, depth: usize, all: bool, out: &mut String) {
    let Some(node) = store.node(id) else {
        return;
    };
    let label = node.text.replace('\n', " / ");
    let _ = write!(out, "{}- [{}] {}", "  ".repeat(depth), node.kind.tag(), label);
    if let Some(link) = &node.link {
        let _ = write!(out, " <{}>", link);
    }
    if node.image.is_some() {
        let _ = write!(out, " (image)");
    }
    let folded = node.folded && store.has_children(id);
    if folded {
        let _ = write!(out, " [+{}]", hidden_count(store, id));
    }
    out.push('\n');

    if folded && !all {
        return;
    }
    for child in store.children_of(id) {
        write_node(store, child, depth + 1, all, out);
    }
}
