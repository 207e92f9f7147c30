use std::sync::Arc;

use clap::Parser;
use fileseek::{
    DataDir,
    RedbVectorStore,
    Result,
    Settings,
    cli::{self, Cli, Command},
    extract::FileExtractor,
    indexer::{IndexSummary, Indexer},
    opener::SystemOpener,
    search::{AggregatedResult, SearchEngine},
    server::{self, AppState},
    vector_store::VectorIndex,
};
use kdam::{Bar, BarExt, tqdm};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("FILESEEK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let settings = Settings::try_from(cli.settings)?;
    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let store: Arc<dyn VectorIndex> = Arc::new(RedbVectorStore::open(
        &data_dir.index_db(),
        &settings.collection,
    )?);

    match cli.command {
        Command::Serve(args) => cmd_serve(&settings, store, &args)?,
        Command::Index(args) => cmd_index(&settings, store, &args, cli.quiet)?,
        Command::Search(args) => cmd_search(&settings, store, &args)?,
        Command::Status(args) => {
            cmd_status(&settings, &data_dir, store.as_ref(), args.json)?
        }
        Command::Files(args) => cmd_files(store.as_ref(), args.json)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_serve(
    settings: &Settings,
    store: Arc<dyn VectorIndex>,
    args: &cli::ServeArgs,
) -> Result<()> {
    // The HTTP embedder must be created and dropped outside the runtime.
    let embedder = settings.embedder()?;
    let state = AppState::new(
        settings,
        Arc::new(FileExtractor),
        embedder.clone(),
        store,
        Arc::new(SystemOpener),
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::serve(state, args.bind))?;
    drop(runtime);
    drop(embedder);
    Ok(())
}

fn cmd_index(
    settings: &Settings,
    store: Arc<dyn VectorIndex>,
    args: &cli::IndexArgs,
    quiet: bool,
) -> Result<()> {
    let indexer = Indexer::new(
        Arc::new(FileExtractor),
        settings.embedder()?,
        store,
        settings.chunking,
        settings.walk_options(),
    )?;

    let mut bar: Option<Bar> = None;
    let summary = indexer.index_directory(&args.directory, |path, _, total| {
        if quiet {
            return;
        }
        let pb = bar.get_or_insert_with(|| {
            tqdm!(total = total, desc = "Indexing", unit = " files")
        });
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        pb.set_description(name);
        let _ = pb.update(1);
    });
    if bar.is_some() {
        eprintln!();
    }
    let summary = summary?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &IndexSummary) {
    println!("Directory: {}", summary.directory);
    println!(
        "Files: {} found, {} indexed, {} unchanged, {} failed, {} removed",
        summary.total_files,
        summary.indexed,
        summary.unchanged,
        summary.failed,
        summary.deleted
    );
    println!(
        "Chunks: {} written, {} in collection",
        summary.chunks_written, summary.collection_count
    );
    println!("Took {} ms", summary.duration_ms);
}

fn cmd_search(
    settings: &Settings,
    store: Arc<dyn VectorIndex>,
    args: &cli::SearchArgs,
) -> Result<()> {
    let engine = SearchEngine::new(settings.embedder()?, store);
    let limit = args.count.unwrap_or(settings.default_results);
    let results = engine.search(&args.query, limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if args.files {
        for r in &results {
            println!("{}", r.file_path);
        }
    } else {
        format_human(&results);
    }
    Ok(())
}

fn format_human(results: &[AggregatedResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, r) in results.iter().enumerate() {
        let exact = if r.has_exact_match { " [exact]" } else { "" };
        println!("{:>2}. {} (score {:.3}){exact}", i + 1, r.file_name, r.score);
        println!("    {}", r.file_path);
        println!(
            "    chunk {} of {}: {}",
            r.metadata.chunk_index + 1,
            r.metadata.total_chunks,
            r.chunk_text.lines().next().unwrap_or_default()
        );
    }
}

fn cmd_status(
    settings: &Settings,
    data_dir: &DataDir,
    store: &dyn VectorIndex,
    json: bool,
) -> Result<()> {
    let files = store.files()?.len();
    let chunks = store.count()?;
    let model = if settings.fake_embeddings {
        "hashing"
    } else {
        settings.embedding_model.as_str()
    };

    if json {
        let status = serde_json::json!({
            "data_dir": data_dir.root(),
            "collection": settings.collection,
            "embedding_model": model,
            "indexed_files": files,
            "chunks": chunks,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Collection: {}", settings.collection);
        println!("Embedding model: {model}");
        println!("Indexed files: {files}");
        println!("Chunks: {chunks}");
    }
    Ok(())
}

fn cmd_files(store: &dyn VectorIndex, json: bool) -> Result<()> {
    let files = store.files()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }
    if files.is_empty() {
        println!("No files indexed.");
        return Ok(());
    }
    for f in &files {
        println!(
            "{}\t{} chunks\t{} bytes\t{}",
            f.file_path, f.total_chunks, f.file_size, f.modified_time
        );
    }
    println!("\n{} file(s)", files.len());
    Ok(())
}
