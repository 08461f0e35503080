use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::engine::{map_to_records, Engine, SqliteEngine};
use crate::index::{self, IndexDatabase};
use crate::models::{
    Builder, DeleteRequest, Document, FlushRequest, ImportRequest, IndexConfig, MutationSummary,
    Page, ScoutKey, SearchRequest, SearchResponse, SearchResult, SearchSettings,
    SEARCH_RESULT_VERSION,
};
use crate::server;
use crate::source::{read_documents, JsonlSource};

mod args;
mod config;
mod format;
mod http_backend;

pub use args::{
    Cli, Commands, DeleteArgs, FlushArgs, ImportArgs, IndexInfoArgs, OutputFormat, SearchArgs,
    ServeArgs,
};

use config::{
    apply_search_config_defaults, apply_serve_config_defaults, default_server_url, index_config,
    load_cli_config, search_settings, CliConfig,
};
use http_backend::HttpSearchBackend;

/// Entry point for the CLI binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if cli.schema_version {
        println!(
            "Search result JSON schema version: {}",
            SEARCH_RESULT_VERSION
        );
        return Ok(());
    }

    let cli_config = load_cli_config()?;
    let cli_config = cli_config.as_ref();

    match cli.command {
        Some(Commands::Import(mut import_args)) => {
            fill_server(cli_config, &mut import_args.server);
            run_import(cli_config, &import_args)
        }
        Some(Commands::Delete(mut delete_args)) => {
            fill_server(cli_config, &mut delete_args.server);
            run_delete(cli_config, &delete_args)
        }
        Some(Commands::Flush(mut flush_args)) => {
            fill_server(cli_config, &mut flush_args.server);
            run_flush(cli_config, &flush_args)
        }
        Some(Commands::Search(mut search_args)) => {
            if let Some(config) = cli_config {
                apply_search_config_defaults(config, &mut search_args);
            }
            run_search(cli_config, &search_args)
        }
        Some(Commands::IndexInfo(mut info_args)) => {
            fill_server(cli_config, &mut info_args.server);
            run_index_info(cli_config, &info_args)
        }
        Some(Commands::Serve(mut serve_args)) => {
            if let Some(config) = cli_config {
                apply_serve_config_defaults(config, &mut serve_args);
            }
            run_serve(cli_config, &serve_args)
        }
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("SCOUTDB_LOG") {
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

    // `try_init` so repeated calls (e.g. from tests) do not panic.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn run_import(cli_config: Option<&CliConfig>, args: &ImportArgs) -> Result<()> {
    let mut documents = read_documents(&args.input)
        .with_context(|| format!("failed to read documents from {}", args.input.display()))?;

    if let Some(doc_type) = &args.doc_type {
        for doc in documents.iter_mut().filter(|doc| doc.doc_type.is_empty()) {
            doc.doc_type = doc_type.clone();
        }
    }
    if let Some(doc) = documents.iter().find(|doc| doc.doc_type.is_empty()) {
        bail!(
            "document {} has no type; set \"type\" in the file or pass --type",
            doc.id
        );
    }

    let server_url = effective_server_url(args.server.as_deref(), args.no_server);
    let summary = if let Some(server_url) = server_url {
        let backend = HttpSearchBackend::new(server_url)?;
        backend.import(&ImportRequest { documents })?
    } else {
        let config = index_config(cli_config, args.index_path.as_deref());
        let engine = SqliteEngine::open(&config, search_settings(cli_config))?;
        engine.update(&documents)?;
        info!(
            documents = documents.len(),
            index = %config.index_path.display(),
            "imported documents"
        );
        MutationSummary {
            operation: "import".to_string(),
            doc_type: None,
            documents: documents.len() as u64,
        }
    };

    print_mutation(&summary, args.format)
}

fn run_delete(cli_config: Option<&CliConfig>, args: &DeleteArgs) -> Result<()> {
    let ids: Vec<ScoutKey> = args.ids.iter().map(|id| ScoutKey::new(id.trim())).collect();

    let server_url = effective_server_url(args.server.as_deref(), args.no_server);
    let summary = if let Some(server_url) = server_url {
        let backend = HttpSearchBackend::new(server_url)?;
        backend.delete(&DeleteRequest {
            doc_type: args.doc_type.clone(),
            ids,
        })?
    } else {
        let engine = open_existing_engine(cli_config, args.index_path.as_deref())?;
        let documents: Vec<Document> = ids
            .into_iter()
            .map(|id| Document::new(args.doc_type.clone(), id))
            .collect();
        engine.delete(&documents)?;
        MutationSummary {
            operation: "delete".to_string(),
            doc_type: Some(args.doc_type.clone()),
            documents: documents.len() as u64,
        }
    };

    print_mutation(&summary, args.format)
}

fn run_flush(cli_config: Option<&CliConfig>, args: &FlushArgs) -> Result<()> {
    let server_url = effective_server_url(args.server.as_deref(), args.no_server);
    let summary = if let Some(server_url) = server_url {
        let backend = HttpSearchBackend::new(server_url)?;
        backend.flush(&FlushRequest {
            doc_type: args.doc_type.clone(),
        })?
    } else {
        let engine = open_existing_engine(cli_config, args.index_path.as_deref())?;
        engine.flush(args.doc_type.as_str())?;
        MutationSummary {
            operation: "flush".to_string(),
            doc_type: Some(args.doc_type.clone()),
            documents: 0,
        }
    };

    print_mutation(&summary, args.format)
}

fn run_search(cli_config: Option<&CliConfig>, args: &SearchArgs) -> Result<()> {
    let builder = args::builder_from_args(args)?;
    let page = args::page_from_args(args)?;
    let source = args
        .source
        .as_deref()
        .map(JsonlSource::open)
        .transpose()
        .context("failed to load --source documents")?;

    let server_url = effective_server_url(args.server.as_deref(), args.no_server);
    let response = if let Some(server_url) = server_url {
        let backend = HttpSearchBackend::new(server_url)?;
        let mut response = backend.search(&SearchRequest {
            builder: builder.clone(),
            page,
        })?;
        if let Some(source) = &source {
            // The daemon only knows keys; hydrate against the local file.
            let result = SearchResult::new(response.ids.clone(), response.total);
            response.documents = Some(map_to_records(&builder, &result, source)?);
        }
        response
    } else {
        let engine = open_existing_engine(cli_config, args.index_path.as_deref())?;
        search_locally(&engine, &builder, page, source.as_ref())?
    };

    match args.format {
        OutputFormat::Text => format::print_search_text(&response),
        OutputFormat::Json => print_json(&response),
    }
}

fn search_locally(
    engine: &SqliteEngine,
    builder: &Builder,
    page: Option<Page>,
    source: Option<&JsonlSource>,
) -> Result<SearchResponse> {
    let result = match page {
        Some(page) => engine.paginate(builder, page.per_page, page.page)?,
        None => engine.search(builder)?,
    };
    debug!(hits = engine.total_count(&result), "local search finished");

    let documents = source
        .map(|source| engine.map(builder, &result, source))
        .transpose()?;

    Ok(SearchResponse {
        version: SEARCH_RESULT_VERSION.to_string(),
        model: builder.model.clone(),
        query: builder.query.clone(),
        ids: engine.map_ids(&result),
        total: engine.total_count(&result),
        documents,
    })
}

fn run_index_info(cli_config: Option<&CliConfig>, args: &IndexInfoArgs) -> Result<()> {
    let server_url = effective_server_url(args.server.as_deref(), args.no_server);
    let summary = if let Some(server_url) = server_url {
        let backend = HttpSearchBackend::new(server_url)?;
        backend.index_info()?
    } else {
        let config = index_config(cli_config, args.index_path.as_deref());
        index::get_index_info(&config)?
    };

    match args.format {
        OutputFormat::Text => format::print_index_summary_text(&summary),
        OutputFormat::Json => print_json(&summary),
    }
}

fn run_serve(cli_config: Option<&CliConfig>, args: &ServeArgs) -> Result<()> {
    let addr: SocketAddr = args
        .addr
        .parse()
        .with_context(|| format!("invalid --addr {:?}", args.addr))?;

    let config = index_config(cli_config, args.index_path.as_deref());
    let db = Arc::new(IndexDatabase::open(&config)?);
    let settings = search_settings(cli_config);
    let engine = SqliteEngine::with_database(db.clone(), &config, settings);
    let state = server::AppState::new(Arc::new(engine), db);

    println!("Starting scoutdb HTTP server on http://{addr}");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(server::run(addr, state))?;
    Ok(())
}

/// Open the engine over an index that must already exist, so read and
/// delete paths never create an empty index as a side effect.
fn open_existing_engine(
    cli_config: Option<&CliConfig>,
    index_path: Option<&std::path::Path>,
) -> Result<SqliteEngine> {
    let config: IndexConfig = index_config(cli_config, index_path);
    let settings: SearchSettings = search_settings(cli_config);
    let db = Arc::new(IndexDatabase::open_existing(&config)?);
    Ok(SqliteEngine::with_database(db, &config, settings))
}

fn fill_server(cli_config: Option<&CliConfig>, server: &mut Option<String>) {
    if server.is_none() {
        *server = cli_config.and_then(default_server_url);
    }
}

fn print_mutation(summary: &MutationSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => format::print_mutation_text(summary),
        OutputFormat::Json => print_json(summary),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    serde_json::to_writer(std::io::stdout(), value)?;
    println!();
    Ok(())
}

fn effective_server_url(server_flag: Option<&str>, no_server: bool) -> Option<String> {
    if no_server {
        None
    } else {
        server_flag.map(|s| s.to_string())
    }
}
