use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::models::{Builder, Page};

/// Top-level CLI entrypoint for `scoutdb`.
#[derive(Parser, Debug)]
#[command(
    name = "scoutdb",
    about = "Full-text search index for application records, stored in SQLite",
    author = "scoutdb developers",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    /// Print the JSON schema version used for `--format=json` output
    /// and exit.
    #[arg(long = "schema-version")]
    pub schema_version: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add or update records from a JSON Lines file.
    Import(ImportArgs),
    /// Remove records by key.
    Delete(DeleteArgs),
    /// Remove every record of a type.
    Flush(FlushArgs),
    /// Search the index.
    Search(SearchArgs),
    /// Inspect an existing index without modifying it.
    IndexInfo(IndexInfoArgs),
    /// Run a long-lived HTTP+JSON daemon.
    Serve(ServeArgs),
}

/// CLI representation of output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments specific to the `import` subcommand.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON Lines file with one document per line.
    pub input: PathBuf,

    /// Record type for documents that do not carry their own `type`.
    #[arg(long = "type")]
    pub doc_type: Option<String>,

    /// SQLite index file.
    #[arg(long = "index-path", env = "SCOUTDB_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating the import to a daemon.
    ///
    /// When set (either via this flag or the `SCOUTDB_SERVER_URL`
    /// environment variable), the CLI sends the documents to the HTTP
    /// server instead of writing the local index. Use `--no-server`
    /// to override this and force local execution.
    #[arg(long = "server", env = "SCOUTDB_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local indexing.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `delete` subcommand.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Record type the keys belong to.
    #[arg(long = "type")]
    pub doc_type: String,

    /// Keys to remove; repeat or separate with commas.
    #[arg(long = "id", required = true, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// SQLite index file.
    #[arg(long = "index-path", env = "SCOUTDB_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating the delete to a daemon.
    #[arg(long = "server", env = "SCOUTDB_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `flush` subcommand.
#[derive(Args, Debug)]
pub struct FlushArgs {
    /// Record type to remove from the index.
    #[arg(long = "type")]
    pub doc_type: String,

    /// SQLite index file.
    #[arg(long = "index-path", env = "SCOUTDB_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating the flush to a daemon.
    #[arg(long = "server", env = "SCOUTDB_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `search` subcommand.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text query.
    pub query: String,

    /// Record type to search in.
    #[arg(long = "type")]
    pub doc_type: String,

    /// Field constraint applied when hydrating records (`field=value`).
    ///
    /// Only takes effect together with `--source`, since the index
    /// itself stores no field values.
    #[arg(long = "where")]
    pub wheres: Vec<String>,

    /// Maximum number of results for unpaginated searches.
    #[arg(long = "limit")]
    pub limit: Option<usize>,

    /// 1-based page number; enables pagination.
    #[arg(long = "page")]
    pub page: Option<usize>,

    /// Page size used with `--page`.
    #[arg(long = "per-page")]
    pub per_page: Option<usize>,

    /// JSON Lines file used to hydrate matching keys into documents.
    #[arg(long = "source")]
    pub source: Option<PathBuf>,

    /// SQLite index file.
    #[arg(long = "index-path", env = "SCOUTDB_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating search to a daemon.
    #[arg(long = "server", env = "SCOUTDB_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local search.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `index-info` subcommand.
#[derive(Args, Debug)]
pub struct IndexInfoArgs {
    /// SQLite index file.
    #[arg(long = "index-path", env = "SCOUTDB_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating to a daemon.
    #[arg(long = "server", env = "SCOUTDB_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Default bind address for `scoutdb serve`.
pub const DEFAULT_SERVE_ADDR: &str = "127.0.0.1:7979";

/// Arguments specific to the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket address to bind.
    #[arg(long = "addr", default_value = DEFAULT_SERVE_ADDR)]
    pub addr: String,

    /// SQLite index file served by the daemon.
    #[arg(long = "index-path", env = "SCOUTDB_INDEX_PATH")]
    pub index_path: Option<PathBuf>,
}

/// Default page size when `--page` is given without `--per-page`.
pub const DEFAULT_PER_PAGE: usize = 15;

/// Build the query builder described by `search` arguments.
pub fn builder_from_args(args: &SearchArgs) -> Result<Builder> {
    if args.doc_type.trim().is_empty() {
        bail!("--type must not be empty");
    }

    let mut builder = Builder::new(args.doc_type.clone(), args.query.clone());
    for clause in &args.wheres {
        let Some((field, value)) = clause.split_once('=') else {
            bail!("invalid --where clause {clause:?}; expected field=value");
        };
        let field = field.trim();
        if field.is_empty() {
            bail!("invalid --where clause {clause:?}; field name is empty");
        }
        builder = builder.where_eq(field, value.trim());
    }

    if let Some(limit) = args.limit {
        builder = builder.take(limit);
    }

    Ok(builder)
}

/// Page requested by `search` arguments, if any.
pub fn page_from_args(args: &SearchArgs) -> Result<Option<Page>> {
    match (args.page, args.per_page) {
        (None, None) => Ok(None),
        (page, per_page) => {
            let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
            if per_page == 0 {
                bail!("--per-page must be greater than zero");
            }
            Ok(Some(Page {
                page: page.unwrap_or(1).max(1),
                per_page,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_args(argv: &[&str]) -> SearchArgs {
        let mut full = vec!["scoutdb", "search"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Some(Commands::Search(args)) => args,
            other => panic!("expected search command, got {other:?}"),
        }
    }

    #[test]
    fn builder_collects_where_clauses_and_limit() {
        let args = search_args(&[
            "rust",
            "--type",
            "posts",
            "--where",
            "status=published",
            "--where",
            "lang = en",
            "--limit",
            "5",
        ]);

        let builder = builder_from_args(&args).expect("builder");
        assert_eq!(builder.model, "posts");
        assert_eq!(builder.query, "rust");
        assert_eq!(builder.wheres.len(), 2);
        assert_eq!(builder.wheres[1].field, "lang");
        assert_eq!(builder.wheres[1].value, "en");
        assert_eq!(builder.limit, Some(5));
    }

    #[test]
    fn malformed_where_clause_is_rejected() {
        let args = search_args(&["rust", "--type", "posts", "--where", "status"]);
        assert!(builder_from_args(&args).is_err());
    }

    #[test]
    fn page_defaults_are_applied() {
        let args = search_args(&["rust", "--type", "posts", "--page", "3"]);
        assert_eq!(
            page_from_args(&args).expect("page"),
            Some(Page {
                page: 3,
                per_page: DEFAULT_PER_PAGE
            })
        );

        let args = search_args(&["rust", "--type", "posts", "--per-page", "4"]);
        assert_eq!(
            page_from_args(&args).expect("page"),
            Some(Page { page: 1, per_page: 4 })
        );

        let args = search_args(&["rust", "--type", "posts"]);
        assert_eq!(page_from_args(&args).expect("page"), None);
    }
}
