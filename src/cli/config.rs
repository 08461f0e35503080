use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::args::{OutputFormat, ServeArgs, DEFAULT_SERVE_ADDR};
use crate::cli::SearchArgs;
use crate::models::{IndexConfig, SearchSettings, StemmerKind};

/// Top-level representation of `.scoutdb/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub index: Option<IndexSection>,

    #[serde(default)]
    pub search: Option<SearchSection>,

    #[serde(default)]
    pub serve: Option<ServeSection>,

    #[serde(default)]
    pub http: Option<HttpSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexSection {
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    #[serde(default)]
    pub table_prefix: Option<String>,
    #[serde(default)]
    pub clean_words_table_on_every_update: Option<bool>,
    #[serde(default)]
    pub stemmer: Option<StemmerKind>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchSection {
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub no_server: Option<bool>,
    #[serde(default)]
    pub inverse_document_frequency_weight: Option<f64>,
    #[serde(default)]
    pub term_frequency_weight: Option<f64>,
    #[serde(default)]
    pub term_deviation_weight: Option<f64>,
    #[serde(default)]
    pub wildcard_last_token: Option<bool>,
    #[serde(default)]
    pub wildcard_all_tokens: Option<bool>,
    #[serde(default)]
    pub require_match_for_all_tokens: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServeSection {
    #[serde(default)]
    pub addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpSection {
    #[serde(default)]
    pub server_url: Option<String>,
}

/// Discover and load a project-local `.scoutdb/config.toml` (or
/// `.scoutdb/scoutdb.toml`) starting from the current working
/// directory and walking up parent directories.
pub fn load_cli_config() -> Result<Option<CliConfig>> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let Some(path) = find_project_config(&cwd) else {
        return Ok(None);
    };

    tracing::debug!(path = %path.display(), "loading project config");
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: CliConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse TOML config at {}", path.display()))?;

    Ok(Some(config))
}

fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);

    while let Some(current) = dir {
        let scoutdb_dir = current.join(".scoutdb");
        let config_toml = scoutdb_dir.join("config.toml");
        if config_toml.is_file() {
            return Some(config_toml);
        }

        let scoutdb_toml = scoutdb_dir.join("scoutdb.toml");
        if scoutdb_toml.is_file() {
            return Some(scoutdb_toml);
        }

        dir = current.parent();
    }

    None
}

/// Resolve the index configuration: an explicit `--index-path` wins,
/// then the `[index]` section, then built-in defaults.
pub fn index_config(config: Option<&CliConfig>, index_path: Option<&Path>) -> IndexConfig {
    let mut resolved = IndexConfig::default();
    let section = config.and_then(|c| c.index.as_ref());

    if let Some(section) = section {
        if let Some(path) = &section.index_path {
            resolved.index_path = path.clone();
        }
        if let Some(prefix) = &section.table_prefix {
            resolved.table_prefix = prefix.clone();
        }
        if let Some(clean) = section.clean_words_table_on_every_update {
            resolved.clean_words_table_on_every_update = clean;
        }
        if let Some(stemmer) = section.stemmer {
            resolved.stemmer = stemmer;
        }
    }

    if let Some(path) = index_path {
        resolved.index_path = path.to_path_buf();
    }

    resolved
}

/// Ranking settings from the `[search]` section, falling back to
/// built-in defaults for anything left unset.
pub fn search_settings(config: Option<&CliConfig>) -> SearchSettings {
    let mut settings = SearchSettings::default();
    let Some(search) = config.and_then(|c| c.search.as_ref()) else {
        return settings;
    };

    if let Some(weight) = search.inverse_document_frequency_weight {
        settings.inverse_document_frequency_weight = weight;
    }
    if let Some(weight) = search.term_frequency_weight {
        settings.term_frequency_weight = weight;
    }
    if let Some(weight) = search.term_deviation_weight {
        settings.term_deviation_weight = weight;
    }
    if let Some(flag) = search.wildcard_last_token {
        settings.wildcard_last_token = flag;
    }
    if let Some(flag) = search.wildcard_all_tokens {
        settings.wildcard_all_tokens = flag;
    }
    if let Some(flag) = search.require_match_for_all_tokens {
        settings.require_match_for_all_tokens = flag;
    }

    settings
}

/// Server URL for subcommands without their own config section.
pub fn default_server_url(config: &CliConfig) -> Option<String> {
    config.http.as_ref().and_then(|http| http.server_url.clone())
}

pub fn apply_search_config_defaults(config: &CliConfig, args: &mut SearchArgs) {
    if let Some(search) = &config.search {
        if matches!(args.format, OutputFormat::Text) {
            if let Some(format) = search.format {
                args.format = format;
            }
        }

        if args.limit.is_none() {
            args.limit = search.limit;
        }

        // Only fill the page size when paginating; otherwise a
        // configured per_page would silently turn every search into
        // page 1.
        if args.page.is_some() && args.per_page.is_none() {
            args.per_page = search.per_page;
        }

        if args.server.is_none() {
            args.server = search.server.clone().or_else(|| default_server_url(config));
        }

        if !args.no_server {
            if let Some(true) = search.no_server {
                args.no_server = true;
            }
        }
    } else if args.server.is_none() {
        args.server = default_server_url(config);
    }
}

pub fn apply_serve_config_defaults(config: &CliConfig, args: &mut ServeArgs) {
    if let Some(serve) = &config.serve {
        if args.addr == DEFAULT_SERVE_ADDR {
            if let Some(addr) = &serve.addr {
                args.addr = addr.clone();
            }
        }
    }
}
