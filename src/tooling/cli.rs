//! CLI Tooling
//!
//! Read-only inspection of a local directory loaded as a tree.

use crate::config::{ArborConfig, ConfigLoader};
use crate::error::{ApiError, StorageError};
use crate::storage::{matches_ignore_pattern, LocalStorage, Storage};
use crate::container::fold_key;
use crate::tree::path::{absolute_path, normalize_node_path};
use crate::types::EntryId;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Arbor CLI - inspect directories as item/category trees
#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Inspect a directory as a path-addressed item/category tree")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Root directory to load
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Load configuration and fold the logging flags into it
    pub fn load_config(&self) -> Result<ArborConfig, ApiError> {
        let mut config = ConfigLoader::load(self.config.as_deref())?;
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the folder hierarchy below a path
    Tree {
        /// Folder path inside the storage
        #[arg(default_value = "/")]
        path: String,
    },
    /// List entries whose path matches a pattern (case-insensitive)
    Find {
        pattern: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show folder, file and size totals
    Stats,
    /// Print the content hash of a file
    Hash { path: String },
}

/// CLI execution context
pub struct CliContext {
    storage: LocalStorage,
}

impl CliContext {
    /// Load the storage rooted at `root`
    pub fn new(root: PathBuf, config: &ArborConfig) -> Result<Self, ApiError> {
        let storage = LocalStorage::open(&root, &config.storage)?;
        info!(
            root = %storage.name(),
            folders = storage.tree().node_count(),
            files = storage.tree().item_count(),
            "Loaded storage"
        );
        Ok(Self { storage })
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Execute a command and return its rendered output
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Tree { path } => self.render_tree(path),
            Commands::Find { pattern, format } => self.find(pattern, format),
            Commands::Stats => Ok(self.stats()),
            Commands::Hash { path } => {
                let tree = self.storage.tree();
                let item = tree
                    .find_item(&absolute_path(path))
                    .ok_or_else(|| StorageError::NotFound(path.clone()))?;
                Ok(format!("{}  {}", self.storage.file_hash(item)?, tree.item(item)?.path()))
            }
        }
    }

    fn render_tree(&self, path: &str) -> Result<String, ApiError> {
        let tree = self.storage.tree();
        let start = tree
            .find_node(&normalize_node_path(&absolute_path(path)))
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        let base_depth = tree.node(start)?.depth();

        let mut out = format!("{}\n", tree.node(start)?.path());
        for entry in tree.descendants(start)? {
            let line = match entry {
                EntryId::Node(id) => {
                    let node = tree.node(id)?;
                    format!("{}{}/", "  ".repeat(node.depth() - base_depth), node.name())
                }
                EntryId::Item(id) => {
                    let item = tree.item(id)?;
                    let depth = match item.category() {
                        Some(category) => tree.node(category)?.depth() + 1 - base_depth,
                        None => 0,
                    };
                    format!("{}{}", "  ".repeat(depth), item.name())
                }
            };
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    fn find(&self, pattern: &str, format: &str) -> Result<String, ApiError> {
        let tree = self.storage.tree();
        let pattern = fold_key(pattern);
        let matches = |path: &str| {
            let folded = fold_key(path);
            matches_ignore_pattern(folded.trim_start_matches('/'), &pattern)
                || folded.contains(&pattern)
        };

        let mut found: Vec<String> = Vec::new();
        for id in tree.nodes() {
            let path = tree.node(id)?.path();
            if matches(path) {
                found.push(path.to_string());
            }
        }
        for id in tree.items() {
            let path = tree.item(id)?.path();
            if matches(path) {
                found.push(path.to_string());
            }
        }
        found.sort();

        match format {
            "json" => Ok(json!({ "matches": found }).to_string()),
            "text" => Ok(found.join("\n")),
            other => Err(ApiError::ConfigError(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    fn stats(&self) -> String {
        let tree = self.storage.tree();
        let ids = tree.items();
        let total_bytes: u64 = ids
            .iter()
            .filter_map(|id| tree.item(*id).ok())
            .map(|item| item.payload().size)
            .sum();
        let max_depth = tree
            .nodes()
            .into_iter()
            .filter_map(|id| tree.node(id).ok().map(|n| n.depth()))
            .max()
            .unwrap_or(0);

        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Root", "Folders", "Files", "Bytes", "Depth"]);
        table.add_row(vec![
            self.storage.name().to_string(),
            tree.node_count().to_string(),
            ids.len().to_string(),
            total_bytes.to_string(),
            max_depth.to_string(),
        ]);
        format!("{}", table)
    }
}
