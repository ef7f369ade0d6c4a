//! File scanner for discovering and reading source files.
//!
//! Respects configured extensions, exclude patterns, a per-file size
//! limit, and a cap on the number of files.

use crate::config::CodeConfig;
use anyhow::{bail, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["rs", "py", "md"])
    pub extensions: Vec<String>,
    /// Names or `*.suffix` patterns to exclude
    pub excludes: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: usize,
    /// Maximum number of files to return
    pub max_files: usize,
}

fn default_extensions() -> Vec<String> {
    vec![
        "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "c", "cpp", "h", "hpp", "cs", "rb",
        "php", "swift", "kt", "scala", "vue", "svelte", "md", "toml", "yaml", "yml", "json",
        "sh", "sql",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excludes() -> Vec<String> {
    vec![
        ".git",
        "target",
        "node_modules",
        "vendor",
        "dist",
        "build",
        "__pycache__",
        ".venv",
        "venv",
        "*.min.js",
        "*.min.css",
        "package-lock.json",
        "Cargo.lock",
        "yarn.lock",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            excludes: default_excludes(),
            max_file_size: 100 * 1024, // 100KB
            max_files: 200,
        }
    }
}

impl From<&CodeConfig> for ScanConfig {
    fn from(config: &CodeConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .clone()
                .unwrap_or_else(default_extensions)
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            excludes: config.excludes.clone().unwrap_or_else(default_excludes),
            max_file_size: config.max_file_size,
            max_files: config.max_files,
        }
    }
}

/// A source file with its content.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Relative path from the root, with `/` separators
    pub path: String,
    /// File size in bytes
    pub size: u64,
    pub content: String,
}

impl ScannedFile {
    /// Fence language for the file's extension.
    pub fn language_hint(&self) -> &'static str {
        let ext = Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        match ext {
            "rs" => "rust",
            "py" => "python",
            "js" | "jsx" => "javascript",
            "ts" | "tsx" => "typescript",
            "go" => "go",
            "java" => "java",
            "c" | "h" => "c",
            "cpp" | "hpp" => "cpp",
            "cs" => "csharp",
            "rb" => "ruby",
            "php" => "php",
            "swift" => "swift",
            "kt" => "kotlin",
            "scala" => "scala",
            "md" => "markdown",
            "toml" => "toml",
            "yaml" | "yml" => "yaml",
            "json" => "json",
            "sh" => "bash",
            "sql" => "sql",
            _ => "",
        }
    }
}

/// File scanner for discovering source files.
pub struct FileScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Read every matching file, in path order, up to `max_files`.
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        if !self.root.is_dir() {
            bail!("Not a directory: {}", self.root.display());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded_entry(entry));

        for entry in walker {
            if files.len() >= self.config.max_files {
                debug!("Reached max_files limit ({})", self.config.max_files);
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(_) => continue,
            };
            if size > self.config.max_file_size as u64 {
                debug!("Skipping large file {} ({} bytes)", entry.path().display(), size);
                continue;
            }

            match fs::read_to_string(entry.path()) {
                Ok(content) => files.push(ScannedFile {
                    path: self.relative(entry.path()),
                    size,
                    content,
                }),
                Err(e) => warn!("Failed to read {}: {}", entry.path().display(), e),
            }
        }

        Ok(files)
    }

    /// Check if a file's extension is included.
    pub fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config.extensions.iter().any(|e| e == ext)
    }

    fn is_excluded_entry(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        self.is_excluded(&name)
    }

    /// Hidden names, exact names, and `*.suffix` patterns are excluded.
    fn is_excluded(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| {
            match pattern.strip_prefix('*') {
                Some(suffix) => name.ends_with(suffix),
                None => name == pattern,
            }
        })
    }

    fn relative(&self, path: &Path) -> String {
        let rel_path = path.strip_prefix(&self.root).unwrap_or(path);
        rel_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
