//! Getting a repository onto disk: shallow git clones or local directories.

use anyhow::{bail, Context, Result};
use git2::{FetchOptions, Progress, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// A repository on disk. Clones live in a temporary directory that is
/// removed when the checkout is dropped.
pub struct Checkout {
    path: PathBuf,
    _temp_dir: Option<TempDir>,
}

impl Checkout {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Use an existing directory as is.
    pub fn local(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            bail!("Local path is not a directory: {}", path.display());
        }
        info!("Using local directory: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            _temp_dir: None,
        })
    }
}

/// Options for cloning a repository.
#[derive(Debug, Clone)]
pub struct CloneOptions {
    /// Branch to check out (None for the default branch).
    pub branch: Option<String>,
    /// Depth for a shallow clone (None for a full clone).
    pub depth: Option<i32>,
    pub show_progress: bool,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            branch: None,
            depth: Some(1),
            show_progress: true,
        }
    }
}

/// Clone `url` into a fresh temporary directory.
pub fn clone_repository(url: &str, options: &CloneOptions) -> Result<Checkout> {
    info!("Cloning repository: {}", url);

    let temp = TempDir::new().context("Failed to create temporary directory")?;
    let path = temp.path().to_path_buf();
    debug!("Clone target: {}", path.display());

    let progress_bar = options.show_progress.then(|| {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} objects")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    });

    let mut callbacks = RemoteCallbacks::new();
    let pb = progress_bar.clone();
    callbacks.transfer_progress(move |progress: Progress<'_>| {
        if let Some(ref pb) = pb {
            pb.set_length(progress.total_objects() as u64);
            pb.set_position(progress.received_objects() as u64);
        }
        true
    });

    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(callbacks);
    if let Some(depth) = options.depth {
        fetch_opts.depth(depth);
    }

    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch_opts);
    if let Some(ref branch) = options.branch {
        builder.branch(branch);
    }

    builder
        .clone(url, &path)
        .with_context(|| format!("Failed to clone repository: {}", url))?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }
    info!("Cloned {} to {}", url, path.display());

    Ok(Checkout {
        path,
        _temp_dir: Some(temp),
    })
}

/// True for `https://` and `git@` repository addresses.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("https://") || source.starts_with("git@")
}

/// Clone a remote repository or open a local directory.
pub async fn checkout(source: &str, branch: Option<String>, show_progress: bool) -> Result<Checkout> {
    if !is_remote(source) {
        return Checkout::local(Path::new(source));
    }

    let url = source.to_string();
    let options = CloneOptions {
        branch,
        show_progress,
        ..CloneOptions::default()
    };
    tokio::task::spawn_blocking(move || clone_repository(&url, &options))
        .await
        .context("Clone task panicked")?
}

/// Short name for a repository: the last path segment without `.git`.
pub fn repo_name(source: &str) -> String {
    let trimmed = source.trim_end_matches('/').trim_end_matches(".git");
    let name = trimmed
        .rsplit(['/', ':', '\\'])
        .find(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("repo");
    name.to_string()
}
