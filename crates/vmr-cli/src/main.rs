//! VMR CLI: vault mutation router for markdown vaults
//!
//! Commands: init, index, watch, patch, delete, mkdir, tag, completions

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use vmr_core::config::{CONFIG_FILE, INDEX_FILE, STATE_DIR};
use vmr_core::{MetadataIndex, Status, Store, VaultConfig};
use vmr_index::TagIndex;
use vmr_router::{FrontmatterFieldPatcher, MutationEngine, RawRequest};
use vmr_vault::{FsVault, VaultEvent, VaultWatcher};

#[derive(Parser)]
#[command(name = "vmr")]
#[command(version)]
#[command(about = "Vault mutation router for markdown vaults")]
struct Cli {
    /// Vault root directory
    #[arg(long, global = true, env = "VMR_VAULT", default_value = ".")]
    vault: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Initialize a vault: write the default config and build the index
    Init {
        /// Vault root (defaults to --vault)
        path: Option<PathBuf>,
    },
    /// Rebuild the tag index from scratch
    Index,
    /// Keep the index current while files change on disk
    Watch,
    /// Send a patch request
    Patch {
        /// Vault path the request addresses
        path: String,
        /// Request attribute as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,
        /// Read the request body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
    /// Delete a file or directory (into the trash unless --permanent)
    #[command(alias = "rm")]
    Delete {
        path: String,
        /// Treat the path as a directory
        #[arg(long)]
        directory: bool,
        /// Skip the trash
        #[arg(long)]
        permanent: bool,
    },
    /// Create a directory and any missing parents
    Mkdir { path: String },
    /// Add, remove or rename tags
    Tag {
        #[command(subcommand)]
        action: TagCommand,
    },
    /// Print shell completions
    Completions { shell: clap_complete::Shell },
}

#[derive(clap::Subcommand)]
enum TagCommand {
    /// Add tags to one file
    Add {
        file: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove tags from one file
    Remove {
        file: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Rename a tag in every file that carries it
    Rename { old: String, new: String },
}

/// An opened vault with its index.
struct Workspace {
    vault: FsVault,
    index: TagIndex,
}

impl Workspace {
    /// Open the vault at `root`. A missing index database is created and
    /// filled before use.
    fn open(root: &Path) -> Result<Self> {
        let vault =
            FsVault::open(root).with_context(|| format!("cannot open vault {}", root.display()))?;
        let state = vault.root().join(STATE_DIR);
        std::fs::create_dir_all(&state)
            .with_context(|| format!("cannot create {}", state.display()))?;

        let db = state.join(INDEX_FILE);
        let fresh = !db.exists();
        let index = TagIndex::open(&db)?;
        if fresh {
            let indexed = index.rebuild(&vault, vault.config())?;
            debug!(files = indexed, "built missing index");
        }
        Ok(Self { vault, index })
    }

    fn execute(&self, request: &RawRequest) -> Result<ExitCode> {
        let engine = MutationEngine::new(
            &self.vault,
            &self.vault,
            &self.index,
            &FrontmatterFieldPatcher,
            self.vault.config(),
        );
        let response = engine.execute(request);
        print_json(&json!({
            "status": response.status_code(),
            "body": response.body,
        }))?;
        Ok(exit_code(response.status))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { path } => handle_init(path.as_deref().unwrap_or(cli.vault.as_path())),
        Commands::Index => handle_index(&cli.vault),
        Commands::Watch => handle_watch(&cli.vault),
        Commands::Patch {
            path,
            headers,
            body,
            body_file,
        } => {
            let mut request = RawRequest::patch(path);
            for raw in &headers {
                let (name, value) = parse_header(raw)?;
                request = request.header(name, value);
            }
            if let Some(file) = body_file {
                let bytes = std::fs::read(&file)
                    .with_context(|| format!("cannot read {}", file.display()))?;
                request = request.body(bytes);
            } else if let Some(text) = body {
                request = request.body(text);
            }
            Workspace::open(&cli.vault)?.execute(&request)
        }
        Commands::Delete {
            path,
            directory,
            permanent,
        } => {
            let mut request = RawRequest::delete(path);
            if directory {
                request = request.header("Target-Type", "directory");
            }
            if permanent {
                request = request.header("Permanent", "true");
            }
            Workspace::open(&cli.vault)?.execute(&request)
        }
        Commands::Mkdir { path } => {
            let request = RawRequest::patch(path)
                .header("Operation", "create")
                .header("Target-Type", "directory");
            Workspace::open(&cli.vault)?.execute(&request)
        }
        Commands::Tag { action } => {
            let request = match action {
                TagCommand::Add { file, tags } => tag_batch(file, "add", &tags),
                TagCommand::Remove { file, tags } => tag_batch(file, "remove", &tags),
                TagCommand::Rename { old, new } => RawRequest::patch(old)
                    .header("Operation", "rename")
                    .header("Target-Type", "tag")
                    .header("Target", new),
            };
            Workspace::open(&cli.vault)?.execute(&request)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vmr", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn handle_init(root: &Path) -> Result<ExitCode> {
    std::fs::create_dir_all(root).with_context(|| format!("cannot create {}", root.display()))?;
    let state = root.join(STATE_DIR);
    std::fs::create_dir_all(&state)?;

    let config_path = state.join(CONFIG_FILE);
    if !config_path.exists() {
        std::fs::write(&config_path, VaultConfig::default().to_toml()?)?;
    }

    let workspace = Workspace::open(root)?;
    let indexed = workspace
        .index
        .rebuild(&workspace.vault, workspace.vault.config())?;
    info!(files = indexed, "vault initialized");

    print_json(&json!({
        "message": "Initialized VMR vault",
        "root": workspace.vault.root().display().to_string(),
        "indexed": indexed,
    }))?;
    Ok(ExitCode::SUCCESS)
}

fn handle_index(root: &Path) -> Result<ExitCode> {
    let workspace = Workspace::open(root)?;
    let indexed = workspace
        .index
        .rebuild(&workspace.vault, workspace.vault.config())?;
    let tags: Vec<_> = workspace
        .index
        .tag_counts()?
        .into_iter()
        .map(|count| json!({"tag": count.tag, "files": count.files}))
        .collect();

    print_json(&json!({"indexed": indexed, "tags": tags}))?;
    Ok(ExitCode::SUCCESS)
}

fn handle_watch(root: &Path) -> Result<ExitCode> {
    let workspace = Workspace::open(root)?;
    let watcher = VaultWatcher::start(workspace.vault.root(), workspace.vault.config())?;
    eprintln!("Watching {} (Ctrl-C to stop)", workspace.vault.root().display());

    loop {
        let Some(event) = watcher.recv_timeout(Duration::from_secs(1)) else {
            continue;
        };
        let outcome = match &event {
            VaultEvent::Changed(path) => workspace
                .vault
                .read_to_string(path)
                .and_then(|content| workspace.index.refresh(path, &content)),
            VaultEvent::Removed(path) => workspace.index.forget(path),
        };
        match outcome {
            Ok(()) => info!(?event, "index updated"),
            Err(e) => warn!(?event, error = %e, "index update failed"),
        }
    }
}

fn tag_batch(file: String, operation: &str, tags: &[String]) -> RawRequest {
    RawRequest::patch(file)
        .header("Operation", operation)
        .header("Target-Type", "tag")
        .header("Content-Type", "application/json")
        .body(json!({ "tags": tags }).to_string())
}

/// Split `Name: value`.
fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header '{raw}' must look like 'Name: value'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header '{raw}' has an empty name");
    }
    Ok((name, value.trim()))
}

fn exit_code(status: Status) -> ExitCode {
    match status {
        Status::Ok => ExitCode::SUCCESS,
        Status::MultiStatus => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
