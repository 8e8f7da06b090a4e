use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use fathom_core::{FathomConfig, FileNode, OutputFormat};
use fathom_enrich::llm::LlmClient;
use fathom_enrich::schema::ParameterDescription;
use fathom_enrich::{ConstructRecord, EnrichmentStatus, Session};
use fathom_repo::cache::DocumentStore;
use fathom_repo::github::GitHubHost;
use fathom_repo::host::parse_repository_url;
use fathom_repo::store::{MemoryStore, SqliteStore};

#[derive(Parser)]
#[command(
    name = "fathom",
    version,
    about = "Explain the functions and classes of a GitHub repository",
    long_about = "Fathom browses a GitHub repository, finds the functions, classes, methods\n\
                   and hooks in a JavaScript or TypeScript file, and asks an LLM to explain each one.\n\n\
                   Examples:\n  \
                     fathom tree octocat/hello-world              Show the repository tree\n  \
                     fathom analyze octocat/hello-world src/app.js  Explain every construct in a file\n  \
                     fathom init                                  Create a .fathom.toml config file"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .fathom.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Bypass the on-disk cache for this run
    #[arg(long, global = true)]
    no_cache: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Print the file tree of a repository
    #[command(long_about = "Print the file tree of a repository.\n\n\
        Tries the declared default branch, then main, master, development and dev.\n\
        Listings are cached for 24 hours.\n\n\
        Examples:\n  fathom tree octocat/hello-world\n  fathom tree https://github.com/octocat/hello-world --format json")]
    Tree {
        /// Repository (`owner/repo` or a github.com URL)
        repo: String,
    },
    /// Explain every construct in one file
    #[command(long_about = "Explain every construct in one file.\n\n\
        Extracts functions, classes, methods, accessors and hook bindings, then asks the\n\
        configured LLM to describe each one. Files with unsupported extensions yield nothing.\n\n\
        Examples:\n  fathom analyze octocat/hello-world src/index.js\n  fathom analyze owner/repo src/App.tsx --format markdown")]
    Analyze {
        /// Repository (`owner/repo` or a github.com URL)
        repo: String,
        /// Path of the file inside the repository
        path: String,
    },
    /// Create a default .fathom.toml in the current directory
    Init,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

const DEFAULT_CONFIG: &str = r#"# Fathom configuration
# See: https://github.com/Meru143/fathom

[llm]
provider = "openai"   # "openai", "gemini", or any OpenAI-compatible server
model = "gpt-4o"
# api_key = "sk-..."  # Or set OPENAI_API_KEY / GEMINI_API_KEY / ANTHROPIC_API_KEY
# base_url = "http://localhost:11434"  # OpenAI-compatible endpoint (Ollama, vLLM, ...)
max_source_chars = 6000

[github]
# token = "ghp_..."   # Or set GITHUB_TOKEN
api_url = "https://api.github.com"

[cache]
enabled = true
path = ".fathom/cache.db"

[analysis]
extensions = ["js", "jsx", "ts", "tsx", "mjs", "cjs"]
strategy = "auto"     # "auto", "syntax-tree" or "patterns"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };
    init_tracing(cli.verbose, use_color);

    let mut config = match &cli.config {
        Some(path) => FathomConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".fathom.toml");
            if default_path.exists() {
                FathomConfig::from_file(default_path)?
            } else {
                FathomConfig::default()
            }
        }
    };
    config.apply_env();

    match cli.command {
        None => {
            Cli::command().print_help().into_diagnostic()?;
        }
        Some(Command::Tree { repo }) => {
            let (owner, name) = parse_repository_url(&repo)?;
            let mut session = open_session(&config, cli.no_cache)?;
            let nodes = session.load_repository(&owner, &name).await?;
            print_tree(&nodes, cli.format, use_color)?;
        }
        Some(Command::Analyze { repo, path }) => {
            if config.llm.api_key.is_none() && config.llm.base_url.is_none() {
                miette::bail!(
                    help = format!(
                        "set {} or add api_key under [llm] in .fathom.toml",
                        config.llm.api_key_env_var()
                    ),
                    "no API key configured for LLM provider '{}'",
                    config.llm.provider
                );
            }
            let (owner, name) = parse_repository_url(&repo)?;
            let mut session = open_session(&config, cli.no_cache)?;
            session.load_repository(&owner, &name).await?;

            let spinner = if std::io::stderr().is_terminal() {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .into_diagnostic()?,
                );
                pb.set_message(format!("Analyzing {path}..."));
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let records = session.select_file(&path).await.inspect_err(|_e| {
                if let Some(pb) = &spinner {
                    pb.finish_with_message("Failed");
                }
            })?;
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            print_records(&records, &path, cli.format, use_color)?;
        }
        Some(Command::Init) => {
            let path = Path::new(".fathom.toml");
            if path.exists() {
                miette::bail!(".fathom.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .fathom.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "fathom", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, use_color: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(use_color)
        .with_target(false)
        .init();
}

fn open_session(config: &FathomConfig, no_cache: bool) -> Result<Session> {
    let host = Arc::new(GitHubHost::new(&config.github)?);
    let generator = Arc::new(LlmClient::new(&config.llm)?);

    let store: Arc<dyn DocumentStore> = if config.cache.enabled && !no_cache {
        match SqliteStore::open(&config.cache.path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(path = %config.cache.path.display(), error = %e, "cache unavailable, continuing without it");
                Arc::new(MemoryStore::new())
            }
        }
    } else {
        Arc::new(MemoryStore::new())
    };

    Ok(Session::new(host, store, generator, config))
}

fn print_tree(nodes: &[FileNode], format: OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(nodes).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            let mut out = String::new();
            write_markdown_tree(&mut out, nodes);
            print!("{out}");
        }
        OutputFormat::Text => {
            let mut out = String::new();
            write_text_tree(&mut out, nodes, use_color);
            print!("{out}");
            let files: usize = nodes.iter().map(FileNode::file_count).sum();
            println!("\n{files} files");
        }
    }
    Ok(())
}

/// Depth-first, in sibling order, paired with each node's depth.
fn flatten(nodes: &[FileNode]) -> Vec<(&FileNode, usize)> {
    let mut out = Vec::new();
    let mut pending: Vec<(&FileNode, usize)> = nodes.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = pending.pop() {
        out.push((node, depth));
        pending.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    out
}

fn write_text_tree(out: &mut String, nodes: &[FileNode], use_color: bool) {
    for (node, depth) in flatten(nodes) {
        let indent = "  ".repeat(depth);
        if node.is_file() {
            out.push_str(&format!("{indent}{}\n", node.name));
        } else if use_color {
            out.push_str(&format!("{indent}\x1b[1m\x1b[34m{}/\x1b[0m\n", node.name));
        } else {
            out.push_str(&format!("{indent}{}/\n", node.name));
        }
    }
}

fn write_markdown_tree(out: &mut String, nodes: &[FileNode]) {
    for (node, depth) in flatten(nodes) {
        let indent = "  ".repeat(depth);
        if node.is_file() {
            out.push_str(&format!("{indent}- `{}`\n", node.name));
        } else {
            out.push_str(&format!("{indent}- **{}/**\n", node.name));
        }
    }
}

fn parameter_text(param: &ParameterDescription) -> String {
    match param {
        ParameterDescription::Text(text) => text.clone(),
        ParameterDescription::Detailed {
            name,
            type_name: Some(type_name),
            description,
        } => format!("{name} ({type_name}): {description}"),
        ParameterDescription::Detailed {
            name, description, ..
        } => format!("{name}: {description}"),
    }
}

fn print_records(
    records: &[ConstructRecord],
    path: &str,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# {path}\n");
            if records.is_empty() {
                println!("No analyzable constructs.");
            }
            for record in records {
                println!("## `{}` ({})\n", record.name, record.type_name);
                println!("{}\n", record.description);
                if !record.parameters.is_empty() {
                    println!("**Parameters:**\n");
                    for param in &record.parameters {
                        println!("- {}", parameter_text(param));
                    }
                    println!();
                }
                println!("**Returns:** {}\n", record.return_description);
                let deps = &record.dependencies;
                if !deps.is_empty() {
                    let quoted = |names: &[String]| {
                        names.iter().map(|n| format!("`{n}`")).collect::<Vec<_>>().join(", ")
                    };
                    if !deps.imports.is_empty() {
                        println!("**Imports:** {}", quoted(&deps.imports));
                    }
                    if !deps.internal_calls.is_empty() {
                        println!("**Calls:** {}", quoted(&deps.internal_calls));
                    }
                    println!();
                }
            }
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No analyzable constructs in {path}.");
                return Ok(());
            }
            for record in records {
                let title = format!("{} [{}]", record.name, record.type_name);
                if use_color {
                    let color = if record.is_error() { "31" } else { "36" };
                    println!("\x1b[1m\x1b[{color}m{title}\x1b[0m");
                } else {
                    println!("{title}");
                }
                println!("  {}", record.description);
                for param in &record.parameters {
                    println!("  param: {}", parameter_text(param));
                }
                println!("  returns: {}", record.return_description);
                if let Some(parent) = &record.superclass {
                    println!("  extends: {parent}");
                }
                if !record.members.is_empty() {
                    println!("  members: {}", record.members.join(", "));
                }
                if !record.dependencies.internal_calls.is_empty() {
                    println!("  calls: {}", record.dependencies.internal_calls.join(", "));
                }
                if let EnrichmentStatus::Degraded { reason } = &record.status {
                    println!("  (enrichment degraded: {reason})");
                }
                println!();
            }
            let degraded = records
                .iter()
                .filter(|r| matches!(r.status, EnrichmentStatus::Degraded { .. }))
                .count();
            println!("{} constructs, {degraded} degraded", records.len());
        }
    }
    Ok(())
}
