use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use quire_common::telemetry::{self, TelemetryConfig};
use quire_editor_core::{CommandRegistry, DocumentStore, PlainEditor, Selection};
use quire_sync::persist::{DocumentClient, PersistError, SaveRequest};
use quire_sync::{Diff, DiffSegment, SessionIdentity};

mod config;
mod file_doc;
mod mirror;

use config::ClientConfig;
use file_doc::FileDocument;

#[derive(Parser)]
#[command(version, about = "Quire - live Markdown sync from the terminal", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the client config file
    #[arg(long, env = "QUIRE_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Relay server base URL, overrides the config file
    #[arg(long, env = "QUIRE_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a local file into a live editing session
    Edit {
        file: PathBuf,

        #[arg(long)]
        doc_id: i64,

        /// Document name, defaults to the file stem
        #[arg(long)]
        name: Option<String>,

        /// Keep the file as is instead of loading the stored document first
        #[arg(long)]
        local: bool,
    },
    /// Print the diff that turns one file into another
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Print the wire encoding
        #[arg(long)]
        json: bool,
    },
    /// Download a stored document
    Pull { doc_id: i64, file: PathBuf },
    /// Save a file as a stored document
    Push {
        doc_id: i64,
        file: PathBuf,

        /// Version the file was based on
        #[arg(long)]
        version: i64,

        /// Overwrite even if someone saved in between
        #[arg(long)]
        cover: bool,
    },
    /// Apply a formatting command to a character range of a file
    Format {
        file: PathBuf,

        /// Command name, `--list` shows them
        #[arg(required_unless_present = "list")]
        command: Option<String>,

        #[arg(long, default_value_t = 0)]
        start: usize,

        #[arg(long)]
        end: Option<usize>,

        #[arg(long)]
        list: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_miette();
    dotenvy::dotenv().ok();
    telemetry::init(TelemetryConfig::from_env("quire-cli").without_metrics());

    let cli = Cli::parse();
    let mut config = ClientConfig::load(cli.config.as_deref()).await?;
    if let Some(server) = cli.server {
        config.server = server;
    }

    match cli.command {
        Commands::Edit {
            file,
            doc_id,
            name,
            local,
        } => {
            let name = name.unwrap_or_else(|| file_stem(&file));
            let options = mirror::MirrorOptions {
                identity: SessionIdentity::new(name, doc_id),
                server: config.server_url().into_diagnostic()?,
                poll_interval: Duration::from_millis(config.poll_interval_ms.max(10)),
                local_only: local,
                file,
            };
            let stats = mirror::run(options).await?;
            println!(
                "✓ Session closed: {} sent, {} applied, {} warnings",
                stats.sent, stats.applied, stats.warnings
            );
        }
        Commands::Diff { old, new, json } => {
            let old = read(&old).await?;
            let new = read(&new).await?;
            let diff = quire_sync::encode(&old, &new);
            if json {
                println!("{}", serde_json::to_string_pretty(&diff).into_diagnostic()?);
            } else {
                print!("{}", describe(&diff));
            }
        }
        Commands::Pull { doc_id, file } => {
            let client = DocumentClient::new(config.server_url().into_diagnostic()?);
            let record = client.fetch(doc_id).await.into_diagnostic()?;
            tokio::fs::write(&file, &record.markdown)
                .await
                .into_diagnostic()?;
            println!(
                "✓ Pulled {} (version {}) to {}",
                record.doc_name,
                record.version,
                file.display()
            );
        }
        Commands::Push {
            doc_id,
            file,
            version,
            cover,
        } => {
            let client = DocumentClient::new(config.server_url().into_diagnostic()?);
            let request = SaveRequest {
                markdown: read(&file).await?,
                version,
                cover,
            };
            match client.save(doc_id, &request).await {
                Ok(saved) => println!("✓ Saved version {}", saved.version),
                Err(PersistError::Conflict { current_version }) => {
                    return Err(miette::miette!(
                        help = "pull the latest version, or push again with --cover",
                        "document {doc_id} was saved in the meantime (stored version {})",
                        current_version.map_or_else(|| "unknown".to_owned(), |v| v.to_string())
                    ));
                }
                Err(e) => return Err(e).into_diagnostic(),
            }
        }
        Commands::Format {
            file,
            command,
            start,
            end,
            list,
        } => {
            let registry = CommandRegistry::with_builtins();
            if list {
                for name in registry.names() {
                    println!("{name}");
                }
                return Ok(());
            }
            let command = command.unwrap_or_default();
            let mut document = FileDocument::open(&file).await.into_diagnostic()?;
            let (formatted, replacement) =
                format_range(&registry, &document.text(), &command, start, end)?;
            document.set_text(&formatted, false);
            document.flush().await.into_diagnostic()?;
            println!("✓ Applied {command} to {}: {replacement}", file.display());
        }
    }

    Ok(())
}

fn init_miette() {
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .context_lines(2)
                .build(),
        )
    }));
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_owned())
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| miette::miette!("could not read {}: {e}", path.display()))
}

/// One line per segment: `=` kept, `+` inserted, `-` deleted.
fn describe(diff: &Diff) -> String {
    let mut out = String::new();
    for segment in diff {
        let line = match segment {
            DiffSegment::Unchanged(n) => format!("= {n}\n"),
            DiffSegment::Inserted(text) => format!("+ {text:?}\n"),
            DiffSegment::Deleted(n) => format!("- {n}\n"),
        };
        out.push_str(&line);
    }
    out
}

/// Run a registry command over chars `start..end` of `text`, returning the
/// new text and the replacement.
fn format_range(
    registry: &CommandRegistry,
    text: &str,
    command: &str,
    start: usize,
    end: Option<usize>,
) -> Result<(String, String)> {
    let mut editor = PlainEditor::from_text(text);
    let end = end.unwrap_or(editor.len_chars());
    editor.set_selection(Some(Selection::new(start, end).clamped(editor.len_chars())));
    registry.activate(command, &mut editor).map_err(|e| {
        let known: Vec<_> = registry.names().collect();
        miette::miette!(help = format!("known commands: {}", known.join(", ")), "{e}")
    })?;
    let replacement = editor.selected_text().unwrap_or_default();
    Ok((editor.text(), replacement.to_string()))
}
