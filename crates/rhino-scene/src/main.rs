//! rhino-to-figma: CLI for converting Rhino exports and dry-running the plugin

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rhino_scene::{convert, read_artifact, HttpSceneSource, MemoryCanvas, PluginMessage, Session};
use std::fs;
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "rhino-to-figma")]
#[command(about = "Translate Rhino JSON exports into Figma-ready scene nodes")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an export file into the /figma-ready.json document
    Convert {
        /// Input JSON file (Rhino export)
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON file
        #[arg(short, long, required_unless_present = "stdout")]
        output: Option<PathBuf>,

        /// Print the document to stdout instead of a file
        #[arg(long)]
        stdout: bool,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Pull from a running sync server and materialize into an in-memory canvas
    Pull {
        /// Sync server base URL
        #[arg(long, default_value = "http://localhost:4000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    match Args::parse().command {
        Command::Convert {
            input,
            output,
            stdout,
            pretty,
        } => {
            let json = read_artifact(&input)?;
            let assembly = convert(&json).with_context(|| format!("Failed to convert {:?}", input))?;
            for skipped in &assembly.skipped {
                eprintln!("skipped primitive {}: {}", skipped.index, skipped.reason);
            }

            let document = assembly.into_document(chrono::Utc::now());
            let text = if pretty {
                serde_json::to_string_pretty(&document)?
            } else {
                serde_json::to_string(&document)?
            };

            match output {
                Some(path) if !stdout => {
                    fs::write(&path, &text)
                        .with_context(|| format!("Failed to write output file: {:?}", path))?;
                    eprintln!("Wrote {} shapes to {:?}", document.metadata.total_shapes, path);
                }
                _ => println!("{}", text),
            }
        }
        Command::Pull { server } => {
            let (events_tx, mut events_rx) = mpsc::unbounded_channel();
            let (inbox_tx, inbox_rx) = mpsc::channel(4);
            let source = HttpSceneSource::new(&server)
                .with_context(|| format!("Failed to set up client for {}", server))?;
            let session = Session::new(MemoryCanvas::new(), source, events_tx);

            inbox_tx.send(PluginMessage::LoadData).await?;
            inbox_tx.send(PluginMessage::Close).await?;
            let canvas = session.run(inbox_rx).await;

            while let Ok(event) = events_rx.try_recv() {
                eprintln!("{}", serde_json::to_string(&event)?);
            }
            print!("{}", canvas.render_tree());
        }
    }

    Ok(())
}
