mod commands;
mod editor;
mod error;
mod graph;
mod parser;
mod tui;
mod workspace;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tkmap",
    version,
    about = "Draw city/relay maps as text and export them as ERB map scripts"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default tkmap.conf in the current directory
    Init {
        /// MAPID to store as the export default
        #[arg(long)]
        map_id: Option<String>,
    },
    /// Open the interactive map editor
    View {
        /// Text map to open (created on first save if missing)
        map: Option<PathBuf>,
        /// Start from an exported .erb script instead
        #[arg(long, value_name = "FILE")]
        import: Option<PathBuf>,
        /// Launch with a built-in sample map
        #[arg(long, conflicts_with_all = ["map", "import"])]
        demo: bool,
    },
    /// Export a text map as MAP_<MAPID>_<n>.erb
    Export {
        map: PathBuf,
        #[arg(long)]
        map_id: Option<String>,
        /// Directory to write into (defaults to export_dir from tkmap.conf)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Export even if relays still carry the default name
        #[arg(long, short)]
        yes: bool,
    },
    /// Rebuild the text map and node table from an .erb script
    Import {
        script: PathBuf,
        /// Write the map text here instead of printing it
        #[arg(long, value_name = "PATH")]
        text_out: Option<PathBuf>,
    },
    /// Report unnamed relays, isolated nodes and shared names (read-only)
    Check { file: PathBuf },
    /// List all routes in id order
    List { file: PathBuf },
    /// Open a text map in your editor
    Edit { map: PathBuf },
}

fn init_tracing(interactive: bool) {
    let filter = match std::env::var("TKMAP_LOG") {
        Ok(spec) => EnvFilter::new(spec),
        // Log lines would tear through the alternate screen.
        Err(_) if interactive => EnvFilter::new("off"),
        Err(_) => EnvFilter::new("warn"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Command::View { .. }));

    match cli.command {
        Command::Init { map_id } => commands::init::run(map_id),
        Command::View { map, import, demo } => commands::view::run(map, import, demo),
        Command::Export {
            map,
            map_id,
            out,
            yes,
        } => commands::export::run(
            &map,
            commands::export::ExportOptions {
                map_id,
                out_dir: out,
                yes,
            },
        ),
        Command::Import { script, text_out } => commands::import::run(&script, text_out.as_deref()),
        Command::Check { file } => commands::check::run(&file),
        Command::List { file } => commands::list::run(&file),
        Command::Edit { map } => commands::edit::run(&map),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn view_demo_conflicts_with_map() {
        let parsed = Cli::try_parse_from(["tkmap", "view", "map.txt", "--demo"]);
        let err = parsed.err().expect("expected clap parse error");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn export_accepts_options() {
        let cli = Cli::try_parse_from([
            "tkmap", "export", "map.txt", "--map-id", "EAST", "--out", "out", "-y",
        ])
        .expect("export flags should parse");
        match cli.command {
            Command::Export {
                map,
                map_id,
                out,
                yes,
            } => {
                assert_eq!(map, PathBuf::from("map.txt"));
                assert_eq!(map_id.as_deref(), Some("EAST"));
                assert_eq!(out, Some(PathBuf::from("out")));
                assert!(yes);
            }
            _ => panic!("expected export command"),
        }
    }

    #[test]
    fn view_map_is_optional() {
        let cli = Cli::try_parse_from(["tkmap", "view"]).expect("bare view should parse");
        assert!(matches!(
            cli.command,
            Command::View {
                map: None,
                import: None,
                demo: false
            }
        ));
    }
}
