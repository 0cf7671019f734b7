mod commands;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use driftmark::diagnostics;
use driftmark::orphan::REPORT_MIN_CONFIDENCE;

use crate::commands::Format;

#[derive(Parser)]
#[command(name = "driftmark", about = "Line anchors for code annotations that follow your edits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log reconciliation decisions to stderr
    #[arg(global = true, long, short)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify every marker, auto-fix drift, and write fixes back
    Check {
        /// Output format
        #[arg(default_value = "text", long, value_enum)]
        format: Format,
    },
    /// Bind annotations to a line of a file
    Mark {
        /// Annotation ids to bind
        #[arg(index = 3, required = true)]
        annotations: Vec<String>,
        /// Last line, for a range marker
        #[arg(long)]
        end: Option<u32>,
        /// Tracked file, relative to the project root
        #[arg(index = 1)]
        file: PathBuf,
        /// Line to mark (1-based)
        #[arg(index = 2)]
        line: u32,
    },
    /// List annotations whose code was deleted or changed
    Orphans {
        /// Output format
        #[arg(default_value = "text", long, value_enum)]
        format: Format,
        /// Hide orphans below this confidence (0-100)
        #[arg(default_value_t = REPORT_MIN_CONFIDENCE, long)]
        min_confidence: u8,
    },
    /// Print the symbol outline used for anchoring
    Outline {
        /// Source file
        file: PathBuf,
    },
    /// Move a marker to a new line
    Reanchor {
        /// Last line, for a range marker
        #[arg(long)]
        end: Option<u32>,
        /// Tracked file
        #[arg(index = 1)]
        file: PathBuf,
        /// New line (1-based)
        #[arg(index = 3)]
        line: u32,
        /// Marker id, as `m3` or `3`
        #[arg(index = 2)]
        marker: String,
    },
    /// Remove an annotation from every marker
    Unmark {
        /// Annotation id
        annotation: String,
    },
    /// Track edits and re-verify markers as files change
    Watch {
        /// Output format
        #[arg(default_value = "text", long, value_enum)]
        format: Format,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Check { format } => commands::check(format),
        Commands::Mark { annotations, end, file, line } => {
            commands::mark(&file, line, end, &annotations).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Orphans { format, min_confidence } => commands::orphans(format, min_confidence),
        Commands::Outline { file } => commands::outline(&file).map(|()| return ExitCode::SUCCESS),
        Commands::Reanchor { end, file, line, marker } => {
            commands::reanchor(&file, &marker, line, end).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Unmark { annotation } => commands::unmark(&annotation).map(|()| return ExitCode::SUCCESS),
        Commands::Watch { format } => watch::run(format),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3_u8)
        },
    };
}

/// Install the stderr log subscriber. `--verbose` shows debug events.
fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).with_writer(std::io::stderr).init();
}
