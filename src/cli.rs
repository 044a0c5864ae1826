use std::path::PathBuf;

use clap::Parser;

/// An interactive PTY-multiplexing supervisor for scripts in `apps/`.
#[derive(Parser, Debug)]
#[command(name = "duckymux", about = "PTY-multiplexing subprocess supervisor")]
pub struct Cli {
    /// Directory to discover child programs in.
    #[arg(long, default_value = "apps")]
    pub apps_dir: PathBuf,

    /// File extension (including the dot) a discovered child must have.
    #[arg(long, default_value = ".py")]
    pub extension: String,

    /// Interpreter binary used to launch every discovered child, resolved
    /// against PATH, unless overridden per-child with `--interpreter-for`.
    #[arg(long, default_value = "python3")]
    pub interpreter: String,

    /// Per-child interpreter override: `NAME=INTERPRETER`. Repeatable.
    #[arg(long = "interpreter-for", value_name = "NAME=INTERPRETER")]
    pub interpreter_for: Vec<String>,

    /// Write diagnostics to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Disable the highlight/status color pair in the child list.
    #[arg(long)]
    pub no_color: bool,
}
