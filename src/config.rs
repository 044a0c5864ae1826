//! Runtime configuration, assembled from CLI flags. See SPEC_FULL.md §4.8.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::cli::Cli;

/// Resolved supervisor configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub apps_dir: PathBuf,
    pub extension: String,
    pub default_interpreter: String,
    pub interpreter_overrides: HashMap<String, String>,
    pub log_file: Option<PathBuf>,
    pub use_color: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut interpreter_overrides = HashMap::new();
        for spec in &cli.interpreter_for {
            if let Some((name, interpreter)) = spec.split_once('=') {
                interpreter_overrides.insert(name.to_string(), interpreter.to_string());
            }
        }

        Self {
            apps_dir: cli.apps_dir.clone(),
            extension: cli.extension.clone(),
            default_interpreter: cli.interpreter.clone(),
            interpreter_overrides,
            log_file: cli.log_file.clone(),
            use_color: !cli.no_color,
        }
    }

    /// The interpreter binary to launch `child_name` with: a per-child
    /// override if configured, otherwise the global default (spec.md §6,
    /// "chosen per-child or globally configurable").
    pub fn interpreter_for(&self, child_name: &str) -> &str {
        self.interpreter_overrides
            .get(child_name)
            .map(|s| s.as_str())
            .unwrap_or(&self.default_interpreter)
    }

    /// Build the argv for launching `path` under the configured
    /// interpreter: `argv[0]` is the interpreter, `argv[1]` is the
    /// program path (spec.md §6).
    pub fn argv_for(&self, child_name: &str, path: &std::path::Path) -> Vec<String> {
        vec![
            self.interpreter_for(child_name).to_string(),
            path.to_string_lossy().into_owned(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["duckymux"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn default_interpreter_used_without_override() {
        let cfg = Config::from_cli(&cli(&[]));
        assert_eq!(cfg.interpreter_for("anything.py"), "python3");
    }

    #[test]
    fn per_child_override_takes_precedence() {
        let cfg = Config::from_cli(&cli(&["--interpreter-for", "weird.rb=ruby"]));
        assert_eq!(cfg.interpreter_for("weird.rb"), "ruby");
        assert_eq!(cfg.interpreter_for("other.py"), "python3");
    }

    #[test]
    fn argv_layout_matches_interpreter_then_path() {
        let cfg = Config::from_cli(&cli(&[]));
        let argv = cfg.argv_for("hello.py", std::path::Path::new("apps/hello.py"));
        assert_eq!(argv, vec!["python3".to_string(), "apps/hello.py".to_string()]);
    }
}
