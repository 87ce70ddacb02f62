//! Command-line surface over the playground.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use crate::app::analysis::{AnalysisPipeline, AnalysisRequest, ImprovementRequest};
use crate::app::playground::Playground;
use crate::app::session::SessionStore;
use crate::domain::model::{Fragment, SourceBundle};
use crate::infra::backend::OpenAiBackend;
use crate::infra::config::Config;
use crate::infra::logging::{self, LogStyle};
use crate::ui::console;
use crate::ui::notify::Notification;

#[derive(Debug, Parser)]
#[command(
    name = "webweaver",
    author,
    version,
    about = "Compose, run, and critique HTML/CSS/JavaScript playground fragments"
)]
pub struct Cli {
    /// Increase diagnostic output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Render diagnostics as an indented span tree.
    #[arg(long, global = true)]
    log_tree: bool,
    /// Extra config file layered over user and workspace config.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the composed preview document.
    Compose {
        #[command(flatten)]
        sources: SourceArgs,
        /// Write the document to a file instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Load the preview and re-run the script, printing its console output.
    Run {
        #[command(flatten)]
        sources: SourceArgs,
        /// Run without capturing; a thrown error fails the command.
        #[arg(long)]
        raw: bool,
        /// Print the captured lines as JSON.
        #[arg(long, conflicts_with = "raw")]
        json: bool,
    },
    /// Ask the backend for errors in the fragments.
    DetectErrors {
        #[command(flatten)]
        sources: SourceArgs,
        #[arg(long)]
        json: bool,
    },
    /// Ask the backend for improvement suggestions.
    Improve {
        #[command(flatten)]
        sources: SourceArgs,
        #[arg(long)]
        json: bool,
    },
    /// Replace one fragment of the saved session from a file ("-" reads stdin).
    Set { fragment: Fragment, file: PathBuf },
    /// Print one fragment of the saved session.
    Show { fragment: Fragment },
    /// Empty all fragments of the saved session.
    Clear,
    /// Generate shell completions.
    Completions { shell: Shell },
}

/// Fragment files overriding the saved session for one invocation.
#[derive(Debug, Args)]
struct SourceArgs {
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    css: Option<PathBuf>,
    #[arg(long = "js", value_name = "FILE")]
    javascript: Option<PathBuf>,
    /// Persist the resulting fragments as the new session.
    #[arg(long)]
    save: bool,
}

impl SourceArgs {
    fn resolve(&self, store: &SessionStore) -> Result<SourceBundle> {
        let mut bundle = store.load_bundle_or_starter()?;
        let overrides = [
            (Fragment::Html, &self.html),
            (Fragment::Css, &self.css),
            (Fragment::Javascript, &self.javascript),
        ];
        for (fragment, path) in overrides {
            if let Some(path) = path {
                bundle.set(fragment, read_source(path)?);
            }
        }
        if self.save {
            store.save(&bundle)?;
        }
        Ok(bundle)
    }
}

impl Cli {
    pub fn init_logging(&self) {
        let style = if self.log_tree {
            LogStyle::Tree
        } else {
            LogStyle::Compact
        };
        logging::init(self.verbose, style);
    }

    /// Execute the selected command.
    pub fn run(self) -> Result<ExitCode> {
        let config = match &self.config {
            Some(path) => Config::load_with_override(path)?,
            None => Config::load()?,
        };
        let root = std::env::current_dir().context("unable to determine working directory")?;
        let store = SessionStore::new(root);
        let mut stdout = io::stdout().lock();

        match self.command {
            Command::Compose { sources, output } => {
                let playground = Playground::new(sources.resolve(&store)?, config.sandbox);
                let document = playground.document().as_str();
                match output {
                    Some(path) => fs::write(&path, document).with_context(|| {
                        format!("failed to write document to {}", path.display())
                    })?,
                    None => stdout.write_all(document.as_bytes())?,
                }
            }
            Command::Run { sources, raw, json } => {
                let mut playground = Playground::new(sources.resolve(&store)?, config.sandbox);
                if raw {
                    if let Err(err) = playground.run() {
                        eprintln!("{}", Notification::failure(&err));
                        return Ok(ExitCode::FAILURE);
                    }
                    return Ok(ExitCode::SUCCESS);
                }
                let log = match playground.capture() {
                    Ok(log) => log,
                    Err(err) => {
                        eprintln!("{}", Notification::failure(&err));
                        return Ok(ExitCode::FAILURE);
                    }
                };
                if json {
                    print_json(&mut stdout, &log)?;
                } else {
                    console::write_log(&log, config.console.show_channel(), &mut stdout)?;
                }
            }
            Command::DetectErrors { sources, json } => {
                let bundle = sources.resolve(&store)?;
                let pipeline = AnalysisPipeline::new(OpenAiBackend::from_config(&config.backend)?)?;
                let runtime = async_runtime()?;
                let request = AnalysisRequest::from(&bundle);
                match runtime.block_on(pipeline.analyze_errors(&request)) {
                    Ok(report) if json => print_json(&mut stdout, &report)?,
                    Ok(report) => writeln!(stdout, "{}", Notification::error_report(&report))?,
                    Err(err) => {
                        eprintln!("{}", Notification::failure(&err));
                        return Ok(ExitCode::FAILURE);
                    }
                }
            }
            Command::Improve { sources, json } => {
                let bundle = sources.resolve(&store)?;
                let pipeline = AnalysisPipeline::new(OpenAiBackend::from_config(&config.backend)?)?;
                let runtime = async_runtime()?;
                let request = ImprovementRequest::from(&bundle);
                match runtime.block_on(pipeline.analyze_improvements(&request)) {
                    Ok(report) if json => print_json(&mut stdout, &report)?,
                    Ok(report) => writeln!(stdout, "{}", Notification::improvement(&report))?,
                    Err(err) => {
                        eprintln!("{}", Notification::failure(&err));
                        return Ok(ExitCode::FAILURE);
                    }
                }
            }
            Command::Set { fragment, file } => {
                let mut bundle = store.load_bundle_or_starter()?;
                bundle.set(fragment, read_source(&file)?);
                store.save(&bundle)?;
            }
            Command::Show { fragment } => {
                let bundle = store.load_bundle_or_starter()?;
                writeln!(stdout, "{}", bundle.get(fragment))?;
            }
            Command::Clear => {
                store.save(&SourceBundle::default())?;
            }
            Command::Completions { shell } => {
                clap_complete::generate(shell, &mut Cli::command(), "webweaver", &mut stdout);
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read fragment from stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path)
        .with_context(|| format!("failed to read fragment from {}", path.display()))
}

fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize output")?;
    writeln!(out)?;
    Ok(())
}

fn async_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn js_flag_maps_to_script_fragment() {
        let cli = Cli::try_parse_from(["webweaver", "run", "--js", "app.js", "--json"]).unwrap();
        match cli.command {
            Command::Run { sources, raw, json } => {
                assert_eq!(sources.javascript, Some(PathBuf::from("app.js")));
                assert!(!raw);
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn fragment_names_accept_js_alias() {
        let cli = Cli::try_parse_from(["webweaver", "show", "js"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Show {
                fragment: Fragment::Javascript
            }
        ));
    }

    #[test]
    fn fragment_names_accept_long_aliases() {
        let cli = Cli::try_parse_from(["webweaver", "show", "markup"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Show {
                fragment: Fragment::Html
            }
        ));

        let cli = Cli::try_parse_from(["webweaver", "set", "stylesheet", "-"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Set {
                fragment: Fragment::Css,
                ..
            }
        ));
    }
}
