use anyhow::{anyhow, Result};
use clap::Parser;
use filter_dialects::{parse_filter, Dialect, FilterConfig};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Translate portable filter expressions into backend query syntax.
#[derive(Parser, Debug)]
#[command(name = "filterc", version)]
struct Cli {
    /// JSON file with per-dialect settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render a single dialect: document, graph, lucene, range or sql (overrides the config's default_dialect)
    #[arg(short, long)]
    dialect: Option<Dialect>,

    /// Print the parsed expression tree
    #[arg(long)]
    ast: bool,

    /// Filter to translate; starts an interactive session when omitted
    filter: Option<String>,
}

struct Session {
    config: FilterConfig,
    dialect: Option<Dialect>,
    show_ast: bool,
}

impl Session {
    /// Parses and renders one filter. Returns `false` when nothing could be rendered.
    fn translate(&self, text: &str) -> bool {
        let expression = match parse_filter(text) {
            Ok(expression) => expression,
            Err(err) => {
                eprintln!("{}", err.format_with_source(text));
                return false;
            }
        };

        if self.show_ast {
            println!("{expression:#?}");
        }

        let dialects = match self.dialect {
            Some(dialect) => vec![dialect],
            None => Dialect::ALL.to_vec(),
        };
        let mut rendered = 0;
        for dialect in dialects {
            match self.config.render(dialect, &expression) {
                Ok(output) if self.dialect.is_some() => {
                    println!("{output}");
                    rendered += 1;
                }
                Ok(output) => {
                    println!("{:>8}: {output}", dialect.name());
                    rendered += 1;
                }
                Err(err) => eprintln!("{:>8}: error: {err}", dialect.name()),
            }
        }
        rendered > 0
    }

    /// Handles a `:command`. Returns `false` to end the session.
    fn command(&mut self, command: &str) -> bool {
        let mut parts = command.split_whitespace();
        match parts.next() {
            Some("quit" | "q" | "exit") => return false,
            Some("ast") => {
                self.show_ast = !self.show_ast;
                println!("ast output {}", if self.show_ast { "on" } else { "off" });
            }
            Some("dialect") => match parts.next() {
                None | Some("all") => {
                    self.dialect = None;
                    println!("rendering every dialect");
                }
                Some(name) => match name.parse::<Dialect>() {
                    Ok(dialect) => {
                        self.dialect = Some(dialect);
                        println!("rendering {dialect}");
                    }
                    Err(err) => eprintln!("{err}"),
                },
            },
            Some("help") | None => print_help(),
            Some(other) => eprintln!("unknown command ':{other}', try :help"),
        }
        true
    }
}

fn print_help() {
    println!("Enter a filter such as  country == 'BG' && year >= 2020");
    println!("  :dialect NAME   render only NAME (document, graph, lucene, range, sql)");
    println!("  :dialect all    render every dialect");
    println!("  :ast            toggle printing of the expression tree");
    println!("  :quit           leave");
}

fn load_config(path: Option<&Path>) -> FilterConfig {
    let Some(path) = path else {
        return FilterConfig::default();
    };
    match FilterConfig::from_json_file(path) {
        Ok(config) => {
            info!(path = %path.display(), "loaded configuration");
            config
        }
        Err(err) => {
            warn!(error = %err, "using the default configuration");
            FilterConfig::default()
        }
    }
}

fn repl(session: &mut Session) -> Result<()> {
    let mut editor = DefaultEditor::new().map_err(|e| anyhow!("failed to initialize the line editor: {e}"))?;
    println!("filterc {} (:help for commands)", env!("CARGO_PKG_VERSION"));

    loop {
        match editor.readline("filter> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(err) = editor.add_history_entry(line) {
                    debug!(error = %err, "failed to record history entry");
                }
                match line.strip_prefix(':') {
                    Some(command) => {
                        if !session.command(command) {
                            break;
                        }
                    }
                    None => {
                        session.translate(line);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(anyhow!("failed to read input: {err}")),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    let mut session = Session {
        dialect: cli.dialect.or(config.default_dialect),
        config,
        show_ast: cli.ast,
    };

    match cli.filter {
        Some(filter) => {
            if !session.translate(&filter) {
                std::process::exit(1);
            }
            Ok(())
        }
        None => repl(&mut session),
    }
}
