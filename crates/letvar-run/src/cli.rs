use clap::CommandFactory;
use clap::{Parser, Subcommand};
use itertools::Itertools;
use letvar_lang::{Config, Request, Status};
use miette::IntoDiagnostic;
use miette::miette;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::{fs, path::Path, path::PathBuf};

#[derive(Parser, Debug)]
#[command(name = "letvar")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "Examples:\n\n\
    To print every derived variable:\n\
    $ letvar --var uri=/img/logo.png vars.conf\n\n\
    To print selected variables as JSON:\n\
    $ letvar -F json --var uri=/a --var arg_id=3 vars.conf etag bucket\n\n\
    To fill $1..$9 from a regex match:\n\
    $ letvar --regex '^/(\\w+)/' --subject /img/logo.png vars.conf\n\n\
    To validate a directive file:\n\
    $ letvar check --host uri vars.conf")]
#[command(
    about = "letvar evaluates nginx-style derived variables defined by let directives.",
    long_about = None
)]
pub struct Cli {
    #[clap(subcommand)]
    commands: Option<Commands>,

    #[clap(flatten)]
    input: InputArgs,

    #[clap(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,

    /// Directive file to load
    config: Option<PathBuf>,

    /// Variables to print; every derived variable when omitted
    names: Vec<String>,
}

#[derive(Clone, Debug, Default, clap::ValueEnum)]
enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct InputArgs {
    /// Sets a host variable referenced as `$NAME`
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    vars: Vec<(String, String)>,

    /// Declares a host variable without a value
    #[arg(long = "host", value_name = "NAME")]
    hosts: Vec<String>,

    /// Pattern whose capture groups become $0..$9
    #[arg(long)]
    regex: Option<String>,

    /// Text matched against the regex
    #[arg(long, requires = "regex")]
    subject: Option<String>,

    /// Seed for rand() and let_rand; seeded from the clock when omitted
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct OutputArgs {
    /// Output format
    #[arg(short = 'F', long, value_enum, default_value_t)]
    format: Format,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load a directive file and report diagnostics without evaluating it
    Check {
        /// Declares a host variable the directives may reference
        #[arg(long = "host", value_name = "NAME")]
        hosts: Vec<String>,

        config: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct Output<'a> {
    name: &'a str,
    value: String,
    status: String,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.trim_start_matches('$').to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))
}

fn load<'a>(
    path: &Path,
    host_names: impl Iterator<Item = &'a str>,
    seed: Option<u64>,
) -> miette::Result<Config> {
    if !path.exists() {
        return Err(miette!("File not found: {}", path.display()));
    }

    let source = fs::read_to_string(path).into_diagnostic()?;
    let config = match seed {
        Some(seed) => Config::load_with_seed(&source, host_names, seed),
        None => Config::load(&source, host_names),
    };

    config.map_err(miette::Report::new)
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        match &self.commands {
            Some(Commands::Check { hosts, config }) => {
                let loaded = load(config, hosts.iter().map(String::as_str), None)?;
                println!(
                    "{}: {} derived variable(s)",
                    config.display(),
                    loaded.derived_names().count()
                );
                Ok(())
            }
            None => match &self.config {
                Some(config) => self.execute(config),
                None => Cli::command().print_help().into_diagnostic(),
            },
        }
    }

    fn execute(&self, path: &Path) -> miette::Result<()> {
        let host_names = self
            .input
            .vars
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(self.input.hosts.iter().map(String::as_str));
        let config = load(path, host_names, self.input.seed)?;

        let mut request = Request::new(&config);
        for (name, value) in &self.input.vars {
            if !request.set_input(name, value.as_str()) {
                log::warn!("${} cannot be set", name);
            }
        }

        if let Some(pattern) = &self.input.regex {
            let subject = self.input.subject.as_deref().unwrap_or_default();
            let matched = request
                .match_captures(pattern, subject)
                .into_diagnostic()?;
            if !matched {
                log::warn!("{:?} does not match {:?}", pattern, subject);
            }
        }

        let names = if self.names.is_empty() {
            config.derived_names().map(ToString::to_string).collect_vec()
        } else {
            self.names
                .iter()
                .map(|name| name.trim_start_matches('$').to_string())
                .collect_vec()
        };

        let results = names
            .iter()
            .map(|name| {
                let (value, status) = request.get(name);
                (name.as_str(), String::from_utf8_lossy(&value).into_owned(), status)
            })
            .collect_vec();

        let stdout = io::stdout();
        let mut handle = BufWriter::new(stdout.lock());

        match self.output.format {
            Format::Text => {
                for (name, value, status) in &results {
                    let written = match status {
                        Status::Ok => writeln!(handle, "{}={}", name, value),
                        _ => writeln!(handle, "{}: {}", name, status),
                    };
                    written.into_diagnostic()?;
                }
            }
            Format::Json => {
                let outputs = results
                    .into_iter()
                    .map(|(name, value, status)| Output {
                        name,
                        value,
                        status: status.to_string(),
                    })
                    .collect_vec();
                let json = serde_json::to_string_pretty(&outputs).into_diagnostic()?;
                writeln!(handle, "{}", json).into_diagnostic()?;
            }
        }

        handle.flush().into_diagnostic()
    }
}
