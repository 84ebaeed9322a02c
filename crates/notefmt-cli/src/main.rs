mod collection;
mod http;

use collection::JsonCollection;
use notefmt_core::{
    Context, FormatterConfig, MediaDir, MediaStore, NoMedia, NoTitles, Reporter, Severity,
    TitleLookup, TracingReporter, TransformerConfig, TransformerRegistry, format_svg_with,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    UnknownTransformer(String),
    Io(std::io::Error),
    Core(notefmt_core::Error),
    Http(reqwest::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::UnknownTransformer(name) => write!(f, "Unknown transformer `{name}`"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Core(err) => write!(f, "{err}"),
            CliError::Http(err) => write!(f, "HTTP client error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<notefmt_core::Error> for CliError {
    fn from(value: notefmt_core::Error) -> Self {
        Self::Core(value)
    }
}

impl From<reqwest::Error> for CliError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Clone, Default)]
enum Command {
    #[default]
    Run,
    Field(String),
    Svg,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    minimized: bool,
    dry_run: bool,
    offline: bool,
    timeout_secs: u64,
    config: Option<PathBuf>,
    templates: Option<PathBuf>,
    media: Option<PathBuf>,
}

fn usage() -> &'static str {
    "notefmt\n\
\n\
USAGE:\n\
  notefmt run [--minimized] [--dry-run] [--offline] [--timeout <secs>] [--config <file>] --templates <dir> [--media <dir>] <collection.json>\n\
  notefmt field <transformer> [--minimized] [--offline] [--timeout <secs>] [--config <file>] [--media <dir>] [<path>|-]\n\
  notefmt svg [--config <file>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - run rewrites the collection file in place unless --dry-run is given.\n\
  - --offline disables page-title lookups; every `links` field is then reported and kept.\n\
  - Set NOTEFMT_LOG (e.g. NOTEFMT_LOG=debug) to control log output on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args {
        timeout_secs: 10,
        ..Default::default()
    };
    let mut command_seen = false;

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "run" if !command_seen => {
                command_seen = true;
                args.command = Command::Run;
            }
            "svg" if !command_seen => {
                command_seen = true;
                args.command = Command::Svg;
            }
            "field" if !command_seen => {
                command_seen = true;
                let Some(name) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.command = Command::Field(name.clone());
            }
            "--minimized" => args.minimized = true,
            "--dry-run" => args.dry_run = true,
            "--offline" => args.offline = true,
            "--timeout" => {
                let Some(secs) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.timeout_secs = secs.parse::<u64>().map_err(|_| CliError::Usage(usage()))?;
            }
            "--config" | "--templates" | "--media" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                let path = Some(PathBuf::from(path));
                match a.as_str() {
                    "--config" => args.config = path,
                    "--templates" => args.templates = path,
                    _ => args.media = path,
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if !command_seen {
        return Err(CliError::Usage(usage()));
    }
    if matches!(args.command, Command::Run) && (args.templates.is_none() || args.input.is_none())
    {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

/// Logs field reports and echoes them to stderr, so they are visible whatever the log filter.
struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&self, severity: Severity, message: &str) {
        TracingReporter.report(severity, message);
        let label = match severity {
            Severity::Critical => "error",
            Severity::Info => "info",
        };
        eprintln!("{label}: {message}");
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("NOTEFMT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<FormatterConfig, CliError> {
    match &args.config {
        Some(path) => Ok(FormatterConfig::load(path)?),
        None => Ok(FormatterConfig::default()),
    }
}

fn title_lookup(args: &Args) -> Result<Box<dyn TitleLookup>, CliError> {
    if args.offline {
        return Ok(Box::new(NoTitles));
    }
    Ok(Box::new(http::HttpTitles::new(Duration::from_secs(
        args.timeout_secs,
    ))?))
}

fn media_store(args: &Args) -> Box<dyn MediaStore> {
    match &args.media {
        Some(dir) => Box::new(MediaDir::new(dir)),
        None => Box::new(NoMedia),
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let registry = TransformerRegistry::default_transformers();

    if let Command::Svg = args.command {
        let svg = read_input(args.input.as_deref())?;
        print!("{}", format_svg_with(&svg, &config.image_occlusion_svg)?);
        return Ok(());
    }

    let titles = title_lookup(&args)?;
    let media = media_store(&args);
    let ctx = Context {
        minimized: args.minimized,
        config: &config,
        reporter: &StderrReporter,
        titles: titles.as_ref(),
        media: media.as_ref(),
    };

    match &args.command {
        Command::Field(name) => {
            let Some(transformer) = registry.get(name) else {
                return Err(CliError::UnknownTransformer(name.clone()));
            };
            let value = read_input(args.input.as_deref())?;
            let out = transformer(&value, &ctx)?;
            print!("{}", out.value);
        }
        Command::Run => {
            let (Some(templates), Some(input)) = (&args.templates, &args.input) else {
                return Err(CliError::Usage(usage()));
            };
            let types = TransformerConfig::load_dir(templates, &registry)?;
            let mut store = JsonCollection::open(Path::new(input), args.dry_run)?;
            let summary = notefmt_core::run(&mut store, &types, &registry, &ctx)?;
            println!("{summary}");
        }
        Command::Svg => {}
    }
    Ok(())
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_tracing();

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
