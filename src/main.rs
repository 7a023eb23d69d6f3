//! Message Template CLI
//!
//! Usage:
//!   message-template [OPTIONS] [FILE]
//!
//! Options:
//!   -p, --payload <FILE>     Message payload JSON (`{key, variables}`) to bind
//!   -v, --var <KEY=VALUE>    Template variable (repeatable)
//!   -c, --color <KEY=PAIR>   Color variable, `#light,#dark` (repeatable)
//!   -t, --theme <FILE>       Theme file for default colors (TOML format)
//!   -w, --width <POINTS>     Width the body is laid out into
//!   -f, --format <FORMAT>    Output format: svg or layout
//!   -h, --help               Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use message_template::template::TemplatePayload;
use message_template::{
    bind_source, layout_source, render_with_config, render_with_fallback, Appearance, Bindings,
    LayoutConfig, RenderConfig, RenderError, Theme,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// SVG preview of the laid out message
    Svg,
    /// JSON dump of the layout tree
    Layout,
}

#[derive(Parser)]
#[command(name = "message-template")]
#[command(about = "Lay out and preview JSON message templates")]
struct Cli {
    /// Template file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Message payload JSON whose variables are bound into the template
    #[arg(short, long)]
    payload: Option<PathBuf>,

    /// Template variable as KEY=VALUE
    #[arg(short, long = "var", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,

    /// Color variable as KEY=#light,#dark
    #[arg(short, long = "color", value_parser = parse_key_value)]
    colors: Vec<(String, String)>,

    /// Theme file for default colors (TOML format)
    #[arg(short, long)]
    theme: Option<PathBuf>,

    /// Use the dark side of every color pair
    #[arg(long)]
    dark: bool,

    /// Width the body is laid out into
    #[arg(short, long)]
    width: Option<f64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "svg")]
    format: OutputFormat,

    /// Draw the theme's error body when the template cannot be rendered
    #[arg(long)]
    fallback: bool,

    /// Debug mode: outline frames and log the layout tree
    #[arg(short, long)]
    debug: bool,
}

fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{arg}`"))
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.input.is_none() && io::stdin().is_terminal() {
        eprintln!("No template given. Pass a file or pipe template JSON on stdin (see --help).");
        process::exit(2);
    }

    let theme = match &cli.theme {
        Some(path) => match Theme::from_file(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error loading theme '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => Theme::default(),
    };

    let (filename, source) = match &cli.input {
        Some(path) => (path.display().to_string(), read_file(path)),
        None => {
            let mut buffer = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buffer) {
                eprintln!("Error reading from stdin: {}", e);
                process::exit(1);
            }
            ("<stdin>".to_string(), buffer)
        }
    };

    let mut bindings = Bindings::default();
    if let Some(path) = &cli.payload {
        match TemplatePayload::from_json(&read_file(path)) {
            Some(payload) => {
                debug!(key = %payload.key, "binding payload variables");
                bindings.variables.extend(payload.variables);
            }
            None => {
                eprintln!("Error: '{}' is not a message payload", path.display());
                process::exit(1);
            }
        }
    }
    bindings.variables.extend(cli.vars.iter().cloned());
    bindings.color_variables.extend(cli.colors.iter().cloned());

    let mut layout = LayoutConfig::default();
    if let Some(width) = cli.width {
        layout = layout.with_max_width(width);
    }
    let config = RenderConfig::new()
        .with_layout(layout)
        .with_theme(theme)
        .with_appearance(if cli.dark { Appearance::Dark } else { Appearance::Light })
        .with_debug(cli.debug);

    let bound = match bind_source(&source, &bindings, &config) {
        Ok(bound) => bound,
        Err(e) => report(&e, &source, &filename),
    };

    let output = match cli.format {
        OutputFormat::Svg if cli.fallback => render_with_fallback(&bound, &config),
        OutputFormat::Svg => render_with_config(&bound, &config),
        OutputFormat::Layout => layout_source(&bound, &config).map(|tree| {
            serde_json::to_string_pretty(&tree).unwrap_or_else(|e| {
                eprintln!("Error serializing layout: {}", e);
                process::exit(1);
            })
        }),
    };

    match output {
        Ok(out) => println!("{}", out),
        Err(e) => report(&e, &bound, &filename),
    }
}

fn read_file(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn report(err: &RenderError, source: &str, filename: &str) -> ! {
    match err {
        RenderError::Parse(parse) => eprint!("{}", parse.format(source, filename)),
        other => eprintln!("Error: {}", other),
    }
    process::exit(1);
}
