//! Logging setup shared by every agent binary, modeled on the Flow CLIs'
//! common logging crate: a `--log-level`/`--log-format` pair, JSON output
//! that flattens event fields for machine parsing, and color/text auto-
//! detected from whether stderr is a tty.

#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// trace|debug|info|warn|error
    #[arg(long = "log-level", default_value_t = LogLevel::Warn, value_enum, global = true)]
    pub level: LogLevel,

    /// json|text|color (default: color when stderr is a tty, json otherwise)
    #[arg(long = "log-format", value_enum, global = true)]
    pub format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogFormat {
    /// jsonl on stderr, with event fields flattened to the top level.
    Json,
    /// plain text, no colors.
    Text,
    /// plain text with ANSI colors for interactive terminals.
    Color,
}

fn default_log_format() -> LogFormat {
    if atty::is(atty::Stream::Stderr) {
        LogFormat::Color
    } else {
        LogFormat::Json
    }
}

/// Initializes `tracing`. Panics if called more than once per process.
pub fn init_logging(args: &LogArgs) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(args.level.to_string())
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false);

    match args.format.unwrap_or_else(default_log_format) {
        LogFormat::Json => {
            builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .init();
        }
        LogFormat::Text => {
            builder.compact().with_ansi(false).init();
        }
        LogFormat::Color => {
            builder.compact().with_ansi(true).init();
        }
    }
}
