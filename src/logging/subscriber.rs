//! Tracing subscriber setup: console formatter, run log file, and initialisation.
//!
//! Each command writes one run log, truncated at startup:
//!
//! ```text
//! # winstate 0.4.0 apply 2026-10-18T09:12:44Z
//! 09:12:44 stage  Loading manifest
//! 09:12:44 info   loaded 4 object(s) from winstate.toml
//! 09:12:45 plan   would create dns_zone corp.example.com
//! 09:12:45 error  package Git.Git: convergence failed ...
//! ```
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::Level;

/// Event target for stage headers.
pub(super) const STAGE_TARGET: &str = "winstate::stage";
/// Event target for operations a dry run would execute.
pub(super) const DRY_RUN_TARGET: &str = "winstate::dry_run";

/// Run log for `command` under `$XDG_CACHE_HOME/winstate/` (falling back to
/// `~/.cache/winstate/`), creating the directory if needed.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let cache = std::env::var_os("XDG_CACHE_HOME").map_or_else(
        || {
            std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .map_or_else(|| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    );
    let dir = cache.join("winstate");
    fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// Pulls the `message` field out of an event.
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn message(event: &tracing::Event<'_>) -> String {
    let mut extractor = MessageExtractor::default();
    event.record(&mut extractor);
    extractor.message
}

/// Column label for an event in the run log.
fn file_tag(level: Level, target: &str) -> &'static str {
    match (level, target) {
        (Level::INFO, STAGE_TARGET) => "stage",
        (Level::INFO, DRY_RUN_TARGET) => "plan",
        (Level::ERROR, _) => "error",
        (Level::WARN, _) => "warn",
        (Level::INFO, _) => "info",
        _ => "debug",
    }
}

/// A [`tracing_subscriber::Layer`] that appends every event, `debug`
/// included, to the command's run log.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the run log for `command` and write its header line.
    ///
    /// Returns `None` if the log cannot be created; logging then goes to the
    /// console only.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let version =
            option_env!("WINSTATE_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let started = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        fs::write(&path, format!("# winstate {version} {command} {started}\n")).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let metadata = event.metadata();
        let tag = file_tag(*metadata.level(), metadata.target());
        let line = format!(
            "{} {tag:<6} {}",
            chrono::Utc::now().format("%H:%M:%S"),
            message(event)
        );
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// Console rendering: coloured level markers, stage headers, and `~` for
/// operations a dry run would execute.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let msg = message(event);
        match (*metadata.level(), metadata.target()) {
            (Level::ERROR, _) => writeln!(writer, "\x1b[31merror\x1b[0m {msg}"),
            (Level::WARN, _) => writeln!(writer, "\x1b[33mwarn\x1b[0m  {msg}"),
            (Level::INFO, STAGE_TARGET) => writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            (Level::INFO, DRY_RUN_TARGET) => writeln!(writer, "  \x1b[33m~\x1b[0m {msg}"),
            (Level::INFO, _) => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Console events at `info` (or `debug` with `verbose`) go to stdout, warnings
/// and errors to stderr.  With `stdout_reserved` (`--json`) every console
/// event goes to stderr so stdout carries only the JSON document.  The run
/// log always receives `debug` and above.
///
/// Must be called once at program startup, before any logging.
pub fn init_subscriber(verbose: bool, stdout_reserved: bool, command: &str) {
    use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt as _};
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = if stdout_reserved {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(
            std::io::stderr
                .with_max_level(Level::WARN)
                .and(std::io::stdout.with_min_level(Level::INFO)),
        )
    };

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
