//! Logging backend setup (flexi_logger)
//!
//! Everything in the crate logs through the `log` facade. The binary calls
//! [`init_logging`] once; tests that need output call it too and tolerate
//! the "already initialised" error.
//!
//! Line formats, selected by `log.format`:
//!
//! - `text`: `2026-10-16 09:14:03.120 WRN Publish to orders:created failed`
//! - `ext`: the same, followed by ` (producer/manager.rs:115)`
//! - `json`: one object per line with `timestamp`, `level`, `message`, `source`

use colored::{ColoredString, Colorize};
use flexi_logger::{DeferredNow, FileSpec, FormatFunction, Logger, LoggerHandle};
use std::io::Write;
use std::sync::{Mutex, OnceLock};

const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Dropping the handle would stop file output, so it lives for the process
static LOGGER: OnceLock<Mutex<LoggerHandle>> = OnceLock::new();

/// Start the global logger
pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
    color_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = Logger::try_with_str(log_level.unwrap_or("info"))?
        .format(formatter(log_format.unwrap_or("text"), color_enabled));

    if let Some(file_path) = log_file.filter(|p| !p.eq_ignore_ascii_case("none")) {
        logger = logger.log_to_file(FileSpec::try_from(std::path::Path::new(file_path))?);
    }

    let handle = logger.start()?;
    let _ = LOGGER.set(Mutex::new(handle));
    Ok(())
}

fn formatter(format: &str, color: bool) -> FormatFunction {
    match (format, color) {
        ("json", _) => json_format,
        ("ext", true) => ext_color_format,
        ("ext", false) => ext_format,
        (_, true) => text_color_format,
        (_, false) => text_format,
    }
}

fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn painted_level_tag(level: log::Level) -> ColoredString {
    let tag = level_tag(level);
    match level {
        log::Level::Error => tag.red().bold(),
        log::Level::Warn => tag.yellow(),
        log::Level::Info => tag.green(),
        log::Level::Debug => tag.blue(),
        log::Level::Trace => tag.magenta(),
    }
}

/// `queuehook::consumer::manager` at line 42 becomes `consumer/manager.rs:42`;
/// targets of other crates keep their module path
fn source_location(target: &str, line: Option<u32>) -> String {
    let path = match target.strip_prefix("queuehook::") {
        Some(module) => module.replace("::", "/") + ".rs",
        None => target.replace("::", "/"),
    };
    match line {
        Some(line) => format!("{}:{}", path, line),
        None => path,
    }
}

fn write_line(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
    located: bool,
    color: bool,
) -> std::io::Result<()> {
    let stamp = now.format(TIMESTAMP).to_string();
    if color {
        write!(w, "{} {} {}", stamp.dimmed(), painted_level_tag(record.level()), record.args())?;
    } else {
        write!(w, "{} {} {}", stamp, level_tag(record.level()), record.args())?;
    }

    if !located {
        return Ok(());
    }
    let location = source_location(record.target(), record.line());
    if color {
        write!(w, " ({})", location.dimmed())
    } else {
        write!(w, " ({})", location)
    }
}

fn text_format(w: &mut dyn Write, now: &mut DeferredNow, record: &log::Record) -> std::io::Result<()> {
    write_line(w, now, record, false, false)
}

fn text_color_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> std::io::Result<()> {
    write_line(w, now, record, false, true)
}

fn ext_format(w: &mut dyn Write, now: &mut DeferredNow, record: &log::Record) -> std::io::Result<()> {
    write_line(w, now, record, true, false)
}

fn ext_color_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> std::io::Result<()> {
    write_line(w, now, record, true, true)
}

fn json_format(w: &mut dyn Write, now: &mut DeferredNow, record: &log::Record) -> std::io::Result<()> {
    let line = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_tag(record.level()),
        "message": record.args().to_string(),
        "source": source_location(record.target(), record.line()),
    });
    match serde_json::to_string(&line) {
        Ok(line) => w.write_all(line.as_bytes()),
        Err(_) => w.write_all(br#"{"level":"ERR","message":"unserialisable log record"}"#),
    }
}
