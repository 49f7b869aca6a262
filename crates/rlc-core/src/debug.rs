use core::fmt;
use std::fs::OpenOptions;
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt as tracingfmt, EnvFilter};

#[macro_export]
macro_rules! unimplemented_log {
    ( $($arg:tt)* ) => {{
        tracing::warn!("unimplemented: {}", format_args!($($arg)*));
    }};
}

struct AlignedFormatter;

/// Pulls the optional `ts` (tick) field out of an event so it can be printed in the prefix
struct TsVisitor {
    ts: Option<String>,
}

impl tracing::field::Visit for TsVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "ts" {
            self.ts = Some(format!("{:?}", value));
        }
    }
}

/// Shortens "crates/rlc-entities/src/rlc/am/am_tx.rs" to "[entities/rlc] am_tx.rs"
fn short_location(file_path: &str) -> String {
    let Some(src_idx) = file_path.find("/src/") else {
        return file_path.to_string();
    };
    let before_src = &file_path[..src_idx];
    let after_src = &file_path[src_idx + 5..];

    let crate_name = match before_src.rfind("rlc-") {
        Some(idx) => &before_src[idx + 4..],
        None => before_src.rsplit('/').next().unwrap_or("unknown"),
    };

    match after_src.rfind('/') {
        Some(last_slash) => {
            let first_module = after_src[..last_slash].split('/').next().unwrap_or("");
            format!("[{}/{}] {}", crate_name, first_module, &after_src[last_slash + 1..])
        }
        None => format!("[{}] {}", crate_name, after_src),
    }
}

impl<S, N> FormatEvent<S, N> for AlignedFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let mut visitor = TsVisitor { ts: None };
        event.record(&mut visitor);
        let has_ts = visitor.ts.is_some();
        let ts_str = visitor.ts.unwrap_or_else(|| "       ".to_string());

        let (color_level, color_reset) = match *metadata.level() {
            tracing::Level::ERROR => ("\x1b[31m", "\x1b[0m"),
            tracing::Level::WARN => ("\x1b[33m", "\x1b[0m"),
            tracing::Level::INFO => ("\x1b[32m", "\x1b[0m"),
            tracing::Level::DEBUG => ("\x1b[34m", "\x1b[0m"),
            tracing::Level::TRACE => ("\x1b[35m", "\x1b[0m"),
        };

        // "LEVEL ts [crate/module] file:line:"
        let location = format!(
            "{}{:<5}{} {:>7} {}:{}:",
            color_level,
            metadata.level(),
            color_reset,
            ts_str,
            short_location(metadata.file().unwrap_or("unknown")),
            metadata.line().unwrap_or(0)
        );

        let mut message_buf = String::new();
        ctx.field_format().format_fields(format::Writer::new(&mut message_buf), event)?;

        // ts was already printed in the prefix
        if has_ts {
            if let Some(ts_idx) = message_buf.find("ts=") {
                match message_buf[ts_idx..].find(' ') {
                    Some(space_idx) => message_buf.replace_range(ts_idx..ts_idx + space_idx + 1, ""),
                    None => message_buf.truncate(ts_idx),
                }
            }
        }

        // PDU direction arrows sit slightly to the left
        let mut padding = 64;
        if message_buf.starts_with("->") || message_buf.starts_with("<-") {
            padding -= 3;
        }

        write!(writer, "{:<width$} {}", location, message_buf, width = padding)?;
        writeln!(writer)
    }
}

static INIT_LOG: Once = Once::new();

/// Sets up logging with maximum verbosity (trace level)
/// Mainly for unit tests
pub fn setup_logging_verbose() {
    setup_logging(EnvFilter::new("trace"), None);
}

/// Sets up default logging to stdout and optionally, a verbose log file
/// Returns a guard, that needs to be kept alive for logging to file to work
pub fn setup_logging_default(verbose_logfile: Option<String>) -> Option<WorkerGuard> {
    let logfile_and_filter = verbose_logfile.map(|file| (file, get_default_logfile_filter()));
    setup_logging(get_default_stdout_filter(), logfile_and_filter)
}

fn directive(s: &str) -> tracing_subscriber::filter::Directive {
    s.parse().expect("static log directive is valid")
}

pub fn get_default_stdout_filter() -> EnvFilter {
    EnvFilter::new("info")
        // Per-tick chatter
        .add_directive(directive("rlc_entities::messagerouter=warn"))
        .add_directive(directive("rlc_core::bitbuffer=warn"))
        .add_directive(directive("rlc_core::timer=info"))

        // Simulated peers and channel
        .add_directive(directive("rlc_entities::sim=info"))

        // The AM engine itself
        .add_directive(directive("rlc_entities::rlc::am::am_tx=info"))
        .add_directive(directive("rlc_entities::rlc::am::am_rx=info"))
        .add_directive(directive("rlc_entities::rlc::am::am_bearer=info"))
}

fn get_default_logfile_filter() -> EnvFilter {
    EnvFilter::new("debug")
}

/// Sets up logging to stdout and optionally, a verbose log file.
/// If an output file is requested, returns Some<WorkerGuard>. Keep this value alive
/// or logging to file may cease working.
fn setup_logging(stdout_filter: EnvFilter, outfile: Option<(String, EnvFilter)>) -> Option<WorkerGuard> {
    match outfile {
        Some((outfile, outfile_filter)) => {
            let file = match OpenOptions::new().create(true).append(true).open(&outfile) {
                Ok(file) => file,
                Err(e) => {
                    eprintln!("Failed to open log file {}: {}", outfile, e);
                    return setup_logging(stdout_filter, None);
                }
            };
            let (file_writer, guard) = tracing_appender::non_blocking(file);

            INIT_LOG.call_once(|| {
                let file_layer = tracingfmt::layer()
                    .event_format(AlignedFormatter)
                    .with_writer(file_writer)
                    .with_ansi(false);
                let stdout_layer = tracingfmt::layer().event_format(AlignedFormatter);

                tracing_subscriber::registry()
                    .with(file_layer.with_filter(outfile_filter))
                    .with(stdout_layer.with_filter(stdout_filter))
                    .init();
            });
            Some(guard)
        }
        None => {
            INIT_LOG.call_once(|| {
                let stdout_layer = tracingfmt::layer().event_format(AlignedFormatter);
                tracing_subscriber::registry()
                    .with(stdout_layer.with_filter(stdout_filter))
                    .init();
            });
            None
        }
    }
}
