//! The process-wide sink to which statistics are written.
//!
//! Nothing is written until [`configure_statistic_logging`] has been called, which lets several
//! networks run in one process without any of them printing unless the embedding program asks
//! for it.

use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::io::stdout;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::RwLock;

use convert_case::Case;
use convert_case::Casing;

struct StatisticSink {
    /// Written in front of every statistic line: `{prefix} {name}={value}`.
    prefix: &'static str,
    /// Written once after a block of statistics.
    postfix: Option<&'static str>,
    casing: Option<Case>,
    writer: Box<dyn Write + Send + Sync>,
}

impl StatisticSink {
    fn write_line(&mut self, line: impl Display) {
        let _ = writeln!(self.writer, "{line}");
    }
}

impl Debug for StatisticSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticSink")
            .field("prefix", &self.prefix)
            .field("postfix", &self.postfix)
            .field("casing", &self.casing)
            .field("writer", &"<Writer>")
            .finish()
    }
}

static STATISTIC_SINK: OnceLock<RwLock<StatisticSink>> = OnceLock::new();

fn with_sink(action: impl FnOnce(&mut StatisticSink)) {
    if let Some(lock) = STATISTIC_SINK.get() {
        if let Ok(mut sink) = lock.write() {
            action(&mut sink);
        }
    }
}

/// Configures where and how statistics are written.
///
/// Every statistic is written as `{prefix} {name}={value}`, the name converted to `casing` when
/// one is given. The `postfix` line is written by [`log_statistic_postfix`]. When no writer is
/// given, stdout is used. Only the first call has an effect.
pub fn configure_statistic_logging(
    prefix: &'static str,
    postfix: Option<&'static str>,
    casing: Option<Case>,
    writer: Option<Box<dyn Write + Send + Sync>>,
) {
    let _ = STATISTIC_SINK.get_or_init(|| {
        RwLock::from(StatisticSink {
            prefix,
            postfix,
            casing,
            writer: writer.unwrap_or(Box::new(stdout())),
        })
    });
}

/// Writes the statistic `name` with value `value`, if statistic logging is configured.
pub fn log_statistic(name: impl Display, value: impl Display) {
    with_sink(|sink| {
        let name = match sink.casing {
            Some(casing) => name.to_string().to_case(casing),
            None => name.to_string(),
        };
        let prefix = sink.prefix;
        sink.write_line(format_args!("{prefix} {name}={value}"));
    });
}

/// Writes the closing line of a block of statistics, if one is configured.
pub fn log_statistic_postfix() {
    with_sink(|sink| {
        if let Some(postfix) = sink.postfix {
            sink.write_line(postfix);
        }
    });
}

/// Whether [`configure_statistic_logging`] has been called.
pub fn should_log_statistics() -> bool {
    STATISTIC_SINK.get().is_some()
}
