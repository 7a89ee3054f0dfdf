//! Record encoders.
//!
//! # Responsibilities
//! - Resolve the configured encoding name (json / console)
//! - Select the field-naming preset (production / development)
//! - Format record events for the `fmt` layer of each logger
//!
//! # Design Decisions
//! - Field order is preserved and duplicate keys are emitted as given
//! - Timestamps come from the layer's `ChronoLocal` timer, ISO-8601 with
//!   millisecond precision in both presets
//! - Level colors follow the layer's ANSI setting, which is only on for
//!   console output in development

use std::fmt::{self, Write as _};
use std::panic::Location;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value as Json;
use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{ChronoLocal, FormatTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::error::Error;
use crate::logging::field::{Field, Value};
use crate::logging::level::Level;
use crate::logging::record;

pub(crate) const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    Console,
}

impl Encoding {
    /// Resolves a configured encoding name. Empty selects JSON.
    pub fn resolve(name: &str) -> Result<Self, Error> {
        if name.is_empty() {
            return Ok(Encoding::Json);
        }
        name.parse()
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Encoding::Json),
            "console" => Ok(Encoding::Console),
            other => Err(Error::config(format!(
                "no encoder registered for name {:?}",
                other
            ))),
        }
    }
}

/// How duration values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationFormat {
    /// Floating-point seconds.
    Seconds,
    /// Human-readable, e.g. `1.5ms`.
    Human,
}

/// Field names and formatting choices for one preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderPreset {
    pub time_key: &'static str,
    pub level_key: &'static str,
    pub name_key: &'static str,
    pub caller_key: &'static str,
    pub message_key: &'static str,
    pub stacktrace_key: &'static str,
    pub colorize_level: bool,
    pub duration: DurationFormat,
    /// Records at or above this level carry a stack trace.
    pub stacktrace_level: Level,
}

impl EncoderPreset {
    /// Machine-oriented preset.
    pub const fn production() -> Self {
        Self {
            time_key: "ts",
            level_key: "level",
            name_key: "logger",
            caller_key: "caller",
            message_key: "msg",
            stacktrace_key: "stacktrace",
            colorize_level: false,
            duration: DurationFormat::Seconds,
            stacktrace_level: Level::Error,
        }
    }

    /// Human-oriented preset.
    pub const fn development() -> Self {
        Self {
            time_key: "T",
            level_key: "L",
            name_key: "N",
            caller_key: "C",
            message_key: "M",
            stacktrace_key: "S",
            colorize_level: true,
            duration: DurationFormat::Human,
            stacktrace_level: Level::Warn,
        }
    }

    pub const fn for_mode(development: bool) -> Self {
        if development {
            Self::development()
        } else {
            Self::production()
        }
    }
}

/// Source location of a log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller<'a> {
    pub file: &'a str,
    pub line: u32,
}

impl From<&'static Location<'static>> for Caller<'static> {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

impl Caller<'_> {
    /// `dir/file.rs:line`, keeping only the last two path segments.
    pub(crate) fn short(&self) -> String {
        let file = self.file.replace('\\', "/");
        let trimmed = match file.rmatch_indices('/').nth(1) {
            Some((idx, _)) => &file[idx + 1..],
            None => file.as_str(),
        };
        format!("{}:{}", trimmed, self.line)
    }
}

/// Standing and call-site fields rendered as comma-separated JSON members,
/// without the enclosing braces.
pub(crate) struct JsonMembers<'a> {
    standing: &'a [Field],
    fields: &'a [Field],
    durations: DurationFormat,
}

impl<'a> JsonMembers<'a> {
    pub(crate) fn new(standing: &'a [Field], fields: &'a [Field], durations: DurationFormat) -> Self {
        Self {
            standing,
            fields,
            durations,
        }
    }

    fn json_value(&self, value: &Value) -> Json {
        match value {
            Value::Str(s) | Value::Error(s) => Json::from(s.as_str()),
            Value::I64(v) => Json::from(*v),
            Value::U64(v) => Json::from(*v),
            Value::F64(v) => float(*v),
            Value::Bool(v) => Json::Bool(*v),
            Value::Duration(d) => match self.durations {
                DurationFormat::Seconds => float(d.as_secs_f64()),
                DurationFormat::Human => Json::String(format!("{:?}", d)),
            },
            Value::Time(t) => Json::String(t.format(TIME_FORMAT).to_string()),
        }
    }
}

impl fmt::Display for JsonMembers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.standing.iter().chain(self.fields).enumerate() {
            if i > 0 {
                f.write_char(',')?;
            }
            write!(f, "{}:{}", Json::from(&*field.key), self.json_value(&field.value))?;
        }
        Ok(())
    }
}

/// Non-finite floats are rendered as strings.
fn float(v: f64) -> Json {
    serde_json::Number::from_f64(v)
        .map(Json::Number)
        .unwrap_or_else(|| Json::String(v.to_string()))
}

/// The parts of a record event, collected from its fields.
#[derive(Default)]
struct RecordParts {
    message: String,
    logger: Option<String>,
    caller: Option<String>,
    members: String,
    stacktrace: Option<String>,
}

impl Visit for RecordParts {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        match field.name() {
            record::MESSAGE => self.message = value.to_string(),
            record::LOGGER => self.logger = Some(value.to_string()),
            record::CALLER => self.caller = Some(value.to_string()),
            record::STACKTRACE => self.stacktrace = Some(value.to_string()),
            record::FIELDS => self.members = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{:?}", value));
    }
}

/// `FormatEvent` for the `fmt` layer of a logger.
pub(crate) struct RecordFormat {
    encoding: Encoding,
    preset: EncoderPreset,
    timer: ChronoLocal,
}

impl RecordFormat {
    pub(crate) fn new(encoding: Encoding, preset: EncoderPreset) -> Self {
        Self {
            encoding,
            preset,
            timer: ChronoLocal::new(TIME_FORMAT.to_string()),
        }
    }

    fn write_json(&self, w: &mut Writer<'_>, level: Level, ts: &str, parts: &RecordParts) -> fmt::Result {
        let p = &self.preset;
        w.write_char('{')?;
        member(w, p.time_key, ts)?;
        w.write_char(',')?;
        member(w, p.level_key, level.as_capital_str())?;
        if let Some(name) = &parts.logger {
            w.write_char(',')?;
            member(w, p.name_key, name)?;
        }
        if let Some(caller) = &parts.caller {
            w.write_char(',')?;
            member(w, p.caller_key, caller)?;
        }
        w.write_char(',')?;
        member(w, p.message_key, &parts.message)?;
        if !parts.members.is_empty() {
            write!(w, ",{}", parts.members)?;
        }
        if let Some(stack) = &parts.stacktrace {
            w.write_char(',')?;
            member(w, p.stacktrace_key, stack)?;
        }
        w.write_char('}')
    }

    fn write_console(&self, w: &mut Writer<'_>, level: Level, ts: &str, parts: &RecordParts) -> fmt::Result {
        write!(w, "{}\t", ts)?;
        if w.has_ansi_escapes() {
            write!(w, "\x1b[{}m{}\x1b[0m", level.color(), level.as_capital_str())?;
        } else {
            w.write_str(level.as_capital_str())?;
        }
        if let Some(name) = &parts.logger {
            write!(w, "\t{}", name)?;
        }
        if let Some(caller) = &parts.caller {
            write!(w, "\t{}", caller)?;
        }
        write!(w, "\t{}", parts.message)?;
        if !parts.members.is_empty() {
            write!(w, "\t{{{}}}", parts.members)?;
        }
        if let Some(stack) = &parts.stacktrace {
            write!(w, "\n{}", stack.trim_end())?;
        }
        Ok(())
    }
}

fn member(w: &mut Writer<'_>, key: &str, value: &str) -> fmt::Result {
    write!(w, "{}:{}", Json::from(key), Json::from(value))
}

impl<S, N> FormatEvent<S, N> for RecordFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = record::level_of(event.metadata());
        let mut parts = RecordParts::default();
        event.record(&mut parts);

        let mut ts = String::new();
        self.timer.format_time(&mut Writer::new(&mut ts))?;

        match self.encoding {
            Encoding::Json => self.write_json(&mut writer, level, &ts, &parts)?,
            Encoding::Console => self.write_console(&mut writer, level, &ts, &parts)?,
        }
        writeln!(writer)
    }
}
