//! Logger facade and factory.
//!
//! A [`Logger`] is a cheap handle over a shared core (level, encoder, sinks).
//! Derivations such as [`Logger::with`] and [`Logger::named`] return new handles
//! sharing the same core; nothing is mutated after construction.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;

use crate::config::LoggerConfig;
use crate::error::Result;
use crate::logging::context::RequestContext;
use crate::logging::encoder::{Caller, EncoderPreset, Encoding, JsonMembers, RecordFormat};
use crate::logging::field::{Field, Fields};
use crate::logging::level::Level;
use crate::logging::record::Record;
use crate::logging::sink::{Sink, SinkSet};

/// State shared by every handle derived from one logger.
///
/// Records go through a private `tracing` dispatcher: a registry with a
/// level filter and one `fmt` layer writing to all outputs.
struct Core {
    level: Level,
    development: bool,
    preset: EncoderPreset,
    dispatch: Dispatch,
    outputs: SinkSet,
    error_outputs: SinkSet,
}

impl Core {
    fn new(
        level: Level,
        development: bool,
        encoding: Encoding,
        outputs: SinkSet,
        error_outputs: SinkSet,
    ) -> Self {
        let preset = EncoderPreset::for_mode(development);
        outputs.report_failures_to(&error_outputs);

        let layer = tracing_subscriber::fmt::layer()
            .event_format(RecordFormat::new(encoding, preset.clone()))
            .with_writer(outputs.make_writer())
            .with_ansi(preset.colorize_level && encoding == Encoding::Console)
            .log_internal_errors(false);
        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::from_level(level.as_tracing()))
            .with(layer);

        Self {
            level,
            development,
            preset,
            dispatch: Dispatch::new(subscriber),
            outputs,
            error_outputs,
        }
    }
}

/// Structured logger handle. Clone freely; all clones share the same sinks.
#[derive(Clone)]
pub struct Logger {
    core: Arc<Core>,
    name: Option<Arc<str>>,
    fields: Arc<[Field]>,
}

impl Logger {
    /// Builds a logger from configuration.
    ///
    /// Every configured output is opened eagerly and "stderr" is appended to
    /// the outputs. Error output is always "stderr".
    ///
    /// # Errors
    /// [`Error::Configuration`](crate::Error::Configuration) for an unknown
    /// level or encoding, or a sink that cannot be opened.
    pub fn new(config: &LoggerConfig) -> Result<Self> {
        let level = config.log_level.parse::<Level>()?;
        let encoding = Encoding::resolve(&config.encoding)?;
        let outputs = SinkSet::open(&config.resolved_output_paths())?;
        let error_outputs = SinkSet::open(&config.resolved_error_output_paths())?;

        Ok(Self::from_core(Core::new(
            level,
            config.development,
            encoding,
            outputs,
            error_outputs,
        )))
    }

    /// Production preset, `Info`, JSON to stderr. Never fails.
    ///
    /// Meant for bootstrap code that runs before configuration is available.
    pub fn new_default() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    fn from_core(core: Core) -> Self {
        Self {
            core: Arc::new(core),
            name: None,
            fields: Arc::from(Vec::new()),
        }
    }

    /// Minimum emitted level.
    pub fn level(&self) -> Level {
        self.core.level
    }

    pub fn is_development(&self) -> bool {
        self.core.development
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.core.level
    }

    /// Dot-joined hierarchical name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Fields attached to every record from this handle.
    pub fn standing_fields(&self) -> &[Field] {
        &self.fields
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, fields: Fields) {
        self.log(Level::Debug, msg, fields);
    }

    #[track_caller]
    pub fn info(&self, msg: &str, fields: Fields) {
        self.log(Level::Info, msg, fields);
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, fields: Fields) {
        self.log(Level::Warn, msg, fields);
    }

    #[track_caller]
    pub fn error(&self, msg: &str, fields: Fields) {
        self.log(Level::Error, msg, fields);
    }

    /// Logs at `DPanic`; panics afterwards in development mode.
    #[track_caller]
    pub fn dpanic(&self, msg: &str, fields: Fields) {
        self.log(Level::DPanic, msg, fields);
        if self.core.development {
            panic!("{}", msg);
        }
    }

    /// Logs at `Panic`, then panics with the message.
    #[track_caller]
    pub fn panic(&self, msg: &str, fields: Fields) -> ! {
        self.log(Level::Panic, msg, fields);
        panic!("{}", msg);
    }

    /// Logs at `Fatal`, syncs, then exits the process with status 1.
    #[track_caller]
    pub fn fatal(&self, msg: &str, fields: Fields) -> ! {
        self.log(Level::Fatal, msg, fields);
        let _ = self.sync();
        std::process::exit(1);
    }

    /// Emits one record at `level` if enabled.
    #[track_caller]
    pub fn log(&self, level: Level, msg: &str, fields: Fields) {
        let caller = Caller::from(Location::caller());
        self.emit(level, msg, None, Some(caller), fields.as_slice());
    }

    pub(crate) fn emit(
        &self,
        level: Level,
        message: &str,
        name: Option<&str>,
        caller: Option<Caller<'_>>,
        fields: &[Field],
    ) {
        if !self.enabled(level) {
            return;
        }
        let core = &self.core;
        let stacktrace = (level >= core.preset.stacktrace_level)
            .then(|| Backtrace::force_capture().to_string());
        let caller = caller.map(|c| c.short());

        Record {
            level,
            message,
            name: name.or(self.name.as_deref()),
            caller: caller.as_deref(),
            members: JsonMembers::new(&self.fields, fields, core.preset.duration),
            stacktrace: stacktrace.as_deref(),
        }
        .dispatch(&core.dispatch);
    }

    /// Returns a handle that adds `fields` to every record.
    pub fn with(&self, fields: Fields) -> Logger {
        if fields.is_empty() {
            return self.clone();
        }
        let merged: Vec<Field> = self.fields.iter().cloned().chain(fields).collect();
        Logger {
            core: Arc::clone(&self.core),
            name: self.name.clone(),
            fields: merged.into(),
        }
    }

    /// Returns a handle with `name` appended to the hierarchical name.
    pub fn named(&self, name: &str) -> Logger {
        if name.is_empty() {
            return self.clone();
        }
        let joined: Arc<str> = match &self.name {
            Some(parent) => format!("{}.{}", parent, name).into(),
            None => name.into(),
        };
        Logger {
            core: Arc::clone(&self.core),
            name: Some(joined),
            fields: Arc::clone(&self.fields),
        }
    }

    /// Attaches the context's `request_id`, if it has one.
    pub fn with_context(&self, ctx: Option<&RequestContext>) -> Logger {
        match ctx.and_then(RequestContext::request_id) {
            Some(id) => self.with(Fields::new().with("request_id", id)),
            None => self.clone(),
        }
    }

    /// Flushes every sink.
    ///
    /// Call once during graceful shutdown.
    ///
    /// # Errors
    /// [`Error::Io`](crate::Error::Io) if any sink failed a write since the
    /// last sync or cannot be flushed now.
    pub fn sync(&self) -> Result<()> {
        let outputs = self.core.outputs.sync();
        let errors = self.core.error_outputs.sync();
        outputs.and(errors)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new_default()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.core.level)
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .field("outputs", &self.core.outputs)
            .field("error_outputs", &self.core.error_outputs)
            .finish()
    }
}

/// Programmatic construction with explicit sinks.
pub struct LoggerBuilder {
    level: Level,
    development: bool,
    encoding: Encoding,
    sinks: Vec<Sink>,
    error_sinks: Vec<Sink>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            level: Level::Info,
            development: false,
            encoding: Encoding::Json,
            sinks: Vec::new(),
            error_sinks: Vec::new(),
        }
    }
}

impl LoggerBuilder {
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn sink(mut self, sink: Sink) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn error_sink(mut self, sink: Sink) -> Self {
        self.error_sinks.push(sink);
        self
    }

    /// Missing outputs or error outputs default to stderr.
    pub fn build(mut self) -> Logger {
        if self.sinks.is_empty() {
            self.sinks.push(Sink::stderr());
        }
        if self.error_sinks.is_empty() {
            self.error_sinks.push(Sink::stderr());
        }
        Logger::from_core(Core::new(
            self.level,
            self.development,
            self.encoding,
            SinkSet::new(self.sinks),
            SinkSet::new(self.error_sinks),
        ))
    }
}
