//! Output sinks.
//!
//! # Responsibilities
//! - Open configured sinks eagerly ("stdout", "stderr", file paths)
//! - Hand each sink to the `fmt` layer as a `MakeWriter`
//! - Remember write failures so `sync` can report them
//!
//! # Design Decisions
//! - Files are written by a `tracing_appender` worker thread, so log calls
//!   never wait on file I/O; the queue is not lossy
//! - `sync` drains the worker and starts a fresh one on the same file handle
//! - A failed write never propagates to the caller; it is reported once on
//!   the error outputs and kept for the next `sync`
//! - Poisoned locks are recovered; a panic elsewhere must not silence logging

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};

use chrono::Local;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter, MakeWriterExt};

use crate::config::schema::{STDERR, STDOUT};
use crate::error::{Error, Result};
use crate::logging::encoder::TIME_FORMAT;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write failures of one sink.
struct Failures {
    sink: String,
    /// First failure since the last sync.
    pending: Mutex<Option<io::Error>>,
    /// Error outputs of the logger the sink writes for.
    report_to: OnceLock<SinkSet>,
}

impl Failures {
    fn record(&self, err: io::Error, report: bool) {
        if report {
            if let Some(errors) = self.report_to.get() {
                errors.report(&self.sink, &err);
            }
        }
        let mut pending = lock(&self.pending);
        if pending.is_none() {
            *pending = Some(err);
        }
    }

    fn take(&self) -> Option<io::Error> {
        lock(&self.pending).take()
    }
}

fn failures(sink: &str) -> Arc<Failures> {
    Arc::new(Failures {
        sink: sink.to_string(),
        pending: Mutex::new(None),
        report_to: OnceLock::new(),
    })
}

/// The file handle as seen by the worker thread.
struct TrackedFile {
    file: File,
    failures: Arc<Failures>,
}

impl Write for TrackedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.file.write_all(buf) {
            self.failures.record(e, true);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Err(e) = self.file.flush() {
            self.failures.record(e, true);
        }
        Ok(())
    }
}

struct Worker {
    writer: NonBlocking,
    // Dropping the guard waits for queued records to be written.
    _guard: WorkerGuard,
}

impl Worker {
    fn spawn(file: &File, failures: &Arc<Failures>) -> io::Result<Self> {
        let tracked = TrackedFile {
            file: file.try_clone()?,
            failures: Arc::clone(failures),
        };
        let (writer, guard) = NonBlockingBuilder::default().lossy(false).finish(tracked);
        Ok(Self {
            writer,
            _guard: guard,
        })
    }
}

struct FileTarget {
    file: File,
    worker: RwLock<Worker>,
}

impl FileTarget {
    fn writer(&self) -> NonBlocking {
        self.worker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
            .clone()
    }

    /// Waits until every queued record reached the file, then swaps in a
    /// fresh worker.
    fn drain(&self, failures: &Arc<Failures>) -> io::Result<()> {
        let fresh = Worker::spawn(&self.file, failures)?;
        let retired = {
            let mut worker = self.worker.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *worker, fresh)
        };
        drop(retired);
        Ok(())
    }
}

enum Target {
    Stdout,
    Stderr,
    Writer(Mutex<Box<dyn Write + Send>>),
    File(FileTarget),
}

struct SinkInner {
    name: String,
    target: Target,
    failures: Arc<Failures>,
}

impl SinkInner {
    fn new(name: String, target: Target, failures: Arc<Failures>) -> Self {
        Self {
            name,
            target,
            failures,
        }
    }

    fn writer(&self, report: bool) -> SinkWriter<'_> {
        let target = match &self.target {
            Target::Stdout => TargetWriter::Stdout(io::stdout()),
            Target::Stderr => TargetWriter::Stderr(io::stderr()),
            Target::Writer(writer) => TargetWriter::Writer(lock(writer)),
            Target::File(file) => TargetWriter::File(file.writer()),
        };
        SinkWriter {
            failures: &self.failures,
            target,
            report,
        }
    }

    fn sync(&self) -> Result<()> {
        let flushed = match &self.target {
            Target::Stdout => io::stdout().flush(),
            Target::Stderr => io::stderr().flush(),
            Target::Writer(writer) => lock(writer).flush(),
            Target::File(file) => file.drain(&self.failures),
        };
        let failure = self.failures.take().map_or(flushed, Err);
        failure.map_err(|source| Error::Io {
            sink: self.name.clone(),
            source,
        })
    }
}

/// A writable destination for encoded records.
pub struct Sink {
    inner: Arc<SinkInner>,
}

impl Sink {
    /// Opens a sink by its configured name.
    ///
    /// Paths other than "stdout" and "stderr" are files opened for append,
    /// created if missing. A `file://` prefix is accepted.
    pub fn open(path: &str) -> Result<Self> {
        match path {
            STDOUT => Ok(Self::stdout()),
            STDERR => Ok(Self::stderr()),
            _ => {
                let file_path = path.strip_prefix("file://").unwrap_or(path);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .map_err(|e| Error::config(format!("couldn't open sink {:?}: {}", path, e)))?;
                Self::file(path, file)
                    .map_err(|e| Error::config(format!("couldn't open sink {:?}: {}", path, e)))
            }
        }
    }

    pub fn stdout() -> Self {
        Self::from_target(STDOUT, Target::Stdout)
    }

    pub fn stderr() -> Self {
        Self::from_target(STDERR, Target::Stderr)
    }

    /// Wraps an arbitrary writer. Writes happen on the logging thread.
    pub fn writer(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self::from_target(name, Target::Writer(Mutex::new(Box::new(writer))))
    }

    fn file(name: &str, file: File) -> io::Result<Self> {
        let failures = failures(name);
        let worker = Worker::spawn(&file, &failures)?;
        let target = Target::File(FileTarget {
            file,
            worker: RwLock::new(worker),
        });
        Ok(Self {
            inner: Arc::new(SinkInner::new(name.to_string(), target, failures)),
        })
    }

    fn from_target(name: impl Into<String>, target: Target) -> Self {
        let name = name.into();
        let failures = failures(&name);
        Self {
            inner: Arc::new(SinkInner::new(name, target, failures)),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("name", &self.inner.name).finish()
    }
}

enum TargetWriter<'a> {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    Writer(MutexGuard<'a, Box<dyn Write + Send>>),
    File(NonBlocking),
}

impl Write for TargetWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TargetWriter::Stdout(w) => w.write(buf),
            TargetWriter::Stderr(w) => w.write(buf),
            TargetWriter::Writer(w) => w.write(buf),
            TargetWriter::File(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            TargetWriter::Stdout(w) => w.write_all(buf),
            TargetWriter::Stderr(w) => w.write_all(buf),
            TargetWriter::Writer(w) => w.write_all(buf),
            TargetWriter::File(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TargetWriter::Stdout(w) => w.flush(),
            TargetWriter::Stderr(w) => w.flush(),
            TargetWriter::Writer(w) => w.flush(),
            TargetWriter::File(w) => w.flush(),
        }
    }
}

/// Writer for one formatted record. Always reports success so the other
/// sinks of a tee still receive the record.
struct SinkWriter<'a> {
    failures: &'a Failures,
    target: TargetWriter<'a>,
    report: bool,
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.target.write_all(buf) {
            self.failures.record(e, self.report);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Err(e) = self.target.flush() {
            self.failures.record(e, self.report);
        }
        Ok(())
    }
}

/// Shared handle to one sink, as given to the `fmt` layer.
#[derive(Clone)]
struct SinkHandle(Arc<SinkInner>);

impl<'a> MakeWriter<'a> for SinkHandle {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.0.writer(true)
    }
}

/// An ordered set of sinks written as one.
#[derive(Clone, Default)]
pub(crate) struct SinkSet {
    sinks: Vec<Arc<SinkInner>>,
}

impl SinkSet {
    pub(crate) fn new(sinks: Vec<Sink>) -> Self {
        Self {
            sinks: sinks.into_iter().map(|s| s.inner).collect(),
        }
    }

    /// Opens every path in order, failing on the first that cannot be opened.
    pub(crate) fn open<S: AsRef<str>>(paths: &[S]) -> Result<Self> {
        let sinks = paths
            .iter()
            .map(|p| Sink::open(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(sinks))
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(|s| s.name.as_str())
    }

    /// Sends write failures of every sink in this set to `errors`.
    ///
    /// A sink reports to the first set it is attached to.
    pub(crate) fn report_failures_to(&self, errors: &SinkSet) {
        for sink in &self.sinks {
            let _ = sink.failures.report_to.set(errors.clone());
        }
    }

    /// All sinks as one `MakeWriter`, teed in order.
    pub(crate) fn make_writer(&self) -> BoxMakeWriter {
        let mut handles = self.sinks.iter().cloned().map(SinkHandle);
        match handles.next() {
            Some(first) => handles.fold(BoxMakeWriter::new(first), |all, next| {
                BoxMakeWriter::new(all.and(next))
            }),
            None => BoxMakeWriter::new(io::sink),
        }
    }

    /// Writes one plain-text failure line. Failures of these sinks are kept
    /// but not reported again.
    fn report(&self, sink: &str, err: &io::Error) {
        let line = format!(
            "{} write error: sink {}: {}\n",
            Local::now().format(TIME_FORMAT),
            sink,
            err
        );
        for errors in &self.sinks {
            let _ = errors.writer(false).write_all(line.as_bytes());
        }
    }

    /// Syncs every sink; all are attempted, the first failure is returned.
    pub(crate) fn sync(&self) -> Result<()> {
        let mut first = None;
        for sink in &self.sinks {
            if let Err(e) = sink.sync() {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
