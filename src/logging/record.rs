//! Records as `tracing` events.
//!
//! Every record is dispatched as an event on one of seven static callsites,
//! one per [`Level`]. `tracing` only knows five levels, so `DPanic`, `Panic`
//! and `Fatal` share `ERROR` and the formatter recovers the exact level from
//! the callsite identity.

use tracing::callsite::{Callsite, Identifier};
use tracing::field::{FieldSet, Value as TracingValue};
use tracing::metadata::Kind;
use tracing::subscriber::Interest;
use tracing::{Dispatch, Event, Metadata};

use crate::logging::encoder::JsonMembers;
use crate::logging::level::Level;

pub(crate) const MESSAGE: &str = "message";
pub(crate) const LOGGER: &str = "logger";
pub(crate) const CALLER: &str = "caller";
pub(crate) const FIELDS: &str = "fields";
pub(crate) const STACKTRACE: &str = "stacktrace";

static FIELD_NAMES: &[&str] = &[MESSAGE, LOGGER, CALLER, FIELDS, STACKTRACE];

macro_rules! record_callsite {
    ($level:expr, $cs:ident, $meta:ident, $ty:ident) => {
        struct $ty;
        static $cs: $ty = $ty;
        static $meta: Metadata<'static> = Metadata::new(
            $level.as_str(),
            "reqlog",
            $level.as_tracing(),
            None,
            None,
            None,
            FieldSet::new(FIELD_NAMES, Identifier(&$cs)),
            Kind::EVENT,
        );

        impl Callsite for $ty {
            fn set_interest(&self, _: Interest) {}

            fn metadata(&self) -> &Metadata<'static> {
                &$meta
            }
        }
    };
}

record_callsite!(Level::Debug, DEBUG_CS, DEBUG_META, DebugCallsite);
record_callsite!(Level::Info, INFO_CS, INFO_META, InfoCallsite);
record_callsite!(Level::Warn, WARN_CS, WARN_META, WarnCallsite);
record_callsite!(Level::Error, ERROR_CS, ERROR_META, ErrorCallsite);
record_callsite!(Level::DPanic, DPANIC_CS, DPANIC_META, DPanicCallsite);
record_callsite!(Level::Panic, PANIC_CS, PANIC_META, PanicCallsite);
record_callsite!(Level::Fatal, FATAL_CS, FATAL_META, FatalCallsite);

fn metadata(level: Level) -> &'static Metadata<'static> {
    match level {
        Level::Debug => &DEBUG_META,
        Level::Info => &INFO_META,
        Level::Warn => &WARN_META,
        Level::Error => &ERROR_META,
        Level::DPanic => &DPANIC_META,
        Level::Panic => &PANIC_META,
        Level::Fatal => &FATAL_META,
    }
}

/// Level of an event dispatched by [`Record::dispatch`].
///
/// Foreign metadata falls back to the `tracing` level.
pub(crate) fn level_of(meta: &Metadata<'_>) -> Level {
    Level::ALL
        .into_iter()
        .find(|level| std::ptr::eq(metadata(*level), meta))
        .unwrap_or_else(|| Level::from(*meta.level()))
}

/// One record, borrowed from the emitting call.
pub(crate) struct Record<'a> {
    pub level: Level,
    pub message: &'a str,
    pub name: Option<&'a str>,
    /// Already shortened to `dir/file.rs:line`.
    pub caller: Option<&'a str>,
    pub members: JsonMembers<'a>,
    pub stacktrace: Option<&'a str>,
}

impl Record<'_> {
    pub(crate) fn dispatch(&self, dispatch: &Dispatch) {
        let meta = metadata(self.level);
        if !dispatch.enabled(meta) {
            return;
        }
        let fields = meta.fields();
        let (Some(message), Some(logger), Some(caller), Some(members), Some(stacktrace)) = (
            fields.field(MESSAGE),
            fields.field(LOGGER),
            fields.field(CALLER),
            fields.field(FIELDS),
            fields.field(STACKTRACE),
        ) else {
            return;
        };

        let members_value = tracing::field::display(&self.members);
        let value_pairs = [
            (&message, Some(&self.message as &dyn TracingValue)),
            (&logger, self.name.as_ref().map(|v| v as &dyn TracingValue)),
            (&caller, self.caller.as_ref().map(|v| v as &dyn TracingValue)),
            (&members, Some(&members_value as &dyn TracingValue)),
            (&stacktrace, self.stacktrace.as_ref().map(|v| v as &dyn TracingValue)),
        ];
        let values = fields.value_set(&value_pairs);
        dispatch.event(&Event::new(meta, &values));
    }
}
