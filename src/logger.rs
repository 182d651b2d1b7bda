//! Structured logging contract used by the trippers.
//!
//! Trippers never talk to a logging backend directly. They emit a leveled message plus an ordered
//! list of [`Field`]s against the [`LogContext`] carried by the request, and derive child contexts
//! (e.g. to attach a correlation id) through [`Logger::with_fields`].

// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Severity of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
	/// Very chatty diagnostics.
	Trace,
	/// Diagnostics.
	Debug,
	/// Normal operation.
	Info,
	/// Failures.
	Error,
}
impl Level {
	/// Returns a stable lowercase label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Level::Trace => "trace",
			Level::Debug => "debug",
			Level::Info => "info",
			Level::Error => "error",
		}
	}
}
impl Display for Level {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One key/value pair of a structured log entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
	/// Field name.
	pub key: &'static str,
	/// Field value.
	pub value: Value,
}
impl Field {
	/// Creates a field.
	pub fn new(key: &'static str, value: impl Into<Value>) -> Self {
		Self { key, value: value.into() }
	}
}
impl Display for Field {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}={}", self.key, self.value)
	}
}

/// Persistent fields attached to every entry logged for one request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogContext(Arc<Vec<Field>>);
impl LogContext {
	/// Returns the persistent fields in insertion order.
	pub fn fields(&self) -> &[Field] {
		&self.0
	}

	/// Returns the value of the most recently attached field named `key`.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.iter().rev().find(|field| field.key == key).map(|field| &field.value)
	}

	/// Derives a child context carrying `fields` in addition to the current ones.
	pub fn child(&self, fields: impl IntoIterator<Item = Field>) -> Self {
		let mut merged = self.0.as_ref().clone();

		merged.extend(fields);

		Self(Arc::new(merged))
	}
}

/// Contextual structured logger.
pub trait Logger
where
	Self: Send + Sync,
{
	/// Emits `message` at `level` with the ordered `fields`.
	fn log(&self, ctx: &LogContext, level: Level, message: &str, fields: &[Field]);

	/// Derives a context carrying additional persistent fields.
	fn with_fields(&self, ctx: &LogContext, fields: Vec<Field>) -> LogContext {
		ctx.child(fields)
	}

	/// Emits a trace entry.
	fn trace(&self, ctx: &LogContext, message: &str, fields: &[Field]) {
		self.log(ctx, Level::Trace, message, fields);
	}

	/// Emits a debug entry.
	fn debug(&self, ctx: &LogContext, message: &str, fields: &[Field]) {
		self.log(ctx, Level::Debug, message, fields);
	}

	/// Emits an info entry.
	fn info(&self, ctx: &LogContext, message: &str, fields: &[Field]) {
		self.log(ctx, Level::Info, message, fields);
	}

	/// Emits an error entry; the error text is appended as the `error` field.
	fn error(&self, ctx: &LogContext, message: &str, err: &dyn StdError, fields: &[Field]) {
		let mut fields = fields.to_vec();

		fields.push(Field::new("error", err.to_string()));

		self.log(ctx, Level::Error, message, &fields);
	}
}

/// Logger that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;
impl Logger for NoopLogger {
	fn log(&self, _ctx: &LogContext, _level: Level, _message: &str, _fields: &[Field]) {}
}

/// Entry captured by [`MemoryLogger`].
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
	/// Entry level.
	pub level: Level,
	/// Entry message.
	pub message: String,
	/// Context fields active when the entry was logged.
	pub context: Vec<Field>,
	/// Entry fields.
	pub fields: Vec<Field>,
}
impl LogEntry {
	/// Returns the value of the entry field named `key`.
	pub fn field(&self, key: &str) -> Option<&Value> {
		self.fields.iter().find(|field| field.key == key).map(|field| &field.value)
	}

	/// Returns the value of the context field named `key`.
	pub fn context_field(&self, key: &str) -> Option<&Value> {
		self.context.iter().rev().find(|field| field.key == key).map(|field| &field.value)
	}
}

/// Thread-safe logger that keeps entries in-process for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryLogger {
	entries: Mutex<Vec<LogEntry>>,
	derived: Mutex<Vec<Vec<Field>>>,
}
impl MemoryLogger {
	/// Returns a snapshot of the captured entries.
	pub fn entries(&self) -> Vec<LogEntry> {
		self.entries.lock().clone()
	}

	/// Returns the captured messages in order.
	pub fn messages(&self) -> Vec<String> {
		self.entries.lock().iter().map(|entry| entry.message.clone()).collect()
	}

	/// Returns the field sets passed to [`Logger::with_fields`], in call order.
	pub fn derived_fields(&self) -> Vec<Vec<Field>> {
		self.derived.lock().clone()
	}

	/// Drops every captured entry.
	pub fn clear(&self) {
		self.entries.lock().clear();
		self.derived.lock().clear();
	}
}
impl Logger for MemoryLogger {
	fn log(&self, ctx: &LogContext, level: Level, message: &str, fields: &[Field]) {
		self.entries.lock().push(LogEntry {
			level,
			message: message.to_owned(),
			context: ctx.fields().to_vec(),
			fields: fields.to_vec(),
		});
	}

	fn with_fields(&self, ctx: &LogContext, fields: Vec<Field>) -> LogContext {
		self.derived.lock().push(fields.clone());

		ctx.child(fields)
	}
}

/// Logger forwarding entries to `tracing` events under the `tripperware` target.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;
#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
	fn log(&self, ctx: &LogContext, level: Level, message: &str, fields: &[Field]) {
		let context = render(ctx.fields());
		let fields = render(fields);

		match level {
			Level::Trace => tracing::trace!(target: "tripperware", %context, %fields, "{message}"),
			Level::Debug => tracing::debug!(target: "tripperware", %context, %fields, "{message}"),
			Level::Info => tracing::info!(target: "tripperware", %context, %fields, "{message}"),
			Level::Error => tracing::error!(target: "tripperware", %context, %fields, "{message}"),
		}
	}
}

#[cfg(feature = "tracing")]
fn render(fields: &[Field]) -> String {
	fields.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}
