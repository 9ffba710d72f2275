//! Error types.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors returned from watch construction and subscription.
///
/// Steady-state failures (a bad read on the kernel fd, a handler returning
/// an error, a failed reopen) are not surfaced through this type: per the
/// crate's contract they are logged through [`tracing`] and absorbed.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
#[diagnostic(url(docsrs))]
pub enum Error {
	/// The kernel event source could not be opened.
	#[error("inotify init: {err}")]
	#[diagnostic(code(snotify::init))]
	Init {
		/// The underlying error.
		#[source]
		err: std::io::Error,
	},

	/// The kernel event source could not be registered with the reactor.
	///
	/// The freshly opened descriptor is closed again before this is
	/// returned; no partially-initialised watch escapes.
	#[error("registering inotify fd with the event loop: {err}")]
	#[diagnostic(code(snotify::register))]
	Register {
		/// The underlying error.
		#[source]
		err: std::io::Error,
	},

	/// An empty event mask was passed to `add_watch`.
	///
	/// The kernel treats a zero mask as "no events", which can never fire;
	/// it is rejected outright rather than installed as a dead watch.
	#[error("refusing to subscribe with an empty event mask")]
	#[diagnostic(
		code(snotify::empty_mask),
		help("pass at least one WatchMask flag, e.g. WatchMask::CLOSE_WRITE")
	)]
	EmptyMask,

	/// The kernel rejected the watch installation.
	///
	/// Typically the path vanished between watch creation and subscription.
	#[error("adding kernel watch for {path:?}: {err}")]
	#[diagnostic(code(snotify::add_watch))]
	AddWatch {
		/// The watched path.
		path: PathBuf,

		/// The underlying error.
		#[source]
		err: std::io::Error,
	},

	/// The watch was torn down after an unrecoverable reopen failure and
	/// can no longer accept subscriptions.
	#[error("watch on {path:?} is defunct after a failed reopen")]
	#[diagnostic(code(snotify::defunct))]
	Defunct {
		/// The watched path.
		path: PathBuf,
	},
}
