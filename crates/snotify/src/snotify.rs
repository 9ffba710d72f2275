//! The watch context: one kernel event source per watched path.

use std::{
	cell::RefCell,
	fmt,
	path::{Path, PathBuf},
	rc::Rc,
	time::Duration,
};

use inotify::{EventMask, WatchMask, Watches};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::{
	errors::Error,
	source,
	subscription::{SubEntry, Subscription},
};

/// The burst window used when a watch is created with a zero duration.
pub const DEFAULT_BURST_WINDOW: Duration = Duration::from_secs(1);

/// Outcome of a change handler.
///
/// The value is observed for logging only: a handler returning `Err` never
/// stops the dispatch round, and later handlers cannot tell it happened.
/// Whether and how to recover from a failed re-read is the subscriber's
/// policy, not this crate's.
pub type Status = Result<(), Box<dyn std::error::Error>>;

/// Shared state of one watch, owned behind `Rc<RefCell<_>>` and reached
/// from the read loop and the dispatch timer through weak references.
///
/// Everything here runs on one event-loop thread; no borrow is ever held
/// across a handler invocation, which is what lets handlers re-enter the
/// registry (dropping or adding subscriptions) safely.
pub(crate) struct WatchState {
	pub(crate) path: PathBuf,
	pub(crate) burst: Duration,

	/// Handle for installing kernel watches; replaced wholesale on reopen.
	pub(crate) watches: Watches,

	/// Event flags accumulated since the last dispatch.
	pub(crate) pending: EventMask,

	/// Some iff a deferred dispatch is armed; aborting it cancels the round.
	pub(crate) dispatch: Option<JoinHandle<()>>,

	/// Insertion-ordered subscription registry.
	pub(crate) subs: Vec<SubEntry>,
	pub(crate) next_token: u64,

	/// Set when a reopen failed and the watch went permanently silent.
	pub(crate) defunct: bool,
}

/// A watch over a single file path, coalescing bursts of kernel events
/// into one handler dispatch per quiescent window.
///
/// Dropping the watch cancels any armed dispatch, deregisters every
/// subscription, and closes the kernel event source.
pub struct Snotify {
	state: Rc<RefCell<WatchState>>,
	reader: JoinHandle<()>,
}

impl fmt::Debug for Snotify {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Snotify")
			.field("path", &self.state.borrow().path)
			.field("burst", &self.state.borrow().burst)
			.finish_non_exhaustive()
	}
}

impl Snotify {
	/// Opens a kernel event source for `path` and registers it with the
	/// event loop. No kernel watch is installed yet: interest starts empty
	/// and is widened by each [`add_watch`](Snotify::add_watch) call.
	///
	/// A zero `burst_window` is normalised to [`DEFAULT_BURST_WINDOW`].
	///
	/// # Panics
	///
	/// Must be called on a thread driving a tokio [`LocalSet`], within a
	/// runtime whose I/O driver is enabled; panics otherwise. The `LocalSet`
	/// is the creation scope that owns the watch's read loop and timers.
	///
	/// [`LocalSet`]: tokio::task::LocalSet
	pub fn new(path: impl Into<PathBuf>, burst_window: Duration) -> Result<Self, Error> {
		let path = path.into();
		let burst = if burst_window.is_zero() {
			DEFAULT_BURST_WINDOW
		} else {
			burst_window
		};

		debug!(?path, ?burst, "creating file watch");
		let (watches, stream) = source::open()?;

		let state = Rc::new(RefCell::new(WatchState {
			path,
			burst,
			watches,
			pending: EventMask::empty(),
			dispatch: None,
			subs: Vec::new(),
			next_token: 0,
			defunct: false,
		}));

		let reader = tokio::task::spawn_local(source::read_loop(Rc::downgrade(&state), stream));
		Ok(Self { state, reader })
	}

	/// Registers interest in `mask` on the watched path.
	///
	/// The handler is called with the watched path once per coalesced
	/// dispatch whose caught flags intersect `mask`, in subscription
	/// insertion order. The returned [`Subscription`] deregisters on drop.
	///
	/// An empty mask is rejected: the kernel would install it as a watch
	/// that can never fire.
	pub fn add_watch<F>(&self, mask: WatchMask, handler: F) -> Result<Subscription, Error>
	where
		F: FnMut(&Path) -> Status + 'static,
	{
		if mask.is_empty() {
			return Err(Error::EmptyMask);
		}

		let state = &mut *self.state.borrow_mut();
		if state.defunct {
			return Err(Error::Defunct {
				path: state.path.clone(),
			});
		}

		// MASK_ADD: all subscriptions share one kernel descriptor for the
		// path, so later installs must widen its mask, not replace it.
		let wd = state
			.watches
			.add(&state.path, mask | WatchMask::MASK_ADD)
			.map_err(|err| Error::AddWatch {
				path: state.path.clone(),
				err,
			})?;

		let token = state.next_token;
		state.next_token += 1;
		trace!(path = ?state.path, ?mask, token, "subscription added");

		state.subs.push(SubEntry {
			token,
			mask,
			wd,
			handler: Rc::new(RefCell::new(handler)),
		});

		Ok(Subscription::new(token, Rc::downgrade(&self.state)))
	}

	/// The watched path, as passed to every handler.
	#[must_use]
	pub fn path(&self) -> PathBuf {
		self.state.borrow().path.clone()
	}

	/// The effective burst window, after normalisation.
	#[must_use]
	pub fn burst_window(&self) -> Duration {
		self.state.borrow().burst
	}
}

impl Drop for Snotify {
	fn drop(&mut self) {
		{
			let mut state = self.state.borrow_mut();
			trace!(path = ?state.path, "tearing down file watch");

			if let Some(armed) = state.dispatch.take() {
				armed.abort();
			}

			// subscriptions never outlive their watch: clearing here
			// guarantees no handler fires past this point, even if a
			// dispatch round is currently walking the registry
			state.subs.clear();
			state.pending = EventMask::empty();
		}

		self.reader.abort();
	}
}
