//! Kernel event source: the read loop and reopen recovery.

use std::{
	cell::RefCell,
	rc::{Rc, Weak},
};

use futures::StreamExt;
use inotify::{EventMask, EventStream, Inotify, WatchMask, Watches};
use tracing::{debug, error, trace};

use crate::{dispatch, errors::Error, snotify::WatchState};

/// Big enough for a queued run of events with names; anything beyond one
/// record per wake simply retriggers readiness.
const EVENT_BUFFER_SIZE: usize = 4096;

pub(crate) type KernelStream = EventStream<Vec<u8>>;

/// Opens one inotify instance (non-blocking, close-on-exec) and registers
/// its descriptor with the reactor. No watch is installed here: masks are
/// carried by subscriptions.
pub(crate) fn open() -> Result<(Watches, KernelStream), Error> {
	let mut kernel = Inotify::init().map_err(|err| Error::Init { err })?;
	let watches = kernel.watches();
	let stream = kernel
		.into_event_stream(vec![0_u8; EVENT_BUFFER_SIZE])
		.map_err(|err| Error::Register { err })?;
	Ok((watches, stream))
}

/// Drains the kernel queue one event record per wake, for as long as the
/// owning watch is alive.
pub(crate) async fn read_loop(state: Weak<RefCell<WatchState>>, mut stream: KernelStream) {
	loop {
		let event = match stream.next().await {
			Some(Ok(event)) => event,
			Some(Err(err)) => {
				// leave all state untouched, don't arm anything
				error!(?err, "cannot read inotify event");
				continue;
			}
			None => {
				debug!("inotify event stream ended");
				break;
			}
		};

		let Some(state) = state.upgrade() else {
			break;
		};
		trace!(mask = ?event.mask, wd = ?event.wd, "raw kernel event");

		// Watch invalidated: the inode under the path is gone, typically
		// replaced by an editor's rename-into-place. The kernel side must
		// be rebuilt before this event is accounted for.
		if event.mask.contains(EventMask::IGNORED) {
			match reopen(&state) {
				Ok(fresh) => stream = fresh,
				Err(err) => {
					error!(path = ?state.borrow().path, %err, "reopen failed, tearing watch down");
					teardown(&state);
					break;
				}
			}
		}

		dispatch::absorb(&state, event.mask);
	}
}

/// Rebuilds the kernel watch on whatever inode now holds the path and
/// migrates every subscription onto it, in insertion order. Subscribers
/// keep their identity; only the kernel descriptors refresh. Pending flags
/// and an armed dispatch carry over untouched.
fn reopen(state: &Rc<RefCell<WatchState>>) -> Result<KernelStream, Error> {
	let st = &mut *state.borrow_mut();
	debug!(
		path = ?st.path,
		subscriptions = st.subs.len(),
		"rebuilding kernel watch after inode replacement"
	);

	let (mut watches, stream) = open()?;
	for sub in &mut st.subs {
		let wd = watches
			.add(&st.path, sub.mask | WatchMask::MASK_ADD)
			.map_err(|err| Error::AddWatch {
				path: st.path.clone(),
				err,
			})?;
		trace!(token = sub.token, old = ?sub.wd, new = ?wd, "subscription migrated");
		sub.wd = wd;
	}

	// the old descriptor closes when the caller swaps the stream out
	st.watches = watches;
	Ok(stream)
}

/// Terminal state after a failed reopen: the subscription set is emptied
/// and any armed dispatch cancelled. Subscribers observe their handlers
/// going silent; later `add_watch` calls fail with `Error::Defunct`.
fn teardown(state: &Rc<RefCell<WatchState>>) {
	let mut st = state.borrow_mut();
	st.defunct = true;
	st.pending = EventMask::empty();
	if let Some(armed) = st.dispatch.take() {
		armed.abort();
	}
	st.subs.clear();
}
