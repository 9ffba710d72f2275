//! Subscriber registration and the drop-deregistration contract.

use std::{
	cell::RefCell,
	fmt,
	path::Path,
	rc::{Rc, Weak},
};

use inotify::{WatchDescriptor, WatchMask};
use tracing::trace;

use crate::snotify::{Status, WatchState};

/// A registered change handler, shared between the registry and an
/// in-flight dispatch round so the round survives the handler dropping its
/// own registration mid-call.
pub(crate) type Handler = Rc<RefCell<dyn FnMut(&Path) -> Status>>;

/// One registry entry. Identity is the token, not the kernel descriptor:
/// `wd` is refreshed on reopen while the token (and thus the subscriber's
/// handle) stays valid.
pub(crate) struct SubEntry {
	pub(crate) token: u64,
	pub(crate) mask: WatchMask,
	pub(crate) wd: WatchDescriptor,
	pub(crate) handler: Handler,
}

/// A live interest in changes to one watched path.
///
/// Returned by [`Snotify::add_watch`](crate::Snotify::add_watch). Dropping
/// it deregisters the handler synchronously: once the drop returns, the
/// handler will not be called again, including by a dispatch round already
/// in flight that has not yet reached it.
#[must_use = "dropping a Subscription immediately deregisters its handler"]
pub struct Subscription {
	token: u64,
	state: Weak<RefCell<WatchState>>,
}

impl Subscription {
	pub(crate) fn new(token: u64, state: Weak<RefCell<WatchState>>) -> Self {
		Self { token, state }
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("token", &self.token)
			.finish_non_exhaustive()
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		// no-op if the parent watch is already gone
		if let Some(state) = self.state.upgrade() {
			let mut state = state.borrow_mut();
			state.subs.retain(|sub| sub.token != self.token);
			trace!(path = ?state.path, token = self.token, "subscription removed");
		}
	}
}
