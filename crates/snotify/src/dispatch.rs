//! Burst coalescing and the deferred dispatch round.

use std::{
	cell::RefCell,
	mem,
	rc::{Rc, Weak},
};

use inotify::{EventMask, WatchMask};
use tokio::time::sleep;
use tracing::{debug, error, trace};

use crate::snotify::WatchState;

/// Folds a raw event's flags into the pending set and ensures at most one
/// dispatch is scheduled for the current burst.
pub(crate) fn absorb(state: &Rc<RefCell<WatchState>>, mask: EventMask) {
	let mut st = state.borrow_mut();
	st.pending |= mask;

	if st.dispatch.is_some() {
		trace!(path = ?st.path, "change already queued for dispatch");
		return;
	}

	let window = st.burst;
	let weak = Rc::downgrade(state);
	st.dispatch = Some(tokio::task::spawn_local(async move {
		sleep(window).await;
		run(&weak);
	}));
}

/// One dispatch round: snapshot and reset the pending flags, then fan out
/// to every subscription whose mask intersects them, in insertion order.
///
/// The registry borrow is released before each handler call, so a handler
/// may drop its own or a sibling subscription, or add a new one. Entries
/// added mid-round are not visited; entries removed mid-round are skipped.
fn run(state: &Weak<RefCell<WatchState>>) {
	let Some(state) = state.upgrade() else {
		return;
	};

	let (path, caught, round) = {
		let mut st = state.borrow_mut();
		st.dispatch = None;
		let caught = mem::replace(&mut st.pending, EventMask::empty());
		let round = st
			.subs
			.iter()
			.filter(|sub| overlaps(sub.mask, caught))
			.map(|sub| (sub.token, Rc::clone(&sub.handler)))
			.collect::<Vec<_>>();
		(st.path.clone(), caught, round)
	};

	debug!(?path, ?caught, matched = round.len(), "dispatching coalesced change");

	for (token, handler) in round {
		if !state.borrow().subs.iter().any(|sub| sub.token == token) {
			trace!(?path, token, "subscription removed mid-dispatch, skipping");
			continue;
		}

		if let Err(err) = (&mut *handler.borrow_mut())(&path) {
			error!(?path, token, %err, "change handler failed");
		}
	}
}

/// Subscription masks are watch flags, caught flags are event flags; the
/// kernel uses the same bit positions for both, so intersection is a raw
/// bit test.
fn overlaps(interest: WatchMask, caught: EventMask) -> bool {
	interest.bits() & caught.bits() != 0
}
