//! Snotify: coalescing change notifications for single watched files.
//!
//! Long-lived services that keep configuration-like flat files in memory
//! (canonically the local account databases) need to know when to re-read
//! them. Editors saving such files produce several low-level inotify
//! events in quick succession, and the rename-into-place save strategy
//! invalidates the kernel watch entirely. This crate turns that noise into
//! a single "the file you asked about changed" callback per burst, and
//! transparently re-establishes the kernel watch when the inode under the
//! path is replaced.
//!
//! This library is powered by [Tokio](https://tokio.rs). A watch must be
//! created on a thread driving a [`LocalSet`][tokio::task::LocalSet]: the
//! whole core is single-threaded cooperative, with the read loop, the
//! dispatch timer, and every handler invocation serialised on that thread.
//!
//! ```no_run
//! use std::time::Duration;
//! use snotify::{Snotify, WatchMask};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> miette::Result<()> {
//!     tokio::task::LocalSet::new()
//!         .run_until(async {
//!             let passwd = Snotify::new("/etc/passwd", Duration::from_secs(1))?;
//!             let _refresh = passwd.add_watch(
//!                 WatchMask::CLOSE_WRITE | WatchMask::MOVE_SELF | WatchMask::DELETE_SELF,
//!                 |path| {
//!                     println!("{} settled, re-read it now", path.display());
//!                     Ok(())
//!                 },
//!             )?;
//!
//!             // notifications flow for as long as the watch and the
//!             // subscription are both alive
//!             std::future::pending::<()>().await;
//!             Ok(())
//!         })
//!         .await
//! }
//! ```
//!
//! A dispatch tells subscribers to re-read the file now; it is not an edit
//! log. Events landing while a reopen is in flight are not reported, and
//! the caught flags are never passed through to handlers.

#![warn(clippy::unwrap_used, missing_docs)]
#![deny(rust_2018_idioms)]

pub mod errors;

mod dispatch;
mod snotify;
mod source;
mod subscription;

#[doc(inline)]
pub use crate::{
	snotify::{Snotify, Status, DEFAULT_BURST_WINDOW},
	subscription::Subscription,
};

// Masks are the kernel's own bits, passed through untouched.
#[doc(no_inline)]
pub use inotify::{EventMask, WatchMask};
