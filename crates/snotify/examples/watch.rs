//! Watches one file and logs a line every time it settles after a change.
//!
//! Run with e.g.:
//!
//!     cargo run --example watch -- /etc/passwd
//!
//! then edit the file (including saving over it from an editor) and watch
//! the dispatches arrive, one per burst.

use std::time::Duration;

use miette::{miette, Result};
use snotify::{Snotify, WatchMask};
use tokio::task::LocalSet;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
	tracing_subscriber::fmt::init();

	let path = std::env::args()
		.nth(1)
		.ok_or_else(|| miette!("usage: watch <file>"))?;

	LocalSet::new()
		.run_until(async move {
			let watch = Snotify::new(path.as_str(), Duration::from_secs(1))?;
			let _changes = watch.add_watch(
				WatchMask::MODIFY
					| WatchMask::CLOSE_WRITE
					| WatchMask::MOVE_SELF
					| WatchMask::DELETE_SELF,
				|path| {
					info!(?path, "file settled after changes, re-read it now");
					Ok(())
				},
			)?;

			info!(%path, "watching, edit the file to see dispatches");
			std::future::pending::<()>().await;
			Ok(())
		})
		.await
}
