//! Frame pulling loops for the two view modes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use sids_core::{BlobClient, BlobCoordinate, Client, SidsError};

use crate::config::ViewConfig;
use crate::display::FrameStats;

fn more(view: &ViewConfig, received: u64, running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst) && (view.frames == 0 || received < view.frames)
}

async fn pause(view: &ViewConfig) {
    if view.interval_ms > 0 {
        tokio::time::sleep(Duration::from_millis(view.interval_ms)).await;
    }
}

/// Pull frames and keep statistics until stopped or the frame limit is hit.
pub async fn view_pixels<S>(
    client: &mut Client<S>,
    view: &ViewConfig,
    running: &AtomicBool,
) -> Result<FrameStats, SidsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stats = FrameStats::new();
    while more(view, stats.frames(), running) {
        client.next_frame().await?;
        stats.record(client.payload());
        if view.report_every > 0 && stats.frames() % view.report_every == 0 {
            info!("{stats}");
        }
        pause(view).await;
    }
    Ok(stats)
}

/// Pull coordinates and hand every non-origin one to `on_blob`.
///
/// Returns the number of coordinates received.
pub async fn view_blobs<S, F>(
    client: &mut BlobClient<S>,
    view: &ViewConfig,
    running: &AtomicBool,
    mut on_blob: F,
) -> Result<u64, SidsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(BlobCoordinate),
{
    let mut received = 0u64;
    while more(view, received, running) {
        let coord = client.coordinate().await?;
        received += 1;
        if !coord.is_origin() {
            on_blob(coord);
        }
        pause(view).await;
    }
    Ok(received)
}
