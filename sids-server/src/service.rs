//! Server service: one frame source, one slot, one listener.
//!
//! The producer and the accept loop share a single running flag. A
//! producer failure stops the service and is returned from `run`, unless
//! `source.stop_on_error` is off; then the slot keeps its last frame and
//! sessions are served until the service is stopped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

use sids_core::{FrameSlot, FrameSource, MetadataRecord, Producer, Server, SidsError};

use crate::config::ServerFileConfig;
use crate::source;

// ── ImageDataService ─────────────────────────────────────────────

/// The top-level image data server service.
pub struct ImageDataService {
    config: ServerFileConfig,
    source: Box<dyn FrameSource>,
    server: Server,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
}

impl ImageDataService {
    /// Build the source and bind the listener.
    pub async fn bind(config: ServerFileConfig) -> Result<Self, SidsError> {
        let source = source::build(&config).await?;
        Self::with_source(config, source).await
    }

    /// Bind the listener for an already constructed source.
    pub async fn with_source(
        config: ServerFileConfig,
        source: Box<dyn FrameSource>,
    ) -> Result<Self, SidsError> {
        let metadata = source.metadata();
        let slot = Arc::new(FrameSlot::new(metadata.frame_size(), config.to_slot_config()));
        let running = Arc::new(AtomicBool::new(true));
        let server = Server::bind(config.to_server_config(), &metadata, Arc::clone(&slot))
            .await?
            .with_running(Arc::clone(&running));
        Ok(Self {
            config,
            source,
            server,
            slot,
            running,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SidsError> {
        self.server.local_addr()
    }

    /// Stream shape this service publishes.
    pub fn metadata(&self) -> MetadataRecord {
        self.source.metadata()
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task or a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run producer and accept loop until stopped.
    pub async fn run(self) -> Result<(), SidsError> {
        let Self {
            config,
            source,
            server,
            slot,
            running,
        } = self;

        let producer = Producer::new(
            source,
            slot,
            Arc::clone(&running),
            config.to_producer_config(),
        );
        let stop_on_error = config.source.stop_on_error;
        let producer_running = Arc::clone(&running);
        let producer_handle = tokio::spawn(async move {
            match producer.run().await {
                Ok(frames) => {
                    info!("producer finished after {frames} frames");
                    None
                }
                Err(e) if stop_on_error => {
                    error!("producer stopped: {e}; shutting down");
                    producer_running.store(false, Ordering::SeqCst);
                    Some(e)
                }
                Err(e) => {
                    error!("producer stopped: {e}; serving the last frame");
                    None
                }
            }
        });

        let result = server.run().await;
        running.store(false, Ordering::SeqCst);

        // An upstream source may be parked in a read; do not wait forever.
        let grace = Duration::from_millis(config.network.shutdown_grace_ms);
        let abort = producer_handle.abort_handle();
        let producer_error = match tokio::time::timeout(grace, producer_handle).await {
            Ok(Ok(err)) => err,
            Ok(Err(e)) => {
                warn!("producer task failed: {e}");
                None
            }
            Err(_) => {
                warn!("producer did not stop within {grace:?}; aborting");
                abort.abort();
                None
            }
        };

        info!("image data service stopped");
        result?;
        producer_error.map_or(Ok(()), Err)
    }
}

// ── Tests ────────────────────────────────────────────────────────
