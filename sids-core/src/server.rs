//! Listening side: accept loop and per-connection sessions.
//!
//! Every accepted connection gets its own [`CommandProcessor`] task. All
//! sessions share the same frame slot and the same pre-encoded replies.
//! Stopping the server only ends the accept loop; sessions already running
//! continue until their peer disconnects.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::CURRENT_VERSION;
use crate::error::SidsError;
use crate::metadata::MetadataRecord;
use crate::session::{CommandProcessor, RECV_BUFFER_SIZE, Replies};
use crate::slot::FrameSlot;

// ── ServerConfig ─────────────────────────────────────────────────

/// Configuration for [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind, e.g. `0.0.0.0`.
    pub bind_address: String,
    /// TCP port. `0` picks an ephemeral port.
    pub port: u16,
    /// Bytes taken by one request read.
    pub recv_buffer: usize,
    /// Reply to `GET_VERSION`.
    pub version: String,
    /// How long to wait for open sessions after the accept loop ends.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 0,
            recv_buffer: RECV_BUFFER_SIZE,
            version: CURRENT_VERSION.into(),
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

// ── Server ───────────────────────────────────────────────────────

/// A bound image data server.
pub struct Server {
    listener: TcpListener,
    slot: Arc<FrameSlot>,
    replies: Replies,
    running: Arc<AtomicBool>,
    config: ServerConfig,
}

impl Server {
    /// Bind the listening socket for a stream described by `metadata`.
    ///
    /// A bind failure is a [`SidsError::Connection`]; it is never retried.
    pub async fn bind(
        config: ServerConfig,
        metadata: &MetadataRecord,
        slot: Arc<FrameSlot>,
    ) -> Result<Self, SidsError> {
        if slot.frame_size() != metadata.frame_size() {
            return Err(SidsError::UnsupportedStream(format!(
                "slot holds {} bytes but {metadata} describes {}",
                slot.frame_size(),
                metadata.frame_size()
            )));
        }
        let replies = Replies::new(metadata, &config.version)?;

        let addr = format!("{}:{}", config.bind_address, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| SidsError::connection(format!("bind {addr}"), e))?;

        Ok(Self {
            listener,
            slot,
            replies,
            running: Arc::new(AtomicBool::new(true)),
            config,
        })
    }

    /// Share an existing running flag, typically the producer's.
    pub fn with_running(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SidsError> {
        self.listener
            .local_addr()
            .map_err(|e| SidsError::connection("query listener address", e))
    }

    /// A cloneable handle; storing `false` stops the accept loop.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Whether the accept loop is (still) allowed to run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Accept connections until stopped.
    ///
    /// An accept failure ends the loop with [`SidsError::Connection`].
    pub async fn run(self) -> Result<(), SidsError> {
        let local = self.local_addr()?;
        info!("image data server listening on {local}");

        let mut sessions: Vec<JoinHandle<u64>> = Vec::new();
        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }

            let accept = tokio::select! {
                result = self.listener.accept() => result,
                _ = Self::wait_for_stop(&self.running) => break Ok(()),
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => break Err(SidsError::connection("accept", e)),
            };

            info!("handling client {peer}");
            if let Err(e) = stream.set_nodelay(true) {
                debug!("set_nodelay failed for {peer}: {e}");
            }

            let processor = CommandProcessor::new(
                Arc::clone(&self.slot),
                self.replies.clone(),
                self.config.recv_buffer,
            );
            sessions.retain(|h| !h.is_finished());
            sessions.push(tokio::spawn(async move {
                let frames = processor.run(stream).await;
                info!("client {peer} disconnected after {frames} frames");
                frames
            }));
        };

        Self::drain(sessions, self.config.shutdown_grace).await;
        info!("image data server on {local} stopped");
        result
    }

    /// Wait up to `grace` for open sessions, then leave them detached.
    async fn drain(sessions: Vec<JoinHandle<u64>>, grace: Duration) {
        let open: Vec<_> = sessions.into_iter().filter(|h| !h.is_finished()).collect();
        if open.is_empty() {
            return;
        }
        let count = open.len();
        let joined = tokio::time::timeout(grace, async {
            for handle in open {
                let _ = handle.await;
            }
        })
        .await;
        if joined.is_err() {
            warn!("{count} session(s) still open at shutdown; detaching");
        }
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
