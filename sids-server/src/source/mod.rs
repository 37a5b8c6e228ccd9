//! Frame sources the server can publish.

pub mod blob;
pub mod filter;
pub mod pattern;

use sids_core::{Client, ClientConfig, FrameSource, SidsError};
use tracing::info;

use crate::config::{ServerFileConfig, SourceKind};

pub use blob::BlobDetectorSource;
pub use filter::{ColorFilter, ColorFilterSource};
pub use pattern::TestPattern;

/// Build the configured source, connecting upstream when needed.
pub async fn build(config: &ServerFileConfig) -> Result<Box<dyn FrameSource>, SidsError> {
    let source: Box<dyn FrameSource> = match config.source.kind {
        SourceKind::Pattern => Box::new(TestPattern::new(
            config.source.width,
            config.source.height,
            config.source.color,
        )),
        SourceKind::ColorFilter => {
            let upstream = connect_upstream(config).await?;
            Box::new(ColorFilterSource::new(
                upstream,
                ColorFilter::from_config(&config.filter),
            )?)
        }
        SourceKind::Blob => {
            let upstream = connect_upstream(config).await?;
            Box::new(BlobDetectorSource::new(upstream, config.blob.threshold)?)
        }
    };
    info!("source {:?} publishes {}", config.source.kind, source.metadata());
    Ok(source)
}

async fn connect_upstream(config: &ServerFileConfig) -> Result<Client, SidsError> {
    let client_config = ClientConfig {
        connect_timeout: config.connect_timeout(),
        ..ClientConfig::default()
    };
    Client::connect(&config.source.upstream, &client_config).await
}
