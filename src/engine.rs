use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    error::Result,
    model::{DownloadRequest, FormatDescriptor, ProgressEvent},
};

/// The external extractor/downloader, seen from the controller.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Metadata-only query. Formats come back in engine order, unfiltered.
    async fn fetch_formats(&self, url: &str) -> Result<Vec<FormatDescriptor>>;

    /// Writes the merged file. Without a sender the download still runs, just silently.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: Option<UnboundedSender<ProgressEvent>>,
    ) -> Result<()>;
}
