use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use rust_embed::RustEmbed;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};

use crate::{
    config::AppConfig,
    engine::Engine,
    error::{AppError, Result},
    model::{DownloadRequest, FormatDescriptor, ProgressEvent},
    progress::{parse_progress_line, progress_template},
};

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

const BIN_NAME: &str = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };

#[derive(Deserialize)]
struct InfoJson {
    #[serde(default)]
    formats: Vec<FormatDescriptor>,
}

/// [`Engine`] backed by the yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: PathBuf,
    default_format: String,
    merge_output_format: String,
    concurrent_fragments: u32,
}

impl YtDlp {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let bin = locate_binary(cfg.ytdlp_path.as_deref())?;
        tracing::info!(bin = %bin.display(), "using yt-dlp");
        Ok(Self::with_binary(bin, cfg))
    }

    pub fn with_binary(bin: PathBuf, cfg: &AppConfig) -> Self {
        Self {
            bin,
            default_format: cfg.default_format.clone(),
            merge_output_format: cfg.merge_output_format.clone(),
            concurrent_fragments: cfg.concurrent_fragments,
        }
    }

    fn metadata_args(url: &str) -> Vec<String> {
        vec![
            "-J".to_owned(),
            "--no-playlist".to_owned(),
            "--no-warnings".to_owned(),
            "--skip-download".to_owned(),
            url.to_owned(),
        ]
    }

    fn download_args(&self, request: &DownloadRequest) -> Vec<String> {
        let format = request.format.clone().unwrap_or_else(|| self.default_format.clone());
        let mut args = vec!["-f".to_owned(), format];

        args.push("--merge-output-format".to_owned());
        args.push(self.merge_output_format.clone());
        args.push("--concurrent-fragments".to_owned());
        args.push(self.concurrent_fragments.to_string());
        args.push("--no-playlist".to_owned());

        args.push("--progress-template".to_owned());
        args.push(progress_template());
        args.push("--newline".to_owned());

        args.push("-o".to_owned());
        args.push(request.output_template.clone());
        args.push(request.url.clone());
        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> AppError {
        AppError::Engine(format!("failed to start {}: {}", self.bin.display(), e))
    }
}

#[async_trait]
impl Engine for YtDlp {
    async fn fetch_formats(&self, url: &str) -> Result<Vec<FormatDescriptor>> {
        let args = Self::metadata_args(url);
        tracing::debug!(?args, "fetching metadata");

        let output = self.command(&args).output().await.map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, "metadata query failed");
            return Err(AppError::Metadata(failure_message(&stderr, output.status)));
        }

        let info: InfoJson = serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::Metadata(format!("yt-dlp returned invalid JSON: {}", e)))?;
        tracing::info!(count = info.formats.len(), "metadata fetched");
        Ok(info.formats)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: Option<UnboundedSender<ProgressEvent>>,
    ) -> Result<()> {
        let args = self.download_args(request);
        tracing::info!(?args, "starting download");

        let mut child = self.command(&args).spawn().map_err(|e| self.spawn_error(e))?;

        let mut err_pipe = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Engine("stderr not captured".into()))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = err_pipe.read_to_string(&mut buf).await;
            buf
        });

        let out = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Engine("stdout not captured".into()))?;
        // Non-UTF-8 bytes (titles in a local code page) are decoded lossily.
        let mut lines = BufReader::new(out).split(b'\n');
        let read = loop {
            match lines.next_segment().await {
                Ok(Some(raw)) => {
                    let line = String::from_utf8_lossy(&raw);
                    tracing::trace!(line = %line.trim_end(), "yt-dlp");
                    if let Some(event) = parse_progress_line(&line) {
                        if let Some(tx) = &progress {
                            let _ = tx.send(event);
                        }
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        if let Err(e) = read {
            tracing::warn!(error = %e, "lost yt-dlp output, stopping it");
            let _ = child.kill().await;
            return Err(AppError::Io(e));
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            tracing::warn!(%status, "download failed");
            return Err(AppError::Download(failure_message(&stderr, status)));
        }
        tracing::info!(url = %request.url, "download finished");
        Ok(())
    }
}

/// Explicit path, then the bundled copy, then whatever `PATH` resolves.
fn locate_binary(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "configured yt-dlp not found, falling back");
    }

    if let Some(data) = Asset::get(BIN_NAME) {
        let tmp = std::env::temp_dir().join(BIN_NAME);
        unpack(&tmp, &data.data)?;
        return Ok(tmp);
    }

    Ok(PathBuf::from(BIN_NAME))
}

/// Writes the bundled binary unless an identical-length copy is already there.
fn unpack(target: &Path, bytes: &[u8]) -> Result<()> {
    let current = std::fs::metadata(target).map(|m| m.len()).ok();
    if current == Some(bytes.len() as u64) {
        return Ok(());
    }
    let mut f = File::create(target)?;
    f.write_all(bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(target, std::fs::Permissions::from_mode(0o755))?;
    }
    tracing::debug!(path = %target.display(), stale = current.is_some(), "unpacked bundled yt-dlp");
    Ok(())
}

/// Picks the line worth showing from yt-dlp's stderr.
fn failure_message(stderr: &str, status: ExitStatus) -> String {
    if let Some(line) = stderr.lines().rev().find_map(|l| l.trim().strip_prefix("ERROR:")) {
        return line.trim().to_string();
    }
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("yt-dlp exited with {}", status)
    } else {
        trimmed.to_string()
    }
}
