use crate::model::ProgressEvent;

/// Prefix written by our `--progress-template`; everything else on stdout is ignored.
pub const PROGRESS_PREFIX: &str = "ytgrab:";

/// Value of yt-dlp's `--progress-template` for downloads.
pub fn progress_template() -> String {
    format!(
        "download:{}%(progress.status)s|%(progress._percent_str)s|%(progress._eta_str)s",
        PROGRESS_PREFIX
    )
}

/// Parses yt-dlp's `_percent_str`, e.g. `" 42.7%"`.
pub fn parse_percent(text: &str) -> Option<f32> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number.parse::<f32>().ok().filter(|v| v.is_finite())
}

pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.splitn(3, '|');
    let status = fields.next()?.trim();
    match status {
        "downloading" => {
            let percent = fields.next().and_then(parse_percent);
            let eta = fields.next().map(str::trim).filter(|s| !s.is_empty()).unwrap_or("...");
            Some(ProgressEvent::Downloading {
                percent,
                eta: eta.to_string(),
            })
        }
        "finished" => Some(ProgressEvent::Finished),
        _ => None,
    }
}
