use thiserror::Error;

/// Everything that can go wrong between the window and the engine.
///
/// The `Display` text is what ends up after `Error: ` in the status line.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad user input, caught before any worker is spawned.
    #[error("{0}")]
    Validation(String),

    #[error("a download is already running")]
    Busy,

    #[error("{0}")]
    Metadata(String),

    #[error("{0}")]
    Download(String),

    /// yt-dlp could not be located or started.
    #[error("yt-dlp unavailable: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_shown_verbatim() {
        let err = AppError::Validation("Please enter a URL".into());
        assert_eq!(err.to_string(), "Please enter a URL");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
