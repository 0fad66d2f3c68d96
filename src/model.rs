use serde::{Deserialize, Deserializer};

/// One unit of work for the download worker.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    /// Page URL handed to yt-dlp untouched
    pub url: String,
    /// yt-dlp output template, e.g. `/tmp/out/%(title)s.%(ext)s`
    pub output_template: String,
    /// Format id to fetch; `None` lets the engine pick
    pub format: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, folder: &str, format: Option<String>) -> Self {
        Self {
            url: url.into(),
            output_template: format!("{}/%(title)s.%(ext)s", folder),
            format,
        }
    }
}

/// A single rendition from the `formats` array of yt-dlp's info JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormatDescriptor {
    pub format_id: String,
    #[serde(default, deserialize_with = "lenient_uint")]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default, deserialize_with = "lenient_uint")]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
}

/// Some extractors emit whole numbers as floats (`1234.0`); accept both.
fn lenient_uint<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|v| v.is_finite() && *v >= 0.0)
        .and_then(|v| T::try_from(v.round() as u64).ok()))
}

impl FormatDescriptor {
    /// Video track present, audio track absent. Audio gets merged in by the engine.
    pub fn is_video_only(&self) -> bool {
        self.vcodec.as_deref() != Some("none") && self.acodec.as_deref() == Some("none")
    }

    /// Text shown in the quality picker.
    pub fn label(&self) -> String {
        let resolution = match self.height {
            Some(h) => format!("{}p", h),
            None => "?p".to_string(),
        };
        let fps = self.fps.map(|f| f.to_string()).unwrap_or_default();
        let size = match self.filesize {
            Some(bytes) if bytes > 0 => format!("{:.1}MB", bytes as f64 / 1024.0 / 1024.0),
            _ => "?".to_string(),
        };
        format!("{} {}fps - {} ({})", resolution, fps, size, self.format_id)
    }
}

/// Label/descriptor pair, indexed by its position in the picker.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatChoice {
    pub label: String,
    pub descriptor: FormatDescriptor,
}

impl From<FormatDescriptor> for FormatChoice {
    fn from(descriptor: FormatDescriptor) -> Self {
        Self {
            label: descriptor.label(),
            descriptor,
        }
    }
}

/// Progress reported by the engine while a download runs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// `percent` is `None` when the engine's text did not parse
    Downloading { percent: Option<f32>, eta: String },
    Finished,
    Error { message: String },
}

/// Where the controller is in the fetch → pick → download cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    FetchingFormats,
    AwaitingSelection,
    Downloading,
    Done,
    Failed,
}

impl Phase {
    /// A worker owns the slot in these phases.
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::FetchingFormats | Phase::Downloading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn descriptor(id: &str, height: Option<u32>, fps: Option<f64>, filesize: Option<u64>) -> FormatDescriptor {
        FormatDescriptor {
            format_id: id.to_string(),
            height,
            fps,
            filesize,
            vcodec: Some("avc1".into()),
            acodec: Some("none".into()),
        }
    }

    #[test]
    fn labels_match_picker_text() {
        let hd = descriptor("137", Some(1080), Some(30.0), Some(52_428_800));
        let tiny = descriptor("160", Some(144), Some(30.0), Some(1_048_576));
        assert_eq!(hd.label(), "1080p 30fps - 50.0MB (137)");
        assert_eq!(tiny.label(), "144p 30fps - 1.0MB (160)");
    }

    #[test]
    fn fractional_fps_is_kept() {
        let d = descriptor("299", Some(1080), Some(29.97), Some(10 * 1024 * 1024));
        assert_eq!(d.label(), "1080p 29.97fps - 10.0MB (299)");
    }

    #[test]
    fn missing_fields_render_placeholders() {
        let d = descriptor("sb0", None, None, None);
        assert_eq!(d.label(), "?p fps - ? (sb0)");
        let zero = descriptor("x", Some(360), Some(25.0), Some(0));
        assert_eq!(zero.label(), "360p 25fps - ? (x)");
    }

    #[test]
    fn video_only_filter() {
        let mut d = descriptor("137", Some(1080), None, None);
        assert!(d.is_video_only());

        d.acodec = Some("mp4a.40.2".into());
        assert!(!d.is_video_only());

        d.acodec = Some("none".into());
        d.vcodec = Some("none".into());
        assert!(!d.is_video_only());

        d.vcodec = None;
        assert!(d.is_video_only());

        d.acodec = None;
        assert!(!d.is_video_only());
    }

    #[test]
    fn deserializes_from_info_json_entry() {
        let raw = r#"{
            "format_id": "137",
            "height": 1080,
            "fps": 30,
            "filesize": null,
            "vcodec": "avc1.640028",
            "acodec": "none",
            "ext": "mp4",
            "tbr": 4400.5
        }"#;
        let d: FormatDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(d.format_id, "137");
        assert_eq!(d.height, Some(1080));
        assert_eq!(d.fps, Some(30.0));
        assert_eq!(d.filesize, None);
        assert!(d.is_video_only());
    }

    #[test]
    fn float_sizes_and_heights_are_accepted() {
        let raw = r#"{ "format_id": "18", "height": 360.0, "filesize": 1234.0, "acodec": "none" }"#;
        let d: FormatDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(d.height, Some(360));
        assert_eq!(d.filesize, Some(1234));

        let odd = r#"{ "format_id": "x", "height": -1, "filesize": 1e30 }"#;
        let d: FormatDescriptor = serde_json::from_str(odd).unwrap();
        assert_eq!(d.height, None);
        assert_eq!(d.filesize, Some(u64::MAX));
    }

    #[test]
    fn output_template_uses_literal_slash() {
        let req = DownloadRequest::new("https://example.com/v1", "/tmp/out", Some("137".into()));
        assert_eq!(req.output_template, "/tmp/out/%(title)s.%(ext)s");
        assert_eq!(req.format.as_deref(), Some("137"));
    }

    #[test]
    fn busy_phases() {
        assert!(Phase::FetchingFormats.is_busy());
        assert!(Phase::Downloading.is_busy());
        assert!(!Phase::Idle.is_busy());
        assert!(!Phase::AwaitingSelection.is_busy());
        assert!(!Phase::Done.is_busy());
        assert!(!Phase::Failed.is_busy());
    }

    proptest! {
        #[test]
        fn missing_height_always_renders_question_mark(
            id in "[a-z0-9]{1,6}",
            fps in proptest::option::of(1u32..240),
            size in proptest::option::of(0u64..10_000_000_000),
        ) {
            let d = descriptor(&id, None, fps.map(f64::from), size);
            let label = d.label();
            prop_assert!(label.starts_with("?p "));
            let suffix = format!("({})", id);
            prop_assert!(label.ends_with(&suffix));
        }
    }
}
