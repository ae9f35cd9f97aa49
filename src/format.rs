//! Container format detection.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Video container format, as far as the crate cares.
///
/// WebM files frequently lack a reliable duration and seek less precisely,
/// so they get lower probe confidences and a more tolerant calibration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Webm,
    Mp4,
    Avi,
    Mov,
    Wmv,
    #[default]
    Unknown,
}

impl ContainerFormat {
    /// Detect the format from a file name's extension.
    ///
    /// ```
    /// use video2ppt::ContainerFormat;
    ///
    /// assert_eq!(ContainerFormat::from_path("talk.WEBM"), ContainerFormat::Webm);
    /// assert_eq!(ContainerFormat::from_path("notes.txt"), ContainerFormat::Unknown);
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        path.as_ref()
            .extension()
            .and_then(|extension| extension.to_str())
            .map(Self::from_extension)
            .unwrap_or_default()
    }

    /// Detect the format from a bare extension such as `"mp4"`.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "webm" => ContainerFormat::Webm,
            "mp4" | "m4v" => ContainerFormat::Mp4,
            "avi" => ContainerFormat::Avi,
            "mov" => ContainerFormat::Mov,
            "wmv" => ContainerFormat::Wmv,
            _ => ContainerFormat::Unknown,
        }
    }

    /// Detect the format from a MIME type such as `"video/webm"`.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        [
            ("webm", ContainerFormat::Webm),
            ("mp4", ContainerFormat::Mp4),
            ("avi", ContainerFormat::Avi),
            ("quicktime", ContainerFormat::Mov),
            ("mov", ContainerFormat::Mov),
            ("wmv", ContainerFormat::Wmv),
        ]
        .into_iter()
        .find(|(needle, _)| mime.contains(needle))
        .map(|(_, format)| format)
        .unwrap_or_default()
    }

    pub fn is_webm(self) -> bool {
        self == ContainerFormat::Webm
    }
}

impl Display for ContainerFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ContainerFormat::Webm => "webm",
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Avi => "avi",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Wmv => "wmv",
            ContainerFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ContainerFormat;

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(ContainerFormat::from_path("a/b/Lecture.Mp4"), ContainerFormat::Mp4);
        assert_eq!(ContainerFormat::from_path("clip.mov"), ContainerFormat::Mov);
        assert_eq!(ContainerFormat::from_path("no_extension"), ContainerFormat::Unknown);
    }

    #[test]
    fn mime_types() {
        assert_eq!(ContainerFormat::from_mime("video/webm;codecs=vp9"), ContainerFormat::Webm);
        assert_eq!(ContainerFormat::from_mime("video/quicktime"), ContainerFormat::Mov);
        assert_eq!(ContainerFormat::from_mime("application/octet-stream"), ContainerFormat::Unknown);
    }
}
