use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const POST_IMAGE_DIRECTORY: &str = "posts";

/// Relative location of an uploaded file, such as `posts/small.gif`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaPath(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The media path is invalid: {0}")]
pub struct InvalidMediaPathError(String);

impl MediaPath {
    pub fn new(path: String) -> Result<Self, InvalidMediaPathError> {
        let valid = !path.is_empty()
            && path
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        if valid {
            Ok(Self(path))
        } else {
            Err(InvalidMediaPathError(path))
        }
    }

    #[must_use]
    pub fn in_directory(directory: &str, file_name: &str) -> Self {
        Self(format!("{directory}/{file_name}"))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for MediaPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of image the upload sniffer recognizes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ImageFormat {
    Gif,
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// Guesses the format from the file's magic bytes.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.starts_with(b"\xFF\xD8\xFF") {
            Some(Self::Jpeg)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if data.len() >= 14 && data.starts_with(b"BM") {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }
}

/// Media record as stored, bytes included.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Media {
    pub path: MediaPath,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use crate::model::media::{ImageFormat, MediaPath};

    const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\
        \x01\x00\x80\x00\x00\x00\x00\x00\
        \xFF\xFF\xFF\x21\xF9\x04\x00\x00\
        \x00\x00\x00\x2C\x00\x00\x00\x00\
        \x02\x00\x01\x00\x00\x02\x02\x0C\
        \x0A\x00\x3B";

    #[test]
    fn sniff_formats() {
        assert_eq!(ImageFormat::sniff(SMALL_GIF), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::sniff(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::sniff(b"\xFF\xD8\xFF\xE0\0\x10JFIF"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::sniff(b"RIFF\x24\0\0\0WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
        assert_eq!(ImageFormat::sniff(b"plain text, not an image"), None);
        assert_eq!(ImageFormat::sniff(b""), None);
    }

    #[test]
    fn media_paths() {
        assert!(MediaPath::new("posts/small.gif".to_owned()).is_ok());
        assert!(MediaPath::new("posts/../secret".to_owned()).is_err());
        assert!(MediaPath::new("/posts/small.gif".to_owned()).is_err());
        assert!(MediaPath::new(String::new()).is_err());
        assert_eq!(
            MediaPath::in_directory("posts", "small.gif").get(),
            "posts/small.gif"
        );
    }
}
