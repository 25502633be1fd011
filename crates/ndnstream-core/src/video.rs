//! Target video resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Default capture width when no size is requested.
pub const DEFAULT_WIDTH: u32 = 1280;

/// Default capture height when no size is requested.
pub const DEFAULT_HEIGHT: u32 = 720;

/// Resolution the encoder scales to and the player expects.
///
/// Parsed from the `<width>x<height>` form, e.g. "1280x720".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Resolves an optional user request, falling back to 1280x720.
    pub fn resolve(requested: Option<&str>) -> DomainResult<Self> {
        match requested {
            Some(value) => value.parse(),
            None => Ok(Self::default()),
        }
    }
}

impl Default for VideoSize {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl FromStr for VideoSize {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        let invalid = || DomainError::InvalidVideoSize {
            value: s.to_string(),
        };

        let (width, height) = s.trim().split_once('x').ok_or_else(invalid)?;
        let width: u32 = width.trim().parse().map_err(|_| invalid())?;
        let height: u32 = height.trim().parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self { width, height })
    }
}

impl TryFrom<String> for VideoSize {
    type Error = DomainError;

    fn try_from(value: String) -> DomainResult<Self> {
        value.parse()
    }
}

impl From<VideoSize> for String {
    fn from(size: VideoSize) -> Self {
        size.to_string()
    }
}

impl fmt::Display for VideoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_width_and_height() {
        let size: VideoSize = "1280x720".parse().unwrap();
        assert_eq!(size.width, 1280);
        assert_eq!(size.height, 720);
    }

    #[test]
    fn test_resolve_defaults_when_omitted() {
        let size = VideoSize::resolve(None).unwrap();
        assert_eq!(size, VideoSize::new(1280, 720));
    }

    #[test]
    fn test_missing_separator_is_rejected() {
        let err = VideoSize::resolve(Some("1280")).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidVideoSize {
                value: "1280".to_string()
            }
        );
        assert!(err.to_string().contains("<width>x<height>"));
    }

    #[test]
    fn test_non_numeric_and_zero_are_rejected() {
        assert!("widexhigh".parse::<VideoSize>().is_err());
        assert!("0x720".parse::<VideoSize>().is_err());
        assert!("640x".parse::<VideoSize>().is_err());
    }

    #[test]
    fn test_display_matches_ffmpeg_form() {
        assert_eq!(VideoSize::new(640, 480).to_string(), "640x480");
    }
}
