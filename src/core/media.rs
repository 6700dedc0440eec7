//! Media kinds and the `type[:index]` stream specifier.

use std::fmt;
use std::str::FromStr;

/// Error produced when a stream specifier cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Stream string must not be empty")]
    Empty,
    #[error("Invalid stream string: '{0}'")]
    Malformed(String),
    #[error("Expected one of [audio, video, subtitle, cc], got '{0}'")]
    UnknownType(String),
    #[error("Could not parse stream index '{index}' in stream string '{spec}'")]
    InvalidIndex { index: String, spec: String },
}

/// The four kinds of elementary stream a container can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaType {
    Video,
    Audio,
    Subtitle,
    ClosedCaption,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Video,
        MediaType::Audio,
        MediaType::Subtitle,
        MediaType::ClosedCaption,
    ];

    /// Name used in stream specifiers
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Subtitle => "subtitle",
            MediaType::ClosedCaption => "cc",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseError::UnknownType(s.to_string()))
    }
}

/// Stream index meaning "first stream of this type"
pub const FIRST_STREAM: i64 = -1;
/// Stream index meaning "every stream of this type"
pub const ALL_STREAMS: i64 = -2;

/// A parsed `type[:index]` stream specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamSpec {
    pub media_type: MediaType,
    pub index: i64,
}

impl StreamSpec {
    pub fn new(media_type: MediaType, index: i64) -> Self {
        Self { media_type, index }
    }

    /// First stream of the given type
    pub fn first(media_type: MediaType) -> Self {
        Self::new(media_type, FIRST_STREAM)
    }

    /// Parse `letters[:digits]`. The index must be `0` or have no leading zero.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let (name, index) = match s.split_once(':') {
            Some((name, index)) => (name, Some(index)),
            None => (s, None),
        };

        let name_ok = !name.is_empty()
            && name.bytes().all(|b| b.is_ascii_alphabetic() || b == b'_');
        let index_ok = match index {
            None => true,
            Some(digits) => {
                !digits.is_empty()
                    && digits.bytes().all(|b| b.is_ascii_digit())
                    && (digits == "0" || !digits.starts_with('0'))
            }
        };
        if !name_ok || !index_ok {
            return Err(ParseError::Malformed(s.to_string()));
        }

        let media_type = name.parse::<MediaType>()?;
        let index = match index {
            None => FIRST_STREAM,
            Some(digits) => digits.parse::<i64>().map_err(|_| ParseError::InvalidIndex {
                index: digits.to_string(),
                spec: s.to_string(),
            })?,
        };

        Ok(Self { media_type, index })
    }
}

impl FromStr for StreamSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamSpec::parse(s)
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index >= 0 {
            write!(f, "{}:{}", self.media_type, self.index)
        } else {
            write!(f, "{}", self.media_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_only() {
        let spec = StreamSpec::parse("video").unwrap();
        assert_eq!(spec.media_type, MediaType::Video);
        assert_eq!(spec.index, FIRST_STREAM);

        assert_eq!(StreamSpec::parse("cc").unwrap().media_type, MediaType::ClosedCaption);
        assert_eq!(StreamSpec::parse("subtitle").unwrap().media_type, MediaType::Subtitle);
    }

    #[test]
    fn test_parse_with_index() {
        let spec = StreamSpec::parse("audio:2").unwrap();
        assert_eq!(spec, StreamSpec::new(MediaType::Audio, 2));
        assert_eq!(StreamSpec::parse("video:0").unwrap().index, 0);
        assert_eq!(StreamSpec::parse("video:10").unwrap().index, 10);
    }

    #[test]
    fn test_canonical_roundtrip() {
        for s in ["video", "audio:0", "subtitle:3", "cc:12", "video:1"] {
            let spec = StreamSpec::parse(s).unwrap();
            assert_eq!(spec.to_string(), s);
            assert_eq!(StreamSpec::parse(&spec.to_string()).unwrap(), spec);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(StreamSpec::parse(""), Err(ParseError::Empty));
        assert!(matches!(StreamSpec::parse("Video"), Err(ParseError::UnknownType(_))));
        assert!(matches!(StreamSpec::parse("data"), Err(ParseError::UnknownType(_))));
        for bad in ["video:", "video:x", "video:01", ":1", "video:1:2", "vid eo", "video:-1", "3"] {
            assert!(
                matches!(StreamSpec::parse(bad), Err(ParseError::Malformed(_))),
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_index_overflow() {
        assert!(matches!(
            StreamSpec::parse("audio:99999999999999999999"),
            Err(ParseError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_media_type_from_str() {
        for t in MediaType::ALL {
            assert_eq!(t.as_str().parse::<MediaType>().unwrap(), t);
        }
    }
}
