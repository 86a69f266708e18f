use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{StorageError, StorageResult};

/// Encoding of string payloads passed to `put_string`.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StringFormat {
    /// UTF-8 text, uploaded as-is.
    #[default]
    Raw,
    Base64,
    Base64Url,
    /// `data:[<media type>][;base64],<payload>`
    DataUrl,
}

/// Bytes decoded from a string payload, plus a content type when the format carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedString {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl StringFormat {
    pub fn decode(&self, value: &str) -> StorageResult<DecodedString> {
        match self {
            StringFormat::Raw => Ok(DecodedString {
                bytes: value.as_bytes().to_vec(),
                content_type: None,
            }),
            StringFormat::Base64 => Ok(DecodedString {
                bytes: decode_base64(value)?,
                content_type: None,
            }),
            StringFormat::Base64Url => {
                let bytes = URL_SAFE_NO_PAD
                    .decode(value.trim_end_matches('='))
                    .map_err(|e| invalid_format(self, e))?;
                Ok(DecodedString {
                    bytes,
                    content_type: None,
                })
            }
            StringFormat::DataUrl => decode_data_url(value),
        }
    }
}

fn invalid_format(format: &StringFormat, reason: impl Display) -> StorageError {
    StorageError::InvalidArgument(format!(
        "string does not match format '{}': {}",
        format, reason
    ))
}

fn decode_base64(value: &str) -> StorageResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| invalid_format(&StringFormat::Base64, e))
}

fn decode_data_url(value: &str) -> StorageResult<DecodedString> {
    let rest = value
        .strip_prefix("data:")
        .ok_or_else(|| invalid_format(&StringFormat::DataUrl, "missing 'data:' prefix"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid_format(&StringFormat::DataUrl, "missing ',' separator"))?;

    let (media_type, bytes) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, decode_base64(payload)?),
        None => (header, percent_decode_str(payload).collect::<Vec<u8>>()),
    };

    Ok(DecodedString {
        bytes,
        content_type: Some(media_type)
            .filter(|media_type| !media_type.is_empty())
            .map(String::from),
    })
}

impl Display for StringFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StringFormat::Raw => write!(f, "raw"),
            StringFormat::Base64 => write!(f, "base64"),
            StringFormat::Base64Url => write!(f, "base64url"),
            StringFormat::DataUrl => write!(f, "data_url"),
        }
    }
}

impl FromStr for StringFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(StringFormat::Raw),
            "base64" => Ok(StringFormat::Base64),
            "base64url" => Ok(StringFormat::Base64Url),
            "data_url" => Ok(StringFormat::DataUrl),
            _ => Err(anyhow::anyhow!("Invalid string format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_is_utf8() {
        let decoded = StringFormat::Raw.decode(r#"{"foo":"bar"}"#).unwrap();
        assert_eq!(decoded.bytes, br#"{"foo":"bar"}"#.to_vec());
        assert_eq!(decoded.content_type, None);
    }

    #[test]
    fn base64_variants() {
        assert_eq!(StringFormat::Base64.decode("aGVsbG8=").unwrap().bytes, b"hello");
        // 0xfb 0xff encodes to "-_8" in the url-safe alphabet
        assert_eq!(
            StringFormat::Base64Url.decode("-_8").unwrap().bytes,
            vec![0xfb, 0xff]
        );
        assert_eq!(
            StringFormat::Base64Url.decode("-_8=").unwrap().bytes,
            vec![0xfb, 0xff]
        );
        assert!(StringFormat::Base64.decode("-_8=").is_err());
    }

    #[test]
    fn data_url_with_base64_payload() {
        let decoded = StringFormat::DataUrl
            .decode("data:text/plain;base64,aGVsbG8=")
            .unwrap();
        assert_eq!(decoded.bytes, b"hello");
        assert_eq!(decoded.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn data_url_with_percent_encoded_payload() {
        let decoded = StringFormat::DataUrl.decode("data:,hello%20world").unwrap();
        assert_eq!(decoded.bytes, b"hello world");
        assert_eq!(decoded.content_type, None);
    }

    #[test]
    fn malformed_input_is_invalid_argument() {
        for (format, input) in [
            (StringFormat::Base64, "not base64!"),
            (StringFormat::DataUrl, "text/plain,hello"),
            (StringFormat::DataUrl, "data:text/plain"),
        ] {
            assert!(matches!(
                format.decode(input),
                Err(StorageError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn parses_names() {
        assert_eq!("RAW".parse::<StringFormat>().unwrap(), StringFormat::Raw);
        assert_eq!(
            "data_url".parse::<StringFormat>().unwrap(),
            StringFormat::DataUrl
        );
        assert!("utf16".parse::<StringFormat>().is_err());
    }
}
