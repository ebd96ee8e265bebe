//! Text encoding for dbf field names, Character values, and Memo blocks.

use crate::error::{Error, Result};
use encoding_rs::Encoding;

/// What to do when bytes don't decode cleanly under the configured encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Fail with [crate::Error::Encoding].
    #[default]
    Strict,
    /// Substitute the Unicode replacement character and continue.
    Replace,
    /// Drop unmappable characters and continue.
    Ignore,
}

/// Bundles a resolved [encoding_rs::Encoding] with the policy to apply
/// when bytes or text don't map cleanly.
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    encoding: &'static Encoding,
    policy: ErrorPolicy,
}

impl TextCodec {
    pub fn new(encoding: &'static Encoding, policy: ErrorPolicy) -> TextCodec {
        TextCodec { encoding, policy }
    }

    /// Resolves a label such as `"UTF-8"`, `"Windows-1252"`, or the content
    /// of a `.cpg` sidecar. Returns `None` for an unrecognized label.
    pub fn from_label(label: &str, policy: ErrorPolicy) -> Option<TextCodec> {
        Encoding::for_label(label.trim().as_bytes()).map(|encoding| TextCodec::new(encoding, policy))
    }

    /// The canonical name of the underlying encoding, suitable for writing
    /// out to a `.cpg` sidecar.
    pub fn label(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        let (text, _, had_errors) = self.encoding.decode(bytes);
        if had_errors {
            match self.policy {
                ErrorPolicy::Strict => {
                    return Err(Error::Encoding { encoding: self.label().to_string() });
                }
                ErrorPolicy::Replace => return Ok(text.into_owned()),
                ErrorPolicy::Ignore => {
                    return Ok(text.chars().filter(|&c| c != '\u{FFFD}').collect());
                }
            }
        }
        Ok(text.into_owned())
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let (bytes, _, had_errors) = self.encoding.encode(text);
        if had_errors && self.policy == ErrorPolicy::Strict {
            return Err(Error::Encoding { encoding: self.label().to_string() });
        }
        Ok(bytes.into_owned())
    }
}

impl Default for TextCodec {
    fn default() -> TextCodec {
        TextCodec::new(encoding_rs::UTF_8, ErrorPolicy::Strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_roundtrip() {
        let codec = TextCodec::default();
        let bytes = codec.encode("café").unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), "café");
    }

    #[test]
    fn unknown_label_resolves_to_none() {
        assert!(TextCodec::from_label("not-a-real-encoding", ErrorPolicy::Strict).is_none());
    }

    #[test]
    fn windows_1252_label_resolves() {
        let codec = TextCodec::from_label("Windows-1252", ErrorPolicy::Strict).unwrap();
        assert_eq!(codec.label(), "windows-1252");
    }
}
