// src/text.rs

//! Helpers for turning raw process output into displayable text.

/// Incremental UTF-8 decoder for chunked byte streams.
///
/// Pipes hand out bytes at arbitrary boundaries, so a multi-byte character
/// can be split across two reads. The decoder holds back an incomplete
/// trailing sequence until the next call; invalid sequences are replaced
/// with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, returning every complete character seen so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let owned;
        let mut input: &[u8] = if self.pending.is_empty() {
            bytes
        } else {
            self.pending.extend_from_slice(bytes);
            owned = std::mem::take(&mut self.pending);
            &owned
        };

        let mut out = String::with_capacity(input.len());
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    // `valid_up_to` marks a verified UTF-8 prefix.
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.pending.extend_from_slice(rest);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is still held back. A dangling partial sequence
    /// becomes a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Replace NUL characters with a visible `\0` escape.
pub fn escape_nul(text: &str) -> String {
    text.replace('\0', "\\0")
}
