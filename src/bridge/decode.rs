use bytes::BytesMut;

const REPLACEMENT: char = '\u{FFFD}';

/// Turns arbitrary byte reads into UTF-8 text. A multi-byte character split
/// across reads is held back until the rest of it arrives.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    carry: BytesMut,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.carry.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.carry.len());
        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(text) => {
                    out.push_str(text);
                    self.carry.clear();
                    return out;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.carry[..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(REPLACEMENT);
                            let _ = self.carry.split_to(valid + invalid);
                        }
                        None => {
                            let _ = self.carry.split_to(valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush a dangling partial character at end of stream.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        tail
    }

    pub fn has_carry(&self) -> bool {
        !self.carry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_character_is_carried() {
        let bytes = "é!".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert!(decoder.has_carry());
        assert_eq!(decoder.decode(&bytes[1..]), "é!");
        assert!(!decoder.has_carry());
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_truncated_tail() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&"日".as_bytes()[..2]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_decode() {
        let text = "naïve 日本 ✓\n";
        let mut decoder = Utf8ChunkDecoder::new();
        let mut out = String::new();
        for byte in text.as_bytes() {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, text);
    }
}
