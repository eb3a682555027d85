use crate::stream::{Flow, Sink};
use bytes::{Bytes, BytesMut};

const INVALID: u8 = 0xFF;
const SKIP: u8 = 0xFE;
const PAD: u8 = 64;

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0usize;
    while i < 256 {
        let b = i as u8;
        table[i] = match b {
            b'A'..=b'Z' => b - b'A',
            b'a'..=b'z' => b - b'a' + 26,
            b'0'..=b'9' => b - b'0' + 52,
            b'+' => 62,
            b'/' => 63,
            b'=' => PAD,
            b'\r' | b'\n' => SKIP,
            _ => INVALID,
        };
        i += 1;
    }
    table
}

static DECODE: [u8; 256] = build_decode_table();

/// A push-stream filter that decodes base64 and forwards the bytes to `inner`.
///
/// Input may be split anywhere, including inside a 4-character group; CR and LF
/// are ignored. Padding ends the encoded data, after which only CR, LF and `=`
/// may follow.
///
/// An `=` where a group would start is skipped as filler. Anywhere else it
/// must close a group: an `=` in the second position of a group, or a data
/// character following an `=` in the third, fails with
/// [`Error::IllegalBase64Char`](crate::Error::IllegalBase64Char) naming `=`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use pushpart::{Base64Decoder, Sink};
///
/// let mut out: Vec<Bytes> = Vec::new();
/// let mut decoder = Base64Decoder::new(&mut out);
/// decoder.on_data(Bytes::from_static(b"SGVsbG8s")).unwrap();
/// decoder.on_data(Bytes::from_static(b"IHdvcmxk\r\nIQ==\r\n")).unwrap();
/// decoder.on_end().unwrap();
/// drop(decoder);
///
/// assert_eq!(out.concat(), b"Hello, world!");
/// ```
pub struct Base64Decoder<S> {
    inner: S,
    flow: Option<Flow>,
    group: [u8; 4],
    group_len: usize,
    padded: bool,
    trailing: bool,
    failed: bool,
    error_sent: bool,
}

impl<S: Sink> Base64Decoder<S> {
    /// Creates a decoder forwarding decoded bytes to `inner`.
    pub fn new(inner: S) -> Self {
        Base64Decoder {
            inner,
            flow: None,
            group: [0; 4],
            group_len: 0,
            padded: false,
            trailing: false,
            failed: false,
            error_sent: false,
        }
    }

    /// Creates a decoder that forwards [`pause`](Self::pause) and
    /// [`resume`](Self::resume) to the `flow` of its source.
    pub fn with_flow(inner: S, flow: Flow) -> Self {
        Base64Decoder {
            flow: Some(flow),
            ..Base64Decoder::new(inner)
        }
    }

    /// Pauses the source, if the decoder was created with a `Flow`.
    pub fn pause(&self) {
        if let Some(flow) = &self.flow {
            flow.pause();
        }
    }

    /// Resumes the source, if the decoder was created with a `Flow`.
    pub fn resume(&self) {
        if let Some(flow) = &self.flow {
            flow.resume();
        }
    }

    /// Returns a reference to the sink receiving decoded bytes.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consumes the decoder, returning the inner sink.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn decode(&mut self, chunk: &[u8], out: &mut BytesMut) -> crate::Result<()> {
        for &ch in chunk {
            let value = DECODE[ch as usize];

            if self.padded {
                if value != SKIP && value != PAD {
                    self.trailing = true;
                }
                continue;
            }

            match value {
                INVALID => return Err(crate::Error::IllegalBase64Char(ch)),
                SKIP => continue,
                // Stray padding where a group would start is filler.
                PAD if self.group_len == 0 => continue,
                PAD if self.group_len == 1 => return Err(crate::Error::IllegalBase64Char(ch)),
                _ => {}
            }

            if self.group_len == 3 && self.group[2] == PAD && value != PAD {
                return Err(crate::Error::IllegalBase64Char(b'='));
            }

            self.group[self.group_len] = value;
            self.group_len += 1;

            if self.group_len == 4 {
                self.flush_group(out);
            }
        }

        Ok(())
    }

    fn flush_group(&mut self, out: &mut BytesMut) {
        let [n0, n1, n2, n3] = self.group;
        self.group_len = 0;

        out.extend_from_slice(&[n0 << 2 | n1 >> 4]);
        if n2 == PAD {
            self.padded = true;
            return;
        }

        out.extend_from_slice(&[n1 << 4 | n2 >> 2]);
        if n3 == PAD {
            self.padded = true;
            return;
        }

        out.extend_from_slice(&[n2 << 6 | n3]);
    }

    fn fail(&mut self, err: crate::Error) -> crate::Error {
        self.failed = true;
        err
    }
}

impl<S: Sink> Sink for Base64Decoder<S> {
    fn on_data(&mut self, chunk: Bytes) -> crate::Result<()> {
        if self.failed {
            return Ok(());
        }

        let mut out = BytesMut::with_capacity(chunk.len() / 4 * 3 + 3);
        let res = self.decode(&chunk, &mut out);

        if !out.is_empty() {
            if let Err(err) = self.inner.on_data(out.freeze()) {
                return Err(self.fail(err));
            }
        }

        res.map_err(|err| self.fail(err))
    }

    fn on_end(&mut self) -> crate::Result<()> {
        if self.failed {
            return Ok(());
        }

        if self.group_len > 0 || self.trailing {
            return Err(self.fail(crate::Error::IllegalTrailingBase64Data));
        }

        self.inner.on_end().map_err(|err| self.fail(err))
    }

    fn on_error(&mut self, err: &crate::Error) {
        if self.error_sent {
            return;
        }

        self.failed = true;
        self.error_sent = true;
        self.inner.on_error(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOX: &str = "The quick brown fox jumps over the lazy dog.";
    const FOX_B64: &str = "VGhlIHF1aWNrIGJyb3duIGZveCBqdW1wcyBvdmVyIHRoZSBsYXp5IGRvZy4=";

    #[derive(Default)]
    struct Collect {
        data: Vec<u8>,
        chunks: usize,
        ended: bool,
        errors: Vec<String>,
    }

    impl Sink for Collect {
        fn on_data(&mut self, chunk: Bytes) -> crate::Result<()> {
            self.chunks += 1;
            self.data.extend_from_slice(&chunk);
            Ok(())
        }

        fn on_end(&mut self) -> crate::Result<()> {
            self.ended = true;
            Ok(())
        }

        fn on_error(&mut self, err: &crate::Error) {
            self.errors.push(err.to_string());
        }
    }

    fn decode_lines(lines: &[&str]) -> (Collect, crate::Result<()>) {
        let mut input = String::new();
        for line in lines {
            input.push_str(line);
            input.push_str("\r\n");
        }

        let mut decoder = Base64Decoder::new(Collect::default());
        let res = decoder
            .on_data(Bytes::from(input))
            .and_then(|_| decoder.on_end());
        (decoder.into_inner(), res)
    }

    #[test]
    fn test_decode_simple() {
        let (out, res) = decode_lines(&[FOX_B64]);
        assert_eq!(res, Ok(()));
        assert_eq!(out.data, FOX.as_bytes());
        assert!(out.ended);
    }

    #[test]
    fn test_decode_trailing_data() {
        let (out, res) = decode_lines(&["VGhlIHF1aWNrIGJyb3duIGZveCBqdW1wcyBvdmVyIHRoZSBsYXp5IGRvZy4=XX"]);
        assert_eq!(res, Err(crate::Error::IllegalTrailingBase64Data));
        assert_eq!(out.data, FOX.as_bytes());
        assert!(!out.ended);
    }

    #[test]
    fn test_decode_illegal_char() {
        let (out, res) = decode_lines(&["V%GhlIHF1aWNrIGJyb3duIGZveCBqdW1wcyBvdmVyIHRoZSBsYXp5IGRvZy4=XX"]);
        assert_eq!(res, Err(crate::Error::IllegalBase64Char(b'%')));
        assert!(out.data.is_empty());
        assert_eq!(out.chunks, 0);
        assert!(!out.ended);
    }

    #[test]
    fn test_no_output_after_failure() {
        let mut decoder = Base64Decoder::new(Collect::default());
        assert_eq!(decoder.on_data(Bytes::from_static(b"TWFu")), Ok(()));
        assert_eq!(
            decoder.on_data(Bytes::from_static(b"TW%u")),
            Err(crate::Error::IllegalBase64Char(b'%'))
        );
        assert_eq!(decoder.on_data(Bytes::from_static(b"TWFu")), Ok(()));
        assert_eq!(decoder.on_end(), Ok(()));

        let out = decoder.into_inner();
        assert_eq!(out.data, b"Man");
        assert!(!out.ended);
    }

    #[test]
    fn test_decode_padding_lengths() {
        for (encoded, decoded) in [("TWFu", "Man"), ("TWE=", "Ma"), ("TQ==", "M"), ("", "")].iter() {
            let (out, res) = decode_lines(&[*encoded]);
            assert_eq!(res, Ok(()), "{}", encoded);
            assert_eq!(out.data, decoded.as_bytes(), "{}", encoded);
        }
    }

    #[test]
    fn test_decode_split_at_every_offset() {
        let encoded = "VGhlIHF1aWNrIGJyb3duIGZveCBqdW1wcyBvdmVy\r\nIHRoZSBsYXp5IGRvZy4=\r\n";

        for split in 0..=encoded.len() {
            let (head, tail) = encoded.as_bytes().split_at(split);

            let mut decoder = Base64Decoder::new(Collect::default());
            decoder.on_data(Bytes::copy_from_slice(head)).unwrap();
            decoder.on_data(Bytes::copy_from_slice(tail)).unwrap();
            decoder.on_end().unwrap();

            assert_eq!(decoder.get_ref().data, FOX.as_bytes(), "split at {}", split);
        }
    }

    #[test]
    fn test_decode_byte_at_a_time() {
        let mut decoder = Base64Decoder::new(Collect::default());
        for byte in FOX_B64.bytes() {
            decoder.on_data(Bytes::copy_from_slice(&[byte])).unwrap();
        }
        decoder.on_end().unwrap();

        assert_eq!(decoder.get_ref().data, FOX.as_bytes());
    }

    #[test]
    fn test_line_break_inside_group() {
        let (out, res) = decode_lines(&["TW", "Fu", "TQ", "=="]);
        assert_eq!(res, Ok(()));
        assert_eq!(out.data, b"ManM");
    }

    #[test]
    fn test_incomplete_group_at_end() {
        let (out, res) = decode_lines(&["TWFuTQ"]);
        assert_eq!(res, Err(crate::Error::IllegalTrailingBase64Data));
        assert_eq!(out.data, b"Man");
    }

    #[test]
    fn test_misplaced_padding() {
        let (_, res) = decode_lines(&["T=Fu"]);
        assert_eq!(res, Err(crate::Error::IllegalBase64Char(b'=')));

        let (_, res) = decode_lines(&["TW=u"]);
        assert_eq!(res, Err(crate::Error::IllegalBase64Char(b'=')));
    }

    #[test]
    fn test_error_propagates_to_inner() {
        let mut decoder = Base64Decoder::new(Collect::default());
        decoder.on_error(&crate::Error::IllegalEndState);
        assert_eq!(decoder.on_data(Bytes::from_static(b"TWFu")), Ok(()));

        let out = decoder.into_inner();
        assert_eq!(out.errors, vec!["illegal end state".to_owned()]);
        assert!(out.data.is_empty());
    }

    #[test]
    fn test_error_forwarded_once() {
        let mut decoder = Base64Decoder::new(Collect::default());
        decoder.on_error(&crate::Error::IllegalEndState);
        decoder.on_error(&crate::Error::CorruptMultipart);

        assert_eq!(decoder.into_inner().errors, vec!["illegal end state".to_owned()]);
    }

    #[test]
    fn test_error_after_own_failure_reaches_inner() {
        let mut decoder = Base64Decoder::new(Collect::default());
        let err = decoder.on_data(Bytes::from_static(b"TW%u")).unwrap_err();
        decoder.on_error(&err);
        decoder.on_error(&err);

        assert_eq!(decoder.into_inner().errors, vec!["illegal base64 char %".to_owned()]);
    }

    fn encode(data: &[u8]) -> String {
        const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

        let mut out = String::new();
        for group in data.chunks(3) {
            let b = [group[0], *group.get(1).unwrap_or(&0), *group.get(2).unwrap_or(&0)];
            let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);

            for i in 0..4 {
                if i <= group.len() {
                    out.push(ALPHABET[(n >> (18 - 6 * i) & 0x3F) as usize] as char);
                } else {
                    out.push('=');
                }
            }
        }
        out
    }

    #[test]
    fn test_binary_split_at_every_offset() {
        assert_eq!(encode(b"Man"), "TWFu");
        assert_eq!(encode(b"Ma"), "TWE=");
        assert_eq!(encode(b"M"), "TQ==");

        for len in 0..40usize {
            let data: Vec<u8> = (0..len).map(|i| 0xC8u8.wrapping_add((i * 37) as u8)).collect();
            let encoded = encode(&data);

            for split in 0..=encoded.len() {
                let (head, tail) = encoded.as_bytes().split_at(split);

                let mut decoder = Base64Decoder::new(Collect::default());
                decoder.on_data(Bytes::copy_from_slice(head)).unwrap();
                decoder.on_data(Bytes::copy_from_slice(tail)).unwrap();
                decoder.on_end().unwrap();

                let out = decoder.into_inner();
                assert_eq!(out.data, data, "len {} split at {}", len, split);
                assert!(out.ended);
            }
        }
    }

    #[test]
    fn test_pause_resume_forwarded() {
        let flow = Flow::new();
        let decoder = Base64Decoder::with_flow(Collect::default(), flow.clone());

        decoder.pause();
        assert!(flow.is_paused());
        decoder.resume();
        assert!(!flow.is_paused());
    }
}
