use bytes::{Bytes, BytesMut};

/// A run of bytes cut from the scanner's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    pub(crate) bytes: Bytes,
    /// `true` if the record ended at the delimiter, `false` if it was cut at the
    /// maximum record length.
    pub(crate) delimited: bool,
}

/// Splits an accumulating buffer into records ending at a delimiter.
///
/// The buffer only holds bytes not yet returned, so the start of the buffer is
/// the start of the next record. `scan_pos` and `match_len` survive between
/// calls, which lets a delimiter straddle any number of chunks.
#[derive(Debug, Default)]
pub(crate) struct RecordScanner {
    buf: BytesMut,
    scan_pos: usize,
    match_len: usize,
}

impl RecordScanner {
    pub fn new() -> Self {
        RecordScanner::default()
    }

    pub fn add(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes received but not yet returned in a record.
    pub fn remaining(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.scan_pos = 0;
        self.match_len = 0;
    }

    /// Returns the next record ending at `delimiter`, or a `max_len` long record if
    /// no delimiter is found within `max_len` bytes. Returns `None` if neither is
    /// available yet.
    ///
    /// A mismatch resets the partial match to zero and retries the mismatching
    /// byte against the first delimiter byte; overlapping prefixes are not
    /// backtracked.
    pub fn scan(&mut self, delimiter: &[u8], max_len: usize) -> Option<Record> {
        debug_assert!(!delimiter.is_empty());
        debug_assert!(self.match_len < delimiter.len());

        let max_len = std::cmp::max(max_len, delimiter.len());
        let limit = std::cmp::min(self.buf.len(), max_len);

        while self.scan_pos < limit {
            if self.match_len == 0 {
                match memchr::memchr(delimiter[0], &self.buf[self.scan_pos..limit]) {
                    Some(idx) => self.scan_pos += idx,
                    None => {
                        self.scan_pos = limit;
                        break;
                    }
                }
            }

            let byte = self.buf[self.scan_pos];
            self.scan_pos += 1;

            if byte == delimiter[self.match_len] {
                self.match_len += 1;
            } else if byte == delimiter[0] {
                self.match_len = 1;
            } else {
                self.match_len = 0;
            }

            if self.match_len == delimiter.len() {
                let end = self.scan_pos - delimiter.len();
                let bytes = self.buf.split_to(self.scan_pos).freeze().slice(..end);

                self.scan_pos = 0;
                self.match_len = 0;

                return Some(Record { bytes, delimited: true });
            }
        }

        if self.scan_pos >= max_len {
            // Keep a partially matched delimiter out of the forced record so it can
            // still complete with the next chunk.
            let cut = self.scan_pos - self.match_len;
            let bytes = self.buf.split_to(cut).freeze();
            self.scan_pos = self.match_len;

            return Some(Record {
                bytes,
                delimited: false,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delimited(s: &str) -> Option<Record> {
        Some(Record {
            bytes: Bytes::copy_from_slice(s.as_bytes()),
            delimited: true,
        })
    }

    fn forced(s: &str) -> Option<Record> {
        Some(Record {
            bytes: Bytes::copy_from_slice(s.as_bytes()),
            delimited: false,
        })
    }

    #[test]
    fn test_scan_delimited() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"12345abc");
        assert_eq!(scanner.scan(b"abc", 100), delimited("12345"));
        assert_eq!(scanner.remaining(), b"");
    }

    #[test]
    fn test_scan_max_len() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"12345abc");
        assert_eq!(scanner.scan(b"abc", 4), forced("1234"));
        assert_eq!(scanner.scan(b"abc", 4), delimited("5"));
    }

    #[test]
    fn test_scan_resumes_split_delimiter() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"12345a");
        assert_eq!(scanner.scan(b"abc", 100), None);
        scanner.add(b"b");
        assert_eq!(scanner.scan(b"abc", 100), None);
        scanner.add(b"c");
        assert_eq!(scanner.scan(b"abc", 100), delimited("12345"));
    }

    #[test]
    fn test_scan_consecutive_delimiters() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"--boundary\r\n");
        assert_eq!(scanner.scan(b"--boundary", 100), delimited(""));
        assert_eq!(scanner.scan(b"\r\n", 100), delimited(""));
        assert_eq!(scanner.scan(b"\r\n", 100), None);
    }

    #[test]
    fn test_scan_switching_delimiters() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"line one\r\nbody\r\n--X");
        assert_eq!(scanner.scan(b"\r\n", 100), delimited("line one"));
        assert_eq!(scanner.scan(b"\r\n--X", 100), delimited("body"));
    }

    #[test]
    fn test_scan_mismatch_retries_first_byte() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"data\r\r\n--X");
        assert_eq!(scanner.scan(b"\r\n--X", 100), delimited("data\r"));
    }

    #[test]
    fn test_scan_does_not_backtrack_overlapping_prefix() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"aaab");
        // "aab" is present, but the partial match restarts at the mismatching byte only.
        assert_eq!(scanner.scan(b"aab", 100), None);

        let mut scanner = RecordScanner::new();
        scanner.add(b"xaab");
        assert_eq!(scanner.scan(b"aab", 100), delimited("x"));
    }

    #[test]
    fn test_forced_record_keeps_partial_delimiter() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"abcdef\r\n-");
        assert_eq!(scanner.scan(b"\r\n--X", 9), forced("abcdef"));

        scanner.add(b"-X");
        assert_eq!(scanner.scan(b"\r\n--X", 9), delimited(""));
    }

    #[test]
    fn test_forced_record_partial_delimiter_mismatch() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"abcdef\r\n-");
        assert_eq!(scanner.scan(b"\r\n--X", 9), forced("abcdef"));

        scanner.add(b"zz");
        assert_eq!(scanner.scan(b"\r\n--X", 100), None);
        assert_eq!(scanner.remaining(), b"\r\n-zz");
    }

    #[test]
    fn test_scan_byte_at_a_time() {
        let mut scanner = RecordScanner::new();
        let mut records = Vec::new();

        for byte in b"one\r\ntwo\r\n\r\nthree" {
            scanner.add(&[*byte]);
            while let Some(record) = scanner.scan(b"\r\n", 100) {
                records.push(record.bytes);
            }
        }

        assert_eq!(records, vec!["one", "two", ""]);
        assert_eq!(scanner.remaining(), b"three");
    }

    #[test]
    fn test_clear() {
        let mut scanner = RecordScanner::new();
        scanner.add(b"abc\r");
        assert_eq!(scanner.scan(b"\r\n", 100), None);
        scanner.clear();
        scanner.add(b"\nx\r\n");
        assert_eq!(scanner.scan(b"\r\n", 100), delimited("\nx"));
    }
}
