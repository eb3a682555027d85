use crate::constants;

/// Limits on how far the parser scans for a delimiter before giving up or, for
/// part bodies, handing out what it has.
///
/// # Examples
///
/// ```
/// use pushpart::Constraints;
///
/// let constraints = Constraints::new()
///     .max_preamble_len(1024)
///     .max_header_line_len(8 * 1024)
///     .max_body_chunk_len(64 * 1024);
/// # let _ = constraints;
/// ```
#[derive(Debug, Clone)]
pub struct Constraints {
    pub(crate) max_preamble_len: usize,
    pub(crate) max_header_line_len: usize,
    pub(crate) max_body_chunk_len: usize,
}

impl Constraints {
    /// Creates constraints with every limit set to 4096 bytes.
    pub fn new() -> Constraints {
        Constraints::default()
    }

    /// Sets the maximum number of bytes allowed before the first boundary of each
    /// multipart level. Exceeding it fails with
    /// [`Error::PreambleTooLong`](crate::Error::PreambleTooLong).
    pub fn max_preamble_len(mut self, limit: usize) -> Constraints {
        self.max_preamble_len = limit;
        self
    }

    /// Sets the maximum length of a single header line, and of the line
    /// following a boundary delimiter.
    pub fn max_header_line_len(mut self, limit: usize) -> Constraints {
        self.max_header_line_len = limit;
        self
    }

    /// Sets the size of the body chunks handed to a part's sink while its closing
    /// boundary has not been seen yet.
    pub fn max_body_chunk_len(mut self, limit: usize) -> Constraints {
        self.max_body_chunk_len = limit;
        self
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            max_preamble_len: constants::DEFAULT_MAX_RECORD_LEN,
            max_header_line_len: constants::DEFAULT_MAX_RECORD_LEN,
            max_body_chunk_len: constants::DEFAULT_MAX_RECORD_LEN,
        }
    }
}
