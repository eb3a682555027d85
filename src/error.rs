use std::fmt::{self, Debug, Display, Formatter};

use derive_more::Display;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while parsing a multipart stream.
///
/// Every error is fatal to the parse: once raised, no further data or end
/// events are delivered for the stream that raised it.
#[derive(Display)]
#[non_exhaustive]
pub enum Error {
    /// No boundary delimiter was found within the allowed preamble length.
    #[display(fmt = "preamble too long: no boundary within {} bytes", limit)]
    PreambleTooLong { limit: usize },

    /// A header line did not end within the allowed line length.
    #[display(fmt = "header line too long: no CRLF within {} bytes", limit)]
    HeaderLineTooLong { limit: usize },

    /// A boundary delimiter was followed by something other than CRLF or `--`.
    #[display(fmt = "trailing data after delimiter")]
    TrailingDataAfterDelimiter,

    /// A boundary line was followed by an unexpected line.
    #[display(fmt = "corrupt multipart")]
    CorruptMultipart,

    /// A folded header line appeared before any header was opened.
    #[display(fmt = "illegal continuation header {}", _0)]
    IllegalContinuationHeader(String),

    /// A header line could not be parsed.
    #[display(fmt = "malformed header: {}", _0)]
    MalformedHeader(String),

    /// A byte outside the base64 alphabet was found in a base64 encoded body.
    #[display(fmt = "illegal base64 char {}", "char::from(*_0)")]
    IllegalBase64Char(u8),

    /// A base64 encoded body ended with an incomplete group or with data after padding.
    #[display(fmt = "illegal trailing base64 data")]
    IllegalTrailingBase64Data,

    /// The input ended before the outermost closing delimiter was seen.
    #[display(fmt = "illegal end state")]
    IllegalEndState,

    /// A multipart content type carries no `boundary` parameter.
    #[display(fmt = "multipart boundary not found in Content-Type")]
    NoBoundary,

    /// The `Content-Type` header is not `multipart/form-data`.
    #[display(fmt = "Content-Type is not multipart/form-data")]
    NoMultipart,

    /// Failed to convert the `Content-Type` to [`mime::Mime`] type.
    #[display(fmt = "Failed to convert Content-Type to `mime::Mime` type: {}", _0)]
    DecodeContentType(mime::FromStrError),

    /// Reading from the underlying stream failed.
    #[display(fmt = "stream read failed: {}", _0)]
    StreamReadFailed(BoxError),

    /// Failed to decode the field data as `JSON` in
    /// [`field.json()`](crate::Field::json) method.
    #[cfg(feature = "json")]
    #[display(fmt = "failed to decode field data as JSON: {}", _0)]
    DecodeJson(serde_json::Error),
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}
