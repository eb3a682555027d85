use crate::constants;
use crate::header::{Header, Headers};
use crate::stream::Flow;
use http::header;

/// A leaf part of a multipart stream, handed to the
/// [`Handler`](crate::Handler) once its headers are complete and before any of
/// its body.
///
/// The body itself is pushed to the [`Sink`](crate::Sink) returned by the
/// handler. A `Part` can be moved into that sink to keep the metadata at hand
/// and to pause the source while the body is being consumed.
#[derive(Debug, Clone)]
pub struct Part {
    headers: Headers,
    flow: Flow,
    meta: PartMeta,
}

#[derive(Debug, Clone)]
struct PartMeta {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    idx: usize,
}

impl Part {
    pub(crate) fn new(headers: Headers, idx: usize, flow: Flow) -> Part {
        let (name, file_name) = match headers.get(header::CONTENT_DISPOSITION.as_str()) {
            Some(disposition) => (
                disposition.param(constants::NAME_PARAM).map(ToOwned::to_owned),
                disposition.param(constants::FILENAME_PARAM).map(ToOwned::to_owned),
            ),
            None => (None, None),
        };

        let content_type = headers.value(header::CONTENT_TYPE.as_str()).map(ToOwned::to_owned);

        Part {
            headers,
            flow,
            meta: PartMeta {
                name,
                file_name,
                content_type,
                idx,
            },
        }
    }

    /// The `name` parameter of the `Content-Disposition` header.
    pub fn name(&self) -> Option<&str> {
        self.meta.name.as_deref()
    }

    /// The `filename` parameter of the `Content-Disposition` header.
    pub fn file_name(&self) -> Option<&str> {
        self.meta.file_name.as_deref()
    }

    /// The primary value of the `Content-Type` header, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.meta.content_type.as_deref()
    }

    /// The `Content-Type` header as a [`mime::Mime`], parameters included.
    pub fn mime(&self) -> Option<mime::Mime> {
        let content_type = self.header(header::CONTENT_TYPE.as_str())?;

        let mut raw = content_type.value().to_owned();
        for (key, value) in content_type.params() {
            if let Some(value) = value {
                raw.push_str("; ");
                raw.push_str(key);
                raw.push('=');
                if !value.is_empty() && value.bytes().all(is_token_char) {
                    raw.push_str(value);
                } else {
                    raw.push('"');
                    raw.push_str(&value.replace('\\', "\\\\").replace('"', "\\\""));
                    raw.push('"');
                }
            }
        }

        raw.parse().ok()
    }

    /// The value of the `Content-Transfer-Encoding` header.
    pub fn transfer_encoding(&self) -> Option<&str> {
        self.headers.value(constants::CONTENT_TRANSFER_ENCODING)
    }

    /// Looks up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.get(name)
    }

    /// All headers of the part.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The position of this part among all leaf parts of the stream, starting at 0.
    pub fn index(&self) -> usize {
        self.meta.idx
    }

    /// Asks the source feeding the parser to hold back further chunks.
    pub fn pause(&self) {
        self.flow.pause();
    }

    /// Lets the source feed the parser again.
    pub fn resume(&self) {
        self.flow.resume();
    }

    /// The pause/resume switch shared with the parser's source.
    pub fn flow(&self) -> &Flow {
        &self.flow
    }
}

fn is_token_char(ch: u8) -> bool {
    ch.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&ch)
}
