use crate::constants;
use crate::multipart::Handler;
use crate::part::Part;
use crate::stream::Sink;
use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use http::header;
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;
use spin::Mutex;
use std::sync::Arc;

/// A [`Handler`] that buffers every part in memory.
///
/// Handy for small forms and for tests; large uploads are better streamed to
/// their destination by a handler of their own.
#[derive(Debug, Default)]
pub struct Collector {
    fields: Arc<Mutex<Vec<Field>>>,
    complete: bool,
    error: Option<String>,
}

impl Collector {
    /// Creates an empty `Collector`.
    pub fn new() -> Collector {
        Collector::default()
    }

    /// The number of parts received completely so far.
    pub fn len(&self) -> usize {
        self.fields.lock().len()
    }

    /// Returns `true` if no part was received completely yet.
    pub fn is_empty(&self) -> bool {
        self.fields.lock().is_empty()
    }

    /// Returns `true` once the whole multipart stream was parsed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The message of the error that failed the parse, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the parts received completely, in order.
    pub fn into_fields(self) -> Vec<Field> {
        std::mem::take(&mut *self.fields.lock())
    }
}

impl Handler for Collector {
    type Body = FieldBuffer;

    fn on_part(&mut self, part: Part) -> crate::Result<FieldBuffer> {
        Ok(FieldBuffer {
            part: Some(part),
            buf: BytesMut::new(),
            fields: Arc::clone(&self.fields),
        })
    }

    fn on_end(&mut self) {
        self.complete = true;
    }

    fn on_error(&mut self, err: &crate::Error) {
        self.error = Some(err.to_string());
    }
}

/// The body sink of a [`Collector`].
#[derive(Debug)]
pub struct FieldBuffer {
    part: Option<Part>,
    buf: BytesMut,
    fields: Arc<Mutex<Vec<Field>>>,
}

impl Sink for FieldBuffer {
    fn on_data(&mut self, chunk: Bytes) -> crate::Result<()> {
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    fn on_end(&mut self) -> crate::Result<()> {
        if let Some(part) = self.part.take() {
            let data = self.buf.split().freeze();
            self.fields.lock().push(Field { part, data });
        }
        Ok(())
    }
}

/// A part together with its complete body.
#[derive(Debug, Clone)]
pub struct Field {
    part: Part,
    data: Bytes,
}

impl Field {
    /// The `name` parameter of the `Content-Disposition` header.
    pub fn name(&self) -> Option<&str> {
        self.part.name()
    }

    /// The `filename` parameter of the `Content-Disposition` header.
    pub fn file_name(&self) -> Option<&str> {
        self.part.file_name()
    }

    /// The primary value of the `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.part.content_type()
    }

    /// The part this body belongs to, headers included.
    pub fn part(&self) -> &Part {
        &self.part
    }

    /// The complete body.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Consumes the field, returning the body.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// The body as text, decoded with the `charset` of the `Content-Type` header
    /// or UTF-8.
    pub fn text(&self) -> crate::Result<String> {
        self.text_with_charset("utf-8")
    }

    /// The body as text, decoded with the `charset` of the `Content-Type` header
    /// or `default_encoding`. Malformed sequences are replaced.
    pub fn text_with_charset(&self, default_encoding: &str) -> crate::Result<String> {
        let encoding_name = self
            .part
            .header(header::CONTENT_TYPE.as_str())
            .and_then(|content_type| content_type.param(constants::CHARSET_PARAM))
            .unwrap_or(default_encoding);

        let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);
        let (text, _, _) = encoding.decode(&self.data);

        Ok(text.into_owned())
    }

    /// The body deserialized from JSON.
    ///
    /// # Optional
    ///
    /// This requires the optional `json` feature to be enabled.
    #[cfg(feature = "json")]
    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_slice(&self.data).map_err(crate::Error::DecodeJson)
    }
}
