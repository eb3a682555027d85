use crate::base64::Base64Decoder;
use crate::constants;
use crate::constraints::Constraints;
use crate::header::Header;
use crate::part::Part;
use crate::scanner::RecordScanner;
use crate::state::{Frame, ParserState};
use crate::stream::{Flow, Sink};
use bytes::{Bytes, BytesMut};
use futures_util::pin_mut;
use futures_util::stream::{Stream, StreamExt, TryStreamExt};
use http::header::{self, HeaderMap};
use std::mem;
#[cfg(feature = "tokio-io")]
use tokio::io::AsyncRead;
#[cfg(feature = "tokio-io")]
use tokio_util::io::ReaderStream;

/// Receives the leaf parts of a multipart stream, in order.
///
/// For every leaf part the parser calls [`on_part`](Handler::on_part) once the
/// part's headers are complete. The returned sink then receives the part's
/// body, base64-decoded if the part declares `Content-Transfer-Encoding:
/// base64`, followed by `on_end` before the next part starts.
pub trait Handler {
    /// The sink receiving a part body.
    type Body: Sink;

    /// Called when the headers of a leaf part are complete.
    fn on_part(&mut self, part: Part) -> crate::Result<Self::Body>;

    /// Called once the closing delimiter of the outermost boundary is consumed.
    fn on_end(&mut self) {}

    /// Called once if the parse fails. Nothing else is delivered afterwards.
    fn on_error(&mut self, _err: &crate::Error) {}
}

impl<H: Handler + ?Sized> Handler for &mut H {
    type Body = H::Body;

    fn on_part(&mut self, part: Part) -> crate::Result<Self::Body> {
        (**self).on_part(part)
    }

    fn on_end(&mut self) {
        (**self).on_end()
    }

    fn on_error(&mut self, err: &crate::Error) {
        (**self).on_error(err)
    }
}

enum BodySink<B> {
    Identity(B),
    Base64(Base64Decoder<B>),
}

impl<B: Sink> Sink for BodySink<B> {
    fn on_data(&mut self, chunk: Bytes) -> crate::Result<()> {
        match self {
            BodySink::Identity(sink) => sink.on_data(chunk),
            BodySink::Base64(decoder) => decoder.on_data(chunk),
        }
    }

    fn on_end(&mut self) -> crate::Result<()> {
        match self {
            BodySink::Identity(sink) => sink.on_end(),
            BodySink::Base64(decoder) => decoder.on_end(),
        }
    }

    fn on_error(&mut self, err: &crate::Error) {
        match self {
            BodySink::Identity(sink) => sink.on_error(err),
            BodySink::Base64(decoder) => decoder.on_error(err),
        }
    }
}

/// Parses `multipart/form-data` (and nested `multipart/mixed`) data pushed to it
/// chunk by chunk.
///
/// `Multipart` is itself a [`Sink`]: feed it with [`on_data`](Sink::on_data) and
/// finish with [`on_end`](Sink::on_end), or let [`run`](Multipart::run) drive it
/// from a [`Stream`]. Every chunk is processed before the call returns; parts
/// are reported to the [`Handler`] strictly in the order their bytes arrive.
///
/// Chunks may be split anywhere. A chunk that only carries part of a
/// delimiter or of a header line is kept until the rest arrives.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use pushpart::{Collector, Multipart, Sink};
///
/// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
///
/// let mut multipart = Multipart::new("X-BOUNDARY", Collector::new());
/// for chunk in data.as_bytes().chunks(7) {
///     multipart.on_data(Bytes::copy_from_slice(chunk)).unwrap();
/// }
/// multipart.on_end().unwrap();
///
/// let fields = multipart.into_handler().into_fields();
/// assert_eq!(fields[0].name(), Some("my_text_field"));
/// assert_eq!(fields[0].text().unwrap(), "abcd");
/// ```
pub struct Multipart<H: Handler> {
    handler: H,
    constraints: Constraints,
    scanner: RecordScanner,
    current: Frame,
    parents: Vec<Frame>,
    state: ParserState,
    pending_header: Option<BytesMut>,
    body: Option<BodySink<H::Body>>,
    next_part_idx: usize,
    flow: Flow,
    failed: bool,
    complete: bool,
}

impl<H: Handler> Multipart<H> {
    /// Constructs a new `Multipart` for the given boundary, without the leading `--`.
    pub fn new<B: AsRef<[u8]>>(boundary: B, handler: H) -> Multipart<H> {
        Multipart::with_constraints(boundary, handler, Constraints::default())
    }

    /// Constructs a new `Multipart` with the given [`Constraints`].
    pub fn with_constraints<B: AsRef<[u8]>>(boundary: B, handler: H, constraints: Constraints) -> Multipart<H> {
        Multipart {
            handler,
            constraints,
            scanner: RecordScanner::new(),
            current: Frame::new(boundary.as_ref()),
            parents: Vec::new(),
            state: ParserState::Preamble,
            pending_header: None,
            body: None,
            next_part_idx: 0,
            flow: Flow::new(),
            failed: false,
            complete: false,
        }
    }

    /// Constructs a new `Multipart` taking the boundary from a
    /// `multipart/form-data` content type.
    pub fn from_content_type<T: AsRef<str>>(content_type: T, handler: H) -> crate::Result<Multipart<H>> {
        crate::parse_boundary(content_type).map(|boundary| Multipart::new(boundary, handler))
    }

    /// Constructs a new `Multipart` taking the boundary from the `Content-Type`
    /// of a request's headers.
    pub fn from_headers(headers: &HeaderMap, handler: H) -> crate::Result<Multipart<H>> {
        crate::boundary_from_headers(headers).map(|boundary| Multipart::new(boundary, handler))
    }

    /// The pause/resume switch the source feeding this parser should honor.
    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    /// Returns a reference to the handler receiving the parts.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns a mutable reference to the handler receiving the parts.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consumes the parser, returning the handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Returns `true` once the closing delimiter of the outermost boundary was consumed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns `true` once the parse has failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Drives the parser from a stream of chunks until the stream ends, and
    /// returns the handler.
    ///
    /// No chunk is pulled while the [`flow`](Multipart::flow) is paused.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use futures_util::stream::once;
    /// use pushpart::{Collector, Multipart};
    /// use std::convert::Infallible;
    ///
    /// # async fn run() {
    /// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
    /// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
    ///
    /// let collector = Multipart::new("X-BOUNDARY", Collector::new()).run(stream).await.unwrap();
    /// for field in collector.into_fields() {
    ///     println!("Field: {:?}", field.text());
    /// }
    /// # }
    /// # tokio::runtime::Runtime::new().unwrap().block_on(run());
    /// ```
    pub async fn run<S, O, E>(mut self, stream: S) -> crate::Result<H>
    where
        S: Stream<Item = Result<O, E>>,
        O: Into<Bytes>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let stream = stream
            .map_ok(|chunk| -> Bytes { chunk.into() })
            .map_err(|err| crate::Error::StreamReadFailed(err.into()));
        pin_mut!(stream);

        loop {
            self.flow.ready().await;

            match stream.next().await {
                Some(Ok(chunk)) => self.on_data(chunk)?,
                Some(Err(err)) => {
                    self.on_error(&err);
                    return Err(err);
                }
                None => {
                    self.on_end()?;
                    return Ok(self.handler);
                }
            }
        }
    }

    /// Drives the parser from an [`AsyncRead`] until it reaches EOF, and returns
    /// the handler.
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    pub async fn run_reader<R: AsyncRead>(self, reader: R) -> crate::Result<H> {
        self.run(ReaderStream::new(reader)).await
    }

    fn drive(&mut self) -> crate::Result<()> {
        loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(err) => {
                    self.abort(&err);
                    return Err(err);
                }
            }
        }
    }

    /// Consumes at most one record from the scanner. Returns `false` if more
    /// input is needed.
    fn step(&mut self) -> crate::Result<bool> {
        match self.state {
            ParserState::Preamble => {
                let limit = self.constraints.max_preamble_len;
                let record = match self.scanner.scan(&self.current.boundary, limit) {
                    Some(record) => record,
                    None => return Ok(false),
                };

                if !record.delimited {
                    return Err(crate::Error::PreambleTooLong { limit });
                }

                self.transition(ParserState::PreHeaders);
            }
            ParserState::PreHeaders => {
                let record = match self.scanner.scan(constants::CRLF, self.constraints.max_header_line_len) {
                    Some(record) => record,
                    None => return Ok(false),
                };

                if !record.delimited {
                    return Err(crate::Error::TrailingDataAfterDelimiter);
                }

                if record.bytes == constants::BOUNDARY_EXT {
                    self.transition(ParserState::End);
                } else if record.bytes.is_empty() {
                    self.current.headers.clear();
                    self.transition(ParserState::Headers);
                } else {
                    return Err(crate::Error::CorruptMultipart);
                }
            }
            ParserState::Headers => {
                let limit = self.constraints.max_header_line_len;
                let record = match self.scanner.scan(constants::CRLF, limit) {
                    Some(record) => record,
                    None => return Ok(false),
                };

                if !record.delimited {
                    return Err(crate::Error::HeaderLineTooLong { limit });
                }

                let line = record.bytes;
                if matches!(line.first(), Some(b' ') | Some(b'\t')) {
                    match self.pending_header.as_mut() {
                        Some(pending) => pending.extend_from_slice(&line),
                        None => {
                            return Err(crate::Error::IllegalContinuationHeader(
                                String::from_utf8_lossy(&line).into_owned(),
                            ))
                        }
                    }
                } else if line.is_empty() {
                    self.commit_header()?;
                    self.end_headers()?;
                } else {
                    self.commit_header()?;
                    self.pending_header = Some(BytesMut::from(&line[..]));
                }
            }
            ParserState::Body => {
                let delimiter = self.current.body_boundary();
                let record = match self.scanner.scan(&delimiter, self.constraints.max_body_chunk_len) {
                    Some(record) => record,
                    None => return Ok(false),
                };

                if let Some(body) = self.body.as_mut() {
                    if !record.bytes.is_empty() {
                        body.on_data(record.bytes)?;
                    }
                    if record.delimited {
                        body.on_end()?;
                    }
                }

                if record.delimited {
                    self.body = None;
                    self.transition(ParserState::PreHeaders);
                }
            }
            ParserState::End => match self.parents.pop() {
                Some(parent) => {
                    self.current = parent;
                    trace!("leaving nested multipart, depth {}", self.parents.len());
                    self.transition(ParserState::Preamble);
                }
                None => {
                    if !self.complete {
                        self.complete = true;
                        // Anything after the closing delimiter is epilogue.
                        self.scanner.clear();
                        debug!("multipart stream complete, {} parts", self.next_part_idx);
                        self.handler.on_end();
                    }
                    return Ok(false);
                }
            },
        }

        Ok(true)
    }

    fn commit_header(&mut self) -> crate::Result<()> {
        if let Some(line) = self.pending_header.take() {
            let header = Header::parse(&line)?;
            self.current.headers.insert(header);
        }
        Ok(())
    }

    fn end_headers(&mut self) -> crate::Result<()> {
        let nested_boundary = match self.current.headers.get(header::CONTENT_TYPE.as_str()) {
            Some(content_type) if content_type.value().eq_ignore_ascii_case(constants::MULTIPART_MIXED) => Some(
                content_type
                    .param(constants::BOUNDARY_PARAM)
                    .ok_or(crate::Error::NoBoundary)?
                    .to_owned(),
            ),
            _ => None,
        };

        if let Some(boundary) = nested_boundary {
            let parent = mem::replace(&mut self.current, Frame::new(boundary.as_bytes()));
            self.parents.push(parent);
            trace!("entering nested multipart, depth {}", self.parents.len());
            self.transition(ParserState::Preamble);
            return Ok(());
        }

        let idx = self.next_part_idx;
        self.next_part_idx += 1;

        let part = Part::new(mem::take(&mut self.current.headers), idx, self.flow.clone());
        let is_base64 = part
            .transfer_encoding()
            .map_or(false, |encoding| encoding.eq_ignore_ascii_case(constants::BASE64));

        debug!(
            "part {} started: name={:?} file_name={:?} content_type={:?}",
            idx,
            part.name(),
            part.file_name(),
            part.content_type()
        );

        let body = self.handler.on_part(part)?;
        self.body = Some(if is_base64 {
            BodySink::Base64(Base64Decoder::with_flow(body, self.flow.clone()))
        } else {
            BodySink::Identity(body)
        });

        self.transition(ParserState::Body);
        Ok(())
    }

    fn transition(&mut self, next: ParserState) {
        trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn abort(&mut self, err: &crate::Error) {
        self.failed = true;
        debug!("multipart parse failed: {}", err);

        if let Some(mut body) = self.body.take() {
            body.on_error(err);
        }
        self.pending_header = None;
        self.scanner.clear();
        self.handler.on_error(err);
    }
}

impl<H: Handler> Sink for Multipart<H> {
    fn on_data(&mut self, chunk: Bytes) -> crate::Result<()> {
        if self.failed || self.complete {
            return Ok(());
        }

        self.scanner.add(&chunk);
        self.drive()
    }

    fn on_end(&mut self) -> crate::Result<()> {
        if self.failed || self.complete {
            return Ok(());
        }

        // A closing delimiter may end the input without its CRLF.
        if self.state == ParserState::PreHeaders
            && self.parents.is_empty()
            && self.scanner.remaining() == constants::BOUNDARY_EXT
        {
            self.scanner.clear();
            self.transition(ParserState::End);
            self.drive()?;
        }

        if !self.complete {
            let err = crate::Error::IllegalEndState;
            self.abort(&err);
            return Err(err);
        }

        Ok(())
    }

    fn on_error(&mut self, err: &crate::Error) {
        if !self.failed && !self.complete {
            self.abort(err);
        }
    }
}
