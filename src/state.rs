use crate::constants;
use crate::header::Headers;
use bytes::{BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParserState {
    Preamble,
    PreHeaders,
    Headers,
    Body,
    End,
}

/// One level of the part stack: the boundary in effect and the headers of the
/// part currently being read at that level.
#[derive(Debug)]
pub(crate) struct Frame {
    /// `--` followed by the boundary.
    pub(crate) boundary: Bytes,
    body_boundary: Option<Bytes>,
    pub(crate) headers: Headers,
}

impl Frame {
    pub(crate) fn new(boundary: &[u8]) -> Frame {
        let mut delimiter = BytesMut::with_capacity(constants::BOUNDARY_EXT.len() + boundary.len());
        delimiter.put_slice(constants::BOUNDARY_EXT);
        delimiter.put_slice(boundary);

        Frame {
            boundary: delimiter.freeze(),
            body_boundary: None,
            headers: Headers::new(),
        }
    }

    /// CRLF followed by the boundary delimiter, the end of a part body.
    pub(crate) fn body_boundary(&mut self) -> Bytes {
        let boundary = &self.boundary;
        self.body_boundary
            .get_or_insert_with(|| {
                let mut delimiter = BytesMut::with_capacity(constants::CRLF.len() + boundary.len());
                delimiter.put_slice(constants::CRLF);
                delimiter.put_slice(boundary);
                delimiter.freeze()
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_delimiters() {
        let mut frame = Frame::new(b"AaB03x");
        assert_eq!(frame.boundary, "--AaB03x");
        assert_eq!(frame.body_boundary(), "\r\n--AaB03x");
        assert_eq!(frame.body_boundary(), "\r\n--AaB03x");
    }
}
