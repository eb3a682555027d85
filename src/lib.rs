//! A push-driven parser for `multipart/form-data` and nested `multipart/mixed`
//! bodies.
//!
//! The body is handed to a [`Multipart`] chunk by chunk, in whatever sizes the
//! transport delivers it, and is never buffered as a whole. Each leaf part is
//! announced to a [`Handler`] as soon as its headers are complete; its body is
//! then pushed to the [`Sink`] the handler returns, base64-decoded on the way
//! if the part declares `Content-Transfer-Encoding: base64`.
//!
//! # Examples
//!
//! ```
//! use bytes::Bytes;
//! use pushpart::{Handler, Multipart, Part, Sink};
//!
//! struct Printer;
//!
//! struct PrintBody(Part);
//!
//! impl Handler for Printer {
//!     type Body = PrintBody;
//!
//!     fn on_part(&mut self, part: Part) -> pushpart::Result<PrintBody> {
//!         println!("part {:?}, file {:?}", part.name(), part.file_name());
//!         Ok(PrintBody(part))
//!     }
//! }
//!
//! impl Sink for PrintBody {
//!     fn on_data(&mut self, chunk: Bytes) -> pushpart::Result<()> {
//!         println!("{:?}: {} bytes", self.0.name(), chunk.len());
//!         Ok(())
//!     }
//!
//!     fn on_end(&mut self) -> pushpart::Result<()> {
//!         println!("{:?}: done", self.0.name());
//!         Ok(())
//!     }
//! }
//!
//! # fn run() -> pushpart::Result<()> {
//! let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
//!
//! let mut multipart = Multipart::from_content_type("multipart/form-data; boundary=X-BOUNDARY", Printer)?;
//! multipart.on_data(Bytes::from(data))?;
//! multipart.on_end()?;
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```

pub use base64::Base64Decoder;
pub use bytes;
pub use collect::{Collector, Field, FieldBuffer};
pub use constraints::Constraints;
pub use error::Error;
pub use header::{Header, Headers};
pub use multipart::{Handler, Multipart};
pub use part::Part;
pub use stream::{Flow, Sink};

#[macro_use]
mod macros;

mod base64;
mod collect;
mod constants;
mod constraints;
mod error;
mod header;
mod multipart;
mod part;
mod scanner;
mod state;
mod stream;

/// A Result type often returned from methods that can have `pushpart` errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Parses the `Content-Type` header to extract the boundary value.
///
/// # Examples
///
/// ```
/// let content_type = "multipart/form-data; boundary=ABCDEFG";
///
/// assert_eq!(pushpart::parse_boundary(content_type), Ok("ABCDEFG".to_owned()));
/// ```
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> Result<String> {
    let m = content_type
        .as_ref()
        .parse::<mime::Mime>()
        .map_err(Error::DecodeContentType)?;

    if !(m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA) {
        return Err(Error::NoMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str().to_owned())
        .ok_or(Error::NoBoundary)
}

/// Extracts the boundary value from the `Content-Type` of a request's headers.
pub fn boundary_from_headers(headers: &http::HeaderMap) -> Result<String> {
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|val| val.to_str().ok())
        .ok_or(Error::NoMultipart)?;

    parse_boundary(content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

    #[test]
    fn test_parse_boundary() {
        let content_type = "multipart/form-data; boundary=ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("ABCDEFG".to_owned()));

        let content_type = "multipart/form-data; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("------ABCDEFG".to_owned()));

        let content_type = "multipart/form-data; boundary=\"AaB03x\"";
        assert_eq!(parse_boundary(content_type), Ok("AaB03x".to_owned()));

        let content_type = "boundary=------ABCDEFG";
        assert!(parse_boundary(content_type).is_err());

        let content_type = "text/plain";
        assert_eq!(parse_boundary(content_type), Err(Error::NoMultipart));

        let content_type = "text/plain; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Err(Error::NoMultipart));

        let content_type = "multipart/form-data";
        assert_eq!(parse_boundary(content_type), Err(Error::NoBoundary));
    }

    #[test]
    fn test_boundary_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(boundary_from_headers(&headers), Err(Error::NoMultipart));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("multipart/form-data; boundary=X-BOUNDARY"));
        assert_eq!(boundary_from_headers(&headers), Ok("X-BOUNDARY".to_owned()));
    }
}
