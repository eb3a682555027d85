pub(crate) const DEFAULT_MAX_RECORD_LEN: usize = 4096;

pub(crate) const BOUNDARY_EXT: &[u8] = b"--";
pub(crate) const CRLF: &[u8] = b"\r\n";

pub(crate) const MULTIPART_MIXED: &str = "multipart/mixed";
pub(crate) const BASE64: &str = "base64";

pub(crate) const BOUNDARY_PARAM: &str = "boundary";
pub(crate) const NAME_PARAM: &str = "name";
pub(crate) const FILENAME_PARAM: &str = "filename";
pub(crate) const CHARSET_PARAM: &str = "charset";
pub(crate) const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";
