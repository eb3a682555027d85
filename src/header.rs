use std::fmt::{self, Display, Formatter};

/// A parsed header line: `name: value; param=value; ...`.
///
/// The name is lowercased. Parameters keep their order of appearance; a bare
/// parameter without `=` has no value. A repeated parameter name keeps the
/// last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
    params: Vec<(String, Option<String>)>,
}

impl Header {
    /// Parses one unfolded header line.
    ///
    /// # Examples
    ///
    /// ```
    /// use pushpart::Header;
    ///
    /// let header = Header::parse(br#"Content-Disposition: form-data; name="a \"b\"""#).unwrap();
    /// assert_eq!(header.name(), "content-disposition");
    /// assert_eq!(header.value(), "form-data");
    /// assert_eq!(header.param("name"), Some(r#"a "b""#));
    /// ```
    pub fn parse(line: &[u8]) -> crate::Result<Header> {
        HeaderParser { line, pos: 0 }.parse()
    }

    /// The lowercased header name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The primary value, unquoted.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the value of the parameter `name`, if present and not bare.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_deref())
    }

    /// Returns `true` if the parameter `name` is present, with or without a value.
    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Iterates over the parameters in order of appearance.
    pub fn params(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.params.iter().map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    fn set_param(&mut self, name: String, value: Option<String>) {
        match self.params.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.params.push((name, value)),
        }
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)?;
        for (key, value) in &self.params {
            match value {
                Some(value) => write!(f, "; {}=\"{}\"", key, value.replace('\\', "\\\\").replace('"', "\\\""))?,
                None => write!(f, "; {}", key)?,
            }
        }
        Ok(())
    }
}

struct HeaderParser<'a> {
    line: &'a [u8],
    pos: usize,
}

impl<'a> HeaderParser<'a> {
    fn parse(mut self) -> crate::Result<Header> {
        self.skip_ws();
        let name = self.token(b":").to_ascii_lowercase();
        self.skip_ws();
        self.expect(b":")?;

        self.skip_ws();
        let value = self.value(b",;")?;
        self.skip_ws();

        let mut header = Header {
            name,
            value,
            params: Vec::new(),
        };

        while self.has(b",;") {
            self.pos += 1;
            self.skip_ws();

            let param_name = self.token(b"=,;").to_ascii_lowercase();
            self.skip_ws();

            let mut param_value = None;
            if self.has(b"=") {
                self.pos += 1;
                self.skip_ws();
                param_value = Some(self.value(b",;")?);
                self.skip_ws();
            }

            header.set_param(param_name, param_value);
        }

        Ok(header)
    }

    fn token(&mut self, separators: &[u8]) -> String {
        let start = self.pos;
        while let Some(&ch) = self.line.get(self.pos) {
            if ch.is_ascii_whitespace() || separators.contains(&ch) {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.line[start..self.pos]).into_owned()
    }

    fn value(&mut self, separators: &[u8]) -> crate::Result<String> {
        if self.line.get(self.pos) != Some(&b'"') {
            return Ok(self.token(separators));
        }

        self.pos += 1;
        let mut value = Vec::new();

        while let Some(&ch) = self.line.get(self.pos) {
            match ch {
                b'"' => {
                    self.pos += 1;
                    return Ok(String::from_utf8_lossy(&value).into_owned());
                }
                b'\\' => {
                    self.pos += 1;
                    match self.line.get(self.pos) {
                        Some(&escaped) => value.push(escaped),
                        None => break,
                    }
                }
                _ => value.push(ch),
            }
            self.pos += 1;
        }

        Err(self.malformed("missing end quote"))
    }

    fn expect(&mut self, separators: &[u8]) -> crate::Result<()> {
        if self.has(separators) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.malformed(&format!("expected {} at pos {}", String::from_utf8_lossy(separators), self.pos)))
        }
    }

    fn has(&self, separators: &[u8]) -> bool {
        self.line.get(self.pos).map_or(false, |ch| separators.contains(ch))
    }

    fn skip_ws(&mut self) {
        while self.line.get(self.pos).map_or(false, u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn malformed(&self, reason: &str) -> crate::Error {
        crate::Error::MalformedHeader(format!("{} in {}", reason, String::from_utf8_lossy(self.line)))
    }
}

/// The headers of one part, keyed by lowercased name in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    pub(crate) fn new() -> Headers {
        Headers::default()
    }

    /// Returns the header `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&Header> {
        self.entries.iter().find(|header| header.name.eq_ignore_ascii_case(name))
    }

    /// Returns the primary value of the header `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(Header::value)
    }

    /// Iterates over the headers in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    /// The number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the part carried no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a header. A repeated name is comma-joined into the existing value.
    pub(crate) fn insert(&mut self, header: Header) {
        match self.entries.iter_mut().find(|existing| existing.name == header.name) {
            Some(existing) => {
                existing.value.push(',');
                existing.value.push_str(&header.value);
            }
            None => self.entries.push(header),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
