use core::fmt::Write;

use embedded_io_async::Read;

pub type StatusCode = u16;

fn reason_phrase(code: StatusCode) -> &'static str {
    match code {
        200 => "OK",
        302 => "Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// HTTP Content Type.
#[derive(Debug, Clone, Copy)]
pub enum ContentType {
    TextHtml,
    TextPlain,
}

impl ContentType {
    /// Convert the content type to a string.
    pub(super) fn as_str(self) -> &'static str {
        match self {
            ContentType::TextHtml => "text/html",
            ContentType::TextPlain => "text/plain",
        }
    }
}

/// Text Encoding.
#[derive(Debug, Clone, Copy)]
pub enum TextEncoding {
    Utf8,
}

impl TextEncoding {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
        }
    }
}

/// HTTP socket connection policy.
#[derive(Debug, Clone, Copy)]
pub(super) enum ConnectionPolicy {
    Close,
}

impl ConnectionPolicy {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            ConnectionPolicy::Close => "close",
        }
    }
}

pub(super) trait TargetWriter {
    fn write_to(&self, writer: &mut impl Write) -> Result<(), core::fmt::Error>;
}

/// HTTP Content Headers.
#[derive(Debug, Clone, Copy)]
pub struct ContentHeaders {
    content_type: ContentType,
    content_length: Option<usize>,
    text_encoding: Option<TextEncoding>,
}

impl ContentHeaders {
    /// Create a new content headers with a content type.
    pub const fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            content_length: None,
            text_encoding: None,
        }
    }

    /// Set the content length.
    #[must_use]
    pub const fn with_length(mut self, length: usize) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Set the text encoding.
    #[must_use]
    pub const fn with_text_encoding(mut self, text_encoding: TextEncoding) -> Self {
        self.text_encoding = Some(text_encoding);
        self
    }
}

impl TargetWriter for ContentHeaders {
    fn write_to(&self, writer: &mut impl Write) -> Result<(), core::fmt::Error> {
        write!(writer, "Content-Type: {}", self.content_type.as_str())?;
        if let Some(text_encoding) = self.text_encoding {
            write!(writer, "; charset={}", text_encoding.as_str())?;
        }
        write!(writer, "\r\n")?;
        if let Some(content_length) = self.content_length {
            write!(writer, "Content-Length: {}\r\n", content_length)?;
        }
        Ok(())
    }
}

/// Response Headers.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHeaders<'a> {
    status: StatusCode,
    connection: ConnectionPolicy,
    content: Option<ContentHeaders>,
    location: Option<&'a str>,
}

impl<'a> ResponseHeaders<'a> {
    /// Create empty response headers.
    pub const fn empty() -> Self {
        Self {
            status: 0,
            content: None,
            connection: ConnectionPolicy::Close,
            location: None,
        }
    }

    /// Create empty response headers with a status code.
    pub const fn from_code(code: StatusCode) -> Self {
        Self::empty().with_code(code)
    }

    pub const fn success() -> Self {
        Self::from_code(200)
    }

    /// Redirect the client to `location`.
    pub const fn found(location: &'a str) -> Self {
        let mut headers = Self::from_code(302);
        headers.location = Some(location);
        headers
    }

    pub const fn internal_error() -> Self {
        Self::from_code(500)
    }

    /// Set the content headers.
    #[must_use]
    pub const fn with_content(mut self, content: ContentHeaders) -> Self {
        self.content = Some(content);
        self
    }

    /// Set the status code.
    #[must_use]
    pub const fn with_code(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }
}

impl TargetWriter for ResponseHeaders<'_> {
    /// Write the response headers to a writer.
    fn write_to(&self, writer: &mut impl Write) -> Result<(), core::fmt::Error> {
        let reason = reason_phrase(self.status);
        write!(writer, "HTTP/1.1 {} {}\r\n", self.status, reason)?;
        if let Some(location) = self.location {
            write!(writer, "Location: {}\r\n", location)?;
        }
        if let Some(content) = &self.content {
            content.write_to(writer)?;
        }

        write!(writer, "Connection: {}\r\n", self.connection.as_str())?;
        write!(writer, "\r\n")?;
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub(super) fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "PATCH" => HttpMethod::Patch,
            "OPTIONS" => HttpMethod::Options,
            "HEAD" => HttpMethod::Head,
            _ => return None,
        })
    }
}

/// Parse the request line from the header string.
///
/// Returns the method, path, and rest of the header string.
pub(super) fn parse_request_line(header_str: &str) -> Option<(HttpMethod, &str, &str)> {
    let line_end = header_str.find("\r\n").unwrap_or(header_str.len());
    let first_line = &header_str[..line_end];
    let mut parts = first_line.split_whitespace();
    let method = parts.next().and_then(HttpMethod::parse)?;
    let path = parts.next()?;

    Some((method, path, header_str.get(line_end + 2..).unwrap_or("")))
}

/// Read the start line and headers from the stream.
///
/// Returns the position of the end of the headers and the number of bytes
/// read. If the peer closes before sending anything, returns (0, 0).
pub(super) async fn read_heading<R: Read>(
    buf: &mut [u8],
    stream: &mut R,
) -> Result<(usize, usize), R::Error> {
    let mut header_len = 0;
    let mut header_end = None;
    while header_len < buf.len() {
        let n = stream.read(&mut buf[header_len..]).await?;
        if n == 0 {
            break;
        }
        header_len += n;
        if let Some(pos) = buf[..header_len].windows(4).position(|w| w == b"\r\n\r\n") {
            header_end = Some(pos + 4);
            break;
        }
    }

    let header_end = header_end.unwrap_or(header_len);

    Ok((header_end, header_len))
}

/// Find the content length in the header string.
pub(super) fn find_content_length(header: &str) -> Option<usize> {
    const TARGET: &str = "content-length:";
    for line in header.lines() {
        let Some(name) = line.get(..TARGET.len()) else {
            continue;
        };
        if name.eq_ignore_ascii_case(TARGET) {
            let length = line[TARGET.len()..].trim().parse::<usize>().ok()?;
            log::debug!("http: found Content-Length: {}", length);
            return Some(length);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_is_split() {
        let (method, path, rest) =
            parse_request_line("POST /save HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(method, HttpMethod::Post);
        assert_eq!(path, "/save");
        assert_eq!(rest, "Host: x\r\n\r\n");
    }

    #[test]
    fn request_line_without_headers() {
        let (method, path, rest) = parse_request_line("GET / HTTP/1.0").unwrap();
        assert_eq!(method, HttpMethod::Get);
        assert_eq!(path, "/");
        assert_eq!(rest, "");
        assert!(parse_request_line("BREW /pot HTTP/1.1\r\n").is_none());
    }

    #[test]
    fn content_length_is_case_insensitive() {
        assert_eq!(find_content_length("Host: x\r\ncontent-LENGTH: 42\r\n"), Some(42));
        assert_eq!(find_content_length("Host: x\r\n"), None);
    }

    #[test]
    fn redirect_headers() {
        let mut out = heapless::String::<128>::new();
        ResponseHeaders::found("/").write_to(&mut out).unwrap();
        assert_eq!(
            out.as_str(),
            "HTTP/1.1 302 Found\r\nLocation: /\r\nConnection: close\r\n\r\n"
        );
    }
}
