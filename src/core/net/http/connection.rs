use embedded_io_async::{Read, Write};
use heapless::{String, Vec};

use super::{
    Error,
    HttpResult,
    form::form_value,
    headers::{
        ContentHeaders,
        ContentType,
        HttpMethod,
        ResponseHeaders,
        TargetWriter as _,
        TextEncoding,
        find_content_length,
        parse_request_line,
        read_heading,
    },
    stream_error,
};

const HEADER_BUFFER_SIZE: usize = 512;
const BODY_BUFFER_SIZE: usize = 1024;
const BODY_RX_CHUNK_SIZE: usize = 256;
const STREAM_CHUNK_SIZE: usize = 1024;
const PATH_SIZE: usize = 64;

/// One request/response exchange over a byte stream
pub struct HttpConnection<S> {
    pub method: HttpMethod,
    pub path: String<PATH_SIZE>,

    stream: S,
    content_length: usize,
    header_end: usize,
    header_buf: Vec<u8, HEADER_BUFFER_SIZE>,
    body_buf: Vec<u8, BODY_BUFFER_SIZE>,
    body_read: bool,
}

impl<S: Read + Write> HttpConnection<S> {
    /// Read the request line and headers from `stream`.
    ///
    /// The query string is stripped from the path.
    pub async fn from_stream(mut stream: S) -> Result<Self, Error> {
        let mut header_buf = Vec::<u8, HEADER_BUFFER_SIZE>::new();
        let _ = header_buf.resize_default(HEADER_BUFFER_SIZE);
        let (header_end, header_len) = read_heading(header_buf.as_mut_slice(), &mut stream)
            .await
            .map_err(stream_error)?;
        if header_len == 0 {
            return Err(Error::Closed);
        }
        header_buf.truncate(header_len);

        // Body bytes may follow the headers in the same read
        let header_str =
            core::str::from_utf8(&header_buf[..header_end]).map_err(|_| Error::Parse)?;
        let (method, raw_path, rest_headers) =
            parse_request_line(header_str).ok_or(Error::Parse)?;
        let content_length = find_content_length(rest_headers).unwrap_or(0);

        let raw_path = raw_path.split('?').next().unwrap_or(raw_path);
        let mut path = String::new();
        if path.push_str(raw_path).is_err() {
            return Err(Error::TooLarge);
        }
        log::debug!("http: {:?} {}", method, path);

        Ok(Self {
            method,
            path,
            stream,
            content_length,
            header_end,
            header_buf,
            body_buf: Vec::new(),
            body_read: false,
        })
    }

    /// Get request method and path
    pub fn route(&self) -> (HttpMethod, &'_ str) {
        (self.method, self.path.as_str())
    }

    /// Read the request body, up to `Content-Length` bytes
    pub async fn read_body(&mut self) -> Result<&[u8], Error> {
        if self.body_read {
            return Ok(self.body_buf.as_slice());
        }
        if self.content_length == 0 {
            return Err(Error::NoData);
        }
        if self.content_length > BODY_BUFFER_SIZE {
            return Err(Error::TooLarge);
        }

        self.body_buf.clear();
        let tail = self.header_buf.get(self.header_end..).unwrap_or(&[]);
        let tail = &tail[..tail.len().min(self.content_length)];
        self.body_buf
            .extend_from_slice(tail)
            .map_err(|()| Error::TooLarge)?;

        while self.body_buf.len() < self.content_length {
            let mut buf = [0u8; BODY_RX_CHUNK_SIZE];
            let want = (self.content_length - self.body_buf.len()).min(BODY_RX_CHUNK_SIZE);
            let n = self
                .stream
                .read(&mut buf[..want])
                .await
                .map_err(stream_error)?;
            if n == 0 {
                break;
            }
            self.body_buf
                .extend_from_slice(&buf[..n])
                .map_err(|()| Error::TooLarge)?;
        }

        self.body_read = true;
        Ok(self.body_buf.as_slice())
    }

    /// Look up an `application/x-www-form-urlencoded` field of the body.
    ///
    /// A request without a body has no fields.
    pub async fn form_field<const N: usize>(
        &mut self,
        name: &str,
    ) -> Result<Option<String<N>>, Error> {
        let body = match self.read_body().await {
            Ok(body) => body,
            Err(Error::NoData) => return Ok(None),
            Err(e) => return Err(e),
        };
        let body = core::str::from_utf8(body).map_err(|_| Error::Parse)?;
        Ok(form_value(body, name))
    }

    /// Write the headers to the connection
    pub async fn write_headers(&mut self, headers: &ResponseHeaders<'_>) -> HttpResult {
        self.header_buf.clear();
        headers.write_to(&mut self.header_buf)?;
        self.stream
            .write_all(self.header_buf.as_slice())
            .await
            .map_err(stream_error)?;
        self.flush().await
    }

    /// Write the body to the connection
    pub async fn write_body(&mut self, body: &[u8]) -> HttpResult {
        for chunk in body.chunks(STREAM_CHUNK_SIZE) {
            self.stream.write_all(chunk).await.map_err(stream_error)?;
        }
        self.flush().await
    }

    /// Write a complete `text/html` response
    pub async fn write_html(&mut self, headers: ResponseHeaders<'_>, html: &str) -> HttpResult {
        let content = ContentHeaders::new(ContentType::TextHtml)
            .with_text_encoding(TextEncoding::Utf8)
            .with_length(html.len());
        self.write_headers(&headers.with_content(content)).await?;
        self.write_body(html.as_bytes()).await
    }

    /// Write a complete `text/plain` response
    pub async fn write_text(&mut self, headers: ResponseHeaders<'_>, text: &str) -> HttpResult {
        let content = ContentHeaders::new(ContentType::TextPlain).with_length(text.len());
        self.write_headers(&headers.with_content(content)).await?;
        self.write_body(text.as_bytes()).await
    }

    /// Redirect the client to `location` with an empty body
    pub async fn redirect(&mut self, location: &str) -> HttpResult {
        let content = ContentHeaders::new(ContentType::TextPlain).with_length(0);
        self.write_headers(&ResponseHeaders::found(location).with_content(content))
            .await
    }

    /// Release the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn flush(&mut self) -> HttpResult {
        self.stream.flush().await.map_err(stream_error)
    }
}
