pub mod connection;
pub mod form;
pub mod headers;

pub use connection::HttpConnection;
pub use form::{form_value, parse_int_lenient};
pub use headers::{ContentHeaders, ContentType, HttpMethod, ResponseHeaders, TextEncoding};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Closed,
    Parse,
    NoData,
    FormatHeaders,
    TooLarge,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Closed => write!(f, "connection closed"),
            Error::Parse => write!(f, "malformed request"),
            Error::NoData => write!(f, "no request body"),
            Error::FormatHeaders => write!(f, "failed to format headers"),
            Error::TooLarge => write!(f, "request too large"),
        }
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_error: core::fmt::Error) -> Self {
        Error::FormatHeaders
    }
}

/// Collapse a stream error into [`Error::Closed`]
pub(crate) fn stream_error<E: embedded_io_async::Error>(err: E) -> Error {
    log::debug!("http: stream error: {:?}", err.kind());
    Error::Closed
}

pub type HttpResult = Result<(), Error>;
