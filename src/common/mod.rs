// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

pub mod headers;
pub mod message;
pub mod net;

pub mod ascii {
    pub const CR: u8 = b'\r';
    pub const COLON: u8 = b':';
    pub const LF: u8 = b'\n';
    pub const SP: u8 = b' ';
    pub const CRLF_LEN: usize = 2;
}

/// Errors associated with parsing an HTTP request from a byte stream.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// The HTTP method is not in the supported set or is invalid.
    #[error("Invalid HTTP Method: {0}")]
    InvalidHttpMethod(&'static str),
    /// Request URI is invalid.
    #[error("Invalid URI: {0}")]
    InvalidUri(&'static str),
    /// The HTTP version in the request is not supported or is invalid.
    #[error("Invalid HTTP Version: {0}")]
    InvalidHttpVersion(&'static str),
    /// A header line is formatted incorrectly.
    #[error("Invalid header.")]
    InvalidHeader,
    /// The request is invalid and cannot be served.
    #[error("Invalid request.")]
    InvalidRequest,
}

/// Errors associated with parsing an HTTP response from a byte stream.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ResponseError {
    /// Response status code is invalid.
    #[error("Invalid Status Code: {0}")]
    InvalidStatusCode(&'static str),
    /// The response is invalid and cannot be parsed.
    #[error("Invalid response.")]
    InvalidResponse,
}

/// Errors associated with a single HTTP connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The peer went away before a full request arrived. Reported to the
    /// caller but never answered on the wire.
    #[error("Connection closed.")]
    ConnectionClosed,
    /// The request bytes did not parse. Answered with 400.
    #[error("Parsing error: {0}")]
    ParseError(#[from] RequestError),
    /// The header block exceeded the configured cap. Answered with 431.
    #[error("Header block too large.")]
    HeadersTooLarge,
    /// The declared body exceeded the configured cap. Answered with 413.
    #[error("Body too large.")]
    BodyTooLarge,
    /// Could not perform a stream operation successfully.
    #[error("Stream error: {0}")]
    StreamError(#[from] std::io::Error),
}

/// Errors raised while registering a route or a handler signature.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RegisterError {
    /// Two placeholders with nothing between them cannot be matched
    /// unambiguously.
    #[error("Adjacent placeholders in template segment '{0}'.")]
    AdjacentPlaceholders(String),
    /// The same placeholder name appears twice in one template.
    #[error("Duplicate placeholder '{0}' in template.")]
    DuplicatePlaceholder(String),
    /// A `{` or `}` without its counterpart.
    #[error("Unbalanced braces in template segment '{0}'.")]
    UnbalancedBraces(String),
    /// A sub-router is already mounted at this base path.
    #[error("Sub-route '{0}' already exists. Duplicate routes are not allowed.")]
    DuplicateSubRoute(String),
    /// `args`/`kwargs` may only name the respective collector.
    #[error("Parameter '{0}' is reserved for the collector of the same name.")]
    ReservedParamName(String),
    /// The same parameter name was declared twice.
    #[error("Parameter '{0}' declared more than once.")]
    DuplicateParam(String),
    /// A parameter uses an injection's canonical name with a data type hint.
    #[error("Parameter '{0}' must be typed as the '{0}' injection, not {1:?}.")]
    IncompatibleInjection(String, crate::coerce::TypeHint),
}

/// Errors raised while binding request values to a handler signature.
/// All of these answer the request with 400.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum BindError {
    /// Digit-keyed positionals must form a contiguous `0..k` range.
    #[error("Unable to parse args.")]
    PositionalGap,
    /// A keyword with no matching parameter and no `**kwargs` collector.
    #[error("Unexpected keyword argument '{0}'.")]
    UnexpectedKeyword(String),
    /// More positionals than parameters and no `*args` collector.
    #[error("Too many positional arguments.")]
    TooManyPositional,
    /// A required parameter received no value and has no default.
    #[error("Missing required argument '{0}'.")]
    MissingArgument(String),
    /// The same parameter was supplied positionally and by keyword.
    #[error("Got multiple values for argument '{0}'.")]
    DuplicateBinding(String),
    /// An `args` kwarg that is not an array cannot become the positional
    /// tuple.
    #[error("'args' must be an array.")]
    BadArgsValue,
}

/// Errors pertaining to the serving loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket setup or accept failed.
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

/// Errors associated with the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Could not perform a stream operation successfully.
    #[error("Stream error: {0}")]
    StreamError(#[from] std::io::Error),
    /// The peer's response did not parse.
    #[error("Response error: {0}")]
    ResponseError(#[from] ResponseError),
}

/// The body associated with an HTTP request or response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Body {
    /// Body of the HTTP message as bytes.
    pub stream: Vec<u8>,
}

impl Body {
    pub fn new<T: Into<Vec<u8>>>(body: T) -> Self {
        Self {
            stream: body.into(),
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.stream
    }

    /// Returns the length of the `Body`.
    pub fn len(&self) -> usize {
        self.stream.len()
    }

    /// Checks if the body is empty, ie with zero length.
    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }
}

/// Supported HTTP methods.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Connect,
    Trace,
}

impl Method {
    /// Returns a `Method` object if the parsing of `bytes` is successful.
    ///
    /// The method is case sensitive. A call to try_from with the input b"get"
    /// will return an error, but when using the input b"GET", it returns
    /// Method::Get.
    ///
    /// # Errors
    /// `InvalidHttpMethod` is returned if the specified HTTP method is
    /// unsupported.
    pub fn try_from(bytes: &[u8]) -> Result<Self, RequestError> {
        match bytes {
            b"GET" => Ok(Self::Get),
            b"HEAD" => Ok(Self::Head),
            b"POST" => Ok(Self::Post),
            b"PUT" => Ok(Self::Put),
            b"DELETE" => Ok(Self::Delete),
            b"PATCH" => Ok(Self::Patch),
            b"OPTIONS" => Ok(Self::Options),
            b"CONNECT" => Ok(Self::Connect),
            b"TRACE" => Ok(Self::Trace),
            _ => Err(RequestError::InvalidHttpMethod("Unsupported HTTP method.")),
        }
    }

    /// Returns an `u8 slice` corresponding to the Method.
    pub fn raw(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
        }
    }

    /// Whether a request with this method may carry a body when no
    /// `Content-Length` header is present.
    pub fn expects_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported HTTP versions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Version {
    /// HTTP/1.0
    Http10,
    /// HTTP/1.1
    #[default]
    Http11,
}

impl Version {
    /// HTTP version as an `u8 slice`.
    pub fn raw(self) -> &'static [u8] {
        match self {
            Self::Http10 => b"HTTP/1.0",
            Self::Http11 => b"HTTP/1.1",
        }
    }

    /// Creates a new HTTP version from an `u8 slice`.
    ///
    /// The supported versions are HTTP/1.0 and HTTP/1.1.
    /// The version is case sensitive and the accepted input is upper case.
    ///
    /// # Errors
    /// Returns a `InvalidHttpVersion` when the HTTP version is not supported.
    pub fn try_from(bytes: &[u8]) -> Result<Self, RequestError> {
        match bytes {
            b"HTTP/1.0" => Ok(Self::Http10),
            b"HTTP/1.1" => Ok(Self::Http11),
            _ => Err(RequestError::InvalidHttpVersion(
                "Unsupported HTTP version.",
            )),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        })
    }
}

/// The remote peer of a connection, kept as `host:port` text.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientAddr(String);

impl ClientAddr {
    pub fn new<T: Into<String>>(addr: T) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The host part, without the port.
    pub fn host(&self) -> &str {
        self.0.rsplit_once(':').map(|(h, _)| h).unwrap_or(&self.0)
    }

    pub fn port(&self) -> Option<u16> {
        self.0.rsplit_once(':').and_then(|(_, p)| p.parse().ok())
    }
}

impl From<SocketAddr> for ClientAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl std::fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
