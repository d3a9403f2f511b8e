// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::io::{Error as WriteError, Write};
use std::net::TcpStream;
use std::sync::{Arc, OnceLock};

use percent_encoding::percent_decode_str;

use crate::common::ascii::{CR, CRLF_LEN, LF, SP};
use crate::common::headers::Headers;
use crate::common::message::Message;
use crate::common::{Body, ClientAddr, Method, RequestError, Version};

/// Finds the first occurence of `sequence` in the `bytes` slice.
///
/// Returns the starting position of the `sequence` in `bytes` or `None` if
/// the `sequence` is not found.
pub fn find(bytes: &[u8], sequence: &[u8]) -> Option<usize> {
    bytes
        .windows(sequence.len())
        .position(|window| window == sequence)
}

/// Locates the end of the header block in an accumulating request buffer.
///
/// Returns `(head_end, body_start)`, where `head_end` is the offset just
/// before the terminator. Input is tolerant: `\r\n\r\n` or bare `\n\n`.
pub(crate) fn find_headers_end(bytes: &[u8]) -> Option<(usize, usize)> {
    let crlf = find(bytes, b"\r\n\r\n");
    let lf = find(bytes, b"\n\n");
    match (crlf, lf) {
        (Some(c), Some(l)) if l < c => Some((l, l + 2)),
        (Some(c), _) => Some((c, c + 2 * CRLF_LEN)),
        (None, Some(l)) => Some((l, l + 2)),
        (None, None) => None,
    }
}

/// Percent-decodes `text`, keeping it as-is when the escapes are not valid
/// UTF-8.
pub(crate) fn url_decode(text: &str) -> String {
    percent_decode_str(text)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

/// The raw request-target, query string included.
///
/// `route()` and `query_args()` are the two derived views the dispatcher and
/// the argument adapter work from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestPath {
    raw: String,
}

impl RequestPath {
    pub fn new<T: Into<String>>(path: T) -> Self {
        Self { raw: path.into() }
    }

    fn try_from(bytes: &[u8]) -> Result<Self, RequestError> {
        if bytes.is_empty() {
            return Err(RequestError::InvalidUri("Empty URI not allowed."));
        }
        let utf8_slice = std::str::from_utf8(bytes)
            .map_err(|_| RequestError::InvalidUri("Cannot parse URI as UTF-8."))?;
        Ok(Self::new(utf8_slice))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The substring before the first `?`, percent-decoded.
    pub fn route(&self) -> String {
        let route = self.raw.split_once('?').map_or(&*self.raw, |(r, _)| r);
        url_decode(route)
    }

    /// The raw query string, empty when there is none.
    pub fn query(&self) -> &str {
        self.raw.split_once('?').map_or("", |(_, q)| q)
    }

    /// Splits the query string on `&`, each fragment on the first `=`.
    /// Repeated keys: later wins. Keys and values are percent-decoded.
    pub fn query_args(&self) -> BTreeMap<String, String> {
        let mut args = BTreeMap::new();
        for fragment in self.query().split('&') {
            if fragment.is_empty() {
                continue;
            }
            let (key, value) = fragment.split_once('=').unwrap_or((fragment, ""));
            args.insert(url_decode(key), url_decode(value));
        }
        args
    }
}

impl std::fmt::Display for RequestPath {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Wrapper over an HTTP Request Line.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestLine {
    method: Method,
    path: RequestPath,
    http_version: Version,
}

impl RequestLine {
    pub fn new(method: Method, path: RequestPath, http_version: Version) -> Self {
        Self {
            method,
            path,
            http_version,
        }
    }

    fn split_request_line(request_line: &[u8]) -> (&[u8], &[u8], &[u8]) {
        if let Some(method_end) = find(request_line, &[SP]) {
            let method = &request_line[..method_end];

            let uri_and_version = &request_line[(method_end + 1)..];

            if let Some(uri_end) = find(uri_and_version, &[SP]) {
                let uri = &uri_and_version[..uri_end];

                let version = &uri_and_version[(uri_end + 1)..];

                return (method, uri, version);
            }

            return (method, uri_and_version, b"");
        }

        (b"", b"", b"")
    }

    /// Tries to parse a byte stream into a request line. Fails if the line is
    /// malformed: the three tokens must be separated by single spaces and the
    /// version token must be the last one.
    ///
    /// # Errors
    /// `InvalidHttpMethod` is returned if the specified HTTP method is
    /// unsupported.
    /// `InvalidHttpVersion` is returned if the specified HTTP version is
    /// unsupported.
    /// `InvalidUri` is returned if the specified URI is not valid.
    pub fn try_from(request_line: &[u8]) -> Result<Self, RequestError> {
        let (method, uri, version) = Self::split_request_line(request_line);
        if find(version, &[SP]).is_some() {
            return Err(RequestError::InvalidRequest);
        }

        Ok(Self {
            method: Method::try_from(method)?,
            path: RequestPath::try_from(uri)?,
            http_version: Version::try_from(version)?,
        })
    }

    // Returns the minimum length of a valid request line: the method (GET),
    // the URI (minimum 1 character), the HTTP version (HTTP/DIGIT.DIGIT) and
    // 2 separators (SP).
    fn min_len() -> usize {
        Method::Get.raw().len() + 1 + Version::Http10.raw().len() + 2
    }
}

/// Wrapper over an HTTP Request.
///
/// Once constructed a request is read-only; the derived views (`route`,
/// `query_args`) are computed lazily and cached.
#[derive(Debug)]
pub struct Request {
    request_line: RequestLine,
    /// The headers of the request.
    pub headers: Headers,
    body: Body,
    client_addr: Option<ClientAddr>,
    socket: Option<Arc<TcpStream>>,
    route_cache: OnceLock<String>,
    query_cache: OnceLock<BTreeMap<String, String>>,
}

impl Request {
    /// Builds an outgoing request, used by the client half.
    pub fn new(method: Method, path: RequestPath) -> Self {
        Self::from_parts(
            RequestLine::new(method, path, Version::default()),
            Headers::default(),
            Body::default(),
            None,
            None,
        )
    }

    pub(crate) fn from_parts(
        request_line: RequestLine,
        headers: Headers,
        body: Body,
        client_addr: Option<ClientAddr>,
        socket: Option<Arc<TcpStream>>,
    ) -> Self {
        Self {
            request_line,
            headers,
            body,
            client_addr,
            socket,
            route_cache: OnceLock::new(),
            query_cache: OnceLock::new(),
        }
    }

    /// Parses a byte slice holding one complete HTTP request.
    ///
    /// The slice is expected to contain the request line, an optional header
    /// block, and an optional body whose length agrees with the
    /// `Content-Length` header.
    ///
    /// # Errors
    /// The function returns `InvalidRequest` when parsing the byte stream
    /// fails.
    pub fn try_from(byte_stream: &[u8]) -> Result<Self, RequestError> {
        let (head_end, body_start) =
            find_headers_end(byte_stream).ok_or(RequestError::InvalidRequest)?;
        let (request_line, headers) = Self::parse_head(&byte_stream[..head_end])?;

        let body_bytes = &byte_stream[body_start.min(byte_stream.len())..];
        let content_length = headers.content_length()?;
        // The actual length of the body must agree with `Content-Length`.
        if body_bytes.len() != content_length {
            return Err(RequestError::InvalidRequest);
        }

        Ok(Self::from_parts(
            request_line,
            headers,
            Body::new(body_bytes),
            None,
            None,
        ))
    }

    /// Splits the bytes before the header terminator into the request line
    /// and the header map. Shared by the slice parser above and the
    /// incremental connection codec.
    pub(crate) fn parse_head(head: &[u8]) -> Result<(RequestLine, Headers), RequestError> {
        let line_end = match find(head, &[LF]) {
            Some(lf) if lf > 0 && head[lf - 1] == CR => lf - 1,
            Some(lf) => lf,
            None => head.len(),
        };
        if line_end < RequestLine::min_len() {
            return Err(RequestError::InvalidRequest);
        }
        let request_line = RequestLine::try_from(&head[..line_end])?;

        let header_block = if line_end == head.len() {
            &[][..]
        } else {
            let after_line = if head[line_end] == CR {
                line_end + CRLF_LEN
            } else {
                line_end + 1
            };
            &head[after_line.min(head.len())..]
        };
        let headers = Headers::try_from(header_block)?;
        Ok((request_line, headers))
    }

    /// Returns the HTTP `Method` of the `Request`.
    pub fn method(&self) -> Method {
        self.request_line.method
    }

    /// Returns the request-target, query string included.
    pub fn path(&self) -> &RequestPath {
        &self.request_line.path
    }

    /// The decoded route portion of the path, cached after the first call.
    pub fn route(&self) -> &str {
        self.route_cache
            .get_or_init(|| self.request_line.path.route())
    }

    /// The decoded query map, cached after the first call.
    pub fn query_args(&self) -> &BTreeMap<String, String> {
        self.query_cache
            .get_or_init(|| self.request_line.path.query_args())
    }

    pub fn http_version(&self) -> Version {
        self.request_line.http_version
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.raw()
    }

    pub fn client_addr(&self) -> Option<&ClientAddr> {
        self.client_addr.as_ref()
    }

    /// The underlying transport, present only on requests parsed off a
    /// live connection.
    pub fn socket(&self) -> Option<&Arc<TcpStream>> {
        self.socket.as_ref()
    }
}

impl Message for Request {
    fn send<U: Write>(&mut self, out: &mut U) -> Result<(), WriteError> {
        if !self.body.is_empty() {
            self.headers
                .set("Content-Length", self.body.len().to_string());
        }
        out.write_all(self.request_line.method.raw())?;
        out.write_all(&[SP])?;
        out.write_all(self.request_line.path.as_str().as_bytes())?;
        out.write_all(&[SP])?;
        out.write_all(self.request_line.http_version.raw())?;
        out.write_all(&[CR, LF])?;
        self.headers.write_all(out)?;
        out.write_all(self.body.raw())?;
        Ok(())
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    fn with_header(&mut self, key: &str, value: &str) -> &mut Self {
        self.headers.set(key, value);
        self
    }

    fn version(&self) -> Version {
        self.request_line.http_version
    }

    fn body(&self) -> &[u8] {
        self.body.raw()
    }

    fn with_body(&mut self, bytes: &[u8]) -> &mut Self {
        self.body = Body::new(bytes);
        self
    }
}
