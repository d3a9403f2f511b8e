// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::io::{Error as WriteError, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::common::ascii::{CR, LF, SP};
use crate::common::headers::{media_type_for_suffix, Headers};
use crate::common::message::Message;
use crate::common::{Body, ResponseError, Version};
use crate::request::{find, find_headers_end};

/// Wrapper over a response status code, valid in 100..=599.
///
/// Every code carries a canonical reason phrase; `StatusLine` lets a caller
/// override it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const CONTINUE: StatusCode = StatusCode(100);
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const MOVED_PERMANENTLY: StatusCode = StatusCode(301);
    pub const FOUND: StatusCode = StatusCode(302);
    pub const TEMPORARY_REDIRECT: StatusCode = StatusCode(307);
    pub const PERMANENT_REDIRECT: StatusCode = StatusCode(308);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const REQUEST_HEADER_FIELDS_TOO_LARGE: StatusCode = StatusCode(431);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const NOT_IMPLEMENTED: StatusCode = StatusCode(501);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    /// # Errors
    /// `InvalidStatusCode` is returned for codes outside 100..=599.
    pub fn new(code: u16) -> Result<Self, ResponseError> {
        if (100..=599).contains(&code) {
            Ok(Self(code))
        } else {
            Err(ResponseError::InvalidStatusCode(
                "Status code out of range.",
            ))
        }
    }

    pub fn code(self) -> u16 {
        self.0
    }

    /// The canonical reason phrase for this code.
    pub fn phrase(self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            402 => "Payment Required",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            412 => "Precondition Failed",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            417 => "Expectation Failed",
            418 => "I'm a Teapot",
            422 => "Unprocessable Entity",
            425 => "Too Early",
            426 => "Upgrade Required",
            428 => "Precondition Required",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            451 => "Unavailable For Legal Reasons",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    pub fn is_informational(self) -> bool {
        (100..=199).contains(&self.0)
    }

    pub fn is_successful(self) -> bool {
        (200..=299).contains(&self.0)
    }

    pub fn is_redirect(self) -> bool {
        (300..=399).contains(&self.0)
    }

    pub fn is_client_error(self) -> bool {
        (400..=499).contains(&self.0)
    }

    pub fn is_server_error(self) -> bool {
        (500..=599).contains(&self.0)
    }

    pub fn try_from(bytes: &[u8]) -> Result<Self, ResponseError> {
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.parse::<u16>().ok())
            .ok_or(ResponseError::InvalidStatusCode(
                "Status code is not a number.",
            ))
            .and_then(Self::new)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.phrase())
    }
}

#[derive(Debug)]
struct StatusLine {
    http_version: Version,
    status_code: StatusCode,
    status_message: Option<String>,
}

impl StatusLine {
    fn new(http_version: Version, status_code: StatusCode) -> Self {
        Self {
            http_version,
            status_code,
            status_message: None,
        }
    }

    fn write_all<T: Write>(&self, buf: &mut T) -> Result<(), WriteError> {
        buf.write_all(self.http_version.raw())?;
        buf.write_all(&[SP])?;
        buf.write_all(self.status_code.code().to_string().as_bytes())?;
        buf.write_all(&[SP])?;
        match &self.status_message {
            Some(status_text) => buf.write_all(status_text.as_bytes())?,
            None => buf.write_all(self.status_code.phrase().as_bytes())?,
        }
        buf.write_all(&[CR, LF])?;

        Ok(())
    }

    fn parse_status_line(status_line: &[u8]) -> (&[u8], &[u8], &[u8]) {
        if let Some(version_end) = find(status_line, &[SP]) {
            let version = &status_line[..version_end];

            let code_and_message = &status_line[(version_end + 1)..];

            if let Some(code_end) = find(code_and_message, &[SP]) {
                let code = &code_and_message[..code_end];

                let message = &code_and_message[(code_end + 1)..];

                return (version, code, message);
            }

            return (version, code_and_message, b"");
        }

        (b"", b"", b"")
    }

    fn try_from(status_line: &[u8]) -> Result<Self, ResponseError> {
        let (version, code, message) = Self::parse_status_line(status_line);
        let message = if message.is_empty() {
            None
        } else {
            Some(
                String::from_utf8(message.to_vec())
                    .map_err(|_| ResponseError::InvalidResponse)?,
            )
        };

        Ok(Self {
            http_version: Version::try_from(version)
                .map_err(|_| ResponseError::InvalidResponse)?,
            status_code: StatusCode::try_from(code)?,
            status_message: message,
        })
    }
}

/// How a handler wants its return value shaped, overriding the by-type
/// inference of `Response::from_return`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ReturnHint {
    /// Infer from the value's own type.
    #[default]
    Auto,
    Html,
    Json,
    File,
    Error,
    Redirect,
    Plain,
}

/// What a handler produced, before response shaping.
#[derive(Debug)]
pub enum ReturnValue {
    None,
    Response(Box<Response>),
    Status(StatusCode),
    Bytes(Vec<u8>),
    Text(String),
    FilePath(PathBuf),
    Json(serde_json::Value),
}

impl ReturnValue {
    /// Serializes any `Serialize` value into the JSON variant. A value that
    /// cannot serialize becomes JSON null.
    pub fn from_serialize<T: serde::Serialize>(data: &T) -> Self {
        Self::Json(serde_json::to_value(data).unwrap_or(serde_json::Value::Null))
    }
}

impl From<Response> for ReturnValue {
    fn from(r: Response) -> Self {
        Self::Response(Box::new(r))
    }
}

impl From<StatusCode> for ReturnValue {
    fn from(s: StatusCode) -> Self {
        Self::Status(s)
    }
}

impl From<Vec<u8>> for ReturnValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<&str> for ReturnValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ReturnValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<PathBuf> for ReturnValue {
    fn from(p: PathBuf) -> Self {
        Self::FilePath(p)
    }
}

impl From<serde_json::Value> for ReturnValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<()> for ReturnValue {
    fn from(_: ()) -> Self {
        Self::None
    }
}

/// Wrapper over an HTTP Response.
///
/// Built through the named constructors (`html`, `json`, `file`, `error`,
/// `redirect`) or shaped from a handler return value by `from_return`. The
/// shaping layer guarantees a `Content-Type` header.
#[derive(Debug)]
pub struct Response {
    status_line: StatusLine,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Creates a new HTTP `Response` with an empty body.
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_line: StatusLine::new(Version::default(), status_code),
            headers: Headers::default(),
            body: Body::default(),
        }
    }

    pub fn with_version(mut self, http_version: Version) -> Self {
        self.status_line.http_version = http_version;
        self
    }

    /// Overrides the canonical reason phrase.
    pub fn with_phrase<T: Into<String>>(mut self, phrase: T) -> Self {
        self.status_line.status_message = Some(phrase.into());
        self
    }

    /// A `text/plain` response.
    pub fn plain<T: Into<Vec<u8>>>(status_code: StatusCode, body: T) -> Self {
        let mut response = Self::new(status_code);
        response.headers.set("Content-Type", "text/plain");
        response.body = Body::new(body);
        response
    }

    /// A `text/html` response.
    pub fn html<T: Into<String>>(html: T) -> Self {
        let mut response = Self::new(StatusCode::OK);
        response.headers.set("Content-Type", "text/html");
        response.body = Body::new(html.into());
        response
    }

    /// An `application/json` response from any `Serialize` value. A value
    /// that cannot serialize becomes JSON null.
    pub fn json<T: serde::Serialize>(data: &T) -> Self {
        let rendered = serde_json::to_vec(data).unwrap_or_else(|_| b"null".to_vec());
        Self::json_text(rendered)
    }

    /// An `application/json` response whose body is already JSON text.
    pub fn json_text<T: Into<Vec<u8>>>(body: T) -> Self {
        let mut response = Self::new(StatusCode::OK);
        response.headers.set("Content-Type", "application/json");
        response.body = Body::new(body);
        response
    }

    /// A 500 `text/plain` response; the body carries whatever detail the
    /// error mode allowed through.
    pub fn error<T: Into<Vec<u8>>>(message: T) -> Self {
        Self::plain(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// A 307 redirect.
    pub fn redirect<T: Into<String>>(location: T) -> Self {
        let mut response = Self::new(StatusCode::TEMPORARY_REDIRECT);
        response.headers.set("Location", location.into());
        response.headers.set("Content-Type", "text/plain");
        response
    }

    /// A 308 redirect.
    pub fn redirect_permanent<T: Into<String>>(location: T) -> Self {
        Self::redirect(location).with_status(StatusCode::PERMANENT_REDIRECT)
    }

    fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_line.status_code = status_code;
        self
    }

    /// Serves a file from disk, fully read into memory. The content type
    /// comes from the suffix table; `Content-Length` and `Last-Modified` are
    /// set from file metadata. A directory is served as a freshly built ZIP
    /// of its entries.
    ///
    /// # Errors
    /// Propagates any filesystem error; the caller shapes it like a handler
    /// failure.
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self, WriteError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        let (bytes, content_type) = if metadata.is_dir() {
            (zip_directory(path)?, "application/zip".to_string())
        } else {
            let suffix = path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            (
                std::fs::read(path)?,
                media_type_for_suffix(&suffix).to_string(),
            )
        };

        let mut response = Self::new(StatusCode::OK);
        response.headers.set("Content-Type", content_type);
        response
            .headers
            .set("Content-Length", bytes.len().to_string());
        if let Ok(modified) = metadata.modified() {
            let stamp: DateTime<Utc> = modified.into();
            response.headers.set(
                "Last-Modified",
                stamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            );
        }
        response.body = Body::new(bytes);
        Ok(response)
    }

    /// Maps a handler return value to a response (the by-type dispatch the
    /// route entries rely on). A concrete `hint` wins over the inference.
    pub fn from_return(
        value: ReturnValue,
        hint: ReturnHint,
        version: Version,
    ) -> Result<Self, WriteError> {
        let response = match value {
            ReturnValue::Response(response) => {
                let mut response = *response;
                response
                    .headers
                    .set_if_absent("Content-Type", "application/octet-stream");
                return Ok(response);
            }
            ReturnValue::Status(code) => Self::plain(code, code.phrase()),
            ReturnValue::Bytes(bytes) => match hint {
                ReturnHint::Json => Self::json_text(bytes),
                ReturnHint::Html => Self::html(String::from_utf8_lossy(&bytes).into_owned()),
                ReturnHint::Error => Self::error(bytes),
                ReturnHint::Plain => Self::plain(StatusCode::OK, bytes),
                _ => {
                    let mut response = Self::new(StatusCode::OK);
                    response
                        .headers
                        .set("Content-Type", "application/octet-stream");
                    response.body = Body::new(bytes);
                    response
                }
            },
            ReturnValue::Text(text) => match hint {
                // Already-JSON text goes out verbatim.
                ReturnHint::Json => Self::json_text(text.into_bytes()),
                ReturnHint::File => Self::file(PathBuf::from(text))?,
                ReturnHint::Error => Self::error(text.into_bytes()),
                ReturnHint::Redirect => Self::redirect(text),
                ReturnHint::Plain => Self::plain(StatusCode::OK, text.into_bytes()),
                _ => Self::html(text),
            },
            ReturnValue::FilePath(path) => Self::file(path)?,
            ReturnValue::Json(json) => match hint {
                ReturnHint::Html => Self::html(json.to_string()),
                ReturnHint::Plain => Self::plain(StatusCode::OK, json.to_string()),
                _ => Self::json_text(json.to_string()),
            },
            ReturnValue::None => Self::json_text("null"),
        };
        Ok(response.with_version(version))
    }

    /// Returns the Status Code of the Response.
    pub fn status(&self) -> StatusCode {
        self.status_line.status_code
    }

    pub fn http_version(&self) -> Version {
        self.status_line.http_version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.raw()
    }

    /// Serializes the response: status line, headers in insertion order, the
    /// blank line, then the body. With `include_body` false (HEAD) the
    /// headers are identical but zero body bytes follow.
    pub fn write_to<U: Write>(&mut self, out: &mut U, include_body: bool) -> Result<(), WriteError> {
        if !self.body.is_empty() {
            self.headers
                .set("Content-Length", self.body.len().to_string());
        }
        self.status_line.write_all(out)?;
        self.headers.write_all(out)?;
        if include_body {
            out.write_all(self.body.raw())?;
        }
        Ok(())
    }

    /// Reads a response off a stream: status line and headers first, then as
    /// many body bytes as `Content-Length` declares.
    pub fn receive<U: Read>(input: &mut U) -> Result<Self, ResponseError> {
        let mut buf = vec![];
        let mut chunk = [0u8; 1024];
        let (head_end, body_start) = loop {
            let read = input
                .read(&mut chunk)
                .map_err(|_| ResponseError::InvalidResponse)?;
            if read == 0 {
                return Err(ResponseError::InvalidResponse);
            }
            buf.extend_from_slice(&chunk[..read]);
            if let Some(found) = find_headers_end(&buf) {
                break found;
            }
        };

        let head = &buf[..head_end];
        let line_end = find(head, b"\r\n").unwrap_or(head.len());
        let status_line = StatusLine::try_from(&head[..line_end])?;
        let headers = if line_end < head.len() {
            Headers::try_from(&head[line_end + 2..]).map_err(|_| ResponseError::InvalidResponse)?
        } else {
            Headers::default()
        };

        let content_length = headers
            .content_length()
            .map_err(|_| ResponseError::InvalidResponse)?;
        let mut body = buf[body_start.min(buf.len())..].to_vec();
        while body.len() < content_length {
            let read = input
                .read(&mut chunk)
                .map_err(|_| ResponseError::InvalidResponse)?;
            if read == 0 {
                return Err(ResponseError::InvalidResponse);
            }
            body.extend_from_slice(&chunk[..read]);
        }
        body.truncate(content_length);

        Ok(Self {
            status_line,
            headers,
            body: Body::new(body),
        })
    }
}

impl Message for Response {
    fn send<U: Write>(&mut self, out: &mut U) -> Result<(), WriteError> {
        self.write_to(out, true)
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    fn with_header(&mut self, key: &str, value: &str) -> &mut Self {
        self.headers.set(key, value);
        self
    }

    fn version(&self) -> Version {
        self.status_line.http_version
    }

    fn body(&self) -> &[u8] {
        self.body.raw()
    }

    fn with_body(&mut self, bytes: &[u8]) -> &mut Self {
        self.headers.set("Content-Length", bytes.len().to_string());
        self.body = Body::new(bytes);
        self
    }
}

/// Zips the top-level entries of `path` into an in-memory archive, stored
/// uncompressed.
fn zip_directory(path: &Path) -> Result<Vec<u8>, WriteError> {
    let to_io = |e: zip::result::ZipError| WriteError::new(std::io::ErrorKind::Other, e);

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);

    let mut entries = std::fs::read_dir(path)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            writer.add_directory(format!("{name}/"), options).map_err(to_io)?;
        } else {
            writer.start_file(name, options).map_err(to_io)?;
            writer.write_all(&std::fs::read(entry.path())?)?;
        }
    }
    Ok(writer.finish().map_err(to_io)?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        assert_eq!(StatusCode::new(200).unwrap(), StatusCode::OK);
        assert_eq!(StatusCode::OK.phrase(), "OK");
        assert_eq!(StatusCode::new(404).unwrap().phrase(), "Not Found");
        assert_eq!(StatusCode::new(599).unwrap().phrase(), "Unknown");
        assert!(StatusCode::new(600).is_err());
        assert!(StatusCode::new(99).is_err());
        assert!(StatusCode::INTERNAL_SERVER_ERROR.is_server_error());
        assert!(StatusCode::TEMPORARY_REDIRECT.is_redirect());
        assert_eq!(StatusCode::try_from(b"431").unwrap().code(), 431);
        assert!(StatusCode::try_from(b"abc").is_err());
    }

    #[test]
    fn test_emit_format() {
        let mut response = Response::plain(StatusCode::OK, "hi").with_version(Version::Http11);
        let mut wire = vec![];
        response.write_to(&mut wire, true).unwrap();
        assert_eq!(
            &wire[..],
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi"
                as &[u8]
        );
    }

    #[test]
    fn test_head_strips_body_only() {
        let mut response = Response::plain(StatusCode::OK, "hi");
        let mut full = vec![];
        response.write_to(&mut full, true).unwrap();
        let mut head = vec![];
        response.write_to(&mut head, false).unwrap();
        assert!(full.ends_with(b"hi"));
        assert_eq!(&full[..full.len() - 2], &head[..]);
    }

    #[test]
    fn test_phrase_override() {
        let mut response =
            Response::new(StatusCode::OK).with_phrase("Everything Fine");
        let mut wire = vec![];
        response.write_to(&mut wire, true).unwrap();
        assert!(wire.starts_with(b"HTTP/1.1 200 Everything Fine\r\n"));
    }

    #[test]
    fn test_named_constructors() {
        let html = Response::html("<h1>hi</h1>");
        assert_eq!(html.headers().get("Content-Type"), Some("text/html"));

        let json = Response::json(&serde_json::json!({"x": 6}));
        assert_eq!(json.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(json.body_bytes(), b"{\"x\":6}");

        let error = Response::error("boom");
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.headers().get("Content-Type"), Some("text/plain"));

        let redirect = Response::redirect("/elsewhere");
        assert_eq!(redirect.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(redirect.headers().get("Location"), Some("/elsewhere"));
        assert_eq!(
            Response::redirect_permanent("/p").status(),
            StatusCode::PERMANENT_REDIRECT
        );
    }

    #[test]
    fn test_from_return_inference() {
        let v = Version::Http11;
        let r = Response::from_return(ReturnValue::Text("hi".into()), ReturnHint::Auto, v)
            .unwrap();
        assert_eq!(r.headers().get("Content-Type"), Some("text/html"));

        let r = Response::from_return(
            ReturnValue::Bytes(b"raw".to_vec()),
            ReturnHint::Auto,
            v,
        )
        .unwrap();
        assert_eq!(
            r.headers().get("Content-Type"),
            Some("application/octet-stream")
        );

        let r = Response::from_return(
            ReturnValue::Json(serde_json::json!(5)),
            ReturnHint::Auto,
            v,
        )
        .unwrap();
        assert_eq!(r.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(r.body_bytes(), b"5");

        let r = Response::from_return(
            ReturnValue::Status(StatusCode::NO_CONTENT),
            ReturnHint::Auto,
            v,
        )
        .unwrap();
        assert_eq!(r.status(), StatusCode::NO_CONTENT);
        assert_eq!(r.body_bytes(), b"No Content");

        let r = Response::from_return(ReturnValue::None, ReturnHint::Auto, v).unwrap();
        assert_eq!(r.body_bytes(), b"null");
    }

    #[test]
    fn test_struct_serializes_to_json() {
        #[derive(serde::Serialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let response = Response::json(&Point { x: 6, y: 7 });
        assert_eq!(response.body_bytes(), b"{\"x\":6,\"y\":7}");

        let value = ReturnValue::from_serialize(&Point { x: 1, y: 2 });
        let shaped =
            Response::from_return(value, ReturnHint::Auto, Version::Http11).unwrap();
        assert_eq!(
            shaped.headers().get("Content-Type"),
            Some("application/json")
        );
        assert_eq!(shaped.body_bytes(), b"{\"x\":1,\"y\":2}");
    }

    #[test]
    fn test_from_return_hint_wins() {
        let v = Version::Http11;
        let r = Response::from_return(
            ReturnValue::Text("[1, 2]".into()),
            ReturnHint::Json,
            v,
        )
        .unwrap();
        assert_eq!(r.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(r.body_bytes(), b"[1, 2]");

        let r = Response::from_return(
            ReturnValue::Text("/tmp".into()),
            ReturnHint::Redirect,
            v,
        )
        .unwrap();
        assert_eq!(r.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[test]
    fn test_file_response() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("page.html");
        std::fs::write(&file_path, "<p>doc</p>").unwrap();

        let response = Response::file(&file_path).unwrap();
        assert_eq!(response.headers().get("Content-Type"), Some("text/html"));
        assert_eq!(response.headers().get("Content-Length"), Some("10"));
        assert!(response.headers().get("Last-Modified").unwrap().ends_with("GMT"));
        assert_eq!(response.body_bytes(), b"<p>doc</p>");

        assert!(Response::file(dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_directory_response_is_zip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();

        let response = Response::file(dir.path()).unwrap();
        assert_eq!(
            response.headers().get("Content-Type"),
            Some("application/zip")
        );
        // ZIP local file header magic.
        assert_eq!(&response.body_bytes()[..4], b"PK\x03\x04");
    }

    #[test]
    fn test_receive_round_trip() {
        let mut response = Response::json(&serde_json::json!({"ok": true}));
        let mut wire = vec![];
        response.write_to(&mut wire, true).unwrap();

        let parsed = Response::receive(&mut &wire[..]).unwrap();
        assert_eq!(parsed.status(), StatusCode::OK);
        assert_eq!(parsed.body_bytes(), response.body_bytes());
        assert_eq!(
            parsed.headers().get("Content-Type"),
            Some("application/json")
        );
    }
}
