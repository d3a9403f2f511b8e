// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::common::{Body, ClientAddr, ConnectionError, Method};
use crate::request::{find_headers_end, Request};
use crate::response::{Response, StatusCode};
use crate::router::Router;

/// Default read chunk, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
/// Default cap on the header block before 431 is returned.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;
/// Default cap on the declared body before 413 is returned.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// One accepted connection: reads exactly one request off the stream in
/// chunks, hands it to the dispatcher, writes the response, and is done.
/// The server closes the socket by dropping it afterwards.
pub struct Connection<T> {
    stream: T,
    chunk_size: usize,
    max_header_bytes: usize,
    max_body_bytes: usize,
}

impl<T: Read + Write> Connection<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_limits(
        mut self,
        chunk_size: usize,
        max_header_bytes: usize,
        max_body_bytes: usize,
    ) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.max_header_bytes = max_header_bytes;
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Runs the full request/response cycle. Protocol failures answer with
    /// their fixed status (400/413/431); an early EOF closes silently.
    pub fn handle(
        &mut self,
        router: &Router,
        client_addr: Option<ClientAddr>,
        socket: Option<Arc<TcpStream>>,
    ) {
        let peer = client_addr
            .as_ref()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "-".to_string());

        let request = match self.read_request(client_addr, socket) {
            Ok(request) => Arc::new(request),
            Err(ConnectionError::ConnectionClosed) => {
                log::debug!("connection from {} closed before a full request", peer);
                return;
            }
            Err(error) => {
                log::error!("protocol error from {}: {}", peer, error);
                if let Some(status) = Self::protocol_status(&error) {
                    self.answer(status);
                }
                return;
            }
        };

        log::info!("{} {} from {}", request.method(), request.path(), peer);
        let mut response = router.dispatch(&request);
        let head_only = request.method() == Method::Head;
        if let Err(error) = self.write_response(&mut response, head_only) {
            log::error!(
                "{} {} from {}: writing response failed: {}",
                request.method(),
                request.path(),
                peer,
                error
            );
        }
    }

    /// Reads chunks until the header terminator arrives, then as many body
    /// bytes as `Content-Length` declares. A request whose method expects no
    /// body and carries no `Content-Length` never blocks on a body read.
    pub fn read_request(
        &mut self,
        client_addr: Option<ClientAddr>,
        socket: Option<Arc<TcpStream>>,
    ) -> Result<Request, ConnectionError> {
        let mut buf: Vec<u8> = vec![];
        let mut chunk = vec![0u8; self.chunk_size];

        let (head_end, body_start) = loop {
            if let Some(found) = find_headers_end(&buf) {
                break found;
            }
            if buf.len() > self.max_header_bytes {
                return Err(ConnectionError::HeadersTooLarge);
            }
            let read = self.stream.read(&mut chunk)?;
            if read == 0 {
                // EOF before the terminator, with or without data.
                return Err(ConnectionError::ConnectionClosed);
            }
            buf.extend_from_slice(&chunk[..read]);
        };
        if head_end > self.max_header_bytes {
            return Err(ConnectionError::HeadersTooLarge);
        }

        let (request_line, headers) = Request::parse_head(&buf[..head_end])?;
        let content_length = headers.content_length()?;
        if content_length > self.max_body_bytes {
            return Err(ConnectionError::BodyTooLarge);
        }

        let mut body = buf[body_start.min(buf.len())..].to_vec();
        while body.len() < content_length {
            let read = self.stream.read(&mut chunk)?;
            if read == 0 {
                return Err(ConnectionError::ConnectionClosed);
            }
            body.extend_from_slice(&chunk[..read]);
        }
        body.truncate(content_length);

        Ok(Request::from_parts(
            request_line,
            headers,
            Body::new(body),
            client_addr,
            socket,
        ))
    }

    pub fn write_response(
        &mut self,
        response: &mut Response,
        head_only: bool,
    ) -> Result<(), ConnectionError> {
        response.write_to(&mut self.stream, !head_only)?;
        self.stream.flush()?;
        Ok(())
    }

    fn protocol_status(error: &ConnectionError) -> Option<StatusCode> {
        match error {
            ConnectionError::ParseError(_) => Some(StatusCode::BAD_REQUEST),
            ConnectionError::HeadersTooLarge => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            ConnectionError::BodyTooLarge => Some(StatusCode::PAYLOAD_TOO_LARGE),
            ConnectionError::ConnectionClosed | ConnectionError::StreamError(_) => None,
        }
    }

    fn answer(&mut self, status: StatusCode) {
        let mut response = Response::plain(status, status.phrase());
        // The peer may already be gone; nothing useful to do about it.
        let _ = self.write_response(&mut response, false);
    }
}
