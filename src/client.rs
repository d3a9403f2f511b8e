// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::net::TcpStream;

use crate::common::message::Message;
use crate::common::{ClientError, Method};
use crate::request::{Request, RequestPath};
use crate::response::Response;

/// The client-side counterpart of the server's connection contract: one
/// request per connection. Every call dials the address fresh, sends the
/// request, reads the response, and lets the socket drop.
pub struct Client {
    addr: String,
}

impl Client {
    /// `addr` is `host:port`, e.g. `127.0.0.1:8080`.
    pub fn new<T: Into<String>>(addr: T) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends a fully built request over a fresh connection. A `Host` header
    /// is filled in from the address unless the caller set one.
    pub fn send(&self, mut request: Request) -> Result<Response, ClientError> {
        if request.header("Host").is_none() {
            request.with_header("Host", &self.addr);
        }
        let mut stream = TcpStream::connect(&self.addr).map_err(ClientError::StreamError)?;
        request
            .send(&mut stream)
            .map_err(ClientError::StreamError)?;
        Ok(Response::receive(&mut stream)?)
    }

    pub fn get(&self, path: &str) -> Result<Response, ClientError> {
        self.send(Request::new(Method::Get, RequestPath::new(path)))
    }

    /// Like `get`, but the server strips the body; only status and headers
    /// come back.
    pub fn head(&self, path: &str) -> Result<Response, ClientError> {
        self.send(Request::new(Method::Head, RequestPath::new(path)))
    }

    pub fn post(
        &self,
        path: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<Response, ClientError> {
        let mut request = Request::new(Method::Post, RequestPath::new(path));
        request
            .with_header("Content-Type", content_type)
            .with_body(body);
        self.send(request)
    }
}
