// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A self-contained HTTP/1.1 application server: a hand-written wire codec
//! over blocking sockets, a route dispatcher with variadic templates, and a
//! handler adapter that assembles typed arguments from query, body, route
//! captures and a fixed set of injected request values.
//!
//! This implementation is deliberately small: no HTTP/2, no pipelining, no
//! chunked request bodies. One request is served per connection and the
//! socket is closed afterwards.
//!
//! ## Registering handlers
//!
//! A registration names the route pattern, the allowed methods, and the
//! handler's parameter signature; the adapter uses the signature to coerce
//! query values, digit-keyed positionals, JSON body members and route
//! captures into the arguments the handler sees.
//!
//! ```
//! use micro_serve::{Param, ReturnValue, Router, Signature, TypeHint};
//! use serde_json::json;
//!
//! let mut router = Router::new();
//! router.get(
//!     "/add",
//!     Signature::new()
//!         .param(Param::new("x").hint(TypeHint::Int))
//!         .param(Param::new("y").hint(TypeHint::Int)),
//!     |inv| {
//!         let sum = inv.get("x").unwrap().as_int().unwrap()
//!             + inv.get("y").unwrap().as_int().unwrap();
//!         Ok(ReturnValue::Json(json!(sum)))
//!     },
//! ).unwrap();
//! ```
//!
//! Route templates may interleave literal text and `{name}` placeholders
//! inside a segment; when several templates could match, the most specific
//! one wins (more segments, then more literal segments, then more literal
//! characters).
//!
//! ## Serving
//!
//! ```no_run
//! use micro_serve::{Router, Server, ServerConfig};
//!
//! let router = Router::new();
//! let handle = Server::spawn(router, ServerConfig::default()).unwrap();
//! // ... later:
//! handle.shutdown();
//! ```

mod client;
mod coerce;
mod common;
mod connection;
mod defaults;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod thread_pool;

pub use client::Client;
pub use coerce::{coerce, TypeHint, Value};
pub use connection::Connection;
pub use request::{Request, RequestPath};
pub use response::{Response, ReturnHint, ReturnValue, StatusCode};
pub use router::{MatchableHandler, RouteSpec, Router, StaticFileHandler};
pub use server::{Server, ServerConfig, ServerHandle};
pub use thread_pool::ThreadPool;

pub use common::headers::{media_type_for_suffix, Headers};
pub use common::message::Message;
pub use common::{
    BindError, Body, ClientAddr, ClientError, ConnectionError, Method, RegisterError,
    RequestError, ResponseError, ServerError, Version,
};
pub use handler::{
    Constraint, ErrorMode, HandlerError, HandlerFn, InjectionKind, Invocation, Param, RouteEntry,
    Signature,
};
