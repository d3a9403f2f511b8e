// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::net::TcpStream;
use std::sync::Arc;

use crate::request::Request;

/// Declared type of a handler parameter.
///
/// The first group are data hints steering `coerce`; the second group are
/// injection sentinels — a parameter hinted with one of these receives the
/// corresponding request-derived value instead of a client-supplied argument.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TypeHint {
    Int,
    Float,
    Bool,
    Str,
    Bytes,
    List,
    Tuple,
    Set,
    Map,
    Request,
    Query,
    Body,
    HeadersMap,
    Route,
    FullPath,
    Method,
    File,
    ClientAddr,
    Socket,
}

impl TypeHint {
    pub fn is_injection(self) -> bool {
        matches!(
            self,
            Self::Request
                | Self::Query
                | Self::Body
                | Self::HeadersMap
                | Self::Route
                | Self::FullPath
                | Self::Method
                | Self::File
                | Self::ClientAddr
                | Self::Socket
        )
    }
}

/// A runtime-typed argument value.
///
/// `Json` carries the collection shapes (arrays and objects); `Request` and
/// `Socket` are the two opaque injection carriers.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Request(Arc<Request>),
    Socket(Arc<TcpStream>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Request(a), Self::Request(b)) => Arc::ptr_eq(a, b),
            (Self::Socket(a), Self::Socket(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&Arc<Request>> {
        match self {
            Self::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_socket(&self) -> Option<&Arc<TcpStream>> {
        match self {
            Self::Socket(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used when a capture is compared against a constraint value.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::Json(v) => v.to_string(),
            Self::Request(r) => format!("<Request {} {}>", r.method(), r.path().as_str()),
            Self::Socket(s) => s
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<socket>".to_string()),
        }
    }

    /// JSON rendering for response shaping; the opaque carriers stringify.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, Into::into)
            }
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            Self::Json(v) => v.clone(),
            Self::Request(_) | Self::Socket(_) => serde_json::Value::String(self.to_text()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Self::Str(s),
            other => Self::Json(other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

fn is_signed_decimal(text: &str) -> bool {
    let digits = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn looks_numeric(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

fn strip_brackets<'a>(text: &'a str, open: char, close: char) -> Option<&'a str> {
    if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Converts a textual argument into a typed value given a declared hint.
///
/// The rules run in a fixed order and the first match wins; anything that
/// fails to parse falls back to the original text, so this function is total.
pub fn coerce(text: &str, hint: Option<TypeHint>) -> Value {
    let open_to = |t: TypeHint| hint.is_none() || hint == Some(t);
    let lower = text.to_ascii_lowercase();

    if open_to(TypeHint::Int) && is_signed_decimal(text) {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Int(n);
        }
    }
    if open_to(TypeHint::Float) && looks_numeric(text) {
        if let Ok(f) = text.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
    }
    if open_to(TypeHint::Bool) {
        if matches!(lower.as_str(), "true" | "t" | "yes" | "y") {
            return Value::Bool(true);
        }
        if matches!(lower.as_str(), "false" | "f" | "no" | "n") {
            return Value::Bool(false);
        }
    }
    if matches!(lower.as_str(), "none" | "null") && hint != Some(TypeHint::Str) {
        return Value::Null;
    }
    if hint == Some(TypeHint::Bool) {
        match lower.as_str() {
            "0" => return Value::Bool(false),
            "1" | "ok" => return Value::Bool(true),
            _ => {}
        }
    }
    if hint == Some(TypeHint::Bytes) {
        return Value::Bytes(text.as_bytes().to_vec());
    }
    if open_to(TypeHint::List) && strip_brackets(text, '[', ']').is_some() {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(text) {
            return Value::Json(v);
        }
    }
    if open_to(TypeHint::Tuple) {
        if let Some(inner) = strip_brackets(text, '(', ')') {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&format!("[{inner}]")) {
                return Value::Json(v);
            }
        }
    }
    if open_to(TypeHint::Map) && strip_brackets(text, '{', '}').is_some() {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(text) {
            return Value::Json(v);
        }
    }
    if open_to(TypeHint::Set) {
        if let Some(inner) = strip_brackets(text, '{', '}') {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&format!("[{inner}]")) {
                return Value::Json(v);
            }
        }
    }
    Value::Str(text.to_string())
}
