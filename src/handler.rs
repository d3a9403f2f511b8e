// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::coerce::{coerce, TypeHint, Value};
use crate::common::{BindError, Method, RegisterError};
use crate::request::Request;
use crate::response::{Response, ReturnHint, ReturnValue};

/// The closed set of request-derived values a parameter can ask for, either
/// by its sentinel hint or by carrying the canonical name with no hint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InjectionKind {
    Request,
    Socket,
    Query,
    Body,
    Headers,
    Route,
    FullPath,
    Method,
    File,
    ClientAddr,
}

impl InjectionKind {
    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Socket => "socket",
            Self::Query => "query",
            Self::Body => "body",
            Self::Headers => "headers",
            Self::Route => "route",
            Self::FullPath => "full_path",
            Self::Method => "method",
            Self::File => "file",
            Self::ClientAddr => "client_addr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "request" => Some(Self::Request),
            "socket" => Some(Self::Socket),
            "query" => Some(Self::Query),
            "body" => Some(Self::Body),
            "headers" => Some(Self::Headers),
            "route" => Some(Self::Route),
            "full_path" => Some(Self::FullPath),
            "method" => Some(Self::Method),
            "file" => Some(Self::File),
            "client_addr" => Some(Self::ClientAddr),
            _ => None,
        }
    }

    pub fn from_hint(hint: TypeHint) -> Option<Self> {
        match hint {
            TypeHint::Request => Some(Self::Request),
            TypeHint::Socket => Some(Self::Socket),
            TypeHint::Query => Some(Self::Query),
            TypeHint::Body => Some(Self::Body),
            TypeHint::HeadersMap => Some(Self::Headers),
            TypeHint::Route => Some(Self::Route),
            TypeHint::FullPath => Some(Self::FullPath),
            TypeHint::Method => Some(Self::Method),
            TypeHint::File => Some(Self::File),
            TypeHint::ClientAddr => Some(Self::ClientAddr),
            _ => None,
        }
    }

    /// The value handed to a parameter of this kind.
    pub fn supply(self, request: &Arc<Request>) -> Value {
        match self {
            Self::Request => Value::Request(request.clone()),
            Self::Socket => match request.socket() {
                Some(socket) => Value::Socket(socket.clone()),
                None => Value::Null,
            },
            Self::Query => Value::Json(serde_json::Value::Object(
                request
                    .query_args()
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            )),
            Self::Body | Self::File => Value::Bytes(request.body_bytes().to_vec()),
            Self::Headers => Value::Json(serde_json::Value::Object(
                request
                    .headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                    .collect(),
            )),
            Self::Route => Value::Str(request.route().to_string()),
            Self::FullPath => Value::Str(request.path().as_str().to_string()),
            Self::Method => Value::Str(request.method().as_str().to_string()),
            Self::ClientAddr => match request.client_addr() {
                Some(addr) => Value::Str(addr.to_string()),
                None => Value::Null,
            },
        }
    }
}

/// How much of a handler failure is echoed back in the 500 body.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ErrorMode {
    /// A generic "Internal Server Error".
    #[default]
    Hide,
    /// The failure's type name.
    Type,
    /// The failure's display string.
    Short,
    /// The display string plus the whole source chain.
    Traceback,
}

/// What a handler invocation can fail with. `Thrown` lets a handler bail out
/// with a fully formed response that bypasses error shaping.
#[derive(Debug)]
pub enum HandlerError {
    Thrown(Box<Response>),
    Failure {
        type_name: &'static str,
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl HandlerError {
    pub fn from_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Failure {
            type_name: std::any::type_name::<E>(),
            error: Box::new(error),
        }
    }

    /// A failure with just a message, for handlers without a richer error
    /// type.
    pub fn msg<T: Into<String>>(message: T) -> Self {
        #[derive(Debug, thiserror::Error)]
        #[error("{0}")]
        struct HandlerFailure(String);

        Self::from_error(HandlerFailure(message.into()))
    }

    pub fn throw(response: Response) -> Self {
        Self::Thrown(Box::new(response))
    }

    /// Renders the failure according to `mode`; `Thrown` never reaches this.
    pub(crate) fn describe(&self, mode: ErrorMode) -> String {
        match self {
            Self::Thrown(_) => "Internal Server Error".to_string(),
            Self::Failure { type_name, error } => match mode {
                ErrorMode::Hide => "Internal Server Error".to_string(),
                ErrorMode::Type => (*type_name).to_string(),
                ErrorMode::Short => error.to_string(),
                ErrorMode::Traceback => {
                    let mut rendered = format!("{type_name}: {error}");
                    let mut source = error.source();
                    while let Some(cause) = source {
                        rendered.push_str(&format!("\ncaused by: {cause}"));
                        source = cause.source();
                    }
                    rendered
                }
            },
        }
    }
}

impl From<Response> for HandlerError {
    fn from(response: Response) -> Self {
        Self::throw(response)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(error: std::io::Error) -> Self {
        Self::from_error(error)
    }
}

/// One declared handler parameter.
#[derive(Clone, Debug)]
pub struct Param {
    name: String,
    hint: Option<TypeHint>,
    default: Option<Value>,
}

impl Param {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            hint: None,
            default: None,
        }
    }

    pub fn hint(mut self, hint: TypeHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn default_value<V: Into<Value>>(mut self, value: V) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_hint(&self) -> Option<TypeHint> {
        self.hint
    }
}

/// The declared parameter list of a handler: named parameters in order, then
/// the optional `*args` / `**kwargs` collectors, plus the return hint.
///
/// This is the registration-side stand-in for the reflection the adapter
/// cannot do at runtime in a static language.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    params: Vec<Param>,
    var_args: bool,
    var_kwargs: bool,
    return_hint: ReturnHint,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Declares the `*args` collector.
    pub fn var_args(mut self) -> Self {
        self.var_args = true;
        self
    }

    /// Declares the `**kwargs` collector.
    pub fn var_kwargs(mut self) -> Self {
        self.var_kwargs = true;
        self
    }

    pub fn returns(mut self, hint: ReturnHint) -> Self {
        self.return_hint = hint;
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn return_hint(&self) -> ReturnHint {
        self.return_hint
    }

    pub(crate) fn hint_for(&self, name: &str) -> Option<TypeHint> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.hint)
    }

    /// Registration-time analysis: rejects reserved/duplicate names and
    /// ambiguous injection declarations, and computes the autofill table.
    fn analyze(&self) -> Result<Vec<(String, InjectionKind)>, RegisterError> {
        let mut autofill = vec![];
        for (index, param) in self.params.iter().enumerate() {
            if param.name == "args" || param.name == "kwargs" {
                return Err(RegisterError::ReservedParamName(param.name.clone()));
            }
            if self.params[..index].iter().any(|p| p.name == param.name) {
                return Err(RegisterError::DuplicateParam(param.name.clone()));
            }
            match (param.hint, InjectionKind::from_name(&param.name)) {
                // A sentinel hint wins whatever the parameter is called.
                (Some(hint), _) if hint.is_injection() => {
                    let kind = InjectionKind::from_hint(hint).unwrap();
                    autofill.push((param.name.clone(), kind));
                }
                // A bare canonical name asks for its injection.
                (None, Some(kind)) => autofill.push((param.name.clone(), kind)),
                // A canonical name with a data hint is ambiguous.
                (Some(hint), Some(_)) => {
                    return Err(RegisterError::IncompatibleInjection(
                        param.name.clone(),
                        hint,
                    ));
                }
                (_, None) => {}
            }
        }
        Ok(autofill)
    }
}

/// A per-placeholder condition narrowing which captures a template accepts.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// The capture must equal this value's text form.
    Value(Value),
    /// The capture must equal the text form of one member.
    OneOf(Vec<Value>),
    /// The capture must be constructible as this type.
    Type(TypeHint),
}

impl Constraint {
    pub fn accepts(&self, capture: &str) -> bool {
        match self {
            Self::Value(value) => value.to_text() == capture,
            Self::OneOf(values) => values.iter().any(|value| value.to_text() == capture),
            Self::Type(hint) => match hint {
                TypeHint::Int => matches!(coerce(capture, Some(*hint)), Value::Int(_)),
                TypeHint::Float => {
                    matches!(coerce(capture, Some(*hint)), Value::Float(_) | Value::Int(_))
                }
                TypeHint::Bool => matches!(coerce(capture, Some(*hint)), Value::Bool(_)),
                TypeHint::List | TypeHint::Tuple | TypeHint::Set | TypeHint::Map => {
                    matches!(coerce(capture, Some(*hint)), Value::Json(_))
                }
                // Anything is constructible as text or bytes; injection
                // sentinels are not constraints and are ignored.
                _ => true,
            },
        }
    }
}

/// The arguments a handler is finally called with: every declared parameter
/// bound by name, plus whatever the two collectors swallowed.
#[derive(Debug, Default)]
pub struct Invocation {
    bound: BTreeMap<String, Value>,
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl Invocation {
    /// The value bound to a declared parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bound.get(name)
    }

    /// The `*args` tuple.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The `**kwargs` map.
    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }
}

/// The handler callable shape every registration wraps.
pub type HandlerFn =
    dyn Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static;

/// A handler after registration-time analysis: the callable plus its
/// method set, signature snapshot, autofill table, constraint table, and
/// error mode. Never mutated once built.
pub struct RouteEntry {
    callable: Arc<HandlerFn>,
    sig: Signature,
    autofill: Vec<(String, InjectionKind)>,
    allowed_methods: Vec<Method>,
    constraints: BTreeMap<String, Constraint>,
    error_mode: ErrorMode,
}

impl RouteEntry {
    pub(crate) fn new(
        callable: Arc<HandlerFn>,
        sig: Signature,
        allowed_methods: Vec<Method>,
        constraints: BTreeMap<String, Constraint>,
        error_mode: ErrorMode,
    ) -> Result<Self, RegisterError> {
        let autofill = sig.analyze()?;
        let allowed_methods = if allowed_methods.is_empty() {
            // A handler always has a concrete method set.
            vec![Method::Get]
        } else {
            allowed_methods
        };
        Ok(Self {
            callable,
            sig,
            autofill,
            allowed_methods,
            constraints,
            error_mode,
        })
    }

    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }

    /// HEAD rides on GET; otherwise the method must be in the set.
    pub fn allows(&self, method: Method) -> bool {
        self.allowed_methods.contains(&method)
            || (method == Method::Head && self.allowed_methods.contains(&Method::Get))
    }

    pub fn sig(&self) -> &Signature {
        &self.sig
    }

    pub(crate) fn constraint_for(&self, name: &str) -> Option<&Constraint> {
        self.constraints.get(name)
    }

    /// Runs the full per-request pipeline: argument assembly, binding, the
    /// handler itself, then response shaping with this entry's error mode.
    pub fn handle(
        &self,
        request: &Arc<Request>,
        captures: Option<&BTreeMap<String, String>>,
    ) -> Response {
        let coerced_captures = captures
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), coerce(v, self.sig.hint_for(k))))
                    .collect::<BTreeMap<String, Value>>()
            })
            .unwrap_or_default();

        let invocation = match self.assemble(request, coerced_captures) {
            Ok(invocation) => invocation,
            Err(bind_error) => {
                log::error!(
                    "{} {} from {}: binding failed: {}",
                    request.method(),
                    request.path(),
                    client_of(request),
                    bind_error
                );
                return Response::plain(
                    crate::response::StatusCode::BAD_REQUEST,
                    bind_error.to_string(),
                )
                .with_version(request.http_version());
            }
        };

        match (self.callable)(invocation) {
            Ok(value) => {
                match Response::from_return(value, self.sig.return_hint, request.http_version()) {
                    Ok(response) => response,
                    Err(io_error) => self.failure_response(request, HandlerError::from(io_error)),
                }
            }
            Err(HandlerError::Thrown(response)) => *response,
            Err(failure) => self.failure_response(request, failure),
        }
    }

    fn failure_response(&self, request: &Arc<Request>, failure: HandlerError) -> Response {
        log::error!(
            "{} {} from {}: handler failed: {}",
            request.method(),
            request.path(),
            client_of(request),
            failure.describe(ErrorMode::Short)
        );
        Response::error(failure.describe(self.error_mode)).with_version(request.http_version())
    }

    /// Builds the positional list and keyword map from query, body, captures
    /// and the autofilled specials, then binds them to the signature.
    fn assemble(
        &self,
        request: &Arc<Request>,
        captures: BTreeMap<String, Value>,
    ) -> Result<Invocation, BindError> {
        let mut args: Vec<Value> = vec![];
        let mut kwargs: BTreeMap<String, Value> = BTreeMap::new();

        for (name, kind) in &self.autofill {
            kwargs.insert(name.clone(), kind.supply(request));
        }

        let query = request.query_args();
        let mut digit_keys: Vec<(usize, &String)> = query
            .keys()
            .filter(|k| !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()))
            .map(|k| (k.parse::<usize>().unwrap_or(usize::MAX), k))
            .collect();
        digit_keys.sort_unstable();
        if digit_keys
            .iter()
            .enumerate()
            .any(|(expected, (actual, _))| *actual != expected)
        {
            return Err(BindError::PositionalGap);
        }
        for (position, key) in &digit_keys {
            // Only slots inside the declared list coerce; overflow bound for
            // the *args collector keeps its raw text.
            let value = match self.sig.params.get(*position) {
                Some(param) => coerce(&query[*key], param.hint),
                None => Value::Str(query[*key].clone()),
            };
            args.push(value);
        }
        for (key, value) in query {
            if digit_keys.iter().any(|(_, k)| *k == key) {
                continue;
            }
            kwargs.insert(key.clone(), coerce(value, self.sig.hint_for(key)));
        }

        if !request.body_bytes().is_empty() {
            if let Ok(serde_json::Value::Object(object)) =
                serde_json::from_slice::<serde_json::Value>(request.body_bytes())
            {
                let mut body_digits: Vec<(usize, String)> = object
                    .keys()
                    .filter(|k| !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()))
                    .map(|k| (k.parse::<usize>().unwrap_or(usize::MAX), k.clone()))
                    .collect();
                body_digits.sort_unstable();
                // Body positions continue where the query positionals ended.
                if body_digits
                    .iter()
                    .enumerate()
                    .any(|(offset, (actual, _))| *actual != args.len() + offset)
                {
                    return Err(BindError::PositionalGap);
                }
                let mut object = object;
                for (_, key) in &body_digits {
                    if let Some(value) = object.remove(key) {
                        args.push(Value::from(value));
                    }
                }
                for (key, value) in object {
                    kwargs.insert(key, Value::from(value));
                }
            }
            // A body that is not a JSON object plays no part in argument
            // assembly; it stays reachable through the `body` injection.
        }

        kwargs.extend(captures);

        if let Some(value) = kwargs.remove("args") {
            args = match value {
                Value::Json(serde_json::Value::Array(items)) => {
                    items.into_iter().map(Value::from).collect()
                }
                _ => return Err(BindError::BadArgsValue),
            };
        }

        self.bind(args, kwargs)
    }

    /// Call-semantics binding: positionals fill declared parameters in
    /// order, keywords bind by name, the collectors take the rest, defaults
    /// fill the gaps.
    fn bind(
        &self,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Result<Invocation, BindError> {
        let params = &self.sig.params;
        let mut bound: BTreeMap<String, Value> = BTreeMap::new();
        let mut rest_args: Vec<Value> = vec![];
        let mut rest_kwargs: BTreeMap<String, Value> = BTreeMap::new();

        for (position, value) in args.into_iter().enumerate() {
            match params.get(position) {
                Some(param) => {
                    bound.insert(param.name.clone(), value);
                }
                None if self.sig.var_args => rest_args.push(value),
                None => return Err(BindError::TooManyPositional),
            }
        }

        for (name, value) in kwargs {
            if params.iter().any(|param| param.name == name) {
                if bound.contains_key(&name) {
                    return Err(BindError::DuplicateBinding(name));
                }
                bound.insert(name, value);
            } else if self.sig.var_kwargs {
                rest_kwargs.insert(name, value);
            } else {
                return Err(BindError::UnexpectedKeyword(name));
            }
        }

        for param in params {
            if !bound.contains_key(&param.name) {
                match &param.default {
                    Some(default) => {
                        bound.insert(param.name.clone(), default.clone());
                    }
                    None => return Err(BindError::MissingArgument(param.name.clone())),
                }
            }
        }

        Ok(Invocation {
            bound,
            args: rest_args,
            kwargs: rest_kwargs,
        })
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("sig", &self.sig)
            .field("allowed_methods", &self.allowed_methods)
            .field("error_mode", &self.error_mode)
            .finish()
    }
}

fn client_of(request: &Arc<Request>) -> String {
    request
        .client_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::StatusCode;
    use serde_json::json;

    fn entry(
        sig: Signature,
        f: impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static,
    ) -> RouteEntry {
        RouteEntry::new(
            Arc::new(f),
            sig,
            vec![Method::Get, Method::Post],
            BTreeMap::new(),
            ErrorMode::default(),
        )
        .unwrap()
    }

    fn request(raw: &[u8]) -> Arc<Request> {
        Arc::new(Request::try_from(raw).unwrap())
    }

    #[test]
    fn test_injection_names_round_trip() {
        for kind in [
            InjectionKind::Request,
            InjectionKind::Socket,
            InjectionKind::Query,
            InjectionKind::Body,
            InjectionKind::Headers,
            InjectionKind::Route,
            InjectionKind::FullPath,
            InjectionKind::Method,
            InjectionKind::File,
            InjectionKind::ClientAddr,
        ] {
            assert_eq!(InjectionKind::from_name(kind.canonical_name()), Some(kind));
        }
        assert_eq!(InjectionKind::from_name("x"), None);
    }

    #[test]
    fn test_analyze_rejects_reserved_and_duplicates() {
        let sig = Signature::new().param(Param::new("args"));
        assert_eq!(
            sig.analyze().unwrap_err(),
            RegisterError::ReservedParamName("args".into())
        );

        let sig = Signature::new().param(Param::new("x")).param(Param::new("x"));
        assert_eq!(
            sig.analyze().unwrap_err(),
            RegisterError::DuplicateParam("x".into())
        );
    }

    #[test]
    fn test_analyze_injections() {
        // By bare canonical name.
        let sig = Signature::new().param(Param::new("headers"));
        assert_eq!(
            sig.analyze().unwrap(),
            vec![("headers".to_string(), InjectionKind::Headers)]
        );

        // By sentinel hint under any name.
        let sig = Signature::new().param(Param::new("r").hint(TypeHint::Request));
        assert_eq!(
            sig.analyze().unwrap(),
            vec![("r".to_string(), InjectionKind::Request)]
        );

        // Canonical name with a data hint is rejected.
        let sig = Signature::new().param(Param::new("body").hint(TypeHint::Int));
        assert_eq!(
            sig.analyze().unwrap_err(),
            RegisterError::IncompatibleInjection("body".into(), TypeHint::Int)
        );
    }

    #[test]
    fn test_query_kwargs_with_coercion() {
        let sig = Signature::new()
            .param(Param::new("x").hint(TypeHint::Int))
            .param(Param::new("y").hint(TypeHint::Int));
        let e = entry(sig, |inv| {
            let sum = inv.get("x").unwrap().as_int().unwrap()
                + inv.get("y").unwrap().as_int().unwrap();
            Ok(ReturnValue::Json(json!(sum)))
        });
        let response = e.handle(&request(b"GET /add?x=2&y=3 HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_bytes(), b"5");
        assert_eq!(
            response.headers().get("Content-Type"),
            Some("application/json")
        );
    }

    #[test]
    fn test_digit_keys_fill_positionals() {
        let sig = Signature::new()
            .param(Param::new("a").hint(TypeHint::Int))
            .param(Param::new("b"));
        let e = entry(sig, |inv| {
            assert_eq!(inv.get("a"), Some(&Value::Int(1)));
            assert_eq!(inv.get("b"), Some(&Value::Str("two".into())));
            Ok(ReturnValue::None)
        });
        let response = e.handle(&request(b"GET /f?0=1&1=two HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_overflow_positionals_stay_text() {
        // Digit keys beyond the declared parameters land in *args untouched,
        // while declared slots still coerce.
        let sig = Signature::new().param(Param::new("a").hint(TypeHint::Int));
        let e = entry(sig.var_args(), |inv| {
            assert_eq!(inv.get("a"), Some(&Value::Int(5)));
            assert_eq!(inv.args(), &[Value::Str("7".into())]);
            Ok(ReturnValue::None)
        });
        let response = e.handle(&request(b"GET /f?0=5&1=7 HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::OK);

        // With no declared parameters at all, nothing coerces.
        let e = entry(Signature::new().var_args(), |inv| {
            assert_eq!(
                inv.args(),
                &[Value::Str("5".into()), Value::Str("true".into())]
            );
            Ok(ReturnValue::None)
        });
        let response = e.handle(&request(b"GET /echo?0=5&1=true HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_digit_key_gap_is_400() {
        let e = entry(Signature::new().var_args(), |_| Ok(ReturnValue::None));
        let response = e.handle(&request(b"GET /f?0=a&2=b HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_body_object_feeds_collectors() {
        // echo(*args, **kwargs) with {"0":"a","k":"v"}.
        let e = entry(Signature::new().var_args().var_kwargs(), |inv| {
            let args: Vec<serde_json::Value> =
                inv.args().iter().map(Value::to_json).collect();
            let kwargs: serde_json::Map<String, serde_json::Value> = inv
                .kwargs()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            Ok(ReturnValue::Json(json!([args, kwargs])))
        });
        let response = e.handle(
            &request(
                b"POST /echo HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 17\r\n\r\n{\"0\":\"a\",\"k\":\"v\"}",
            ),
            None,
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_bytes(), b"[[\"a\"],{\"k\":\"v\"}]");
    }

    #[test]
    fn test_body_positions_continue_after_query() {
        let e = entry(Signature::new().var_args(), |inv| {
            let all: Vec<serde_json::Value> = inv.args().iter().map(Value::to_json).collect();
            Ok(ReturnValue::Json(json!(all)))
        });
        let response = e.handle(
            &request(
                b"POST /f?0=first HTTP/1.1\r\nContent-Length: 12\r\n\r\n{\"1\":\"next\"}",
            ),
            None,
        );
        assert_eq!(response.body_bytes(), b"[\"first\",\"next\"]");

        // A body restarting at 0 while a query positional exists is a gap.
        let response = e.handle(
            &request(b"POST /f?0=first HTTP/1.1\r\nContent-Length: 11\r\n\r\n{\"0\":\"dup\"}"),
            None,
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_non_object_body_is_ignored() {
        let e = entry(Signature::new(), |inv| {
            assert!(inv.args().is_empty());
            Ok(ReturnValue::None)
        });
        let response = e.handle(
            &request(b"POST /f HTTP/1.1\r\nContent-Length: 9\r\n\r\nnot json!"),
            None,
        );
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_captures_overlay_last() {
        let sig = Signature::new()
            .param(Param::new("b"))
            .param(Param::new("c").hint(TypeHint::Int).default_value(5i64));
        let e = entry(sig, |inv| {
            let b = inv.get("b").unwrap().as_str().unwrap().to_string();
            let c = inv.get("c").unwrap().as_int().unwrap();
            Ok(ReturnValue::Text(format!("captured b='{b}', c={c}")))
        });
        let captures = BTreeMap::from([("c".to_string(), "99".to_string())]);
        let response = e.handle(
            &request(b"GET /a/99?b=hello HTTP/1.1\r\n\r\n"),
            Some(&captures),
        );
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8_lossy(response.body_bytes()).into_owned();
        assert!(body.contains("b='hello'"));
        assert!(body.contains("c=99"));
    }

    #[test]
    fn test_default_used_when_absent() {
        let sig = Signature::new().param(Param::new("c").default_value(5i64));
        let e = entry(sig, |inv| {
            assert_eq!(inv.get("c"), Some(&Value::Int(5)));
            Ok(ReturnValue::None)
        });
        let response = e.handle(&request(b"GET /a HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_strict_binding_rejections() {
        // No collectors: unknown keys are binding failures.
        let sig = Signature::new().param(Param::new("x"));
        let e = entry(sig, |_| Ok(ReturnValue::None));
        let response = e.handle(&request(b"GET /f?x=1&y=2 HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Missing required parameter.
        let sig = Signature::new().param(Param::new("x"));
        let e = entry(sig, |_| Ok(ReturnValue::None));
        let response = e.handle(&request(b"GET /f HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Positional and keyword for the same parameter.
        let sig = Signature::new().param(Param::new("x"));
        let e = entry(sig, |_| Ok(ReturnValue::None));
        let response = e.handle(&request(b"GET /f?0=1&x=2 HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Too many positionals without *args.
        let e = entry(Signature::new(), |_| Ok(ReturnValue::None));
        let response = e.handle(&request(b"GET /f?0=1 HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_args_kwarg_becomes_positional_tuple() {
        let e = entry(Signature::new().var_args(), |inv| {
            let all: Vec<serde_json::Value> = inv.args().iter().map(Value::to_json).collect();
            Ok(ReturnValue::Json(json!(all)))
        });
        let response = e.handle(&request(b"GET /f?args=[1,2,3] HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.body_bytes(), b"[1,2,3]");

        let response = e.handle(&request(b"GET /f?args=oops HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_injection_values() {
        let sig = Signature::new()
            .param(Param::new("method"))
            .param(Param::new("route"))
            .param(Param::new("headers"))
            .param(Param::new("body"));
        let e = entry(sig, |inv| {
            assert_eq!(inv.get("method"), Some(&Value::Str("POST".into())));
            assert_eq!(inv.get("route"), Some(&Value::Str("/inj".into())));
            assert!(matches!(inv.get("headers"), Some(Value::Json(_))));
            assert_eq!(inv.get("body"), Some(&Value::Bytes(b"data!".to_vec())));
            Ok(ReturnValue::None)
        });
        let response = e.handle(
            &request(b"POST /inj HTTP/1.1\r\nContent-Length: 5\r\nX-Tag: t\r\n\r\ndata!"),
            None,
        );
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_thrown_response_passes_through() {
        let e = entry(Signature::new(), |_| {
            Err(HandlerError::throw(Response::plain(
                StatusCode::FORBIDDEN,
                "nope",
            )))
        });
        let response = e.handle(&request(b"GET /f HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.body_bytes(), b"nope");
    }

    #[test]
    fn test_error_modes() {
        let failing = |_: Invocation| -> Result<ReturnValue, HandlerError> {
            Err(HandlerError::msg("the disk is on fire"))
        };

        let hide = entry(Signature::new(), failing);
        let response = hide.handle(&request(b"GET /f HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body_bytes(), b"Internal Server Error");

        let short = RouteEntry::new(
            Arc::new(failing),
            Signature::new(),
            vec![Method::Get],
            BTreeMap::new(),
            ErrorMode::Short,
        )
        .unwrap();
        let response = short.handle(&request(b"GET /f HTTP/1.1\r\n\r\n"), None);
        assert_eq!(response.body_bytes(), b"the disk is on fire");

        let typed = RouteEntry::new(
            Arc::new(failing),
            Signature::new(),
            vec![Method::Get],
            BTreeMap::new(),
            ErrorMode::Type,
        )
        .unwrap();
        let response = typed.handle(&request(b"GET /f HTTP/1.1\r\n\r\n"), None);
        let body = String::from_utf8_lossy(response.body_bytes()).into_owned();
        assert!(body.contains("HandlerFailure"));
        assert!(!body.contains("disk"));

        let traceback = RouteEntry::new(
            Arc::new(failing),
            Signature::new(),
            vec![Method::Get],
            BTreeMap::new(),
            ErrorMode::Traceback,
        )
        .unwrap();
        let response = traceback.handle(&request(b"GET /f HTTP/1.1\r\n\r\n"), None);
        let body = String::from_utf8_lossy(response.body_bytes()).into_owned();
        assert!(body.contains("HandlerFailure"));
        assert!(body.contains("the disk is on fire"));
    }

    #[test]
    fn test_allows_head_on_get() {
        let e = entry(Signature::new(), |_| Ok(ReturnValue::None));
        assert!(e.allows(Method::Get));
        assert!(e.allows(Method::Head));
        assert!(!e.allows(Method::Delete));

        let post_only = RouteEntry::new(
            Arc::new(|_| Ok(ReturnValue::None)),
            Signature::new(),
            vec![Method::Post],
            BTreeMap::new(),
            ErrorMode::default(),
        )
        .unwrap();
        assert!(!post_only.allows(Method::Head));
    }

    #[test]
    fn test_empty_methods_default_to_get() {
        let e = RouteEntry::new(
            Arc::new(|_| Ok(ReturnValue::None)),
            Signature::new(),
            vec![],
            BTreeMap::new(),
            ErrorMode::default(),
        )
        .unwrap();
        assert_eq!(e.allowed_methods(), &[Method::Get]);
    }

    #[test]
    fn test_constraints() {
        assert!(Constraint::Value(Value::Int(5)).accepts("5"));
        assert!(!Constraint::Value(Value::Int(5)).accepts("6"));
        assert!(Constraint::OneOf(vec![Value::Str("a".into()), Value::Int(2)]).accepts("2"));
        assert!(!Constraint::OneOf(vec![Value::Str("a".into())]).accepts("b"));
        assert!(Constraint::Type(TypeHint::Int).accepts("42"));
        assert!(!Constraint::Type(TypeHint::Int).accepts("x"));
        assert!(Constraint::Type(TypeHint::Float).accepts("2.5"));
        assert!(Constraint::Type(TypeHint::Str).accepts("anything"));
    }
}
