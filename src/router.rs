// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::common::{Method, RegisterError};
use crate::defaults;
use crate::handler::{
    Constraint, ErrorMode, HandlerError, HandlerFn, Invocation, RouteEntry, Signature,
};
use crate::request::Request;
use crate::response::{Response, ReturnValue, StatusCode};

/// Everything a registration declares about one route: the pattern, the
/// allowed methods, the handler's signature, per-placeholder constraints and
/// an optional error-mode override.
#[derive(Debug, Default)]
pub struct RouteSpec {
    pattern: String,
    methods: Vec<Method>,
    sig: Signature,
    constraints: BTreeMap<String, Constraint>,
    error_mode: Option<ErrorMode>,
}

impl RouteSpec {
    pub fn new<T: Into<String>>(pattern: T) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn sig(mut self, sig: Signature) -> Self {
        self.sig = sig;
        self
    }

    pub fn constraint<T: Into<String>>(mut self, placeholder: T, constraint: Constraint) -> Self {
        self.constraints.insert(placeholder.into(), constraint);
        self
    }

    pub fn error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = Some(mode);
        self
    }
}

/// A handler that decides for itself which routes it serves, probed in
/// registration order after literal lookup fails.
pub trait MatchableHandler: Send + Sync {
    fn matches(&self, route: &str) -> bool;
    fn call(&self, request: &Arc<Request>) -> Response;
    fn allowed_methods(&self) -> &[Method] {
        &[Method::Get]
    }
}

/// Serves a directory subtree under a route prefix. Directory requests
/// prefer `index.html`, falling back to a generated listing.
pub struct StaticFileHandler {
    root: PathBuf,
    route: String,
}

impl StaticFileHandler {
    pub fn new<P: Into<PathBuf>, T: Into<String>>(root: P, route: T) -> Self {
        Self {
            root: root.into(),
            route: route.into(),
        }
    }

    /// The filesystem path a request route points at, or None when it
    /// escapes the prefix or the subtree.
    fn resolve(&self, route: &str) -> Option<PathBuf> {
        let added = route.strip_prefix(self.route.as_str())?;
        let added = added.trim_matches('/');
        if added.split('/').any(|part| part == "..") {
            return None;
        }
        Some(if added.is_empty() {
            self.root.clone()
        } else {
            self.root.join(added)
        })
    }
}

impl MatchableHandler for StaticFileHandler {
    fn matches(&self, route: &str) -> bool {
        self.resolve(route).map_or(false, |path| path.exists())
    }

    fn call(&self, request: &Arc<Request>) -> Response {
        let route = request.route().to_string();
        let path = match self.resolve(&route) {
            Some(path) if path.exists() => path,
            _ => {
                return Response::plain(StatusCode::NOT_FOUND, "Not Found")
                    .with_version(request.http_version())
            }
        };

        let path = if path.is_dir() && path.join("index.html").exists() {
            path.join("index.html")
        } else {
            path
        };
        if path.is_dir() {
            let mut items = vec![];
            if let Ok(entries) = std::fs::read_dir(&path) {
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    items.push(format!(
                        "<li><a href='{}/{}'>{}</a></li>",
                        route.trim_end_matches('/'),
                        name,
                        name
                    ));
                }
            }
            items.sort();
            return Response::html(format!(
                "<!DOCTYPE html><html><body><ul>{}</ul></body></html>",
                items.join("\n")
            ))
            .with_version(request.http_version());
        }

        match Response::file(&path) {
            Ok(response) => response.with_version(request.http_version()),
            Err(_) => Response::plain(StatusCode::NOT_FOUND, "Not Found")
                .with_version(request.http_version()),
        }
    }

    fn allowed_methods(&self) -> &[Method] {
        &[Method::Get, Method::Head]
    }
}

/// One piece of a template segment: literal text or a `{name}` placeholder.
#[derive(Clone, Debug, PartialEq)]
enum SegPart {
    Literal(String),
    Placeholder(String),
}

/// Splits one template segment into alternating literal and placeholder
/// parts, rejecting malformed or ambiguous shapes at registration time.
fn parse_segment(segment: &str) -> Result<Vec<SegPart>, RegisterError> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut in_placeholder = false;
    for c in segment.chars() {
        match c {
            '{' => {
                if in_placeholder {
                    return Err(RegisterError::UnbalancedBraces(segment.to_string()));
                }
                if matches!(parts.last(), Some(SegPart::Placeholder(_))) && current.is_empty() {
                    return Err(RegisterError::AdjacentPlaceholders(segment.to_string()));
                }
                if !current.is_empty() {
                    parts.push(SegPart::Literal(std::mem::take(&mut current)));
                }
                in_placeholder = true;
            }
            '}' => {
                if !in_placeholder || current.is_empty() {
                    return Err(RegisterError::UnbalancedBraces(segment.to_string()));
                }
                parts.push(SegPart::Placeholder(std::mem::take(&mut current)));
                in_placeholder = false;
            }
            _ => current.push(c),
        }
    }
    if in_placeholder {
        return Err(RegisterError::UnbalancedBraces(segment.to_string()));
    }
    if !current.is_empty() {
        parts.push(SegPart::Literal(current));
    }
    Ok(parts)
}

/// Matches one route segment against parsed template parts, collecting
/// captures. Literal parts are located left-to-right in the remaining
/// slice; the text between boundaries lands in the preceding placeholder.
fn match_segment(
    route_seg: &str,
    parts: &[SegPart],
    captures: &mut BTreeMap<String, String>,
) -> bool {
    if !parts.iter().any(|p| matches!(p, SegPart::Placeholder(_))) {
        // No placeholder: the segment must be identical.
        let literal: String = parts
            .iter()
            .map(|p| match p {
                SegPart::Literal(text) => text.as_str(),
                SegPart::Placeholder(_) => unreachable!(),
            })
            .collect();
        return route_seg == literal;
    }

    let mut rest = route_seg;
    let mut pending: Option<&str> = None;
    for part in parts {
        match part {
            SegPart::Placeholder(name) => pending = Some(name),
            SegPart::Literal(literal) => match rest.find(literal.as_str()) {
                Some(found) => {
                    if let Some(name) = pending.take() {
                        captures.insert(name.to_string(), rest[..found].to_string());
                    }
                    rest = &rest[found + literal.len()..];
                }
                None => return false,
            },
        }
    }
    match pending {
        Some(name) => {
            captures.insert(name.to_string(), rest.to_string());
            true
        }
        // After the last literal the segment must be exhausted.
        None => rest.is_empty(),
    }
}

/// A registered variadic template, parsed once and ranked for the priority
/// ordering.
struct VariadicRoute {
    template: String,
    segments: Vec<Vec<SegPart>>,
    entry: Arc<RouteEntry>,
}

impl VariadicRoute {
    fn compile(template: &str, entry: Arc<RouteEntry>) -> Result<Self, RegisterError> {
        let mut segments = vec![];
        let mut seen = vec![];
        for segment in template.split('/') {
            let parts = parse_segment(segment)?;
            for part in &parts {
                if let SegPart::Placeholder(name) = part {
                    if seen.contains(name) {
                        return Err(RegisterError::DuplicatePlaceholder(name.clone()));
                    }
                    seen.push(name.clone());
                }
            }
            segments.push(parts);
        }
        Ok(Self {
            template: template.to_string(),
            segments,
            entry,
        })
    }

    /// The descending sort key: segment count, non-variadic segment count,
    /// non-variadic characters, placeholder count, template length, with the
    /// template text itself as the final tie-break so registration order
    /// never decides a winner.
    fn priority(&self) -> (usize, usize, usize, usize, usize, &str) {
        let parts: Vec<&str> = self.template.split('/').collect();
        let part_count = parts.len();
        let variadic_parts = parts
            .iter()
            .filter(|p| p.contains('{') && p.contains('}'))
            .count();
        let mut nonvariadic_chars = 0;
        let mut in_placeholder = false;
        for c in self.template.chars() {
            match c {
                '{' => in_placeholder = true,
                '}' => in_placeholder = false,
                _ if !in_placeholder => nonvariadic_chars += 1,
                _ => {}
            }
        }
        (
            part_count,
            part_count - variadic_parts,
            nonvariadic_chars,
            self.template.matches('{').count(),
            self.template.len(),
            &self.template,
        )
    }

    fn matches(&self, route: &str) -> Option<BTreeMap<String, String>> {
        let route = if route.len() > 1 {
            route.trim_end_matches('/')
        } else {
            route
        };
        let route_segments: Vec<&str> = route.split('/').collect();
        if route_segments.len() != self.segments.len() {
            return None;
        }
        let mut captures = BTreeMap::new();
        for (route_seg, parts) in route_segments.iter().zip(&self.segments) {
            if !match_segment(route_seg, parts, &mut captures) {
                return None;
            }
        }
        Some(captures)
    }
}

/// The route registry and dispatcher.
///
/// Matching order: literal lookup, sub-router descent (longest base first),
/// matchable probe in registration order, the default well-known routes,
/// variadic templates in priority order, the fallback handler, then the nav
/// index or 404.
pub struct Router {
    base_path: String,
    routes: HashMap<String, Arc<RouteEntry>>,
    variadic: Vec<VariadicRoute>,
    matchable: Vec<Box<dyn MatchableHandler>>,
    subs: Vec<(String, Router)>,
    fallback: Option<Arc<RouteEntry>>,
    defaults_enabled: bool,
    favicon: Option<PathBuf>,
    nav_path: String,
    nav_recursion: bool,
    error_mode: ErrorMode,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::with_base("/")
    }

    pub fn with_base<T: Into<String>>(base_path: T) -> Self {
        let mut base_path = base_path.into().replace("//", "/");
        if !base_path.ends_with('/') {
            base_path.push('/');
        }
        Self {
            base_path,
            routes: HashMap::new(),
            variadic: vec![],
            matchable: vec![],
            subs: vec![],
            fallback: None,
            defaults_enabled: true,
            favicon: None,
            nav_path: "/".to_string(),
            nav_recursion: true,
            error_mode: ErrorMode::default(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub(crate) fn favicon_override(&self) -> Option<&std::path::Path> {
        self.favicon.as_deref()
    }

    /// The default error mode for routes registered without an override.
    pub fn default_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Turns off the built-in well-known routes.
    pub fn without_default_routes(mut self) -> Self {
        self.defaults_enabled = false;
        self
    }

    /// Overrides the bundled favicon with a file on disk.
    pub fn with_favicon<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.favicon = Some(path.into());
        self
    }

    /// The suffix that triggers the synthesized route index (default `/`).
    pub fn nav(mut self, nav_path: &str, recursive: bool) -> Self {
        self.nav_path = nav_path.to_string();
        self.nav_recursion = recursive;
        self
    }

    /// Registers a handler under `spec`. Patterns containing `{name}`
    /// placeholders become variadic templates, everything else a literal
    /// route.
    pub fn route(
        &mut self,
        spec: RouteSpec,
        handler: impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static,
    ) -> Result<(), RegisterError> {
        let callable: Arc<HandlerFn> = Arc::new(handler);
        let entry = Arc::new(RouteEntry::new(
            callable,
            spec.sig,
            spec.methods,
            spec.constraints,
            spec.error_mode.unwrap_or(self.error_mode),
        )?);

        let full = self.join_route(&spec.pattern);
        if full.contains('{') {
            let compiled = VariadicRoute::compile(&full, entry)?;
            self.variadic.retain(|v| v.template != full);
            self.variadic.push(compiled);
            self.variadic
                .sort_by(|a, b| b.priority().cmp(&a.priority()));
        } else {
            self.routes.insert(full, entry);
        }
        Ok(())
    }

    pub fn get(
        &mut self,
        pattern: &str,
        sig: Signature,
        handler: impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static,
    ) -> Result<(), RegisterError> {
        self.route(
            RouteSpec::new(pattern).methods([Method::Get]).sig(sig),
            handler,
        )
    }

    pub fn post(
        &mut self,
        pattern: &str,
        sig: Signature,
        handler: impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static,
    ) -> Result<(), RegisterError> {
        self.route(
            RouteSpec::new(pattern).methods([Method::Post]).sig(sig),
            handler,
        )
    }

    pub fn put(
        &mut self,
        pattern: &str,
        sig: Signature,
        handler: impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static,
    ) -> Result<(), RegisterError> {
        self.route(
            RouteSpec::new(pattern).methods([Method::Put]).sig(sig),
            handler,
        )
    }

    pub fn patch(
        &mut self,
        pattern: &str,
        sig: Signature,
        handler: impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static,
    ) -> Result<(), RegisterError> {
        self.route(
            RouteSpec::new(pattern).methods([Method::Patch]).sig(sig),
            handler,
        )
    }

    pub fn delete(
        &mut self,
        pattern: &str,
        sig: Signature,
        handler: impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static,
    ) -> Result<(), RegisterError> {
        self.route(
            RouteSpec::new(pattern).methods([Method::Delete]).sig(sig),
            handler,
        )
    }

    /// Probed after literal lookup, in registration order.
    pub fn add_matchable(&mut self, handler: Box<dyn MatchableHandler>) {
        self.matchable.push(handler);
    }

    /// Handles anything no table matched, before the nav index applies.
    pub fn set_fallback(
        &mut self,
        sig: Signature,
        methods: Vec<Method>,
        handler: impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static,
    ) -> Result<(), RegisterError> {
        let callable: Arc<HandlerFn> = Arc::new(handler);
        self.fallback = Some(Arc::new(RouteEntry::new(
            callable,
            sig,
            methods,
            BTreeMap::new(),
            self.error_mode,
        )?));
        Ok(())
    }

    /// Mounts `router` under `sub_path`, rebasing all of its registered
    /// routes. Sub-router bases must be unique.
    pub fn mount<T: AsRef<str>>(&mut self, sub_path: T, mut router: Router) -> Result<(), RegisterError> {
        let mut sub = format!(
            "{}{}/",
            self.base_path,
            sub_path.as_ref().trim_matches('/')
        )
        .replace("//", "/");
        if !sub.ends_with('/') {
            sub.push('/');
        }
        if self.subs.iter().any(|(base, _)| *base == sub) {
            return Err(RegisterError::DuplicateSubRoute(sub));
        }
        router.rebase(&sub);
        self.subs.push((sub.clone(), router));
        // Longest base first, then lexicographic.
        self.subs
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Ok(())
    }

    fn rebase(&mut self, new_base: &str) {
        let old_base = std::mem::replace(&mut self.base_path, new_base.to_string());
        let strip = |full: &str| -> String {
            let joined = format!(
                "{}{}",
                new_base,
                full.strip_prefix(&old_base).unwrap_or(full)
            );
            normalize_route(&joined).to_string()
        };
        self.routes = self
            .routes
            .drain()
            .map(|(key, entry)| (strip(&key), entry))
            .collect();
        for variadic in &mut self.variadic {
            variadic.template = strip(&variadic.template);
        }
        let subs = std::mem::take(&mut self.subs);
        self.subs = subs
            .into_iter()
            .map(|(base, mut sub)| {
                // Sub bases keep their trailing slash.
                let rebased = format!("{}/", strip(&base));
                sub.rebase(&rebased);
                (rebased, sub)
            })
            .collect();
    }

    /// Joins a registration pattern onto the base path and normalizes the
    /// trailing slash away so registration and lookup agree.
    fn join_route(&self, pattern: &str) -> String {
        let joined = format!("{}{}", self.base_path, pattern.trim_start_matches('/'))
            .replace("//", "/");
        normalize_route(&joined).to_string()
    }

    /// Every registered route path, for the nav index and the route-table
    /// document.
    pub(crate) fn collect_routes(&self, recursive: bool) -> Vec<(String, Arc<RouteEntry>)> {
        let mut all: Vec<(String, Arc<RouteEntry>)> = self
            .routes
            .iter()
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect();
        all.extend(
            self.variadic
                .iter()
                .map(|v| (v.template.clone(), v.entry.clone())),
        );
        if recursive {
            for (_, sub) in &self.subs {
                all.extend(sub.collect_routes(recursive));
            }
        }
        all.sort_by(|(a, _), (b, _)| a.cmp(b));
        all
    }

    /// Runs the full matching pipeline for one request.
    pub fn dispatch(&self, request: &Arc<Request>) -> Response {
        let route = request.route().to_string();

        if !route.starts_with(self.base_path.trim_end_matches('/'))
            && route != self.base_path
        {
            return self.not_found(request);
        }

        for (base, sub) in &self.subs {
            if route.starts_with(base.as_str()) {
                return sub.dispatch(request);
            }
        }

        let normalized = normalize_route(&route);
        if let Some(entry) = self.routes.get(normalized) {
            return self.invoke(entry, request, None);
        }

        for matchable in &self.matchable {
            if matchable.matches(&route) {
                let method = request.method();
                let allowed = matchable.allowed_methods();
                if !allowed.contains(&method)
                    && !(method == Method::Head && allowed.contains(&Method::Get))
                {
                    return self.method_not_allowed(request, allowed);
                }
                return matchable.call(request);
            }
        }

        if self.defaults_enabled {
            if let Some(response) = defaults::default_response(self, request, normalized) {
                return response;
            }
        }

        if route.contains('{') && self.variadic.iter().any(|v| v.template == normalized) {
            log::error!(
                "{} {}: template requested verbatim, placeholders must be filled",
                request.method(),
                request.path()
            );
            return Response::plain(StatusCode::BAD_REQUEST, "Bad Request")
                .with_version(request.http_version());
        }
        for variadic in &self.variadic {
            if let Some(captures) = variadic.matches(normalized) {
                let constrained = captures.iter().all(|(name, value)| {
                    variadic
                        .entry
                        .constraint_for(name)
                        .map_or(true, |constraint| constraint.accepts(value))
                });
                if constrained {
                    return self.invoke(&variadic.entry, request, Some(&captures));
                }
            }
        }

        if let Some(fallback) = &self.fallback {
            return self.invoke(fallback, request, None);
        }

        if route.ends_with(self.nav_path.as_str()) {
            let start = &route[..route.len() - self.nav_path.len()];
            return self.nav_response(start).with_version(request.http_version());
        }

        self.not_found(request)
    }

    fn invoke(
        &self,
        entry: &Arc<RouteEntry>,
        request: &Arc<Request>,
        captures: Option<&BTreeMap<String, String>>,
    ) -> Response {
        if !entry.allows(request.method()) {
            return self.method_not_allowed(request, entry.allowed_methods());
        }
        entry.handle(request, captures)
    }

    fn method_not_allowed(&self, request: &Arc<Request>, allowed: &[Method]) -> Response {
        log::error!(
            "{} {} from {}: method not allowed",
            request.method(),
            request.path(),
            request
                .client_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        let mut response = Response::plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
            .with_version(request.http_version());
        let allow = allowed
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        response.headers_mut().set("Allow", allow);
        response
    }

    fn not_found(&self, request: &Arc<Request>) -> Response {
        log::error!(
            "{} {} from {}: no route matched",
            request.method(),
            request.path(),
            request
                .client_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        Response::plain(StatusCode::NOT_FOUND, "Not Found").with_version(request.http_version())
    }

    /// The synthesized HTML index of registered routes.
    fn nav_response(&self, start: &str) -> Response {
        let mut links = vec![];
        for (path, _) in self.collect_routes(self.nav_recursion) {
            if let Some(rel) = path.strip_prefix(start) {
                let rel = rel.trim_start_matches('/');
                if path.contains('{') {
                    links.push(format!("<li>{path}</li>"));
                } else {
                    links.push(format!("<li><a href=\"./{rel}\">{path}</a></li>"));
                }
            }
        }
        links.sort();
        Response::html(format!(
            "<!DOCTYPE html><html><head><title>{}</title></head><body><ul>\n{}\n</ul></body></html>",
            self.base_path,
            links.join("\n")
        ))
    }
}

/// Trims the trailing slash so `/add/` and `/add` land on the same key; the
/// root stays `/`.
fn normalize_route(route: &str) -> &str {
    if route.len() > 1 {
        let trimmed = route.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    } else {
        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::{TypeHint, Value};
    use crate::handler::Param;
    use serde_json::json;

    fn request(raw: &str) -> Arc<Request> {
        Arc::new(Request::try_from(raw.as_bytes()).unwrap())
    }

    fn ok_text(
        text: &'static str,
    ) -> impl Fn(Invocation) -> Result<ReturnValue, HandlerError> + Send + Sync + 'static {
        move |_| Ok(ReturnValue::Text(text.to_string()))
    }

    #[test]
    fn test_parse_segment() {
        assert_eq!(
            parse_segment("{b}_is2").unwrap(),
            vec![
                SegPart::Placeholder("b".into()),
                SegPart::Literal("_is2".into())
            ]
        );
        assert_eq!(
            parse_segment("v{x}.{y}").unwrap(),
            vec![
                SegPart::Literal("v".into()),
                SegPart::Placeholder("x".into()),
                SegPart::Literal(".".into()),
                SegPart::Placeholder("y".into()),
            ]
        );
        assert_eq!(
            parse_segment("{a}{b}").unwrap_err(),
            RegisterError::AdjacentPlaceholders("{a}{b}".into())
        );
        assert!(matches!(
            parse_segment("{unclosed"),
            Err(RegisterError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            parse_segment("{}"),
            Err(RegisterError::UnbalancedBraces(_))
        ));
    }

    #[test]
    fn test_register_rejects_duplicate_placeholder() {
        let mut router = Router::new();
        let result = router.get("/a/{x}/b/{x}", Signature::new(), |_| Ok(ReturnValue::None));
        assert_eq!(
            result.unwrap_err(),
            RegisterError::DuplicatePlaceholder("x".into())
        );
    }

    #[test]
    fn test_literal_dispatch_and_normalization() {
        let mut router = Router::new();
        router
            .get("/hello", Signature::new(), ok_text("world"))
            .unwrap();

        let response = router.dispatch(&request("GET /hello HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_bytes(), b"world");

        // Trailing slash lands on the same key.
        let response = router.dispatch(&request("GET /hello/ HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_404_plain_not_found() {
        let router = Router::new();
        let response = router.dispatch(&request("GET /missing HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("Content-Type"), Some("text/plain"));
        assert_eq!(response.body_bytes(), b"Not Found");
    }

    #[test]
    fn test_method_guard_allow_header() {
        let mut router = Router::new();
        router
            .post("/post", Signature::new(), |_| Ok(ReturnValue::None))
            .unwrap();

        let response = router.dispatch(&request("GET /post HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get("Allow"), Some("POST"));
    }

    #[test]
    fn test_head_allowed_on_get_route() {
        let mut router = Router::new();
        router.get("/page", Signature::new(), ok_text("x")).unwrap();
        let response = router.dispatch(&request("HEAD /page HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_variadic_capture_with_default() {
        let mut router = Router::new();
        let sig = Signature::new()
            .param(Param::new("b"))
            .param(Param::new("c").hint(TypeHint::Int).default_value(5i64));
        router
            .get("/a/{c}", sig, |inv| {
                Ok(ReturnValue::Text(format!(
                    "captured b='{}', c={}",
                    inv.get("b").unwrap().as_str().unwrap(),
                    inv.get("c").unwrap().as_int().unwrap()
                )))
            })
            .unwrap();

        let response = router.dispatch(&request("GET /a/99?b=hello HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8_lossy(response.body_bytes()).into_owned();
        assert!(body.contains("b='hello'"));
        assert!(body.contains("c=99"));
    }

    #[test]
    fn test_priority_more_literal_wins() {
        // The template with more non-variadic characters must win no matter
        // the registration order.
        for flipped in [false, true] {
            let mut router = Router::new();
            let bare = |_: Invocation| -> Result<ReturnValue, HandlerError> {
                Ok(ReturnValue::Text("bare".into()))
            };
            let literal = |_: Invocation| -> Result<ReturnValue, HandlerError> {
                Ok(ReturnValue::Text("literal".into()))
            };
            let sig = || {
                Signature::new()
                    .param(Param::new("b"))
                    .param(Param::new("d"))
            };
            if flipped {
                router.get("/a/{b}_is2/c/{d}_is2", sig(), literal).unwrap();
                router.get("/a/{b}/c/{d}", sig(), bare).unwrap();
            } else {
                router.get("/a/{b}/c/{d}", sig(), bare).unwrap();
                router.get("/a/{b}_is2/c/{d}_is2", sig(), literal).unwrap();
            }

            let response =
                router.dispatch(&request("GET /a/foo_is2/c/bar_is2 HTTP/1.1\r\n\r\n"));
            assert_eq!(response.body_bytes(), b"literal");

            // A route only the bare template can take still dispatches.
            let response = router.dispatch(&request("GET /a/foo/c/bar HTTP/1.1\r\n\r\n"));
            assert_eq!(response.body_bytes(), b"bare");
        }
    }

    #[test]
    fn test_priority_segment_count_first() {
        let mut router = Router::new();
        let sig = || Signature::new().param(Param::new("x")).var_kwargs();
        router.get("/{x}", sig(), ok_text("one")).unwrap();
        router.get("/deep/{x}", sig(), ok_text("two")).unwrap();
        let response = router.dispatch(&request("GET /deep/v HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"two");
    }

    #[test]
    fn test_constraint_failure_falls_through() {
        let mut router = Router::new();
        let sig = || Signature::new().param(Param::new("id"));
        router
            .route(
                RouteSpec::new("/item/{id}")
                    .methods([Method::Get])
                    .sig(sig())
                    .constraint("id", Constraint::Type(TypeHint::Int)),
                ok_text("numeric"),
            )
            .unwrap();
        router
            .route(
                RouteSpec::new("/{kind}/{id}")
                    .methods([Method::Get])
                    .sig(Signature::new().param(Param::new("kind")).param(Param::new("id"))),
                ok_text("generic"),
            )
            .unwrap();

        let response = router.dispatch(&request("GET /item/42 HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"numeric");

        // Constraint fails; the next-priority template takes the request.
        let response = router.dispatch(&request("GET /item/abc HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"generic");
    }

    #[test]
    fn test_constraint_one_of() {
        let mut router = Router::new();
        router
            .route(
                RouteSpec::new("/color/{name}")
                    .methods([Method::Get])
                    .sig(Signature::new().param(Param::new("name")))
                    .constraint(
                        "name",
                        Constraint::OneOf(vec![Value::Str("red".into()), Value::Str("blue".into())]),
                    ),
                ok_text("ok"),
            )
            .unwrap();

        assert_eq!(
            router
                .dispatch(&request("GET /color/red HTTP/1.1\r\n\r\n"))
                .status(),
            StatusCode::OK
        );
        assert_eq!(
            router
                .dispatch(&request("GET /color/green HTTP/1.1\r\n\r\n"))
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_sub_router_descent() {
        let mut api = Router::new().without_default_routes();
        api.get("/users", Signature::new(), ok_text("user list"))
            .unwrap();

        let mut root = Router::new();
        root.mount("api", api).unwrap();

        let response = root.dispatch(&request("GET /api/users HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"user list");

        // Duplicate sub-bases are rejected.
        assert_eq!(
            root.mount("api", Router::new()).unwrap_err(),
            RegisterError::DuplicateSubRoute("/api/".into())
        );
    }

    #[test]
    fn test_longest_sub_base_wins() {
        let mut inner = Router::new().without_default_routes();
        inner.get("/x", Signature::new(), ok_text("inner")).unwrap();
        let mut outer = Router::new().without_default_routes();
        outer
            .set_fallback(Signature::new(), vec![Method::Get], ok_text("outer"))
            .unwrap();

        let mut root = Router::new();
        root.mount("svc", outer).unwrap();
        root.mount("svc/v2", inner).unwrap();

        let response = root.dispatch(&request("GET /svc/v2/x HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"inner");
        let response = root.dispatch(&request("GET /svc/other HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"outer");
    }

    #[test]
    fn test_matchable_probe_in_order() {
        struct Always(&'static str);
        impl MatchableHandler for Always {
            fn matches(&self, route: &str) -> bool {
                route.starts_with("/files")
            }
            fn call(&self, request: &Arc<Request>) -> Response {
                Response::plain(StatusCode::OK, self.0).with_version(request.http_version())
            }
        }

        let mut router = Router::new();
        router.add_matchable(Box::new(Always("first")));
        router.add_matchable(Box::new(Always("second")));
        let response = router.dispatch(&request("GET /files/a HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"first");

        // Matchable handlers are method-guarded too.
        let response = router.dispatch(&request("POST /files/a HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi there").unwrap();

        let mut router = Router::new();
        router.add_matchable(Box::new(StaticFileHandler::new(dir.path(), "/static")));

        let response = router.dispatch(&request("GET /static/hello.txt HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_bytes(), b"hi there");
        assert_eq!(response.headers().get("Content-Type"), Some("text/plain"));

        // A directory without index.html renders a listing.
        let response = router.dispatch(&request("GET /static HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8_lossy(response.body_bytes()).into_owned();
        assert!(body.contains("hello.txt"));

        // Escapes do not resolve.
        let handler = StaticFileHandler::new(dir.path(), "/static");
        assert!(!handler.matches("/static/../secret"));
    }

    #[test]
    fn test_static_dir_prefers_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>front</p>").unwrap();

        let handler = StaticFileHandler::new(dir.path(), "/site");
        let response = handler.call(&request("GET /site HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"<p>front</p>");
        assert_eq!(response.headers().get("Content-Type"), Some("text/html"));
    }

    #[test]
    fn test_per_route_error_mode_override() {
        let mut router = Router::new();
        router
            .route(
                RouteSpec::new("/boom")
                    .methods([Method::Get])
                    .error_mode(ErrorMode::Short),
                |_| Err(HandlerError::msg("went sideways")),
            )
            .unwrap();
        router
            .get("/quiet", Signature::new(), |_| {
                Err(HandlerError::msg("went sideways"))
            })
            .unwrap();

        let response = router.dispatch(&request("GET /boom HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body_bytes(), b"went sideways");

        // The router default stays Hide.
        let response = router.dispatch(&request("GET /quiet HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"Internal Server Error");
    }

    #[test]
    fn test_fallback_handler() {
        let mut router = Router::new();
        router
            .set_fallback(Signature::new(), vec![Method::Get], ok_text("caught"))
            .unwrap();
        let response = router.dispatch(&request("GET /anything HTTP/1.1\r\n\r\n"));
        assert_eq!(response.body_bytes(), b"caught");
    }

    #[test]
    fn test_nav_index_on_trailing_slash() {
        let mut router = Router::new();
        router.get("/alpha", Signature::new(), ok_text("a")).unwrap();
        router
            .get("/beta/{id}", Signature::new().param(Param::new("id")), |_| {
                Ok(ReturnValue::None)
            })
            .unwrap();

        let response = router.dispatch(&request("GET / HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Content-Type"), Some("text/html"));
        let body = String::from_utf8_lossy(response.body_bytes()).into_owned();
        assert!(body.contains("href=\"./alpha\""));
        // Template routes list without a link.
        assert!(body.contains("<li>/beta/{id}</li>"));
    }

    #[test]
    fn test_template_requested_verbatim() {
        let mut router = Router::new();
        router
            .get("/a/{c}", Signature::new().param(Param::new("c")), |_| {
                Ok(ReturnValue::None)
            })
            .unwrap();
        let response = router.dispatch(&request("GET /a/%7Bc%7D HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_default_routes_present() {
        let router = Router::new();

        let response = router.dispatch(&request("GET /openapi.json HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type"),
            Some("application/json")
        );

        let response = router.dispatch(&request("GET /favicon.ico HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Content-Type"), Some("image/x-icon"));

        let response = router.dispatch(&request("GET /swagger HTTP/1.1\r\n\r\n"));
        assert_eq!(response.headers().get("Content-Type"), Some("text/html"));

        let response = router.dispatch(&request("GET /api HTTP/1.1\r\n\r\n"));
        assert_eq!(response.headers().get("Content-Type"), Some("text/html"));

        // Disabled defaults vanish.
        let router = Router::new().without_default_routes();
        let response = router.dispatch(&request("GET /openapi.json HTTP/1.1\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_route_doc_lists_registered_routes() {
        let mut router = Router::new();
        router
            .get(
                "/add",
                Signature::new()
                    .param(Param::new("x").hint(TypeHint::Int))
                    .param(Param::new("y").hint(TypeHint::Int)),
                |_| Ok(ReturnValue::None),
            )
            .unwrap();
        let response = router.dispatch(&request("GET /openapi.json HTTP/1.1\r\n\r\n"));
        let doc: serde_json::Value = serde_json::from_slice(response.body_bytes()).unwrap();
        assert!(doc["paths"]["/add"]["get"].is_object());
        assert_eq!(doc["paths"]["/add"]["get"]["parameters"][0]["name"], json!("x"));
    }
}
