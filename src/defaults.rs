// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The fixed well-known routes every root router serves unless disabled:
//! a bundled favicon, the route-table document, the Swagger UI page, and the
//! interactive playground.

use std::sync::Arc;

use serde_json::json;

use crate::coerce::TypeHint;
use crate::common::message::Message;
use crate::common::Method;
use crate::handler::InjectionKind;
use crate::request::Request;
use crate::response::{Response, StatusCode};
use crate::router::Router;

/// A 1x1 32bpp icon, enough for browsers to stop asking.
pub(crate) const FAVICON_ICO: &[u8] = &[
    // ICONDIR: one image.
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
    // ICONDIRENTRY: 1x1, 32bpp, 48 bytes at offset 22.
    0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x20, 0x00, 0x30, 0x00, 0x00, 0x00, 0x16, 0x00, 0x00,
    0x00,
    // BITMAPINFOHEADER: width 1, height 2 (XOR + AND), 32bpp.
    0x28, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x20,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // One BGRA pixel.
    0x6e, 0x4a, 0x2e, 0xff,
    // AND mask row, padded to 32 bits.
    0x00, 0x00, 0x00, 0x00,
];

const SWAGGER_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>API documentation</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>
"#;

const PLAYGROUND_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>API playground</title>
  <style>
    body { font-family: sans-serif; margin: 2em; }
    #routes li { margin: 0.2em 0; cursor: pointer; }
    #result { white-space: pre-wrap; background: #f4f4f4; padding: 1em; }
  </style>
</head>
<body>
  <h1>API playground</h1>
  <ul id="routes"></ul>
  <form id="call">
    <input id="path" size="60" placeholder="/route?x=1">
    <select id="method">
      <option>GET</option><option>POST</option><option>PUT</option>
      <option>PATCH</option><option>DELETE</option>
    </select>
    <button>Send</button>
  </form>
  <pre id="result"></pre>
  <script src="/api/playground.js"></script>
  <script src="/api/panels.js"></script>
</body>
</html>
"#;

const PLAYGROUND_JS: &str = r#"async function loadRoutes() {
  const doc = await fetch('/openapi.json').then(r => r.json());
  const list = document.getElementById('routes');
  for (const [path, ops] of Object.entries(doc.paths)) {
    const item = document.createElement('li');
    item.textContent = Object.keys(ops).map(m => m.toUpperCase()).join(',') + ' ' + path;
    item.onclick = () => { document.getElementById('path').value = path; };
    list.appendChild(item);
  }
}

document.getElementById('call').onsubmit = async (event) => {
  event.preventDefault();
  const path = document.getElementById('path').value;
  const method = document.getElementById('method').value;
  const response = await fetch(path, { method });
  const text = await response.text();
  window.showResult(response.status, text);
};

loadRoutes();
"#;

const PANELS_JS: &str = r#"window.showResult = (status, text) => {
  document.getElementById('result').textContent = status + '\n' + text;
};
"#;

/// Serves `route` when it is one of the well-known defaults, with the usual
/// GET/HEAD method guard. Returns None for every other route so the matcher
/// moves on.
pub(crate) fn default_response(
    router: &Router,
    request: &Arc<Request>,
    route: &str,
) -> Option<Response> {
    enum Builtin {
        Doc,
        Swagger,
        Playground,
        PlaygroundJs,
        PanelsJs,
        Favicon,
    }

    let builtin = match route {
        "/api-docs" | "/openapi.json" => Builtin::Doc,
        "/swagger" | "/docs" | "/swagger-ui" => Builtin::Swagger,
        "/api" => Builtin::Playground,
        "/api/playground.js" => Builtin::PlaygroundJs,
        "/api/panels.js" => Builtin::PanelsJs,
        "/favicon.ico" => Builtin::Favicon,
        _ => return None,
    };

    let method = request.method();
    if method != Method::Get && method != Method::Head {
        let mut response = Response::plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
            .with_version(request.http_version());
        response.headers_mut().set("Allow", "GET");
        return Some(response);
    }

    let response = match builtin {
        Builtin::Doc => Response::json(&route_table_doc(router)),
        Builtin::Swagger => Response::html(SWAGGER_HTML),
        Builtin::Playground => Response::html(PLAYGROUND_HTML),
        Builtin::PlaygroundJs => script(PLAYGROUND_JS),
        Builtin::PanelsJs => script(PANELS_JS),
        Builtin::Favicon => match router.favicon_override() {
            Some(path) => match Response::file(path) {
                Ok(response) => response,
                Err(_) => Response::plain(StatusCode::NOT_FOUND, "Not Found"),
            },
            None => {
                let mut response = Response::new(StatusCode::OK);
                response.headers_mut().set("Content-Type", "image/x-icon");
                response.with_body(FAVICON_ICO);
                response
            }
        },
    };
    Some(response.with_version(request.http_version()))
}

fn script(source: &str) -> Response {
    let mut response = Response::new(StatusCode::OK);
    response
        .headers_mut()
        .set("Content-Type", "application/javascript");
    response.with_body(source.as_bytes());
    response
}

/// The JSON description of the route table: one entry per registered route,
/// one operation per allowed method, with the declared parameters.
pub(crate) fn route_table_doc(router: &Router) -> serde_json::Value {
    let mut paths = serde_json::Map::new();
    for (path, entry) in router.collect_routes(true) {
        let parameters: Vec<serde_json::Value> = entry
            .sig()
            .params()
            .iter()
            .filter(|param| !is_injected(param.name(), param.type_hint()))
            .map(|param| {
                let location = if path.contains(&format!("{{{}}}", param.name())) {
                    "path"
                } else {
                    "query"
                };
                json!({
                    "name": param.name(),
                    "in": location,
                    "schema": { "type": schema_type(param.type_hint()) },
                })
            })
            .collect();

        let mut operations = serde_json::Map::new();
        for method in entry.allowed_methods() {
            operations.insert(
                method.as_str().to_ascii_lowercase(),
                json!({ "parameters": parameters }),
            );
        }
        paths.insert(path, serde_json::Value::Object(operations));
    }

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": paths,
    })
}

fn is_injected(name: &str, hint: Option<TypeHint>) -> bool {
    match hint {
        Some(hint) => hint.is_injection(),
        None => InjectionKind::from_name(name).is_some(),
    }
}

fn schema_type(hint: Option<TypeHint>) -> &'static str {
    match hint {
        Some(TypeHint::Int) => "integer",
        Some(TypeHint::Float) => "number",
        Some(TypeHint::Bool) => "boolean",
        Some(TypeHint::List) | Some(TypeHint::Tuple) | Some(TypeHint::Set) => "array",
        Some(TypeHint::Map) => "object",
        _ => "string",
    }
}
