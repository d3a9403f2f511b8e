// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::io::{Error as WriteError, Write};

use crate::common::RequestError;

/// The headers of an HTTP message.
///
/// Lookup is case-insensitive; emit preserves insertion order. Setting a
/// header that already exists replaces the first occurrence in place so a
/// message never carries the same header twice.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects one header line and parses it, updating the header structure
    /// or returning an error if the line is invalid.
    ///
    /// The line splits on the first `:`; surrounding whitespace on the value
    /// is trimmed.
    ///
    /// # Errors
    /// `InvalidHeader` is returned when the line has no `:` or an empty name.
    pub fn parse_header_line(&mut self, header_line: &[u8]) -> Result<(), RequestError> {
        // Headers must be ASCII, so also UTF-8 valid.
        let line = std::str::from_utf8(header_line).map_err(|_| RequestError::InvalidHeader)?;
        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                self.set(name.trim(), value.trim());
                Ok(())
            }
            _ => Err(RequestError::InvalidHeader),
        }
    }

    /// Parses a full header block (lines separated by CRLF or bare LF, no
    /// trailing blank line required) into a Headers structure.
    ///
    /// # Errors
    /// The function returns `InvalidHeader` when any line fails to parse.
    pub fn try_from(bytes: &[u8]) -> Result<Headers, RequestError> {
        let text = std::str::from_utf8(bytes).map_err(|_| RequestError::InvalidRequest)?;
        let mut headers = Self::default();
        for header_line in text.split('\n') {
            let header_line = header_line.strip_suffix('\r').unwrap_or(header_line);
            if header_line.is_empty() {
                continue;
            }
            headers.parse_header_line(header_line.as_bytes())?;
        }
        Ok(headers)
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces the first header of this name, or appends a new one.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Sets the header only when absent, preserving a caller override.
    pub fn set_if_absent<K: Into<String> + AsRef<str>, V: Into<String>>(
        &mut self,
        name: K,
        value: V,
    ) {
        if !self.contains(name.as_ref()) {
            self.entries.push((name.into(), value.into()));
        }
    }

    /// The value of `Content-Length`, or 0 when absent.
    ///
    /// # Errors
    /// `InvalidHeader` is returned when the header is present but not a
    /// decimal integer.
    pub fn content_length(&self) -> Result<usize, RequestError> {
        match self.get("Content-Length") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| RequestError::InvalidHeader),
            None => Ok(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Writes `Name: Value\r\n` for each entry, in insertion order, followed
    /// by the blank separator line.
    pub fn write_all<T: Write>(&self, buf: &mut T) -> Result<(), WriteError> {
        for (key, value) in &self.entries {
            buf.write_all(key.as_bytes())?;
            buf.write_all(b": ")?;
            buf.write_all(value.as_bytes())?;
            buf.write_all(b"\r\n")?;
        }
        buf.write_all(b"\r\n")?;
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::default();
        for (k, v) in iter {
            headers.set(k, v);
        }
        headers
    }
}

/// Content type for a file-name suffix, `application/octet-stream` when the
/// suffix is unknown.
pub fn media_type_for_suffix(suffix: &str) -> &'static str {
    match suffix.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "json" => "application/json",
        "yml" | "yaml" => "application/x-yaml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "md" => "text/markdown",
        "toml" => "application/toml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_line() {
        let mut headers = Headers::default();
        assert!(headers.parse_header_line(b"Content-Length: 24").is_ok());
        assert_eq!(headers.get("content-length"), Some("24"));
        // Splits on the first colon only.
        assert!(headers.parse_header_line(b"X-Odd: a: b").is_ok());
        assert_eq!(headers.get("X-Odd"), Some("a: b"));
        assert!(headers.parse_header_line(b"no colon here").is_err());
        assert!(headers.parse_header_line(b": empty name").is_err());
    }

    #[test]
    fn test_try_from_block() {
        let headers =
            Headers::try_from(b"Content-Length: 55\r\nContent-Type: application/json\r\n")
                .unwrap();
        assert_eq!(headers.content_length().unwrap(), 55);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));

        // Bare LF separators are tolerated.
        let headers = Headers::try_from(b"A: 1\nB: 2").unwrap();
        assert_eq!(headers.get("a"), Some("1"));
        assert_eq!(headers.get("b"), Some("2"));

        assert!(Headers::try_from(b"Broken").is_err());
    }

    #[test]
    fn test_content_length_invalid() {
        let headers = Headers::try_from(b"Content-Length: alpha\r\n").unwrap();
        assert_eq!(
            headers.content_length().unwrap_err(),
            RequestError::InvalidHeader
        );
    }

    #[test]
    fn test_insertion_order_and_replace() {
        let mut headers = Headers::default();
        headers.set("B", "2");
        headers.set("A", "1");
        headers.set("b", "3");
        let keys: Vec<&str> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(headers.get("B"), Some("3"));

        headers.set_if_absent("A", "ignored");
        assert_eq!(headers.get("A"), Some("1"));

        let mut out = vec![];
        headers.write_all(&mut out).unwrap();
        assert_eq!(&out[..], b"B: 3\r\nA: 1\r\n\r\n");
    }

    #[test]
    fn test_media_types() {
        assert_eq!(media_type_for_suffix("html"), "text/html");
        assert_eq!(media_type_for_suffix("JSON"), "application/json");
        assert_eq!(media_type_for_suffix("bin"), "application/octet-stream");
    }
}
