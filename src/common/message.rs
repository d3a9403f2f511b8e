// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::io::{Error as WriteError, Write};

use crate::common::Version;

/// Common surface of the two wire messages. `send` emits the full message,
/// canonical CRLF line endings included.
pub trait Message {
    fn send<U: Write>(&mut self, out: &mut U) -> Result<(), WriteError>;
    fn header(&self, key: &str) -> Option<&str>;
    fn with_header(&mut self, key: &str, value: &str) -> &mut Self;
    fn version(&self) -> Version;
    fn body(&self) -> &[u8];
    fn with_body(&mut self, bytes: &[u8]) -> &mut Self;
}
