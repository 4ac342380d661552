// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Endpoint paths, relative to the control-plane base URL.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped when a request id is placed in a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Long-poll for the next invocation.
pub const NEXT_INVOCATION: &str = "/runtime/invocation/next";

/// Report a failure that happened before the first invocation was served.
pub const INIT_ERROR: &str = "/runtime/init/error";

const INVOCATION_PREFIX: &str = "/runtime/invocation";

/// Path for reporting the result of `request_id`.
pub fn invocation_response(request_id: &str) -> String {
    format!(
        "{}/{}/response",
        INVOCATION_PREFIX,
        utf8_percent_encode(request_id, PATH_SEGMENT)
    )
}

/// Path for reporting the failure of `request_id`.
pub fn invocation_error(request_id: &str) -> String {
    format!(
        "{}/{}/error",
        INVOCATION_PREFIX,
        utf8_percent_encode(request_id, PATH_SEGMENT)
    )
}
