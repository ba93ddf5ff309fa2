//! Native support for `Request`/`Response` (spec §4.4, §6): the reason
//! phrase table and the in-memory body buffer used for bodies that were
//! constructed from a JS value (string/Blob/FormData/ArrayBuffer) rather
//! than inherited from a live host stream.
//!
//! A `Request`/`Response`'s body is represented in JS as either a `stream`
//! handle (an `IncomingBody` rid from `starling_body`, read via
//! `op_body_read`/`op_body_drain`) or a `buffer` handle (a
//! `BufferedBodyResource` rid, read via the ops below). Cloning a buffer
//! body is a cheap `Rc` clone; cloning a stream body drains it into a
//! buffer first and promotes both the original and the clone to buffer
//! bodies (see `request_response.js`'s `clone()` and DESIGN.md).

use std::borrow::Cow;
use std::rc::Rc;

use deno_core::{op2, OpState, ResourceId};

#[derive(Debug, thiserror::Error, deno_error::JsError)]
pub enum RequestResponseError {
    #[class(generic)]
    #[error("invalid body buffer resource")]
    BadResource,
}

pub struct BufferedBodyResource {
    pub bytes: Rc<Vec<u8>>,
}

impl deno_core::Resource for BufferedBodyResource {
    fn name(&self) -> Cow<str> {
        "BufferedBody".into()
    }
}

#[op2(fast)]
#[smi]
pub fn op_body_buffer_new(op_state: &mut OpState, #[buffer] bytes: &[u8]) -> ResourceId {
    op_state.resource_table.add(BufferedBodyResource {
        bytes: Rc::new(bytes.to_vec()),
    })
}

#[op2]
#[buffer]
pub fn op_body_buffer_bytes(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
) -> Result<Vec<u8>, RequestResponseError> {
    let body = op_state
        .resource_table
        .get::<BufferedBodyResource>(rid)
        .map_err(|_| RequestResponseError::BadResource)?;
    Ok(body.bytes.as_ref().clone())
}

/// Shares the backing bytes with a new resource id; O(1) regardless of
/// body size (spec §6, body cloning must not be O(n) for an already
/// in-memory body).
#[op2(fast)]
#[smi]
pub fn op_body_buffer_clone(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
) -> Result<ResourceId, RequestResponseError> {
    let body = op_state
        .resource_table
        .get::<BufferedBodyResource>(rid)
        .map_err(|_| RequestResponseError::BadResource)?;
    Ok(op_state.resource_table.add(BufferedBodyResource {
        bytes: body.bytes.clone(),
    }))
}

/// Exact reason-phrase table from the original status-message switch
/// (spec §6, "bit-exact behaviors worth preserving"). Unknown codes map
/// to the empty string, matching the `default:` case.
pub fn status_message(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        _ => "",
    }
}

#[op2]
#[string]
pub fn op_status_message(#[smi] code: u16) -> String {
    status_message(code).to_string()
}
