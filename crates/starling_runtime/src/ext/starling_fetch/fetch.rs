//! Native half of `fetch()` (spec §4.4): URL-scheme dispatch, the
//! http(s) outgoing-request/response-future bridge, and the `blob:`
//! scheme's synchronous Range-aware resolution.
//!
//! http(s) dispatch is split into three ops, mirroring
//! `starling_timers`'s queue/await/release split rather than doing
//! everything inside one `#[op2(async)]` call: `op_fetch_start` queues a
//! `ResponseFutureTask` and returns an opaque handle immediately,
//! `op_fetch_poll` awaits it, and `op_fetch_cancel` lets an aborted
//! `AbortSignal` tear the in-flight send down from a synchronous listener
//! without needing a `Future` in scope. Event-loop interest is held from
//! `op_fetch_start` (when the task is queued) until whichever of
//! `op_fetch_poll`/`op_fetch_cancel` settles it first, same pairing as
//! `op_timer_queue`/`op_timer_release`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use deno_core::{op2, OpState, ResourceId};

use starling_core::host::http::{HttpOutgoing, OutgoingRequestParts, RawHeader};
use starling_core::host::HostCapabilities;
use starling_core::EventLoop;

use crate::ext::starling_blob::blob;
use crate::ext::starling_body::body::IncomingBodyResource;
use crate::ext::starling_request_response::request_response::BufferedBodyResource;
use crate::tasks::{self, ResponseFutureTask, TaskFuture};

#[derive(Debug, thiserror::Error, deno_error::JsError)]
pub enum FetchError {
    #[class(type_error)]
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
    #[class(type_error)]
    #[error("network error: {0}")]
    Network(String),
    #[class(not_supported)]
    #[error("outgoing HTTP is not supported in this runtime configuration")]
    NoHttpCapability,
    #[class(generic)]
    #[error("unknown fetch handle")]
    UnknownHandle,
}

struct FetchHandle {
    task_id: starling_core::TaskId,
    cell: tasks::Shared<starling_core::Result<starling_core::host::http::IncomingResponseParts>>,
}

#[derive(Default)]
pub struct FetchRegistry {
    next_id: u32,
    handles: HashMap<u32, FetchHandle>,
}

fn with_registry<R>(op_state: &mut OpState, f: impl FnOnce(&mut FetchRegistry) -> R) -> R {
    if !op_state.has::<Rc<RefCell<FetchRegistry>>>() {
        op_state.put(Rc::new(RefCell::new(FetchRegistry::default())));
    }
    let registry = op_state.borrow::<Rc<RefCell<FetchRegistry>>>().clone();
    let mut registry = registry.borrow_mut();
    f(&mut registry)
}

#[derive(serde::Serialize)]
pub struct FetchResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body_rid: ResourceId,
}

fn parts_to_response(
    op_state: &mut OpState,
    parts: starling_core::host::http::IncomingResponseParts,
) -> FetchResponse {
    let headers = parts
        .headers
        .into_iter()
        .map(|(name, value)| (name, String::from_utf8_lossy(&value).into_owned()))
        .collect();
    let body_rid = op_state.resource_table.add(IncomingBodyResource::new(parts.body));
    FetchResponse {
        status: parts.status,
        headers,
        body_rid,
    }
}

/// Splits a URL into `(scheme, authority, path_with_query)` well enough for
/// `http`/`https` dispatch. Not a general-purpose URL parser: query-string
/// percent-decoding, userinfo, and fragments are left exactly as given,
/// since the host only needs the wire-format pieces back.
fn split_url(url: &str) -> Result<(String, String, String), FetchError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
    let (authority, path_with_query) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    Ok((scheme.to_ascii_lowercase(), authority.to_string(), path_with_query.to_string()))
}

/// Starts an http(s) send and returns an opaque handle; the body (if any)
/// is written in full before `send` is called — the host trait's `body()`
/// only borrows `&mut self` for the duration of this synchronous call, so
/// a request body can't be streamed in past this point (see DESIGN.md).
#[op2(fast)]
#[smi]
pub fn op_fetch_start(
    op_state: &mut OpState,
    #[string] method: String,
    #[string] url: String,
    #[serde] headers: Vec<(String, String)>,
    #[buffer] body: &[u8],
) -> Result<u32, FetchError> {
    let (scheme, authority, path_with_query) = split_url(&url)?;
    if !op_state.has::<HostCapabilities>() {
        return Err(FetchError::NoHttpCapability);
    }
    let http = op_state.borrow::<HostCapabilities>().http.clone();

    let raw_headers: Vec<RawHeader> = headers
        .into_iter()
        .map(|(name, value)| (name, value.into_bytes()))
        .collect();

    let mut request = http
        .new_request(OutgoingRequestParts {
            method,
            scheme,
            authority,
            path_with_query,
            headers: raw_headers,
        })
        .map_err(|e| FetchError::Network(e.to_string()))?;

    if !body.is_empty() {
        if let Some(sink) = request.body() {
            sink.write(body).map_err(|e| FetchError::Network(e.to_string()))?;
            sink.blocking_flush().map_err(|e| FetchError::Network(e.to_string()))?;
        }
    }

    let future = request.send();
    let cell = tasks::shared::<
        starling_core::Result<starling_core::host::http::IncomingResponseParts>,
    >();
    let task = ResponseFutureTask::new(future, cell.clone());

    let event_loop = op_state.borrow_mut::<EventLoop>();
    let task_id = event_loop.queue(Box::new(task));
    let _held = event_loop.incr_interest();

    Ok(with_registry(op_state, |registry| {
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handles.insert(id, FetchHandle { task_id, cell });
        id
    }))
}

#[op2(async)]
#[serde]
pub async fn op_fetch_poll(
    op_state: Rc<RefCell<OpState>>,
    #[smi] handle: u32,
) -> Result<FetchResponse, FetchError> {
    let cell = {
        let mut op_state = op_state.borrow_mut();
        with_registry(&mut op_state, |registry| {
            registry.handles.get(&handle).map(|h| h.cell.clone())
        })
        .ok_or(FetchError::UnknownHandle)?
    };

    let result = TaskFuture(cell).await;

    let mut op_state = op_state.borrow_mut();
    with_registry(&mut op_state, |registry| registry.handles.remove(&handle));
    let event_loop = op_state.borrow_mut::<EventLoop>();
    let _ = event_loop.decr_interest();

    let parts = result.map_err(|e| FetchError::Network(e.to_string()))?;
    Ok(parts_to_response(&mut op_state, parts))
}

/// Called from an `AbortSignal`'s `abort` listener (`fetch.js`). Cancels
/// the queued task and wakes `op_fetch_poll`'s pending future with a
/// network error; a no-op if the send already settled on its own (the
/// handle is gone by the time the abort listener runs).
#[op2(fast)]
pub fn op_fetch_cancel(op_state: &mut OpState, #[smi] handle: u32) {
    let found = with_registry(op_state, |registry| registry.handles.remove(&handle));
    if let Some(handle) = found {
        op_state.borrow_mut::<EventLoop>().cancel(handle.task_id);
        handle.cell.borrow_mut().complete(Err(starling_core::Error::Host(
            starling_core::error::HostError::new(-1, "fetch aborted"),
        )));
    }
}

/// `blob:` scheme dispatch (spec §4.4, §8 S2): synchronous, no task
/// queuing — the blob URL store is an in-memory map, so there is nothing
/// to await.
#[op2]
#[serde]
pub fn op_fetch_blob(
    op_state: &mut OpState,
    #[string] method: String,
    #[string] url: String,
    #[string] range: String,
) -> Result<FetchResponse, FetchError> {
    if method != "GET" {
        return Err(FetchError::Network(format!(
            "blob: URLs only support GET, got {method}"
        )));
    }
    let resource = blob::resolve(op_state, &url).ok_or_else(|| {
        FetchError::Network(format!("blob URL not found: {url}"))
    })?;
    let len = resource.bytes.len();

    let (status, start, end, content_range) = if range.is_empty() {
        (200u16, 0usize, len, None)
    } else {
        let (start, end) = parse_range(&range, len)
            .ok_or_else(|| FetchError::Network(format!("unsatisfiable range: {range}")))?;
        (206u16, start, end, Some(format!("bytes {start}-{}/{len}", end.saturating_sub(1))))
    };

    let slice = resource.bytes[start..end].to_vec();
    let content_length = slice.len();
    let body_rid = op_state.resource_table.add(BufferedBodyResource {
        bytes: Rc::new(slice),
    });

    let mut headers = vec![
        ("content-type".to_string(), resource.content_type.clone()),
        ("content-length".to_string(), content_length.to_string()),
    ];
    if let Some(range) = content_range {
        headers.push(("content-range".to_string(), range));
    }

    Ok(FetchResponse {
        status,
        headers,
        body_rid,
    })
}

/// `bytes=<start>-<end>`, either bound optional (spec §4.4). Returns the
/// half-open byte range `[start, end)`, or `None` for an unsatisfiable
/// range (including `start >= len`, which covers the `bytes=0-0` request
/// against a 0-byte blob from §8's boundary behaviors).
fn parse_range(header: &str, len: usize) -> Option<(usize, usize)> {
    let spec = header.strip_prefix("bytes=")?;
    let (start_s, end_s) = spec.split_once('-')?;
    if start_s.is_empty() && end_s.is_empty() {
        return None;
    }
    if start_s.is_empty() {
        let suffix_len: usize = end_s.parse().ok()?;
        let suffix_len = suffix_len.min(len);
        return Some((len - suffix_len, len));
    }
    let start: usize = start_s.parse().ok()?;
    if start >= len {
        return None;
    }
    let end = if end_s.is_empty() {
        len
    } else {
        let last: usize = end_s.parse().ok()?;
        (last + 1).min(len)
    };
    Some((start, end.max(start)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn range_with_both_bounds() {
        assert_eq!(parse_range("bytes=2-5", 10), Some((2, 6)));
    }

    #[test]
    fn range_missing_end_goes_to_eof() {
        assert_eq!(parse_range("bytes=7-", 10), Some((7, 10)));
    }

    #[test]
    fn range_missing_start_is_suffix() {
        assert_eq!(parse_range("bytes=-3", 10), Some((7, 10)));
    }

    #[test]
    fn range_zero_zero_on_empty_blob_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=0-0", 0), None);
    }

    #[test]
    fn split_url_extracts_authority_and_path() {
        assert_eq!(
            split_url("https://example.com:8443/a/b?c=d").unwrap(),
            ("https".to_string(), "example.com:8443".to_string(), "/a/b?c=d".to_string())
        );
    }

    #[test]
    fn split_url_defaults_path_to_root() {
        assert_eq!(
            split_url("http://example.com").unwrap(),
            ("http".to_string(), "example.com".to_string(), "/".to_string())
        );
    }
}
