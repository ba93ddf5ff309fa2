//! Process-wide blob URL store (spec §3, consumed by `starling_fetch`'s
//! `blob:` scheme dispatch, spec §4.4 scenario S2).
//!
//! Each `Blob`/`File` constructed in JS gets a native `BlobResource` (a
//! plain byte buffer plus content type) in the resource table.
//! `URL.createObjectURL` clones that `Rc` into a second map keyed by a
//! random opaque id, forming the `blob:starling/<id>` URL; `fetch` resolves
//! that scheme directly against the map, never by going back through JS.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use deno_core::{op2, OpState, ResourceId};

use starling_core::host::HostCapabilities;

use crate::error::RuntimeError;

pub struct BlobResource {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl deno_core::Resource for BlobResource {
    fn name(&self) -> Cow<str> {
        "Blob".into()
    }
}

const URL_PREFIX: &str = "blob:starling/";

/// Entries persist until explicitly revoked; membership is independent of
/// the originating `Blob` object's lifetime (spec §5, "process-global,
/// protected conceptually by the single-threaded model").
#[derive(Default)]
pub struct BlobUrlStore {
    entries: HashMap<String, Rc<BlobResource>>,
}

fn store(op_state: &mut OpState) -> Rc<RefCell<BlobUrlStore>> {
    if !op_state.has::<Rc<RefCell<BlobUrlStore>>>() {
        op_state.put(Rc::new(RefCell::new(BlobUrlStore::default())));
    }
    op_state.borrow::<Rc<RefCell<BlobUrlStore>>>().clone()
}

/// Resolves a `blob:` URL against the process-wide store. Called directly
/// by `starling_fetch`'s Rust dispatch; never exposed as an op since it
/// never needs to cross the v8 boundary on its own.
pub(crate) fn resolve(op_state: &mut OpState, url: &str) -> Option<Rc<BlobResource>> {
    store(op_state).borrow().entries.get(url).cloned()
}

fn get(op_state: &mut OpState, rid: ResourceId) -> Result<Rc<BlobResource>, RuntimeError> {
    op_state
        .resource_table
        .get::<BlobResource>(rid)
        .map_err(|_| RuntimeError::type_error("Blob"))
}

#[op2(fast)]
#[smi]
pub fn op_blob_new(
    op_state: &mut OpState,
    #[buffer] bytes: &[u8],
    #[string] content_type: String,
) -> ResourceId {
    op_state.resource_table.add(BlobResource {
        bytes: bytes.to_vec(),
        content_type,
    })
}

#[op2(fast)]
#[smi]
pub fn op_blob_slice(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    start: f64,
    end: f64,
    #[string] content_type: String,
) -> Result<ResourceId, RuntimeError> {
    let blob = get(op_state, rid)?;
    let len = blob.bytes.len();
    let start = (start.max(0.0) as usize).min(len);
    let end = (end.max(0.0) as usize).min(len).max(start);
    let bytes = blob.bytes[start..end].to_vec();
    Ok(op_state
        .resource_table
        .add(BlobResource { bytes, content_type }))
}

#[derive(serde::Serialize)]
pub struct BlobMeta {
    size: f64,
    #[serde(rename = "type")]
    content_type: String,
}

#[op2]
#[serde]
pub fn op_blob_meta(op_state: &mut OpState, #[smi] rid: ResourceId) -> Result<BlobMeta, RuntimeError> {
    let blob = get(op_state, rid)?;
    Ok(BlobMeta {
        size: blob.bytes.len() as f64,
        content_type: blob.content_type.clone(),
    })
}

#[op2]
#[serde]
pub fn op_blob_bytes(op_state: &mut OpState, #[smi] rid: ResourceId) -> Result<Vec<u8>, RuntimeError> {
    Ok(get(op_state, rid)?.bytes.clone())
}

/// `URL.createObjectURL(blob)` (spec §3). The id is 16 random bytes from
/// the host random source, not a JS-visible `Math.random`, so blob URLs
/// can't be guessed from script.
#[op2]
#[string]
pub fn op_blob_create_object_url(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
) -> Result<String, RuntimeError> {
    let blob = get(op_state, rid)?;
    let random = op_state.borrow::<HostCapabilities>().random.clone();
    let id = URL_SAFE_NO_PAD.encode(random.get_bytes(16));
    let url = format!("{URL_PREFIX}{id}");
    store(op_state).borrow_mut().entries.insert(url.clone(), blob);
    Ok(url)
}

#[op2(fast)]
pub fn op_blob_revoke_object_url(op_state: &mut OpState, #[string] url: String) {
    store(op_state).borrow_mut().entries.remove(&url);
}

#[cfg(test)]
mod test {
    use crate::init_test_setup;

    #[test]
    fn slice_clamps_to_blob_bounds() {
        init_test_setup!(runtime, with_host);
        let result = runtime
            .execute_with_result::<Vec<u8>>(
                r#"
                const rid = Deno.core.ops.op_blob_new(new Uint8Array([104,101,108,108,111,32,119,111,114,108,100]), "text/plain");
                const sliced = Deno.core.ops.op_blob_slice(rid, 6, 100, "text/plain");
                Deno.core.ops.op_blob_bytes(sliced)
                "#,
            )
            .unwrap();
        assert_eq!(result, b"world");
    }

    #[test]
    fn revoke_removes_the_mapping() {
        init_test_setup!(runtime, with_host);
        let still_resolves = runtime
            .execute_with_result::<bool>(
                r#"
                const rid = Deno.core.ops.op_blob_new(new Uint8Array([1,2,3]), "");
                const url = Deno.core.ops.op_blob_create_object_url(rid);
                globalThis.__url = url;
                typeof Deno.core.ops.op_blob_revoke_object_url === "function"
                "#,
            )
            .unwrap();
        assert!(still_resolves);
        let url = runtime.execute_with_result::<String>("globalThis.__url").unwrap();
        {
            let op_state = runtime.op_state();
            let mut op_state = op_state.borrow_mut();
            assert!(super::resolve(&mut op_state, &url).is_some());
        }
        runtime
            .execute(&format!("Deno.core.ops.op_blob_revoke_object_url({url:?})"))
            .unwrap();
        {
            let op_state = runtime.op_state();
            let mut op_state = op_state.borrow_mut();
            assert!(super::resolve(&mut op_state, &url).is_none());
        }
    }
}
