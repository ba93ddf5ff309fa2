//! Multipart/form-data encode and decode for `FormData` request/response
//! bodies (spec §6 "Bit-exact behaviors worth preserving").
//!
//! Kept in Rust rather than JS for two reasons: boundary generation needs
//! the host random source, and decoding needs to walk raw bytes without an
//! intermediate string conversion that could corrupt a binary file part.

use deno_core::{op2, OpState, ResourceId};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use starling_core::host::HostCapabilities;

use crate::error::RuntimeError;
use crate::ext::starling_blob::blob::BlobResource;

/// `--Boundary<base64(12 random bytes)>` (spec §6, exact format).
#[op2]
#[string]
pub fn op_formdata_boundary(op_state: &mut OpState) -> String {
    let random = op_state.borrow::<HostCapabilities>().random.clone();
    format!("--Boundary{}", URL_SAFE_NO_PAD.encode(random.get_bytes(12)))
}

#[derive(serde::Deserialize)]
#[serde(tag = "kind")]
pub enum FormDataEntry {
    #[serde(rename = "field")]
    Field { name: String, value: String },
    #[serde(rename = "file")]
    File {
        name: String,
        filename: String,
        #[serde(rename = "contentType")]
        content_type: String,
        #[serde(rename = "blobRid")]
        blob_rid: ResourceId,
    },
}

fn escape_disposition(s: &str) -> String {
    s.replace('\r', "%0D").replace('\n', "%0A").replace('"', "%22")
}

#[op2]
#[serde]
pub fn op_formdata_encode(
    op_state: &mut OpState,
    #[string] boundary: String,
    #[serde] entries: Vec<FormDataEntry>,
) -> Result<Vec<u8>, RuntimeError> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");
        match entry {
            FormDataEntry::Field { name, value } => {
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        escape_disposition(&name)
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(value.as_bytes());
            }
            FormDataEntry::File {
                name,
                filename,
                content_type,
                blob_rid,
            } => {
                let blob = op_state
                    .resource_table
                    .get::<BlobResource>(blob_rid)
                    .map_err(|_| RuntimeError::type_error("Blob"))?;
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        escape_disposition(&name),
                        escape_disposition(&filename)
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
                out.extend_from_slice(&blob.bytes);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
    Ok(out)
}

#[derive(serde::Serialize)]
#[serde(tag = "kind")]
pub enum ParsedEntry {
    #[serde(rename = "field")]
    Field { name: String, value: String },
    #[serde(rename = "file")]
    File {
        name: String,
        filename: String,
        #[serde(rename = "contentType")]
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// Splits `body` on `--{boundary}` markers and parses each part's headers.
///
/// Tolerance (spec §9 open question, resolved here): line endings within a
/// part's header block may be CRLF or bare LF; a part with no
/// `Content-Disposition` name is skipped rather than erroring the whole
/// decode, since one malformed part should not discard a form a client
/// otherwise filled out correctly. A missing final boundary (`--` suffix)
/// is tolerated; an entirely absent boundary match returns an empty list.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Vec<ParsedEntry> {
    let marker = format!("--{boundary}");
    let marker = marker.as_bytes();
    let mut parts = Vec::new();

    let mut pos = match find(body, marker) {
        Some(i) => i + marker.len(),
        None => return parts,
    };

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        let trimmed = strip_leading_eol(rest);
        let content_start = pos + (rest.len() - trimmed.len());
        match find(trimmed, marker) {
            Some(rel) => {
                let part = strip_trailing_eol(&trimmed[..rel]);
                if let Some(entry) = parse_part(part) {
                    parts.push(entry);
                }
                pos = content_start + rel + marker.len();
            }
            None => break,
        }
    }

    parts
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn strip_leading_eol(bytes: &[u8]) -> &[u8] {
    if bytes.starts_with(b"\r\n") {
        &bytes[2..]
    } else if bytes.starts_with(b"\n") {
        &bytes[1..]
    } else {
        bytes
    }
}

fn strip_trailing_eol(bytes: &[u8]) -> &[u8] {
    if bytes.ends_with(b"\r\n") {
        &bytes[..bytes.len() - 2]
    } else if bytes.ends_with(b"\n") {
        &bytes[..bytes.len() - 1]
    } else {
        bytes
    }
}

fn parse_part(part: &[u8]) -> Option<ParsedEntry> {
    let header_end = find(part, b"\r\n\r\n")
        .map(|i| (i, 4))
        .or_else(|| find(part, b"\n\n").map(|i| (i, 2)))?;
    let (header_bytes, body_start) = (&part[..header_end.0], header_end.0 + header_end.1);
    let header_str = String::from_utf8_lossy(header_bytes);
    let body = &part[body_start..];

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in header_str.split(['\r', '\n']).filter(|l| !l.is_empty()) {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if key == "content-disposition" {
            name = extract_param(value, "name");
            filename = extract_param(value, "filename");
        } else if key == "content-type" {
            content_type = Some(value.to_string());
        }
    }

    let name = name?;
    match filename {
        Some(filename) => Some(ParsedEntry::File {
            name,
            filename,
            content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes: body.to_vec(),
        }),
        None => Some(ParsedEntry::Field {
            name,
            value: String::from_utf8_lossy(body).into_owned(),
        }),
    }
}

fn extract_param(disposition: &str, key: &str) -> Option<String> {
    for segment in disposition.split(';') {
        let segment = segment.trim();
        let prefix = format!("{key}=");
        if let Some(rest) = segment.strip_prefix(&prefix) {
            let rest = rest.trim().trim_matches('"');
            return Some(
                rest.replace("%0D", "\r")
                    .replace("%0A", "\n")
                    .replace("%22", "\""),
            );
        }
    }
    None
}

#[op2]
#[serde]
pub fn op_formdata_parse(
    #[buffer] body: &[u8],
    #[string] boundary: String,
) -> Vec<ParsedEntry> {
    parse_multipart(body, &boundary)
}
