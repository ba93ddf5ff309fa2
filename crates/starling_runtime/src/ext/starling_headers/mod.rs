pub mod headers;

use deno_core::extension;

extension!(
    starling_headers,
    ops = [
        headers::op_headers_new,
        headers::op_headers_append,
        headers::op_headers_set,
        headers::op_headers_delete,
        headers::op_headers_get,
        headers::op_headers_has,
        headers::op_headers_get_set_cookie,
        headers::op_headers_entries,
    ],
    esm_entry_point = "ext:starling_headers/headers.js",
    esm = [dir "src/ext/starling_headers", "headers.js"],
);
