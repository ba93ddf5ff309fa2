pub mod formdata;

use deno_core::extension;

extension!(
    starling_formdata,
    deps = [starling_blob],
    ops = [
        formdata::op_formdata_boundary,
        formdata::op_formdata_encode,
        formdata::op_formdata_parse,
    ],
    esm_entry_point = "ext:starling_formdata/formdata.js",
    esm = [dir "src/ext/starling_formdata", "formdata.js"],
);
