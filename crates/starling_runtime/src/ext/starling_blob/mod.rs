pub mod blob;

use deno_core::extension;

extension!(
    starling_blob,
    deps = [deno_url],
    ops = [
        blob::op_blob_new,
        blob::op_blob_slice,
        blob::op_blob_meta,
        blob::op_blob_bytes,
        blob::op_blob_create_object_url,
        blob::op_blob_revoke_object_url,
    ],
    esm_entry_point = "ext:starling_blob/blob.js",
    esm = [dir "src/ext/starling_blob", "blob.js"],
);

#[cfg(test)]
mod test {
    use crate::init_test_setup;

    #[test]
    fn blob_slice_and_text_roundtrip() {
        init_test_setup!(runtime, with_host);
        // `text()` is async; the resolved value is exercised end-to-end in
        // `starling_main`'s tests. Here we only assert the synchronous
        // slice + call doesn't throw.
        let result = runtime.execute(
            r#"
            const b = new Blob(["hello ", "world"], { type: "text/plain" });
            b.slice(6).text()
            "#,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn blob_size_reflects_concatenated_parts() {
        init_test_setup!(runtime, with_host);
        let size = runtime
            .execute_with_result::<f64>(
                r#"
                const b = new Blob(["hello ", "world"]);
                b.size
                "#,
            )
            .unwrap();
        assert_eq!(size, 11.0);
    }

    #[test]
    fn file_defaults_last_modified() {
        init_test_setup!(runtime, with_host);
        let is_number = runtime
            .execute_with_result::<bool>(
                r#"
                const f = new File(["x"], "a.txt");
                typeof f.lastModified === "number"
                "#,
            )
            .unwrap();
        assert!(is_number);
    }
}
