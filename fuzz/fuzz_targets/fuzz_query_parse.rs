#![no_main]

use bodesk_url::{ModalQuery, is_modal_key, strip};
use libfuzzer_sys::fuzz_target;
use url::form_urlencoded;

fuzz_target!(|data: &[u8]| {
    let Ok(query) = std::str::from_utf8(data) else {
        return;
    };

    let stripped = strip(query);
    assert!(ModalQuery::parse(&stripped).is_none());
    assert!(
        form_urlencoded::parse(stripped.as_bytes()).all(|(key, _)| !is_modal_key(&key)),
        "strip left a modal key in {stripped:?}"
    );

    if let Some(q) = ModalQuery::parse(query) {
        let rewritten = q.apply_to(query);
        assert_eq!(ModalQuery::parse(&rewritten), Some(q));
        assert_eq!(strip(&rewritten), stripped);
    }
});
