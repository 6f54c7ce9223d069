#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use strata_core::Repository;
use strata_core::serial::{self, JsonCodec};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let codec = JsonCodec::<Value>::new();
    if let Ok(repo) = serial::from_json_str::<Value, Value>(text, &codec, &codec) {
        // Whatever loads must re-serialize and reload to the same graph.
        let again = serial::to_json_string(&repo, &codec, &codec).expect("serialize loaded");
        let reloaded: Repository<Value, Value> =
            serial::from_json_str(&again, &codec, &codec).expect("reload");
        assert_eq!(reloaded.graph(), repo.graph());
    }
});
