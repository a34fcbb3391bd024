#![no_main]
use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use tessie_bridge::projection::{assign, resolve};

fuzz_target!(|data: &[u8]| {
    // First line is the path, the rest a JSON document
    let text = String::from_utf8_lossy(data);
    let (path, doc) = text.split_once('\n').unwrap_or((&text, "{}"));
    let mut value: Value = serde_json::from_str(doc).unwrap_or(Value::Null);

    let _ = resolve(&value, path);
    assign(&mut value, path, Value::Bool(true));
    assert_eq!(resolve(&value, path), Some(&Value::Bool(true)));
});
