use cfgdelta_core::model::{NodeStore, Value};

/// Old: Config(x=1, items=[1, 2]); new: Config(x=2, items=[1, 2], extra="on")
#[allow(dead_code)]
pub fn sample_trees(store: &mut NodeStore) -> (Value, Value) {
    let old_items = store.sequence([Value::from(1i64), Value::from(2i64)]);
    let old = store.record("Config", [("x", Value::from(1i64)), ("items", old_items)]);
    let new_items = store.sequence([Value::from(1i64), Value::from(2i64)]);
    let new = store.record(
        "Config",
        [
            ("x", Value::from(2i64)),
            ("items", new_items),
            ("extra", Value::from("on")),
        ],
    );
    (old, new)
}
