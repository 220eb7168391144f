/// Persistent object tests
///
/// Covers the typed accessor surface: get/set/delete/keys, array semantics,
/// reference aliasing and text validation.
/// Run with: cargo test --test object_tests
use pmobj::{MIN_POOL_SIZE, PersistentObjectPool, Value, new_pool};
use tempfile::TempDir;

fn test_pool(dir: &TempDir) -> PersistentObjectPool {
    let pool = new_pool(dir.path().join("file0"), MIN_POOL_SIZE);
    pool.create().unwrap();
    pool
}

#[test]
fn test_create_object_from_map_literal() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);

    let object = pool
        .create_object(Value::Map(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Int(2)),
            ("c".to_string(), Value::Int(3)),
        ]))
        .unwrap();
    assert_eq!(object.get("a").unwrap(), Value::Int(1));
    assert_eq!(object.get("b").unwrap(), Value::Int(2));
    assert_eq!(object.get("c").unwrap(), Value::Int(3));
    assert!(!object.is_array().unwrap());
}

#[test]
fn test_create_object_rejects_scalars_and_references() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);

    assert_eq!(
        pool.create_object(Value::Int(1)).unwrap_err().to_string(),
        "unsupported type"
    );
    let existing = pool.create_object(Value::Map(vec![])).unwrap();
    assert_eq!(
        pool.create_object(Value::Object(existing))
            .unwrap_err()
            .to_string(),
        "unsupported type"
    );
}

#[test]
fn test_set_property_by_key_and_numeric_key() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);

    let object = pool
        .create_object(Value::Map(vec![("a".to_string(), Value::Int(1))]))
        .unwrap();
    object.set("d", Value::Int(4)).unwrap();
    object.set("0", Value::from("abc")).unwrap();
    assert_eq!(object.get("d").unwrap(), Value::Int(4));
    assert_eq!(object.get("0").unwrap(), Value::from("abc"));
}

#[test]
fn test_missing_key_reads_as_none() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let object = pool.create_object(Value::Map(vec![])).unwrap();
    assert_eq!(object.get("nope").unwrap(), Value::None);
}

#[test]
fn test_delete_removes_key() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let object = pool
        .create_object(Value::Map(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Int(2)),
        ]))
        .unwrap();
    object.delete("a").unwrap();
    assert_eq!(object.keys().unwrap(), vec!["b".to_string()]);
    assert_eq!(object.get("a").unwrap(), Value::None);
    // deleting a missing key is not an error
    object.delete("a").unwrap();
}

#[test]
fn test_array_enumeration_order() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);

    let empty = pool.create_object(Value::List(vec![])).unwrap();
    assert_eq!(empty.keys().unwrap(), vec!["length".to_string()]);

    let array = pool
        .create_object(Value::List(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
        ]))
        .unwrap();
    assert_eq!(
        array.keys().unwrap(),
        vec![
            "0".to_string(),
            "1".to_string(),
            "2".to_string(),
            "length".to_string()
        ]
    );
}

#[test]
fn test_array_length_property() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let array = pool
        .create_object(Value::List(vec![Value::Int(1), Value::Int(2)]))
        .unwrap();

    assert_eq!(array.get("length").unwrap(), Value::Int(2));
    assert_eq!(array.len().unwrap(), 2);

    // growing through the length property
    array.set("length", Value::Int(3)).unwrap();
    assert_eq!(array.len().unwrap(), 3);
    assert_eq!(array.get("2").unwrap(), Value::None);

    // truncating
    array.set_len(1).unwrap();
    assert_eq!(array.len().unwrap(), 1);
    assert_eq!(
        array.keys().unwrap(),
        vec!["0".to_string(), "length".to_string()]
    );

    let err = array.set("length", Value::from("abc")).unwrap_err();
    assert_eq!(err.to_string(), "Invalid array length");
    let err = array.set("length", Value::Int(-1)).unwrap_err();
    assert_eq!(err.to_string(), "Invalid array length");
}

#[test]
fn test_absurd_array_length_is_rejected() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let array = pool.create_object(Value::List(vec![Value::Int(1)])).unwrap();

    // an integer, but no pool could ever hold that many slots
    let err = array.set("length", Value::Int(i64::MAX)).unwrap_err();
    assert_eq!(err.to_string(), "Invalid array length");
    let err = array.set_len(u64::MAX).unwrap_err();
    assert_eq!(err.to_string(), "Invalid array length");

    // the array is untouched
    assert_eq!(array.len().unwrap(), 1);
}

#[test]
fn test_length_is_a_plain_key_on_maps() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let object = pool.create_object(Value::Map(vec![])).unwrap();
    object.set("length", Value::from("tall")).unwrap();
    assert_eq!(object.get("length").unwrap(), Value::from("tall"));
}

#[test]
fn test_push_and_pop() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let array = pool.create_object(Value::List(vec![])).unwrap();

    array.push(Value::Int(1)).unwrap();
    array.push(Value::from("two")).unwrap();
    assert_eq!(array.len().unwrap(), 2);
    assert_eq!(array.pop().unwrap(), Value::from("two"));
    assert_eq!(array.pop().unwrap(), Value::Int(1));
    // popping an empty array yields the absence sentinel
    assert_eq!(array.pop().unwrap(), Value::None);
}

#[test]
fn test_push_unwraps_persistent_arguments() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let array = pool.create_object(Value::List(vec![])).unwrap();
    let child = pool
        .create_object(Value::Map(vec![("a".to_string(), Value::Int(1))]))
        .unwrap();

    array.push(Value::Object(child.clone())).unwrap();
    let element = array.get("0").unwrap();
    let aliased = element.as_object().expect("element should be an object");
    assert_eq!(aliased.handle(), child.handle());

    // mutations through one wrapper are visible through the other
    aliased.set("a", Value::Int(9)).unwrap();
    assert_eq!(child.get("a").unwrap(), Value::Int(9));
}

#[test]
fn test_push_pop_on_non_array_fail() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let object = pool.create_object(Value::Map(vec![])).unwrap();
    assert_eq!(
        object.push(Value::Int(1)).unwrap_err().to_string(),
        "push is not a function"
    );
    assert_eq!(object.pop().unwrap_err().to_string(), "pop is not a function");
}

#[test]
fn test_invalid_characters_are_rejected_before_any_write() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let object = pool
        .create_object(Value::Map(vec![("a".to_string(), Value::Int(1))]))
        .unwrap();

    let err = object.set("bad\0key", Value::Int(1)).unwrap_err();
    assert_eq!(err.to_string(), "invalid characters");
    let err = object.set("key", Value::from("bad\0value")).unwrap_err();
    assert_eq!(err.to_string(), "invalid characters");
    let err = object.set("esc\u{1b}", Value::Int(1)).unwrap_err();
    assert_eq!(err.to_string(), "invalid characters");

    // the failed writes had zero effect on the enumerable keys
    assert_eq!(object.keys().unwrap(), vec!["a".to_string()]);
}

#[test]
fn test_aliasing_assignment_stores_a_reference() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let parent = pool.create_object(Value::Map(vec![])).unwrap();
    let child = pool
        .create_object(Value::Map(vec![("n".to_string(), Value::Int(1))]))
        .unwrap();

    parent.set("child", Value::Object(child.clone())).unwrap();
    child.set("n", Value::Int(2)).unwrap();

    let through_parent = parent.get("child").unwrap();
    let through_parent = through_parent.as_object().unwrap();
    assert_eq!(through_parent.get("n").unwrap(), Value::Int(2));
}

#[test]
fn test_nested_literals_are_deep_copied() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let object = pool.create_object(Value::Map(vec![])).unwrap();

    object
        .set(
            "nested",
            Value::Map(vec![(
                "list".to_string(),
                Value::List(vec![Value::Int(1), Value::Int(2)]),
            )]),
        )
        .unwrap();

    let nested = object.get("nested").unwrap();
    let nested = nested.as_object().unwrap();
    let list = nested.get("list").unwrap();
    let list = list.as_object().unwrap();
    assert!(list.is_array().unwrap());
    assert_eq!(list.get("1").unwrap(), Value::Int(2));
}

#[test]
fn test_properties_survive_close_and_reopen() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let object = pool
        .create_object(Value::Map(vec![("a".to_string(), Value::Int(1))]))
        .unwrap();
    object.set("b", Value::from("two")).unwrap();
    pool.set_root(Value::Object(object)).unwrap();

    pool.close().unwrap();
    pool.open().unwrap();

    let root = pool.root().unwrap();
    let object = root.as_object().unwrap();
    assert_eq!(object.get("a").unwrap(), Value::Int(1));
    assert_eq!(object.get("b").unwrap(), Value::from("two"));
    pool.close().unwrap();
}

#[test]
fn test_wrapper_on_closed_pool_is_invalid() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir);
    let object = pool
        .create_object(Value::Map(vec![("a".to_string(), Value::Int(1))]))
        .unwrap();
    pool.set_root(Value::Object(object.clone())).unwrap();
    pool.close().unwrap();

    let err = object.get("a").unwrap_err();
    assert_eq!(err.to_string(), "invalid PersistentObject");
    let err = object.set("a", Value::Int(2)).unwrap_err();
    assert_eq!(err.to_string(), "invalid PersistentObject");
}
