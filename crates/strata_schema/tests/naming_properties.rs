//! Property tests for column name generation.
//!
//! Generated names must be deterministic, stable under re-normalization, and
//! either shorter than the identifier limit or rejected outright.

use proptest::prelude::*;
use strata_schema::{column_name, inflect_name, SchemaError, MAX_IDENTIFIER_LEN};

fn is_snake(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Known stream and property names.
#[test]
fn test_known_names() {
    assert_eq!(inflect_name("TestTable").unwrap(), "test_table");
    assert_eq!(inflect_name("test Table").unwrap(), "test__table");
    assert_eq!(
        column_name(&["ParentObject", "childKey"]).unwrap(),
        "parent_object__child_key"
    );
}

proptest! {
    #[test]
    fn inflect_is_idempotent(name in "[ -~]{1,40}") {
        let once = inflect_name(&name).unwrap();
        let twice = inflect_name(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn inflect_output_is_snake_case(name in "\\PC{1,40}") {
        let inflected = inflect_name(&name).unwrap();
        prop_assert!(is_snake(&inflected), "not snake case: {}", inflected);
        prop_assert!(!inflected.starts_with(|c: char| c.is_ascii_digit()));
    }

    #[test]
    fn column_name_is_deterministic(path in prop::collection::vec("[a-zA-Z0-9_ ]{1,30}", 1..5)) {
        let first = column_name(path.as_slice());
        let second = column_name(path.as_slice());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn column_name_is_bounded_or_rejected(path in prop::collection::vec("[a-zA-Z][a-zA-Z_]{0,50}", 1..6)) {
        match column_name(path.as_slice()) {
            Ok(name) => prop_assert!(name.len() < MAX_IDENTIFIER_LEN, "{} is too long", name),
            Err(SchemaError::NameLengthExhausted { len, limit, .. }) => {
                prop_assert_eq!(limit, MAX_IDENTIFIER_LEN);
                prop_assert!(len >= MAX_IDENTIFIER_LEN);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }
}
