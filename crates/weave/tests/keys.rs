//! Property tests for resolution keys.

use proptest::prelude::*;
use weave::key::{encode_path, extract_interface_name, extract_location, is_location_key};
use weave::{location_key, sanitize};

/// Contract names as they appear in source: generics, digits and `_` runs included.
fn name_strategy() -> impl Strategy<Value = String> {
    (
        "_{0,2}[A-Za-z][A-Za-z0-9_]{0,15}_{0,2}",
        prop::option::of("[A-Z][a-z_]{1,6}"),
    )
        .prop_map(|(base, arg)| match arg {
            Some(arg) => format!("{base}<{arg}>"),
            None => base,
        })
}

fn path_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("_{0,2}[a-z][a-z0-9_-]{0,8}", 1..=4),
        prop::sample::select(vec!["ts", "tsx", "d.ts"]),
    )
        .prop_map(|(parts, ext)| parts.join("/") + "." + ext)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn location_keys_decompose_into_their_parts(
        name in name_strategy(),
        path in path_strategy(),
        line in 1u32..100_000,
    ) {
        let key = location_key(&name, Some(&path), Some(line));

        prop_assert!(is_location_key(key.as_str()));
        let sanitized = sanitize(&name);
        prop_assert_eq!(extract_interface_name(key.as_str()), sanitized.as_str());

        let location = extract_location(key.as_str());
        prop_assert_eq!(location.line, Some(line));
        prop_assert_eq!(location.file_path, Some(encode_path(&path, None)));
    }

    #[test]
    fn sanitized_keys_are_identifier_safe(name in "\\PC{0,24}") {
        let key = sanitize(&name);
        let text = key.as_str();

        prop_assert!(!text.is_empty());
        prop_assert!(text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        prop_assert!(!text.starts_with(|c: char| c.is_ascii_digit()));
        let resanitized = sanitize(text);
        prop_assert_eq!(resanitized.as_str(), text);
    }

    #[test]
    fn distinct_origins_give_distinct_keys(
        name in name_strategy(),
        first in path_strategy(),
        second in path_strategy(),
        line in 1u32..1_000,
    ) {
        prop_assume!(encode_path(&first, None) != encode_path(&second, None));
        prop_assert_ne!(
            location_key(&name, Some(&first), Some(line)),
            location_key(&name, Some(&second), Some(line))
        );
    }
}

#[test]
fn bare_keys_pass_through() {
    assert!(!is_location_key("TodoServiceInterface"));
    assert_eq!(extract_interface_name("TodoServiceInterface"), "TodoServiceInterface");
    assert!(extract_location("TodoServiceInterface").is_empty());
    assert_eq!(location_key("Logger", None, Some(3)).as_str(), "Logger");
}

#[test]
fn project_root_is_stripped_before_encoding() {
    let key = weave::key::location_key_in(
        Some("/home/dev/app"),
        "TodoServiceInterface",
        Some("/home/dev/app/src/todo2/types.ts"),
        Some(15),
    );
    assert_eq!(key.as_str(), "TodoServiceInterface__src_todo2_types_ts_line_15");
}
