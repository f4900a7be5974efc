use proptest::collection::{hash_map, vec};
use proptest::prelude::*;
use proptest::string::string_regex;
use serde_json::{Value, json};

use formstate::{
    FnSchema, FormContext, FormOptions, Issue, IssueSegment, PathSegment, ValidationOutcome,
    format_path, get_property, is_issue_path_equal, object_paths, parse_path, set_property,
};

mod strategies {
    use super::*;

    pub fn key_strategy() -> impl Strategy<Value = String> {
        string_regex(r"[a-zA-Z][a-zA-Z0-9_]{0,8}").unwrap()
    }

    pub fn leaf_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<String>().prop_map(Value::String),
            any::<i64>().prop_map(|i| json!(i)),
            any::<bool>().prop_map(Value::Bool),
            Just(Value::Null),
        ]
    }

    /// Nested objects and arrays, a few levels deep.
    pub fn tree_strategy() -> impl Strategy<Value = Value> {
        leaf_strategy().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                vec(inner.clone(), 0..4).prop_map(Value::Array),
                hash_map(key_strategy(), inner, 0..4).prop_map(|map| json!(map)),
            ]
        })
    }

    /// Object trees, the shape of a form's state.
    pub fn state_strategy() -> impl Strategy<Value = Value> {
        hash_map(key_strategy(), tree_strategy(), 0..4).prop_map(|map| json!(map))
    }

    pub fn segment_strategy() -> impl Strategy<Value = PathSegment> {
        prop_oneof![
            (0usize..50).prop_map(PathSegment::Index),
            key_strategy().prop_map(PathSegment::Key),
        ]
    }
}

fn accept_all() -> FormOptions {
    FormOptions::new(FnSchema::new(|input: &Value| {
        ValidationOutcome::Value(input.clone())
    }))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_enumerated_path_resolves(tree in strategies::state_strategy()) {
        for path in object_paths(&tree) {
            prop_assert!(get_property(&tree, &path).is_some(), "unresolved path {}", path);
        }
    }

    #[test]
    fn formatted_paths_parse_back(segments in vec(strategies::segment_strategy(), 1..6)) {
        let path = format_path(&segments);
        prop_assert_eq!(parse_path(&path), segments);
    }

    #[test]
    fn set_then_get(
        mut tree in strategies::state_strategy(),
        segments in vec(strategies::segment_strategy(), 1..4),
        value in strategies::leaf_strategy(),
    ) {
        let path = format_path(&segments);
        let before = tree.clone();
        if set_property(&mut tree, &path, value.clone()) {
            prop_assert_eq!(get_property(&tree, &path), Some(&value));
        } else {
            // Only a key step into an existing array is refused at these index sizes.
            let has_array = object_paths(&before).iter().any(|p| {
                get_property(&before, p).is_some_and(Value::is_array)
            });
            prop_assert!(has_array);
        }
    }

    #[test]
    fn index_and_key_segments_are_equivalent(indices in vec(0usize..1000, 1..5)) {
        let numeric: Vec<IssueSegment> = indices.iter().copied().map(IssueSegment::from).collect();
        let textual: Vec<PathSegment> = indices
            .iter()
            .map(|i| PathSegment::Key(i.to_string()))
            .collect();
        let bracketed: Vec<PathSegment> = indices.iter().copied().map(PathSegment::Index).collect();
        prop_assert!(is_issue_path_equal(Some(numeric.as_slice()), &textual));
        prop_assert!(is_issue_path_equal(Some(numeric.as_slice()), &bracketed));
        prop_assert!(!is_issue_path_equal(None, &bracketed));
    }

    #[test]
    fn reset_restores_initial_state(
        initial in strategies::state_strategy(),
        update in strategies::state_strategy(),
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let form = FormContext::new(
                accept_all()
                    .initial_state(initial.clone())
                    .initial_errors(vec![Issue::without_path("initial")]),
            );
            form.set_state(update, true).await;
            form.set_errors(vec![Issue::form_level("later")]);
            for _ in 0..2 {
                form.reset(None, None, false).await;
                prop_assert_eq!(form.state().get(), initial.clone());
                prop_assert_eq!(form.errors().get(), vec![Issue::without_path("initial")]);
                prop_assert!(!form.is_touched());
                prop_assert!(!form.is_dirty());
            }
            Ok(())
        })?;
    }

    #[test]
    fn forms_do_not_share_state(
        initial in strategies::state_strategy(),
        update in strategies::state_strategy(),
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let a = FormContext::new(accept_all().initial_state(initial.clone()));
            let b = FormContext::new(accept_all().initial_state(initial.clone()));
            a.set_state(update, true).await;
            a.touch_all_fields();
            a.set_errors(vec![Issue::form_level("only a")]);
            prop_assert_eq!(b.state().get(), initial.clone());
            prop_assert!(b.errors().get().is_empty());
            prop_assert!(!b.is_touched());
            prop_assert!(!b.is_dirty());
            Ok(())
        })?;
    }
}
