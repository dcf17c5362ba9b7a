//! # Entity References
//!
//! Subjects arrive in two textual shapes and are compared in one canonical
//! shape:
//!
//! ```text
//! kind:namespace/name      ──┐
//!                            ├──→  kind:namespace/name  (trimmed, lowercase)
//! namespace/kind/name      ──┘
//! ```
//!
//! Anything else is passed through after trimming and lowercasing, so two
//! unrecognised strings still match when they are equal.

/// Entity the demo ticker reports on.
pub const DEMO_TARGET: &str = "component:default/example-website";

/// Canonicalize an entity reference.
///
/// Never fails; unrecognised shapes are returned trimmed and lowercased.
/// Segments are trimmed too, and a recognised shape with an empty segment is
/// treated as unrecognised, so the result is stable under a second pass.
pub fn normalize(entity_ref: &str) -> String {
    let s = entity_ref.trim().to_lowercase();
    if s.is_empty() {
        return s;
    }

    if let Some((kind, rest)) = s.split_once(':') {
        return match rest.split_once('/') {
            Some((namespace, name)) => canonical(kind, namespace, name).unwrap_or(s),
            None => s,
        };
    }

    let mut parts = s.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(namespace), Some(kind), Some(name), None) => canonical(kind, namespace, name).unwrap_or(s),
        _ => s,
    }
}

fn canonical(kind: &str, namespace: &str, name: &str) -> Option<String> {
    let (kind, namespace, name) = (kind.trim(), namespace.trim(), name.trim());
    if kind.is_empty() || namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some(format!("{kind}:{namespace}/{name}"))
}

/// True when both references name the same subject.
pub fn same_subject(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// True for the entity the demo ticker targets, in either shape.
pub fn is_demo_target(entity_ref: &str) -> bool {
    normalize(entity_ref) == DEMO_TARGET
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_shape_is_kept() {
        assert_eq!(
            normalize("component:default/example-website"),
            "component:default/example-website"
        );
    }

    #[test]
    fn test_alternate_shape_is_reordered() {
        assert_eq!(
            normalize("default/component/example-website"),
            "component:default/example-website"
        );
    }

    #[test]
    fn test_trim_and_case_fold() {
        assert_eq!(
            normalize("  Component:Default/Example-Website \n"),
            "component:default/example-website"
        );
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_unrecognised_shapes_pass_through() {
        assert_eq!(normalize("Just-A-Name"), "just-a-name");
        assert_eq!(normalize("a/b"), "a/b");
        assert_eq!(normalize("a/b/c/d"), "a/b/c/d");
        assert_eq!(normalize("kind:no-slash"), "kind:no-slash");
    }

    #[test]
    fn test_segments_are_trimmed() {
        assert_eq!(normalize("default/ component/x"), "component:default/x");
        assert_eq!(normalize("component : default / x"), "component:default/x");
    }

    #[test]
    fn test_empty_segments_pass_through() {
        assert_eq!(normalize("/ /"), "/ /");
        assert_eq!(normalize(normalize("/ /").as_str()), "/ /");
        assert_eq!(normalize(":/"), ":/");
        assert_eq!(normalize("ns//name"), "ns//name");
    }

    #[test]
    fn test_name_keeps_remaining_separators() {
        assert_eq!(normalize("group:ns/team/sub"), "group:ns/team/sub");
    }

    #[test]
    fn test_demo_target_matching() {
        assert!(is_demo_target("default/component/example-website"));
        assert!(is_demo_target("COMPONENT:default/example-website"));
        assert!(!is_demo_target("component:default/other"));
        assert!(same_subject(
            "default/component/example-website",
            "component:default/example-website"
        ));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in ".{0,40}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_both_shapes_agree(
            kind in "[a-zA-Z][a-zA-Z0-9-]{0,10}",
            ns in "[a-zA-Z][a-zA-Z0-9-]{0,10}",
            name in "[a-zA-Z][a-zA-Z0-9-]{0,10}",
        ) {
            let canonical = normalize(&format!("{kind}:{ns}/{name}"));
            let alternate = normalize(&format!("{ns}/{kind}/{name}"));
            prop_assert_eq!(&canonical, &alternate);
            prop_assert_eq!(normalize(&canonical), canonical);
        }
    }
}
