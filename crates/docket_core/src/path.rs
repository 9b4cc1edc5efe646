//! Dotted document paths.

use docket_codec::Value;

/// Split a dotted path into its field segments.
///
/// An empty path or empty segment (`"a..b"`) is rejected by
/// [`crate::spec::CompositeIndexSpec`] validation before it gets here.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// The longest shared dotted prefix of two paths, if any.
pub fn common_prefix<'a>(a: &'a str, b: &str) -> Option<&'a str> {
    let mut shared = 0;
    for (seg_a, seg_b) in segments(a).iter().zip(segments(b).iter()) {
        if seg_a != seg_b {
            break;
        }
        shared += 1;
    }
    if shared == 0 {
        return None;
    }
    let len = segments(a)[..shared]
        .iter()
        .map(|s| s.len())
        .sum::<usize>()
        + shared
        - 1;
    Some(&a[..len])
}

/// Resolve a dotted path against a document, collecting every value the path
/// reaches. Arrays along the way fan out per element; an array at the leaf
/// contributes both the array itself and its elements (so equality against
/// either matches). Used by recheck evaluation, not by term generation, which
/// needs the correlation-aware expansion in [`crate::generate`].
pub fn resolve<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect(document, &segments(path), &mut out);
    out
}

fn collect<'a>(value: &'a Value, remaining: &[&str], out: &mut Vec<&'a Value>) {
    match remaining.split_first() {
        None => {
            out.push(value);
            if let Value::Array(items) = value {
                out.extend(items.iter());
            }
        }
        Some((head, tail)) => match value {
            Value::Document(_) => {
                if let Some(field) = value.get(head) {
                    collect(field, tail, out);
                }
            }
            Value::Array(items) => {
                // Array mid-path: fan out, the segment applies per element.
                for item in items {
                    if item.as_document().is_some() {
                        collect(item, remaining, out);
                    }
                }
            }
            _ => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_codec::doc;

    #[test]
    fn prefix_checks() {
        assert_eq!(common_prefix("a.b.c", "a.b.d"), Some("a.b"));
        assert_eq!(common_prefix("a.b", "c.d"), None);
        assert_eq!(common_prefix("aa.b", "a.b"), None);
    }

    #[test]
    fn resolve_through_arrays() {
        let d = doc(vec![(
            "a",
            Value::Array(vec![
                doc(vec![("b", Value::Int32(1))]),
                doc(vec![("b", Value::Int32(2))]),
                Value::Int32(9),
            ]),
        )]);
        let values = resolve(&d, "a.b");
        assert_eq!(values, vec![&Value::Int32(1), &Value::Int32(2)]);
    }

    #[test]
    fn resolve_leaf_array_includes_array_and_elements() {
        let d = doc(vec![("tags", Value::from(vec![1i32, 2]))]);
        let values = resolve(&d, "tags");
        assert_eq!(values.len(), 3);
        assert_eq!(values[1], &Value::Int32(1));
    }

    #[test]
    fn resolve_missing_is_empty() {
        let d = doc(vec![("a", Value::Int32(1))]);
        assert!(resolve(&d, "b").is_empty());
        assert!(resolve(&d, "a.b").is_empty());
    }
}
