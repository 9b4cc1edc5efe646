//! End-to-end tests: generate terms for a set of documents, plan queries
//! against the accumulated multi-key metadata, and execute the scan ranges
//! over the stored rows the way the access method would, including recheck.

use std::cmp::Ordering;

use docket_codec::{compare_terms, doc, Decimal128, IndexTerm, Value};
use docket_core::{
    generate_terms, plan_query, CompositeIndexBounds, CompositeIndexSpec, CompositeRow,
    IndexPathSpec, MultikeyMetadata, PathConstraint, QueryPredicate,
};

struct MiniIndex {
    spec: CompositeIndexSpec,
    metadata: MultikeyMetadata,
    rows: Vec<(&'static str, CompositeRow, Value)>,
}

impl MiniIndex {
    fn build(spec: CompositeIndexSpec, documents: Vec<(&'static str, Value)>) -> Self {
        let mut metadata = MultikeyMetadata::default();
        let mut rows = Vec::new();
        for (id, document) in documents {
            let generated = generate_terms(&document, &spec);
            metadata.merge(generated.multikey_metadata());
            for row in generated.rows() {
                rows.push((id, row.clone(), document.clone()));
            }
        }
        Self {
            spec,
            metadata,
            rows,
        }
    }

    fn find(&self, query: &QueryPredicate) -> Vec<&'static str> {
        let run = plan_query(query, &self.spec, &self.metadata, false).unwrap();
        let mut out = Vec::new();
        for (id, row, document) in &self.rows {
            let hit = run.ranges.iter().any(|range| {
                row.terms()
                    .iter()
                    .zip(&range.bounds)
                    .all(|(term, bounds)| within(term, bounds))
                    && range.recheck_predicates.iter().all(|p| p.evaluate(document))
            });
            if hit && !out.contains(id) {
                out.push(*id);
            }
        }
        out
    }
}

fn within(term: &IndexTerm, bounds: &CompositeIndexBounds) -> bool {
    let above = match compare_terms(term, &bounds.lower.term).unwrap() {
        Ordering::Greater => true,
        Ordering::Equal => bounds.lower.inclusive,
        Ordering::Less => false,
    };
    let below = match compare_terms(term, &bounds.upper.term).unwrap() {
        Ordering::Less => true,
        Ordering::Equal => bounds.upper.inclusive,
        Ordering::Greater => false,
    };
    above && below
}

fn ascending(paths: &[&str]) -> CompositeIndexSpec {
    CompositeIndexSpec::new(paths.iter().map(|p| IndexPathSpec::new(*p)).collect()).unwrap()
}

fn array_fixture() -> MiniIndex {
    MiniIndex::build(
        ascending(&["a.b", "a.c"]),
        vec![
            (
                "doc1",
                doc(vec![(
                    "a",
                    Value::Array(vec![
                        doc(vec![("b", Value::Int32(1)), ("c", Value::Int32(1))]),
                        doc(vec![("b", Value::Int32(2)), ("c", Value::Int32(2))]),
                    ]),
                )]),
            ),
            (
                "doc2",
                doc(vec![(
                    "a",
                    Value::Array(vec![doc(vec![
                        ("b", Value::Int32(1)),
                        ("c", Value::Int32(2)),
                    ])]),
                )]),
            ),
            (
                "doc3",
                doc(vec![(
                    "a",
                    doc(vec![("b", Value::Int32(5)), ("c", Value::Int32(5))]),
                )]),
            ),
        ],
    )
}

#[test]
fn elem_match_distinguishes_element_alignment() {
    let index = array_fixture();
    // {b:1, c:1} in one element: only doc1 has such an element.
    let query = QueryPredicate::new().with(
        "a",
        PathConstraint::ElemMatch(vec![
            ("b".into(), PathConstraint::Eq(Value::Int32(1))),
            ("c".into(), PathConstraint::Eq(Value::Int32(1))),
        ]),
    );
    assert_eq!(index.find(&query), vec!["doc1"]);

    // {b:1, c:2} in one element: only doc2.
    let query = QueryPredicate::new().with(
        "a",
        PathConstraint::ElemMatch(vec![
            ("b".into(), PathConstraint::Eq(Value::Int32(1))),
            ("c".into(), PathConstraint::Eq(Value::Int32(2))),
        ]),
    );
    assert_eq!(index.find(&query), vec!["doc2"]);
}

#[test]
fn plain_conjunction_spans_elements_via_recheck() {
    let index = array_fixture();
    // Without $elemMatch the constraints may be satisfied by different
    // elements: doc1 matches through b:1 (first element) and c:2 (second),
    // doc2 through its single element. The stored rows never pair (1,2) for
    // doc1; only the widened range plus recheck finds it.
    let query = QueryPredicate::new()
        .with("a.b", PathConstraint::Eq(Value::Int32(1)))
        .with("a.c", PathConstraint::Eq(Value::Int32(2)));
    assert_eq!(index.find(&query), vec!["doc1", "doc2"]);
}

#[test]
fn range_scan_over_mixed_multikey_documents() {
    let index = array_fixture();
    let query = QueryPredicate::new().with("a.b", PathConstraint::Gt(Value::Int32(1)));
    assert_eq!(index.find(&query), vec!["doc1", "doc3"]);

    let query = QueryPredicate::new().with(
        "a.b",
        PathConstraint::In(vec![Value::Int32(2), Value::Int32(5)]),
    );
    assert_eq!(index.find(&query), vec!["doc1", "doc3"]);
}

#[test]
fn absent_paths_answer_exists_queries() {
    let index = MiniIndex::build(
        ascending(&["name", "nick"]),
        vec![
            (
                "named",
                doc(vec![
                    ("name", Value::from("ada")),
                    ("nick", Value::from("al")),
                ]),
            ),
            ("plain", doc(vec![("name", Value::from("bob"))])),
        ],
    );
    let query = QueryPredicate::new().with("nick", PathConstraint::Exists(false));
    assert_eq!(index.find(&query), vec!["plain"]);
    let query = QueryPredicate::new().with("nick", PathConstraint::Exists(true));
    assert_eq!(index.find(&query), vec!["named"]);
}

#[test]
fn truncated_equality_filters_through_recheck() {
    let long_a = format!("{}{}", "p".repeat(32), "alpha");
    let long_b = format!("{}{}", "p".repeat(32), "beta");
    let spec = CompositeIndexSpec::new(vec![
        IndexPathSpec::new("title").truncation_limit(16)
    ])
    .unwrap();
    let index = MiniIndex::build(
        spec,
        vec![
            ("a", doc(vec![("title", Value::from(long_a.as_str()))])),
            ("b", doc(vec![("title", Value::from(long_b.as_str()))])),
        ],
    );
    // Both stored terms share the truncated prefix; only recheck against the
    // full document tells them apart.
    let query = QueryPredicate::new()
        .with("title", PathConstraint::Eq(Value::from(long_a.as_str())));
    assert_eq!(index.find(&query), vec!["a"]);
}

#[test]
fn ne_excludes_any_element_match() {
    let index = MiniIndex::build(
        ascending(&["tags"]),
        vec![
            ("both", doc(vec![("tags", Value::from(vec![1i32, 2]))])),
            ("one", doc(vec![("tags", Value::from(vec![1i32]))])),
        ],
    );
    let query = QueryPredicate::new().with("tags", PathConstraint::Ne(Value::Int32(2)));
    assert_eq!(index.find(&query), vec!["one"]);
}

#[test]
fn exists_false_skips_partial_presence_elements() {
    // The second element of "partial" has no c, so its row stores the absent
    // sentinel for a.c even though a.c exists elsewhere in the document.
    let index = MiniIndex::build(
        ascending(&["a.b", "a.c"]),
        vec![
            (
                "partial",
                doc(vec![(
                    "a",
                    Value::Array(vec![
                        doc(vec![("b", Value::Int32(1)), ("c", Value::Int32(1))]),
                        doc(vec![("b", Value::Int32(2))]),
                    ]),
                )]),
            ),
            (
                "bare",
                doc(vec![(
                    "a",
                    Value::Array(vec![doc(vec![("b", Value::Int32(3))])]),
                )]),
            ),
        ],
    );
    let query = QueryPredicate::new().with("a.c", PathConstraint::Exists(false));
    assert_eq!(index.find(&query), vec!["bare"]);
}

#[test]
fn wide_decimals_and_doubles_stay_distinct() {
    // 1.00000000000000000001 approximates to the double 1.0; the residual
    // and the inexact-bound recheck keep the two values apart.
    let wide = Value::Decimal128(Decimal128::from_parts(false, -20, 10u128.pow(20) + 1));
    let index = MiniIndex::build(
        ascending(&["n"]),
        vec![
            ("double", doc(vec![("n", Value::Double(1.0))])),
            ("wide", doc(vec![("n", wide.clone())])),
        ],
    );
    let query = QueryPredicate::new().with("n", PathConstraint::Eq(wide));
    assert_eq!(index.find(&query), vec!["wide"]);
    let query = QueryPredicate::new().with("n", PathConstraint::Eq(Value::Double(1.0)));
    assert_eq!(index.find(&query), vec!["double"]);
}

#[test]
fn numeric_widths_match_interchangeably() {
    let index = MiniIndex::build(
        ascending(&["n"]),
        vec![
            ("int", doc(vec![("n", Value::Int32(5))])),
            ("long", doc(vec![("n", Value::Int64(5))])),
            ("double", doc(vec![("n", Value::Double(5.5))])),
        ],
    );
    let query = QueryPredicate::new().with("n", PathConstraint::Eq(Value::Double(5.0)));
    assert_eq!(index.find(&query), vec!["int", "long"]);
    let query = QueryPredicate::new().with("n", PathConstraint::Gt(Value::Int64(5)));
    assert_eq!(index.find(&query), vec!["double"]);
}
