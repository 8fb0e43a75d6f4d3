//! End-to-end tests for the reconstruction and aggregation pipeline over
//! in-memory data.

use chrono::NaiveDateTime;

use lifecycle::graph::{DocumentGraph, DocumentRecord, DocumentRelation, Stage};
use lifecycle::report::aggregate_customers;

fn stage(type_id: i32, name: &str) -> Stage {
    Stage {
        type_id,
        type_name: name.to_string(),
        column_label: name.to_string(),
        type_hex_color: None,
        type_operation: None,
        type_sort_number: Some(type_id),
    }
}

fn quote_order_invoice() -> Vec<Stage> {
    vec![stage(1, "Quote"), stage(2, "Order"), stage(3, "Invoice")]
}

fn doc(id: i32, stage_type_id: i32, customer_id: Option<i32>, date: Option<&str>) -> DocumentRecord {
    DocumentRecord {
        id,
        number: Some(format!("N-{}", id)),
        stage_type_id,
        customer_id,
        customer_name: customer_id.map(|c| format!("Customer {}", c)),
        supplier_id: None,
        supplier_name: None,
        created_at: date
            .map(|raw| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()),
        is_primary: true,
    }
}

fn rel(source_id: i32, target_id: i32) -> DocumentRelation {
    DocumentRelation {
        source_id,
        target_id,
        relation_type_id: None,
    }
}

#[test]
fn full_chain_builds_one_cycle_per_customer() {
    let graph = DocumentGraph::from_parts(
        quote_order_invoice(),
        vec![
            doc(100, 1, Some(5), Some("2024-03-01 09:00:00")),
            doc(200, 2, Some(5), Some("2024-03-02 09:00:00")),
            doc(300, 3, Some(5), Some("2024-03-03 09:00:00")),
        ],
        &[rel(100, 200), rel(200, 300)],
    );

    let paths = graph.reconstruct_paths();
    let groups = aggregate_customers(&graph, &paths);

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].customer_id, Some(5));
    assert_eq!(groups[0].cycles.len(), 1);

    let cycle = &groups[0].cycles[0];
    assert_eq!(cycle.cycle_id, "100-200-300");
    assert_eq!(cycle.documents_count, 3);

    let ids: Vec<Option<i32>> = cycle.documents.iter().map(|c| c.invoice_id).collect();
    assert_eq!(ids, vec![Some(100), Some(200), Some(300)]);

    // The conversion chain follows the path itself.
    assert_eq!(cycle.documents[1].converted_from_invoice_id, Some(100));
    assert_eq!(cycle.documents[1].converted_to_invoice_id, Some(300));
}

#[test]
fn branching_conversion_yields_two_cycles() {
    let graph = DocumentGraph::from_parts(
        quote_order_invoice(),
        vec![
            doc(100, 1, Some(5), None),
            doc(200, 2, Some(5), None),
            doc(201, 2, Some(5), None),
        ],
        &[rel(100, 200), rel(100, 201)],
    );

    let paths = graph.reconstruct_paths();
    let groups = aggregate_customers(&graph, &paths);

    assert_eq!(groups.len(), 1);
    let mut cycle_ids: Vec<&str> = groups[0]
        .cycles
        .iter()
        .map(|c| c.cycle_id.as_str())
        .collect();
    cycle_ids.sort();
    assert_eq!(cycle_ids, vec!["100-200-0", "100-201-0"]);

    for cycle in &groups[0].cycles {
        assert_eq!(cycle.documents[0].invoice_id, Some(100));
        assert_eq!(cycle.documents[2].invoice_id, None);
    }
}

#[test]
fn independent_roots_split_into_customer_groups() {
    let graph = DocumentGraph::from_parts(
        quote_order_invoice(),
        vec![
            doc(100, 1, Some(5), None),
            doc(200, 2, Some(5), None),
            doc(110, 1, Some(6), None),
            doc(210, 2, Some(6), None),
        ],
        &[rel(100, 200), rel(110, 210)],
    );

    let paths = graph.reconstruct_paths();
    let groups = aggregate_customers(&graph, &paths);

    assert_eq!(groups.len(), 2);
    for group in &groups {
        assert_eq!(group.cycles.len(), 1);
        assert_eq!(group.total_documents, 2);
    }
}

#[test]
fn no_relations_degrade_to_singleton_cycles() {
    let documents: Vec<DocumentRecord> = (0..6)
        .map(|i| doc(100 + i, 1 + (i % 3), Some(5), None))
        .collect();
    let graph = DocumentGraph::from_parts(quote_order_invoice(), documents, &[]);

    let paths = graph.reconstruct_paths();
    assert_eq!(paths.len(), 6);
    for path in &paths {
        let filled = path.slots().iter().flatten().count();
        assert_eq!(filled, 1);
    }

    let groups = aggregate_customers(&graph, &paths);
    assert_eq!(groups[0].cycles.len(), 6);
    assert_eq!(groups[0].total_documents, 6);
}

#[test]
fn every_adjacent_pair_is_backed_by_an_edge() {
    let relations = vec![
        rel(100, 200),
        rel(100, 201),
        rel(200, 300),
        rel(201, 300),
        rel(100, 300),
        rel(300, 100),
    ];
    let graph = DocumentGraph::from_parts(
        quote_order_invoice(),
        vec![
            doc(100, 1, Some(5), None),
            doc(200, 2, Some(5), None),
            doc(201, 2, Some(5), None),
            doc(300, 3, Some(5), None),
        ],
        &relations,
    );

    for path in graph.reconstruct_paths() {
        let slots = path.slots();
        for window in slots.windows(2) {
            if let (Some(a), Some(b)) = (window[0], window[1]) {
                assert!(
                    relations
                        .iter()
                        .any(|r| r.source_id == a && r.target_id == b),
                    "path step {} -> {} has no backing relation",
                    a,
                    b
                );
            }
        }
    }
}

#[test]
fn output_is_stable_under_input_permutation() {
    let documents = || {
        vec![
            doc(100, 1, Some(5), Some("2024-03-01 09:00:00")),
            doc(200, 2, Some(5), Some("2024-03-02 09:00:00")),
            doc(201, 2, Some(5), Some("2024-03-04 09:00:00")),
            doc(110, 1, Some(6), Some("2024-03-03 09:00:00")),
        ]
    };
    let relations = vec![rel(100, 200), rel(100, 201)];
    let permuted = vec![rel(100, 201), rel(100, 200)];

    let graph_a = DocumentGraph::from_parts(quote_order_invoice(), documents(), &relations);
    let graph_b = DocumentGraph::from_parts(quote_order_invoice(), documents(), &permuted);

    let groups_a = aggregate_customers(&graph_a, &graph_a.reconstruct_paths());
    let groups_b = aggregate_customers(&graph_b, &graph_b.reconstruct_paths());

    let shape = |groups: &[lifecycle::report::CustomerGroup]| {
        groups
            .iter()
            .map(|g| {
                (
                    g.customer_id,
                    g.cycles
                        .iter()
                        .map(|c| c.cycle_id.clone())
                        .collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&groups_a), shape(&groups_b));
}

#[test]
fn duplicate_paths_collapse_to_one_cycle() {
    // Two parallel raw relations describe the same conversion; the path
    // tuple is identical and must appear once.
    let graph = DocumentGraph::from_parts(
        quote_order_invoice(),
        vec![doc(100, 1, Some(5), None), doc(200, 2, Some(5), None)],
        &[
            DocumentRelation {
                source_id: 100,
                target_id: 200,
                relation_type_id: Some(1),
            },
            DocumentRelation {
                source_id: 100,
                target_id: 200,
                relation_type_id: Some(2),
            },
        ],
    );

    let paths = graph.reconstruct_paths();
    assert_eq!(paths.len(), 1);

    let groups = aggregate_customers(&graph, &paths);
    assert_eq!(groups[0].cycles.len(), 1);
}
