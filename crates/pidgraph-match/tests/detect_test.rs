use pidgraph_core::document::{DiagramKind, DiagramPath, PathRegistry, PathStyle};
use pidgraph_core::instance::{InstanceKind, SymbolInstance, connection_exists};
use pidgraph_match::detect::{DetectorOptions, detect_lines_and_connections};

fn stroked() -> PathStyle {
    PathStyle {
        stroke: Some("#000000".to_string()),
        fill: None,
    }
}

fn registry(paths: &[(&str, &str)]) -> PathRegistry {
    let mut registry = PathRegistry::new();
    for (id, commands) in paths {
        registry.insert(DiagramPath::from_commands(*id, commands, stroked()));
    }
    registry
}

fn symbol(path_id: &str) -> SymbolInstance {
    SymbolInstance::new(
        InstanceKind::Valve,
        vec![path_id.to_string()],
        "valve-template".into(),
    )
}

#[test]
fn symbol_line_symbol_yields_one_connection_per_adjacency() {
    let registry = registry(&[
        ("p1", "M 0 0 L 10 0"),
        ("p2", "M 12 0 L 48 0"),
        ("p3", "M 50 0 L 60 0"),
    ]);
    let symbols = vec![symbol("p1"), symbol("p3")];
    let result = detect_lines_and_connections(
        &registry,
        &symbols,
        &[],
        &["p2".to_string()],
        &DetectorOptions::for_kind(DiagramKind::PId),
    )
    .unwrap();

    assert_eq!(result.line_instances.len(), 1);
    assert_eq!(result.line_instances[0].id, "p2");
    assert_eq!(result.connections.len(), 2);
    for c in &result.connections {
        // No duplicated or reversed edges.
        let duplicates = result
            .connections
            .iter()
            .filter(|other| c.is_same_pair(other))
            .count();
        assert_eq!(duplicates, 1);
    }
    assert!(connection_exists(
        &result.connections,
        &pidgraph_core::instance::DiagramConnection::unknown("p1", "p2")
    ));
    assert!(connection_exists(
        &result.connections,
        &pidgraph_core::instance::DiagramConnection::unknown("p2", "p3")
    ));
}

#[test]
fn dead_end_chains_are_discarded() {
    let registry = registry(&[
        ("p1", "M 0 0 L 10 0"),
        // Touches the symbol but leads nowhere.
        ("stub", "M 12 0 L 40 0"),
    ]);
    let symbols = vec![symbol("p1")];
    let result = detect_lines_and_connections(
        &registry,
        &symbols,
        &[],
        &["stub".to_string()],
        &DetectorOptions::for_kind(DiagramKind::PId),
    )
    .unwrap();

    assert!(result.line_instances.is_empty());
    assert!(result.connections.is_empty());
}

#[test]
fn iso_mode_rejects_curved_line_candidates() {
    let registry = registry(&[
        ("p1", "M 0 0 L 10 0"),
        ("curve", "M 12 0 C 20 5 30 5 48 0"),
        ("p3", "M 50 0 L 60 0"),
    ]);
    let symbols = vec![symbol("p1"), symbol("p3")];
    let result = detect_lines_and_connections(
        &registry,
        &symbols,
        &[],
        &["curve".to_string()],
        &DetectorOptions::for_kind(DiagramKind::Iso),
    )
    .unwrap();

    assert!(result.line_instances.is_empty());
    assert!(result.connections.is_empty());
}

#[test]
fn pid_mode_requires_a_visible_stroke() {
    let mut registry = registry(&[("p1", "M 0 0 L 10 0"), ("p3", "M 50 0 L 60 0")]);
    registry.insert(DiagramPath::from_commands(
        "invisible",
        "M 12 0 L 48 0",
        PathStyle {
            stroke: Some("none".to_string()),
            fill: None,
        },
    ));
    let symbols = vec![symbol("p1"), symbol("p3")];
    let result = detect_lines_and_connections(
        &registry,
        &symbols,
        &[],
        &["invisible".to_string()],
        &DetectorOptions::for_kind(DiagramKind::PId),
    )
    .unwrap();

    assert!(result.line_instances.is_empty());
    assert!(result.connections.is_empty());
}

#[test]
fn collinear_gap_is_bridged_by_a_line_jump() {
    // Two collinear strokes with an 8-unit gap: beyond plain proximity (5)
    // but within the jump threshold (10).
    let registry = registry(&[
        ("p1", "M 0 0 L 10 0"),
        ("a", "M 12 0 L 30 0"),
        ("b", "M 38 0 L 56 0"),
        ("p3", "M 58 0 L 68 0"),
    ]);
    let symbols = vec![symbol("p1"), symbol("p3")];
    let result = detect_lines_and_connections(
        &registry,
        &symbols,
        &[],
        &["a".to_string(), "b".to_string()],
        &DetectorOptions::for_kind(DiagramKind::PId),
    )
    .unwrap();

    assert_eq!(result.line_instances.len(), 2);
    assert_eq!(result.connections.len(), 3);
    assert!(connection_exists(
        &result.connections,
        &pidgraph_core::instance::DiagramConnection::unknown("a", "b")
    ));
}

#[test]
fn perpendicular_gap_is_not_a_jump() {
    let registry = registry(&[
        ("p1", "M 0 0 L 10 0"),
        ("a", "M 12 0 L 30 0"),
        // Same gap, but perpendicular: not collinear, so no jump.
        ("b", "M 38 0 L 38 18"),
    ]);
    let symbols = vec![symbol("p1")];
    let result = detect_lines_and_connections(
        &registry,
        &symbols,
        &[],
        &["a".to_string(), "b".to_string()],
        &DetectorOptions::for_kind(DiagramKind::PId),
    )
    .unwrap();

    assert!(!connection_exists(
        &result.connections,
        &pidgraph_core::instance::DiagramConnection::unknown("a", "b")
    ));
}

#[test]
fn unknown_symbol_path_id_is_a_typed_error() {
    let registry = registry(&[("p1", "M 0 0 L 10 0")]);
    let symbols = vec![symbol("ghost")];
    let err = detect_lines_and_connections(
        &registry,
        &symbols,
        &[],
        &[],
        &DetectorOptions::for_kind(DiagramKind::PId),
    )
    .unwrap_err();
    match err {
        pidgraph_core::Error::UnknownPathId { id } => assert_eq!(id, "ghost"),
        other => panic!("unexpected error: {other}"),
    }
}
