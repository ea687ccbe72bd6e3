use pidgraph_core::document::{DiagramKind, DiagramPath, GraphDocument, PathRegistry, PathStyle};
use pidgraph_core::error::Error;
use pidgraph_core::geom::BoundingBox;
use pidgraph_core::instance::{DiagramConnection, InstanceKind, LineInstance, SymbolInstance};

fn symbol(kind: InstanceKind, path_id: &str) -> SymbolInstance {
    SymbolInstance::new(kind, vec![path_id.to_string()], "template".into())
}

fn empty_doc() -> GraphDocument {
    GraphDocument::new(
        DiagramKind::Iso,
        "0001.svg",
        BoundingBox::new(0.0, 0.0, 100.0, 100.0),
    )
}

#[test]
fn pruning_drops_connections_with_missing_endpoints() {
    let mut doc = empty_doc();
    doc.symbol_instances.push(symbol(InstanceKind::Valve, "p1"));
    doc.lines.push(LineInstance::new(vec!["p2".into()]));
    doc.connections.push(DiagramConnection::unknown("p1", "p2"));
    doc.connections
        .push(DiagramConnection::unknown("p1", "ghost"));
    let pruned = doc.prune_dangling_connections();
    assert_eq!(pruned, 1);
    assert_eq!(doc.connections.len(), 1);
    assert_eq!(doc.connections[0].end, "p2");
}

#[test]
fn line_numbers_propagate_through_unlabelled_instances() {
    // valve(p1) - line(p2) - line break(p3) - line(p4) - valve(p5)
    let mut doc = empty_doc();
    let mut valve = symbol(InstanceKind::Valve, "p1");
    valve.line_numbers.push("L001".into());
    doc.symbol_instances.push(valve);
    doc.lines.push(LineInstance::new(vec!["p2".into()]));
    doc.symbol_instances
        .push(symbol(InstanceKind::LineBreak, "p3"));
    doc.lines.push(LineInstance::new(vec!["p4".into()]));
    doc.symbol_instances.push(symbol(InstanceKind::Valve, "p5"));
    for (a, b) in [("p1", "p2"), ("p2", "p3"), ("p3", "p4"), ("p4", "p5")] {
        doc.connections.push(DiagramConnection::unknown(a, b));
    }

    doc.infer_line_numbers();

    let line = doc.lines.iter().find(|l| l.id == "p2").unwrap();
    assert_eq!(line.inferred_line_numbers, vec!["L001".to_string()]);
    // The break absorbs the number but does not pass it on.
    let brk = doc
        .symbol_instances
        .iter()
        .find(|s| s.kind == InstanceKind::LineBreak)
        .unwrap();
    assert_eq!(brk.inferred_line_numbers, vec!["L001".to_string()]);
    let far_line = doc.lines.iter().find(|l| l.id == "p4").unwrap();
    assert!(far_line.inferred_line_numbers.is_empty());
}

#[test]
fn inference_is_recomputed_from_scratch() {
    let mut doc = empty_doc();
    let mut valve = symbol(InstanceKind::Valve, "p1");
    valve.line_numbers.push("L001".into());
    doc.symbol_instances.push(valve);
    let mut line = LineInstance::new(vec!["p2".into()]);
    line.inferred_line_numbers.push("STALE".into());
    doc.lines.push(line);
    doc.connections.push(DiagramConnection::unknown("p1", "p2"));

    doc.infer_line_numbers();
    assert_eq!(
        doc.lines[0].inferred_line_numbers,
        vec!["L001".to_string()]
    );
}

#[test]
fn registry_rejects_unknown_path_ids() {
    let mut registry = PathRegistry::new();
    registry.insert(DiagramPath::from_commands(
        "p1",
        "M 0 0 L 10 0",
        PathStyle::default(),
    ));
    let err = registry
        .instance_segments(&["p1".to_string(), "nope".to_string()])
        .unwrap_err();
    match err {
        Error::UnknownPathId { id } => assert_eq!(id, "nope"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn graph_document_json_round_trips() {
    let mut doc = empty_doc();
    doc.symbol_instances.push(symbol(InstanceKind::Valve, "p1"));
    doc.connections.push(DiagramConnection::unknown("p1", "p1"));
    let json = doc.to_json().unwrap();
    assert!(json.contains("\"type\": \"iso\""));
    assert!(json.contains("\"symbolInstances\""));
    let back = GraphDocument::from_json(&json).unwrap();
    assert_eq!(back, doc);
}
