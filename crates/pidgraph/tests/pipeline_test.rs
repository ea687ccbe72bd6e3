use pidgraph::core::document::DiagramLabel;
use pidgraph::core::geom::BoundingBox;
use pidgraph::core::instance::{DiagramConnection, InstanceKind, LineInstance, SymbolInstance};
use pidgraph::{DiagramKind, GraphDocument, MatchOptions, match_documents};

fn document(kind: DiagramKind, name: &str, prefix: &str, label_text: &str) -> GraphDocument {
    let mut doc = GraphDocument::new(kind, name, BoundingBox::new(0.0, 0.0, 500.0, 500.0));
    let valve = SymbolInstance::new(
        InstanceKind::Valve,
        vec![format!("{prefix}1")],
        "valve-template".into(),
    );
    let line = LineInstance::new(vec![format!("{prefix}2")]);
    let mut instrument = SymbolInstance::new(
        InstanceKind::Instrument,
        vec![format!("{prefix}3")],
        "instrument-template".into(),
    );
    instrument.label_ids.push(format!("{prefix}l"));
    doc.labels.push(DiagramLabel {
        id: format!("{prefix}l"),
        text: label_text.to_string(),
        bounding_box: BoundingBox::default(),
    });
    doc.connections
        .push(DiagramConnection::unknown(&valve.id, &line.id));
    doc.connections
        .push(DiagramConnection::unknown(&line.id, &instrument.id));
    // A dangling connection the pipeline must prune before matching.
    doc.connections
        .push(DiagramConnection::unknown(&valve.id, "ghost"));
    doc.symbol_instances.push(valve);
    doc.lines.push(line);
    doc.symbol_instances.push(instrument);
    doc
}

#[test]
fn end_to_end_match_uses_global_ids() {
    let pid = document(DiagramKind::PId, "pid-01.svg", "a", "FT-200");
    let iso = document(DiagramKind::Iso, "iso-01.svg", "b", "FT-200");

    let result = match_documents(
        std::slice::from_ref(&pid),
        std::slice::from_ref(&iso),
        &MatchOptions::default(),
    );

    assert_eq!(result.symbol_mapping.len(), 2);
    assert_eq!(
        result.symbol_mapping["pid-01.svg::a1"].iso_instance_id,
        "iso-01.svg::b1"
    );
    assert_eq!(
        result.symbol_mapping["pid-01.svg::a3"].iso_instance_id,
        "iso-01.svg::b3"
    );
}

#[test]
fn inputs_are_never_mutated_by_a_match_run() {
    let pid = document(DiagramKind::PId, "pid-01.svg", "a", "FT-200");
    let iso = document(DiagramKind::Iso, "iso-01.svg", "b", "FT-200");
    let pid_before = pid.clone();
    let iso_before = iso.clone();

    let _ = match_documents(
        std::slice::from_ref(&pid),
        std::slice::from_ref(&iso),
        &MatchOptions::default(),
    );

    assert_eq!(pid, pid_before);
    assert_eq!(iso, iso_before);
}

#[test]
fn symbol_connections_resolve_file_and_local_ids() {
    let pid = document(DiagramKind::PId, "pid-01.svg", "a", "FT-200");
    let iso = document(DiagramKind::Iso, "iso-01.svg", "b", "FT-200");
    let result = match_documents(
        std::slice::from_ref(&pid),
        std::slice::from_ref(&iso),
        &MatchOptions::default(),
    );

    let links = result.symbol_connections();
    assert_eq!(links.len(), 2);
    for link in &links {
        assert_eq!(link.from.file_name, "pid-01.svg");
        assert_eq!(link.to.file_name, "iso-01.svg");
        assert!(!link.from.instance_id.contains("::"));
    }
}

#[test]
fn mapping_json_contains_ids_and_distances_only() {
    let pid = document(DiagramKind::PId, "pid-01.svg", "a", "FT-200");
    let iso = document(DiagramKind::Iso, "iso-01.svg", "b", "FT-200");
    let result = match_documents(
        std::slice::from_ref(&pid),
        std::slice::from_ref(&iso),
        &MatchOptions::default(),
    );

    let json = result.symbol_mapping_json();
    let entry = &json["pid-01.svg::a1"];
    assert_eq!(entry["isoInstanceId"], "iso-01.svg::b1");
    assert!(entry["distances"].is_array());
}

#[test]
fn two_pid_pages_merge_into_one_matching_space() {
    let pid_a = document(DiagramKind::PId, "pid-01.svg", "a", "FT-200");
    let pid_b = document(DiagramKind::PId, "pid-02.svg", "c", "FT-300");
    let mut iso = document(DiagramKind::Iso, "iso-01.svg", "b", "FT-200");

    // Second iso branch matching the second pid page.
    let mut other = document(DiagramKind::Iso, "iso-02.svg", "d", "FT-300");
    iso.symbol_instances.append(&mut other.symbol_instances);
    iso.lines.append(&mut other.lines);
    iso.labels.append(&mut other.labels);
    iso.connections.append(&mut other.connections);

    let result = match_documents(
        &[pid_a, pid_b],
        std::slice::from_ref(&iso),
        &MatchOptions::default(),
    );
    assert_eq!(result.symbol_mapping.len(), 4);
    assert_eq!(
        result.symbol_mapping["pid-02.svg::c1"].iso_instance_id,
        "iso-01.svg::d1"
    );
}
