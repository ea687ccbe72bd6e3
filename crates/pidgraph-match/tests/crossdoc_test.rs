use pidgraph_core::document::DiagramLabel;
use pidgraph_core::geom::BoundingBox;
use pidgraph_core::instance::{
    DiagramConnection, InstanceKind, LineInstance, SymbolInstance,
};
use pidgraph_core::merge::MergedGraph;
use pidgraph_match::crossdoc::{MatchOptions, match_graphs};

fn symbol(id: &str, kind: InstanceKind, label_ids: &[&str]) -> SymbolInstance {
    let mut s = SymbolInstance::new(kind, vec![id.to_string()], "template".into());
    s.label_ids = label_ids.iter().map(|l| l.to_string()).collect();
    s
}

fn label(id: &str, text: &str) -> DiagramLabel {
    DiagramLabel {
        id: id.to_string(),
        text: text.to_string(),
        bounding_box: BoundingBox::default(),
    }
}

fn connect(graph: &mut MergedGraph, pairs: &[(&str, &str)]) {
    for (a, b) in pairs {
        graph.connections.push(DiagramConnection::unknown(*a, *b));
    }
}

/// valve - line - instrument("ABC") on both sides.
fn simple_sides() -> (MergedGraph, MergedGraph) {
    let mut pid = MergedGraph::default();
    pid.symbol_instances
        .push(symbol("i1", InstanceKind::Valve, &[]));
    pid.lines.push(LineInstance::new(vec!["i2".to_string()]));
    pid.symbol_instances
        .push(symbol("i3", InstanceKind::Instrument, &["pl1"]));
    pid.labels.push(label("pl1", "ABC"));
    connect(&mut pid, &[("i1", "i2"), ("i2", "i3")]);

    let mut iso = MergedGraph::default();
    iso.symbol_instances
        .push(symbol("p1", InstanceKind::Valve, &[]));
    iso.lines.push(LineInstance::new(vec!["p2".to_string()]));
    iso.symbol_instances
        .push(symbol("p3", InstanceKind::Instrument, &["il1"]));
    iso.labels.push(label("il1", "ABC"));
    connect(&mut iso, &[("p1", "p2"), ("p2", "p3")]);

    (pid, iso)
}

#[test]
fn valve_line_instrument_maps_both_symbols_but_not_the_line() {
    let (pid, iso) = simple_sides();
    let result = match_graphs(&pid, &iso, &MatchOptions::default());

    assert_eq!(result.symbol_mapping.len(), 2);
    assert_eq!(result.symbol_mapping["i1"].iso_instance_id, "p1");
    assert_eq!(result.symbol_mapping["i3"].iso_instance_id, "p3");
    assert!(!result.symbol_mapping.contains_key("i2"));
    assert!(
        result
            .symbol_mapping
            .values()
            .all(|m| m.iso_instance_id != "p2")
    );
}

#[test]
fn shared_label_instruments_become_the_anchor() {
    let (pid, iso) = simple_sides();
    let result = match_graphs(&pid, &iso, &MatchOptions::default());
    assert_eq!(result.anchors.len(), 1);
    assert_eq!(result.anchors[0].pid_instance_id, "i3");
    assert_eq!(result.anchors[0].iso_instance_id, "p3");
}

#[test]
fn an_extra_interposed_symbol_does_not_break_the_correspondence() {
    let (pid, mut iso) = simple_sides();
    // Slip an unmatched reducer between the line and the valve on the iso
    // side; it lengthens the path but must not disqualify the pair.
    iso.connections.retain(|c| !(c.start == "p1" && c.end == "p2"));
    iso.symbol_instances
        .push(symbol("pr", InstanceKind::Reducer, &[]));
    connect(&mut iso, &[("p1", "pr"), ("pr", "p2")]);

    let result = match_graphs(&pid, &iso, &MatchOptions::default());
    assert_eq!(result.symbol_mapping["i1"].iso_instance_id, "p1");
    assert_eq!(result.symbol_mapping["i3"].iso_instance_id, "p3");
    assert!(
        result
            .symbol_mapping
            .values()
            .all(|m| m.iso_instance_id != "pr")
    );
    // The valve pair now carries a non-zero edit distance.
    let valve = &result.symbol_mapping["i1"];
    assert!(valve.distances.iter().any(|&d| d > 0.0));
}

#[test]
fn empty_graphs_yield_empty_collections() {
    let result = match_graphs(
        &MergedGraph::default(),
        &MergedGraph::default(),
        &MatchOptions::default(),
    );
    assert!(result.symbol_mapping.is_empty());
    assert!(result.distances.is_empty());
    assert!(result.anchors.is_empty());
}

#[test]
fn disconnected_instruments_still_anchor_and_match() {
    let mut pid = MergedGraph::default();
    pid.symbol_instances
        .push(symbol("i1", InstanceKind::Instrument, &["pl1"]));
    pid.labels.push(label("pl1", "FT-100"));
    let mut iso = MergedGraph::default();
    iso.symbol_instances
        .push(symbol("p1", InstanceKind::Instrument, &["il1"]));
    iso.labels.push(label("il1", "FT-100"));

    let result = match_graphs(&pid, &iso, &MatchOptions::default());
    assert_eq!(result.symbol_mapping.len(), 1);
    assert_eq!(result.symbol_mapping["i1"].iso_instance_id, "p1");
}

#[test]
fn over_shared_labels_are_dropped_as_anchors() {
    let mut pid = MergedGraph::default();
    pid.symbol_instances
        .push(symbol("i1", InstanceKind::Instrument, &["pl1"]));
    pid.labels.push(label("pl1", "PI-1"));

    let mut iso = MergedGraph::default();
    for n in 0..4 {
        let id = format!("p{n}");
        let label_id = format!("il{n}");
        iso.symbol_instances
            .push(symbol(&id, InstanceKind::Instrument, &[label_id.as_str()]));
        iso.labels.push(label(&label_id, "PI-1"));
    }

    let result = match_graphs(&pid, &iso, &MatchOptions::default());
    // One pid instrument against four identically-labelled iso instruments
    // exceeds the anchor degree cap; everything is dropped as ambiguous.
    assert!(result.anchors.is_empty());
    assert!(result.symbol_mapping.is_empty());
}

#[test]
fn equipment_tags_anchor_by_tag_string() {
    let mut pid = MergedGraph::default();
    pid.symbol_instances
        .push(symbol("e1", InstanceKind::Equipment, &["pl1"]));
    pid.labels.push(label("pl1", "V-101"));
    let mut iso = MergedGraph::default();
    iso.symbol_instances
        .push(symbol("e2", InstanceKind::EquipmentTag, &["il1"]));
    iso.labels.push(label("il1", "V-101"));

    let result = match_graphs(&pid, &iso, &MatchOptions::default());
    assert_eq!(result.anchors.len(), 1);
}

#[test]
fn kind_mismatched_terminals_are_never_assigned() {
    let (pid, mut iso) = simple_sides();
    // Replace the iso valve with a flange; the instrument anchor still
    // holds, but the valve/flange pair must not be committed.
    iso.symbol_instances[0].kind = InstanceKind::Flange;

    let result = match_graphs(&pid, &iso, &MatchOptions::default());
    assert_eq!(result.symbol_mapping.len(), 1);
    assert_eq!(result.symbol_mapping["i3"].iso_instance_id, "p3");
    assert!(!result.symbol_mapping.contains_key("i1"));
}
