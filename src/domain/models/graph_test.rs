use test_utils::graph_fixture;

use super::Edge;
use super::Graph;
use super::GraphError;
use super::NodeRole;
use crate::domain::services::decode_embedded;

fn fixture() -> Graph {
    return decode_embedded::<Graph>(graph_fixture()).unwrap();
}

#[test]
fn it_accepts_the_fixture_graph() {
    let graph = fixture();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.nodes[0].data.role, NodeRole::Input);
    assert_eq!(graph.nodes[0].data.color, Some("#4f46e5".to_string()));
    assert!(graph.edges[0].animated);
    assert_eq!(graph.validate(), Ok(()));
}

#[test]
fn it_rejects_dangling_source_handles() {
    let mut graph = fixture();
    graph.edges[0].source_handle = "output-3".to_string();

    let err = graph.validate().unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"edge 'read_file-transform' uses handle 'output-3' which node 'read_file' does not declare");
}

#[test]
fn it_rejects_dangling_target_handles() {
    let mut graph = fixture();
    graph.edges[0].target_handle = "input-1".to_string();

    assert!(matches!(
        graph.validate(),
        Err(GraphError::DanglingHandle { .. })
    ));
}

#[test]
fn it_rejects_edges_to_unknown_nodes() {
    let mut graph = fixture();
    graph.edges.push(Edge {
        id: "ghost".to_string(),
        source: "read_file".to_string(),
        target: "missing".to_string(),
        source_handle: "output-0".to_string(),
        target_handle: "input-0".to_string(),
        animated: false,
    });

    assert_eq!(
        graph.validate(),
        Err(GraphError::UnknownNode {
            edge: "ghost".to_string(),
            node: "missing".to_string(),
        })
    );
}

#[test]
fn it_rejects_non_contiguous_handles() {
    let mut graph = fixture();
    graph.nodes[0].data.outputs = vec!["output-1".to_string()];

    assert!(matches!(
        graph.validate(),
        Err(GraphError::MisnumberedHandle { .. })
    ));
}

#[test]
fn it_enforces_role_constraints() {
    let mut graph = fixture();
    graph.nodes[0].data.inputs = vec!["input-0".to_string()];
    assert_eq!(
        graph.validate(),
        Err(GraphError::InputWithInputs("read_file".to_string()))
    );

    let mut graph = fixture();
    graph.nodes[1].data.outputs = vec!["output-0".to_string()];
    assert_eq!(
        graph.validate(),
        Err(GraphError::OutputWithOutputs("transform".to_string()))
    );
}

#[test]
fn it_rejects_duplicate_node_ids() {
    let mut graph = fixture();
    let copy = graph.nodes[0].clone();
    graph.nodes.push(copy);

    assert_eq!(
        graph.validate(),
        Err(GraphError::DuplicateNode("read_file".to_string()))
    );
}

#[test]
fn it_serializes_with_ui_field_names() {
    let json = serde_json::to_value(fixture()).unwrap();
    assert_eq!(json["nodes"][0]["type"], "custom");
    assert_eq!(json["edges"][0]["sourceHandle"], "output-0");
    assert_eq!(json["edges"][0]["targetHandle"], "input-0");
    assert!(json["nodes"][1]["data"].get("color").is_none());
}
