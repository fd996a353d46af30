use std::cmp::Reverse;
use std::collections::BinaryHeap;

use hashbrown::HashMap;

use crate::error::VmError;
use crate::program::NodeSpec;

/// Node indices in dependency order. Among ready nodes the one declared
/// first runs first.
pub fn topo_order(event: &str, nodes: &[NodeSpec]) -> Result<Vec<usize>, VmError> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index_of.insert(node.id.as_str(), i).is_some() {
            return Err(VmError::DuplicateNode(node.id.clone()));
        }
    }

    let mut indeg = vec![0usize; nodes.len()];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for (input, conn) in &node.inputs {
            let Some(&src) = index_of.get(conn.node_id.as_str()) else {
                return Err(VmError::UnknownInputNode {
                    node: node.id.clone(),
                    input: input.clone(),
                    source_node: conn.node_id.clone(),
                });
            };
            adj[src].push(i);
            indeg[i] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indeg
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(u)) = ready.pop() {
        order.push(u);
        for &v in &adj[u] {
            indeg[v] -= 1;
            if indeg[v] == 0 {
                ready.push(Reverse(v));
            }
        }
    }

    if order.len() != nodes.len() {
        return Err(VmError::Cycle {
            event: event.to_string(),
        });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{GraphSpec, InputConnection, UnitKind};

    fn node(id: &str, inputs: &[&str]) -> NodeSpec {
        NodeSpec {
            id: id.into(),
            kind: UnitKind::Constant,
            params: Default::default(),
            inputs: inputs
                .iter()
                .enumerate()
                .map(|(i, src)| {
                    (
                        format!("in{i}"),
                        InputConnection {
                            node_id: src.to_string(),
                            output_key: "out".into(),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn ties_follow_declaration_order() {
        let g = GraphSpec {
            nodes: vec![node("c", &["b"]), node("a", &[]), node("b", &[]), node("d", &[])],
        };
        let order = topo_order("Forward", &g.nodes).unwrap();
        assert_eq!(order, vec![1, 2, 0, 3]);
    }

    #[test]
    fn cycles_and_dangling_inputs_fail() {
        let cyclic = vec![node("a", &["b"]), node("b", &["a"])];
        assert!(matches!(topo_order("Forward", &cyclic), Err(VmError::Cycle { .. })));
        let dangling = vec![node("a", &["ghost"])];
        assert!(matches!(
            topo_order("Forward", &dangling),
            Err(VmError::UnknownInputNode { .. })
        ));
        let dup = vec![node("a", &[]), node("a", &[])];
        assert!(matches!(topo_order("Forward", &dup), Err(VmError::DuplicateNode(_))));
    }
}
