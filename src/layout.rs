//! Layout Engine - Dependency Columns
//!
//! Places every variable in a column equal to its alias depth. Output is a
//! pure function of the snapshot: same input, same positions.

use serde::{Deserialize, Serialize};
use std::collections::{btree_set, BTreeMap, BTreeSet};

use crate::model::{CollectionNode, Variable, VariableKey};

/// Canvas geometry. Defaults target a screen canvas; any scale works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub column_width: f64,
    pub node_height: f64,
    pub node_spacing: f64,
    pub column_spacing: f64,
    pub start_x: f64,
    pub start_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_width: 320.0,
            node_height: 160.0,
            node_spacing: 40.0,
            column_spacing: 150.0,
            start_x: 50.0,
            start_y: 50.0,
        }
    }
}

impl LayoutConfig {
    pub fn column_x(&self, column: usize) -> f64 {
        self.start_x + column as f64 * (self.column_width + self.column_spacing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedVariable {
    pub key: VariableKey,
    pub collection_name: String,
    pub variable: Variable,
    pub column: usize,
    pub row: usize,
    pub position: Position,
}

/// An alias edge dropped from layout because it closed a cycle
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleEdge {
    pub from: VariableKey,
    pub to: VariableKey,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub variables: Vec<PositionedVariable>,
    pub column_count: usize,
    #[serde(default)]
    pub cycles: Vec<CycleEdge>,
}

struct GraphNode<'a> {
    collection: &'a CollectionNode,
    variable: &'a Variable,
    dependencies: BTreeSet<VariableKey>,
}

/// Alias graph over every variable in the snapshot. Dangling aliases add no edge.
struct DependencyGraph<'a> {
    nodes: BTreeMap<VariableKey, GraphNode<'a>>,
}

impl<'a> DependencyGraph<'a> {
    fn build(collections: &'a [CollectionNode]) -> Self {
        let mut nodes = BTreeMap::new();
        for collection in collections {
            for variable in &collection.variables {
                nodes.insert(
                    collection.key_for(variable),
                    GraphNode { collection, variable, dependencies: BTreeSet::new() },
                );
            }
        }

        let edges: Vec<(VariableKey, VariableKey)> = nodes
            .iter()
            .flat_map(|(key, node)| {
                node.variable
                    .aliases()
                    .filter_map(move |(_, value)| value.alias_target(&node.collection.id))
                    .map(move |target| (key.clone(), target))
            })
            .filter(|(_, target)| nodes.contains_key(target))
            .collect();

        for (from, to) in edges {
            if let Some(node) = nodes.get_mut(&from) {
                node.dependencies.insert(to);
            }
        }

        Self { nodes }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Finished,
}

/// A node on the explicit DFS stack and the dependencies it has yet to look at.
struct Frame<'g> {
    key: &'g VariableKey,
    pending: Option<btree_set::Iter<'g, VariableKey>>,
    column: usize,
}

/// Depth-first post-order walk assigning columns as nodes finish.
struct ColumnAssigner<'g, 'a> {
    graph: &'g DependencyGraph<'a>,
    marks: BTreeMap<&'g VariableKey, Mark>,
    columns: BTreeMap<&'g VariableKey, usize>,
    cycles: Vec<CycleEdge>,
}

impl<'g, 'a> ColumnAssigner<'g, 'a> {
    fn new(graph: &'g DependencyGraph<'a>) -> Self {
        Self {
            graph,
            marks: BTreeMap::new(),
            columns: BTreeMap::new(),
            cycles: vec![],
        }
    }

    fn run(mut self) -> (BTreeMap<&'g VariableKey, usize>, Vec<CycleEdge>) {
        let graph = self.graph;
        for key in graph.nodes.keys() {
            if !self.marks.contains_key(key) {
                self.visit(key);
            }
        }
        (self.columns, self.cycles)
    }

    fn enter(&mut self, key: &'g VariableKey) -> Frame<'g> {
        self.marks.insert(key, Mark::OnStack);
        let graph = self.graph;
        Frame {
            key,
            pending: graph.nodes.get(key).map(|node| node.dependencies.iter()),
            column: 0,
        }
    }

    fn visit(&mut self, root: &'g VariableKey) {
        let mut stack = vec![self.enter(root)];

        while let Some(frame) = stack.last_mut() {
            let next = frame.pending.as_mut().and_then(Iterator::next);
            let Some(dependency) = next else {
                if let Some(done) = stack.pop() {
                    self.columns.insert(done.key, done.column);
                    self.marks.insert(done.key, Mark::Finished);
                    if let Some(parent) = stack.last_mut() {
                        parent.column = parent.column.max(done.column + 1);
                    }
                }
                continue;
            };

            match self.marks.get(dependency).copied() {
                Some(Mark::OnStack) => {
                    tracing::warn!(from = %frame.key, to = %dependency, "alias cycle; edge ignored for layout");
                    self.cycles.push(CycleEdge { from: frame.key.clone(), to: dependency.clone() });
                }
                Some(Mark::Finished) => {
                    if let Some(&dep_column) = self.columns.get(dependency) {
                        frame.column = frame.column.max(dep_column + 1);
                    }
                }
                None => {
                    let child = self.enter(dependency);
                    stack.push(child);
                }
            }
        }
    }
}

/// Lay out all variables with the default geometry.
pub fn auto_layout_variables(collections: &[CollectionNode]) -> LayoutResult {
    auto_layout_with(collections, &LayoutConfig::default())
}

pub fn auto_layout_with(collections: &[CollectionNode], config: &LayoutConfig) -> LayoutResult {
    let graph = DependencyGraph::build(collections);
    if graph.nodes.is_empty() {
        return LayoutResult::default();
    }

    let (columns, cycles) = ColumnAssigner::new(&graph).run();

    // column -> collection id -> variables
    let mut grouped: BTreeMap<usize, BTreeMap<&str, Vec<(&VariableKey, &GraphNode)>>> = BTreeMap::new();
    for (key, node) in &graph.nodes {
        let column = columns.get(key).copied().unwrap_or(0);
        grouped
            .entry(column)
            .or_default()
            .entry(node.collection.id.as_str())
            .or_default()
            .push((key, node));
    }

    let mut variables = Vec::with_capacity(graph.nodes.len());
    for (&column, groups) in &mut grouped {
        let x = config.column_x(column);
        let mut y = config.start_y;
        let mut row = 0;

        for (group_index, members) in groups.values_mut().enumerate() {
            if group_index > 0 {
                y += config.node_spacing;
            }
            members.sort_by(|a, b| {
                a.1.variable.name
                    .cmp(&b.1.variable.name)
                    .then_with(|| a.0.variable_id.cmp(&b.0.variable_id))
            });

            for (key, node) in members.iter() {
                variables.push(PositionedVariable {
                    key: (*key).clone(),
                    collection_name: node.collection.name.clone(),
                    variable: node.variable.clone(),
                    column,
                    row,
                    position: Position { x, y },
                });
                y += config.node_height + config.node_spacing;
                row += 1;
            }
        }
    }

    let column_count = grouped.keys().next_back().map_or(0, |max| max + 1);
    tracing::debug!(variables = variables.len(), column_count, cycles = cycles.len(), "layout computed");

    LayoutResult { variables, column_count, cycles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Layer, VariableValue};

    fn find<'r>(result: &'r LayoutResult, c: &str, v: &str) -> &'r PositionedVariable {
        result
            .variables
            .iter()
            .find(|p| p.key == VariableKey::new(c, v))
            .unwrap()
    }

    fn three_layers() -> Vec<CollectionNode> {
        vec![
            CollectionNode::new("theme", "Theme", Some(Layer::Theme))
                .with_variable(Variable::new("bg", "Background").with_value("m", VariableValue::alias("sem", "surface"))),
            CollectionNode::new("sem", "Semantic", Some(Layer::Semantic))
                .with_variable(Variable::new("surface", "Surface").with_value("m", VariableValue::alias("prim", "white"))),
            CollectionNode::new("prim", "Primitives", Some(Layer::Primitive))
                .with_variable(Variable::new("white", "White").with_value("m", VariableValue::color("#fff")))
                .with_variable(Variable::new("black", "Black").with_value("m", VariableValue::color("#000"))),
        ]
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(auto_layout_variables(&[]), LayoutResult::default());
        let empty = vec![CollectionNode::new("a", "A", None)];
        let result = auto_layout_variables(&empty);
        assert!(result.variables.is_empty());
        assert_eq!(result.column_count, 0);
    }

    #[test]
    fn test_columns_follow_depth() {
        let result = auto_layout_variables(&three_layers());
        assert_eq!(result.column_count, 3);
        assert_eq!(find(&result, "prim", "white").column, 0);
        assert_eq!(find(&result, "prim", "black").column, 0);
        assert_eq!(find(&result, "sem", "surface").column, 1);
        assert_eq!(find(&result, "theme", "bg").column, 2);
        assert_eq!(find(&result, "theme", "bg").position.x, 50.0 + 2.0 * 470.0);
    }

    #[test]
    fn test_names_sorted_within_collection() {
        let result = auto_layout_variables(&three_layers());
        let black = find(&result, "prim", "black");
        let white = find(&result, "prim", "white");
        assert_eq!((black.row, black.position.y), (0, 50.0));
        assert_eq!((white.row, white.position.y), (1, 250.0));
    }

    #[test]
    fn test_group_gap_between_collections() {
        let collections = vec![
            CollectionNode::new("b", "B", None).with_variable(Variable::new("x", "X")),
            CollectionNode::new("a", "A", None).with_variable(Variable::new("y", "Y")),
        ];
        let result = auto_layout_variables(&collections);
        // "a" sorts before "b" regardless of input order
        assert_eq!(find(&result, "a", "y").position.y, 50.0);
        assert_eq!(find(&result, "b", "x").position.y, 50.0 + 200.0 + 40.0);
    }

    #[test]
    fn test_dangling_alias_has_no_edge() {
        let collections = vec![CollectionNode::new("a", "A", None)
            .with_variable(Variable::new("x", "X").with_value("m", VariableValue::alias("zz", "q")))];
        let result = auto_layout_variables(&collections);
        assert_eq!(find(&result, "a", "x").column, 0);
        assert_eq!(result.column_count, 1);
    }

    #[test]
    fn test_cycle_terminates_and_is_reported() {
        let collections = vec![CollectionNode::new("c", "C", None)
            .with_variable(Variable::new("a", "A").with_value("m", VariableValue::local_alias("b")))
            .with_variable(Variable::new("b", "B").with_value("m", VariableValue::local_alias("a")))
            .with_variable(Variable::new("d", "D").with_value("m", VariableValue::local_alias("a")))];
        let result = auto_layout_variables(&collections);
        assert_eq!(result.variables.len(), 3);
        assert_eq!(result.cycles, vec![CycleEdge {
            from: VariableKey::new("c", "b"),
            to: VariableKey::new("c", "a"),
        }]);
        // a -> b kept, b -> a dropped
        assert_eq!(find(&result, "c", "b").column, 0);
        assert_eq!(find(&result, "c", "a").column, 1);
        assert_eq!(find(&result, "c", "d").column, 2);
    }

    #[test]
    fn test_deep_chain_does_not_exhaust_stack() {
        let depth = 20_000;
        let mut collection = CollectionNode::new("c", "Chain", None);
        for i in 0..depth {
            let mut variable = Variable::new(format!("v{:05}", i), format!("V{}", i));
            if i + 1 < depth {
                variable = variable.with_value("m", VariableValue::local_alias(format!("v{:05}", i + 1)));
            }
            collection = collection.with_variable(variable);
        }

        let result = auto_layout_variables(&[collection]);
        assert_eq!(result.variables.len(), depth);
        assert_eq!(result.column_count, depth);
        assert!(result.cycles.is_empty());
        assert_eq!(find(&result, "c", "v00000").column, depth - 1);
        assert_eq!(find(&result, "c", "v19999").column, 0);
    }

    #[test]
    fn test_deep_cycle_is_broken_once() {
        let depth = 20_000;
        let mut collection = CollectionNode::new("c", "Ring", None);
        for i in 0..depth {
            let next = format!("v{:05}", (i + 1) % depth);
            collection = collection.with_variable(
                Variable::new(format!("v{:05}", i), format!("V{}", i)).with_value("m", VariableValue::local_alias(next)),
            );
        }

        let result = auto_layout_variables(&[collection]);
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].to, VariableKey::new("c", "v00000"));
        assert_eq!(result.column_count, depth);
    }

    #[test]
    fn test_custom_geometry() {
        let config = LayoutConfig { column_width: 10.0, column_spacing: 0.0, start_x: 0.0, ..LayoutConfig::default() };
        let result = auto_layout_with(&three_layers(), &config);
        assert_eq!(find(&result, "theme", "bg").position.x, 20.0);
    }

    #[test]
    fn test_config_partial_json() {
        let config: LayoutConfig = serde_json::from_str(r#"{"nodeHeight": 80}"#).unwrap();
        assert_eq!(config.node_height, 80.0);
        assert_eq!(config.column_width, 320.0);
    }
}
