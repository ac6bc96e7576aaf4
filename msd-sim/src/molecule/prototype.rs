use serde::{Deserialize, Serialize};

use crate::energy::Coupling;
use crate::error::{MsdError, MsdResult};
use crate::vector::DVec3;

/// Per-node constants of a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeParameters {
    /// Spin magnitude.
    #[serde(rename = "Sm")]
    pub sm: f64,
    /// Flux bound.
    #[serde(rename = "Fm")]
    pub fm: f64,
    #[serde(rename = "Je0m")]
    pub je0m: f64,
    #[serde(rename = "Am")]
    pub am: DVec3,
}

impl Default for NodeParameters {
    fn default() -> Self {
        Self {
            sm: 1.0,
            fm: 0.0,
            je0m: 0.0,
            am: DVec3::ZERO,
        }
    }
}

/// Per-edge constants of a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeParameters {
    #[serde(rename = "Jm")]
    pub jm: f64,
    #[serde(rename = "Je1m")]
    pub je1m: f64,
    #[serde(rename = "Jeem")]
    pub jeem: f64,
    #[serde(rename = "bm")]
    pub bm: f64,
    #[serde(rename = "Dm")]
    pub dm: DVec3,
}

impl Default for EdgeParameters {
    fn default() -> Self {
        Self {
            jm: 1.0,
            je1m: 0.0,
            jeem: 0.0,
            bm: 0.0,
            dm: DVec3::ZERO,
        }
    }
}

impl EdgeParameters {
    pub fn coupling(&self) -> Coupling {
        Coupling {
            j: self.jm,
            je1: self.je1m,
            jee: self.jeem,
            b: self.bm,
            d: self.dm,
        }
    }
}

/// Orientation of an adjacency entry relative to the edge it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// The owning node is the edge's source.
    Forward,
    /// The owning node is the edge's destination.
    Backward,
    /// Self-loop.
    Loop,
}

impl Direction {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
            Self::Loop => 0.0,
        }
    }

    pub fn from_sign(sign: f64) -> Option<Self> {
        if sign == 1.0 {
            Some(Self::Forward)
        } else if sign == -1.0 {
            Some(Self::Backward)
        } else if sign == 0.0 {
            Some(Self::Loop)
        } else {
            None
        }
    }
}

/// One adjacency entry: the edge `edge_index` seen from `self_index`,
/// leading to `node_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub edge_index: usize,
    pub self_index: usize,
    pub node_index: usize,
    pub direction: Direction,
}

impl Edge {
    pub fn is_loop(&self) -> bool {
        self.direction == Direction::Loop
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub(crate) parameters: NodeParameters,
    pub(crate) neighbors: Vec<Edge>,
}

/// An edge listed once with both endpoints, for display and export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeView {
    pub index: usize,
    pub src: usize,
    pub dst: usize,
    /// Sign of the source-side entry: `1` for an ordinary edge, `0` for a loop.
    pub direction: f64,
    pub parameters: EdgeParameters,
}

/// Reusable molecule topology: nodes, parameterized edges and two lead nodes.
///
/// Every non-loop edge is referenced from both endpoints' adjacency lists
/// with opposite [`Direction`]s; a self-loop appears once. Instances bound to
/// lattice columns share one prototype and only own per-node state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MolProto {
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<EdgeParameters>,
    pub(crate) left_lead: usize,
    pub(crate) right_lead: usize,
}

impl MolProto {
    pub fn new() -> Self {
        Self::default()
    }

    /// A prototype of `count` unconnected nodes with default parameters.
    pub fn with_nodes(count: usize) -> Self {
        let mut mol = Self::new();
        for _ in 0..count {
            mol.create_node(NodeParameters::default());
        }
        mol
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Append a node and return its index.
    pub fn create_node(&mut self, parameters: NodeParameters) -> usize {
        self.nodes.push(Node {
            parameters,
            neighbors: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn check_node(&self, index: usize) -> MsdResult<()> {
        if index >= self.nodes.len() {
            return Err(MsdError::InvalidNode {
                index,
                count: self.nodes.len(),
            });
        }
        Ok(())
    }

    fn check_edge(&self, index: usize) -> MsdResult<()> {
        if index >= self.edges.len() {
            return Err(MsdError::InvalidEdge {
                index,
                count: self.edges.len(),
            });
        }
        Ok(())
    }

    /// Connect `src -> dst` and return the new edge's index.
    pub fn connect_nodes(&mut self, src: usize, dst: usize, parameters: EdgeParameters) -> MsdResult<usize> {
        self.check_node(src)?;
        self.check_node(dst)?;
        Ok(self.link(src, dst, parameters))
    }

    /// Push an edge between two existing nodes.
    pub(crate) fn link(&mut self, src: usize, dst: usize, parameters: EdgeParameters) -> usize {
        let edge_index = self.edges.len();
        self.edges.push(parameters);

        if src == dst {
            self.nodes[src].neighbors.push(Edge {
                edge_index,
                self_index: src,
                node_index: src,
                direction: Direction::Loop,
            });
        } else {
            self.nodes[src].neighbors.push(Edge {
                edge_index,
                self_index: src,
                node_index: dst,
                direction: Direction::Forward,
            });
            self.nodes[dst].neighbors.push(Edge {
                edge_index,
                self_index: dst,
                node_index: src,
                direction: Direction::Backward,
            });
        }
        edge_index
    }

    /// Index of the first edge joining `a` and `b` (in either direction).
    pub fn edge_index(&self, a: usize, b: usize) -> MsdResult<Option<usize>> {
        self.check_node(a)?;
        self.check_node(b)?;
        Ok(self.nodes[a]
            .neighbors
            .iter()
            .find(|e| e.node_index == b)
            .map(|e| e.edge_index))
    }

    /// Adjacency list of `node`.
    pub fn adjacency(&self, node: usize) -> MsdResult<&[Edge]> {
        self.check_node(node)?;
        Ok(&self.nodes[node].neighbors)
    }

    pub fn node_parameters(&self, node: usize) -> MsdResult<&NodeParameters> {
        self.check_node(node)?;
        Ok(&self.nodes[node].parameters)
    }

    pub fn set_node_parameters(&mut self, node: usize, parameters: NodeParameters) -> MsdResult<()> {
        self.check_node(node)?;
        self.nodes[node].parameters = parameters;
        Ok(())
    }

    pub fn edge_parameters(&self, edge: usize) -> MsdResult<&EdgeParameters> {
        self.check_edge(edge)?;
        Ok(&self.edges[edge])
    }

    pub fn set_edge_parameters(&mut self, edge: usize, parameters: EdgeParameters) -> MsdResult<()> {
        self.check_edge(edge)?;
        self.edges[edge] = parameters;
        Ok(())
    }

    pub fn set_all_node_parameters(&mut self, parameters: NodeParameters) {
        for node in &mut self.nodes {
            node.parameters = parameters;
        }
    }

    pub fn set_all_edge_parameters(&mut self, parameters: EdgeParameters) {
        self.edges.fill(parameters);
    }

    pub fn set_all_parameters(&mut self, node: NodeParameters, edge: EdgeParameters) {
        self.set_all_node_parameters(node);
        self.set_all_edge_parameters(edge);
    }

    pub fn left_lead(&self) -> usize {
        self.left_lead
    }

    pub fn right_lead(&self) -> usize {
        self.right_lead
    }

    pub fn set_left_lead(&mut self, node: usize) -> MsdResult<()> {
        self.check_node(node)?;
        self.left_lead = node;
        Ok(())
    }

    pub fn set_right_lead(&mut self, node: usize) -> MsdResult<()> {
        self.check_node(node)?;
        self.right_lead = node;
        Ok(())
    }

    pub fn set_leads(&mut self, left: usize, right: usize) -> MsdResult<()> {
        self.check_node(left)?;
        self.check_node(right)?;
        self.left_lead = left;
        self.right_lead = right;
        Ok(())
    }

    /// Node parameters in index order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeParameters> + '_ {
        self.nodes.iter().map(|n| &n.parameters)
    }

    /// Every edge once, ordered by edge index.
    pub fn edges(&self) -> Vec<EdgeView> {
        let mut views: Vec<EdgeView> = self
            .nodes
            .iter()
            .flat_map(|n| n.neighbors.iter())
            .filter(|e| e.direction != Direction::Backward)
            .map(|e| EdgeView {
                index: e.edge_index,
                src: e.self_index,
                dst: e.node_index,
                direction: e.direction.sign(),
                parameters: self.edges[e.edge_index],
            })
            .collect();
        views.sort_by_key(|v| v.index);
        views
    }

    /// Unchecked views used by the energy model's hot path.
    #[inline]
    pub(crate) fn neighbors(&self, node: usize) -> &[Edge] {
        &self.nodes[node].neighbors
    }

    #[inline]
    pub(crate) fn node(&self, node: usize) -> &NodeParameters {
        &self.nodes[node].parameters
    }

    #[inline]
    pub(crate) fn edge(&self, edge: usize) -> &EdgeParameters {
        &self.edges[edge]
    }
}
