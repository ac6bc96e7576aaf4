//! Flat binary interchange format for [`MolProto`].
//!
//! Field order: edge count, per-edge parameters, node count, per-node
//! parameters, per-node adjacency lists, left lead, right lead. Counts and
//! indices are little-endian `u64`, scalars little-endian `f64`, vectors three
//! scalars, and an adjacency entry is `edge, self, node` indices followed by
//! the direction sign as a scalar.

use super::prototype::{Direction, Edge, EdgeParameters, MolProto, Node, NodeParameters};
use crate::error::{MsdError, MsdResult};
use crate::vector::DVec3;

const U64: usize = 8;
const F64: usize = 8;
const VEC3: usize = 3 * F64;
const EDGE_PARAMS: usize = 4 * F64 + VEC3;
const NODE_PARAMS: usize = 3 * F64 + VEC3;
const ADJACENCY_ENTRY: usize = 3 * U64 + F64;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u64(&mut self, v: usize) {
        self.buf.extend_from_slice(&(v as u64).to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn vec3(&mut self, v: DVec3) {
        self.f64(v.x);
        self.f64(v.y);
        self.f64(v.z);
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, n: usize, what: &str) -> MsdResult<&[u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len()).ok_or_else(|| {
            MsdError::Decode(format!("truncated while reading {what} at byte {}", self.pos))
        })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u64(&mut self, what: &str) -> MsdResult<usize> {
        let mut raw = [0u8; U64];
        raw.copy_from_slice(self.take(U64, what)?);
        usize::try_from(u64::from_le_bytes(raw))
            .map_err(|_| MsdError::Decode(format!("{what} does not fit in usize")))
    }

    fn f64(&mut self, what: &str) -> MsdResult<f64> {
        let mut raw = [0u8; F64];
        raw.copy_from_slice(self.take(F64, what)?);
        Ok(f64::from_le_bytes(raw))
    }

    fn vec3(&mut self, what: &str) -> MsdResult<DVec3> {
        Ok(DVec3::new(self.f64(what)?, self.f64(what)?, self.f64(what)?))
    }

    /// Read a count and reject it early if the remaining bytes cannot hold
    /// that many records of `record` bytes.
    fn count(&mut self, record: usize, what: &str) -> MsdResult<usize> {
        let n = self.u64(what)?;
        let remaining = self.buf.len() - self.pos;
        if n.checked_mul(record).map_or(true, |need| need > remaining) {
            return Err(MsdError::Decode(format!(
                "{what} of {n} exceeds the {remaining} remaining bytes"
            )));
        }
        Ok(n)
    }
}

impl MolProto {
    /// Exact length of [`MolProto::serialize`]'s output.
    pub fn serialization_size(&self) -> usize {
        let adjacency: usize = self
            .nodes
            .iter()
            .map(|n| U64 + n.neighbors.len() * ADJACENCY_ENTRY)
            .sum();
        U64 + self.edges.len() * EDGE_PARAMS + U64 + self.nodes.len() * NODE_PARAMS + adjacency + 2 * U64
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer {
            buf: Vec::with_capacity(self.serialization_size()),
        };

        w.u64(self.edges.len());
        for e in &self.edges {
            w.f64(e.jm);
            w.f64(e.je1m);
            w.f64(e.jeem);
            w.f64(e.bm);
            w.vec3(e.dm);
        }

        w.u64(self.nodes.len());
        for n in &self.nodes {
            w.f64(n.parameters.sm);
            w.f64(n.parameters.fm);
            w.f64(n.parameters.je0m);
            w.vec3(n.parameters.am);
        }

        for n in &self.nodes {
            w.u64(n.neighbors.len());
            for e in &n.neighbors {
                w.u64(e.edge_index);
                w.u64(e.self_index);
                w.u64(e.node_index);
                w.f64(e.direction.sign());
            }
        }

        w.u64(self.left_lead);
        w.u64(self.right_lead);
        w.buf
    }

    /// Decode a buffer produced by [`MolProto::serialize`], validating every
    /// count and index.
    pub fn deserialize(buf: &[u8]) -> MsdResult<Self> {
        let mut r = Reader { buf, pos: 0 };

        let edge_count = r.count(EDGE_PARAMS, "edge count")?;
        let mut edges = Vec::with_capacity(edge_count);
        for _ in 0..edge_count {
            edges.push(EdgeParameters {
                jm: r.f64("Jm")?,
                je1m: r.f64("Je1m")?,
                jeem: r.f64("Jeem")?,
                bm: r.f64("bm")?,
                dm: r.vec3("Dm")?,
            });
        }

        let node_count = r.count(NODE_PARAMS, "node count")?;
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let parameters = NodeParameters {
                sm: r.f64("Sm")?,
                fm: r.f64("Fm")?,
                je0m: r.f64("Je0m")?,
                am: r.vec3("Am")?,
            };
            nodes.push(Node {
                parameters,
                neighbors: Vec::new(),
            });
        }

        for (i, node) in nodes.iter_mut().enumerate() {
            let len = r.count(ADJACENCY_ENTRY, "adjacency length")?;
            node.neighbors.reserve(len);
            for _ in 0..len {
                let edge_index = r.u64("edge index")?;
                let self_index = r.u64("self index")?;
                let node_index = r.u64("node index")?;
                let sign = r.f64("direction")?;
                if edge_index >= edge_count {
                    return Err(MsdError::Decode(format!(
                        "node {i} references edge {edge_index} of {edge_count}"
                    )));
                }
                if self_index != i || node_index >= node_count {
                    return Err(MsdError::Decode(format!(
                        "node {i} holds adjacency entry {self_index} -> {node_index}"
                    )));
                }
                let direction = Direction::from_sign(sign)
                    .ok_or_else(|| MsdError::Decode(format!("invalid edge direction {sign}")))?;
                node.neighbors.push(Edge {
                    edge_index,
                    self_index,
                    node_index,
                    direction,
                });
            }
        }

        check_topology(&nodes, edge_count)?;

        let left_lead = r.u64("left lead")?;
        let right_lead = r.u64("right lead")?;
        for lead in [left_lead, right_lead] {
            if lead >= node_count && !(node_count == 0 && lead == 0) {
                return Err(MsdError::Decode(format!(
                    "lead {lead} outside the {node_count} nodes"
                )));
            }
        }

        if r.pos != buf.len() {
            return Err(MsdError::Decode(format!(
                "{} trailing bytes",
                buf.len() - r.pos
            )));
        }

        Ok(Self {
            nodes,
            edges,
            left_lead,
            right_lead,
        })
    }
}

/// Every non-loop edge must be listed by both endpoints, mirrored and with
/// opposite directions; every loop exactly once with sign 0.
fn check_topology(nodes: &[Node], edge_count: usize) -> MsdResult<()> {
    let mut seen: Vec<Vec<&Edge>> = vec![Vec::new(); edge_count];
    for e in nodes.iter().flat_map(|n| n.neighbors.iter()) {
        if e.is_loop() != (e.self_index == e.node_index) {
            return Err(MsdError::Decode(format!(
                "edge {} from {} to {} has direction {:?}",
                e.edge_index, e.self_index, e.node_index, e.direction
            )));
        }
        seen[e.edge_index].push(e);
    }

    for (index, entries) in seen.iter().enumerate() {
        let consistent = match entries.as_slice() {
            [only] => only.is_loop(),
            [a, b] => {
                !a.is_loop()
                    && a.self_index == b.node_index
                    && a.node_index == b.self_index
                    && a.direction.sign() == -b.direction.sign()
            }
            _ => false,
        };
        if !consistent {
            return Err(MsdError::Decode(format!(
                "edge {index} has {} inconsistent adjacency entries",
                entries.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::MolType;

    fn sample() -> MolProto {
        let mut mol = MolProto::new();
        let a = mol.create_node(NodeParameters {
            sm: 0.5,
            fm: 0.25,
            je0m: -1.0,
            am: DVec3::new(0.1, 0.2, 0.3),
        });
        let b = mol.create_node(NodeParameters::default());
        let c = mol.create_node(NodeParameters::default());
        mol.connect_nodes(a, b, EdgeParameters::default()).unwrap();
        mol.connect_nodes(c, b, EdgeParameters {
            jm: 0.3,
            je1m: 0.1,
            jeem: -0.2,
            bm: 0.05,
            dm: DVec3::new(0.0, 0.0, 1.0),
        })
        .unwrap();
        mol.connect_nodes(c, c, EdgeParameters::default()).unwrap();
        mol.set_leads(a, c).unwrap();
        mol
    }

    #[test]
    fn test_roundtrip() {
        for mol in [MolProto::new(), MolProto::with_nodes(1), sample(), MolType::Circular.build(5)] {
            let bytes = mol.serialize();
            assert_eq!(bytes.len(), mol.serialization_size());
            let back = MolProto::deserialize(&bytes).unwrap();
            assert_eq!(back, mol);
        }
    }

    #[test]
    fn test_empty_layout() {
        // edge count, node count, two leads
        let bytes = MolProto::new().serialize();
        assert_eq!(bytes.len(), 4 * 8);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_truncated_buffer_is_rejected() {
        let bytes = sample().serialize();
        for cut in [0, 7, 8, 40, bytes.len() - 1] {
            assert!(matches!(
                MolProto::deserialize(&bytes[..cut]),
                Err(MsdError::Decode(_))
            ));
        }
    }

    /// Byte offset of node `node`'s adjacency list in a serialized prototype.
    fn adjacency_offset(mol: &MolProto, node: usize) -> usize {
        let mut pos = U64 + mol.edge_count() * EDGE_PARAMS + U64 + mol.node_count() * NODE_PARAMS;
        for n in &mol.nodes[..node] {
            pos += U64 + n.neighbors.len() * ADJACENCY_ENTRY;
        }
        pos
    }

    fn put_u64(bytes: &mut [u8], at: usize, v: u64) {
        bytes[at..at + U64].copy_from_slice(&v.to_le_bytes());
    }

    fn put_f64(bytes: &mut [u8], at: usize, v: f64) {
        bytes[at..at + F64].copy_from_slice(&v.to_le_bytes());
    }

    fn assert_decode_error(bytes: &[u8]) {
        assert!(matches!(MolProto::deserialize(bytes), Err(MsdError::Decode(_))));
    }

    #[test]
    fn test_one_sided_edge_is_rejected() {
        let mut mol = MolProto::with_nodes(2);
        mol.connect_nodes(0, 1, EdgeParameters::default()).unwrap();
        let bytes = mol.serialize();

        // drop node 0's entry so the edge is only listed as 1 -> 0
        let at = adjacency_offset(&mol, 0);
        let mut bad = bytes[..at].to_vec();
        bad.extend_from_slice(&0u64.to_le_bytes());
        bad.extend_from_slice(&bytes[at + U64 + ADJACENCY_ENTRY..]);
        assert_decode_error(&bad);
    }

    #[test]
    fn test_inconsistent_directions_are_rejected() {
        let mut mol = MolProto::with_nodes(2);
        mol.connect_nodes(0, 1, EdgeParameters::default()).unwrap();
        mol.connect_nodes(1, 1, EdgeParameters::default()).unwrap();
        let bytes = mol.serialize();
        let sign_at = |node: usize, entry: usize| {
            adjacency_offset(&mol, node) + U64 + entry * ADJACENCY_ENTRY + 3 * U64
        };

        // both endpoints claim to be the source
        let mut bad = bytes.clone();
        put_f64(&mut bad, sign_at(1, 0), 1.0);
        assert_decode_error(&bad);

        // the self-loop carries an orientation
        let mut bad = bytes.clone();
        put_f64(&mut bad, sign_at(1, 1), 1.0);
        assert_decode_error(&bad);

        // a loop sign on an entry between two distinct nodes
        let mut bad = bytes.clone();
        put_f64(&mut bad, sign_at(0, 0), 0.0);
        assert_decode_error(&bad);

        // the mirrored entry points at the wrong node
        let mut bad = bytes;
        put_u64(&mut bad, sign_at(1, 0) - U64, 1);
        assert_decode_error(&bad);
    }

    #[test]
    fn test_bad_indices_are_rejected() {
        let mut mol = MolProto::with_nodes(2);
        mol.connect_nodes(0, 1, EdgeParameters::default()).unwrap();
        let bytes = mol.serialize();

        // right lead is the last u64
        let mut bad = bytes.clone();
        let n = bad.len();
        bad[n - 8..].copy_from_slice(&7u64.to_le_bytes());
        assert!(MolProto::deserialize(&bad).is_err());

        // huge edge count
        let mut bad = bytes.clone();
        bad[..8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(MolProto::deserialize(&bad).is_err());

        let mut bad = bytes;
        bad.push(0);
        assert!(MolProto::deserialize(&bad).is_err());
    }
}
