//! Flow graph builder: ledger batches → lifecycle nodes and edges.
//!
//! Each batch becomes a short horizontal chain on a fixed grid:
//!
//! ```text
//!   issue ──▶ transfer ──▶ retire
//!   (i)       (i + 1)      (i + 2)
//! ```
//!
//! The layout depends only on list order and index, so rebuilding from an
//! unchanged list reproduces the previous positions bit for bit.

use glam::Vec3;

use crate::config::LayoutParams;
use crate::ledger::{Batch, BatchStatus};
use crate::render::rgba;

/// X distance between consecutive stages of one batch.
pub const STAGE_STEP: f32 = 1.0;

/// Lifecycle stage a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Issue,
    Transfer,
    Retire,
}

impl NodeKind {
    pub const ALL: [NodeKind; 3] = [NodeKind::Issue, NodeKind::Transfer, NodeKind::Retire];

    pub fn label(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Transfer => "transfer",
            Self::Retire => "retire",
        }
    }

    /// Node fill colour (edges reuse the colour of their destination stage).
    pub fn color(self) -> [f32; 4] {
        match self {
            Self::Issue => rgba(0x22c55e, 0.8),
            Self::Transfer => rgba(0x3b82f6, 0.8),
            Self::Retire => rgba(0xef4444, 0.8),
        }
    }

    /// Stage index along the chain (issue = 0).
    fn stage(self) -> f32 {
        match self {
            Self::Issue => 0.0,
            Self::Transfer => 1.0,
            Self::Retire => 2.0,
        }
    }
}

/// One lifecycle stage of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    /// `"<kind>-<batch id>"`, e.g. `issue-b1`.
    pub id: String,
    pub kind: NodeKind,
    /// Index into the batch list the graph was built from.
    pub batch_index: usize,
    /// Logical (layout) position. Idle animation never changes it.
    pub position: Vec3,
}

/// Visual link between consecutive stages of the same batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    /// Stage the edge leads into.
    pub kind: NodeKind,
    /// Indices of the endpoints in [`FlowGraph::nodes`]. Batch ids need not
    /// be unique, so endpoints are never resolved by id.
    pub from_node: usize,
    pub to_node: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Endpoint positions of an edge, if both endpoints exist.
    pub fn edge_endpoints(&self, edge: &FlowEdge) -> Option<(Vec3, Vec3)> {
        let a = self.nodes.get(edge.from_node)?;
        let b = self.nodes.get(edge.to_node)?;
        Some((a.position, b.position))
    }
}

/// Deterministic grid layout of batches into a flow graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowGraphBuilder {
    layout: LayoutParams,
}

impl FlowGraphBuilder {
    pub fn new(layout: LayoutParams) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &LayoutParams {
        &self.layout
    }

    /// Position of the issue node for the batch at `index`.
    pub fn issue_position(&self, index: usize) -> Vec3 {
        let l = &self.layout;
        let columns = l.columns_per_row.max(1);
        let column = (index % columns) as f32;
        let row = (index / columns) as f32;
        Vec3::new(
            column * l.spacing_x - l.offset_x,
            row * l.spacing_y - l.offset_y,
            0.0,
        )
    }

    /// Build nodes and edges for an ordered batch list.
    pub fn build(&self, batches: &[Batch]) -> FlowGraph {
        let mut graph = FlowGraph {
            nodes: Vec::with_capacity(batches.len() * 3),
            edges: Vec::with_capacity(batches.len() * 2),
        };

        for (index, batch) in batches.iter().enumerate() {
            let base = self.issue_position(index);
            let mut previous: Option<(String, usize)> = None;

            for &kind in stages_for(batch.status) {
                let id = format!("{}-{}", kind.label(), batch.id);
                let position = base + Vec3::X * (kind.stage() * STAGE_STEP);
                let node_index = graph.nodes.len();

                if let Some((from, from_node)) = previous.take() {
                    graph.edges.push(FlowEdge {
                        from,
                        to: id.clone(),
                        kind,
                        from_node,
                        to_node: node_index,
                    });
                }
                previous = Some((id.clone(), node_index));
                graph.nodes.push(FlowNode {
                    id,
                    kind,
                    batch_index: index,
                    position,
                });
            }
        }

        graph
    }
}

/// Stages present for a status, in chain order.
fn stages_for(status: BatchStatus) -> &'static [NodeKind] {
    match status {
        BatchStatus::Issued => &NodeKind::ALL[..1],
        BatchStatus::Transferred => &NodeKind::ALL[..2],
        BatchStatus::Retired => &NodeKind::ALL[..],
    }
}

/// Summary counts shown next to the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStats {
    pub total_batches: usize,
    /// Batches whose current status is `transferred`.
    pub transferred: usize,
    pub retired: usize,
}

impl FlowStats {
    pub fn from_batches(batches: &[Batch]) -> Self {
        let mut stats = Self {
            total_batches: batches.len(),
            ..Default::default()
        };
        for b in batches {
            match b.status {
                BatchStatus::Transferred => stats.transferred += 1,
                BatchStatus::Retired => stats.retired += 1,
                BatchStatus::Issued => {}
            }
        }
        stats
    }
}
