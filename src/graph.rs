//! Stage graph: arena ownership, wiring, validation and push dispatch.

use crate::config::TilingConfig;
use crate::driver::{TileMap, TileSpan};
use crate::error::{Error, Result};
use crate::geometry::{Axis, Size};
use crate::interval::Interval;
use crate::stage::{Stage, StageLinks, StageRole};
use daggy::{Dag, NodeIndex};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Unique identifier (handle) for a stage in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(pub(crate) NodeIndex);

impl StageId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// A node in the stage graph.
///
/// The node owns its stage; during a push dispatch the stage is taken
/// out of the slot so it can receive `&mut TileGraph` for delegation,
/// and put back when the call returns. Wiring (the single upstream
/// back-reference and the ordered downstream list) lives on the node,
/// not the stage.
struct Node {
    name: String,
    stage: Option<Box<dyn Stage>>,
    role: StageRole,
    upstream: Option<StageId>,
    downstream: SmallVec<[StageId; 2]>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("upstream", &self.upstream)
            .field("downstream", &self.downstream.len())
            .finish()
    }
}

/// A tile-negotiation graph of stages.
///
/// Topology is built once per configured pipeline and is immutable
/// during negotiation; only per-stage interval/counter state mutates
/// between [`TileGraph::reset`] calls. Every stage has at most one
/// upstream neighbor; fan-out happens through stages with the
/// [`StageRole::FanOut`] role.
pub struct TileGraph {
    graph: Dag<Node, ()>,
    by_name: HashMap<String, StageId>,
    config: TilingConfig,
    prepared: bool,
}

impl TileGraph {
    /// Create a new empty graph with default tiling limits.
    pub fn new() -> Self {
        Self::with_config(TilingConfig::default())
    }

    /// Create a new empty graph with the given tiling limits.
    pub fn with_config(config: TilingConfig) -> Self {
        Self {
            graph: Dag::new(),
            by_name: HashMap::new(),
            config,
            prepared: false,
        }
    }

    /// Frame-wide tiling limits shared by the driver and the terminal
    /// stages.
    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    /// Add a stage to the graph. Returns its handle for linking.
    pub fn add_stage(&mut self, name: impl Into<String>, stage: Box<dyn Stage>) -> StageId {
        let name = name.into();
        let role = stage.role();
        let idx = self.graph.add_node(Node {
            name: name.clone(),
            stage: Some(stage),
            role,
            upstream: None,
            downstream: SmallVec::new(),
        });
        let id = StageId(idx);
        self.by_name.insert(name, id);
        self.prepared = false;
        id
    }

    /// Register `downstream` as the next consumer of `upstream`.
    ///
    /// Call order defines branch index on fan-out stages and is fixed
    /// for the graph's lifetime. Fails if the edge would create a cycle
    /// or give `downstream` a second upstream neighbor.
    pub fn link(&mut self, upstream: StageId, downstream: StageId) -> Result<()> {
        let up_name = self.node(upstream)?.name.clone();
        let down = self.node(downstream)?;
        let down_name = down.name.clone();
        if down.upstream.is_some() {
            return Err(Error::DuplicateUpstream { name: down_name });
        }

        self.graph
            .add_edge(upstream.0, downstream.0, ())
            .map_err(|_| Error::WouldCycle {
                upstream: up_name,
                downstream: down_name,
            })?;

        self.node_mut(downstream)?.upstream = Some(upstream);
        self.node_mut(upstream)?.downstream.push(downstream);
        self.prepared = false;
        Ok(())
    }

    /// Look a stage up by its registered name.
    pub fn stage_id(&self, name: &str) -> Option<StageId> {
        self.by_name.get(name).copied()
    }

    /// Get a shared reference to a stage.
    pub fn stage(&self, id: StageId) -> Result<&dyn Stage> {
        let node = self
            .graph
            .node_weight(id.0)
            .ok_or_else(|| Error::StageNotFound {
                name: format!("#{}", id.index()),
            })?;
        node.stage.as_deref().ok_or_else(|| Error::StageBusy {
            name: node.name.clone(),
        })
    }

    /// Get a stage's registered name.
    pub fn stage_name(&self, id: StageId) -> Result<&str> {
        Ok(self.node(id)?.name.as_str())
    }

    /// All source stages (no upstream neighbor).
    pub fn sources(&self) -> Vec<StageId> {
        self.graph
            .graph()
            .node_indices()
            .filter(|&idx| self.graph.graph()[idx].upstream.is_none())
            .map(StageId)
            .collect()
    }

    /// All sink stages (no downstream neighbors).
    pub fn sinks(&self) -> Vec<StageId> {
        self.graph
            .graph()
            .node_indices()
            .filter(|&idx| self.graph.graph()[idx].downstream.is_empty())
            .map(StageId)
            .collect()
    }

    /// The graph's single source stage.
    pub fn source(&self) -> Result<StageId> {
        let sources = self.sources();
        match sources.as_slice() {
            [src] => Ok(*src),
            [] => Err(Error::InvalidGraph("graph has no source stage".into())),
            _ => Err(Error::InvalidGraph(
                "graph has more than one source stage".into(),
            )),
        }
    }

    /// Number of stages in the graph.
    pub fn stage_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph has no stages.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Validate the topology and propagate image sizes.
    ///
    /// Checks role arities (exactly one source, at least one sink, one
    /// downstream per non-fan-out producer), then runs each stage's
    /// `configure` in topological order so every stage caches its input
    /// and output image sizes. Must be called before any push.
    pub fn prepare(&mut self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidGraph("graph is empty".into()));
        }
        self.source()?;
        if self.sinks().is_empty() {
            return Err(Error::InvalidGraph("graph has no sink stage".into()));
        }

        for idx in self.graph.graph().node_indices() {
            let node = &self.graph.graph()[idx];
            let n_down = node.downstream.len();
            let ok = match node.role {
                StageRole::Source => node.upstream.is_none() && n_down == 1,
                StageRole::Transform => node.upstream.is_some() && n_down == 1,
                StageRole::FanOut => node.upstream.is_some() && n_down >= 1,
                StageRole::Sink => node.upstream.is_some() && n_down == 0,
            };
            if !ok {
                return Err(Error::InvalidGraph(format!(
                    "stage '{}' ({:?}) is wired with {} upstream, {} downstream",
                    node.name,
                    node.role,
                    usize::from(node.upstream.is_some()),
                    n_down
                )));
            }
        }

        let order = daggy::petgraph::algo::toposort(self.graph.graph(), None)
            .map_err(|_| Error::InvalidGraph("cycle detected".into()))?;

        let mut sizes: HashMap<NodeIndex, Size> = HashMap::new();
        for idx in order {
            let upstream_size = self.graph.graph()[idx].upstream.map(|u| sizes[&u.0]);
            let node = self.graph.node_weight_mut(idx).ok_or(Error::Unprepared)?;
            let stage = node.stage.as_mut().ok_or_else(|| Error::StageBusy {
                name: node.name.clone(),
            })?;
            let out = stage.configure(upstream_size)?;
            sizes.insert(idx, out);
        }

        self.prepared = true;
        Ok(())
    }

    /// Reset every stage's per-tile state ahead of a new tile/axis
    /// negotiation.
    pub fn reset(&mut self) {
        for idx in self.graph.graph().node_indices() {
            if let Some(node) = self.graph.node_weight_mut(idx) {
                if let Some(stage) = node.stage.as_mut() {
                    stage.reset();
                }
            }
        }
    }

    // ========================================================================
    // Push dispatch
    // ========================================================================

    /// Dispatch the start pass to a stage.
    pub fn push_start_up(&mut self, id: StageId, output_start: i32, axis: Axis) -> Result<()> {
        let (mut stage, links) = self.take(id)?;
        let result = stage.push_start_up(self, &links, output_start, axis);
        self.put_back(id, stage);
        result
    }

    /// Dispatch the end pass to a stage. Returns the end the stage
    /// accepts in its own input coordinates.
    pub fn push_end_down(&mut self, id: StageId, input_end: i32, axis: Axis) -> Result<i32> {
        let (mut stage, links) = self.take(id)?;
        let result = stage.push_end_down(self, &links, input_end, axis);
        self.put_back(id, stage);
        result
    }

    /// Dispatch the crop pass to a stage.
    pub fn push_crop_down(&mut self, id: StageId, interval: Interval, axis: Axis) -> Result<()> {
        let (mut stage, links) = self.take(id)?;
        let result = stage.push_crop_down(self, &links, interval, axis);
        self.put_back(id, stage);
        result
    }

    /// Snapshot one stage's resolved span.
    pub fn stage_span(&self, id: StageId) -> Result<TileSpan> {
        let mut span = TileSpan::default();
        self.stage(id)?.copy_out(&mut span);
        Ok(span)
    }

    /// Collect every stage's resolved span after a negotiated axis.
    pub fn copy_out(&self, axis: Axis) -> TileMap {
        let mut map = TileMap::new(axis);
        for idx in self.graph.graph().node_indices() {
            let id = StageId(idx);
            if let Ok(span) = self.stage_span(id) {
                map.insert(id, span);
            }
        }
        map
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn node(&self, id: StageId) -> Result<&Node> {
        self.graph
            .node_weight(id.0)
            .ok_or_else(|| Error::StageNotFound {
                name: format!("#{}", id.index()),
            })
    }

    fn node_mut(&mut self, id: StageId) -> Result<&mut Node> {
        self.graph
            .node_weight_mut(id.0)
            .ok_or_else(|| Error::StageNotFound {
                name: format!("#{}", id.index()),
            })
    }

    /// Take a stage out of its slot for dispatch, along with a snapshot
    /// of its wiring. A slot that is already empty means the call chain
    /// re-entered a stage it is still inside.
    fn take(&mut self, id: StageId) -> Result<(Box<dyn Stage>, StageLinks)> {
        if !self.prepared {
            return Err(Error::Unprepared);
        }
        let node = self.node_mut(id)?;
        let links = StageLinks {
            id,
            name: node.name.clone(),
            upstream: node.upstream,
            downstream: node.downstream.clone(),
        };
        let stage = node.stage.take().ok_or_else(|| Error::StageBusy {
            name: links.name.clone(),
        })?;
        Ok((stage, links))
    }

    fn put_back(&mut self, id: StageId, stage: Box<dyn Stage>) {
        if let Ok(node) = self.node_mut(id) {
            node.stage = Some(stage);
        }
    }
}

impl Default for TileGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TileGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGraph")
            .field("stages", &self.graph.node_count())
            .field("links", &self.graph.edge_count())
            .field("prepared", &self.prepared)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{InputConfig, InputStage, OutputConfig, OutputStage, SplitStage};

    fn input(size: Size) -> Box<dyn Stage> {
        Box::new(InputStage::new(InputConfig {
            image_size: size,
            alignment: Size::square(1),
        }))
    }

    fn output() -> Box<dyn Stage> {
        Box::new(OutputStage::new(OutputConfig::default()))
    }

    #[test]
    fn test_add_and_lookup() {
        let mut graph = TileGraph::new();
        let src = graph.add_stage("input", input(Size::new(64, 64)));
        assert_eq!(graph.stage_id("input"), Some(src));
        assert_eq!(graph.stage_name(src).unwrap(), "input");
        assert_eq!(graph.stage_count(), 1);
    }

    #[test]
    fn test_link_and_terminals() {
        let mut graph = TileGraph::new();
        let src = graph.add_stage("input", input(Size::new(64, 64)));
        let sink = graph.add_stage("output", output());
        graph.link(src, sink).unwrap();

        assert_eq!(graph.sources(), vec![src]);
        assert_eq!(graph.sinks(), vec![sink]);
        assert_eq!(graph.source().unwrap(), src);
    }

    #[test]
    fn test_duplicate_upstream_rejected() {
        let mut graph = TileGraph::new();
        let a = graph.add_stage("a", input(Size::new(64, 64)));
        let b = graph.add_stage("b", input(Size::new(64, 64)));
        let sink = graph.add_stage("output", output());
        graph.link(a, sink).unwrap();
        let err = graph.link(b, sink).unwrap_err();
        assert!(matches!(err, Error::DuplicateUpstream { .. }));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = TileGraph::new();
        let a = graph.add_stage("a", Box::new(SplitStage::new()));
        let b = graph.add_stage("b", Box::new(SplitStage::new()));
        graph.link(a, b).unwrap();
        let err = graph.link(b, a).unwrap_err();
        assert!(matches!(err, Error::WouldCycle { .. }));
    }

    #[test]
    fn test_prepare_validates_roles() {
        // An output stage with no upstream is not a valid source.
        let mut graph = TileGraph::new();
        let a = graph.add_stage("lone", output());
        let b = graph.add_stage("other", output());
        // Wire nothing; single "source" rule already fails with two roots.
        let _ = (a, b);
        assert!(matches!(graph.prepare(), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_prepare_propagates_sizes() {
        let mut graph = TileGraph::new();
        let src = graph.add_stage("input", input(Size::new(128, 96)));
        let split = graph.add_stage("split", Box::new(SplitStage::new()));
        let sink_a = graph.add_stage("a", output());
        let sink_b = graph.add_stage("b", output());
        graph.link(src, split).unwrap();
        graph.link(split, sink_a).unwrap();
        graph.link(split, sink_b).unwrap();
        graph.prepare().unwrap();

        assert_eq!(graph.stage(split).unwrap().output_size(), Size::new(128, 96));
        assert_eq!(graph.stage(sink_b).unwrap().input_size(), Size::new(128, 96));
    }

    /// Sink that dispatches straight back into its own slot, which the
    /// take/put-back discipline must reject.
    struct ReentrantSink {
        size: Size,
    }

    impl Stage for ReentrantSink {
        fn role(&self) -> StageRole {
            StageRole::Sink
        }

        fn configure(&mut self, upstream: Option<Size>) -> Result<Size> {
            self.size = upstream.unwrap_or_default();
            Ok(self.size)
        }

        fn reset(&mut self) {}

        fn input_size(&self) -> Size {
            self.size
        }

        fn output_size(&self) -> Size {
            self.size
        }

        fn push_start_up(
            &mut self,
            graph: &mut TileGraph,
            links: &StageLinks,
            output_start: i32,
            axis: Axis,
        ) -> Result<()> {
            graph.push_start_up(links.id, output_start, axis)
        }

        fn push_end_down(
            &mut self,
            _graph: &mut TileGraph,
            _links: &StageLinks,
            input_end: i32,
            _axis: Axis,
        ) -> Result<i32> {
            Ok(input_end)
        }

        fn push_end_up(&mut self, _output_end: i32, _axis: Axis) -> Result<()> {
            Ok(())
        }

        fn push_crop_down(
            &mut self,
            _graph: &mut TileGraph,
            _links: &StageLinks,
            _interval: Interval,
            _axis: Axis,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reentrant_push_is_rejected() {
        let mut graph = TileGraph::new();
        let src = graph.add_stage("input", input(Size::new(64, 64)));
        let sink = graph.add_stage(
            "loop",
            Box::new(ReentrantSink {
                size: Size::default(),
            }),
        );
        graph.link(src, sink).unwrap();
        graph.prepare().unwrap();

        let err = graph.push_start_up(sink, 0, Axis::X).unwrap_err();
        assert!(matches!(err, Error::StageBusy { .. }));
        // The slot must be restored after the failed dispatch.
        assert!(graph.stage(sink).is_ok());
    }

    #[test]
    fn test_push_before_prepare_fails() {
        let mut graph = TileGraph::new();
        let src = graph.add_stage("input", input(Size::new(64, 64)));
        let sink = graph.add_stage("output", output());
        graph.link(src, sink).unwrap();
        let err = graph.push_start_up(sink, 0, Axis::X).unwrap_err();
        assert!(matches!(err, Error::Unprepared));
    }
}
