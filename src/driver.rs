//! Negotiation driver: runs the three passes per tile and per axis, and
//! walks whole frames into tile grids.
//!
//! The engine itself only resolves *which pixels* each stage touches for
//! a candidate tile boundary; the functions here supply those boundaries,
//! keep per-sink progress, and collect the resolved windows into
//! descriptors. Translating descriptors into buffer offsets and register
//! programming stays with the caller.

use crate::error::{Error, Result};
use crate::geometry::Axis;
use crate::graph::{StageId, TileGraph};
use crate::interval::Interval;
use std::collections::HashMap;
use tracing::{debug, trace};

// ============================================================================
// Descriptors
// ============================================================================

/// Pixels to trim from each side of a delivered interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    /// Pixels to drop before the wanted window.
    pub low: i32,
    /// Pixels to drop after the wanted window.
    pub high: i32,
}

/// One stage's resolved windows along one axis, for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileSpan {
    /// Input pixels the stage reads.
    pub input: Interval,
    /// Output pixels the stage produces.
    pub output: Interval,
    /// Trim applied at a sink when upstream delivers more than the
    /// output window (zero elsewhere).
    pub crop: Margins,
}

impl TileSpan {
    /// True iff the stage neither reads nor produces pixels this tile.
    ///
    /// A degenerate span is valid data, not an error: it represents a
    /// branch whose request is currently unsatisfiable (or already
    /// complete), and the caller decides whether to skip that branch's
    /// output or fail the frame.
    pub fn is_degenerate(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }
}

/// All stages' resolved spans along one axis, for one tile.
#[derive(Debug, Clone)]
pub struct TileMap {
    /// Axis this map was negotiated along.
    pub axis: Axis,
    spans: HashMap<StageId, TileSpan>,
}

impl TileMap {
    /// Create an empty map for the given axis.
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            spans: HashMap::new(),
        }
    }

    /// Record a stage's span.
    pub fn insert(&mut self, id: StageId, span: TileSpan) {
        self.spans.insert(id, span);
    }

    /// Get a stage's span.
    pub fn get(&self, id: StageId) -> Option<&TileSpan> {
        self.spans.get(&id)
    }

    /// Iterate all recorded spans.
    pub fn iter(&self) -> impl Iterator<Item = (StageId, &TileSpan)> {
        self.spans.iter().map(|(id, span)| (*id, span))
    }

    /// Number of recorded spans.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Check if no spans were recorded.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// One tile: the X and Y windows of every stage.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Horizontal windows.
    pub x: TileMap,
    /// Vertical windows.
    pub y: TileMap,
}

// ============================================================================
// Per-tile negotiation
// ============================================================================

/// Negotiate one tile along one axis.
///
/// Runs the three passes in their required order: the start pass from
/// every sink (each with that sink's desired output start), the end pass
/// from the source with `available_end` input pixels on offer, and the
/// crop pass from the source with its resolved interval. Returns the
/// per-stage spans.
pub fn negotiate(
    graph: &mut TileGraph,
    starts: &[(StageId, i32)],
    available_end: i32,
    axis: Axis,
) -> Result<TileMap> {
    graph.reset();
    push_starts(graph, starts, axis)?;
    resolve(graph, available_end, axis)
}

/// Start pass: ask upstream, from every sink.
fn push_starts(graph: &mut TileGraph, starts: &[(StageId, i32)], axis: Axis) -> Result<()> {
    for &(sink, start) in starts {
        trace!(sink = sink.index(), start, %axis, "start pass");
        graph.push_start_up(sink, start, axis)?;
    }
    Ok(())
}

/// End and crop passes from the source, then collect spans.
fn resolve(graph: &mut TileGraph, available_end: i32, axis: Axis) -> Result<TileMap> {
    let src = graph.source()?;
    trace!(available_end, %axis, "end pass");
    graph.push_end_down(src, available_end, axis)?;

    let resolved = graph.stage_span(src)?.input;
    trace!(%resolved, %axis, "crop pass");
    graph.push_crop_down(src, resolved, axis)?;

    Ok(graph.copy_out(axis))
}

// ============================================================================
// Frame walking
// ============================================================================

/// Negotiate the full run of tiles along one axis of the frame.
///
/// Each sink starts at its own progress (initially zero) and advances to
/// the output end it resolves each round; the source is offered at most
/// the configured `max_tile_size` input pixels per tile. A sink that has
/// reached its output image size keeps participating with degenerate
/// spans so that fan-out barriers still see every branch. The walk ends
/// when every sink is complete; a round in which no sink advances fails
/// with [`Error::TileStall`].
pub fn tile_axis(graph: &mut TileGraph, axis: Axis) -> Result<Vec<TileMap>> {
    let src = graph.source()?;
    let sinks = graph.sinks();
    let input_size = graph.stage(src)?.input_size().along(axis);
    let max_tile = graph.config().max_tile_size.along(axis);

    let goals: Vec<i32> = sinks
        .iter()
        .map(|&s| Ok(graph.stage(s)?.output_size().along(axis)))
        .collect::<Result<_>>()?;
    let mut progress: Vec<i32> = vec![0; sinks.len()];
    let mut maps = Vec::new();

    while progress
        .iter()
        .zip(&goals)
        .any(|(&done, &goal)| done < goal)
    {
        graph.reset();
        let starts: Vec<(StageId, i32)> = sinks
            .iter()
            .zip(&progress)
            .zip(&goals)
            .map(|((&sink, &p), &goal)| (sink, p.min(goal)))
            .collect();
        push_starts(graph, &starts, axis)?;

        let src_start = graph.stage_span(src)?.input.start;
        let available = input_size.min(src_start.saturating_add(max_tile));
        let map = resolve(graph, available, axis)?;

        let mut advanced = false;
        for (i, &sink) in sinks.iter().enumerate() {
            let end = map
                .get(sink)
                .map(|span| span.output.end)
                .unwrap_or(progress[i]);
            let next = progress[i].max(end.min(goals[i]));
            if next > progress[i] {
                advanced = true;
                progress[i] = next;
            }
        }
        if !advanced {
            return Err(Error::TileStall { axis });
        }

        debug!(%axis, tile = maps.len(), ?progress, "tile resolved");
        maps.push(map);
    }

    Ok(maps)
}

/// Tile a whole frame: negotiate the X spans, then the Y spans, and
/// combine them into the row-major tile grid.
pub fn tile_image(graph: &mut TileGraph) -> Result<Vec<Tile>> {
    let columns = tile_axis(graph, Axis::X)?;
    let rows = tile_axis(graph, Axis::Y)?;
    debug!(
        columns = columns.len(),
        rows = rows.len(),
        "frame tiled"
    );

    let mut tiles = Vec::with_capacity(columns.len() * rows.len());
    for row in &rows {
        for column in &columns {
            tiles.push(Tile {
                x: column.clone(),
                y: row.clone(),
            });
        }
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_span() {
        let span = TileSpan {
            input: Interval::point(64),
            output: Interval::point(64),
            crop: Margins::default(),
        };
        assert!(span.is_degenerate());
        let span = TileSpan {
            input: Interval::new(0, 64),
            output: Interval::new(0, 64),
            crop: Margins::default(),
        };
        assert!(!span.is_degenerate());
    }
}
