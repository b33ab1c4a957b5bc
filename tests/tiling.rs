//! Whole-frame driver-loop tests: tile coverage, fan-out lockstep and
//! alignment failure.

use tileflow::driver::{self, TileMap};
use tileflow::prelude::*;
use tileflow::stage::{CropConfig, FilterConfig, InputConfig, OutputConfig};

fn input(size: Size) -> Box<InputStage> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Box::new(InputStage::new(InputConfig {
        image_size: size,
        alignment: Size::square(1),
    }))
}

fn config(max_tile: i32, min_tile: i32) -> TilingConfig {
    TilingConfig::new(Size::square(max_tile), Size::square(min_tile))
}

/// Assert a sink's output windows tile one axis contiguously from zero
/// to `goal`.
fn assert_contiguous(maps: &[TileMap], sink: StageId, goal: i32) {
    let mut expected_start = 0;
    for map in maps {
        let span = map.get(sink).expect("sink span missing");
        if span.output.is_empty() {
            continue;
        }
        assert_eq!(span.output.start, expected_start, "gap or overlap in coverage");
        assert!(span.output.end > span.output.start);
        expected_start = span.output.end;
    }
    assert_eq!(expected_start, goal, "axis not fully covered");
}

#[test]
fn straight_line_pipeline_covers_the_frame() {
    let mut graph = TileGraph::with_config(config(32, 8));
    let src = graph.add_stage("input", input(Size::new(100, 80)));
    let filt = graph.add_stage("denoise", Box::new(FilterStage::new(FilterConfig::symmetric(2))));
    let sink = graph.add_stage("output", Box::new(OutputStage::new(OutputConfig::default())));
    graph.link(src, filt).unwrap();
    graph.link(filt, sink).unwrap();
    graph.prepare().unwrap();

    let columns = driver::tile_axis(&mut graph, Axis::X).unwrap();
    assert!(columns.len() > 1, "expected the frame to need several tiles");
    assert_contiguous(&columns, sink, 100);

    let rows = driver::tile_axis(&mut graph, Axis::Y).unwrap();
    assert_contiguous(&rows, sink, 80);
}

#[test]
fn filter_tiles_overlap_on_input() {
    let mut graph = TileGraph::with_config(config(32, 8));
    let src = graph.add_stage("input", input(Size::new(100, 80)));
    let filt = graph.add_stage("denoise", Box::new(FilterStage::new(FilterConfig::symmetric(2))));
    let sink = graph.add_stage("output", Box::new(OutputStage::new(OutputConfig::default())));
    graph.link(src, filt).unwrap();
    graph.link(filt, sink).unwrap();
    graph.prepare().unwrap();

    let columns = driver::tile_axis(&mut graph, Axis::X).unwrap();
    for pair in columns.windows(2) {
        let prev = pair[0].get(src).unwrap();
        let next = pair[1].get(src).unwrap();
        // Each tile re-reads the filter context of its predecessor.
        assert!(next.input.start < prev.input.end, "missing context overlap");
    }
}

#[test]
fn fan_out_branches_stay_in_lockstep() {
    let mut graph = TileGraph::with_config(config(30, 8));
    let src = graph.add_stage("input", input(Size::new(100, 100)));
    let split = graph.add_stage("split", Box::new(SplitStage::new()));
    let plain = graph.add_stage("plain", Box::new(OutputStage::new(OutputConfig::default())));
    let burst = graph.add_stage(
        "burst",
        Box::new(OutputStage::new(OutputConfig {
            max_alignment: Size::square(16),
            ..Default::default()
        })),
    );
    graph.link(src, split).unwrap();
    graph.link(split, plain).unwrap();
    graph.link(split, burst).unwrap();
    graph.prepare().unwrap();

    let columns = driver::tile_axis(&mut graph, Axis::X).unwrap();
    assert_contiguous(&columns, plain, 100);
    assert_contiguous(&columns, burst, 100);

    for map in &columns {
        let plain_span = map.get(plain).unwrap();
        let burst_span = map.get(burst).unwrap();
        // The reconciled end is shared by every branch.
        assert_eq!(plain_span.output.end, burst_span.output.end);
        // Preferred alignment holds everywhere except the image edge.
        if burst_span.output.end < 100 {
            assert_eq!(burst_span.output.end % 16, 0);
        }
    }
}

#[test]
fn finished_branch_goes_degenerate_without_stalling() {
    let mut graph = TileGraph::with_config(config(64, 8));
    let src = graph.add_stage("input", input(Size::new(100, 100)));
    let split = graph.add_stage("split", Box::new(SplitStage::new()));
    let window = graph.add_stage(
        "window",
        Box::new(CropStage::new(CropConfig {
            offset: Size::new(0, 0),
            size: Size::new(60, 60),
        })),
    );
    let small = graph.add_stage("small", Box::new(OutputStage::new(OutputConfig::default())));
    let full = graph.add_stage("full", Box::new(OutputStage::new(OutputConfig::default())));
    graph.link(src, split).unwrap();
    graph.link(split, window).unwrap();
    graph.link(window, small).unwrap();
    graph.link(split, full).unwrap();
    graph.prepare().unwrap();

    let columns = driver::tile_axis(&mut graph, Axis::X).unwrap();
    assert_contiguous(&columns, small, 60);
    assert_contiguous(&columns, full, 100);

    // Once the cropped branch has delivered its whole window it keeps
    // participating with degenerate spans instead of blocking the
    // full-size branch.
    let last = columns.last().unwrap();
    assert!(last.get(small).unwrap().output.is_empty());
    assert!(!last.get(full).unwrap().output.is_empty());
}

#[test]
fn tile_image_builds_the_full_grid() {
    let mut graph = TileGraph::with_config(config(32, 8));
    let src = graph.add_stage("input", input(Size::new(100, 80)));
    let filt = graph.add_stage("denoise", Box::new(FilterStage::new(FilterConfig::symmetric(2))));
    let sink = graph.add_stage("output", Box::new(OutputStage::new(OutputConfig::default())));
    graph.link(src, filt).unwrap();
    graph.link(filt, sink).unwrap();
    graph.prepare().unwrap();

    let tiles = driver::tile_image(&mut graph).unwrap();

    let columns = driver::tile_axis(&mut graph, Axis::X).unwrap();
    let rows = driver::tile_axis(&mut graph, Axis::Y).unwrap();
    assert_eq!(tiles.len(), columns.len() * rows.len());

    // Grid is row-major: the first row repeats the column spans in order.
    for (tile, column) in tiles.iter().zip(&columns) {
        assert_eq!(
            tile.x.get(sink).unwrap().output,
            column.get(sink).unwrap().output
        );
    }
}

#[test]
fn rescaled_branch_finishes_with_the_frame() {
    let mut graph = TileGraph::with_config(config(40, 4));
    let src = graph.add_stage("input", input(Size::new(200, 200)));
    let split = graph.add_stage("split", Box::new(SplitStage::new()));
    let main = graph.add_stage("main", Box::new(OutputStage::new(OutputConfig::default())));
    let scaler = graph.add_stage(
        "scaler",
        Box::new(RescaleStage::new(tileflow::stage::RescaleConfig {
            output_size: Size::new(100, 100),
            support: Size::square(4),
        })),
    );
    let lores = graph.add_stage("lores", Box::new(OutputStage::new(OutputConfig::default())));
    graph.link(src, split).unwrap();
    graph.link(split, main).unwrap();
    graph.link(split, scaler).unwrap();
    graph.link(scaler, lores).unwrap();
    graph.prepare().unwrap();

    let columns = driver::tile_axis(&mut graph, Axis::X).unwrap();
    assert_contiguous(&columns, main, 200);
    assert_contiguous(&columns, lores, 100);
}

#[test]
fn unachievable_mandatory_alignment_fails_loudly() {
    let mut graph = TileGraph::with_config(config(30, 8));
    let src = graph.add_stage("input", input(Size::new(100, 100)));
    let sink = graph.add_stage(
        "output",
        Box::new(OutputStage::new(OutputConfig {
            max_alignment: Size::square(64),
            min_alignment: Size::square(64),
            x_mirrored: false,
        })),
    );
    graph.link(src, sink).unwrap();
    graph.prepare().unwrap();

    // 30 pixels per tile can never reach a 64-pixel boundary.
    let err = driver::tile_axis(&mut graph, Axis::X).unwrap_err();
    assert!(matches!(err, Error::AlignmentUnsatisfiable { .. }));
}
