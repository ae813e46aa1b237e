//! End-to-end imports over real frame documents written to a temp folder.

use approx::assert_relative_eq;
use nalgebra::Vector3;
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tgmm_core::spot::{FRAME, POSITION_T, RADIUS, SPOT_FEATURES};
use tgmm_core::*;

// ============================================================================
// FIXTURES
// ============================================================================

/// One `<GaussianMixtureModel>` line.
struct Rec {
    id: i64,
    m: [f64; 3],
    w: [f64; 9],
    nu: f64,
    parent: i64,
}

const IDENTITY_W: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

fn rec(id: i64, m: [f64; 3], parent: i64) -> Rec {
    Rec {
        id,
        m,
        w: IDENTITY_W,
        nu: 4.0,
        parent,
    }
}

fn join(values: &[f64]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

fn write_frame(folder: &Path, frame: usize, records: &[Rec]) {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<document>\n");
    for r in records {
        xml.push_str(&format!(
            "<GaussianMixtureModel id=\"{}\" lineage=\"{}\" parent=\"{}\" splitScore=\"3\" \
             scale=\"1 1 1\" nu=\"{}\" beta=\"4\" m=\"{}\" W=\"{}\" nuPrior=\"4\">\n</GaussianMixtureModel>\n",
            r.id,
            r.id,
            r.parent,
            r.nu,
            join(&r.m),
            join(&r.w)
        ));
    }
    xml.push_str("</document>\n");
    let name = FramePattern::default().file_name(frame);
    fs::write(folder.join(name), xml).unwrap();
}

fn identity_table(frames: usize) -> RegistrationTable {
    RegistrationTable::uniform(0, frames, AffineTransform3D::identity())
}

fn import(folder: &Path, provider: &RegistrationTable, config: ImportConfig) -> ImportReport {
    import_tgmm(folder, provider, config).unwrap()
}

fn two_way_division(folder: &Path) {
    write_frame(folder, 0, &[rec(1, [0.0, 0.0, 0.0], -1)]);
    write_frame(
        folder,
        1,
        &[rec(1, [1.0, 0.0, 0.0], 1), rec(2, [0.0, 1.0, 0.0], 1)],
    );
}

fn edge_pairs(model: &Model) -> Vec<(SpotId, SpotId)> {
    model.edges().map(|e| (e.source, e.target)).collect()
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_s1_two_frame_linear_track() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [10.0, 10.0, 10.0], -1)]);
    write_frame(dir.path(), 1, &[rec(1, [11.0, 10.0, 10.0], 1)]);

    let report = import(dir.path(), &identity_table(2), ImportConfig::default());
    let model = &report.model;

    assert_eq!(model.spot_count(), 2);
    assert_eq!(edge_pairs(model), vec![(SpotId(0), SpotId(1))]);
    assert_eq!(model.track_count(), 1);

    let s0 = model.spot(SpotId(0)).unwrap();
    let s1 = model.spot(SpotId(1)).unwrap();
    assert_relative_eq!(s0.position, Vector3::new(10.0, 10.0, 10.0));
    assert_relative_eq!(s1.position, Vector3::new(11.0, 10.0, 10.0));
    assert_relative_eq!(s0.radius, s1.radius);
    assert_eq!(s0.feature(POSITION_T), Some(0.0));
    assert_eq!(s1.feature(POSITION_T), Some(1.0));
    assert_eq!(report.summary.total(), 0);
    for spot in model.spots() {
        for key in SPOT_FEATURES {
            assert!(spot.feature(key).is_some(), "spot {} missing {}", spot.id, key);
        }
    }
}

#[test]
fn test_s2_division_kept() {
    let dir = tempfile::tempdir().unwrap();
    two_way_division(dir.path());

    let report = import(dir.path(), &identity_table(2), ImportConfig::default());
    let model = &report.model;

    assert_eq!(model.spot_count(), 3);
    assert_eq!(
        edge_pairs(model),
        vec![(SpotId(0), SpotId(1)), (SpotId(0), SpotId(2))]
    );
    assert_eq!(model.track_count(), 1);
    assert_eq!(model.graph().out_degree(SpotId(0)), 2);
    assert_eq!(report.edges_unlinked, 0);
}

#[test]
fn test_s3_division_unlink_farthest_tie_breaks_on_id() {
    let dir = tempfile::tempdir().unwrap();
    two_way_division(dir.path());

    let config = ImportConfig {
        split_policy: SplitPolicy::UnlinkFarthestDaughters,
        ..Default::default()
    };
    let report = import(dir.path(), &identity_table(2), config);
    let model = &report.model;

    assert_eq!(edge_pairs(model), vec![(SpotId(0), SpotId(1))]);
    assert_eq!(model.track_count(), 2);
    assert_eq!(model.tracks()[0].spots, vec![SpotId(0), SpotId(1)]);
    assert_eq!(model.tracks()[1].spots, vec![SpotId(2)]);
    assert_eq!(report.edges_unlinked, 1);
}

#[test]
fn test_unlink_all_splits_leaves_singletons() {
    let dir = tempfile::tempdir().unwrap();
    two_way_division(dir.path());

    let config = ImportConfig {
        split_policy: SplitPolicy::UnlinkAllSplits,
        ..Default::default()
    };
    let model = import(dir.path(), &identity_table(2), config).model;

    assert_eq!(model.edge_count(), 0);
    assert_eq!(model.track_count(), 3);
}

#[test]
fn test_s4_time_crop() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [0.0; 3], -1)]);
    write_frame(dir.path(), 1, &[rec(1, [1.0, 0.0, 0.0], 1)]);
    write_frame(dir.path(), 2, &[rec(1, [2.0, 0.0, 0.0], 1)]);

    let config = ImportConfig {
        time_range: Some(TimeRange::new(1, 2)),
        ..Default::default()
    };
    let model = import(dir.path(), &identity_table(3), config).model;

    assert_eq!(model.spot_count(), 2);
    assert_eq!(model.edge_count(), 1);
    assert_eq!(model.track_count(), 1);
    let frames: Vec<f64> = model.spots().filter_map(|s| s.feature(FRAME)).collect();
    assert_eq!(frames, vec![1.0, 2.0]);
}

#[test]
fn test_s5_scaled_transform() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [5.0, 5.0, 5.0], -1)]);

    let scaled = RegistrationTable::uniform(
        0,
        1,
        AffineTransform3D::scale_translate(2.0, Vector3::new(1.0, 1.0, 1.0)),
    );
    let model = import(dir.path(), &scaled, ImportConfig::default()).model;
    let spot = model.spot(SpotId(0)).unwrap();

    assert_relative_eq!(spot.position, Vector3::new(11.0, 11.0, 11.0));
    // Σ = I/4 gives a local radius of 0.5.
    assert_relative_eq!(spot.radius, 1.0, epsilon = 1e-12);
    assert_eq!(spot.feature(RADIUS), Some(spot.radius));
}

#[test]
fn test_s6_degenerate_precision() {
    let dir = tempfile::tempdir().unwrap();
    let mut singular = rec(1, [1.0; 3], -1);
    singular.w = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    write_frame(dir.path(), 0, &[singular]);

    let report = import(dir.path(), &identity_table(1), ImportConfig::default());

    assert!(report.model.is_empty());
    assert_eq!(report.summary.degenerate, 1);
    assert_eq!(report.summary.total(), 1);
    assert!(matches!(
        report.warnings[0],
        ImportWarning::DegenerateRecord { frame: 0, local_id: 1, .. }
    ));
}

// ============================================================================
// BOUNDARIES
// ============================================================================

#[test]
fn test_empty_time_range_gives_empty_model() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [0.0; 3], -1)]);

    let config = ImportConfig {
        time_range: Some(TimeRange::new(2, 1)),
        ..Default::default()
    };
    let report = import(dir.path(), &identity_table(3), config);
    assert!(report.model.is_empty());
    assert_eq!(report.frames_processed, 0);
    assert_eq!(report.summary.total(), 0);
}

#[test]
fn test_zero_record_document_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[]);

    let report = import(dir.path(), &identity_table(1), ImportConfig::default());
    assert!(report.model.is_empty());
    assert!(report.warnings.is_empty());
}

#[test]
fn test_parent_in_same_frame_is_not_linked() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [0.0; 3], -1)]);
    // Parent 2 names a record of frame 1 itself; frame 0 has no local id 2.
    write_frame(
        dir.path(),
        1,
        &[rec(2, [0.0; 3], -1), rec(3, [1.0, 0.0, 0.0], 2)],
    );

    let model = import(dir.path(), &identity_table(2), ImportConfig::default()).model;
    assert_eq!(model.spot_count(), 3);
    assert_eq!(model.edge_count(), 0);
    assert_eq!(model.track_count(), 3);
}

#[test]
fn test_missing_frame_breaks_lineage() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [0.0; 3], -1), rec(2, [1.0; 3], -1)]);
    write_frame(
        dir.path(),
        2,
        &[rec(1, [0.0; 3], 1), rec(2, [1.0; 3], 2), rec(3, [2.0; 3], 2)],
    );

    let report = import(dir.path(), &identity_table(3), ImportConfig::default());
    assert_eq!(report.summary.missing_frame, 1);
    assert_eq!(report.summary.out_of_order, 0);
    assert_eq!(report.model.spot_count(), 5);
    assert_eq!(report.model.edge_count(), 0);
    assert_eq!(report.model.track_count(), 5);
    assert_eq!(
        report.summary_line(),
        "imported 5 spots over 3 frames; 1 warnings (0 parse, 1 missing-frame, 0 degenerate, 0 out-of-order)"
    );
}

#[test]
fn test_malformed_document_contributes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [0.0; 3], -1)]);
    let broken = dir.path().join(FramePattern::default().file_name(1));
    // Well-formed record, but the document's end tags do not match.
    fs::write(
        &broken,
        "<document><GaussianMixtureModel id=\"1\" parent=\"1\" nu=\"4\" m=\"0 0 0\" \
         W=\"1 0 0 0 1 0 0 0 1\"></document>",
    )
    .unwrap();

    let report = import(dir.path(), &identity_table(2), ImportConfig::default());
    assert_eq!(report.model.spot_count(), 1);
    assert_eq!(report.summary.parse, 1);
    assert!(matches!(
        &report.warnings[0],
        ImportWarning::ParseError { path, .. } if path == &broken
    ));
}

#[test]
fn test_spatial_crop_orphans_children() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [50.0, 0.0, 0.0], -1)]);
    write_frame(dir.path(), 1, &[rec(1, [5.0, 0.0, 0.0], 1)]);

    let config = ImportConfig {
        interval: Some(RealInterval::from_bounds([0.0, -1.0, -1.0, 10.0, 1.0, 1.0])),
        ..Default::default()
    };
    let model = import(dir.path(), &identity_table(2), config).model;

    // Built spot ids are consumed even by filtered spots.
    assert_eq!(model.spots().map(|s| s.id).collect::<Vec<_>>(), vec![SpotId(1)]);
    assert_eq!(model.edge_count(), 0);
}

#[test]
fn test_custom_pattern_and_view_setup() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("tgmm_t7.xml"),
        "<document><GaussianMixtureModel id=\"0\" parent=\"-1\" nu=\"4\" m=\"1 2 3\" \
         W=\"1 0 0 0 1 0 0 0 1\"/></document>",
    )
    .unwrap();

    let mut table = RegistrationTable::new();
    for frame in 0..8 {
        table.insert(3, frame, AffineTransform3D::identity());
    }
    let config = ImportConfig {
        view_setup_id: 3,
        pattern: "tgmm_t%d.xml".to_string(),
        time_range: Some(TimeRange::new(7, 7)),
        dt: 2.5,
        ..Default::default()
    };
    let logger = Arc::new(MemoryLogger::new());
    let report = TgmmImporter::new(dir.path(), &table, config)
        .with_logger(logger.clone())
        .import()
        .unwrap();

    let spot = report.model.spot(SpotId(0)).unwrap();
    assert_eq!(spot.frame, 7);
    assert_eq!(spot.feature(POSITION_T), Some(17.5));
    assert_eq!(spot.feature(analyzers::SOURCE_ID), Some(3.0));
    assert!(logger.errors().is_empty());
}

#[test]
fn test_dataset_provider_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_frame(dir.path(), 0, &[rec(1, [5.0, 5.0, 5.0], -1)]);
    write_frame(dir.path(), 1, &[rec(1, [5.0, 5.0, 5.0], 1)]);

    let affine = |t: f64| format!("2 0 0 {t} 0 2 0 {t} 0 0 2 {t}");
    let xml = format!(
        r#"<SpimData version="0.2">
  <SequenceDescription>
    <ViewSetups>
      <ViewSetup><id>0</id><name>angle 0</name></ViewSetup>
    </ViewSetups>
    <Timepoints type="range"><first>0</first><last>1</last></Timepoints>
  </SequenceDescription>
  <ViewRegistrations>
    <ViewRegistration timepoint="0" setup="0">
      <ViewTransform type="affine"><affine>{}</affine></ViewTransform>
    </ViewRegistration>
    <ViewRegistration timepoint="1" setup="0">
      <ViewTransform type="affine"><affine>{}</affine></ViewTransform>
    </ViewRegistration>
  </ViewRegistrations>
</SpimData>"#,
        affine(1.0),
        affine(3.0)
    );
    let dataset = SpimDataset::from_xml(&xml).unwrap();

    let model = import_tgmm(dir.path(), &dataset, ImportConfig::default())
        .unwrap()
        .model;
    assert_relative_eq!(model.spot(SpotId(0)).unwrap().position, Vector3::new(11.0, 11.0, 11.0));
    assert_relative_eq!(model.spot(SpotId(1)).unwrap().position, Vector3::new(13.0, 13.0, 13.0));
    assert_eq!(model.edge_count(), 1);
}

// ============================================================================
// PROPERTIES
// ============================================================================

/// Frames of records whose parents point at arbitrary earlier local ids.
fn arb_frames() -> impl Strategy<Value = Vec<Vec<(i64, [f64; 3])>>> {
    prop::collection::vec(
        prop::collection::vec((-1i64..6, prop::array::uniform3(-20.0f64..20.0)), 0..6),
        1..5,
    )
}

fn write_random(folder: &Path, frames: &[Vec<(i64, [f64; 3])>]) {
    for (t, records) in frames.iter().enumerate() {
        let recs: Vec<Rec> = records
            .iter()
            .enumerate()
            .map(|(i, (parent, m))| rec(i as i64, *m, *parent))
            .collect();
        write_frame(folder, t, &recs);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_invariants_hold_after_import(
        frames in arb_frames(),
        dt in 0.1f64..5.0,
        policy in prop::sample::select(SplitPolicy::all().to_vec()),
    ) {
        let dir = tempfile::tempdir().unwrap();
        write_random(dir.path(), &frames);
        let config = ImportConfig { dt, split_policy: policy, ..Default::default() };
        let model = import(dir.path(), &identity_table(frames.len()), config).model;

        for spot in model.spots() {
            prop_assert_eq!(spot.feature(POSITION_T), Some(spot.frame as f64 * dt));
            prop_assert!(model.graph().in_degree(spot.id) <= 1);
            if policy != SplitPolicy::KeepIntact {
                prop_assert!(model.graph().out_degree(spot.id) <= 1);
            }
        }
        for edge in model.edges() {
            let source = model.spot(edge.source).unwrap();
            let target = model.spot(edge.target).unwrap();
            prop_assert_eq!(source.frame + 1, target.frame);
        }
    }

    #[test]
    fn prop_import_is_deterministic(frames in arb_frames()) {
        let dir = tempfile::tempdir().unwrap();
        write_random(dir.path(), &frames);
        let table = identity_table(frames.len());

        let a = import(dir.path(), &table, ImportConfig::default()).model;
        let b = import(dir.path(), &table, ImportConfig::default()).model;

        let ids = |m: &Model| m.spots().map(|s| (s.id, s.frame)).collect::<Vec<_>>();
        let tracks = |m: &Model| m.spots().map(|s| m.track_of(s.id)).collect::<Vec<_>>();
        prop_assert_eq!(ids(&a), ids(&b));
        prop_assert_eq!(edge_pairs(&a), edge_pairs(&b));
        prop_assert_eq!(tracks(&a), tracks(&b));
    }

    #[test]
    fn prop_rootless_frame_gives_singletons(
        points in prop::collection::vec(prop::array::uniform3(-20.0f64..20.0), 0..10),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let recs: Vec<Rec> = points
            .iter()
            .enumerate()
            .map(|(i, m)| rec(i as i64, *m, 100 + i as i64))
            .collect();
        write_frame(dir.path(), 0, &recs);

        let model = import(dir.path(), &identity_table(1), ImportConfig::default()).model;
        prop_assert_eq!(model.track_count(), points.len());
        prop_assert!(model.tracks().iter().all(|t| t.spots.len() == 1));
    }
}
