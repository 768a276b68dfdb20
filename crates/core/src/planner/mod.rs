//! Rendition planning.
//!
//! Decides which renditions a run produces from the probed source and the
//! configured rendition table:
//!
//! - table entries larger than the source in either dimension are dropped
//!   (no upscaling);
//! - the source resolution is always part of the plan as the single
//!   stream-copied rendition, either by flagging the table entry that matches
//!   it exactly or by appending an entry named after the source height;
//! - the result is sorted ascending by height.

mod types;

pub use types::{default_rendition_table, RenditionSpec, RenditionTemplate};

use thiserror::Error;
use tracing::debug;

use crate::transcoder::SourceProbe;

/// Errors that can occur while planning renditions.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Planning produced nothing to encode.
    #[error("No renditions planned for {width}x{height} source")]
    NoRenditions { width: u32, height: u32 },
}

/// Plans the renditions for a probed source.
pub fn plan(
    probe: &SourceProbe,
    table: &[RenditionTemplate],
) -> Result<Vec<RenditionSpec>, PlanError> {
    if probe.width == 0 || probe.height == 0 {
        return Err(PlanError::NoRenditions {
            width: probe.width,
            height: probe.height,
        });
    }

    let mut specs: Vec<RenditionSpec> = table
        .iter()
        .filter(|t| t.width <= probe.width && t.height <= probe.height)
        .map(RenditionSpec::from)
        .collect();

    match specs
        .iter_mut()
        .find(|s| s.width == probe.width && s.height == probe.height)
    {
        Some(matching) => matching.is_source_copy = true,
        None => specs.push(RenditionSpec {
            name: format!("{}p", probe.height),
            width: probe.width,
            height: probe.height,
            target_bitrate: probe.bitrate_bps.to_string(),
            is_source_copy: true,
        }),
    }

    // A table entry could share the generated name; keep names unique since
    // they double as directory names.
    let source_name = format!("{}p", probe.height);
    if specs
        .iter()
        .filter(|s| s.name == source_name)
        .count()
        > 1
    {
        for spec in specs.iter_mut().filter(|s| s.is_source_copy) {
            spec.name = format!("{}-source", source_name);
        }
    }

    specs.sort_by_key(|s| (s.height, s.width));

    if specs.is_empty() {
        return Err(PlanError::NoRenditions {
            width: probe.width,
            height: probe.height,
        });
    }

    debug!(
        source = %probe.resolution(),
        renditions = ?specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "Planned renditions"
    );

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn table() -> Vec<RenditionTemplate> {
        default_rendition_table()
    }

    #[test]
    fn test_plan_1080p_source() {
        let probe = fixtures::source_probe(1920, 1080, 4_000_000);
        let specs = plan(&probe, &table()).unwrap();

        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["480p", "720p", "1080p"]);
        assert!(!specs[0].is_source_copy);
        assert!(!specs[1].is_source_copy);
        assert!(specs[2].is_source_copy);
        assert_eq!(specs[2].target_bitrate, "4000000");
        assert_eq!(specs[2].resolution(), "1920x1080");
    }

    #[test]
    fn test_plan_360p_source_yields_single_copy() {
        let probe = fixtures::source_probe(640, 360, 700_000);
        let specs = plan(&probe, &table()).unwrap();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "360p");
        assert!(specs[0].is_source_copy);
        assert_eq!((specs[0].width, specs[0].height), (640, 360));
    }

    #[test]
    fn test_plan_source_matching_entry_is_flagged_not_duplicated() {
        let probe = fixtures::source_probe(1280, 720, 3_000_000);
        let specs = plan(&probe, &table()).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].name, "720p");
        assert!(specs[1].is_source_copy);
        // Matched entry keeps its configured bitrate
        assert_eq!(specs[1].target_bitrate, "1500k");
    }

    #[test]
    fn test_plan_never_upscales_and_one_copy() {
        let table = vec![
            RenditionTemplate::new("240p", 426, 240, "300k"),
            RenditionTemplate::new("480p", 854, 480, "800k"),
            RenditionTemplate::new("720p", 1280, 720, "1500k"),
            RenditionTemplate::new("1080p", 1920, 1080, "4500k"),
        ];

        for (w, h) in [(640, 360), (854, 480), (1000, 600), (1920, 1080), (3840, 2160), (300, 200)] {
            let probe = fixtures::source_probe(w, h, 2_000_000);
            let specs = plan(&probe, &table).unwrap();

            assert!(specs.iter().all(|s| s.height <= h && s.width <= w));
            let copies: Vec<_> = specs.iter().filter(|s| s.is_source_copy).collect();
            assert_eq!(copies.len(), 1);
            assert_eq!((copies[0].width, copies[0].height), (w, h));
            assert!(specs.windows(2).all(|p| p[0].height <= p[1].height));
        }
    }

    #[test]
    fn test_plan_wider_than_table_entry_is_filtered() {
        // Portrait source: every landscape entry is too wide
        let probe = fixtures::source_probe(720, 1280, 2_000_000);
        let specs = plan(&probe, &table()).unwrap();
        assert!(specs.iter().all(|s| s.width <= 720));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "1280p");
    }

    #[test]
    fn test_plan_name_collision_renames_source() {
        // Same height as the 480p entry but wider
        let probe = fixtures::source_probe(1000, 480, 1_000_000);
        let specs = plan(&probe, &table()).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "480p");
        assert_eq!(specs[1].name, "480p-source");
        assert!(specs[1].is_source_copy);
    }

    #[test]
    fn test_plan_zero_dimensions_fails() {
        let probe = fixtures::source_probe(0, 0, 1_000_000);
        let err = plan(&probe, &table()).unwrap_err();
        assert!(matches!(err, PlanError::NoRenditions { .. }));
    }

    #[test]
    fn test_plan_empty_table_still_plans_source() {
        let probe = fixtures::source_probe(1920, 1080, 4_000_000);
        let specs = plan(&probe, &[]).unwrap();
        assert_eq!(specs.len(), 1);
        assert!(specs[0].is_source_copy);
    }
}
