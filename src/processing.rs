use crate::data::RegionCatalog;
use crate::types::{MergeStrategy, NameMatching, PointOfInterest, RegionDatum, RegionState};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

/// Render value of a region with no point fused in.
pub const BASE_RENDER_VALUE: f64 = 1.0;
/// Render value of a fused region when the point has no intensity of its own.
pub const FUSED_SENTINEL: f64 = 2.0;

static EMPTY: RegionState = RegionState::Empty;

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    pub matching: NameMatching,
}

impl NameMatching {
    pub fn key(&self, name: &str) -> String {
        match self {
            NameMatching::Exact => name.to_string(),
            NameMatching::Normalized => name.trim().nfc().collect::<String>().to_lowercase(),
        }
    }
}

/// A later point replaced an earlier one for the same region.
#[derive(Debug, Clone, PartialEq)]
pub struct Overwrite {
    pub region: String,
    pub replaced: String,
    pub by: String,
}

/// Two catalog names share a match key. Both stay in the region layer, but
/// lookups by that key resolve to `kept`.
#[derive(Debug, Clone, PartialEq)]
pub struct NameCollision {
    pub key: String,
    pub kept: String,
    pub shadowed: String,
}

/// Data-quality conditions seen while merging. None of them stop the merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Names of points whose country matched no catalog entry.
    pub unmatched: Vec<String>,
    pub overwritten: Vec<Overwrite>,
    pub collisions: Vec<NameCollision>,
}

/// The region layer plus the original point list, which overlay hovers rescan.
#[derive(Debug, Clone)]
pub struct MergedDataset {
    options: MergeOptions,
    /// Keyed by the exact catalog name.
    regions: BTreeMap<String, RegionDatum>,
    /// Match key -> catalog name.
    index: HashMap<String, String>,
    points: Vec<PointOfInterest>,
    report: MergeReport,
}

fn build_index(
    catalog: &RegionCatalog,
    matching: NameMatching,
    report: &mut MergeReport,
) -> HashMap<String, String> {
    let mut index: HashMap<String, String> = HashMap::with_capacity(catalog.len());
    for name in catalog.keys() {
        let key = matching.key(name);
        if let Some(kept) = index.get(&key) {
            warn!(
                "Regions '{}' and '{}' share the match key '{}'; '{}' wins",
                kept, name, key, kept
            );
            report.collisions.push(NameCollision {
                key,
                kept: kept.clone(),
                shadowed: name.clone(),
            });
            continue;
        }
        index.insert(key, name.clone());
    }
    index
}

/// Folds `points` into one datum per catalog entry.
///
/// Points are applied in input order and the last point for a region wins
/// outright. Points that reference no catalog entry never create a datum.
pub fn merge(
    catalog: &RegionCatalog,
    points: &[PointOfInterest],
    options: MergeOptions,
) -> MergedDataset {
    let mut report = MergeReport::default();
    let index = build_index(catalog, options.matching, &mut report);

    // catalog name -> winning point
    let mut fused: HashMap<&str, &PointOfInterest> = HashMap::new();
    for point in points {
        let Some(region) = point.country.as_deref()
            .and_then(|country| index.get(&options.matching.key(country)))
        else {
            warn!(
                "Point '{}' (country {:?}) matches no region; not fused",
                point.name, point.country
            );
            report.unmatched.push(point.name.clone());
            continue;
        };

        debug!("Fusing '{}' into '{}'", point.name, region);
        if let Some(previous) = fused.insert(region.as_str(), point) {
            warn!("Point '{}' replaces '{}' in region '{}'", point.name, previous.name, region);
            report.overwritten.push(Overwrite {
                region: region.clone(),
                replaced: previous.name.clone(),
                by: point.name.clone(),
            });
        }
    }

    let regions = catalog.iter().map(|(name, metadata)| {
        let state = match fused.get(name.as_str()) {
            Some(point) => RegionState::Fused {
                metadata: metadata.clone(),
                point: (*point).clone(),
            },
            None => RegionState::MetadataOnly(metadata.clone()),
        };
        (name.clone(), RegionDatum { region_name: name.clone(), state })
    }).collect();

    MergedDataset {
        options,
        regions,
        index,
        points: points.to_vec(),
        report,
    }
}

impl MergedDataset {
    pub fn strategy(&self) -> MergeStrategy {
        self.options.strategy
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn report(&self) -> &MergeReport {
        &self.report
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionDatum> {
        self.regions.values()
    }

    pub fn get(&self, region_name: &str) -> Option<&RegionDatum> {
        self.index
            .get(&self.options.matching.key(region_name))
            .and_then(|name| self.regions.get(name))
    }

    /// State of a hovered region; `Empty` when the catalog has no entry for it.
    pub fn state(&self, region_name: &str) -> &RegionState {
        self.get(region_name).map_or(&EMPTY, |datum| &datum.state)
    }

    /// Points that go on the marker layer, in input order.
    pub fn markers(&self) -> Vec<&PointOfInterest> {
        match self.options.strategy {
            MergeStrategy::IndependentMarkers => {
                self.points.iter().filter(|p| p.coordinate().is_some()).collect()
            }
            MergeStrategy::FusedIntoRegions => Vec::new(),
        }
    }

    /// First point whose country names `region_name`.
    pub fn point_in_region(&self, region_name: &str) -> Option<&PointOfInterest> {
        let key = self.options.matching.key(region_name);
        self.points.iter().find(|p| {
            p.country.as_deref().is_some_and(|c| self.options.matching.key(c) == key)
        })
    }

    /// Display magnitude for the region layer. Never used to pick a tooltip.
    pub fn render_value(&self, datum: &RegionDatum) -> f64 {
        match (&datum.state, self.options.strategy) {
            (RegionState::Fused { point, .. }, MergeStrategy::FusedIntoRegions) => {
                point.intensity().unwrap_or(FUSED_SENTINEL)
            }
            (RegionState::Fused { .. }, MergeStrategy::IndependentMarkers) => FUSED_SENTINEL,
            _ => BASE_RENDER_VALUE,
        }
    }

    /// Catalog names with no matching geometry; those regions never render.
    pub fn missing_from<'a>(&'a self, has_geometry: impl Fn(&str) -> bool + 'a) -> Vec<&'a str> {
        self.regions.values()
            .map(|d| d.region_name.as_str())
            .filter(|name| !has_geometry(*name))
            .collect()
    }

    /// Counts per state, for logging.
    pub fn summary(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for datum in self.regions.values() {
            let tag = if datum.is_fused() { "fused" } else { "metadata_only" };
            *counts.entry(tag).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::{builtin_points, builtin_region_metadata};
    use crate::types::{Coordinate, Placement, RegionMetadata};
    use proptest::prelude::*;

    pub(crate) fn india_catalog() -> RegionCatalog {
        let mut catalog = RegionCatalog::new();
        catalog.insert("India".to_string(), RegionMetadata {
            name: "India".to_string(),
            region: Some("South Asia".to_string()),
            population: Some("1.4B".to_string()),
            capital: Some("New Delhi".to_string()),
            description: Some("World's largest democracy".to_string()),
        });
        catalog
    }

    pub(crate) fn point(name: &str, country: &str, placement: Placement) -> PointOfInterest {
        PointOfInterest {
            name: name.to_string(),
            placement,
            population: Some(format!("{name} pop")),
            country: Some(country.to_string()),
            description: Some(format!("{name} desc")),
            region: Some(format!("{name} region")),
            timezone: Some(format!("{name} tz")),
        }
    }

    fn fused_options() -> MergeOptions {
        MergeOptions { strategy: MergeStrategy::FusedIntoRegions, ..Default::default() }
    }

    fn normalized_options() -> MergeOptions {
        MergeOptions { matching: NameMatching::Normalized, ..Default::default() }
    }

    fn bare(name: &str) -> RegionMetadata {
        RegionMetadata {
            name: name.to_string(),
            region: None,
            population: None,
            capital: Some(format!("{name} capital")),
            description: None,
        }
    }

    /// Builtin catalog plus spellings that collide under normalization.
    fn catalog_with_variants() -> RegionCatalog {
        let mut catalog = builtin_region_metadata();
        for name in ["Congo", "CONGO", " congo", "INDIA"] {
            catalog.insert(name.to_string(), bare(name));
        }
        catalog
    }

    pub(crate) fn delhi() -> PointOfInterest {
        PointOfInterest {
            name: "Delhi".to_string(),
            placement: Placement::Coordinate(Coordinate { lon: 77.1025, lat: 28.7041 }),
            population: Some("20.9M".to_string()),
            country: Some("India".to_string()),
            description: Some("Capital city".to_string()),
            region: Some("South Asia".to_string()),
            timezone: Some("IST".to_string()),
        }
    }

    #[test]
    fn delhi_fuses_into_india() {
        let dataset = merge(&india_catalog(), &[delhi()], MergeOptions::default());
        let datum = dataset.get("India").unwrap();

        assert_eq!(datum.display_name(), "Delhi");
        assert_eq!(datum.population(), Some("20.9M"));
        assert_eq!(datum.capital(), Some("New Delhi"));
        assert_eq!(datum.description(), Some("Capital city"));
        assert_eq!(datum.timezone(), Some("IST"));
        assert!(dataset.render_value(datum) > 1.0);
        assert_eq!(datum.region_name, "India");
    }

    #[test]
    fn unfused_regions_render_at_exactly_one() {
        let dataset = merge(&builtin_region_metadata(), &[], MergeOptions::default());
        assert_eq!(dataset.len(), 13);
        for datum in dataset.regions() {
            assert!(!datum.is_fused());
            assert_eq!(dataset.render_value(datum), BASE_RENDER_VALUE);
        }
    }

    #[test]
    fn fused_strategy_renders_intensity() {
        let options = fused_options();
        let points = builtin_points(MergeStrategy::FusedIntoRegions);
        let dataset = merge(&builtin_region_metadata(), &points, options);

        assert_eq!(dataset.render_value(dataset.get("India").unwrap()), 100.0);
        assert_eq!(dataset.render_value(dataset.get("USA").unwrap()), 80.0);
        assert_eq!(dataset.render_value(dataset.get("Japan").unwrap()), 90.0);
        assert_eq!(dataset.render_value(dataset.get("China").unwrap()), BASE_RENDER_VALUE);
        assert!(dataset.markers().is_empty());
    }

    #[test]
    fn low_intensity_still_reads_as_fused() {
        let points = [point("Delhi", "India", Placement::Intensity(0.5))];
        let dataset = merge(&india_catalog(), &points, fused_options());
        let datum = dataset.get("India").unwrap();
        assert!(datum.is_fused());
        assert_eq!(dataset.render_value(datum), 0.5);
    }

    #[test]
    fn unmatched_point_is_reported_not_added() {
        let lagos = Coordinate { lon: 3.37, lat: 6.52 };
        let stray = point("Lagos", "Nigeria", Placement::Coordinate(lagos));
        let dataset = merge(&india_catalog(), &[stray], MergeOptions::default());

        assert_eq!(dataset.len(), 1);
        assert!(dataset.get("Nigeria").is_none());
        assert!(!dataset.get("India").unwrap().is_fused());
        assert_eq!(dataset.report().unmatched, vec!["Lagos".to_string()]);
        // still a marker
        assert_eq!(dataset.markers().len(), 1);
    }

    #[test]
    fn point_without_country_is_unmatched() {
        let mut orphan = delhi();
        orphan.country = None;
        let dataset = merge(&india_catalog(), &[orphan], MergeOptions::default());
        assert!(!dataset.get("India").unwrap().is_fused());
        assert_eq!(dataset.report().unmatched.len(), 1);
    }

    #[test]
    fn later_point_wins_and_is_reported() {
        let first = point("Mumbai", "India", Placement::Intensity(10.0));
        let second = point("Delhi", "India", Placement::Intensity(20.0));
        let dataset = merge(&india_catalog(), &[first, second.clone()], fused_options());

        let datum = dataset.get("India").unwrap();
        match &datum.state {
            RegionState::Fused { point, metadata } => {
                assert_eq!(point, &second);
                assert_eq!(metadata.capital.as_deref(), Some("New Delhi"));
            }
            other => panic!("expected fused state, got {other:?}"),
        }
        assert_eq!(dataset.render_value(datum), 20.0);
        assert_eq!(dataset.report().overwritten, vec![Overwrite {
            region: "India".to_string(),
            replaced: "Mumbai".to_string(),
            by: "Delhi".to_string(),
        }]);
    }

    #[test]
    fn exact_matching_is_case_sensitive() {
        let points = [point("Delhi", "india", Placement::Intensity(5.0))];
        let dataset = merge(&india_catalog(), &points, MergeOptions::default());
        assert!(!dataset.get("India").unwrap().is_fused());
        assert!(dataset.get("india").is_none());
    }

    #[test]
    fn normalized_matching_folds_case_space_and_composition() {
        let mut catalog = RegionCatalog::new();
        catalog.insert("Brasília".to_string(), RegionMetadata {
            name: "Brasília".to_string(),
            region: None,
            population: None,
            capital: None,
            description: None,
        });
        // decomposed "i" + combining acute, padded and upper-cased
        let decomposed = "  BRASI\u{301}LIA ";
        let points = [point("Centro", decomposed, Placement::Intensity(3.0))];
        let dataset = merge(&catalog, &points, normalized_options());

        assert!(dataset.get("Brasília").unwrap().is_fused());
        assert!(dataset.get("brasília").is_some());
        assert!(dataset.point_in_region("Brasília").is_some());
        assert!(dataset.report().unmatched.is_empty());
    }

    #[test]
    fn point_in_region_returns_first_in_input_order() {
        let a = point("A", "India", Placement::Coordinate(Coordinate { lon: 1.0, lat: 1.0 }));
        let b = point("B", "India", Placement::Coordinate(Coordinate { lon: 2.0, lat: 2.0 }));
        let dataset = merge(&india_catalog(), &[a, b], MergeOptions::default());
        assert_eq!(dataset.point_in_region("India").unwrap().name, "A");
        assert!(dataset.point_in_region("Japan").is_none());
    }

    #[test]
    fn normalized_collisions_keep_every_catalog_entry() {
        let mut catalog = RegionCatalog::new();
        catalog.insert("Congo".to_string(), bare("Congo"));
        catalog.insert("CONGO".to_string(), bare("CONGO"));

        let dataset = merge(&catalog, &[], normalized_options());
        assert_eq!(dataset.len(), catalog.len());

        // BTreeMap order: "CONGO" sorts before "Congo" and claims the key
        assert_eq!(dataset.report().collisions, vec![NameCollision {
            key: "congo".to_string(),
            kept: "CONGO".to_string(),
            shadowed: "Congo".to_string(),
        }]);
        assert_eq!(dataset.get("congo").unwrap().region_name, "CONGO");
    }

    #[test]
    fn colliding_point_fuses_into_the_kept_entry_only() {
        let mut catalog = RegionCatalog::new();
        catalog.insert("Congo".to_string(), bare("Congo"));
        catalog.insert("CONGO".to_string(), bare("CONGO"));

        let points = [point("Kinshasa", "congo", Placement::Intensity(7.0))];
        let dataset = merge(&catalog, &points, normalized_options());

        let fused: Vec<&str> = dataset.regions()
            .filter(|d| d.is_fused())
            .map(|d| d.region_name.as_str())
            .collect();
        assert_eq!(fused, vec!["CONGO"]);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn state_is_empty_outside_the_catalog() {
        let dataset = merge(&india_catalog(), &[delhi()], MergeOptions::default());

        let empty = dataset.state("Chad");
        assert_eq!(empty, &RegionState::Empty);
        assert_eq!(empty.capital(), None);
        assert_eq!(empty.population(), None);
        assert_eq!(empty.region(), None);
        assert_eq!(empty.description(), None);
        assert_eq!(empty.country(), None);

        let india = dataset.state("India");
        assert!(matches!(india, RegionState::Fused { .. }));
        assert_eq!(india.country(), Some("India"));
    }

    #[test]
    fn missing_from_lists_catalog_names_without_geometry() {
        let dataset = merge(&builtin_region_metadata(), &[], MergeOptions::default());
        let missing = dataset.missing_from(|name| name != "USA" && name != "Russia");
        assert_eq!(missing, vec!["Russia", "USA"]);
    }

    fn arb_point() -> impl Strategy<Value = PointOfInterest> {
        let countries = prop::sample::select(vec!["India", "Japan", "USA", "Atlantis", "china"]);
        ("[A-Z][a-z]{1,8}", countries, 0.0f64..500.0).prop_map(|(name, country, intensity)| {
            point(&name, country, Placement::Intensity(intensity))
        })
    }

    proptest! {
        #[test]
        fn region_count_ignores_points(points in prop::collection::vec(arb_point(), 0..20)) {
            let strategies = [MergeStrategy::IndependentMarkers, MergeStrategy::FusedIntoRegions];
            let matchings = [NameMatching::Exact, NameMatching::Normalized];
            for catalog in [builtin_region_metadata(), catalog_with_variants()] {
                for strategy in strategies {
                    for matching in matchings {
                        let dataset = merge(&catalog, &points, MergeOptions { strategy, matching });
                        prop_assert_eq!(dataset.len(), catalog.len());
                    }
                }
            }
        }

        #[test]
        fn fused_region_reflects_last_point_only(
            points in prop::collection::vec(arb_point(), 1..20),
        ) {
            let dataset = merge(&builtin_region_metadata(), &points, fused_options());

            for datum in dataset.regions() {
                let last = points.iter().rev()
                    .find(|p| p.country.as_deref() == Some(datum.region_name.as_str()));
                match (&datum.state, last) {
                    (RegionState::Fused { point, .. }, Some(expected)) => {
                        prop_assert_eq!(point, expected);
                        let intensity = expected.intensity().unwrap();
                        prop_assert_eq!(dataset.render_value(datum), intensity);
                        prop_assert_eq!(datum.population(), expected.population.as_deref());
                    }
                    (RegionState::MetadataOnly(_), None) => {
                        prop_assert_eq!(dataset.render_value(datum), BASE_RENDER_VALUE);
                    }
                    (state, expected) => {
                        prop_assert!(false, "state {:?} vs expected {:?}", state, expected)
                    }
                }
            }
        }
    }
}
