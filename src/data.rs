use crate::config::AppConfig;
use crate::types::{Coordinate, MergeStrategy, Placement, PointOfInterest, RegionMetadata};
use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, Trim};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use rstar::{RTree, RTreeObject, AABB};
use serde::Deserialize;
use shapefile::Reader;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Identifier the geometry is registered under with the rendering engine.
pub const GEOMETRY_ID: &str = "world";

/// Region metadata keyed by the exact region name.
pub type RegionCatalog = BTreeMap<String, RegionMetadata>;

#[derive(Debug, Clone)]
pub struct RegionShape {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

// Bounding-box entry pointing back into `GeometryCatalog::regions`
#[derive(Debug)]
struct ShapeIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for ShapeIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Named region boundaries, loaded once per session.
#[derive(Debug)]
pub struct GeometryCatalog {
    regions: Vec<RegionShape>,
    tree: RTree<ShapeIndex>,
}

impl GeometryCatalog {
    pub fn new(regions: Vec<RegionShape>) -> Self {
        let items: Vec<ShapeIndex> = regions.iter().enumerate().filter_map(|(i, region)| {
            // Empty multipolygons have no extent and can never be hit.
            let rect = region.geometry.bounding_rect()?;
            Some(ShapeIndex {
                index: i,
                aabb: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        }).collect();

        Self { regions, tree: RTree::bulk_load(items) }
    }

    pub fn regions(&self) -> &[RegionShape] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.regions.iter().any(|r| r.name == name)
    }

    /// Name of the region whose boundary contains `(lon, lat)`.
    pub fn region_at(&self, lon: f64, lat: f64) -> Option<&str> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|candidate| self.regions.get(candidate.index))
            .find(|region| region.geometry.contains(&point))
            .map(|region| region.name.as_str())
    }

    /// GeoJSON export handed to the rendering engine.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self.regions.iter().map(|region| {
            let mut properties = JsonObject::new();
            let name = serde_json::Value::String(region.name.clone());
            properties.insert("name".to_string(), name);
            let value = geojson::Value::from(&region.geometry);
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(value)),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        }).collect();

        FeatureCollection { bbox: None, features, foreign_members: None }
    }
}

/// Everything the pipeline needs, loaded up front.
pub struct Inputs {
    pub geometry: GeometryCatalog,
    pub region_metadata: RegionCatalog,
    pub points: Vec<PointOfInterest>,
}

pub fn load_inputs(config: &AppConfig) -> Result<Inputs> {
    info!("Loading inputs...");

    let geometry = load_geometry(&config.input.geometry, &config.input.name_property)?;
    info!("Loaded geometry for {} regions", geometry.len());

    let region_metadata = load_region_metadata(config.input.region_metadata.as_deref())?;
    info!("Loaded metadata for {} regions", region_metadata.len());

    let points = load_points(config.input.points.as_deref(), config.merge.strategy)?;
    info!("Loaded {} points of interest", points.len());

    Ok(Inputs { geometry, region_metadata, points })
}

/// Loads the geometry catalog. Any malformed input is fatal; nothing is retried.
pub fn load_geometry(path: &Path, name_property: &str) -> Result<GeometryCatalog> {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    let regions = match extension.as_str() {
        "shp" => load_shapefile(path, name_property)?,
        "json" | "geojson" => load_geojson(path, name_property)?,
        _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
    };

    Ok(GeometryCatalog::new(regions))
}

fn load_shapefile(path: &Path, name_property: &str) -> Result<Vec<RegionShape>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut regions = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let name_value = record.get(name_property)
            .ok_or_else(|| anyhow!("Name column '{}' not found in Shapefile", name_property))?;

        let name = match name_value {
            shapefile::dbase::FieldValue::Character(Some(s)) => s.trim().to_string(),
            shapefile::dbase::FieldValue::Character(None) => {
                warn!("Skipping shape with empty '{}'", name_property);
                continue;
            }
            _ => return Err(anyhow!("Shapefile name column must be a string")),
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygon for {}: {:?}", name, e))?,
            shapefile::Shape::PolygonM(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM for {}: {:?}", name, e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ for {}: {:?}", name, e))?,
            _ => continue, // Skip non-polygon shapes
        };

        regions.push(RegionShape { name, geometry });
    }

    Ok(regions)
}

fn load_geojson(path: &Path, name_property: &str) -> Result<Vec<RegionShape>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let geojson = GeoJson::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse GeoJSON: {:?}", path))?;
    regions_from_geojson(geojson, name_property)
}

pub fn regions_from_geojson(geojson: GeoJson, name_property: &str) -> Result<Vec<RegionShape>> {
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut regions = Vec::new();

    for feature in collection.features {
        let name = match feature.properties.as_ref().and_then(|props| props.get(name_property)) {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => {
                warn!("Skipping feature without a '{}' property", name_property);
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> = geom.value.try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry for {}: {:?}", name, e))?;

                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        regions.push(RegionShape { name, geometry });
    }

    Ok(regions)
}

/// Region metadata from a CSV (`name,region,population,capital,description`),
/// or the built-in table. Names are not checked against the geometry.
pub fn load_region_metadata(path: Option<&Path>) -> Result<RegionCatalog> {
    let Some(path) = path else {
        return Ok(builtin_region_metadata());
    };

    let file = File::open(path)
        .with_context(|| format!("Failed to open region metadata CSV: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(file);

    let mut catalog = RegionCatalog::new();
    for result in rdr.deserialize() {
        let record: RegionMetadata = result
            .with_context(|| format!("Malformed row in region metadata CSV: {:?}", path))?;
        if record.name.is_empty() { continue; }
        catalog.insert(record.name.clone(), record);
    }

    Ok(catalog)
}

#[derive(Debug, Deserialize)]
struct PointRow {
    name: String,
    lon: Option<f64>,
    lat: Option<f64>,
    intensity: Option<f64>,
    population: Option<String>,
    country: Option<String>,
    description: Option<String>,
    region: Option<String>,
    timezone: Option<String>,
}

impl PointRow {
    fn into_point(self, strategy: MergeStrategy) -> Option<PointOfInterest> {
        let coordinate = match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => Some(Placement::Coordinate(Coordinate { lon, lat })),
            _ => None,
        };
        let intensity = self.intensity.map(Placement::Intensity);

        // A row carrying both picks the one its pipeline renders.
        let placement = match strategy {
            MergeStrategy::IndependentMarkers => coordinate.or(intensity),
            MergeStrategy::FusedIntoRegions => intensity.or(coordinate),
        }?;

        Some(PointOfInterest {
            name: self.name,
            placement,
            population: self.population,
            country: self.country,
            description: self.description,
            region: self.region,
            timezone: self.timezone,
        })
    }
}

/// Points from a CSV
/// (`name,lon,lat,intensity,population,country,description,region,timezone`),
/// or the built-in set. Input order is preserved; the merger depends on it.
pub fn load_points(
    path: Option<&Path>,
    strategy: MergeStrategy,
) -> Result<Vec<PointOfInterest>> {
    let Some(path) = path else {
        return Ok(builtin_points(strategy));
    };

    let file = File::open(path)
        .with_context(|| format!("Failed to open points CSV: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(file);

    let mut points = Vec::new();
    for (row, result) in rdr.deserialize::<PointRow>().enumerate() {
        let record = result
            .with_context(|| format!("Malformed row {} in points CSV: {:?}", row + 1, path))?;
        let name = record.name.clone();
        let point = record.into_point(strategy).ok_or_else(|| {
            anyhow!("Point row {} ('{}') has neither lon/lat nor intensity", row + 1, name)
        })?;
        points.push(point);
    }

    Ok(points)
}

fn meta(
    name: &str,
    region: &str,
    population: &str,
    capital: &str,
    description: &str,
) -> RegionMetadata {
    RegionMetadata {
        name: name.to_string(),
        region: Some(region.to_string()),
        population: Some(population.to_string()),
        capital: Some(capital.to_string()),
        description: Some(description.to_string()),
    }
}

pub fn builtin_region_metadata() -> RegionCatalog {
    [
        meta("China", "East Asia", "1.4B", "Beijing", "World's most populous country"),
        meta("Brazil", "South America", "214M", "Brasília", "Largest country in South America"),
        meta("Australia", "Oceania", "25.7M", "Canberra", "Island continent"),
        meta("Canada", "North America", "38.2M", "Ottawa", "Second largest country by area"),
        meta("Germany", "Europe", "83.2M", "Berlin", "Largest economy in Europe"),
        meta("France", "Europe", "67.4M", "Paris", "Known for culture and cuisine"),
        meta("United Kingdom", "Europe", "67.2M", "London", "Historic island nation"),
        meta("Russia", "Europe/Asia", "144.1M", "Moscow", "Largest country by area"),
        meta("South Africa", "Africa", "60.6M", "Pretoria", "Rainbow Nation"),
        meta("Mexico", "North America", "128.9M", "Mexico City", "Rich in culture and history"),
        meta("India", "South Asia", "1.4B", "New Delhi", "World's largest democracy"),
        meta("USA", "North America", "331M", "Washington D.C.", "Land of the free"),
        meta("Japan", "East Asia", "125.7M", "Tokyo", "Land of the rising sun"),
    ]
    .into_iter()
    .map(|m| (m.name.clone(), m))
    .collect()
}

pub fn builtin_points(strategy: MergeStrategy) -> Vec<PointOfInterest> {
    // (name, lon, lat, intensity, population, country, description, region, timezone)
    let rows = [
        ("Delhi", 77.1025, 28.7041, 100.0, "20.9M", "India",
            "Capital city of India", "South Asia", "IST (UTC+5:30)"),
        ("New York", -74.006, 40.7128, 80.0, "8.8M", "USA",
            "The Big Apple", "North America", "EST (UTC-5)"),
        ("Tokyo", 139.6917, 35.6895, 90.0, "37.4M", "Japan",
            "Capital of Japan", "East Asia", "JST (UTC+9)"),
    ];

    rows.into_iter().map(|row| {
        let (name, lon, lat, intensity, population, country, description, region, timezone) = row;
        let placement = match strategy {
            MergeStrategy::IndependentMarkers => Placement::Coordinate(Coordinate { lon, lat }),
            MergeStrategy::FusedIntoRegions => Placement::Intensity(intensity),
        };
        PointOfInterest {
            name: name.to_string(),
            placement,
            population: Some(population.to_string()),
            country: Some(country.to_string()),
            description: Some(description.to_string()),
            region: Some(region.to_string()),
            timezone: Some(timezone.to_string()),
        }
    }).collect()
}
