use crate::config::SceneConfig;
use crate::data::GEOMETRY_ID;
use crate::processing::MergedDataset;
use crate::types::{MergeStrategy, RegionDatum};
use serde::Serialize;

// Declarative scene handed to the rendering engine. Field names follow the
// engine's option format (camelCase, `type`-tagged series).

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub title: Title,
    pub tooltip: TooltipConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoLayer>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
    pub left: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipConfig {
    pub trigger: String,
    pub show: bool,
    pub confine: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub show: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Emphasis {
    pub item_style: ItemStyle,
    pub label: Label,
}

/// Transparent base layer the marker coordinates are projected onto.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLayer {
    pub map: String,
    pub roam: bool,
    pub item_style: ItemStyle,
    pub emphasis: Emphasis,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Series {
    Map(MapSeries),
    Scatter(ScatterSeries),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSeries {
    pub map: String,
    pub roam: bool,
    pub item_style: ItemStyle,
    pub emphasis: Emphasis,
    pub select: Emphasis,
    pub label: Label,
    pub data: Vec<RegionEntry>,
}

/// One region in the map series. `name` is the geometry join key; the fused
/// point's name travels as `display_name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEntry {
    pub name: String,
    pub value: f64,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterSeries {
    pub coordinate_system: String,
    pub symbol_size: u32,
    pub item_style: ItemStyle,
    pub data: Vec<MarkerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerEntry {
    pub name: String,
    /// `[lon, lat]`
    pub value: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

fn hidden_label() -> Label {
    Label { show: false }
}

fn fill(color: &str) -> ItemStyle {
    ItemStyle {
        area_color: Some(color.to_string()),
        border_color: Some("transparent".to_string()),
        color: None,
    }
}

fn region_entry(dataset: &MergedDataset, datum: &RegionDatum) -> RegionEntry {
    let owned = |v: Option<&str>| v.map(str::to_string);
    RegionEntry {
        name: datum.region_name.clone(),
        value: dataset.render_value(datum),
        display_name: datum.display_name().to_string(),
        capital: owned(datum.capital()),
        region: owned(datum.region()),
        population: owned(datum.population()),
        description: owned(datum.description()),
        timezone: owned(datum.timezone()),
        country: owned(datum.country()),
    }
}

pub fn build_scene(dataset: &MergedDataset, config: &SceneConfig) -> Scene {
    let overlay = dataset.strategy() == MergeStrategy::IndependentMarkers;

    let geo = (overlay && config.geo_layer).then(|| GeoLayer {
        map: GEOMETRY_ID.to_string(),
        roam: true,
        item_style: fill("transparent"),
        emphasis: Emphasis { item_style: fill("transparent"), label: hidden_label() },
        label: hidden_label(),
    });

    let mut series = vec![Series::Map(MapSeries {
        map: GEOMETRY_ID.to_string(),
        roam: true,
        item_style: fill(&config.area_color),
        emphasis: Emphasis { item_style: fill(&config.hover_color), label: hidden_label() },
        // selecting a region keeps the base fill
        select: Emphasis { item_style: fill(&config.area_color), label: hidden_label() },
        label: hidden_label(),
        data: dataset.regions().map(|d| region_entry(dataset, d)).collect(),
    })];

    if overlay {
        let data = dataset.markers().into_iter().filter_map(|p| {
            let c = p.coordinate()?;
            Some(MarkerEntry {
                name: p.name.clone(),
                value: [c.lon, c.lat],
                population: p.population.clone(),
                country: p.country.clone(),
                description: p.description.clone(),
                region: p.region.clone(),
                timezone: p.timezone.clone(),
            })
        }).collect();

        series.push(Series::Scatter(ScatterSeries {
            coordinate_system: "geo".to_string(),
            symbol_size: config.marker_size,
            item_style: ItemStyle {
                color: Some(config.marker_color.clone()),
                ..Default::default()
            },
            data,
        }));
    }

    Scene {
        title: Title { text: config.title.clone(), left: "center".to_string() },
        tooltip: TooltipConfig { trigger: "item".to_string(), show: true, confine: true },
        geo,
        series,
    }
}
