use crate::config::TooltipStyle;
use crate::processing::MergedDataset;
use crate::types::{MergeStrategy, Placement, PointOfInterest, RegionMetadata, RegionState};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Series kinds the rendering engine reports on hover/click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Area,
    Marker,
    Other,
}

impl SeriesKind {
    pub fn from_engine(series_type: &str) -> Self {
        match series_type {
            "map" => SeriesKind::Area,
            "scatter" => SeriesKind::Marker,
            _ => SeriesKind::Other,
        }
    }
}

/// Interaction callback payload as delivered by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionEvent {
    pub series_type: String,
    pub name: String,
    #[serde(default)]
    pub data_index: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub enum Hover<'a> {
    Marker(&'a PointOfInterest),
    Area(&'a str),
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipRow {
    pub label: String,
    pub value: Option<String>,
}

/// Heading, labeled rows and a muted footer. An empty heading means no tooltip.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TooltipPayload {
    pub heading: String,
    pub rows: Vec<TooltipRow>,
    pub footer: Option<String>,
}

impl TooltipPayload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.heading.is_empty() && self.rows.is_empty() && self.footer.is_none()
    }

    fn row(mut self, label: &str, value: Option<&str>) -> Self {
        self.rows.push(TooltipRow {
            label: label.to_string(),
            value: value.map(str::to_string),
        });
        self
    }

    pub fn value(&self, label: &str) -> Option<&str> {
        self.rows.iter().find(|r| r.label == label).and_then(|r| r.value.as_deref())
    }

    pub fn to_html(&self, style: TooltipStyle) -> String {
        if self.is_empty() {
            return String::new();
        }

        let (open, heading, row, footer) = match style {
            TooltipStyle::Classes => (
                r#"<div class="p-2">"#,
                r#"<h4 class="m-0 mb-2 text-gray-800 font-semibold">"#,
                r#"<p class="my-1 text-gray-600"><span class="font-medium">"#,
                r#"<p class="my-1 text-gray-500 text-xs">"#,
            ),
            TooltipStyle::Inline => (
                r#"<div style="padding: 8px;">"#,
                r#"<h4 style="margin: 0 0 8px 0; color: #333;">"#,
                r#"<p style="margin: 4px 0; color: #666;"><strong>"#,
                r#"<p style="margin: 4px 0; color: #999; font-size: 12px;">"#,
            ),
        };
        let label_close = match style {
            TooltipStyle::Classes => "</span>",
            TooltipStyle::Inline => "</strong>",
        };

        let mut html = String::new();
        html.push_str(open);
        let _ = write!(html, "{heading}{}</h4>", escape(&self.heading));
        for r in &self.rows {
            let value = r.value.as_deref().map(escape).unwrap_or_default();
            let _ = write!(html, "{row}{}:{label_close} {value}</p>", escape(&r.label));
        }
        if let Some(text) = &self.footer {
            let _ = write!(html, "{footer}{}</p>", escape(text));
        }
        html.push_str("</div>");
        html
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Stateless: one evaluation per event, nothing remembered between calls.
pub struct TooltipResolver<'a> {
    dataset: &'a MergedDataset,
}

impl<'a> TooltipResolver<'a> {
    pub fn new(dataset: &'a MergedDataset) -> Self {
        Self { dataset }
    }

    pub fn resolve(&self, hover: Hover<'_>) -> TooltipPayload {
        match hover {
            Hover::Marker(point) => point_detail(point),
            Hover::Area(name) => self.resolve_area(name),
            Hover::Other => TooltipPayload::empty(),
        }
    }

    /// Maps an engine event onto a hover. Markers are looked up by index into
    /// the marker layer, then by name.
    pub fn resolve_event(&self, event: &InteractionEvent) -> TooltipPayload {
        match SeriesKind::from_engine(&event.series_type) {
            SeriesKind::Area => self.resolve(Hover::Area(&event.name)),
            SeriesKind::Marker => {
                let markers = self.dataset.markers();
                let point = event.data_index
                    .and_then(|i| markers.get(i).copied())
                    .filter(|p| p.name == event.name)
                    .or_else(|| markers.iter().copied().find(|p| p.name == event.name));
                match point {
                    Some(point) => self.resolve(Hover::Marker(point)),
                    None => TooltipPayload::empty(),
                }
            }
            SeriesKind::Other => self.resolve(Hover::Other),
        }
    }

    fn resolve_area(&self, name: &str) -> TooltipPayload {
        let state = self.dataset.state(name);

        match self.dataset.strategy() {
            MergeStrategy::IndependentMarkers => {
                if let Some(point) = self.dataset.point_in_region(name) {
                    return point_detail(point);
                }
                let metadata = match state {
                    RegionState::MetadataOnly(m) => Some(m),
                    RegionState::Fused { metadata, .. } => Some(metadata),
                    RegionState::Empty => None,
                };
                region_summary_or_no_data(name, metadata)
            }
            MergeStrategy::FusedIntoRegions => match state {
                RegionState::Fused { point, .. } => point_detail(point),
                RegionState::MetadataOnly(m) => region_summary_or_no_data(name, Some(m)),
                RegionState::Empty => region_summary_or_no_data(name, None),
            },
        }
    }
}

fn point_detail(point: &PointOfInterest) -> TooltipPayload {
    let footer = match point.placement {
        Placement::Coordinate(c) => format!("Coordinates: [{:.2}, {:.2}]", c.lat, c.lon),
        Placement::Intensity(v) => format!("Data point value: {}", v),
    };

    TooltipPayload {
        heading: point.name.clone(),
        footer: Some(footer),
        ..Default::default()
    }
    .row("Country", point.country.as_deref())
    .row("Region", point.region.as_deref())
    .row("Population", point.population.as_deref())
    .row("Timezone", point.timezone.as_deref())
    .row("Description", point.description.as_deref())
}

fn region_summary_or_no_data(name: &str, metadata: Option<&RegionMetadata>) -> TooltipPayload {
    match metadata {
        Some(m) if m.capital.is_some() => TooltipPayload {
            heading: name.to_string(),
            footer: Some("No data points in this region".to_string()),
            ..Default::default()
        }
        .row("Capital", m.capital.as_deref())
        .row("Region", m.region.as_deref())
        .row("Population", m.population.as_deref())
        .row("Description", m.description.as_deref()),
        _ => TooltipPayload {
            heading: name.to_string(),
            footer: Some("Click to explore this region".to_string()),
            ..Default::default()
        }
        .row("Status", Some("No data available")),
    }
}
