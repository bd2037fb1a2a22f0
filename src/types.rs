use serde::{Deserialize, Serialize};

/// Static, hand-authored description of a named region. Identity is `name`,
/// matched against geometry feature names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMetadata {
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Option<String>,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

/// Where a point sits: an exact position for the marker layer, or a unitless
/// magnitude when it is folded into its region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Coordinate(Coordinate),
    Intensity(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub placement: Placement,
    pub population: Option<String>,
    /// Foreign key into `RegionMetadata::name`. Not required to match anything.
    pub country: Option<String>,
    pub description: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
}

impl PointOfInterest {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self.placement {
            Placement::Coordinate(c) => Some(c),
            Placement::Intensity(_) => None,
        }
    }

    pub fn intensity(&self) -> Option<f64> {
        match self.placement {
            Placement::Intensity(v) => Some(v),
            Placement::Coordinate(_) => None,
        }
    }
}

/// Which source is canonical for a region.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionState {
    /// Hovered geometry with no catalog entry behind it.
    Empty,
    MetadataOnly(RegionMetadata),
    /// A point took over the region. `capital` still comes from `metadata`.
    Fused {
        metadata: RegionMetadata,
        point: PointOfInterest,
    },
}

impl RegionState {
    pub fn capital(&self) -> Option<&str> {
        match self {
            RegionState::MetadataOnly(m) | RegionState::Fused { metadata: m, .. } => {
                m.capital.as_deref()
            }
            RegionState::Empty => None,
        }
    }

    pub fn population(&self) -> Option<&str> {
        match self {
            RegionState::MetadataOnly(m) => m.population.as_deref(),
            RegionState::Fused { point, .. } => point.population.as_deref(),
            RegionState::Empty => None,
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            RegionState::MetadataOnly(m) => m.region.as_deref(),
            RegionState::Fused { point, .. } => point.region.as_deref(),
            RegionState::Empty => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            RegionState::MetadataOnly(m) => m.description.as_deref(),
            RegionState::Fused { point, .. } => point.description.as_deref(),
            RegionState::Empty => None,
        }
    }

    pub fn timezone(&self) -> Option<&str> {
        match self {
            RegionState::Fused { point, .. } => point.timezone.as_deref(),
            _ => None,
        }
    }

    pub fn country(&self) -> Option<&str> {
        match self {
            RegionState::Fused { point, .. } => point.country.as_deref(),
            _ => None,
        }
    }
}

/// One entry of the region layer. `region_name` is the catalog key and stays
/// the geometry join key even when a point is fused in.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDatum {
    pub region_name: String,
    pub state: RegionState,
}

impl RegionDatum {
    pub fn display_name(&self) -> &str {
        match &self.state {
            RegionState::Fused { point, .. } => &point.name,
            _ => &self.region_name,
        }
    }

    pub fn is_fused(&self) -> bool {
        matches!(self.state, RegionState::Fused { .. })
    }

    pub fn capital(&self) -> Option<&str> {
        self.state.capital()
    }

    pub fn population(&self) -> Option<&str> {
        self.state.population()
    }

    pub fn region(&self) -> Option<&str> {
        self.state.region()
    }

    pub fn description(&self) -> Option<&str> {
        self.state.description()
    }

    pub fn timezone(&self) -> Option<&str> {
        self.state.timezone()
    }

    pub fn country(&self) -> Option<&str> {
        self.state.country()
    }
}

/// Selects between the overlay and fused pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Points keep their own marker layer; hovering a region rescans them.
    #[default]
    IndependentMarkers,
    /// Points are folded into their region and carry an intensity.
    FusedIntoRegions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatching {
    /// Case-sensitive equality.
    #[default]
    Exact,
    /// Trim, NFC, lowercase.
    Normalized,
}
