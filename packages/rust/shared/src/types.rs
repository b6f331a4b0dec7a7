//! Core domain types for Harvest runs.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Earliest registration year considered plausible.
pub const MIN_REGISTERED_YEAR: i32 = 1850;

// ---------------------------------------------------------------------------
// HeritageSite
// ---------------------------------------------------------------------------

/// A single validated heritage-site record.
///
/// Values of this type are only ever produced by the record validator, so every
/// field is present and within its schema bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeritageSite {
    /// Site name, never empty.
    pub name: String,
    /// Year of inscription, within the validator's [`YearRange`].
    pub registered_year: i32,
    /// Site category (schema v2 only).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SiteType>,
    /// Free-text description, never empty.
    pub description: String,
}

// ---------------------------------------------------------------------------
// SiteType
// ---------------------------------------------------------------------------

/// Closed set of heritage-site categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteType {
    Natural,
    Cultural,
    Mixed,
}

impl SiteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Cultural => "cultural",
            Self::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for SiteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SiteType {
    type Err = String;

    /// Case-insensitive, ignoring surrounding whitespace.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "natural" => Ok(Self::Natural),
            "cultural" => Ok(Self::Cultural),
            "mixed" => Ok(Self::Mixed),
            other => Err(format!("unknown site type '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// SchemaVersion
// ---------------------------------------------------------------------------

/// Record schema requested from the model and enforced by the validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// `name`, `registered_year`, `description`.
    #[default]
    V1,
    /// V1 plus an optional `type` (natural / cultural / mixed).
    V2,
}

impl SchemaVersion {
    /// Whether the `type` field participates in validation.
    pub fn has_site_type(&self) -> bool {
        matches!(self, Self::V2)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => f.write_str("v1"),
            Self::V2 => f.write_str("v2"),
        }
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(Self::V1),
            "v2" | "2" => Ok(Self::V2),
            other => Err(format!("unknown schema version '{other}': expected v1 or v2")),
        }
    }
}

// ---------------------------------------------------------------------------
// YearRange
// ---------------------------------------------------------------------------

/// Inclusive bounds for `registered_year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    /// `1850 ..= <current UTC year> + 1`.
    pub fn current() -> Self {
        Self {
            min: MIN_REGISTERED_YEAR,
            max: Utc::now().year() + 1,
        }
    }

    pub fn contains(&self, year: i64) -> bool {
        year >= i64::from(self.min) && year <= i64::from(self.max)
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self::current()
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_unique() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn run_id_display_and_parse() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn site_type_parsing_is_lenient_on_case() {
        assert_eq!(" Cultural ".parse::<SiteType>().unwrap(), SiteType::Cultural);
        assert_eq!("NATURAL".parse::<SiteType>().unwrap(), SiteType::Natural);
        assert!("industrial".parse::<SiteType>().is_err());
    }

    #[test]
    fn site_without_type_omits_the_key() {
        let site = HeritageSite {
            name: "Yakushima".into(),
            registered_year: 1993,
            kind: None,
            description: "A subtropical island.".into(),
        };
        let json = serde_json::to_string(&site).unwrap();
        assert_eq!(
            json,
            r#"{"name":"Yakushima","registered_year":1993,"description":"A subtropical island."}"#
        );
    }

    #[test]
    fn site_with_type_serializes_lowercase() {
        let site = HeritageSite {
            name: "Shirakami-Sanchi".into(),
            registered_year: 1993,
            kind: Some(SiteType::Natural),
            description: "Beech forest.".into(),
        };
        let json = serde_json::to_string(&site).unwrap();
        assert!(json.contains(r#""type":"natural""#));
    }

    #[test]
    fn schema_version_from_str() {
        assert_eq!("v2".parse::<SchemaVersion>().unwrap(), SchemaVersion::V2);
        assert_eq!("1".parse::<SchemaVersion>().unwrap(), SchemaVersion::V1);
        assert!("v3".parse::<SchemaVersion>().is_err());
        assert!(!SchemaVersion::V1.has_site_type());
    }

    #[test]
    fn year_range_bounds_are_inclusive() {
        let range = YearRange { min: 1850, max: 2027 };
        assert!(range.contains(1850));
        assert!(range.contains(2027));
        assert!(!range.contains(1849));
        assert!(!range.contains(2028));
    }

    #[test]
    fn current_year_range_allows_next_year() {
        let range = YearRange::current();
        assert_eq!(range.min, MIN_REGISTERED_YEAR);
        assert_eq!(range.max, Utc::now().year() + 1);
    }
}
