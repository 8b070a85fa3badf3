//! Regional aggregate types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Administrative region granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminLevel {
    Country,
    Admin1,
    Admin2,
    Admin3,
}

impl AdminLevel {
    pub const ALL: [AdminLevel; 4] = [
        AdminLevel::Country,
        AdminLevel::Admin1,
        AdminLevel::Admin2,
        AdminLevel::Admin3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Admin1 => "admin1",
            Self::Admin2 => "admin2",
            Self::Admin3 => "admin3",
        }
    }
}

/// Aggregate value for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionValue {
    pub id: String,
    pub value: f64,
}

impl RegionValue {
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

/// Regional aggregates for all admin levels at one timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionalAdmins {
    #[serde(default)]
    pub country: Vec<RegionValue>,
    #[serde(default)]
    pub admin1: Vec<RegionValue>,
    #[serde(default)]
    pub admin2: Vec<RegionValue>,
    #[serde(default)]
    pub admin3: Vec<RegionValue>,
}

impl RegionalAdmins {
    pub fn level(&self, level: AdminLevel) -> &[RegionValue] {
        match level {
            AdminLevel::Country => &self.country,
            AdminLevel::Admin1 => &self.admin1,
            AdminLevel::Admin2 => &self.admin2,
            AdminLevel::Admin3 => &self.admin3,
        }
    }

    pub fn level_mut(&mut self, level: AdminLevel) -> &mut Vec<RegionValue> {
        match level {
            AdminLevel::Country => &mut self.country,
            AdminLevel::Admin1 => &mut self.admin1,
            AdminLevel::Admin2 => &mut self.admin2,
            AdminLevel::Admin3 => &mut self.admin3,
        }
    }

    /// Apply `f` to each level independently.
    pub fn map_levels<F>(&self, mut f: F) -> RegionalAdmins
    where
        F: FnMut(&[RegionValue]) -> Vec<RegionValue>,
    {
        RegionalAdmins {
            country: f(&self.country),
            admin1: f(&self.admin1),
            admin2: f(&self.admin2),
            admin3: f(&self.admin3),
        }
    }

    pub fn region_count(&self) -> usize {
        self.country.len() + self.admin1.len() + self.admin2.len() + self.admin3.len()
    }
}

/// Per-qualifier values for one region (e.g. one value per crop type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifierRegionValue {
    pub id: String,
    pub values: BTreeMap<String, f64>,
}

/// Qualifier breakdown for all admin levels at one timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualifierAdmins {
    #[serde(default)]
    pub country: Vec<QualifierRegionValue>,
    #[serde(default)]
    pub admin1: Vec<QualifierRegionValue>,
    #[serde(default)]
    pub admin2: Vec<QualifierRegionValue>,
    #[serde(default)]
    pub admin3: Vec<QualifierRegionValue>,
}

impl QualifierAdmins {
    /// Apply `f` to each level independently.
    pub fn map_levels<F>(&self, mut f: F) -> QualifierAdmins
    where
        F: FnMut(&[QualifierRegionValue]) -> Vec<QualifierRegionValue>,
    {
        QualifierAdmins {
            country: f(&self.country),
            admin1: f(&self.admin1),
            admin2: f(&self.admin2),
            admin3: f(&self.admin3),
        }
    }
}
