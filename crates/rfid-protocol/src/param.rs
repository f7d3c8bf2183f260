//! Parameter paths and values exchanged with an interrogator

use crate::error::ReaderError;
use crate::plan::ReadPlan;
use crate::region::Region;

/// Currently configured region
pub const REGION_ID: &str = "/reader/region/id";
/// Regions the hardware supports (read-only)
pub const SUPPORTED_REGIONS: &str = "/reader/region/supportedRegions";
/// Active read plan
pub const READ_PLAN: &str = "/reader/read/plan";

/// A typed parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A single region
    Region(Region),
    /// A list of regions
    Regions(Vec<Region>),
    /// A read plan
    ReadPlan(ReadPlan),
}

impl ParamValue {
    /// Unwrap a region value read from `path`
    pub fn into_region(self, path: &str) -> Result<Region, ReaderError> {
        match self {
            ParamValue::Region(region) => Ok(region),
            other => Err(mismatch(path, "region", &other)),
        }
    }

    /// Unwrap a region list read from `path`
    pub fn into_regions(self, path: &str) -> Result<Vec<Region>, ReaderError> {
        match self {
            ParamValue::Regions(regions) => Ok(regions),
            other => Err(mismatch(path, "region list", &other)),
        }
    }

    /// Unwrap a read plan read from `path`
    pub fn into_read_plan(self, path: &str) -> Result<ReadPlan, ReaderError> {
        match self {
            ParamValue::ReadPlan(plan) => Ok(plan),
            other => Err(mismatch(path, "read plan", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Region(_) => "region",
            ParamValue::Regions(_) => "region list",
            ParamValue::ReadPlan(_) => "read plan",
        }
    }
}

fn mismatch(path: &str, expected: &str, got: &ParamValue) -> ReaderError {
    ReaderError::InvalidParameter {
        path: path.to_string(),
        reason: format!("expected {}, got {}", expected, got.kind()),
    }
}
