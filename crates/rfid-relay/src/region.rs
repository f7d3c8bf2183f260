//! Region resolution
//!
//! A reader refuses to transmit until a regulatory region is set. If none is
//! configured, the first supported region other than `Unspecified` is
//! applied.

use rfid_protocol::{param, Interrogator, ParamValue, ReaderError, Region};
use tracing::{debug, info};

use crate::error::RelayError;

/// Ensures the reader has an operating region
pub struct RegionResolver;

impl RegionResolver {
    /// Read the current region and apply the first supported one if unset
    ///
    /// Returns the region in effect afterwards.
    pub fn ensure_region<D: Interrogator>(device: &D) -> Result<Region, RelayError> {
        let current = device
            .param_get(param::REGION_ID)
            .and_then(|v| v.into_region(param::REGION_ID))
            .map_err(region_error)?;

        if current.is_set() {
            debug!("Reader region already set to {}", current);
            return Ok(current);
        }

        let supported = device
            .param_get(param::SUPPORTED_REGIONS)
            .and_then(|v| v.into_regions(param::SUPPORTED_REGIONS))
            .map_err(region_error)?;

        let region = supported
            .into_iter()
            .find(Region::is_set)
            .ok_or_else(|| {
                RelayError::RegionConfiguration("reader supports no regions".to_string())
            })?;

        device
            .param_set(param::REGION_ID, ParamValue::Region(region))
            .map_err(region_error)?;
        info!("Reader region set to {}", region);
        Ok(region)
    }
}

fn region_error(error: ReaderError) -> RelayError {
    if error.is_connection_lost() {
        RelayError::ConnectionLost
    } else {
        RelayError::RegionConfiguration(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfid_sim::{VirtualReader, VirtualReaderConfig};

    fn reader(region: Region, supported: Vec<Region>) -> VirtualReader {
        let config = VirtualReaderConfig {
            region,
            supported_regions: supported,
            ..Default::default()
        };
        let reader = VirtualReader::new("tmr:///COM_A", &config);
        reader.connect().unwrap();
        reader
    }

    #[test]
    fn test_first_supported_region_applied() {
        let reader = reader(Region::Unspecified, vec![Region::Europe, Region::NorthAmerica]);
        let region = RegionResolver::ensure_region(&reader).unwrap();
        assert_eq!(region, Region::Europe);
        assert_eq!(reader.region(), Region::Europe);
    }

    #[test]
    fn test_unspecified_entries_skipped() {
        let mixed = reader(Region::Unspecified, vec![Region::Unspecified, Region::Japan]);
        assert_eq!(RegionResolver::ensure_region(&mixed).unwrap(), Region::Japan);

        let only_unset = reader(Region::Unspecified, vec![Region::Unspecified]);
        assert!(matches!(
            RegionResolver::ensure_region(&only_unset),
            Err(RelayError::RegionConfiguration(_))
        ));
    }

    #[test]
    fn test_existing_region_kept() {
        let reader = reader(Region::Japan, vec![Region::Europe, Region::Japan]);
        assert_eq!(RegionResolver::ensure_region(&reader).unwrap(), Region::Japan);
        assert_eq!(reader.region(), Region::Japan);
    }

    #[test]
    fn test_no_supported_regions() {
        let reader = reader(Region::Unspecified, vec![]);
        let err = RegionResolver::ensure_region(&reader).unwrap_err();
        assert!(matches!(err, RelayError::RegionConfiguration(_)));
    }

    #[test]
    fn test_lost_reader() {
        let reader = reader(Region::Unspecified, vec![Region::Europe]);
        reader.lose_connection();
        assert!(matches!(
            RegionResolver::ensure_region(&reader),
            Err(RelayError::ConnectionLost)
        ));
    }
}
