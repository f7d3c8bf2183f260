//! Regulatory regions an interrogator can operate under

/// Radio regulatory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Region {
    /// No region configured
    Unspecified,
    /// North America (FCC)
    NorthAmerica,
    /// European Union (ETSI EN 302 208)
    Europe,
    /// Korea
    Korea,
    /// India
    India,
    /// Japan
    Japan,
    /// People's Republic of China
    China,
    /// Australia
    Australia,
    /// New Zealand
    NewZealand,
    /// Brazil and other 902-907/915-928 MHz regions
    Brazil,
    /// Unrestricted, for lab use
    Open,
}

impl Region {
    /// Returns a short code for the region
    pub fn code(&self) -> &'static str {
        match self {
            Region::Unspecified => "UNSPEC",
            Region::NorthAmerica => "NA",
            Region::Europe => "EU3",
            Region::Korea => "KR2",
            Region::India => "IN",
            Region::Japan => "JP",
            Region::China => "PRC",
            Region::Australia => "AU",
            Region::NewZealand => "NZ",
            Region::Brazil => "BR",
            Region::Open => "OPEN",
        }
    }

    /// Whether a region has been configured
    pub fn is_set(&self) -> bool {
        *self != Region::Unspecified
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
