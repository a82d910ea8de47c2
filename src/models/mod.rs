// src/models/mod.rs
//! Shared domain types for trend collection: country and niche enums,
//! the data types the sources can be asked for, and source identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single raw trend record as returned by a source adapter.
///
/// The resilience layer never interprets payload contents, so records stay
/// as opaque JSON rows end to end.
pub type RawRecord = serde_json::Value;

/// Supported collection countries (ISO 3166-1 alpha-2, TikTok markets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountryCode {
    US,
    BR,
    MX,
    ID,
    PH,
    VN,
    PK,
    BD,
    EG,
    NG,
    TH,
    JP,
    UK,
    DE,
    FR,
}

impl CountryCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountryCode::US => "US",
            CountryCode::BR => "BR",
            CountryCode::MX => "MX",
            CountryCode::ID => "ID",
            CountryCode::PH => "PH",
            CountryCode::VN => "VN",
            CountryCode::PK => "PK",
            CountryCode::BD => "BD",
            CountryCode::EG => "EG",
            CountryCode::NG => "NG",
            CountryCode::TH => "TH",
            CountryCode::JP => "JP",
            CountryCode::UK => "UK",
            CountryCode::DE => "DE",
            CountryCode::FR => "FR",
        }
    }

    pub fn all() -> &'static [CountryCode] {
        &[
            CountryCode::US,
            CountryCode::BR,
            CountryCode::MX,
            CountryCode::ID,
            CountryCode::PH,
            CountryCode::VN,
            CountryCode::PK,
            CountryCode::BD,
            CountryCode::EG,
            CountryCode::NG,
            CountryCode::TH,
            CountryCode::JP,
            CountryCode::UK,
            CountryCode::DE,
            CountryCode::FR,
        ]
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CountryCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CountryCode::all()
            .iter()
            .find(|c| c.as_str() == s.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| format!("unknown country code: {}", s))
    }
}

/// Content niche filters recognised by the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NicheType {
    BookTok,
    HealthTok,
    DiyTok,
    GamingTok,
    FinanceTok,
    MusicTok,
    ComedyTok,
    ActivismTok,
    FoodTok,
    BeautyTok,
    FashionTok,
    DanceTok,
    CommerceTok,
    EducationTok,
    LifestyleTok,
    TravelTok,
    EntertainmentTok,
    ArtTok,
    EntrepreneurTok,
}

impl NicheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NicheType::BookTok => "BOOKTOK",
            NicheType::HealthTok => "HEALTHTOK",
            NicheType::DiyTok => "DIYTOK",
            NicheType::GamingTok => "GAMINGTOK",
            NicheType::FinanceTok => "FINANCETOK",
            NicheType::MusicTok => "MUSICTOK",
            NicheType::ComedyTok => "COMEDYTOK",
            NicheType::ActivismTok => "ACTIVISMTOK",
            NicheType::FoodTok => "FOODTOK",
            NicheType::BeautyTok => "BEAUTYTOK",
            NicheType::FashionTok => "FASHIONTOK",
            NicheType::DanceTok => "DANCETOK",
            NicheType::CommerceTok => "COMMERCETOK",
            NicheType::EducationTok => "EDUCATIONTOK",
            NicheType::LifestyleTok => "LIFESTYLETOK",
            NicheType::TravelTok => "TRAVELLTOK",
            NicheType::EntertainmentTok => "ENTERTAINMENTTOK",
            NicheType::ArtTok => "ARTTOK",
            NicheType::EntrepreneurTok => "ENTREPRENEURTOK",
        }
    }
}

impl fmt::Display for NicheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kinds of trend data the orchestrator can be asked for.
///
/// `Videos` exists for rate-limit costing even though the fallback path
/// never requests it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Hashtags,
    Videos,
    Creators,
    Sounds,
    Trends,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Hashtags => "hashtags",
            DataType::Videos => "videos",
            DataType::Creators => "creators",
            DataType::Sounds => "sounds",
            DataType::Trends => "trends",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a trend as reported by the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "UP"),
            TrendDirection::Down => write!(f, "DOWN"),
            TrendDirection::Stable => write!(f, "STABLE"),
        }
    }
}

/// Identity of a data source in the fallback chain.
///
/// `Cached` is never a real adapter; it marks results served from the
/// stale-but-usable cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    OfficialApi,
    CreativeCenter,
    EmergencyFallback,
    Cached,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::OfficialApi => "OFFICIAL_API",
            SourceId::CreativeCenter => "CREATIVE_CENTER",
            SourceId::EmergencyFallback => "EMERGENCY_FALLBACK",
            SourceId::Cached => "CACHED_DATA",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_code_round_trips_through_str() {
        for country in CountryCode::all() {
            assert_eq!(country.as_str().parse::<CountryCode>().unwrap(), *country);
        }
        assert!("XX".parse::<CountryCode>().is_err());
    }

    #[test]
    fn country_code_parse_is_case_insensitive() {
        assert_eq!("us".parse::<CountryCode>().unwrap(), CountryCode::US);
    }

    #[test]
    fn data_type_names_match_endpoint_keys() {
        assert_eq!(DataType::Hashtags.as_str(), "hashtags");
        assert_eq!(DataType::Trends.to_string(), "trends");
    }
}
