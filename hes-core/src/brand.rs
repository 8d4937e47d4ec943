use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Meter manufacturer, selecting the OBIS object table used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterBrand {
    #[default]
    Hexing,
    Hexcell,
}

impl MeterBrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeterBrand::Hexing => "hexing",
            MeterBrand::Hexcell => "hexcell",
        }
    }

    /// Parse a brand name, falling back to Hexing for anything unrecognized
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            log::warn!("Unknown meter brand '{}', defaulting to Hexing", name);
            MeterBrand::Hexing
        })
    }
}

impl FromStr for MeterBrand {
    type Err = DlmsError;

    fn from_str(s: &str) -> DlmsResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hexing" => Ok(MeterBrand::Hexing),
            "hexcell" => Ok(MeterBrand::Hexcell),
            other => Err(DlmsError::Format(format!("Unknown meter brand '{}'", other))),
        }
    }
}

/// Configuration text is lenient: unknown brands become Hexing
impl<'de> Deserialize<'de> for MeterBrand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(MeterBrand::parse_or_default(&name))
    }
}

impl fmt::Display for MeterBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_parse() {
        assert_eq!("Hexcell".parse::<MeterBrand>().unwrap(), MeterBrand::Hexcell);
        assert_eq!(" hexing ".parse::<MeterBrand>().unwrap(), MeterBrand::Hexing);
        assert!("landis".parse::<MeterBrand>().is_err());
        assert_eq!(MeterBrand::parse_or_default("landis"), MeterBrand::Hexing);
    }

    #[test]
    fn test_brand_deserialize_is_lenient() {
        use serde::de::IntoDeserializer;
        use serde::de::value::{Error as ValueError, StrDeserializer};

        let de: StrDeserializer<'_, ValueError> = "HEXCELL".into_deserializer();
        assert_eq!(MeterBrand::deserialize(de).unwrap(), MeterBrand::Hexcell);
        let de: StrDeserializer<'_, ValueError> = "landis".into_deserializer();
        assert_eq!(MeterBrand::deserialize(de).unwrap(), MeterBrand::Hexing);
    }
}
