use serde::{Deserialize, Serialize};

use storefront_core::DomainError;

/// Implements `as_str` and a case-insensitive `FromStr` over the wire names.
macro_rules! wire_enum {
    ($t:ident, $label:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $t {
            pub const ALL: &'static [$t] = &[$($t::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($t::$variant => $name),+
                }
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $t::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| DomainError::validation(format!("invalid {}: '{}'", $label, s)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Foreign,
    Local,
}

wire_enum!(Condition, "condition", { Foreign => "foreign", Local => "local" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Sold,
}

wire_enum!(Availability, "availability", { Available => "available", Sold => "sold" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transmission {
    Automatic,
    #[serde(rename = "CVT")]
    Cvt,
    #[serde(rename = "AMT")]
    Amt,
    Manual,
}

wire_enum!(Transmission, "transmission", {
    Automatic => "Automatic",
    Cvt => "CVT",
    Amt => "AMT",
    Manual => "Manual",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Petrol,
    Diesel,
    Hybrid,
    Electric,
    Cng,
}

wire_enum!(FuelType, "fuel type", {
    Petrol => "petrol",
    Diesel => "diesel",
    Hybrid => "hybrid",
    Electric => "electric",
    Cng => "cng",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteriorMaterial {
    Fabric,
    Leather,
}

wire_enum!(InteriorMaterial, "interior material", { Fabric => "fabric", Leather => "leather" });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_ignores_case() {
        assert_eq!("cvt".parse::<Transmission>().unwrap(), Transmission::Cvt);
        assert_eq!("Petrol".parse::<FuelType>().unwrap(), FuelType::Petrol);
        assert!("hovercraft".parse::<FuelType>().is_err());
    }

    #[test]
    fn serde_names_match_as_str() {
        for t in Transmission::ALL {
            let json = serde_json::to_string(t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
        for c in Condition::ALL {
            let json = serde_json::to_string(c).unwrap();
            assert_eq!(json, format!("\"{}\"", c.as_str()));
        }
    }
}
