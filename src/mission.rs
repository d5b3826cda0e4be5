use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Sentinel missions served by the CDSE catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mission {
    Sentinel1,
    Sentinel2,
    Sentinel3,
    Sentinel5P,
    Sentinel6,
}

/// OData attribute type of a filterable product attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Integer,
    Double,
}

impl AttributeKind {
    /// Name used in `OData.CSC.<Name>Attribute` casts.
    pub(crate) fn odata_name(self) -> &'static str {
        match self {
            AttributeKind::String => "StringAttribute",
            AttributeKind::Integer => "IntegerAttribute",
            AttributeKind::Double => "DoubleAttribute",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: AttributeKind,
}

const fn attr(name: &'static str, kind: AttributeKind) -> AttributeSpec {
    AttributeSpec { name, kind }
}

use AttributeKind::{Double, Integer, String as Str};

const S1_PRODUCT_TYPES: &[&str] = &["RAW", "SLC", "GRD", "GRDH", "GRDM", "OCN", "IW", "EW"];
const S2_PRODUCT_TYPES: &[&str] = &["L1C", "L2A"];
const S3_PRODUCT_TYPES: &[&str] = &[
    "OL_1", "OL_2", "SL_1", "SL_2", "SR_1", "SR_2", "SR", "SY_2",
];
const S5P_PRODUCT_TYPES: &[&str] = &[
    "L1B_RA_BD1",
    "L1B_RA_BD2",
    "L1B_RA_BD3",
    "L1B_RA_BD4",
    "L1B_RA_BD5",
    "L1B_RA_BD6",
    "L1B_RA_BD7",
    "L1B_RA_BD8",
    "L2__AER_AI",
    "L2__AER_LH",
    "L2__CH4",
    "L2__CLOUD",
    "L2__CO",
    "L2__HCHO",
    "L2__NO2",
    "L2__NP_BD3",
    "L2__NP_BD6",
    "L2__NP_BD7",
    "L2__O3_TCL",
    "L2__O3__PR",
    "L2__O3",
    "L2__SO2",
];
const S6_PRODUCT_TYPES: &[&str] = &["MW_2__AMR", "P4_1B_LR", "P4_2__LR"];

const S1_ATTRIBUTES: &[AttributeSpec] = &[
    attr("orbitDirection", Str),
    attr("relativeOrbitNumber", Integer),
    attr("orbitNumber", Integer),
    attr("polarisationChannels", Str),
    attr("operationalMode", Str),
    attr("swathIdentifier", Str),
    attr("productClass", Str),
    attr("timeliness", Str),
];
const S2_ATTRIBUTES: &[AttributeSpec] = &[
    attr("cloudCover", Double),
    attr("relativeOrbitNumber", Integer),
    attr("orbitNumber", Integer),
    attr("tileId", Str),
    attr("orbitDirection", Str),
    attr("processingBaseline", Double),
    attr("platformSerialIdentifier", Str),
];
const S3_ATTRIBUTES: &[AttributeSpec] = &[
    attr("cloudCover", Double),
    attr("orbitDirection", Str),
    attr("relativeOrbitNumber", Integer),
    attr("orbitNumber", Integer),
    attr("cycleNumber", Integer),
    attr("timeliness", Str),
    attr("platformSerialIdentifier", Str),
];
const S5P_ATTRIBUTES: &[AttributeSpec] = &[
    attr("processingMode", Str),
    attr("orbitNumber", Integer),
    attr("processorVersion", Str),
    attr("platformSerialIdentifier", Str),
];
const S6_ATTRIBUTES: &[AttributeSpec] = &[
    attr("orbitDirection", Str),
    attr("relativeOrbitNumber", Integer),
    attr("cycleNumber", Integer),
    attr("timeliness", Str),
    attr("platformSerialIdentifier", Str),
];

impl Mission {
    pub const ALL: [Mission; 5] = [
        Mission::Sentinel1,
        Mission::Sentinel2,
        Mission::Sentinel3,
        Mission::Sentinel5P,
        Mission::Sentinel6,
    ];

    /// Collection name as used by the catalogue (`SENTINEL-2`).
    pub fn name(self) -> &'static str {
        match self {
            Mission::Sentinel1 => "SENTINEL-1",
            Mission::Sentinel2 => "SENTINEL-2",
            Mission::Sentinel3 => "SENTINEL-3",
            Mission::Sentinel5P => "SENTINEL-5P",
            Mission::Sentinel6 => "SENTINEL-6",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            Mission::Sentinel1 => "S1",
            Mission::Sentinel2 => "S2",
            Mission::Sentinel3 => "S3",
            Mission::Sentinel5P => "S5P",
            Mission::Sentinel6 => "S6",
        }
    }

    /// Keywords matched against product names by `contains(Name, ...)`.
    pub fn product_types(self) -> &'static [&'static str] {
        match self {
            Mission::Sentinel1 => S1_PRODUCT_TYPES,
            Mission::Sentinel2 => S2_PRODUCT_TYPES,
            Mission::Sentinel3 => S3_PRODUCT_TYPES,
            Mission::Sentinel5P => S5P_PRODUCT_TYPES,
            Mission::Sentinel6 => S6_PRODUCT_TYPES,
        }
    }

    /// Product attributes that may be used as query filters.
    pub fn attributes(self) -> &'static [AttributeSpec] {
        match self {
            Mission::Sentinel1 => S1_ATTRIBUTES,
            Mission::Sentinel2 => S2_ATTRIBUTES,
            Mission::Sentinel3 => S3_ATTRIBUTES,
            Mission::Sentinel5P => S5P_ATTRIBUTES,
            Mission::Sentinel6 => S6_ATTRIBUTES,
        }
    }

    pub fn attribute(self, name: &str) -> Option<AttributeSpec> {
        self.attributes().iter().copied().find(|a| a.name == name)
    }

    pub fn supports_product_type(self, product_type: &str) -> bool {
        self.product_types().contains(&product_type)
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Mission::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s) || m.short_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::InvalidQuery(format!(
                    "unknown mission '{}'; expected one of: {}",
                    s,
                    Mission::ALL
                        .iter()
                        .map(|m| m.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}
