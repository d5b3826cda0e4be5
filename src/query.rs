//! OData filter construction for the CDSE `Products` endpoint.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;
use crate::geometry::normalize_polygon_wkt;
use crate::mission::{AttributeKind, Mission};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Sort direction on acquisition start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        })
    }
}

/// A single literal for an attribute filter.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Double(f64),
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

/// Constraint on one product attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeFilter {
    /// Attribute equals any of the listed values.
    AnyOf(Vec<AttributeValue>),
    /// Inclusive numeric range, e.g. `cloudCover` between 0 and 30.
    Range { min: f64, max: f64 },
}

impl AttributeFilter {
    pub fn any_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        AttributeFilter::AnyOf(values.into_iter().map(Into::into).collect())
    }

    pub fn range(min: f64, max: f64) -> Self {
        AttributeFilter::Range { min, max }
    }
}

macro_rules! single_value_filter {
    ($($t:ty),*) => {
        $(
            impl From<$t> for AttributeFilter {
                fn from(v: $t) -> Self {
                    AttributeFilter::AnyOf(vec![v.into()])
                }
            }
        )*
    };
}

single_value_filter!(&str, String, i64, i32, f64);

/// A catalogue search.
///
/// ```
/// use cdseapi::{AttributeFilter, Mission, Order, Query};
///
/// let query = Query::new(Mission::Sentinel2, "2023-06-01", "2023-06-15")?
///     .product_type("L2A")
///     .order_by(Order::Desc)
///     .limit(20)
///     .attribute("cloudCover", AttributeFilter::range(0.0, 30.0))
///     .attribute("tileId", AttributeFilter::any_of(["T33UUP", "T33UVP"]));
/// assert!(query.filter_expression()?.contains("contains(Name,'L2A')"));
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    mission: Mission,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    product_type: Option<String>,
    exclude: Option<String>,
    footprint: Option<String>,
    order: Option<Order>,
    limit: Option<usize>,
    attributes: BTreeMap<String, AttributeFilter>,
}

impl Query {
    /// Starts a query over `[start, end)` acquisition time.
    ///
    /// Times are `YYYY-MM-DD` (midnight UTC) or RFC 3339.
    pub fn new(mission: Mission, start: &str, end: &str) -> anyhow::Result<Self> {
        let start = parse_time(start)?;
        let end = parse_time(end)?;
        if end <= start {
            return Err(Error::InvalidQuery(format!(
                "end time {} is not after start time {}",
                end.format(DATE_FORMAT),
                start.format(DATE_FORMAT)
            ))
            .into());
        }

        Ok(Self {
            mission,
            start,
            end,
            product_type: None,
            exclude: None,
            footprint: None,
            order: None,
            limit: None,
            attributes: BTreeMap::new(),
        })
    }

    pub fn product_type(mut self, product_type: &str) -> Self {
        self.product_type = Some(product_type.to_string());
        self
    }

    /// Drops products whose name contains `keyword`.
    pub fn exclude(mut self, keyword: &str) -> Self {
        self.exclude = Some(keyword.to_string());
        self
    }

    /// WKT polygon in EPSG:4326; see [`crate::to_wkt`] for file inputs.
    pub fn footprint(mut self, wkt: &str) -> Self {
        self.footprint = Some(wkt.to_string());
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn attribute(mut self, name: &str, filter: impl Into<AttributeFilter>) -> Self {
        self.attributes.insert(name.to_string(), filter.into());
        self
    }

    pub fn mission(&self) -> Mission {
        self.mission
    }

    pub fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// Builds the `$filter` expression, validating every parameter against the mission schema.
    pub fn filter_expression(&self) -> anyhow::Result<String> {
        let mut clauses = vec![
            format!("Collection/Name eq {}", quote(self.mission.name())),
            format!("ContentDate/Start gt {}", self.start.format(DATE_FORMAT)),
            format!("ContentDate/Start lt {}", self.end.format(DATE_FORMAT)),
        ];

        if let Some(pt) = &self.product_type {
            if !self.mission.supports_product_type(pt) {
                return Err(Error::InvalidQuery(format!(
                    "product type '{}' not found for {}; must be one of: {}",
                    pt,
                    self.mission,
                    self.mission.product_types().join(", ")
                ))
                .into());
            }
            clauses.push(format!("contains(Name,{})", quote(pt)));
        }

        if let Some(ex) = &self.exclude {
            clauses.push(format!("not contains(Name,{})", quote(ex)));
        }

        if let Some(fp) = &self.footprint {
            let wkt = normalize_polygon_wkt(fp)?;
            clauses.push(format!(
                "OData.CSC.Intersects(area=geography'SRID=4326;{}')",
                wkt
            ));
        }

        for (name, filter) in &self.attributes {
            clauses.push(self.attribute_clause(name, filter)?);
        }

        Ok(clauses.join(" and "))
    }

    /// Query parameters for one page of results.
    pub fn page_params(&self, top: usize, skip: usize) -> anyhow::Result<Vec<(String, String)>> {
        let mut params = vec![("$filter".to_string(), self.filter_expression()?)];
        if let Some(order) = self.order {
            params.push((
                "$orderby".to_string(),
                format!("ContentDate/Start {}", order),
            ));
        }
        params.push(("$top".to_string(), top.to_string()));
        params.push(("$skip".to_string(), skip.to_string()));
        params.push(("$expand".to_string(), "Attributes".to_string()));
        Ok(params)
    }

    fn attribute_clause(&self, name: &str, filter: &AttributeFilter) -> anyhow::Result<String> {
        let spec = self.mission.attribute(name).ok_or_else(|| {
            Error::InvalidQuery(format!(
                "'{}' is not a filterable attribute of {}; valid attributes: {}",
                name,
                self.mission,
                self.mission
                    .attributes()
                    .iter()
                    .map(|a| a.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        let cast = spec.kind.odata_name();
        let value_ref = format!("att/OData.CSC.{}/Value", cast);

        let condition = match filter {
            AttributeFilter::AnyOf(values) => {
                if values.is_empty() {
                    return Err(
                        Error::InvalidQuery(format!("no values given for '{}'", name)).into(),
                    );
                }
                let parts = values
                    .iter()
                    .map(|v| Ok(format!("{} eq {}", value_ref, literal(name, spec.kind, v)?)))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                if parts.len() == 1 {
                    parts[0].clone()
                } else {
                    format!("({})", parts.join(" or "))
                }
            }
            AttributeFilter::Range { min, max } => {
                if spec.kind == AttributeKind::String {
                    return Err(Error::InvalidQuery(format!(
                        "'{}' is a string attribute and cannot be filtered by range",
                        name
                    ))
                    .into());
                }
                if !min.is_finite() || !max.is_finite() {
                    return Err(Error::InvalidQuery(format!(
                        "range for '{}' must have finite bounds, got [{}, {}]",
                        name, min, max
                    ))
                    .into());
                }
                if spec.kind == AttributeKind::Integer && (min.fract() != 0.0 || max.fract() != 0.0)
                {
                    return Err(Error::InvalidQuery(format!(
                        "'{}' is an integer attribute; range bounds [{}, {}] must be whole numbers",
                        name, min, max
                    ))
                    .into());
                }
                if min > max {
                    return Err(Error::InvalidQuery(format!(
                        "range for '{}' must be [min, max], got [{}, {}]",
                        name, min, max
                    ))
                    .into());
                }
                format!(
                    "{} ge {} and {} le {}",
                    value_ref,
                    numeric_literal(spec.kind, *min),
                    value_ref,
                    numeric_literal(spec.kind, *max)
                )
            }
        };

        Ok(format!(
            "Attributes/OData.CSC.{}/any(att:att/Name eq {} and {})",
            cast,
            quote(name),
            condition
        ))
    }
}

fn parse_time(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            Error::InvalidQuery(format!(
                "malformed time '{}': expected YYYY-MM-DD or RFC 3339",
                s
            ))
            .into()
        })
}

/// OData string literal: single quotes, embedded quotes doubled.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn literal(name: &str, kind: AttributeKind, value: &AttributeValue) -> anyhow::Result<String> {
    let text = match (kind, value) {
        (AttributeKind::String, AttributeValue::String(s)) => quote(s),
        (AttributeKind::Integer, AttributeValue::Integer(i)) => i.to_string(),
        (AttributeKind::Double, AttributeValue::Integer(i)) => format_double(*i as f64),
        (AttributeKind::Double, AttributeValue::Double(d)) if d.is_finite() => format_double(*d),
        (AttributeKind::Double, AttributeValue::Double(d)) => {
            return Err(Error::InvalidQuery(format!(
                "value {} for '{}' is not a finite number",
                d, name
            ))
            .into());
        }
        (kind, value) => {
            return Err(Error::InvalidQuery(format!(
                "value {:?} does not match the {:?} type of '{}'",
                value, kind, name
            ))
            .into());
        }
    };
    Ok(text)
}

fn numeric_literal(kind: AttributeKind, v: f64) -> String {
    match kind {
        AttributeKind::Integer => format!("{}", v as i64),
        _ => format_double(v),
    }
}

fn format_double(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}
