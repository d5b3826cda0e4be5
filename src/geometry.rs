//! Area-of-interest handling.
//!
//! The catalogue only understands WKT footprints in EPSG:4326, so every supported input
//! (WKT text, GeoJSON, ESRI Shapefile) is reduced to a single WKT `POLYGON`. When a file
//! holds several polygons they are merged; areas that stay disjoint after merging are an error.
//! Coordinates are passed through as-is; no reprojection happens here.

use anyhow::{Context, Result};
use geo::BooleanOps;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use geojson::GeoJson;
use shapefile::PolygonRing;
use shapefile::record::traits::HasXY;
use std::path::Path;
use wkt::{ToWkt, TryFromWkt};

use crate::error::Error;

/// Returns `true` when `text` parses as a WKT geometry.
pub fn is_wkt(text: &str) -> bool {
    text.trim().parse::<wkt::Wkt<f64>>().is_ok()
}

/// Resolves an area of interest to WKT.
///
/// `aoi` is either WKT text, returned normalized, or a path to a GeoJSON/Shapefile.
pub fn to_wkt(aoi: &str) -> Result<String> {
    if is_wkt(aoi) {
        return normalize_wkt(aoi);
    }
    file_to_wkt(Path::new(aoi.trim()))
}

/// Reads a GeoJSON (`.geojson`, `.json`) or Shapefile (`.shp`) and returns the union of its
/// polygons as WKT.
pub fn file_to_wkt(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let polygons = match ext.as_str() {
        "geojson" | "json" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            polygons_from_geojson(&text)
                .with_context(|| format!("failed to load area of interest from {}", path.display()))?
        }
        "shp" => polygons_from_shapefile(path)
            .with_context(|| format!("failed to load area of interest from {}", path.display()))?,
        _ => {
            return Err(Error::Geometry(format!(
                "unsupported file type for {} (expected .geojson, .json or .shp)",
                path.display()
            ))
            .into());
        }
    };

    polygons_to_wkt(polygons)
}

/// Converts GeoJSON text (geometry, feature or feature collection) to WKT.
pub fn geojson_to_wkt(text: &str) -> Result<String> {
    polygons_to_wkt(polygons_from_geojson(text)?)
}

/// Parses a WKT polygon and re-serializes it, closing rings on the way.
pub(crate) fn normalize_polygon_wkt(text: &str) -> Result<String> {
    let geometry = geo_types::Geometry::<f64>::try_from_wkt_str(text.trim())
        .map_err(|e| Error::Geometry(format!("footprint is not valid WKT: {}", e)))?;
    match geometry {
        geo_types::Geometry::Polygon(polygon) => Ok(polygon.wkt_string()),
        geo_types::Geometry::MultiPolygon(mp) if mp.0.len() == 1 => Ok(mp.0[0].wkt_string()),
        other => Err(Error::Geometry(format!(
            "footprint must be a single POLYGON, got {}",
            geometry_name(&other)
        ))
        .into()),
    }
}

fn geometry_name(geometry: &geo_types::Geometry<f64>) -> &'static str {
    match geometry {
        geo_types::Geometry::Point(_) => "POINT",
        geo_types::Geometry::Line(_) | geo_types::Geometry::LineString(_) => "LINESTRING",
        geo_types::Geometry::Polygon(_) => "POLYGON",
        geo_types::Geometry::MultiPoint(_) => "MULTIPOINT",
        geo_types::Geometry::MultiLineString(_) => "MULTILINESTRING",
        geo_types::Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        geo_types::Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        geo_types::Geometry::Rect(_) => "RECT",
        geo_types::Geometry::Triangle(_) => "TRIANGLE",
    }
}

fn normalize_wkt(text: &str) -> Result<String> {
    let geometry = geo_types::Geometry::<f64>::try_from_wkt_str(text.trim())
        .map_err(|e| Error::Geometry(format!("invalid WKT: {}", e)))?;
    Ok(geometry.wkt_string())
}

fn polygons_to_wkt(mut polygons: Vec<Polygon<f64>>) -> Result<String> {
    if polygons.len() > 1 {
        let merged = polygons
            .iter()
            .fold(MultiPolygon::<f64>::new(Vec::new()), |acc, p| {
                acc.union(&MultiPolygon::new(vec![p.clone()]))
            });
        polygons = merged.0;
    }
    match polygons.len() {
        0 => Err(Error::Geometry("no polygon geometry found".to_string()).into()),
        1 => Ok(polygons.remove(0).wkt_string()),
        n => Err(Error::Geometry(format!(
            "area of interest is made of {} disjoint polygons; the catalogue needs one connected area",
            n
        ))
        .into()),
    }
}

fn polygons_from_geojson(text: &str) -> Result<Vec<Polygon<f64>>> {
    let gj: GeoJson = text
        .parse()
        .map_err(|e| Error::Geometry(format!("invalid GeoJSON: {}", e)))?;

    let mut out = Vec::new();
    match gj {
        GeoJson::Geometry(g) => collect_geometry(&g.value, &mut out)?,
        GeoJson::Feature(f) => {
            if let Some(g) = f.geometry {
                collect_geometry(&g.value, &mut out)?;
            }
        }
        GeoJson::FeatureCollection(fc) => {
            for feature in fc.features {
                if let Some(g) = feature.geometry {
                    collect_geometry(&g.value, &mut out)?;
                }
            }
        }
    }
    Ok(out)
}

fn collect_geometry(value: &geojson::Value, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    match value {
        geojson::Value::Polygon(rings) => out.push(polygon_from_rings(rings)?),
        geojson::Value::MultiPolygon(polys) => {
            for rings in polys {
                out.push(polygon_from_rings(rings)?);
            }
        }
        geojson::Value::GeometryCollection(members) => {
            for g in members {
                collect_geometry(&g.value, out)?;
            }
        }
        // Points and lines carry no area.
        _ => {}
    }
    Ok(())
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| ring_from_positions(ring));
    let exterior = rings
        .next()
        .ok_or_else(|| Error::Geometry("polygon without exterior ring".to_string()))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_from_positions(ring: &[Vec<f64>]) -> Result<LineString<f64>> {
    ring.iter()
        .map(|pos| match pos.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(anyhow::Error::from(Error::Geometry(format!(
                "position {:?} has fewer than 2 values",
                pos
            )))),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn polygons_from_shapefile(path: &Path) -> Result<Vec<Polygon<f64>>> {
    let shapes = shapefile::read_shapes(path)
        .map_err(|e| Error::Geometry(format!("invalid shapefile: {}", e)))?;

    let mut out: Vec<Polygon<f64>> = Vec::new();
    for shape in shapes {
        match shape {
            shapefile::Shape::Polygon(p) => collect_rings(p.rings(), &mut out)?,
            // Z and M values are dropped; only x/y matter for a footprint.
            shapefile::Shape::PolygonM(p) => collect_rings(p.rings(), &mut out)?,
            shapefile::Shape::PolygonZ(p) => collect_rings(p.rings(), &mut out)?,
            shapefile::Shape::NullShape => continue,
            other => {
                return Err(Error::Geometry(format!(
                    "unsupported shape type {:?} (only polygons are accepted)",
                    other.shapetype()
                ))
                .into());
            }
        }
    }
    Ok(out)
}

/// Outer rings open a new polygon; inner rings are holes of the last one.
fn collect_rings<P: HasXY>(rings: &[PolygonRing<P>], out: &mut Vec<Polygon<f64>>) -> Result<()> {
    let mut current: Option<(LineString<f64>, Vec<LineString<f64>>)> = None;
    for ring in rings {
        let line: LineString<f64> = ring
            .points()
            .iter()
            .map(|p| Coord { x: p.x(), y: p.y() })
            .collect();
        match ring {
            PolygonRing::Outer(_) => {
                if let Some((exterior, holes)) = current.take() {
                    out.push(Polygon::new(exterior, holes));
                }
                current = Some((line, Vec::new()));
            }
            PolygonRing::Inner(_) => match current.as_mut() {
                Some((_, holes)) => holes.push(line),
                None => {
                    return Err(Error::Geometry("inner ring without outer ring".to_string()).into());
                }
            },
        }
    }
    if let Some((exterior, holes)) = current {
        out.push(Polygon::new(exterior, holes));
    }
    Ok(())
}
