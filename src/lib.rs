//! A small Rust client for the Copernicus Data Space Ecosystem (CDSE) catalogue.
//!
//! The flow is: describe a search with [`Query`], run it with [`Client::query`] (which pages
//! through the OData `Products` endpoint), then fetch the results with
//! [`Client::download_all`].
//!
//! ## Quick start
//! - Pass your CDSE username/password to [`Client::new`], or configure them via environment
//!   variables (`CDSE_USERNAME`, `CDSE_PASSWORD`) or a `.cdserc` file (current directory or
//!   home directory) and call [`Client::from_env`].
//! - Areas of interest can be given as WKT or loaded from GeoJSON/Shapefile with [`to_wkt`].
//!
//! ```no_run
//! use anyhow::Result;
//! use cdseapi::{AttributeFilter, Client, Mission, Order, Query};
//!
//! fn main() -> Result<()> {
//!     let client = Client::from_env()?;
//!     let aoi = cdseapi::to_wkt("aoi.geojson")?;
//!     let query = Query::new(Mission::Sentinel2, "2024-03-01", "2024-03-15")?
//!         .product_type("L2A")
//!         .footprint(&aoi)
//!         .order_by(Order::Desc)
//!         .limit(5)
//!         .attribute("cloudCover", AttributeFilter::range(0.0, 20.0));
//!
//!     let products = client.query(&query)?;
//!     client.download_all(&products, std::path::Path::new("downloads"))?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;
mod download;
mod error;
mod geometry;
mod mission;
mod product;
mod query;
mod util;

pub use client::{Client, ClientConfig};
pub use error::Error;
pub use geometry::{file_to_wkt, geojson_to_wkt, is_wkt, to_wkt};
pub use mission::{AttributeKind, AttributeSpec, Mission};
pub use product::Product;
pub use query::{AttributeFilter, AttributeValue, Order, Query};
