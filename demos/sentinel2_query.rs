use anyhow::Result;
use cdseapi::{AttributeFilter, Client, Mission, Order, Query};
use std::path::Path;

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure credentials via env vars or a `.cdserc` file.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = Client::from_env()?;

    let query = Query::new(Mission::Sentinel2, "2024-03-01", "2024-03-15")?
        .product_type("L2A")
        .footprint("POLYGON((12.4 41.8, 12.6 41.8, 12.6 42.0, 12.4 42.0, 12.4 41.8))")
        .order_by(Order::Desc)
        .limit(2)
        .attribute("cloudCover", AttributeFilter::range(0.0, 20.0));

    let products = client.query(&query)?;
    for p in &products {
        println!("{}  {}", p.id, p.name);
    }

    client.download_all(&products, Path::new("downloads"))?;
    Ok(())
}
