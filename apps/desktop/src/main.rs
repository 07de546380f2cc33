mod config;
mod console;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{channel, ReqwestFetch, Session};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::load_settings,
    console::{ConsoleMap, ConsoleUi},
};

/// List the feature types of a WFS 2.0 endpoint and build map layers from them.
#[derive(Parser, Debug)]
#[command(name = "wfs-explorer", version)]
struct Args {
    /// Service endpoint; defaults to the configured one.
    #[arg(long)]
    endpoint: Option<String>,
    /// Feature type to display. Repeat to issue several picks back to back.
    #[arg(long = "select", value_name = "NAME")]
    select: Vec<String>,
    /// Only list feature types whose name or title contains this text.
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,
    /// Print the resulting layer descriptor as JSON.
    #[arg(long)]
    json: bool,
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let endpoint = args.endpoint.unwrap_or_else(|| settings.endpoint.clone());
    let fetch = ReqwestFetch::new(&settings.transport_options())?;

    let (handle, inbox) = channel();
    let mut session = Session::new(
        ConsoleUi::with_filter(args.filter.clone()),
        ConsoleMap::new(handle.clone()),
        Arc::new(fetch),
        inbox,
    );

    info!(%endpoint, "requesting capabilities");
    handle.submit_endpoint(endpoint.as_str())?;
    session.settle().await;
    if session.ui().warning {
        bail!("{endpoint} did not return usable WFS 2.0 capabilities");
    }
    info!(
        feature_types = session.ui().listed,
        shown = session.ui().shown.len(),
        "capabilities loaded"
    );

    if args.select.is_empty() {
        return Ok(());
    }
    for name in args.select {
        handle.select(name)?;
    }
    session.settle().await;

    let Some(layer) = session.controller().displayed_layer() else {
        match session.ui().failures.last() {
            Some((_, error)) => bail!("{error}"),
            None => bail!("no layer was displayed"),
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(layer)?);
    } else {
        println!();
        println!("layer      {} ({})", layer.name, layer.title);
        println!("geometry   {} {:?}", layer.geometry_field, layer.geometry_type);
        println!("fields     {}", layer.fields.len());
        println!("crs        {}", layer.spatial_reference);
        println!(
            "extent     {} {} {} {}",
            layer.extent.min_x, layer.extent.min_y, layer.extent.max_x, layer.extent.max_y
        );
        println!("source     {}", layer.source.get_feature_url);
        if session.map().framed.is_none() {
            println!("map        not framed");
        }
    }
    Ok(())
}
