use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use quakecast_catalog::{FilterParams, QuakeTelemetry};
use quakecast_service::{distance, QuakeService, ServiceConfig, ServiceError};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::runtime::Builder;

#[derive(Parser, Debug)]
#[command(name = "quakecast", version, about = "Seismic catalog queries and magnitude forecasts")]
struct Cli {
    /// Service configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lists catalog events matching a filter.
    Events(FilterArgs),
    /// Projects matching events onto heatmap points.
    Heatmap(FilterArgs),
    /// Lists events near a point with their distance.
    Nearby(PointArgs),
    /// Forecasts the next event near a point.
    Predict {
        #[command(flatten)]
        point: PointArgs,
        /// Train a fresh model before predicting.
        #[arg(long)]
        retrain: bool,
    },
    /// Summarizes recent activity near a point.
    Summary(PointArgs),
    /// Great-circle distance between two points.
    Distance {
        #[arg(long, allow_negative_numbers = true)]
        lat_a: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon_a: f64,
        #[arg(long, allow_negative_numbers = true)]
        lat_b: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon_b: f64,
        /// kilometers, miles, or nauticalMiles.
        #[arg(long, default_value = "km")]
        unit: String,
    },
}

#[derive(Args, Debug)]
struct FilterArgs {
    #[arg(long)]
    starttime: Option<String>,
    #[arg(long)]
    endtime: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    minmagnitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    maxmagnitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    minlatitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    maxlatitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    minlongitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    maxlongitude: Option<f64>,
    #[arg(long)]
    limit: Option<i64>,
    /// time, time-asc, magnitude, or magnitude-asc.
    #[arg(long)]
    orderby: Option<String>,
}

impl From<FilterArgs> for FilterParams {
    fn from(args: FilterArgs) -> Self {
        Self {
            starttime: args.starttime,
            endtime: args.endtime,
            minmagnitude: args.minmagnitude,
            maxmagnitude: args.maxmagnitude,
            minlatitude: args.minlatitude,
            maxlatitude: args.maxlatitude,
            minlongitude: args.minlongitude,
            maxlongitude: args.maxlongitude,
            limit: args.limit,
            orderby: args.orderby,
        }
    }
}

#[derive(Args, Debug)]
struct PointArgs {
    #[arg(long, allow_negative_numbers = true)]
    latitude: f64,
    #[arg(long, allow_negative_numbers = true)]
    longitude: f64,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    let telemetry = config.telemetry()?;
    let outcome = runtime.block_on(async {
        let outcome = run(cli.command, &config, telemetry.clone()).await;
        if let Some(telemetry) = &telemetry {
            telemetry.flush().await;
        }
        outcome
    })?;
    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let body = json!({ "status": err.status_code(), "error": err.payload().error });
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(
    command: Commands,
    config: &ServiceConfig,
    telemetry: Option<QuakeTelemetry>,
) -> Result<Result<Value, ServiceError>> {
    let service = match QuakeService::from_config(config, telemetry) {
        Ok(service) => service,
        Err(err) => return Ok(Err(err)),
    };
    match command {
        Commands::Events(args) => to_json(service.list_events(&args.into()).await),
        Commands::Heatmap(args) => to_json(service.heatmap(&args.into()).await),
        Commands::Nearby(point) => to_json(service.nearby(point.latitude, point.longitude).await),
        Commands::Predict { point, retrain } => to_json(
            service
                .predict(point.latitude, point.longitude, retrain)
                .await,
        ),
        Commands::Summary(point) => to_json(service.summary(point.latitude, point.longitude).await),
        Commands::Distance {
            lat_a,
            lon_a,
            lat_b,
            lon_b,
            unit,
        } => Ok(distance(lat_a, lon_a, lat_b, lon_b, &unit)),
    }
}

fn to_json<T: Serialize>(result: Result<T, ServiceError>) -> Result<Result<Value, ServiceError>> {
    match result {
        Ok(value) => Ok(Ok(serde_json::to_value(value)?)),
        Err(err) => Ok(Err(err)),
    }
}
