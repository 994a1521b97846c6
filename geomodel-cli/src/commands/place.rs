//! Place command - load models into a headless scene and report placement.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use geomodel::cache::CacheStats;
use geomodel::logging::init_logging;
use geomodel::scene::HeadlessScene;
use geomodel::transform::{Rotation, Scale};
use geomodel::{LngLat, ModelInstance, ModelLoader, PlacementRequest};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::load_config;
use crate::error::CliError;

/// Arguments for the place command.
#[derive(Debug, Args)]
pub struct PlaceArgs {
    /// Model URL (http, https, file:// or a local path)
    pub url: String,

    /// Longitude in degrees
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub lng: f64,

    /// Latitude in degrees
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub lat: f64,

    /// Vertical scene coordinate; omit to keep the model's own
    #[arg(long, allow_hyphen_values = true)]
    pub height: Option<f64>,

    /// Uniform scale, or three comma-separated per-axis factors
    #[arg(long, value_delimiter = ',', default_value = "1")]
    pub scale: Vec<f64>,

    /// Rotation in degrees as x,y,z; omit to keep the model's own
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub rotation: Option<Vec<f64>>,

    /// Rotation about the vertical axis in degrees
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub heading: f64,

    /// Number of copies to place concurrently
    #[arg(long, default_value_t = 1)]
    pub copies: usize,

    /// Share one fetch between the copies
    #[arg(long)]
    pub use_cache: bool,

    /// Play animations for this many seconds after placing (Ctrl+C stops early)
    #[arg(long, default_value_t = 0)]
    pub animate_secs: u64,

    /// Configuration file (defaults to the platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl PlaceArgs {
    fn scale(&self) -> Result<Scale, CliError> {
        match self.scale.as_slice() {
            [s] => Ok(Scale::Uniform(*s)),
            [x, y, z] => Ok(Scale::from([*x, *y, *z])),
            other => Err(CliError::Config(format!(
                "--scale takes 1 or 3 values, got {}",
                other.len()
            ))),
        }
    }

    fn rotation(&self) -> Result<Option<Rotation>, CliError> {
        match self.rotation.as_deref() {
            None => Ok(None),
            Some([x, y, z]) => Ok(Some(Rotation::new(*x, *y, *z))),
            Some(other) => Err(CliError::Config(format!(
                "--rotation takes 3 values, got {}",
                other.len()
            ))),
        }
    }

    fn position(&self) -> Result<LngLat, CliError> {
        let position = LngLat::new(self.lng, self.lat);
        position
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(position)
    }

    fn request(&self) -> Result<PlacementRequest, CliError> {
        if self.copies == 0 {
            return Err(CliError::Config("--copies must be at least 1".to_string()));
        }
        let request = PlacementRequest::new(&self.url)
            .with_position(self.position()?)
            .with_height(self.height)
            .with_rotation(self.rotation()?)
            .with_scale(self.scale()?)
            .with_heading(self.heading)
            .with_cache(self.use_cache);
        Ok(request)
    }
}

/// Run the place command.
pub fn run(args: PlaceArgs) -> Result<(), CliError> {
    let request = args.request()?;
    let config = load_config(args.config.as_deref())?;
    let _logging = init_logging(args.log_file.as_deref())
        .map_err(|e| CliError::Setup(format!("Failed to initialise logging: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Setup(format!("Failed to create runtime: {}", e)))?;

    let shutdown = CancellationToken::new();
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        shutdown_handler.cancel();
    })
    .map_err(|e| CliError::Setup(format!("Failed to set signal handler: {}", e)))?;

    let loader = ModelLoader::from_config(&config)?;
    let scene = Arc::new(HeadlessScene::new(request.geo_position));

    println!("geomodel v{}", env!("CARGO_PKG_VERSION"));
    println!("=================");
    println!();
    println!("Model:    {}", args.url);
    println!("Position: {}", request.geo_position);
    println!("Copies:   {} (cache {})", args.copies, if args.use_cache { "on" } else { "off" });
    println!();

    runtime.block_on(async {
        let instances: Vec<ModelInstance> = (0..args.copies)
            .map(|_| loader.place(scene.clone(), request.clone()))
            .collect();

        let mut placed = Vec::new();
        for (i, instance) in instances.iter().enumerate() {
            match instance.ready().await {
                Ok(()) => {
                    print_instance(i, instance);
                    placed.push(instance.clone());
                }
                Err(e) => println!("  #{}: failed: {}", i, e),
            }
        }

        if placed.is_empty() {
            return Err(CliError::Setup("No model could be placed".to_string()));
        }

        if args.animate_secs > 0 {
            animate(&placed, Duration::from_secs(args.animate_secs), &shutdown).await;
        }

        println!();
        println!("Session Summary");
        println!("───────────────");
        println!("  Placed:  {} of {}", placed.len(), instances.len());
        println!("  Redraws: {}", scene.redraw_count());
        print_cache_stats(&loader.cache().stats());

        for instance in &instances {
            instance.destroy();
        }
        Ok(())
    })
}

async fn animate(placed: &[ModelInstance], duration: Duration, shutdown: &CancellationToken) {
    let mut playing = 0;
    for instance in placed {
        match instance.start_animations() {
            Ok(_) => playing += 1,
            Err(e) => warn!(error = %e, "Animation not started"),
        }
    }
    if playing == 0 {
        println!();
        println!("No animations to play.");
        return;
    }

    println!();
    println!("Animating {} model(s) for {}s, press Ctrl+C to stop", playing, duration.as_secs());
    info!(models = playing, secs = duration.as_secs(), "Animation started");

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.cancelled() => {}
    }

    for instance in placed {
        instance.stop_animations();
    }
}

fn print_instance(index: usize, instance: &ModelInstance) {
    let Some(object) = instance.get_object() else {
        return;
    };
    let t = object.transform();
    let clips = instance.get_animations().map_or(0, |clips| clips.len());
    println!(
        "  #{}: {} at ({:.2}, {:.2}, {:.2}) scale ({:.2}, {:.2}, {:.2}), {} node(s), {} clip(s)",
        index,
        object.id(),
        t.position.x,
        t.position.y,
        t.position.z,
        t.scale.x,
        t.scale.y,
        t.scale.z,
        object.read().node_count(),
        clips
    );
}

fn print_cache_stats(stats: &CacheStats) {
    println!("  Fetches: {}", stats.fetches);
    println!(
        "  Cache:   {} hits, {} waits, {} failures, {} abandoned, {} bypassed",
        stats.hits, stats.waits, stats.failures, stats.abandoned, stats.bypassed
    );
}
