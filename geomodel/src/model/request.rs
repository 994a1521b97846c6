//! Placement requests.

use std::fmt;
use std::sync::Arc;

use crate::asset::{AnimationClip, SceneObject};
use crate::coord::LngLat;
use crate::fetch::LoaderOptions;
use crate::transform::{Rotation, Scale};

/// Callback that adjusts fetch options before the fetch runs.
pub type LoaderReadyFn = Arc<dyn Fn(&mut LoaderOptions) + Send + Sync>;

/// Callback invoked with the placed object and its clips once loading completes.
pub type CompleteFn = Arc<dyn Fn(&SceneObject, &[AnimationClip]) + Send + Sync>;

/// Everything needed to load and place one model.
///
/// Defaults: position `[0, 0]`, height `0`, zero rotation, uniform scale `1`,
/// heading `0`, cache disabled.
#[derive(Clone)]
pub struct PlacementRequest {
    /// Model download URL; also the cache key.
    pub source_url: String,
    pub geo_position: LngLat,
    /// Vertical scene coordinate. `None` leaves the model's own Z alone.
    pub height: Option<f64>,
    /// Rotation in degrees. `None` leaves the model's own rotation alone.
    pub rotation: Option<Rotation>,
    pub scale: Scale,
    /// Rotation about the vertical axis in degrees, applied after `rotation`.
    pub heading: f64,
    /// Share one fetch and clone results for requests with the same URL.
    pub use_cache: bool,
    pub on_loader_ready: Option<LoaderReadyFn>,
    pub on_complete: Option<CompleteFn>,
}

impl PlacementRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            geo_position: LngLat::default(),
            height: Some(0.0),
            rotation: Some(Rotation::ZERO),
            scale: Scale::default(),
            heading: 0.0,
            use_cache: false,
            on_loader_ready: None,
            on_complete: None,
        }
    }

    pub fn with_position(mut self, position: impl Into<LngLat>) -> Self {
        self.geo_position = position.into();
        self
    }

    pub fn with_height(mut self, height: impl Into<Option<f64>>) -> Self {
        self.height = height.into();
        self
    }

    pub fn with_rotation(mut self, rotation: impl Into<Option<Rotation>>) -> Self {
        self.rotation = rotation.into();
        self
    }

    pub fn with_scale(mut self, scale: impl Into<Scale>) -> Self {
        self.scale = scale.into();
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn on_loader_ready<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut LoaderOptions) + Send + Sync + 'static,
    {
        self.on_loader_ready = Some(Arc::new(callback));
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&SceneObject, &[AnimationClip]) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for PlacementRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacementRequest")
            .field("source_url", &self.source_url)
            .field("geo_position", &self.geo_position)
            .field("height", &self.height)
            .field("rotation", &self.rotation)
            .field("scale", &self.scale)
            .field("heading", &self.heading)
            .field("use_cache", &self.use_cache)
            .field("on_loader_ready", &self.on_loader_ready.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}
