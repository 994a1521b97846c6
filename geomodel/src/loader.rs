//! Loader facade.
//!
//! [`ModelLoader`] turns a [`PlacementRequest`] into a [`ModelInstance`]:
//!
//! ```text
//! place(container, request)
//!   │
//!   ├─ LoaderOptions  = fetcher defaults, then on_loader_ready
//!   ├─ AssetCache::resolve(url, use_cache, fetch)   (one fetch per URL)
//!   ├─ container.add(object)
//!   ├─ scale → rotation → heading → position → height
//!   └─ on_complete, ModelEvent::Complete
//! ```
//!
//! Destroying the instance while the load is in flight cancels it. The asset
//! is then never inserted, and an owned cache lock is released.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::animation::DEFAULT_FRAME_INTERVAL;
use crate::cache::AssetCache;
use crate::config::GeomodelConfig;
use crate::fetch::{AssetFetcher, FetchError, HttpAssetFetcher};
use crate::model::{ModelError, ModelInstance, PlacementRequest};
use crate::scene::SceneContainer;

/// Places models into scene containers.
///
/// Cheap to clone; clones share the fetcher and the cache.
#[derive(Clone)]
pub struct ModelLoader {
    fetcher: Arc<dyn AssetFetcher>,
    cache: Arc<AssetCache>,
    frame_interval: Duration,
}

impl ModelLoader {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, cache: Arc<AssetCache>) -> Self {
        Self {
            fetcher,
            cache,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }

    /// Builds an HTTP-backed loader with a fresh cache from configuration.
    pub fn from_config(config: &GeomodelConfig) -> Result<Self, FetchError> {
        let fetcher = HttpAssetFetcher::with_settings(config.http.timeout, &config.http.user_agent)?;
        let cache = AssetCache::new(config.cache.clone());
        Ok(Self::new(Arc::new(fetcher), Arc::new(cache)).with_frame_interval(config.frame_interval))
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    /// Starts loading in the background and returns the instance immediately.
    ///
    /// Use [`ModelInstance::ready`] or [`ModelInstance::subscribe`] to learn
    /// the outcome.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn place(&self, container: Arc<dyn SceneContainer>, request: PlacementRequest) -> ModelInstance {
        let instance = ModelInstance::new(container, request, self.frame_interval);
        let loader = self.clone();
        let handle = instance.clone();
        tokio::spawn(async move {
            // failures are recorded on the instance
            let _ = loader.load_into(&handle).await;
        });
        instance
    }

    /// Loads and places a model, returning once it is in the scene.
    ///
    /// # Errors
    ///
    /// - [`ModelError::Load`] if the fetch or cache wait failed
    /// - [`ModelError::Destroyed`] if the instance was destroyed mid-load
    pub async fn load(
        &self,
        container: Arc<dyn SceneContainer>,
        request: PlacementRequest,
    ) -> Result<ModelInstance, ModelError> {
        let instance = ModelInstance::new(container, request, self.frame_interval);
        self.load_into(&instance).await?;
        Ok(instance)
    }

    #[instrument(skip_all, fields(url = %instance.request().source_url))]
    async fn load_into(&self, instance: &ModelInstance) -> Result<(), ModelError> {
        let request = instance.request();

        let mut options = self.fetcher.default_options();
        if let Some(on_loader_ready) = &request.on_loader_ready {
            on_loader_ready(&mut options);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let url = request.source_url.clone();
        let fetch = move || async move { fetcher.fetch(&url, options).await };

        let cancel = instance.load_token();
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Load cancelled by destroy");
                return Err(ModelError::Destroyed);
            }
            result = self.cache.resolve(&request.source_url, request.use_cache, fetch) => result,
        };

        match resolved {
            Ok(asset) => instance.attach(asset),
            Err(e) => {
                let error = ModelError::from(e);
                instance.fail(&error);
                Err(error)
            }
        }
    }
}
