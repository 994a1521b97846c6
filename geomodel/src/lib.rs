//! geomodel - place glTF models on a map scene
//!
//! This library loads glTF/GLB models, places them at geographic positions
//! inside a 3D scene container, and plays their animations. Concurrent
//! requests for the same model URL share a single fetch through the
//! [`cache::AssetCache`]; each requester receives its own clone.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geomodel::config::GeomodelConfig;
//! use geomodel::loader::ModelLoader;
//! use geomodel::model::PlacementRequest;
//! use geomodel::scene::HeadlessScene;
//!
//! let loader = ModelLoader::from_config(&GeomodelConfig::load()?)?;
//! let scene = Arc::new(HeadlessScene::default());
//! let truck = loader
//!     .load(scene.clone(), PlacementRequest::new(url).with_position([10.0, 20.0]).with_cache(true))
//!     .await?;
//! truck.start_animations()?;
//! ```

pub mod animation;
pub mod asset;
pub mod cache;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod loader;
pub mod logging;
pub mod model;
pub mod scene;
pub mod transform;

pub use coord::LngLat;
pub use loader::ModelLoader;
pub use model::{ModelError, ModelEvent, ModelInstance, ModelState, PlacementRequest};
