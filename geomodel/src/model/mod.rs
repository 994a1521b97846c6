//! Placed model instances.
//!
//! A [`ModelInstance`] is the live handle for one placement request. It is
//! created by [`ModelLoader`](crate::loader::ModelLoader) in the `Loading`
//! state and becomes `Loaded` once its asset has been inserted into the
//! scene container and placed. Every operation that needs the asset fails
//! with [`ModelError::NotLoaded`] before that point and with
//! [`ModelError::Destroyed`] after [`ModelInstance::destroy`].
//!
//! # Example
//!
//! ```ignore
//! use geomodel::model::{ModelEvent, PlacementRequest};
//!
//! let model = loader.place(scene.clone(), PlacementRequest::new(url).with_height(5.0));
//! let mut events = model.subscribe();
//! model.ready().await?;
//! model.set_heading(90.0)?;
//! model.start_animations()?;
//! // ...
//! model.destroy();
//! ```

mod instance;
mod request;

pub use instance::ModelInstance;
pub use request::{CompleteFn, LoaderReadyFn, PlacementRequest};

use thiserror::Error;

use crate::animation::AnimationError;
use crate::asset::{AnimationClip, SceneObject};
use crate::cache::CacheError;

/// Lifecycle state of a model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Loading,
    Loaded,
    Failed,
    Destroyed,
}

/// Notifications emitted by a model instance.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// The asset was inserted and placed.
    Complete {
        object: SceneObject,
        animations: Vec<AnimationClip>,
    },
    /// Loading failed; the instance stays unusable.
    Failed { url: String, message: String },
}

impl ModelEvent {
    /// Event name as seen by listeners.
    pub fn name(&self) -> &'static str {
        match self {
            ModelEvent::Complete { .. } => "complete",
            ModelEvent::Failed { .. } => "failed",
        }
    }
}

/// Errors from model instance operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// The asset has not finished loading.
    #[error("Model is not loaded yet")]
    NotLoaded,

    /// The instance was destroyed.
    #[error("Model has been destroyed")]
    Destroyed,

    /// Loading failed earlier; the message is the original failure.
    #[error("Model failed to load: {0}")]
    LoadFailed(String),

    /// Animation playback requested for a model without clips.
    #[error("Model has no animation clips")]
    NoAnimations,

    /// Animation playback could not be started.
    #[error("Animation error: {0}")]
    Animation(AnimationError),

    /// The fetch or cache wait failed.
    #[error(transparent)]
    Load(#[from] CacheError),
}

impl From<AnimationError> for ModelError {
    fn from(e: AnimationError) -> Self {
        match e {
            AnimationError::NoClips => ModelError::NoAnimations,
            other => ModelError::Animation(other),
        }
    }
}
