//! The live model handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ModelError, ModelEvent, ModelState, PlacementRequest};
use crate::animation::{AnimationController, StartOutcome};
use crate::asset::{AnimationClip, GltfAsset, SceneObject};
use crate::coord::LngLat;
use crate::scene::SceneContainer;
use crate::transform::{self, Rotation, Scale};

/// Capacity of the per-instance event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

enum InstanceState {
    Loading,
    Loaded {
        object: SceneObject,
        animations: Vec<AnimationClip>,
    },
    Failed(String),
    Destroyed,
}

impl InstanceState {
    fn public(&self) -> ModelState {
        match self {
            InstanceState::Loading => ModelState::Loading,
            InstanceState::Loaded { .. } => ModelState::Loaded,
            InstanceState::Failed(_) => ModelState::Failed,
            InstanceState::Destroyed => ModelState::Destroyed,
        }
    }
}

struct Inner {
    request: PlacementRequest,
    container: Arc<dyn SceneContainer>,
    // Lock order: state before animation.
    state: Mutex<InstanceState>,
    animation: Mutex<AnimationController>,
    events: broadcast::Sender<ModelEvent>,
    status: watch::Sender<ModelState>,
    load_token: CancellationToken,
}

/// Handle to one placed model.
///
/// Clones share the same instance.
#[derive(Clone)]
pub struct ModelInstance {
    inner: Arc<Inner>,
}

impl ModelInstance {
    pub(crate) fn new(
        container: Arc<dyn SceneContainer>,
        request: PlacementRequest,
        frame_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(ModelState::Loading);
        Self {
            inner: Arc::new(Inner {
                request,
                container,
                state: Mutex::new(InstanceState::Loading),
                animation: Mutex::new(AnimationController::new(frame_interval)),
                events,
                status,
                load_token: CancellationToken::new(),
            }),
        }
    }

    pub fn request(&self) -> &PlacementRequest {
        &self.inner.request
    }

    pub fn state(&self) -> ModelState {
        self.inner.state.lock().public()
    }

    /// Subscribes to `complete` and `failed` events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.inner.events.subscribe()
    }

    /// Waits until loading has finished, successfully or not.
    pub async fn ready(&self) -> Result<(), ModelError> {
        let mut status = self.inner.status.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = status.wait_for(|s| *s != ModelState::Loading).await;
        self.check_loaded().map(|_| ())
    }

    pub(crate) fn load_token(&self) -> CancellationToken {
        self.inner.load_token.clone()
    }

    /// Inserts a freshly resolved asset and applies the placement.
    ///
    /// The state lock is never held while the container is called, so
    /// container hooks may read the instance back.
    pub(crate) fn attach(&self, asset: GltfAsset) -> Result<(), ModelError> {
        let (object, animations) = asset.into_parts();
        let request = &self.inner.request;
        {
            let mut state = self.inner.state.lock();
            if !matches!(*state, InstanceState::Loading) {
                debug!(url = %request.source_url, "Instance no longer loading, discarding asset");
                return Err(ModelError::Destroyed);
            }
            *state = InstanceState::Loaded {
                object: object.clone(),
                animations: animations.clone(),
            };
        }

        self.inner.container.add(&object);
        self.apply_placement(&object);

        // destroy() may have run while the container was being called
        if !self.holds(&object) {
            self.inner.container.remove(&object);
            debug!(url = %request.source_url, "Instance destroyed during placement");
            return Err(ModelError::Destroyed);
        }
        self.inner.status.send_replace(ModelState::Loaded);

        info!(
            url = %request.source_url,
            object = %object.id(),
            position = %request.geo_position,
            animations = animations.len(),
            "Model placed"
        );

        if let Some(on_complete) = &request.on_complete {
            on_complete(&object, &animations);
        }
        let _ = self.inner.events.send(ModelEvent::Complete { object, animations });
        Ok(())
    }

    /// Records a load failure and notifies listeners.
    pub(crate) fn fail(&self, error: &ModelError) {
        let message = error.to_string();
        {
            let mut state = self.inner.state.lock();
            if !matches!(*state, InstanceState::Loading) {
                return;
            }
            *state = InstanceState::Failed(message.clone());
        }
        self.inner.status.send_replace(ModelState::Failed);

        warn!(url = %self.inner.request.source_url, error = %message, "Model failed to load");
        let _ = self.inner.events.send(ModelEvent::Failed {
            url: self.inner.request.source_url.clone(),
            message,
        });
    }

    /// Applies scale, rotation, heading, position and height in that order.
    fn apply_placement(&self, object: &SceneObject) {
        let request = &self.inner.request;
        let container = &self.inner.container;

        transform::apply_scale(&mut object.write().transform, request.scale);
        container.request_redraw();

        if transform::apply_rotation(&mut object.write().transform, request.rotation) {
            container.request_redraw();
        }

        transform::apply_heading(&mut object.write().transform, request.heading);
        container.request_redraw();

        let scene_xy = container.convert_geo_to_scene(request.geo_position);
        transform::apply_position(&mut object.write().transform, scene_xy);
        container.request_redraw();

        if transform::apply_height(&mut object.write().transform, request.height) {
            container.request_redraw();
        }
    }

    fn holds(&self, object: &SceneObject) -> bool {
        match &*self.inner.state.lock() {
            InstanceState::Loaded { object: current, .. } => current.same_object(object),
            _ => false,
        }
    }

    fn check_loaded(&self) -> Result<SceneObject, ModelError> {
        match &*self.inner.state.lock() {
            InstanceState::Loaded { object, .. } => Ok(object.clone()),
            InstanceState::Loading => Err(ModelError::NotLoaded),
            InstanceState::Failed(message) => Err(ModelError::LoadFailed(message.clone())),
            InstanceState::Destroyed => Err(ModelError::Destroyed),
        }
    }

    /// Sets a uniform or per-axis scale.
    pub fn set_scale(&self, scale: impl Into<Scale>) -> Result<(), ModelError> {
        let object = self.check_loaded()?;
        transform::apply_scale(&mut object.write().transform, scale.into());
        self.inner.container.request_redraw();
        Ok(())
    }

    /// Sets the rotation in degrees. `None` keeps the current rotation.
    pub fn set_rotation(&self, rotation: impl Into<Option<Rotation>>) -> Result<(), ModelError> {
        let Some(rotation) = rotation.into() else {
            return Ok(());
        };
        let object = self.check_loaded()?;
        transform::apply_rotation(&mut object.write().transform, Some(rotation));
        self.inner.container.request_redraw();
        Ok(())
    }

    /// Sets the rotation about the vertical axis, keeping X and Z rotation.
    pub fn set_heading(&self, heading_deg: f64) -> Result<(), ModelError> {
        let object = self.check_loaded()?;
        transform::apply_heading(&mut object.write().transform, heading_deg);
        self.inner.container.request_redraw();
        Ok(())
    }

    /// Moves the model to a geographic position; height is unchanged.
    pub fn set_position(&self, position: impl Into<LngLat>) -> Result<(), ModelError> {
        let object = self.check_loaded()?;
        let scene_xy = self.inner.container.convert_geo_to_scene(position.into());
        transform::apply_position(&mut object.write().transform, scene_xy);
        self.inner.container.request_redraw();
        Ok(())
    }

    /// Sets the vertical scene coordinate. `None` keeps the current height;
    /// `Some(0.0)` is applied.
    pub fn set_height(&self, height: impl Into<Option<f64>>) -> Result<(), ModelError> {
        let Some(height) = height.into() else {
            return Ok(());
        };
        let object = self.check_loaded()?;
        transform::apply_height(&mut object.write().transform, Some(height));
        self.inner.container.request_redraw();
        Ok(())
    }

    /// The placed object, or `None` before loading completes and after destroy.
    pub fn get_object(&self) -> Option<SceneObject> {
        match &*self.inner.state.lock() {
            InstanceState::Loaded { object, .. } => Some(object.clone()),
            _ => None,
        }
    }

    /// The instance's own clip set, or `None` when not loaded.
    pub fn get_animations(&self) -> Option<Vec<AnimationClip>> {
        match &*self.inner.state.lock() {
            InstanceState::Loaded { animations, .. } => Some(animations.clone()),
            _ => None,
        }
    }

    pub fn show(&self) -> Result<(), ModelError> {
        self.set_visible(true)
    }

    pub fn hide(&self) -> Result<(), ModelError> {
        self.set_visible(false)
    }

    fn set_visible(&self, visible: bool) -> Result<(), ModelError> {
        let object = self.check_loaded()?;
        object.write().visible = visible;
        self.inner.container.request_redraw();
        Ok(())
    }

    /// Plays every clip in a loop. Ignored if already playing.
    pub fn start_animations(&self) -> Result<StartOutcome, ModelError> {
        let state = self.inner.state.lock();
        let (object, animations) = match &*state {
            InstanceState::Loaded { object, animations } => (object, animations),
            InstanceState::Loading => return Err(ModelError::NotLoaded),
            InstanceState::Failed(message) => return Err(ModelError::LoadFailed(message.clone())),
            InstanceState::Destroyed => return Err(ModelError::Destroyed),
        };

        let outcome = self.inner.animation.lock().start(
            object.clone(),
            animations,
            Arc::clone(&self.inner.container),
        )?;
        Ok(outcome)
    }

    /// Stops animation playback. Safe to call at any time.
    pub fn stop_animations(&self) {
        self.inner.animation.lock().stop();
    }

    pub fn is_animating(&self) -> bool {
        self.inner.animation.lock().is_playing()
    }

    /// Takes the object out of the scene container without destroying it.
    pub fn remove(&self) -> Result<(), ModelError> {
        let object = self.check_loaded()?;
        self.inner.container.remove(&object);
        self.inner.container.request_redraw();
        Ok(())
    }

    /// Stops animation, cancels any in-flight load and releases the object.
    ///
    /// Idempotent.
    pub fn destroy(&self) {
        let previous = {
            let mut state = self.inner.state.lock();
            if matches!(*state, InstanceState::Destroyed) {
                return;
            }
            std::mem::replace(&mut *state, InstanceState::Destroyed)
        };

        // Any start_animations() that saw Loaded has already spawned its task.
        self.inner.load_token.cancel();
        self.inner.animation.lock().stop();

        if let InstanceState::Loaded { object, .. } = previous {
            self.inner.container.remove(&object);
            object.write().clear();
            debug!(object = %object.id(), "Model destroyed");
        }

        self.inner.status.send_replace(ModelState::Destroyed);
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("source_url", &self.inner.request.source_url)
            .field("state", &self.state())
            .finish()
    }
}
