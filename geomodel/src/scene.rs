//! Scene container seam.
//!
//! The host scene owns placed objects, converts geographic positions into
//! scene coordinates and redraws on request. [`HeadlessScene`] is an
//! in-memory container used by the CLI and in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::asset::{ObjectId, SceneObject};
use crate::coord::{to_mercator_clamped, LngLat};

/// Host scene that placed models are inserted into.
pub trait SceneContainer: Send + Sync {
    /// Inserts an object into the scene.
    fn add(&self, object: &SceneObject);

    /// Removes an object from the scene. Unknown objects are ignored.
    fn remove(&self, object: &SceneObject);

    /// Converts a geographic position into scene `[x, y]`.
    fn convert_geo_to_scene(&self, position: LngLat) -> [f64; 2];

    /// Asks the host to redraw on its next frame.
    fn request_redraw(&self);
}

/// In-memory scene using Web Mercator metres relative to a centre point.
pub struct HeadlessScene {
    origin: [f64; 2],
    objects: Mutex<Vec<SceneObject>>,
    redraws: AtomicU64,
}

impl HeadlessScene {
    /// Creates a scene whose origin is the projected `center`.
    pub fn new(center: LngLat) -> Self {
        Self {
            origin: to_mercator_clamped(center),
            objects: Mutex::new(Vec::new()),
            redraws: AtomicU64::new(0),
        }
    }

    /// Snapshot of the objects currently in the scene, in insertion order.
    pub fn objects(&self) -> Vec<SceneObject> {
        self.objects.lock().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.lock().iter().any(|o| o.id() == id)
    }

    /// Number of redraws requested so far.
    pub fn redraw_count(&self) -> u64 {
        self.redraws.load(Ordering::Relaxed)
    }
}

impl Default for HeadlessScene {
    fn default() -> Self {
        Self::new(LngLat::default())
    }
}

impl SceneContainer for HeadlessScene {
    fn add(&self, object: &SceneObject) {
        let mut objects = self.objects.lock();
        if !objects.iter().any(|o| o.same_object(object)) {
            objects.push(object.clone());
        }
    }

    fn remove(&self, object: &SceneObject) {
        self.objects.lock().retain(|o| !o.same_object(object));
    }

    fn convert_geo_to_scene(&self, position: LngLat) -> [f64; 2] {
        let [x, y] = to_mercator_clamped(position);
        [x - self.origin[0], y - self.origin[1]]
    }

    fn request_redraw(&self) {
        let count = self.redraws.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(count, "Redraw requested");
    }
}
