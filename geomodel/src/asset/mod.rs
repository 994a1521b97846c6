//! Decoded model data: scene subtrees, animation clips and object handles.
//!
//! A [`GltfAsset`] is the canonical, immutable result of decoding one model
//! file. Everything handed to a placed instance is produced by
//! [`GltfAsset::instantiate`], which deep-clones the scene subtree and each
//! clip so that instances never share mutable state.
//!
//! # Example
//!
//! ```ignore
//! use geomodel::asset::{GltfAsset, SceneNode};
//!
//! let asset = GltfAsset::new(SceneNode::group("Scene"), Vec::new());
//! let (object, clips) = asset.instantiate();
//! object.write().transform.position.z = 5.0;
//! assert_eq!(asset.scene().transform.position.z, 0.0);
//! ```

mod decode;

pub use decode::decode_gltf;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::DVec3;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Local transform of a scene node.
///
/// Rotation is stored as Euler angles in radians, applied in XYZ order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub position: DVec3,
    pub rotation: DVec3,
    pub scale: DVec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DVec3::ZERO,
            scale: DVec3::ONE,
        }
    }
}

/// One node of a scene subtree.
///
/// Children are owned by value, so `clone()` is a deep clone of the subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Node name from the source file (may be empty).
    pub name: String,
    /// Index of the node in the source document, used to bind animation tracks.
    pub source_index: Option<usize>,
    /// Index of the mesh referenced by this node, if any.
    pub mesh: Option<usize>,
    pub transform: NodeTransform,
    pub visible: bool,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Creates an empty group node with an identity transform.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_index: None,
            mesh: None,
            transform: NodeTransform::default(),
            visible: true,
            children: Vec::new(),
        }
    }

    /// Adds a child node, returning `self` for chaining.
    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Finds the node bound to `source_index` in this subtree.
    pub fn find_by_source_mut(&mut self, source_index: usize) -> Option<&mut SceneNode> {
        if self.source_index == Some(source_index) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_by_source_mut(source_index))
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    /// Drops all children and mesh references.
    pub fn clear(&mut self) {
        self.children.clear();
        self.mesh = None;
    }
}

/// Property animated by a keyframe track.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackValues {
    Translation(Vec<[f32; 3]>),
    /// Unit quaternions as `[x, y, z, w]`.
    Rotation(Vec<[f32; 4]>),
    Scale(Vec<[f32; 3]>),
}

impl TrackValues {
    fn len(&self) -> usize {
        match self {
            TrackValues::Translation(v) | TrackValues::Scale(v) => v.len(),
            TrackValues::Rotation(v) => v.len(),
        }
    }
}

/// How values between two keyframes are sampled.
///
/// Cubic-spline tracks keep only their keyframe values (tangents are
/// dropped at decode time) and are sampled as `Linear`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    /// Holds each value until the next keyframe.
    Step,
}

/// Keyframes for a single property of a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack {
    /// Source index of the animated node.
    pub node: usize,
    /// Keyframe times in seconds, ascending.
    pub times: Vec<f32>,
    /// One value per keyframe time.
    pub values: TrackValues,
    pub interpolation: Interpolation,
}

impl KeyframeTrack {
    /// Number of usable keyframes (times and values may disagree in broken files).
    pub fn keyframe_count(&self) -> usize {
        self.times.len().min(self.values.len())
    }

    /// Time of the last keyframe.
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }
}

/// A named animation made of keyframe tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Clip length in seconds.
    pub duration: f32,
    pub tracks: Vec<KeyframeTrack>,
}

impl AnimationClip {
    /// Creates a clip whose duration is the end of its longest track.
    pub fn new(name: impl Into<String>, tracks: Vec<KeyframeTrack>) -> Self {
        let duration = tracks
            .iter()
            .map(KeyframeTrack::end_time)
            .fold(0.0_f32, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}

/// The decoded contents of a model file: a scene subtree and its clips.
#[derive(Debug, Clone, PartialEq)]
pub struct GltfAsset {
    scene: SceneNode,
    animations: Vec<AnimationClip>,
}

impl GltfAsset {
    pub fn new(scene: SceneNode, animations: Vec<AnimationClip>) -> Self {
        Self { scene, animations }
    }

    pub fn scene(&self) -> &SceneNode {
        &self.scene
    }

    pub fn animations(&self) -> &[AnimationClip] {
        &self.animations
    }

    /// Produces an independently owned object and clip set from this asset.
    pub fn instantiate(&self) -> (SceneObject, Vec<AnimationClip>) {
        (SceneObject::new(self.scene.clone()), self.animations.clone())
    }

    /// Consumes the asset, moving its contents into a new object.
    pub fn into_parts(self) -> (SceneObject, Vec<AnimationClip>) {
        (SceneObject::new(self.scene), self.animations)
    }
}

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a placed scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Shared handle to a placed scene subtree.
///
/// The handle is cheap to clone; all clones refer to the same subtree. A new
/// subtree (and a new [`ObjectId`]) only comes from [`SceneObject::new`].
#[derive(Clone)]
pub struct SceneObject {
    id: ObjectId,
    root: Arc<RwLock<SceneNode>>,
}

impl SceneObject {
    pub fn new(root: SceneNode) -> Self {
        Self {
            id: ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)),
            root: Arc::new(RwLock::new(root)),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SceneNode> {
        self.root.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SceneNode> {
        self.root.write()
    }

    /// Current root transform.
    pub fn transform(&self) -> NodeTransform {
        self.root.read().transform
    }

    pub fn is_visible(&self) -> bool {
        self.root.read().visible
    }

    /// Returns true if both handles refer to the same subtree.
    pub fn same_object(&self, other: &SceneObject) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }
}

impl fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject")
            .field("id", &self.id)
            .field("name", &self.root.read().name)
            .finish()
    }
}
