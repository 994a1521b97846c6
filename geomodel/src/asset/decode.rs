//! glTF / GLB decoding into [`GltfAsset`].

use glam::{DQuat, DVec3, EulerRot};
use gltf::animation::util::ReadOutputs;
use gltf::animation::Interpolation as GltfInterpolation;
use gltf::buffer::Source;
use tracing::{debug, warn};

use super::{
    AnimationClip, GltfAsset, Interpolation, KeyframeTrack, NodeTransform, SceneNode, TrackValues,
};
use crate::fetch::FetchError;

/// Decodes glTF JSON or binary GLB bytes.
///
/// The default scene (or the first scene) becomes the root group. Keyframe
/// data is read from the GLB binary chunk; channels whose buffers live in
/// external files or data URIs are skipped.
pub fn decode_gltf(bytes: &[u8]) -> Result<GltfAsset, FetchError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
    let blob = gltf.blob.as_deref();
    let document = &gltf.document;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| FetchError::Decode("document contains no scene".to_string()))?;

    let mut root = SceneNode::group(scene.name().unwrap_or("Scene"));
    root.children = scene.nodes().map(|node| convert_node(&node)).collect();

    let animations: Vec<AnimationClip> = document
        .animations()
        .map(|animation| convert_animation(&animation, blob))
        .collect();

    debug!(
        nodes = root.node_count(),
        animations = animations.len(),
        "Decoded glTF document"
    );

    Ok(GltfAsset::new(root, animations))
}

fn convert_node(node: &gltf::Node<'_>) -> SceneNode {
    let (translation, rotation, scale) = node.transform().decomposed();
    let quat = DQuat::from_xyzw(
        rotation[0] as f64,
        rotation[1] as f64,
        rotation[2] as f64,
        rotation[3] as f64,
    );
    let (rx, ry, rz) = quat.to_euler(EulerRot::XYZ);

    SceneNode {
        name: node.name().unwrap_or_default().to_string(),
        source_index: Some(node.index()),
        mesh: node.mesh().map(|mesh| mesh.index()),
        transform: NodeTransform {
            position: DVec3::from(translation.map(f64::from)),
            rotation: DVec3::new(rx, ry, rz),
            scale: DVec3::from(scale.map(f64::from)),
        },
        visible: true,
        children: node.children().map(|child| convert_node(&child)).collect(),
    }
}

fn convert_animation(animation: &gltf::Animation<'_>, blob: Option<&[u8]>) -> AnimationClip {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));

    let mut tracks = Vec::new();
    for channel in animation.channels() {
        let reader = channel.reader(|buffer| match buffer.source() {
            Source::Bin => blob,
            Source::Uri(_) => None,
        });
        let node = channel.target().node().index();
        let (interpolation, cubic) = match channel.sampler().interpolation() {
            GltfInterpolation::Linear => (Interpolation::Linear, false),
            GltfInterpolation::Step => (Interpolation::Step, false),
            GltfInterpolation::CubicSpline => {
                debug!(clip = %name, node, "Cubic-spline tangents dropped, sampling linearly");
                (Interpolation::Linear, true)
            }
        };

        let Some(inputs) = reader.read_inputs() else {
            warn!(clip = %name, node, "Skipping channel without readable keyframe times");
            continue;
        };
        let times: Vec<f32> = inputs.collect();

        let values = match reader.read_outputs() {
            Some(ReadOutputs::Translations(values)) => {
                TrackValues::Translation(keyframe_values(values, cubic))
            }
            Some(ReadOutputs::Rotations(values)) => {
                TrackValues::Rotation(keyframe_values(values.into_f32(), cubic))
            }
            Some(ReadOutputs::Scales(values)) => TrackValues::Scale(keyframe_values(values, cubic)),
            Some(ReadOutputs::MorphTargetWeights(_)) => {
                debug!(clip = %name, node, "Morph target weights are not animated");
                continue;
            }
            None => {
                warn!(clip = %name, node, "Skipping channel without readable keyframe values");
                continue;
            }
        };

        tracks.push(KeyframeTrack {
            node,
            times,
            values,
            interpolation,
        });
    }

    AnimationClip::new(name, tracks)
}

/// Cubic-spline outputs hold `[in-tangent, value, out-tangent]` per keyframe;
/// only the values are kept.
fn keyframe_values<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    }
}
