//! Keyframe playback over a scene subtree.

use glam::{DQuat, DVec3, EulerRot};

use crate::asset::{AnimationClip, Interpolation, KeyframeTrack, SceneNode, TrackValues};

/// Playback state for one clip.
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: AnimationClip,
    time: f64,
    playing: bool,
}

impl AnimationAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time: 0.0,
            playing: false,
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Stops playback and rewinds to the start.
    pub fn stop(&mut self) {
        self.playing = false;
        self.time = 0.0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Local clip time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    fn advance(&mut self, delta_secs: f64) {
        let duration = self.clip.duration as f64;
        if duration > 0.0 {
            self.time = (self.time + delta_secs).rem_euclid(duration);
        }
    }
}

/// Drives a set of actions and writes sampled values into a subtree.
///
/// Clips loop forever. Tracks bind to nodes by source index, so a mixer
/// works on any clone of the asset it was built for.
#[derive(Debug, Clone, Default)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the action for `clip`, creating it on first use.
    ///
    /// Actions are matched on the whole clip, not its name: glTF allows
    /// several clips to share a name.
    pub fn clip_action(&mut self, clip: &AnimationClip) -> &mut AnimationAction {
        match self.actions.iter().position(|a| a.clip == *clip) {
            Some(index) => &mut self.actions[index],
            None => self.add_action(clip.clone()),
        }
    }

    /// Appends a new action for `clip`, even if an equal clip already has one.
    pub fn add_action(&mut self, clip: AnimationClip) -> &mut AnimationAction {
        self.actions.push(AnimationAction::new(clip));
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    /// Advances every playing action by `delta_secs` and applies it to `root`.
    pub fn update(&mut self, delta_secs: f64, root: &mut SceneNode) {
        for action in self.actions.iter_mut().filter(|a| a.playing) {
            action.advance(delta_secs);
            for track in &action.clip.tracks {
                apply_track(track, action.time, root);
            }
        }
    }
}

fn apply_track(track: &KeyframeTrack, time: f64, root: &mut SceneNode) {
    if track.keyframe_count() == 0 {
        return;
    }
    let Some(node) = root.find_by_source_mut(track.node) else {
        return;
    };
    let (i0, i1, alpha) = locate(&track.times[..track.keyframe_count()], time);
    let (i1, alpha) = match track.interpolation {
        Interpolation::Linear => (i1, alpha),
        Interpolation::Step => (i0, 0.0),
    };

    match &track.values {
        TrackValues::Translation(values) => {
            node.transform.position = lerp3(values[i0], values[i1], alpha);
        }
        TrackValues::Scale(values) => {
            node.transform.scale = lerp3(values[i0], values[i1], alpha);
        }
        TrackValues::Rotation(values) => {
            let q = quat(values[i0]).slerp(quat(values[i1]), alpha);
            let (x, y, z) = q.to_euler(EulerRot::XYZ);
            node.transform.rotation = DVec3::new(x, y, z);
        }
    }
}

/// Finds the keyframes around `time` and the blend factor between them.
fn locate(times: &[f32], time: f64) -> (usize, usize, f64) {
    let last = times.len() - 1;
    if time <= times[0] as f64 {
        return (0, 0, 0.0);
    }
    if time >= times[last] as f64 {
        return (last, last, 0.0);
    }
    let upper = times.partition_point(|&t| (t as f64) <= time);
    let lower = upper - 1;
    let span = (times[upper] - times[lower]) as f64;
    let alpha = if span > 0.0 {
        (time - times[lower] as f64) / span
    } else {
        0.0
    };
    (lower, upper, alpha)
}

fn lerp3(a: [f32; 3], b: [f32; 3], alpha: f64) -> DVec3 {
    let a = DVec3::from(a.map(f64::from));
    let b = DVec3::from(b.map(f64::from));
    a.lerp(b, alpha)
}

fn quat(v: [f32; 4]) -> DQuat {
    DQuat::from_xyzw(v[0] as f64, v[1] as f64, v[2] as f64, v[3] as f64).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn rig() -> SceneNode {
        let mut arm = SceneNode::group("arm");
        arm.source_index = Some(3);
        SceneNode::group("Scene").with_child(arm)
    }

    fn slide_clip() -> AnimationClip {
        AnimationClip::new(
            "slide",
            vec![KeyframeTrack {
                node: 3,
                times: vec![0.0, 2.0],
                values: TrackValues::Translation(vec![[0.0, 0.0, 0.0], [4.0, 0.0, 0.0]]),
                interpolation: Interpolation::Linear,
            }],
        )
    }

    #[test]
    fn test_locate_bounds_and_middle() {
        let times = [0.0, 1.0, 3.0];
        assert_eq!(locate(&times, -1.0), (0, 0, 0.0));
        assert_eq!(locate(&times, 5.0), (2, 2, 0.0));
        assert_eq!(locate(&times, 2.0), (1, 2, 0.5));
    }

    #[test]
    fn test_update_interpolates_translation() {
        let mut root = rig();
        let clip = slide_clip();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip).play();

        mixer.update(0.5, &mut root);
        assert!((root.children[0].transform.position.x - 1.0).abs() < 1e-9);

        mixer.update(0.5, &mut root);
        assert!((root.children[0].transform.position.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_loops_clip() {
        let mut root = rig();
        let clip = slide_clip();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip).play();

        mixer.update(2.5, &mut root);
        assert!((mixer.actions()[0].time() - 0.5).abs() < 1e-9);
        assert!((root.children[0].transform.position.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_stopped_action_is_not_applied() {
        let mut root = rig();
        let clip = slide_clip();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip);

        mixer.update(1.0, &mut root);
        assert_eq!(root.children[0].transform.position.x, 0.0);
    }

    #[test]
    fn test_clip_action_reuses_action() {
        let clip = slide_clip();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip).play();
        mixer.clip_action(&clip);
        assert_eq!(mixer.actions().len(), 1);
        assert!(mixer.actions()[0].is_playing());
    }

    #[test]
    fn test_same_named_clips_each_get_an_action() {
        let mut leg = SceneNode::group("leg");
        leg.source_index = Some(4);
        let mut root = rig().with_child(leg);

        let mut slide = slide_clip();
        slide.name = String::new();
        let mut kick = slide_clip();
        kick.name = String::new();
        kick.tracks[0].node = 4;

        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&slide).play();
        mixer.clip_action(&kick).play();
        assert_eq!(mixer.actions().len(), 2);

        mixer.update(1.0, &mut root);
        assert!((root.children[0].transform.position.x - 2.0).abs() < 1e-9);
        assert!((root.children[1].transform.position.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_add_action_allows_duplicates() {
        let clip = slide_clip();
        let mut mixer = AnimationMixer::new();
        mixer.add_action(clip.clone());
        mixer.add_action(clip);
        assert_eq!(mixer.actions().len(), 2);
    }

    #[test]
    fn test_step_track_holds_value() {
        let mut root = rig();
        let mut clip = slide_clip();
        clip.tracks[0].interpolation = Interpolation::Step;
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip).play();

        mixer.update(1.5, &mut root);
        assert_eq!(root.children[0].transform.position.x, 0.0);
    }

    #[test]
    fn test_rotation_track_slerps() {
        let mut root = rig();
        let clip = AnimationClip::new(
            "turn",
            vec![KeyframeTrack {
                node: 3,
                times: vec![0.0, 1.0],
                // identity to 180 degrees about Y
                values: TrackValues::Rotation(vec![[0.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0]]),
                interpolation: Interpolation::Linear,
            }],
        );
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip).play();

        mixer.update(0.5, &mut root);
        let q = DQuat::from_euler(
            EulerRot::XYZ,
            root.children[0].transform.rotation.x,
            root.children[0].transform.rotation.y,
            root.children[0].transform.rotation.z,
        );
        let expected = DQuat::from_rotation_y(FRAC_PI_2);
        assert!(q.angle_between(expected) < 1e-6);
    }

    #[test]
    fn test_track_for_missing_node_is_ignored() {
        let mut root = SceneNode::group("Scene");
        let clip = slide_clip();
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip).play();
        mixer.update(1.0, &mut root);
        assert_eq!(root.transform.position, DVec3::ZERO);
    }
}
