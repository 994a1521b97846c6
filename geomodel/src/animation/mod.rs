//! Animation playback bound to a frame clock.
//!
//! [`AnimationController`] is an `Idle -> Playing -> Idle` state machine.
//! Starting spawns a repeating frame task that advances an
//! [`AnimationMixer`] by the wall-clock time since the previous frame,
//! writes the sampled pose into the object and requests a redraw. The
//! controller owns the task's cancellation token; stopping cancels it and
//! aborts the task, so no frame runs afterwards.
//!
//! Calling `start` while already playing is ignored.

mod mixer;

pub use mixer::{AnimationAction, AnimationMixer};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::asset::{AnimationClip, SceneObject};
use crate::scene::SceneContainer;

/// Default frame period (about 60 frames per second).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Errors from starting playback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnimationError {
    /// The model has no clips to play.
    #[error("Model has no animation clips")]
    NoClips,

    /// Playback needs a Tokio runtime to drive its frame task.
    #[error("No Tokio runtime available to drive animation frames")]
    NoRuntime,
}

/// Outcome of [`AnimationController::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyPlaying,
}

struct PlaybackSession {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Per-instance animation session manager.
pub struct AnimationController {
    frame_interval: Duration,
    session: Option<PlaybackSession>,
}

impl AnimationController {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            session: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.token.is_cancelled() && !s.task.is_finished())
    }

    /// Plays every clip on `object` until [`stop`](Self::stop) is called.
    pub fn start(
        &mut self,
        object: SceneObject,
        clips: &[AnimationClip],
        container: Arc<dyn SceneContainer>,
    ) -> Result<StartOutcome, AnimationError> {
        if clips.is_empty() {
            return Err(AnimationError::NoClips);
        }
        if self.is_playing() {
            debug!(object = %object.id(), "Animation already playing, ignoring start");
            return Ok(StartOutcome::AlreadyPlaying);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| AnimationError::NoRuntime)?;

        let mut mixer = AnimationMixer::new();
        for clip in clips {
            mixer.add_action(clip.clone()).play();
        }

        let token = CancellationToken::new();
        debug!(
            object = %object.id(),
            clips = clips.len(),
            frame_ms = self.frame_interval.as_millis() as u64,
            "Starting animation playback"
        );
        let task = runtime.spawn(run_frames(
            mixer,
            object,
            container,
            self.frame_interval,
            token.clone(),
        ));

        self.session = Some(PlaybackSession { token, task });
        Ok(StartOutcome::Started)
    }

    /// Cancels playback. Returns `false` if nothing was playing.
    pub fn stop(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                session.token.cancel();
                session.task.abort();
                debug!("Animation playback stopped");
                true
            }
            None => false,
        }
    }
}

impl Default for AnimationController {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl Drop for AnimationController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_frames(
    mut mixer: AnimationMixer,
    object: SceneObject,
    container: Arc<dyn SceneContainer>,
    frame_interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_frame = Instant::now();

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,

            _ = ticker.tick() => {
                let now = Instant::now();
                let delta = now.duration_since(last_frame);
                last_frame = now;

                mixer.update(delta.as_secs_f64(), &mut object.write());
                container.request_redraw();
            }
        }
    }
}
