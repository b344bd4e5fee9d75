//! Idle-motion animation loop for the flow scene.
//!
//! Cooperative and frame-driven: the host calls [`AnimationScheduler::tick`]
//! once per display frame it was asked for, and the scheduler decides
//! whether to ask for another one.
//! - Playing: every node spins and bobs, a frame is requested, then rendered
//! - Paused: one catch-up render if something changed, no further requests
//! - Cancelled: ticks are inert; nothing touches the scene again

use glam::Vec3;

use crate::config::AnimationParams;
use crate::error::Result;
use crate::render::scene::SceneController;
use crate::render::PlaybackState;

/// The host's "call me next frame" hook.
pub trait FrameRequester {
    /// Schedule one more tick.
    fn request_frame(&mut self);

    /// Withdraw the outstanding request, if the host can.
    fn revoke_frame(&mut self) {}
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Scheduler cancelled; nothing happened.
    Inert,
    /// Paused with nothing to redraw.
    Idle,
    /// A frame was drawn; `requested` tells whether another tick was asked for.
    Rendered { requested: bool },
}

pub struct AnimationScheduler {
    params: AnimationParams,
    state: PlaybackState,
    elapsed: f32,
    live: bool,
    pending: bool,
    dirty: bool,
    requester: Box<dyn FrameRequester>,
}

impl AnimationScheduler {
    /// New scheduler in the playing state. No frame is requested until
    /// [`start`](Self::start).
    pub fn new(params: AnimationParams, requester: Box<dyn FrameRequester>) -> Self {
        Self {
            params,
            state: PlaybackState::Playing,
            elapsed: 0.0,
            live: true,
            pending: false,
            dirty: true,
            requester,
        }
    }

    /// Ask for the first frame.
    pub fn start(&mut self) {
        self.arm();
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending
    }

    /// One frame of the loop.
    pub fn tick(&mut self, scene: &mut SceneController, dt: f32) -> Result<TickOutcome> {
        // The request that brought us here is spent.
        self.pending = false;
        if !self.live {
            return Ok(TickOutcome::Inert);
        }

        match self.state {
            PlaybackState::Paused => {
                if !self.dirty {
                    return Ok(TickOutcome::Idle);
                }
                self.dirty = false;
                scene.render()?;
                Ok(TickOutcome::Rendered { requested: false })
            }
            PlaybackState::Playing => {
                let dt = self.frame_step(dt);
                self.elapsed += dt;
                self.apply_idle_motion(scene, dt);
                scene.animate_background(self.elapsed, dt);
                self.arm();
                self.dirty = false;
                scene.render()?;
                Ok(TickOutcome::Rendered { requested: true })
            }
        }
    }

    /// `dt` bounded to `[0, max_frame_dt]`. Non-finite steps and limits
    /// collapse to zero instead of panicking.
    fn frame_step(&self, dt: f32) -> f32 {
        if !dt.is_finite() {
            return 0.0;
        }
        dt.max(0.0).min(self.params.max_frame_dt.max(0.0))
    }

    /// Spin every node and bob it around its logical position.
    fn apply_idle_motion(&self, scene: &mut SceneController, dt: f32) {
        let spin = self.params.rotation_speed * dt;
        let amplitude = self.params.bob_amplitude;
        let elapsed = self.elapsed;
        scene.for_each_node_mesh(|index, node, mesh| {
            let t = &mut mesh.transform;
            t.rotation.x += spin;
            t.rotation.y += spin;
            t.position = node.position + Vec3::Y * ((elapsed + index as f32).sin() * amplitude);
        });
    }

    pub fn pause(&mut self) {
        if self.live && self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.dirty = true;
        }
    }

    /// Back to playing; re-arms only when no frame is outstanding.
    pub fn resume(&mut self) {
        if self.live && self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
            self.arm();
        }
    }

    /// Something visible changed outside the loop (camera, size).
    /// Ensures at least one more render even while paused.
    pub fn invalidate(&mut self) {
        if self.live {
            self.dirty = true;
            self.arm();
        }
    }

    /// Stop ticking for a scene rebuild. Pair with [`rearm`](Self::rearm).
    pub fn halt(&mut self) {
        self.revoke();
    }

    /// Resume after a rebuild; the new graph is drawn at least once.
    pub fn rearm(&mut self) {
        self.invalidate();
    }

    /// Terminal: the loop never runs again and any outstanding frame
    /// request is withdrawn before this returns.
    pub fn cancel(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.revoke();
        log::debug!("animation cancelled at t={:.2}s", self.elapsed);
    }

    fn arm(&mut self) {
        if self.live && !self.pending {
            self.pending = true;
            self.requester.request_frame();
        }
    }

    fn revoke(&mut self) {
        if self.pending {
            self.pending = false;
            self.requester.revoke_frame();
        }
    }
}
