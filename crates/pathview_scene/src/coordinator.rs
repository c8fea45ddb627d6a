//! Progressive-render bookkeeping between the scene graph and the engine.
//!
//! Each tick the coordinator brings the backend up to date (rebuilds dirty
//! acceleration structures, resizes the output, uploads the camera) and, if
//! anything changed, restarts accumulation at [`INITIAL_FRAME`]. It then
//! launches one more frame into the accumulation buffer.

use std::time::{Duration, Instant};

use pathview_math::{PinholeCamera, Vec3};

use crate::context::RenderContext;
use crate::error::Result;
use crate::graph::SceneGraph;

/// Frame index accumulation restarts from.
pub const INITIAL_FRAME: u32 = 0;

/// Camera and output defaults for a coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub width: u32,
    pub height: u32,
    pub eye: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees; the horizontal one follows the
    /// aspect ratio.
    pub vfov: f32,
    /// Ray-generation entry point passed to every launch.
    pub entry_point: u32,
    /// Stop tracing once this much time has passed without a scene change.
    pub timeout: Option<Duration>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            eye: Vec3::new(278.0, 273.0, -900.0),
            look_at: Vec3::new(278.0, 273.0, 0.0),
            up: Vec3::Y,
            vfov: 35.0,
            entry_point: 0,
            timeout: None,
        }
    }
}

impl CoordinatorSettings {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_camera(mut self, eye: Vec3, look_at: Vec3, up: Vec3) -> Self {
        self.eye = eye;
        self.look_at = look_at;
        self.up = up;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// A frame was launched; `frame` is the index it was traced with.
    Traced { frame: u32 },
    Paused,
    TimedOut,
}

#[derive(Debug)]
pub struct RenderCoordinator {
    settings: CoordinatorSettings,
    frame: u32,
    seen_revision: Option<u64>,
    width: u32,
    height: u32,
    camera: PinholeCamera,
    camera_changed: bool,
    resized: bool,
    rendering: bool,
    budget_start: Instant,
}

impl RenderCoordinator {
    pub fn new(settings: CoordinatorSettings) -> Self {
        let width = settings.width.max(1);
        let height = settings.height.max(1);
        let vfov = settings.vfov;
        let hfov = vfov * width as f32 / height as f32;
        let camera = PinholeCamera::new(settings.eye, settings.look_at, settings.up, hfov, vfov);
        Self {
            settings,
            frame: INITIAL_FRAME,
            seen_revision: None,
            width,
            height,
            camera,
            camera_changed: true,
            resized: true,
            rendering: true,
            budget_start: Instant::now(),
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn camera(&self) -> &PinholeCamera {
        &self.camera
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Change the output resolution. The horizontal field of view is
    /// recomputed from the new aspect ratio. A zero dimension is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            log::warn!("Ignoring resize to {}x{}", width, height);
            return false;
        }
        if (width, height) == (self.width, self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        let vfov = self.settings.vfov;
        self.camera.set_fov(vfov * width as f32 / height as f32, vfov);
        self.resized = true;
        self.camera_changed = true;
        log::debug!("Output resized to {}x{}", width, height);
        true
    }

    pub fn set_camera(&mut self, eye: Vec3, look_at: Vec3, up: Vec3) {
        let (hfov, vfov) = (self.camera.hfov(), self.camera.vfov());
        self.camera.set_parameters(eye, look_at, up, hfov, vfov);
        self.camera_changed = true;
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn set_rendering(&mut self, rendering: bool) {
        if rendering && !self.rendering {
            // resuming gets a fresh budget
            self.budget_start = Instant::now();
        }
        self.rendering = rendering;
    }

    pub fn toggle_rendering(&mut self) -> bool {
        self.set_rendering(!self.rendering);
        self.rendering
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.settings.timeout = timeout;
        self.budget_start = Instant::now();
    }

    /// Whether the time budget since the last scene change is spent.
    pub fn is_timed_out(&self) -> bool {
        self.settings
            .timeout
            .is_some_and(|limit| self.budget_start.elapsed() >= limit)
    }

    /// Restart accumulation on the next launch.
    pub fn reset_frame(&mut self) {
        self.frame = INITIAL_FRAME;
    }

    /// Bring the backend up to date with the graph, camera and output size.
    /// Returns whether anything changed (and accumulation was restarted).
    pub fn prepare(&mut self, ctx: &mut RenderContext, graph: &mut SceneGraph) -> Result<bool> {
        let rebuilt = graph.rebuild(ctx)?;
        let revision = graph.revision();
        let mut changed = rebuilt > 0 || self.seen_revision != Some(revision);
        self.seen_revision = Some(revision);

        let backend = ctx.backend_mut();
        if self.resized {
            backend.resize_output(self.width, self.height)?;
            self.resized = false;
            changed = true;
        }
        if self.camera_changed {
            backend.set_camera(&self.camera);
            self.camera_changed = false;
            changed = true;
        }

        if changed {
            self.frame = INITIAL_FRAME;
            self.budget_start = Instant::now();
        }
        Ok(changed)
    }

    /// Launch one frame with the current frame index, then advance it.
    pub fn trace_frame(&mut self, ctx: &mut RenderContext) -> Result<()> {
        let backend = ctx.backend_mut();
        backend.set_frame_number(self.frame);
        self.frame += 1;
        backend.launch(self.settings.entry_point, self.width, self.height)?;
        Ok(())
    }

    /// One iteration of the render loop.
    pub fn tick(&mut self, ctx: &mut RenderContext, graph: &mut SceneGraph) -> Result<TickStatus> {
        if !self.rendering {
            return Ok(TickStatus::Paused);
        }
        self.prepare(ctx, graph)?;
        if self.is_timed_out() {
            return Ok(TickStatus::TimedOut);
        }
        let frame = self.frame;
        self.trace_frame(ctx)?;
        Ok(TickStatus::Traced { frame })
    }
}
