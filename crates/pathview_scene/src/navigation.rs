//! Mouse-driven scene navigation.
//!
//! Navigation moves the whole scene rather than the camera: orbiting and
//! panning build a global transform `T(offset) * Rx(spin.x) * Ry(spin.y)`
//! that the scene graph applies above every node.

use pathview_math::{Mat4, Vec2, Vec3};

/// Tuning for [`NavigationController`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationSettings {
    /// Radians of spin per pixel of orbit drag.
    pub rotate_speed: f32,
    /// Pan step; applied once to the pixel delta and once more to the offset.
    pub pan_increment: f32,
    /// Offset along Z per wheel notch.
    pub zoom_step: f32,
    /// Output resolution divisor while a drag is active.
    pub move_reduction: u32,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            rotate_speed: 0.01,
            pan_increment: 0.15,
            zoom_step: 0.3,
            move_reduction: 4,
        }
    }
}

impl NavigationSettings {
    pub fn with_move_reduction(mut self, reduction: u32) -> Self {
        self.move_reduction = reduction.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Left button.
    Orbit,
    /// Right button.
    Pan,
}

#[derive(Debug, Clone, Default)]
pub struct NavigationController {
    settings: NavigationSettings,
    spin: Vec2,
    offset: Vec3,
    drag: Option<(DragMode, Vec2)>,
}

impl NavigationController {
    pub fn new(settings: NavigationSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &NavigationSettings {
        &self.settings
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_mode(&self) -> Option<DragMode> {
        self.drag.map(|(mode, _)| mode)
    }

    /// Start a drag at window position `(x, y)`. Returns `false` if another
    /// drag is already in progress.
    pub fn begin_drag(&mut self, mode: DragMode, x: f32, y: f32) -> bool {
        if self.drag.is_some() {
            return false;
        }
        self.drag = Some((mode, Vec2::new(x, y)));
        true
    }

    /// Continue the active drag. Returns the new global transform, or `None`
    /// when no drag is active.
    pub fn drag_to(&mut self, x: f32, y: f32) -> Option<Mat4> {
        let (mode, last) = self.drag?;
        let pos = Vec2::new(x, y);
        let delta = pos - last;

        match mode {
            DragMode::Orbit => {
                self.spin.x -= self.settings.rotate_speed * delta.y;
                self.spin.y += self.settings.rotate_speed * delta.x;
            }
            DragMode::Pan => {
                let step = delta * self.settings.pan_increment;
                self.offset.x -= self.settings.pan_increment * step.x;
                self.offset.y -= self.settings.pan_increment * step.y;
            }
        }

        self.drag = Some((mode, pos));
        Some(self.matrix())
    }

    /// Finish the active drag, returning its mode.
    pub fn end_drag(&mut self) -> Option<DragMode> {
        self.drag.take().map(|(mode, _)| mode)
    }

    /// Move the scene along Z. Positive deltas pull it closer. Returns `None`
    /// for a zero delta.
    pub fn zoom(&mut self, delta: f32) -> Option<Mat4> {
        if delta > 0.0 {
            self.offset.z -= self.settings.zoom_step;
        } else if delta < 0.0 {
            self.offset.z += self.settings.zoom_step;
        } else {
            return None;
        }
        Some(self.matrix())
    }

    /// The global transform for the current spin and offset.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.offset)
            * Mat4::from_rotation_x(self.spin.x)
            * Mat4::from_rotation_y(self.spin.y)
    }

    pub fn reset(&mut self) {
        self.spin = Vec2::ZERO;
        self.offset = Vec3::ZERO;
        self.drag = None;
    }

    /// Output size while dragging a `width` x `height` view.
    pub fn reduced_size(&self, width: u32, height: u32) -> (u32, u32) {
        let r = self.settings.move_reduction.max(1);
        ((width / r).max(1), (height / r).max(1))
    }
}

/// Output size for a view of `width` x `height` logical pixels.
pub fn full_size(width: u32, height: u32, device_pixel_ratio: f32) -> (u32, u32) {
    let scale = |v: u32| ((v as f32 * device_pixel_ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathview_math::Mat4Ext;

    #[test]
    fn test_orbit_spins_about_x_then_y() {
        let mut nav = NavigationController::default();
        nav.begin_drag(DragMode::Orbit, 100.0, 100.0);

        let m = nav.drag_to(150.0, 80.0).unwrap();

        // dx = 50, dy = -20
        let expected = Mat4::from_rotation_x(0.2) * Mat4::from_rotation_y(0.5);
        assert!(m.approx_eq(&expected, 1e-6));
    }

    #[test]
    fn test_orbit_is_incremental() {
        let mut nav = NavigationController::default();
        nav.begin_drag(DragMode::Orbit, 0.0, 0.0);
        nav.drag_to(10.0, 0.0);
        let m = nav.drag_to(20.0, 0.0).unwrap();

        assert!(m.approx_eq(&Mat4::from_rotation_y(0.2), 1e-6));
    }

    #[test]
    fn test_pan_moves_offset() {
        let mut nav = NavigationController::default();
        nav.begin_drag(DragMode::Pan, 0.0, 0.0);

        let m = nav.drag_to(10.0, 20.0).unwrap();

        // 0.15 * (0.15 * delta), x negated, y down-screen is down
        let t = m.w_axis.truncate();
        assert!((t.x + 0.225).abs() < 1e-6);
        assert!((t.y + 0.45).abs() < 1e-6);
        assert!(t.z.abs() < 1e-6);
    }

    #[test]
    fn test_zoom_steps() {
        let mut nav = NavigationController::default();

        let m = nav.zoom(120.0).unwrap();
        assert!((m.w_axis.z + 0.3).abs() < 1e-6);

        nav.zoom(-120.0);
        let m = nav.zoom(-120.0).unwrap();
        assert!((m.w_axis.z - 0.3).abs() < 1e-6);

        assert!(nav.zoom(0.0).is_none());
    }

    #[test]
    fn test_drag_lifecycle() {
        let mut nav = NavigationController::default();
        assert!(nav.drag_to(1.0, 1.0).is_none());

        assert!(nav.begin_drag(DragMode::Pan, 0.0, 0.0));
        assert!(!nav.begin_drag(DragMode::Orbit, 0.0, 0.0));
        assert_eq!(nav.drag_mode(), Some(DragMode::Pan));

        assert_eq!(nav.end_drag(), Some(DragMode::Pan));
        assert!(!nav.is_dragging());
        assert_eq!(nav.end_drag(), None);
    }

    #[test]
    fn test_reduced_and_full_sizes() {
        let nav = NavigationController::default();
        assert_eq!(nav.reduced_size(800, 600), (200, 150));
        assert_eq!(nav.reduced_size(2, 2), (1, 1));
        assert_eq!(full_size(800, 600, 2.0), (1600, 1200));
        assert_eq!(full_size(800, 600, 1.0), (800, 600));
    }

    #[test]
    fn test_reset() {
        let mut nav = NavigationController::default();
        nav.zoom(1.0);
        nav.reset();
        assert!(nav.matrix().approx_eq(&Mat4::IDENTITY, 1e-6));
    }
}
