//! # Camera and Projection
//!
//! View description of a World: where the camera sits, how the scene is
//! projected and which pixels it covers. Everything here is plain data; the
//! World keeps it double-buffered and the render thread derives a
//! [`CameraFrame`] from the pure copy once per frame.
//!
//! ## Coordinate System
//! Right-handed, Y-up world space. Screen coordinates produced by
//! [`CameraFrame::project_to_screen`] have their origin at the bottom-left
//! corner of the window, matching the label overlay projection.

use crate::foundation::math::{Mat4, Point3, Quat, Unit, Vec2, Vec3, Vec4};
use crate::scene::{SceneError, SceneResult};

const EPSILON: f32 = 1e-6;

/// Camera placement: eye position, look-at target and roll around the view axis
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    /// Eye position in world space
    pub position: Vec3,

    /// Point the camera looks at
    pub target: Vec3,

    /// Rotation around the viewing direction, in degrees
    pub roll: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self { position: Vec3::new(0.0, 0.0, 10.0), target: Vec3::zeros(), roll: 0.0 }
    }
}

impl CameraState {
    /// Create a camera looking from `position` at `target`
    pub fn new(position: Vec3, target: Vec3, roll: f32) -> Self {
        Self { position, target, roll }
    }

    /// Distance between eye and target
    pub fn distance(&self) -> f32 {
        (self.target - self.position).norm()
    }

    /// Unit viewing direction
    ///
    /// Falls back to -Z when eye and target coincide.
    pub fn forward(&self) -> Vec3 {
        let direction = self.target - self.position;
        if direction.norm() <= EPSILON {
            -Vec3::z()
        } else {
            direction.normalize()
        }
    }

    /// Unit up vector after applying roll
    pub fn up(&self) -> Vec3 {
        let forward = self.forward();
        // world up degenerates when looking straight up or down
        let reference = if forward.y.abs() > 0.999 { Vec3::z() } else { Vec3::y() };
        let right = forward.cross(&reference).normalize();
        let up = right.cross(&forward);
        if self.roll == 0.0 {
            return up;
        }
        Quat::from_axis_angle(&Unit::new_normalize(forward), self.roll.to_radians()) * up
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        let eye = Point3::from(self.position);
        let target = Point3::from(self.position + self.forward());
        Mat4::look_at_rh(&eye, &target, &self.up())
    }

    /// Plane through the eye, facing along the view direction
    ///
    /// Signed distance to it grows with depth into the scene.
    pub fn forward_plane(&self) -> Plane {
        Plane::from_point_normal(self.position, self.forward())
    }
}

/// Projection mode of a World
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionKind {
    /// Perspective frustum from a field-of-view angle
    #[default]
    Perspective,
    /// Orthographic box sized to match the perspective view at the target distance
    Orthographic,
}

/// Projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Projection mode
    pub kind: ProjectionKind,

    /// Vertical field of view in degrees
    pub angle: f32,

    /// Near clipping distance
    pub near: f32,

    /// Far clipping distance
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective(45.0, 0.1, 1000.0)
    }
}

impl Projection {
    /// Perspective projection
    pub const fn perspective(angle: f32, near: f32, far: f32) -> Self {
        Self { kind: ProjectionKind::Perspective, angle, near, far }
    }

    /// Orthographic projection; `angle` still sizes the box
    pub const fn orthographic(angle: f32, near: f32, far: f32) -> Self {
        Self { kind: ProjectionKind::Orthographic, angle, near, far }
    }

    /// Reject parameters no backend could honour
    pub fn validate(&self) -> SceneResult<()> {
        if !(self.angle.is_finite() && self.near.is_finite() && self.far.is_finite()) {
            return Err(SceneError::InvalidProjection("non-finite parameter".to_string()));
        }
        if self.angle <= 0.0 || self.angle >= 180.0 {
            return Err(SceneError::InvalidProjection(format!(
                "angle {} outside (0, 180)",
                self.angle
            )));
        }
        if self.kind == ProjectionKind::Perspective && self.near <= 0.0 {
            return Err(SceneError::InvalidProjection(format!(
                "perspective near plane {} must be positive",
                self.near
            )));
        }
        if self.far <= self.near {
            return Err(SceneError::InvalidProjection(format!(
                "far plane {} must be beyond near plane {}",
                self.far, self.near
            )));
        }
        Ok(())
    }

    /// Projection matrix for the given aspect ratio
    ///
    /// Orthographic projections use `ortho`, the bounds derived for the
    /// current camera distance.
    pub fn matrix(&self, aspect: f32, ortho: &OrthoBounds) -> Mat4 {
        match self.kind {
            ProjectionKind::Perspective => {
                Mat4::new_perspective(aspect, self.angle.to_radians(), self.near, self.far)
            }
            ProjectionKind::Orthographic => ortho.matrix(),
        }
    }
}

/// Axis-aligned box of an orthographic projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoBounds {
    /// Left clipping plane
    pub left: f32,
    /// Right clipping plane
    pub right: f32,
    /// Bottom clipping plane
    pub bottom: f32,
    /// Top clipping plane
    pub top: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
}

impl Default for OrthoBounds {
    fn default() -> Self {
        Self { left: -1.0, right: 1.0, bottom: -1.0, top: 1.0, near: -1.0, far: 1.0 }
    }
}

impl OrthoBounds {
    /// Box that shows at `distance` what the perspective frustum shows there
    pub fn from_perspective(angle: f32, aspect: f32, distance: f32, near: f32, far: f32) -> Self {
        let half_height = distance * (angle.to_radians() * 0.5).tan();
        let half_width = half_height * aspect;
        Self {
            left: -half_width,
            right: half_width,
            bottom: -half_height,
            top: half_height,
            near,
            far,
        }
    }

    /// Pixel-space box covering a viewport, for screen overlays
    pub fn overlay(viewport: &ViewportRect) -> Self {
        Self {
            left: 0.0,
            right: viewport.width as f32,
            bottom: 0.0,
            top: viewport.height as f32,
            near: -1.0,
            far: 1.0,
        }
    }

    /// Orthographic projection matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::new_orthographic(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }
}

/// Pixel rectangle a World draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportRect {
    /// Left edge in pixels
    pub x: i32,
    /// Bottom edge in pixels
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ViewportRect {
    /// Create a viewport rectangle
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Width divided by height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Plane in Hessian normal form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal
    pub normal: Vec3,
    /// Offset along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a plane from a normal and offset; the normal is normalized
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Plane through `point` with the given normal
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self { normal, distance: -normal.dot(&point) }
    }

    /// Signed distance from the plane to a point (positive on the normal side)
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Per-frame camera data derived from a World's pure view state
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Camera the frame was built from
    pub camera: CameraState,
    /// World-to-view matrix
    pub view: Mat4,
    /// View-to-clip matrix
    pub projection: Mat4,
    /// Combined projection * view
    pub view_projection: Mat4,
    /// Target pixel rectangle
    pub viewport: ViewportRect,
    /// Forward plane used for depth sorting
    pub plane: Plane,
}

impl CameraFrame {
    /// Derive matrices for one frame
    pub fn new(
        camera: &CameraState,
        projection: &Projection,
        viewport: &ViewportRect,
        ortho: &OrthoBounds,
    ) -> Self {
        let view = camera.view_matrix();
        let projection = projection.matrix(viewport.aspect(), ortho);
        Self {
            camera: camera.clone(),
            view,
            projection,
            view_projection: projection * view,
            viewport: *viewport,
            plane: camera.forward_plane(),
        }
    }

    /// Window position of a world-space point
    ///
    /// Returns `None` for points behind the camera or outside the depth range.
    pub fn project_to_screen(&self, point: &Vec3) -> Option<Vec2> {
        let clip = self.view_projection * Vec4::new(point.x, point.y, point.z, 1.0);
        if clip.w <= EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some(Vec2::new(
            self.viewport.x as f32 + (ndc.x + 1.0) * 0.5 * self.viewport.width as f32,
            self.viewport.y as f32 + (ndc.y + 1.0) * 0.5 * self.viewport.height as f32,
        ))
    }
}
