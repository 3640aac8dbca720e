use crate::app::viewport::ViewportSize;
use crate::assets::ModelAsset;
use crate::config::PresentationMode;
use glam::{EulerRot, Mat4, Quat, Vec3};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ComposeError {
    #[error("model has no geometry to frame")]
    EmptyGeometry,
    #[error("model bounding box is degenerate (max dimension {max_dimension})")]
    Degenerate { max_dimension: f32 },
    #[error("viewport {width}x{height} has no area")]
    EmptyViewport { width: u32, height: u32 },
}

/// Axis-aligned extent of model geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }

    #[cfg(test)]
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after `matrix`.
    #[cfg(test)]
    pub fn transformed(&self, matrix: Mat4) -> Self {
        let corners = self.corners().map(|c| matrix.transform_point3(c));
        // Eight corners, never empty.
        Self::from_points(corners).unwrap_or(*self)
    }
}

/// Model placement. Scale is fixed at composition time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in radians, XYZ order.
    pub rotation: Vec3,
    scale: f32,
}

impl Transform {
    fn new(position: Vec3, scale: f32) -> Self {
        debug_assert!(scale > 0.0 && scale.is_finite());
        Self {
            position,
            rotation: Vec3::ZERO,
            scale,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z),
            self.position,
        )
    }
}

/// Rest position recorded right after centering; drag-release returns here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialPosition(Vec3);

impl InitialPosition {
    pub fn get(&self) -> Vec3 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    /// Linear RGB times intensity.
    pub ambient: Vec3,
    pub key_position: Vec3,
    /// Linear RGB times intensity.
    pub key_color: Vec3,
}

impl LightRig {
    /// White ambient (1.5) plus a white key light (2.0) up and to the front-right.
    pub fn studio(extent: f32) -> Self {
        Self {
            ambient: Vec3::splat(1.5),
            key_position: Vec3::new(5.0, 10.0, 5.0).normalize() * extent.max(1.0) * 2.0,
            key_color: Vec3::splat(2.0),
        }
    }
}

impl Default for LightRig {
    fn default() -> Self {
        Self::studio(1.0)
    }
}

/// Camera eye for a model whose largest side is `extent` after scaling.
pub fn framing_eye(mode: PresentationMode, extent: f32) -> Vec3 {
    match mode {
        PresentationMode::Static => Vec3::new(0.0, extent * 2.0, 0.0),
        PresentationMode::Interactive => Vec3::new(0.0, 0.6, 0.8) * (extent * 1.8),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Composition {
    pub transform: Transform,
    pub initial_position: InitialPosition,
    /// Largest side after scaling.
    pub fitted_extent: f32,
    pub eye: Vec3,
    pub lights: LightRig,
}

/// Centers `asset` on the origin and scales it to fill `footprint_ratio` of the
/// smaller viewport side. Runs once per loaded asset.
pub fn compose(
    asset: &ModelAsset,
    viewport: ViewportSize,
    footprint_ratio: f32,
    mode: PresentationMode,
) -> Result<Composition, ComposeError> {
    let bounds = asset.bounds().ok_or(ComposeError::EmptyGeometry)?;
    let max_dimension = bounds.max_dimension();
    if !max_dimension.is_finite() || max_dimension <= f32::EPSILON {
        return Err(ComposeError::Degenerate { max_dimension });
    }
    if viewport.is_empty() {
        return Err(ComposeError::EmptyViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    let fit = (viewport.width as f32 * footprint_ratio).min(viewport.height as f32 * footprint_ratio);
    let scale = fit / max_dimension;
    let center = bounds.center();
    // Center is scaled along with the geometry.
    let position = -center * scale;
    let transform = Transform::new(position, scale);
    let fitted_extent = max_dimension * scale;

    log::info!(
        "Composed '{}': center={:?} size={:?} scale={:.4}",
        asset.name,
        center,
        bounds.size(),
        scale
    );

    Ok(Composition {
        transform,
        initial_position: InitialPosition(position),
        fitted_extent,
        eye: framing_eye(mode, fitted_extent),
        lights: LightRig::studio(fitted_extent),
    })
}
