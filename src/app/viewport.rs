use crate::render::camera::PerspectiveCamera;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> Option<f32> {
        (!self.is_empty()).then(|| self.width as f32 / self.height as f32)
    }
}

/// Keeps camera aspect and framebuffer size in step with the container.
#[derive(Debug)]
pub struct ViewportBinding {
    size: ViewportSize,
}

impl ViewportBinding {
    pub fn new(size: ViewportSize) -> Self {
        Self { size }
    }

    /// Last size with a non-zero area.
    pub fn size(&self) -> ViewportSize {
        self.size
    }

    /// Applies a container resize. Zero-area sizes are ignored until a valid
    /// one arrives. Returns the framebuffer size to configure, if it changed.
    pub fn resize(
        &mut self,
        size: ViewportSize,
        camera: &mut PerspectiveCamera,
    ) -> Option<ViewportSize> {
        let aspect = size.aspect()?;
        camera.aspect = aspect;
        if size == self.size {
            return None;
        }
        log::info!(
            "Viewport resized {}x{} -> {}x{}",
            self.size.width,
            self.size.height,
            size.width,
            size.height
        );
        self.size = size;
        Some(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    #[test]
    fn resize_updates_aspect_and_reports_new_size() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.5);
        let mut binding = ViewportBinding::new(ViewportSize::new(600, 400));
        let changed = binding.resize(ViewportSize::new(200, 200), &mut camera);
        assert_eq!(changed, Some(ViewportSize::new(200, 200)));
        assert!((camera.aspect - 1.0).abs() < 1e-6);
        assert_eq!(binding.size(), ViewportSize::new(200, 200));
    }

    #[test]
    fn zero_area_is_skipped() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.5);
        let mut binding = ViewportBinding::new(ViewportSize::new(600, 400));
        assert_eq!(binding.resize(ViewportSize::new(0, 400), &mut camera), None);
        assert_eq!(binding.resize(ViewportSize::new(300, 0), &mut camera), None);
        assert!((camera.aspect - 1.5).abs() < 1e-6);
        assert_eq!(binding.size(), ViewportSize::new(600, 400));
    }

    #[test]
    fn same_size_is_not_reported() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.5);
        let mut binding = ViewportBinding::new(ViewportSize::new(600, 400));
        assert_eq!(binding.resize(ViewportSize::new(600, 400), &mut camera), None);
    }
}
