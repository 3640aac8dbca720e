use glam::Vec2;

/// Client-space rectangle of the render surface at the time of an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ContainerRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle of a window client area, which always starts at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    client: Vec2,
    ndc: Vec2,
    offset: Vec2,
}

impl PointerState {
    /// Records a pointer position in client pixels and normalises it against
    /// `rect`. Returns false and leaves the state untouched when `rect` has no area.
    pub fn update(&mut self, client: Vec2, rect: ContainerRect) -> bool {
        if !rect.has_area() || !client.is_finite() {
            return false;
        }
        let relative = Vec2::new(
            (client.x - rect.left) / rect.width,
            (client.y - rect.top) / rect.height,
        );
        self.client = client;
        self.offset = (relative - Vec2::splat(0.5)).clamp(Vec2::splat(-0.5), Vec2::splat(0.5));
        self.ndc = Vec2::new(relative.x * 2.0 - 1.0, 1.0 - relative.y * 2.0)
            .clamp(Vec2::NEG_ONE, Vec2::ONE);
        true
    }

    /// Re-normalises the last client position against a new rectangle.
    pub fn refresh(&mut self, rect: ContainerRect) -> bool {
        self.update(self.client, rect)
    }

    pub fn client(&self) -> Vec2 {
        self.client
    }

    /// Normalised device coordinates, y up, in [-1, 1].
    pub fn ndc(&self) -> Vec2 {
        self.ndc
    }

    /// Viewport-relative offset from the centre, y down, in [-0.5, 0.5].
    pub fn offset(&self) -> Vec2 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_maps_to_zero() {
        let mut pointer = PointerState::default();
        assert!(pointer.update(Vec2::new(300.0, 200.0), ContainerRect::from_size(600, 400)));
        assert!(pointer.ndc().length() < 1e-6);
        assert!(pointer.offset().length() < 1e-6);
    }

    #[test]
    fn corners_map_to_extremes() {
        let mut pointer = PointerState::default();
        let rect = ContainerRect::new(100.0, 50.0, 600.0, 400.0);
        pointer.update(Vec2::new(100.0, 50.0), rect);
        assert_eq!(pointer.ndc(), Vec2::new(-1.0, 1.0));
        assert_eq!(pointer.offset(), Vec2::new(-0.5, -0.5));
        pointer.update(Vec2::new(700.0, 450.0), rect);
        assert_eq!(pointer.ndc(), Vec2::new(1.0, -1.0));
        assert_eq!(pointer.offset(), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn outside_positions_are_clamped() {
        let mut pointer = PointerState::default();
        pointer.update(Vec2::new(-500.0, 9000.0), ContainerRect::from_size(600, 400));
        assert_eq!(pointer.ndc(), Vec2::new(-1.0, -1.0));
        assert_eq!(pointer.offset(), Vec2::new(-0.5, 0.5));
        assert_eq!(pointer.client(), Vec2::new(-500.0, 9000.0));
    }

    #[test]
    fn normalisation_uses_the_current_rect() {
        let mut pointer = PointerState::default();
        let client = Vec2::new(150.0, 100.0);
        pointer.update(client, ContainerRect::from_size(600, 400));
        let before = pointer.ndc();
        assert!(pointer.refresh(ContainerRect::from_size(300, 200)));
        assert!(pointer.ndc().length() < 1e-6);
        assert_ne!(before, pointer.ndc());
    }

    #[test]
    fn zero_area_rect_is_ignored() {
        let mut pointer = PointerState::default();
        pointer.update(Vec2::new(10.0, 10.0), ContainerRect::from_size(100, 100));
        let snapshot = pointer;
        assert!(!pointer.update(Vec2::new(50.0, 50.0), ContainerRect::from_size(0, 100)));
        assert_eq!(pointer, snapshot);
    }
}
