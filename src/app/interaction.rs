use crate::config::MotionConfig;
use crate::render::camera::wrap_angle;
use crate::scene::{InitialPosition, Transform};
use glam::{Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging,
}

/// Pick-and-drag state machine for the model.
#[derive(Debug, Default)]
pub struct InteractionController {
    state: InteractionState,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn state(&self) -> InteractionState {
        self.state
    }

    #[cfg(test)]
    pub fn is_dragging(&self) -> bool {
        self.state == InteractionState::Dragging
    }

    /// Enters `Dragging` only when the press ray hit a pickable model.
    /// Returns whether the gesture was taken.
    pub fn press(&mut self, hit: bool) -> bool {
        if hit {
            self.state = InteractionState::Dragging;
            log::debug!("model drag started");
            true
        } else {
            false
        }
    }

    /// Unconditional; release position does not matter.
    pub fn release(&mut self) {
        if self.state == InteractionState::Dragging {
            log::debug!("model drag released");
        }
        self.state = InteractionState::Idle;
    }

    /// Advances the model transform by one tick.
    pub fn tick(
        &self,
        transform: &mut Transform,
        initial: InitialPosition,
        offset: Vec2,
        motion: &MotionConfig,
    ) {
        let follow = motion.follow_factor;
        match self.state {
            InteractionState::Dragging => {
                let target_position = initial.get()
                    + Vec3::new(
                        offset.x * motion.drag_range[0],
                        -offset.y * motion.drag_range[1],
                        0.0,
                    );
                let target_pitch = offset.y * motion.rotation_range;
                let target_yaw = offset.x * motion.rotation_range;
                transform.position = transform.position.lerp(target_position, follow);
                transform.rotation.x += (target_pitch - transform.rotation.x) * follow;
                transform.rotation.y = lerp_angle(transform.rotation.y, target_yaw, follow);
            }
            InteractionState::Idle => {
                transform.position = transform.position.lerp(initial.get(), follow);
                transform.rotation.y = wrap_angle(transform.rotation.y + motion.idle_spin);
                transform.rotation.x *= motion.tilt_decay;
            }
        }
    }
}

/// Interpolates along the shorter arc between two angles.
fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    wrap_angle(from + wrap_angle(to - from) * t)
}
