//! Unified viewer core.
//!
//! Everything between window events and draw calls lives here: load
//! bookkeeping, material classification, composition, pick-and-drag,
//! orbit and viewport state. It never touches the GPU, so the whole update
//! path runs in unit tests. The window layer forwards events, calls
//! [`Viewer::tick`] at a fixed rate and draws [`Viewer::frame`].

use crate::app::input::{ContainerRect, PointerState};
use crate::app::interaction::InteractionController;
use crate::app::viewport::{ViewportBinding, ViewportSize};
use crate::assets::material::MaterialClassifier;
use crate::assets::{LoadTicket, LoadTracker, ModelAsset, ModelLoaded};
use crate::config::ViewerConfig;
use crate::render::camera::{OrbitCameraRig, PerspectiveCamera};
use crate::render::pick::pick_model;
use crate::scene::{compose, framing_eye, Composition, InitialPosition, LightRig, Transform};
use glam::{Mat4, Vec2, Vec3};

/// The currently displayed model with its placement.
#[derive(Debug)]
pub struct LoadedModel {
    pub generation: u64,
    pub asset: ModelAsset,
    pub transform: Transform,
    pub initial_position: InitialPosition,
    pub composition: Composition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// Superseded by a newer request or delivered after teardown.
    Stale,
    Failed,
    Degenerate,
}

/// Which gesture a press started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    ModelDrag,
    CameraOrbit,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameSnapshot {
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    /// `None` while no model is loaded.
    pub model: Option<ModelFrame>,
    pub lights: LightRig,
    pub exposure: f32,
    pub environment_intensity: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelFrame {
    pub generation: u64,
    pub matrix: Mat4,
}

pub struct Viewer {
    config: ViewerConfig,
    classifier: MaterialClassifier,
    loads: LoadTracker,
    model: Option<LoadedModel>,
    interaction: InteractionController,
    pointer: PointerState,
    rig: OrbitCameraRig,
    camera: PerspectiveCamera,
    viewport: ViewportBinding,
    lights: LightRig,
}

impl Viewer {
    pub fn new(config: ViewerConfig, size: ViewportSize) -> Self {
        let classifier = MaterialClassifier::new(config.materials.clone(), config.unmatched_policy());
        let camera = PerspectiveCamera::new(&config.camera, size.aspect().unwrap_or(1.0));
        let mut rig = OrbitCameraRig::new(config.orbit);
        rig.frame(framing_eye(config.mode, 1.0), Vec3::ZERO);
        let mut viewer = Self {
            classifier,
            loads: LoadTracker::new(),
            model: None,
            interaction: InteractionController::new(),
            pointer: PointerState::default(),
            rig,
            camera,
            viewport: ViewportBinding::new(size),
            lights: LightRig::default(),
            config,
        };
        viewer.rig.apply(&mut viewer.camera);
        viewer
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    #[cfg(test)]
    pub fn rig(&self) -> &OrbitCameraRig {
        &self.rig
    }

    #[cfg(test)]
    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    /// Starts a new load, releasing the current model first. The caller runs
    /// the returned ticket on a loader and feeds the result to `accept_load`.
    pub fn request_load(&mut self, source: &str) -> Option<LoadTicket> {
        let ticket = self.loads.begin(source)?;
        if let Some(previous) = self.model.take() {
            log::info!("Releasing model '{}' for '{}'", previous.asset.name, source);
        }
        self.interaction.release();
        Some(ticket)
    }

    pub fn accept_load(&mut self, loaded: ModelLoaded) -> LoadOutcome {
        let ModelLoaded { ticket, result } = loaded;
        if !self.loads.finish(&ticket) {
            log::debug!(
                "Discarding stale load of '{}' (generation {})",
                ticket.source,
                ticket.generation
            );
            return LoadOutcome::Stale;
        }
        let mut asset = match result {
            Ok(asset) => asset,
            Err(err) => {
                log::warn!("Model load failed: {err}");
                return LoadOutcome::Failed;
            }
        };

        let report = self.classifier.apply(&mut asset);
        log::info!(
            "Classified {} meshes of '{}' ({} by rule)",
            report.meshes.len(),
            asset.name,
            report.rule_hits()
        );

        let composition = match compose(
            &asset,
            self.viewport.size(),
            self.config.footprint_ratio,
            self.config.mode,
        ) {
            Ok(composition) => composition,
            Err(err) => {
                log::warn!("Skipping composition of '{}': {err}", asset.name);
                return LoadOutcome::Degenerate;
            }
        };

        self.rig.frame(composition.eye, Vec3::ZERO);
        self.rig.apply(&mut self.camera);
        // The model's far side must stay inside the frustum at full zoom-out.
        let reach = self.rig.max_distance() + composition.fitted_extent;
        self.camera.far = if reach.is_finite() {
            self.config.camera.far.max(reach)
        } else {
            self.config.camera.far
        };
        log::debug!(
            "Camera framed at distance {:.1}, far plane {:.1}",
            self.rig.distance(),
            self.camera.far
        );
        self.lights = composition.lights;
        self.model = Some(LoadedModel {
            generation: ticket.generation,
            transform: composition.transform,
            initial_position: composition.initial_position,
            composition,
            asset,
        });
        LoadOutcome::Applied
    }

    pub fn pointer_moved(&mut self, client: Vec2, rect: ContainerRect) {
        if !self.pointer.update(client, rect) {
            return;
        }
        if self.rig.is_dragging() {
            self.rig.drag_to(client, rect.height);
        }
        log::trace!("pointer ndc={:?} offset={:?}", self.pointer.ndc(), self.pointer.offset());
    }

    /// Decides per gesture between dragging the model and orbiting the camera.
    pub fn pointer_pressed(&mut self, rect: ContainerRect) -> PressOutcome {
        self.pointer.refresh(rect);
        let hit = self
            .model
            .as_ref()
            .filter(|_| self.config.mode.allows_picking())
            .and_then(|model| {
                let ray = self.camera.ray_through(self.pointer.ndc());
                pick_model(&ray, &model.asset, model.transform.matrix())
            });
        if let Some(hit) = &hit {
            log::debug!(
                "picked mesh {} at {:?} (distance {:.2})",
                hit.mesh_index,
                hit.point,
                hit.distance
            );
        }
        if self.interaction.press(hit.is_some()) {
            PressOutcome::ModelDrag
        } else {
            self.rig.begin_drag(self.pointer.client());
            PressOutcome::CameraOrbit
        }
    }

    /// Ends whichever gesture is active, wherever the pointer is.
    pub fn pointer_released(&mut self) {
        self.interaction.release();
        self.rig.end_drag();
    }

    pub fn focus_lost(&mut self) {
        self.pointer_released();
    }

    pub fn scroll(&mut self, steps: f32) {
        self.rig.zoom(steps);
    }

    /// Returns the new framebuffer size when the surface must be reconfigured.
    pub fn resize(&mut self, size: ViewportSize) -> Option<ViewportSize> {
        self.viewport.resize(size, &mut self.camera)
    }

    /// One fixed-rate update: model motion, then camera damping.
    pub fn tick(&mut self) {
        if let Some(model) = self.model.as_mut() {
            self.interaction.tick(
                &mut model.transform,
                model.initial_position,
                self.pointer.offset(),
                &self.config.motion,
            );
        }
        self.rig.update();
        self.rig.apply(&mut self.camera);
    }

    pub fn frame(&self) -> FrameSnapshot {
        FrameSnapshot {
            view_projection: self.camera.view_projection(),
            camera_position: self.camera.eye,
            model: self.model.as_ref().map(|model| ModelFrame {
                generation: model.generation,
                matrix: model.transform.matrix(),
            }),
            lights: self.lights,
            exposure: self.config.camera.exposure,
            environment_intensity: self.config.environment_intensity,
        }
    }

    /// Drops the model and rejects every later load result. Returns false if
    /// already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.loads.is_closed() {
            return false;
        }
        self.loads.close();
        self.interaction.release();
        self.rig.end_drag();
        if let Some(model) = self.model.take() {
            log::info!("Released model '{}'", model.asset.name);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::interaction::InteractionState;
    use crate::assets::tests::{cube_gltf, unit_cube_asset};
    use crate::assets::{parse_model_bytes, AssetError};
    use crate::config::PresentationMode;

    const RECT: ContainerRect = ContainerRect {
        left: 0.0,
        top: 0.0,
        width: 600.0,
        height: 400.0,
    };

    fn viewer(mode: PresentationMode) -> Viewer {
        let config = ViewerConfig {
            mode,
            ..ViewerConfig::default()
        };
        Viewer::new(config, ViewportSize::new(600, 400))
    }

    fn loaded(viewer: &mut Viewer, material: &str) -> LoadOutcome {
        let ticket = viewer.request_load("cube.gltf").unwrap();
        let result = Ok(unit_cube_asset(material));
        viewer.accept_load(ModelLoaded { ticket, result })
    }

    #[test]
    fn cube_in_600x400_scales_to_240() {
        let mut viewer = viewer(PresentationMode::Interactive);
        assert_eq!(loaded(&mut viewer, "Body"), LoadOutcome::Applied);
        let model = viewer.model().unwrap();
        assert!((model.transform.scale() - 240.0).abs() < 1e-3);
        let placed = model.asset.bounds().unwrap().transformed(model.transform.matrix());
        assert!(placed.center().length() < 1e-3);
    }

    #[test]
    fn gold_silver_mesh_gets_silver_profile_through_load() {
        let mut viewer = viewer(PresentationMode::Interactive);
        let ticket = viewer.request_load("ring.gltf").unwrap();
        let bytes = cube_gltf("Gold_Silver_01", [0.0, 0.0, 0.0]);
        let result = parse_model_bytes(&bytes, "ring.gltf");
        assert_eq!(
            viewer.accept_load(ModelLoaded { ticket, result }),
            LoadOutcome::Applied
        );
        let material = &viewer.model().unwrap().asset.meshes[0].material;
        assert_eq!(material.metalness, 1.0);
        assert!((material.roughness - 0.2).abs() < 1e-6);
    }

    #[test]
    fn static_mode_forces_uniform_silver() {
        let mut viewer = viewer(PresentationMode::Static);
        loaded(&mut viewer, "Leather");
        let material = &viewer.model().unwrap().asset.meshes[0].material;
        assert!((material.roughness - 0.05).abs() < 1e-6);
        assert_eq!(material.metalness, 1.0);
    }

    #[test]
    fn full_zoom_out_keeps_model_inside_far_plane() {
        let config = ViewerConfig {
            mode: PresentationMode::Static,
            ..ViewerConfig::default()
        };
        let mut viewer = Viewer::new(config, ViewportSize::new(2560, 1440));
        assert_eq!(loaded(&mut viewer, "Body"), LoadOutcome::Applied);
        viewer.scroll(-1000.0);
        viewer.tick();
        let model = viewer.model().unwrap();
        assert!(viewer.rig().distance() > 5000.0);
        let clip = viewer.camera().view_projection() * model.transform.matrix();
        for corner in model.asset.bounds().unwrap().corners() {
            let ndc = clip.project_point3(corner);
            assert!(ndc.z <= 1.0 && ndc.z >= 0.0, "corner depth {}", ndc.z);
        }
    }

    #[test]
    fn static_mode_ignores_material_names() {
        let mut viewer = viewer(PresentationMode::Static);
        loaded(&mut viewer, "Gold_Ring");
        let material = &viewer.model().unwrap().asset.meshes[0].material;
        assert!((material.roughness - 0.05).abs() < 1e-6);
        assert_eq!(material.env_intensity, 1.5);
    }

    #[test]
    fn press_on_model_drags_and_release_outside_clears_it() {
        let mut viewer = viewer(PresentationMode::Interactive);
        loaded(&mut viewer, "Body");
        viewer.pointer_moved(Vec2::new(300.0, 200.0), RECT);
        assert_eq!(viewer.pointer_pressed(RECT), PressOutcome::ModelDrag);
        assert!(!viewer.rig().is_dragging());

        viewer.pointer_moved(Vec2::new(-250.0, 900.0), RECT);
        viewer.tick();
        viewer.pointer_released();
        assert_eq!(viewer.interaction().state(), InteractionState::Idle);
    }

    #[test]
    fn press_off_model_orbits_camera() {
        let mut viewer = viewer(PresentationMode::Interactive);
        loaded(&mut viewer, "Body");
        viewer.pointer_moved(Vec2::new(5.0, 5.0), RECT);
        assert_eq!(viewer.pointer_pressed(RECT), PressOutcome::CameraOrbit);
        assert!(viewer.rig().is_dragging());
        assert!(!viewer.interaction().is_dragging());

        let eye_before = viewer.camera().eye;
        viewer.pointer_moved(Vec2::new(80.0, 5.0), RECT);
        viewer.tick();
        assert!((viewer.camera().eye - eye_before).length() > 1e-3);
        viewer.focus_lost();
        assert!(!viewer.rig().is_dragging());
    }

    #[test]
    fn static_mode_never_picks() {
        let mut viewer = viewer(PresentationMode::Static);
        loaded(&mut viewer, "Body");
        viewer.pointer_moved(Vec2::new(300.0, 200.0), RECT);
        assert_eq!(viewer.pointer_pressed(RECT), PressOutcome::CameraOrbit);
    }

    #[test]
    fn released_model_returns_to_rest() {
        let mut viewer = viewer(PresentationMode::Interactive);
        loaded(&mut viewer, "Body");
        viewer.pointer_moved(Vec2::new(300.0, 200.0), RECT);
        viewer.pointer_pressed(RECT);
        viewer.pointer_moved(Vec2::new(600.0, 0.0), RECT);
        for _ in 0..100 {
            viewer.tick();
        }
        let model = viewer.model().unwrap();
        assert!((model.transform.position - model.initial_position.get()).length() > 0.5);

        viewer.pointer_released();
        for _ in 0..150 {
            viewer.tick();
        }
        let model = viewer.model().unwrap();
        assert!((model.transform.position - model.initial_position.get()).length() < 1e-3);
    }

    #[test]
    fn resize_leaves_model_placement_alone() {
        let mut viewer = viewer(PresentationMode::Interactive);
        loaded(&mut viewer, "Body");
        let before = viewer.model().unwrap().transform;
        let initial = viewer.model().unwrap().initial_position;

        assert_eq!(
            viewer.resize(ViewportSize::new(1200, 300)),
            Some(ViewportSize::new(1200, 300))
        );
        assert!((viewer.camera().aspect - 4.0).abs() < 1e-6);
        assert_eq!(viewer.resize(ViewportSize::new(0, 300)), None);
        assert!((viewer.camera().aspect - 4.0).abs() < 1e-6);

        let model = viewer.model().unwrap();
        assert_eq!(model.transform, before);
        assert_eq!(model.initial_position, initial);
    }

    #[test]
    fn failed_load_keeps_producing_frames() {
        let mut viewer = viewer(PresentationMode::Interactive);
        let ticket = viewer.request_load("not-a-model.glb").unwrap();
        let result = Err(AssetError::Fetch {
            uri: "not-a-model.glb".into(),
            reason: "404".into(),
        });
        assert_eq!(
            viewer.accept_load(ModelLoaded { ticket, result }),
            LoadOutcome::Failed
        );
        for _ in 0..3 {
            viewer.tick();
            let frame = viewer.frame();
            assert!(frame.model.is_none());
            assert!(frame.view_projection.is_finite());
        }
    }

    #[test]
    fn degenerate_model_is_not_composed() {
        let mut viewer = viewer(PresentationMode::Interactive);
        let ticket = viewer.request_load("flat.glb").unwrap();
        let mut asset = unit_cube_asset("Body");
        for p in &mut asset.meshes[0].positions {
            *p = [1.0, 1.0, 1.0];
        }
        assert_eq!(
            viewer.accept_load(ModelLoaded {
                ticket,
                result: Ok(asset)
            }),
            LoadOutcome::Degenerate
        );
        assert!(viewer.model().is_none());
    }

    #[test]
    fn superseded_load_is_discarded() {
        let mut viewer = viewer(PresentationMode::Interactive);
        let first = viewer.request_load("a.glb").unwrap();
        let second = viewer.request_load("b.glb").unwrap();
        let stale = viewer.accept_load(ModelLoaded {
            ticket: first,
            result: Ok(unit_cube_asset("A")),
        });
        assert_eq!(stale, LoadOutcome::Stale);
        assert!(viewer.model().is_none());
        let fresh = viewer.accept_load(ModelLoaded {
            ticket: second,
            result: Ok(unit_cube_asset("B")),
        });
        assert_eq!(fresh, LoadOutcome::Applied);
    }

    #[test]
    fn new_request_releases_current_model() {
        let mut viewer = viewer(PresentationMode::Interactive);
        loaded(&mut viewer, "Body");
        assert!(viewer.model().is_some());
        viewer.request_load("next.glb").unwrap();
        assert!(viewer.model().is_none());
    }

    #[test]
    fn teardown_rejects_in_flight_results() {
        let mut viewer = viewer(PresentationMode::Interactive);
        let ticket = viewer.request_load("slow.glb").unwrap();
        assert!(viewer.teardown());
        assert!(!viewer.teardown());
        let outcome = viewer.accept_load(ModelLoaded {
            ticket,
            result: Ok(unit_cube_asset("Body")),
        });
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(viewer.model().is_none());
        assert!(viewer.request_load("again.glb").is_none());
    }

    #[test]
    fn idle_model_spins_without_input() {
        let mut viewer = viewer(PresentationMode::Static);
        loaded(&mut viewer, "Body");
        for _ in 0..10 {
            viewer.tick();
        }
        let yaw = viewer.model().unwrap().transform.rotation.y;
        assert!((yaw - 0.03).abs() < 1e-5);
    }
}
