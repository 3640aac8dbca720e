pub mod material;

use crate::scene::BoundingBox;
use glam::{Mat3, Mat4, Vec3};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Upper bound for a remote model download.
const MAX_REMOTE_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read model at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch model from {uri}: {reason}")]
    Fetch { uri: String, reason: String },
    #[error("failed to parse glTF from {source_name}: {source}")]
    Parse {
        source_name: String,
        #[source]
        source: gltf::Error,
    },
    #[error("no triangle geometry found in {source_name}")]
    NoGeometry { source_name: String },
    #[error("failed to decode environment map {path}: {source}")]
    Environment {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to start loader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Authored (or classified) shading of one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    pub name: String,
    /// Linear RGBA.
    pub base_color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    /// Linear RGB.
    pub emissive: [f32; 3],
    pub reflectivity: f32,
    pub env_intensity: f32,
}

impl MaterialDescriptor {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metalness: 1.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            reflectivity: 0.5,
            env_intensity: 1.0,
        }
    }

    fn from_gltf(material: &gltf::Material, fallback_name: &str) -> Self {
        let pbr = material.pbr_metallic_roughness();
        Self {
            name: material.name().unwrap_or(fallback_name).to_string(),
            base_color: pbr.base_color_factor(),
            metalness: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            emissive: material.emissive_factor(),
            reflectivity: 0.5,
            env_intensity: 1.0,
        }
    }
}

/// One triangle list in model space (node transforms already applied).
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub material: MaterialDescriptor,
}

impl MeshData {
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.positions.iter().map(|p| Vec3::from_array(*p)))
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                Vec3::from_array(self.positions[tri[0] as usize]),
                Vec3::from_array(self.positions[tri[1] as usize]),
                Vec3::from_array(self.positions[tri[2] as usize]),
            ]
        })
    }
}

/// A loaded model: the flattened mesh list of the scene root.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub name: String,
    pub source: String,
    pub meshes: Vec<MeshData>,
    pub classified: bool,
}

impl ModelAsset {
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.meshes
            .iter()
            .filter_map(MeshData::bounds)
            .reduce(|a, b| a.union(&b))
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len() / 3).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    File(PathBuf),
    Remote(String),
}

impl ModelSource {
    pub fn parse(source: &str) -> Self {
        let lower = source.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Remote(source.to_string())
        } else {
            Self::File(PathBuf::from(source))
        }
    }
}

/// Identifies one `load` request; results carrying an older ticket are stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub source: String,
}

#[derive(Debug, Default)]
pub struct LoadTracker {
    generation: u64,
    pending: Option<LoadTicket>,
    closed: bool,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request, superseding any in flight. `None` once closed.
    pub fn begin(&mut self, source: &str) -> Option<LoadTicket> {
        if self.closed {
            return None;
        }
        self.generation += 1;
        let ticket = LoadTicket {
            generation: self.generation,
            source: source.to_string(),
        };
        self.pending = Some(ticket.clone());
        Some(ticket)
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        !self.closed && self.pending.as_ref() == Some(ticket)
    }

    /// Consumes the pending request if `ticket` is it.
    pub fn finish(&mut self, ticket: &LoadTicket) -> bool {
        if self.is_current(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.pending = None;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Result of a background model load.
#[derive(Debug)]
pub struct ModelLoaded {
    pub ticket: LoadTicket,
    pub result: Result<ModelAsset, AssetError>,
}

/// Fetches and parses `ticket.source` on a worker thread, handing the result to
/// `deliver` on that thread.
pub fn spawn_model_load<F>(ticket: LoadTicket, deliver: F) -> Result<(), AssetError>
where
    F: FnOnce(ModelLoaded) + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("model-load-{}", ticket.generation))
        .spawn(move || {
            log::info!("Loading model '{}' (generation {})", ticket.source, ticket.generation);
            let result = load_model(&ticket.source);
            deliver(ModelLoaded { ticket, result });
        })
        .map(|_| ())
        .map_err(AssetError::Spawn)
}

pub fn load_model(source: &str) -> Result<ModelAsset, AssetError> {
    match ModelSource::parse(source) {
        ModelSource::File(path) => load_model_file(&path, source),
        ModelSource::Remote(uri) => {
            let bytes = fetch_remote(&uri)?;
            parse_model_bytes(&bytes, source)
        }
    }
}

fn load_model_file(path: &Path, source: &str) -> Result<ModelAsset, AssetError> {
    let is_json_gltf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gltf"));
    if is_json_gltf {
        // Path import resolves sibling .bin and image files.
        if !path.exists() {
            return Err(AssetError::Read {
                path: path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        let (document, buffers, _images) =
            gltf::import(path).map_err(|err| AssetError::Parse {
                source_name: path.display().to_string(),
                source: err,
            })?;
        return build_asset(source, &document, &buffers);
    }
    let bytes = std::fs::read(path).map_err(|err| AssetError::Read {
        path: path.display().to_string(),
        source: err,
    })?;
    parse_model_bytes(&bytes, source)
}

fn fetch_remote(uri: &str) -> Result<Vec<u8>, AssetError> {
    let response = ureq::get(uri).call().map_err(|err| AssetError::Fetch {
        uri: uri.to_string(),
        reason: err.to_string(),
    })?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_REMOTE_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|err| AssetError::Fetch {
            uri: uri.to_string(),
            reason: err.to_string(),
        })?;
    Ok(bytes)
}

/// Parses a `.glb` or self-contained `.gltf` from memory.
pub fn parse_model_bytes(bytes: &[u8], source: &str) -> Result<ModelAsset, AssetError> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|err| AssetError::Parse {
            source_name: source.to_string(),
            source: err,
        })?;
    build_asset(source, &document, &buffers)
}

fn build_asset(
    source: &str,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Result<ModelAsset, AssetError> {
    let mut meshes = Vec::new();
    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                collect_node(&node, Mat4::IDENTITY, buffers, &mut meshes);
            }
        }
        None => {
            for mesh in document.meshes() {
                append_mesh(&mesh, Mat4::IDENTITY, buffers, &mut meshes);
            }
        }
    }
    if meshes.is_empty() {
        return Err(AssetError::NoGeometry {
            source_name: source.to_string(),
        });
    }
    let name = Path::new(source)
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("model")
        .to_string();
    let asset = ModelAsset {
        name,
        source: source.to_string(),
        meshes,
        classified: false,
    };
    log::info!(
        "Parsed '{}': {} meshes, {} triangles",
        asset.name,
        asset.meshes.len(),
        asset.triangle_count()
    );
    Ok(asset)
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshData>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        append_mesh(&mesh, world, buffers, out);
    }
    for child in node.children() {
        collect_node(&child, world, buffers, out);
    }
}

fn append_mesh(
    mesh: &gltf::Mesh,
    world: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshData>,
) {
    let mesh_name = mesh
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();

    for prim in mesh.primitives() {
        if prim.mode() != gltf::mesh::Mode::Triangles {
            log::debug!("skipping non-triangle primitive in '{}'", mesh_name);
            continue;
        }
        let reader = prim.reader(|b| buffers.get(b.index()).map(|data| data.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions
            .map(|p| world.transform_point3(Vec3::from_array(p)).to_array())
            .collect();
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        if indices.len() < 3 || indices.iter().any(|&i| i as usize >= positions.len()) {
            log::warn!("skipping primitive with invalid indices in '{}'", mesh_name);
            continue;
        }
        let normals: Vec<[f32; 3]> = match reader
            .read_normals()
            .filter(|normals| normals.len() == positions.len())
        {
            Some(normals) => normals
                .map(|n| {
                    (normal_matrix * Vec3::from_array(n))
                        .normalize_or_zero()
                        .to_array()
                })
                .collect(),
            None => smooth_normals(&positions, &indices),
        };
        let material = MaterialDescriptor::from_gltf(&prim.material(), &mesh_name);
        out.push(MeshData {
            name: mesh_name.clone(),
            positions,
            normals,
            indices,
            material,
        });
    }
}

/// Area-weighted vertex normals for meshes exported without them.
pub fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let a = Vec3::from_array(positions[tri[0] as usize]);
        let b = Vec3::from_array(positions[tri[1] as usize]);
        let c = Vec3::from_array(positions[tri[2] as usize]);
        let face = (b - a).cross(c - a);
        for &i in tri {
            accum[i as usize] += face;
        }
    }
    accum
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

/// Decoded equirectangular reflection map.
#[derive(Debug, Clone)]
pub struct EnvironmentImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub fn load_environment(path: &Path) -> Result<EnvironmentImage, AssetError> {
    let image = image::open(path).map_err(|source| AssetError::Environment {
        path: path.display().to_string(),
        source,
    })?;
    let rgba = image.to_rgba8();
    Ok(EnvironmentImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

pub fn spawn_environment_load<F>(path: PathBuf, deliver: F) -> Result<(), AssetError>
where
    F: FnOnce(Result<EnvironmentImage, AssetError>) + Send + 'static,
{
    std::thread::Builder::new()
        .name("environment-load".to_string())
        .spawn(move || deliver(load_environment(&path)))
        .map(|_| ())
        .map_err(AssetError::Spawn)
}
