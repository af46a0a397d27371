use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::mesh::{Mesh, VertexLayout};
use crate::obj::load_obj_from_str;
use crate::render::pipeline::CullFace;

/// Rotation of `degrees` about `axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAngle {
    pub axis: Vec3,
    pub degrees: f32,
}

impl AxisAngle {
    pub fn new(axis: Vec3, degrees: f32) -> Self {
        Self { axis, degrees }
    }

    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_quat(Quat::from_axis_angle(
            self.axis.normalize(),
            self.degrees.to_radians(),
        ))
    }
}

/// One placed copy of a loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInstance {
    /// Index into [`Scene::models`].
    pub model: usize,
    pub translation: Vec3,
    /// Applied in order, the first entry outermost.
    #[serde(default)]
    pub rotations: Vec<AxisAngle>,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    /// Faces discarded while drawing this instance.
    pub cull: CullFace,
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

impl ModelInstance {
    /// `translate * rotate... * scale`
    pub fn model_matrix(&self) -> Mat4 {
        let rotation = self
            .rotations
            .iter()
            .fold(Mat4::IDENTITY, |acc, rotation| acc * rotation.to_matrix());
        Mat4::from_translation(self.translation) * rotation * Mat4::from_scale(self.scale)
    }
}

/// A model mesh together with the textures it samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub mesh: Mesh,
    pub diffuse: PathBuf,
    pub specular: Option<PathBuf>,
}

/// File locations of every texture the scene samples, relative to the
/// resource root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAssets {
    pub foliage: PathBuf,
    pub water_diffuse: PathBuf,
    pub water_specular: PathBuf,
    /// `+X, -X, +Y, -Y, +Z, -Z`
    pub skybox: [PathBuf; 6],
}

impl Default for SceneAssets {
    fn default() -> Self {
        let sky = |face: &str| PathBuf::from(format!("textures/skybox/rainbow_{face}.png"));
        Self {
            foliage: PathBuf::from("textures/skybox/rainbow_dn.png"),
            water_diffuse: PathBuf::from("textures/river.jpg"),
            water_specular: PathBuf::from("textures/river_specular.jpg"),
            skybox: [
                sky("ft"),
                sky("bk"),
                sky("up"),
                sky("dn"),
                sky("rt"),
                sky("lf"),
            ],
        }
    }
}

/// The static outdoor scene: ground foliage, a water strip, placed models
/// and a skybox.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub root: PathBuf,
    pub assets: SceneAssets,
    pub foliage: Mesh,
    pub water: Mesh,
    pub skybox: Mesh,
    pub models: Vec<Model>,
    pub instances: Vec<ModelInstance>,
}

const TREE_MODEL: &str = "objects/tree/tree.obj";
const TREE_DIFFUSE: &str = "objects/tree/tree_diffuse.png";

impl Scene {
    /// Builds the scene, loading models below `root`.
    ///
    /// Models that cannot be read or parsed are replaced by a unit cube.
    pub fn load(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let tree = load_model_or_cube(&root, TREE_MODEL);
        let models = vec![Model {
            name: TREE_MODEL.to_string(),
            mesh: tree,
            diffuse: PathBuf::from(TREE_DIFFUSE),
            specular: None,
        }];
        Self {
            root,
            assets: SceneAssets::default(),
            foliage: foliage_quad(),
            water: water_strip(),
            skybox: skybox_cube(),
            models,
            instances: tree_instances(0),
        }
    }

    /// Resolves an asset path against the resource root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

fn load_model_or_cube(root: &Path, relative: &str) -> Mesh {
    let path = root.join(relative);
    match load_model(&path) {
        Ok(mesh) => {
            info!(
                "loaded model {} ({} triangles)",
                path.display(),
                mesh.triangle_count()
            );
            mesh
        }
        Err(err) => {
            error!("failed to load model {}: {err:#}", path.display());
            Mesh::unit_cube()
        }
    }
}

fn load_model(path: &Path) -> Result<Mesh> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("unable to read {}", path.display()))?;
    load_obj_from_str(&contents).with_context(|| format!("failed to parse OBJ mesh {}", path.display()))
}

fn tree_instances(model: usize) -> Vec<ModelInstance> {
    [
        (Vec3::new(-10.0, -1.0, -10.0), 0.003, 45.0),
        (Vec3::new(0.0, -1.0, -10.0), 0.35, 50.0),
        (Vec3::new(10.0, -1.0, -10.0), 0.32, 60.0),
    ]
    .into_iter()
    .map(|(translation, scale, yaw)| ModelInstance {
        model,
        translation,
        rotations: vec![AxisAngle::new(Vec3::Y, yaw)],
        scale: Vec3::splat(scale),
        // the tree mesh is authored with inward-facing winding
        cull: CullFace::Front,
    })
    .collect()
}

/// Ground quad, 30x30 units, just below the water plane.
pub fn foliage_quad() -> Mesh {
    #[rustfmt::skip]
    let vertices = vec![
        // position              // uv
        15.0, -1.01, 15.0,       1.0, 1.0,
        15.0, -1.01, -15.0,      1.0, 0.0,
        -15.0, -1.01, -15.0,     0.0, 1.0,
        -15.0, -1.01, 15.0,      0.0, 0.0,
    ];
    Mesh {
        layout: VertexLayout::PositionUv,
        vertices,
        indices: Some(vec![0, 1, 3, 1, 2, 3]),
    }
}

/// Banks of the river as `(x, z_far, z_near)` pairs, west to east.
const WATER_BANKS: [(f32, f32, f32); 26] = [
    (-15.0, -3.062, 1.438),
    (-13.8, -3.42156, 0.95844),
    (-12.6, -3.98319, 0.276814),
    (-11.4, -4.55069, -0.410685),
    (-10.2, -4.92581, -0.905814),
    (-9.0, -4.97753, -1.07753),
    (-7.8, -4.68777, -0.907766),
    (-6.6, -4.15775, -0.497746),
    (-5.4, -3.57262, -0.0326207),
    (-4.2, -3.13679, 0.283209),
    (-3.0, -3.00251, 0.297495),
    (-1.8, -3.21667, -0.0366724),
    (-0.600002, -3.70448, -0.644479),
    (0.599998, -4.29552, -1.35552),
    (1.8, -4.78333, -1.96333),
    (3.0, -4.99749, -2.29749),
    (4.2, -4.86321, -2.28321),
    (5.4, -4.42738, -1.96738),
    (6.6, -3.84226, -1.50226),
    (7.8, -3.31223, -1.09223),
    (9.0, -3.02247, -0.92247),
    (10.2, -3.07418, -1.09418),
    (11.4, -3.44931, -1.58931),
    (12.6, -4.01681, -2.27681),
    (13.8, -4.57844, -2.95844),
    (15.0, -4.938, -3.438),
];

const WATER_HEIGHT: f32 = -1.0;

/// Meandering water strip at `y = -1` with upward normals.
///
/// Each bank pair becomes two vertices; consecutive vertex triples form the
/// triangles, so texture coordinates cycle every four vertices.
pub fn water_strip() -> Mesh {
    const UV_CYCLE: [[f32; 2]; 4] = [[1.0, 1.0], [1.0, 0.0], [0.0, 0.0], [0.0, 1.0]];

    let mut vertices = Vec::with_capacity(WATER_BANKS.len() * 2 * 8);
    for (i, (x, far, near)) in WATER_BANKS.iter().enumerate() {
        for (j, z) in [far, near].into_iter().enumerate() {
            let uv = UV_CYCLE[(i * 2 + j) % 4];
            vertices.extend_from_slice(&[*x, WATER_HEIGHT, *z, 0.0, 1.0, 0.0, uv[0], uv[1]]);
        }
    }
    let vertex_count = (WATER_BANKS.len() * 2) as u32;
    let indices = (0..vertex_count - 2)
        .flat_map(|i| [i, i + 1, i + 2])
        .collect();

    Mesh {
        layout: VertexLayout::PositionNormalUv,
        vertices,
        indices: Some(indices),
    }
}

/// Inward-facing cube spanning `[-1, 1]` for the skybox, 36 vertices.
pub fn skybox_cube() -> Mesh {
    #[rustfmt::skip]
    let vertices = vec![
        -1.0,  1.0, -1.0,  -1.0, -1.0, -1.0,   1.0, -1.0, -1.0,
         1.0, -1.0, -1.0,   1.0,  1.0, -1.0,  -1.0,  1.0, -1.0,

        -1.0, -1.0,  1.0,  -1.0, -1.0, -1.0,  -1.0,  1.0, -1.0,
        -1.0,  1.0, -1.0,  -1.0,  1.0,  1.0,  -1.0, -1.0,  1.0,

         1.0, -1.0, -1.0,   1.0, -1.0,  1.0,   1.0,  1.0,  1.0,
         1.0,  1.0,  1.0,   1.0,  1.0, -1.0,   1.0, -1.0, -1.0,

        -1.0, -1.0,  1.0,  -1.0,  1.0,  1.0,   1.0,  1.0,  1.0,
         1.0,  1.0,  1.0,   1.0, -1.0,  1.0,  -1.0, -1.0,  1.0,

        -1.0,  1.0, -1.0,   1.0,  1.0, -1.0,   1.0,  1.0,  1.0,
         1.0,  1.0,  1.0,  -1.0,  1.0,  1.0,  -1.0,  1.0, -1.0,

        -1.0, -1.0, -1.0,  -1.0, -1.0,  1.0,   1.0, -1.0, -1.0,
         1.0, -1.0, -1.0,  -1.0, -1.0,  1.0,   1.0, -1.0,  1.0,
    ];
    Mesh {
        layout: VertexLayout::Position,
        vertices,
        indices: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const EPS: f32 = 1e-5;

    #[test]
    fn model_matrix_scales_then_rotates_then_translates() {
        let instance = ModelInstance {
            model: 0,
            translation: Vec3::new(10.0, 0.0, 0.0),
            rotations: vec![AxisAngle::new(Vec3::Y, 90.0)],
            scale: Vec3::new(2.0, 1.0, 1.0),
            cull: CullFace::Back,
        };
        // x scaled to 2, rotated about Y onto -Z, then moved
        let p = instance.model_matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(10.0, 0.0, -2.0)).length() < EPS);
    }

    #[test]
    fn rotations_apply_in_listed_order() {
        let instance = ModelInstance {
            model: 0,
            translation: Vec3::ZERO,
            rotations: vec![
                AxisAngle::new(Vec3::Z, 90.0),
                AxisAngle::new(Vec3::Y, 90.0),
            ],
            scale: Vec3::ONE,
            cull: CullFace::Back,
        };
        // Y-rotation acts on the point first: X -> -Z, then Z-rotation keeps -Z
        let p = instance.model_matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::NEG_Z).length() < EPS);
    }

    #[test]
    fn water_strip_is_a_continuous_triangle_strip() {
        let water = water_strip();
        assert_eq!(water.vertex_count(), 52);
        assert_eq!(water.triangle_count(), 50);
        let stride = water.layout.components();
        assert!(water
            .vertices
            .chunks_exact(stride)
            .all(|v| v[1] == WATER_HEIGHT && v[4] == 1.0));
    }

    #[test]
    fn static_meshes_have_expected_sizes() {
        assert_eq!(foliage_quad().triangle_count(), 2);
        assert_eq!(skybox_cube().element_count(), 36);
    }

    #[test]
    fn missing_model_falls_back_to_cube() {
        let dir = tempdir().unwrap();
        let scene = Scene::load(dir.path());
        assert_eq!(scene.models.len(), 1);
        assert_eq!(scene.models[0].mesh, Mesh::unit_cube());
        assert_eq!(scene.instances.len(), 3);
        assert!(scene
            .instances
            .iter()
            .all(|instance| instance.cull == CullFace::Front));
    }

    #[test]
    fn model_is_loaded_from_resource_root() {
        let dir = tempdir().unwrap();
        let model_path = dir.path().join(TREE_MODEL);
        fs::create_dir_all(model_path.parent().unwrap()).unwrap();
        fs::write(&model_path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let scene = Scene::load(dir.path());
        assert_eq!(scene.models[0].mesh.triangle_count(), 1);
        assert_eq!(
            scene.resolve(&scene.assets.water_diffuse),
            dir.path().join("textures/river.jpg")
        );
    }
}
