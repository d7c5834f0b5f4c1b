//! In-memory scene graph types.
//!
//! A [`SceneGraph`] is owned by one conversion for its whole lifetime: a
//! loader builds it, [`normalize`](crate::scene::normalize::normalize)
//! conditions it, and the exporter consumes it. Lights live beside the node
//! tree so the export stage can exclude them structurally.

pub mod normalize;

pub use normalize::{normalize, SceneStats};

use glam::{Mat4, Quat, Vec3};

/// A local TRS transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Compose into a column-major matrix (T * R * S).
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decompose a matrix back into TRS. Only valid for matrices composed
    /// of translation, rotation, and uniform/axis-aligned scaling.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A PBR material reference. Every mesh in a loaded scene carries one;
/// loaders that cannot resolve a material assign [`Material::default_neutral`].
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Base color (RGBA).
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub double_sided: bool,
}

impl Material {
    /// The neutral grey material assigned when an input format carries no
    /// material of its own.
    pub fn default_neutral() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [0.533, 0.533, 0.533, 1.0],
            metallic: 0.3,
            roughness: 0.7,
            double_sided: false,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::default_neutral()
    }
}

/// A triangle mesh: geometry buffers plus a material.
///
/// `indices` may be empty, in which case the positions are a raw triangle
/// soup (three consecutive vertices per triangle).
#[derive(Debug, Clone)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl Mesh {
    pub fn new(material: Material) -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            material,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Triangle count: index-count/3 when indexed, else vertex-count/3.
    pub fn triangle_count(&self) -> usize {
        if self.indices.is_empty() {
            self.positions.len() / 3
        } else {
            self.indices.len() / 3
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.len() == self.positions.len()
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.len() == self.positions.len()
    }

    /// Compute smooth per-vertex normals by accumulating area-weighted face
    /// normals. Degenerate vertices (no incident non-zero face) fall back
    /// to +Y.
    pub fn compute_normals(&mut self) {
        let mut accumulated = vec![Vec3::ZERO; self.positions.len()];

        let mut accumulate = |i0: usize, i1: usize, i2: usize| {
            let p0 = Vec3::from(self.positions[i0]);
            let p1 = Vec3::from(self.positions[i1]);
            let p2 = Vec3::from(self.positions[i2]);
            // Cross product magnitude is twice the triangle area, which
            // gives the area weighting for free.
            let face = (p1 - p0).cross(p2 - p0);
            accumulated[i0] += face;
            accumulated[i1] += face;
            accumulated[i2] += face;
        };

        if self.indices.is_empty() {
            for tri in 0..self.positions.len() / 3 {
                accumulate(tri * 3, tri * 3 + 1, tri * 3 + 2);
            }
        } else {
            for tri in self.indices.chunks_exact(3) {
                accumulate(tri[0] as usize, tri[1] as usize, tri[2] as usize);
            }
        }

        self.normals = accumulated
            .into_iter()
            .map(|n| {
                if n.length_squared() > 0.0 {
                    n.normalize().to_array()
                } else {
                    [0.0, 1.0, 0.0]
                }
            })
            .collect();
    }
}

/// A preview light. Installed by the normalizer, never exported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient {
        color: [f32; 3],
        intensity: f32,
    },
    Directional {
        color: [f32; 3],
        intensity: f32,
        position: Vec3,
    },
}

/// A node in the scene tree: a local transform, zero or more meshes, and
/// ordered children.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<Mesh>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// The scene graph owned by one conversion.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub root: SceneNode,
    /// Preview light rig. Excluded from export.
    pub lights: Vec<Light>,
}

impl SceneGraph {
    pub fn new(root: SceneNode) -> Self {
        Self {
            root,
            lights: Vec::new(),
        }
    }

    /// Visit every mesh together with its world transform.
    pub fn for_each_mesh(&self, mut f: impl FnMut(&Mesh, Mat4)) {
        fn walk(node: &SceneNode, parent: Mat4, f: &mut impl FnMut(&Mesh, Mat4)) {
            let world = parent * node.transform.to_matrix();
            for mesh in &node.meshes {
                f(mesh, world);
            }
            for child in &node.children {
                walk(child, world, f);
            }
        }
        walk(&self.root, Mat4::IDENTITY, &mut f);
    }

    /// World-space axis-aligned bounding box of all geometry.
    /// `None` when the scene contains no vertices.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut any = false;

        self.for_each_mesh(|mesh, world| {
            for p in &mesh.positions {
                let p = world.transform_point3(Vec3::from(*p));
                min = min.min(p);
                max = max.max(p);
                any = true;
            }
        });

        any.then_some((min, max))
    }

    pub fn total_vertices(&self) -> usize {
        let mut total = 0;
        self.for_each_mesh(|mesh, _| total += mesh.vertex_count());
        total
    }

    pub fn total_triangles(&self) -> usize {
        let mut total = 0;
        self.for_each_mesh(|mesh, _| total += mesh.triangle_count());
        total
    }

    pub fn is_empty(&self) -> bool {
        self.total_vertices() == 0
    }
}
