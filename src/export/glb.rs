//! GLB (binary glTF) export.
//!
//! Builds an export-only list of world-transformed mesh clones from the
//! scene graph (the preview light rig and all non-mesh decoration are
//! excluded), then serializes a single packed GLB container: JSON chunk plus
//! BIN chunk, both 4-byte aligned. Any per-mesh failure fails the whole
//! export; no partial blob is ever returned.

use crate::error::{BridgeError, Result};
use crate::scene::{Material, Mesh, SceneGraph};
use glam::Mat3;
use gltf_json as json;
use json::validation::Checked::Valid;
use json::validation::USize64;
use std::mem;

/// MIME type of the canonical blob.
pub const GLB_MIME_TYPE: &str = "model/gltf-binary";

/// File extension of the canonical blob.
pub const GLB_EXTENSION: &str = "glb";

/// Export a scene graph to GLB bytes.
pub fn export_glb(scene: &SceneGraph) -> Result<Vec<u8>> {
    let meshes = flatten_meshes(scene)?;
    if meshes.is_empty() {
        return Err(BridgeError::ExportFailed(
            "Cannot export empty scene".to_string(),
        ));
    }

    // Build the binary buffer incrementally, one mesh at a time.
    let mut buffer_data: Vec<u8> = Vec::new();
    let mut offsets = Vec::with_capacity(meshes.len());
    for mesh in &meshes {
        offsets.push(append_mesh_data(&mut buffer_data, mesh));
    }
    let total_buffer_size = buffer_data.len();

    let mut accessors = Vec::new();
    let mut buffer_views = Vec::new();
    let mut primitives = Vec::new();
    let mut materials = Vec::new();

    for (mesh, offsets) in meshes.iter().zip(&offsets) {
        let material_idx = materials.len() as u32;
        materials.push(create_material(&mesh.material));
        add_mesh_primitive(
            mesh,
            offsets,
            material_idx,
            &mut buffer_views,
            &mut accessors,
            &mut primitives,
        );
    }

    let root = json::Root {
        accessors,
        buffers: vec![json::Buffer {
            byte_length: USize64(total_buffer_size as u64),
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
            uri: None,
        }],
        buffer_views,
        materials,
        meshes: vec![json::Mesh {
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
            primitives,
            weights: None,
        }],
        nodes: vec![json::Node {
            camera: None,
            children: None,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
            matrix: None,
            mesh: Some(json::Index::new(0)),
            rotation: None,
            scale: None,
            translation: None,
            skin: None,
            weights: None,
        }],
        scenes: vec![json::Scene {
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
            nodes: vec![json::Index::new(0)],
        }],
        scene: Some(json::Index::new(0)),
        ..Default::default()
    };

    let json_string = json::serialize::to_string(&root)
        .map_err(|e| BridgeError::ExportFailed(format!("Failed to serialize glTF JSON: {}", e)))?;
    let json_bytes = json_string.as_bytes();

    // Pad JSON (with spaces) and BIN (with zeros) to 4-byte alignment.
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let padded_json_len = json_bytes.len() + json_padding;
    let buffer_padding = (4 - (buffer_data.len() % 4)) % 4;
    let padded_buffer_len = buffer_data.len() + buffer_padding;

    let total_size = 12 + // GLB header
        8 + padded_json_len + // JSON chunk
        8 + padded_buffer_len; // BIN chunk

    let mut glb = Vec::with_capacity(total_size);

    // GLB header
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_size as u32).to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend_from_slice(&vec![0x20u8; json_padding]);

    // BIN chunk
    glb.extend_from_slice(&(padded_buffer_len as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E4942u32.to_le_bytes());
    glb.extend_from_slice(&buffer_data);
    glb.extend_from_slice(&vec![0u8; buffer_padding]);

    Ok(glb)
}

/// Clone every mesh with its world transform baked into the vertex data.
/// Lights never appear here; they live outside the node tree.
fn flatten_meshes(scene: &SceneGraph) -> Result<Vec<Mesh>> {
    let mut meshes = Vec::new();
    let mut failure = None;

    scene.for_each_mesh(|mesh, world| {
        if failure.is_some() || mesh.is_empty() {
            return;
        }
        if !mesh.has_normals() {
            failure = Some(BridgeError::ExportFailed(format!(
                "Mesh has {} normals for {} positions",
                mesh.normals.len(),
                mesh.positions.len()
            )));
            return;
        }

        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        let mut clone = mesh.clone();
        clone.positions = mesh
            .positions
            .iter()
            .map(|p| world.transform_point3((*p).into()).to_array())
            .collect();
        clone.normals = mesh
            .normals
            .iter()
            .map(|n| {
                let n = normal_matrix * glam::Vec3::from(*n);
                if n.length_squared() > 0.0 {
                    n.normalize().to_array()
                } else {
                    [0.0, 1.0, 0.0]
                }
            })
            .collect();
        // Triangle soups become indexed so every primitive exports the
        // same way.
        if clone.indices.is_empty() {
            clone.indices = (0..clone.positions.len() as u32).collect();
        }
        meshes.push(clone);
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(meshes),
    }
}

/// Byte offsets of one mesh's data within the binary buffer.
struct MeshOffsets {
    pos_offset: usize,
    pos_bytes: usize,
    norm_offset: usize,
    norm_bytes: usize,
    uv_offset: usize,
    uv_bytes: usize,
    idx_offset: usize,
    idx_bytes: usize,
}

fn append_mesh_data(buffer: &mut Vec<u8>, mesh: &Mesh) -> MeshOffsets {
    let pos_offset = buffer.len();
    buffer.extend_from_slice(cast_slice(&mesh.positions));
    let norm_offset = buffer.len();
    buffer.extend_from_slice(cast_slice(&mesh.normals));
    let uv_offset = buffer.len();
    if mesh.has_uvs() {
        buffer.extend_from_slice(cast_slice(&mesh.uvs));
    }
    let idx_offset = buffer.len();
    buffer.extend_from_slice(cast_slice(&mesh.indices));
    let end = buffer.len();

    MeshOffsets {
        pos_offset,
        pos_bytes: norm_offset - pos_offset,
        norm_offset,
        norm_bytes: uv_offset - norm_offset,
        uv_offset,
        uv_bytes: idx_offset - uv_offset,
        idx_offset,
        idx_bytes: end - idx_offset,
    }
}

/// Add buffer views, accessors, and one primitive for a mesh.
fn add_mesh_primitive(
    mesh: &Mesh,
    offsets: &MeshOffsets,
    material_idx: u32,
    buffer_views: &mut Vec<json::buffer::View>,
    accessors: &mut Vec<json::Accessor>,
    primitives: &mut Vec<json::mesh::Primitive>,
) {
    let (min, max) = position_bounds(mesh);
    let vertex_count = mesh.vertex_count();

    let mut push_view = |offset: usize, size: usize, target| {
        let idx = buffer_views.len() as u32;
        buffer_views.push(create_buffer_view(offset, size, target));
        idx
    };

    let pos_view = push_view(
        offsets.pos_offset,
        offsets.pos_bytes,
        Some(json::buffer::Target::ArrayBuffer),
    );
    let norm_view = push_view(
        offsets.norm_offset,
        offsets.norm_bytes,
        Some(json::buffer::Target::ArrayBuffer),
    );
    let uv_view = mesh.has_uvs().then(|| {
        push_view(
            offsets.uv_offset,
            offsets.uv_bytes,
            Some(json::buffer::Target::ArrayBuffer),
        )
    });
    let idx_view = push_view(
        offsets.idx_offset,
        offsets.idx_bytes,
        Some(json::buffer::Target::ElementArrayBuffer),
    );

    let mut push_accessor = |accessor| {
        let idx = accessors.len() as u32;
        accessors.push(accessor);
        idx
    };

    let pos_accessor = push_accessor(create_accessor(
        pos_view,
        vertex_count,
        json::accessor::Type::Vec3,
        json::accessor::ComponentType::F32,
        Some(min),
        Some(max),
    ));
    let norm_accessor = push_accessor(create_accessor(
        norm_view,
        vertex_count,
        json::accessor::Type::Vec3,
        json::accessor::ComponentType::F32,
        None,
        None,
    ));
    let uv_accessor = uv_view.map(|view| {
        push_accessor(create_accessor(
            view,
            vertex_count,
            json::accessor::Type::Vec2,
            json::accessor::ComponentType::F32,
            None,
            None,
        ))
    });
    let idx_accessor = push_accessor(create_accessor(
        idx_view,
        mesh.indices.len(),
        json::accessor::Type::Scalar,
        json::accessor::ComponentType::U32,
        None,
        None,
    ));

    let mut attributes = std::collections::BTreeMap::new();
    attributes.insert(
        Valid(json::mesh::Semantic::Positions),
        json::Index::new(pos_accessor),
    );
    attributes.insert(
        Valid(json::mesh::Semantic::Normals),
        json::Index::new(norm_accessor),
    );
    if let Some(uv_accessor) = uv_accessor {
        attributes.insert(
            Valid(json::mesh::Semantic::TexCoords(0)),
            json::Index::new(uv_accessor),
        );
    }

    primitives.push(json::mesh::Primitive {
        attributes,
        extensions: Default::default(),
        extras: Default::default(),
        indices: Some(json::Index::new(idx_accessor)),
        material: Some(json::Index::new(material_idx)),
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
    });
}

fn position_bounds(mesh: &Mesh) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in &mesh.positions {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    (min, max)
}

fn create_buffer_view(
    offset: usize,
    size: usize,
    target: Option<json::buffer::Target>,
) -> json::buffer::View {
    json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64(size as u64),
        byte_offset: Some(USize64(offset as u64)),
        byte_stride: None,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
        target: target.map(Valid),
    }
}

fn create_accessor(
    buffer_view: u32,
    count: usize,
    type_: json::accessor::Type,
    component_type: json::accessor::ComponentType,
    min: Option<[f32; 3]>,
    max: Option<[f32; 3]>,
) -> json::Accessor {
    json::Accessor {
        buffer_view: Some(json::Index::new(buffer_view)),
        byte_offset: Some(USize64(0)),
        count: USize64(count as u64),
        component_type: Valid(json::accessor::GenericComponentType(component_type)),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
        type_: Valid(type_),
        min: min.map(|m| json::Value::from(m.to_vec())),
        max: max.map(|m| json::Value::from(m.to_vec())),
        normalized: false,
        sparse: None,
    }
}

fn create_material(material: &Material) -> json::Material {
    let alpha_mode = if material.base_color[3] < 1.0 {
        json::material::AlphaMode::Blend
    } else {
        json::material::AlphaMode::Opaque
    };

    json::Material {
        pbr_metallic_roughness: json::material::PbrMetallicRoughness {
            base_color_texture: None,
            base_color_factor: json::material::PbrBaseColorFactor(material.base_color),
            metallic_factor: json::material::StrengthFactor(material.metallic),
            roughness_factor: json::material::StrengthFactor(material.roughness),
            metallic_roughness_texture: None,
            extensions: Default::default(),
            extras: Default::default(),
        },
        alpha_mode: Valid(alpha_mode),
        alpha_cutoff: None,
        double_sided: material.double_sided,
        name: None,
        normal_texture: None,
        occlusion_texture: None,
        emissive_texture: None,
        emissive_factor: json::material::EmissiveFactor([0.0, 0.0, 0.0]),
        extensions: Default::default(),
        extras: Default::default(),
    }
}

/// Cast a slice of T to a slice of bytes.
fn cast_slice<T: Copy>(slice: &[T]) -> &[u8] {
    let ptr = slice.as_ptr() as *const u8;
    let len = slice.len() * mem::size_of::<T>();
    // SAFETY: [f32; N] and u32 have no padding.
    unsafe { std::slice::from_raw_parts(ptr, len) }
}
