//! glTF/GLB interchange loading via the `gltf` crate.
//!
//! Used both for user-supplied canonical files and for re-loading exported
//! output. Node transforms are taken verbatim; this loader never conditions
//! geometry (centering and scaling belong to the normalizer).

use crate::error::{BridgeError, Result};
use crate::scene::{Material, Mesh, SceneGraph, SceneNode, Transform};
use glam::{Quat, Vec3};

/// Parse glTF or GLB bytes into a scene graph.
pub fn load(bytes: &[u8]) -> Result<SceneGraph> {
    let (document, buffers, _images) = gltf::import_slice(bytes)?;

    let mut root = SceneNode::new("gltf");

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| BridgeError::InvalidModel("glTF contains no scene".to_string()))?;

    for node in scene.nodes() {
        root.children.push(convert_node(&node, &buffers)?);
    }

    let graph = SceneGraph::new(root);
    if graph.is_empty() {
        return Err(BridgeError::InvalidModel(
            "glTF contains no triangle geometry".to_string(),
        ));
    }
    Ok(graph)
}

fn convert_node(node: &gltf::Node, buffers: &[gltf::buffer::Data]) -> Result<SceneNode> {
    let (translation, rotation, scale) = node.transform().decomposed();

    let mut out = SceneNode::new(node.name().unwrap_or("node"));
    out.transform = Transform::new(
        Vec3::from(translation),
        Quat::from_xyzw(rotation[0], rotation[1], rotation[2], rotation[3]),
        Vec3::from(scale),
    );

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!(
                    "Skipping non-triangle primitive in mesh {:?}",
                    mesh.name().unwrap_or("unnamed")
                );
                continue;
            }
            if let Some(converted) = convert_primitive(&primitive, buffers)? {
                out.meshes.push(converted);
            }
        }
    }

    for child in node.children() {
        out.children.push(convert_node(&child, buffers)?);
    }

    Ok(out)
}

fn convert_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Result<Option<Mesh>> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = match reader.read_positions() {
        Some(positions) => positions.collect(),
        None => return Ok(None),
    };
    if positions.is_empty() {
        return Ok(None);
    }

    let mut mesh = Mesh::new(convert_material(&primitive.material()));
    mesh.positions = positions;

    if let Some(indices) = reader.read_indices() {
        mesh.indices = indices.into_u32().collect();
    }
    // Indices must be validated before any code walks the position buffer
    // through them.
    super::check_indices(&mesh)?;

    match reader.read_normals() {
        Some(normals) => mesh.normals = normals.collect(),
        None => mesh.compute_normals(),
    }

    if let Some(tex_coords) = reader.read_tex_coords(0) {
        mesh.uvs = tex_coords.into_f32().collect();
    }

    Ok(Some(mesh))
}

fn convert_material(material: &gltf::Material) -> Material {
    // The default glTF material (index None) still carries sensible PBR
    // factors, so both cases read the same way.
    let pbr = material.pbr_metallic_roughness();
    Material {
        name: material.name().unwrap_or("default").to_string(),
        base_color: pbr.base_color_factor(),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        double_sided: material.double_sided(),
    }
}
