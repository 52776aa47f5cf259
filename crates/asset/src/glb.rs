//! Binary glTF (GLB) loader: node hierarchy, triangle meshes and node
//! animation clips.

use std::path::Path;

use anyhow::{Context, Result, bail};
use corelib::animation::{AnimationClip, Channel, Interpolation, Keyframes};
use corelib::mesh::{MeshData, MeshVertex};
use corelib::scene::{MeshId, Node, NodeId, Scene};
use corelib::transform::Transform;
use corelib::viewer::LoadedModel;
use glam::{Quat, Vec3};
use gltf::animation::util::ReadOutputs;

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Load a `.glb` file from disk.
pub fn load_glb(path: impl AsRef<Path>) -> Result<LoadedModel> {
    let path = path.as_ref();
    log::info!("Loading model from {:?}", path);
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read model {:?}", path))?;
    load_model(&bytes, path.parent())
        .with_context(|| format!("Failed to load model {:?}", path))
}

/// Load a self-contained glTF/GLB from memory.
pub fn load_glb_from_slice(bytes: &[u8]) -> Result<LoadedModel> {
    load_model(bytes, None)
}

/// External buffer URIs resolve against `base`. Images are never read:
/// the whole model is drawn with the baked texture.
fn load_model(bytes: &[u8], base: Option<&Path>) -> Result<LoadedModel> {
    let unchecked = gltf::Gltf::from_slice_without_validation(bytes).context("Malformed glTF")?;
    if unchecked.extensions_required().any(|ext| ext == DRACO_EXTENSION) {
        bail!(
            "Model requires {DRACO_EXTENSION}; Draco-compressed meshes must be \
             decompressed before loading (e.g. `gltf-transform copy --decompress`)"
        );
    }

    let gltf::Gltf {
        document: doc,
        blob,
    } = gltf::Gltf::from_slice(bytes).context("Invalid glTF")?;
    let buffers = gltf::import_buffers(&doc, base, blob).context("Failed to read glTF buffers")?;
    let buffer_data = |b: gltf::Buffer<'_>| buffers.get(b.index()).map(|d| d.0.as_slice());

    let gltf_scene = doc
        .default_scene()
        .or_else(|| doc.scenes().next())
        .context("glTF contains no scene")?;

    // gltf mesh index -> scene mesh id
    let mut mesh_map: Vec<Option<MeshId>> = vec![None; doc.meshes().len()];
    let mut scene = Scene::new();
    for mesh in doc.meshes() {
        let data = read_mesh(&mesh, &buffer_data)?;
        if data.is_valid() {
            mesh_map[mesh.index()] = Some(scene.add_mesh(data));
        } else {
            log::warn!(
                "Mesh {:?} has no triangle primitives; skipped",
                mesh.name().unwrap_or("<unnamed>")
            );
        }
    }

    // gltf node index -> scene node id
    let mut node_map: Vec<Option<NodeId>> = vec![None; doc.nodes().len()];
    let mut stack: Vec<(gltf::Node<'_>, Option<NodeId>)> =
        gltf_scene.nodes().map(|n| (n, None)).collect();
    stack.reverse();
    while let Some((gnode, parent)) = stack.pop() {
        let (t, r, s) = gnode.transform().decomposed();
        let node = Node {
            name: gnode.name().map(str::to_owned),
            transform: Transform::from_trs(Vec3::from(t), Quat::from_array(r), Vec3::from(s)),
            children: Vec::new(),
            mesh: gnode.mesh().and_then(|m| mesh_map[m.index()]),
        };
        let id = match parent {
            Some(p) => scene.add_child(p, node)?,
            None => scene.add_node(node)?,
        };
        node_map[gnode.index()] = Some(id);
        let mut children: Vec<_> = gnode.children().map(|c| (c, Some(id))).collect();
        children.reverse();
        stack.extend(children);
    }

    let mut clips = Vec::new();
    for anim in doc.animations() {
        let name = anim
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("animation_{}", anim.index()));
        let mut channels = Vec::new();
        for channel in anim.channels() {
            let Some(node) = node_map[channel.target().node().index()] else {
                log::debug!("Animation {name:?} targets a node outside the scene; skipped");
                continue;
            };
            let reader = channel.reader(buffer_data);
            let Some(times) = reader.read_inputs() else {
                continue;
            };
            let values = match reader.read_outputs() {
                Some(ReadOutputs::Translations(it)) => {
                    Keyframes::Translation(it.map(Vec3::from).collect())
                }
                Some(ReadOutputs::Rotations(it)) => {
                    Keyframes::Rotation(it.into_f32().map(Quat::from_array).collect())
                }
                Some(ReadOutputs::Scales(it)) => Keyframes::Scale(it.map(Vec3::from).collect()),
                Some(ReadOutputs::MorphTargetWeights(_)) => {
                    log::debug!("Animation {name:?}: morph target weights not supported");
                    continue;
                }
                None => continue,
            };
            let interpolation = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Step => Interpolation::Step,
                gltf::animation::Interpolation::Linear => Interpolation::Linear,
                gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
            };
            channels.push(Channel {
                node,
                interpolation,
                times: times.collect(),
                values,
            });
        }
        let clip = AnimationClip::new(name, channels);
        log::info!(
            "Animation clip {:?}: {} channels, {:.2}s",
            clip.name,
            clip.channels.len(),
            clip.duration
        );
        clips.push(clip);
    }

    log::info!(
        "Loaded model: {} nodes, {} meshes, {} clips",
        scene.nodes().len(),
        scene.meshes().len(),
        clips.len()
    );
    Ok(LoadedModel { scene, clips })
}

/// All triangle primitives of a mesh merged into one buffer pair.
fn read_mesh<'s, F>(mesh: &gltf::Mesh<'_>, buffer_data: &F) -> Result<MeshData>
where
    F: Clone + for<'b> Fn(gltf::Buffer<'b>) -> Option<&'s [u8]>,
{
    let mut out = MeshData::default();
    for prim in mesh.primitives() {
        if prim.mode() != gltf::mesh::Mode::Triangles {
            log::warn!("Skipping non-triangle primitive ({:?})", prim.mode());
            continue;
        }
        let reader = prim.reader(buffer_data.clone());
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let normals: Vec<[f32; 3]> = reader
            .read_normals()
            .map(|it| it.collect())
            .unwrap_or_default();
        let uvs: Vec<[f32; 2]> = reader
            .read_tex_coords(0)
            .map(|it| it.into_f32().collect())
            .unwrap_or_default();

        let base = u32::try_from(out.vertices.len()).context("Too many vertices in mesh")?;
        for (i, position) in positions.iter().enumerate() {
            out.vertices.push(MeshVertex::new(
                *position,
                normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]),
                uvs.get(i).copied().unwrap_or([0.0, 0.0]),
            ));
        }
        match reader.read_indices() {
            Some(indices) => out.indices.extend(indices.into_u32().map(|i| i + base)),
            None => {
                let count = u32::try_from(positions.len()).context("Too many vertices in mesh")?;
                out.indices.extend(base..base + count);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [
            { "name": "room", "children": [1, 2] },
            { "name": "head.002", "mesh": 0, "translation": [0.0, 1.0, 0.0] },
            { "name": "blade" }
        ],
        "meshes": [
            { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1 } ] }
        ],
        "animations": [
            {
                "name": "bladeAction",
                "channels": [ { "sampler": 0, "target": { "node": 2, "path": "translation" } } ],
                "samplers": [ { "input": 2, "output": 3, "interpolation": "LINEAR" } ]
            },
            {
                "name": "head.002Action.002",
                "channels": [ { "sampler": 0, "target": { "node": 1, "path": "rotation" } } ],
                "samplers": [ { "input": 2, "output": 4, "interpolation": "STEP" } ]
            }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" },
            { "bufferView": 4, "componentType": 5126, "count": 2, "type": "VEC4" }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 52, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 76, "byteLength": 32 }
        ],
        "buffers": [ { "byteLength": 108 } ]
    }"#;

    fn bin() -> Vec<u8> {
        let mut out = Vec::new();
        let floats = |out: &mut Vec<u8>, values: &[f32]| {
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        };
        floats(&mut out, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        for i in [0u16, 1, 2] {
            out.extend_from_slice(&i.to_le_bytes());
        }
        out.extend_from_slice(&[0, 0]);
        floats(&mut out, &[0.0, 1.0]);
        floats(&mut out, &[0.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        floats(&mut out, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.7071068, 0.0, 0.7071068]);
        assert_eq!(out.len(), 108);
        out
    }

    fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        let total = 12 + 8 + json.len() + if bin.is_empty() { 0 } else { 8 + bin.len() };
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        if !bin.is_empty() {
            out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
            out.extend_from_slice(b"BIN\0");
            out.extend_from_slice(&bin);
        }
        out
    }

    #[test]
    fn loads_hierarchy_mesh_and_clips() {
        let model = load_glb_from_slice(&glb(JSON, &bin())).expect("load glb");
        let scene = &model.scene;
        assert_eq!(scene.nodes().len(), 3);
        assert_eq!(scene.roots().len(), 1);
        assert_eq!(scene.meshes().len(), 1);
        assert_eq!(scene.meshes()[0].vertices.len(), 3);
        assert_eq!(scene.meshes()[0].indices, vec![0, 1, 2]);

        let head = scene.find_node("head.002").unwrap();
        assert_eq!(scene.nodes()[head].mesh, Some(0));
        assert_eq!(scene.nodes()[head].transform.translation, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(scene.nodes()[0].children.len(), 2);

        let names: Vec<_> = model.clips.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["bladeAction", "head.002Action.002"]);
        let blade = &model.clips[0];
        assert_eq!(blade.duration, 1.0);
        assert_eq!(blade.channels[0].node, scene.find_node("blade").unwrap());
        assert_eq!(
            blade.channels[0].values,
            Keyframes::Translation(vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)])
        );
        assert_eq!(model.clips[1].channels[0].interpolation, Interpolation::Step);
    }

    #[test]
    fn image_references_are_not_resolved() {
        let json = JSON.replace(
            r#""buffers": [ { "byteLength": 108 } ]"#,
            r#""buffers": [ { "byteLength": 108 } ],
        "images": [ { "uri": "textures/not-shipped.png" } ],
        "textures": [ { "source": 0 } ]"#,
        );
        assert!(json.contains("not-shipped"));
        let model = load_glb_from_slice(&glb(&json, &bin())).expect("load glb");
        assert_eq!(model.scene.meshes().len(), 1);
        assert_eq!(model.clips.len(), 2);
    }

    #[test]
    fn draco_models_are_rejected() {
        let json = r#"{
            "asset": { "version": "2.0" },
            "extensionsUsed": ["KHR_draco_mesh_compression"],
            "extensionsRequired": ["KHR_draco_mesh_compression"]
        }"#;
        let err = load_glb_from_slice(&glb(json, &[])).unwrap_err();
        assert!(format!("{err:#}").contains("Draco"));
    }

    #[test]
    fn missing_file_has_context() {
        let err = load_glb("/definitely/not/here.glb").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read model"));
    }
}
