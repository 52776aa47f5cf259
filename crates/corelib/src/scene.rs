//! Scene graph: named nodes with local transforms, a parent/child hierarchy
//! and optional shared meshes.

use std::sync::Arc;

use crate::Mat4;
use crate::error::{CoreError, CoreResult};
use crate::mesh::{Aabb, MeshData};
use crate::transform::Transform;

/// Node index (dense, index into `Scene::nodes`).
pub type NodeId = usize;

/// Mesh index (dense, index into `Scene::meshes`).
pub type MeshId = usize;

#[derive(Clone, Debug, Default)]
pub struct Node {
    pub name: Option<String>,
    pub transform: Transform,
    pub children: Vec<NodeId>,
    pub mesh: Option<MeshId>,
}

impl Node {
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: Some(name.into()),
            transform,
            ..Self::default()
        }
    }

    pub fn with_mesh(mut self, mesh: MeshId) -> Self {
        self.mesh = Some(mesh);
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    meshes: Vec<Arc<MeshData>>,
    /// Object-space bounds, parallel to `meshes`.
    bounds: Vec<Aabb>,
    revision: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped every time meshes are added.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add_mesh(&mut self, mesh: impl Into<Arc<MeshData>>) -> MeshId {
        let mesh = mesh.into();
        self.bounds.push(mesh.bounds());
        self.meshes.push(mesh);
        self.revision += 1;
        self.meshes.len() - 1
    }

    /// Add a root node.
    pub fn add_node(&mut self, node: Node) -> CoreResult<NodeId> {
        let id = self.push_node(node)?;
        self.roots.push(id);
        Ok(id)
    }

    /// Add a node as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: Node) -> CoreResult<NodeId> {
        if parent >= self.nodes.len() {
            return Err(CoreError::InvalidNode(parent));
        }
        let id = self.push_node(node)?;
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    fn push_node(&mut self, node: Node) -> CoreResult<NodeId> {
        if let Some(mesh) = node.mesh {
            if mesh >= self.meshes.len() {
                return Err(CoreError::InvalidMesh(mesh));
            }
        }
        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[inline]
    pub fn meshes(&self) -> &[Arc<MeshData>] {
        &self.meshes
    }

    /// Bounds computed when the mesh was added.
    #[inline]
    pub fn mesh_bounds(&self, id: MeshId) -> Option<&Aabb> {
        self.bounds.get(id)
    }

    /// Mutable access to a node transform (for animation).
    #[inline]
    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.nodes.get_mut(id).map(|n| &mut n.transform)
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name.as_deref() == Some(name))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first visit from every root; parents are visited before children.
    pub fn traverse(&self, mut visit: impl FnMut(NodeId, &Node, &Mat4)) {
        let mut stack: Vec<(NodeId, Mat4)> =
            self.roots.iter().rev().map(|&r| (r, Mat4::IDENTITY)).collect();
        while let Some((id, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let world = parent * node.transform.matrix();
            visit(id, node, &world);
            for &child in node.children.iter().rev() {
                stack.push((child, world));
            }
        }
    }

    /// World matrix for every node, indexed by `NodeId`.
    /// Nodes not reachable from a root keep the identity.
    pub fn world_matrices(&self) -> Vec<Mat4> {
        let mut out = vec![Mat4::IDENTITY; self.nodes.len()];
        self.traverse(|id, _, world| out[id] = *world);
        out
    }

    /// (node, mesh, world matrix) for every reachable node that has a mesh.
    pub fn mesh_nodes(&self) -> Vec<(NodeId, MeshId, Mat4)> {
        let mut out = Vec::new();
        self.traverse(|id, node, world| {
            if let Some(mesh) = node.mesh {
                out.push((id, mesh, *world));
            }
        });
        out
    }

    /// Move all of `other` into this scene. Its roots become roots here.
    /// Returns the offset added to `other`'s node ids.
    pub fn merge(&mut self, other: Scene) -> NodeId {
        let node_offset = self.nodes.len();
        let mesh_offset = self.meshes.len();

        self.meshes.extend(other.meshes);
        self.bounds.extend(other.bounds);
        for mut node in other.nodes {
            for child in &mut node.children {
                *child += node_offset;
            }
            if let Some(mesh) = node.mesh.as_mut() {
                *mesh += mesh_offset;
            }
            self.nodes.push(node);
        }
        self.roots
            .extend(other.roots.into_iter().map(|r| r + node_offset));
        if mesh_offset != self.meshes.len() {
            self.revision += 1;
        }
        node_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshVertex;
    use crate::{Quat, Vec3, vec3};

    fn tri() -> MeshData {
        MeshData::new(
            vec![
                MeshVertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                MeshVertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                MeshVertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn child_world_matrix_composes_parent() {
        let mut scene = Scene::new();
        let root = scene
            .add_node(Node::new(
                "root",
                Transform::from_trs(vec3(1.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE),
            ))
            .unwrap();
        let child = scene
            .add_child(
                root,
                Node::new(
                    "child",
                    Transform::from_trs(vec3(0.0, 2.0, 0.0), Quat::IDENTITY, Vec3::ONE),
                ),
            )
            .unwrap();
        let worlds = scene.world_matrices();
        let p = worlds[child].transform_point3(Vec3::ZERO);
        assert!((p - vec3(1.0, 2.0, 0.0)).length() < 1e-6);
        assert_eq!(scene.find_node("child"), Some(child));
    }

    #[test]
    fn node_with_unknown_mesh_is_rejected() {
        let mut scene = Scene::new();
        let err = scene.add_node(Node::default().with_mesh(3)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidMesh(3)));
        assert!(matches!(
            scene.add_child(7, Node::default()),
            Err(CoreError::InvalidNode(7))
        ));
    }

    #[test]
    fn merge_remaps_ids_and_bumps_revision() {
        let mut stage = Scene::new();
        stage.add_node(Node::new("camera", Transform::identity())).unwrap();
        let before = stage.revision();

        let mut model = Scene::new();
        let mesh = model.add_mesh(tri());
        let root = model.add_node(Node::new("room", Transform::identity())).unwrap();
        model
            .add_child(root, Node::new("blade", Transform::identity()).with_mesh(mesh))
            .unwrap();

        let offset = stage.merge(model);
        assert_eq!(offset, 1);
        assert_eq!(stage.roots(), &[0, 1]);
        assert_eq!(stage.nodes()[1].children, vec![2]);
        assert!(stage.revision() > before);

        let mesh_nodes = stage.mesh_nodes();
        assert_eq!(mesh_nodes.len(), 1);
        assert_eq!(mesh_nodes[0].0, stage.find_node("blade").unwrap());
        assert_eq!(mesh_nodes[0].1, 0);
        let bounds = stage.mesh_bounds(0).unwrap();
        assert_eq!(bounds.max, vec3(1.0, 1.0, 0.0));
        assert!(stage.mesh_bounds(1).is_none());
    }
}
