//! GPU-side meshes: interleaved position/uv vertices plus u32 indices.

use bytemuck::{Pod, Zeroable};
use corelib::mesh::MeshData;
use wgpu::{Buffer, BufferUsages, Device, VertexBufferLayout, VertexStepMode, util::DeviceExt};

/// Vertex: position + uv. Normals are not needed by the baked material.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
    };
}

pub fn vertices_of(mesh: &MeshData) -> Vec<Vertex> {
    mesh.vertices
        .iter()
        .map(|v| Vertex {
            pos: v.position,
            uv: v.uv,
        })
        .collect()
}

pub struct GpuMesh {
    pub vertex_buf: Buffer,
    pub index_buf: Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &Device, label: &str, mesh: &MeshData) -> Self {
        let vertices = vertices_of(mesh);
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} VB")),
            contents: bytemuck::cast_slice(&vertices),
            usage: BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} IB")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: BufferUsages::INDEX,
        });
        Self {
            vertex_buf,
            index_buf,
            index_count: mesh.indices.len() as u32,
        }
    }
}
