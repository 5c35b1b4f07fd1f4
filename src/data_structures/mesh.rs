//! CPU-side geometry generation and the GPU meshes built from it.

use std::f32::consts::PI;

use wgpu::util::DeviceExt;

use crate::config::MAX_SPHERE_SEGMENTS;

/// A vertex shared by every mesh in the scene.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl MeshVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Indexed triangle list, counter-clockwise front faces.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// UV sphere centred at the origin.
    ///
    /// The grid has `(width_segments + 1) * (height_segments + 1)` vertices so the
    /// texture seam and the poles get their own copies. The degenerate triangles
    /// touching the poles are left out. Segment counts are clamped to
    /// `3..=MAX_SPHERE_SEGMENTS` and `2..=MAX_SPHERE_SEGMENTS`.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.clamp(3, MAX_SPHERE_SEGMENTS);
        let height_segments = height_segments.clamp(2, MAX_SPHERE_SEGMENTS);

        let mut vertices = Vec::with_capacity((width_segments as usize + 1) * (height_segments as usize + 1));
        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            // Pole vertices sit in the middle of their segment so the texture does not pinch
            let u_offset = if iy == 0 {
                0.5 / width_segments as f32
            } else if iy == height_segments {
                -0.5 / width_segments as f32
            } else {
                0.0
            };
            let theta = v * PI;

            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let phi = u * 2.0 * PI;

                let normal = [
                    -phi.cos() * theta.sin(),
                    theta.cos(),
                    phi.sin() * theta.sin(),
                ];
                vertices.push(MeshVertex {
                    position: normal.map(|n| n * radius),
                    normal,
                    tex_coords: [u + u_offset, v],
                });
            }
        }

        let row = width_segments + 1;
        let mut indices = Vec::with_capacity(width_segments as usize * (height_segments as usize - 1) * 6);
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;

                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self { vertices, indices }
    }

    /// A single quad in the XY plane facing +Z.
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        let normal = [0.0, 0.0, 1.0];
        let vertices = vec![
            MeshVertex {
                position: [-hw, hh, 0.0],
                normal,
                tex_coords: [0.0, 0.0],
            },
            MeshVertex {
                position: [hw, hh, 0.0],
                normal,
                tex_coords: [1.0, 0.0],
            },
            MeshVertex {
                position: [-hw, -hh, 0.0],
                normal,
                tex_coords: [0.0, 1.0],
            },
            MeshVertex {
                position: [hw, -hh, 0.0],
                normal,
                tex_coords: [1.0, 1.0],
            },
        ];
        let indices = vec![0, 2, 1, 2, 3, 1];
        Self { vertices, indices }
    }
}

/// Geometry uploaded to the GPU.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl Mesh {
    pub fn new(device: &wgpu::Device, geometry: &Geometry, name: &str) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: geometry.indices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector3};

    use super::*;

    fn triangle_normal(geometry: &Geometry, tri: &[u32]) -> Vector3<f32> {
        let p = |i: u32| Vector3::from(geometry.vertices[i as usize].position);
        let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
        (b - a).cross(c - a)
    }

    #[test]
    fn sphere_grid_and_index_counts() {
        let sphere = Geometry::sphere(2.6, 64, 64);
        assert_eq!(sphere.vertices.len(), 65 * 65);
        // every row contributes two triangles per segment except one at each pole
        assert_eq!(sphere.indices.len(), 3 * 64 * (2 * 64 - 2));
        let max = *sphere.indices.iter().max().unwrap();
        assert!((max as usize) < sphere.vertices.len());
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let sphere = Geometry::sphere(2.6, 16, 12);
        for v in &sphere.vertices {
            let length = Vector3::from(v.position).magnitude();
            assert!((length - 2.6).abs() < 1e-4, "vertex at distance {length}");
            let normal = Vector3::from(v.normal);
            assert!((normal.magnitude() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn sphere_poles() {
        let sphere = Geometry::sphere(1.0, 8, 4);
        let north = sphere.vertices[0].position;
        let south = sphere.vertices.last().unwrap().position;
        assert!((north[1] - 1.0).abs() < 1e-6);
        assert!((south[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn sphere_triangles_face_outwards() {
        let sphere = Geometry::sphere(1.0, 12, 8);
        for tri in sphere.indices.chunks(3) {
            let centre: Vector3<f32> = tri
                .iter()
                .map(|&i| Vector3::from(sphere.vertices[i as usize].position))
                .fold(Vector3::new(0.0, 0.0, 0.0), |acc, p| acc + p)
                / 3.0;
            assert!(triangle_normal(&sphere, tri).dot(centre) > 0.0);
        }
    }

    #[test]
    fn sphere_segment_minimum_clamp() {
        let sphere = Geometry::sphere(1.0, 0, 0);
        assert_eq!(sphere.vertices.len(), 4 * 3);
        assert_eq!(sphere.indices.len(), 3 * 3 * 2);
    }

    #[test]
    fn sphere_segment_maximum_clamp() {
        let sphere = Geometry::sphere(1.0, 70_000, 3);
        let row = MAX_SPHERE_SEGMENTS as usize + 1;
        assert_eq!(sphere.vertices.len(), row * 4);
        let max = *sphere.indices.iter().max().unwrap();
        assert_eq!(max as usize, sphere.vertices.len() - 1);
    }

    #[test]
    fn plane_spans_size_and_faces_camera() {
        let plane = Geometry::plane(15.86, 8.92);
        assert_eq!(plane.vertices.len(), 4);
        assert_eq!(plane.indices.len(), 6);

        let xs: Vec<f32> = plane.vertices.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = plane.vertices.iter().map(|v| v.position[1]).collect();
        let width = xs.iter().cloned().fold(f32::MIN, f32::max) - xs.iter().cloned().fold(f32::MAX, f32::min);
        let height = ys.iter().cloned().fold(f32::MIN, f32::max) - ys.iter().cloned().fold(f32::MAX, f32::min);
        assert!((width - 15.86).abs() < 1e-5);
        assert!((height - 8.92).abs() < 1e-5);

        for tri in plane.indices.chunks(3) {
            assert!(triangle_normal(&plane, tri).z > 0.0);
        }
    }

    #[test]
    fn plane_top_left_samples_texture_origin() {
        let plane = Geometry::plane(2.0, 1.0);
        let top_left = plane
            .vertices
            .iter()
            .find(|v| v.position[0] < 0.0 && v.position[1] > 0.0)
            .unwrap();
        assert_eq!(top_left.tex_coords, [0.0, 0.0]);
    }

    #[test]
    fn vertex_layout_stride() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
        assert_eq!(MeshVertex::desc().array_stride, 32);
    }
}
