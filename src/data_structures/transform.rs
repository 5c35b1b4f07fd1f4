//! Object transforms and the per-object uniform block.
//!
//! Each drawable object owns one [`ObjectUniform`] which carries its model
//! matrix, the matrix used to rotate normals and the animation clock read by
//! the custom sphere shader.

use cgmath::{Matrix4, One, Quaternion, Rotation3, Vector3};
use wgpu::util::DeviceExt;

/// Position, rotation (as quaternion) and scale of an object.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Replace the rotation with a pure rotation of `angle` radians around +Y.
    pub fn set_rotation_y(&mut self, angle: f32) {
        self.rotation = Quaternion::from_angle_y(cgmath::Rad(angle));
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_uniform(&self, time: f32) -> ObjectUniform {
        ObjectUniform {
            model: self.to_matrix().into(),
            normal: Matrix4::from(self.rotation).into(),
            time,
            _padding: [0.0; 3],
        }
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

impl From<[f32; 3]> for Transform {
    fn from(position: [f32; 3]) -> Self {
        Vector3::from(position).into()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The uniform block as stored on the GPU. `normal` is kept as a full 4x4 matrix
 * because a WGSL mat3x3 has a 16 byte column stride which bytemuck can't express.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
    time: f32,
    _padding: [f32; 3],
}

impl ObjectUniform {
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn model(&self) -> Matrix4<f32> {
        self.model.into()
    }
}

pub fn object_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(
                    std::mem::size_of::<ObjectUniform>() as u64,
                ),
            },
            count: None,
        }],
        label: Some("object_bind_group_layout"),
    })
}

/// A transform together with the buffer and bind group that expose it to shaders.
#[derive(Debug)]
pub struct ObjectResources {
    pub transform: Transform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl ObjectResources {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        transform: Transform,
        label: &str,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Object Buffer")),
            contents: bytemuck::cast_slice(&[transform.to_uniform(0.0)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(&format!("{label} Object Bind Group")),
        });
        Self {
            transform,
            buffer,
            bind_group,
        }
    }

    pub fn write_to_buffer(&self, queue: &wgpu::Queue, time: f32) {
        queue.write_buffer(
            &self.buffer,
            0,
            bytemuck::cast_slice(&[self.transform.to_uniform(time)]),
        );
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector4};

    use super::*;

    #[test]
    fn uniform_matches_wgsl_layout() {
        // mat4x4 + mat4x4 + f32, rounded up to the 16 byte struct alignment
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 144);
    }

    #[test]
    fn translation_moves_origin() {
        let transform = Transform::from([0.27, -0.37, 0.0]);
        let p = transform.to_matrix() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 0.27).abs() < 1e-6);
        assert!((p.y + 0.37).abs() < 1e-6);
    }

    #[test]
    fn y_rotation_keeps_position_and_turns_x_axis() {
        let mut transform = Transform::from([1.0, 2.0, 3.0]);
        transform.set_rotation_y(std::f32::consts::FRAC_PI_2);
        let m = transform.to_matrix();

        let centre = m * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((centre.truncate() - Vector3::new(1.0, 2.0, 3.0)).magnitude() < 1e-5);

        // +X turns into -Z for a positive rotation around +Y
        let x = m * Vector4::new(1.0, 0.0, 0.0, 0.0);
        assert!((x.truncate() - Vector3::new(0.0, 0.0, -1.0)).magnitude() < 1e-5);
    }

    #[test]
    fn set_rotation_replaces_previous_rotation() {
        let mut transform = Transform::new();
        transform.set_rotation_y(1.0);
        transform.set_rotation_y(0.0);
        assert_eq!(transform.to_uniform(0.0).model(), Transform::new().to_matrix());
    }

    #[test]
    fn uniform_carries_time() {
        assert_eq!(Transform::new().to_uniform(4.2).time(), 4.2);
    }
}
