//! Perspective camera, projection and the GPU resources that carry them.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use wgpu::util::DeviceExt;

use crate::config::CameraConfig;

/// wgpu's clip space has z in [0, 1] while cgmath produces OpenGL's [-1, 1].
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::from_cols(
    cgmath::Vector4::new(1.0, 0.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 1.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 1.0),
);

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    /// A camera at `position` looking down -Z.
    pub fn new<P: Into<Point3<f32>>>(position: P) -> Self {
        let position = position.into();
        Self {
            position,
            target: position - Vector3::unit_z(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn forward(&self) -> Vector3<f32> {
        (self.target - self.position).normalize()
    }
}

impl From<&CameraConfig> for Camera {
    fn from(config: &CameraConfig) -> Self {
        Camera::new(config.position)
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn from_config(width: u32, height: u32, config: &CameraConfig) -> Self {
        Self::new(
            width,
            height,
            cgmath::Deg(config.fov_degrees),
            config.near,
            config.far,
        )
    }

    /// Update the aspect ratio. A minimised window reports a zero size which is ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.view_proj.into()
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: Camera, projection: &Projection) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Recompute the view-projection matrix and upload it.
    pub fn write(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Vector4};

    use super::*;

    #[test]
    fn camera_looks_down_negative_z() {
        let camera = Camera::new((0.0, 0.0, 5.0));
        let forward = camera.forward();
        assert!((forward.z + 1.0).abs() < 1e-6);
        assert!(forward.x.abs() < 1e-6 && forward.y.abs() < 1e-6);
    }

    #[test]
    fn resize_updates_aspect() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        assert!((projection.aspect() - 800.0 / 600.0).abs() < 1e-6);
        projection.resize(1920, 1080);
        assert!((projection.aspect() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn zero_size_resize_is_ignored() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        projection.resize(0, 600);
        projection.resize(800, 0);
        assert!((projection.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn origin_projects_to_screen_centre_inside_depth_range() {
        let camera = Camera::new((0.0, 0.0, 5.0));
        let projection = Projection::new(1280, 720, Deg(75.0), 0.1, 1000.0);
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, &projection);

        let clip = uniform.view_proj() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6);
        assert!(ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0, "depth {} outside wgpu range", ndc.z);
    }

    #[test]
    fn points_behind_far_plane_are_clipped() {
        let camera = Camera::new((0.0, 0.0, 5.0));
        let projection = Projection::new(100, 100, Deg(75.0), 0.1, 10.0);
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, &projection);

        let clip = uniform.view_proj() * Vector4::new(0.0, 0.0, -20.0, 1.0);
        assert!(clip.z / clip.w > 1.0);
    }
}
