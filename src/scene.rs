//! Scene content consumed by the geometry pass.
//!
//! The pipeline never owns scene data; it borrows a `Scene` for the duration
//! of one frame.

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
}

impl Vertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Vertex {
            position: Vec3::from_array(position),
            normal: Vec3::from_array(normal),
        }
    }
}

/// Indexed triangle list with a model transform
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub transform: Mat4,
}

impl Mesh {
    /// Axis-aligned cube spanning [-1, 1] on each axis, CCW front faces
    pub fn cube() -> Self {
        let vertices = vec![
            // Front face
            Vertex::new([-1.0, -1.0, 1.0], [0.0, 0.0, 1.0]),
            Vertex::new([1.0, -1.0, 1.0], [0.0, 0.0, 1.0]),
            Vertex::new([1.0, 1.0, 1.0], [0.0, 0.0, 1.0]),
            Vertex::new([-1.0, 1.0, 1.0], [0.0, 0.0, 1.0]),
            // Back face
            Vertex::new([-1.0, -1.0, -1.0], [0.0, 0.0, -1.0]),
            Vertex::new([-1.0, 1.0, -1.0], [0.0, 0.0, -1.0]),
            Vertex::new([1.0, 1.0, -1.0], [0.0, 0.0, -1.0]),
            Vertex::new([1.0, -1.0, -1.0], [0.0, 0.0, -1.0]),
            // Top face
            Vertex::new([-1.0, 1.0, -1.0], [0.0, 1.0, 0.0]),
            Vertex::new([-1.0, 1.0, 1.0], [0.0, 1.0, 0.0]),
            Vertex::new([1.0, 1.0, 1.0], [0.0, 1.0, 0.0]),
            Vertex::new([1.0, 1.0, -1.0], [0.0, 1.0, 0.0]),
            // Bottom face
            Vertex::new([-1.0, -1.0, -1.0], [0.0, -1.0, 0.0]),
            Vertex::new([1.0, -1.0, -1.0], [0.0, -1.0, 0.0]),
            Vertex::new([1.0, -1.0, 1.0], [0.0, -1.0, 0.0]),
            Vertex::new([-1.0, -1.0, 1.0], [0.0, -1.0, 0.0]),
            // Right face
            Vertex::new([1.0, -1.0, -1.0], [1.0, 0.0, 0.0]),
            Vertex::new([1.0, 1.0, -1.0], [1.0, 0.0, 0.0]),
            Vertex::new([1.0, 1.0, 1.0], [1.0, 0.0, 0.0]),
            Vertex::new([1.0, -1.0, 1.0], [1.0, 0.0, 0.0]),
            // Left face
            Vertex::new([-1.0, -1.0, -1.0], [-1.0, 0.0, 0.0]),
            Vertex::new([-1.0, -1.0, 1.0], [-1.0, 0.0, 0.0]),
            Vertex::new([-1.0, 1.0, 1.0], [-1.0, 0.0, 0.0]),
            Vertex::new([-1.0, 1.0, -1.0], [-1.0, 0.0, 0.0]),
        ];

        let mut indices = Vec::with_capacity(36);
        for face in 0..6u32 {
            let base = face * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Mesh { vertices, indices, transform: Mat4::IDENTITY }
    }

    /// Horizontal quad on y = 0 spanning [-half, half] on X and Z, facing +Y
    pub fn plane(half: f32) -> Self {
        let vertices = vec![
            Vertex::new([-half, 0.0, half], [0.0, 1.0, 0.0]),
            Vertex::new([half, 0.0, half], [0.0, 1.0, 0.0]),
            Vertex::new([half, 0.0, -half], [0.0, 1.0, 0.0]),
            Vertex::new([-half, 0.0, -half], [0.0, 1.0, 0.0]),
        ];
        Mesh { vertices, indices: vec![0, 1, 2, 0, 2, 3], transform: Mat4::IDENTITY }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A list of meshes to draw this frame
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub meshes: Vec<Mesh>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mesh: Mesh) -> &mut Self {
        self.meshes.push(mesh);
        self
    }

    /// Ground plane, a row of floating platforms and a player cube
    pub fn demo() -> Self {
        let mut scene = Scene::new();
        scene.add(Mesh::plane(20.0).with_transform(Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0))));

        let platforms = [
            (Vec3::new(-4.0, 0.5, -3.0), Vec3::new(1.5, 0.25, 1.5)),
            (Vec3::new(0.0, 1.5, -6.0), Vec3::new(2.0, 0.25, 1.0)),
            (Vec3::new(4.5, 2.5, -4.0), Vec3::new(1.0, 0.25, 1.0)),
        ];
        for (position, size) in platforms {
            scene.add(Mesh::cube().with_transform(Mat4::from_scale_rotation_translation(
                size,
                glam::Quat::IDENTITY,
                position,
            )));
        }

        scene.add(Mesh::cube().with_transform(Mat4::from_scale_rotation_translation(
            Vec3::splat(0.5),
            glam::Quat::from_rotation_y(0.6),
            Vec3::new(0.0, -0.5, 0.0),
        )));
        scene
    }
}

/// Camera and light state for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    /// World-space direction pointing toward the light
    pub light_dir: Vec3,
}

impl ViewState {
    /// Right-handed look-at camera with a [0, 1] depth range
    pub fn look_at(eye: Vec3, target: Vec3, fov_y_radians: f32, aspect: f32, light_dir: Vec3) -> Self {
        ViewState {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y_radians, aspect, 0.1, 100.0),
            eye,
            light_dir: light_dir.normalize_or_zero(),
        }
    }

    /// Default camera for the demo scene
    pub fn demo(aspect: f32) -> Self {
        Self::look_at(
            Vec3::new(0.0, 3.0, 8.0),
            Vec3::new(0.0, 0.5, -2.0),
            45f32.to_radians(),
            aspect,
            Vec3::new(0.4, 1.0, 0.6),
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_topology() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
    }

    #[test]
    fn test_cube_faces_wind_counter_clockwise() {
        // Geometric normal from the winding must agree with the vertex normal
        let cube = Mesh::cube();
        for tri in cube.indices.chunks(3) {
            let a = cube.vertices[tri[0] as usize];
            let b = cube.vertices[tri[1] as usize];
            let c = cube.vertices[tri[2] as usize];
            let n = (b.position - a.position).cross(c.position - a.position).normalize();
            assert!(n.dot(a.normal) > 0.99, "triangle {:?} winds against its normal", tri);
        }
    }

    #[test]
    fn test_demo_scene_contents() {
        let scene = Scene::demo();
        assert_eq!(scene.meshes.len(), 5);
        let view = ViewState::demo(16.0 / 9.0);
        assert!((view.light_dir.length() - 1.0).abs() < 1e-5);
    }
}
