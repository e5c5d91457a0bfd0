use glam::{Mat3, Vec3};
use wgpu::util::DeviceExt;

use crate::terrain::Vertex;

/// Subdivided plane in the XY plane, facing +Z, centred on the origin.
/// Rows run top to bottom. V = 0 on the top edge so it samples raster row 0,
/// the same orientation a flipped canvas upload gives on a V-up plane.
pub struct PlaneGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl PlaneGeometry {
    pub fn new(width: f32, height: f32, segments_x: u32, segments_y: u32) -> Self {
        let segments_x = segments_x.max(1);
        let segments_y = segments_y.max(1);
        let columns = segments_x + 1;
        let rows = segments_y + 1;

        let mut vertices = Vec::with_capacity((columns * rows) as usize);
        for iy in 0..rows {
            let fy = iy as f32 / segments_y as f32;
            let y = height * 0.5 - fy * height;
            for ix in 0..columns {
                let fx = ix as f32 / segments_x as f32;
                vertices.push(Vertex {
                    position: [fx * width - width * 0.5, y, 0.0],
                    normal: [0.0, 0.0, 1.0],
                    uv: [fx, fy],
                });
            }
        }

        let mut indices = Vec::with_capacity((segments_x * segments_y * 6) as usize);
        for iy in 0..segments_y {
            for ix in 0..segments_x {
                let a = ix + columns * iy;
                let b = ix + columns * (iy + 1);
                let c = (ix + 1) + columns * (iy + 1);
                let d = (ix + 1) + columns * iy;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        Self { vertices, indices }
    }

    /// Rotates positions and normals about the X axis in place.
    pub fn rotate_x(mut self, angle: f32) -> Self {
        let rotation = Mat3::from_rotation_x(angle);
        for vertex in &mut self.vertices {
            vertex.position = (rotation * Vec3::from(vertex.position)).to_array();
            vertex.normal = (rotation * Vec3::from(vertex.normal)).normalize().to_array();
        }
        self
    }

    /// The terrain ground: a plane laid flat with its normal pointing up.
    pub fn ground(size: f32, segments: u32) -> Self {
        Self::new(size, size, segments, segments).rotate_x(-std::f32::consts::FRAC_PI_2)
    }
}

pub struct TerrainMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl TerrainMesh {
    pub fn upload(device: &wgpu::Device, geometry: &PlaneGeometry) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Vertex Buffer"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Index Buffer"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        log::debug!(
            "Uploaded terrain mesh: {} vertices, {} triangles",
            geometry.vertices.len(),
            geometry.indices.len() / 3
        );

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: geometry.indices.len() as u32,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.num_indices, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_match_segments() {
        let plane = PlaneGeometry::new(1.0, 1.0, 4, 3);
        assert_eq!(plane.vertices.len(), 5 * 4);
        assert_eq!(plane.indices.len(), 4 * 3 * 6);
        assert!(plane.indices.iter().all(|&i| (i as usize) < plane.vertices.len()));
    }

    #[test]
    fn ground_faces_up_and_lies_flat() {
        let ground = PlaneGeometry::ground(1.0, 8);
        for vertex in &ground.vertices {
            assert!(vertex.position[1].abs() < 1e-6);
            assert!((Vec3::from(vertex.normal) - Vec3::Y).length() < 1e-6);
        }
    }

    #[test]
    fn corners_and_uvs() {
        let plane = PlaneGeometry::new(2.0, 2.0, 2, 2);
        assert_eq!(plane.vertices[0].position, [-1.0, 1.0, 0.0]);
        assert_eq!(plane.vertices[0].uv, [0.0, 0.0]);
        assert_eq!(plane.vertices[8].position, [1.0, -1.0, 0.0]);
        assert_eq!(plane.vertices[8].uv, [1.0, 1.0]);
    }

    #[test]
    fn far_edge_samples_the_first_raster_rows() {
        let raster = crate::texture::generate(&crate::texture::GridTextureSpec::default());
        let ground = PlaneGeometry::ground(1.0, 64);
        let columns = 65;

        // Second row from the far edge lies inside the big band at the top
        // of the raster; the second row from the near edge is background.
        let far = &ground.vertices[columns];
        let near = &ground.vertices[columns * 63];
        assert!(far.position[2] < 0.0 && near.position[2] > 0.0);
        assert!(raster.elevation_at(far.uv[0], far.uv[1]) > 0.5);
        assert_eq!(raster.elevation_at(near.uv[0], near.uv[1]), 0.0);
    }

    #[test]
    fn ground_winding_faces_up() {
        let ground = PlaneGeometry::ground(1.0, 1);
        let tri = &ground.indices[0..3];
        let p = |i: u32| Vec3::from(ground.vertices[i as usize].position);
        let normal = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
        assert!(normal.y > 0.0);
    }
}
