// --- File: render.rs ---
use crate::config::CameraConfig;
use crate::constants::{CELL_COLOR, FOOD_COLOR};
use crate::error::Result;
use crate::registry::{Entity, EntityKind};
use glam::{Mat4, Vec2, Vec3};

/// What the simulation submits to a renderer each running frame.
pub trait RenderSink {
    fn clear(&mut self);

    fn draw_circle(&mut self, center: Vec2, radius: f32, color: Vec3);

    /// Flushes the frame to the screen.
    fn present(&mut self) -> Result<()>;

    /// RGBA copy of the last presented frame, if this sink can capture one.
    fn snapshot(&mut self) -> Result<Option<image::RgbaImage>> {
        Ok(None)
    }
}

pub fn color_for(kind: EntityKind) -> Vec3 {
    match kind {
        EntityKind::Cell => Vec3::from(CELL_COLOR),
        EntityKind::Food => Vec3::from(FOOD_COLOR),
    }
}

/// One draw call per entity, in slice order.
pub fn submit_entities<S: RenderSink + ?Sized>(sink: &mut S, entities: &[Entity]) {
    for entity in entities {
        sink.draw_circle(entity.position, entity.radius(), color_for(entity.kind));
    }
}

impl CameraConfig {
    pub fn view_proj(&self) -> Mat4 {
        let projection = Mat4::perspective_rh(
            self.fovy_degrees.to_radians(),
            self.aspect,
            self.z_near,
            self.z_far,
        );
        let view = Mat4::look_at_rh(self.eye, Vec3::new(self.eye.x, self.eye.y, 0.0), Vec3::Y);
        projection * view
    }
}

/// Collects draw calls in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub circles: Vec<(Vec2, f32, Vec3)>,
    pub clears: usize,
    pub presents: usize,
}

impl RenderSink for RecordingSink {
    fn clear(&mut self) {
        self.clears += 1;
        self.circles.clear();
    }

    fn draw_circle(&mut self, center: Vec2, radius: f32, color: Vec3) {
        self.circles.push((center, radius, color));
    }

    fn present(&mut self) -> Result<()> {
        self.presents += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_and_food_have_distinct_colors() {
        assert_ne!(color_for(EntityKind::Cell), color_for(EntityKind::Food));
        assert_eq!(color_for(EntityKind::Food), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn camera_projects_origin_to_center() {
        let camera = CameraConfig::default();
        let clip = camera.view_proj() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn camera_sees_half_height_of_plane() {
        // Eye at z=16 with a 60 degree fovy sees ±16·tan(30°) of the z=0 plane
        let camera = CameraConfig::default();
        let edge = 16.0 * (30.0f32).to_radians().tan();
        let clip = camera.view_proj() * glam::Vec4::new(0.0, edge, 0.0, 1.0);
        assert!((clip.y / clip.w - 1.0).abs() < 1e-4);
    }
}
