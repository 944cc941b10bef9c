//! Camera, lights, fog, ground plane and environment map of the viewer.

use glam::{Mat4, Vec3};
use serde::Serialize;

use crate::config::{RenderConfig, StageConfig};

/// Perspective camera that keeps full height and a fraction of the window width
#[derive(Debug, Clone, Serialize)]
pub struct Camera {
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(
            Vec3::from(self.position),
            Vec3::from(self.target),
            Vec3::Y,
        )
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_deg.to_radians(), self.aspect, self.near, self.far)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HemisphereLight {
    pub sky_color: u32,
    pub ground_color: u32,
    pub position: [f32; 3],
}

/// Orthographic bounds of a directional light's shadow camera
#[derive(Debug, Clone, Serialize)]
pub struct ShadowFrustum {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionalLight {
    pub color: u32,
    pub position: [f32; 3],
    pub cast_shadow: bool,
    pub shadow: ShadowFrustum,
}

#[derive(Debug, Clone, Serialize)]
pub struct Fog {
    pub color: u32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroundPlane {
    pub size: f32,
    pub color: u32,
    /// Rotation about X in radians (plane lies flat)
    pub rotation_x: f32,
    pub depth_write: bool,
    pub receive_shadow: bool,
}

/// How an environment texture is projected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentMapping {
    EquirectangularReflection,
}

#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    pub url: String,
    pub mapping: EnvironmentMapping,
    pub bytes: usize,
}

/// Render target size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Everything in the scene that is not an avatar
#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub camera: Camera,
    pub viewport: Viewport,
    viewport_fraction: f32,
    pub background: u32,
    pub fog: Fog,
    pub hemisphere: HemisphereLight,
    pub sun: DirectionalLight,
    pub ground: GroundPlane,
    pub environment: Option<Environment>,
}

impl Stage {
    pub fn new(stage: &StageConfig, render: &RenderConfig) -> Self {
        let mut this = Self {
            camera: Camera {
                fov_deg: stage.camera_fov_deg,
                aspect: 1.0,
                near: stage.camera_near,
                far: stage.camera_far,
                position: stage.camera_position,
                target: stage.camera_target,
            },
            viewport: Viewport {
                width: 0,
                height: 0,
            },
            viewport_fraction: render.viewport_fraction,
            background: stage.background,
            fog: Fog {
                color: stage.fog_color,
                near: stage.fog_near,
                far: stage.fog_far,
            },
            hemisphere: HemisphereLight {
                sky_color: 0xffffff,
                ground_color: 0x444444,
                position: [0.0, 20.0, 0.0],
            },
            sun: DirectionalLight {
                color: 0xffffff,
                position: [-3.0, 10.0, -10.0],
                cast_shadow: true,
                shadow: ShadowFrustum {
                    top: 2.0,
                    bottom: -2.0,
                    left: -2.0,
                    right: 2.0,
                    near: 0.1,
                    far: 40.0,
                },
            },
            ground: GroundPlane {
                size: stage.ground_size,
                color: stage.ground_color,
                rotation_x: -std::f32::consts::FRAC_PI_2,
                depth_write: false,
                receive_shadow: true,
            },
            environment: None,
        };
        this.resize(render.window_width, render.window_height);
        this
    }

    /// Recompute the render size and camera aspect for a new window size
    pub fn resize(&mut self, window_width: u32, window_height: u32) {
        let width = (window_width as f32 * self.viewport_fraction).round() as u32;
        self.viewport = Viewport {
            width,
            height: window_height,
        };
        self.camera.aspect = if width == 0 || window_height == 0 {
            1.0
        } else {
            width as f32 / window_height as f32
        };
        tracing::debug!(
            "Viewport resized to {}x{} (aspect {:.3})",
            width,
            window_height,
            self.camera.aspect
        );
    }

    pub fn set_environment(&mut self, url: &str, bytes: usize) {
        self.environment = Some(Environment {
            url: url.to_string(),
            mapping: EnvironmentMapping::EquirectangularReflection,
            bytes,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> Stage {
        Stage::new(&StageConfig::default(), &RenderConfig::default())
    }

    #[test]
    fn test_half_width_viewport() {
        let stage = stage();
        assert_eq!(stage.viewport, Viewport { width: 960, height: 1080 });
        assert!((stage.camera.aspect - 960.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize() {
        let mut stage = stage();
        stage.resize(800, 400);
        assert_eq!(stage.viewport.width, 400);
        assert!((stage.camera.aspect - 1.0).abs() < 1e-6);

        stage.resize(0, 0);
        assert_eq!(stage.camera.aspect, 1.0);
    }

    #[test]
    fn test_camera_looks_at_target() {
        let stage = stage();
        let view = stage.camera.view_matrix();
        let target = view.transform_point3(Vec3::from(stage.camera.target));
        // Target is straight ahead of the camera (-Z in view space)
        assert!(target.x.abs() < 1e-4);
        assert!(target.y.abs() < 1e-4);
        assert!(target.z < 0.0);
    }

    #[test]
    fn test_environment() {
        let mut stage = stage();
        assert!(stage.environment.is_none());
        stage.set_environment("studio.hdr", 128);
        let env = stage.environment.as_ref().unwrap();
        assert_eq!(env.mapping, EnvironmentMapping::EquirectangularReflection);
        assert_eq!(env.bytes, 128);
    }
}
