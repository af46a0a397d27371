//! Light parameters and the shading formula shared by the CPU reference
//! path and the WGSL programs.
//!
//! Both light kinds contribute `ambient + diffuse + specular`; point lights
//! are additionally scaled by distance attenuation. Contributions are summed
//! unclamped and the total is clamped to `[0, 1]` on output.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Light with a constant direction and no falloff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            direction: direction.normalize(),
            ambient,
            diffuse,
            specular,
        }
    }
}

/// Positional light with `1 / (c + l*d + q*d^2)` attenuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl PointLight {
    pub fn attenuation(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(4.0, 4.0, 0.0),
            ambient: Vec3::new(0.8, 0.6, 0.6),
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

/// How the specular term picks the vector compared against the normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpecularModel {
    /// Reflection of the light direction about the normal.
    Phong,
    /// Half vector between light and view directions.
    #[default]
    BlinnPhong,
}

/// Texture samples for one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSample {
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

/// Geometry of the fragment being shaded, all in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub position: Vec3,
    pub normal: Vec3,
    pub view_position: Vec3,
}

/// Light set for one surface program.
///
/// The water and model programs each have their own directional light with
/// separately tuned magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightingModel {
    pub water_sun: DirectionalLight,
    pub model_sun: DirectionalLight,
    pub point: PointLight,
    pub shininess: f32,
    pub specular_model: SpecularModel,
}

impl Default for LightingModel {
    fn default() -> Self {
        let sun_direction = Vec3::new(-0.2, -1.0, -0.3);
        Self {
            water_sun: DirectionalLight::new(
                sun_direction,
                Vec3::splat(0.2),
                Vec3::splat(0.5),
                Vec3::splat(1.0),
            ),
            model_sun: DirectionalLight::new(
                sun_direction,
                Vec3::splat(0.1),
                Vec3::splat(0.4),
                Vec3::splat(0.5),
            ),
            point: PointLight::default(),
            shininess: 32.0,
            specular_model: SpecularModel::BlinnPhong,
        }
    }
}

/// Light terms shared by both light kinds, before attenuation.
fn contribution(
    ambient: Vec3,
    diffuse: Vec3,
    specular: Vec3,
    light_dir: Vec3,
    fragment: &Fragment,
    material: &MaterialSample,
    model: SpecularModel,
) -> Vec3 {
    let normal = fragment.normal.normalize_or_zero();
    let view_dir = (fragment.view_position - fragment.position).normalize_or_zero();
    let diff = normal.dot(light_dir).max(0.0);
    let spec_dir = match model {
        SpecularModel::Phong => reflect(-light_dir, normal),
        SpecularModel::BlinnPhong => (light_dir + view_dir).normalize_or_zero(),
    };
    let spec_base = match model {
        SpecularModel::Phong => view_dir.dot(spec_dir),
        SpecularModel::BlinnPhong => normal.dot(spec_dir),
    };
    let spec = spec_base.max(0.0).powf(material.shininess);

    ambient * material.diffuse
        + diffuse * diff * material.diffuse
        + specular * spec * material.specular
}

fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

/// Unclamped contribution of a directional light.
pub fn shade_directional(
    light: &DirectionalLight,
    fragment: &Fragment,
    material: &MaterialSample,
    model: SpecularModel,
) -> Vec3 {
    let light_dir = (-light.direction).normalize_or_zero();
    contribution(
        light.ambient,
        light.diffuse,
        light.specular,
        light_dir,
        fragment,
        material,
        model,
    )
}

/// Unclamped, attenuated contribution of a point light.
pub fn shade_point(
    light: &PointLight,
    fragment: &Fragment,
    material: &MaterialSample,
    model: SpecularModel,
) -> Vec3 {
    let to_light = light.position - fragment.position;
    let light_dir = to_light.normalize_or_zero();
    let attenuation = light.attenuation(to_light.length());
    attenuation
        * contribution(
            light.ambient,
            light.diffuse,
            light.specular,
            light_dir,
            fragment,
            material,
            model,
        )
}

impl LightingModel {
    /// Water program: directional light only.
    pub fn shade_water(&self, fragment: &Fragment, material: &MaterialSample) -> Vec3 {
        shade_directional(&self.water_sun, fragment, material, self.specular_model)
            .clamp(Vec3::ZERO, Vec3::ONE)
    }

    /// Model program: directional plus point light.
    pub fn shade_model(&self, fragment: &Fragment, material: &MaterialSample) -> Vec3 {
        let total = shade_directional(&self.model_sun, fragment, material, self.specular_model)
            + shade_point(&self.point, fragment, material, self.specular_model);
        total.clamp(Vec3::ZERO, Vec3::ONE)
    }

    pub fn water_uniform(&self) -> LightUniform {
        LightUniform::new(Some(&self.water_sun), None, self.shininess, self.specular_model)
    }

    pub fn model_uniform(&self) -> LightUniform {
        LightUniform::new(
            Some(&self.model_sun),
            Some(&self.point),
            self.shininess,
            self.specular_model,
        )
    }
}

/// GPU layout of the light block. Every member is padded to a `vec4`.
///
/// `point_attenuation.w` and `material.z` flag whether the point and
/// directional lights are active; `material.y` selects Blinn-Phong.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub dir_direction: [f32; 4],
    pub dir_ambient: [f32; 4],
    pub dir_diffuse: [f32; 4],
    pub dir_specular: [f32; 4],
    pub point_position: [f32; 4],
    pub point_ambient: [f32; 4],
    pub point_diffuse: [f32; 4],
    pub point_specular: [f32; 4],
    pub point_attenuation: [f32; 4],
    pub material: [f32; 4],
}

impl LightUniform {
    pub fn new(
        directional: Option<&DirectionalLight>,
        point: Option<&PointLight>,
        shininess: f32,
        model: SpecularModel,
    ) -> Self {
        let mut uniform = Self::zeroed();
        if let Some(light) = directional {
            uniform.dir_direction = light.direction.extend(0.0).into();
            uniform.dir_ambient = light.ambient.extend(0.0).into();
            uniform.dir_diffuse = light.diffuse.extend(0.0).into();
            uniform.dir_specular = light.specular.extend(0.0).into();
        }
        if let Some(light) = point {
            uniform.point_position = light.position.extend(1.0).into();
            uniform.point_ambient = light.ambient.extend(0.0).into();
            uniform.point_diffuse = light.diffuse.extend(0.0).into();
            uniform.point_specular = light.specular.extend(0.0).into();
            uniform.point_attenuation = [light.constant, light.linear, light.quadratic, 1.0];
        }
        let blinn = match model {
            SpecularModel::Phong => 0.0,
            SpecularModel::BlinnPhong => 1.0,
        };
        let directional_enabled = if directional.is_some() { 1.0 } else { 0.0 };
        uniform.material = [shininess, blinn, directional_enabled, 0.0];
        uniform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn white_material() -> MaterialSample {
        MaterialSample {
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            shininess: 32.0,
        }
    }

    fn upward_fragment() -> Fragment {
        Fragment {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            view_position: Vec3::new(0.0, 5.0, 0.0),
        }
    }

    #[test]
    fn attenuation_at_zero_is_inverse_constant() {
        let light = PointLight {
            constant: 2.0,
            ..PointLight::default()
        };
        assert!((light.attenuation(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn light_from_behind_leaves_only_ambient() {
        let light = DirectionalLight::new(Vec3::Y, Vec3::splat(0.1), Vec3::ONE, Vec3::ONE);
        let color = shade_directional(
            &light,
            &upward_fragment(),
            &white_material(),
            SpecularModel::BlinnPhong,
        );
        assert!((color - Vec3::splat(0.1)).length() < 1e-5);
    }

    #[test]
    fn head_on_directional_light_sums_all_terms() {
        let light = DirectionalLight::new(
            Vec3::NEG_Y,
            Vec3::splat(0.1),
            Vec3::splat(0.2),
            Vec3::splat(0.3),
        );
        for model in [SpecularModel::Phong, SpecularModel::BlinnPhong] {
            let color = shade_directional(&light, &upward_fragment(), &white_material(), model);
            assert!((color - Vec3::splat(0.6)).length() < 1e-5, "{model:?}: {color}");
        }
    }

    #[test]
    fn directional_light_ignores_distance() {
        let light = LightingModel::default().water_sun;
        let near = upward_fragment();
        let far = Fragment {
            position: Vec3::new(500.0, 0.0, 0.0),
            view_position: Vec3::new(500.0, 5.0, 0.0),
            ..near
        };
        let a = shade_directional(&light, &near, &white_material(), SpecularModel::BlinnPhong);
        let b = shade_directional(&light, &far, &white_material(), SpecularModel::BlinnPhong);
        assert!((a - b).length() < 1e-5);
    }

    #[test]
    fn point_light_is_attenuated() {
        let light = PointLight {
            position: Vec3::new(0.0, 4.0, 0.0),
            ambient: Vec3::ZERO,
            diffuse: Vec3::ONE,
            specular: Vec3::ZERO,
            constant: 1.0,
            linear: 0.5,
            quadratic: 0.0,
        };
        let color = shade_point(
            &light,
            &upward_fragment(),
            &white_material(),
            SpecularModel::BlinnPhong,
        );
        assert!((color - Vec3::splat(1.0 / 3.0)).length() < 1e-5);
    }

    #[test]
    fn output_is_clamped() {
        let mut lighting = LightingModel::default();
        lighting.point.ambient = Vec3::splat(10.0);
        lighting.point.position = Vec3::new(0.0, 0.1, 0.0);
        let color = lighting.shade_model(&upward_fragment(), &white_material());
        assert_eq!(color, Vec3::ONE);
    }

    #[test]
    fn water_uniform_disables_point_light() {
        let uniform = LightingModel::default().water_uniform();
        assert_eq!(uniform.point_attenuation[3], 0.0);
        assert_eq!(uniform.material[0], 32.0);
        assert_eq!(uniform.material[2], 1.0);
        let model = LightingModel::default().model_uniform();
        assert_eq!(model.point_attenuation, [1.0, 0.09, 0.032, 1.0]);
        assert_eq!(std::mem::size_of::<LightUniform>() % 16, 0);
    }

    proptest! {
        #[test]
        fn attenuation_decreases_with_distance(
            constant in 0.01f32..10.0,
            linear in 0.01f32..2.0,
            quadratic in 0.001f32..2.0,
            d in 0.0f32..100.0,
            step in 0.1f32..50.0,
        ) {
            let light = PointLight { constant, linear, quadratic, ..PointLight::default() };
            prop_assert!(light.attenuation(d + step) < light.attenuation(d));
        }
    }
}
