//! WGSL sources for the four scene programs.
//!
//! Every program reads the same per-draw uniform block at group 0; textures
//! live in group 1. Images are uploaded top row first and sampled with the
//! mesh coordinates as they are, so `v = 0` is the top of the image.

use super::pipeline::Program;

const UNIFORMS: &str = r#"
struct Lights {
    dir_direction: vec4<f32>,
    dir_ambient: vec4<f32>,
    dir_diffuse: vec4<f32>,
    dir_specular: vec4<f32>,
    point_position: vec4<f32>,
    point_ambient: vec4<f32>,
    point_diffuse: vec4<f32>,
    point_specular: vec4<f32>,
    // constant, linear, quadratic, enabled
    point_attenuation: vec4<f32>,
    // shininess, blinn, directional enabled, unused
    material: vec4<f32>,
}

struct DrawUniform {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    normal: mat3x4<f32>,
    view_position: vec4<f32>,
    lights: Lights,
}

@group(0) @binding(0)
var<uniform> uniforms: DrawUniform;
"#;

const FOLIAGE: &str = r#"
@group(1) @binding(0) var diffuse_map: texture_2d<f32>;
@group(1) @binding(1) var specular_map: texture_2d<f32>;
@group(1) @binding(2) var surface_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = uniforms.projection * uniforms.view * uniforms.model * vec4<f32>(input.position, 1.0);
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(diffuse_map, surface_sampler, input.uv);
}
"#;

const LIT: &str = r#"
@group(1) @binding(0) var diffuse_map: texture_2d<f32>;
@group(1) @binding(1) var specular_map: texture_2d<f32>;
@group(1) @binding(2) var surface_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = uniforms.model * vec4<f32>(input.position, 1.0);
    out.position = uniforms.projection * uniforms.view * world_position;
    out.world_pos = world_position.xyz;
    let normal_matrix = mat3x3<f32>(
        uniforms.normal[0].xyz,
        uniforms.normal[1].xyz,
        uniforms.normal[2].xyz
    );
    out.normal = normal_matrix * input.normal;
    out.uv = input.uv;
    return out;
}

fn contribution(
    ambient: vec3<f32>,
    diffuse: vec3<f32>,
    specular: vec3<f32>,
    light_dir: vec3<f32>,
    normal: vec3<f32>,
    view_dir: vec3<f32>,
    albedo: vec3<f32>,
    gloss: vec3<f32>,
) -> vec3<f32> {
    let diff = max(dot(normal, light_dir), 0.0);
    var spec_base: f32;
    if uniforms.lights.material.y > 0.5 {
        spec_base = dot(normal, normalize(light_dir + view_dir));
    } else {
        spec_base = dot(view_dir, reflect(-light_dir, normal));
    }
    let spec = pow(max(spec_base, 0.0), uniforms.lights.material.x);
    return ambient * albedo + diffuse * diff * albedo + specular * spec * gloss;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let lights = uniforms.lights;
    let uv = input.uv;
    let albedo = textureSample(diffuse_map, surface_sampler, uv);
    let gloss = textureSample(specular_map, surface_sampler, uv).rgb;
    let normal = normalize(input.normal);
    let view_dir = normalize(uniforms.view_position.xyz - input.world_pos);

    var color = vec3<f32>(0.0);
    if lights.material.z > 0.5 {
        color += contribution(
            lights.dir_ambient.xyz,
            lights.dir_diffuse.xyz,
            lights.dir_specular.xyz,
            normalize(-lights.dir_direction.xyz),
            normal,
            view_dir,
            albedo.rgb,
            gloss,
        );
    }
    if lights.point_attenuation.w > 0.5 {
        let to_light = lights.point_position.xyz - input.world_pos;
        let dist = length(to_light);
        let k = lights.point_attenuation;
        let attenuation = 1.0 / (k.x + k.y * dist + k.z * dist * dist);
        color += attenuation * contribution(
            lights.point_ambient.xyz,
            lights.point_diffuse.xyz,
            lights.point_specular.xyz,
            normalize(to_light),
            normal,
            view_dir,
            albedo.rgb,
            gloss,
        );
    }
    return vec4<f32>(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), albedo.a);
}
"#;

const SKYBOX: &str = r#"
@group(1) @binding(0) var sky_map: texture_cube<f32>;
@group(1) @binding(1) var sky_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) direction: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    let clip = uniforms.projection * uniforms.view * vec4<f32>(position, 1.0);
    // z = w puts every fragment on the far plane
    out.position = clip.xyww;
    out.direction = position;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(sky_map, sky_sampler, input.direction);
}
"#;

/// Full WGSL module for `program`.
pub fn source(program: Program) -> String {
    let body = match program {
        Program::Foliage => FOLIAGE,
        Program::Water | Program::Model => LIT,
        Program::Skybox => SKYBOX,
    };
    format!("{UNIFORMS}{body}")
}
