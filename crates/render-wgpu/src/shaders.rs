//! WGSL sources for the deferred pipeline.
//!
//! Every shader shares the same frame uniform block (group 0, binding 0);
//! the lighting pass additionally binds the G-buffer and shadow map at
//! group 1.

pub const FRAME_UNIFORMS_WGSL: &str = r#"
struct FrameUniforms {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    // xyz camera position, w fog range
    camera_fog: vec4<f32>,
    light_dir: vec4<f32>,
    light_diffuse: vec4<f32>,
    ambient: vec4<f32>,
    fog_color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;
"#;

/// Geometry pass: chunk meshes into the G-buffer.
pub fn geometry_shader() -> String {
    format!(
        "{FRAME_UNIFORMS_WGSL}{}",
        r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = frame.view_proj * vec4<f32>(vertex.position, 1.0);
    out.world_pos = vertex.position;
    out.normal = vertex.normal;
    out.color = vertex.color;
    return out;
}

struct GBufferOutput {
    @location(0) albedo: vec4<f32>,
    // xyz world position, w = 1 marks covered pixels
    @location(1) position: vec4<f32>,
    @location(2) normal: vec4<f32>,
};

@fragment
fn fs_main(in: VertexOutput) -> GBufferOutput {
    var out: GBufferOutput;
    out.albedo = in.color;
    out.position = vec4<f32>(in.world_pos, 1.0);
    out.normal = vec4<f32>(normalize(in.normal), 0.0);
    return out;
}
"#
    )
}

/// Depth-only pass from the light's viewpoint.
pub fn shadow_shader() -> String {
    format!(
        "{FRAME_UNIFORMS_WGSL}{}",
        r#"
@vertex
fn vs_shadow(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return frame.light_view_proj * vec4<f32>(position, 1.0);
}
"#
    )
}

/// Fullscreen directional-light pass over the G-buffer.
pub fn lighting_shader() -> String {
    format!(
        "{FRAME_UNIFORMS_WGSL}{}",
        r#"
@group(1) @binding(0) var gbuffer_albedo: texture_2d<f32>;
@group(1) @binding(1) var gbuffer_position: texture_2d<f32>;
@group(1) @binding(2) var gbuffer_normal: texture_2d<f32>;
@group(1) @binding(3) var shadow_map: texture_depth_2d;
@group(1) @binding(4) var shadow_sampler: sampler_comparison;

struct FullscreenOutput {
    @builtin(position) clip_position: vec4<f32>,
};

// One oversized triangle covers the screen without a vertex buffer.
@vertex
fn vs_light(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    var out: FullscreenOutput;
    let x = f32(i32(index) / 2) * 4.0 - 1.0;
    let y = f32(i32(index) % 2) * 4.0 - 1.0;
    out.clip_position = vec4<f32>(x, y, 0.0, 1.0);
    return out;
}

fn shadow_factor(world_pos: vec3<f32>) -> f32 {
    let light_clip = frame.light_view_proj * vec4<f32>(world_pos, 1.0);
    let ndc = light_clip.xyz / light_clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0) {
        return 1.0;
    }
    return textureSampleCompare(shadow_map, shadow_sampler, uv, ndc.z - 0.002);
}

@fragment
fn fs_light(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let pixel = vec2<i32>(in.clip_position.xy);
    let position = textureLoad(gbuffer_position, pixel, 0);
    if (position.w == 0.0) {
        // Nothing was drawn here: sky.
        return frame.fog_color;
    }
    let albedo = textureLoad(gbuffer_albedo, pixel, 0);
    let normal = textureLoad(gbuffer_normal, pixel, 0).xyz;

    let to_light = normalize(-frame.light_dir.xyz);
    let shadow = shadow_factor(position.xyz);
    let diffuse = max(dot(normal, to_light), 0.0) * shadow;
    var color = albedo.rgb * (frame.ambient.rgb + frame.light_diffuse.rgb * diffuse);

    let dist = distance(position.xyz, frame.camera_fog.xyz);
    let fog = clamp(dist / frame.camera_fog.w, 0.0, 1.0);
    color = mix(color, frame.fog_color.rgb, fog * fog);
    return vec4<f32>(color, 1.0);
}
"#
    )
}

/// Forward pass for blended water, lit without shadows.
pub fn water_shader() -> String {
    format!(
        "{FRAME_UNIFORMS_WGSL}{}",
        r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

@vertex
fn vs_water(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = frame.view_proj * vec4<f32>(vertex.position, 1.0);
    out.world_pos = vertex.position;
    out.normal = vertex.normal;
    out.color = vertex.color;
    return out;
}

@fragment
fn fs_water(in: VertexOutput) -> @location(0) vec4<f32> {
    let to_light = normalize(-frame.light_dir.xyz);
    let diffuse = max(dot(normalize(in.normal), to_light), 0.0);
    var color = in.color.rgb * (frame.ambient.rgb + frame.light_diffuse.rgb * diffuse);

    let dist = distance(in.world_pos, frame.camera_fog.xyz);
    let fog = clamp(dist / frame.camera_fog.w, 0.0, 1.0);
    color = mix(color, frame.fog_color.rgb, fog * fog);
    return vec4<f32>(color, in.color.a);
}
"#
    )
}

/// Forward pass for instanced entity cubes.
pub fn entity_shader() -> String {
    format!(
        "{FRAME_UNIFORMS_WGSL}{}",
        r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_entity(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);
    let world_normal = (model * vec4<f32>(vertex.normal, 0.0)).xyz;

    var out: VertexOutput;
    out.clip_position = frame.view_proj * world_pos;
    out.world_normal = normalize(world_normal);
    out.color = instance.color;
    return out;
}

@fragment
fn fs_entity(in: VertexOutput) -> @location(0) vec4<f32> {
    let to_light = normalize(-frame.light_dir.xyz);
    let diffuse = max(dot(in.world_normal, to_light), 0.0);
    let color = in.color.rgb * (frame.ambient.rgb + frame.light_diffuse.rgb * diffuse);
    return vec4<f32>(color, in.color.a);
}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaders_carry_their_entry_points() {
        assert!(geometry_shader().contains("fn vs_main"));
        assert!(geometry_shader().contains("fn fs_main"));
        assert!(shadow_shader().contains("fn vs_shadow"));
        assert!(lighting_shader().contains("fn fs_light"));
        assert!(water_shader().contains("fn fs_water"));
        assert!(entity_shader().contains("fn vs_entity"));
    }

    #[test]
    fn every_shader_shares_the_frame_uniforms() {
        for source in [
            geometry_shader(),
            shadow_shader(),
            lighting_shader(),
            water_shader(),
            entity_shader(),
        ] {
            assert!(source.contains("var<uniform> frame: FrameUniforms"));
        }
    }
}
