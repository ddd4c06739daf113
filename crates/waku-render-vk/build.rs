// SPDX-License-Identifier: CEPL-1.0
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    #[cfg(feature = "builtin-shaders")]
    builtin::compile();
}

#[cfg(feature = "builtin-shaders")]
mod builtin {
    use std::{env, fs, path::PathBuf};

    // Vertex layout must match pipeline::vertex_attributes:
    //   location 0: R32G32B32_SFLOAT (pos)
    //   location 1: R32G32B32_SFLOAT (color)
    //   location 2: R32G32_SFLOAT    (uv)
    // UBO layout must match waku_math::UniformData (three column-major mat4).
    const VS_SRC: &str = r#"
#version 450
layout(set = 0, binding = 0) uniform Transforms {
    mat4 model;
    mat4 view;
    mat4 proj;
} ubo;

layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inColor;
layout(location = 2) in vec2 inTexCoord;

layout(location = 0) out vec3 vColor;
layout(location = 1) out vec2 vTexCoord;

void main() {
    gl_Position = ubo.proj * ubo.view * ubo.model * vec4(inPos, 1.0);
    vColor = inColor;
    vTexCoord = inTexCoord;
}
"#;

    const FS_SRC: &str = r#"
#version 450
layout(set = 0, binding = 1) uniform sampler2D texSampler;

layout(location = 0) in vec3 vColor;
layout(location = 1) in vec2 vTexCoord;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(vColor, 1.0) * texture(texSampler, vTexCoord);
}
"#;

    pub fn compile() {
        let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));

        let comp = shaderc::Compiler::new().expect("shaderc compiler");
        let mut opts = shaderc::CompileOptions::new().expect("shaderc options");
        opts.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_0 as u32,
        );
        opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

        for (src, kind, name) in [
            (VS_SRC, shaderc::ShaderKind::Vertex, "mesh.vert"),
            (FS_SRC, shaderc::ShaderKind::Fragment, "mesh.frag"),
        ] {
            let spv = comp
                .compile_into_spirv(src, kind, name, "main", Some(&opts))
                .unwrap_or_else(|e| panic!("{name}: {e}"));
            fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8())
                .unwrap_or_else(|e| panic!("write {name}.spv: {e}"));
        }
    }
}
