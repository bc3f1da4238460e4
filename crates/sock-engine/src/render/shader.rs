//! Shader bootstrap.
//!
//! Both programs are generated from one WGSL template: the vertex stage
//! multiplies the position by the camera matrix and forwards the remaining
//! attributes; only the fragment expression differs per draw kind.

use std::fmt::Write as _;

use crate::device::{AttributeFormat, GraphicsDevice, ProgramDesc, ProgramId, VertexLayout};
use crate::error::RenderError;

use super::vertex::{BatchVertex, PrimitiveVertex, SpriteVertex, VertexKind};

/// Camera matrix uniform shared by both programs.
pub const MATRIX_UNIFORM: &str = "mat";

/// Texture sampled by the sprite program.
pub const SPRITE_TEXTURE: &str = "tex";

/// Source template for one draw kind.
#[derive(Debug, Clone)]
pub struct ShaderTemplate {
    pub label: &'static str,
    pub layout: VertexLayout,
    pub uniforms: &'static [&'static str],
    pub textures: &'static [&'static str],
    /// WGSL expression producing the fragment color from `v`.
    pub fragment: &'static str,
}

impl ShaderTemplate {
    pub fn sprite() -> Self {
        Self {
            label: "sprite",
            layout: SpriteVertex::LAYOUT,
            uniforms: &[MATRIX_UNIFORM],
            textures: &[SPRITE_TEXTURE],
            fragment: "textureSample(tex, tex_sampler, v.uv) * v.color",
        }
    }

    pub fn primitive() -> Self {
        Self {
            label: "primitive",
            layout: PrimitiveVertex::LAYOUT,
            uniforms: &[MATRIX_UNIFORM],
            textures: &[],
            fragment: "v.color",
        }
    }

    /// Generates the WGSL module (`vs_main` / `fs_main`).
    ///
    /// The attribute named `position` must be a `Float32x3`; its `z` goes to
    /// clip space untouched.
    pub fn source(&self) -> String {
        let mut src = String::new();

        if !self.uniforms.is_empty() {
            src.push_str("struct Uniforms {\n");
            for name in self.uniforms {
                let _ = writeln!(src, "    {name}: mat3x3<f32>,");
            }
            src.push_str("};\n@group(0) @binding(0) var<uniform> u: Uniforms;\n\n");
        }

        for (slot, name) in self.textures.iter().enumerate() {
            let _ = writeln!(src, "@group(1) @binding({}) var {name}: texture_2d<f32>;", slot * 2);
            let _ = writeln!(src, "@group(1) @binding({}) var {name}_sampler: sampler;", slot * 2 + 1);
        }

        src.push_str("\nstruct VertexInput {\n");
        for (location, attr) in self.layout.attributes.iter().enumerate() {
            let _ = writeln!(src, "    @location({location}) {}: {},", attr.name, wgsl_type(attr.format));
        }
        src.push_str("};\n\nstruct VertexOutput {\n    @builtin(position) clip: vec4<f32>,\n");
        let varyings = self.layout.attributes.iter().filter(|a| a.name != "position");
        for (location, attr) in varyings.clone().enumerate() {
            let _ = writeln!(src, "    @location({location}) {}: {},", attr.name, wgsl_type(attr.format));
        }
        src.push_str("};\n\n");

        src.push_str("@vertex\nfn vs_main(a: VertexInput) -> VertexOutput {\n");
        src.push_str("    var out: VertexOutput;\n");
        let _ = writeln!(
            src,
            "    let p = u.{} * vec3<f32>(a.position.xy, 1.0);",
            self.uniforms.first().copied().unwrap_or(MATRIX_UNIFORM)
        );
        src.push_str("    out.clip = vec4<f32>(p.xy, a.position.z, 1.0);\n");
        for attr in varyings {
            let _ = writeln!(src, "    out.{0} = a.{0};", attr.name);
        }
        src.push_str("    return out;\n}\n\n");

        src.push_str("@fragment\nfn fs_main(v: VertexOutput) -> @location(0) vec4<f32> {\n");
        let _ = writeln!(src, "    return {};", self.fragment);
        src.push_str("}\n");

        src
    }
}

fn wgsl_type(format: AttributeFormat) -> &'static str {
    match format {
        AttributeFormat::Float32x2 => "vec2<f32>",
        AttributeFormat::Float32x3 => "vec3<f32>",
        AttributeFormat::Unorm8x4 => "vec4<f32>",
    }
}

/// A linked program plus the names of its uniform and texture slots.
#[derive(Debug, Clone)]
pub struct Program {
    id: ProgramId,
    label: &'static str,
    uniforms: &'static [&'static str],
    textures: &'static [&'static str],
}

impl Program {
    pub fn compile<D: GraphicsDevice>(
        device: &mut D,
        template: &ShaderTemplate,
    ) -> Result<Self, RenderError> {
        let source = template.source();
        let id = device.create_program(&ProgramDesc {
            label: template.label,
            source: &source,
            layout: template.layout,
            uniforms: template.uniforms,
            textures: template.textures,
        })?;

        Ok(Self {
            id,
            label: template.label,
            uniforms: template.uniforms,
            textures: template.textures,
        })
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn label(&self) -> &str {
        self.label
    }

    pub fn uniform_slot(&self, name: &str) -> Result<u32, RenderError> {
        slot_of(self.uniforms, name).ok_or_else(|| self.unknown(name))
    }

    pub fn texture_slot(&self, name: &str) -> Result<u32, RenderError> {
        slot_of(self.textures, name).ok_or_else(|| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> RenderError {
        RenderError::UnknownUniform { program: self.label.to_owned(), name: name.to_owned() }
    }
}

fn slot_of(names: &[&str], name: &str) -> Option<u32> {
    names.iter().position(|n| *n == name).map(|i| i as u32)
}

/// The sprite and primitive programs, compiled once per context.
#[derive(Debug)]
pub struct Shaders {
    sprite: Program,
    primitive: Program,
}

impl Shaders {
    /// Compiles every program.
    ///
    /// Failures are collected so the error carries all diagnostics at once;
    /// programs that did compile are deleted again.
    pub fn compile<D: GraphicsDevice>(device: &mut D) -> Result<Self, RenderError> {
        let sprite = Program::compile(device, &ShaderTemplate::sprite());
        let primitive = Program::compile(device, &ShaderTemplate::primitive());

        match (sprite, primitive) {
            (Ok(sprite), Ok(primitive)) => Ok(Self { sprite, primitive }),
            (sprite, primitive) => {
                let mut log = String::from("Shader Compilation Error:");
                for result in [sprite, primitive] {
                    match result {
                        Ok(program) => device.delete_program(program.id()),
                        Err(err) => {
                            let _ = write!(log, "\n{err}");
                        }
                    }
                }
                log::error!("{log}");
                Err(RenderError::ShaderCompile { log })
            }
        }
    }

    pub fn get(&self, kind: VertexKind) -> &Program {
        match kind {
            VertexKind::Sprite => &self.sprite,
            VertexKind::Primitive => &self.primitive,
        }
    }

    pub fn destroy<D: GraphicsDevice>(&self, device: &mut D) {
        device.delete_program(self.sprite.id());
        device.delete_program(self.primitive.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    // ── template ──────────────────────────────────────────────────────────

    #[test]
    fn sprite_source_declares_texture_and_varyings() {
        let src = ShaderTemplate::sprite().source();
        assert!(src.contains("mat: mat3x3<f32>,"));
        assert!(src.contains("@group(1) @binding(0) var tex: texture_2d<f32>;"));
        assert!(src.contains("@group(1) @binding(1) var tex_sampler: sampler;"));
        assert!(src.contains("@location(2) uv: vec2<f32>,"));
        assert!(src.contains("out.uv = a.uv;"));
        assert!(src.contains("return textureSample(tex, tex_sampler, v.uv) * v.color;"));
    }

    #[test]
    fn primitive_source_has_no_texture() {
        let src = ShaderTemplate::primitive().source();
        assert!(!src.contains("texture_2d"));
        assert!(!src.contains("uv"));
        assert!(src.contains("@location(0) color: vec4<f32>,"));
        assert!(src.contains("return v.color;"));
    }

    #[test]
    fn position_is_not_a_varying() {
        let src = ShaderTemplate::sprite().source();
        assert!(!src.contains("out.position"));
        assert!(src.contains("out.clip = vec4<f32>(p.xy, a.position.z, 1.0);"));
    }

    // ── compilation ───────────────────────────────────────────────────────

    #[test]
    fn compiles_both_programs() {
        let mut dev = HeadlessDevice::new();
        let shaders = Shaders::compile(&mut dev).unwrap();
        assert_eq!(dev.live_programs(), 2);

        let sprite = shaders.get(VertexKind::Sprite);
        assert_eq!(sprite.label(), "sprite");
        assert_eq!(sprite.uniform_slot(MATRIX_UNIFORM), Ok(0));
        assert_eq!(sprite.texture_slot(SPRITE_TEXTURE), Ok(0));

        shaders.destroy(&mut dev);
        assert_eq!(dev.live_programs(), 0);
    }

    #[test]
    fn unknown_slot_is_reported() {
        let mut dev = HeadlessDevice::new();
        let shaders = Shaders::compile(&mut dev).unwrap();
        let err = shaders.get(VertexKind::Primitive).texture_slot("tex").unwrap_err();
        assert_eq!(
            err,
            RenderError::UnknownUniform { program: "primitive".into(), name: "tex".into() }
        );
    }

    #[test]
    fn compile_failure_carries_diagnostic_and_cleans_up() {
        let mut dev = HeadlessDevice::new().fail_compile("primitive", "error: expected ';'");
        let err = Shaders::compile(&mut dev).unwrap_err();

        let RenderError::ShaderCompile { log } = err else {
            panic!("expected ShaderCompile, got {err:?}");
        };
        assert!(log.starts_with("Shader Compilation Error:"));
        assert!(log.contains("expected ';'"));
        assert_eq!(dev.live_programs(), 0);
    }
}
