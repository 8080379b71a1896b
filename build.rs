use color_eyre::Result;
use color_eyre::eyre::{OptionExt, eyre};
use std::{env, fs, path::Path};

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=shaders");

    compile_shaders()?;

    Ok(())
}

fn compile_shaders() -> Result<()> {
    let cargo_manifest_dir = env::var("CARGO_MANIFEST_DIR")?;
    let shaders_in_dir = Path::new(&cargo_manifest_dir).join("shaders");
    let shaders_out_dir = Path::new(&cargo_manifest_dir).join("shaders-built");
    fs::create_dir_all(&shaders_out_dir)?;

    let compiler = shaderc::Compiler::new()
        .ok_or_eyre("Failed to initialize the shaderc compiler")?;
    let mut options = shaderc::CompileOptions::new()
        .ok_or_eyre("Failed to initialize shaderc compile options")?;
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );

    for entry in fs::read_dir(shaders_in_dir)? {
        let entry = entry?;
        let path = entry.path();

        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_eyre(format!("Shader file has no extension: {:?}", path))?;
        let shader_kind = match ext {
            "vert" => shaderc::ShaderKind::Vertex,
            "frag" => shaderc::ShaderKind::Fragment,
            "comp" => shaderc::ShaderKind::Compute,
            _ => {
                println!("cargo:warning=Skipping non-GLSL file: {:?}", path);
                continue;
            }
        };

        // "shader.vert" and "shader.frag" share a stem, so keep the extension
        let file_name = path
            .file_name()
            .ok_or_eyre("Shader file has no name")?
            .to_str()
            .ok_or_eyre("Shader file name is not valid UTF-8")?;

        let source = fs::read_to_string(&path)?;
        let artifact = compiler
            .compile_into_spirv(&source, shader_kind, file_name, "main", Some(&options))
            .map_err(|e| eyre!("Failed to compile {}: {}", file_name, e))?;
        if artifact.get_num_warnings() > 0 {
            println!("cargo:warning={}: {}", file_name, artifact.get_warning_messages());
        }

        let output_filepath = shaders_out_dir.join(format!("{}.spv", file_name));
        fs::write(output_filepath, artifact.as_binary_u8())?;
    }

    Ok(())
}
