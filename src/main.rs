pub mod app;
pub mod renderer;

use std::path::PathBuf;
use clap::Parser;
use color_eyre::Result;
use app::{App, StartupAssets};
use renderer::config::{RenderConfig, DEFAULT_SHADER_DIR};

/// Textured OBJ viewer: drag to rotate, scroll to zoom, drop .obj or image
/// files onto the window to load them
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Wavefront OBJ model shown instead of the built-in triangle
    #[arg(long)]
    model: Option<PathBuf>,

    /// PNG or JPEG texture applied to the model
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Directory holding the compiled `shader.vert.spv` and `shader.frag.spv`
    #[arg(long, default_value = DEFAULT_SHADER_DIR)]
    shader_dir: PathBuf,

    /// Present as fast as possible instead of waiting for vertical blank
    #[arg(long)]
    no_vsync: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let args = Args::parse();
    let config = RenderConfig {
        vsync: !args.no_vsync,
        shader_dir: args.shader_dir,
        ..RenderConfig::default()
    };
    let startup_assets = StartupAssets {
        model: args.model,
        texture: args.texture,
    };

    App::new(config, startup_assets).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_the_render_config() {
        let args = Args::try_parse_from([
            "objview",
            "--model",
            "bunny.obj",
            "--no-vsync",
        ])
        .unwrap();

        assert_eq!(args.model, Some(PathBuf::from("bunny.obj")));
        assert_eq!(args.texture, None);
        assert_eq!(args.shader_dir, PathBuf::from(DEFAULT_SHADER_DIR));
        assert!(args.no_vsync);
    }
}
