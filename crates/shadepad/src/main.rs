mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use renderer::{ChannelBindings, Plasma, PreviewConfig, Shader, TexturePreview};
use tracing_subscriber::EnvFilter;

use cli::BuiltinShader;

fn main() -> Result<()> {
    let args = cli::parse();
    initialise_tracing();

    let surface_size = match args.size.as_deref() {
        Some(spec) => {
            cli::parse_resolution(spec).context("unable to parse resolution argument")?
        }
        None => (128, 128),
    };

    let mut channel_bindings = ChannelBindings::new();
    for (channel, path) in args.texture.iter().enumerate() {
        channel_bindings.set_texture(channel, path.clone())?;
    }

    let shader: Arc<dyn Shader> = match args.shader {
        BuiltinShader::Texture => Arc::new(TexturePreview),
        BuiltinShader::Plasma => Arc::new(Plasma),
    };

    print_controls();
    tracing::info!(
        width = surface_size.0,
        height = surface_size.1,
        shader = ?args.shader,
        threads = args.threads,
        "starting shader preview"
    );

    let config = PreviewConfig {
        surface_size,
        channel_bindings,
        wrap_mode: args.wrap,
        threads: args.threads,
    };
    renderer::run(config, shader)
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_controls() {
    println!();
    println!("+/-   - speed up / slow down simulated time");
    println!("lmb   - drag to move the mouse position");
    println!("space - blit now (may show an incomplete frame)");
    println!("esc   - quit");
    println!();
}
