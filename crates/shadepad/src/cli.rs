use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use renderer::WrapMode;

#[derive(Parser, Debug)]
#[command(
    name = "shadepad",
    author,
    version,
    about = "Software shader preview window",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Initial resolution as WIDTHxHEIGHT (e.g. `256x256`).
    #[arg(value_name = "SIZE")]
    pub size: Option<String>,

    /// Texture bound to the next free sampler channel (repeatable, up to 4).
    #[arg(long, value_name = "PATH")]
    pub texture: Vec<PathBuf>,

    /// Wrap policy for texture coordinates: `clamp`, `repeat` or `mirror`.
    #[arg(
        long,
        value_name = "MODE",
        value_parser = parse_wrap_mode,
        default_value = "repeat"
    )]
    pub wrap: WrapMode,

    /// Built-in shader to evaluate: `texture` or `plasma`.
    #[arg(
        long,
        value_name = "SHADER",
        value_parser = parse_builtin_shader,
        default_value = "texture"
    )]
    pub shader: BuiltinShader,

    /// Scanline helper threads (0 = one per core, 1 = render thread only).
    #[arg(long, value_name = "COUNT", default_value_t = 0)]
    pub threads: usize,
}

/// Shader implementations bundled with the binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinShader {
    Texture,
    Plasma,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_wrap_mode(value: &str) -> Result<WrapMode, String> {
    match value.to_ascii_lowercase().as_str() {
        "clamp" => Ok(WrapMode::Clamp),
        "repeat" => Ok(WrapMode::Repeat),
        "mirror" | "mirror-repeat" => Ok(WrapMode::MirrorRepeat),
        other => Err(format!(
            "unknown wrap mode '{other}' (expected clamp, repeat or mirror)"
        )),
    }
}

fn parse_builtin_shader(value: &str) -> Result<BuiltinShader, String> {
    match value.to_ascii_lowercase().as_str() {
        "texture" => Ok(BuiltinShader::Texture),
        "plasma" => Ok(BuiltinShader::Plasma),
        other => Err(format!(
            "unknown shader '{other}' (expected texture or plasma)"
        )),
    }
}

/// Parses a `WIDTHxHEIGHT` resolution, treating any non-digit run as the
/// delimiter (`128x128`, `128,128` and `128 128` all work).
pub fn parse_resolution(spec: &str) -> Result<(u32, u32)> {
    let numbers = scan_integers(spec);
    let (width, height) = match numbers.as_slice() {
        [width, height, ..] => (*width, *height),
        _ => bail!("expected WIDTHxHEIGHT, e.g. 128x128"),
    };

    if width <= 0 || height < 0 {
        bail!("invalid resolution {width}x{height}");
    }
    if width > u32::MAX as i64 || height > u32::MAX as i64 {
        bail!("resolution {width}x{height} is out of range");
    }

    Ok((width as u32, height as u32))
}

/// Pulls signed integer tokens out of a free-form string.
fn scan_integers(spec: &str) -> Vec<i64> {
    fn flush(current: &mut String, numbers: &mut Vec<i64>) {
        if current.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(value) = current.parse::<i64>() {
                numbers.push(value);
            }
        }
        current.clear();
    }

    let mut numbers = Vec::new();
    let mut current = String::new();
    for ch in spec.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
        } else {
            flush(&mut current, &mut numbers);
            if ch == '-' {
                current.push(ch);
            }
        }
    }
    flush(&mut current, &mut numbers);
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_canonical_form() {
        assert_eq!(parse_resolution("64x32").unwrap(), (64, 32));
    }

    #[test]
    fn accepts_any_non_digit_delimiter() {
        assert_eq!(parse_resolution("64,32").unwrap(), (64, 32));
        assert_eq!(parse_resolution("64 32").unwrap(), (64, 32));
        assert_eq!(parse_resolution("  640X480  ").unwrap(), (640, 480));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(parse_resolution("abc").is_err());
        assert!(parse_resolution("").is_err());
        assert!(parse_resolution("128").is_err());
    }

    #[test]
    fn rejects_zero_or_negative_width() {
        assert!(parse_resolution("0x10").is_err());
        assert!(parse_resolution("-4x10").is_err());
    }

    #[test]
    fn rejects_negative_height_but_allows_zero() {
        assert!(parse_resolution("10x-3").is_err());
        assert_eq!(parse_resolution("10x0").unwrap(), (10, 0));
    }

    #[test]
    fn wrap_mode_names_resolve() {
        assert_eq!(parse_wrap_mode("clamp").unwrap(), WrapMode::Clamp);
        assert_eq!(parse_wrap_mode("REPEAT").unwrap(), WrapMode::Repeat);
        assert_eq!(parse_wrap_mode("mirror").unwrap(), WrapMode::MirrorRepeat);
        assert!(parse_wrap_mode("tile").is_err());
    }
}
