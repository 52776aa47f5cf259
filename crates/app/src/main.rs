//! Entry point for Roomview.
//! Logging plus a handful of `--key=value` flags.

use std::path::PathBuf;

use anyhow::Result;
use platform::RunOptions;

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all();
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

/// `--name` or `--name=on|off`. Off by default.
fn parse_switch_arg(args: &[String], name: &str) -> bool {
    for arg in args {
        let Some(rest) = arg.strip_prefix("--").and_then(|a| a.strip_prefix(name)) else {
            continue;
        };
        if rest.is_empty() {
            return true;
        }
        if let Some(val) = rest.strip_prefix('=') {
            return matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
    }
    false
}

fn parse_size_args(args: &[String]) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(1280).max(1);
    let hh = h.unwrap_or(720).max(1);
    (ww, hh)
}

fn parse_assets_arg(args: &[String]) -> PathBuf {
    args.iter()
        .rev()
        .find_map(|a| a.strip_prefix("--assets="))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("static"))
}

fn parse_options(args: &[String]) -> RunOptions {
    let (width, height) = parse_size_args(args);
    RunOptions {
        backends: parse_backend_arg(args),
        show_fps: parse_switch_arg(args, "show-fps"),
        width,
        height,
        debug: parse_switch_arg(args, "debug"),
        assets_dir: parse_assets_arg(args),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_options(&args);
    log::info!(
        "Starting Roomview. Backend: {:?}, show_fps={}, debug={}, window_size={}x{}, assets={}",
        options.backends,
        options.show_fps,
        options.debug,
        options.width,
        options.height,
        options.assets_dir.display()
    );

    platform::run_viewer(options)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
