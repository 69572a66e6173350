// Asset path resolution
//
// Shader URLs resolve against an engine asset root plus the fixed SPIR-V
// extension. The root defaults to the working directory and can be
// overridden with the FLINT_ASSETS environment variable.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Directory under the asset root that holds compiled shaders.
pub const SHADER_PATH: &str = "assets/shaders";

/// Extension appended to every shader URL.
pub const SHADER_EXT: &str = ".spv";

/// Environment variable overriding the asset root.
pub const ASSET_ROOT_ENV: &str = "FLINT_ASSETS";

/// Resolve a shader URL to its on-disk path.
pub fn shader_path(url: &str) -> PathBuf {
    let root = std::env::var_os(ASSET_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    root.join(SHADER_PATH).join(format!("{}{}", url, SHADER_EXT))
}

/// Read a shader's compiled bytecode.
pub fn read_shader(url: &str) -> Result<Vec<u8>> {
    let path = shader_path(url);
    std::fs::read(&path).with_context(|| format!("Failed to read shader {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_urls_gain_root_and_extension() {
        let path = shader_path("color");
        assert!(path.ends_with("assets/shaders/color.spv"), "{:?}", path);
    }

    #[test]
    fn nested_urls_keep_their_directories() {
        let path = shader_path("post/tonemap");
        assert!(path.ends_with("assets/shaders/post/tonemap.spv"), "{:?}", path);
    }
}
