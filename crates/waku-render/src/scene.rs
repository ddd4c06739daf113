// SPDX-License-Identifier: CEPL-1.0
use crate::mesh::MeshData;
use anyhow::{ensure, Result};

/// Decoded RGBA8 image, row-major, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        ensure!(width > 0 && height > 0, "texture has zero size {width}x{height}");
        let want = width as usize * height as usize * 4;
        ensure!(
            rgba.len() == want,
            "texture {width}x{height} needs {want} bytes, got {}",
            rgba.len()
        );
        Ok(Self { width, height, rgba })
    }

    /// 1x1 opaque white, for meshes drawn without a texture.
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        }
    }

    pub fn byte_len(&self) -> usize {
        self.rgba.len()
    }
}

/// One SPIR-V blob per stage, as raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSet {
    pub vertex: Vec<u8>,
    pub fragment: Vec<u8>,
}

/// Everything the renderer uploads once at startup.
#[derive(Clone, Debug)]
pub struct SceneAssets {
    pub mesh: MeshData,
    pub texture: TextureData,
    /// `None` selects the shaders compiled into the backend.
    pub shaders: Option<ShaderSet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_pixel_buffer() {
        assert!(TextureData::new(2, 2, vec![0; 15]).is_err());
        assert!(TextureData::new(0, 2, Vec::new()).is_err());
        let t = TextureData::new(2, 2, vec![0; 16]).unwrap();
        assert_eq!(t.byte_len(), 16);
    }
}
