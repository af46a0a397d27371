use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::error;

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// 1x1 image of a single colour.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.width == 1 && self.height == 1
    }
}

/// Colour substituted for diffuse textures that fail to load.
pub const MISSING_DIFFUSE: [u8; 4] = [255, 0, 255, 255];
/// Colour substituted for specular maps that fail to load.
pub const MISSING_SPECULAR: [u8; 4] = [0, 0, 0, 255];

/// Decodes an image file into RGBA8.
pub fn load_image(path: &Path) -> Result<ImageData> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(ImageData {
        width,
        height,
        pixels: image.into_raw(),
    })
}

/// Decodes an image, substituting a 1x1 texel when decoding fails.
pub fn load_image_or(path: &Path, fallback: [u8; 4]) -> ImageData {
    match load_image(path) {
        Ok(image) => image,
        Err(err) => {
            error!("texture failed to load: {err:#}");
            ImageData::solid(fallback)
        }
    }
}

/// Six square faces in `+X, -X, +Y, -Y, +Z, -Z` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeFaces {
    pub size: u32,
    pub faces: [ImageData; 6],
}

impl CubeFaces {
    pub fn load(paths: &[PathBuf; 6]) -> Result<Self> {
        let mut faces = Vec::with_capacity(6);
        for path in paths {
            faces.push(load_image(path)?);
        }
        let size = faces[0].width;
        if let Some(bad) = faces
            .iter()
            .zip(paths)
            .find(|(face, _)| face.width != size || face.height != size)
        {
            return Err(anyhow!(
                "cube face {} is {}x{}, expected {size}x{size}",
                bad.1.display(),
                bad.0.width,
                bad.0.height
            ));
        }
        let faces: [ImageData; 6] = faces
            .try_into()
            .map_err(|_| anyhow!("expected exactly six cube faces"))?;
        Ok(Self { size, faces })
    }

    /// Loads the faces, or a 1x1 cube of `fallback` if any face is unusable.
    pub fn load_or(paths: &[PathBuf; 6], fallback: [u8; 4]) -> Self {
        match Self::load(paths) {
            Ok(faces) => faces,
            Err(err) => {
                error!("cubemap failed to load: {err:#}");
                Self::solid(fallback)
            }
        }
    }

    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            size: 1,
            faces: std::array::from_fn(|_| ImageData::solid(rgba)),
        }
    }
}
