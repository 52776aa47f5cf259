//! Texture loading and data structures.
//! Decodes JPEG/PNG into RGBA8 ready for GPU upload.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use image::imageops::{self, FilterType};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Downsampled levels below the base, each half the size of the one
    /// above it, down to 1x1. Empty when mipmaps were not generated.
    pub mips: Vec<Vec<u8>>,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
    /// RGBA8 with sRGB-encoded colour channels.
    Rgba8Srgb,
}

/// How decoded pixels are prepared.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureOptions {
    /// Flip rows so the first row is the bottom of the image.
    pub flip_y: bool,
    pub srgb: bool,
    pub mipmaps: bool,
}

impl TextureOptions {
    /// Baked lightmaps for glTF models: glTF UVs already have a top-left origin.
    pub const BAKED: Self = Self {
        flip_y: false,
        srgb: true,
        mipmaps: true,
    };
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self::BAKED
    }
}

impl TextureData {
    /// Create a texture with given dimensions. Fails if `data` is not
    /// exactly `width * height * 4` bytes.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>, srgb: bool) -> Result<Self> {
        ensure!(
            data.len() == (width as usize) * (height as usize) * 4,
            "Data size {} doesn't match RGBA8 {}x{}",
            data.len(),
            width,
            height
        );
        Ok(Self {
            data,
            width,
            height,
            format: if srgb {
                TextureFormat::Rgba8Srgb
            } else {
                TextureFormat::Rgba8
            },
            mips: Vec::new(),
        })
    }

    /// Number of levels including the base.
    #[inline]
    pub fn mip_level_count(&self) -> u32 {
        1 + self.mips.len() as u32
    }

    /// Size of mip `level`; level 0 is the base.
    #[inline]
    pub fn mip_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// Pixels of mip `level`, if present.
    pub fn mip_data(&self, level: u32) -> Option<&[u8]> {
        match level {
            0 => Some(&self.data),
            n => self.mips.get(n as usize - 1).map(Vec::as_slice),
        }
    }

    /// Build the full mip chain with a triangle filter.
    pub fn generate_mipmaps(&mut self) -> Result<()> {
        let mut level = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .context("Texture data does not match its size")?;
        let mut mips = Vec::new();
        let mut n = 1;
        while self.mip_size(n - 1) != (1, 1) {
            let (w, h) = self.mip_size(n);
            level = imageops::resize(&level, w, h, FilterType::Triangle);
            mips.push(level.as_raw().clone());
            n += 1;
        }
        log::debug!("Generated {} mip levels for {}x{}", mips.len(), self.width, self.height);
        self.mips = mips;
        Ok(())
    }

    /// Load a JPEG or PNG texture from disk.
    pub fn load_image<P: AsRef<Path>>(path: P, options: TextureOptions) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read image {:?}", path))?;
        Self::from_image_bytes(&bytes, options)
            .with_context(|| format!("Failed to decode image {:?}", path))
    }

    /// Decode an in-memory JPEG or PNG.
    pub fn from_image_bytes(bytes: &[u8], options: TextureOptions) -> Result<Self> {
        let mut img = image::load_from_memory(bytes)?;
        if options.flip_y {
            img = img.flipv();
        }

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        let mut texture = Self::new_rgba8(width, height, data, options.srgb)?;
        if options.mipmaps {
            texture.generate_mipmaps()?;
        }
        Ok(texture)
    }

    /// 1x1 texture of a single colour.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            data: rgba.to_vec(),
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Srgb,
            mips: Vec::new(),
        }
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            TextureFormat::Rgba8 | TextureFormat::Rgba8Srgb => 4,
        }
    }

    pub fn is_srgb(&self) -> bool {
        self.format == TextureFormat::Rgba8Srgb
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}
