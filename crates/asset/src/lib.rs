//! Asset loading (textures, binary glTF models).
//! Produces CPU-side data; GPU upload lives in `renderer`.

pub mod glb;
pub mod texture;

pub use glb::{load_glb, load_glb_from_slice};
pub use texture::{TextureData, TextureFormat, TextureOptions};
