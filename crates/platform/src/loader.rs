//! Background asset loading. Each asset decodes on its own thread and
//! reports back over a channel, drained once per frame.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{Context, Result};
use asset::{TextureData, TextureOptions};
use corelib::config::SceneConfig;
use corelib::viewer::LoadedModel;

pub enum Payload {
    Texture(TextureData),
    Model(LoadedModel),
}

pub enum LoadEvent {
    Loaded { url: String, payload: Payload },
    Failed { url: String, error: anyhow::Error },
}

pub struct AssetLoader {
    rx: Receiver<LoadEvent>,
}

impl AssetLoader {
    /// Start loading the baked texture and the model.
    /// Returns the loader and the item urls, in start order.
    pub fn spawn(config: &SceneConfig) -> Result<(Self, Vec<String>)> {
        let (tx, rx) = mpsc::channel();
        let texture_url = url_of(&config.baked_texture);
        let model_url = url_of(&config.model);

        spawn_item(&tx, texture_url.clone(), config.baked_texture_path(), |path| {
            TextureData::load_image(path, TextureOptions::BAKED).map(Payload::Texture)
        })?;
        spawn_item(&tx, model_url.clone(), config.model_path(), |path| {
            asset::load_glb(path).map(Payload::Model)
        })?;

        Ok((Self { rx }, vec![texture_url, model_url]))
    }

    /// Everything that finished since the last call.
    pub fn poll(&self) -> Vec<LoadEvent> {
        self.rx.try_iter().collect()
    }
}

fn url_of(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn spawn_item<F>(tx: &Sender<LoadEvent>, url: String, path: PathBuf, load: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<Payload> + Send + 'static,
{
    let tx = tx.clone();
    let name = format!("load {url}");
    thread::Builder::new()
        .name(name)
        .spawn(move || {
            let event = match load(&path) {
                Ok(payload) => LoadEvent::Loaded { url, payload },
                Err(error) => LoadEvent::Failed { url, error },
            };
            if tx.send(event).is_err() {
                log::debug!("Asset finished after the viewer closed");
            }
        })
        .context("Failed to spawn loader thread")?;
    Ok(())
}
