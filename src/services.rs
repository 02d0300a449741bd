use crate::stage::ObjectKind;
use futures::future::{self, FutureExt, LocalBoxFuture};
use log::debug;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Plays named sounds. `play` starts playback before returning; the returned
/// future resolves when the sound ends or `stop_all` cuts it short.
pub trait SoundService {
    fn play(&self, name: &str, wait_until_done: bool) -> LocalBoxFuture<'static, ()>;
    fn stop_all(&self);
}

/// Built-in sounds with their lengths, without audio output.
pub struct TimedSound {
    generation: watch::Sender<u64>,
}

impl Default for TimedSound {
    fn default() -> Self {
        Self::new()
    }
}

impl TimedSound {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    pub fn duration(name: &str) -> Option<Duration> {
        match name {
            "Laser" | "Beep" | "Boop" => Some(Duration::from_millis(200)),
            "Warp" => Some(Duration::from_millis(400)),
            _ => None,
        }
    }
}

impl SoundService for TimedSound {
    fn play(&self, name: &str, wait_until_done: bool) -> LocalBoxFuture<'static, ()> {
        let Some(length) = Self::duration(name) else {
            debug!("unknown sound {:?}", name);
            return future::ready(()).boxed_local();
        };
        debug!("playing {} (wait: {})", name, wait_until_done);
        let mut stopped = self.generation.subscribe();
        let started = *stopped.borrow_and_update();
        async move {
            tokio::select! {
                _ = tokio::time::sleep(length) => {}
                _ = stopped.wait_for(|g| *g != started) => {}
            }
        }
        .boxed_local()
    }

    fn stop_all(&self) {
        self.generation.send_modify(|g| *g += 1);
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("texture generation is not available")]
    Unavailable,
    #[error("the generator returned no image")]
    EmptyResponse,
    #[error("texture backend failed: {0}")]
    Backend(String),
}

/// Turns a natural-language prompt into image data.
pub trait TextureGenerator {
    fn generate(&self, prompt: &str) -> LocalBoxFuture<'static, Result<String, TextureError>>;
}

/// Used when no generator is configured; every request fails.
pub struct NoTextures;

impl TextureGenerator for NoTextures {
    fn generate(&self, _prompt: &str) -> LocalBoxFuture<'static, Result<String, TextureError>> {
        future::ready(Err(TextureError::Unavailable)).boxed_local()
    }
}

static MATERIAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:with|of|made of)\s(.*)").ok());

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRequest {
    pub kind: ObjectKind,
    pub prompt: String,
    pub texture_prompt: String,
}

impl ObjectRequest {
    /// Anything after "with", "of" or "made of" names the material; otherwise
    /// the whole prompt does.
    pub fn from_prompt(prompt: &str) -> Self {
        let kind = if prompt.to_lowercase().contains("floor") {
            ObjectKind::Floor
        } else {
            ObjectKind::Box
        };
        let material = MATERIAL
            .as_ref()
            .and_then(|re| re.captures(prompt))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or(prompt);
        Self {
            kind,
            prompt: prompt.to_string(),
            texture_prompt: format!("A seamless, tileable texture of {}", material),
        }
    }
}
