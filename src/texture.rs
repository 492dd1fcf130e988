//! Opaque texture handles.
//!
//! Image decoding happens outside this crate. Effects only ever see a
//! [`TextureHandle`] looked up by name; unknown names resolve to the fallback.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Opaque handle to a texture owned by the asset loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

pub const DEFAULT: &str = "default";
pub const PERLIN: &str = "perlin";
pub const HEART: &str = "heart";
pub const CONFETTI: &str = "confetti";
pub const ROUNDING_CHARAS: &str = "rounding_charas";
pub const FLAMES: [&str; 4] = ["flame_01", "flame_02", "flame_03", "flame_04"];

/// Name → handle table.
#[derive(Debug, Clone)]
pub struct TextureLibrary {
    by_name: HashMap<String, TextureHandle>,
    next: u32,
    fallback: TextureHandle,
}

impl TextureLibrary {
    /// Empty library holding only the fallback texture.
    pub fn new() -> Self {
        let fallback = TextureHandle(0);
        let mut by_name = HashMap::new();
        by_name.insert(DEFAULT.to_string(), fallback);
        Self {
            by_name,
            next: 1,
            fallback,
        }
    }

    /// Library with every texture the built-in effects reference.
    pub fn with_builtin() -> Self {
        let mut library = Self::new();
        for name in [PERLIN, HEART, CONFETTI, ROUNDING_CHARAS]
            .into_iter()
            .chain(FLAMES)
        {
            library.register(name);
        }
        library
    }

    /// Register a texture name. Registering twice returns the existing handle.
    pub fn register(&mut self, name: impl Into<String>) -> TextureHandle {
        let name = name.into();
        if let Some(handle) = self.by_name.get(&name) {
            return *handle;
        }
        let handle = TextureHandle(self.next);
        self.next += 1;
        self.by_name.insert(name, handle);
        handle
    }

    pub fn get(&self, name: &str) -> Option<TextureHandle> {
        self.by_name.get(name).copied()
    }

    /// Look up a texture, substituting the fallback when the name is unknown.
    pub fn resolve(&self, name: &str) -> TextureHandle {
        match self.get(name) {
            Some(handle) => handle,
            None => {
                log::debug!("texture '{}' not registered, using fallback", name);
                self.fallback
            }
        }
    }

    pub fn fallback(&self) -> TextureHandle {
        self.fallback
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

impl Default for TextureLibrary {
    fn default() -> Self {
        Self::new()
    }
}
