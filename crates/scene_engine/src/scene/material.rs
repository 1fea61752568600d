//! Surface materials shared between parts

use std::fmt;
use std::sync::Arc;

use crate::assets::Texture;
use crate::foundation::math::Color;
use crate::render::RenderBackend;
use crate::scene::{DualBuffer, EntityCore, UpdateFlags};

/// Reflectance channels loaded into the backend before a part draws
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialChannels {
    /// Ambient reflectance
    pub ambient: Color,
    /// Diffuse reflectance; its alpha drives transparency
    pub diffuse: Color,
    /// Specular reflectance
    pub specular: Color,
    /// Emitted color
    pub emission: Color,
    /// Specular exponent
    pub shininess: f32,
}

impl Default for MaterialChannels {
    fn default() -> Self {
        Self {
            ambient: Color::rgb(0.2, 0.2, 0.2),
            diffuse: Color::rgb(0.8, 0.8, 0.8),
            specular: Color::BLACK,
            emission: Color::BLACK,
            shininess: 0.0,
        }
    }
}

impl MaterialChannels {
    /// Channels with ambient and diffuse both set to `color`
    pub fn from_color(color: Color) -> Self {
        Self { ambient: color, diffuse: color, ..Self::default() }
    }
}

/// Everything needed to register a material with the universe
#[derive(Debug, Clone, Default)]
pub struct MaterialDesc {
    /// Material name
    pub name: String,
    /// Initial reflectance channels
    pub channels: MaterialChannels,
    /// Logical name of a diffuse texture, resolved through the resource cache
    pub texture: Option<String>,
}

impl MaterialDesc {
    /// Untextured material with default channels
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Replace the channels
    #[must_use]
    pub fn with_channels(mut self, channels: MaterialChannels) -> Self {
        self.channels = channels;
        self
    }

    /// Attach a diffuse texture by name
    #[must_use]
    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = Some(texture.into());
        self
    }
}

/// A material: double-buffered channels and an optional texture
pub struct Material {
    core: EntityCore,
    texture: Option<Arc<Texture>>,
    channels: DualBuffer<MaterialChannels>,
}

impl Material {
    /// Create a shared material
    pub fn new(name: impl Into<String>, channels: MaterialChannels, texture: Option<Arc<Texture>>) -> Arc<Self> {
        Arc::new(Self { core: EntityCore::new(name), texture, channels: DualBuffer::new(channels) })
    }

    /// Shared identity
    pub fn core(&self) -> &EntityCore {
        &self.core
    }

    /// Material name
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Diffuse texture, if any
    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture.as_ref()
    }

    /// Channels as last set by the control thread
    pub fn channels(&self) -> MaterialChannels {
        self.channels.raw()
    }

    /// Replace all channels
    pub fn set_channels(&self, channels: MaterialChannels) -> bool {
        let changed = self.channels.set(channels);
        if changed {
            self.core.mark(UpdateFlags::MATERIAL);
        }
        changed
    }

    /// Push a flat color into the ambient and diffuse channels
    pub fn set_color(&self, color: Color) -> bool {
        let changed = self.channels.modify(|channels| {
            if channels.ambient == color && channels.diffuse == color {
                return false;
            }
            channels.ambient = color;
            channels.diffuse = color;
            true
        });
        if changed {
            self.core.mark(UpdateFlags::COLOR);
        }
        changed
    }

    /// Whether parts using this material need blending (control view)
    pub fn is_transparent(&self) -> bool {
        self.channels.with_raw(|channels| channels.diffuse.is_translucent()) || self.texture_has_alpha()
    }

    /// Whether parts using this material need blending (render view)
    pub fn is_transparent_pure(&self) -> bool {
        self.channels.pure().diffuse.is_translucent() || self.texture_has_alpha()
    }

    fn texture_has_alpha(&self) -> bool {
        self.texture.as_ref().is_some_and(|texture| texture.has_alpha())
    }

    /// Promote raw channels (render thread only)
    pub fn synchronize_self(&self) -> bool {
        let flags = self.core.synchronize();
        self.channels.update() || !flags.is_empty()
    }

    /// Load the pure channels and bind the texture
    pub fn activate(&self, backend: &mut dyn RenderBackend) {
        backend.set_material_channels(&self.channels.pure());
        backend.bind_texture(self.texture.as_ref().map(|texture| texture.id()));
    }
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Material")
            .field("id", &self.core.id())
            .field("name", &self.core.name())
            .field("textured", &self.texture.is_some())
            .finish()
    }
}
