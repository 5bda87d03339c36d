//! Material and texture slot data as provided by the scene collaborator.

use crate::types::{Color, MaterialId};
use serde::{Deserialize, Serialize};

/// What a texture slot's texture is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureKind {
    /// Slot present but no texture type set.
    None,
    /// Image file texture, the only kind Trainz can use.
    Image,
    /// Any generated texture (clouds, noise, ...), named by its type.
    Procedural(String),
}

/// How texture coordinates are generated for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    Uv,
    Reflection,
    Generated,
    Global,
    Object,
    Normal,
    Other,
}

/// Behaviour of texture lookups outside 0..1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionMode {
    #[default]
    Repeat,
    Extend,
    Clip,
    ClipCube,
    Checker,
}

/// The material property a texture slot drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapTarget {
    Ambient,
    DiffuseColor,
    SpecularColor,
    Specular,
    Hardness,
    Emit,
    Alpha,
    Translucency,
    Normal,
    Displacement,
}

/// One property driven by a slot, with the slider amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotInfluence {
    pub target: MapTarget,
    pub factor: f32,
}

/// Reference to an image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Absolute path of the image file.
    pub path: String,
    /// The image is flagged to provide alpha.
    #[serde(default)]
    pub use_alpha: bool,
    /// Bits per pixel, if the host knows it (24 = no alpha plane).
    #[serde(default)]
    pub depth: Option<u32>,
}

/// A texture slot of a material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSlot {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Texture datablock name (used in messages).
    pub texture: String,
    pub kind: TextureKind,
    #[serde(default)]
    pub image: Option<ImageRef>,
    pub mapping: MappingMode,
    #[serde(default)]
    pub extension: ExtensionMode,
    #[serde(default)]
    pub influences: Vec<SlotInfluence>,
}

fn enabled_by_default() -> bool {
    true
}

impl TextureSlot {
    /// An enabled image slot with UV mapping and no influences yet.
    pub fn image(texture: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            enabled: true,
            texture: texture.into(),
            kind: TextureKind::Image,
            image: Some(ImageRef {
                path: path.into(),
                use_alpha: false,
                depth: None,
            }),
            mapping: MappingMode::Uv,
            extension: ExtensionMode::Repeat,
            influences: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: MappingMode) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_influence(mut self, target: MapTarget, factor: f32) -> Self {
        self.influences.push(SlotInfluence { target, factor });
        self
    }

    pub fn is_image(&self) -> bool {
        self.kind == TextureKind::Image
    }

    pub fn maps(&self, target: MapTarget) -> bool {
        self.influences.iter().any(|i| i.target == target)
    }

    /// Slider amount for `target`, if the slot drives it.
    pub fn factor(&self, target: MapTarget) -> Option<f32> {
        self.influences
            .iter()
            .find(|i| i.target == target)
            .map(|i| i.factor)
    }
}

/// A scene material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialData {
    pub id: MaterialId,
    pub name: String,
    #[serde(default = "white")]
    pub diffuse_color: Color,
    #[serde(default = "default_diffuse_intensity")]
    pub diffuse_intensity: f32,
    #[serde(default = "white")]
    pub specular_color: Color,
    #[serde(default = "default_specular_intensity")]
    pub specular_intensity: f32,
    /// Share of the world ambient color the material receives.
    #[serde(default = "default_ambient")]
    pub ambient: f32,
    #[serde(default)]
    pub emit: f32,
    #[serde(default = "white")]
    pub mirror_color: Color,
    /// Specular hardness, 1..=511.
    #[serde(default = "default_hardness")]
    pub specular_hardness: u32,
    #[serde(default)]
    pub use_transparency: bool,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default)]
    pub texture_slots: Vec<TextureSlot>,
}

fn white() -> Color {
    [1.0, 1.0, 1.0]
}

fn default_diffuse_intensity() -> f32 {
    0.8
}

fn default_specular_intensity() -> f32 {
    0.5
}

fn default_ambient() -> f32 {
    1.0
}

fn default_hardness() -> u32 {
    50
}

fn default_alpha() -> f32 {
    1.0
}

impl MaterialData {
    pub fn new(id: MaterialId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            diffuse_color: white(),
            diffuse_intensity: default_diffuse_intensity(),
            specular_color: white(),
            specular_intensity: default_specular_intensity(),
            ambient: default_ambient(),
            emit: 0.0,
            mirror_color: white(),
            specular_hardness: default_hardness(),
            use_transparency: false,
            alpha: default_alpha(),
            texture_slots: Vec::new(),
        }
    }

    pub fn with_slot(mut self, slot: TextureSlot) -> Self {
        self.texture_slots.push(slot);
        self
    }

    /// Slots that are switched on.
    pub fn enabled_slots(&self) -> impl Iterator<Item = &TextureSlot> {
        self.texture_slots.iter().filter(|s| s.enabled)
    }
}
