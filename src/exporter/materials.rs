//! Material collection and classification.
//!
//! Trainz picks a shader from a decoration tag at the end of the material
//! name (`wood.m.onetex`). The tag is derived from the texture channels a
//! material uses; an authored tag is kept but checked against the derived
//! one.

use super::validate::NO_MATERIAL_GROUP;
use super::ExportConfig;
use crate::diagnostics::Diagnostics;
use crate::scene::{ExtensionMode, MapTarget, MappingMode, MaterialData, SceneSource};
use crate::types::{Color, MaterialId, NodeId};
use std::fmt;
use std::str::FromStr;

/// Marker introducing the decoration tag in a material name.
pub const DECORATION_MARKER: &str = "m.";

/// Texture channel kinds understood by the Trainz importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Ambient,
    Diffuse,
    /// Specular colour.
    Specular,
    /// Specular level.
    Shine,
    /// Glossiness.
    ShineStrength,
    SelfIllum,
    Opacity,
    FilterColor,
    Bump,
    Reflect,
    Refract,
    Displacement,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Ambient => "ambient",
            ChannelKind::Diffuse => "diffuse",
            ChannelKind::Specular => "specular",
            ChannelKind::Shine => "shine",
            ChannelKind::ShineStrength => "shinestrength",
            ChannelKind::SelfIllum => "selfillum",
            ChannelKind::Opacity => "opacity",
            ChannelKind::FilterColor => "filtercolor",
            ChannelKind::Bump => "bump",
            ChannelKind::Reflect => "reflect",
            ChannelKind::Refract => "refract",
            ChannelKind::Displacement => "displacement",
        }
    }

    /// Bump and displacement maps carry a `flipGreen` flag.
    pub fn has_green_channel_flag(self) -> bool {
        matches!(self, ChannelKind::Bump | ChannelKind::Displacement)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One texture layer of an exported material.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureChannel {
    pub kind: ChannelKind,
    /// Absolute path of the image.
    pub path: String,
    pub tile_u: bool,
    pub tile_v: bool,
    pub alpha_source: bool,
    /// Channel strength, also written as the layer opacity.
    pub amount: f32,
}

/// Render technique tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecorationTag {
    NoTex,
    OneTex,
    Reflect,
    Gloss,
    TBumpTex,
    TBumpGloss,
    TBumpEnv,
}

impl DecorationTag {
    pub const ALL: [DecorationTag; 7] = [
        DecorationTag::NoTex,
        DecorationTag::OneTex,
        DecorationTag::Reflect,
        DecorationTag::Gloss,
        DecorationTag::TBumpTex,
        DecorationTag::TBumpGloss,
        DecorationTag::TBumpEnv,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DecorationTag::NoTex => "notex",
            DecorationTag::OneTex => "onetex",
            DecorationTag::Reflect => "reflect",
            DecorationTag::Gloss => "gloss",
            DecorationTag::TBumpTex => "tbumptex",
            DecorationTag::TBumpGloss => "tbumpgloss",
            DecorationTag::TBumpEnv => "tbumpenv",
        }
    }
}

impl fmt::Display for DecorationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecorationTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DecorationTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or(())
    }
}

/// Result of the decoration ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    pub tag: DecorationTag,
    /// Bump, diffuse, opacity and reflection together have no shader.
    pub unsupported: bool,
}

/// Derive the decoration tag from the channel kinds in use.
///
/// Rules are applied in a fixed order, later matches overriding earlier ones.
pub fn derive_decoration(kinds: &[ChannelKind]) -> Derivation {
    let has = |kind| kinds.contains(&kind);
    let diffuse = has(ChannelKind::Diffuse);
    let opacity = has(ChannelKind::Opacity);
    let reflect = has(ChannelKind::Reflect);
    let bump = has(ChannelKind::Bump);

    // Single maps other than diffuse and reflect also land on onetex, as
    // notex breaks some asset types.
    let mut tag = DecorationTag::OneTex;
    if reflect {
        tag = DecorationTag::Reflect;
    }
    if diffuse {
        tag = DecorationTag::OneTex;
    }
    if diffuse && opacity {
        tag = DecorationTag::OneTex;
    }
    if diffuse && reflect {
        tag = DecorationTag::Reflect;
    }
    if diffuse && opacity && reflect {
        tag = DecorationTag::Gloss;
    }

    let mut unsupported = false;
    if bump && diffuse {
        tag = match (opacity, reflect) {
            (true, true) => {
                unsupported = true;
                DecorationTag::TBumpTex
            }
            (false, true) => DecorationTag::TBumpGloss,
            (true, false) => DecorationTag::TBumpTex,
            (false, false) => DecorationTag::TBumpEnv,
        };
    }
    Derivation { tag, unsupported }
}

/// Bump amounts are scaled down to the importer's range.
const BUMP_SCALE: f32 = 5.0;

/// Texture channels of a material, in slot order.
///
/// Only enabled image slots count. Diffuse colour is split by mapping: UV
/// gives a diffuse channel, reflection mapping a reflect channel. Amounts of
/// channels whose slider sign means nothing downstream are stored unsigned.
pub fn detect_channels(material: &MaterialData) -> Vec<TextureChannel> {
    let mut channels = Vec::new();
    for slot in material.enabled_slots().filter(|s| s.is_image()) {
        let Some(image) = &slot.image else {
            continue;
        };
        let unsigned = |target| slot.factor(target).map(f32::abs);
        let mapped = |mapping| {
            slot.factor(MapTarget::DiffuseColor)
                .filter(|_| slot.mapping == mapping)
        };
        let found = [
            (ChannelKind::Ambient, unsigned(MapTarget::Ambient)),
            (ChannelKind::Diffuse, mapped(MappingMode::Uv)),
            (ChannelKind::Specular, slot.factor(MapTarget::SpecularColor)),
            (ChannelKind::Shine, unsigned(MapTarget::Specular)),
            (ChannelKind::ShineStrength, unsigned(MapTarget::Hardness)),
            (ChannelKind::SelfIllum, unsigned(MapTarget::Emit)),
            (ChannelKind::Opacity, unsigned(MapTarget::Alpha)),
            (ChannelKind::FilterColor, unsigned(MapTarget::Translucency)),
            (ChannelKind::Bump, unsigned(MapTarget::Normal).map(|f| f / BUMP_SCALE)),
            (ChannelKind::Reflect, mapped(MappingMode::Reflection)),
            (ChannelKind::Displacement, unsigned(MapTarget::Displacement)),
        ];

        let tile = slot.extension == ExtensionMode::Repeat;
        for (kind, amount) in found {
            let Some(amount) = amount else {
                continue;
            };
            channels.push(TextureChannel {
                kind,
                path: image.path.clone(),
                tile_u: tile,
                tile_v: tile,
                alpha_source: kind == ChannelKind::Opacity || image.use_alpha,
                amount,
            });
        }
    }
    channels
}

/// Identity of an exported material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub material: MaterialId,
    pub two_sided: bool,
}

/// Materials used by the exported meshes, in first-use order.
#[derive(Debug, Clone, Default)]
pub struct MaterialSet {
    keys: Vec<MaterialKey>,
}

impl MaterialSet {
    /// Gather the materials used by faces of `meshes`.
    ///
    /// Meshes without material slots and faces on an empty slot are errors;
    /// the vertices of such faces are gathered in a marker vertex group.
    pub fn collect<S: SceneSource + ?Sized>(
        scene: &mut S,
        meshes: &[NodeId],
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut set = MaterialSet::default();
        for &id in meshes {
            let Some(node) = scene.node(id) else {
                continue;
            };
            let Some(mesh) = node.mesh() else {
                continue;
            };
            if mesh.material_slots.is_empty() {
                diagnostics.error(format!("Object \"{}\" has no material assigned.", node.name));
                continue;
            }

            let mut unassigned: Vec<u32> = Vec::new();
            for face in &mesh.faces {
                let material = mesh
                    .material_slots
                    .get(face.material_slot)
                    .copied()
                    .flatten()
                    .filter(|&m| scene.material(m).is_some());
                match material {
                    Some(material) => set.insert(MaterialKey {
                        material,
                        two_sided: mesh.double_sided,
                    }),
                    None => unassigned.extend(&face.vertices),
                }
            }

            if !unassigned.is_empty() {
                diagnostics.error(format!(
                    "Face(s) without Material in Object \"{}\", Mesh \"{}\" detected. \
                     Collect them in Vertex Group \"{}\"",
                    node.name, mesh.name, NO_MATERIAL_GROUP
                ));
                if let Some(mesh) = scene.mesh_mut(id) {
                    mesh.add_to_vertex_group(NO_MATERIAL_GROUP, unassigned);
                }
            }
        }
        tracing::debug!("collected {} materials", set.keys.len());
        set
    }

    fn insert(&mut self, key: MaterialKey) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn keys(&self) -> &[MaterialKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn index_of(&self, key: MaterialKey) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }

    /// True if the material is exported for any sidedness.
    pub fn exports(&self, material: MaterialId) -> bool {
        self.keys.iter().any(|k| k.material == material)
    }

    /// Exported material index for every material slot of a mesh.
    pub fn slot_indices(&self, slots: &[Option<MaterialId>], two_sided: bool) -> Vec<Option<usize>> {
        slots
            .iter()
            .map(|slot| {
                slot.and_then(|material| self.index_of(MaterialKey { material, two_sided }))
            })
            .collect()
    }
}

/// An exported material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Lowercased, decorated name.
    pub name: String,
    /// Name as authored in the scene.
    pub source_name: String,
    pub two_sided: bool,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub emissive: Color,
    pub shine: f32,
    pub opacity: f32,
    pub textures: Vec<TextureChannel>,
    /// Tag derived from the texture channels.
    pub decoration: DecorationTag,
}

impl Material {
    /// Classify a scene material for export.
    pub fn build(
        data: &MaterialData,
        two_sided: bool,
        config: &ExportConfig,
        world_ambient: Color,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let textures = detect_channels(data);
        let kinds: Vec<ChannelKind> = textures.iter().map(|t| t.kind).collect();
        let derived = derive_decoration(&kinds);
        if derived.unsupported {
            diagnostics.warning(format!(
                "Material \"{}\" uses Diffuse, Normal, Alpha and Reflection Map; so far no \
                 Material Type support this, fall back to {}",
                data.name, derived.tag
            ));
        }

        let name = decorate_name(&data.name, derived.tag, diagnostics);

        let scale = |color: Color, factor: f32| color.map(|c| c * factor);
        let diffuse = scale(data.diffuse_color, data.diffuse_intensity);
        let ambient = if config.diffuse_as_ambient {
            diffuse
        } else {
            scale(world_ambient, data.ambient)
        };
        let emit_source = if config.mirror_as_emit {
            data.mirror_color
        } else {
            data.diffuse_color
        };

        Material {
            name,
            source_name: data.name.clone(),
            two_sided,
            ambient,
            diffuse,
            specular: scale(data.specular_color, data.specular_intensity),
            emissive: scale(emit_source, data.emit),
            shine: (data.specular_hardness as f32 - 1.0) / 510.0,
            opacity: if data.use_transparency { data.alpha } else { 1.0 },
            textures,
            decoration: derived.tag,
        }
    }
}

/// Lowercase `name` and append or check its decoration tag.
pub fn decorate_name(name: &str, derived: DecorationTag, diagnostics: &mut Diagnostics) -> String {
    let mut exported = name.to_lowercase();
    match exported.rfind(DECORATION_MARKER) {
        Some(at) => {
            let authored = &exported[at + DECORATION_MARKER.len()..];
            if authored.parse::<DecorationTag>().is_err() {
                diagnostics.warning(format!(
                    "Material \"{}\" uses an unknown or inofficial Material Decoration",
                    name
                ));
            }
            if authored != derived.as_str() {
                diagnostics.info(format!(
                    "decoration for Material \"{}\" differs from the proposed decoration \"{}{}\"",
                    name, DECORATION_MARKER, derived
                ));
            }
        }
        None => {
            exported.push('.');
            exported.push_str(DECORATION_MARKER);
            exported.push_str(derived.as_str());
            diagnostics.info(format!("Material \"{}\" exported as \"{}\"", name, exported));
        }
    }
    exported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::scene::{fixtures, TextureSlot};

    fn kinds(list: &[ChannelKind]) -> DecorationTag {
        derive_decoration(list).tag
    }

    #[test]
    fn test_decoration_ladder() {
        use ChannelKind::*;
        assert_eq!(kinds(&[]), DecorationTag::OneTex);
        assert_eq!(kinds(&[Specular]), DecorationTag::OneTex);
        assert_eq!(kinds(&[Reflect]), DecorationTag::Reflect);
        assert_eq!(kinds(&[Diffuse]), DecorationTag::OneTex);
        assert_eq!(kinds(&[Diffuse, Opacity]), DecorationTag::OneTex);
        assert_eq!(kinds(&[Diffuse, Reflect]), DecorationTag::Reflect);
        assert_eq!(kinds(&[Diffuse, Opacity, Reflect]), DecorationTag::Gloss);
        assert_eq!(kinds(&[Bump, Diffuse]), DecorationTag::TBumpEnv);
        assert_eq!(kinds(&[Bump, Diffuse, Opacity]), DecorationTag::TBumpTex);
        assert_eq!(kinds(&[Bump, Diffuse, Reflect]), DecorationTag::TBumpGloss);
        assert_eq!(kinds(&[Bump, Reflect]), DecorationTag::Reflect);

        let all = derive_decoration(&[Bump, Diffuse, Opacity, Reflect]);
        assert_eq!(all.tag, DecorationTag::TBumpTex);
        assert!(all.unsupported);
    }

    #[test]
    fn test_channel_detection() {
        let slot = TextureSlot::image("wood", "/tex/wood.tga")
            .with_influence(MapTarget::DiffuseColor, 0.8)
            .with_influence(MapTarget::Normal, -2.5)
            .with_influence(MapTarget::Hardness, -0.5);
        let mut alpha = TextureSlot::image("mask", "/tex/mask.tga")
            .with_influence(MapTarget::Alpha, -1.0);
        alpha.extension = ExtensionMode::Clip;
        let chrome = TextureSlot::image("env", "/tex/env.tga")
            .with_mapping(MappingMode::Reflection)
            .with_influence(MapTarget::DiffuseColor, 0.4);
        let mut disabled = TextureSlot::image("off", "/tex/off.tga")
            .with_influence(MapTarget::Emit, 1.0);
        disabled.enabled = false;

        let material = fixtures::plain_material(0, "Body")
            .with_slot(slot)
            .with_slot(alpha)
            .with_slot(chrome)
            .with_slot(disabled);
        let channels = detect_channels(&material);

        let found: Vec<ChannelKind> = channels.iter().map(|c| c.kind).collect();
        assert_eq!(
            found,
            vec![
                ChannelKind::Diffuse,
                ChannelKind::ShineStrength,
                ChannelKind::Bump,
                ChannelKind::Opacity,
                ChannelKind::Reflect,
            ]
        );
        assert!((channels[1].amount - 0.5).abs() < 1e-6);
        assert!((channels[2].amount - 0.5).abs() < 1e-6);
        assert!(channels[3].alpha_source);
        assert!(!channels[3].tile_u && !channels[3].tile_v);
        assert!(channels[0].tile_u);
        assert!(!channels[0].alpha_source);
        assert_eq!(channels[4].path, "/tex/env.tga");
    }

    #[test]
    fn test_procedural_and_imageless_slots_are_ignored() {
        let mut procedural = TextureSlot::image("clouds", "")
            .with_influence(MapTarget::DiffuseColor, 1.0);
        procedural.kind = crate::scene::TextureKind::Procedural("clouds".into());
        let mut empty = TextureSlot::image("nothing", "")
            .with_influence(MapTarget::DiffuseColor, 1.0);
        empty.image = None;
        let material = fixtures::plain_material(0, "m")
            .with_slot(procedural)
            .with_slot(empty);
        assert!(detect_channels(&material).is_empty());
    }

    #[test]
    fn test_undecorated_name_gets_derived_tag_and_is_idempotent() {
        let data = fixtures::textured_material(3, "Wood", "/tex/wood.tga");
        let mut diags = Diagnostics::new();
        let material = Material::build(&data, false, &ExportConfig::default(), [0.0; 3], &mut diags);

        assert_eq!(material.name, "wood.m.onetex");
        assert!(diags.contains(Severity::Info, "exported as \"wood.m.onetex\""));

        let again: Vec<ChannelKind> = material.textures.iter().map(|t| t.kind).collect();
        assert_eq!(derive_decoration(&again).tag, material.decoration);

        let mut renamed = data.clone();
        renamed.name = material.name.clone();
        let mut diags = Diagnostics::new();
        let rebuilt = Material::build(&renamed, false, &ExportConfig::default(), [0.0; 3], &mut diags);
        assert_eq!(rebuilt.name, "wood.m.onetex");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_authored_tag_is_kept() {
        let mut diags = Diagnostics::new();
        let name = decorate_name("Glass.m.Gloss", DecorationTag::OneTex, &mut diags);
        assert_eq!(name, "glass.m.gloss");
        assert!(diags.contains(Severity::Info, "differs from the proposed decoration \"m.onetex\""));
        assert_eq!(diags.status(), crate::diagnostics::ExportStatus::Ok);

        let mut diags = Diagnostics::new();
        decorate_name("paint.m.shiny", DecorationTag::OneTex, &mut diags);
        assert!(diags.contains(Severity::Warning, "unknown or inofficial"));
    }

    #[test]
    fn test_colour_properties() {
        let mut data = fixtures::plain_material(0, "paint.m.notex");
        data.diffuse_color = [1.0, 0.5, 0.0];
        data.diffuse_intensity = 0.5;
        data.specular_hardness = 256;
        data.emit = 0.5;
        data.mirror_color = [0.0, 0.0, 1.0];
        data.ambient = 0.5;
        data.use_transparency = true;
        data.alpha = 0.25;

        let mut diags = Diagnostics::new();
        let world = [0.2, 0.2, 0.2];
        let material = Material::build(&data, true, &ExportConfig::default(), world, &mut diags);
        assert_eq!(material.ambient, [0.5, 0.25, 0.0]);
        assert_eq!(material.diffuse, [0.5, 0.25, 0.0]);
        assert_eq!(material.emissive, [0.5, 0.25, 0.0]);
        assert!((material.shine - 0.5).abs() < 1e-6);
        assert_eq!(material.opacity, 0.25);
        assert!(material.two_sided);

        let config = ExportConfig::default()
            .with_diffuse_as_ambient(false)
            .with_mirror_as_emit(true);
        let material = Material::build(&data, true, &config, world, &mut diags);
        assert_eq!(material.ambient, [0.1, 0.1, 0.1]);
        assert_eq!(material.emissive, [0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_collect_dedups_by_material_and_sidedness() {
        let mut scene = fixtures::scene();
        scene.add_material(fixtures::plain_material(7, "paint"));
        let a = fixtures::add_mesh(&mut scene, fixtures::quad("a", Some(MaterialId(7))));
        let b = fixtures::add_mesh(&mut scene, fixtures::quad("b", Some(MaterialId(7))));
        let mut double = fixtures::quad("c", Some(MaterialId(7)));
        double.double_sided = true;
        let c = fixtures::add_mesh(&mut scene, double);

        let mut diags = Diagnostics::new();
        let set = MaterialSet::collect(&mut scene, &[a, b, c], &mut diags);

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.slot_indices(&[Some(MaterialId(7)), None], true),
            vec![Some(1), None]
        );
        assert!(set.exports(MaterialId(7)));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_faces_on_empty_slot_are_gathered() {
        let mut scene = fixtures::scene();
        scene.add_material(fixtures::plain_material(1, "paint"));
        let mut mesh = fixtures::quad("panel", Some(MaterialId(1)));
        mesh.material_slots.push(None);
        mesh.vertices.push(crate::scene::MeshVertex::new([2.0, 0.0, 0.0], [0.0, 0.0, 1.0]));
        mesh.faces.push(fixtures::face(&[1, 4, 2], 1));
        let panel = fixtures::add_mesh(&mut scene, mesh);
        let bare = fixtures::add_mesh(&mut scene, crate::scene::MeshData::new("bare"));

        let mut diags = Diagnostics::new();
        let set = MaterialSet::collect(&mut scene, &[panel, bare], &mut diags);

        assert_eq!(set.len(), 1);
        assert!(diags.contains(Severity::Error, "Face(s) without Material in Object \"panel\""));
        assert!(diags.contains(Severity::Error, "Object \"bare\" has no material assigned."));
        let mesh = scene.node(panel).unwrap().mesh().unwrap();
        assert_eq!(mesh.vertex_group_members(NO_MATERIAL_GROUP), vec![1, 2, 4]);
    }
}
