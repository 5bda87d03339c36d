//! Trainz import XML export.
//!
//! The document is streamed line by line. Every number is written with four
//! decimals and every free text field is escaped.

use crate::error::Result;
use crate::exporter::{
    Animation, AssetModel, Attachment, Bone, Material, TextureChannel, Triangle, Vertex,
};
use crate::naming::escape_text;
use crate::types::{Color, DECIMAL_DIGITS};
use glam::{Quat, Vec3};
use std::io::Write;

const IND1: &str = "  ";
const IND2: &str = "    ";
const IND3: &str = "      ";
const IND4: &str = "        ";
const IND5: &str = "          ";
const IND6: &str = "            ";

/// Format a number with the output precision; negative zero prints as zero.
pub fn fmt_number(value: f32) -> String {
    let text = format!("{:.*}", DECIMAL_DIGITS, value);
    match text.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_string(),
        _ => text,
    }
}

fn fmt_list(values: &[f32]) -> String {
    values
        .iter()
        .map(|&v| fmt_number(v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_vec3(v: Vec3) -> String {
    fmt_list(&v.to_array())
}

fn fmt_quat(q: Quat) -> String {
    fmt_list(&[q.x, q.y, q.z, q.w])
}

fn fmt_color(c: &Color) -> String {
    fmt_list(c)
}

/// Write the full document for `model` to `out`.
pub fn write_document<W: Write>(model: &AssetModel, mut out: W) -> Result<()> {
    writeln!(out, "<trainzImport>")?;
    writeln!(out, "{IND1}<version>1</version>")?;
    write_mesh(&mut out, model)?;
    if !model.bones.is_empty() {
        write_skeleton(&mut out, &model.bones)?;
    }
    write_materials(&mut out, &model.materials)?;
    if let Some(animation) = &model.animation {
        write_animation(&mut out, animation)?;
    }
    writeln!(out, "</trainzImport>")?;
    out.flush()?;
    Ok(())
}

fn write_mesh<W: Write>(out: &mut W, model: &AssetModel) -> Result<()> {
    writeln!(out, "{IND1}<mesh>")?;
    writeln!(out, "{IND2}<name>{}</name>", escape_text(&model.mesh_name))?;
    writeln!(out, "{IND2}<triangles>")?;
    for triangle in &model.triangles {
        write_triangle(out, triangle)?;
    }
    writeln!(out, "{IND2}</triangles>")?;
    if !model.attachments.is_empty() {
        writeln!(out, "{IND2}<attachments>")?;
        for attachment in &model.attachments {
            write_attachment(out, attachment)?;
        }
        writeln!(out, "{IND2}</attachments>")?;
    }
    writeln!(out, "{IND1}</mesh>")?;
    Ok(())
}

fn write_triangle<W: Write>(out: &mut W, triangle: &Triangle) -> Result<()> {
    write!(
        out,
        "{IND3}<triangle><materialId>{}</materialId>",
        triangle.material
    )?;
    for vertex in &triangle.vertices {
        write_vertex(out, vertex)?;
    }
    writeln!(out, "</triangle>")?;
    Ok(())
}

fn write_vertex<W: Write>(out: &mut W, vertex: &Vertex) -> Result<()> {
    write!(
        out,
        "<vertex><position>{}</position><normal>{}</normal><texcoord>{}</texcoord>",
        fmt_list(&vertex.position),
        fmt_list(&vertex.normal),
        fmt_list(&vertex.uv)
    )?;
    for (stream, weight) in vertex.weights.iter().enumerate() {
        write!(
            out,
            "<boneId stream=\"{stream}\">{}</boneId><blend stream=\"{stream}\">{}</blend>",
            weight.bone,
            fmt_number(weight.weight)
        )?;
    }
    write!(out, "</vertex>")?;
    Ok(())
}

fn write_attachment<W: Write>(out: &mut W, attachment: &Attachment) -> Result<()> {
    writeln!(
        out,
        "{IND3}<attachment><name>{}</name><position>{}</position><orientation>{}</orientation></attachment>",
        escape_text(&attachment.name),
        fmt_vec3(attachment.position),
        fmt_quat(attachment.orientation)
    )?;
    Ok(())
}

fn write_skeleton<W: Write>(out: &mut W, bones: &[Bone]) -> Result<()> {
    writeln!(out, "{IND1}<skeleton>")?;
    writeln!(out, "{IND2}<bones>")?;
    for (id, bone) in bones.iter().enumerate() {
        writeln!(
            out,
            "{IND3}<bone><id>{}</id><name>{}</name><parentName>{}</parentName>\
             <position>{}</position><orientation>{}</orientation></bone>",
            id,
            escape_text(&bone.name),
            escape_text(&bone.parent_name),
            fmt_vec3(bone.position),
            fmt_quat(bone.orientation)
        )?;
    }
    writeln!(out, "{IND2}</bones>")?;
    writeln!(out, "{IND1}</skeleton>")?;
    Ok(())
}

fn write_materials<W: Write>(out: &mut W, materials: &[Material]) -> Result<()> {
    writeln!(out, "{IND1}<materials>")?;
    for (id, material) in materials.iter().enumerate() {
        writeln!(out, "{IND2}<material>")?;
        writeln!(
            out,
            "{IND3}<name>{}</name><id>{}</id><ambient>{}</ambient><diffuse>{}</diffuse>\
             <specular>{}</specular><emissive>{}</emissive><shine>{}</shine>\
             <opacity>{}</opacity><twoSided>{}</twoSided>",
            escape_text(&material.name),
            id,
            fmt_color(&material.ambient),
            fmt_color(&material.diffuse),
            fmt_color(&material.specular),
            fmt_color(&material.emissive),
            fmt_number(material.shine),
            fmt_number(material.opacity),
            material.two_sided
        )?;
        if !material.textures.is_empty() {
            writeln!(out, "{IND3}<textures>")?;
            for texture in &material.textures {
                write_texture(out, texture)?;
            }
            writeln!(out, "{IND3}</textures>")?;
        }
        writeln!(out, "{IND2}</material>")?;
    }
    writeln!(out, "{IND1}</materials>")?;
    Ok(())
}

fn write_texture<W: Write>(out: &mut W, texture: &TextureChannel) -> Result<()> {
    write!(
        out,
        "{IND4}<texture><textureName>{}</textureName><alphaSource>{}</alphaSource>\
         <typeName>{}</typeName><tileU>{}</tileU><tileV>{}</tileV>\
         <layerOpacity>{}</layerOpacity>",
        escape_text(&texture.path),
        texture.alpha_source,
        texture.kind,
        texture.tile_u,
        texture.tile_v,
        fmt_number(texture.amount)
    )?;
    if texture.kind.has_green_channel_flag() {
        write!(out, "<flipGreen>false</flipGreen>")?;
    }
    writeln!(out, "</texture>")?;
    Ok(())
}

fn write_animation<W: Write>(out: &mut W, animation: &Animation) -> Result<()> {
    writeln!(out, "{IND1}<animations>")?;
    writeln!(out, "{IND2}<animation>")?;
    writeln!(out, "{IND3}<name></name>")?;
    writeln!(out, "{IND3}<frameRate>{}</frameRate>", animation.frame_rate)?;
    writeln!(out, "{IND3}<useLocalSpace>false</useLocalSpace>")?;
    writeln!(out, "{IND3}<animationTracks>")?;
    for track in &animation.tracks {
        writeln!(out, "{IND4}<animationTrack>")?;
        writeln!(out, "{IND5}<targetName>{}</targetName>", escape_text(&track.name))?;
        writeln!(out, "{IND5}<keyFrames>")?;
        for key in &track.keys {
            writeln!(
                out,
                "{IND6}<keyFrame><position>{}</position><rotation>{}</rotation></keyFrame>",
                fmt_vec3(key.position),
                fmt_quat(key.rotation)
            )?;
        }
        writeln!(out, "{IND5}</keyFrames>")?;
        writeln!(out, "{IND4}</animationTrack>")?;
    }
    writeln!(out, "{IND3}</animationTracks>")?;
    if !animation.events.is_empty() {
        writeln!(out, "{IND3}<events>")?;
        for event in &animation.events {
            writeln!(
                out,
                "{IND4}<event><frameIndex>{}</frameIndex><typeName>{}</typeName>\
                 <eventName>{}</eventName></event>",
                event.frame,
                event.kind,
                escape_text(&event.trigger)
            )?;
        }
        writeln!(out, "{IND3}</events>")?;
    }
    writeln!(out, "{IND2}</animation>")?;
    writeln!(out, "{IND1}</animations>")?;
    Ok(())
}
