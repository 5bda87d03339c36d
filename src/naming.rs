//! Naming conventions for Trainz scenes.
//!
//! Attachment points and bones are recognized purely by name prefix. Names
//! and paths ending up in the output are advised to stay within a small set
//! of "recommended" characters.

/// Prefix marking an empty as an attachment point.
pub const ATTACHMENT_PREFIX: &str = "a.";

/// Prefix marking a lattice, armature or pose bone as a Trainz bone.
pub const BONE_PREFIX: &str = "b.r.";

/// Returns true if `name` follows the attachment point convention.
pub fn is_attachment(name: &str) -> bool {
    name.starts_with(ATTACHMENT_PREFIX)
}

/// Returns true if `name` follows the bone convention.
pub fn is_bone_candidate(name: &str) -> bool {
    name.starts_with(BONE_PREFIX)
}

/// Returns true if `c` is in the recommended character set.
pub fn is_recommended_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.' | '\\' | '/')
}

/// Characters of `s` outside the recommended set, in order of appearance.
pub fn unrecommended_chars(s: &str) -> String {
    s.chars().filter(|&c| !is_recommended_char(c)).collect()
}

/// Derive the exported mesh name from the scene file name.
///
/// Everything from the first `.` on is dropped (directory components too),
/// then unrecommended characters are removed.
pub fn sanitize_mesh_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let stem = base.split('.').next().unwrap_or(base);
    stem.chars().filter(|&c| is_recommended_char(c)).collect()
}

/// Replace `&`, `<` and `>` with character entity references.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert!(is_attachment("a.light0"));
        assert!(!is_attachment("light.a."));
        assert!(is_bone_candidate("b.r.door"));
        assert!(!is_bone_candidate("b.door"));
        assert!(!is_bone_candidate("B.R.door"));
    }

    #[test]
    fn test_unrecommended_chars() {
        assert_eq!(unrecommended_chars("b.r.door_left-1"), "");
        assert_eq!(unrecommended_chars("C:\\tex\\wood.tga"), "");
        assert_eq!(unrecommended_chars("door (left) ä"), " () ä");
    }

    #[test]
    fn test_sanitize_mesh_name() {
        assert_eq!(sanitize_mesh_name("/home/me/My Loco.v2.blend"), "MyLoco");
        assert_eq!(sanitize_mesh_name("C:\\work\\tender.blend"), "tender");
        assert_eq!(sanitize_mesh_name("wagon"), "wagon");
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("<A&B>"), "&lt;A&amp;B&gt;");
        assert_eq!(escape_text("plain"), "plain");
    }
}
