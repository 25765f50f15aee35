//! Filename helpers
//!
//! Client filenames are only ever displayed; storage paths are built from asset ids.

use std::path::Path;

const MAX_DISPLAY_NAME: usize = 255;

/// Reduce a client-supplied filename to a safe display name.
///
/// Directory components are dropped, control and reserved characters become `_`
/// and leading dots are stripped. Never empty.
pub fn sanitize_display_name(raw: &str) -> String {
    let base = raw.rsplit(&['/', '\\'][..]).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();

    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        return "upload".to_string();
    }

    if cleaned.len() <= MAX_DISPLAY_NAME {
        return cleaned.to_string();
    }
    let mut end = MAX_DISPLAY_NAME;
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    cleaned[..end].to_string()
}

/// Lowercased extension of a filename, without the dot
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Filename without its extension
pub fn stem_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "video".to_string())
}

/// Display name for a trim output: `<stem>_trimmed.<ext>`
pub fn derived_name(original: &str, suffix: &str, extension: &str) -> String {
    format!("{}_{}.{}", stem_of(original), suffix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_display_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_display_name("C:\\Users\\me\\clip.mp4"), "clip.mp4");
    }

    #[test]
    fn test_sanitize_replaces_reserved() {
        assert_eq!(sanitize_display_name("a<b>|c?.mp4"), "a_b__c_.mp4");
        assert_eq!(sanitize_display_name("...hidden.mov"), "hidden.mov");
        assert_eq!(sanitize_display_name(""), "upload");
        assert_eq!(sanitize_display_name("dir/"), "upload");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let name = sanitize_display_name(&long);
        assert!(name.len() <= MAX_DISPLAY_NAME);
        assert!(name.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Clip.MP4"), Some("mp4".to_string()));
        assert_eq!(extension_of("noext"), None);
    }

    #[test]
    fn test_derived_name() {
        assert_eq!(derived_name("holiday.mov", "trimmed", "mov"), "holiday_trimmed.mov");
        assert_eq!(derived_name("holiday.webm", "trimmed", "mp4"), "holiday_trimmed.mp4");
    }
}
