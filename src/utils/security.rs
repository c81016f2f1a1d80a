//! Upload filename sanitization

use tracing::warn;

const MAX_FILENAME_LENGTH: usize = 255;

/// Reduce an uploaded filename to a safe single path component.
///
/// Directory components are dropped, unsafe characters become underscores
/// and Windows reserved device names are prefixed. Returns `None` when
/// nothing usable is left.
pub fn secure_filename(filename: &str) -> Option<String> {
    // Only the last path component is meaningful for an upload
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");

    let sanitized = sanitize_filename(base);

    // Leading dots would hide the file or smuggle a relative path
    let sanitized = sanitized.trim_start_matches('.').to_string();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.' || c == '_') {
        return None;
    }

    let sanitized = if is_dangerous_filename(&sanitized) {
        warn!("Reserved device name in upload filename: {}", sanitized);
        format!("_{}", sanitized)
    } else {
        sanitized
    };

    Some(truncate_preserving_extension(&sanitized, MAX_FILENAME_LENGTH))
}

/// Check if a filename collides with a Windows reserved device name
fn is_dangerous_filename(filename: &str) -> bool {
    let filename_lower = filename.to_lowercase();

    let reserved_names = [
        "con", "prn", "aux", "nul",
        "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8", "com9",
        "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
    ];

    let name_without_ext = filename_lower.split('.').next().unwrap_or("");
    reserved_names.contains(&name_without_ext)
}

/// Sanitize filename by replacing problematic characters
fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = String::new();

    for ch in filename.chars() {
        match ch {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => sanitized.push('_'),
            c if c.is_whitespace() => sanitized.push('_'),
            c if c.is_control() => {}
            c => sanitized.push(c),
        }
    }

    sanitized
}

fn truncate_preserving_extension(filename: &str, max_len: usize) -> String {
    if filename.len() <= max_len {
        return filename.to_string();
    }

    let (stem, extension) = match filename.rfind('.') {
        Some(pos) => (&filename[..pos], &filename[pos..]),
        None => (filename, ""),
    };

    let mut budget = max_len.saturating_sub(extension.len());
    while budget > 0 && !stem.is_char_boundary(budget) {
        budget -= 1;
    }
    format!("{}{}", &stem[..budget.min(stem.len())], extension)
}
