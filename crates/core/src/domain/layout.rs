// Object Store Layout & Naming
//
// jobs/<job_id>/input/<name>
// jobs/<job_id>/parts/b<NN>/part_<NNN>.pdf
// jobs/<job_id>/glossary.tsv
// <dir>/<stem>_<lang><ext>

const BLOB_UNSAFE: &str = " #%&+?;=@[]<>:\"\\|{}^`";
const DRIVE_ILLEGAL: &str = "\"*:<>?/\\|";
const ZERO_WIDTH: [char; 5] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{200e}', '\u{200f}'];

pub fn job_root(job_id: &str) -> String {
    format!("jobs/{}", job_id)
}

pub fn input_path(job_id: &str, name: &str) -> String {
    format!("jobs/{}/input/{}", job_id, name)
}

pub fn glossary_path(job_id: &str) -> String {
    format!("jobs/{}/glossary.tsv", job_id)
}

/// Prefix shared by every batch of a job
pub fn parts_root(job_id: &str) -> String {
    format!("jobs/{}/parts", job_id)
}

/// `jobs/<id>/parts/b<NN>`
pub fn batch_prefix(job_id: &str, batch_name: &str) -> String {
    format!("jobs/{}/parts/{}", job_id, batch_name)
}

/// Split into (directory, basename); backslashes count as separators
pub fn split_dir_base(path: &str) -> (String, String) {
    let normalized = collapse_slashes(&path.replace('\\', "/"));
    match normalized.rsplit_once('/') {
        Some((dir, base)) => (dir.to_string(), base.to_string()),
        None => (String::new(), normalized),
    }
}

pub fn basename(path: &str) -> String {
    split_dir_base(path).1
}

/// Basename made safe for blob names and URLs
pub fn safe_basename(name: &str) -> String {
    let base = basename(&collapse_whitespace(name));
    let trimmed = strip_edges(&base);
    let replaced: String = trimmed
        .chars()
        .map(|c| if BLOB_UNSAFE.contains(c) { '_' } else { c })
        .collect();
    if replaced.is_empty() {
        "file".to_string()
    } else {
        replaced
    }
}

/// File name accepted by the drive service
pub fn safe_drive_name(name: &str) -> String {
    let cleaned: String = strip_edges(&collapse_whitespace(name))
        .chars()
        .filter(|c| !c.is_control() && !DRIVE_ILLEGAL.contains(*c))
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Normalize a user-supplied blob path: no empty, `.` or `..` segments
pub fn sanitize_blob_path(path: &str) -> String {
    let normalized = collapse_whitespace(&path.replace('\\', "/"));
    let mut segments: Vec<String> = Vec::new();
    for raw in normalized.split('/') {
        let seg: String = raw.chars().filter(|c| !c.is_control()).collect();
        let seg = strip_edges(&seg);
        match seg.as_str() {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(seg),
        }
    }
    segments.join("/")
}

/// Deterministic output location: `<dir>/<stem>_<lang><ext>` next to the source
///
/// `ext` overrides the source extension (split mode always yields `.pdf`);
/// a source without an extension gets `.pdf`.
pub fn translated_name(source_path: &str, target_lang: &str, ext: Option<&str>) -> String {
    let (dir, base) = split_dir_base(source_path);
    let safe = safe_basename(&base);
    let (stem, source_ext) = match safe.rsplit_once('.') {
        Some((stem, e)) if !stem.is_empty() => (stem.to_string(), Some(e.to_string())),
        _ => (safe.clone(), None),
    };
    let ext = ext
        .map(str::to_string)
        .or(source_ext)
        .unwrap_or_else(|| "pdf".to_string());
    let lang = target_lang.trim().to_lowercase();
    let name = format!("{}_{}.{}", stem, lang, ext.trim_start_matches('.'));
    if dir.is_empty() {
        name
    } else {
        format!("{}/{}", dir, name)
    }
}

fn collapse_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_slash = false;
    for c in s.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_ws = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !prev_ws {
                out.push(' ');
            }
            prev_ws = true;
        } else {
            out.push(c);
            prev_ws = false;
        }
    }
    out
}

fn strip_edges(s: &str) -> String {
    s.trim()
        .trim_matches(|c| ZERO_WIDTH.contains(&c))
        .trim_end_matches([' ', '.'])
        .to_string()
}
