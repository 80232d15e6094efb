// SPDX-License-Identifier: MIT

//! Document store: reading inputs, writing results, and state snapshots

use crate::adk::error::TailorError;
use crate::tailor::workflow::state::PipelineState;
use encoding_rs::WINDOWS_1252;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix added to the input file stem for the edited document
pub const OUTPUT_SUFFIX: &str = "_optimized";

/// Read a text file as UTF-8, falling back to Windows-1252
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String, TailorError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        TailorError::other(format!("cannot read {}: {}", path.display(), e))
    })?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            log::warn!(
                "{} is not valid UTF-8, decoding as Windows-1252",
                path.display()
            );
            let (text, _, _) = WINDOWS_1252.decode(e.as_bytes());
            Ok(text.into_owned())
        }
    }
}

/// Write `content`, creating parent directories
///
/// Refuses to replace an existing file unless `overwrite` is set.
pub fn write_text<P: AsRef<Path>>(
    path: P,
    content: &str,
    overwrite: bool,
) -> Result<PathBuf, TailorError> {
    let path = path.as_ref();
    if path.exists() && !overwrite {
        return Err(TailorError::other(format!(
            "{} already exists; pass --overwrite to replace it",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    log::info!("Wrote {}", path.display());
    Ok(path.to_path_buf())
}

/// `dir/name.ext` becomes `dir/name{suffix}.ext`
pub fn output_path<P: AsRef<Path>>(input: P, suffix: &str) -> PathBuf {
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    input.with_file_name(name)
}

/// Save the complete state, accumulators included, as pretty JSON
pub fn save_snapshot<P: AsRef<Path>>(path: P, state: &PipelineState) -> Result<(), TailorError> {
    let json = serde_json::to_string_pretty(state)?;
    write_text(path, &json, true)?;
    Ok(())
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<PipelineState, TailorError> {
    let content = read_text(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::workflow::types::{Recommendation, StageError, StageName};
    use tempfile::tempdir;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path("cv/resume.tex", OUTPUT_SUFFIX),
            PathBuf::from("cv/resume_optimized.tex")
        );
        assert_eq!(
            output_path("resume", OUTPUT_SUFFIX),
            PathBuf::from("resume_optimized")
        );
    }

    #[test]
    fn test_write_creates_parents_and_guards_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/nested/resume.tex");

        write_text(&path, "first", false).unwrap();
        assert_eq!(read_text(&path).unwrap(), "first");

        assert!(write_text(&path, "second", false).is_err());
        assert_eq!(read_text(&path).unwrap(), "first");

        write_text(&path, "second", true).unwrap();
        assert_eq!(read_text(&path).unwrap(), "second");
    }

    #[test]
    fn test_windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.txt");
        // "café – “ok”" in Windows-1252
        fs::write(&path, [0x63, 0x61, 0x66, 0xE9, 0x20, 0x96, 0x20, 0x93, 0x6F, 0x6B, 0x94]).unwrap();
        assert_eq!(read_text(&path).unwrap(), "café \u{2013} \u{201C}ok\u{201D}");
    }

    #[test]
    fn test_missing_file() {
        let err = read_text("/nonexistent/resume.tex").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/resume.tex"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = PipelineState::new("doc", "reqs");
        state.recommendations.push(Recommendation {
            id: "rec_001".to_string(),
            priority: 2,
            category: "skills".to_string(),
            description: "Add Rust".to_string(),
            action: "List it".to_string(),
            rationale: "Required".to_string(),
            modification: Some("\\item Rust".to_string()),
        });
        state
            .errors
            .push(StageError::capability(StageName::AnalyzeGaps, "timeout"));
        state.awaiting_selection = true;

        save_snapshot(&path, &state).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, state);
    }
}
