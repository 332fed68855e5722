//! launching the external `osm_converter` tool that turns an `.osm.pbf`
//! extract into the paired streets/OSM binaries. the converter itself is a
//! separate executable; this module only resolves and invokes it.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::CliError;

pub const CONVERTER_ENV: &str = "GISEVO_OSM_CONVERTER";

const CONVERTER_NAME: &str = "osm_converter";

/// a single conversion: one input extract, one output map slug
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub map_name: String,
    pub force: bool,
}

impl ConversionRequest {
    pub fn new(input: &Path, output_dir: &Path) -> ConversionRequest {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        // input may be name.osm.pbf, strip the residual .osm as well
        let stem = stem.strip_suffix(".osm").unwrap_or(&stem).to_string();
        ConversionRequest {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            map_name: sanitize_map_name(&stem),
            force: false,
        }
    }

    /// the argument vector handed to the converter subprocess
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "--input".to_string(),
            self.input.to_string_lossy().to_string(),
            "--output-dir".to_string(),
            self.output_dir.to_string_lossy().to_string(),
            "--map-name".to_string(),
            self.map_name.clone(),
        ];
        if self.force {
            args.push("--force".to_string());
        }
        args.push("--quiet".to_string());
        args
    }
}

/// locate the converter executable: the environment override first, then
/// well-known locations relative to this executable, then PATH
pub fn find_converter() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONVERTER_ENV) {
        if !env_path.is_empty() {
            let candidate = PathBuf::from(env_path);
            if candidate.is_file() {
                return Some(candidate);
            }
            log::warn!(
                "{CONVERTER_ENV} points to a missing file: {}",
                candidate.display()
            );
        }
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        for relative in [
            CONVERTER_NAME.to_string(),
            format!("../{CONVERTER_NAME}"),
            format!("../tools/{CONVERTER_NAME}/{CONVERTER_NAME}"),
            format!("../../tools/{CONVERTER_NAME}/{CONVERTER_NAME}"),
        ] {
            let candidate = exe_dir.join(relative);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(CONVERTER_NAME))
        .find(|candidate| candidate.is_file())
}

/// run a conversion to completion. exit code zero is success; on failure
/// the first line of stderr is surfaced as the error summary.
pub fn run_converter(converter: &Path, request: &ConversionRequest) -> Result<(), CliError> {
    log::info!(
        "converting {} -> {}/{}",
        request.input.display(),
        request.output_dir.display(),
        request.map_name
    );

    let output = Command::new(converter)
        .args(request.arguments())
        .output()
        .map_err(|e| CliError::ConverterFailed(format!("failed to launch converter: {e}")))?;

    if output.status.success() {
        // stdout is informational only
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            log::debug!("converter: {line}");
        }
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let summary = stderr
        .lines()
        .next()
        .unwrap_or("converter exited with a failure status")
        .to_string();
    Err(CliError::ConverterFailed(summary))
}

/// map names become file slugs: anything non-alphanumeric turns into an
/// underscore, runs collapse, and a leading underscore is trimmed
pub fn sanitize_map_name(name: &str) -> String {
    if name.is_empty() {
        return "converted_map".to_string();
    }

    let mut sanitized = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch);
            last_was_underscore = false;
        } else if !last_was_underscore {
            sanitized.push('_');
            last_was_underscore = true;
        }
    }

    let trimmed = sanitized.trim_start_matches('_').trim_end_matches('_');
    if trimmed.is_empty() {
        return "converted_map".to_string();
    }
    trimmed.to_string()
}
