//! Tesseract engine adapter.
//!
//! Locates the `tesseract` binary once at startup (explicit override, then
//! PATH, then known install locations) and wraps the three invocation modes
//! the service needs: plain text, TSV word data, and the OSD orientation probe.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ApiError;

/// The "auto" language selector expands to this fixed engine profile.
pub const AUTO_LANGS: &str = "eng+rus+uzb+uzb_cyrl";

/// Page segmentation mode used for document recognition.
const DEFAULT_PSM: u32 = 3;

#[cfg(windows)]
const BINARY_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "tesseract";

/// Known install locations probed when the binary is not on PATH.
const INSTALL_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

/// Expand the language selector. `auto` (any case, or empty) means the fixed
/// multi-language profile; everything else passes through to the engine.
pub fn expand_lang(lang: &str) -> String {
    let trimmed = lang.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        AUTO_LANGS.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Orientation-and-script-detection result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Osd {
    /// Clockwise rotation (degrees) that would upright the page.
    pub rotate: u32,
    /// Engine confidence in the detected orientation.
    pub confidence: f32,
}

/// Handle on a resolved tesseract binary. Constructed once in the composition
/// root and shared read-only across requests.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    cmd: PathBuf,
}

impl TesseractEngine {
    /// Locate the binary: explicit override first, then PATH, then the fixed
    /// candidate list. Missing engine is a fatal configuration error.
    pub fn resolve(override_cmd: Option<&Path>) -> Result<Self, ApiError> {
        if let Some(cmd) = override_cmd {
            if cmd.is_file() {
                info!("using tesseract override {:?}", cmd);
                return Ok(Self { cmd: cmd.to_path_buf() });
            }
            debug!("tesseract override {:?} does not exist, probing", cmd);
        }

        if let Some(found) = search_path() {
            info!("found tesseract on PATH: {:?}", found);
            return Ok(Self { cmd: found });
        }

        for candidate in INSTALL_CANDIDATES {
            let path = Path::new(candidate);
            if path.is_file() {
                info!("found tesseract at {:?}", path);
                return Ok(Self { cmd: path.to_path_buf() });
            }
        }

        Err(ApiError::EngineUnavailable(
            "tesseract binary not found on PATH or in known install locations".to_string(),
        ))
    }

    pub fn cmd(&self) -> &Path {
        &self.cmd
    }

    /// Recognize an image to plain text, normalized for transport.
    pub async fn image_to_text(&self, image: &Path, lang: &str) -> Result<String, ApiError> {
        let stdout = self.run(image, lang, DEFAULT_PSM, None).await?;
        Ok(normalize_text(&stdout))
    }

    /// Recognize an image to TSV word data (per-word geometry + confidence).
    pub async fn image_to_tsv(&self, image: &Path, lang: &str) -> Result<String, ApiError> {
        self.run(image, lang, DEFAULT_PSM, Some("tsv")).await
    }

    /// Probe page orientation (`--psm 0`). Callers treat errors as "unknown".
    pub async fn orientation(&self, image: &Path) -> Result<Osd, ApiError> {
        let output = Command::new(&self.cmd)
            .arg(image)
            .arg("stdout")
            .args(["--psm", "0"])
            .output()
            .await
            .map_err(|e| ApiError::Ocr(format!("failed to spawn tesseract: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ApiError::Ocr(format!("OSD probe failed: {}", stderr.trim())));
        }
        // OSD output goes to stdout on modern tesseract, stderr on some builds
        let text = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        parse_osd(&text).ok_or_else(|| ApiError::Ocr("OSD output unparseable".to_string()))
    }

    async fn run(
        &self,
        image: &Path,
        lang: &str,
        psm: u32,
        configfile: Option<&str>,
    ) -> Result<String, ApiError> {
        let mut command = Command::new(&self.cmd);
        command
            .arg(image)
            .arg("stdout")
            .args(["-l", lang])
            .args(["--oem", "3"])
            .arg("--psm")
            .arg(psm.to_string())
            .args(["--dpi", "300"]);
        if let Some(cfg) = configfile {
            command.arg(cfg);
        }

        debug!("running {:?} on {:?} (lang={}, psm={})", self.cmd, image, lang, psm);
        let output = command
            .output()
            .await
            .map_err(|e| ApiError::Ocr(format!("failed to spawn tesseract: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(lang, stderr.trim()));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| ApiError::Ocr(format!("non-UTF8 engine output: {e}")))
    }
}

/// Distinguish a bad language code (client error) from an engine failure.
fn classify_failure(lang: &str, stderr: &str) -> ApiError {
    if stderr.contains("Failed loading language")
        || stderr.contains("Error opening data file")
        || stderr.contains("Could not initialize tesseract")
    {
        ApiError::InvalidLanguage(lang.to_string())
    } else {
        ApiError::Ocr(format!("tesseract exited with error: {stderr}"))
    }
}

fn search_path() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(BINARY_NAME))
        .find(|candidate| candidate.is_file())
}

static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalize engine output: CRLF to LF, collapse space runs, squeeze blank
/// line runs down to one, trim.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = SPACE_RUNS.replace_all(&unified, " ");
    let squeezed = BLANK_RUNS.replace_all(&collapsed, "\n\n");
    squeezed.trim().to_string()
}

fn parse_osd(output: &str) -> Option<Osd> {
    let mut rotate = None;
    let mut confidence = None;
    for line in output.lines() {
        if let Some(v) = line.strip_prefix("Rotate:") {
            rotate = v.trim().parse::<u32>().ok();
        } else if let Some(v) = line.strip_prefix("Orientation confidence:") {
            confidence = v.trim().parse::<f32>().ok();
        }
    }
    Some(Osd {
        rotate: rotate?,
        confidence: confidence?,
    })
}
