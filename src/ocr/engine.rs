use anyhow::{Result, anyhow};
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;

/// Characters allowed when only the percentage is of interest.
pub const DIGIT_WHITELIST: &str = "0123456789%";

/// Number of times a failed engine invocation is attempted.
const ENGINE_ATTEMPTS: u32 = 2;

/// Tesseract page segmentation modes used by the detection strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSegMode {
    /// Single uniform block of text (psm 6)
    SingleBlock,
    /// Single text line (psm 7)
    SingleLine,
    /// Single word (psm 8)
    SingleWord,
}

impl PageSegMode {
    pub fn code(self) -> u8 {
        match self {
            PageSegMode::SingleBlock => 6,
            PageSegMode::SingleLine => 7,
            PageSegMode::SingleWord => 8,
        }
    }
}

/// One engine configuration: segmentation mode plus optional whitelist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OcrConfig {
    pub psm: PageSegMode,
    pub whitelist: Option<String>,
}

impl OcrConfig {
    pub fn new(psm: PageSegMode) -> Self {
        Self {
            psm,
            whitelist: None,
        }
    }

    /// Restricts recognition to digits and the percent sign.
    pub fn digits(psm: PageSegMode) -> Self {
        Self {
            psm,
            whitelist: Some(DIGIT_WHITELIST.to_string()),
        }
    }

    /// Tesseract command line arguments for this configuration.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--psm".to_string(), self.psm.code().to_string()];
        if let Some(whitelist) = &self.whitelist {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", whitelist));
        }
        args
    }
}

impl std::fmt::Display for OcrConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.args().join(" "))
    }
}

/// Text read by one engine invocation.
///
/// Engine failures are not errors to the caller: the text is empty and
/// `error` says what went wrong.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OcrText {
    pub text: String,
    pub error: Option<String>,
}

impl OcrText {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            error: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Text recognition engine: image + config → text.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage, config: &OcrConfig) -> OcrText;
}

/// Runs the Tesseract command line tool.
#[derive(Clone, Debug)]
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>) -> Self {
        Self {
            executable,
            tessdata,
            language: "eng".to_string(),
        }
    }

    pub fn from_paths(paths: &TesseractPaths) -> Self {
        Self::new(paths.executable.clone(), paths.tessdata.clone())
    }

    fn run_once(&self, image: &DynamicImage, config: &OcrConfig) -> Result<String> {
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("Empty image"));
        }

        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image.save(temp_input.path())?;

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg("stdout");
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        command.arg("-l").arg(&self.language).args(config.args());

        let output = command.output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage, config: &OcrConfig) -> OcrText {
        let mut last_error = String::new();
        for _ in 0..ENGINE_ATTEMPTS {
            match self.run_once(image, config) {
                Ok(text) => return OcrText::ok(text),
                Err(e) => last_error = e.to_string(),
            }
        }
        OcrText::failed(last_error)
    }
}
