use anyhow::{Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::log;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];
#[cfg(not(windows))]
const COMMON_EXECUTABLES: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

#[cfg(windows)]
const COMMON_TESSDATA: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const COMMON_TESSDATA: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

#[derive(Clone, Debug)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets tesseract use its compiled-in data directory
    pub tessdata: Option<PathBuf>,
}

/// Returns the directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coca-timer")
        .join("tesseract")
}

/// Locates Tesseract and makes sure English trained data is available,
/// downloading it into the local directory if necessary.
///
/// Fails only when the executable is missing. Trained data that cannot be
/// found or downloaded leaves tesseract on its own data directory.
pub fn ensure_tesseract() -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;
    log(&format!("Tesseract found at: {}", executable.display()));
    Ok(with_tessdata(executable, ensure_tessdata()))
}

/// Finds eng.traineddata, downloading it into the local directory if missing.
pub fn ensure_tessdata() -> Result<PathBuf> {
    if let Some(dir) = find_tessdata_dir() {
        return Ok(dir);
    }
    log("eng.traineddata not found, downloading...");
    let local = get_tesseract_dir().join("tessdata");
    fs::create_dir_all(&local)?;
    download_tessdata(&local)?;
    Ok(local)
}

fn with_tessdata(executable: PathBuf, tessdata: Result<PathBuf>) -> TesseractPaths {
    let tessdata = match tessdata {
        Ok(dir) => {
            log(&format!("Using tessdata at: {}", dir.display()));
            Some(dir)
        }
        Err(e) => {
            log(&format!("Warning: tessdata unavailable, using tesseract defaults: {}", e));
            None
        }
    };
    TesseractPaths {
        executable,
        tessdata,
    }
}

/// Finds the Tesseract executable: local dir, `TESSERACT_CMD`, PATH, then
/// common install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(cmd) = std::env::var("TESSERACT_CMD") {
        let p = PathBuf::from(cmd);
        if p.exists() {
            return Ok(p);
        }
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in COMMON_EXECUTABLES {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory containing eng.traineddata.
pub fn find_tessdata_dir() -> Option<PathBuf> {
    let local_tessdata = get_tesseract_dir().join("tessdata");
    if has_english(&local_tessdata) {
        return Some(local_tessdata);
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_english(&p) {
            return Some(p);
        }
        let p = p.join("tessdata");
        if has_english(&p) {
            return Some(p);
        }
    }

    COMMON_TESSDATA
        .iter()
        .map(PathBuf::from)
        .find(|p| has_english(p))
}

fn has_english(dir: &Path) -> bool {
    dir.join("eng.traineddata").exists()
}

/// Downloads English trained data
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/eng.traineddata", TESSDATA_REPO);
    let eng_path = tessdata_dir.join("eng.traineddata");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "coca-timer")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download eng.traineddata: HTTP {}",
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)?;
    file.write_all(&bytes)?;

    log(&format!("Downloaded eng.traineddata ({} bytes)", bytes.len()));

    Ok(())
}
