use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use tapwatch_traits::{Frame, OcrFailure, OcrHints, Recognizer};

use crate::error::{BackendError, Result};
use crate::preprocess;
use crate::util::{PipeDrain, wait_child_with_timeout};

const POLL: Duration = Duration::from_millis(5);

/// OCR through the `tesseract` command-line tool.
///
/// Each frame is cleaned up, written to a temporary PNG and read back from
/// the tool's stdout. Expects RGBA8 frames, as produced by the screen
/// backend.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: PathBuf,
    /// Page segmentation mode; 7 treats the image as a single text line.
    psm: u8,
    clean: bool,
}

impl TesseractCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            psm: 7,
            clean: true,
        }
    }

    #[must_use]
    pub fn with_psm(mut self, psm: u8) -> Self {
        self.psm = psm;
        self
    }

    /// Skip thresholding and send plain grayscale.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.clean = false;
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// First line of `tesseract --version`, used by self-checks.
    pub fn version(&self, timeout: Duration) -> Result<String> {
        let mut child = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program_name(),
                source,
            })?;
        let stdout = PipeDrain::spawn(child.stdout.take());
        let status = wait_child_with_timeout(&mut child, timeout, POLL)?;
        let out = stdout.finish()?;
        if !status.success() {
            return Err(BackendError::Failed {
                status: status.to_string(),
                stderr: String::new(),
            });
        }
        Ok(out.lines().next().unwrap_or_default().trim().to_string())
    }

    fn run(&self, frame: &Frame, hints: &OcrHints, timeout: Duration) -> Result<String> {
        let png = preprocess::encode_png(frame, self.clean)?;
        let mut file = tempfile::Builder::new()
            .prefix("tapwatch-")
            .suffix(".png")
            .tempfile()?;
        file.write_all(&png)?;
        file.flush()?;

        let mut cmd = Command::new(&self.program);
        cmd.arg(file.path())
            .arg("stdout")
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("-l")
            .arg(&hints.language);
        if !hints.charset.is_empty() {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={}", hints.charset));
        }
        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program_name(),
                source,
            })?;
        let stdout = PipeDrain::spawn(child.stdout.take());
        let stderr = PipeDrain::spawn(child.stderr.take());
        let status = wait_child_with_timeout(&mut child, timeout, POLL)?;
        let stdout = stdout.finish()?;
        let stderr = stderr.finish()?;
        if !status.success() {
            return Err(BackendError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

impl Recognizer for TesseractCli {
    fn recognize(
        &mut self,
        frame: &Frame,
        hints: &OcrHints,
        timeout: Duration,
    ) -> std::result::Result<String, OcrFailure> {
        let text = self.run(frame, hints, timeout).map_err(|e| {
            tracing::debug!(error = %e, "tesseract failed");
            OcrFailure::from(e)
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(OcrFailure::NoTextDetected);
        }
        Ok(text.to_string())
    }
}
