//! External audio transform wrapper
//!
//! Runs ffmpeg with a fixed filter chain: dynamic-range compression
//! (threshold -20dB, ratio 4:1, 5ms attack / 50ms release) followed by
//! loudness normalization to -14 LUFS integrated, true peak -1.5dB,
//! loudness range 11, re-encoded to 128kbps stereo MP3.

use std::path::Path;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::PipelineError;
use crate::pipeline::Normalize;

const FILTER_CHAIN: &str =
    "acompressor=threshold=-20dB:ratio=4:attack=5:release=50,loudnorm=I=-14:TP=-1.5:LRA=11";

/// How much stderr to surface when the transform fails
const STDERR_TAIL_CHARS: usize = 600;

pub struct AudioNormalizer {
    binary: String,
}

impl AudioNormalizer {
    /// Create a normalizer invoking `binary` (a path or a name on PATH)
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<(), PipelineError> {
        debug!(
            input = %input.display(),
            output = %output.display(),
            "Running audio transform"
        );

        let result = Command::new(&self.binary)
            .arg("-i")
            .arg(input)
            .arg("-af")
            .arg(FILTER_CHAIN)
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg("128k")
            .arg("-ac")
            .arg("2")
            .arg("-y")
            .arg(output)
            .output()
            .await;

        let output_data = match result {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!("Audio transform binary not found: {}", self.binary);
                return Err(PipelineError::Transform(format!(
                    "transform tool not found: {}",
                    self.binary
                )));
            }
            Err(e) => {
                return Err(PipelineError::Transform(format!(
                    "failed to launch {}: {}",
                    self.binary, e
                )));
            }
        };

        if !output_data.status.success() {
            let stderr = String::from_utf8_lossy(&output_data.stderr);
            let tail: String = stderr
                .chars()
                .rev()
                .take(STDERR_TAIL_CHARS)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            error!(status = %output_data.status, "Audio transform failed");
            return Err(PipelineError::Transform(format!(
                "{} exited with {}: {}",
                self.binary,
                output_data.status,
                tail.trim()
            )));
        }

        Ok(())
    }
}

impl Normalize for AudioNormalizer {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), PipelineError> {
        self.run(input, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn missing_binary_is_a_transform_error() {
        let normalizer = AudioNormalizer::new("podpipe-nonexistent-transform");
        let err = normalizer
            .run(&PathBuf::from("in.wav"), &PathBuf::from("out.mp3"))
            .await
            .unwrap_err();
        match err {
            PipelineError::Transform(msg) => assert!(msg.contains("not found")),
            other => panic!("expected Transform error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_transform_error() {
        // `false` accepts any arguments and exits 1
        let normalizer = AudioNormalizer::new("false");
        let err = normalizer
            .run(&PathBuf::from("in.wav"), &PathBuf::from("out.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transform(_)));
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        // `true` ignores the argument contract and exits 0
        let normalizer = AudioNormalizer::new("true");
        normalizer
            .run(&PathBuf::from("in.wav"), &PathBuf::from("out.mp3"))
            .await
            .unwrap();
    }
}
