//! Out-of-process encoder speaking line-delimited JSON over stdin/stdout.
//!
//! The configured command is spawned once and kept alive. Each batch is one
//! request line:
//!
//! ```text
//! {"inputs":[{"type":"text","value":"red car"},{"type":"image","value":"/img/1.jpg"}]}
//! ```
//!
//! answered by one response line, either `{"embeddings":[[...],[...]]}` or
//! `{"error":"..."}`. Any CLIP-style model can be wrapped this way.

use crate::embed::encoder::{EncodeInput, Encoder};
use crate::error::{Result, VoximError};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

#[derive(Debug, Serialize)]
struct EncodeRequest<'a> {
    inputs: Vec<WireInput<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum WireInput<'a> {
    Text(&'a str),
    Image(&'a Path),
}

impl<'a> From<&'a EncodeInput> for WireInput<'a> {
    fn from(input: &'a EncodeInput) -> Self {
        match input {
            EncodeInput::Text(text) => WireInput::Text(text),
            EncodeInput::Image(path) => WireInput::Image(path),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EncodeResponse {
    Embeddings { embeddings: Vec<Vec<f32>> },
    Error { error: String },
}

struct EncoderProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Encoder backed by a long-running child process.
pub struct CommandEncoder {
    program: String,
    model: String,
    process: Mutex<EncoderProcess>,
}

impl CommandEncoder {
    /// Spawn `command[0]` with the remaining elements as arguments.
    ///
    /// # Errors
    /// - `EncoderNotFound` if the command is empty or the program does not exist
    /// - `Encoder` for any other spawn failure
    pub fn spawn(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| VoximError::EncoderNotFound {
            command: String::new(),
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VoximError::EncoderNotFound {
                        command: program.clone(),
                    }
                } else {
                    VoximError::Encoder {
                        message: format!("Failed to start {}: {}", program, e),
                    }
                }
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(VoximError::Encoder {
                message: format!("{} started without piped stdio", program),
            });
        };

        let model = Path::new(program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.clone());

        Ok(Self {
            program: program.clone(),
            model,
            process: Mutex::new(EncoderProcess {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }

    /// Record a different model name in built indexes.
    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model = name.to_string();
        self
    }

    fn failure(&self, message: impl std::fmt::Display) -> VoximError {
        VoximError::Encoder {
            message: format!("{}: {}", self.program, message),
        }
    }

    fn round_trip(&self, process: &mut EncoderProcess, request: &str) -> Result<String> {
        writeln!(process.stdin, "{request}").map_err(|e| self.failure(e))?;
        process.stdin.flush().map_err(|e| self.failure(e))?;

        let mut line = String::new();
        let read = process
            .stdout
            .read_line(&mut line)
            .map_err(|e| self.failure(e))?;
        if read == 0 {
            return Err(self.failure("encoder process exited"));
        }
        Ok(line)
    }
}

impl Encoder for CommandEncoder {
    fn encode_batch(&self, inputs: &[EncodeInput]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = serde_json::to_string(&EncodeRequest {
            inputs: inputs.iter().map(WireInput::from).collect(),
        })?;

        let mut process = self
            .process
            .lock()
            .map_err(|_| self.failure("encoder lock poisoned"))?;
        let line = self.round_trip(&mut process, &request)?;
        drop(process);

        let response: EncodeResponse = serde_json::from_str(line.trim())
            .map_err(|e| self.failure(format!("malformed response: {e}")))?;

        match response {
            EncodeResponse::Error { error } => Err(self.failure(error)),
            EncodeResponse::Embeddings { embeddings } if embeddings.len() != inputs.len() => {
                Err(self.failure(format!(
                    "returned {} embeddings for {} inputs",
                    embeddings.len(),
                    inputs.len()
                )))
            }
            EncodeResponse::Embeddings { embeddings } => Ok(embeddings),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

impl Drop for CommandEncoder {
    fn drop(&mut self) {
        if let Ok(process) = self.process.get_mut() {
            if let Err(e) = process.child.kill()
                && e.kind() != std::io::ErrorKind::InvalidInput
            {
                eprintln!("voxim: failed to stop encoder {}: {e}", self.program);
            }
            if let Err(e) = process.child.wait() {
                eprintln!("voxim: failed to reap encoder {}: {e}", self.program);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_request_wire_format() {
        let inputs = [EncodeInput::text("red car"), EncodeInput::image("/img/1.jpg")];
        let request = EncodeRequest {
            inputs: inputs.iter().map(WireInput::from).collect(),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"inputs":[{"type":"text","value":"red car"},{"type":"image","value":"/img/1.jpg"}]}"#
        );
    }

    #[test]
    fn test_response_variants_parse() {
        let ok: EncodeResponse = serde_json::from_str(r#"{"embeddings":[[1.0,2.0]]}"#).unwrap();
        assert!(matches!(ok, EncodeResponse::Embeddings { embeddings } if embeddings.len() == 1));

        let err: EncodeResponse = serde_json::from_str(r#"{"error":"no gpu"}"#).unwrap();
        assert!(matches!(err, EncodeResponse::Error { error } if error == "no gpu"));
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let result = CommandEncoder::spawn(&["voxim-no-such-encoder-7f3a".to_string()]);
        assert!(matches!(
            result,
            Err(VoximError::EncoderNotFound { command }) if command == "voxim-no-such-encoder-7f3a"
        ));
    }

    #[test]
    fn test_empty_command_is_not_found() {
        assert!(matches!(
            CommandEncoder::spawn(&[]),
            Err(VoximError::EncoderNotFound { .. })
        ));
    }

    #[test]
    fn test_round_trips_with_persistent_process() {
        let encoder = CommandEncoder::spawn(&shell(
            r#"while read line; do echo '{"embeddings":[[0.6,0.8]]}'; done"#,
        ))
        .unwrap();

        assert_eq!(encoder.model_name(), "sh");
        for _ in 0..3 {
            let vectors = encoder.encode_batch(&[EncodeInput::text("dog")]).unwrap();
            assert_eq!(vectors, vec![vec![0.6, 0.8]]);
        }
    }

    #[test]
    fn test_count_mismatch_is_encoder_error() {
        let encoder = CommandEncoder::spawn(&shell(
            r#"while read line; do echo '{"embeddings":[[1.0]]}'; done"#,
        ))
        .unwrap();

        let err = encoder
            .encode_batch(&[EncodeInput::text("a"), EncodeInput::text("b")])
            .unwrap_err();
        assert!(err.to_string().contains("returned 1 embeddings for 2 inputs"));
    }

    #[test]
    fn test_error_response_is_encoder_error() {
        let encoder = CommandEncoder::spawn(&shell(
            r#"while read line; do echo '{"error":"model not loaded"}'; done"#,
        ))
        .unwrap()
        .with_model_name("clip-vit-b32");

        assert_eq!(encoder.model_name(), "clip-vit-b32");
        let err = encoder.encode_batch(&[EncodeInput::text("a")]).unwrap_err();
        assert!(matches!(err, VoximError::Encoder { .. }));
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn test_exited_process_is_encoder_error() {
        let encoder = CommandEncoder::spawn(&shell("exit 0")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        let err = encoder.encode_batch(&[EncodeInput::text("a")]).unwrap_err();
        assert!(matches!(err, VoximError::Encoder { .. }));
    }

    #[test]
    fn test_empty_batch_skips_process() {
        let encoder = CommandEncoder::spawn(&shell("exit 0")).unwrap();
        assert!(encoder.encode_batch(&[]).unwrap().is_empty());
    }
}
