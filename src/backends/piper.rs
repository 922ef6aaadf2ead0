use super::SpeechBackend;
use crate::config_loader::Settings;
use crate::error::{FaceError, FaceResult};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

// Piper loads its model on every call, so it gets more room than espeak.
const SYNTH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct PiperBackend {
    binary_path: String,
    model: PathBuf,
    timeout: Duration,
}

impl PiperBackend {
    pub fn new(settings: &Settings) -> Self {
        Self {
            binary_path: settings.piper_binary.clone(),
            model: PathBuf::from(&settings.piper_model),
            timeout: SYNTH_TIMEOUT,
        }
    }

    fn config_path(&self) -> PathBuf {
        let mut name = self.model.clone().into_os_string();
        name.push(".json");
        PathBuf::from(name)
    }
}

impl SpeechBackend for PiperBackend {
    fn id(&self) -> &'static str {
        "piper"
    }

    fn probe(&self) -> FaceResult<()> {
        if !self.model.exists() || !self.config_path().exists() {
            return Err(FaceError::Tts(format!(
                "Piper model not found: {} (and .json)",
                self.model.display()
            )));
        }

        let status = Command::new(&self.binary_path)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(FaceError::Tts(format!("{} --help failed", self.binary_path)))
        }
    }

    fn synthesize(&self, text: &str) -> FaceResult<Vec<u8>> {
        let mut child = Command::new(&self.binary_path)
            .arg("-m")
            .arg(&self.model)
            .arg("--output_file")
            .arg("-") // Output WAV to stdout
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Write text to stdin and close it
        if let Some(mut stdin) = child.stdin.take() {
            let written = stdin
                .write_all(text.as_bytes())
                .and_then(|_| stdin.write_all(b"\n"));
            if let Err(e) = written {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| FaceError::Tts("piper stdout unavailable".to_string()))?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let audio = reader
                    .join()
                    .map_err(|_| FaceError::Tts("piper reader panicked".to_string()))??;
                if status.success() {
                    Ok(audio)
                } else {
                    let mut err_msg = String::new();
                    if let Some(mut stderr) = child.stderr.take() {
                        let _ = stderr.read_to_string(&mut err_msg);
                    }
                    Err(FaceError::Tts(format!("Piper error: {}", err_msg.trim())))
                }
            }
            None => {
                // The reader is left detached; it ends when the pipe closes.
                let _ = child.kill();
                let _ = child.wait();
                Err(FaceError::Tts(format!(
                    "piper timed out after {}s",
                    self.timeout.as_secs_f32()
                )))
            }
        }
    }
}
