use super::SpeechBackend;
use crate::config_loader::Settings;
use crate::error::{FaceError, FaceResult};

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

const SYNTH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct EspeakBackend {
    binary: String,
    voice: String,
    rate: u32,
}

impl EspeakBackend {
    pub fn new(settings: &Settings) -> Self {
        Self {
            binary: "espeak-ng".to_string(),
            voice: settings.espeak_voice.clone(),
            rate: settings.espeak_rate,
        }
    }

    fn run(&self, args: &[&str]) -> FaceResult<Vec<u8>> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stdout concurrently; a full pipe would stall espeak until the timeout.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| FaceError::Tts("espeak stdout unavailable".to_string()))?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        match child.wait_timeout(SYNTH_TIMEOUT)? {
            Some(status) => {
                let audio = reader
                    .join()
                    .map_err(|_| FaceError::Tts("espeak reader panicked".to_string()))??;
                if status.success() {
                    Ok(audio)
                } else {
                    let mut err_msg = String::new();
                    if let Some(mut stderr) = child.stderr.take() {
                        let _ = stderr.read_to_string(&mut err_msg);
                    }
                    Err(FaceError::Tts(format!("espeak error: {}", err_msg.trim())))
                }
            }
            None => {
                // Timeout occurred, kill the process
                let _ = child.kill();
                let _ = child.wait();
                Err(FaceError::Tts("espeak timed out after 5s".to_string()))
            }
        }
    }
}

impl SpeechBackend for EspeakBackend {
    fn id(&self) -> &'static str {
        "espeak-ng"
    }

    fn probe(&self) -> FaceResult<()> {
        self.run(&["--version"]).map(|_| ())
    }

    fn synthesize(&self, text: &str) -> FaceResult<Vec<u8>> {
        let rate = self.rate.to_string();
        self.run(&["--stdout", "-v", &self.voice, "-s", &rate, text])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_fails_probe() {
        let mut backend = EspeakBackend::new(&Settings::default());
        backend.binary = "espeak-ng-definitely-not-installed".to_string();
        assert!(matches!(backend.probe(), Err(FaceError::Io(_))));
    }
}
