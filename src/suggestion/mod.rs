//! AI-assisted listing suggestions: a photo goes to a generative vision model
//! and comes back as best-guess form fields. The caller always gets a
//! suggestion; any failure along the way degrades to [`VehicleSuggestion::unknown`].

pub mod coerce;
pub mod gemini;
pub mod prompt;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::models::{ListingCondition, VehicleType};
use crate::upload::ImageKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSuggestion {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub estimated_price: Option<f64>,
    pub condition: Option<ListingCondition>,
    pub mileage: Option<i32>,
    pub vehicle_type: Option<VehicleType>,
    pub category: Option<String>,
    pub power: Option<i32>,
    pub displacement: Option<i32>,
    /// Always within `[0, 1]`.
    pub confidence: f64,
}

impl VehicleSuggestion {
    pub fn unknown() -> Self {
        Self {
            brand: None,
            model: None,
            year: None,
            color: None,
            estimated_price: None,
            condition: None,
            mileage: None,
            vehicle_type: None,
            category: None,
            power: None,
            displacement: None,
            confidence: 0.0,
        }
    }
}

#[derive(Debug)]
pub enum VisionError {
    NotConfigured,
    Timeout(Duration),
    Upstream(String),
    Malformed(String),
    Io(std::io::Error),
}

impl std::fmt::Display for VisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisionError::NotConfigured => write!(f, "vision model not configured"),
            VisionError::Timeout(after) => write!(f, "model call timed out after {after:?}"),
            VisionError::Upstream(msg) => write!(f, "model call failed: {msg}"),
            VisionError::Malformed(msg) => write!(f, "malformed model reply: {msg}"),
            VisionError::Io(err) => write!(f, "upload read failed: {err}"),
        }
    }
}

impl From<std::io::Error> for VisionError {
    fn from(err: std::io::Error) -> Self {
        VisionError::Io(err)
    }
}

/// A generative model that answers a text prompt about one image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;
    async fn describe(
        &self,
        prompt: &str,
        image: Bytes,
        mime_type: &'static str,
    ) -> Result<String, VisionError>;
}

/// Stand-in used when no API key is configured; every call falls back.
pub struct UnconfiguredVision;

#[async_trait]
impl VisionModel for UnconfiguredVision {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn describe(
        &self,
        _prompt: &str,
        _image: Bytes,
        _mime_type: &'static str,
    ) -> Result<String, VisionError> {
        Err(VisionError::NotConfigured)
    }
}

#[derive(Clone)]
pub struct Suggester {
    model: Arc<dyn VisionModel>,
    timeout: Duration,
}

impl Suggester {
    pub fn new(model: Arc<dyn VisionModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Suggest listing fields for the image at `path`, then delete `path`.
    pub async fn suggest_file(&self, path: &Path, kind: ImageKind) -> VehicleSuggestion {
        let outcome = self.run(path, kind).await;

        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to remove temp upload {}: {e}", path.display());
        }

        match outcome {
            Ok(suggestion) => {
                tracing::info!(
                    model = self.model.name(),
                    confidence = suggestion.confidence,
                    "Vehicle suggestion produced"
                );
                suggestion
            }
            Err(e) => {
                tracing::warn!(model = self.model.name(), "Suggestion fell back to unknown: {e}");
                VehicleSuggestion::unknown()
            }
        }
    }

    async fn run(&self, path: &Path, kind: ImageKind) -> Result<VehicleSuggestion, VisionError> {
        let image = Bytes::from(tokio::fs::read(path).await?);

        // The model call runs on its own task so a timeout only abandons our
        // wait; the request itself is left to finish in the background.
        let model = Arc::clone(&self.model);
        let call = tokio::spawn(async move {
            model
                .describe(prompt::VEHICLE_PROMPT, image, kind.mime_type())
                .await
        });

        let reply = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => return Err(VisionError::Timeout(self.timeout)),
            Ok(Err(join_err)) => {
                return Err(VisionError::Upstream(format!("model task failed: {join_err}")));
            }
            Ok(Ok(result)) => result?,
        };

        coerce::parse_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    enum Behaviour {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct FakeModel {
        behaviour: Behaviour,
        finished: Arc<AtomicBool>,
    }

    impl FakeModel {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                finished: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl VisionModel for FakeModel {
        fn name(&self) -> &str {
            "fake"
        }

        async fn describe(
            &self,
            prompt: &str,
            image: Bytes,
            mime_type: &'static str,
        ) -> Result<String, VisionError> {
            assert!(prompt.contains("JSON"));
            assert_eq!(&image[..], PNG);
            assert_eq!(mime_type, "image/png");
            let result = match self.behaviour {
                Behaviour::Reply(text) => Ok(text.to_string()),
                Behaviour::Fail => Err(VisionError::Upstream("503".to_string())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(120)).await;
                    Ok(r#"{"brand":"Late"}"#.to_string())
                }
            };
            self.finished.store(true, Ordering::SeqCst);
            result
        }
    }

    fn temp_image(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("upload.png");
        std::fs::write(&path, PNG).unwrap();
        path
    }

    #[tokio::test]
    async fn successful_reply_is_returned_and_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_image(&dir);
        let suggester = Suggester::new(
            Arc::new(FakeModel::new(Behaviour::Reply(
                r#"{"brand":"Honda","model":"CB500F","vehicle_type":"motorcycle","displacement":"471 cc","confidence":0.7}"#,
            ))),
            Duration::from_secs(45),
        );

        let s = suggester.suggest_file(&path, ImageKind::Png).await;
        assert_eq!(s.brand.as_deref(), Some("Honda"));
        assert_eq!(s.vehicle_type, Some(VehicleType::Motorcycle));
        assert_eq!(s.displacement, Some(471));
        assert_eq!(s.confidence, 0.7);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn upstream_error_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_image(&dir);
        let suggester = Suggester::new(
            Arc::new(FakeModel::new(Behaviour::Fail)),
            Duration::from_secs(45),
        );

        assert_eq!(
            suggester.suggest_file(&path, ImageKind::Png).await,
            VehicleSuggestion::unknown()
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn malformed_reply_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_image(&dir);
        let suggester = Suggester::new(
            Arc::new(FakeModel::new(Behaviour::Reply("Sorry, I can't help with that."))),
            Duration::from_secs(45),
        );

        let s = suggester.suggest_file(&path, ImageKind::Png).await;
        assert_eq!(s.confidence, 0.0);
        assert!(s.brand.is_none());
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back_without_cancelling_the_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_image(&dir);
        let model = FakeModel::new(Behaviour::Hang);
        let finished = Arc::clone(&model.finished);
        let suggester = Suggester::new(Arc::new(model), Duration::from_secs(45));

        let s = suggester.suggest_file(&path, ImageKind::Png).await;
        assert_eq!(s, VehicleSuggestion::unknown());
        assert!(!path.exists());
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned call keeps running and completes on its own.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unconfigured_model_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_image(&dir);
        let suggester = Suggester::new(Arc::new(UnconfiguredVision), Duration::from_secs(45));

        let s = suggester.suggest_file(&path, ImageKind::Png).await;
        assert_eq!(s, VehicleSuggestion::unknown());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let suggester = Suggester::new(
            Arc::new(FakeModel::new(Behaviour::Reply(r#"{"brand":"x"}"#))),
            Duration::from_secs(45),
        );
        let s = suggester
            .suggest_file(&dir.path().join("gone.png"), ImageKind::Png)
            .await;
        assert_eq!(s, VehicleSuggestion::unknown());
    }
}
