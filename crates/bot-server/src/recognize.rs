use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),
    #[error("photo recognition is not configured")]
    NotConfigured,
}

/// Turns a label photograph into raw text. What the text means is decided
/// by the extraction grammar in `shared::label`, not here.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognizeError>;
}

pub struct OcrHttp {
    client: reqwest::Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct RecognizedText {
    text: String,
}

impl OcrHttp {
    pub fn new(url: &str) -> Result<Self, RecognizeError> {
        let url = Url::parse(url)
            .map_err(|err| RecognizeError::Unavailable(format!("invalid OCR url: {err}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }
}

#[async_trait]
impl Recognizer for OcrHttp {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognizeError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|err| RecognizeError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(RecognizeError::Unavailable(format!(
                "OCR service answered {}",
                response.status()
            )));
        }

        let recognized: RecognizedText = response
            .json()
            .await
            .map_err(|err| RecognizeError::Unavailable(err.to_string()))?;
        Ok(recognized.text)
    }
}

/// Stand-in when no OCR service is configured; the wizard falls back to
/// manual entry.
pub struct RecognitionDisabled;

#[async_trait]
impl Recognizer for RecognitionDisabled {
    async fn recognize(&self, _image: &[u8]) -> Result<String, RecognizeError> {
        Err(RecognizeError::NotConfigured)
    }
}
