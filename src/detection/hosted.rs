// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 托管推理接口
//!
//! `POST <api_url>/<project>/<version>?api_key=..&confidence=..&overlap=..`
//! 请求体为 base64 编码的 JPEG, 响应为 `{"predictions": [...]}`.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::prelude::*;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;

use super::{Detection, Detector};
use crate::config::ModelArgs;

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Detection>,
}

pub struct HostedModel {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    confidence: f32,
    overlap: f32,
    max_det: usize,
}

impl HostedModel {
    pub fn new(args: &ModelArgs) -> Result<Self> {
        let api_key = args
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .context("missing API key: pass --api-key or set ROBOFLOW_API_KEY")?;

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(args.timeout_secs))
            .build();

        Ok(Self {
            agent,
            endpoint: endpoint(&args.api_url, &args.project, args.model_version),
            api_key,
            confidence: args.conf,
            overlap: args.overlap,
            max_det: args.max_det(),
        })
    }
}

fn endpoint(api_url: &str, project: &str, version: u32) -> String {
    format!("{}/{}/{}", api_url.trim_end_matches('/'), project, version)
}

/// 图片 → base64 JPEG
pub fn encode_image(image: &DynamicImage) -> Result<String> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .context("failed to encode image as JPEG")?;
    Ok(BASE64_STANDARD.encode(buf))
}

impl Detector for HostedModel {
    fn predict(&mut self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let body = encode_image(image)?;

        let response: PredictResponse = self
            .agent
            .post(&self.endpoint)
            .query("api_key", &self.api_key)
            .query("confidence", &self.confidence.to_string())
            .query("overlap", &self.overlap.to_string())
            .query("max_detections", &self.max_det.to_string())
            .query("format", "json")
            .set("Content-Type", "application/x-www-form-urlencoded")
            .send_string(&body)
            .with_context(|| format!("prediction request to {} failed", self.endpoint))?
            .into_json()
            .context("failed to decode prediction response")?;

        let mut predictions = response.predictions;
        predictions.truncate(self.max_det);
        tracing::debug!(count = predictions.len(), "hosted predictions");
        Ok(predictions)
    }

    fn summary(&self) -> String {
        format!(
            "hosted {} (conf {}%, overlap {}%, max_det {})",
            self.endpoint, self.confidence, self.overlap, self.max_det
        )
    }
}
