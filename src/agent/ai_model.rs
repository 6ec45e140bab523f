use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    agent::{
        agent_model::{
            Action, ActionCandidate, DEFAULT_WAIT_MS, LOOSE_CONFIDENCE, Provenance,
            STRUCTURED_CONFIDENCE, Strategy, StrategyContext,
        },
        error::{AgentResult, ServiceFault},
        prompt::build_prompt,
        reply_parser::{ParsedReply, ReplyAction, parse_reply},
    },
    screen::screen_model::{ImageRef, Resolution},
};

/// Contract for the external vision-reasoning service.
pub trait InferenceService {
    /// Ask about one screenshot. `frame` is the resolution the image should
    /// be presented at; coordinates in the reply refer to it.
    fn infer(
        &self,
        prompt: &str,
        image: &ImageRef,
        frame: Resolution,
        timeout: Duration,
    ) -> Result<String, ServiceFault>;
}

// ============================================================================
// Inference strategy
// ============================================================================

/// Primary strategy: ask the reasoning service and parse its reply.
pub struct InferenceStrategy {
    service: Box<dyn InferenceService>,
    timeout: Duration,
    reference_max_dimension: u32,
}

impl InferenceStrategy {
    pub fn new(service: Box<dyn InferenceService>, timeout: Duration, reference_max_dimension: u32) -> Self {
        Self {
            service,
            timeout,
            reference_max_dimension,
        }
    }
}

/// Turn a parsed reply into a candidate in the reference frame.
pub fn candidate_from_reply(parsed: ParsedReply, frame: Resolution) -> Option<ActionCandidate> {
    let (reply, confidence) = match parsed {
        ParsedReply::Structured(reply) => (reply, STRUCTURED_CONFIDENCE),
        ParsedReply::LooseMatch(reply) => (reply, LOOSE_CONFIDENCE),
        ParsedReply::Unparseable => return None,
    };

    let candidate = match reply {
        ReplyAction::Act { action, note } => {
            let mut c = ActionCandidate::new(action, Provenance::Inference);
            c.label = note;
            c
        }
        ReplyAction::Complete { summary } => {
            let mut c = ActionCandidate::new(
                Action::Wait {
                    millis: DEFAULT_WAIT_MS,
                },
                Provenance::Inference,
            )
            .with_label(format!("TASK_COMPLETE: {}", summary));
            c.completes_task = Some(summary);
            c
        }
    };

    Some(
        candidate
            .with_confidence(confidence)
            .in_reference_frame(frame),
    )
}

impl Strategy for InferenceStrategy {
    fn provenance(&self) -> Provenance {
        Provenance::Inference
    }

    fn propose(&mut self, ctx: &StrategyContext<'_>) -> AgentResult<Option<ActionCandidate>> {
        let frame = ctx.snapshot.resolution.fit_within(self.reference_max_dimension);
        let prompt = build_prompt(ctx, frame);

        let reply = match self.service.infer(&prompt, &ctx.snapshot.image, frame, self.timeout) {
            Ok(reply) => reply,
            Err(e) if e.is_local() => {
                // the remote service was never reached; not a service fault
                warn!(err = %e, "screenshot unusable, skipping inference this step");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let parsed = parse_reply(&reply, frame);
        if parsed == ParsedReply::Unparseable {
            debug!(reply = %reply.chars().take(200).collect::<String>(), "unparseable inference reply");
        }

        Ok(candidate_from_reply(parsed, frame))
    }
}

// ============================================================================
// Chat-completions backend
// ============================================================================

pub const DEFAULT_ENDPOINT: &str = "https://router.huggingface.co/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-VL-32B-Instruct";
const JPEG_QUALITY: u8 = 85;

/// OpenAI-compatible `/chat/completions` client with image input.
pub struct ChatCompletionsBackend {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    api_token: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsBackend {
    pub fn new(endpoint: &str, model: &str, api_token: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            temperature: 0.2,
            max_tokens: 300,
            api_token: api_token.to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn request_body<'a>(&'a self, prompt: &'a str, data_url: String) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Downscale the screenshot to `frame` and encode it as a JPEG data URL.
pub fn encode_image(image: &ImageRef, frame: Resolution) -> Result<String, ServiceFault> {
    let bytes = match (&image.bytes, &image.path) {
        (b, _) if !b.is_empty() => b.clone(),
        (_, Some(path)) => std::fs::read(path).map_err(|e| ServiceFault::Image(e.to_string()))?,
        _ => return Err(ServiceFault::Image("snapshot has no image".into())),
    };

    let decoded = image::load_from_memory(&bytes).map_err(|e| ServiceFault::Image(e.to_string()))?;
    let rgb = decoded.thumbnail(frame.width, frame.height).to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ServiceFault::Image(e.to_string()))?;

    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)))
}

impl InferenceService for ChatCompletionsBackend {
    fn infer(
        &self,
        prompt: &str,
        image: &ImageRef,
        frame: Resolution,
        timeout: Duration,
    ) -> Result<String, ServiceFault> {
        let data_url = encode_image(image, frame)?;
        let request = self.request_body(prompt, data_url);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .timeout(timeout)
            .json(&request)
            .send()
            .map_err(|e| match ServiceFault::from(e) {
                ServiceFault::Timeout(_) => ServiceFault::Timeout(timeout),
                other => other,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "inference service error");
            return Err(ServiceFault::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ServiceFault::EmptyReply)
    }
}
