//! LLM provider probes, folded into a single composite.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::{CompositeProbe, HttpProbe, HttpRequest, Probe};
use crate::config::{AzureOpenAiSettings, GeminiSettings, OpenAiSettings, ProbeSettings};

/// Gemini answers a one-word prompt.
pub fn gemini_probe(settings: &GeminiSettings, timeout: Duration) -> HttpProbe {
    let request = settings.api_key.as_ref().map(|key| {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            settings.base_url.trim_end_matches('/'),
            settings.model
        );
        HttpRequest::post_json(url, json!({ "contents": [{ "parts": [{ "text": "Hello" }] }] }))
            .header("x-goog-api-key", key.as_str())
    });

    HttpProbe::new("Gemini", request, "Gemini API key not configured", timeout)
}

/// Listing models is the cheapest authenticated OpenAI call.
pub fn openai_probe(settings: &OpenAiSettings, timeout: Duration) -> HttpProbe {
    let request = settings.api_key.as_ref().map(|key| {
        HttpRequest::get(format!("{}/v1/models", settings.base_url.trim_end_matches('/')))
            .header("authorization", format!("Bearer {}", key))
    });

    HttpProbe::new("OpenAI", request, "OpenAI API key not configured", timeout)
}

pub fn azure_openai_probe(settings: &AzureOpenAiSettings, timeout: Duration) -> HttpProbe {
    let request = match (&settings.endpoint, &settings.api_key) {
        (Some(endpoint), Some(key)) => Some(
            HttpRequest::get(format!(
                "{}/openai/models?api-version={}",
                endpoint.trim_end_matches('/'),
                settings.api_version
            ))
            .header("api-key", key.as_str()),
        ),
        _ => None,
    };

    HttpProbe::new(
        "Azure OpenAI",
        request,
        "Azure OpenAI credentials not configured",
        timeout,
    )
}

/// All providers as one `llm` entry. Gemini comes first, so its latency is
/// the one reported.
pub fn llm_probe(settings: &ProbeSettings) -> CompositeProbe {
    let members: Vec<Arc<dyn Probe>> = vec![
        Arc::new(gemini_probe(&settings.gemini, settings.timeout)),
        Arc::new(openai_probe(&settings.openai, settings.timeout)),
        Arc::new(azure_openai_probe(&settings.azure_openai, settings.timeout)),
    ];

    CompositeProbe::new(
        "LLM",
        members,
        "All LLM services are healthy",
        "Some LLM services are down",
    )
}
