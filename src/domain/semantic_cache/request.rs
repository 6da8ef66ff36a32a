//! Cacheable model requests and their normalized forms

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::domain::cache::CacheKeyParams;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Double- or single-quoted string literal, honouring backslash escapes
static QUOTED_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).unwrap());

/// Integer or decimal literal standing on its own
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").unwrap());

/// A model request as seen by the cache: prompt, model and named parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRequest {
    pub prompt: String,
    pub model: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl CacheRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds a named parameter such as `temperature` or `max_tokens`
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Canonical text plus the extracted template
    pub fn normalized(&self) -> NormalizedRequest {
        let text = normalize_text(&self.prompt);
        let template = extract_template(&text);

        NormalizedRequest { text, template }
    }

    /// Fixed-length key over normalized text, model and sorted parameters
    pub fn cache_key(&self) -> String {
        let mut params = CacheKeyParams::new(normalize_text(&self.prompt))
            .with_component("model", self.model.clone());

        if !self.params.is_empty() {
            params = params.with_component("params", serde_json::json!(self.params));
        }

        params.derive()
    }
}

/// Derived form of a request; never stored
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub text: String,
    pub template: RequestTemplate,
}

/// A prompt with its literals replaced by positional placeholders
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestTemplate {
    pub template: String,
    pub variables: BTreeMap<String, String>,
}

/// Unifies line endings, collapses whitespace runs and trims
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    WHITESPACE_RUN
        .replace_all(unified.trim(), " ")
        .into_owned()
}

/// Replaces quoted strings with `{str_N}` and numbers with `{num_N}`
pub fn extract_template(text: &str) -> RequestTemplate {
    let mut variables = BTreeMap::new();

    let mut string_index = 0;
    let without_strings = QUOTED_STRING.replace_all(text, |caps: &Captures| {
        let name = format!("str_{}", string_index);
        string_index += 1;
        variables.insert(name.clone(), caps[0].to_string());
        format!("{{{}}}", name)
    });

    let mut number_index = 0;
    let template = NUMBER.replace_all(&without_strings, |caps: &Captures| {
        let name = format!("num_{}", number_index);
        number_index += 1;
        variables.insert(name.clone(), caps[0].to_string());
        format!("{{{}}}", name)
    });

    RequestTemplate {
        template: template.into_owned(),
        variables,
    }
}
