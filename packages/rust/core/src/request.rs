//! Prompt template and chat request construction.
//!
//! Everything here is deterministic: the same [`RequestConfig`] always yields
//! the same [`ChatRequest`].

use harvest_gateway::{ChatRequest, Message};
use harvest_shared::{AppConfig, SchemaVersion};

/// Inputs to [`build_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    /// Model identifier.
    pub model: String,
    /// `max_tokens` for the completion.
    pub max_output_tokens: u32,
    /// Country or region to list sites for; `None` asks without restriction.
    pub subject: Option<String>,
    /// Schema the model is asked to follow.
    pub schema: SchemaVersion,
}

impl RequestConfig {
    /// Take model settings and schema from the app config.
    pub fn from_app_config(config: &AppConfig, subject: Option<String>) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_output_tokens: config.llm.max_output_tokens,
            subject,
            schema: config.defaults.schema,
        }
    }
}

/// Build the chat request for one run.
pub fn build_request(config: &RequestConfig) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: vec![Message::user(prompt_text(
            config.subject.as_deref(),
            config.schema,
        ))],
        max_tokens: config.max_output_tokens,
    }
}

/// Render the instruction prompt.
pub fn prompt_text(subject: Option<&str>, schema: SchemaVersion) -> String {
    let scope = match subject.map(str::trim).filter(|s| !s.is_empty()) {
        Some(subject) => format!("the UNESCO World Heritage Sites in {subject}"),
        None => "UNESCO World Heritage Sites".to_string(),
    };

    let (shape, example) = match schema {
        SchemaVersion::V1 => (SHAPE_V1, EXAMPLE_V1),
        SchemaVersion::V2 => (SHAPE_V2, EXAMPLE_V2),
    };

    format!(
        "List {scope} as JSON only, in the following format.\n\
         Do not include any other text; return only the JSON array.\n\
         {shape}\n\
         Example:\n\
         {example}"
    )
}

const SHAPE_V1: &str = r#"[
  {
    "name": "site name",
    "registered_year": year of inscription (integer),
    "description": "short description"
  },
  ...
]"#;

const SHAPE_V2: &str = r#"[
  {
    "name": "site name",
    "registered_year": year of inscription (integer),
    "type": "natural" | "cultural" | "mixed",
    "description": "short description"
  },
  ...
]"#;

const EXAMPLE_V1: &str = r#"[
  {
    "name": "Yakushima",
    "registered_year": 1993,
    "description": "Yakushima is a subtropical island in Kagoshima Prefecture, known for its ancient cedar forests and unique ecosystem."
  },
  {
    "name": "Shirakami-Sanchi",
    "registered_year": 1993,
    "description": "Shirakami-Sanchi is a mountain range spanning Aomori and Akita Prefectures, covered by virgin beech forest."
  }
]"#;

const EXAMPLE_V2: &str = r#"[
  {
    "name": "Yakushima",
    "registered_year": 1993,
    "type": "natural",
    "description": "Yakushima is a subtropical island in Kagoshima Prefecture, known for its ancient cedar forests and unique ecosystem."
  },
  {
    "name": "Himeji-jo",
    "registered_year": 1993,
    "type": "cultural",
    "description": "Himeji-jo is a hilltop castle complex in Hyogo Prefecture and the finest surviving example of early 17th-century Japanese castle architecture."
  }
]"#;
