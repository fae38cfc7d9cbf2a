//! LLM tool-calling agent
//!
//! The agent is consulted only when neither explicit parameters nor the
//! intent parser produced a target. It sees the prompt and the dataset's
//! column names and may call a single tool, `train_tabular_model`, which the
//! service binds to the uploaded dataset.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::AgentSettings;
use crate::error::{AutomlError, Result};

/// Name of the training tool as advertised to the model
pub const TRAIN_TOOL_NAME: &str = "train_tabular_model";

/// Tool-call rounds before the agent gives up and returns what it has
pub const MAX_TOOL_ROUNDS: usize = 3;

const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in machine learning. \
Your task is to help users train machine learning models on tabular data. \
When the user provides a dataset and a description of what they want to predict, \
use the train_tabular_model tool to train a model. \
Always ask clarifying questions if the target column is not clear.";

/// Arguments the model passes to the training tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainToolArgs {
    pub target: String,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub metric: Option<String>,
}

/// The training entry point as the agent sees it
#[async_trait]
pub trait TrainingTool: Send + Sync {
    /// Run one training; failures come back as `{"error", "kind"}` JSON.
    async fn call(&self, args: TrainToolArgs) -> Value;
}

/// Final agent answer plus the output of the first training tool call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    pub response: String,
    pub tool_output: Option<Value>,
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer `prompt` about a dataset with the given columns, calling
    /// `tool` when the model decides to train.
    async fn chat(&self, prompt: &str, columns: &[String], tool: &dyn TrainingTool) -> Result<AgentReply>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    /// JSON-encoded arguments
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

fn train_tool_schema() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": TRAIN_TOOL_NAME,
            "description": "Train a machine learning model on the uploaded tabular dataset",
            "parameters": {
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "Name of the column to predict"
                    },
                    "task_type": {
                        "type": "string",
                        "enum": ["classification", "regression"],
                        "description": "Prediction mode; inferred from the target when omitted"
                    },
                    "metric": {
                        "type": "string",
                        "description": "Metric to optimize, e.g. Accuracy, F1, R2, RMSE"
                    }
                },
                "required": ["target"]
            }
        }
    })
}

/// Agent backed by an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiAgent {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiAgent {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from settings; `None` when no API key is configured.
    pub fn from_settings(settings: &AgentSettings) -> Option<Self> {
        let key = settings.api_key.as_ref()?;
        Some(Self::new(key.clone(), settings.model.clone()).with_base_url(settings.base_url.clone()))
    }

    async fn complete(&self, messages: &[Value]) -> Result<AssistantMessage> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "tools": [train_tool_schema()],
            "tool_choice": "auto",
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AutomlError::Agent(format!("chat completion request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AutomlError::Agent(format!("failed to read chat completion: {}", e)))?;
        if !status.is_success() {
            return Err(AutomlError::Agent(format!(
                "chat completion returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| AutomlError::Agent(format!("failed to parse chat completion: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| AutomlError::Agent("chat completion had no choices".to_string()))
    }

    async fn run_tool(call: &FunctionCall, tool: &dyn TrainingTool) -> Value {
        if call.name != TRAIN_TOOL_NAME {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return json!({ "error": format!("Unknown tool: {}", call.name) });
        }
        match serde_json::from_str::<TrainToolArgs>(&call.arguments) {
            Ok(args) => {
                info!(target_column = %args.target, task = ?args.task_type, "Agent invoked training tool");
                tool.call(args).await
            }
            Err(e) => json!({ "error": format!("Invalid arguments for {}: {}", TRAIN_TOOL_NAME, e) }),
        }
    }
}

#[async_trait]
impl Agent for OpenAiAgent {
    async fn chat(&self, prompt: &str, columns: &[String], tool: &dyn TrainingTool) -> Result<AgentReply> {
        let mut messages = vec![
            json!({ "role": "system", "content": SYSTEM_PROMPT }),
            json!({
                "role": "user",
                "content": format!("{}\n\nDataset columns: {}", prompt, columns.join(", ")),
            }),
        ];
        let mut reply = AgentReply::default();

        for round in 0..MAX_TOOL_ROUNDS {
            let message = self.complete(&messages).await?;
            debug!(round, tool_calls = message.tool_calls.len(), "Agent turn");

            reply.response = message.content.clone().unwrap_or_default();
            if message.tool_calls.is_empty() {
                return Ok(reply);
            }

            messages.push(json!({
                "role": "assistant",
                "content": &message.content,
                "tool_calls": &message.tool_calls,
            }));
            for call in &message.tool_calls {
                let output = Self::run_tool(&call.function, tool).await;
                if reply.tool_output.is_none() && call.function.name == TRAIN_TOOL_NAME {
                    reply.tool_output = Some(output.clone());
                }
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": output.to_string(),
                }));
            }
        }

        warn!(rounds = MAX_TOOL_ROUNDS, "Agent stopped after the maximum number of tool rounds");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_args_optional_fields() {
        let args: TrainToolArgs = serde_json::from_str(r#"{"target": "price"}"#).unwrap();
        assert_eq!(args.target, "price");
        assert_eq!(args.task_type, None);
        assert_eq!(args.metric, None);
    }

    #[test]
    fn test_tool_call_parsing() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "train_tabular_model", "arguments": "{\"target\":\"churn\"}"}
                    }]
                }
            }]
        });
        let parsed: ChatResponse = serde_json::from_value(raw).unwrap();
        let message = &parsed.choices[0].message;
        assert_eq!(message.content, None);
        assert_eq!(message.tool_calls[0].function.name, TRAIN_TOOL_NAME);
    }

    #[test]
    fn test_from_settings_requires_key() {
        let settings = AgentSettings {
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            base_url: "http://localhost:1".to_string(),
        };
        assert!(OpenAiAgent::from_settings(&settings).is_none());

        let agent = OpenAiAgent::from_settings(&AgentSettings {
            api_key: Some("sk-test".to_string()),
            ..settings
        })
        .unwrap();
        assert_eq!(agent.base_url, "http://localhost:1");
    }

    #[test]
    fn test_schema_names_the_tool() {
        let schema = train_tool_schema();
        assert_eq!(schema["function"]["name"], TRAIN_TOOL_NAME);
        assert_eq!(schema["function"]["parameters"]["required"][0], "target");
    }
}
