//! Request routing
//!
//! Turns an upload plus either explicit parameters or a prompt into one
//! training call. Explicit parameters go straight to the orchestrator; a
//! prompt goes through the intent parser first, and only when that finds no
//! target is the agent consulted.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::agent::{Agent, OpenAiAgent, TrainToolArgs, TrainingTool};
use crate::automl::NativeAutoMl;
use crate::config::AppConfig;
use crate::dataset::{validate_dataset, Dataset, DatasetLoader};
use crate::error::{AutomlError, Result};
use crate::intent::{IntentParser, KeywordIntentParser};
use crate::normalize::{normalize, RawTrainingOutput, TrainingResponse};
use crate::orchestrator::{TrainingOrchestrator, TrainingRequest};
use crate::registry::{ModelEntry, ModelRegistry, PredictionOutcome};
use crate::task::infer_by_distinct_ratio;

/// One training request as received from a caller
#[derive(Debug, Clone, Default)]
pub struct TrainCommand {
    pub prompt: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub target_column: Option<String>,
    pub task_type: Option<String>,
    pub metric: Option<String>,
}

/// Run blocking work off the async runtime. A panic surfaces as a
/// training failure.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AutomlError::TrainingFailure(format!("Training task aborted: {}", e)))?
}

/// The orchestrator exposed as the agent's tool, bound to one dataset
struct BoundTrainingTool {
    orchestrator: TrainingOrchestrator,
    dataset: Arc<Dataset>,
}

#[async_trait]
impl TrainingTool for BoundTrainingTool {
    async fn call(&self, args: TrainToolArgs) -> Value {
        let orchestrator = self.orchestrator.clone();
        let dataset = Arc::clone(&self.dataset);
        let request = TrainingRequest::new(args.target)
            .with_task_type(args.task_type)
            .with_metric(args.metric);

        let outcome = blocking(move || orchestrator.train(&dataset, &request)).await;
        match outcome {
            Ok(summary) => serde_json::to_value(RawTrainingOutput::from(summary))
                .unwrap_or_else(|e| AutomlError::from(e).to_json()),
            Err(e) => e.to_json(),
        }
    }
}

/// Training, prediction and listing behind one handle
#[derive(Clone)]
pub struct AutoMlService {
    loader: DatasetLoader,
    orchestrator: TrainingOrchestrator,
    intent: Arc<dyn IntentParser>,
    agent: Option<Arc<dyn Agent>>,
}

impl AutoMlService {
    pub fn new(loader: DatasetLoader, orchestrator: TrainingOrchestrator) -> Self {
        Self {
            loader,
            orchestrator,
            intent: Arc::new(KeywordIntentParser::new()),
            agent: None,
        }
    }

    /// Wire the native backend, registry and (if a key is set) the agent.
    pub fn from_config(config: &AppConfig) -> Self {
        let automl = Arc::new(NativeAutoMl::new(config.automl.clone()));
        let registry = ModelRegistry::new(&config.models_dir, automl.clone());
        let orchestrator = TrainingOrchestrator::new(automl, registry, config.automl.random_seed);

        let service = Self::new(DatasetLoader::new(&config.uploads_dir), orchestrator);
        match OpenAiAgent::from_settings(&config.agent) {
            Some(agent) => service.with_agent(Arc::new(agent)),
            None => {
                warn!("OPENAI_API_KEY not set; prompts without a recognizable target will be rejected");
                service
            }
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_intent_parser(mut self, parser: Arc<dyn IntentParser>) -> Self {
        self.intent = parser;
        self
    }

    pub fn has_agent(&self) -> bool {
        self.agent.is_some()
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.orchestrator.registry()
    }

    pub async fn train(&self, command: TrainCommand) -> Result<TrainingResponse> {
        let TrainCommand {
            prompt,
            file_name,
            bytes,
            target_column,
            task_type,
            metric,
        } = command;

        let loader = self.loader.clone();
        let explicit = target_column.clone();
        let dataset = blocking(move || {
            let path = loader.save_upload(&file_name, &bytes)?;
            let loaded = loader.ingest(&path)?;
            validate_dataset(&loaded.dataset, explicit.as_deref())?;
            Ok(loaded.dataset)
        })
        .await?;
        let dataset = Arc::new(dataset);

        if let Some(target) = target_column {
            let task_type = match task_type {
                Some(task) => Some(task),
                None => {
                    let inferred = infer_by_distinct_ratio(&dataset, &target)?;
                    info!(target_column = %target, task = %inferred, "Inferred task type");
                    Some(inferred.to_string())
                }
            };
            info!(target_column = %target, "Training with explicit target column");
            let request = TrainingRequest::new(target)
                .with_task_type(task_type)
                .with_metric(metric);
            return self.run(dataset, request).await;
        }

        let intent = self.intent.extract(&prompt);
        if let Some(target) = intent.target {
            info!(target_column = %target, task = ?intent.task_type, "Training with target extracted from prompt");
            let request = TrainingRequest::new(target.clone())
                .with_task_type(intent.task_type.map(|t| t.to_string()))
                .with_metric(metric);
            let response = self.run(dataset, request).await?;
            let message = format!("Trained a model to predict {} using {}", target, response.model_name);
            return Ok(response.with_message(message));
        }

        let agent = self.agent.as_ref().ok_or_else(|| {
            AutomlError::Validation(
                "Could not determine the target column from the prompt. Please provide target_column."
                    .to_string(),
            )
        })?;

        info!(prompt = %prompt, "Delegating prompt to agent");
        let tool = BoundTrainingTool {
            orchestrator: self.orchestrator.clone(),
            dataset: Arc::clone(&dataset),
        };
        let reply = agent.chat(&prompt, &dataset.column_names(), &tool).await?;

        let response = match reply.tool_output {
            Some(output) => RawTrainingOutput::from_value(&output).into_result()?,
            None => normalize(RawTrainingOutput::default()),
        };
        Ok(response.with_message(reply.response))
    }

    async fn run(&self, dataset: Arc<Dataset>, request: TrainingRequest) -> Result<TrainingResponse> {
        let orchestrator = self.orchestrator.clone();
        let summary = blocking(move || orchestrator.train(&dataset, &request)).await?;
        Ok(normalize(RawTrainingOutput::from(summary)))
    }

    pub async fn predict(&self, model_name: &str, features: Map<String, Value>) -> Result<PredictionOutcome> {
        let registry = self.registry().clone();
        let name = model_name.to_string();
        blocking(move || registry.predict(&name, &features)).await
    }

    pub fn list_models(&self) -> Result<Vec<ModelEntry>> {
        self.registry().list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentReply;
    use crate::automl::Algorithm;
    use crate::config::AutoMlSettings;
    use serde_json::json;

    fn csv_bytes() -> Vec<u8> {
        let mut csv = String::from("x,label\n");
        for i in 0..30 {
            csv.push_str(&format!("{},{}\n", i, if i < 15 { "no" } else { "yes" }));
        }
        csv.into_bytes()
    }

    fn service(root: &std::path::Path) -> AutoMlService {
        let settings = AutoMlSettings {
            random_seed: 42,
            cv_folds: 3,
            tune_iterations: 2,
        };
        let automl = Arc::new(
            NativeAutoMl::new(settings).with_include(vec![Algorithm::GaussianNB, Algorithm::DummyClassifier]),
        );
        let registry = ModelRegistry::new(root.join("models"), automl.clone());
        AutoMlService::new(
            DatasetLoader::new(root.join("uploads")),
            TrainingOrchestrator::new(automl, registry, 42),
        )
    }

    fn command(prompt: &str) -> TrainCommand {
        TrainCommand {
            prompt: prompt.to_string(),
            file_name: "data.csv".to_string(),
            bytes: csv_bytes(),
            ..Default::default()
        }
    }

    /// Agent that always trains on a fixed target
    struct ScriptedAgent;

    #[async_trait]
    impl Agent for ScriptedAgent {
        async fn chat(&self, _prompt: &str, columns: &[String], tool: &dyn TrainingTool) -> Result<AgentReply> {
            assert!(columns.contains(&"label".to_string()));
            let output = tool
                .call(TrainToolArgs {
                    target: "label".to_string(),
                    task_type: None,
                    metric: None,
                })
                .await;
            Ok(AgentReply {
                response: "Done.".to_string(),
                tool_output: Some(output),
            })
        }
    }

    #[tokio::test]
    async fn test_explicit_target() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let mut cmd = command("anything");
        cmd.target_column = Some("label".to_string());

        let response = svc.train(cmd).await.unwrap();
        assert_eq!(response.task_type, "classification");
        assert_eq!(response.target_column, "label");
        assert!(response.message.is_none());
        assert_eq!(svc.list_models().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_target_from_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let response = svc.train(command("Please predict label from x")).await.unwrap();
        assert_eq!(response.target_column, "label");
        assert_eq!(
            response.message.as_deref(),
            Some(format!("Trained a model to predict label using {}", response.model_name).as_str())
        );
    }

    #[tokio::test]
    async fn test_no_target_without_agent() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path()).train(command("build me something")).await.unwrap_err();
        assert!(matches!(err, AutomlError::Validation(_)));
    }

    #[tokio::test]
    async fn test_agent_tool_output_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path()).with_agent(Arc::new(ScriptedAgent));
        let response = svc.train(command("build me something")).await.unwrap();
        assert_eq!(response.target_column, "label");
        assert!(response.model_name.starts_with("classification_"));
        assert_eq!(response.message.as_deref(), Some("Done."));
    }

    #[tokio::test]
    async fn test_rejects_unsupported_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = command("predict label");
        cmd.file_name = "data.json".to_string();
        let err = service(dir.path()).train(cmd).await.unwrap_err();
        assert!(matches!(err, AutomlError::UnsupportedFormat(_)));
        assert!(!dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_predict_unknown_model() {
        let dir = tempfile::tempdir().unwrap();
        let features = json!({"x": 1}).as_object().cloned().unwrap();
        let err = service(dir.path()).predict("nope", features).await.unwrap_err();
        assert!(matches!(err, AutomlError::ModelNotFound(_)));
    }
}
