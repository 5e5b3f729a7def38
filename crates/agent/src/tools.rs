use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use concierge_core::domain::notification::{Notification, NotificationSink, SaleNotification};

use crate::knowledge::KnowledgeBase;

pub const WEATHER_TOOL: &str = "get_current_weather";
pub const KNOWLEDGE_TOOL: &str = "process_knowledge_query";
pub const FINALIZE_SALE_TOOL: &str = "finalize_sale_process";

/// Schema advertised to the model for one capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<String, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Capabilities available to the answering agent. Built once at startup and
/// shared read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    pub async fn invoke(&self, name: &str, input: Value) -> Result<String, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(input).await
    }
}

/// The full capability set: weather, knowledge lookup and sale finalization.
pub fn default_registry(knowledge: Arc<KnowledgeBase>, sales: SaleFinalizer) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(WeatherTool);
    registry.register(KnowledgeQueryTool::new(knowledge));
    registry.register(FinalizeSaleTool::new(sales));
    registry
}

fn required_str(input: &Value, field: &str, tool: &str) -> Result<String, ToolError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing string field `{field}`"),
        })
}

fn string_schema(fields: &[(&str, &str)]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(name, description)| {
            ((*name).to_string(), json!({ "type": "string", "description": description }))
        })
        .collect();
    let required: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
    json!({ "type": "object", "properties": properties, "required": required })
}

pub fn weather_report(location: &str) -> String {
    if ["Medellín", "Itagüí", "Envigado"].iter().any(|city| location.contains(city)) {
        "The current weather in the Aburrá Valley (Medellín/Itagüí) is sunny at 30°C. \
         Ideal for outdoor activities."
            .to_string()
    } else if location.contains("Bogotá") {
        "The weather in Bogotá is cloudy at 18°C. There is a chance of light rain in the afternoon."
            .to_string()
    } else if location.contains("Cali") {
        "The weather in Cali is partly cloudy at 27°C. It feels warm and humid.".to_string()
    } else {
        format!(
            "I don't have weather information for {location} right now. \
             Please specify a major city in Colombia."
        )
    }
}

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &'static str {
        WEATHER_TOOL
    }

    fn description(&self) -> &'static str {
        "Gets the current weather for a given location."
    }

    fn parameters(&self) -> Value {
        string_schema(&[("location", "City or area name, e.g. Medellín")])
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let location = required_str(&input, "location", WEATHER_TOOL)?;
        Ok(weather_report(&location))
    }
}

pub struct KnowledgeQueryTool {
    knowledge: Arc<KnowledgeBase>,
}

impl KnowledgeQueryTool {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl Tool for KnowledgeQueryTool {
    fn name(&self) -> &'static str {
        KNOWLEDGE_TOOL
    }

    fn description(&self) -> &'static str {
        "Answers questions that need the internal knowledge base: product details, \
         policies or other internal topics."
    }

    fn parameters(&self) -> Value {
        string_schema(&[("query", "The user's question, restated as a standalone query")])
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let query = required_str(&input, "query", KNOWLEDGE_TOOL)?;
        Ok(self.knowledge.answer(&query).await)
    }
}

/// Records a completed sale and broadcasts it. Shared by the confirmed-sale
/// fast path and the `finalize_sale_process` tool.
#[derive(Clone)]
pub struct SaleFinalizer {
    sink: Arc<dyn NotificationSink>,
}

impl SaleFinalizer {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub fn finalize(&self, product: &str, client: &str) -> String {
        let sale = SaleNotification::new(product, client, Utc::now());
        info!(
            event_name = "agent.sale.finalized",
            product = %sale.product,
            client = %sale.client,
            "sale finalized, broadcasting notification"
        );
        self.sink.publish(Notification::NewSale(sale));

        format!(
            "Excellent! The sale of {product} for {client} was completed successfully \
             and the notification has been sent."
        )
    }
}

pub struct FinalizeSaleTool {
    finalizer: SaleFinalizer,
}

impl FinalizeSaleTool {
    pub fn new(finalizer: SaleFinalizer) -> Self {
        Self { finalizer }
    }
}

#[async_trait]
impl Tool for FinalizeSaleTool {
    fn name(&self) -> &'static str {
        FINALIZE_SALE_TOOL
    }

    fn description(&self) -> &'static str {
        "Finalizes a sale and emits a notification. Use once every detail needed \
         to register the sale has been confirmed."
    }

    fn parameters(&self) -> Value {
        string_schema(&[
            ("product_info", "The product being sold"),
            ("client_info", "The client buying the product"),
        ])
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let product = required_str(&input, "product_info", FINALIZE_SALE_TOOL)?;
        let client = required_str(&input, "client_info", FINALIZE_SALE_TOOL)?;
        Ok(self.finalizer.finalize(&product, &client))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use concierge_core::domain::notification::{Notification, NotificationSink};

    #[derive(Default)]
    pub struct RecordingSink {
        pub published: Mutex<Vec<Notification>>,
    }

    impl RecordingSink {
        pub fn published(&self) -> Vec<Notification> {
            self.published.lock().expect("sink lock").clone()
        }
    }

    impl NotificationSink for RecordingSink {
        fn publish(&self, notification: Notification) {
            self.published.lock().expect("sink lock").push(notification);
        }
    }
}
