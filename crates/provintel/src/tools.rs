//! Tool-call surface: `{"tool": ..., "arguments": {...}}` in, a content
//! envelope out.

use provintel_models::{Priority, SelectionCriteria, Weights};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{IntelligenceService, ServiceError};

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Value,
}

/// Envelope every tool result is wrapped in.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
}

impl ToolOutput {
    pub fn text(payload: Value) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text".to_string(),
                text: payload,
            }],
        }
    }
}

/// Name, description and JSON-schema parameters of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

pub fn tool_catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_provider_intelligence",
            description: "Get comprehensive intelligence data for providers",
            parameters: json!({
                "type": "object",
                "properties": {
                    "provider_addresses": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of provider addresses to analyze"
                    }
                },
                "required": ["provider_addresses"]
            }),
        },
        ToolSpec {
            name: "select_optimal_provider",
            description: "Choose the best provider based on requirements and available intelligence",
            parameters: json!({
                "type": "object",
                "properties": {
                    "requirements": {
                        "type": "object",
                        "properties": {
                            "budget": {"type": "number"},
                            "priority": {
                                "type": "string",
                                "enum": ["cost", "performance", "reliability"]
                            },
                            "weights": {
                                "type": "object",
                                "properties": {
                                    "price": {"type": "number"},
                                    "reliability": {"type": "number"},
                                    "performance": {"type": "number"},
                                    "geographic": {"type": "number"}
                                }
                            }
                        }
                    },
                    "provider_bids": {
                        "type": "array",
                        "description": "Bids carrying a `provider` address each"
                    }
                },
                "required": ["requirements", "provider_bids"]
            }),
        },
        ToolSpec {
            name: "get_market_trends",
            description: "Get current market trends and pricing analysis",
            parameters: json!({
                "type": "object",
                "properties": {
                    "timeframe": {
                        "type": "string",
                        "description": "Time period for analysis (1h, 24h, 7d)",
                        "default": "24h"
                    }
                }
            }),
        },
        ToolSpec {
            name: "get_cache_stats",
            description: "Report intelligence cache occupancy and freshness",
            parameters: json!({"type": "object", "properties": {}}),
        },
    ]
}

/// Run one tool call against the service.
pub async fn dispatch(
    service: &IntelligenceService,
    call: &ToolCall,
) -> Result<ToolOutput, ServiceError> {
    debug!(tool = %call.tool, "Dispatching tool call");
    let payload = match call.tool.as_str() {
        "get_provider_intelligence" => {
            let addresses = provider_addresses(&call.arguments)?;
            let records = service.get_provider_intelligence(&addresses).await?;
            serde_json::to_value(records)?
        }
        "select_optimal_provider" => {
            let (addresses, criteria) =
                selection_request(&call.arguments, service.config().selection_weights)?;
            let selection = service.select_optimal_provider(&addresses, criteria).await?;
            serde_json::to_value(selection)?
        }
        "get_market_trends" => market_trends(&call.arguments),
        "get_cache_stats" => serde_json::to_value(service.cache_stats().await)?,
        other => return Err(ServiceError::InvalidInput(format!("unknown tool: {other}"))),
    };
    Ok(ToolOutput::text(payload))
}

fn object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ServiceError> {
    value
        .as_object()
        .ok_or_else(|| ServiceError::InvalidInput(format!("{what} must be an object")))
}

fn required<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ServiceError> {
    args.get(key)
        .ok_or_else(|| ServiceError::InvalidInput(format!("{key} argument is required")))
}

/// String elements of `provider_addresses`; other elements are ignored.
fn provider_addresses(arguments: &Value) -> Result<Vec<String>, ServiceError> {
    let args = object(arguments, "arguments")?;
    let list = required(args, "provider_addresses")?
        .as_array()
        .ok_or_else(|| ServiceError::InvalidInput("provider_addresses must be an array".to_string()))?;
    Ok(list
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

/// Weight overrides; unset fields keep the configured value.
#[derive(Debug, Default, Deserialize)]
struct WeightOverrides {
    price: Option<f64>,
    reliability: Option<f64>,
    performance: Option<f64>,
    geographic: Option<f64>,
}

impl WeightOverrides {
    fn apply(self, base: Weights) -> Weights {
        Weights {
            price: self.price.unwrap_or(base.price),
            reliability: self.reliability.unwrap_or(base.reliability),
            performance: self.performance.unwrap_or(base.performance),
            geographic: self.geographic.unwrap_or(base.geographic),
        }
    }
}

fn selection_request(
    arguments: &Value,
    configured: Weights,
) -> Result<(Vec<String>, SelectionCriteria), ServiceError> {
    let args = object(arguments, "arguments")?;
    let requirements = object(required(args, "requirements")?, "requirements")?;
    let bids = required(args, "provider_bids")?
        .as_array()
        .ok_or_else(|| ServiceError::InvalidInput("provider_bids must be an array".to_string()))?;

    let addresses: Vec<String> = bids
        .iter()
        .filter_map(|bid| bid.get("provider").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if addresses.is_empty() {
        return Err(ServiceError::InvalidInput(
            "no valid provider addresses found in bids".to_string(),
        ));
    }

    let priority = requirements
        .get("priority")
        .and_then(Value::as_str)
        .map(Priority::from_label)
        .unwrap_or_default();
    let budget = requirements.get("budget").and_then(Value::as_f64);
    let weights = match requirements.get("weights") {
        Some(raw) => serde_json::from_value::<WeightOverrides>(raw.clone())
            .map_err(|e| ServiceError::InvalidInput(format!("invalid weights: {e}")))?
            .apply(configured),
        None => configured,
    };

    Ok((
        addresses,
        SelectionCriteria {
            priority,
            budget,
            weights,
        },
    ))
}

fn market_trends(arguments: &Value) -> Value {
    let timeframe = arguments
        .get("timeframe")
        .and_then(Value::as_str)
        .unwrap_or("24h");
    json!({
        "timeframe": timeframe,
        "message": "Market trends analysis is not yet backed by historical provider data",
        "status": "placeholder_implementation",
    })
}
