use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::tools::{Tool, ToolInvocation};

/// Canned weather lookup used to exercise the tool round-trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &'static str {
        "get_current_weather"
    }

    fn description(&self) -> &'static str {
        "Get the current weather for a given city"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City to look up, e.g. Beijing"
                },
                "unit": {
                    "type": "string",
                    "enum": ["celsius", "fahrenheit"],
                    "description": "Temperature unit"
                }
            },
            "required": ["location"]
        })
    }

    fn user_facing(&self) -> bool {
        false
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(location) = invocation.str_arg("location") else {
            return "invalid location arguments for GetWeather".to_string();
        };
        let Some(unit) = invocation.str_arg("unit") else {
            return "invalid unit arguments for GetWeather".to_string();
        };
        format!("{location} current weather (unit: {unit}) 35°C")
    }
}
