#[cfg(test)]
pub mod test_helpers {
    use std::sync::{Arc, Mutex};

    use serde_json::{Value, json};

    use crate::Issue;

    /// A string schema with a minimum length.
    pub fn string(min_length: u64) -> Value {
        json!({"type": "string", "minLength": min_length})
    }

    /// A number schema with inclusive bounds.
    pub fn number(minimum: i64, maximum: i64) -> Value {
        json!({"type": "number", "minimum": minimum, "maximum": maximum})
    }

    /// An array schema whose items follow `items`.
    pub fn array(items: Value) -> Value {
        json!({"type": "array", "items": items})
    }

    /// An object schema where every listed property is required.
    pub fn object(properties: &[(&str, Value)]) -> Value {
        let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
        let properties: serde_json::Map<String, Value> = properties
            .iter()
            .map(|(name, schema)| (name.to_string(), schema.clone()))
            .collect();
        json!({"type": "object", "properties": properties, "required": required})
    }

    /// Records every batch of issues handed to an `on_error` callback.
    #[derive(Clone, Default)]
    pub struct ErrorRecorder {
        calls: Arc<Mutex<Vec<Vec<Issue>>>>,
    }

    impl ErrorRecorder {
        /// A callback that appends to this recorder.
        pub fn callback(&self) -> impl Fn(&[Issue]) + Send + Sync + 'static {
            let calls = Arc::clone(&self.calls);
            move |issues: &[Issue]| calls.lock().unwrap().push(issues.to_vec())
        }

        /// The recorded batches, oldest first.
        pub fn calls(&self) -> Vec<Vec<Issue>> {
            self.calls.lock().unwrap().clone()
        }
    }
}
