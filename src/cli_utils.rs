use std::path::Path;
use std::process;
use std::str::FromStr;

use serde_json::Value;

use crate::error::FormError;

/// Exits the program with an error message
pub fn exit_with_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exits the program with an error message and usage information
pub fn exit_with_usage_error(message: &str, usage: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("{}", usage);
    process::exit(1);
}

/// Output formats for structured reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Renders a value in the requested format
pub fn render<T>(value: &T, format: OutputFormat) -> Result<String, FormError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Ok(serde_yml::to_string(value)?),
    }
}

/// Prints a value in the requested format or exits with error
pub fn print_or_exit<T>(value: &T, format: OutputFormat, context: &str)
where
    T: serde::Serialize,
{
    match render(value, format) {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => exit_with_error(&format!("Failed to format {}: {}", context, e)),
    }
}

/// Reads and parses a JSON document from disk
pub fn read_json_file(path: impl AsRef<Path>) -> Result<Value, FormError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("yml".parse::<OutputFormat>(), Ok(OutputFormat::Yaml));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn render_formats() {
        let value = json!({"message": "Required"});
        assert_eq!(
            render(&value, OutputFormat::Json).unwrap(),
            "{\n  \"message\": \"Required\"\n}"
        );
        assert_eq!(
            render(&value, OutputFormat::Yaml).unwrap().trim_end(),
            "message: Required"
        );
    }

    #[test]
    fn read_missing_json_file() {
        assert!(matches!(
            read_json_file("/nonexistent/state.json"),
            Err(FormError::Io(_))
        ));
    }
}
