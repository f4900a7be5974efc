//! Form configuration.
//!
//! [`FormConfig`] is the serializable half of a form's options: everything except the schema
//! and the callbacks.  It can be written by hand in YAML or JSON and applied with
//! [`crate::FormOptions::config`].
//!
//! ```yaml
//! id: signup
//! mode: lazy
//! validateOn: [blur, change]
//! initialState:
//!   name: ""
//!   age: 0
//! ```

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FormError;
use crate::issue::Issue;

/////////////////////////////////////////// ValidationMode ///////////////////////////////////////////

/// When field-level validation runs in response to user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Validate on every configured trigger.
    #[default]
    Eager,
    /// Validate only on blur and on submit.
    Lazy,
}

impl Display for ValidationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ValidationMode::Eager => write!(f, "eager"),
            ValidationMode::Lazy => write!(f, "lazy"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" => Ok(ValidationMode::Eager),
            "lazy" => Ok(ValidationMode::Lazy),
            _ => Err(ConfigParseError::UnknownMode(s.to_string())),
        }
    }
}

////////////////////////////////////////////// Trigger //////////////////////////////////////////////

/// An interaction that may trigger field validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// The field lost focus.
    Blur,
    /// The field's value changed on a keystroke.
    Input,
    /// The field's value was committed.
    Change,
    /// The field was mounted.
    Mount,
    /// The field gained focus.
    Focus,
}

impl Trigger {
    /// The triggers used when none are configured.
    pub fn defaults() -> BTreeSet<Trigger> {
        [Trigger::Blur, Trigger::Input, Trigger::Change]
            .into_iter()
            .collect()
    }
}

impl Display for Trigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Trigger::Blur => "blur",
            Trigger::Input => "input",
            Trigger::Change => "change",
            Trigger::Mount => "mount",
            Trigger::Focus => "focus",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Trigger {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blur" => Ok(Trigger::Blur),
            "input" => Ok(Trigger::Input),
            "change" => Ok(Trigger::Change),
            "mount" => Ok(Trigger::Mount),
            "focus" => Ok(Trigger::Focus),
            _ => Err(ConfigParseError::UnknownTrigger(s.to_string())),
        }
    }
}

/// Failure to parse a mode or trigger name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigParseError {
    /// Not one of `eager` or `lazy`.
    UnknownMode(String),
    /// Not one of `blur`, `input`, `change`, `mount`, `focus`.
    UnknownTrigger(String),
}

impl Display for ConfigParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ConfigParseError::UnknownMode(mode) => write!(f, "unknown validation mode: {}", mode),
            ConfigParseError::UnknownTrigger(trigger) => write!(f, "unknown trigger: {}", trigger),
        }
    }
}

impl std::error::Error for ConfigParseError {}

///////////////////////////////////////////// FormConfig /////////////////////////////////////////////

/// Serializable form options.  Absent fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    /// The form id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The validation mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ValidationMode>,
    /// The triggers that run field validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_on: Option<BTreeSet<Trigger>>,
    /// The initial state tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<Value>,
    /// The initial error list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_errors: Option<Vec<Issue>>,
}

impl FormConfig {
    /// Parses a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, FormError> {
        Ok(serde_yml::from_str(content)?)
    }

    /// Parses a JSON document.
    pub fn from_json(content: &str) -> Result<Self, FormError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Loads a file, choosing YAML for `.yaml`/`.yml` extensions and JSON otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FormError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mode_and_trigger_parse_and_display() {
        assert_eq!("lazy".parse::<ValidationMode>(), Ok(ValidationMode::Lazy));
        assert_eq!(ValidationMode::default().to_string(), "eager");
        assert_eq!("blur".parse::<Trigger>(), Ok(Trigger::Blur));
        assert_eq!(Trigger::Focus.to_string(), "focus");
        assert_eq!(
            "hover".parse::<Trigger>(),
            Err(ConfigParseError::UnknownTrigger("hover".into()))
        );
    }

    #[test]
    fn default_triggers() {
        let defaults: Vec<Trigger> = Trigger::defaults().into_iter().collect();
        assert_eq!(defaults, vec![Trigger::Blur, Trigger::Input, Trigger::Change]);
    }

    #[test]
    fn yaml_config() {
        let config = FormConfig::from_yaml(
            r#"
id: signup
mode: lazy
validateOn: [blur, change]
initialState:
  name: ""
  age: 0
initialErrors:
  - message: Required
    path: [name]
"#,
        )
        .unwrap();
        assert_eq!(config.id.as_deref(), Some("signup"));
        assert_eq!(config.mode, Some(ValidationMode::Lazy));
        assert_eq!(
            config.validate_on,
            Some([Trigger::Blur, Trigger::Change].into_iter().collect())
        );
        assert_eq!(config.initial_state, Some(json!({"name": "", "age": 0})));
        assert_eq!(
            config.initial_errors,
            Some(vec![Issue::new("Required", ["name"])])
        );
    }

    #[test]
    fn json_config_defaults() {
        let config = FormConfig::from_json("{}").unwrap();
        assert_eq!(config, FormConfig::default());
    }

    #[test]
    fn invalid_config_is_an_error() {
        assert!(matches!(
            FormConfig::from_json(r#"{"mode": "sometimes"}"#),
            Err(FormError::Json(_))
        ));
        assert!(matches!(
            FormConfig::from_yaml("mode: [1, 2"),
            Err(FormError::Yaml(_))
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            FormConfig::load("/nonexistent/formstate.yaml"),
            Err(FormError::Io(_))
        ));
    }
}
