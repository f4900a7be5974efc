use std::process;
use std::sync::Arc;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use formstate::cli_utils::{
    OutputFormat, exit_with_error, exit_with_usage_error, print_or_exit, read_json_file,
};
use formstate::{FormConfig, FormContext, FormOptions, JsonSchema, Schema};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Options {
    #[arrrg(flag, "Print the issues of every failing file")]
    verbose: bool,
    #[arrrg(optional, "Form configuration file (YAML or JSON)")]
    config: Option<String>,
    #[arrrg(optional, "Validate a single field path instead of the whole form")]
    field: Option<String>,
    #[arrrg(optional, "Issue output format: json or yaml")]
    output: Option<String>,
}

const USAGE: &str = "USAGE: formstate-validate [--verbose] [--config <file>] [--field <path>] [--output json|yaml] <schema.json> <state.json>...";

#[tokio::main]
async fn main() {
    let (options, free) = Options::from_command_line(USAGE);

    let level = if options.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    if free.len() < 2 {
        exit_with_usage_error("expected a schema file and at least one state file", USAGE);
    }

    let format = match options.output.as_deref().map(str::parse::<OutputFormat>) {
        None => OutputFormat::default(),
        Some(Ok(format)) => format,
        Some(Err(e)) => exit_with_usage_error(&e, USAGE),
    };

    let document = read_json_file(&free[0])
        .unwrap_or_else(|e| exit_with_error(&format!("{}: {}", free[0], e)));
    let schema: Arc<dyn Schema> = match JsonSchema::new(document) {
        Ok(schema) => Arc::new(schema),
        Err(e) => exit_with_error(&format!("{}: {}", free[0], e)),
    };
    let config = match &options.config {
        Some(path) => FormConfig::load(path)
            .unwrap_or_else(|e| exit_with_error(&format!("{}: {}", path, e))),
        None => FormConfig::default(),
    };

    let mut all_valid = true;

    for path in &free[1..] {
        let state = match read_json_file(path) {
            Ok(state) => state,
            Err(e) => {
                warn!(file = %path, error = %e, "could not read state");
                println!("{} fail", path);
                all_valid = false;
                continue;
            }
        };

        let form = FormContext::new(
            FormOptions::new(Arc::clone(&schema))
                .config(config.clone())
                .initial_state(state),
        );
        let outcome = match &options.field {
            Some(field) => form.validate_field(field).await,
            None => form.validate().await,
        };

        if outcome.is_valid() {
            println!("{} pass", path);
        } else {
            println!("{} fail", path);
            all_valid = false;
            if options.verbose {
                print_or_exit(&outcome, format, "issues");
            }
        }
    }

    if all_valid {
        process::exit(0);
    } else {
        process::exit(1);
    }
}
