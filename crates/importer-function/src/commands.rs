//! Subcommand implementations

use crate::cli::{RunArgs, ValidateInputArgs};
use anyhow::{Context, Result};
use importer_core::{
    FilterValue, FunctionRunner, ImporterConfig, Input, RunFunctionRequest, RunFunctionResponse,
    TagIndex, ValidatedInput,
};
use importer_tagging::HttpTagIndex;
use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Run one pass against the HTTP tag index and print the response
///
/// # Errors
/// Configuration, request decoding and output failures. Reconciliation
/// failures are reported inside the response instead.
pub async fn run(args: &RunArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let index = HttpTagIndex::new(&config.tagging).context("cannot build tag index client")?;
    info!(endpoint = index.endpoint(), "using tag index");

    let request = read_request(&args.request)?;
    let response = execute(&config, Arc::new(index), &request).await;

    let out = serde_json::to_string_pretty(&response).context("cannot encode response")?;
    println!("{out}");
    Ok(())
}

/// Run one pass over any tag index
pub async fn execute(
    config: &ImporterConfig,
    index: Arc<dyn TagIndex>,
    request: &RunFunctionRequest,
) -> RunFunctionResponse {
    FunctionRunner::from_config(config, index)
        .run_function(request)
        .await
}

/// Config file (or defaults) with command-line overrides applied
///
/// # Errors
/// When the file cannot be loaded or the merged values are out of range.
pub fn resolve_config(args: &RunArgs) -> Result<ImporterConfig> {
    let mut config = match &args.config {
        Some(path) => ImporterConfig::load(path)
            .with_context(|| format!("cannot load config from {}", path.display()))?,
        None => ImporterConfig::default(),
    };

    if let Some(endpoint) = &args.endpoint {
        config.tagging.endpoint = Some(endpoint.clone());
    }
    if let Some(region) = &args.region {
        config.tagging.region.clone_from(region);
    }
    if let Some(tag) = &args.identity_tag {
        config.identity_tag_key.clone_from(tag);
    }

    config.validate().context("invalid configuration")?;
    debug!(
        identity_tag = %config.identity_tag_key,
        resources_per_page = config.resources_per_page,
        pass_timeout_secs = config.pass_timeout_secs,
        "resolved configuration"
    );
    Ok(config)
}

/// Read a request from `path`, or stdin for `-`
///
/// # Errors
/// When the source cannot be read or is not a valid request.
pub fn read_request(path: &Path) -> Result<RunFunctionRequest> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("cannot read request from stdin")?;
        buf
    } else {
        std::fs::read(path).with_context(|| format!("cannot read request {}", path.display()))?
    };

    Ok(RunFunctionRequest::from_slice(&bytes)?)
}

/// Validate an input document and describe its filters
///
/// # Errors
/// When the file cannot be read, parsed or validated.
pub fn validate_input(args: &ValidateInputArgs) -> Result<String> {
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("cannot read input {}", args.input.display()))?;
    let value: serde_json::Value =
        serde_yaml::from_str(&raw).context("input is neither YAML nor JSON")?;

    let validated = Input::from_value(value)
        .and_then(|input| input.validate())
        .context("invalid Function input")?;
    Ok(describe_input(&validated))
}

/// Human-readable summary of a validated input
#[must_use]
pub fn describe_input(input: &ValidatedInput) -> String {
    let mut out = match input.resource_name() {
        Some(name) => format!("mode: single resource {name:?}\n"),
        None => "mode: all desired resources\n".to_string(),
    };

    if input.filters().is_empty() {
        out.push_str("filters: none (name and kind only)\n");
    }
    for filter in input.filters() {
        let _ = match filter.value() {
            FilterValue::Static(value) => writeln!(out, "filter {:?} = {value:?}", filter.key()),
            FilterValue::FromPath(path) => {
                writeln!(out, "filter {:?} = composite {path}", filter.key())
            }
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use importer_core::TagFilterSpec;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn describes_filters() {
        let input = Input::new()
            .with_filter(TagFilterSpec::value("env", "prod"))
            .with_filter(TagFilterSpec::value_path("team", "spec.parameters.team"))
            .validate()
            .unwrap();

        assert_eq!(
            describe_input(&input),
            "mode: all desired resources\n\
             filter \"env\" = \"prod\"\n\
             filter \"team\" = composite spec.parameters.team\n"
        );
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "identity_tag_key = \"Name\"\n[tagging]\nregion = \"eu-west-1\"").unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            endpoint: Some("http://localhost:9000".into()),
            ..RunArgs::default()
        };
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.identity_tag_key, "Name");
        assert_eq!(config.tagging.region, "eu-west-1");
        assert_eq!(config.tagging.resolved_endpoint(), "http://localhost:9000");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = RunArgs {
            identity_tag: Some(String::new()),
            ..RunArgs::default()
        };
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn reads_request_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"meta": {{"tag": "abc"}}, "input": {{"tagFilters": []}}}}"#).unwrap();

        let request = read_request(file.path()).unwrap();
        assert_eq!(request.meta.tag, "abc");

        assert!(read_request(&PathBuf::from("/nonexistent/request.json")).is_err());
    }

    #[test]
    fn validates_yaml_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "apiVersion: template.fn.crossplane.io/v1beta1\n\
             kind: Input\n\
             resourceName: securityGroup\n\
             tagFilters:\n\
             - key: env\n  strategy: value\n  value: prod\n"
        )
        .unwrap();

        let summary = validate_input(&ValidateInputArgs {
            input: file.path().to_path_buf(),
        })
        .unwrap();
        assert!(summary.starts_with("mode: single resource \"securityGroup\""));
        assert!(summary.contains("filter \"env\" = \"prod\""));
    }

    #[test]
    fn rejects_invalid_yaml_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "tagFilters:\n- key: env\n  strategy: \"\"\n").unwrap();

        let err = validate_input(&ValidateInputArgs {
            input: file.path().to_path_buf(),
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("\"strategy\" must not be empty"));
    }
}
