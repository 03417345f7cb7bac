//! Structural extraction from Terraform configuration
//!
//! Walks the top-level blocks of one parsed file and produces typed
//! [`Variable`], [`Output`], [`Resource`] and [`DataSource`] records. Nested
//! blocks are never inspected, and expressions are kept as source text unless
//! they are plain literals.

use crate::error::{Error, Result};
use crate::hcl::{self, Attribute, Block, Body, Value};
use crate::models::{provider_from_type, DataSource, Output, Resource, Variable};
use std::collections::HashMap;
use tracing::debug;

/// Files checked first, in order, when detecting a module's provider
pub const PROVIDER_FILES: [&str; 4] = ["terraform.tf", "versions.tf", "providers.tf", "main.tf"];

/// Everything extracted from a single file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileEntities {
    pub variables: Vec<Variable>,
    pub outputs: Vec<Output>,
    pub resources: Vec<Resource>,
    pub data_sources: Vec<DataSource>,
}

impl FileEntities {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.outputs.is_empty()
            && self.resources.is_empty()
            && self.data_sources.is_empty()
    }
}

/// Parse `source` and extract its entities; `file_name` is recorded as the
/// source file of each entity.
pub fn extract_file(source: &str, file_name: &str) -> Result<FileEntities> {
    let body = hcl::parse(source).map_err(|e| Error::Parse {
        file: file_name.to_string(),
        message: e.to_string(),
    })?;
    Ok(extract_body(&body, source, file_name))
}

/// Extract entities from an already parsed body
pub fn extract_body(body: &Body, source: &str, file_name: &str) -> FileEntities {
    let mut entities = FileEntities::default();

    for block in &body.blocks {
        match block.kind.as_str() {
            "variable" => {
                if let Some(v) = extract_variable(block, source, file_name) {
                    entities.variables.push(v);
                }
            }
            "output" => {
                if let Some(o) = extract_output(block, source, file_name) {
                    entities.outputs.push(o);
                }
            }
            "resource" => {
                if let [resource_type, resource_name, ..] = block.labels.as_slice() {
                    entities.resources.push(Resource {
                        provider: provider_from_type(resource_type),
                        resource_type: resource_type.clone(),
                        resource_name: resource_name.clone(),
                        source_file: file_name.to_string(),
                    });
                }
            }
            "data" => {
                if let [data_type, data_name, ..] = block.labels.as_slice() {
                    entities.data_sources.push(DataSource {
                        provider: provider_from_type(data_type),
                        data_type: data_type.clone(),
                        data_name: data_name.clone(),
                        source_file: file_name.to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    debug!(
        file = file_name,
        variables = entities.variables.len(),
        outputs = entities.outputs.len(),
        resources = entities.resources.len(),
        data_sources = entities.data_sources.len(),
        "Extracted entities"
    );

    entities
}

fn extract_variable(block: &Block, source: &str, file_name: &str) -> Option<Variable> {
    let name = block.labels.first()?;
    let default = block.body.attribute("default");

    Some(Variable {
        name: name.clone(),
        var_type: block
            .body
            .attribute("type")
            .map(|a| a.expr.source_text(source).trim().to_string()),
        description: string_literal(block.body.attribute("description")),
        default_text: default.map(|a| a.expr.source_text(source).trim().to_string()),
        default_value: default.and_then(|a| hcl::evaluate(&a.expr)),
        required: default.is_none(),
        sensitive: block
            .body
            .attribute("sensitive")
            .map(|a| is_true(a, source))
            .unwrap_or(false),
        source_file: file_name.to_string(),
    })
}

fn extract_output(block: &Block, source: &str, file_name: &str) -> Option<Output> {
    let name = block.labels.first()?;

    Some(Output {
        name: name.clone(),
        description: string_literal(block.body.attribute("description")),
        sensitive: block
            .body
            .attribute("sensitive")
            .map(|a| is_true(a, source))
            .unwrap_or(false),
        source_file: file_name.to_string(),
    })
}

fn string_literal(attr: Option<&Attribute>) -> Option<String> {
    hcl::evaluate(&attr?.expr)?.as_str().map(str::to_string)
}

/// Literal booleans are taken as-is; anything else compares its source text
fn is_true(attr: &Attribute, source: &str) -> bool {
    match hcl::evaluate(&attr.expr).as_ref().and_then(Value::as_bool) {
        Some(b) => b,
        None => attr
            .expr
            .source_text(source)
            .trim()
            .eq_ignore_ascii_case("true"),
    }
}

/// Provider named by the first `required_providers` entry of a `terraform`
/// block, or by the first `provider` block
pub fn provider_from_body(body: &Body) -> Option<String> {
    for block in &body.blocks {
        match block.kind.as_str() {
            "terraform" => {
                let first = block
                    .body
                    .blocks_of("required_providers")
                    .find_map(|rp| rp.body.attributes.first());
                if let Some(attr) = first {
                    return Some(attr.name.clone());
                }
            }
            "provider" => {
                if let Some(label) = block.labels.first() {
                    return Some(label.clone());
                }
            }
            _ => {}
        }
    }
    None
}

/// Detect the provider of a module from its configuration files.
///
/// `files` are `(file_name, content)` pairs. Well-known provider files are
/// checked first, then the remaining files in the given order; when no file
/// declares a provider the most common resource provider wins.
pub fn detect_module_provider(files: &[(&str, &str)], resources: &[Resource]) -> Option<String> {
    let ranked = PROVIDER_FILES
        .iter()
        .filter_map(|wanted| files.iter().find(|(name, _)| name == wanted))
        .chain(
            files
                .iter()
                .filter(|(name, _)| name.ends_with(".tf") && !PROVIDER_FILES.contains(name)),
        );

    for (_, content) in ranked {
        let Ok(body) = hcl::parse(content) else {
            continue;
        };
        if let Some(provider) = provider_from_body(&body) {
            return Some(provider);
        }
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for resource in resources {
        if !resource.provider.is_empty() {
            *counts.entry(resource.provider.as_str()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(provider, _)| provider.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hcl::Value;

    const VARIABLES_TF: &str = r#"
variable "name" {
  description = "Name of the vault"
  type        = string
}

variable "tags" {
  description = "Tags for ${var.name}"
  type        = map(string)
  default     = { env = "dev" }
}

variable "nullable" {
  default = null
}

variable "secret" {
  type      = string
  sensitive = true
}

variable "computed" {
  default   = local.settings
  sensitive = "TRUE"
}
"#;

    #[test]
    fn test_settings_only_file_has_no_entities() {
        let entities = extract_file(
            "terraform {\n  required_version = \">= 1.3\"\n}\n\nlocals {\n  x = 1\n}\n",
            "terraform.tf",
        )
        .unwrap();
        assert!(entities.is_empty());
        assert!(!extract_file(VARIABLES_TF, "variables.tf").unwrap().is_empty());
    }

    #[test]
    fn test_variable_required_flag() {
        let entities = extract_file(VARIABLES_TF, "variables.tf").unwrap();
        let by_name = |n: &str| {
            entities
                .variables
                .iter()
                .find(|v| v.name == n)
                .unwrap()
                .clone()
        };

        assert!(by_name("name").required);
        assert!(!by_name("tags").required);
        assert!(!by_name("nullable").required);
        assert_eq!(by_name("nullable").default_value, Some(Value::Null));
        assert_eq!(by_name("nullable").default_text.as_deref(), Some("null"));
    }

    #[test]
    fn test_variable_fields() {
        let entities = extract_file(VARIABLES_TF, "variables.tf").unwrap();
        assert_eq!(entities.variables.len(), 5);

        let name = &entities.variables[0];
        assert_eq!(name.description.as_deref(), Some("Name of the vault"));
        assert_eq!(name.var_type.as_deref(), Some("string"));
        assert_eq!(name.source_file, "variables.tf");

        let tags = &entities.variables[1];
        // templated descriptions are not plain literals
        assert_eq!(tags.description, None);
        assert_eq!(tags.var_type.as_deref(), Some("map(string)"));
        assert_eq!(tags.default_text.as_deref(), Some("{ env = \"dev\" }"));
        assert_eq!(
            tags.default_value,
            Some(Value::Map(vec![("env".into(), Value::String("dev".into()))]))
        );

        assert!(entities.variables[3].sensitive);

        let computed = &entities.variables[4];
        assert_eq!(computed.default_value, None);
        assert_eq!(computed.default_text.as_deref(), Some("local.settings"));
        assert!(!computed.sensitive);
    }

    #[test]
    fn test_outputs_resources_and_data() {
        let src = r#"
data "azurerm_client_config" "current" {}

resource "azurerm_key_vault" "this" {
  name = var.name

  network_acls {
    default_action = "Deny"
  }
}

resource "random_string" "suffix" {
  length = 4
}

resource "incomplete" {}

output "vault_id" {
  description = "The vault"
  value       = azurerm_key_vault.this.id
}

output "secret" {
  value     = var.secret
  sensitive = true
}
"#;
        let entities = extract_file(src, "main.tf").unwrap();

        assert_eq!(entities.resources.len(), 2);
        assert_eq!(entities.resources[0].resource_type, "azurerm_key_vault");
        assert_eq!(entities.resources[0].resource_name, "this");
        assert_eq!(entities.resources[0].provider, "azurerm");
        assert_eq!(entities.resources[1].provider, "random");

        assert_eq!(entities.data_sources.len(), 1);
        assert_eq!(entities.data_sources[0].data_type, "azurerm_client_config");
        assert_eq!(entities.data_sources[0].provider, "azurerm");

        assert_eq!(entities.outputs.len(), 2);
        assert_eq!(entities.outputs[0].description.as_deref(), Some("The vault"));
        assert!(!entities.outputs[0].sensitive);
        assert!(entities.outputs[1].sensitive);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = extract_file("variable \"x\" {", "broken.tf").unwrap_err();
        match err {
            Error::Parse { file, .. } => assert_eq!(file, "broken.tf"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_detect_provider_prefers_required_providers() {
        let versions = r#"
terraform {
  required_version = ">= 1.5"
  required_providers {
    azurerm = {
      source  = "hashicorp/azurerm"
      version = "~> 4.0"
    }
  }
}
"#;
        let main = "provider \"random\" {}\n";
        let files = [("main.tf", main), ("versions.tf", versions)];
        assert_eq!(detect_module_provider(&files, &[]).as_deref(), Some("azurerm"));
    }

    #[test]
    fn test_detect_provider_falls_back_to_resources() {
        let files = [("main.tf", "resource \"azurerm_subnet\" \"s\" {}\n")];
        let resources = vec![
            Resource {
                resource_type: "azurerm_subnet".into(),
                resource_name: "s".into(),
                provider: "azurerm".into(),
                source_file: "main.tf".into(),
            },
            Resource {
                resource_type: "random_id".into(),
                resource_name: "r".into(),
                provider: "random".into(),
                source_file: "main.tf".into(),
            },
            Resource {
                resource_type: "azurerm_vnet".into(),
                resource_name: "v".into(),
                provider: "azurerm".into(),
                source_file: "main.tf".into(),
            },
        ];
        assert_eq!(
            detect_module_provider(&files, &resources).as_deref(),
            Some("azurerm")
        );
        assert_eq!(detect_module_provider(&files, &[]), None);
    }
}
