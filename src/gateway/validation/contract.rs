//! OpenAPI contract loading, startup checks and route lookup.

use axum::http::Method;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use percent_encoding::percent_decode_str;

use super::schema::{Schema, ref_target};

/// Contract problems found at startup. Any of these stops the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("failed to read contract '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse contract: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported openapi version '{0}', expected 3.x")]
    UnsupportedVersion(String),

    #[error("info.title must not be empty")]
    MissingTitle,

    #[error("path '{0}' must start with '/'")]
    InvalidPath(String),

    #[error("path '{path}' uses parameter '{name}' that is not declared as a path parameter")]
    UndeclaredPathParameter { path: String, name: String },

    #[error("path '{path}' declares path parameter '{name}' that is not in the template")]
    UnusedPathParameter { path: String, name: String },

    #[error("path parameter '{name}' of '{path}' must be required")]
    OptionalPathParameter { path: String, name: String },

    #[error("unresolvable schema reference '{0}'")]
    UnresolvedRef(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum VersionField {
    Text(String),
    Number(f64),
}

impl VersionField {
    fn into_string(self) -> String {
        match self {
            VersionField::Text(s) => s,
            VersionField::Number(n) => format!("{:?}", n),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaType {
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub get: Option<Operation>,
    pub put: Option<Operation>,
    pub post: Option<Operation>,
    pub delete: Option<Operation>,
    pub patch: Option<Operation>,
    pub head: Option<Operation>,
    pub options: Option<Operation>,
}

impl PathItem {
    fn operation(&self, method: &Method) -> Option<&Operation> {
        match *method {
            Method::GET => self.get.as_ref(),
            Method::PUT => self.put.as_ref(),
            Method::POST => self.post.as_ref(),
            Method::DELETE => self.delete.as_ref(),
            Method::PATCH => self.patch.as_ref(),
            Method::HEAD => self.head.as_ref(),
            Method::OPTIONS => self.options.as_ref(),
            _ => None,
        }
    }

    fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.put,
            &self.post,
            &self.delete,
            &self.patch,
            &self.head,
            &self.options,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    openapi: VersionField,
    #[serde(default)]
    info: Info,
    #[serde(default)]
    paths: BTreeMap<String, PathItem>,
    #[serde(default)]
    components: Components,
}

/// A request matched to a declared operation
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub template: &'a str,
    pub operation: &'a Operation,
    /// Path-level parameters merged with operation-level ones
    pub parameters: Vec<&'a Parameter>,
    /// Templated path segments as they appeared in the URL, still encoded
    pub path_params: HashMap<String, String>,
}

/// A loaded and checked OpenAPI document
#[derive(Debug)]
pub struct Contract {
    version: String,
    info: Info,
    paths: BTreeMap<String, PathItem>,
    components: Components,
}

impl Contract {
    /// Parse and check a contract held in memory
    pub fn from_yaml(text: &str) -> Result<Self, ContractError> {
        let doc: Document = serde_yaml::from_str(text)?;
        let contract = Self {
            version: doc.openapi.into_string(),
            info: doc.info,
            paths: doc.paths,
            components: doc.components,
        };
        contract.check()?;
        Ok(contract)
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn schemas(&self) -> &BTreeMap<String, Schema> {
        &self.components.schemas
    }

    fn check(&self) -> Result<(), ContractError> {
        if !self.version.starts_with("3.") {
            return Err(ContractError::UnsupportedVersion(self.version.clone()));
        }
        if self.info.title.trim().is_empty() {
            return Err(ContractError::MissingTitle);
        }

        let mut refs = Vec::new();
        for schema in self.components.schemas.values() {
            schema.references(&mut refs);
        }

        for (template, item) in &self.paths {
            if !template.starts_with('/') {
                return Err(ContractError::InvalidPath(template.clone()));
            }
            let names: Vec<&str> = template_params(template).collect();

            for op in item.operations() {
                let params = merge_parameters(&item.parameters, &op.parameters);
                check_path_parameters(template, &names, &params)?;

                for param in &params {
                    if let Some(schema) = &param.schema {
                        schema.references(&mut refs);
                    }
                }
                if let Some(body) = &op.request_body {
                    for media in body.content.values() {
                        if let Some(schema) = &media.schema {
                            schema.references(&mut refs);
                        }
                    }
                }
            }
        }

        for reference in refs {
            let known = ref_target(reference)
                .map(|name| self.components.schemas.contains_key(name))
                .unwrap_or(false);
            if !known {
                return Err(ContractError::UnresolvedRef(reference.to_string()));
            }
        }

        // every ref now points somewhere, but aliases can still loop
        for schema in self.components.schemas.values() {
            schema
                .resolve(&self.components.schemas)
                .map_err(ContractError::UnresolvedRef)?;
        }

        Ok(())
    }

    /// Find the operation declared for `method` on `path`.
    ///
    /// Templates with more literal segments win over more generic ones.
    /// Returns `None` when nothing in the contract describes the request.
    pub fn find_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let segments: Vec<&str> = path.split('/').collect();
        let mut best: Option<(usize, RouteMatch<'_>)> = None;

        for (template, item) in &self.paths {
            let Some(operation) = item.operation(method) else {
                continue;
            };
            let Some((literals, path_params)) = match_template(template, &segments) else {
                continue;
            };
            if best.as_ref().is_some_and(|(score, _)| *score >= literals) {
                continue;
            }
            best = Some((
                literals,
                RouteMatch {
                    template,
                    operation,
                    parameters: merge_parameters(&item.parameters, &operation.parameters),
                    path_params,
                },
            ));
        }

        best.map(|(_, route)| route)
    }
}

fn template_params(template: &str) -> impl Iterator<Item = &str> {
    template
        .split('/')
        .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
}

/// Operation parameters override path-level ones with the same name and location.
fn merge_parameters<'a>(path_level: &'a [Parameter], op_level: &'a [Parameter]) -> Vec<&'a Parameter> {
    let mut merged: Vec<&Parameter> = path_level
        .iter()
        .filter(|p| {
            !op_level
                .iter()
                .any(|o| o.name == p.name && o.location == p.location)
        })
        .collect();
    merged.extend(op_level.iter());
    merged
}

fn check_path_parameters(
    template: &str,
    names: &[&str],
    params: &[&Parameter],
) -> Result<(), ContractError> {
    for name in names {
        let declared = params
            .iter()
            .find(|p| p.location == ParameterLocation::Path && p.name == *name);
        match declared {
            None => {
                return Err(ContractError::UndeclaredPathParameter {
                    path: template.to_string(),
                    name: name.to_string(),
                });
            }
            Some(p) if !p.required => {
                return Err(ContractError::OptionalPathParameter {
                    path: template.to_string(),
                    name: name.to_string(),
                });
            }
            Some(_) => {}
        }
    }

    for p in params {
        if p.location == ParameterLocation::Path && !names.contains(&p.name.as_str()) {
            return Err(ContractError::UnusedPathParameter {
                path: template.to_string(),
                name: p.name.clone(),
            });
        }
    }
    Ok(())
}

fn match_template(template: &str, segments: &[&str]) -> Option<(usize, HashMap<String, String>)> {
    let parts: Vec<&str> = template.split('/').collect();
    if parts.len() != segments.len() {
        return None;
    }

    let mut literals = 0;
    let mut params = HashMap::new();
    for (part, segment) in parts.iter().zip(segments) {
        match part.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                if segment.is_empty() {
                    return None;
                }
                params.insert(name.to_string(), segment.to_string());
            }
            None if part == segment => literals += 1,
            None => return None,
        }
    }
    Some((literals, params))
}

/// Percent-decode one path segment. `None` when the bytes are not UTF-8.
pub(crate) fn decode_segment(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
