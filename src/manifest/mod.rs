//! Deployment manifest loading and field-group checks
//!
//! A manifest is a Kubernetes Deployment document. Checks read the pod
//! template under `spec.template.spec` and compare one field group at a time
//! against a [`ManifestExpectations`] value. A missing key fails only the
//! group that needed it.

use crate::error::{AppError, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// One step in a path through the document
#[derive(Debug, Clone, Copy)]
enum Seg<'a> {
    Key(&'a str),
    Index(usize),
}

const POD_SPEC: [Seg<'static>; 3] = [Seg::Key("spec"), Seg::Key("template"), Seg::Key("spec")];

/// A parsed manifest, read-only after load
#[derive(Debug, Clone)]
pub struct Manifest {
    source: PathBuf,
    document: Value,
}

/// Pod-level security attributes as written in the manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityContext {
    pub run_as_non_root: Option<bool>,
    pub run_as_user: Option<i64>,
    pub run_as_root: Option<bool>,
}

impl Manifest {
    /// Load a manifest from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(format!("Failed to read manifest {}: {}", path.display(), e)))?;
        Self::parse(path, &content)
    }

    /// Parse manifest text; `source` is only used in error messages
    pub fn parse<P: Into<PathBuf>>(source: P, content: &str) -> Result<Self> {
        let source = source.into();
        let document: Value = serde_yaml::from_str(content)
            .map_err(|e| AppError::parse(format!("Invalid YAML in {}: {}", source.display(), e)))?;

        if !document.is_mapping() {
            return Err(AppError::parse(format!("{} is not a YAML mapping", source.display())));
        }

        Ok(Self { source, document })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Container image reference of the first container
    pub fn image(&self) -> Result<&str> {
        let path = self.container_path(&[Seg::Key("image")]);
        let value = self.lookup(&path)?;
        value.as_str().ok_or_else(|| self.type_error(&path, "a string"))
    }

    /// `containerPort` values of the first container, in manifest order
    pub fn container_ports(&self) -> Result<Vec<u16>> {
        let path = self.container_path(&[Seg::Key("ports")]);
        let ports = self.lookup(&path)?;
        let ports = ports.as_sequence().ok_or_else(|| self.type_error(&path, "a list"))?;

        ports
            .iter()
            .enumerate()
            .map(|(i, port)| {
                let mut item_path = path.clone();
                item_path.push(Seg::Index(i));
                item_path.push(Seg::Key("containerPort"));

                let value = port
                    .get("containerPort")
                    .ok_or_else(|| self.missing(&item_path))?;
                value
                    .as_u64()
                    .and_then(|p| u16::try_from(p).ok())
                    .ok_or_else(|| self.type_error(&item_path, "a port number"))
            })
            .collect()
    }

    /// Names of the pod volumes, in manifest order
    pub fn volume_names(&self) -> Result<Vec<String>> {
        let mut path = POD_SPEC.to_vec();
        path.push(Seg::Key("volumes"));
        let volumes = self.lookup(&path)?;
        let volumes = volumes.as_sequence().ok_or_else(|| self.type_error(&path, "a list"))?;

        volumes
            .iter()
            .enumerate()
            .map(|(i, volume)| {
                let mut item_path = path.clone();
                item_path.push(Seg::Index(i));
                item_path.push(Seg::Key("name"));

                volume
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| self.missing(&item_path))
            })
            .collect()
    }

    /// The pod `securityContext`
    pub fn security_context(&self) -> Result<SecurityContext> {
        let mut path = POD_SPEC.to_vec();
        path.push(Seg::Key("securityContext"));
        let ctx = self.lookup(&path)?;
        if !ctx.is_mapping() {
            return Err(self.type_error(&path, "a mapping"));
        }

        Ok(SecurityContext {
            run_as_non_root: ctx.get("runAsNonRoot").and_then(Value::as_bool),
            run_as_user: ctx.get("runAsUser").and_then(Value::as_i64),
            run_as_root: ctx.get("runAsRoot").and_then(Value::as_bool),
        })
    }

    /// Environment of the first container as a name to value map
    pub fn env(&self) -> Result<BTreeMap<String, String>> {
        let path = self.container_path(&[Seg::Key("env")]);
        let env = self.lookup(&path)?;
        let env = env.as_sequence().ok_or_else(|| self.type_error(&path, "a list"))?;

        let mut vars = BTreeMap::new();
        for (i, entry) in env.iter().enumerate() {
            let mut item_path = path.clone();
            item_path.push(Seg::Index(i));

            let name = entry.get("name").and_then(Value::as_str).ok_or_else(|| {
                let mut p = item_path.clone();
                p.push(Seg::Key("name"));
                self.missing(&p)
            })?;

            // valueFrom entries carry no literal value
            let value = match entry.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ => String::new(),
            };
            vars.insert(name.to_string(), value);
        }

        Ok(vars)
    }

    fn container_path<'a>(&self, rest: &[Seg<'a>]) -> Vec<Seg<'a>> {
        let mut path: Vec<Seg<'a>> = POD_SPEC.to_vec();
        path.push(Seg::Key("containers"));
        path.push(Seg::Index(0));
        path.extend_from_slice(rest);
        path
    }

    fn lookup(&self, path: &[Seg<'_>]) -> Result<&Value> {
        let mut current = &self.document;
        for (depth, seg) in path.iter().enumerate() {
            let next = match seg {
                Seg::Key(k) => current.get(*k),
                Seg::Index(i) => current.get(*i),
            };
            current = next.ok_or_else(|| self.missing(&path[..=depth]))?;
        }
        Ok(current)
    }

    fn missing(&self, path: &[Seg<'_>]) -> AppError {
        AppError::manifest(self.source.display().to_string(), render_path(path))
    }

    fn type_error(&self, path: &[Seg<'_>], expected: &str) -> AppError {
        AppError::parse(format!(
            "{}: '{}' is not {}",
            self.source.display(),
            render_path(path),
            expected
        ))
    }
}

fn render_path(path: &[Seg<'_>]) -> String {
    let mut out = String::new();
    for seg in path {
        match seg {
            Seg::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            Seg::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

/// How container ports are checked
#[derive(Debug, Clone, PartialEq)]
pub enum PortExpectation {
    /// The first declared port must be this one
    First(u16),
    /// Every listed port must be declared somewhere
    Contains(Vec<u16>),
}

/// Pod security requirements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityExpectation {
    /// `runAsRoot` must be present and not `true`
    pub forbid_run_as_root: bool,
    pub run_as_non_root: Option<bool>,
    pub run_as_user: Option<i64>,
}

/// An environment variable whose value must be one of `allowed`
#[derive(Debug, Clone, PartialEq)]
pub struct EnvExpectation {
    pub name: String,
    pub allowed: Vec<String>,
}

/// Expected field values for one manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestExpectations {
    /// Label used for check names, e.g. `redis`
    pub service: String,
    /// `repo:tag` the image reference must name, with or without a registry prefix
    pub image: String,
    pub ports: PortExpectation,
    pub volumes: Vec<String>,
    pub security: Option<SecurityExpectation>,
    pub env: Vec<EnvExpectation>,
}

/// Expectations for `redis/redis-master.yaml`
pub fn redis_expectations() -> ManifestExpectations {
    ManifestExpectations {
        service: "redis".to_string(),
        image: "redis:7.2.4".to_string(),
        ports: PortExpectation::First(6379),
        volumes: vec!["redis-data".to_string()],
        security: Some(SecurityExpectation {
            forbid_run_as_root: true,
            ..Default::default()
        }),
        env: Vec::new(),
    }
}

/// Expectations for `vault/vault-config.yaml`
pub fn vault_expectations() -> ManifestExpectations {
    ManifestExpectations {
        service: "vault".to_string(),
        image: "vault:1.15.2".to_string(),
        ports: PortExpectation::Contains(vec![8200, 8201]),
        volumes: vec!["vault-data".to_string(), "vault-config".to_string()],
        security: Some(SecurityExpectation {
            forbid_run_as_root: false,
            run_as_non_root: Some(true),
            run_as_user: Some(1000),
        }),
        env: vec![EnvExpectation {
            name: "VAULT_ADDR".to_string(),
            allowed: vec![
                "https://127.0.0.1:8200".to_string(),
                "http://127.0.0.1:8200".to_string(),
            ],
        }],
    }
}

/// Field group covered by one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckGroup {
    Version,
    Ports,
    Volumes,
    Security,
    Environment,
}

impl CheckGroup {
    pub fn name(&self) -> &'static str {
        match self {
            CheckGroup::Version => "version",
            CheckGroup::Ports => "ports",
            CheckGroup::Volumes => "volumes",
            CheckGroup::Security => "security_context",
            CheckGroup::Environment => "environment",
        }
    }
}

impl fmt::Display for CheckGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one field-group check
#[derive(Debug)]
pub struct CheckOutcome {
    pub service: String,
    pub group: CheckGroup,
    pub result: Result<()>,
}

impl CheckOutcome {
    /// Check name such as `redis_version`
    pub fn name(&self) -> String {
        format!("{}_{}", self.service, self.group.name())
    }

    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every applicable field-group check; groups with no expectations are skipped
pub fn validate(manifest: &Manifest, expected: &ManifestExpectations) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::new();
    let mut push = |group: CheckGroup, result: Result<()>| {
        outcomes.push(CheckOutcome {
            service: expected.service.clone(),
            group,
            result,
        });
    };

    push(CheckGroup::Version, check_version(manifest, &expected.image));
    push(CheckGroup::Ports, check_ports(manifest, &expected.ports));

    if !expected.volumes.is_empty() {
        push(CheckGroup::Volumes, check_volumes(manifest, &expected.volumes));
    }
    if let Some(security) = &expected.security {
        push(CheckGroup::Security, check_security(manifest, security));
    }
    if !expected.env.is_empty() {
        push(CheckGroup::Environment, check_env(manifest, &expected.env));
    }

    outcomes
}

fn check_version(manifest: &Manifest, expected: &str) -> Result<()> {
    let image = manifest.image()?;
    if image_matches(image, expected) {
        Ok(())
    } else {
        Err(AppError::assertion(format!("image '{}' is not '{}'", image, expected)))
    }
}

/// `image` equals `expected`, or ends with it after a `/` path separator
fn image_matches(image: &str, expected: &str) -> bool {
    match image.strip_suffix(expected) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('/'),
        None => false,
    }
}

fn check_ports(manifest: &Manifest, expected: &PortExpectation) -> Result<()> {
    let ports = manifest.container_ports()?;
    match expected {
        PortExpectation::First(port) => match ports.first() {
            Some(first) if first == port => Ok(()),
            Some(first) => Err(AppError::assertion(format!("first containerPort is {}, expected {}", first, port))),
            None => Err(AppError::assertion(format!("no containerPort declared, expected {}", port))),
        },
        PortExpectation::Contains(required) => {
            let missing: Vec<String> = required
                .iter()
                .filter(|p| !ports.contains(p))
                .map(u16::to_string)
                .collect();
            if missing.is_empty() {
                Ok(())
            } else {
                Err(AppError::assertion(format!("containerPort(s) {} not declared", missing.join(", "))))
            }
        }
    }
}

fn check_volumes(manifest: &Manifest, required: &[String]) -> Result<()> {
    let names = manifest.volume_names()?;
    let missing: Vec<&str> = required
        .iter()
        .filter(|r| !names.contains(r))
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::assertion(format!("volume(s) {} not declared", missing.join(", "))))
    }
}

fn check_security(manifest: &Manifest, expected: &SecurityExpectation) -> Result<()> {
    let ctx = manifest.security_context()?;
    let ctx_path = "spec.template.spec.securityContext";
    let source = manifest.source().display().to_string();

    if expected.forbid_run_as_root {
        match ctx.run_as_root {
            None => return Err(AppError::manifest(&source, format!("{}.runAsRoot", ctx_path))),
            Some(true) => return Err(AppError::assertion("runAsRoot is true")),
            Some(false) => {}
        }
    }

    if let Some(want) = expected.run_as_non_root {
        match ctx.run_as_non_root {
            None => return Err(AppError::manifest(&source, format!("{}.runAsNonRoot", ctx_path))),
            Some(got) if got != want => {
                return Err(AppError::assertion(format!("runAsNonRoot is {}, expected {}", got, want)))
            }
            Some(_) => {}
        }
    }

    if let Some(want) = expected.run_as_user {
        match ctx.run_as_user {
            None => return Err(AppError::manifest(&source, format!("{}.runAsUser", ctx_path))),
            Some(got) if got != want => {
                return Err(AppError::assertion(format!("runAsUser is {}, expected {}", got, want)))
            }
            Some(_) => {}
        }
    }

    Ok(())
}

fn check_env(manifest: &Manifest, expected: &[EnvExpectation]) -> Result<()> {
    let env = manifest.env()?;
    let source = manifest.source().display().to_string();

    for rule in expected {
        let value = env.get(&rule.name).ok_or_else(|| {
            AppError::manifest(&source, format!("spec.template.spec.containers[0].env[name={}]", rule.name))
        })?;

        if !rule.allowed.iter().any(|a| a == value) {
            return Err(AppError::assertion(format!(
                "{}='{}' is not one of: {}",
                rule.name,
                value,
                rule.allowed.join(", ")
            )));
        }
    }

    Ok(())
}
