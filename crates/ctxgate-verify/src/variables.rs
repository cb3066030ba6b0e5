//! Variable resolution and substitution.
//!
//! Each variable is computed once per run with the precedence
//! environment override → repository inspection → profile default.
//! The resolved set is an immutable value passed by reference into
//! the executor; there is no process-wide cache.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const VAR_PROJECT_TYPE: &str = "PROJECT_TYPE";
pub const VAR_PROJECT_COVERAGE: &str = "PROJECT_COVERAGE";
pub const VAR_PACKAGE_MANAGER: &str = "PACKAGE_MANAGER";
pub const VAR_PROJECT_NAME: &str = "PROJECT_NAME";

pub const VARIABLE_NAMES: [&str; 4] = [
    VAR_PROJECT_TYPE,
    VAR_PROJECT_COVERAGE,
    VAR_PACKAGE_MANAGER,
    VAR_PROJECT_NAME,
];

const CONFIG_FILE: &str = "ctxgate.toml";

/// Lockfile kind → package manager name, checked in listed order.
const LOCKFILES: [(&str, &str); 7] = [
    ("pnpm-lock.yaml", "pnpm"),
    ("yarn.lock", "yarn"),
    ("bun.lockb", "bun"),
    ("package-lock.json", "npm"),
    ("uv.lock", "uv"),
    ("poetry.lock", "poetry"),
    ("Cargo.lock", "cargo"),
];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Z][A-Z0-9_]*)\}").expect("variable token regex must compile")
    })
}

/// The immutable resolved variable set for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct VariableSet {
    values: BTreeMap<String, String>,
}

impl VariableSet {
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Replace every `${NAME}` token from the resolved set.
    ///
    /// A token still present after substitution is returned as an
    /// error so a malformed command is never executed silently.
    /// Substituting an already-substituted string is a no-op.
    pub fn substitute(&self, input: &str) -> Result<String, String> {
        let mut output = input.to_string();
        for (name, value) in &self.values {
            output = output.replace(&format!("${{{name}}}"), value);
        }
        if let Some(captures) = token_re().captures(&output) {
            return Err(captures[1].to_string());
        }
        Ok(output)
    }
}

/// Resolves the variable set from one repository root.
#[derive(Debug, Clone)]
pub struct Resolver {
    repo_root: PathBuf,
    env: BTreeMap<String, String>,
}

impl Resolver {
    /// Capture overrides from the process environment.
    pub fn from_process_env(repo_root: impl Into<PathBuf>) -> Self {
        let mut env = BTreeMap::new();
        for name in VARIABLE_NAMES {
            if let Ok(value) = std::env::var(name) {
                env.insert(name.to_string(), value);
            }
        }
        Self {
            repo_root: repo_root.into(),
            env,
        }
    }

    /// Explicit override map (tests, embedding callers).
    pub fn with_env(repo_root: impl Into<PathBuf>, env: BTreeMap<String, String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            env,
        }
    }

    pub fn resolve(&self) -> VariableSet {
        let project_type = self.resolve_project_type();
        let mut values = BTreeMap::new();
        values.insert(
            VAR_PROJECT_COVERAGE.to_string(),
            self.resolve_coverage(&project_type),
        );
        values.insert(
            VAR_PACKAGE_MANAGER.to_string(),
            self.resolve_package_manager(),
        );
        values.insert(VAR_PROJECT_NAME.to_string(), self.resolve_project_name());
        values.insert(VAR_PROJECT_TYPE.to_string(), project_type);
        VariableSet::from_values(values)
    }

    fn override_for(&self, name: &str) -> Option<String> {
        self.env
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn config(&self) -> Option<toml::Value> {
        read_toml(&self.repo_root.join(CONFIG_FILE))
    }

    fn resolve_project_type(&self) -> String {
        if let Some(value) = self.override_for(VAR_PROJECT_TYPE) {
            return value;
        }
        self.config()
            .as_ref()
            .and_then(|config| config.get("project"))
            .and_then(|project| project.get("type"))
            .and_then(toml::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "standard".to_string())
    }

    fn resolve_package_manager(&self) -> String {
        if let Some(value) = self.override_for(VAR_PACKAGE_MANAGER) {
            return value;
        }
        for (lockfile, manager) in LOCKFILES {
            if self.repo_root.join(lockfile).is_file() {
                return manager.to_string();
            }
        }
        "npm".to_string()
    }

    fn resolve_coverage(&self, project_type: &str) -> String {
        if let Some(value) = self.override_for(VAR_PROJECT_COVERAGE) {
            return value;
        }
        if let Some(minimum) = self
            .config()
            .as_ref()
            .and_then(|config| config.get("coverage"))
            .and_then(|coverage| coverage.get("minimum"))
            .and_then(toml_number)
        {
            return minimum;
        }
        if let Some(fail_under) = read_toml(&self.repo_root.join("pyproject.toml"))
            .as_ref()
            .and_then(|pyproject| pyproject.get("tool"))
            .and_then(|tool| tool.get("coverage"))
            .and_then(|coverage| coverage.get("report"))
            .and_then(|report| report.get("fail_under"))
            .and_then(toml_number)
        {
            return fail_under;
        }
        match project_type {
            "greenfield" => "98".to_string(),
            "legacy" => "70".to_string(),
            _ => "90".to_string(),
        }
    }

    fn resolve_project_name(&self) -> String {
        if let Some(value) = self.override_for(VAR_PROJECT_NAME) {
            return value;
        }
        if let Some(name) = read_toml(&self.repo_root.join("Cargo.toml"))
            .as_ref()
            .and_then(|manifest| manifest.get("package"))
            .and_then(|package| package.get("name"))
            .and_then(toml::Value::as_str)
        {
            return name.to_string();
        }
        if let Some(name) = fs::read_to_string(self.repo_root.join("package.json"))
            .ok()
            .and_then(|payload| serde_json::from_str::<serde_json::Value>(&payload).ok())
            .and_then(|package| {
                package
                    .get("name")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
            })
        {
            return name;
        }
        self.repo_root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    }
}

fn read_toml(path: &Path) -> Option<toml::Value> {
    let payload = fs::read_to_string(path).ok()?;
    toml::from_str(&payload).ok()
}

fn toml_number(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::Integer(n) => Some(n.to_string()),
        toml::Value::Float(n) => Some(n.to_string()),
        toml::Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    struct TempRepo {
        path: PathBuf,
    }

    impl TempRepo {
        fn new(label: &str) -> Self {
            let unique = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock should be after unix epoch")
                .as_nanos();
            let path = std::env::temp_dir().join(format!(
                "ctxgate-vars-{label}-{}-{unique}",
                std::process::id()
            ));
            fs::create_dir_all(&path).expect("temp repo should be created");
            Self { path }
        }
    }

    impl Drop for TempRepo {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_override_wins_over_inspection() {
        let repo = TempRepo::new("override");
        fs::write(repo.path.join("yarn.lock"), "").expect("lockfile");
        let resolver = Resolver::with_env(&repo.path, env(&[(VAR_PACKAGE_MANAGER, "pnpm")]));
        assert_eq!(resolver.resolve().get(VAR_PACKAGE_MANAGER), Some("pnpm"));
    }

    #[test]
    fn lockfile_selects_package_manager() {
        let repo = TempRepo::new("lockfile");
        fs::write(repo.path.join("pnpm-lock.yaml"), "").expect("lockfile");
        let resolver = Resolver::with_env(&repo.path, BTreeMap::new());
        assert_eq!(resolver.resolve().get(VAR_PACKAGE_MANAGER), Some("pnpm"));
    }

    #[test]
    fn greenfield_profile_defaults_coverage_to_98() {
        let repo = TempRepo::new("greenfield");
        fs::write(repo.path.join("ctxgate.toml"), "[project]\ntype = \"greenfield\"\n")
            .expect("config");
        let variables = Resolver::with_env(&repo.path, BTreeMap::new()).resolve();
        assert_eq!(variables.get(VAR_PROJECT_TYPE), Some("greenfield"));
        assert_eq!(variables.get(VAR_PROJECT_COVERAGE), Some("98"));
    }

    #[test]
    fn coverage_config_beats_profile_default() {
        let repo = TempRepo::new("coverage");
        fs::write(
            repo.path.join("ctxgate.toml"),
            "[project]\ntype = \"greenfield\"\n\n[coverage]\nminimum = 85\n",
        )
        .expect("config");
        let variables = Resolver::with_env(&repo.path, BTreeMap::new()).resolve();
        assert_eq!(variables.get(VAR_PROJECT_COVERAGE), Some("85"));
    }

    #[test]
    fn pyproject_fail_under_is_consulted() {
        let repo = TempRepo::new("pyproject");
        fs::write(
            repo.path.join("pyproject.toml"),
            "[tool.coverage.report]\nfail_under = 92\n",
        )
        .expect("pyproject");
        let variables = Resolver::with_env(&repo.path, BTreeMap::new()).resolve();
        assert_eq!(variables.get(VAR_PROJECT_COVERAGE), Some("92"));
    }

    #[test]
    fn project_name_falls_back_to_directory_basename() {
        let repo = TempRepo::new("name");
        let variables = Resolver::with_env(&repo.path, BTreeMap::new()).resolve();
        let name = variables.get(VAR_PROJECT_NAME).expect("name resolved");
        assert!(name.starts_with("ctxgate-vars-name-"));
    }

    #[test]
    fn substitution_replaces_known_and_flags_unknown() {
        let variables = VariableSet::from_values(env(&[
            (VAR_PROJECT_NAME, "demo"),
            (VAR_PROJECT_COVERAGE, "90"),
        ]));
        assert_eq!(
            variables
                .substitute("check ${PROJECT_NAME} at ${PROJECT_COVERAGE}%")
                .expect("substitution should succeed"),
            "check demo at 90%"
        );
        assert_eq!(
            variables.substitute("echo ${UNKNOWN_TOKEN}"),
            Err("UNKNOWN_TOKEN".to_string())
        );
    }

    #[test]
    fn substitution_is_idempotent() {
        let variables = VariableSet::from_values(env(&[(VAR_PROJECT_NAME, "demo")]));
        let once = variables
            .substitute("name=${PROJECT_NAME}")
            .expect("first substitution");
        let twice = variables.substitute(&once).expect("second substitution");
        assert_eq!(once, twice);
    }
}
