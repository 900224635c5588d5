use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use toml::Value;

use crate::error::{Error, Result};
use crate::model::{DEVICE_INVENTORY, Group};

#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    pub fn empty() -> Self {
        Self {
            path: PathBuf::from("<defaults>"),
            value: Value::Table(Default::default()),
        }
    }

    pub fn value_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.value);
        }
        let mut cur = &self.value;
        for seg in path.split('.') {
            cur = cur.as_table()?.get(seg)?;
        }
        Some(cur)
    }

    pub fn dashboard(&self) -> Result<DashboardConfig> {
        let cfg: DashboardConfig = self.value.clone().try_into().map_err(|e| {
            Error::msg(format!(
                "invalid dashboard config in {}: {e}",
                self.path.display()
            ))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_tbl), Value::Table(overlay_tbl)) => {
            for (k, v) in overlay_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

fn take_imports(path: &Path, table: &mut toml::Table) -> Result<Vec<String>> {
    let Some(raw) = table.remove("imports") else {
        return Ok(Vec::new());
    };
    let Some(arr) = raw.as_array() else {
        return Err(Error::msg(format!(
            "imports in {} must be an array of paths",
            path.display()
        )));
    };
    let mut out = Vec::new();
    for v in arr {
        let s = v.as_str().ok_or_else(|| {
            Error::msg(format!(
                "invalid imports entry in {} (expected string)",
                path.display()
            ))
        })?;
        if !s.trim().is_empty() {
            out.push(s.trim().to_string());
        }
    }
    Ok(out)
}

fn inline_imports(file: &Path, value: &mut Value, stack: &mut HashSet<PathBuf>) -> Result<()> {
    let Value::Table(tbl) = value else {
        return Ok(());
    };

    let imports = take_imports(file, tbl)?;
    if !imports.is_empty() {
        let mut acc = Value::Table(Default::default());
        for imp in imports {
            merge(&mut acc, load_layered(&resolve_ref_path(file, &imp), stack)?);
        }
        merge(&mut acc, Value::Table(std::mem::take(tbl)));
        if let Value::Table(merged) = acc {
            *tbl = merged;
        }
    }

    for (_, v) in tbl.iter_mut() {
        inline_imports(file, v, stack)?;
    }
    Ok(())
}

fn load_layered(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::msg(format!(
            "config import cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    if let Some(tbl) = value.as_table_mut() {
        if let Some(parent) = tbl.remove("extends") {
            let parent = parent.as_str().ok_or_else(|| {
                Error::msg(format!("extends in {} must be a path", path.display()))
            })?;
            out = load_layered(&resolve_ref_path(path, parent), stack)?;
        }
    }

    inline_imports(path, &mut value, stack)?;
    merge(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

/// Loads a config file, resolving a root `extends` parent and `imports`
/// lists at any table level.
pub fn load(path: &Path) -> Result<ConfigDoc> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_layered(path, &mut stack)?;
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}

pub fn load_or_default(path: Option<&Path>) -> Result<ConfigDoc> {
    match path {
        Some(p) => load(p),
        None => Ok(ConfigDoc::empty()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api: ApiConfig,
    pub refresh: RefreshConfig,
    pub groups: GroupsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub devices_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://20.246.73.238:5051/api".into(),
            timeout_ms: 10_000,
            devices_path: DEVICE_INVENTORY.into(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_ms: u64,
    pub auto: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            auto: true,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSource {
    pub prefix: String,
    pub entities: Vec<String>,
}

impl GroupSource {
    fn new(prefix: &str, entities: &[&str]) -> Self {
        Self {
            prefix: prefix.into(),
            entities: entities.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    pub cameras: GroupSource,
    pub environmental: GroupSource,
    pub energy: GroupSource,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            cameras: GroupSource::new("monitor_acceso", &["LPR1", "LPR2", "LPR3"]),
            environmental: GroupSource::new("monitor_ambiental", &["EST1", "EST2", "EST3"]),
            energy: GroupSource::new(
                "monitor_energia",
                &["EV-001", "EV-002", "EV-003", "EV-004"],
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
            file: PathBuf::from("monitor.log"),
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::msg("api.base_url must not be empty"));
        }
        if self.refresh.interval_ms == 0 {
            return Err(Error::msg("refresh.interval_ms must be greater than zero"));
        }
        for (name, src) in [
            ("cameras", &self.groups.cameras),
            ("environmental", &self.groups.environmental),
            ("energy", &self.groups.energy),
        ] {
            if src.entities.is_empty() {
                return Err(Error::msg(format!("groups.{name}.entities must not be empty")));
            }
            let mut seen = HashSet::new();
            for id in &src.entities {
                if !seen.insert(id.as_str()) {
                    return Err(Error::msg(format!(
                        "groups.{name}.entities lists '{id}' twice"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Applies `MONITOR_*` environment overrides on top of the file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MONITOR_API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(ms) = lookup("MONITOR_REFRESH_MS") {
            self.refresh.interval_ms = ms
                .trim()
                .parse()
                .map_err(|_| Error::msg(format!("MONITOR_REFRESH_MS='{ms}' is not a number")))?;
        }
        if let Some(flag) = lookup("MONITOR_AUTO_REFRESH") {
            self.refresh.auto = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(Error::msg(format!(
                        "MONITOR_AUTO_REFRESH='{flag}' is not a boolean"
                    )));
                }
            };
        }
        self.validate()
    }

    pub fn sources(&self) -> SourcesConfig {
        SourcesConfig {
            groups: self.groups.clone(),
            devices_path: self.api.devices_path.clone(),
        }
    }
}

/// Where each entity's data lives upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcesConfig {
    pub groups: GroupsConfig,
    pub devices_path: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        DashboardConfig::default().sources()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Entity { actual: String, history: String },
    Inventory { path: String },
}

impl SourcesConfig {
    fn group_source(&self, group: Group) -> Option<&GroupSource> {
        match group {
            Group::Cameras => Some(&self.groups.cameras),
            Group::Environmental => Some(&self.groups.environmental),
            Group::Energy => Some(&self.groups.energy),
            Group::Devices => None,
        }
    }

    pub fn entities(&self, group: Group) -> Vec<String> {
        match self.group_source(group) {
            Some(src) => src.entities.clone(),
            None => vec![DEVICE_INVENTORY.to_string()],
        }
    }

    pub fn entity_count(&self, group: Group) -> usize {
        self.group_source(group)
            .map(|s| s.entities.len())
            .unwrap_or(1)
    }

    pub fn default_entity(&self, group: Group) -> String {
        self.entities(group)
            .into_iter()
            .next()
            .unwrap_or_else(|| DEVICE_INVENTORY.to_string())
    }

    pub fn endpoint(&self, group: Group, id: &str) -> Endpoint {
        match self.group_source(group) {
            Some(src) => {
                let base = format!("{}_{}", src.prefix, id);
                Endpoint::Entity {
                    actual: format!("{base}/actual"),
                    history: format!("{base}/historico"),
                }
            }
            None => Endpoint::Inventory {
                path: self.devices_path.clone(),
            },
        }
    }
}
