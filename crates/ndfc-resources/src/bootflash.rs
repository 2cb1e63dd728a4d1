//! Bootflash files on switches.
//!
//! Files are listed per switch and partition (`bootflash:`,
//! `bootflash://sup-standby/`, ...). Deletion targets name a directory and
//! a filename pattern; `*` and `?` match as in a shell glob.

use async_trait::async_trait;
use glob::Pattern;
use ndfc_common::endpoints::bootflash;
use ndfc_common::validations::validate_not_empty;
use ndfc_common::{NdfcError, NdfcResult, Reconciler, RestSend, Results, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::inventory::InventoryCache;
use crate::wire::string_or_default;

/// One file on a switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootflashFile {
    #[serde(default, deserialize_with = "string_or_default")]
    pub serial_number: String,
    /// Partition the file lives on
    #[serde(default, deserialize_with = "string_or_default")]
    pub partition: String,
    /// Full path, including the partition and the filename
    #[serde(default, deserialize_with = "string_or_default")]
    pub filepath: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub filename: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub size: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub date: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub bootflash_type: String,
}

impl BootflashFile {
    /// Directory part of `filepath`, with a trailing `/` if it has one.
    pub fn directory(&self) -> &str {
        self.filepath
            .strip_suffix(self.filename.as_str())
            .unwrap_or(&self.partition)
    }
}

/// Files on one switch.
#[derive(Debug, Clone, Default)]
pub struct BootflashInfo {
    serial_number: String,
    files: Vec<BootflashFile>,
}

impl BootflashInfo {
    /// Fetches the files on every partition of the switch with `serial`.
    #[instrument(skip(rest_send))]
    pub async fn query(rest_send: &RestSend, serial: &str) -> NdfcResult<Self> {
        let endpoint = bootflash::info(serial);
        let response = rest_send.get(&endpoint.path).await?;
        if response.is_not_found() {
            return Err(NdfcError::not_found("switch", serial));
        }
        let info = Self::from_reply(serial, &response.data)?;
        debug!(serial, count = info.files.len(), "Fetched bootflash files");
        Ok(info)
    }

    /// Parses a bootflash-info reply.
    pub fn from_reply(serial: &str, data: &Value) -> NdfcResult<Self> {
        let map = match data.get("bootFlashDataMap") {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => {
                return Ok(Self {
                    serial_number: serial.to_string(),
                    files: Vec::new(),
                })
            }
            Some(other) => {
                return Err(NdfcError::invalid_response(
                    "bootFlashDataMap",
                    format!("expected an object, got {}", other),
                ))
            }
        };

        let mut partitions: Vec<&str> = data
            .get("partitions")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if partitions.is_empty() {
            partitions = map.keys().map(String::as_str).collect();
        }

        let mut files = Vec::new();
        for partition in partitions {
            let Some(entries) = map.get(partition).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                let mut file: BootflashFile = serde_json::from_value(entry.clone())?;
                file.partition = partition.to_string();
                if file.serial_number.is_empty() {
                    file.serial_number = serial.to_string();
                }
                files.push(file);
            }
        }
        Ok(Self {
            serial_number: serial.to_string(),
            files,
        })
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn files(&self) -> &[BootflashFile] {
        &self.files
    }

    /// Files in `directory` whose name matches `pattern`.
    pub fn matching<'a>(
        &'a self,
        directory: &'a str,
        pattern: &'a Pattern,
    ) -> impl Iterator<Item = &'a BootflashFile> + 'a {
        let directory = trim_dir(directory);
        self.files.iter().filter(move |f| {
            trim_dir(f.directory()) == directory && pattern.matches(&f.filename)
        })
    }
}

fn trim_dir(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

fn default_filename() -> String {
    "*".to_string()
}

/// Files to delete from one switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootflashTarget {
    /// Management IP or serial number
    pub switch: String,
    /// Directory, including the partition, e.g. `bootflash:/images/`
    pub filepath: String,
    /// Filename or glob pattern
    #[serde(default = "default_filename")]
    pub filename: String,
}

impl BootflashTarget {
    fn pattern(&self) -> NdfcResult<Pattern> {
        Pattern::new(&self.filename).map_err(|e| {
            NdfcError::invalid_config("filename", format!("'{}': {}", self.filename, e))
        })
    }
}

/// User configuration for bootflash operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootflashConfig {
    /// Fabric used to resolve switches given by IP
    #[serde(default)]
    pub fabric: Option<String>,
    #[serde(default)]
    pub targets: Vec<BootflashTarget>,
}

impl BootflashConfig {
    pub fn validate(&self, state: State) -> NdfcResult<()> {
        if !matches!(state, State::Deleted | State::Query) {
            return Err(NdfcError::invalid_config(
                "state",
                "bootflash supports deleted and query",
            ));
        }
        for target in &self.targets {
            validate_not_empty("switch", &target.switch)?;
            validate_not_empty("filepath", &target.filepath)?;
            target.pattern()?;
            if crate::inventory::is_ipv4(&target.switch) && self.fabric.is_none() {
                return Err(NdfcError::invalid_config(
                    "fabric",
                    format!("required to resolve switch {}", target.switch),
                ));
            }
        }
        Ok(())
    }
}

/// Queries and deletes bootflash files.
///
/// - deleted: delete every file matching a target, in one request
/// - query: report every file matching a target
pub struct BootflashMgr {
    rest_send: RestSend,
    state: State,
    config: BootflashConfig,
    inventories: InventoryCache,
    /// Files on each targeted switch, by serial number
    have: BTreeMap<String, BootflashInfo>,
    /// Serial number for each target
    serials: Vec<String>,
    need: Vec<BootflashFile>,
    results: Results,
}

impl BootflashMgr {
    /// Creates a manager for `config`.
    pub fn new(rest_send: RestSend, state: State, config: BootflashConfig) -> Self {
        let results = Results::new(state, rest_send.check_mode());
        Self {
            rest_send,
            state,
            config,
            inventories: InventoryCache::new(),
            have: BTreeMap::new(),
            serials: Vec::new(),
            need: Vec::new(),
            results,
        }
    }

    /// Files on each targeted switch.
    pub fn have(&self) -> &BTreeMap<String, BootflashInfo> {
        &self.have
    }

    /// Files matched by the targets.
    pub fn need(&self) -> &[BootflashFile] {
        &self.need
    }

    /// Consumes the manager, returning its results.
    pub fn into_results(self) -> Results {
        self.results
    }

    async fn resolve(&mut self, switch: &str) -> NdfcResult<String> {
        match &self.config.fabric {
            Some(fabric) => {
                let fabric = fabric.clone();
                self.inventories
                    .resolve(&self.rest_send, &fabric, switch)
                    .await
            }
            None => Ok(switch.to_string()),
        }
    }
}

/// Builds the delete request body, grouping files by switch.
pub fn delete_body(files: &[BootflashFile]) -> Value {
    let mut by_serial: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for file in files {
        by_serial
            .entry(file.serial_number.as_str())
            .or_default()
            .push(json!({
                "filePath": file.directory(),
                "fileName": file.filename,
                "bootflashType": file.bootflash_type,
            }));
    }
    let delete_files: Vec<Value> = by_serial
        .into_iter()
        .map(|(serial, files)| json!({"serialNumber": serial, "files": files}))
        .collect();
    json!({ "deleteFiles": delete_files })
}

#[async_trait]
impl Reconciler for BootflashMgr {
    fn name(&self) -> &str {
        "bootflash"
    }

    fn state(&self) -> State {
        self.state
    }

    fn build_want(&mut self) -> NdfcResult<()> {
        self.config.validate(self.state)
    }

    #[instrument(skip(self))]
    async fn fetch_have(&mut self) -> NdfcResult<()> {
        let switches: Vec<String> = self.config.targets.iter().map(|t| t.switch.clone()).collect();
        let mut serials = Vec::with_capacity(switches.len());
        for switch in &switches {
            serials.push(self.resolve(switch).await?);
        }

        self.have.clear();
        for serial in &serials {
            if self.have.contains_key(serial) {
                continue;
            }
            let info = BootflashInfo::query(&self.rest_send, serial).await?;
            self.have.insert(serial.clone(), info);
        }
        self.serials = serials;
        Ok(())
    }

    fn build_need(&mut self) -> NdfcResult<()> {
        let mut need: Vec<BootflashFile> = Vec::new();
        for (target, serial) in self.config.targets.iter().zip(&self.serials) {
            let Some(info) = self.have.get(serial) else {
                continue;
            };
            let pattern = target.pattern()?;
            let mut matched = 0;
            for file in info.matching(&target.filepath, &pattern) {
                matched += 1;
                if !need.contains(file) {
                    need.push(file.clone());
                }
            }
            if matched == 0 {
                debug!(
                    serial = %serial,
                    filepath = %target.filepath,
                    filename = %target.filename,
                    "No matching files"
                );
            }
        }
        debug!(count = need.len(), "Computed need");
        self.need = need;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn apply(&mut self) -> NdfcResult<()> {
        let files = std::mem::take(&mut self.need);

        if self.state == State::Query {
            for file in files {
                self.results
                    .register_unchanged("query", serde_json::to_value(&file)?);
            }
            return Ok(());
        }

        if files.is_empty() {
            info!("No bootflash files to delete");
            return Ok(());
        }

        let endpoint = bootflash::delete_files();
        let body = delete_body(&files);
        self.rest_send
            .commit_with_results(
                &mut self.results,
                "delete",
                endpoint.verb,
                &endpoint.path,
                Some(body),
            )
            .await?;
        info!(count = files.len(), "Deleted bootflash files");
        Ok(())
    }

    fn results(&self) -> &Results {
        &self.results
    }
}
