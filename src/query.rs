//! Read-only views of an analysed profile for a presentation layer.

use clap::Subcommand;
use globset::Glob;
use serde::Serialize;

use crate::{
    AnalysisConfig, CALLS, Call, CycleId, Events, Function, FunctionId, GraphError, GraphResult,
    Label, Profile, PruneOptions, SAMPLES2, TOTAL_TIME_RATIO,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub label: &'static str,
    pub value: f64,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSummary {
    pub id: FunctionId,
    pub name: String,
    pub stripped_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub called: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<CycleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    pub metrics: Vec<MetricValue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub callee_id: FunctionId,
    pub callee_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calls: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub id: CycleId,
    pub name: String,
    pub functions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time_ratio: Option<f64>,
}

/// Full record of one function, as printed by a `%pattern` selection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionRecord<'a> {
    id: FunctionId,
    name: &'a str,
    module: Option<&'a str>,
    filename: Option<&'a str>,
    called: f64,
    cycle: Option<CycleId>,
    weight: Option<f64>,
    events: &'a Events,
    calls: Vec<CallRecord<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallRecord<'a> {
    callee_id: FunctionId,
    ratio: Option<f64>,
    weight: Option<f64>,
    events: &'a Events,
}

fn metrics(events: &Events, labels: &[Label]) -> Vec<MetricValue> {
    labels
        .iter()
        .filter_map(|label| {
            let event = label.event();
            events.get(event).ok().map(|value| MetricValue {
                label: label.as_str(),
                value,
                formatted: event.format(value),
            })
        })
        .collect()
}

fn summary(function: &Function, labels: &[Label]) -> FunctionSummary {
    FunctionSummary {
        id: function.id,
        name: function.name.clone(),
        stripped_name: function.stripped_name(),
        module: function.module.clone(),
        filename: function.filename.clone(),
        called: function.called,
        cycle: function.cycle,
        weight: function.weight,
        metrics: metrics(&function.events, labels),
    }
}

fn record(function: &Function) -> FunctionRecord<'_> {
    FunctionRecord {
        id: function.id,
        name: &function.name,
        module: function.module.as_deref(),
        filename: function.filename.as_deref(),
        called: function.called,
        cycle: function.cycle,
        weight: function.weight,
        events: &function.events,
        calls: function
            .calls
            .values()
            .map(|call| CallRecord {
                callee_id: call.callee_id,
                ratio: call.ratio,
                weight: call.weight,
                events: &call.events,
            })
            .collect(),
    }
}

fn dump_events(out: &mut String, events: &Events) {
    for (event, value) in events.iter() {
        out.push_str(&format!("    {}: {}\n", event.name(), event.format(value)));
    }
}

impl Profile {
    pub fn function_summary(&self, id: FunctionId, labels: &[Label]) -> GraphResult<FunctionSummary> {
        Ok(summary(self.function(id)?, labels))
    }

    /// All functions, largest total time first.
    pub fn function_summaries(&self, labels: &[Label]) -> Vec<FunctionSummary> {
        let mut functions: Vec<&Function> = self.functions.values().collect();
        functions.sort_by(|a, b| {
            let total = |f: &Function| f.events.get(TOTAL_TIME_RATIO).unwrap_or_default();
            total(b).total_cmp(&total(a)).then_with(|| a.name.cmp(&b.name))
        });
        functions.into_iter().map(|f| summary(f, labels)).collect()
    }

    pub fn call_summaries(&self, id: FunctionId) -> GraphResult<Vec<CallSummary>> {
        let function = self.function(id)?;
        Ok(function
            .calls
            .values()
            .map(|call: &Call| CallSummary {
                callee_id: call.callee_id,
                callee_name: self
                    .functions
                    .get(&call.callee_id)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| call.callee_id.to_string()),
                ratio: call.ratio,
                weight: call.weight,
                calls: call.events.get(CALLS).ok(),
                samples: call.events.get(SAMPLES2).ok(),
                total_time_ratio: call.events.get(TOTAL_TIME_RATIO).ok(),
            })
            .collect())
    }

    pub fn cycle_summaries(&self) -> Vec<CycleSummary> {
        self.cycles
            .values()
            .map(|cycle| CycleSummary {
                id: cycle.id,
                name: cycle.id.to_string(),
                functions: cycle
                    .functions
                    .iter()
                    .filter_map(|id| self.functions.get(id).map(|f| f.name.clone()))
                    .collect(),
                total_time_ratio: cycle.events.get(TOTAL_TIME_RATIO).ok(),
            })
            .collect()
    }

    /// First function (in id order) named exactly `name`.
    pub fn function_id(&self, name: &str) -> Option<FunctionId> {
        self.functions.values().find(|f| f.name == name).map(|f| f.id)
    }

    /// Functions whose name matches the glob `pattern`.
    pub fn function_ids(&self, pattern: &str) -> GraphResult<Vec<FunctionId>> {
        let matcher = Glob::new(pattern)
            .map_err(|e| GraphError::InvalidArgument(format!("invalid glob {pattern:?}: {e}")))?
            .compile_matcher();
        Ok(self
            .functions
            .values()
            .filter(|f| matcher.is_match(&f.name))
            .map(|f| f.id)
            .collect())
    }

    /// `+`, `*` or no selector lists every id with its name; `%pattern` gives
    /// full records of matching functions; any other pattern lists matching names.
    pub fn select_functions(&self, selector: Option<&str>) -> GraphResult<serde_json::Value> {
        match selector {
            None | Some("+") | Some("*") => Ok(serde_json::Value::Array(
                self.functions
                    .values()
                    .map(|f| serde_json::json!({ "id": f.id, "name": f.name }))
                    .collect(),
            )),
            Some(selector) => match selector.strip_prefix('%') {
                Some(pattern) => {
                    let records: Vec<FunctionRecord<'_>> = self
                        .function_ids(pattern)?
                        .into_iter()
                        .filter_map(|id| self.functions.get(&id).map(record))
                        .collect();
                    Ok(serde_json::to_value(records)?)
                }
                None => {
                    let names: Vec<&str> = self
                        .function_ids(selector)?
                        .into_iter()
                        .filter_map(|id| self.functions.get(&id).map(|f| f.name.as_str()))
                        .collect();
                    Ok(serde_json::to_value(names)?)
                }
            },
        }
    }

    /// Flat, human-readable listing of every function, call and cycle.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for function in self.functions.values() {
            out.push_str(&format!("Function {}:\n", function.name));
            dump_events(&mut out, &function.events);
            for call in function.calls.values() {
                let callee = self
                    .functions
                    .get(&call.callee_id)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| call.callee_id.to_string());
                out.push_str(&format!("  Call {callee}:\n"));
                dump_events(&mut out, &call.events);
            }
        }
        for cycle in self.cycles.values() {
            out.push_str(&format!("Cycle {}:\n", cycle.id));
            dump_events(&mut out, &cycle.events);
            for member in &cycle.functions {
                if let Some(function) = self.functions.get(member) {
                    out.push_str(&format!("  Function {}\n", function.name));
                }
            }
        }
        out
    }

    /// Resolves a 16-digit function id or an exact function name.
    fn resolve_function(&self, selector: &str) -> GraphResult<FunctionId> {
        if let Ok(id) = selector.parse::<FunctionId>()
            && self.functions.contains_key(&id)
        {
            return Ok(id);
        }
        self.function_id(selector)
            .ok_or_else(|| GraphError::InvalidArgument(format!("no function named {selector:?}")))
    }

    fn resolve_patterns(&self, patterns: &[String]) -> GraphResult<Vec<FunctionId>> {
        let mut ids = Vec::new();
        for pattern in patterns {
            let matched = self.function_ids(pattern)?;
            if matched.is_empty() {
                return Err(GraphError::InvalidArgument(format!(
                    "no function matches {pattern:?}"
                )));
            }
            ids.extend(matched);
        }
        Ok(ids)
    }
}

#[derive(Debug, Subcommand)]
pub enum GraphCommand {
    /// List functions, largest total time first.
    Functions {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List recursion cycles and their members.
    Cycles,
    /// Find functions by exact name or glob pattern.
    Lookup {
        #[arg(value_name = "PATTERN")]
        pattern: String,
    },
    /// Show a function's outgoing calls with ratios and totals.
    Calls {
        #[arg(value_name = "NAME_OR_ID")]
        function: String,
    },
    /// Summarise a pruned copy of the graph.
    Prune {
        #[arg(long)]
        node_thres: Option<f64>,
        #[arg(long)]
        edge_thres: Option<f64>,
        #[arg(long = "path")]
        paths: Vec<String>,
        #[arg(long)]
        color_by_selftime: bool,
        #[arg(long)]
        root: Vec<String>,
        #[arg(long)]
        leaf: Vec<String>,
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Flat listing of every function, call and cycle.
    Dump,
}

pub fn graph_command(
    profile: &Profile,
    config: &AnalysisConfig,
    command: &GraphCommand,
) -> GraphResult<serde_json::Value> {
    let labels = &config.labels;
    match command {
        GraphCommand::Functions { limit } => {
            let functions: Vec<FunctionSummary> = profile
                .function_summaries(labels)
                .into_iter()
                .take(*limit)
                .collect();
            Ok(serde_json::json!({
                "schemaVersion": "grindgraph.functions.v1",
                "total": profile.functions.len(),
                "limit": limit,
                "functions": functions,
                "diagnostics": profile.diagnostics.len(),
            }))
        }
        GraphCommand::Cycles => Ok(serde_json::json!({
            "schemaVersion": "grindgraph.cycles.v1",
            "cycles": profile.cycle_summaries(),
        })),
        GraphCommand::Lookup { pattern } => {
            let matches = profile
                .function_ids(pattern)?
                .into_iter()
                .map(|id| profile.function_summary(id, labels))
                .collect::<GraphResult<Vec<_>>>()?;
            Ok(serde_json::json!({
                "schemaVersion": "grindgraph.lookup.v1",
                "pattern": pattern,
                "exact": profile.function_id(pattern),
                "matches": matches,
            }))
        }
        GraphCommand::Calls { function } => {
            let id = profile.resolve_function(function)?;
            Ok(serde_json::json!({
                "schemaVersion": "grindgraph.calls.v1",
                "function": profile.function_summary(id, labels)?,
                "calls": profile.call_summaries(id)?,
            }))
        }
        GraphCommand::Prune {
            node_thres,
            edge_thres,
            paths,
            color_by_selftime,
            root,
            leaf,
            depth,
        } => {
            let options = PruneOptions {
                node_thres: node_thres.unwrap_or(config.prune.node_thres),
                edge_thres: edge_thres.unwrap_or(config.prune.edge_thres),
                paths: if paths.is_empty() {
                    config.prune.paths.clone()
                } else {
                    paths.clone()
                },
                color_nodes_by_selftime: *color_by_selftime || config.prune.color_nodes_by_selftime,
            };
            let roots = profile.resolve_patterns(root)?;
            let leaves = profile.resolve_patterns(leaf)?;

            let mut pruned = profile.pruned(&options);
            if !roots.is_empty() {
                let kept: Vec<FunctionId> =
                    roots.into_iter().filter(|id| pruned.functions.contains_key(id)).collect();
                pruned.prune_root(&kept, *depth)?;
            }
            if !leaves.is_empty() {
                let kept: Vec<FunctionId> =
                    leaves.into_iter().filter(|id| pruned.functions.contains_key(id)).collect();
                pruned.prune_leaf(&kept, *depth)?;
            }
            Ok(serde_json::json!({
                "schemaVersion": "grindgraph.prune.v1",
                "options": options,
                "functions": pruned.function_summaries(labels),
                "calls": pruned.call_count(),
                "cycles": pruned.cycle_summaries(),
            }))
        }
        GraphCommand::Dump => Ok(serde_json::json!({
            "schemaVersion": "grindgraph.dump.v1",
            "header": profile.header,
            "dump": profile.dump(),
            "diagnostics": profile.diagnostics,
        })),
    }
}
