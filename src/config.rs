//! Analysis configuration, optionally loaded from a TOML file.

use serde::{Deserialize, Serialize};

use std::path::Path;

use crate::{
    CALLS, Event, GraphError, GraphResult, SAMPLES, TIME_RATIO, TOTAL_SAMPLES, TOTAL_TIME_RATIO,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct AnalysisConfig {
    /// `events:` column that drives self and edge costs; the first column when unset.
    #[serde(default)]
    pub cost_event: Option<String>,

    #[serde(default)]
    pub total_method: TotalMethod,

    /// Metrics reported for each function in summaries.
    #[serde(default = "default_labels")]
    pub labels: Vec<Label>,

    #[serde(default)]
    pub prune: PruneOptions,
}

/// How the total-time metric is derived.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TotalMethod {
    /// Propagate self time along call ratios.
    #[default]
    CallRatios,
    /// Use the inclusive cost recorded on call edges directly.
    Callstacks,
}

impl clap::ValueEnum for TotalMethod {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::CallRatios, Self::Callstacks]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::CallRatios => clap::builder::PossibleValue::new("call-ratios"),
            Self::Callstacks => clap::builder::PossibleValue::new("callstacks"),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Label {
    SelfSamples,
    SelfTimePercentage,
    TotalSamples,
    TotalTimePercentage,
    Calls,
}

impl Label {
    pub fn event(&self) -> Event {
        match self {
            Self::SelfSamples => SAMPLES,
            Self::SelfTimePercentage => TIME_RATIO,
            Self::TotalSamples => TOTAL_SAMPLES,
            Self::TotalTimePercentage => TOTAL_TIME_RATIO,
            Self::Calls => CALLS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfSamples => "self-samples",
            Self::SelfTimePercentage => "self-time-percentage",
            Self::TotalSamples => "total-samples",
            Self::TotalTimePercentage => "total-time-percentage",
            Self::Calls => "calls",
        }
    }
}

impl clap::ValueEnum for Label {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::SelfSamples,
            Self::SelfTimePercentage,
            Self::TotalSamples,
            Self::TotalTimePercentage,
            Self::Calls,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

fn default_labels() -> Vec<Label> {
    vec![Label::TotalTimePercentage, Label::SelfTimePercentage]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PruneOptions {
    /// Functions whose total-time ratio is below this are dropped.
    #[serde(default = "default_node_thres")]
    pub node_thres: f64,

    /// Calls whose weight is below this are dropped.
    #[serde(default = "default_edge_thres")]
    pub edge_thres: f64,

    /// Keep only functions whose filename starts with, or whose module contains, one of these.
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default)]
    pub color_nodes_by_selftime: bool,
}

fn default_node_thres() -> f64 {
    0.005
}

fn default_edge_thres() -> f64 {
    0.001
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            node_thres: default_node_thres(),
            edge_thres: default_edge_thres(),
            paths: Vec::new(),
            color_nodes_by_selftime: false,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cost_event: None,
            total_method: TotalMethod::default(),
            labels: default_labels(),
            prune: PruneOptions::default(),
        }
    }
}

impl AnalysisConfig {
    /// Loads `path`, falling back to defaults when it is missing or unusable.
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<AnalysisConfig>(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> GraphResult<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: AnalysisConfig = toml::from_str(&s)?;
        cfg.check()?;
        Ok(cfg)
    }

    fn check(&self) -> GraphResult<()> {
        for (name, value) in [
            ("node_thres", self.prune.node_thres),
            ("edge_thres", self.prune.edge_thres),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GraphError::Config(format!(
                    "prune.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn temp_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("grindgraph-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.total_method, TotalMethod::CallRatios);
        assert_eq!(cfg.labels, vec![Label::TotalTimePercentage, Label::SelfTimePercentage]);
        assert_eq!(cfg.prune.node_thres, 0.005);
        assert_eq!(cfg.prune.edge_thres, 0.001);
        assert!(cfg.prune.paths.is_empty());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_config(
            r#"
cost_event = "Ir"
total_method = "callstacks"
labels = ["self-samples", "calls"]

[prune]
node_thres = 0.1
paths = ["/usr/src/app"]
"#,
        );
        let cfg = AnalysisConfig::load(&path).expect("load");
        assert_eq!(cfg.cost_event.as_deref(), Some("Ir"));
        assert_eq!(cfg.total_method, TotalMethod::Callstacks);
        assert_eq!(cfg.labels, vec![Label::SelfSamples, Label::Calls]);
        assert_eq!(cfg.prune.node_thres, 0.1);
        assert_eq!(cfg.prune.edge_thres, 0.001);
        assert_eq!(cfg.prune.paths, vec!["/usr/src/app".to_string()]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("grindgraph-missing-{}.toml", uuid::Uuid::new_v4()));
        assert_eq!(AnalysisConfig::load_optional(&path), AnalysisConfig::default());
        assert!(matches!(AnalysisConfig::load(&path), Err(GraphError::Io(_))));
    }

    #[test]
    fn invalid_file_is_lenient_or_strict() {
        let path = temp_config("total_method = \"guess\"\n");
        assert_eq!(AnalysisConfig::load_optional(&path), AnalysisConfig::default());
        assert!(matches!(AnalysisConfig::load(&path), Err(GraphError::Toml(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let path = temp_config("[prune]\nedge_thres = 2.0\n");
        assert!(matches!(AnalysisConfig::load(&path), Err(GraphError::Config(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn labels_map_to_events() {
        assert_eq!(Label::TotalTimePercentage.event(), TOTAL_TIME_RATIO);
        assert_eq!(Label::SelfSamples.event(), SAMPLES);
        assert_ne!(Label::SelfSamples.event(), TOTAL_SAMPLES);
    }
}
