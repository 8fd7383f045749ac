//! Call graph model: functions, calls, cycles and the owning profile.
//!
//! The profile is an arena keyed by [`FunctionId`]. Calls name their callee by
//! id and functions name their cycle by [`CycleId`], so no entity holds a
//! reference to another.

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::{CALLS, Diagnostic, DiagnosticKind, Events, GraphError, GraphResult, SAMPLES2};

/// Stable function identity derived from the object (module) name and the function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(u64);

impl FunctionId {
    pub fn from_parts(module: Option<&str>, name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(module.unwrap_or_default().as_bytes());
        hasher.update(&[0]);
        hasher.update(name.as_bytes());
        let hash = hasher.finalize();
        let b = hash.as_bytes();
        Self(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    pub fn from_name(name: &str) -> Self {
        Self::from_parts(None, name)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for FunctionId {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(GraphError::InvalidArgument(format!(
                "function id {s:?} must be 16 hex digits"
            )));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| GraphError::InvalidArgument(format!("invalid function id {s:?}: {e}")))
    }
}

impl Serialize for FunctionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CycleId(usize);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle#{}", self.0)
    }
}

/// A call edge from the owning function to `callee_id`.
///
/// There is at most one call per (caller, callee) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee_id: FunctionId,
    /// Share of the callee's incoming cost carried by this edge. Set once by `call_ratios`.
    pub ratio: Option<f64>,
    pub weight: Option<f64>,
    pub events: Events,
}

impl Call {
    pub fn new(callee_id: FunctionId) -> Self {
        Self {
            callee_id,
            ratio: None,
            weight: None,
            events: Events::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub module: Option<String>,
    pub filename: Option<String>,
    pub calls: BTreeMap<FunctionId, Call>,
    /// Number of times this function was called.
    pub called: f64,
    pub cycle: Option<CycleId>,
    pub weight: Option<f64>,
    pub events: Events,
}

static PARENTHESIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^()]*\)").expect("static regex"));
static ANGLES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("static regex"));
static CONST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+const$").expect("static regex"));

impl Function {
    pub fn new(id: FunctionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            module: None,
            filename: None,
            calls: BTreeMap::new(),
            called: 0.0,
            cycle: None,
            weight: None,
            events: Events::new(),
        }
    }

    /// Returns the call to `callee_id`, creating it with zeroed counters on first use.
    pub fn call_mut(&mut self, callee_id: FunctionId) -> &mut Call {
        self.calls.entry(callee_id).or_insert_with(|| {
            let mut call = Call::new(callee_id);
            call.events.insert(CALLS, 0.0);
            call.events.insert(SAMPLES2, 0.0);
            call
        })
    }

    /// Name without C++ parameter lists, template arguments or a trailing `const`.
    pub fn stripped_name(&self) -> String {
        let mut name = self.name.clone();
        loop {
            let next = PARENTHESIS_RE.replace_all(&name, "").into_owned();
            if next == name {
                break;
            }
            name = next;
        }
        name = CONST_RE.replace(&name, "").into_owned();
        loop {
            let next = ANGLES_RE.replace_all(&name, "").into_owned();
            if next == name {
                break;
            }
            name = next;
        }
        name
    }

    /// Outgoing calls excluding a direct self-call.
    pub fn outgoing(&self) -> impl Iterator<Item = &Call> + '_ {
        self.calls.values().filter(move |c| c.callee_id != self.id)
    }
}

/// A recursion group: functions that all reach each other.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub id: CycleId,
    pub functions: BTreeSet<FunctionId>,
    pub events: Events,
}

/// Header key/values of a callgrind trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TraceHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default)]
    pub parts: Vec<String>,
    #[serde(default)]
    pub desc: Vec<String>,
    /// Raw `event:` lines describing individual events.
    #[serde(default)]
    pub event_specs: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub positions: Vec<String>,
    /// First value of `summary:`/`totals:`, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<f64>,
}

/// The whole call graph.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub header: TraceHeader,
    pub functions: BTreeMap<FunctionId, Function>,
    pub cycles: BTreeMap<CycleId, Cycle>,
    pub events: Events,
    pub diagnostics: Vec<Diagnostic>,
    next_cycle: usize,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a function, keeping the existing one if the id is already taken.
    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let id = function.id;
        if self.functions.contains_key(&id) {
            self.warn(
                DiagnosticKind::DuplicateFunction,
                None,
                format!("function {} (id {id}) already defined; keeping first", function.name),
            );
            return id;
        }
        self.functions.insert(id, function);
        id
    }

    pub fn function(&self, id: FunctionId) -> GraphResult<&Function> {
        self.functions
            .get(&id)
            .ok_or_else(|| GraphError::InvalidArgument(format!("unknown function id {id}")))
    }

    pub fn function_mut(&mut self, id: FunctionId) -> GraphResult<&mut Function> {
        self.functions
            .get_mut(&id)
            .ok_or_else(|| GraphError::InvalidArgument(format!("unknown function id {id}")))
    }

    pub fn cycle_of(&self, id: FunctionId) -> Option<CycleId> {
        self.functions.get(&id).and_then(|f| f.cycle)
    }

    pub fn call_count(&self) -> usize {
        self.functions.values().map(|f| f.calls.len()).sum()
    }

    /// Records a recoverable condition and logs it as a warning.
    pub fn warn(&mut self, kind: DiagnosticKind, line: Option<usize>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?kind, line, "{message}");
        self.diagnostics.push(Diagnostic::new(kind, line, message));
    }

    /// Like [`Profile::warn`] but logged at debug level, for conditions that real traces repeat often.
    pub fn note(&mut self, kind: DiagnosticKind, line: Option<usize>, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(?kind, line, "{message}");
        self.diagnostics.push(Diagnostic::new(kind, line, message));
    }

    /// Drops calls whose callee is not part of the profile.
    pub fn validate(&mut self) {
        let known: BTreeSet<FunctionId> = self.functions.keys().copied().collect();
        let mut dropped = Vec::new();
        for function in self.functions.values_mut() {
            let missing: Vec<FunctionId> = function
                .calls
                .keys()
                .filter(|callee| !known.contains(callee))
                .copied()
                .collect();
            for callee in missing {
                function.calls.remove(&callee);
                dropped.push((function.name.clone(), callee));
            }
        }
        for (caller, callee) in dropped {
            self.warn(
                DiagnosticKind::UndefinedCallee,
                None,
                format!("call to undefined function {callee} from function {caller}"),
            );
        }
    }

    /// Creates an empty cycle.
    pub fn new_cycle(&mut self) -> CycleId {
        let id = CycleId(self.next_cycle);
        self.next_cycle += 1;
        self.cycles.insert(
            id,
            Cycle {
                id,
                functions: BTreeSet::new(),
                events: Events::new(),
            },
        );
        id
    }

    /// Adds `function` to `cycle`; any cycle it already belonged to is merged in.
    pub fn add_to_cycle(&mut self, cycle: CycleId, function: FunctionId) -> GraphResult<()> {
        if !self.cycles.contains_key(&cycle) {
            return Err(GraphError::InvalidArgument(format!("unknown {cycle}")));
        }
        let previous = self.function(function)?.cycle;
        let mut members = vec![function];
        if let Some(previous) = previous
            && previous != cycle
            && let Some(old) = self.cycles.remove(&previous)
        {
            members.extend(old.functions);
        }
        for member in members {
            if let Some(f) = self.functions.get_mut(&member) {
                f.cycle = Some(cycle);
            }
            if let Some(c) = self.cycles.get_mut(&cycle) {
                c.functions.insert(member);
            }
        }
        Ok(())
    }

    pub(crate) fn clear_cycles(&mut self) {
        for function in self.functions.values_mut() {
            function.cycle = None;
        }
        self.cycles.clear();
        self.next_cycle = 0;
    }

    /// Restricts cycle membership to functions still present; drops empty cycles.
    pub(crate) fn retain_cycles(&mut self) {
        let functions = &self.functions;
        for cycle in self.cycles.values_mut() {
            cycle.functions.retain(|id| functions.contains_key(id));
        }
        self.cycles.retain(|_, c| !c.functions.is_empty());
    }
}
