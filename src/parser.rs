//! Callgrind trace reader.
//!
//! The grammar is line oriented. Position values and the current
//! object/file/function registers persist from one line to the next until
//! they are overwritten, so the parser is a small state machine fed one line
//! at a time. Lines it cannot make sense of are skipped with a diagnostic.

use regex::{Captures, Regex};

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;
use std::sync::LazyLock;

use crate::{
    AnalysisConfig, CALLS, DiagnosticKind, Function, FunctionId, GraphError, GraphResult,
    Profile, SAMPLES, SAMPLES2, analyze,
};

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+):").expect("static regex"));

static COST_RE: LazyLock<Regex> = LazyLock::new(|| {
    let subposition = r"(?:0x[0-9a-fA-F]+|\d+|\+\d+|-\d+|\*)";
    Regex::new(&format!(r"^{subposition}(?:[ \t]+{subposition})*(?:[ \t]+\d+)*$"))
        .expect("static regex")
});

static SUBPOSITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:0x[0-9a-fA-F]+|\d+|\+\d+|-\d+|\*)$").expect("static regex"));

static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<position>[cj]?(?:ob|fl|fi|fe|fn))=\s*(?:\((?P<id>\d+)\))?(?:\s*(?P<name>.+))?")
        .expect("static regex")
});

/// Compressed names are numbered separately per kind; `fi`/`fe` share the file table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NameTable {
    Object,
    File,
    Function,
}

#[derive(Debug, Default)]
struct Context {
    ob: Option<String>,
    fl: Option<String>,
    func: Option<String>,
    cob: Option<String>,
    cfl: Option<String>,
    cfn: Option<String>,
}

fn basename(module: &str) -> String {
    Path::new(module)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(module)
        .to_string()
}

/// Incremental callgrind parser producing a raw (not yet analysed) [`Profile`].
pub struct CallgrindParser<'a> {
    config: &'a AnalysisConfig,
    profile: Profile,
    line: usize,
    in_header: bool,
    num_events: Option<usize>,
    cost_index: usize,
    last_positions: Vec<i64>,
    names: HashMap<(NameTable, u64), String>,
    context: Context,
    pending_calls: Option<f64>,
    defined: HashSet<FunctionId>,
    noted_functions: HashSet<FunctionId>,
    noted_calls: HashSet<(FunctionId, FunctionId)>,
}

impl<'a> CallgrindParser<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        let mut profile = Profile::new();
        profile.events.insert(SAMPLES, 0.0);
        profile.header.positions = vec!["line".to_string()];
        Self {
            config,
            profile,
            line: 0,
            in_header: true,
            num_events: None,
            cost_index: 0,
            last_positions: vec![0],
            names: HashMap::new(),
            context: Context::default(),
            pending_calls: None,
            defined: HashSet::new(),
            noted_functions: HashSet::new(),
            noted_calls: HashSet::new(),
        }
    }

    /// Last decoded value of every position dimension.
    pub fn last_positions(&self) -> &[i64] {
        &self.last_positions
    }

    pub fn parse<R: BufRead>(mut self, reader: R) -> GraphResult<Profile> {
        for line in reader.lines() {
            let line = line.map_err(|err| GraphError::Parse {
                line: self.line + 1,
                message: err.to_string(),
            })?;
            self.feed_line(&line)?;
        }
        self.finish()
    }

    /// Consumes one line of input.
    pub fn feed_line(&mut self, raw: &str) -> GraphResult<()> {
        self.line += 1;
        let line = raw.trim_end();
        if line.trim_start().is_empty() || line.starts_with('#') {
            return Ok(());
        }

        if let Some(caps) = KEY_RE.captures(line) {
            let key = caps[1].to_string();
            let value = line[key.len() + 1..].trim();
            if !self.header_line(&key, value) {
                self.warn(DiagnosticKind::UnexpectedLine, format!("unknown key {key:?}"));
            }
            return Ok(());
        }

        if self.in_header {
            if self.num_events.is_none() {
                return Err(GraphError::Parse {
                    line: self.line,
                    message: "trace body starts before any events: declaration".to_string(),
                });
            }
            self.in_header = false;
        }

        if let Some(calls) = self.pending_calls.take() {
            if COST_RE.is_match(line) {
                self.cost_line(line, Some(calls));
                return Ok(());
            }
            self.warn(
                DiagnosticKind::MalformedLine,
                "calls= line not followed by a cost line",
            );
        }

        if COST_RE.is_match(line) {
            self.cost_line(line, None);
        } else if let Some(rest) = line.strip_prefix("calls=") {
            self.association(rest);
        } else if line.starts_with("jump=") || line.starts_with("jcnd=") {
            // Jump counts carry no call-graph information.
        } else if let Some(caps) = POSITION_RE.captures(line) {
            self.position_line(&caps);
        } else {
            self.warn(DiagnosticKind::MalformedLine, format!("unrecognised line {line:?}"));
        }
        Ok(())
    }

    /// Ends the stream, returning the raw profile.
    pub fn finish(mut self) -> GraphResult<Profile> {
        if self.num_events.is_none() {
            return Err(GraphError::Parse {
                line: self.line,
                message: "input ended without an events: declaration".to_string(),
            });
        }
        if self.pending_calls.take().is_some() {
            self.warn(
                DiagnosticKind::MalformedLine,
                "calls= line at end of input has no cost line",
            );
        }
        tracing::debug!(
            lines = self.line,
            functions = self.profile.functions.len(),
            calls = self.profile.call_count(),
            "parsed callgrind trace"
        );
        Ok(self.profile)
    }

    fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.profile.warn(kind, Some(self.line), message);
    }

    fn header_line(&mut self, key: &str, value: &str) -> bool {
        let header = &mut self.profile.header;
        match key {
            "version" => header.version = Some(value.to_string()),
            "creator" => header.creator = Some(value.to_string()),
            "cmd" => header.cmd = Some(value.to_string()),
            "pid" => header.pid = Some(value.to_string()),
            "thread" => header.thread = Some(value.to_string()),
            "part" => {
                header.parts.push(value.to_string());
                self.defined.clear();
            }
            "desc" => header.desc.push(value.to_string()),
            "event" => header.event_specs.push(value.to_string()),
            "summary" | "totals" => {
                header.summary = value
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<f64>().ok());
            }
            "events" => {
                let names: Vec<String> = value.split_whitespace().map(str::to_string).collect();
                if names.is_empty() {
                    self.warn(DiagnosticKind::MalformedLine, "empty events: declaration");
                    return true;
                }
                self.cost_index = self.select_cost_event(&names);
                self.num_events = Some(names.len());
                self.profile.header.events = names;
            }
            "positions" => {
                let names: Vec<String> = value.split_whitespace().map(str::to_string).collect();
                if names.is_empty() {
                    self.warn(DiagnosticKind::MalformedLine, "empty positions: declaration");
                    return true;
                }
                self.last_positions = vec![0; names.len()];
                self.profile.header.positions = names;
            }
            _ => return false,
        }
        true
    }

    fn select_cost_event(&mut self, names: &[String]) -> usize {
        let Some(wanted) = self.config.cost_event.as_deref() else {
            return 0;
        };
        match names.iter().position(|name| name == wanted) {
            Some(index) => index,
            None => {
                self.warn(
                    DiagnosticKind::UnknownCostEvent,
                    format!("cost event {wanted:?} not declared; using {:?}", names[0]),
                );
                0
            }
        }
    }

    fn decode_positions(&self, tokens: &[&str]) -> Option<Vec<i64>> {
        tokens
            .iter()
            .zip(&self.last_positions)
            .map(|(token, last)| {
                if *token == "*" {
                    Some(*last)
                } else if token.starts_with(['+', '-']) {
                    token.parse::<i64>().ok().map(|delta| last.wrapping_add(delta))
                } else if let Some(hex) = token.strip_prefix("0x") {
                    u64::from_str_radix(hex, 16).ok().map(|v| v as i64)
                } else {
                    token.parse::<i64>().ok()
                }
            })
            .collect()
    }

    fn cost_line(&mut self, line: &str, calls: Option<f64>) {
        let num_positions = self.last_positions.len();
        let num_events = self.num_events.unwrap_or_default();
        let values: Vec<&str> = line.split_whitespace().collect();
        if values.len() < num_positions || values.len() > num_positions + num_events {
            self.warn(
                DiagnosticKind::MalformedLine,
                format!(
                    "cost line has {} values, expected {num_positions} positions and up to {num_events} events",
                    values.len()
                ),
            );
            return;
        }
        let Some(positions) = self.decode_positions(&values[..num_positions]) else {
            self.warn(DiagnosticKind::MalformedLine, format!("bad position in {line:?}"));
            return;
        };
        let events: Option<Vec<f64>> = values[num_positions..]
            .iter()
            .map(|v| v.parse::<f64>().ok())
            .collect();
        let Some(mut events) = events else {
            self.warn(DiagnosticKind::MalformedLine, format!("bad event value in {line:?}"));
            return;
        };
        events.resize(num_events, 0.0);
        let cost = events.get(self.cost_index).copied().unwrap_or_default();

        let Some(name) = self.context.func.clone() else {
            self.warn(DiagnosticKind::MalformedLine, "cost line before any fn= line");
            return;
        };
        self.last_positions = positions;

        let ob = self.context.ob.clone();
        let fl = self.context.fl.clone();
        match calls {
            None => {
                // cob is relative to the caller's object, not to the previous cob.
                self.context.cob = ob.clone();
                let id = self.make_function(ob.as_deref(), fl.as_deref(), &name);
                if let Some(function) = self.profile.functions.get_mut(&id) {
                    function.events.increment(SAMPLES, cost);
                }
                self.profile.events.increment(SAMPLES, cost);
            }
            Some(calls) => {
                let Some(callee_name) = self.context.cfn.clone() else {
                    self.warn(DiagnosticKind::MalformedLine, "call cost line without a cfn= line");
                    return;
                };
                let cob = self.context.cob.clone().or_else(|| ob.clone());
                let cfl = self.context.cfl.clone();
                let callee = self.make_function(cob.as_deref(), cfl.as_deref(), &callee_name);
                let caller = self.make_function(ob.as_deref(), fl.as_deref(), &name);
                if let Some(function) = self.profile.functions.get_mut(&callee) {
                    function.called += calls;
                }
                let Some(function) = self.profile.functions.get_mut(&caller) else {
                    return;
                };
                let existed = function.calls.contains_key(&callee);
                let call = function.call_mut(callee);
                call.events.increment(CALLS, calls);
                call.events.increment(SAMPLES2, cost);
                if existed && self.noted_calls.insert((caller, callee)) {
                    self.profile.note(
                        DiagnosticKind::DuplicateCall,
                        Some(self.line),
                        format!("call from {name} to {callee_name} seen again; accumulating"),
                    );
                }
            }
        }
    }

    fn association(&mut self, rest: &str) {
        let mut tokens = rest.split_whitespace();
        let count = tokens.next().and_then(|t| t.parse::<u64>().ok());
        let targets: Vec<&str> = tokens.collect();
        match count {
            Some(count) if !targets.is_empty() && targets.iter().all(|t| SUBPOSITION_RE.is_match(t)) => {
                self.pending_calls = Some(count as f64);
            }
            _ => self.warn(DiagnosticKind::MalformedLine, format!("bad calls= line {rest:?}")),
        }
    }

    fn position_line(&mut self, caps: &Captures<'_>) {
        let kind = &caps["position"];
        let table = match kind.trim_start_matches(['c', 'j']) {
            "ob" => NameTable::Object,
            "fn" => NameTable::Function,
            _ => NameTable::File,
        };
        let name = caps
            .name("name")
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty());

        let name = match caps.name("id") {
            Some(id) => {
                let Ok(id) = id.as_str().parse::<u64>() else {
                    self.warn(DiagnosticKind::MalformedLine, format!("bad name id in {kind}= line"));
                    return;
                };
                match name {
                    Some(name) => {
                        self.names.insert((table, id), name.clone());
                        Some(name)
                    }
                    None => match self.names.get(&(table, id)) {
                        Some(name) => Some(name.clone()),
                        None => {
                            self.warn(
                                DiagnosticKind::MalformedLine,
                                format!("{kind}=({id}) refers to an undefined name"),
                            );
                            return;
                        }
                    },
                }
            }
            None => name,
        };

        let Some(name) = name else {
            if kind == "cob" {
                self.context.cob = self.context.ob.clone();
            } else {
                self.warn(DiagnosticKind::MalformedLine, format!("{kind}= line without a name"));
            }
            return;
        };

        match kind {
            "ob" => self.context.ob = Some(name),
            "fl" | "fi" | "fe" => self.context.fl = Some(name),
            "fn" => {
                let module = self.context.ob.as_deref().filter(|m| !m.is_empty()).map(basename);
                let id = FunctionId::from_parts(module.as_deref(), &name);
                if !self.defined.insert(id) && self.noted_functions.insert(id) {
                    self.profile.note(
                        DiagnosticKind::DuplicateFunction,
                        Some(self.line),
                        format!("function {name} defined again; accumulating"),
                    );
                }
                self.context.func = Some(name);
            }
            "cob" => self.context.cob = Some(name),
            "cfl" | "cfi" | "cfe" => self.context.cfl = Some(name),
            "cfn" => self.context.cfn = Some(name),
            // Jump targets only feed the name tables.
            _ => {}
        }
    }

    /// Returns the id of the named function, creating it on first reference.
    fn make_function(&mut self, module: Option<&str>, filename: Option<&str>, name: &str) -> FunctionId {
        let module = module.filter(|m| !m.is_empty()).map(basename);
        let id = FunctionId::from_parts(module.as_deref(), name);
        let filename = filename.filter(|f| !f.is_empty()).map(str::to_string);
        match self.profile.functions.get_mut(&id) {
            Some(function) => {
                if function.filename.is_none() {
                    function.filename = filename;
                }
            }
            None => {
                let mut function = Function::new(id, name);
                function.module = module;
                function.filename = filename;
                function.events.insert(SAMPLES, 0.0);
                self.profile.add_function(function);
            }
        }
        id
    }
}

/// Parses a callgrind trace and runs the analysis pipeline on it.
pub fn parse_callgrind<R: BufRead>(reader: R, config: &AnalysisConfig) -> GraphResult<Profile> {
    let mut profile = CallgrindParser::new(config).parse(reader)?;
    analyze(&mut profile, config)?;
    Ok(profile)
}

pub fn parse_callgrind_str(text: &str, config: &AnalysisConfig) -> GraphResult<Profile> {
    parse_callgrind(text.as_bytes(), config)
}

pub fn load_callgrind(path: &Path, config: &AnalysisConfig) -> GraphResult<Profile> {
    let file = std::fs::File::open(path)?;
    parse_callgrind(std::io::BufReader::new(file), config)
}

/// main -> A -> B -> A, with 50 of 100 samples spent in `idle`.
#[cfg(test)]
pub(crate) const RECURSIVE_TRACE: &str = "\
# callgrind format
version: 1
creator: callgrind-3.22.0
pid: 4242
cmd: ./app --run
part: 1
positions: line
events: Ir

ob=/usr/bin/app
fl=main.c
fn=main
10 0
cfn=A
calls=1 20
11 50

fn=A
20 20
cfn=B
calls=2 30
21 30

fn=B
30 30
cfn=A
calls=1 20
31 10

fn=idle
40 50

totals: 100
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TIME_RATIO, TOTAL_TIME_RATIO};

    fn raw(text: &str) -> Profile {
        let config = AnalysisConfig::default();
        CallgrindParser::new(&config)
            .parse(text.as_bytes())
            .expect("parse")
    }

    fn function<'p>(profile: &'p Profile, module: Option<&str>, name: &str) -> &'p Function {
        profile
            .function(FunctionId::from_parts(module, name))
            .expect("function")
    }

    fn kinds(profile: &Profile) -> Vec<DiagnosticKind> {
        profile.diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn recursive_trace_end_to_end() {
        let profile =
            parse_callgrind_str(RECURSIVE_TRACE, &AnalysisConfig::default()).expect("parse");
        assert_eq!(profile.header.creator.as_deref(), Some("callgrind-3.22.0"));
        assert_eq!(profile.header.summary, Some(100.0));
        assert_eq!(profile.header.parts, vec!["1".to_string()]);

        let a = function(&profile, Some("app"), "A");
        let b = function(&profile, Some("app"), "B");
        let main = function(&profile, Some("app"), "main");
        assert_eq!(a.module.as_deref(), Some("app"));
        assert_eq!(a.filename.as_deref(), Some("main.c"));
        assert_eq!(a.called, 2.0);

        let cycle = a.cycle.expect("A in a cycle");
        assert_eq!(b.cycle, Some(cycle));
        assert_eq!(main.cycle, None);
        assert!((a.events.get(TIME_RATIO).expect("a") - 0.2).abs() < 1e-12);
        assert!((b.events.get(TIME_RATIO).expect("b") - 0.3).abs() < 1e-12);
        assert_eq!(main.calls[&a.id].ratio, Some(1.0));

        let cycle_total = profile.cycles[&cycle]
            .events
            .get(TOTAL_TIME_RATIO)
            .expect("cycle total");
        assert!((cycle_total - 0.5).abs() < 1e-9);
        assert!((main.events.get(TOTAL_TIME_RATIO).expect("main") - 0.5).abs() < 1e-9);
        assert!(profile.diagnostics.is_empty(), "{:?}", profile.diagnostics);
    }

    #[test]
    fn positions_decode_relative_to_last_value() {
        let config = AnalysisConfig::default();
        let mut parser = CallgrindParser::new(&config);
        for line in [
            "positions: instr line",
            "events: Ir",
            "fn=f",
            "0x10 5 1",
            "+2 -1 1",
            "* * 1",
        ] {
            parser.feed_line(line).expect("line");
        }
        assert_eq!(parser.last_positions(), &[0x12, 4]);
        parser.feed_line("-2 +10 1").expect("line");
        assert_eq!(parser.last_positions(), &[0x10, 14]);

        let profile = parser.finish().expect("finish");
        assert_eq!(
            function(&profile, None, "f").events.get(SAMPLES).expect("samples"),
            4.0
        );
        assert_eq!(profile.events.get(SAMPLES).expect("total"), 4.0);
    }

    #[test]
    fn compressed_names_are_per_kind() {
        let profile = raw("\
events: Ir
ob=(1) /lib/libm.so
fl=(1) m.c
fn=(1) sqrt
1 3
fn=(2) pow
2 4
cfn=(1)
calls=5 1
3 3
fn=(1)
4 1
");
        let sqrt = function(&profile, Some("libm.so"), "sqrt");
        let pow = function(&profile, Some("libm.so"), "pow");
        assert_eq!(sqrt.events.get(SAMPLES).expect("sqrt"), 4.0);
        assert_eq!(sqrt.filename.as_deref(), Some("m.c"));
        assert_eq!(sqrt.called, 5.0);
        assert_eq!(pow.calls[&sqrt.id].events.get(CALLS).expect("calls"), 5.0);
        assert_eq!(kinds(&profile), vec![DiagnosticKind::DuplicateFunction]);
    }

    #[test]
    fn callee_object_falls_back_to_caller_object() {
        let profile = raw("\
events: Ir
ob=/usr/bin/app
fn=main
1 1
cob=/lib/libc.so.6
cfn=malloc
calls=1 2
2 7
1 1
cfn=helper
calls=1 3
3 2
fn=helper
4 2
");
        let main = function(&profile, Some("app"), "main");
        let malloc = FunctionId::from_parts(Some("libc.so.6"), "malloc");
        let helper = FunctionId::from_parts(Some("app"), "helper");
        assert!(main.calls.contains_key(&malloc));
        assert!(main.calls.contains_key(&helper));
        assert_eq!(function(&profile, Some("app"), "helper").called, 1.0);
    }

    #[test]
    fn repeated_edges_accumulate() {
        let profile = raw("\
events: Ir
fn=a
1 1
cfn=b
calls=2 10
2 5
cfn=b
calls=3 11
3 7
fn=b
10 12
");
        let a = function(&profile, None, "a");
        let b = FunctionId::from_name("b");
        assert_eq!(a.calls.len(), 1);
        assert_eq!(a.calls[&b].events.get(CALLS).expect("calls"), 5.0);
        assert_eq!(a.calls[&b].events.get(SAMPLES2).expect("samples"), 12.0);
        assert_eq!(kinds(&profile), vec![DiagnosticKind::DuplicateCall]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let profile = raw("\
events: Ir
fn=f
this is not callgrind
1 2
calls=x 1
1 2 3
jump=1 20
jcnd=1 2 20
jfi=(3) other.c
1 3
");
        let f = function(&profile, None, "f");
        assert_eq!(f.events.get(SAMPLES).expect("samples"), 5.0);
        assert_eq!(
            kinds(&profile),
            vec![
                DiagnosticKind::MalformedLine,
                DiagnosticKind::MalformedLine,
                DiagnosticKind::MalformedLine
            ]
        );
        assert_eq!(profile.diagnostics[0].line, Some(3));
        assert_eq!(profile.diagnostics[2].line, Some(6));
    }

    #[test]
    fn calls_without_cost_line_are_dropped() {
        let profile = raw("\
events: Ir
fn=a
cfn=b
calls=1 2
fn=c
1 1
");
        assert!(function(&profile, None, "c").calls.is_empty());
        assert_eq!(kinds(&profile), vec![DiagnosticKind::MalformedLine]);
        assert_eq!(profile.diagnostics[0].line, Some(5));
    }

    #[test]
    fn missing_events_declaration_is_fatal() {
        let config = AnalysisConfig::default();
        let err = CallgrindParser::new(&config)
            .parse("version: 1\n\nfn=main\n1 2\n".as_bytes())
            .expect_err("no events");
        match err {
            GraphError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }

        let err = CallgrindParser::new(&config)
            .parse("version: 1\ncreator: x\n".as_bytes())
            .expect_err("truncated header");
        assert!(matches!(err, GraphError::Parse { line: 2, .. }));
    }

    #[test]
    fn unreadable_input_reports_line() {
        let config = AnalysisConfig::default();
        let bytes: &[u8] = b"events: Ir\nfn=f\n\xff\xfe\n";
        let err = CallgrindParser::new(&config)
            .parse(bytes)
            .expect_err("invalid utf-8");
        assert!(matches!(err, GraphError::Parse { line: 3, .. }));
    }

    #[test]
    fn cost_event_column_is_configurable() {
        let trace = "events: Ir Dr\nfn=f\n1 10 3\n2 4\n";
        let config = AnalysisConfig {
            cost_event: Some("Dr".to_string()),
            ..AnalysisConfig::default()
        };
        let profile = CallgrindParser::new(&config)
            .parse(trace.as_bytes())
            .expect("parse");
        assert_eq!(function(&profile, None, "f").events.get(SAMPLES).expect("dr"), 3.0);

        let config = AnalysisConfig {
            cost_event: Some("Bc".to_string()),
            ..AnalysisConfig::default()
        };
        let profile = CallgrindParser::new(&config)
            .parse(trace.as_bytes())
            .expect("parse");
        assert_eq!(function(&profile, None, "f").events.get(SAMPLES).expect("ir"), 14.0);
        assert_eq!(kinds(&profile), vec![DiagnosticKind::UnknownCostEvent]);
    }

    #[test]
    fn unknown_header_key_is_reported() {
        let profile = raw("events: Ir\nflavour: vanilla\nfn=f\n1 1\n");
        assert_eq!(kinds(&profile), vec![DiagnosticKind::UnexpectedLine]);
        assert_eq!(profile.header.events, vec!["Ir".to_string()]);
    }

    #[test]
    fn load_reads_a_trace_file() {
        let path = std::env::temp_dir().join(format!("callgrind.out.{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, RECURSIVE_TRACE).expect("write trace");
        let profile = load_callgrind(&path, &AnalysisConfig::default()).expect("load");
        assert_eq!(profile.functions.len(), 4);
        assert_eq!(profile.cycles.len(), 1);
        let _ = std::fs::remove_file(path);

        let missing = std::env::temp_dir().join(format!("callgrind.out.{}", uuid::Uuid::new_v4()));
        assert!(matches!(
            load_callgrind(&missing, &AnalysisConfig::default()),
            Err(GraphError::Io(_))
        ));
    }
}
