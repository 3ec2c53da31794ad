//! Scripted in-memory graph engine
//!
//! Understands just the statements the session layer and the SDK issue, and
//! stores its whole state as JSON in the database file on `MemoryFs`. The file
//! is read when a database is opened and written back when it is closed, so
//! data only survives through the same mount/sync/unmount lifecycle a real
//! engine goes through.

use async_trait::async_trait;
use graphnest::error::{classify, ErrorSignature};
use graphnest::host::{
    Connection, Database, Engine, EngineFactory, EngineHandle, HostError, HostResult, MemoryFs,
    WorkingFs,
};
use graphnest::QueryResult;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const NAME: &str = r"(`(?:[^`]|``)+`|[A-Za-z_][A-Za-z0-9_]*)";

const TYPES: &[&str] = &[
    "INT64", "INT32", "INT16", "INT", "SERIAL", "DOUBLE", "FLOAT", "STRING", "BOOLEAN", "DATE",
    "TIMESTAMP",
];

fn pattern(template: &str) -> Regex {
    Regex::new(&template.replace("NAME", NAME)).unwrap()
}

static TABLE_INFO: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?is)^CALL table_info\('((?:[^'\\]|\\.)*)'\) RETURN \*$"));
static CREATE_NODE_TABLE: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?is)^CREATE NODE TABLE NAME\s*\((.*)\)$"));
static CREATE_REL_TABLE: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?is)^CREATE REL TABLE NAME\s*\((.*)\)$"));
static CREATE_NODES: Lazy<Regex> = Lazy::new(|| pattern(r"(?is)^CREATE\s+(\(.*\))$"));
static NODE: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?s)\(\s*[A-Za-z_]*\s*:\s*NAME\s*(\{[^{}]*\})?\s*\)"));
static CREATE_REL: Lazy<Regex> = Lazy::new(|| {
    pattern(
        r"(?is)^MATCH\s*\(a:NAME\s*\{id:\s*(-?\d+)\}\),\s*\(b:NAME\s*\{id:\s*(-?\d+)\}\)\s*CREATE\s*\(a\)-\[:NAME\s*(\{[^{}]*\})?\]->\(b\)$",
    )
});
static MAX_ID: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?is)^MATCH \(n:NAME\) RETURN max\(n\.NAME\) AS max_id$"));
static COUNT: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?is)^MATCH \(n:NAME\) RETURN count\(n\) AS count$"));
static PREVIEW_NODES: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?is)^MATCH \(n:NAME\) RETURN n LIMIT (\d+)$"));
static PREVIEW_RELS: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?is)^MATCH \(\)-\[r:NAME\]->\(\) RETURN r LIMIT (\d+)$"));
static DROP_TABLE: Lazy<Regex> = Lazy::new(|| pattern(r"(?is)^DROP TABLE NAME$"));

/// Which introspection calls the simulated engine build offers
#[derive(Debug, Clone, Copy)]
pub struct EngineBehavior {
    pub show_tables: bool,
    pub show_split_tables: bool,
    pub table_info: bool,
    /// Make every introspection call fail with a non-"unsupported" error
    pub introspection_down: bool,
}

impl Default for EngineBehavior {
    fn default() -> Self {
        Self {
            show_tables: true,
            show_split_tables: false,
            table_info: true,
            introspection_down: false,
        }
    }
}

/// Observation and control point shared by every engine instance
#[derive(Default)]
pub struct EngineProbe {
    behavior: Mutex<EngineBehavior>,
    statements: Mutex<Vec<String>>,
    instances: AtomicUsize,
    open_databases: AtomicUsize,
    max_open_databases: AtomicUsize,
    fail_next_open: AtomicBool,
}

impl EngineProbe {
    pub fn set_behavior(&self, behavior: EngineBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn behavior(&self) -> EngineBehavior {
        *self.behavior.lock()
    }

    /// Every statement received, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    pub fn clear_statements(&self) {
        self.statements.lock().clear();
    }

    /// Engine instances created so far
    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }

    pub fn open_databases(&self) -> usize {
        self.open_databases.load(Ordering::SeqCst)
    }

    pub fn max_open_databases(&self) -> usize {
        self.max_open_databases.load(Ordering::SeqCst)
    }

    /// Make the next `open_database` fail
    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedEngineFactory {
    fs: Arc<MemoryFs>,
    probe: Arc<EngineProbe>,
    supported: bool,
}

impl ScriptedEngineFactory {
    pub fn new(fs: Arc<MemoryFs>) -> Self {
        Self {
            fs,
            probe: Arc::new(EngineProbe::default()),
            supported: true,
        }
    }

    /// A factory for a host that cannot run the engine
    pub fn unsupported(fs: Arc<MemoryFs>) -> Self {
        Self {
            supported: false,
            ..Self::new(fs)
        }
    }

    pub fn probe(&self) -> Arc<EngineProbe> {
        self.probe.clone()
    }
}

#[async_trait]
impl EngineFactory for ScriptedEngineFactory {
    fn host_supported(&self) -> bool {
        self.supported
    }

    fn configure_worker(&self, _worker_path: &str) -> HostResult<()> {
        Ok(())
    }

    async fn instantiate(&self) -> HostResult<EngineHandle> {
        tokio::task::yield_now().await;
        self.probe.instances.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedEngine {
            fs: self.fs.clone(),
            probe: self.probe.clone(),
        }))
    }
}

struct ScriptedEngine {
    fs: Arc<MemoryFs>,
    probe: Arc<EngineProbe>,
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn fs(&self) -> Arc<dyn WorkingFs> {
        self.fs.clone()
    }

    async fn open_database(&self, path: &str) -> HostResult<Box<dyn Database>> {
        if self.probe.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(HostError::new("IO exception: could not open database file"));
        }

        let state = match self.fs.read_file(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| HostError::new(format!("Runtime exception: corrupt database: {}", e)))?,
            Err(e) if classify(&e) == ErrorSignature::NotFound => GraphState::default(),
            Err(e) => return Err(e),
        };

        let open = self.probe.open_databases.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_open_databases.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(ScriptedDatabase {
            fs: self.fs.clone(),
            path: path.to_string(),
            state: Arc::new(Mutex::new(state)),
            probe: self.probe.clone(),
        }))
    }
}

struct ScriptedDatabase {
    fs: Arc<MemoryFs>,
    path: String,
    state: Arc<Mutex<GraphState>>,
    probe: Arc<EngineProbe>,
}

#[async_trait]
impl Database for ScriptedDatabase {
    async fn connect(&mut self) -> HostResult<Box<dyn Connection>> {
        Ok(Box::new(ScriptedConnection {
            state: self.state.clone(),
            probe: self.probe.clone(),
        }))
    }

    async fn close(self: Box<Self>) -> HostResult<()> {
        let bytes = serde_json::to_vec(&*self.state.lock()).unwrap();
        self.probe.open_databases.fetch_sub(1, Ordering::SeqCst);
        self.fs.write_file(&self.path, &bytes).await
    }
}

struct ScriptedConnection {
    state: Arc<Mutex<GraphState>>,
    probe: Arc<EngineProbe>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn query(&mut self, statement: &str) -> HostResult<QueryResult> {
        tokio::task::yield_now().await;
        self.probe.statements.lock().push(statement.to_string());
        let behavior = self.probe.behavior();
        let mut state = self.state.lock();
        state.execute(&behavior, statement)
    }

    async fn close(self: Box<Self>) -> HostResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Table {
    name: String,
    kind: String,
    columns: Vec<(String, String)>,
    primary_key: Option<String>,
    from: Option<String>,
    to: Option<String>,
    rows: Vec<Map<String, Value>>,
}

/// Whole database content, as stored in the database file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphState {
    tables: Vec<Table>,
}

impl GraphState {
    fn execute(&mut self, behavior: &EngineBehavior, statement: &str) -> HostResult<QueryResult> {
        let statement = statement.trim().trim_end_matches(';').trim();

        if statement.starts_with("CALL ") && behavior.introspection_down {
            return Err(HostError::new("IO exception: catalog unavailable"));
        }
        if statement == "CALL show_tables() RETURN *" {
            if !behavior.show_tables {
                return Err(unknown_function("SHOW_TABLES"));
            }
            return Ok(self.list(None));
        }
        if statement == "CALL show_node_tables() RETURN *" {
            if !behavior.show_split_tables {
                return Err(unknown_function("SHOW_NODE_TABLES"));
            }
            return Ok(self.list(Some("NODE")));
        }
        if statement == "CALL show_rel_tables() RETURN *" {
            if !behavior.show_split_tables {
                return Err(unknown_function("SHOW_REL_TABLES"));
            }
            return Ok(self.list(Some("REL")));
        }
        if let Some(caps) = TABLE_INFO.captures(statement) {
            if !behavior.table_info {
                return Err(unknown_function("TABLE_INFO"));
            }
            let name = caps[1].replace("\\'", "'");
            let table = self.table(&name)?;
            let rows = table
                .columns
                .iter()
                .enumerate()
                .map(|(i, (column, data_type))| {
                    row(json!({"property id": i, "name": column, "type": data_type}))
                })
                .collect();
            return Ok(result(&["property id", "name", "type"], rows));
        }
        if statement == "MATCH (n) RETURN DISTINCT label(n) AS name" {
            return Ok(self.labels("NODE"));
        }
        if statement == "MATCH ()-[r]->() RETURN DISTINCT label(r) AS name" {
            return Ok(self.labels("REL"));
        }
        if let Some(caps) = CREATE_NODE_TABLE.captures(statement) {
            return self.create_table(&unquote(&caps[1]), "NODE", &caps[2]);
        }
        if let Some(caps) = CREATE_REL_TABLE.captures(statement) {
            return self.create_table(&unquote(&caps[1]), "REL", &caps[2]);
        }
        if let Some(caps) = CREATE_NODES.captures(statement) {
            return self.create_nodes(&caps[1]);
        }
        if let Some(caps) = CREATE_REL.captures(statement) {
            let props = caps.get(6).map_or(Ok(Map::new()), |m| parse_map(m.as_str()))?;
            return self.create_rel(
                (&unquote(&caps[1]), parse_int(&caps[2])),
                (&unquote(&caps[3]), parse_int(&caps[4])),
                &unquote(&caps[5]),
                props,
            );
        }
        if let Some(caps) = MAX_ID.captures(statement) {
            let table = self.table(&unquote(&caps[1]))?;
            let property = unquote(&caps[2]);
            let max = table
                .rows
                .iter()
                .filter_map(|r| r.get(&property).and_then(Value::as_i64))
                .max();
            return Ok(result(&["max_id"], vec![row(json!({ "max_id": max }))]));
        }
        if let Some(caps) = COUNT.captures(statement) {
            let count = self.table(&unquote(&caps[1]))?.rows.len();
            return Ok(result(&["count"], vec![row(json!({ "count": count }))]));
        }
        if let Some(caps) = PREVIEW_NODES.captures(statement) {
            return self.preview(&unquote(&caps[1]), "NODE", "n", parse_int(&caps[2]) as usize);
        }
        if let Some(caps) = PREVIEW_RELS.captures(statement) {
            return self.preview(&unquote(&caps[1]), "REL", "r", parse_int(&caps[2]) as usize);
        }
        if let Some(caps) = DROP_TABLE.captures(statement) {
            return self.drop_table(&unquote(&caps[1]));
        }

        Err(HostError::new(format!(
            "Parser exception: Invalid input <{}>",
            statement
        )))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
    }

    fn table(&self, name: &str) -> HostResult<&Table> {
        self.position(name)
            .map(|i| &self.tables[i])
            .ok_or_else(|| missing_table(name))
    }

    fn list(&self, kind: Option<&str>) -> QueryResult {
        let rows = self
            .tables
            .iter()
            .enumerate()
            .filter(|(_, t)| kind.map_or(true, |k| t.kind == k))
            .map(|(i, t)| row(json!({"id": i, "name": t.name, "type": t.kind, "comment": ""})))
            .collect();
        result(&["id", "name", "type", "comment"], rows)
    }

    fn labels(&self, kind: &str) -> QueryResult {
        let rows = self
            .tables
            .iter()
            .filter(|t| t.kind == kind && !t.rows.is_empty())
            .map(|t| row(json!({ "name": t.name })))
            .collect();
        result(&["name"], rows)
    }

    fn create_table(&mut self, name: &str, kind: &str, body: &str) -> HostResult<QueryResult> {
        if self.position(name).is_some() {
            return Err(HostError::new(format!(
                "Binder exception: {} already exists in catalog.",
                name
            )));
        }

        let mut table = Table {
            name: name.to_string(),
            kind: kind.to_string(),
            columns: Vec::new(),
            primary_key: None,
            from: None,
            to: None,
            rows: Vec::new(),
        };
        for entry in split_top_level(body, ',') {
            let entry = entry.trim();
            let upper = entry.to_ascii_uppercase();
            if upper.starts_with("PRIMARY KEY") {
                let key = entry
                    .find('(')
                    .zip(entry.rfind(')'))
                    .map(|(open, close)| unquote(entry[open + 1..close].trim()));
                table.primary_key = key;
            } else if upper.starts_with("FROM ") {
                let words: Vec<&str> = entry.split_whitespace().collect();
                table.from = words.get(1).map(|w| unquote(w));
                table.to = words.get(3).map(|w| unquote(w));
            } else {
                let (column, data_type) = entry
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| HostError::new(format!("Parser exception: bad column <{}>", entry)))?;
                let data_type = data_type.trim().to_ascii_uppercase();
                if !TYPES.contains(&data_type.as_str()) {
                    return Err(HostError::new(format!(
                        "Catalog exception: {} is not a valid data type.",
                        data_type
                    )));
                }
                table.columns.push((unquote(column), data_type));
            }
        }
        if kind == "NODE" && table.primary_key.is_none() {
            return Err(HostError::new(format!(
                "Binder exception: Can not find primary key for node table {}.",
                name
            )));
        }

        self.tables.push(table);
        Ok(result(&["result"], vec![row(json!({"result": format!("Table {} has been created.", name)}))]))
    }

    fn create_nodes(&mut self, patterns: &str) -> HostResult<QueryResult> {
        let mut pending = Vec::new();
        for caps in NODE.captures_iter(patterns) {
            let label = unquote(&caps[1]);
            let props = caps.get(2).map_or(Ok(Map::new()), |m| parse_map(m.as_str()))?;
            pending.push((label, props));
        }
        if pending.is_empty() {
            return Err(HostError::new("Parser exception: expected a node pattern"));
        }

        for (label, props) in pending {
            let index = self
                .position(&label)
                .filter(|i| self.tables[*i].kind == "NODE")
                .ok_or_else(|| missing_table(&label))?;
            let table = &mut self.tables[index];

            let mut stored = Map::new();
            for (key, value) in props {
                let column = table
                    .columns
                    .iter()
                    .find(|(c, _)| c.eq_ignore_ascii_case(&key))
                    .map(|(c, _)| c.clone())
                    .ok_or_else(|| {
                        HostError::new(format!("Binder exception: Cannot find property {} for n.", key))
                    })?;
                stored.insert(column, value);
            }

            let pk = table.primary_key.clone().unwrap_or_default();
            let pk_value = stored.get(&pk).cloned().ok_or_else(|| {
                HostError::new(format!(
                    "Binder exception: Create node n expects primary key {} as input.",
                    pk
                ))
            })?;
            if table.rows.iter().any(|r| r.get(&pk) == Some(&pk_value)) {
                return Err(HostError::new(format!(
                    "Runtime exception: Found duplicated primary key value {}, which violates the uniqueness constraint of the primary key column.",
                    pk_value
                )));
            }
            table.rows.push(stored);
        }
        Ok(QueryResult::default())
    }

    fn create_rel(
        &mut self,
        (from_label, from_id): (&str, i64),
        (to_label, to_id): (&str, i64),
        rel_label: &str,
        props: Map<String, Value>,
    ) -> HostResult<QueryResult> {
        let find = |state: &GraphState, label: &str, id: i64| -> HostResult<Option<Value>> {
            let index = state.position(label).ok_or_else(|| missing_table(label))?;
            let offset = state.tables[index]
                .rows
                .iter()
                .position(|r| r.get("id").and_then(Value::as_i64) == Some(id));
            Ok(offset.map(|offset| json!({"offset": offset, "table": index})))
        };
        let src = find(&*self, from_label, from_id)?;
        let dst = find(&*self, to_label, to_id)?;
        let rel_index = self
            .position(rel_label)
            .filter(|i| self.tables[*i].kind == "REL")
            .ok_or_else(|| missing_table(rel_label))?;

        if let (Some(src), Some(dst)) = (src, dst) {
            let mut stored = Map::new();
            stored.insert("_src".to_string(), src);
            stored.insert("_dst".to_string(), dst);
            stored.extend(props);
            self.tables[rel_index].rows.push(stored);
        }
        Ok(QueryResult::default())
    }

    fn preview(&self, name: &str, kind: &str, column: &str, limit: usize) -> HostResult<QueryResult> {
        let index = self
            .position(name)
            .filter(|i| self.tables[*i].kind == kind)
            .ok_or_else(|| missing_table(name))?;
        let table = &self.tables[index];

        let rows = table
            .rows
            .iter()
            .take(limit)
            .enumerate()
            .map(|(offset, stored)| {
                let mut entity = Map::new();
                entity.insert("_id".to_string(), json!({"offset": offset, "table": index}));
                entity.insert("_label".to_string(), json!(table.name));
                for (k, v) in stored {
                    entity.insert(k.clone(), v.clone());
                }
                let mut cells = Map::new();
                cells.insert(column.to_string(), Value::Object(entity));
                cells
            })
            .collect();
        Ok(result(&[column], rows))
    }

    fn drop_table(&mut self, name: &str) -> HostResult<QueryResult> {
        let index = self.position(name).ok_or_else(|| missing_table(name))?;
        let dropped = self.tables[index].name.clone();
        if let Some(rel) = self.tables.iter().find(|t| {
            t.kind == "REL"
                && (t.from.as_deref().map_or(false, |f| f.eq_ignore_ascii_case(&dropped))
                    || t.to.as_deref().map_or(false, |f| f.eq_ignore_ascii_case(&dropped)))
        }) {
            return Err(HostError::new(format!(
                "Binder exception: Cannot delete node table {} because it is referenced by relationship table {}.",
                dropped, rel.name
            )));
        }
        self.tables.remove(index);
        Ok(result(&["result"], vec![row(json!({"result": format!("Table {} has been dropped.", dropped)}))]))
    }
}

fn unknown_function(name: &str) -> HostError {
    HostError::new(format!("Catalog exception: function {} does not exist.", name))
}

fn missing_table(name: &str) -> HostError {
    HostError::new(format!("Binder exception: Table {} does not exist.", name))
}

fn result(columns: &[&str], rows: Vec<Map<String, Value>>) -> QueryResult {
    QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

fn row(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn parse_int(text: &str) -> i64 {
    text.parse().unwrap()
}

fn unquote(name: &str) -> String {
    match name.strip_prefix('`').and_then(|n| n.strip_suffix('`')) {
        Some(inner) => inner.replace("``", "`"),
        None => name.to_string(),
    }
}

/// Split on `separator` outside quotes, parentheses, brackets and braces
fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == separator && depth == 0 => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Parse a `{key: value, ...}` property map
fn parse_map(text: &str) -> HostResult<Map<String, Value>> {
    let inner = text.trim().trim_start_matches('{').trim_end_matches('}');
    let mut map = Map::new();
    for entry in split_top_level(inner, ',') {
        let (key, value) = entry
            .split_once(':')
            .ok_or_else(|| HostError::new(format!("Parser exception: bad property <{}>", entry)))?;
        map.insert(unquote(key.trim()), parse_value(value.trim())?);
    }
    Ok(map)
}

fn parse_value(text: &str) -> HostResult<Value> {
    if let Some(inner) = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
    {
        return Ok(Value::String(
            inner.replace("\\'", "'").replace("\\\"", "\"").replace("''", "'"),
        ));
    }
    match text.to_ascii_lowercase().as_str() {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        "current_timestamp()" => return Ok(json!("2025-01-01 00:00:00")),
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Ok(json!(n));
    }
    if let Ok(f) = text.parse::<f64>() {
        return Ok(json!(f));
    }
    if let Some(inner) = text
        .strip_prefix("CAST(")
        .and_then(|t| t.strip_suffix(" AS TIMESTAMP)"))
    {
        return parse_value(inner.trim());
    }
    if let Some(open) = text.find('(') {
        return Err(unknown_function(&text[..open].to_ascii_uppercase()));
    }
    Err(HostError::new(format!(
        "Binder exception: Variable {} is not in scope.",
        text
    )))
}
