//! Shared test helpers: an in-memory MicroPython filesystem behind a mock board.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pyboard_repl::mock::{Execution, MockBoard};
use pyboard_repl::{ReplConfig, Session};

/// A node of the fake filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug)]
struct FsState {
    nodes: BTreeMap<String, Node>,
    cwd: String,
    /// Report non-empty rmdir as EACCES, like FAT-backed ports.
    fat_errors: bool,
    /// Paths whose reads fail with EIO.
    poisoned: HashSet<String>,
    /// Operation log, e.g. `read /a.txt@0`.
    ops: Vec<String>,
}

/// In-memory filesystem that understands the scripts `pyboard-fs` generates.
#[derive(Clone)]
pub struct FakeFs {
    state: Arc<Mutex<FsState>>,
}

impl FakeFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        FakeFs {
            state: Arc::new(Mutex::new(FsState {
                nodes,
                cwd: "/".to_string(),
                fat_errors: false,
                poisoned: HashSet::new(),
                ops: Vec::new(),
            })),
        }
    }

    pub fn with_fat_errors(self) -> Self {
        self.state.lock().unwrap().fat_errors = true;
        self
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().unwrap().nodes.insert(path.to_string(), Node::Dir);
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(path.to_string(), Node::File(data.to_vec()));
    }

    pub fn poison(&self, path: &str) {
        self.state.lock().unwrap().poisoned.insert(path.to_string());
    }

    pub fn node(&self, path: &str) -> Option<Node> {
        self.state.lock().unwrap().nodes.get(path).cloned()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.node(path) {
            Some(Node::File(data)) => Some(data),
            _ => None,
        }
    }

    pub fn cwd(&self) -> String {
        self.state.lock().unwrap().cwd.clone()
    }

    pub fn set_cwd(&self, cwd: &str) {
        self.state.lock().unwrap().cwd = cwd.to_string();
    }

    pub fn ops(&self) -> Vec<String> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    /// A mock board running this filesystem.
    pub fn board(&self) -> MockBoard {
        let fs = self.clone();
        MockBoard::with_interpreter(move |code: &str| fs.execute(code))
    }

    pub fn execute(&self, code: &str) -> Execution {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let vars = bindings(code);
        let path = vars.get("p").and_then(Value::as_str).map(|p| resolve(&state.cwd, p));

        if code.contains("os.ilistdir(p)") {
            let path = path.expect("listdir binds p");
            state.ops.push(format!("listdir {}", path));
            return state.list(&path);
        }
        if code.contains("os.stat(p)") {
            let path = path.expect("stat binds p");
            state.ops.push(format!("stat {}", path));
            return match state.nodes.get(&path) {
                Some(Node::Dir) => Execution::ok("d 0\r\n"),
                Some(Node::File(data)) => Execution::ok(format!("f {}\r\n", data.len())),
                None => os_error(2, "ENOENT"),
            };
        }
        if code.contains("os.getcwd()") {
            state.ops.push("getcwd".to_string());
            return Execution::ok(format!("{}\r\n", state.cwd));
        }
        if code.contains("os.chdir(p)") {
            let path = path.expect("chdir binds p");
            state.ops.push(format!("chdir {}", path));
            return match state.nodes.get(&path).cloned() {
                Some(Node::Dir) => {
                    state.cwd = path;
                    Execution::ok("")
                }
                Some(Node::File(_)) => os_error(20, "ENOTDIR"),
                None => os_error(2, "ENOENT"),
            };
        }
        if code.contains("os.mkdir(p)") {
            let path = path.expect("mkdir binds p");
            state.ops.push(format!("mkdir {}", path));
            return state.mkdir(&path);
        }
        if code.contains("os.rmdir(p)") {
            let path = path.expect("rmdir binds p");
            state.ops.push(format!("rmdir {}", path));
            return state.rmdir(&path);
        }
        if code.contains("os.remove(p)") {
            let path = path.expect("remove binds p");
            state.ops.push(format!("remove {}", path));
            return match state.nodes.get(&path).cloned() {
                Some(Node::File(_)) => {
                    state.nodes.remove(&path);
                    Execution::ok("")
                }
                Some(Node::Dir) => os_error(21, "EISDIR"),
                None => os_error(2, "ENOENT"),
            };
        }
        if code.contains("hexlify(f.read(n))") {
            let path = path.expect("read binds p");
            let offset = vars.get("o").and_then(Value::as_int).expect("read binds o") as usize;
            let length = vars.get("n").and_then(Value::as_int).expect("read binds n") as usize;
            state.ops.push(format!("read {}@{}", path, offset));
            if state.poisoned.contains(&path) {
                return os_error(5, "EIO");
            }
            return match state.nodes.get(&path) {
                Some(Node::File(data)) => {
                    let start = offset.min(data.len());
                    let end = (offset + length).min(data.len());
                    Execution::ok(format!("{}\r\n", hex::encode(&data[start..end])))
                }
                Some(Node::Dir) => os_error(21, "EISDIR"),
                None => os_error(2, "ENOENT"),
            };
        }
        if code.contains("unhexlify(d)") {
            let path = path.expect("write binds p");
            let offset = vars.get("o").and_then(Value::as_int).expect("write binds o") as usize;
            let mode = vars.get("m").and_then(Value::as_str).expect("write binds m").to_string();
            let data = hex::decode(vars.get("d").and_then(Value::as_str).expect("write binds d"))
                .expect("write data is hex");
            state.ops.push(format!("write {}@{}", path, offset));
            return state.write(&path, &mode, offset, &data);
        }

        Execution::error(format!(
            "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1, in <module>\r\nNameError: unrecognised script {:?}\r\n",
            code
        ))
    }
}

impl FsState {
    fn children(&self, dir: &str) -> Vec<(String, Node)> {
        self.nodes
            .iter()
            .filter(|(path, _)| path.as_str() != "/" && parent(path) == dir)
            .map(|(path, node)| (base(path).to_string(), node.clone()))
            .collect()
    }

    fn list(&self, path: &str) -> Execution {
        match self.nodes.get(path) {
            Some(Node::Dir) => {
                let mut out = String::new();
                // Real boards list in storage order; reverse to prove the client sorts.
                for (name, node) in self.children(path).into_iter().rev() {
                    match node {
                        Node::Dir => out.push_str(&format!("d 0 {}\r\n", name)),
                        Node::File(data) => out.push_str(&format!("f {} {}\r\n", data.len(), name)),
                    }
                }
                Execution::ok(out)
            }
            Some(Node::File(_)) => os_error(20, "ENOTDIR"),
            None => os_error(2, "ENOENT"),
        }
    }

    fn mkdir(&mut self, path: &str) -> Execution {
        if self.nodes.contains_key(path) {
            return os_error(17, "EEXIST");
        }
        match self.nodes.get(&parent(path)).cloned() {
            Some(Node::Dir) => {
                self.nodes.insert(path.to_string(), Node::Dir);
                Execution::ok("")
            }
            Some(Node::File(_)) => os_error(20, "ENOTDIR"),
            None => os_error(2, "ENOENT"),
        }
    }

    fn rmdir(&mut self, path: &str) -> Execution {
        match self.nodes.get(path).cloned() {
            Some(Node::Dir) => {
                if !self.children(path).is_empty() {
                    return if self.fat_errors {
                        os_error(13, "EACCES")
                    } else {
                        os_error(39, "ENOTEMPTY")
                    };
                }
                self.nodes.remove(path);
                Execution::ok("")
            }
            Some(Node::File(_)) => os_error(20, "ENOTDIR"),
            None => os_error(2, "ENOENT"),
        }
    }

    fn write(&mut self, path: &str, mode: &str, offset: usize, data: &[u8]) -> Execution {
        match self.nodes.get(&parent(path)) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return os_error(20, "ENOTDIR"),
            None => return os_error(2, "ENOENT"),
        }
        let mut contents = match (mode, self.nodes.get(path)) {
            (_, Some(Node::Dir)) => return os_error(21, "EISDIR"),
            ("wb", _) => Vec::new(),
            ("r+b", Some(Node::File(existing))) => existing.clone(),
            ("r+b", None) => return os_error(2, "ENOENT"),
            (other, _) => panic!("unexpected open mode {:?}", other),
        };
        if contents.len() < offset + data.len() {
            contents.resize(offset + data.len(), 0);
        }
        contents[offset..offset + data.len()].copy_from_slice(data);
        self.nodes.insert(path.to_string(), Node::File(contents));
        Execution::ok("")
    }
}

fn os_error(errno: u32, name: &str) -> Execution {
    Execution::error(format!(
        "Traceback (most recent call last):\r\n  File \"<stdin>\", line 3, in <module>\r\nOSError: [Errno {}] {}\r\n",
        errno, name
    ))
}

// ============================================================================
// Script Parsing
// ============================================================================

/// A literal bound at the top of a generated script.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
}

impl Value {
    fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Int(_) => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Str(_) => None,
        }
    }
}

/// Collect `x=<literal>` lines.
pub fn bindings(code: &str) -> HashMap<String, Value> {
    let mut vars = HashMap::new();
    for line in code.lines() {
        let Some((name, literal)) = line.split_once('=') else {
            continue;
        };
        if name.len() != 1 || !name.chars().all(|c| c.is_ascii_lowercase()) {
            continue;
        }
        if let Some(s) = unquote(literal) {
            vars.insert(name.to_string(), Value::Str(s));
        } else if let Ok(n) = literal.parse() {
            vars.insert(name.to_string(), Value::Int(n));
        }
    }
    vars
}

/// Parse a single-quoted Python string literal.
pub fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(char::from(u8::from_str_radix(&hex, 16).ok()?));
            }
            other => out.push(other),
        }
    }
    Some(out)
}

// ============================================================================
// Paths
// ============================================================================

/// Resolve `path` against `cwd` and normalise it.
pub fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };
    let mut parts: Vec<&str> = Vec::new();
    for component in joined.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            c => parts.push(c),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

fn base(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ============================================================================
// Sessions
// ============================================================================

/// Timing suitable for the in-memory board.
pub fn fast_config() -> ReplConfig {
    ReplConfig {
        exec_timeout: Duration::from_millis(500),
        banner_timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(2),
        drain_timeout: Duration::from_millis(20),
    }
}

/// A session connected to `fs`, not yet in raw mode.
pub fn session(fs: &FakeFs) -> Session<MockBoard> {
    Session::with_config(fs.board(), fast_config())
}
