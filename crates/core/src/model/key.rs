use linetree_protocol::SharedStr;
use serde::{Deserialize, Serialize};

/// File marker the call-graph profiler uses for built-in functions.
pub const BUILTIN_FILE: &str = "~";

/// Identity of a profiled function.
///
/// Dumps encode keys as `[file, line, name]` triples; the triple
/// `["~", 0, name]` marks a built-in with no source location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "KeyTriple", into = "KeyTriple")]
pub enum FunctionKey {
    User {
        file: SharedStr,
        line: u32,
        name: SharedStr,
    },
    Builtin {
        name: SharedStr,
    },
}

impl FunctionKey {
    pub fn user(file: impl Into<SharedStr>, line: u32, name: impl Into<SharedStr>) -> Self {
        Self::User {
            file: file.into(),
            line,
            name: name.into(),
        }
    }

    pub fn builtin(name: impl Into<SharedStr>) -> Self {
        Self::Builtin { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::User { name, .. } | Self::Builtin { name } => name,
        }
    }

    /// Source file, `None` for built-ins.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::User { file, .. } => Some(file),
            Self::Builtin { .. } => None,
        }
    }

    /// First line of the function's definition, 0 for built-ins.
    pub fn line(&self) -> u32 {
        match self {
            Self::User { line, .. } => *line,
            Self::Builtin { .. } => 0,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin { .. })
    }
}

impl std::fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User { file, line, name } => write!(f, "{file}:{line}({name})"),
            Self::Builtin { name } => write!(f, "{name}"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct KeyTriple(SharedStr, u32, SharedStr);

impl From<KeyTriple> for FunctionKey {
    fn from(KeyTriple(file, line, name): KeyTriple) -> Self {
        if file == BUILTIN_FILE && line == 0 {
            Self::Builtin { name }
        } else {
            Self::User { file, line, name }
        }
    }
}

impl From<FunctionKey> for KeyTriple {
    fn from(key: FunctionKey) -> Self {
        match key {
            FunctionKey::User { file, line, name } => KeyTriple(file, line, name),
            FunctionKey::Builtin { name } => KeyTriple(BUILTIN_FILE.into(), 0, name),
        }
    }
}

/// The instrumented callable, identified by where its code starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint {
    pub file: SharedStr,
    pub line: u32,
}

impl EntryPoint {
    pub fn new(file: impl Into<SharedStr>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Whether `key` is a function defined at this entry point.
    pub fn matches(&self, key: &FunctionKey) -> bool {
        match key {
            FunctionKey::User { file, line, .. } => *file == self.file && *line == self.line,
            FunctionKey::Builtin { .. } => false,
        }
    }
}

impl std::str::FromStr for EntryPoint {
    type Err = String;

    /// Parses `path/to/file.py:LINE`, splitting on the last colon so Windows
    /// drive letters survive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, line) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected FILE:LINE, got {s:?}"))?;
        let line: u32 = line
            .parse()
            .map_err(|_| format!("invalid line number {line:?}"))?;
        if file.is_empty() {
            return Err(format!("missing file in {s:?}"));
        }
        Ok(Self::new(file, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_user_and_builtin_triples() {
        let keys: Vec<FunctionKey> = serde_json::from_str(
            r#"[["app/views.py", 12, "index"], ["~", 0, "<built-in method time.sleep>"]]"#,
        )
        .unwrap();
        assert_eq!(keys[0], FunctionKey::user("app/views.py", 12, "index"));
        assert_eq!(
            keys[1],
            FunctionKey::builtin("<built-in method time.sleep>")
        );
    }

    #[test]
    fn builtin_encodes_with_marker() {
        let json = serde_json::to_string(&FunctionKey::builtin("len")).unwrap();
        assert_eq!(json, r#"["~",0,"len"]"#);
    }

    #[test]
    fn tilde_file_with_nonzero_line_is_a_user_function() {
        let key: FunctionKey = serde_json::from_str(r#"["~", 3, "odd"]"#).unwrap();
        assert!(!key.is_builtin());
        assert_eq!(key.file(), Some("~"));
    }

    #[test]
    fn entry_point_matches_file_and_line_only() {
        let entry = EntryPoint::new("app/views.py", 12);
        assert!(entry.matches(&FunctionKey::user("app/views.py", 12, "index")));
        assert!(entry.matches(&FunctionKey::user("app/views.py", 12, "wrapper")));
        assert!(!entry.matches(&FunctionKey::user("app/views.py", 13, "index")));
        assert!(!entry.matches(&FunctionKey::builtin("index")));
    }

    #[test]
    fn parses_entry_point() {
        let entry: EntryPoint = "C:\\app\\views.py:40".parse().unwrap();
        assert_eq!(entry.file, "C:\\app\\views.py");
        assert_eq!(entry.line, 40);
        assert!("views.py".parse::<EntryPoint>().is_err());
        assert!("views.py:x".parse::<EntryPoint>().is_err());
        assert!(":4".parse::<EntryPoint>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(
            FunctionKey::user("a.py", 3, "f").to_string(),
            "a.py:3(f)"
        );
        assert_eq!(FunctionKey::builtin("len").to_string(), "len");
    }
}
