//! REPL / workspace model shared by assessment and embedded-editor blocks.
//!
//! A REPL config is the YAML document next to a block (`*.repl.yaml`), plus
//! the three file trees (source, template, test) it points at. The trees are
//! name → file-or-directory maps, serialized in the camelCase shape the
//! embedded editor expects.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CourseError, Result};

/// The only REPL `api_version` this tool understands.
pub const SUPPORTED_API_VERSION: u32 = 1;

/// A recursive name → file map.
pub type FileTree = BTreeMap<String, WorkspaceFile>;

/// Parse the REPL path out of a free-response answer shebang,
/// `#!exl::repl('<relative path>')`.
pub fn parse_shebang(answer: &str) -> Option<String> {
    static SHEBANG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"^#!exl::repl\(\s*(?:'([^']+)'|"([^"]+)")\s*\)\s*$"#).expect("valid regex")
    });
    let caps = SHEBANG_RE.captures(answer.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Render a shebang pointing at `path`.
pub fn shebang(path: &str) -> String {
    format!("#!exl::repl('{path}')")
}

// ---------------------------------------------------------------------------
// WorkspaceFile
// ---------------------------------------------------------------------------

/// A single file or directory inside a workspace tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceFile {
    pub name: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub is_tmpl_file: bool,
    #[serde(default)]
    pub is_immutable: bool,
    /// Hidden files are loaded but never serialized into payloads.
    #[serde(default, skip_serializing)]
    pub is_hidden: bool,
    /// Set when `contents` holds the standard base64 encoding of a non-UTF-8 file.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_binary: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contents: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: FileTree,
}

impl WorkspaceFile {
    /// A regular file.
    pub fn file(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            ..Default::default()
        }
    }

    /// A regular file read from disk. Text stays as is; anything that is not
    /// valid UTF-8 is kept base64-encoded and marked binary.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::file(name, text),
            Err(e) => Self {
                is_binary: true,
                ..Self::file(name, STANDARD.encode(e.into_bytes()))
            },
        }
    }

    /// The file's raw bytes, decoding binary contents.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        if !self.is_binary {
            return Ok(self.contents.clone().into_bytes());
        }
        STANDARD
            .decode(&self.contents)
            .map_err(|e| CourseError::repl(format!("binary file {} is not valid base64: {e}", self.name)))
    }

    /// A directory holding `children`.
    pub fn dir(name: impl Into<String>, children: FileTree) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            children,
            ..Default::default()
        }
    }
}

/// Copy of `tree` without hidden entries, suitable for serialization.
pub fn visible(tree: &FileTree) -> FileTree {
    tree.iter()
        .filter(|(_, f)| !f.is_hidden)
        .map(|(k, f)| {
            let mut f = f.clone();
            f.children = visible(&f.children);
            (k.clone(), f)
        })
        .collect()
}

/// Concatenated contents of every regular file in `tree`, depth first.
pub fn raw_contents(tree: &FileTree) -> String {
    let mut out = String::new();
    collect_contents(tree, &mut out);
    out
}

fn collect_contents(tree: &FileTree, out: &mut String) {
    for file in tree.values() {
        if file.is_dir {
            collect_contents(&file.children, out);
        } else {
            out.push_str(&file.contents);
            out.push('\n');
        }
    }
}

// ---------------------------------------------------------------------------
// Environment table
// ---------------------------------------------------------------------------

/// Which of the three trees a file tree plays in a REPL config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeRole {
    Source,
    Template,
    Test,
}

/// A supported runtime environment and its workspace layout convention.
#[derive(Debug)]
pub struct Environment {
    pub key: &'static str,
    /// Directory chain that source and template trees are nested under.
    pub source_prefix: &'static [&'static str],
    /// Directory chain that test trees are nested under.
    pub test_prefix: &'static [&'static str],
}

/// Allow-list of runtime environments.
pub const ENVIRONMENTS: &[Environment] = &[
    Environment {
        key: "python3",
        source_prefix: &[],
        test_prefix: &[],
    },
    Environment {
        key: "java",
        source_prefix: &["src", "main", "java", "exlhub"],
        test_prefix: &["src", "test", "java", "exlhub"],
    },
    Environment {
        key: "nodejs",
        source_prefix: &[],
        test_prefix: &[],
    },
    Environment {
        key: "golang",
        source_prefix: &[],
        test_prefix: &[],
    },
    Environment {
        key: "cplusplus",
        source_prefix: &[],
        test_prefix: &[],
    },
    Environment {
        key: "web",
        source_prefix: &[],
        test_prefix: &[],
    },
];

/// Look up an environment by key.
pub fn environment(key: &str) -> Option<&'static Environment> {
    ENVIRONMENTS.iter().find(|env| env.key == key)
}

impl Environment {
    fn prefix(&self, role: TreeRole) -> &'static [&'static str] {
        match role {
            TreeRole::Source | TreeRole::Template => self.source_prefix,
            TreeRole::Test => self.test_prefix,
        }
    }

    /// Nest a tree loaded from disk under this environment's prefix.
    pub fn nest(&self, tree: FileTree, role: TreeRole) -> FileTree {
        if tree.is_empty() {
            return tree;
        }
        self.prefix(role).iter().rev().fold(tree, |inner, name| {
            let mut outer = FileTree::new();
            outer.insert((*name).to_string(), WorkspaceFile::dir(*name, inner));
            outer
        })
    }

    /// Undo [`Environment::nest`]. Trees that are not nested come back unchanged.
    pub fn strip(&self, tree: &FileTree, role: TreeRole) -> FileTree {
        let mut current = tree;
        for name in self.prefix(role) {
            match current.get(*name) {
                Some(dir) if dir.is_dir && current.len() == 1 => current = &dir.children,
                _ => return tree.clone(),
            }
        }
        current.clone()
    }
}

// ---------------------------------------------------------------------------
// ReplConfig
// ---------------------------------------------------------------------------

/// Display hints for the embedded editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplDisplay {
    #[serde(default)]
    pub height: String,
}

/// A REPL/workspace YAML document plus the file trees it references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplConfig {
    pub api_version: u32,
    pub environment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src_path: String,
    // Older courses spell this key `tpml_path`.
    #[serde(default, alias = "tpml_path", skip_serializing_if = "String::is_empty")]
    pub tmpl_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<ReplDisplay>,
    /// Named grading test commands.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tests: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub grading_strategy: String,

    #[serde(skip)]
    pub src_files: FileTree,
    #[serde(skip)]
    pub tmpl_files: FileTree,
    #[serde(skip)]
    pub test_files: FileTree,
}

impl ReplConfig {
    /// Parse the YAML document and check version and environment.
    /// File trees are left empty; the resolver loads them.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| CourseError::repl(format!("invalid repl yaml: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the API version and environment key against the allow-list.
    pub fn validate(&self) -> Result<()> {
        if self.api_version != SUPPORTED_API_VERSION {
            return Err(CourseError::repl(format!(
                "unsupported api_version {} (expected {SUPPORTED_API_VERSION})",
                self.api_version
            )));
        }
        self.env()?;
        Ok(())
    }

    /// The environment entry for this config's key.
    pub fn env(&self) -> Result<&'static Environment> {
        environment(&self.environment).ok_or_else(|| {
            CourseError::repl(format!("unsupported environment '{}'", self.environment))
        })
    }

    /// Editor height, if the config sets one.
    pub fn height(&self) -> Option<&str> {
        self.display
            .as_ref()
            .map(|d| d.height.as_str())
            .filter(|h| !h.is_empty())
    }
}
