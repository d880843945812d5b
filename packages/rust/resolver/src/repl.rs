//! Loading and writing REPL/workspace configs and their file trees.

use std::path::{Path, PathBuf};

use tracing::debug;

use courseforge_shared::{CourseError, FileTree, ReplConfig, Result, TreeRole, WorkspaceFile};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a REPL YAML and the file trees it references.
///
/// Tree paths resolve relative to the YAML's directory. Trees are nested
/// under the environment's prefix.
pub fn load_repl(yaml_path: &Path) -> Result<ReplConfig> {
    let yaml = std::fs::read_to_string(yaml_path).map_err(|e| CourseError::io(yaml_path, e))?;
    let mut config = ReplConfig::from_yaml(&yaml)
        .map_err(|e| CourseError::repl(format!("{}: {e}", yaml_path.display())))?;
    let env = config.env()?;
    let base = yaml_path.parent().unwrap_or_else(|| Path::new("."));

    config.src_files = env.nest(load_tree(base, &config.src_path, TreeRole::Source)?, TreeRole::Source);
    config.tmpl_files = env.nest(
        load_tree(base, &config.tmpl_path, TreeRole::Template)?,
        TreeRole::Template,
    );
    config.test_files = env.nest(load_tree(base, &config.test_path, TreeRole::Test)?, TreeRole::Test);

    debug!(
        path = %yaml_path.display(),
        environment = %config.environment,
        src = config.src_files.len(),
        tmpl = config.tmpl_files.len(),
        test = config.test_files.len(),
        "loaded repl config"
    );
    Ok(config)
}

fn load_tree(base: &Path, rel: &str, role: TreeRole) -> Result<FileTree> {
    if rel.trim().is_empty() {
        return Ok(FileTree::new());
    }
    let dir = base.join(rel);
    if !dir.is_dir() {
        return Err(CourseError::repl(format!(
            "{role:?} path {rel} does not exist (resolved to {})",
            dir.display()
        )));
    }
    read_dir_tree(&dir, role == TreeRole::Template)
}

fn read_dir_tree(dir: &Path, is_template: bool) -> Result<FileTree> {
    let mut tree = FileTree::new();
    let entries = std::fs::read_dir(dir).map_err(|e| CourseError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CourseError::io(dir, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().map_err(|e| CourseError::io(&path, e))?;

        let mut file = if file_type.is_dir() {
            WorkspaceFile::dir(&name, read_dir_tree(&path, is_template)?)
        } else {
            let bytes = std::fs::read(&path).map_err(|e| CourseError::io(&path, e))?;
            let mut f = WorkspaceFile::from_bytes(&name, bytes);
            f.is_tmpl_file = is_template;
            f
        };
        file.is_hidden = name.starts_with('.');
        tree.insert(name, file);
    }
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a REPL YAML at `yaml_path` with its trees under `<stem>.repl/`.
///
/// The tree paths in the written YAML are rewritten to that layout; the
/// environment prefix is stripped so the trees re-nest on load.
pub fn write_repl(yaml_path: &Path, config: &ReplConfig) -> Result<()> {
    let env = config.env()?;
    let base = yaml_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = yaml_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CourseError::Export(format!("invalid repl path {}", yaml_path.display())))?;
    let stem = file_name.strip_suffix(".yaml").unwrap_or(&file_name);
    let tree_root = if stem.ends_with(".repl") {
        stem.to_string()
    } else {
        format!("{stem}.repl")
    };

    let mut out = config.clone();
    for (role, tree, path) in [
        (TreeRole::Source, &config.src_files, &mut out.src_path),
        (TreeRole::Template, &config.tmpl_files, &mut out.tmpl_path),
        (TreeRole::Test, &config.test_files, &mut out.test_path),
    ] {
        if tree.is_empty() {
            path.clear();
            continue;
        }
        let sub = match role {
            TreeRole::Source => "src",
            TreeRole::Template => "tmpl",
            TreeRole::Test => "test",
        };
        *path = format!("./{tree_root}/{sub}");
        let dir: PathBuf = base.join(&tree_root).join(sub);
        write_tree(&dir, &env.strip(tree, role))?;
    }

    let yaml = serde_yaml::to_string(&out)
        .map_err(|e| CourseError::Export(format!("failed to serialize repl config: {e}")))?;
    if let Some(parent) = yaml_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CourseError::io(parent, e))?;
    }
    std::fs::write(yaml_path, yaml).map_err(|e| CourseError::io(yaml_path, e))
}

fn write_tree(dir: &Path, tree: &FileTree) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| CourseError::io(dir, e))?;
    for (name, file) in tree {
        let path = dir.join(name);
        if file.is_dir {
            write_tree(&path, &file.children)?;
        } else {
            std::fs::write(&path, file.bytes()?).map_err(|e| CourseError::io(&path, e))?;
        }
    }
    Ok(())
}
