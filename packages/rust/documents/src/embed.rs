//! Embedded code-editor markup.

use serde::Serialize;
use url::form_urlencoded;

use courseforge_shared::workspace::visible;
use courseforge_shared::{CourseError, FileTree, Result, new_id};

/// The workspace payload the editor loads from its query string.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkspacePayload<'a> {
    id: String,
    name: &'a str,
    environment_key: &'a str,
    files: FileTree,
}

/// Serialize one tree as an editor workspace; hidden files are left out.
pub fn workspace_json(name: &str, environment: &str, files: &FileTree) -> Result<String> {
    let payload = WorkspacePayload {
        id: new_id(),
        name,
        environment_key: environment,
        files: visible(files),
    };
    serde_json::to_string(&payload)
        .map_err(|e| CourseError::denormalize(name, format!("failed to serialize workspace: {e}")))
}

/// Workspace payloads for the three trees; each is present only for a non-empty tree.
#[derive(Debug, Default)]
pub struct EditorEmbed {
    pub src: Option<String>,
    pub tmpl: Option<String>,
    pub test: Option<String>,
}

impl EditorEmbed {
    /// Render the iframe pointing at `editor_url`.
    pub fn iframe(&self, editor_url: &str, height: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in [("src", &self.src), ("tmpl", &self.tmpl), ("test", &self.test)] {
            if let Some(value) = value {
                query.append_pair(key, value);
            }
        }
        let query = query.finish();
        let src = if query.is_empty() {
            editor_url.to_string()
        } else {
            format!("{editor_url}?{query}")
        };
        format!(
            r#"<iframe class="exl-repl" src="{src}" width="100%" height="{height}" frameborder="0"></iframe>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courseforge_shared::WorkspaceFile;

    fn tree() -> FileTree {
        let mut tree = FileTree::new();
        tree.insert("main.py".into(), WorkspaceFile::file("main.py", "print(\"hi\")"));
        let mut hidden = WorkspaceFile::file(".env", "SECRET=1");
        hidden.is_hidden = true;
        tree.insert(".env".into(), hidden);
        tree
    }

    #[test]
    fn payload_omits_hidden_files() {
        let json = workspace_json("Play", "python3", &tree()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "Play");
        assert_eq!(value["environmentKey"], "python3");
        assert_eq!(value["files"]["main.py"]["contents"], "print(\"hi\")");
        assert!(value["files"].get(".env").is_none());
        assert_eq!(value["id"].as_str().unwrap().len(), 32);
    }

    #[test]
    fn iframe_carries_only_present_trees() {
        let embed = EditorEmbed {
            src: Some(r#"{"a":"b c"}"#.into()),
            tmpl: None,
            test: Some("{}".into()),
        };
        let html = embed.iframe("https://editor.example/embed", "400px");
        assert!(html.starts_with(r#"<iframe class="exl-repl" src="https://editor.example/embed?src="#));
        assert!(html.contains("src=%7B%22a%22%3A%22b+c%22%7D"));
        assert!(html.contains("&test=%7B%7D"));
        assert!(!html.contains("tmpl="));
        assert!(html.ends_with(r#"width="100%" height="400px" frameborder="0"></iframe>"#));
    }

    #[test]
    fn iframe_without_trees_has_no_query() {
        let html = EditorEmbed::default().iframe("https://e/x", "1px");
        assert!(html.contains(r#"src="https://e/x" "#));
    }
}
