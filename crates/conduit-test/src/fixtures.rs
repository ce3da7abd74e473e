//! On-disk skill bundle fixtures.
//!
//! [`SkillBundleFixture`] owns a temporary skills root and writes bundles
//! into it. The `google-sheets` preset binds its tools to native handlers
//! backed by an in-memory sheet, so tests can assert on the effect of a
//! call without a network.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use conduit_skills::{CallError, CallResult, NativeBindings};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::harness::{test_dir, write_file};

/// Binding source of the `google-sheets` preset.
pub const GOOGLE_SHEETS_TOOLS: &str = r#"[[tool]]
name = "write_cell"
description = "Write a value into one cell"
native = "sheets.write_cell"

[[tool.param]]
name = "spreadsheet_id"
type = "string"
description = "Spreadsheet ID from the URL"

[[tool.param]]
name = "cell"
type = "string"
description = "A1-notation cell reference"

[[tool.param]]
name = "value"
type = "string"
description = "Value to write"

[[tool]]
name = "read_cell"
description = "Read the value of one cell"
native = "sheets.read_cell"

[[tool.param]]
name = "spreadsheet_id"
type = "string"

[[tool.param]]
name = "cell"
type = "string"
"#;

type Cells = Arc<Mutex<BTreeMap<String, String>>>;

/// A temporary skills root.
#[derive(Debug)]
pub struct SkillBundleFixture {
    dir: TempDir,
    cells: Cells,
}

impl SkillBundleFixture {
    /// Create an empty skills root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: test_dir(),
            cells: Arc::default(),
        }
    }

    /// The skills root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a bundle directory `dir_name` with a `SKILL.md` built from
    /// `frontmatter` and `body`, plus an optional `tools.toml`.
    pub fn bundle_raw(
        &self,
        dir_name: &str,
        frontmatter: &str,
        body: &str,
        tools: Option<&str>,
    ) -> PathBuf {
        let dir = self.root().join(dir_name);
        write_file(&dir, "SKILL.md", &format!("---\n{frontmatter}---\n{body}"));
        if let Some(tools) = tools {
            write_file(&dir, "tools.toml", tools);
        }
        dir
    }

    /// Write a bundle with no callables.
    pub fn bundle(&self, name: &str, description: &str, body: &str) -> PathBuf {
        self.bundle_raw(
            name,
            &format!("name: {name}\ndescription: {description}\n"),
            body,
            None,
        )
    }

    /// Write a bundle whose instruction body is `bytes` long.
    pub fn bundle_with_long_instructions(
        &self,
        name: &str,
        description: &str,
        bytes: usize,
    ) -> PathBuf {
        let mut body = format!("# {name}\n\n");
        let mut n = 0usize;
        while body.len() < bytes {
            let _ = writeln!(body, "Step {n}: follow the procedure carefully.");
            n = n.saturating_add(1);
        }
        self.bundle(name, description, &body)
    }

    /// Write a directory whose `SKILL.md` has no frontmatter.
    pub fn malformed(&self, dir_name: &str) -> PathBuf {
        let dir = self.root().join(dir_name);
        write_file(&dir, "SKILL.md", "# No frontmatter here\n");
        dir
    }

    /// Write a bundle that lacks the required `description` field.
    pub fn missing_description(&self, dir_name: &str) -> PathBuf {
        self.bundle_raw(dir_name, &format!("name: {dir_name}\n"), "body\n", None)
    }

    /// Write the `google-sheets` preset.
    pub fn google_sheets(&self) -> PathBuf {
        self.bundle_raw(
            "google-sheets",
            "name: google-sheets\n\
             description: Read and write cells in Google Sheets\n\
             triggers: [sheet, spreadsheet, cell]\n\
             tools_file: tools.toml\n",
            "# Google Sheets\n\n\
             Use A1 notation for cells. Call `read_cell` before overwriting a \
             value the user did not mention.\n",
            Some(GOOGLE_SHEETS_TOOLS),
        )
    }

    /// Native handlers for the presets, backed by this fixture's sheet.
    #[must_use]
    pub fn natives(&self) -> NativeBindings {
        let write = Arc::clone(&self.cells);
        let read = Arc::clone(&self.cells);
        NativeBindings::new()
            .with_fn("sheets.write_cell", move |args: Value| {
                let cells = Arc::clone(&write);
                async move { write_cell(&cells, &args) }
            })
            .with_fn("sheets.read_cell", move |args: Value| {
                let cells = Arc::clone(&read);
                async move { read_cell(&cells, &args) }
            })
    }

    /// Value written to `cell` of `spreadsheet_id` by the preset handlers.
    #[must_use]
    pub fn cell(&self, spreadsheet_id: &str, cell: &str) -> Option<String> {
        self.cells
            .lock()
            .ok()
            .and_then(|c| c.get(&format!("{spreadsheet_id}!{cell}")).cloned())
    }
}

impl Default for SkillBundleFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_key(args: &Value) -> String {
    format!(
        "{}!{}",
        args["spreadsheet_id"].as_str().unwrap_or_default(),
        args["cell"].as_str().unwrap_or_default()
    )
}

fn write_cell(cells: &Cells, args: &Value) -> CallResult<Value> {
    let key = cell_key(args);
    let value = args["value"].as_str().unwrap_or_default().to_string();
    cells
        .lock()
        .map_err(|_| failed("write_cell", "sheet lock poisoned"))?
        .insert(key.clone(), value.clone());
    Ok(json!({ "updated": key, "value": value }))
}

fn read_cell(cells: &Cells, args: &Value) -> CallResult<Value> {
    let key = cell_key(args);
    let guard = cells
        .lock()
        .map_err(|_| failed("read_cell", "sheet lock poisoned"))?;
    match guard.get(&key) {
        Some(v) => Ok(json!({ "cell": key, "value": v })),
        None => Err(failed("read_cell", &format!("{key} is empty"))),
    }
}

fn failed(callable: &str, message: &str) -> CallError {
    CallError::Failed {
        callable: callable.to_string(),
        message: message.to_string(),
    }
}
