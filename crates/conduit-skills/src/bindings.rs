//! Binding sources (`tools.toml`).
//!
//! ```toml
//! [[tool]]
//! name = "write_cell"
//! description = "Write a value into one cell"
//! command = "python3"
//! args = ["scripts/sheets.py", "write_cell"]
//! env = ["GOOGLE_APPLICATION_CREDENTIALS"]
//! timeout_secs = 20
//!
//! [[tool.param]]
//! name = "spreadsheet_id"
//! type = "string"
//! description = "Spreadsheet ID from the URL"
//!
//! [[tool]]
//! name = "list_sheets"
//! description = "List worksheet names"
//! native = "sheets.list"
//! ```
//!
//! Each tool has exactly one handler: `command` (a subprocess, see
//! [`CommandFunction`]) or `native` (a key into host-registered
//! [`NativeBindings`]).

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::callable::{Callable, CallableSignature, NativeBindings, ParamSpec, SkillFunction};
use crate::command::CommandFunction;
use crate::error::BindingError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BindingFile {
    #[serde(default, rename = "tool")]
    tools: Vec<ToolEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "param")]
    params: Vec<ParamSpec>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: Vec<String>,
    timeout_secs: Option<u64>,
    native: Option<String>,
}

/// Settings applied while resolving a binding source.
#[derive(Debug, Clone)]
pub struct BindingContext<'a> {
    /// Host-registered native handlers.
    pub natives: &'a NativeBindings,
    /// Timeout for command handlers that do not set `timeout_secs`.
    pub default_timeout: Duration,
}

/// Parse a binding source and resolve every declared callable.
///
/// `exports`, when present, restricts the result to the listed names (in
/// declaration order); every listed name must be declared.
///
/// # Errors
///
/// Returns a [`BindingError`] when the file is invalid TOML, a tool has no
/// handler or two handlers, a native key is unknown, a name is declared twice,
/// or an export is not declared.
pub fn parse_bindings(
    content: &str,
    bundle_dir: &Path,
    exports: Option<&[String]>,
    ctx: &BindingContext<'_>,
) -> Result<Vec<Callable>, BindingError> {
    let file: BindingFile =
        toml::from_str(content).map_err(|e| BindingError::InvalidToml(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut callables = Vec::with_capacity(file.tools.len());

    for entry in file.tools {
        let name = entry.name.trim().to_string();
        if name.is_empty() {
            return Err(BindingError::EmptyName);
        }
        if !seen.insert(name.clone()) {
            return Err(BindingError::DuplicateTool(name));
        }
        let mut params_seen = HashSet::new();
        if let Some(dup) = entry
            .params
            .iter()
            .find(|p| !params_seen.insert(p.name.as_str()))
        {
            return Err(BindingError::DuplicateParam {
                tool: name,
                param: dup.name.clone(),
            });
        }

        if let Some(allowed) = exports
            && !allowed.iter().any(|a| a == &name)
        {
            continue;
        }

        let invoker: Arc<dyn SkillFunction> = match (entry.command, entry.native) {
            (Some(program), None) => {
                let timeout = entry
                    .timeout_secs
                    .map_or(ctx.default_timeout, Duration::from_secs);
                Arc::new(
                    CommandFunction::new(&name, program, bundle_dir)
                        .with_args(entry.args)
                        .with_passthrough_env(entry.env)
                        .with_timeout(timeout),
                )
            },
            (None, Some(key)) => match ctx.natives.get(&key) {
                Some(native) => native,
                None => return Err(BindingError::UnknownNative { tool: name, key }),
            },
            (Some(_), Some(_)) => return Err(BindingError::ConflictingHandlers(name)),
            (None, None) => return Err(BindingError::MissingHandler(name)),
        };

        let signature = CallableSignature {
            name,
            description: entry.description,
            params: entry.params,
        };
        callables.push(Callable::new(signature, invoker));
    }

    if let Some(allowed) = exports
        && let Some(missing) = allowed.iter().find(|a| !seen.contains(a.as_str()))
    {
        return Err(BindingError::UndeclaredExport(missing.clone()));
    }

    Ok(callables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn ctx(natives: &NativeBindings) -> BindingContext<'_> {
        BindingContext {
            natives,
            default_timeout: Duration::from_secs(5),
        }
    }

    const SHEETS: &str = r#"
        [[tool]]
        name = "read_cell"
        description = "Read one cell"
        native = "sheets.read"

        [[tool.param]]
        name = "spreadsheet_id"

        [[tool.param]]
        name = "cell"

        [[tool.param]]
        name = "sheet_name"
        required = false

        [[tool]]
        name = "list_sheets"
        description = "List sheets"
        command = "python3"
        args = ["scripts/sheets.py", "list_sheets"]
        timeout_secs = 10

        [[tool.param]]
        name = "spreadsheet_id"
        type = "string"
    "#;

    fn natives() -> NativeBindings {
        NativeBindings::new().with_fn("sheets.read", |_args: Value| async { Ok(Value::from("7")) })
    }

    #[test]
    fn test_parse_declared_order_and_params() {
        let natives = natives();
        let callables = parse_bindings(SHEETS, Path::new("/b"), None, &ctx(&natives)).unwrap();
        let names: Vec<_> = callables.iter().map(Callable::name).collect();
        assert_eq!(names, ["read_cell", "list_sheets"]);

        let read = &callables[0].signature;
        let param_names: Vec<_> = read.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(param_names, ["spreadsheet_id", "cell", "sheet_name"]);
        assert!(read.params[0].required);
        assert!(!read.params[2].required);
    }

    #[test]
    fn test_exports_filter() {
        let natives = natives();
        let exports = vec!["list_sheets".to_string()];
        let callables =
            parse_bindings(SHEETS, Path::new("/b"), Some(&exports), &ctx(&natives)).unwrap();
        assert_eq!(callables.len(), 1);
        assert_eq!(callables[0].name(), "list_sheets");
    }

    #[test]
    fn test_undeclared_export_fails() {
        let natives = natives();
        let exports = vec!["delete_sheet".to_string()];
        let err = parse_bindings(SHEETS, Path::new("/b"), Some(&exports), &ctx(&natives))
            .unwrap_err();
        assert_eq!(err, BindingError::UndeclaredExport("delete_sheet".to_string()));
    }

    #[test]
    fn test_unknown_native_fails() {
        let err = parse_bindings(SHEETS, Path::new("/b"), None, &ctx(&NativeBindings::new()))
            .unwrap_err();
        assert_eq!(
            err,
            BindingError::UnknownNative {
                tool: "read_cell".to_string(),
                key: "sheets.read".to_string(),
            }
        );
        assert!(err.to_string().contains("sheets.read"));
    }

    #[test]
    fn test_handler_rules() {
        let natives = natives();
        let none = "[[tool]]\nname = \"a\"\n";
        assert_eq!(
            parse_bindings(none, Path::new("/b"), None, &ctx(&natives)).unwrap_err(),
            BindingError::MissingHandler("a".to_string())
        );

        let both = "[[tool]]\nname = \"a\"\ncommand = \"x\"\nnative = \"sheets.read\"\n";
        assert_eq!(
            parse_bindings(both, Path::new("/b"), None, &ctx(&natives)).unwrap_err(),
            BindingError::ConflictingHandlers("a".to_string())
        );
    }

    #[test]
    fn test_duplicates_fail() {
        let natives = natives();
        let dup = "[[tool]]\nname = \"a\"\ncommand = \"x\"\n[[tool]]\nname = \"a\"\ncommand = \"y\"\n";
        assert_eq!(
            parse_bindings(dup, Path::new("/b"), None, &ctx(&natives)).unwrap_err(),
            BindingError::DuplicateTool("a".to_string())
        );

        let dup_param = "[[tool]]\nname = \"a\"\ncommand = \"x\"\n[[tool.param]]\nname = \"p\"\n[[tool.param]]\nname = \"p\"\n";
        assert!(matches!(
            parse_bindings(dup_param, Path::new("/b"), None, &ctx(&natives)),
            Err(BindingError::DuplicateParam { ref param, .. }) if param == "p"
        ));
    }

    #[test]
    fn test_empty_source_has_no_callables() {
        let natives = NativeBindings::new();
        let callables = parse_bindings("", Path::new("/b"), None, &ctx(&natives)).unwrap();
        assert!(callables.is_empty());
    }

    #[test]
    fn test_invalid_toml() {
        let natives = NativeBindings::new();
        let err = parse_bindings("[[tool]\n", Path::new("/b"), None, &ctx(&natives)).unwrap_err();
        assert!(matches!(err, BindingError::InvalidToml(_)));
        assert!(err.to_string().starts_with("invalid TOML"));
    }
}
