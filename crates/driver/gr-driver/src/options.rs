//! Option normalization and configuration discovery
//!
//! Raw options arrive as a JSON object. Normalization resolves aliases,
//! applies per-option coercions (a comma-separated string becomes a
//! list), fills defaults, and rejects unknown keys outright. Deprecated
//! options are hard errors, not warnings. A `.graftrc` file discovered
//! next to (or above) the compiled file is merged underneath the
//! caller's options; explicit options always win.

use crate::error::Error;
use gr_span::SourceMap;
use std::path::Path;

/// File name probed during configuration discovery
pub const RC_FILENAME: &str = ".graftrc";

/// Normalized per-compilation options
#[derive(Debug, Clone)]
pub struct Options {
    /// Originating file identifier, for diagnostics and maps
    pub filename: String,
    /// Whether to produce a coordinate map
    pub source_maps: bool,
    /// Map carried by the input, composed into the generated map
    pub input_source_map: Option<SourceMap>,
    /// Module formatter name; `"ignore"` leaves imports untouched
    pub modules: String,
    /// Names of opt-in builtin passes to enable
    pub optional: Vec<String>,
    /// Builtin pass names to exclude
    pub blacklist: Vec<String>,
    /// When non-empty, the only builtin passes to include
    pub whitelist: Vec<String>,
    /// Reference a shared helpers namespace instead of inlining helpers
    pub external_helpers: bool,
    /// Whether to emit code at all
    pub code: bool,
    /// Whether to reprint comments
    pub comments: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            filename: "unknown".to_owned(),
            source_maps: false,
            input_source_map: None,
            modules: "ignore".to_owned(),
            optional: Vec::new(),
            blacklist: Vec::new(),
            whitelist: Vec::new(),
            external_helpers: false,
            code: true,
            comments: true,
        }
    }
}

enum Kind {
    Bool,
    Str,
    List,
    Map,
}

struct OptionDef {
    name: &'static str,
    aliases: &'static [&'static str],
    #[expect(dead_code, reason = "recorded per option but not yet consulted")]
    kind: Kind,
    deprecated: bool,
}

const OPTION_DEFS: &[OptionDef] = &[
    OptionDef { name: "filename", aliases: &["sourceFileName"], kind: Kind::Str, deprecated: false },
    OptionDef { name: "sourceMaps", aliases: &["sourceMap"], kind: Kind::Bool, deprecated: false },
    OptionDef { name: "inputSourceMap", aliases: &[], kind: Kind::Map, deprecated: false },
    OptionDef { name: "modules", aliases: &[], kind: Kind::Str, deprecated: false },
    OptionDef { name: "optional", aliases: &[], kind: Kind::List, deprecated: false },
    OptionDef { name: "blacklist", aliases: &[], kind: Kind::List, deprecated: false },
    OptionDef { name: "whitelist", aliases: &[], kind: Kind::List, deprecated: false },
    OptionDef { name: "externalHelpers", aliases: &[], kind: Kind::Bool, deprecated: false },
    OptionDef { name: "code", aliases: &[], kind: Kind::Bool, deprecated: false },
    OptionDef { name: "comments", aliases: &[], kind: Kind::Bool, deprecated: false },
    // removed in earlier releases; still recognized so the error names them
    OptionDef { name: "playground", aliases: &[], kind: Kind::Bool, deprecated: true },
    OptionDef { name: "experimental", aliases: &[], kind: Kind::Bool, deprecated: true },
];

impl Options {
    /// Normalizes a raw JSON options object, after merging any discovered
    /// configuration file underneath it
    pub fn resolve(raw: &serde_json::Value) -> Result<Self, Error> {
        let mut merged = serde_json::Map::new();
        if let Some(object) = raw.as_object() {
            if let Some(filename) = object.get("filename").and_then(serde_json::Value::as_str) {
                if let Some(discovered) = discover(Path::new(filename))? {
                    merged.extend(discovered);
                }
            }
            merged.extend(object.clone());
        } else if !raw.is_null() {
            return Err(Error::Configuration {
                message: "options must be an object".to_owned(),
            });
        }
        Self::normalize(&merged)
    }

    fn normalize(raw: &serde_json::Map<String, serde_json::Value>) -> Result<Self, Error> {
        let mut options = Self::default();
        for (key, value) in raw {
            let def = OPTION_DEFS
                .iter()
                .find(|def| def.name == key || def.aliases.contains(&key.as_str()))
                .ok_or_else(|| Error::Configuration {
                    message: format!("unknown option `{key}`"),
                })?;
            if def.deprecated {
                return Err(Error::Configuration {
                    message: format!("option `{}` is no longer supported", def.name),
                });
            }
            match def.name {
                "filename" => options.filename = coerce_str(def, value)?,
                "sourceMaps" => options.source_maps = coerce_bool(def, value)?,
                "inputSourceMap" => options.input_source_map = Some(coerce_map(def, value)?),
                "modules" => options.modules = coerce_str(def, value)?,
                "optional" => options.optional = coerce_list(def, value)?,
                "blacklist" => options.blacklist = coerce_list(def, value)?,
                "whitelist" => options.whitelist = coerce_list(def, value)?,
                "externalHelpers" => options.external_helpers = coerce_bool(def, value)?,
                "code" => options.code = coerce_bool(def, value)?,
                "comments" => options.comments = coerce_bool(def, value)?,
                _ => {}
            }
        }
        Ok(options)
    }
}

/// Walks from `filename`'s directory upward looking for an rc file;
/// missing directories (an in-memory filename) end the search quietly
fn discover(
    filename: &Path,
) -> Result<Option<serde_json::Map<String, serde_json::Value>>, Error> {
    let mut dir = filename.parent();
    while let Some(current) = dir {
        let candidate = current.join(RC_FILENAME);
        if candidate.is_file() {
            let text = std::fs::read_to_string(&candidate)?;
            let parsed: serde_json::Value =
                serde_json::from_str(&text).map_err(|parse_error| Error::Configuration {
                    message: format!(
                        "malformed {} at {}: {parse_error}",
                        RC_FILENAME,
                        candidate.display()
                    ),
                })?;
            let object = parsed.as_object().cloned().ok_or_else(|| Error::Configuration {
                message: format!("{RC_FILENAME} must contain a JSON object"),
            })?;
            return Ok(Some(object));
        }
        if !current.is_dir() {
            break;
        }
        dir = current.parent();
    }
    Ok(None)
}

fn coerce_bool(def: &OptionDef, value: &serde_json::Value) -> Result<bool, Error> {
    value.as_bool().ok_or_else(|| type_error(def, "a boolean"))
}

fn coerce_str(def: &OptionDef, value: &serde_json::Value) -> Result<String, Error> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| type_error(def, "a string"))
}

/// Lists accept either an array of strings or a comma-separated string
fn coerce_list(def: &OptionDef, value: &serde_json::Value) -> Result<Vec<String>, Error> {
    match value {
        serde_json::Value::String(text) => Ok(text
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_owned)
            .collect()),
        serde_json::Value::Array(entries) => entries
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| type_error(def, "a list of strings"))
            })
            .collect(),
        _ => Err(type_error(def, "a list of strings")),
    }
}

fn coerce_map(def: &OptionDef, value: &serde_json::Value) -> Result<SourceMap, Error> {
    serde_json::from_value(value.clone()).map_err(|_| type_error(def, "a coordinate map object"))
}

fn type_error(def: &OptionDef, expected: &str) -> Error {
    Error::Configuration {
        message: format!("option `{}` must be {expected}", def.name),
    }
}
