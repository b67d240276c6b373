//! Compact JSON codec for changes and change sets.
//!
//! Each change is an array `[name, ...args]`:
//!
//! - `["insert", path, [content…]]`
//! - `["delete", path, [content…]]`
//! - `["update-attr", path, [[name, ns, old, new]…]]`
//! - `["update-range", range, range]` with `range` being
//!   `{"start": path, "end": path}` or `null`
//!
//! Paths are arrays of `[offset, name]` pairs; content nodes use the JsonML
//! form of `tree_dom::value`.

use serde_json::{json, Map, Value};
use thiserror::Error;
use tree_dom::{node_from_value, node_to_value, FromValueError, Node};

use crate::change::{AttrChange, Change, ChangeSet, RangePaths, RangeUpdate};
use crate::path::{Path, PathStep};

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("change must be an array with a string name")]
    MalformedChange,
    #[error("unknown change name: {0}")]
    UnknownChange(String),
    #[error("path must be an array of [offset, name] pairs")]
    MalformedPath,
    #[error("attr entry must be [name, ns, old, new]")]
    MalformedAttr,
    #[error("range must be null or {{start, end}}")]
    MalformedRange,
    #[error("change set must be an object with a changes array")]
    MalformedChangeSet,
    #[error("content: {0}")]
    Content(#[from] FromValueError),
}

// ── Paths ─────────────────────────────────────────────────────────────────

fn path_to_value(path: &Path) -> Value {
    Value::Array(
        path.iter()
            .map(|step| json!([step.offset, step.name]))
            .collect(),
    )
}

fn path_from_value(value: &Value) -> Result<Path, CodecError> {
    let items = value.as_array().ok_or(CodecError::MalformedPath)?;
    items
        .iter()
        .map(|item| {
            let pair = item.as_array().ok_or(CodecError::MalformedPath)?;
            if pair.len() != 2 {
                return Err(CodecError::MalformedPath);
            }
            let offset = pair[0]
                .as_u64()
                .ok_or(CodecError::MalformedPath)? as usize;
            let name = pair[1].as_str().ok_or(CodecError::MalformedPath)?;
            Ok(PathStep::new(offset, name))
        })
        .collect()
}

// ── Ranges ────────────────────────────────────────────────────────────────

fn range_to_value(range: &Option<RangePaths>) -> Value {
    match range {
        None => Value::Null,
        Some(paths) => json!({
            "start": path_to_value(&paths.start),
            "end": path_to_value(&paths.end),
        }),
    }
}

fn range_from_value(value: &Value) -> Result<Option<RangePaths>, CodecError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => {
            let start = map.get("start").ok_or(CodecError::MalformedRange)?;
            let end = map.get("end").ok_or(CodecError::MalformedRange)?;
            Ok(Some(RangePaths {
                start: path_from_value(start)?,
                end: path_from_value(end)?,
            }))
        }
        _ => Err(CodecError::MalformedRange),
    }
}

// ── Changes ───────────────────────────────────────────────────────────────

fn content_to_value(content: &[Node]) -> Value {
    Value::Array(content.iter().map(|n| node_to_value(n)).collect())
}

fn content_from_value(value: &Value) -> Result<Vec<Node>, CodecError> {
    let items = value.as_array().ok_or(CodecError::MalformedChange)?;
    items.iter().map(|v| Ok(node_from_value(v)?)).collect()
}

pub fn change_to_value(change: &Change) -> Value {
    match change {
        Change::Insert { path, content } => {
            json!(["insert", path_to_value(path), content_to_value(content)])
        }
        Change::Delete { path, content } => {
            json!(["delete", path_to_value(path), content_to_value(content)])
        }
        Change::UpdateAttr { path, attrs } => {
            let attrs: Vec<Value> = attrs
                .iter()
                .map(|a| json!([a.name, a.ns, a.old_value, a.new_value]))
                .collect();
            json!(["update-attr", path_to_value(path), attrs])
        }
        Change::UpdateRange(update) => {
            json!([
                "update-range",
                range_to_value(&update.old_range),
                range_to_value(&update.new_range),
            ])
        }
    }
}

fn opt_string(value: &Value) -> Result<Option<String>, CodecError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(CodecError::MalformedAttr),
    }
}

pub fn change_from_value(value: &Value) -> Result<Change, CodecError> {
    let items = value.as_array().ok_or(CodecError::MalformedChange)?;
    let name = items
        .first()
        .and_then(Value::as_str)
        .ok_or(CodecError::MalformedChange)?;
    let arg = |i: usize| items.get(i).ok_or(CodecError::MalformedChange);
    match name {
        "insert" => Ok(Change::Insert {
            path: path_from_value(arg(1)?)?,
            content: content_from_value(arg(2)?)?,
        }),
        "delete" => Ok(Change::Delete {
            path: path_from_value(arg(1)?)?,
            content: content_from_value(arg(2)?)?,
        }),
        "update-attr" => {
            let path = path_from_value(arg(1)?)?;
            let entries = arg(2)?.as_array().ok_or(CodecError::MalformedChange)?;
            let attrs = entries
                .iter()
                .map(|entry| {
                    let fields = entry.as_array().ok_or(CodecError::MalformedAttr)?;
                    if fields.len() != 4 {
                        return Err(CodecError::MalformedAttr);
                    }
                    Ok(AttrChange {
                        name: fields[0]
                            .as_str()
                            .ok_or(CodecError::MalformedAttr)?
                            .to_string(),
                        ns: opt_string(&fields[1])?,
                        old_value: opt_string(&fields[2])?,
                        new_value: opt_string(&fields[3])?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Change::UpdateAttr { path, attrs })
        }
        "update-range" => Ok(Change::UpdateRange(RangeUpdate {
            old_range: range_from_value(arg(1)?)?,
            new_range: range_from_value(arg(2)?)?,
        })),
        other => Err(CodecError::UnknownChange(other.to_string())),
    }
}

// ── Change sets ───────────────────────────────────────────────────────────

pub fn change_set_to_value(change_set: &ChangeSet) -> Value {
    let mut map = Map::new();
    map.insert(
        "changes".to_string(),
        Value::Array(change_set.changes.iter().map(change_to_value).collect()),
    );
    map.insert(
        "meta".to_string(),
        change_set.meta.clone().unwrap_or(Value::Null),
    );
    let selection = match &change_set.selection {
        None => Value::Null,
        Some(update) => json!([
            range_to_value(&update.old_range),
            range_to_value(&update.new_range),
        ]),
    };
    map.insert("selection".to_string(), selection);
    Value::Object(map)
}

pub fn change_set_from_value(value: &Value) -> Result<ChangeSet, CodecError> {
    let map = value.as_object().ok_or(CodecError::MalformedChangeSet)?;
    let changes = map
        .get("changes")
        .and_then(Value::as_array)
        .ok_or(CodecError::MalformedChangeSet)?
        .iter()
        .map(change_from_value)
        .collect::<Result<Vec<_>, _>>()?;
    let meta = match map.get("meta") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.clone()),
    };
    let selection = match map.get("selection") {
        None | Some(Value::Null) => None,
        Some(Value::Array(pair)) if pair.len() == 2 => Some(RangeUpdate {
            old_range: range_from_value(&pair[0])?,
            new_range: range_from_value(&pair[1])?,
        }),
        Some(_) => return Err(CodecError::MalformedChangeSet),
    };
    Ok(ChangeSet {
        changes,
        meta,
        selection,
    })
}
