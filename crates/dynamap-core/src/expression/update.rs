//! Update compilation: update document -> `UpdateExpression`.
//!
//! An update document is either flattened (`{"name": "Bob"}`) or bucketed
//! under `$SET`, `$ADD`, `$REMOVE` and `$DELETE`; both forms may be mixed.
//! Clauses are emitted in a fixed order, `ADD`, `REMOVE`, `SET`, `DELETE`,
//! and placeholder tokens are allocated in emission order. Within a clause,
//! flattened and bucketed entries follow the document's sorted key order.

use std::collections::HashSet;

use chrono::Utc;
use dynamap_model::{AttributeValue, CompiledExpression};
use tracing::debug;

use super::ast::{AddAction, DeleteAction, SetAction, SetValue, UpdateExpr};
use super::placeholder::PlaceholderTable;
use crate::error::{MapperError, MapperResult};
use crate::marshal::codec::{encode_natural, encode_set};
use crate::marshal::{
    MarshalOptions, RequiredCheck, TimestampMode, apply_set_modifiers, check_value,
    evaluate_default, join_sources, missing_required, value_to_wire,
};
use crate::resolver::{PathSegment, ResolvedPath, Scope};
use crate::schema::{AttributeDefinition, CandidateType, Primitive, Schema};
use crate::value::{Document, Value};

/// Options for [`Mapper::compile_update`].
///
/// [`Mapper::compile_update`]: crate::Mapper::compile_update
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Snapshot of the stored item, if the caller has one. It feeds default
    /// functions, combine recomputation, and lets `$ADD` on an empty or
    /// absent list emit a plain `SET`.
    pub current: Option<Document>,
    /// Pipeline applied to SET values.
    pub marshal: MarshalOptions,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            current: None,
            marshal: MarshalOptions::update(),
        }
    }
}

impl UpdateOptions {
    /// Default options with a snapshot of the stored item.
    #[must_use]
    pub fn with_current(current: Document) -> Self {
        Self {
            current: Some(current),
            ..Self::default()
        }
    }
}

/// What the caller asked for, per path.
#[derive(Debug, Clone)]
enum Request {
    Set(Value),
    Add(Value),
    Remove { forced: bool },
    Delete(Value),
}

#[derive(Debug)]
struct Action {
    path: String,
    resolved: ResolvedPath,
    request: Request,
}

impl Action {
    /// The attribute when the path names a top-level attribute.
    fn top_level(&self) -> Option<&AttributeDefinition> {
        if self.resolved.is_top_level() {
            self.resolved.attribute.as_ref()
        } else {
            None
        }
    }

    fn top_level_name(&self) -> Option<&str> {
        self.top_level().map(AttributeDefinition::name)
    }
}

/// A fully encoded action, ready for token allocation.
#[derive(Debug)]
enum Lowered {
    Add(Vec<PathSegment>, AttributeValue),
    Remove(Vec<PathSegment>),
    Set(Vec<PathSegment>, AttributeValue),
    Append(Vec<PathSegment>, AttributeValue),
    Delete(Vec<PathSegment>, AttributeValue),
}

pub(crate) async fn compile_update(
    scope: &Scope<'_>,
    update: &Document,
    options: &UpdateOptions,
) -> MapperResult<CompiledExpression> {
    let schema = &scope.root;
    let marshal = &options.marshal;
    let empty = Document::new();
    let current = options.current.as_ref().unwrap_or(&empty);

    let mut actions = Vec::new();
    for (path, request) in collect_requests(update)? {
        let resolved = scope.lookup(&path)?;
        let action = Action {
            path,
            resolved,
            request,
        };
        if let Some(name) = action.top_level_name() {
            if schema.is_key(name) {
                return Err(MapperError::invalid(format!(
                    "Can not update key attribute {name}"
                )));
            }
        }
        actions.push(action);
    }

    restore_defaults(&mut actions, current, marshal).await?;
    prepare_sets(&mut actions, marshal).await?;
    add_derived_sets(scope, schema, &mut actions, current, marshal).await?;

    let mut lowered = Vec::with_capacity(actions.len());
    for action in &actions {
        lowered.push(lower(scope, action, current, marshal).await?);
    }

    let mut table = PlaceholderTable::new();
    let mut expr = UpdateExpr::default();
    for item in &lowered {
        if let Lowered::Add(segments, value) = item {
            let path = table.path(segments);
            let value = table.value(value.clone());
            expr.add_actions.push(AddAction { path, value });
        }
    }
    for item in &lowered {
        if let Lowered::Remove(segments) = item {
            expr.remove_paths.push(table.path(segments));
        }
    }
    for item in &lowered {
        match item {
            Lowered::Set(segments, value) => {
                let path = table.path(segments);
                let value = SetValue::Value(table.value(value.clone()));
                expr.set_actions.push(SetAction { path, value });
            }
            Lowered::Append(segments, value) => {
                let path = table.path(segments);
                let value = SetValue::ListAppend(path.clone(), table.value(value.clone()));
                expr.set_actions.push(SetAction { path, value });
            }
            _ => {}
        }
    }
    for item in &lowered {
        if let Lowered::Delete(segments, value) = item {
            let path = table.path(segments);
            let value = table.value(value.clone());
            expr.delete_actions.push(DeleteAction { path, value });
        }
    }

    let expression = if expr.is_empty() {
        String::new()
    } else {
        expr.to_string()
    };
    debug!(
        expression = %expression,
        names = table.name_count(),
        values = table.value_count(),
        "compiled update"
    );
    Ok(table.finish(expression))
}

/// Splits an update document into per-path requests, in document order.
fn collect_requests(update: &Document) -> MapperResult<Vec<(String, Request)>> {
    let mut requests = Vec::new();
    for (key, value) in update {
        match key.as_str() {
            "$SET" => {
                for (path, value) in bucket(key, value)? {
                    requests.push((path.clone(), Request::Set(value.clone())));
                }
            }
            "$ADD" => {
                for (path, value) in bucket(key, value)? {
                    requests.push((path.clone(), Request::Add(value.clone())));
                }
            }
            "$DELETE" => {
                for (path, value) in bucket(key, value)? {
                    requests.push((path.clone(), Request::Delete(value.clone())));
                }
            }
            "$REMOVE" => match value {
                Value::Map(map) => {
                    for path in map.keys() {
                        requests.push((path.clone(), Request::Remove { forced: false }));
                    }
                }
                Value::List(names) => {
                    for name in names {
                        let Some(path) = name.as_str() else {
                            return Err(MapperError::invalid(
                                "$REMOVE takes attribute names as strings",
                            ));
                        };
                        requests.push((path.to_owned(), Request::Remove { forced: false }));
                    }
                }
                Value::String(path) => {
                    requests.push((path.clone(), Request::Remove { forced: false }));
                }
                _ => {
                    return Err(MapperError::invalid(
                        "$REMOVE takes an object or a list of attribute names",
                    ));
                }
            },
            other if other.starts_with('$') => {
                return Err(MapperError::invalid(format!("Unknown update operator: {other}")));
            }
            _ if value.is_undefined() => {
                requests.push((key.clone(), Request::Remove { forced: true }));
            }
            _ => requests.push((key.clone(), Request::Set(value.clone()))),
        }
    }
    Ok(requests)
}

fn bucket<'v>(operator: &str, value: &'v Value) -> MapperResult<&'v Document> {
    value
        .as_map()
        .ok_or_else(|| MapperError::invalid(format!("{operator} takes an object")))
}

/// Turns removals of attributes with a default into a SET of the default,
/// and rejects removal of required attributes without one.
async fn restore_defaults(
    actions: &mut [Action],
    current: &Document,
    marshal: &MarshalOptions,
) -> MapperResult<()> {
    for action in actions.iter_mut() {
        let Request::Remove { forced } = action.request else {
            continue;
        };
        let Some(attribute) = action.top_level().cloned() else {
            continue;
        };
        if !forced {
            if let Some(value) = evaluate_default(&attribute, current, &action.path).await? {
                action.request = Request::Set(value);
                continue;
            }
        }
        if attribute.settings().required && marshal.required != RequiredCheck::Off {
            return Err(missing_required(&action.path));
        }
    }
    Ok(())
}

/// Runs `set` modifiers and value checks on top-level SET values.
async fn prepare_sets(actions: &mut [Action], marshal: &MarshalOptions) -> MapperResult<()> {
    for action in actions.iter_mut() {
        let Some(attribute) = action.top_level().cloned() else {
            continue;
        };
        let Request::Set(value) = &action.request else {
            continue;
        };
        let mut value = value.clone();
        if marshal.modifiers {
            value = apply_set_modifiers(&attribute, value, &action.path).await?;
        }
        if attribute.settings().required
            && marshal.required != RequiredCheck::Off
            && value.is_undefined()
        {
            return Err(missing_required(&action.path));
        }
        check_value(&attribute, &value, &action.path, marshal).await?;
        action.request = Request::Set(value);
    }
    Ok(())
}

/// Appends the SETs the update implies: forced defaults, `updatedAt` and
/// recomputed combine attributes.
async fn add_derived_sets(
    scope: &Scope<'_>,
    schema: &Schema,
    actions: &mut Vec<Action>,
    current: &Document,
    marshal: &MarshalOptions,
) -> MapperResult<()> {
    let touched: HashSet<String> = actions
        .iter()
        .filter_map(|a| a.top_level_name().map(str::to_owned))
        .collect();

    if marshal.force_defaults {
        for attribute in schema.attributes() {
            if !attribute.settings().force_default
                || touched.contains(attribute.name())
                || schema.is_key(attribute.name())
            {
                continue;
            }
            if let Some(value) = evaluate_default(attribute, current, attribute.name()).await? {
                actions.push(derived_set(scope, attribute.native_name(), value)?);
            }
        }
    }

    if marshal.timestamps != TimestampMode::Off {
        let updated_at = schema
            .settings()
            .timestamps
            .as_ref()
            .and_then(|t| t.updated_at.as_deref());
        if let Some(updated_at) = updated_at {
            if !touched.contains(updated_at) {
                actions.push(derived_set(scope, updated_at, Value::Date(Utc::now()))?);
            }
        }
    }

    if marshal.combine {
        recompute_combines(scope, schema, actions, current)?;
    }
    Ok(())
}

fn derived_set(scope: &Scope<'_>, path: &str, value: Value) -> MapperResult<Action> {
    Ok(Action {
        path: path.to_owned(),
        resolved: scope.lookup(path)?,
        request: Request::Set(value),
    })
}

/// Recomputes combine attributes whose sources change in this update.
///
/// The sources present afterwards are the SET values plus whatever `current`
/// still holds once removals apply. A combine attribute is removed when none
/// remain and rejected when only some do.
fn recompute_combines(
    scope: &Scope<'_>,
    schema: &Schema,
    actions: &mut Vec<Action>,
    current: &Document,
) -> MapperResult<()> {
    for attribute in schema.attributes() {
        let Some((sources, separator)) = attribute.combine() else {
            continue;
        };
        let name = attribute.name();
        let source_set = sources.iter().any(|source| {
            actions
                .iter()
                .any(|a| a.top_level_name() == Some(source.as_str()) && matches!(a.request, Request::Set(_)))
        });
        let is_removed = |source: &str| {
            actions.iter().any(|a| {
                a.top_level_name() == Some(source) && matches!(a.request, Request::Remove { .. })
            })
        };
        let any_removed = sources.iter().any(|source| is_removed(source));
        let supplied = actions
            .iter()
            .any(|a| a.top_level_name() == Some(name) && matches!(a.request, Request::Set(_)));
        if !source_set && !any_removed && !supplied {
            continue;
        }

        let mut values = Vec::with_capacity(sources.len());
        let mut missing = Vec::new();
        for source in sources {
            let from_update = actions.iter().find_map(|a| match &a.request {
                Request::Set(value) if a.top_level_name() == Some(source.as_str()) => Some(value),
                _ => None,
            });
            let native = schema
                .attribute(source)
                .map_or(source.as_str(), AttributeDefinition::native_name);
            let value = from_update.or_else(|| {
                (!is_removed(source))
                    .then(|| current.get(native).or_else(|| current.get(source)))
                    .flatten()
            });
            match value.filter(|v| !v.is_undefined()) {
                Some(value) => values.push(value.clone()),
                None => missing.push(source.as_str()),
            }
        }
        if values.is_empty() && any_removed {
            actions.retain(|a| a.top_level_name() != Some(name));
            actions.push(Action {
                path: attribute.native_name().to_owned(),
                resolved: scope.lookup(attribute.native_name())?,
                request: Request::Remove { forced: true },
            });
            continue;
        }
        if !missing.is_empty() {
            return Err(MapperError::invalid(format!(
                "Can not update combine attribute {name}: missing {}",
                missing.join(", ")
            )));
        }
        let refs: Vec<&Value> = values.iter().collect();
        let combined = join_sources(&refs, separator, name)?;
        actions.retain(|a| a.top_level_name() != Some(name));
        actions.push(derived_set(scope, attribute.native_name(), Value::String(combined))?);
    }
    Ok(())
}

async fn lower(
    scope: &Scope<'_>,
    action: &Action,
    current: &Document,
    marshal: &MarshalOptions,
) -> MapperResult<Lowered> {
    let segments = action.resolved.segments.clone();
    let candidates = action.resolved.candidates.as_deref();
    let path = action.path.as_str();
    Ok(match &action.request {
        Request::Remove { .. } => Lowered::Remove(segments),
        Request::Set(value) => {
            let encoded = match candidates {
                Some(candidates) => value_to_wire(scope, value, candidates, path, marshal).await?,
                None => encode_natural(value),
            };
            match encoded {
                Some(encoded) => Lowered::Set(segments, encoded),
                None => Lowered::Remove(segments),
            }
        }
        Request::Add(value) => lower_add(scope, segments, value, candidates, path, current)?,
        Request::Delete(value) => {
            let element = candidates.and_then(set_element).or_else(|| natural_set_element(value));
            let Some(element) = element else {
                return Err(MapperError::invalid(format!(
                    "$DELETE can only target a set attribute: {path}"
                )));
            };
            let members = set_members(value);
            let encoded = encode_set(&members, &element, path)?.ok_or_else(|| {
                MapperError::invalid(format!("$DELETE on {path} needs at least one value"))
            })?;
            Lowered::Delete(segments, encoded)
        }
    })
}

fn lower_add(
    scope: &Scope<'_>,
    segments: Vec<PathSegment>,
    value: &Value,
    candidates: Option<&[CandidateType]>,
    path: &str,
    current: &Document,
) -> MapperResult<Lowered> {
    let invalid = || MapperError::invalid(format!("$ADD can only target a number, set or list attribute: {path}"));
    let Some(candidates) = candidates else {
        return match value {
            Value::Number(_) | Value::Set(_) => encode_natural(value)
                .map(|v| Lowered::Add(segments, v))
                .ok_or_else(invalid),
            Value::List(_) => encode_natural(value)
                .map(|v| Lowered::Append(segments, v))
                .ok_or_else(invalid),
            _ => Err(invalid()),
        };
    };

    if matches!(value, Value::Number(_))
        && candidates
            .iter()
            .any(|c| matches!(c, CandidateType::Primitive(Primitive::Number)))
    {
        return Ok(Lowered::Add(segments, AttributeValue::number(as_number(value))));
    }
    if let Some(element) = set_element(candidates) {
        let members = set_members(value);
        let encoded = encode_set(&members, &element, path)?.ok_or_else(invalid)?;
        return Ok(Lowered::Add(segments, encoded));
    }
    if let Some(array) = candidates
        .iter()
        .find(|c| matches!(c, CandidateType::Array(_)))
    {
        let items = match value {
            Value::List(items) | Value::Set(items) => Value::List(items.clone()),
            single => Value::List(vec![single.clone()]),
        };
        let encoded = scope
            .encode_as(&items, array, path)?
            .ok_or_else(invalid)?;
        let stored_is_empty = match lookup_current(current, path) {
            None => true,
            Some(Value::List(items)) => items.is_empty(),
            Some(_) => false,
        };
        let known = !current.is_empty();
        return Ok(if known && stored_is_empty {
            Lowered::Set(segments, encoded)
        } else {
            Lowered::Append(segments, encoded)
        });
    }
    Err(invalid())
}

fn as_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        _ => 0.0,
    }
}

fn set_element(candidates: &[CandidateType]) -> Option<CandidateType> {
    candidates.iter().find_map(|c| match c {
        CandidateType::Set(element) => Some((**element).clone()),
        _ => None,
    })
}

fn natural_set_element(value: &Value) -> Option<CandidateType> {
    match value {
        Value::Set(items) => match items.first()? {
            Value::String(_) => Some(CandidateType::string()),
            Value::Number(_) => Some(CandidateType::number()),
            Value::Binary(_) => Some(CandidateType::binary()),
            _ => None,
        },
        _ => None,
    }
}

fn set_members(value: &Value) -> Vec<Value> {
    match value {
        Value::Set(items) | Value::List(items) => items.clone(),
        single => vec![single.clone()],
    }
}

/// Follows a dotted path (numeric segments index lists) through a document.
fn lookup_current<'d>(document: &'d Document, path: &str) -> Option<&'d Value> {
    let mut parts = path.split('.');
    let mut value = document.get(parts.next()?)?;
    for part in parts {
        value = match value {
            Value::Map(map) => map.get(part)?,
            Value::List(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}
