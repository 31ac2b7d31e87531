//! Type resolution by structural scoring.
//!
//! Every candidate type of an attribute is scored against the subject (a
//! native value on the way out, a wire value on the way in). Primitive shapes
//! score 1 or 0; documents, lists and sets average the scores of their
//! members. The highest score wins, earlier declarations win ties, and a best
//! score of 0 is a type mismatch.

use std::sync::Arc;

use dynamap_model::AttributeValue;

use crate::error::{MapperError, MapperResult};
use crate::marshal::codec;
use crate::registry::ModelRegistry;
use crate::schema::{AttributeDefinition, CandidateType, PathMatch, Primitive, Schema};
use crate::value::Value;

/// Score of an undeclared field that `saveUnknown` keeps.
const UNKNOWN_FIELD_SCORE: f64 = 0.5;

/// The thing being typed.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Subject<'v> {
    /// An application-side value.
    Native(&'v Value),
    /// A stored value.
    Wire(&'v AttributeValue),
}

impl Subject<'_> {
    fn type_name(self) -> &'static str {
        match self {
            Self::Native(value) => value.type_name(),
            Self::Wire(value) => value.wire_type().type_name(),
        }
    }
}

/// One step of a resolved attribute path, on the wire side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathSegment {
    /// A map key.
    Name(String),
    /// A list index.
    Index(usize),
}

/// A dotted path resolved against a schema.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPath {
    /// Wire-side segments (aliases already mapped to stored names).
    pub segments: Vec<PathSegment>,
    /// Candidate types at the leaf; `None` for undeclared paths kept by
    /// `saveUnknown`.
    pub candidates: Option<Vec<CandidateType>>,
    /// The last declared attribute on the path.
    pub attribute: Option<AttributeDefinition>,
}

impl ResolvedPath {
    /// Returns `true` when the path names a top-level attribute.
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }
}

/// Resolution context: the registry and the root schema that
/// `SelfReference` and `saveUnknown` patterns refer to.
///
/// `base` is the byte offset in a full dotted path where paths relative to
/// `root` start; it is non-zero once a model reference has been entered.
#[derive(Debug, Clone)]
pub(crate) struct Scope<'a> {
    pub registry: &'a ModelRegistry,
    pub root: Arc<Schema>,
    base: usize,
}

/// Joins a parent path and a child key.
pub(crate) fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}

fn base_for(path: &str) -> usize {
    if path.is_empty() { 0 } else { path.len() + 1 }
}

impl<'a> Scope<'a> {
    pub fn new(registry: &'a ModelRegistry, root: Arc<Schema>) -> Self {
        Self {
            registry,
            root,
            base: 0,
        }
    }

    /// How `saveUnknown` treats the undeclared attribute at `path`.
    pub fn unknown_match(&self, path: &str) -> PathMatch {
        let relative = path.get(self.base..).unwrap_or(path);
        self.root.settings().save_unknown.match_path(relative)
    }

    /// Returns `true` when `saveUnknown` keeps the undeclared attribute at `path`.
    pub fn allows_unknown(&self, path: &str) -> bool {
        self.unknown_match(path) == PathMatch::Full
    }

    /// The schema of a document-shaped candidate, with the scope its fields
    /// resolve in. `path` is where the document sits.
    pub fn enter(&self, candidate: &CandidateType, path: &str) -> Option<(Self, Arc<Schema>)> {
        match candidate {
            CandidateType::Object(schema) => Some((self.clone(), Arc::clone(schema))),
            CandidateType::SelfReference => Some((
                Self {
                    registry: self.registry,
                    root: Arc::clone(&self.root),
                    base: base_for(path),
                },
                Arc::clone(&self.root),
            )),
            CandidateType::ModelReference(name) => {
                let model = self.registry.get(name)?;
                let schema = Arc::clone(model.schema());
                Some((
                    Self {
                        registry: self.registry,
                        root: Arc::clone(&schema),
                        base: base_for(path),
                    },
                    schema,
                ))
            }
            _ => None,
        }
    }

    /// Picks the best candidate for `subject`.
    pub fn resolve<'c>(
        &self,
        subject: Subject<'_>,
        candidates: &'c [CandidateType],
        path: &str,
    ) -> MapperResult<&'c CandidateType> {
        let mut best: Option<(&CandidateType, f64)> = None;
        for candidate in candidates {
            let score = self.score(subject, candidate, path);
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((candidate, score));
            }
        }
        best.map(|(candidate, _)| candidate)
            .ok_or_else(|| mismatch(path, candidates, subject.type_name()))
    }

    /// Scores `subject` against one candidate, in `[0, 1]`.
    pub fn score(&self, subject: Subject<'_>, candidate: &CandidateType, path: &str) -> f64 {
        match (candidate, subject) {
            (CandidateType::Primitive(primitive), _) => bool_score(primitive_matches(*primitive, subject)),
            (CandidateType::Date(_), Subject::Native(value)) => {
                bool_score(matches!(value, Value::Date(_) | Value::Number(_)))
            }
            (CandidateType::Date(storage), Subject::Wire(value)) => {
                bool_score(codec::decode_date(value, *storage).is_some())
            }
            (CandidateType::Combine { .. }, Subject::Native(value)) => {
                bool_score(matches!(value, Value::String(_)))
            }
            (CandidateType::Combine { .. }, Subject::Wire(value)) => {
                bool_score(matches!(value, AttributeValue::S(_)))
            }
            (CandidateType::Constant(constant), Subject::Native(value)) => bool_score(constant == value),
            (CandidateType::Constant(constant), Subject::Wire(value)) => {
                bool_score(codec::encode_natural(constant).as_ref() == Some(value))
            }
            (CandidateType::Array(elements), _) => match list_items(subject) {
                Some(items) => average(&items, |index, item| {
                    self.best_score(item, elements, &child_path(path, &index.to_string()))
                }),
                None => 0.0,
            },
            (CandidateType::Set(element), Subject::Native(Value::Set(items) | Value::List(items))) => {
                let items: Vec<Subject<'_>> = items.iter().map(Subject::Native).collect();
                average(&items, |_, item| self.score(item, element, path))
            }
            (CandidateType::Set(element), Subject::Wire(value)) => {
                bool_score(codec::set_tag_matches(value, element))
            }
            (CandidateType::Set(_), Subject::Native(_)) => 0.0,
            (CandidateType::ModelReference(name), _) if !is_document(subject) => {
                // A reference stored as the referenced item's hash key.
                let Some(model) = self.registry.get(name) else {
                    return 0.0;
                };
                let Some(hash_key) = model.schema().hash_key() else {
                    return 0.0;
                };
                let scope = Self::new(self.registry, Arc::clone(model.schema()));
                scope.best_score(subject, hash_key.types(), path)
            }
            (CandidateType::Object(_) | CandidateType::SelfReference | CandidateType::ModelReference(_), _) => {
                match self.enter(candidate, path) {
                    Some((scope, schema)) if is_document(subject) => {
                        scope.document_score(&schema, subject, path)
                    }
                    _ => 0.0,
                }
            }
        }
    }

    fn best_score(&self, subject: Subject<'_>, candidates: &[CandidateType], path: &str) -> f64 {
        candidates
            .iter()
            .map(|candidate| self.score(subject, candidate, path))
            .fold(0.0, f64::max)
    }

    fn document_score(&self, schema: &Schema, subject: Subject<'_>, path: &str) -> f64 {
        let fields: Vec<(&str, Subject<'_>)> = match subject {
            Subject::Native(Value::Map(map)) => map
                .iter()
                .filter(|(_, v)| !v.is_undefined())
                .map(|(k, v)| (k.as_str(), Subject::Native(v)))
                .collect(),
            Subject::Wire(AttributeValue::M(map)) => map
                .iter()
                .map(|(k, v)| (k.as_str(), Subject::Wire(v)))
                .collect(),
            _ => return 0.0,
        };
        if fields.is_empty() {
            return 1.0;
        }
        let mut total = 0.0;
        for (key, field) in &fields {
            let field_path = child_path(path, key);
            let declared = match field {
                Subject::Native(_) => schema.attribute_by_native_name(key),
                Subject::Wire(_) => schema.attribute(key),
            };
            total += match declared {
                Some(attribute) => self.best_score(*field, attribute.types(), &field_path),
                None if self.unknown_match(&field_path) != PathMatch::None => UNKNOWN_FIELD_SCORE,
                None => 0.0,
            };
        }
        #[allow(clippy::cast_precision_loss)]
        let len = fields.len() as f64;
        total / len
    }

    /// Resolves a dotted path (numeric segments index lists; either the alias
    /// or the stored name may be used) against the root schema.
    pub fn lookup(&self, path: &str) -> MapperResult<ResolvedPath> {
        let mut segments = Vec::new();
        let mut scope = self.clone();
        let mut schema = Some(Arc::clone(&self.root));
        let mut candidates: Option<Vec<CandidateType>> = None;
        let mut attribute: Option<AttributeDefinition> = None;
        let mut walked = String::new();

        let parts: Vec<&str> = path.split('.').collect();
        for (position, part) in parts.iter().enumerate() {
            if part.is_empty() {
                return Err(MapperError::invalid(format!("Invalid attribute path: {path:?}")));
            }
            let next = child_path(&walked, part);

            if let (Ok(index), Some(current)) = (part.parse::<usize>(), &candidates) {
                let elements: Vec<CandidateType> = current
                    .iter()
                    .filter_map(|c| match c {
                        CandidateType::Array(elements) => Some(elements.iter().cloned()),
                        _ => None,
                    })
                    .flatten()
                    .collect();
                if elements.is_empty() {
                    return Err(MapperError::unknown(path));
                }
                segments.push(PathSegment::Index(index));
                candidates = Some(elements);
                walked = next;
                continue;
            }

            if schema.is_none() {
                let entered: Vec<(Scope<'a>, Arc<Schema>)> = candidates
                    .iter()
                    .flatten()
                    .filter_map(|c| scope.enter(c, &walked))
                    .collect();
                let chosen = entered
                    .iter()
                    .position(|(_, s)| s.attribute_by_native_name(part).is_some())
                    .or_else(|| (!entered.is_empty()).then_some(0));
                match chosen.and_then(|i| entered.into_iter().nth(i)) {
                    Some((next_scope, next_schema)) => {
                        scope = next_scope;
                        schema = Some(next_schema);
                    }
                    None => return Err(MapperError::unknown(path)),
                }
            }

            let declared = schema
                .as_ref()
                .and_then(|s| s.attribute_by_native_name(part))
                .cloned();
            match declared {
                Some(definition) => {
                    segments.push(PathSegment::Name(definition.name().to_owned()));
                    candidates = Some(definition.types().to_vec());
                    attribute = Some(definition);
                    schema = None;
                }
                None if scope.allows_unknown(&child_path(&walked, &parts[position..].join("."))) => {
                    for rest in &parts[position..] {
                        segments.push(match rest.parse::<usize>() {
                            Ok(index) if !segments.is_empty() => PathSegment::Index(index),
                            _ => PathSegment::Name((*rest).to_owned()),
                        });
                    }
                    return Ok(ResolvedPath {
                        segments,
                        candidates: None,
                        attribute,
                    });
                }
                None => return Err(MapperError::unknown(path)),
            }
            walked = next;
        }

        Ok(ResolvedPath {
            segments,
            candidates,
            attribute,
        })
    }
}

/// Builds the mismatch error for a subject no candidate accepts.
pub(crate) fn mismatch(path: &str, candidates: &[CandidateType], actual: &str) -> MapperError {
    let expected: Vec<String> = candidates.iter().map(CandidateType::type_name).collect();
    MapperError::TypeMismatch {
        path: path.to_owned(),
        expected: expected.join(", "),
        actual: actual.to_owned(),
    }
}

fn average<F>(items: &[Subject<'_>], score: F) -> f64
where
    F: Fn(usize, Subject<'_>) -> f64,
{
    if items.is_empty() {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = items.len() as f64;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| score(index, *item))
        .sum::<f64>()
        / len
}

fn bool_score(matched: bool) -> f64 {
    if matched { 1.0 } else { 0.0 }
}

fn is_document(subject: Subject<'_>) -> bool {
    matches!(
        subject,
        Subject::Native(Value::Map(_)) | Subject::Wire(AttributeValue::M(_))
    )
}

fn list_items(subject: Subject<'_>) -> Option<Vec<Subject<'_>>> {
    match subject {
        Subject::Native(Value::List(items)) => Some(items.iter().map(Subject::Native).collect()),
        Subject::Wire(AttributeValue::L(items)) => Some(items.iter().map(Subject::Wire).collect()),
        _ => None,
    }
}

fn primitive_matches(primitive: Primitive, subject: Subject<'_>) -> bool {
    match subject {
        Subject::Native(value) => matches!(
            (primitive, value),
            (Primitive::String, Value::String(_))
                | (Primitive::Number, Value::Number(_))
                | (Primitive::Binary, Value::Binary(_))
                | (Primitive::Boolean, Value::Bool(_))
                | (Primitive::Null, Value::Null)
        ),
        Subject::Wire(value) => matches!(
            (primitive, value),
            (Primitive::String, AttributeValue::S(_))
                | (Primitive::Number, AttributeValue::N(_))
                | (Primitive::Binary, AttributeValue::B(_))
                | (Primitive::Boolean, AttributeValue::Bool(_))
                | (Primitive::Null, AttributeValue::Null(_))
        ),
    }
}
