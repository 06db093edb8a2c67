//! Facet mini-language.
//!
//! A facet entry compiles to a `facet_by` item (`field` or
//! `field(sort_by:...,label:[lo,hi])`), an optional `facet_query` item and an
//! optional `facet_return_parent` item.

use super::query::SortDirection;
use crate::error::{Error, Result};
use serde_json::{Map, Number, Value};
use std::ops::{Range, RangeInclusive};

/// What to do with one faceted field
#[derive(Debug, Clone, PartialEq)]
pub enum FacetSpec {
    /// Facet on the field with no options
    Bare,
    /// Facet on the field and narrow its values with a sub-query
    Query(String),
    Options(FacetOptions),
}

impl FacetSpec {
    pub fn query(query: impl Into<String>) -> Self {
        FacetSpec::Query(query.into())
    }
}

impl From<FacetOptions> for FacetSpec {
    fn from(options: FacetOptions) -> Self {
        FacetSpec::Options(options)
    }
}

impl From<Option<&str>> for FacetSpec {
    fn from(query: Option<&str>) -> Self {
        match query {
            Some(query) => FacetSpec::Query(query.to_string()),
            None => FacetSpec::Bare,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetOptions {
    pub sort: Option<FacetSort>,
    /// Labelled buckets, emitted in insertion order
    pub ranges: Vec<(String, FacetRange)>,
    pub return_parent: bool,
    pub query: Option<String>,
}

impl FacetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: FacetSort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Alphabetical ordering of facet values
    pub fn sort_alpha(self, direction: SortDirection) -> Self {
        self.sort(FacetSort::Alpha(direction))
    }

    /// Order facet values by another field
    pub fn sort_by(self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort(FacetSort::ByField(vec![(field.into(), direction)]))
    }

    pub fn range(mut self, label: impl Into<String>, range: impl Into<FacetRange>) -> Self {
        self.ranges.push((label.into(), range.into()));
        self
    }

    pub fn return_parent(mut self, return_parent: bool) -> Self {
        self.return_parent = return_parent;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FacetSort {
    /// `_alpha:<dir>`
    Alpha(SortDirection),
    /// `<field>:<dir>`; exactly one entry is accepted
    ByField(Vec<(String, SortDirection)>),
    /// Passed through verbatim
    Raw(String),
}

/// A numeric bucket for range faceting.
///
/// Input ranges must exclude their end; the bracket sent to the service is
/// written `[start,end]` regardless.
#[derive(Debug, Clone, PartialEq)]
pub enum FacetRange {
    HalfOpen { start: Number, end: Number },
    Closed { start: Number, end: Number },
    Pair(Vec<Number>),
}

impl From<Range<i64>> for FacetRange {
    fn from(range: Range<i64>) -> Self {
        FacetRange::HalfOpen {
            start: range.start.into(),
            end: range.end.into(),
        }
    }
}

impl From<RangeInclusive<i64>> for FacetRange {
    fn from(range: RangeInclusive<i64>) -> Self {
        FacetRange::Closed {
            start: (*range.start()).into(),
            end: (*range.end()).into(),
        }
    }
}

impl From<[i64; 2]> for FacetRange {
    fn from(pair: [i64; 2]) -> Self {
        FacetRange::Pair(pair.iter().map(|n| Number::from(*n)).collect())
    }
}

impl From<Vec<i64>> for FacetRange {
    fn from(values: Vec<i64>) -> Self {
        FacetRange::Pair(values.into_iter().map(Number::from).collect())
    }
}

impl FacetRange {
    fn to_wire(&self) -> Result<String> {
        match self {
            FacetRange::HalfOpen { start, end } => Ok(format!("[{},{}]", start, end)),
            FacetRange::Closed { .. } => Err(Error::InvalidArgument(
                "Facet ranges must exclude end".to_string(),
            )),
            FacetRange::Pair(values) => match values.as_slice() {
                [start, end] => Ok(format!("[{},{}]", start, end)),
                _ => Err(Error::InvalidArgument(
                    "Facet ranges must have two elements".to_string(),
                )),
            },
        }
    }
}

/// Wire fragments produced by one facet entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompiledFacet {
    pub facet_by: String,
    pub facet_query: Option<String>,
    pub return_parent: Option<String>,
}

pub(crate) fn compile(field: &str, spec: &FacetSpec) -> Result<CompiledFacet> {
    match spec {
        FacetSpec::Bare => Ok(CompiledFacet {
            facet_by: field.to_string(),
            facet_query: None,
            return_parent: None,
        }),
        FacetSpec::Query(query) => Ok(CompiledFacet {
            facet_by: field.to_string(),
            facet_query: Some(format!("{}:{}", field, query)),
            return_parent: None,
        }),
        FacetSpec::Options(options) => compile_options(field, options),
    }
}

fn compile_options(field: &str, options: &FacetOptions) -> Result<CompiledFacet> {
    let mut params: Vec<(String, String)> = Vec::new();

    match &options.sort {
        Some(FacetSort::Alpha(direction)) => {
            params.push(("sort_by".to_string(), format!("_alpha:{}", direction)))
        }
        Some(FacetSort::ByField(keys)) => match keys.as_slice() {
            [(key, direction)] => {
                params.push(("sort_by".to_string(), format!("{}:{}", key, direction)))
            }
            _ => {
                return Err(Error::InvalidArgument(
                    "Facet sort_by must have one key".to_string(),
                ))
            }
        },
        Some(FacetSort::Raw(raw)) => params.push(("sort_by".to_string(), raw.clone())),
        None => {}
    }

    for (label, range) in &options.ranges {
        params.push((label.clone(), range.to_wire()?));
    }

    let facet_by = if params.is_empty() {
        field.to_string()
    } else {
        let rendered: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}:{}", key, value))
            .collect();
        format!("{}({})", field, rendered.join(","))
    };

    Ok(CompiledFacet {
        facet_by,
        facet_query: options
            .query
            .as_ref()
            .map(|query| format!("{}:{}", field, query)),
        return_parent: options.return_parent.then(|| field.to_string()),
    })
}

/// Read facet entries from untyped JSON.
///
/// Accepts a field name, a list of field names, or an object mapping each
/// field to `null`, a sub-query string, or an options object.
pub(crate) fn from_json(value: &Value) -> Result<Vec<(String, FacetSpec)>> {
    match value {
        Value::String(field) => Ok(vec![(field.clone(), FacetSpec::Bare)]),
        Value::Array(fields) => fields
            .iter()
            .map(|field| match field {
                Value::String(field) => Ok((field.clone(), FacetSpec::Bare)),
                other => Err(Error::InvalidArgument(format!(
                    "Facet field names must be strings, got {}",
                    other
                ))),
            })
            .collect(),
        Value::Object(entries) => entries
            .iter()
            .map(|(field, spec)| {
                let spec = match spec {
                    Value::String(query) => FacetSpec::Query(query.clone()),
                    Value::Object(options) => FacetSpec::Options(options_from_json(options)?),
                    _ => FacetSpec::Bare,
                };
                Ok((field.clone(), spec))
            })
            .collect(),
        other => Err(Error::InvalidArgument(format!(
            "Facets must be a field, a list of fields or a mapping, got {}",
            other
        ))),
    }
}

fn options_from_json(options: &Map<String, Value>) -> Result<FacetOptions> {
    let sort = match options.get("sort") {
        None | Some(Value::Null) => None,
        Some(Value::String(sort)) => Some(match sort.parse::<SortDirection>() {
            Ok(direction) => FacetSort::Alpha(direction),
            Err(_) => FacetSort::Raw(sort.clone()),
        }),
        Some(Value::Object(keys)) => Some(FacetSort::ByField(
            keys.iter()
                .map(|(key, direction)| Ok((key.clone(), direction_from_json(direction)?)))
                .collect::<Result<Vec<_>>>()?,
        )),
        Some(_) => {
            return Err(Error::InvalidArgument(
                "Facet sort_by must be a mapping, a direction or a string".to_string(),
            ))
        }
    };

    let ranges = match options.get("ranges") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(ranges)) => ranges
            .iter()
            .map(|(label, range)| Ok((label.clone(), range_from_json(range)?)))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(Error::InvalidArgument(
                "Facet ranges must be a mapping".to_string(),
            ))
        }
    };

    let return_parent = options
        .get("return_parent")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let query = match options.get("query") {
        None | Some(Value::Null) => None,
        Some(Value::String(query)) => Some(query.clone()),
        Some(other) => Some(other.to_string()),
    };

    Ok(FacetOptions {
        sort,
        ranges,
        return_parent,
        query,
    })
}

fn direction_from_json(direction: &Value) -> Result<SortDirection> {
    direction
        .as_str()
        .and_then(|direction| direction.parse().ok())
        .ok_or_else(|| {
            Error::InvalidArgument(format!("Invalid facet sort direction {}", direction))
        })
}

/// `[lo, hi]` or `{"from": lo, "to": hi, "exclude_end": bool}`
fn range_from_json(range: &Value) -> Result<FacetRange> {
    match range {
        Value::Array(values) => values
            .iter()
            .map(|value| match value {
                Value::Number(number) => Ok(number.clone()),
                other => Err(Error::InvalidArgument(format!(
                    "Facet range bounds must be numbers, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(FacetRange::Pair),
        Value::Object(bounds) => {
            let bound = |key: &str| -> Result<Number> {
                match bounds.get(key) {
                    Some(Value::Number(number)) => Ok(number.clone()),
                    _ => Err(Error::InvalidArgument(format!(
                        "Facet range `{}` must be a number",
                        key
                    ))),
                }
            };
            let start = bound("from")?;
            let end = bound("to")?;

            if bounds
                .get("exclude_end")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                Ok(FacetRange::HalfOpen { start, end })
            } else {
                Ok(FacetRange::Closed { start, end })
            }
        }
        _ => Err(Error::InvalidArgument(
            "Facet ranges must be a range or a pair".to_string(),
        )),
    }
}
