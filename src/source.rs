//! # Document Sources
//!
//! Capabilities the collector consumes to turn a document id into a
//! `(bucket value, weight)` pair. Three sources exist:
//!
//! - [`FieldSampler`]: a single numeric field is both the bucket value and the
//!   weight (the distribution of a value against itself).
//! - [`KeyValueSampler`]: one field picks the bucket, another is summed.
//! - [`ScriptSampler`]: two independently evaluated [`Expression`]s.
//!
//! Field data is exposed through [`NumericValues`]; expressions are bound per
//! partition by an externally supplied [`ExpressionEngine`]. The in-memory
//! [`Partition`] is a small JSON document store used by the CLI and tests.

use crate::error::{BoxError, HistogramError, Result};
use serde_json::{Map, Value};
use std::ops::Range;

/// Document identifier, local to one partition.
pub type DocId = u32;

/// JSON document as stored in a [`Partition`].
pub type Document = Map<String, Value>;

/// Per-document numeric field values.
pub trait NumericValues {
    /// Value of the field for `doc`, or `None` when the document has none.
    fn value(&self, doc: DocId) -> Option<f64>;
}

impl NumericValues for [f64] {
    #[inline]
    fn value(&self, doc: DocId) -> Option<f64> {
        self.get(doc as usize).copied()
    }
}

impl NumericValues for [Option<f64>] {
    #[inline]
    fn value(&self, doc: DocId) -> Option<f64> {
        self.get(doc as usize).copied().flatten()
    }
}

impl NumericValues for Vec<f64> {
    #[inline]
    fn value(&self, doc: DocId) -> Option<f64> {
        self.as_slice().value(doc)
    }
}

impl<T: NumericValues + ?Sized> NumericValues for &T {
    #[inline]
    fn value(&self, doc: DocId) -> Option<f64> {
        (**self).value(doc)
    }
}

/// Numeric values of one field across a partition, indexed by [`DocId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldColumn {
    values: Vec<Option<f64>>,
}

impl FieldColumn {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of documents that carry a value.
    pub fn present(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

impl NumericValues for FieldColumn {
    #[inline]
    fn value(&self, doc: DocId) -> Option<f64> {
        self.values.as_slice().value(doc)
    }
}

impl From<Vec<f64>> for FieldColumn {
    fn from(values: Vec<f64>) -> Self {
        values.into_iter().map(Some).collect()
    }
}

impl FromIterator<Option<f64>> for FieldColumn {
    fn from_iter<I: IntoIterator<Item = Option<f64>>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A per-document expression, already bound to one partition.
pub trait Expression: Send {
    fn evaluate(&mut self, doc: DocId) -> std::result::Result<f64, BoxError>;
}

impl<E: Expression + ?Sized> Expression for Box<E> {
    fn evaluate(&mut self, doc: DocId) -> std::result::Result<f64, BoxError> {
        (**self).evaluate(doc)
    }
}

/// Adapter turning a closure into an [`Expression`].
pub struct FnExpression<F>(F);

/// Wrap a closure as an [`Expression`].
pub fn expression_fn<F>(f: F) -> FnExpression<F>
where
    F: FnMut(DocId) -> std::result::Result<f64, BoxError> + Send,
{
    FnExpression(f)
}

impl<F> Expression for FnExpression<F>
where
    F: FnMut(DocId) -> std::result::Result<f64, BoxError> + Send,
{
    fn evaluate(&mut self, doc: DocId) -> std::result::Result<f64, BoxError> {
        (self.0)(doc)
    }
}

/// An expression in some scripting language, with its parameters.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Script {
    pub source: String,
    pub lang: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Compiles scripts and binds them to a partition.
///
/// The crate ships no evaluator; embedding applications provide one.
pub trait ExpressionEngine: Send + Sync {
    fn bind<'a>(&self, script: &Script, partition: &'a Partition) -> Result<Box<dyn Expression + 'a>>;
}

/// One `(bucket value, weight)` observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Value that selects the bucket.
    pub key: f64,
    /// Value accumulated into the bucket.
    pub weight: f64,
}

/// Source of per-document samples driven by a collector.
pub trait Sampler {
    /// Sample `doc`. `Ok(None)` means the document has no value and is skipped.
    fn sample(&mut self, doc: DocId) -> Result<Option<Sample>>;
}

/// Single-field sampling: the field value is both key and weight.
#[derive(Debug, Clone)]
pub struct FieldSampler<V> {
    values: V,
}

impl<V: NumericValues> FieldSampler<V> {
    pub fn new(values: V) -> Self {
        Self { values }
    }
}

impl<V: NumericValues> Sampler for FieldSampler<V> {
    #[inline]
    fn sample(&mut self, doc: DocId) -> Result<Option<Sample>> {
        Ok(self.values.value(doc).map(|value| Sample {
            key: value,
            weight: value,
        }))
    }
}

/// Two-field sampling: one field picks the bucket, the other is summed.
#[derive(Debug, Clone)]
pub struct KeyValueSampler<K, V> {
    keys: K,
    values: V,
}

impl<K: NumericValues, V: NumericValues> KeyValueSampler<K, V> {
    pub fn new(keys: K, values: V) -> Self {
        Self { keys, values }
    }
}

impl<K: NumericValues, V: NumericValues> Sampler for KeyValueSampler<K, V> {
    #[inline]
    fn sample(&mut self, doc: DocId) -> Result<Option<Sample>> {
        Ok(match (self.keys.value(doc), self.values.value(doc)) {
            (Some(key), Some(weight)) => Some(Sample { key, weight }),
            _ => None,
        })
    }
}

/// Expression sampling: bucket value and weight from two expressions.
pub struct ScriptSampler<K, V> {
    key: K,
    value: V,
}

impl<K: Expression, V: Expression> ScriptSampler<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

impl<K: Expression, V: Expression> Sampler for ScriptSampler<K, V> {
    fn sample(&mut self, doc: DocId) -> Result<Option<Sample>> {
        let key = self
            .key
            .evaluate(doc)
            .map_err(|source| HistogramError::Evaluation { doc, source })?;
        let weight = self
            .value
            .evaluate(doc)
            .map_err(|source| HistogramError::Evaluation { doc, source })?;
        Ok(Some(Sample { key, weight }))
    }
}

/// In-memory partition of JSON documents.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    id: usize,
    documents: Vec<Document>,
}

impl Partition {
    pub fn new(id: usize, documents: Vec<Document>) -> Self {
        Self { id, documents }
    }

    /// Build a partition whose documents carry a single numeric `field`.
    pub fn from_values(id: usize, field: &str, values: &[f64]) -> Self {
        let documents = values
            .iter()
            .map(|value| {
                let mut doc = Document::new();
                doc.insert(field.to_string(), Value::from(*value));
                doc
            })
            .collect();
        Self { id, documents }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, doc: DocId) -> Option<&Document> {
        self.documents.get(doc as usize)
    }

    /// Document ids in collection order.
    pub fn doc_ids(&self) -> Range<DocId> {
        0..self.documents.len() as DocId
    }

    /// Whether any document in this partition carries `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.documents.iter().any(|doc| doc.contains_key(field))
    }

    /// Extract the numeric values of `field`. Non-numeric values are missing.
    pub fn column(&self, field: &str) -> FieldColumn {
        self.documents
            .iter()
            .map(|doc| doc.get(field).and_then(Value::as_f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_partition_column_extraction() {
        let partition = Partition::new(
            0,
            vec![
                doc(json!({"price": 1.5, "qty": 2})),
                doc(json!({"qty": 3})),
                doc(json!({"price": "n/a"})),
                doc(json!({"price": -4})),
            ],
        );

        let prices = partition.column("price");
        assert_eq!(prices.len(), 4);
        assert_eq!(prices.present(), 2);
        assert_eq!(prices.value(0), Some(1.5));
        assert_eq!(prices.value(1), None);
        assert_eq!(prices.value(2), None);
        assert_eq!(prices.value(3), Some(-4.0));
        assert_eq!(prices.value(99), None);

        assert!(partition.has_field("qty"));
        assert!(!partition.has_field("missing"));
        assert_eq!(partition.doc_ids(), 0..4);
    }

    #[test]
    fn test_field_sampler_uses_value_as_weight() {
        let mut sampler = FieldSampler::new(vec![2.5, 7.0]);
        assert_eq!(
            sampler.sample(0).unwrap(),
            Some(Sample {
                key: 2.5,
                weight: 2.5
            })
        );
        assert_eq!(sampler.sample(5).unwrap(), None);
    }

    #[test]
    fn test_key_value_sampler_requires_both() {
        let keys: FieldColumn = vec![Some(1.0), Some(2.0), None].into_iter().collect();
        let values: FieldColumn = vec![Some(10.0), None, Some(30.0)].into_iter().collect();
        let mut sampler = KeyValueSampler::new(&keys, &values);

        assert_eq!(
            sampler.sample(0).unwrap(),
            Some(Sample {
                key: 1.0,
                weight: 10.0
            })
        );
        assert_eq!(sampler.sample(1).unwrap(), None);
        assert_eq!(sampler.sample(2).unwrap(), None);
    }

    #[test]
    fn test_script_sampler_propagates_failures() {
        let mut sampler = ScriptSampler::new(
            expression_fn(|doc| Ok(doc as f64)),
            expression_fn(|doc| {
                if doc == 3 {
                    Err("value script failed".into())
                } else {
                    Ok(1.0)
                }
            }),
        );

        assert_eq!(
            sampler.sample(2).unwrap(),
            Some(Sample {
                key: 2.0,
                weight: 1.0
            })
        );
        match sampler.sample(3) {
            Err(HistogramError::Evaluation { doc, .. }) => assert_eq!(doc, 3),
            other => panic!("expected evaluation error, got {:?}", other),
        }
    }
}
