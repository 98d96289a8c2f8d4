//! Models
//!
//! A [`Model`] turns positional and keyword inputs into one output value.
//! Listeners feed models from documents: a [`Mapping`] projects a document
//! through a listener key, and the model's [`Signature`] decides how the
//! projected data is split into args and kwargs.

use crate::datatype::DataType;
use crate::error::{VectorError, VectorResult};
use conflux_core::{Document, Identified, KeyType, Value};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How a model accepts its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signature {
    /// Exactly one positional argument
    Singleton,
    /// Positional arguments only
    Args,
    /// Keyword arguments only
    Kwargs,
    /// Both positional and keyword arguments
    #[default]
    ArgsKwargs,
}

/// Arguments for one prediction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInputs {
    /// Positional arguments
    pub args: Vec<Value>,
    /// Keyword arguments
    pub kwargs: BTreeMap<String, Value>,
}

/// Document data projected through a key, shaped for a signature.
#[derive(Debug, Clone, PartialEq)]
pub enum MappedInput {
    /// A single value
    Single(Value),
    /// Positional values
    Args(Vec<Value>),
    /// Named values
    Kwargs(BTreeMap<String, Value>),
    /// Positional and named values
    ArgsKwargs(Vec<Value>, BTreeMap<String, Value>),
}

impl MappedInput {
    /// Split into args and kwargs
    pub fn into_inputs(self) -> ModelInputs {
        match self {
            MappedInput::Single(v) => ModelInputs {
                args: vec![v],
                kwargs: BTreeMap::new(),
            },
            MappedInput::Args(args) => ModelInputs {
                args,
                kwargs: BTreeMap::new(),
            },
            MappedInput::Kwargs(kwargs) => ModelInputs {
                args: Vec::new(),
                kwargs,
            },
            MappedInput::ArgsKwargs(args, kwargs) => ModelInputs { args, kwargs },
        }
    }
}

/// Projection of a document through a listener key for a given signature.
#[derive(Debug, Clone)]
pub struct Mapping<'a> {
    key: &'a KeyType,
    signature: Signature,
}

impl<'a> Mapping<'a> {
    /// Mapping for `key` under `signature`
    pub fn new(key: &'a KeyType, signature: Signature) -> Self {
        Self { key, signature }
    }

    /// Project `doc`. `_base` fields resolve to the whole document.
    pub fn apply(&self, doc: &Document) -> VectorResult<MappedInput> {
        let (positional, named): (Vec<&str>, Vec<(&str, &str)>) = match self.key {
            KeyType::Single(f) => (vec![f.as_str()], vec![]),
            KeyType::Many(fs) => (fs.iter().map(String::as_str).collect(), vec![]),
            KeyType::Mapping(m) => (
                vec![],
                m.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
            ),
        };

        let lookup = |field: &str| -> VectorResult<Value> {
            if field == conflux_core::BASE_KEY {
                return Ok(doc.to_value());
            }
            doc.get_path(field)
                .cloned()
                .ok_or_else(|| VectorError::InvalidInput(format!("missing field {}", field)))
        };

        let args = positional
            .iter()
            .map(|f| lookup(*f))
            .collect::<VectorResult<Vec<_>>>()?;
        let kwargs = named
            .iter()
            .map(|(name, f)| lookup(*f).map(|v| (name.to_string(), v)))
            .collect::<VectorResult<BTreeMap<_, _>>>()?;

        match self.signature {
            Signature::Singleton => {
                if !kwargs.is_empty() || args.len() != 1 {
                    return Err(VectorError::InvalidInput(format!(
                        "singleton signature needs exactly one field, key is {}",
                        self.key
                    )));
                }
                Ok(MappedInput::Single(args.into_iter().next().unwrap_or(Value::Null)))
            }
            Signature::Args => {
                if !kwargs.is_empty() {
                    return Err(VectorError::InvalidInput(format!(
                        "positional signature cannot take named key {}",
                        self.key
                    )));
                }
                Ok(MappedInput::Args(args))
            }
            Signature::Kwargs => {
                if !args.is_empty() {
                    return Err(VectorError::InvalidInput(format!(
                        "keyword signature cannot take positional key {}",
                        self.key
                    )));
                }
                Ok(MappedInput::Kwargs(kwargs))
            }
            Signature::ArgsKwargs => Ok(MappedInput::ArgsKwargs(args, kwargs)),
        }
    }
}

/// A predictive model.
pub trait Model: fmt::Debug + Send + Sync {
    /// Model identifier
    fn identifier(&self) -> &str;

    /// Input signature
    fn signature(&self) -> Signature {
        Signature::default()
    }

    /// Output datatype, when the model declares one
    fn datatype(&self) -> Option<&DataType> {
        None
    }

    /// Predict on a single input
    fn predict_one(&self, args: &[Value], kwargs: &BTreeMap<String, Value>) -> VectorResult<Value>;

    /// Turn projected data into call arguments
    fn handle_input_type(
        &self,
        data: MappedInput,
        _signature: Signature,
    ) -> VectorResult<ModelInputs> {
        Ok(data.into_inputs())
    }
}

impl Identified for dyn Model {
    fn identifier(&self) -> &str {
        Model::identifier(self)
    }
}

type PredictFn = dyn Fn(&ModelInputs) -> VectorResult<Value> + Send + Sync;

/// A model backed by a closure.
///
/// ```ignore
/// let model = FnModel::new("lengths", |inputs| {
///     let text = inputs.args[0].as_str().unwrap_or_default();
///     Ok(Value::from(vec![text.len() as f64]))
/// })
/// .with_signature(Signature::Singleton)
/// .with_datatype(vector(&[1])?);
/// ```
#[derive(Clone)]
pub struct FnModel {
    identifier: String,
    signature: Signature,
    datatype: Option<DataType>,
    predict: Arc<PredictFn>,
}

impl FnModel {
    /// Model named `identifier` predicting with `predict`
    pub fn new<F>(identifier: impl Into<String>, predict: F) -> Self
    where
        F: Fn(&ModelInputs) -> VectorResult<Value> + Send + Sync + 'static,
    {
        Self {
            identifier: identifier.into(),
            signature: Signature::default(),
            datatype: None,
            predict: Arc::new(predict),
        }
    }

    /// Set the input signature
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Declare the output datatype
    pub fn with_datatype(mut self, datatype: DataType) -> Self {
        self.datatype = Some(datatype);
        self
    }
}

impl fmt::Debug for FnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel")
            .field("identifier", &self.identifier)
            .field("signature", &self.signature)
            .field("datatype", &self.datatype)
            .finish()
    }
}

impl Model for FnModel {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn signature(&self) -> Signature {
        self.signature
    }

    fn datatype(&self) -> Option<&DataType> {
        self.datatype.as_ref()
    }

    fn predict_one(&self, args: &[Value], kwargs: &BTreeMap<String, Value>) -> VectorResult<Value> {
        let inputs = ModelInputs {
            args: args.to_vec(),
            kwargs: kwargs.clone(),
        };
        (self.predict)(&inputs)
    }
}

/// Models keyed by identifier.
#[derive(Default)]
pub struct ModelRegistry {
    models: DashMap<String, Arc<dyn Model>>,
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a model under its identifier
    pub fn insert(&self, model: Arc<dyn Model>) {
        self.models.insert(model.identifier().to_string(), model);
    }

    /// Model by identifier
    pub fn get(&self, identifier: &str) -> VectorResult<Arc<dyn Model>> {
        self.models
            .get(identifier)
            .map(|m| Arc::clone(m.value()))
            .ok_or_else(|| VectorError::ModelNotFound(identifier.to_string()))
    }

    /// True when a model is registered under `identifier`
    pub fn contains(&self, identifier: &str) -> bool {
        self.models.contains_key(identifier)
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.identifiers())
            .finish()
    }
}

/// Read a model output as an f32 embedding.
///
/// Accepts numeric arrays (nested arrays are flattened) and float64 bytes.
pub fn embedding_from_value(value: &Value) -> VectorResult<Vec<f32>> {
    match value {
        Value::Bytes(bytes) => Ok(crate::datatype::decode_array(bytes)?
            .into_iter()
            .map(|f| f as f32)
            .collect()),
        Value::Array(_) => {
            let mut out = Vec::new();
            push_numbers(value, &mut out)?;
            Ok(out)
        }
        other => Err(VectorError::InvalidEmbedding(format!(
            "expected array or bytes, found {}",
            other.type_name()
        ))),
    }
}

fn push_numbers(value: &Value, out: &mut Vec<f32>) -> VectorResult<()> {
    match value {
        Value::Array(items) => items.iter().try_for_each(|v| push_numbers(v, out)),
        other => match other.as_number() {
            Some(n) => {
                out.push(n as f32);
                Ok(())
            }
            None => Err(VectorError::InvalidEmbedding(format!(
                "non-numeric element {}",
                other.type_name()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::from_json(json!({"text": "hello", "title": "t", "n": 3}))
    }

    #[test]
    fn test_singleton_mapping() {
        let key = KeyType::from("text");
        let mapped = Mapping::new(&key, Signature::Singleton).apply(&doc()).unwrap();
        assert_eq!(mapped, MappedInput::Single(Value::from("hello")));
    }

    #[test]
    fn test_many_mapping_is_positional() {
        let key = KeyType::from(vec!["title", "n"]);
        let mapped = Mapping::new(&key, Signature::Args).apply(&doc()).unwrap();
        assert_eq!(
            mapped,
            MappedInput::Args(vec![Value::from("t"), Value::Int(3)])
        );
    }

    #[test]
    fn test_dict_mapping_is_keyword() {
        let mut m = BTreeMap::new();
        m.insert("x".to_string(), "text".to_string());
        let key = KeyType::Mapping(m);
        let inputs = Mapping::new(&key, Signature::Kwargs)
            .apply(&doc())
            .unwrap()
            .into_inputs();
        assert!(inputs.args.is_empty());
        assert_eq!(inputs.kwargs["x"], Value::from("hello"));
    }

    #[test]
    fn test_base_key_passes_whole_document() {
        let key = KeyType::from(conflux_core::BASE_KEY);
        let mapped = Mapping::new(&key, Signature::Singleton).apply(&doc()).unwrap();
        assert_eq!(mapped, MappedInput::Single(doc().to_value()));
    }

    #[test]
    fn test_singleton_rejects_dict_key() {
        let mut m = BTreeMap::new();
        m.insert("x".to_string(), "text".to_string());
        let key = KeyType::Mapping(m);
        assert!(Mapping::new(&key, Signature::Singleton).apply(&doc()).is_err());
    }

    #[test]
    fn test_missing_field() {
        let key = KeyType::from("body");
        assert!(matches!(
            Mapping::new(&key, Signature::Args).apply(&doc()),
            Err(VectorError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fn_model_and_registry() {
        let model = FnModel::new("len", |inputs: &ModelInputs| {
            let n = inputs.args[0].as_str().map(str::len).unwrap_or(0);
            Ok(Value::from(vec![n as f64]))
        })
        .with_signature(Signature::Singleton);

        let registry = ModelRegistry::new();
        registry.insert(Arc::new(model));
        let m = registry.get("len").unwrap();
        assert_eq!(m.signature(), Signature::Singleton);
        let out = m.predict_one(&[Value::from("abcd")], &BTreeMap::new()).unwrap();
        assert_eq!(embedding_from_value(&out).unwrap(), vec![4.0]);
        assert!(registry.get("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_embedding_from_bytes() {
        let bytes = crate::datatype::encode_array(&crate::datatype::NumericArray::F64(vec![1.5, 2.0]))
            .unwrap();
        assert_eq!(
            embedding_from_value(&Value::Bytes(bytes)).unwrap(),
            vec![1.5, 2.0]
        );
        assert!(embedding_from_value(&Value::from("x")).is_err());
    }
}
