//! Channels, parameters and messages

use serde_json::Value;

use super::{last_ref_segment, ref_target, SpecDocument};
use crate::error::{ImportError, Result};

/// Operation kind declared on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Consumers subscribe; the documented application produces
    Subscribe,
    /// Consumers publish; the documented application consumes
    Publish,
}

impl Operation {
    fn field(&self) -> &'static str {
        match self {
            Operation::Subscribe => "subscribe",
            Operation::Publish => "publish",
        }
    }
}

/// A channel parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    /// Values of `schema.enum`, if declared
    pub enum_values: Option<Vec<String>>,
}

/// A message carried on a channel
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    /// Name the payload schema is imported under
    pub schema_name: String,
    /// Payload schema with local references inlined
    pub payload: Option<Value>,
}

/// One entry of the `channels` map
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Topic pattern, e.g. `order/{region}/created`
    pub address: String,
    pub parameters: Vec<Parameter>,
    pub subscribe: Vec<Message>,
    pub publish: Vec<Message>,
}

impl Channel {
    pub(crate) fn extract(doc: &SpecDocument, address: &str, item: &Value) -> Result<Self> {
        let item = doc.resolve(item)?;
        if !item.is_object() {
            return Err(ImportError::MalformedSpec(format!(
                "channel '{}' content is invalid",
                address
            )));
        }

        let parameters = match item.get("parameters") {
            Some(Value::Object(params)) => params
                .iter()
                .map(|(name, param)| extract_parameter(doc, name, param))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(ImportError::MalformedSpec(format!(
                    "channel '{}' parameters must be an object",
                    address
                )))
            }
            None => Vec::new(),
        };

        Ok(Self {
            address: address.to_string(),
            parameters,
            subscribe: extract_operation(doc, address, item, Operation::Subscribe)?,
            publish: extract_operation(doc, address, item, Operation::Publish)?,
        })
    }

    pub fn has_operation(&self, op: Operation) -> bool {
        !self.messages(op).is_empty()
    }

    pub fn messages(&self, op: Operation) -> &[Message] {
        match op {
            Operation::Subscribe => &self.subscribe,
            Operation::Publish => &self.publish,
        }
    }

    /// Parameters that declare an enumerated value set
    pub fn enum_parameters(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.parameters
            .iter()
            .filter_map(|p| p.enum_values.as_deref().map(|values| (p.name.as_str(), values)))
    }
}

fn extract_parameter(doc: &SpecDocument, name: &str, param: &Value) -> Result<Parameter> {
    let param = doc.resolve(param)?;
    let enum_values = match param.get("schema") {
        Some(schema) => match doc.resolve(schema)?.get("enum") {
            Some(Value::Array(values)) => Some(values.iter().map(render_enum_value).collect()),
            Some(_) => {
                return Err(ImportError::MalformedSpec(format!(
                    "parameter '{}' enum must be an array",
                    name
                )))
            }
            None => None,
        },
        None => None,
    };

    Ok(Parameter { name: name.to_string(), enum_values })
}

fn render_enum_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn extract_operation(
    doc: &SpecDocument,
    address: &str,
    item: &Value,
    op: Operation,
) -> Result<Vec<Message>> {
    let Some(operation) = item.get(op.field()) else {
        return Ok(Vec::new());
    };
    let operation = doc.resolve(operation)?;
    let Some(message) = operation.get("message") else {
        return Ok(Vec::new());
    };

    let resolved = doc.resolve(message)?;
    match resolved.get("oneOf") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| extract_message(doc, address, entry))
            .collect(),
        Some(_) => Err(ImportError::MalformedSpec(format!(
            "channel '{}' message oneOf must be an array",
            address
        ))),
        None => Ok(vec![extract_message(doc, address, message)?]),
    }
}

fn extract_message(doc: &SpecDocument, address: &str, entry: &Value) -> Result<Message> {
    let ref_name = ref_target(entry).and_then(last_ref_segment);
    let message = doc.resolve(entry)?;

    let name = non_blank(message.get("name"))
        .or(ref_name)
        .or_else(|| non_blank(message.get("messageId")))
        .ok_or_else(|| {
            ImportError::MalformedSpec(format!("channel '{}' has a message without a name", address))
        })?
        .to_string();

    let (schema_name, payload) = match message.get("payload") {
        Some(payload) => {
            let payload_ref = ref_target(payload).and_then(last_ref_segment);
            let resolved = doc.resolve(payload)?;
            if !resolved.is_object() {
                return Err(ImportError::MalformedSpec(format!(
                    "message '{}' payload must be an object",
                    name
                )));
            }
            let schema_name = payload_ref
                .map(str::to_string)
                .or_else(|| title_schema_name(resolved))
                .or_else(|| non_blank(resolved.get("$id")).map(str::to_string))
                .unwrap_or_else(|| name.clone());
            (schema_name, Some(doc.inline(resolved)?))
        }
        None => (name.clone(), None),
    };

    Ok(Message { name, schema_name, payload })
}

/// Schema name from a payload `title`: the text after the last `/` when
/// there is one in the middle, otherwise the title with `/` replaced by `__`.
fn title_schema_name(payload: &Value) -> Option<String> {
    let title = non_blank(payload.get("title"))?;
    match title.rfind('/') {
        Some(idx) if idx > 0 && idx < title.len() - 1 => Some(title[idx + 1..].to_string()),
        _ => Some(title.replace('/', "__")),
    }
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
