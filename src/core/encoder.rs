use serde_json::Value;

/// One element of a sequence field.
#[derive(Debug, Clone, PartialEq)]
pub enum SeqItem {
    /// A server entity; rendered by its name.
    Named(String),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Seq(Vec<SeqItem>),
    Scalar(String),
}

impl FieldValue {
    pub fn scalar(value: impl ToString) -> Self {
        FieldValue::Scalar(value.to_string())
    }

    pub fn names<T: AsRef<str>>(names: &[T]) -> Self {
        FieldValue::Seq(names.iter().map(|n| SeqItem::Named(n.as_ref().to_string())).collect())
    }

    pub fn raw_seq<T: ToString>(values: &[T]) -> Self {
        FieldValue::Seq(values.iter().map(|v| SeqItem::Raw(v.to_string())).collect())
    }

    fn render(&self) -> String {
        match self {
            FieldValue::Bool(true) => "true".to_string(),
            FieldValue::Bool(false) => "false".to_string(),
            FieldValue::Scalar(s) => s.clone(),
            FieldValue::Seq(items) => {
                let inner: Vec<&str> = items
                    .iter()
                    .map(|item| match item {
                        SeqItem::Named(name) => name.as_str(),
                        SeqItem::Raw(raw) => raw.as_str(),
                    })
                    .collect();
                format!("[{}]", inner.join(","))
            }
        }
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Array(items) => FieldValue::Seq(items.iter().map(seq_item).collect()),
            other => FieldValue::Scalar(natural_string(other)),
        }
    }
}

fn seq_item(value: &Value) -> SeqItem {
    match value.get("name").and_then(Value::as_str) {
        Some(name) => SeqItem::Named(name.to_string()),
        None => SeqItem::Raw(natural_string(value)),
    }
}

fn natural_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordered list of form fields. Output order is insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormRecord {
    fields: Vec<(String, FieldValue)>,
}

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    pub fn encode(&self) -> String {
        self.fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.render()))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Renders `record` as a form body. Values are written verbatim, so one that
/// contains `&` or `=` corrupts the body.
pub fn encode(record: &FormRecord) -> String {
    record.encode()
}
