use crate::registry::{BlockName, BlockShape, BlockTemplate};
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;

pub type BlockId = String;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Literal(Value),
    Variable(String),
    Reporter(Box<BlockInstance>),
}

impl ParamValue {
    pub fn variable(name: &str) -> Self {
        ParamValue::Variable(name.to_string())
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Literal(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Literal(Value::Number(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Literal(Value::from(value))
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Literal(Value::Text(value))
    }
}

impl From<BlockInstance> for ParamValue {
    fn from(value: BlockInstance) -> Self {
        ParamValue::Reporter(Box::new(value))
    }
}

/// A placed block. Structure (successor, body) is never stored here; it is
/// recomputed from positions by `geometry`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockInstance {
    pub id: BlockId,
    pub template: &'static BlockTemplate,
    pub params: IndexMap<String, ParamValue>,
    pub x: f64,
    pub y: f64,
}

impl BlockInstance {
    pub fn new(id: impl Into<BlockId>, template: &'static BlockTemplate, at: Point) -> Self {
        let params = template
            .defaults
            .iter()
            .map(|(name, literal)| (name.to_string(), ParamValue::Literal(Value::from(*literal))))
            .collect();
        Self {
            id: id.into(),
            template,
            params,
            x: at.x,
            y: at.y,
        }
    }

    /// An expression block that only lives inside another block's parameter slot.
    pub fn detached(template: &'static BlockTemplate) -> Self {
        Self::new(template.name.as_str(), template, Point::default())
    }

    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn name(&self) -> BlockName {
        self.template.name
    }

    pub fn shape(&self) -> BlockShape {
        self.template.shape
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// The literal text bound to `name`, if it is a plain literal.
    pub fn literal_text(&self, name: &str) -> Option<String> {
        match self.params.get(name)? {
            ParamValue::Literal(value) => Some(value.to_string()),
            _ => None,
        }
    }
}
