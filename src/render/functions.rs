//! Template extension functions.
//!
//! Extension functions are a closed capability interface: each takes one [`FuncArg`]
//! and returns a string. A registered function is exposed to templates both as a
//! filter (`{{ published | date }}`) and as a function (`{{ date(value=published) }}`).

use crate::error::PageError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tera::{Tera, Value};

/// Argument accepted by an extension function.
#[derive(Debug, Clone, PartialEq)]
pub enum FuncArg {
    Timestamp(i64),
    Text(String),
}

impl FuncArg {
    /// Convert a template value. Integers become timestamps, scalars become text.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(FuncArg::Timestamp)
                .ok_or_else(|| format!("number out of range: {}", n)),
            Value::String(s) => Ok(FuncArg::Text(s.clone())),
            Value::Bool(b) => Ok(FuncArg::Text(b.to_string())),
            Value::Null => Ok(FuncArg::Text(String::new())),
            other => Err(format!("unsupported argument type: {}", other)),
        }
    }

    /// Interpret the argument as a Unix timestamp; numeric text is accepted.
    pub fn as_timestamp(&self) -> Result<i64, String> {
        match self {
            FuncArg::Timestamp(ts) => Ok(*ts),
            FuncArg::Text(s) if s.trim().is_empty() => Ok(0),
            FuncArg::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("expected a timestamp, got '{}'", s)),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            FuncArg::Timestamp(ts) => ts.to_string(),
            FuncArg::Text(s) => s,
        }
    }
}

/// A named helper callable from templates.
pub trait TemplateFunction: Send + Sync {
    fn call(&self, arg: FuncArg) -> Result<String, String>;

    /// Safe output bypasses autoescaping.
    fn is_safe(&self) -> bool {
        false
    }
}

impl<F> TemplateFunction for F
where
    F: Fn(FuncArg) -> Result<String, String> + Send + Sync,
{
    fn call(&self, arg: FuncArg) -> Result<String, String> {
        self(arg)
    }
}

/// Name → function map owned by one renderer.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn TemplateFunction>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `dateTime`, `date`, `dayTime` and `html`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, Arc<dyn TemplateFunction>); 4] = [
            ("dateTime", Arc::new(date_time)),
            ("date", Arc::new(date)),
            ("dayTime", Arc::new(day_time)),
            ("html", Arc::new(SafeHtml)),
        ];
        for (name, function) in builtins {
            registry.functions.insert(name.to_string(), function);
        }
        registry
    }

    /// Add a function. Empty and already-registered names are rejected.
    pub fn register(
        &mut self,
        name: &str,
        function: Arc<dyn TemplateFunction>,
    ) -> Result<(), PageError> {
        if name.trim().is_empty() {
            return Err(PageError::Validation(
                "function name is required".to_string(),
            ));
        }
        if self.functions.contains_key(name) {
            return Err(PageError::DuplicateFunction(name.to_string()));
        }
        self.functions.insert(name.to_string(), function);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Expose every function to a Tera instance as both filter and function.
    pub(crate) fn install(&self, tera: &mut Tera) {
        for (name, function) in &self.functions {
            let adapter = TeraAdapter {
                name: name.clone(),
                function: Arc::clone(function),
            };
            tera.register_filter(name, adapter.clone());
            tera.register_function(name, adapter);
        }
    }
}

#[derive(Clone)]
struct TeraAdapter {
    name: String,
    function: Arc<dyn TemplateFunction>,
}

impl TeraAdapter {
    fn invoke(&self, value: &Value) -> tera::Result<Value> {
        let arg = FuncArg::from_value(value)
            .map_err(|e| tera::Error::msg(format!("{}: {}", self.name, e)))?;
        self.function
            .call(arg)
            .map(Value::String)
            .map_err(|e| tera::Error::msg(format!("{}: {}", self.name, e)))
    }
}

impl tera::Filter for TeraAdapter {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.invoke(value)
    }

    fn is_safe(&self) -> bool {
        self.function.is_safe()
    }
}

impl tera::Function for TeraAdapter {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let value = args.get("value").ok_or_else(|| {
            tera::Error::msg(format!("{}: missing required argument 'value'", self.name))
        })?;
        self.invoke(value)
    }

    fn is_safe(&self) -> bool {
        self.function.is_safe()
    }
}

fn format_timestamp(arg: FuncArg, pattern: &str) -> Result<String, String> {
    let ts = arg.as_timestamp()?;
    if ts <= 0 {
        return Ok(String::new());
    }
    let datetime: DateTime<Utc> = DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| format!("timestamp out of range: {}", ts))?;
    Ok(datetime.format(pattern).to_string())
}

/// `2020-10-05 14:03:00`
fn date_time(arg: FuncArg) -> Result<String, String> {
    format_timestamp(arg, "%Y-%m-%d %H:%M:%S")
}

/// `2020-10-05`
fn date(arg: FuncArg) -> Result<String, String> {
    format_timestamp(arg, "%Y-%m-%d")
}

/// `October 05, 2020`
fn day_time(arg: FuncArg) -> Result<String, String> {
    format_timestamp(arg, "%B %d, %Y")
}

struct SafeHtml;

impl TemplateFunction for SafeHtml {
    fn call(&self, arg: FuncArg) -> Result<String, String> {
        Ok(arg.into_text())
    }

    fn is_safe(&self) -> bool {
        true
    }
}
