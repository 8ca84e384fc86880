//! Argument resolution: binding call-site arguments to a logic's parameters.
//!
//! Binding is a two-phase protocol. [`bind`] maps positional and named call
//! arguments onto the declared parameters and leaves unsupplied dynamic
//! parameters as [`Bound::Deferred`]. Values for those are supplied later, on
//! every run, through [`ResolvedArguments::resolve`] in declaration order.

use crate::error::{BloxError, BloxResult};
use crate::graph::Expr;
use crate::logic::{ParamKind, Signature};
use crate::model::Tensor;

/// A value handed to a logic parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// An existing graph expression, passed through unchanged.
    Expr(Expr),
    /// A concrete value, materialized as a constant when the block is built.
    Tensor(Tensor),
}

impl From<Expr> for ArgValue {
    fn from(expr: Expr) -> Self {
        ArgValue::Expr(expr)
    }
}

impl From<Tensor> for ArgValue {
    fn from(tensor: Tensor) -> Self {
        ArgValue::Tensor(tensor)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Tensor(Tensor::scalar(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Value(ArgValue),
    /// Dynamic parameter awaiting a value at run time.
    Deferred,
}

/// Call-site arguments, as a caller would write them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<ArgValue>,
    named: Vec<(String, ArgValue)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    pub fn positional_args(&self) -> &[ArgValue] {
        &self.positional
    }

    pub fn named_args(&self) -> &[(String, ArgValue)] {
        &self.named
    }
}

/// Parameter name to bound value, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArguments {
    logic: String,
    entries: Vec<(String, Bound)>,
}

/// Bind `call` against `signature`.
pub fn bind(signature: &Signature, call: CallArgs) -> BloxResult<ResolvedArguments> {
    let mismatch = |reason: String| BloxError::SignatureMismatch {
        logic: signature.name().to_string(),
        reason,
    };
    let params = signature.params();
    if call.positional.len() > params.len() {
        return Err(mismatch(format!(
            "takes {} parameters but {} positional arguments were given",
            params.len(),
            call.positional.len()
        )));
    }

    let mut slots: Vec<Option<ArgValue>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(call.positional) {
        *slot = Some(value);
    }
    for (name, value) in call.named {
        let index = signature
            .position(&name)
            .ok_or_else(|| mismatch(format!("unexpected parameter `{name}`")))?;
        if slots[index].is_some() {
            return Err(mismatch(format!("multiple values for parameter `{name}`")));
        }
        slots[index] = Some(value);
    }

    let mut missing = Vec::new();
    let mut entries = Vec::with_capacity(params.len());
    for (param, slot) in params.iter().zip(slots) {
        let bound = match (slot, &param.kind) {
            (Some(value), _) => Bound::Value(value),
            (None, ParamKind::Dynamic) => Bound::Deferred,
            (None, ParamKind::Default(value)) => Bound::Value(value.clone()),
            (None, ParamKind::Required) => {
                missing.push(param.name.clone());
                continue;
            }
        };
        entries.push((param.name.clone(), bound));
    }
    if !missing.is_empty() {
        return Err(mismatch(format!("missing required parameters: {}", missing.join(", "))));
    }

    Ok(ResolvedArguments { logic: signature.name().to_string(), entries })
}

impl ResolvedArguments {
    pub fn logic(&self) -> &str {
        &self.logic
    }

    /// Flattened `(name, bound)` pairs, exactly as the logic will receive them.
    pub fn entries(&self) -> &[(String, Bound)] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Bound> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    /// Names of the deferred parameters, in declaration order.
    pub fn dynamic(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, b)| *b == Bound::Deferred)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn dynamic_len(&self) -> usize {
        self.entries.iter().filter(|(_, b)| *b == Bound::Deferred).count()
    }

    /// Second phase: pair deferred parameters with `values`, in declaration order.
    pub fn resolve(&self, values: &[Tensor]) -> BloxResult<Vec<(String, Tensor)>> {
        self.check_dynamic_arity(values.len())?;
        Ok(self.dynamic().into_iter().map(String::from).zip(values.iter().cloned()).collect())
    }

    pub(crate) fn check_dynamic_arity(&self, supplied: usize) -> BloxResult<()> {
        let expected = self.dynamic_len();
        if supplied != expected {
            return Err(BloxError::SignatureMismatch {
                logic: self.logic.clone(),
                reason: format!("expected {expected} dynamic values, got {supplied}"),
            });
        }
        Ok(())
    }

    /// Reverse of [`bind`]: call arguments that bind back to `self`.
    ///
    /// Values up to the first deferred parameter are positional, the rest are
    /// named; deferred parameters are left unsupplied.
    pub fn to_call(&self) -> CallArgs {
        let mut call = CallArgs::new();
        let mut positional = true;
        for (name, bound) in &self.entries {
            match bound {
                Bound::Deferred => positional = false,
                Bound::Value(value) if positional => call.positional.push(value.clone()),
                Bound::Value(value) => call.named.push((name.clone(), value.clone())),
            }
        }
        call
    }
}
