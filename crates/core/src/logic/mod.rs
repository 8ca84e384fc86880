//! Logic descriptions: the callables blocks are built from.
//!
//! A logic declares an ordered parameter list (its [`Signature`]) and, when
//! called with a [`Builder`] and materialized [`Inputs`], adds its computation
//! to the builder's graph. It must answer with an [`Out`] record; any other
//! [`Returned`] shape is rejected when the block is built.

pub mod declared;

use crate::args::ArgValue;
use crate::block::{Builder, Inputs};
use crate::error::BloxResult;
use crate::graph::Expr;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Must be supplied at bind time.
    Required,
    /// May be left unsupplied at bind time and fed on every run instead.
    Dynamic,
    /// Falls back to the given value when unsupplied.
    Default(ArgValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// Name and ordered parameter list of a logic.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    name: String,
    params: Vec<Param>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Vec::new() }
    }

    pub fn required(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Required)
    }

    pub fn dynamic(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Dynamic)
    }

    pub fn optional(self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.param(name, ParamKind::Default(value.into()))
    }

    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(Param { name: name.into(), kind });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Names of the dynamic parameters, in declaration order.
    pub fn dynamic_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Dynamic)
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// Named, ordered output record.
///
/// Field order is the order of [`Out::with`] calls and becomes the block's
/// canonical output ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Out {
    fields: Vec<(String, Expr)>,
}

impl Out {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.fields.push((name.into(), expr));
        self
    }

    pub fn get(&self, name: &str) -> Option<Expr> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, e)| *e)
    }

    pub fn fields(&self) -> &[(String, Expr)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<(String, Expr)> {
        self.fields
    }
}

/// Whatever a logic hands back from [`Logic::call`].
#[derive(Debug, Clone, PartialEq)]
pub enum Returned {
    Record(Out),
    Value(Expr),
    Tuple(Vec<Expr>),
    Nothing,
}

impl Returned {
    /// Short description used in contract violations.
    pub fn describe(&self) -> String {
        match self {
            Returned::Record(out) if out.is_empty() => "an empty `Out` record".to_string(),
            Returned::Record(_) => "an `Out` record".to_string(),
            Returned::Value(_) => "a bare value".to_string(),
            Returned::Tuple(values) => format!("a tuple of {} values", values.len()),
            Returned::Nothing => "nothing".to_string(),
        }
    }
}

impl From<Out> for Returned {
    fn from(out: Out) -> Self {
        Returned::Record(out)
    }
}

impl From<Expr> for Returned {
    fn from(expr: Expr) -> Self {
        Returned::Value(expr)
    }
}

impl From<Vec<Expr>> for Returned {
    fn from(exprs: Vec<Expr>) -> Self {
        Returned::Tuple(exprs)
    }
}

impl From<()> for Returned {
    fn from(_: ()) -> Self {
        Returned::Nothing
    }
}

/// A reusable computation definition.
pub trait Logic: Send + Sync {
    fn signature(&self) -> &Signature;

    /// Add this logic's computation to `builder`'s graph.
    fn call(&self, builder: &mut Builder, inputs: &Inputs) -> BloxResult<Returned>;
}

/// Adapter turning a closure into a [`Logic`].
pub struct FnLogic<F> {
    signature: Signature,
    f: F,
}

impl<F> FnLogic<F>
where
    F: Fn(&mut Builder, &Inputs) -> BloxResult<Returned> + Send + Sync,
{
    pub fn new(signature: Signature, f: F) -> Self {
        Self { signature, f }
    }
}

impl<F> Logic for FnLogic<F>
where
    F: Fn(&mut Builder, &Inputs) -> BloxResult<Returned> + Send + Sync,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, builder: &mut Builder, inputs: &Inputs) -> BloxResult<Returned> {
        (self.f)(builder, inputs)
    }
}
