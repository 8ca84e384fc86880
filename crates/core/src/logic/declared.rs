//! Logic described as data (YAML or JSON documents).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::block::{Builder, Inputs};
use crate::error::{BloxError, BloxResult};
use crate::graph::{is_sampleable, Expr, Initializer, Variable};
use crate::logic::{Logic, Out, ParamKind, Returned, Signature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamDocKind {
    #[default]
    Required,
    Dynamic,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDoc {
    pub name: String,
    #[serde(default)]
    pub kind: ParamDocKind,
    /// Value used by `optional` parameters when unsupplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDoc {
    pub name: String,
    #[serde(default)]
    pub shape: Vec<usize>,
    #[serde(default)]
    pub init: Initializer,
}

fn default_high() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprDoc {
    Input(String),
    State(String),
    Constant(f64),
    Add(Box<ExprDoc>, Box<ExprDoc>),
    Sub(Box<ExprDoc>, Box<ExprDoc>),
    Mul(Box<ExprDoc>, Box<ExprDoc>),
    Random {
        #[serde(default)]
        shape: Vec<usize>,
        #[serde(default)]
        low: f64,
        #[serde(default = "default_high")]
        high: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDoc {
    pub name: String,
    pub expr: ExprDoc,
}

/// A complete logic description.
///
/// `outputs` is the record the built block exposes, in order. A document that
/// instead sets `returns` yields a bare value, which blocks refuse to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDoc>,
    #[serde(default)]
    pub state: Vec<StateDoc>,
    #[serde(default)]
    pub outputs: Vec<OutputDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ExprDoc>,
}

/// [`Logic`] backed by a [`LogicDocument`].
#[derive(Debug, Clone)]
pub struct DeclaredLogic {
    doc: LogicDocument,
    signature: Signature,
}

impl DeclaredLogic {
    pub fn new(doc: LogicDocument) -> BloxResult<Self> {
        let invalid = |reason: String| BloxError::Document { logic: doc.name.clone(), reason };
        let mut signature = Signature::new(doc.name.clone());
        let mut seen = HashSet::new();
        for param in &doc.params {
            if !seen.insert(param.name.as_str()) {
                return Err(invalid(format!("parameter `{}` declared twice", param.name)));
            }
            let kind = match (param.kind, param.default) {
                (ParamDocKind::Required, _) => ParamKind::Required,
                (ParamDocKind::Dynamic, _) => ParamKind::Dynamic,
                (ParamDocKind::Optional, Some(value)) => ParamKind::Default(value.into()),
                (ParamDocKind::Optional, None) => {
                    return Err(invalid(format!("optional parameter `{}` has no default", param.name)));
                }
            };
            signature = signature.param(param.name.clone(), kind);
        }
        let mut seen = HashSet::new();
        for state in &doc.state {
            if !seen.insert(state.name.as_str()) {
                return Err(invalid(format!("state `{}` declared twice", state.name)));
            }
            if let Initializer::Uniform { low, high } = state.init {
                if !is_sampleable(low, high) {
                    return Err(invalid(format!(
                        "state `{}` has a non-finite uniform range [{low}, {high})",
                        state.name
                    )));
                }
            }
        }
        let exprs = doc.outputs.iter().map(|o| (o.name.as_str(), &o.expr));
        for (name, expr) in exprs.chain(doc.returns.iter().map(|e| ("returns", e))) {
            check_ranges(name, expr).map_err(invalid)?;
        }
        Ok(Self { doc, signature })
    }

    pub fn document(&self) -> &LogicDocument {
        &self.doc
    }

    fn lower(
        &self,
        builder: &Builder,
        inputs: &Inputs,
        state: &HashMap<&str, Variable>,
        name: &str,
        expr: &ExprDoc,
    ) -> BloxResult<Expr> {
        let invalid = |reason: String| BloxError::Document { logic: self.doc.name.clone(), reason };
        match expr {
            ExprDoc::Input(input) => inputs
                .get(input)
                .ok_or_else(|| invalid(format!("`{name}` references unknown input `{input}`"))),
            ExprDoc::State(var) => state
                .get(var.as_str())
                .map(Variable::value)
                .ok_or_else(|| invalid(format!("`{name}` references unknown state `{var}`"))),
            ExprDoc::Constant(value) => builder.constant(&format!("{name}/const"), *value),
            ExprDoc::Add(a, b) => {
                let (a, b) = self.lower_pair(builder, inputs, state, name, a, b)?;
                builder.add(name, a, b)
            }
            ExprDoc::Sub(a, b) => {
                let (a, b) = self.lower_pair(builder, inputs, state, name, a, b)?;
                builder.sub(name, a, b)
            }
            ExprDoc::Mul(a, b) => {
                let (a, b) = self.lower_pair(builder, inputs, state, name, a, b)?;
                builder.mul(name, a, b)
            }
            ExprDoc::Random { shape, low, high } => builder.random_uniform(name, shape, *low, *high),
        }
    }

    fn lower_pair(
        &self,
        builder: &Builder,
        inputs: &Inputs,
        state: &HashMap<&str, Variable>,
        name: &str,
        a: &ExprDoc,
        b: &ExprDoc,
    ) -> BloxResult<(Expr, Expr)> {
        let a = self.lower(builder, inputs, state, &format!("{name}/lhs"), a)?;
        let b = self.lower(builder, inputs, state, &format!("{name}/rhs"), b)?;
        Ok((a, b))
    }
}

fn check_ranges(name: &str, expr: &ExprDoc) -> Result<(), String> {
    match expr {
        ExprDoc::Random { low, high, .. } if !is_sampleable(*low, *high) => {
            Err(format!("`{name}` samples from a non-finite range [{low}, {high})"))
        }
        ExprDoc::Add(a, b) | ExprDoc::Sub(a, b) | ExprDoc::Mul(a, b) => {
            check_ranges(name, a)?;
            check_ranges(name, b)
        }
        _ => Ok(()),
    }
}

impl Logic for DeclaredLogic {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, builder: &mut Builder, inputs: &Inputs) -> BloxResult<Returned> {
        let mut state = HashMap::new();
        for decl in &self.doc.state {
            let var = builder.variable(&decl.name, &decl.shape, decl.init.clone())?;
            state.insert(decl.name.as_str(), var);
        }

        if let Some(expr) = &self.doc.returns {
            return Ok(Returned::Value(self.lower(builder, inputs, &state, "returns", expr)?));
        }
        let mut out = Out::new();
        for output in &self.doc.outputs {
            let expr = self.lower(builder, inputs, &state, &output.name, &output.expr)?;
            out = out.with(output.name.clone(), expr);
        }
        Ok(Returned::Record(out))
    }
}
