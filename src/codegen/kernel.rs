//! Lowering of assignments into kernels
//!
//! A [`Kernel`] is an assignment with the tensors taken out: operands become
//! numbered slots described by format, component type and extents, and index
//! variables become numbered loop variables with known extents. Two
//! assignments that differ only in which tensors they read lower to the same
//! kernel, which is what lets them share one compiled module.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::expr::{Assignment, IndexExpr, IndexVar};
use crate::format::Format;
use crate::tensor::Tensor;

/// Format, component type and extents of one tensor taking part in a kernel
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperandSlot {
    /// Storage format
    pub format: Format,
    /// Component type
    pub dtype: DType,
    /// Extent per mode
    pub dims: Vec<usize>,
}

impl OperandSlot {
    /// Number of modes
    pub fn order(&self) -> usize {
        self.dims.len()
    }
}

/// Expression over operand slots and loop variables
#[derive(Clone, Debug, PartialEq)]
pub enum KernelExpr {
    /// Read of operand `operand` at the given loop variables
    Access {
        /// Operand slot
        operand: usize,
        /// Loop variable per operand mode
        vars: Vec<usize>,
    },
    /// Scalar constant
    Literal(f64),
    /// Negation
    Neg(Box<KernelExpr>),
    /// Union-sum
    Add(Box<KernelExpr>, Box<KernelExpr>),
    /// Union-difference
    Sub(Box<KernelExpr>, Box<KernelExpr>),
    /// Intersection-product
    Mul(Box<KernelExpr>, Box<KernelExpr>),
}

/// A lowered assignment
#[derive(Clone, Debug)]
pub struct Kernel {
    dtype: DType,
    result: OperandSlot,
    extents: Vec<usize>,
    var_names: Vec<String>,
    output_vars: Vec<usize>,
    reduction_vars: Vec<usize>,
    operands: Vec<OperandSlot>,
    expr: KernelExpr,
}

/// Name and description of a tensor, as seen by lowering
pub(crate) type Describe<'a> = dyn Fn(Tensor) -> Result<(String, OperandSlot)> + 'a;

struct Lowering<'a> {
    describe: &'a Describe<'a>,
    vars: HashMap<u64, usize>,
    extents: Vec<usize>,
    var_names: Vec<String>,
    operands: Vec<Tensor>,
    slots: Vec<OperandSlot>,
    dtype: DType,
}

impl Lowering<'_> {
    fn bind(&mut self, tensor: &str, var: &IndexVar, extent: usize) -> Result<usize> {
        match self.vars.get(&var.id()) {
            Some(&v) => {
                if self.extents[v] != extent {
                    return Err(Error::shape_mismatch(tensor, &[self.extents[v]], &[extent]));
                }
                Ok(v)
            }
            None => {
                let v = self.extents.len();
                self.vars.insert(var.id(), v);
                self.extents.push(extent);
                self.var_names.push(var.name().to_string());
                Ok(v)
            }
        }
    }

    fn lower(&mut self, expr: &IndexExpr) -> Result<KernelExpr> {
        Ok(match expr {
            IndexExpr::Access(access) => {
                let (name, slot) = (self.describe)(access.tensor)?;
                if access.indices.len() != slot.order() {
                    return Err(Error::arity_mismatch(
                        &name,
                        slot.order(),
                        access.indices.len(),
                    ));
                }
                if slot.dtype != self.dtype {
                    return Err(Error::dtype_mismatch(&name, self.dtype, slot.dtype));
                }
                let mut vars = Vec::with_capacity(access.indices.len());
                for (var, &extent) in access.indices.iter().zip(&slot.dims) {
                    vars.push(self.bind(&name, var, extent)?);
                }
                let operand = match self.operands.iter().position(|t| *t == access.tensor) {
                    Some(operand) => operand,
                    None => {
                        self.operands.push(access.tensor);
                        self.slots.push(slot);
                        self.operands.len() - 1
                    }
                };
                KernelExpr::Access { operand, vars }
            }
            IndexExpr::Literal(v) => KernelExpr::Literal(*v),
            IndexExpr::Neg(e) => KernelExpr::Neg(Box::new(self.lower(e)?)),
            IndexExpr::Add(a, b) => {
                KernelExpr::Add(Box::new(self.lower(a)?), Box::new(self.lower(b)?))
            }
            IndexExpr::Sub(a, b) => {
                KernelExpr::Sub(Box::new(self.lower(a)?), Box::new(self.lower(b)?))
            }
            IndexExpr::Mul(a, b) => {
                KernelExpr::Mul(Box::new(self.lower(a)?), Box::new(self.lower(b)?))
            }
        })
    }
}

impl Kernel {
    /// Lower `assignment`, checking that it is well formed
    ///
    /// # Arguments
    ///
    /// * `assignment` - Assignment to lower
    /// * `describe` - Name and description of every tensor it mentions
    ///
    /// # Errors
    ///
    /// - `ArityMismatch` if an access has a variable count different from the
    ///   order of its tensor
    /// - `ShapeMismatch` if one variable indexes modes of different extents
    /// - `DTypeMismatch` if an operand's component type differs from the result's
    /// - `InvalidArgument` if a variable appears twice on the left-hand side
    pub(crate) fn lower(
        assignment: &Assignment,
        describe: &Describe<'_>,
    ) -> Result<(Self, Vec<Tensor>)> {
        let (name, result) = describe(assignment.lhs)?;
        if assignment.indices.len() != result.order() {
            return Err(Error::arity_mismatch(
                &name,
                result.order(),
                assignment.indices.len(),
            ));
        }

        let mut lowering = Lowering {
            describe,
            vars: HashMap::new(),
            extents: Vec::new(),
            var_names: Vec::new(),
            operands: Vec::new(),
            slots: Vec::new(),
            dtype: result.dtype,
        };
        for (var, &extent) in assignment.indices.iter().zip(&result.dims) {
            if lowering.vars.contains_key(&var.id()) {
                return Err(Error::invalid_argument(
                    "indices",
                    format!("index variable '{var}' appears twice on the left-hand side"),
                ));
            }
            lowering.bind(&name, var, extent)?;
        }
        let expr = lowering.lower(&assignment.rhs)?;

        let output_vars: Vec<usize> = (0..result.order()).collect();
        let reduction_vars: Vec<usize> = (result.order()..lowering.extents.len()).collect();
        Ok((
            Self {
                dtype: result.dtype,
                result,
                extents: lowering.extents,
                var_names: lowering.var_names,
                output_vars,
                reduction_vars,
                operands: lowering.slots,
                expr,
            },
            lowering.operands,
        ))
    }

    /// Component type of the result and every operand
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Format of the result
    pub fn result_format(&self) -> &Format {
        &self.result.format
    }

    /// Extents of the result
    pub fn result_dims(&self) -> &[usize] {
        &self.result.dims
    }

    /// Extent of every loop variable
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Display name of a loop variable
    pub fn var_name(&self, var: usize) -> &str {
        &self.var_names[var]
    }

    /// Loop variables indexing the result, in result mode order
    pub fn output_vars(&self) -> &[usize] {
        &self.output_vars
    }

    /// Loop variables that are summed over
    pub fn reduction_vars(&self) -> &[usize] {
        &self.reduction_vars
    }

    /// Operand slots in order of first access
    pub fn operands(&self) -> &[OperandSlot] {
        &self.operands
    }

    /// Expression tree
    pub fn expr(&self) -> &KernelExpr {
        &self.expr
    }

    /// Canonical text of the kernel
    ///
    /// Tensors appear as positional slots (`t0` is the result), variables as
    /// `v0, v1, ...`, so the signature is independent of tensor identities and
    /// variable names.
    pub fn signature(&self) -> String {
        let mut sig = String::new();
        let vars: Vec<String> = self.output_vars.iter().map(|v| format!("v{v}")).collect();
        let _ = write!(sig, "t0({}) = ", vars.join(","));
        render_signature(&self.expr, &mut sig);
        for (slot, operand) in self.operands.iter().enumerate() {
            let _ = write!(
                sig,
                "; t{}: {} {} {:?}",
                slot + 1,
                operand.format,
                operand.dtype,
                operand.dims
            );
        }
        sig
    }
}

fn render_signature(expr: &KernelExpr, out: &mut String) {
    match expr {
        KernelExpr::Access { operand, vars } => {
            let vars: Vec<String> = vars.iter().map(|v| format!("v{v}")).collect();
            let _ = write!(out, "t{}({})", operand + 1, vars.join(","));
        }
        KernelExpr::Literal(v) => {
            let _ = write!(out, "{v:?}");
        }
        KernelExpr::Neg(e) => {
            out.push_str("-(");
            render_signature(e, out);
            out.push(')');
        }
        KernelExpr::Add(a, b) | KernelExpr::Sub(a, b) | KernelExpr::Mul(a, b) => {
            let op = match expr {
                KernelExpr::Add(..) => '+',
                KernelExpr::Sub(..) => '-',
                _ => '*',
            };
            out.push('(');
            render_signature(a, out);
            let _ = write!(out, " {op} ");
            render_signature(b, out);
            out.push(')');
        }
    }
}
