//! Reference evaluation of kernels
//!
//! Kernels are evaluated point by point over the space of their loop
//! variables. At every point an expression is either undefined (no stored
//! operand component contributes) or has a value; a result point is stored
//! when any reduction point below it is defined. Integer arithmetic wraps.

use smallvec::SmallVec;

use crate::codegen::{Kernel, KernelExpr};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::storage::TensorStorage;
use crate::storage::pack::build_storage;

struct Operand<'a, T> {
    storage: &'a TensorStorage,
    values: &'a [T],
}

struct Evaluator<'a, T> {
    kernel: &'a Kernel,
    operands: Vec<Operand<'a, T>>,
}

impl<'a, T: Element> Evaluator<'a, T> {
    fn new(kernel: &'a Kernel, operands: &[&'a TensorStorage]) -> Result<Self> {
        if operands.len() != kernel.operands().len() {
            return Err(Error::Internal(format!(
                "kernel reads {} operands, {} given",
                kernel.operands().len(),
                operands.len()
            )));
        }
        let mut bound = Vec::with_capacity(operands.len());
        for (slot, storage) in kernel.operands().iter().zip(operands) {
            if storage.dims() != slot.dims.as_slice() || storage.format() != &slot.format {
                return Err(Error::Internal(format!(
                    "operand storage {} {:?} does not match kernel slot {} {:?}",
                    storage.format(),
                    storage.dims(),
                    slot.format,
                    slot.dims
                )));
            }
            bound.push(Operand {
                storage,
                values: storage.values().as_slice::<T>()?,
            });
        }
        Ok(Self {
            kernel,
            operands: bound,
        })
    }

    fn eval(&self, expr: &KernelExpr, env: &[i32]) -> Option<T> {
        match expr {
            KernelExpr::Access { operand, vars } => {
                let operand = &self.operands[*operand];
                let coordinate: SmallVec<[i32; 4]> = vars.iter().map(|&v| env[v]).collect();
                operand
                    .storage
                    .locate(&coordinate)
                    .map(|q| operand.values[q])
            }
            KernelExpr::Literal(v) => Some(T::from_f64(*v)),
            KernelExpr::Neg(e) => self.eval(e, env).map(T::wrapping_neg),
            KernelExpr::Add(a, b) => match (self.eval(a, env), self.eval(b, env)) {
                (Some(x), Some(y)) => Some(x.wrapping_add(y)),
                (x, None) => x,
                (None, y) => y,
            },
            KernelExpr::Sub(a, b) => match (self.eval(a, env), self.eval(b, env)) {
                (Some(x), Some(y)) => Some(x.wrapping_sub(y)),
                (x, None) => x,
                (None, y) => y.map(T::wrapping_neg),
            },
            KernelExpr::Mul(a, b) => Some(self.eval(a, env)?.wrapping_mul(self.eval(b, env)?)),
        }
    }

    /// Value at the result point held in `env`, summed over reductions
    fn reduce(&self, env: &mut [i32]) -> Option<T> {
        let mut acc: Option<T> = None;
        let expr = self.kernel.expr();
        visit(self.kernel.extents(), self.kernel.reduction_vars(), env, &mut |env| {
            if let Some(v) = self.eval(expr, env) {
                acc = Some(match acc {
                    Some(a) => a.wrapping_add(v),
                    None => v,
                });
            }
        });
        acc
    }

    /// Every defined result point as (coordinate, value)
    fn points(&self) -> (Vec<i32>, Vec<T>) {
        let kernel = self.kernel;
        let mut env = vec![0i32; kernel.extents().len()];
        let mut scratch = env.clone();
        let mut coords = Vec::new();
        let mut values = Vec::new();
        visit(kernel.extents(), kernel.output_vars(), &mut env, &mut |env| {
            scratch.copy_from_slice(env);
            if let Some(v) = self.reduce(&mut scratch) {
                coords.extend(kernel.output_vars().iter().map(|&var| env[var]));
                values.push(v);
            }
        });
        (coords, values)
    }
}

/// Call `f` for every assignment of `vars` within their extents
fn visit(extents: &[usize], vars: &[usize], env: &mut [i32], f: &mut dyn FnMut(&mut [i32])) {
    match vars.split_first() {
        None => f(env),
        Some((&var, rest)) => {
            for c in 0..extents[var] {
                env[var] = c as i32;
                visit(extents, rest, env, f);
            }
        }
    }
}

/// Build the result structure; stored values are zero
pub(crate) fn assemble<T: Element>(
    kernel: &Kernel,
    output: &mut TensorStorage,
    operands: &[&TensorStorage],
) -> Result<()> {
    let evaluator = Evaluator::<T>::new(kernel, operands)?;
    let (coords, values) = evaluator.points();
    let zeros = vec![T::zero(); values.len()];
    *output = build_storage(kernel.result_dims(), kernel.result_format(), &coords, &zeros);
    Ok(())
}

/// Fill the values of an assembled result
pub(crate) fn compute<T: Element>(
    kernel: &Kernel,
    output: &mut TensorStorage,
    operands: &[&TensorStorage],
) -> Result<()> {
    let evaluator = Evaluator::<T>::new(kernel, operands)?;
    let mut values = vec![T::zero(); output.nnz()];
    let mut env = vec![0i32; kernel.extents().len()];
    output.for_each_position(|coordinate, q| {
        for (&var, &c) in kernel.output_vars().iter().zip(coordinate) {
            env[var] = c;
        }
        if let Some(v) = evaluator.reduce(&mut env) {
            values[q] = v;
        }
    });
    output.values_mut().as_mut_slice::<T>()?.copy_from_slice(&values);
    Ok(())
}

/// Assemble and compute in one pass
pub(crate) fn assemble_and_compute<T: Element>(
    kernel: &Kernel,
    output: &mut TensorStorage,
    operands: &[&TensorStorage],
) -> Result<()> {
    let evaluator = Evaluator::<T>::new(kernel, operands)?;
    let (coords, values) = evaluator.points();
    *output = build_storage(kernel.result_dims(), kernel.result_format(), &coords, &values);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::OperandSlot;
    use crate::dtype::DType;
    use crate::expr::{Assignment, IndexVar};
    use crate::format::Format;
    use crate::tensor::{Tensor, TensorId};

    fn tensor(index: u32) -> Tensor {
        Tensor::from_id(TensorId::new(index, 0))
    }

    fn lower(assignment: &Assignment, slots: &[OperandSlot]) -> Kernel {
        let describe = |t: Tensor| -> Result<(String, OperandSlot)> {
            let index = t.id().index() as usize;
            Ok((format!("T{index}"), slots[index].clone()))
        };
        Kernel::lower(assignment, &describe).unwrap().0
    }

    fn slot(format: Format, dims: &[usize]) -> OperandSlot {
        typed_slot(format, DType::F64, dims)
    }

    fn typed_slot(format: Format, dtype: DType, dims: &[usize]) -> OperandSlot {
        OperandSlot {
            format,
            dtype,
            dims: dims.to_vec(),
        }
    }

    #[test]
    fn test_spmv() {
        let (i, j) = (IndexVar::new("i"), IndexVar::new("j"));
        let assignment = Assignment {
            lhs: tensor(0),
            indices: vec![i.clone()],
            rhs: tensor(1).access([&i, &j]) * tensor(2).access([&j]),
        };
        let slots = [
            slot(Format::sparse(1), &[3]),
            slot(Format::csr(), &[3, 3]),
            slot(Format::dense(1), &[3]),
        ];
        let kernel = lower(&assignment, &slots);
        let a = build_storage(&[3, 3], &Format::csr(), &[0, 0, 0, 2, 2, 1], &[1.0f64, 2.0, 3.0]);
        let x = build_storage(&[3], &Format::dense(1), &[0, 1, 2], &[1.0f64, 10.0, 100.0]);
        let mut y = TensorStorage::empty(&[3], DType::F64, &Format::sparse(1));

        assemble_and_compute::<f64>(&kernel, &mut y, &[&a, &x]).unwrap();
        assert_eq!(y.entries::<f64>().unwrap(), vec![(vec![0], 201.0), (vec![2], 30.0)]);
    }

    #[test]
    fn test_assemble_then_compute_matches_fused() {
        let i = IndexVar::new("i");
        let assignment = Assignment {
            lhs: tensor(0),
            indices: vec![i.clone()],
            rhs: tensor(1).access([&i]) - tensor(2).access([&i]),
        };
        let slots = [
            slot(Format::sparse(1), &[4]),
            slot(Format::sparse(1), &[4]),
            slot(Format::sparse(1), &[4]),
        ];
        let kernel = lower(&assignment, &slots);
        let b = build_storage(&[4], &Format::sparse(1), &[0, 2], &[5.0f64, 1.0]);
        let c = build_storage(&[4], &Format::sparse(1), &[2, 3], &[4.0f64, 7.0]);

        let mut staged = TensorStorage::empty(&[4], DType::F64, &Format::sparse(1));
        assemble::<f64>(&kernel, &mut staged, &[&b, &c]).unwrap();
        assert_eq!(staged.nnz(), 3);
        assert!(staged.values().as_slice::<f64>().unwrap().iter().all(|&v| v == 0.0));
        compute::<f64>(&kernel, &mut staged, &[&b, &c]).unwrap();

        let mut fused = TensorStorage::empty(&[4], DType::F64, &Format::sparse(1));
        assemble_and_compute::<f64>(&kernel, &mut fused, &[&b, &c]).unwrap();

        let expected = vec![(vec![0], 5.0), (vec![2], -3.0), (vec![3], -7.0)];
        assert_eq!(staged.entries::<f64>().unwrap(), expected);
        assert_eq!(fused.entries::<f64>().unwrap(), expected);
    }

    #[test]
    fn test_i64_subtraction_is_exact() {
        let i = IndexVar::new("i");
        let assignment = Assignment {
            lhs: tensor(0),
            indices: vec![i.clone()],
            rhs: tensor(1).access([&i]) - tensor(2).access([&i]),
        };
        let slots = [
            typed_slot(Format::dense(1), DType::I64, &[2]),
            typed_slot(Format::dense(1), DType::I64, &[2]),
            typed_slot(Format::sparse(1), DType::I64, &[2]),
        ];
        let kernel = lower(&assignment, &slots);
        let big = (1i64 << 53) + 1;
        let b = build_storage(&[2], &Format::dense(1), &[0, 1], &[big, i64::MIN]);
        let c = build_storage(&[2], &Format::sparse(1), &[0, 1], &[1i64, 1]);
        let mut a = TensorStorage::empty(&[2], DType::I64, &Format::dense(1));
        assemble_and_compute::<i64>(&kernel, &mut a, &[&b, &c]).unwrap();
        assert_eq!(a.values().as_slice::<i64>().unwrap(), &[1i64 << 53, i64::MAX]);
    }

    #[test]
    fn test_unsigned_negation_wraps() {
        let i = IndexVar::new("i");
        let assignment = Assignment {
            lhs: tensor(0),
            indices: vec![i.clone()],
            rhs: -tensor(1).access([&i]) * tensor(2).access([&i]),
        };
        let slots = [
            typed_slot(Format::sparse(1), DType::U32, &[3]),
            typed_slot(Format::sparse(1), DType::U32, &[3]),
            typed_slot(Format::sparse(1), DType::U32, &[3]),
        ];
        let kernel = lower(&assignment, &slots);
        let b = build_storage(&[3], &Format::sparse(1), &[1], &[1u32]);
        let c = build_storage(&[3], &Format::sparse(1), &[1], &[3u32]);
        let mut a = TensorStorage::empty(&[3], DType::U32, &Format::sparse(1));
        assemble_and_compute::<u32>(&kernel, &mut a, &[&b, &c]).unwrap();
        assert_eq!(a.entries::<u32>().unwrap(), vec![(vec![1], u32::MAX - 2)]);
    }

    #[test]
    fn test_full_reduction_to_scalar() {
        let (i, j) = (IndexVar::new("i"), IndexVar::new("j"));
        let assignment = Assignment {
            lhs: tensor(0),
            indices: vec![],
            rhs: tensor(1).access([&i, &j]),
        };
        let slots = [slot(Format::dense(0), &[]), slot(Format::sparse(2), &[2, 2])];
        let kernel = lower(&assignment, &slots);
        let b = build_storage(&[2, 2], &Format::sparse(2), &[0, 1, 1, 0], &[1.5f64, 2.5]);
        let mut out = TensorStorage::empty(&[], DType::F64, &Format::dense(0));
        assemble_and_compute::<f64>(&kernel, &mut out, &[&b]).unwrap();
        assert_eq!(out.values().as_slice::<f64>().unwrap(), &[4.0]);
    }

    #[test]
    fn test_operand_mismatch_is_rejected() {
        let i = IndexVar::new("i");
        let assignment = Assignment {
            lhs: tensor(0),
            indices: vec![i.clone()],
            rhs: tensor(1).access([&i]),
        };
        let slots = [slot(Format::sparse(1), &[2]), slot(Format::sparse(1), &[2])];
        let kernel = lower(&assignment, &slots);
        let wrong = build_storage(&[2], &Format::dense(1), &[], &[] as &[f64]);
        let mut out = TensorStorage::empty(&[2], DType::F64, &Format::sparse(1));
        assert!(assemble::<f64>(&kernel, &mut out, &[&wrong]).is_err());
        assert!(assemble::<f64>(&kernel, &mut out, &[]).is_err());
    }
}
