//! Index-notation expressions
//!
//! A minimal expression layer: index variables, accesses of tensors by index
//! variables, scalar literals and the arithmetic `+ - *` and negation. An
//! [`Assignment`] binds an expression to a result tensor.
//!
//! ```ignore
//! let (i, j, k) = (IndexVar::new("i"), IndexVar::new("j"), IndexVar::new("k"));
//! // A(i,j) = B(i,k) * C(k,j)
//! session.set_assignment(a, &[&i, &j], b.access([&i, &k]) * c.access([&k, &j]))?;
//! ```
//!
//! Index variables that appear on the right-hand side but not on the left are
//! summed over (Einstein convention). Multiplication is defined where both
//! sides are defined (intersection); addition and subtraction where either is
//! (union); literals are defined everywhere.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tensor::Tensor;

static NEXT_VAR: AtomicU64 = AtomicU64::new(1);

/// An index variable
///
/// Two variables are the same variable only if one is a clone of the other;
/// the name is for display.
#[derive(Clone, Debug)]
pub struct IndexVar {
    id: u64,
    name: Arc<str>,
}

impl IndexVar {
    /// Create a fresh variable
    pub fn new(name: &str) -> Self {
        Self {
            id: NEXT_VAR.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique id
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for IndexVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IndexVar {}

impl std::hash::Hash for IndexVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for IndexVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A tensor indexed by index variables
#[derive(Clone, Debug, PartialEq)]
pub struct Access {
    /// Tensor being read
    pub tensor: Tensor,
    /// One variable per mode
    pub indices: Vec<IndexVar>,
}

/// Index-notation expression tree
#[derive(Clone, Debug, PartialEq)]
pub enum IndexExpr {
    /// Read of a tensor
    Access(Access),
    /// Scalar constant
    Literal(f64),
    /// Negation
    Neg(Box<IndexExpr>),
    /// Union-sum
    Add(Box<IndexExpr>, Box<IndexExpr>),
    /// Union-difference
    Sub(Box<IndexExpr>, Box<IndexExpr>),
    /// Intersection-product
    Mul(Box<IndexExpr>, Box<IndexExpr>),
}

impl IndexExpr {
    /// Every access in the expression, left to right
    pub fn accesses(&self) -> Vec<&Access> {
        let mut out = Vec::new();
        self.collect_accesses(&mut out);
        out
    }

    fn collect_accesses<'a>(&'a self, out: &mut Vec<&'a Access>) {
        match self {
            IndexExpr::Access(access) => out.push(access),
            IndexExpr::Literal(_) => {}
            IndexExpr::Neg(e) => e.collect_accesses(out),
            IndexExpr::Add(a, b) | IndexExpr::Sub(a, b) | IndexExpr::Mul(a, b) => {
                a.collect_accesses(out);
                b.collect_accesses(out);
            }
        }
    }

    /// Distinct tensors read by the expression, in order of first access
    pub fn operands(&self) -> Vec<Tensor> {
        let mut tensors: Vec<Tensor> = Vec::new();
        for access in self.accesses() {
            if !tensors.contains(&access.tensor) {
                tensors.push(access.tensor);
            }
        }
        tensors
    }

    /// Render with a naming function for tensors
    pub fn render(&self, name_of: &dyn Fn(Tensor) -> String) -> String {
        match self {
            IndexExpr::Access(access) => {
                let vars: Vec<&str> = access.indices.iter().map(|v| v.name()).collect();
                format!("{}({})", name_of(access.tensor), vars.join(","))
            }
            IndexExpr::Literal(v) => format!("{v}"),
            IndexExpr::Neg(e) => format!("-{}", e.render_operand(name_of)),
            IndexExpr::Add(a, b) => format!("{} + {}", a.render(name_of), b.render(name_of)),
            IndexExpr::Sub(a, b) => {
                format!("{} - {}", a.render(name_of), b.render_operand(name_of))
            }
            IndexExpr::Mul(a, b) => format!(
                "{} * {}",
                a.render_operand(name_of),
                b.render_operand(name_of)
            ),
        }
    }

    fn render_operand(&self, name_of: &dyn Fn(Tensor) -> String) -> String {
        match self {
            IndexExpr::Add(..) | IndexExpr::Sub(..) => format!("({})", self.render(name_of)),
            _ => self.render(name_of),
        }
    }
}

impl Tensor {
    /// Access this tensor with one index variable per mode
    pub fn access<'a>(self, indices: impl IntoIterator<Item = &'a IndexVar>) -> IndexExpr {
        IndexExpr::Access(Access {
            tensor: self,
            indices: indices.into_iter().cloned().collect(),
        })
    }
}

impl From<f64> for IndexExpr {
    fn from(value: f64) -> Self {
        IndexExpr::Literal(value)
    }
}

impl Neg for IndexExpr {
    type Output = IndexExpr;

    fn neg(self) -> IndexExpr {
        IndexExpr::Neg(Box::new(self))
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl<R: Into<IndexExpr>> $trait<R> for IndexExpr {
            type Output = IndexExpr;

            fn $method(self, rhs: R) -> IndexExpr {
                IndexExpr::$variant(Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}

impl_binary_op!(Add, add, Add);
impl_binary_op!(Sub, sub, Sub);
impl_binary_op!(Mul, mul, Mul);

/// A pending computation `lhs(indices) = rhs`
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    /// Result tensor
    pub lhs: Tensor,
    /// Left-hand index variables, one per result mode
    pub indices: Vec<IndexVar>,
    /// Right-hand expression
    pub rhs: IndexExpr,
}

impl Assignment {
    /// Distinct operand tensors
    pub fn operands(&self) -> Vec<Tensor> {
        self.rhs.operands()
    }

    /// Render with a naming function for tensors
    pub fn render(&self, name_of: &dyn Fn(Tensor) -> String) -> String {
        let vars: Vec<&str> = self.indices.iter().map(|v| v.name()).collect();
        format!(
            "{}({}) = {}",
            name_of(self.lhs),
            vars.join(","),
            self.rhs.render(name_of)
        )
    }
}
