//! C-like rendering of native modules
//!
//! Native modules run as Rust, but `source()` still shows the loop nest they
//! implement so users can inspect what a format and assignment lower to.

use std::fmt::Write as _;

use crate::codegen::{Kernel, KernelExpr, ModuleKey};
use crate::dtype::DType;
use crate::format::ModeFormat;

fn c_type(dtype: DType) -> &'static str {
    match dtype {
        DType::F64 => "double",
        DType::F32 => "float",
        DType::F16 => "_Float16",
        DType::BF16 => "__bf16",
        DType::I64 => "int64_t",
        DType::I32 => "int32_t",
        DType::I16 => "int16_t",
        DType::I8 => "int8_t",
        DType::U64 => "uint64_t",
        DType::U32 => "uint32_t",
        DType::U16 => "uint16_t",
        DType::U8 => "uint8_t",
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Source of an iteration module
pub(crate) fn iteration(key: &ModuleKey) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// iterate {} {} {:?}", key.format, key.dtype, key.shape);
    let _ = writeln!(out, "int32_t iterate(void* args[5]) {{");
    let ty = c_type(key.dtype);
    let _ = writeln!(out, "  {ty}* vals = (({ty}*)args[4]->vals);");

    let levels = key.format.level_dims(&key.shape);
    let mut depth = 1;
    for (l, (mode, &size)) in key.format.modes().iter().zip(&levels).enumerate() {
        let m = key.format.ordering()[l];
        let parent = if l == 0 { "0".to_string() } else { format!("p{}", l - 1) };
        indent(&mut out, depth);
        match mode {
            ModeFormat::Dense => {
                let _ = writeln!(out, "for (int32_t i{m} = 0; i{m} < {size}; i{m}++) {{");
                indent(&mut out, depth + 1);
                let _ = writeln!(out, "int32_t p{l} = {parent} * {size} + i{m};");
            }
            ModeFormat::Compressed => {
                let _ = writeln!(
                    out,
                    "for (int32_t p{l} = pos{l}[{parent}]; p{l} < pos{l}[{parent} + 1]; p{l}++) {{"
                );
                indent(&mut out, depth + 1);
                let _ = writeln!(out, "int32_t i{m} = crd{l}[p{l}];");
            }
        }
        depth += 1;
    }

    let coords: Vec<String> = (0..key.shape.len()).map(|m| format!("i{m}")).collect();
    let leaf = match key.shape.len() {
        0 => "0".to_string(),
        n => format!("p{}", n - 1),
    };
    indent(&mut out, depth);
    let _ = writeln!(out, "emit({{{}}}, vals[{leaf}]);", coords.join(", "));
    while depth > 1 {
        depth -= 1;
        indent(&mut out, depth);
        out.push_str("}\n");
    }
    out.push_str("}\n");
    out
}

fn var_names(kernel: &Kernel) -> Vec<String> {
    let names: Vec<&str> = (0..kernel.extents().len()).map(|v| kernel.var_name(v)).collect();
    names
        .iter()
        .enumerate()
        .map(|(v, name)| {
            if names.iter().filter(|other| *other == name).count() > 1 {
                format!("{name}{v}")
            } else {
                name.to_string()
            }
        })
        .collect()
}

fn render_expr(expr: &KernelExpr, vars: &[String], out: &mut String) {
    match expr {
        KernelExpr::Access { operand, vars: access } => {
            let idx: Vec<&str> = access.iter().map(|&v| vars[v].as_str()).collect();
            let _ = write!(out, "t{}({})", operand + 1, idx.join(","));
        }
        KernelExpr::Literal(v) => {
            let _ = write!(out, "{v:?}");
        }
        KernelExpr::Neg(e) => {
            out.push_str("-(");
            render_expr(e, vars, out);
            out.push(')');
        }
        KernelExpr::Add(a, b) | KernelExpr::Sub(a, b) | KernelExpr::Mul(a, b) => {
            let op = match expr {
                KernelExpr::Add(..) => "+",
                KernelExpr::Sub(..) => "-",
                _ => "*",
            };
            out.push('(');
            render_expr(a, vars, out);
            let _ = write!(out, " {op} ");
            render_expr(b, vars, out);
            out.push(')');
        }
    }
}

/// Source of a kernel module
pub(crate) fn kernel(key: &ModuleKey, kernel: &Kernel) -> String {
    let vars = var_names(kernel);
    let ty = c_type(kernel.dtype());
    let mut out = String::new();
    let _ = writeln!(out, "// compute {} {} {:?}", key.format, key.dtype, key.shape);
    for (slot, operand) in kernel.operands().iter().enumerate() {
        let _ = writeln!(
            out,
            "// t{}: {} {} {:?}",
            slot + 1,
            operand.format,
            operand.dtype,
            operand.dims
        );
    }
    let _ = writeln!(out, "int32_t compute(void** args) {{");

    let mut depth = 1;
    for &v in kernel.output_vars() {
        indent(&mut out, depth);
        let name = &vars[v];
        let extent = kernel.extents()[v];
        let _ = writeln!(out, "for (int32_t {name} = 0; {name} < {extent}; {name}++) {{");
        depth += 1;
    }
    indent(&mut out, depth);
    let _ = writeln!(out, "{ty} acc = 0;");
    let body_depth = depth;
    for &v in kernel.reduction_vars() {
        indent(&mut out, depth);
        let name = &vars[v];
        let extent = kernel.extents()[v];
        let _ = writeln!(out, "for (int32_t {name} = 0; {name} < {extent}; {name}++) {{");
        depth += 1;
    }
    indent(&mut out, depth);
    out.push_str("acc += ");
    render_expr(kernel.expr(), &vars, &mut out);
    out.push_str(";\n");
    while depth > body_depth {
        depth -= 1;
        indent(&mut out, depth);
        out.push_str("}\n");
    }

    let outputs: Vec<&str> = kernel.output_vars().iter().map(|&v| vars[v].as_str()).collect();
    indent(&mut out, depth);
    let _ = writeln!(out, "t0({}) = acc;", outputs.join(","));
    while depth > 1 {
        depth -= 1;
        indent(&mut out, depth);
        out.push_str("}\n");
    }
    out.push_str("  return 0;\n}\n");
    out
}
