//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;

use tacit::codegen::{ModuleCache, NativeBackend};
use tacit::error::Result;
use tacit::format::Format;
use tacit::session::{Session, SessionConfig};
use tacit::tensor::Tensor;

/// Route `log` output through the test harness; set RUST_LOG to see it
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Session with its own cache, so cache statistics are not shared between tests
pub fn isolated_session(config: SessionConfig) -> Session {
    init_logging();
    Session::with_cache(config, Arc::new(ModuleCache::new(Arc::new(NativeBackend::new()))))
}

/// Session with default configuration and its own cache
pub fn session() -> Session {
    isolated_session(SessionConfig::default())
}

/// Create and pack an `f64` tensor from components
pub fn filled(
    session: &mut Session,
    name: &str,
    dims: &[usize],
    format: Format,
    components: &[(&[i32], f64)],
) -> Result<Tensor> {
    let t = session.tensor::<f64>(name, dims, format)?;
    session.insert_components(t, components.iter().map(|&(c, v)| (c, v)))?;
    Ok(t)
}

/// Dense row-major copy of a matrix
pub fn to_dense(session: &mut Session, t: Tensor) -> Result<Vec<f64>> {
    let dims = session.dims(t)?.to_vec();
    let mut dense = vec![0.0; dims.iter().product()];
    for (coordinate, value) in session.components::<f64>(t)? {
        let mut offset = 0;
        for (c, d) in coordinate.iter().zip(&dims) {
            offset = offset * d + *c as usize;
        }
        dense[offset] += value;
    }
    Ok(dense)
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}
