//! Local optimizers refining the restart candidates under bound constraints.
mod gradient;
mod optimizer;

pub(crate) use gradient::*;
pub(crate) use optimizer::*;
