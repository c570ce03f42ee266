pub mod ast;
pub mod attr;
pub mod ctxt;
mod symbol;
