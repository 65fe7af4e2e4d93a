//! Environment propagation: compile/link closures and per-module/per-binary
//! environments.

pub mod propagator;

pub use propagator::{
    compile_environment_for, link_closure, private_compile_closure, public_compile_closure,
    CompileEnvironment, LinkEnvironment,
};
