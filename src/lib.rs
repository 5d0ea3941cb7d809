#[macro_use]
extern crate lazy_static;
extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod btype;
pub mod build_context;
pub mod builders;
pub mod builtin;
pub mod bvalue;
pub mod cache;
pub mod compile_err;
pub mod compiler;
pub mod dynamic;
pub mod host_expr;
pub mod invoke_err;
pub mod members;
pub mod node;
pub mod optimizer;
pub mod options;
mod overload;
pub mod parser;
pub mod services;
mod util;

pub use crate::btype::{BType, ClassSpec, DelegateSpec, EnumSpec};
pub use crate::bvalue::{ArrayValue, Delegate, HostObject, Metadata, Value};
pub use crate::cache::ExpressionCache;
pub use crate::compile_err::{CompilationError, CompileErrors, Diagnostic};
pub use crate::compiler::{
    CompiledExpression, Compiler, ExpressionCompiler, SynchronizedCompiler,
};
pub use crate::invoke_err::InvokeError;
pub use crate::members::{MemberProvider, MemberRegistry, MethodSpec, ParamSpec};
pub use crate::node::{Node, NodeExt, NodeRef};
pub use crate::options::{CompilerOptions, InvokeLimits};
pub use crate::parser::{parse, parse_with_bindings, ParseError};
pub use crate::services::{Services, TypeResolver, TypeTable};

use crate::builtin::{std_members, std_types};

/// services backed by the standard members and type names
pub fn std_services() -> Services {
    Services::new(std_members(), std_types())
}
