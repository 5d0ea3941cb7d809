use crate::btype::BType;
use crate::build_context::BuildContext;
use crate::builders::ExpressionBuilder;
use crate::bvalue::Value;
use crate::compile_err::CompilationError;
use crate::host_expr::HostExpr;
use crate::node::{Node, NodeRef};

pub struct ConstantBuilder;

impl ExpressionBuilder for ConstantBuilder {
    fn priority(&self) -> i32 {
        100
    }

    fn try_build(&self, _ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        match node.as_ref() {
            Node::Constant { value, ty } => Some(HostExpr::Constant(value.clone(), ty.clone())),
            // a type used as a value rather than as the target of a static access
            Node::TypeAccess(ty) => Some(HostExpr::Constant(Value::Type(ty.clone()), BType::Object)),
            _ => None,
        }
    }
}

/// Binding values and lambda parameters.
pub struct BindingBuilder;

impl ExpressionBuilder for BindingBuilder {
    fn priority(&self) -> i32 {
        100
    }

    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        match node.as_ref() {
            Node::Binding(binding) => Some(HostExpr::Argument {
                index: binding.index,
                ty: binding.ty.clone(),
            }),
            // mapped parameters never reach the builders
            Node::Parameter(name) => {
                ctx.report(
                    node,
                    CompilationError::UnknownParameter {
                        name: name.to_string(),
                    },
                );
                None
            }
            _ => None,
        }
    }
}
