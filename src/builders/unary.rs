use crate::build_context::BuildContext;
use crate::builders::ExpressionBuilder;
use crate::compile_err::CompilationError;
use crate::host_expr::{HostExpr, UnaryOp};
use crate::node::{Node, NodeRef, UnaryToken};
use std::collections::HashMap;

pub struct UnaryBuilder {
    operators: HashMap<UnaryToken, UnaryOp>,
}

impl Default for UnaryBuilder {
    fn default() -> Self {
        Self {
            operators: HashMap::from([
                (UnaryToken::MINUS, UnaryOp::Negate),
                (UnaryToken::PLUS, UnaryOp::UnaryPlus),
                (UnaryToken::NOT, UnaryOp::Not),
                (UnaryToken::BIT_NOT, UnaryOp::OnesComplement),
            ]),
        }
    }
}

impl ExpressionBuilder for UnaryBuilder {
    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        let Node::Unary { token, operand } = node.as_ref() else {
            return None;
        };
        let Some(&op) = self.operators.get(token) else {
            ctx.report(
                node,
                CompilationError::UnsupportedUnaryOperator {
                    token: token.clone(),
                },
            );
            return None;
        };
        let operand = ctx.build(operand)?;
        let operand_type = operand.ty();
        HostExpr::make_unary(op, operand).or_else(|| {
            ctx.report(
                node,
                CompilationError::InvalidOperand {
                    token: token.to_string(),
                    operand: operand_type,
                },
            );
            None
        })
    }
}
