use crate::btype::BType;
use crate::build_context::BuildContext;
use crate::builders::ExpressionBuilder;
use crate::compile_err::CompilationError;
use crate::host_expr::HostExpr;
use crate::node::{Node, NodeRef};

pub struct ConditionalBuilder;

impl ExpressionBuilder for ConditionalBuilder {
    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        let Node::Conditional {
            condition,
            if_true,
            if_false,
        } = node.as_ref()
        else {
            return None;
        };
        let condition = ctx.build(condition);
        let if_true = ctx.build(if_true);
        let if_false = ctx.build(if_false);
        let (condition, if_true, if_false) = (condition?, if_true?, if_false?);

        let condition_type = condition.ty();
        if !matches!(condition_type, BType::Bool | BType::Object) {
            ctx.report(
                node,
                CompilationError::ConditionNotBoolean {
                    actual_type: condition_type,
                },
            );
            return None;
        }
        let (true_type, false_type) = (if_true.ty(), if_false.ty());
        let ty = if if_true.is_null_constant() && false_type.is_nullable() {
            Some(false_type.clone())
        } else if if_false.is_null_constant() && true_type.is_nullable() {
            Some(true_type.clone())
        } else if if_true.is_null_constant() || if_false.is_null_constant() {
            let other = if if_true.is_null_constant() { &false_type } else { &true_type };
            Some(BType::nullable(other.clone()))
        } else {
            true_type.common_type(&false_type)
        };
        let Some(ty) = ty else {
            ctx.report(
                node,
                CompilationError::IncompatibleBranches {
                    if_true: true_type,
                    if_false: false_type,
                },
            );
            return None;
        };
        Some(HostExpr::Conditional {
            condition: Box::new(condition),
            if_true: Box::new(if_true.convert_to(&ty)),
            if_false: Box::new(if_false.convert_to(&ty)),
            ty,
        })
    }
}
