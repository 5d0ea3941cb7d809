use crate::build_context::BuildContext;
use crate::builders::{BuildDecorator, Next};
use crate::host_expr::{HostExpr, Scope};
use crate::node::NodeRef;
use tracing::trace;

/// Folds every sub-expression that depends on nothing supplied at invocation into a constant.
pub struct ExpressionOptimizer;

fn is_foldable(expr: &HostExpr) -> bool {
    !matches!(
        expr,
        HostExpr::Constant(..)
            | HostExpr::Target(_)
            | HostExpr::Argument { .. }
            | HostExpr::MetadataRef
            | HostExpr::Local(_)
            | HostExpr::Convert(..)
            | HostExpr::Lambda(_)
    )
}

fn fold(expr: HostExpr, scope: &Scope) -> HostExpr {
    let expr = expr.map_children(&mut |child| fold(child, scope));
    if !is_foldable(&expr) || !expr.is_closed() {
        return expr;
    }
    match expr.eval(scope) {
        Ok(value) => {
            trace!(%value, "folded constant sub-expression");
            HostExpr::Constant(value, expr.ty())
        }
        Err(error) => {
            trace!(%error, "sub-expression left to fail at invocation");
            expr
        }
    }
}

/// a member read at the root stays a member read, so it can still be assigned through
fn fold_root(expr: HostExpr, scope: &Scope) -> HostExpr {
    match expr {
        HostExpr::Property { .. } | HostExpr::DynamicMember(_) => {
            expr.map_children(&mut |child| fold(child, scope))
        }
        _ => fold(expr, scope),
    }
}

impl BuildDecorator for ExpressionOptimizer {
    fn build(&self, ctx: &mut BuildContext, node: &NodeRef, next: Next<'_>) -> Option<HostExpr> {
        if ctx.is_optimizing() {
            return next.run(ctx, node);
        }
        ctx.set_optimizing(true);
        let built = next.run(ctx, node);
        ctx.set_optimizing(false);
        let scope = Scope::detached(ctx.services().converter.clone());
        Some(fold_root(built?, &scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btype::BType;
    use crate::bvalue::Value;
    use crate::host_expr::BinaryOp;
    use crate::services::DefaultValueConverter;
    use std::sync::Arc;

    fn int(i: i64) -> HostExpr {
        HostExpr::Constant(Value::Int(i), BType::Int)
    }

    #[test]
    fn test_folds_closed_operations() {
        let scope = Scope::detached(Arc::new(DefaultValueConverter));
        let expr = HostExpr::make_binary(BinaryOp::Multiply, int(3), int(4)).unwrap();
        let expr = HostExpr::make_binary(BinaryOp::Add, int(1), expr).unwrap();
        match fold(expr, &scope) {
            HostExpr::Constant(Value::Int(13), BType::Int) => {}
            other => panic!("not folded: {other:?}"),
        }
    }

    #[test]
    fn test_keeps_open_operations() {
        let scope = Scope::detached(Arc::new(DefaultValueConverter));
        let arg = HostExpr::Argument {
            index: 0,
            ty: BType::Int,
        };
        let closed = HostExpr::make_binary(BinaryOp::Add, int(1), int(1)).unwrap();
        let expr = HostExpr::make_binary(BinaryOp::Add, arg, closed).unwrap();
        match fold(expr, &scope) {
            HostExpr::Binary(BinaryOp::Add, left, right, _) => {
                assert!(matches!(*left, HostExpr::Argument { .. }));
                assert!(matches!(*right, HostExpr::Constant(Value::Int(2), _)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_failing_operation_is_kept() {
        let scope = Scope::detached(Arc::new(DefaultValueConverter));
        let expr = HostExpr::make_binary(BinaryOp::Divide, int(1), int(0)).unwrap();
        assert!(matches!(fold(expr, &scope), HostExpr::Binary(..)));
    }
}
