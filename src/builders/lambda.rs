use crate::btype::{BType, Conversion, DelegateSpec};
use crate::build_context::BuildContext;
use crate::builders::ExpressionBuilder;
use crate::compile_err::CompilationError;
use crate::host_expr::{HostExpr, HostLambda, Local};
use crate::node::{Node, NodeRef};
use std::sync::Arc;

/// Lambdas passed as method arguments, typed by the delegate the parameter expects.
pub struct LambdaBuilder;

impl ExpressionBuilder for LambdaBuilder {
    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        let Node::Lambda { parameters, body } = node.as_ref() else {
            return None;
        };
        let Some(hint) = ctx.take_lambda_hint() else {
            ctx.report(
                node,
                CompilationError::LambdaWithoutDelegateType {
                    parameter_count: parameters.len(),
                },
            );
            return None;
        };
        if hint.params.len() != parameters.len() {
            ctx.report(
                node,
                CompilationError::LambdaParameterCountMismatch {
                    expected: hint.params.len(),
                    actual: parameters.len(),
                },
            );
            return None;
        }

        let locals: Vec<Local> = hint.params.iter().cloned().map(Local::new).collect();
        let bindings: Vec<_> = parameters
            .iter()
            .zip(locals.iter())
            .map(|(name, local)| {
                (
                    Arc::new(Node::Parameter(name.clone())),
                    HostExpr::Local(local.clone()),
                )
            })
            .collect();
        let body = ctx.with_expressions(&bindings, |ctx| ctx.build(body))?;

        let body_type = body.ty();
        let (body, ret) = if hint.ret == BType::Void || hint.ret.has_generics() {
            (body, body_type)
        } else {
            match body_type.conversion_to(&hint.ret) {
                Some(Conversion::Identity) => (body, body_type),
                Some(_) => (body.convert_to(&hint.ret), hint.ret.clone()),
                None if body.is_null_constant() && hint.ret.is_nullable() => {
                    (body.convert_to(&hint.ret), hint.ret.clone())
                }
                None => {
                    ctx.report(
                        node,
                        CompilationError::LambdaReturnTypeMismatch {
                            expected: hint.ret.clone(),
                            actual: body_type,
                        },
                    );
                    return None;
                }
            }
        };
        Some(HostExpr::Lambda(Arc::new(HostLambda {
            params: locals,
            body,
            spec: Arc::new(DelegateSpec {
                params: hint.params.clone(),
                ret,
            }),
        })))
    }
}
