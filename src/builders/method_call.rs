use crate::btype::BType;
use crate::build_context::BuildContext;
use crate::builders::{build_receiver, ExpressionBuilder, Receiver};
use crate::compile_err::CompilationError;
use crate::dynamic::DynamicInvoker;
use crate::host_expr::HostExpr;
use crate::members::{MemberCategory, MemberFlags};
use crate::node::{Node, NodeRef};
use crate::overload::{self, ArgExpr};
use either::Either;
use std::sync::Arc;
use tracing::debug;

/// the method an indexer on a non array type resolves to
pub const INDEXER_NAME: &str = "get_Item";

/// Method calls and indexers.
pub struct MethodCallBuilder;

impl ExpressionBuilder for MethodCallBuilder {
    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        match node.as_ref() {
            Node::MethodCall {
                target,
                name,
                args,
                type_args,
            } => {
                let type_args = resolve_type_args(ctx, node, type_args)?;
                let receiver = build_receiver(ctx, target)?;
                build_call(ctx, node, receiver, name, args, type_args)
            }
            Node::Index { target, args } => {
                let receiver = build_receiver(ctx, target)?;
                if let Receiver::Instance(array) = &receiver {
                    if let (BType::Array(element), [index]) = (array.ty(), args.as_slice()) {
                        let index = ctx.build(index)?;
                        return build_array_index(ctx, node, array.clone(), element.as_ref().clone(), index);
                    }
                }
                build_call(ctx, node, receiver, INDEXER_NAME, args, vec![])
            }
            _ => None,
        }
    }
}

fn resolve_type_args(
    ctx: &mut BuildContext,
    node: &NodeRef,
    names: &[Arc<str>],
) -> Option<Vec<BType>> {
    let mut ret = Vec::with_capacity(names.len());
    for name in names {
        match ctx.services().types.try_resolve_type(name) {
            Some(ty) => ret.push(ty),
            None => {
                ctx.report(
                    node,
                    CompilationError::UnknownTypeArgument {
                        name: name.to_string(),
                    },
                );
                return None;
            }
        }
    }
    Some(ret)
}

fn build_array_index(
    ctx: &mut BuildContext,
    node: &NodeRef,
    array: HostExpr,
    element: BType,
    index: HostExpr,
) -> Option<HostExpr> {
    let index_type = index.ty();
    if !matches!(index_type, BType::Int | BType::Object) {
        ctx.report(
            node,
            CompilationError::IncompatibleOperands {
                token: "[]".to_string(),
                left: array.ty(),
                right: index_type,
            },
        );
        return None;
    }
    Some(HostExpr::ArrayIndex {
        array: Box::new(array),
        index: Box::new(index.convert_to(&BType::Int)),
        ty: element,
    })
}

/// builds every argument except lambdas, which wait for the candidate they are passed to
fn build_args(ctx: &mut BuildContext, args: &[NodeRef]) -> Option<Vec<ArgExpr>> {
    let mut ret = Vec::with_capacity(args.len());
    let mut failed = false;
    for arg in args {
        if let Node::Lambda { .. } = arg.as_ref() {
            ret.push(Either::Right(arg.clone()));
            continue;
        }
        match ctx.build(arg) {
            Some(expr) => ret.push(Either::Left(expr)),
            None => failed = true,
        }
    }
    (!failed).then_some(ret)
}

fn build_call(
    ctx: &mut BuildContext,
    node: &NodeRef,
    receiver: Receiver,
    name: &str,
    args: &[NodeRef],
    type_args: Vec<BType>,
) -> Option<HostExpr> {
    let args = build_args(ctx, args)?;
    let owner = receiver.owner();
    let (target, flags) = match receiver {
        Receiver::Instance(target) => (Some(target), MemberFlags::INSTANCE_ALL),
        Receiver::Static(_) => (None, MemberFlags::STATIC),
    };
    let candidates = ctx.services().members.try_get_members(
        &owner,
        MemberCategory::Method,
        flags,
        name,
        ctx.metadata(),
    );
    let resolution = overload::resolve(ctx, target.as_ref(), &candidates, &type_args, &args);
    if resolution.best.is_some() {
        return resolution.best.map(|data| overload::make_call(data, target));
    }

    let loosely_typed = args
        .iter()
        .any(|a| matches!(a, Either::Left(e) if e.ty() == BType::Object && !e.is_null_constant()));
    let late_bound = target.is_some() && owner.is_late_bound();
    if late_bound || loosely_typed {
        debug!(%owner, %name, "method call resolved against runtime types");
        let static_type = target.is_none().then(|| owner.clone());
        return Some(HostExpr::DynamicCall(Arc::new(DynamicInvoker::new(
            ctx,
            target,
            static_type,
            name.into(),
            type_args,
            args,
        ))));
    }

    if candidates.is_empty() {
        ctx.report(
            node,
            CompilationError::MemberNotFound {
                owner,
                name: name.to_string(),
            },
        );
    } else {
        let diagnostics = resolution.into_diagnostics(node, &owner, name, &args);
        ctx.restore(diagnostics);
    }
    None
}
