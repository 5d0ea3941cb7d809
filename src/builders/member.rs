use crate::btype::BType;
use crate::build_context::BuildContext;
use crate::builders::{build_receiver, ExpressionBuilder, Receiver};
use crate::bvalue::Value;
use crate::compile_err::CompilationError;
use crate::dynamic::DynamicMember;
use crate::host_expr::HostExpr;
use crate::members::{MemberCategory, MemberFlags};
use crate::node::{Node, NodeRef};
use std::sync::Arc;
use tracing::trace;

pub struct MemberBuilder;

impl ExpressionBuilder for MemberBuilder {
    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        let Node::Member { target, name } = node.as_ref() else {
            return None;
        };
        let receiver = build_receiver(ctx, target)?;
        let owner = receiver.owner();
        let flags = match receiver {
            Receiver::Instance(_) => MemberFlags::INSTANCE,
            Receiver::Static(_) => MemberFlags::STATIC,
        };
        let accessor = ctx.services().members.try_get_member(
            &owner,
            MemberCategory::Accessor,
            flags,
            name,
            ctx.metadata(),
        );
        match (receiver, accessor) {
            (Receiver::Instance(target), Some(member)) => Some(HostExpr::Property {
                target: Some(Box::new(target)),
                member,
            }),
            (Receiver::Static(_), Some(member)) => Some(HostExpr::Property {
                target: None,
                member,
            }),
            (Receiver::Static(BType::Enum(spec)), None) if spec.ordinal(name).is_some() => {
                let ordinal = spec.ordinal(name)?;
                Some(HostExpr::Constant(
                    Value::Enum(spec.clone(), ordinal),
                    BType::Enum(spec),
                ))
            }
            (Receiver::Instance(target), None) if owner.is_late_bound() => {
                trace!(%owner, %name, "member resolved against the runtime type");
                Some(HostExpr::DynamicMember(Arc::new(DynamicMember::new(
                    target,
                    name.clone(),
                    ctx.runtime_members().clone(),
                ))))
            }
            _ => {
                ctx.report(
                    node,
                    CompilationError::MemberNotFound {
                        owner,
                        name: name.to_string(),
                    },
                );
                None
            }
        }
    }
}
