pub mod binary;
pub mod conditional;
pub mod constant;
pub mod lambda;
pub mod member;
pub mod method_call;
pub mod null_conditional;
pub mod unary;

use crate::btype::BType;
use crate::build_context::BuildContext;
use crate::dynamic::RuntimeMembers;
use crate::host_expr::HostExpr;
use crate::node::{Node, NodeRef};
use crate::services::Services;
use std::sync::Arc;

/// Compiles the nodes it recognizes, returning `None` for any other node.
pub trait ExpressionBuilder: Send + Sync {
    fn priority(&self) -> i32 {
        0
    }

    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr>;
}

/// Wraps the builder chain, deciding when and how the rest of it runs.
pub trait BuildDecorator: Send + Sync {
    fn build(&self, ctx: &mut BuildContext, node: &NodeRef, next: Next<'_>) -> Option<HostExpr>;
}

#[derive(Clone, Copy)]
pub struct Next<'a> {
    decorators: &'a [Arc<dyn BuildDecorator>],
    components: &'a [Arc<dyn ExpressionBuilder>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(builders: &'a BuilderSet) -> Self {
        Self {
            decorators: &builders.decorators,
            components: &builders.components,
        }
    }

    pub fn run(self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        match self.decorators.split_first() {
            Some((decorator, rest)) => decorator.build(
                ctx,
                node,
                Next {
                    decorators: rest,
                    components: self.components,
                },
            ),
            None => {
                for component in self.components {
                    let checkpoint = ctx.checkpoint();
                    if let Some(expr) = component.try_build(ctx, node) {
                        return Some(expr);
                    }
                    // the component recognized the node and failed
                    if ctx.checkpoint() > checkpoint {
                        return None;
                    }
                }
                None
            }
        }
    }
}

/// The priority-ordered components and decorators a compiler runs.
#[derive(Clone)]
pub struct BuilderSet {
    pub(crate) components: Vec<Arc<dyn ExpressionBuilder>>,
    pub(crate) decorators: Vec<Arc<dyn BuildDecorator>>,
    pub(crate) services: Services,
    pub(crate) runtime: Arc<RuntimeMembers>,
}

impl BuilderSet {
    pub(crate) fn new(services: Services, components: Vec<Arc<dyn ExpressionBuilder>>) -> Self {
        let runtime = Arc::new(RuntimeMembers::new(services.members.clone()));
        let mut ret = Self {
            components,
            decorators: vec![],
            services,
            runtime,
        };
        ret.sort();
        ret
    }

    pub(crate) fn sort(&mut self) {
        self.components
            .sort_by_key(|c| std::cmp::Reverse(c.priority()));
    }
}

pub fn default_builders() -> Vec<Arc<dyn ExpressionBuilder>> {
    vec![
        Arc::new(null_conditional::NullConditionalBuilder::default()),
        Arc::new(constant::ConstantBuilder),
        Arc::new(constant::BindingBuilder),
        Arc::new(member::MemberBuilder),
        Arc::new(method_call::MethodCallBuilder),
        Arc::new(binary::BinaryBuilder::default()),
        Arc::new(unary::UnaryBuilder::default()),
        Arc::new(conditional::ConditionalBuilder),
        Arc::new(lambda::LambdaBuilder),
    ]
}

/// The compiled target of a member, index or call, or the type for a static access.
pub(crate) enum Receiver {
    Instance(HostExpr),
    Static(BType),
}

impl Receiver {
    pub(crate) fn owner(&self) -> BType {
        match self {
            Receiver::Instance(e) => e.ty(),
            Receiver::Static(t) => t.clone(),
        }
    }
}

pub(crate) fn build_receiver(ctx: &mut BuildContext, target: &Option<NodeRef>) -> Option<Receiver> {
    match target {
        None => Some(Receiver::Instance(ctx.target_expr())),
        Some(t) => match t.as_ref() {
            Node::TypeAccess(ty) if ctx.expression(t).is_none() => Some(Receiver::Static(ty.clone())),
            _ => ctx.build(t).map(Receiver::Instance),
        },
    }
}
