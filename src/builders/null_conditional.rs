use crate::btype::BType;
use crate::build_context::BuildContext;
use crate::builders::ExpressionBuilder;
use crate::bvalue::Value;
use crate::host_expr::{HostExpr, Local};
use crate::node::{Node, NodeRef};
use crate::util::arc_key::ArcKey;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::thread::{self, ThreadId};
use tracing::trace;

type HandlingKey = (ThreadId, ArcKey<Node>);

/// Lowers `a?.b...` chains into a temporary, a null check and the chain built against the temporary.
#[derive(Default)]
pub struct NullConditionalBuilder {
    handling: Mutex<HashSet<HandlingKey>>,
}

/// removes the node from the handling set when dropped
struct Handling<'a> {
    set: &'a Mutex<HashSet<HandlingKey>>,
    key: HandlingKey,
}

impl Drop for Handling<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

/// the outermost `?.` along the target chain of `node`
fn find_null_conditional(node: &NodeRef) -> Option<NodeRef> {
    let mut current = node.target()?;
    loop {
        match current.as_ref() {
            Node::NullConditionalMember { .. } => return Some(current.clone()),
            Node::Member { .. } | Node::Index { .. } | Node::MethodCall { .. } => {
                current = current.target()?
            }
            _ => return None,
        }
    }
}

impl ExpressionBuilder for NullConditionalBuilder {
    fn priority(&self) -> i32 {
        1000
    }

    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        if let Node::NullConditionalMember { target } = node.as_ref() {
            return ctx.build(target);
        }
        let conditional = find_null_conditional(node)?;
        let Node::NullConditionalMember { target } = conditional.as_ref() else {
            return None;
        };
        if ctx.expression(&conditional).is_some() {
            return None;
        }
        let key = (thread::current().id(), ArcKey(node.clone()));
        if !self.handling.lock().insert(key.clone()) {
            return None;
        }
        let _handling = Handling {
            set: &self.handling,
            key,
        };

        let init = ctx.build(target)?;
        let temp = Local::new(init.ty());
        let value = match &temp.ty {
            BType::Nullable(inner) => HostExpr::Local(temp.clone()).convert_to(inner),
            _ => HostExpr::Local(temp.clone()),
        };
        let chain = ctx.with_expressions(&[(conditional.clone(), value)], |ctx| ctx.build(node))?;

        if temp.ty.is_value_type() {
            trace!(node = %node, "null conditional on a value type, no check needed");
            return Some(HostExpr::Block {
                temp,
                init: Box::new(init),
                body: Box::new(chain),
            });
        }
        let ty = BType::nullable(chain.ty());
        let check = HostExpr::IsNull(Box::new(HostExpr::Local(temp.clone())));
        Some(HostExpr::Block {
            temp,
            init: Box::new(init),
            body: Box::new(HostExpr::Conditional {
                condition: Box::new(check),
                if_true: Box::new(HostExpr::Constant(Value::Null, ty.clone())),
                if_false: Box::new(chain.convert_to(&ty)),
                ty,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{default_builders, BuilderSet};
    use crate::bvalue::Metadata;
    use crate::node::NodeExt;
    use std::sync::Arc;

    fn context() -> BuildContext {
        let set = BuilderSet::new(crate::std_services(), default_builders());
        BuildContext::new(Arc::new(set), Arc::new(Metadata::new()))
    }

    fn length_of_null() -> NodeRef {
        Node::typed_constant(Value::Null, BType::String)
            .null_conditional()
            .member("Length")
    }

    #[test]
    fn test_finds_outermost() {
        let inner = Node::target_member("a").null_conditional();
        let outer = inner.member("b").null_conditional();
        let node = outer.member("c").call("d", vec![]);
        assert_eq!(find_null_conditional(&node), Some(outer));
        assert_eq!(find_null_conditional(&Node::target_member("a")), None);
    }

    #[test]
    fn test_node_in_progress_is_skipped() {
        let builder = NullConditionalBuilder::default();
        let node = length_of_null();
        let key = (thread::current().id(), ArcKey(node.clone()));
        builder.handling.lock().insert(key.clone());
        let mut ctx = context();
        assert!(builder.try_build(&mut ctx, &node).is_none());
        assert!(!ctx.has_errors());

        builder.handling.lock().remove(&key);
        let built = builder.try_build(&mut ctx, &node).unwrap();
        assert_eq!(built.ty(), BType::nullable(BType::Int));
        assert!(builder.handling.lock().is_empty());
    }

    #[test]
    fn test_handling_released_on_failure() {
        let builder = NullConditionalBuilder::default();
        let node = Node::typed_constant(Value::Null, BType::String)
            .null_conditional()
            .member("Nope");
        let mut ctx = context();
        assert!(builder.try_build(&mut ctx, &node).is_none());
        assert!(ctx.has_errors());
        assert!(builder.handling.lock().is_empty());
    }
}
