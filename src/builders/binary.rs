use crate::btype::BType;
use crate::build_context::BuildContext;
use crate::builders::ExpressionBuilder;
use crate::compile_err::CompilationError;
use crate::host_expr::{binary_type, BinaryOp, HostExpr};
use crate::node::{BinaryToken, Node, NodeRef};
use std::collections::HashMap;
use std::sync::Arc;

pub type BinaryFactory =
    Arc<dyn Fn(&mut BuildContext, &NodeRef, HostExpr, HostExpr) -> Option<HostExpr> + Send + Sync>;

/// Maps binary operator tokens to the functions that build them.
pub struct BinaryBuilder {
    factories: HashMap<BinaryToken, BinaryFactory>,
}

fn operands_error(token: &BinaryToken, left: &HostExpr, right: &HostExpr) -> CompilationError {
    CompilationError::IncompatibleOperands {
        token: token.to_string(),
        left: left.ty(),
        right: right.ty(),
    }
}

pub fn operator(token: BinaryToken, op: BinaryOp) -> BinaryFactory {
    Arc::new(move |ctx: &mut BuildContext, node: &NodeRef, left: HostExpr, right: HostExpr| {
        let error = operands_error(&token, &left, &right);
        HostExpr::make_binary(op, left, right).or_else(|| {
            ctx.report(node, error);
            None
        })
    })
}

/// `+`, lowered to concatenation when either side is a string
fn add() -> BinaryFactory {
    let arithmetic = operator(BinaryToken::ADD, BinaryOp::Add);
    Arc::new(move |ctx: &mut BuildContext, node: &NodeRef, left: HostExpr, right: HostExpr| {
        if left.ty() == BType::String || right.ty() == BType::String {
            Some(HostExpr::Concat(Box::new(left), Box::new(right)))
        } else {
            arithmetic(ctx, node, left, right)
        }
    })
}

/// typed comparison, falling back to `Equals` when the types do not compare natively
fn equality(op: BinaryOp) -> BinaryFactory {
    Arc::new(move |_: &mut BuildContext, _: &NodeRef, left: HostExpr, right: HostExpr| {
        let ty = binary_type(op, &left.ty(), &right.ty());
        Some(match ty {
            Some(ty) => HostExpr::Binary(op, Box::new(left), Box::new(right), ty),
            None => HostExpr::DynamicEquals {
                left: Box::new(left),
                right: Box::new(right),
                negate: op == BinaryOp::NotEqual,
            },
        })
    })
}

impl Default for BinaryBuilder {
    fn default() -> Self {
        let mut factories = HashMap::new();
        factories.insert(BinaryToken::ADD, add());
        for (token, op) in [
            (BinaryToken::SUBTRACT, BinaryOp::Subtract),
            (BinaryToken::MULTIPLY, BinaryOp::Multiply),
            (BinaryToken::DIVIDE, BinaryOp::Divide),
            (BinaryToken::REMAINDER, BinaryOp::Modulo),
            (BinaryToken::BIT_AND, BinaryOp::And),
            (BinaryToken::BIT_OR, BinaryOp::Or),
            (BinaryToken::EXCLUSIVE_OR, BinaryOp::ExclusiveOr),
            (BinaryToken::LEFT_SHIFT, BinaryOp::LeftShift),
            (BinaryToken::RIGHT_SHIFT, BinaryOp::RightShift),
            (BinaryToken::AND, BinaryOp::AndAlso),
            (BinaryToken::OR, BinaryOp::OrElse),
            (BinaryToken::LESS_THAN, BinaryOp::LessThan),
            (BinaryToken::LESS_THAN_OR_EQUAL, BinaryOp::LessThanOrEqual),
            (BinaryToken::GREATER_THAN, BinaryOp::GreaterThan),
            (BinaryToken::GREATER_THAN_OR_EQUAL, BinaryOp::GreaterThanOrEqual),
            (BinaryToken::NULL_COALESCING, BinaryOp::Coalesce),
        ] {
            factories.insert(token.clone(), operator(token, op));
        }
        factories.insert(BinaryToken::EQUALITY, equality(BinaryOp::Equal));
        factories.insert(BinaryToken::NOT_EQUAL, equality(BinaryOp::NotEqual));
        Self { factories }
    }
}

impl BinaryBuilder {
    pub fn with_operator(mut self, token: BinaryToken, factory: BinaryFactory) -> Self {
        self.factories.insert(token, factory);
        self
    }
}

impl ExpressionBuilder for BinaryBuilder {
    fn try_build(&self, ctx: &mut BuildContext, node: &NodeRef) -> Option<HostExpr> {
        let Node::Binary { token, left, right } = node.as_ref() else {
            return None;
        };
        let Some(factory) = self.factories.get(token) else {
            ctx.report(
                node,
                CompilationError::UnsupportedBinaryOperator {
                    token: token.clone(),
                },
            );
            return None;
        };
        let left = ctx.build(left);
        let right = ctx.build(right);
        factory(ctx, node, left?, right?)
    }
}
