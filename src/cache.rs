use crate::bvalue::Metadata;
use crate::compile_err::CompileErrors;
use crate::compiler::{CompiledExpression, ExpressionCompiler};
use crate::node::{BindingNode, Node, NodeRef};
use crate::util::arc_key::ArcKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::mem::discriminant;
use std::sync::Arc;
use tracing::{debug, trace};

/// A node compared by shape: binding leaves match on index and type alone.
#[derive(Clone)]
struct CacheKey(NodeRef);

fn same_binding(a: &BindingNode, b: &BindingNode) -> bool {
    a.index == b.index && a.ty == b.ty
}

fn same_all(a: &[NodeRef], b: &[NodeRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_shape(a, b))
}

fn same_target(a: &Option<NodeRef>, b: &Option<NodeRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_shape(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn same_shape(a: &NodeRef, b: &NodeRef) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    match (a.as_ref(), b.as_ref()) {
        (Node::Binding(a), Node::Binding(b)) => same_binding(a, b),
        (
            Node::Member {
                target: t1,
                name: n1,
            },
            Node::Member {
                target: t2,
                name: n2,
            },
        ) => n1 == n2 && same_target(t1, t2),
        (Node::Index { target: t1, args: a1 }, Node::Index { target: t2, args: a2 }) => {
            same_target(t1, t2) && same_all(a1, a2)
        }
        (
            Node::MethodCall {
                target: t1,
                name: n1,
                args: a1,
                type_args: ta1,
            },
            Node::MethodCall {
                target: t2,
                name: n2,
                args: a2,
                type_args: ta2,
            },
        ) => n1 == n2 && ta1 == ta2 && same_target(t1, t2) && same_all(a1, a2),
        (
            Node::Unary {
                token: k1,
                operand: o1,
            },
            Node::Unary {
                token: k2,
                operand: o2,
            },
        ) => k1 == k2 && same_shape(o1, o2),
        (
            Node::Binary {
                token: k1,
                left: l1,
                right: r1,
            },
            Node::Binary {
                token: k2,
                left: l2,
                right: r2,
            },
        ) => k1 == k2 && same_shape(l1, l2) && same_shape(r1, r2),
        (
            Node::Conditional {
                condition: c1,
                if_true: t1,
                if_false: f1,
            },
            Node::Conditional {
                condition: c2,
                if_true: t2,
                if_false: f2,
            },
        ) => same_shape(c1, c2) && same_shape(t1, t2) && same_shape(f1, f2),
        (
            Node::Lambda {
                parameters: p1,
                body: b1,
            },
            Node::Lambda {
                parameters: p2,
                body: b2,
            },
        ) => p1 == p2 && same_shape(b1, b2),
        (Node::NullConditionalMember { target: t1 }, Node::NullConditionalMember { target: t2 }) => {
            same_shape(t1, t2)
        }
        (a, b) => a == b,
    }
}

fn hash_shape<H: Hasher>(node: &Node, state: &mut H) {
    discriminant(node).hash(state);
    let hash_target = |target: &Option<NodeRef>, state: &mut H| {
        target.is_some().hash(state);
        if let Some(t) = target {
            hash_shape(t, state)
        }
    };
    match node {
        Node::Binding(b) => {
            b.index.hash(state);
            b.ty.hash(state);
        }
        Node::Member { target, name } => {
            name.hash(state);
            hash_target(target, state);
        }
        Node::Index { target, args } => {
            hash_target(target, state);
            args.iter().for_each(|a| hash_shape(a, state));
        }
        Node::MethodCall {
            target,
            name,
            args,
            type_args,
        } => {
            name.hash(state);
            type_args.hash(state);
            hash_target(target, state);
            args.iter().for_each(|a| hash_shape(a, state));
        }
        Node::Unary { token, operand } => {
            token.hash(state);
            hash_shape(operand, state);
        }
        Node::Binary { token, left, right } => {
            token.hash(state);
            hash_shape(left, state);
            hash_shape(right, state);
        }
        Node::Conditional {
            condition,
            if_true,
            if_false,
        } => {
            hash_shape(condition, state);
            hash_shape(if_true, state);
            hash_shape(if_false, state);
        }
        Node::Lambda { parameters, body } => {
            parameters.hash(state);
            hash_shape(body, state);
        }
        Node::NullConditionalMember { target } => hash_shape(target, state),
        Node::Constant { .. } | Node::TypeAccess(_) | Node::Parameter(_) => node.hash(state),
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        same_shape(&self.0, &other.0)
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_shape(&self.0, state)
    }
}

/// a copy of `node` whose binding leaves carry no path or bound value
pub(crate) fn normalize(node: &NodeRef) -> NodeRef {
    let all = |nodes: &[NodeRef]| nodes.iter().map(normalize).collect::<Vec<_>>();
    let target = |t: &Option<NodeRef>| t.as_ref().map(normalize);
    Arc::new(match node.as_ref() {
        Node::Binding(b) => Node::Binding(BindingNode {
            index: b.index,
            path: "".into(),
            ty: b.ty.clone(),
            value: None,
        }),
        Node::Member { target: t, name } => Node::Member {
            target: target(t),
            name: name.clone(),
        },
        Node::Index { target: t, args } => Node::Index {
            target: target(t),
            args: all(args),
        },
        Node::MethodCall {
            target: t,
            name,
            args,
            type_args,
        } => Node::MethodCall {
            target: target(t),
            name: name.clone(),
            args: all(args),
            type_args: type_args.clone(),
        },
        Node::Unary { token, operand } => Node::Unary {
            token: token.clone(),
            operand: normalize(operand),
        },
        Node::Binary { token, left, right } => Node::Binary {
            token: token.clone(),
            left: normalize(left),
            right: normalize(right),
        },
        Node::Conditional {
            condition,
            if_true,
            if_false,
        } => Node::Conditional {
            condition: normalize(condition),
            if_true: normalize(if_true),
            if_false: normalize(if_false),
        },
        Node::Lambda { parameters, body } => Node::Lambda {
            parameters: parameters.clone(),
            body: normalize(body),
        },
        Node::NullConditionalMember { target } => Node::NullConditionalMember {
            target: normalize(target),
        },
        Node::Constant { .. } | Node::TypeAccess(_) | Node::Parameter(_) => {
            return node.clone();
        }
    })
}

fn children(node: &Node) -> Vec<&NodeRef> {
    match node {
        Node::Member { target, .. } => target.iter().collect(),
        Node::Index { target, args } | Node::MethodCall { target, args, .. } => {
            target.iter().chain(args.iter()).collect()
        }
        Node::Unary { operand, .. } => vec![operand],
        Node::Binary { left, right, .. } => vec![left, right],
        Node::Conditional {
            condition,
            if_true,
            if_false,
        } => vec![condition, if_true, if_false],
        Node::Lambda { body, .. } => vec![body],
        Node::NullConditionalMember { target } => vec![target],
        Node::Constant { .. } | Node::Binding(_) | Node::TypeAccess(_) | Node::Parameter(_) => {
            vec![]
        }
    }
}

/// maps every node of `normalized` to its counterpart in `original`
fn record_origins(
    normalized: &NodeRef,
    original: &NodeRef,
    origins: &mut HashMap<ArcKey<Node>, NodeRef>,
) {
    origins.insert(ArcKey(normalized.clone()), original.clone());
    for (n, o) in children(normalized).into_iter().zip(children(original)) {
        record_origins(n, o, origins);
    }
}

/// points diagnostics raised against `normalized` at the caller's nodes
fn restore_origins(mut errors: CompileErrors, normalized: &NodeRef, original: &NodeRef) -> CompileErrors {
    let mut origins = HashMap::new();
    record_origins(normalized, original, &mut origins);
    for diagnostic in errors.0.iter_mut() {
        if let Some(origin) = origins.get(&ArcKey(diagnostic.node.clone())) {
            diagnostic.node = origin.clone();
        }
    }
    errors
}

/// Memoizes compiled expressions of the wrapped compiler by expression shape.
pub struct ExpressionCache<C> {
    inner: C,
    entries: Mutex<HashMap<(CacheKey, Metadata), Arc<CompiledExpression>>>,
}

impl<C> ExpressionCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: ExpressionCompiler> ExpressionCompiler for ExpressionCache<C> {
    fn compile(
        &self,
        node: &NodeRef,
        metadata: &Metadata,
    ) -> Result<Arc<CompiledExpression>, CompileErrors> {
        let lookup = (CacheKey(node.clone()), metadata.clone());
        if let Some(hit) = self.entries.lock().get(&lookup) {
            trace!(node = %node, "compiled expression cache hit");
            return Ok(hit.clone());
        }
        debug!(node = %node, "compiled expression cache miss");
        let normalized = normalize(node);
        let compiled = self
            .inner
            .compile(&normalized, metadata)
            .map_err(|errors| restore_origins(errors, &normalized, node))?;
        self.entries
            .lock()
            .insert((CacheKey(normalized), lookup.1), compiled.clone());
        Ok(compiled)
    }

    fn invalidate(&self, node: Option<&NodeRef>, metadata: Option<&Metadata>) {
        match node {
            Some(node) => {
                let key = CacheKey(node.clone());
                let mut entries = self.entries.lock();
                let before = entries.len();
                entries.retain(|(k, m), _| !(k == &key && metadata.map_or(true, |md| md == m)));
                debug!(node = %node, removed = before - entries.len(), "cache entry invalidated");
            }
            None => {
                debug!("cache cleared");
                self.entries.lock().clear();
            }
        }
        self.inner.invalidate(node, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btype::BType;
    use crate::node::{BinaryToken, NodeExt};
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(node: &NodeRef) -> u64 {
        let mut hasher = DefaultHasher::new();
        CacheKey(node.clone()).hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_bound_values_are_interchangeable() {
        let a = Node::binary(
            BinaryToken::EQUALITY,
            Node::bound_value(0, "x", BType::Int, 1),
            Node::constant(1),
        );
        let b = Node::binary(
            BinaryToken::EQUALITY,
            Node::bound_value(0, "y", BType::Int, 2),
            Node::constant(1),
        );
        assert!(CacheKey(a.clone()) == CacheKey(b.clone()));
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_shapes_differ() {
        let a = Node::binding(0, "").member("Length");
        let b = Node::binding(1, "").member("Length");
        let c = Node::binding(0, "").member("Count");
        assert!(CacheKey(a.clone()) != CacheKey(b));
        assert!(CacheKey(a) != CacheKey(c));
        assert!(CacheKey(Node::constant(1)) != CacheKey(Node::constant(2)));
    }

    #[test]
    fn test_normalize_drops_values() {
        let node = Node::bound_value(2, "items", BType::Object, "big").call("ToString", vec![]);
        let normalized = normalize(&node);
        let Node::MethodCall { target: Some(t), .. } = normalized.as_ref() else {
            panic!("expected a call")
        };
        assert_eq!(
            t.as_ref(),
            &Node::Binding(BindingNode {
                index: 2,
                path: "".into(),
                ty: BType::Object,
                value: None,
            })
        );
        assert!(CacheKey(node) == CacheKey(normalized));
    }
}
