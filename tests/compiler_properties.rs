mod utils;

use bindex::btype::BType;
use bindex::builders::ExpressionBuilder;
use bindex::bvalue::{ArrayValue, Metadata, Value};
use bindex::node::{BinaryToken, Node, NodeExt, NodeRef};
use bindex::{
    CompileErrors, CompiledExpression, Compiler, CompilerOptions, ExpressionCache,
    ExpressionCompiler, InvokeError,
};
use parking_lot::ReentrantMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use utils::fixtures::{ada, bob, fixture_services, person_type};

/// counts the compilations that reach the wrapped compiler
struct Counting {
    inner: Compiler,
    count: AtomicUsize,
}

impl Counting {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Compiler::new(fixture_services()).with_optimizer(),
            count: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ExpressionCompiler for Counting {
    fn compile(
        &self,
        node: &NodeRef,
        metadata: &Metadata,
    ) -> Result<Arc<CompiledExpression>, CompileErrors> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(node, metadata)
    }

    fn invalidate(&self, node: Option<&NodeRef>, metadata: Option<&Metadata>) {
        self.inner.invalidate(node, metadata)
    }
}

fn person_metadata() -> Metadata {
    Metadata::new().with_target_type(person_type())
}

fn compile(node: &NodeRef) -> Result<Arc<CompiledExpression>, CompileErrors> {
    CompilerOptions::default()
        .to_compiler(fixture_services())
        .compile(node, &person_metadata())
}

fn eval(node: &NodeRef) -> Value {
    compile(node).unwrap().invoke(&ada(), &[], None).unwrap()
}

#[test]
fn test_bound_values_share_cache_entry() {
    let counting = Counting::new();
    let cache = ExpressionCache::new(counting.clone());
    let expr = |v: i64| {
        Node::binary(
            BinaryToken::EQUALITY,
            Node::bound_value(0, "x", BType::Int, v),
            Node::constant(1),
        )
    };
    let md = Metadata::new();
    let first = cache.compile(&expr(1), &md).unwrap();
    let second = cache.compile(&expr(2), &md).unwrap();
    assert_eq!(counting.count(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.invoke(&Value::Null, &[Value::Int(1)], None).unwrap(), Value::Bool(true));
    assert_eq!(first.invoke(&Value::Null, &[Value::Int(5)], None).unwrap(), Value::Bool(false));
}

#[test]
fn test_recompile_is_cache_hit() {
    let counting = Counting::new();
    let cache = ExpressionCache::new(counting.clone());
    let node = Node::target_member("Age");
    let md = person_metadata();
    let first = cache.compile(&node, &md).unwrap().invoke(&ada(), &[], None).unwrap();
    let second = cache.compile(&node, &md).unwrap().invoke(&ada(), &[], None).unwrap();
    assert_eq!(counting.count(), 1);
    assert_eq!(first, second);
    assert_eq!(first, Value::Int(36));
}

#[test]
fn test_metadata_is_part_of_the_key() {
    let counting = Counting::new();
    let cache = ExpressionCache::new(counting.clone());
    let node = Node::target_member("Age");
    cache.compile(&node, &person_metadata()).unwrap();
    cache.compile(&node, &Metadata::new()).unwrap();
    assert_eq!(counting.count(), 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_invalidate_single_entry() {
    let counting = Counting::new();
    let cache = ExpressionCache::new(counting.clone());
    let md = person_metadata();
    let age = Node::target_member("Age");
    let name = Node::target_member("Name");
    cache.compile(&age, &md).unwrap();
    cache.compile(&name, &md).unwrap();
    cache.invalidate(Some(&age), None);
    assert_eq!(cache.len(), 1);
    cache.compile(&name, &md).unwrap();
    assert_eq!(counting.count(), 2);
    cache.compile(&age, &md).unwrap();
    assert_eq!(counting.count(), 3);
}

#[test]
fn test_invalidate_all() {
    let counting = Counting::new();
    let cache = ExpressionCache::new(counting.clone());
    let md = person_metadata();
    cache.compile(&Node::target_member("Age"), &md).unwrap();
    cache.compile(&Node::target_member("Name"), &md).unwrap();
    cache.invalidate(None, None);
    assert!(cache.is_empty());
    cache.compile(&Node::target_member("Age"), &md).unwrap();
    assert_eq!(counting.count(), 3);
}

#[test]
fn test_concurrent_compiles() {
    let cache = ExpressionCache::new(Counting::new());
    let node = Node::target_member("Name").call("ToUpper", vec![]);
    let md = person_metadata();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let compiled = cache.compile(&node, &md).unwrap();
                assert_eq!(compiled.invoke(&ada(), &[], None).unwrap(), Value::str("ADA"));
            });
        }
    });
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_binary_add() {
    let node = Node::binary(BinaryToken::ADD, Node::constant(1), Node::constant(2));
    assert_eq!(eval(&node), Value::Int(3));
}

#[test]
fn test_string_concat_fallback() {
    let node = Node::binary(BinaryToken::ADD, Node::constant("a"), Node::constant(1));
    assert_eq!(eval(&node), Value::str("a1"));
}

#[test]
fn test_equality_falls_back_to_equals() {
    let node = Node::binary(BinaryToken::EQUALITY, Node::constant("1"), Node::constant(1));
    assert_eq!(eval(&node), Value::Bool(false));
}

#[test]
fn test_null_conditional_short_circuit() {
    let node = Node::typed_constant(Value::Null, BType::String)
        .null_conditional()
        .member("Length");
    let compiled = compile(&node).unwrap();
    assert_eq!(compiled.result_type(), BType::nullable(BType::Int));
    assert_eq!(compiled.invoke(&Value::Null, &[], None).unwrap(), Value::Null);
}

#[test]
fn test_nested_null_conditional_chain() {
    let node = Node::target_member("Manager")
        .null_conditional()
        .member("Manager")
        .null_conditional()
        .member("Name");
    let compiled = compile(&node).unwrap();
    assert_eq!(compiled.invoke(&bob(), &[], None).unwrap(), Value::Null);
    // Grace has no manager
    assert_eq!(compiled.invoke(&ada(), &[], None).unwrap(), Value::Null);
}

#[test]
fn test_overload_selection_is_deterministic() {
    let node = Node::target_call("Describe", vec![Node::constant(3)]);
    for _ in 0..10 {
        assert_eq!(eval(&node), Value::str("int 3"));
    }
}

#[test]
fn test_params_packing() {
    let call = |args: Vec<NodeRef>| eval(&Node::target_call("Total", args));
    assert_eq!(
        call(vec![Node::constant(1), Node::constant(2), Node::constant(3)]),
        Value::Int(6)
    );
    assert_eq!(call(vec![Node::constant(1)]), Value::Int(1));
    let packed = ArrayValue::new(BType::Int, vec![Value::Int(2), Value::Int(3)]);
    assert_eq!(
        call(vec![
            Node::constant(1),
            Node::typed_constant(packed, BType::array(BType::Int))
        ]),
        Value::Int(6)
    );
}

#[test]
fn test_unknown_operator_single_diagnostic() {
    let node = Node::binary(BinaryToken::new("<=>"), Node::constant(1), Node::constant(2));
    let errors = compile(&node).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.0[0].node, node);
    assert_eq!(errors.0[0].error.kind(), "UnsupportedBinaryOperator");
}

#[test]
fn test_missing_member_single_diagnostic() {
    let missing = Node::target_member("Name").member("Nickname");
    let node = Node::binary(BinaryToken::ADD, missing.clone(), Node::constant(1));
    let errors = compile(&node).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.0[0].node, missing);
    assert_eq!(errors.0[0].error.kind(), "MemberNotFound");
}

#[test]
fn test_try_set_static_property() {
    let compiled = compile(&Node::target_member("Name")).unwrap();
    let target = ada();
    compiled.try_set(&target, &[], Value::str("Augusta"), None).unwrap();
    assert_eq!(compiled.invoke(&target, &[], None).unwrap(), Value::str("Augusta"));
}

#[test]
fn test_try_set_dynamic_member() {
    let compiler = CompilerOptions::default().to_compiler(fixture_services());
    let compiled = compiler
        .compile(&Node::target_member("Name"), &Metadata::new())
        .unwrap();
    let target = bob();
    compiled.try_set(&target, &[], Value::str("Robert"), None).unwrap();
    assert_eq!(compiled.invoke(&target, &[], None).unwrap(), Value::str("Robert"));
}

#[test]
fn test_try_set_read_only() {
    let age = compile(&Node::target_member("Age")).unwrap();
    assert_eq!(
        age.try_set(&ada(), &[], Value::Int(1), None),
        Err(InvokeError::NotAssignable)
    );
    let sum = compile(&Node::binary(
        BinaryToken::ADD,
        Node::target_member("Age"),
        Node::constant(1),
    ))
    .unwrap();
    assert_eq!(
        sum.try_set(&ada(), &[], Value::Int(1), None),
        Err(InvokeError::NotAssignable)
    );
}

#[test]
fn test_dynamic_member_follows_runtime_type() {
    let node = Node::binding(0, "value").member("Length");
    let compiled = compile(&node).unwrap();
    assert_eq!(compiled.result_type(), BType::Object);
    let length = |v: Value| compiled.invoke(&Value::Null, &[v], None);
    assert_eq!(length(Value::str("abc")).unwrap(), Value::Int(3));
    let items = ArrayValue::new(BType::Int, vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(length(items).unwrap(), Value::Int(2));
    assert_eq!(length(Value::str("hello")).unwrap(), Value::Int(5));
    assert!(matches!(
        length(ada()),
        Err(InvokeError::InvalidBindingMember { .. })
    ));
    assert!(matches!(
        length(Value::Null),
        Err(InvokeError::NullReference { .. })
    ));
}

#[test]
fn test_dynamic_call_follows_runtime_type() {
    let node = Node::binding(0, "value").call("Substring", vec![Node::constant(1)]);
    let compiled = compile(&node).unwrap();
    let call = |v: Value| compiled.invoke(&Value::Null, &[v], None);
    assert_eq!(call(Value::str("abc")).unwrap(), Value::str("bc"));
    assert_eq!(call(Value::str("xyz")).unwrap(), Value::str("yz"));
    assert!(matches!(
        call(Value::Int(4)),
        Err(InvokeError::InvalidBindingMember { .. })
    ));
}

#[test]
fn test_missing_argument() {
    let compiled = compile(&Node::typed_binding(1, "y", BType::Int)).unwrap();
    assert_eq!(
        compiled.invoke(&Value::Null, &[Value::Int(1)], None),
        Err(InvokeError::MissingArgument { index: 1 })
    );
}

#[test]
fn test_synchronized_compiler_is_reentrant() {
    let root = Arc::new(ReentrantMutex::new(()));
    let compiler = CompilerOptions {
        sync_root: Some(root.clone()),
        ..Default::default()
    }
    .to_compiler(fixture_services());
    let _held = root.lock();
    let compiled = compiler
        .compile(&Node::target_member("Age"), &person_metadata())
        .unwrap();
    assert_eq!(compiled.invoke(&ada(), &[], None).unwrap(), Value::Int(36));
}

#[test]
fn test_components_are_ordered() {
    let compiled = compile(&Node::constant(1)).unwrap();
    let priorities: Vec<_> = compiled.components().iter().map(|c| c.priority()).collect();
    let mut sorted = priorities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(priorities, sorted);
}

#[test]
fn test_metadata_parameter_is_supplied() {
    let node = Node::target_call("Label", vec![Node::constant(3)]);
    let md = person_metadata().with("culture", "en");
    let compiled = CompilerOptions::default()
        .to_compiler(fixture_services())
        .compile(&node, &md)
        .unwrap();
    assert_eq!(compiled.invoke(&ada(), &[], None).unwrap(), Value::str("en:3"));
    let over = Metadata::new().with("culture", "fr");
    assert_eq!(
        compiled.invoke(&ada(), &[], Some(&over)).unwrap(),
        Value::str("fr:3")
    );
}

#[test]
fn test_cached_diagnostics_reference_caller_nodes() {
    let cache = ExpressionCache::new(Counting::new());
    let missing = Node::bound_value(0, "person.nick", BType::String, "Ada").member("Nope");
    let node = Node::binary(BinaryToken::ADD, missing.clone(), Node::constant(1));
    let errors = cache.compile(&node, &Metadata::new()).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(Arc::ptr_eq(&errors.0[0].node, &missing));
    assert_eq!(errors.0[0].error.kind(), "MemberNotFound");
}

#[test]
fn test_lambda_body_diagnostic_is_surfaced() {
    let body = Node::parameter("t").member("Nope");
    let lambda = Node::lambda(&["t"], body.clone());
    let node = Node::target_member("Tags").call("Select", vec![lambda]);
    let errors = compile(&node).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.0[0].node, body);
    assert_eq!(errors.0[0].error.kind(), "MemberNotFound");
}
