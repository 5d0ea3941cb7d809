use crate::build_context::BuildContext;
use crate::builders::{default_builders, BuildDecorator, BuilderSet, ExpressionBuilder};
use crate::btype::BType;
use crate::bvalue::{Metadata, Value};
use crate::compile_err::{CompilationError, CompileErrors, Diagnostic};
use crate::host_expr::{Frame, HostExpr, Scope};
use crate::invoke_err::InvokeError;
use crate::node::NodeRef;
use crate::optimizer::ExpressionOptimizer;
use crate::options::InvokeLimits;
use crate::services::Services;
use derivative::Derivative;
use parking_lot::ReentrantMutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Compiles binding expression trees into invokable expressions.
pub trait ExpressionCompiler: Send + Sync {
    fn compile(
        &self,
        node: &NodeRef,
        metadata: &Metadata,
    ) -> Result<Arc<CompiledExpression>, CompileErrors>;

    /// discards state derived from `node`, or all derived state if `node` is `None`
    fn invalidate(&self, node: Option<&NodeRef>, metadata: Option<&Metadata>);
}

impl<C: ExpressionCompiler + ?Sized> ExpressionCompiler for Arc<C> {
    fn compile(
        &self,
        node: &NodeRef,
        metadata: &Metadata,
    ) -> Result<Arc<CompiledExpression>, CompileErrors> {
        self.as_ref().compile(node, metadata)
    }

    fn invalidate(&self, node: Option<&NodeRef>, metadata: Option<&Metadata>) {
        self.as_ref().invalidate(node, metadata)
    }
}

/// The base compiler, running the builder chain over a whole tree.
pub struct Compiler {
    builders: Arc<BuilderSet>,
    limits: InvokeLimits,
}

impl Compiler {
    pub fn new(services: Services) -> Self {
        Self {
            builders: Arc::new(BuilderSet::new(services, default_builders())),
            limits: InvokeLimits::default(),
        }
    }

    pub fn with_optimizer(self) -> Self {
        self.add_decorator(Arc::new(ExpressionOptimizer))
    }

    pub fn with_limits(mut self, limits: InvokeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn add_component(mut self, component: Arc<dyn ExpressionBuilder>) -> Self {
        let builders = Arc::make_mut(&mut self.builders);
        builders.components.push(component);
        builders.sort();
        self
    }

    pub fn add_decorator(mut self, decorator: Arc<dyn BuildDecorator>) -> Self {
        Arc::make_mut(&mut self.builders).decorators.push(decorator);
        self
    }
}

impl ExpressionCompiler for Compiler {
    fn compile(
        &self,
        node: &NodeRef,
        metadata: &Metadata,
    ) -> Result<Arc<CompiledExpression>, CompileErrors> {
        debug!(node = %node, "compiling");
        let metadata = Arc::new(metadata.clone());
        let mut ctx = BuildContext::new(self.builders.clone(), metadata.clone());
        let body = ctx.build(node);
        let mut errors = ctx.take_errors();
        match body {
            Some(body) if errors.is_empty() => {
                debug!(node = %node, result_type = %body.ty(), "compiled");
                Ok(Arc::new(CompiledExpression {
                    node: node.clone(),
                    metadata,
                    builders: self.builders.clone(),
                    body,
                    limits: self.limits,
                }))
            }
            _ => {
                if errors.is_empty() {
                    errors.push(Diagnostic {
                        node: node.clone(),
                        error: CompilationError::CannotBuild { kind: node.kind() },
                    });
                }
                debug!(node = %node, diagnostics = errors.len(), "compilation failed");
                Err(CompileErrors(errors))
            }
        }
    }

    fn invalidate(&self, node: Option<&NodeRef>, _metadata: Option<&Metadata>) {
        if node.is_none() {
            debug!("clearing runtime member lookups");
            self.builders.runtime.clear();
        }
    }
}

/// An expression ready to be invoked against any number of targets.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CompiledExpression {
    node: NodeRef,
    metadata: Arc<Metadata>,
    #[derivative(Debug = "ignore")]
    builders: Arc<BuilderSet>,
    body: HostExpr,
    limits: InvokeLimits,
}

impl CompiledExpression {
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// the metadata the expression was compiled with
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn result_type(&self) -> BType {
        self.body.ty()
    }

    /// the builder components, in the order they were consulted
    pub fn components(&self) -> &[Arc<dyn ExpressionBuilder>] {
        &self.builders.components
    }

    fn scope(&self, target: &Value, args: &[Value], metadata: Option<&Metadata>) -> Scope {
        Scope::new(Frame {
            target: target.clone(),
            args: args.to_vec(),
            metadata: metadata.map_or_else(|| self.metadata.clone(), |m| Arc::new(m.clone())),
            converter: self.builders.services.converter.clone(),
            limits: self.limits,
        })
    }

    pub fn invoke(
        &self,
        target: &Value,
        args: &[Value],
        metadata: Option<&Metadata>,
    ) -> Result<Value, InvokeError> {
        let scope = self.scope(target, args, metadata);
        self.body.eval(&scope).map_err(|error| {
            warn!(node = %self.node, %error, "invocation failed");
            error
        })
    }

    /// assigns `value` through the member this expression reads
    pub fn try_set(
        &self,
        target: &Value,
        args: &[Value],
        value: Value,
        metadata: Option<&Metadata>,
    ) -> Result<(), InvokeError> {
        let scope = self.scope(target, args, metadata);
        match &self.body {
            HostExpr::Property {
                target: owner,
                member,
            } if member.accessor().map_or(false, |a| a.setter.is_some()) => {
                let owner = match owner {
                    None => Value::Null,
                    Some(owner) => match owner.eval(&scope)? {
                        Value::Null => {
                            return Err(InvokeError::NullReference {
                                member: member.name.to_string(),
                            })
                        }
                        v => v,
                    },
                };
                let value = scope.convert(value, &member.value_type())?;
                member.set(&owner, value)
            }
            HostExpr::DynamicMember(d) => d.set(&scope, value),
            _ => Err(InvokeError::NotAssignable),
        }
    }
}

/// Serializes every entry point of the wrapped compiler under an external lock.
pub struct SynchronizedCompiler<C> {
    inner: C,
    sync_root: Arc<ReentrantMutex<()>>,
}

impl<C> SynchronizedCompiler<C> {
    pub fn new(inner: C, sync_root: Arc<ReentrantMutex<()>>) -> Self {
        Self { inner, sync_root }
    }
}

impl<C: ExpressionCompiler> ExpressionCompiler for SynchronizedCompiler<C> {
    fn compile(
        &self,
        node: &NodeRef,
        metadata: &Metadata,
    ) -> Result<Arc<CompiledExpression>, CompileErrors> {
        let _lock = self.sync_root.lock();
        self.inner.compile(node, metadata)
    }

    fn invalidate(&self, node: Option<&NodeRef>, metadata: Option<&Metadata>) {
        let _lock = self.sync_root.lock();
        self.inner.invalidate(node, metadata)
    }
}
