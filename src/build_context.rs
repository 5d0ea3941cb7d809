use crate::btype::{BType, DelegateSpec};
use crate::builders::{BuilderSet, Next};
use crate::bvalue::Metadata;
use crate::compile_err::{CompilationError, Diagnostic};
use crate::dynamic::RuntimeMembers;
use crate::host_expr::HostExpr;
use crate::node::NodeRef;
use crate::services::Services;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Mutable state of a single compilation.
pub struct BuildContext {
    builders: Arc<BuilderSet>,
    metadata: Arc<Metadata>,
    target_type: BType,
    expressions: HashMap<NodeRef, Vec<HostExpr>>,
    errors: Vec<Diagnostic>,
    lambda_hint: Option<Arc<DelegateSpec>>,
    optimizing: bool,
}

impl BuildContext {
    pub(crate) fn new(builders: Arc<BuilderSet>, metadata: Arc<Metadata>) -> Self {
        let target_type = metadata.target_type().cloned().unwrap_or(BType::Object);
        Self {
            builders,
            metadata,
            target_type,
            expressions: HashMap::new(),
            errors: vec![],
            lambda_hint: None,
            optimizing: false,
        }
    }

    /// a context that resumes a compilation with some nodes already mapped
    pub(crate) fn with_bindings(
        builders: Arc<BuilderSet>,
        metadata: Arc<Metadata>,
        target_type: BType,
        bindings: &[(NodeRef, HostExpr)],
    ) -> Self {
        let mut ret = Self::new(builders, metadata);
        ret.target_type = target_type;
        for (node, expr) in bindings {
            ret.push_expression(node.clone(), expr.clone());
        }
        ret
    }

    pub fn build(&mut self, node: &NodeRef) -> Option<HostExpr> {
        if let Some(expr) = self.expression(node) {
            return Some(expr.clone());
        }
        let builders = self.builders.clone();
        let checkpoint = self.checkpoint();
        let ret = Next::new(&builders).run(self, node);
        if ret.is_none() && self.checkpoint() == checkpoint {
            self.report(node, CompilationError::CannotBuild { kind: node.kind() });
        }
        ret
    }

    /// builds a lambda node against the delegate type it is expected to produce
    pub(crate) fn build_lambda(&mut self, node: &NodeRef, hint: Arc<DelegateSpec>) -> Option<HostExpr> {
        let previous = self.lambda_hint.replace(hint);
        let ret = self.build(node);
        self.lambda_hint = previous;
        ret
    }

    pub fn services(&self) -> &Services {
        &self.builders.services
    }

    pub(crate) fn builders(&self) -> &Arc<BuilderSet> {
        &self.builders
    }

    pub(crate) fn runtime_members(&self) -> &Arc<RuntimeMembers> {
        &self.builders.runtime
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    pub fn target_type(&self) -> &BType {
        &self.target_type
    }

    pub fn target_expr(&self) -> HostExpr {
        HostExpr::Target(self.target_type.clone())
    }

    pub fn report(&mut self, node: &NodeRef, error: CompilationError) {
        trace!(node = %node, error = %error, "diagnostic reported");
        self.errors.push(Diagnostic {
            node: node.clone(),
            error,
        })
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub(crate) fn take_errors(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.errors)
    }

    pub(crate) fn checkpoint(&self) -> usize {
        self.errors.len()
    }

    /// discards diagnostics reported since `checkpoint`
    pub(crate) fn rollback(&mut self, checkpoint: usize) {
        self.errors.truncate(checkpoint)
    }

    /// removes and returns the diagnostics reported since `checkpoint`
    pub(crate) fn split_off(&mut self, checkpoint: usize) -> Vec<Diagnostic> {
        self.errors.split_off(checkpoint.min(self.errors.len()))
    }

    pub(crate) fn restore(&mut self, diagnostics: Vec<Diagnostic>) {
        self.errors.extend(diagnostics)
    }

    pub fn expression(&self, node: &NodeRef) -> Option<&HostExpr> {
        self.expressions.get(node).and_then(|stack| stack.last())
    }

    pub fn push_expression(&mut self, node: NodeRef, expr: HostExpr) {
        self.expressions.entry(node).or_default().push(expr)
    }

    pub fn pop_expression(&mut self, node: &NodeRef) {
        if let Some(stack) = self.expressions.get_mut(node) {
            stack.pop();
            if stack.is_empty() {
                self.expressions.remove(node);
            }
        }
    }

    /// runs `f` with `bindings` substituted, removing them again once `f` returns
    pub fn with_expressions<R>(
        &mut self,
        bindings: &[(NodeRef, HostExpr)],
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        for (node, expr) in bindings {
            self.push_expression(node.clone(), expr.clone());
        }
        let ret = f(self);
        for (node, _) in bindings.iter().rev() {
            self.pop_expression(node);
        }
        ret
    }

    /// the current mapping of every substituted node
    pub(crate) fn bindings(&self) -> Vec<(NodeRef, HostExpr)> {
        self.expressions
            .iter()
            .filter_map(|(node, stack)| Some((node.clone(), stack.last()?.clone())))
            .collect()
    }

    pub(crate) fn take_lambda_hint(&mut self) -> Option<Arc<DelegateSpec>> {
        self.lambda_hint.take()
    }

    pub(crate) fn is_optimizing(&self) -> bool {
        self.optimizing
    }

    pub(crate) fn set_optimizing(&mut self, optimizing: bool) {
        self.optimizing = optimizing
    }
}
