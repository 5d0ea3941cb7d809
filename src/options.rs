use crate::cache::ExpressionCache;
use crate::compiler::{Compiler, ExpressionCompiler, SynchronizedCompiler};
use crate::services::Services;
use derivative::Derivative;
use parking_lot::ReentrantMutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeLimits {
    /// maximum nesting of method and delegate calls during a single invocation
    pub depth_limit: Option<usize>,
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct CompilerOptions {
    pub optimize: bool,
    pub cache: bool,
    #[derivative(Debug = "ignore")]
    pub sync_root: Option<Arc<ReentrantMutex<()>>>,
    pub limits: InvokeLimits,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            cache: true,
            sync_root: None,
            limits: InvokeLimits::default(),
        }
    }
}

impl CompilerOptions {
    /// assembles the base compiler and the decorators these options ask for
    pub fn to_compiler(&self, services: Services) -> Arc<dyn ExpressionCompiler> {
        let mut compiler = Compiler::new(services).with_limits(self.limits);
        if self.optimize {
            compiler = compiler.with_optimizer();
        }
        let mut ret: Arc<dyn ExpressionCompiler> = Arc::new(compiler);
        if self.cache {
            ret = Arc::new(ExpressionCache::new(ret));
        }
        if let Some(root) = &self.sync_root {
            ret = Arc::new(SynchronizedCompiler::new(ret, root.clone()));
        }
        ret
    }
}
