use crate::btype::BType;
use crate::build_context::BuildContext;
use crate::builders::BuilderSet;
use crate::bvalue::{Metadata, Value};
use crate::host_expr::{HostExpr, Local, Scope};
use crate::invoke_err::InvokeError;
use crate::members::{MemberCategory, MemberDescriptor, MemberFlags, MemberProvider};
use crate::node::NodeRef;
use crate::overload::{self, ArgExpr};
use dashmap::DashMap;
use either::Either;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Accessors looked up by the runtime type of a value, memoized per type.
pub struct RuntimeMembers {
    members: Arc<dyn MemberProvider>,
    accessors: DashMap<(BType, Arc<str>), Option<Arc<MemberDescriptor>>>,
}

impl RuntimeMembers {
    pub(crate) fn new(members: Arc<dyn MemberProvider>) -> Self {
        Self {
            members,
            accessors: DashMap::new(),
        }
    }

    pub(crate) fn accessor(
        &self,
        ty: &BType,
        name: &Arc<str>,
        metadata: &Metadata,
    ) -> Option<Arc<MemberDescriptor>> {
        let key = (ty.clone(), name.clone());
        if let Some(found) = self.accessors.get(&key) {
            return found.clone();
        }
        let found = self.members.try_get_member(
            ty,
            MemberCategory::Accessor,
            MemberFlags::INSTANCE,
            name,
            metadata,
        );
        self.accessors.insert(key, found.clone());
        found
    }

    pub(crate) fn clear(&self) {
        self.accessors.clear()
    }
}

/// A member access whose owner is only known once the target is evaluated.
pub struct DynamicMember {
    target: HostExpr,
    name: Arc<str>,
    runtime: Arc<RuntimeMembers>,
}

impl DynamicMember {
    pub(crate) fn new(target: HostExpr, name: Arc<str>, runtime: Arc<RuntimeMembers>) -> Self {
        Self {
            target,
            name,
            runtime,
        }
    }

    pub(crate) fn target(&self) -> &HostExpr {
        &self.target
    }

    pub(crate) fn map_target(&self, f: &mut impl FnMut(HostExpr) -> HostExpr) -> DynamicMember {
        DynamicMember {
            target: f(self.target.clone()),
            name: self.name.clone(),
            runtime: self.runtime.clone(),
        }
    }

    fn resolve(&self, scope: &Scope) -> Result<(Value, Arc<MemberDescriptor>), InvokeError> {
        let target = self.target.eval(scope)?;
        if target.is_null() {
            return Err(InvokeError::NullReference {
                member: self.name.to_string(),
            });
        }
        let ty = target.runtime_type();
        let member = self
            .runtime
            .accessor(&ty, &self.name, scope.metadata())
            .ok_or_else(|| InvokeError::InvalidBindingMember {
                type_name: ty.to_string(),
                member: self.name.to_string(),
            })?;
        Ok((target, member))
    }

    pub(crate) fn eval(&self, scope: &Scope) -> Result<Value, InvokeError> {
        let (target, member) = self.resolve(scope)?;
        member.get(&target)
    }

    pub(crate) fn set(&self, scope: &Scope, value: Value) -> Result<(), InvokeError> {
        let (target, member) = self.resolve(scope)?;
        member.set(&target, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ArgShape {
    Typed(BType),
    Null,
    Lambda,
}

/// An overload selected for one combination of runtime argument types.
struct ResolvedCall {
    receiver: Option<Local>,
    args: Vec<Option<Local>>,
    body: HostExpr,
}

type CallKey = (BType, Vec<ArgShape>);

/// A method call re-resolved against the runtime types of its receiver and arguments.
pub struct DynamicInvoker {
    target: Option<HostExpr>,
    static_type: Option<BType>,
    name: Arc<str>,
    type_args: Vec<BType>,
    args: Vec<ArgExpr>,
    builders: Arc<BuilderSet>,
    metadata: Arc<Metadata>,
    target_type: BType,
    bindings: Vec<(NodeRef, HostExpr)>,
    resolved: Mutex<HashMap<CallKey, Option<Arc<ResolvedCall>>>>,
}

impl DynamicInvoker {
    pub(crate) fn new(
        ctx: &BuildContext,
        target: Option<HostExpr>,
        static_type: Option<BType>,
        name: Arc<str>,
        type_args: Vec<BType>,
        args: Vec<ArgExpr>,
    ) -> Self {
        Self {
            target,
            static_type,
            name,
            type_args,
            args,
            builders: ctx.builders().clone(),
            metadata: ctx.metadata().clone(),
            target_type: ctx.target_type().clone(),
            bindings: ctx.bindings(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn built_parts(&self) -> Vec<&HostExpr> {
        self.target
            .iter()
            .chain(self.args.iter().filter_map(|a| a.as_ref().left()))
            .collect()
    }

    pub(crate) fn map_parts(&self, f: &mut impl FnMut(HostExpr) -> HostExpr) -> DynamicInvoker {
        DynamicInvoker {
            target: self.target.clone().map(&mut *f),
            static_type: self.static_type.clone(),
            name: self.name.clone(),
            type_args: self.type_args.clone(),
            args: self
                .args
                .iter()
                .cloned()
                .map(|a| a.map_left(&mut *f))
                .collect(),
            builders: self.builders.clone(),
            metadata: self.metadata.clone(),
            target_type: self.target_type.clone(),
            bindings: self.bindings.clone(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn has_unbuilt_lambdas(&self) -> bool {
        self.args.iter().any(Either::is_right)
    }

    fn resolve(&self, receiver_type: &BType, shapes: &[ArgShape]) -> Option<Arc<ResolvedCall>> {
        let mut ctx = BuildContext::with_bindings(
            self.builders.clone(),
            self.metadata.clone(),
            self.target_type.clone(),
            &self.bindings,
        );
        let receiver = self
            .target
            .as_ref()
            .map(|_| Local::new(receiver_type.clone()));
        let mut locals = Vec::with_capacity(shapes.len());
        let mut args = Vec::with_capacity(shapes.len());
        for (arg, shape) in self.args.iter().zip(shapes) {
            match (arg, shape) {
                (Either::Left(_), ArgShape::Typed(ty)) => {
                    let local = Local::new(ty.clone());
                    args.push(Either::Left(HostExpr::Local(local.clone())));
                    locals.push(Some(local));
                }
                (Either::Left(_), _) => {
                    args.push(Either::Left(HostExpr::Constant(Value::Null, BType::Object)));
                    locals.push(None);
                }
                (Either::Right(node), _) => {
                    args.push(Either::Right(node.clone()));
                    locals.push(None);
                }
            }
        }
        let receiver_expr = receiver.clone().map(HostExpr::Local);
        let flags = if receiver.is_some() {
            MemberFlags::INSTANCE_ALL
        } else {
            MemberFlags::STATIC
        };
        let candidates = self.builders.services.members.try_get_members(
            receiver_type,
            MemberCategory::Method,
            flags,
            &self.name,
            &self.metadata,
        );
        let resolution = overload::resolve(
            &mut ctx,
            receiver_expr.as_ref(),
            &candidates,
            &self.type_args,
            &args,
        );
        let best = resolution.best?;
        debug!(receiver = %receiver_type, member = %best.member, "runtime overload selected");
        Some(Arc::new(ResolvedCall {
            receiver,
            args: locals,
            body: overload::make_call(best, receiver_expr),
        }))
    }

    fn lookup(&self, receiver_type: &BType, shapes: Vec<ArgShape>) -> Option<Arc<ResolvedCall>> {
        let key = (receiver_type.clone(), shapes);
        if let Some(found) = self.resolved.lock().get(&key) {
            trace!(member = %self.name, "runtime overload cache hit");
            return found.clone();
        }
        let found = self.resolve(receiver_type, &key.1);
        self.resolved.lock().insert(key, found.clone());
        found
    }

    pub(crate) fn eval(&self, scope: &Scope) -> Result<Value, InvokeError> {
        let target = match &self.target {
            None => None,
            Some(t) => match t.eval(scope)? {
                Value::Null => {
                    return Err(InvokeError::NullReference {
                        member: self.name.to_string(),
                    })
                }
                v => Some(v),
            },
        };
        let values = self
            .args
            .iter()
            .map(|a| match a {
                Either::Left(e) => e.eval(scope).map(Some),
                Either::Right(_) => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let receiver_type = match (&target, &self.static_type) {
            (Some(t), _) => t.runtime_type(),
            (None, Some(t)) => t.clone(),
            (None, None) => BType::Object,
        };
        let shapes = values
            .iter()
            .map(|v| match v {
                None => ArgShape::Lambda,
                Some(Value::Null) => ArgShape::Null,
                Some(v) => ArgShape::Typed(v.runtime_type()),
            })
            .collect();
        let resolved = self.lookup(&receiver_type, shapes).ok_or_else(|| {
            InvokeError::InvalidBindingMember {
                type_name: receiver_type.to_string(),
                member: self.name.to_string(),
            }
        })?;

        let mut inner = scope.clone();
        if let (Some(local), Some(value)) = (&resolved.receiver, target) {
            inner = inner.with_local(local.id, value);
        }
        for (local, value) in resolved.args.iter().zip(values) {
            if let (Some(local), Some(value)) = (local, value) {
                inner = inner.with_local(local.id, value);
            }
        }
        resolved.body.eval(&inner)
    }
}
