use crate::btype::{BType, Bind, Conversion};
use crate::build_context::BuildContext;
use crate::bvalue::Value;
use crate::compile_err::{CompilationError, Diagnostic};
use crate::host_expr::HostExpr;
use crate::members::{MemberDescriptor, ParamSpec};
use crate::node::{Node, NodeRef};
use either::Either;
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::trace;

pub(crate) const EXACT_WEIGHT: f32 = 0.0;
pub(crate) const NOT_EXACT_WEIGHT: f32 = 1.0;
pub(crate) const BOX_WEIGHT: f32 = 1.1;
pub(crate) const EXTENSION_WEIGHT: f32 = 100.0;
pub(crate) const PARAMS_WEIGHT: f32 = 100.0;
pub(crate) const UNSAFE_CAST_WEIGHT: f32 = 10_000.0;

/// A built argument, or a lambda that can only be built once its parameter type is known.
pub(crate) type ArgExpr = Either<HostExpr, NodeRef>;

#[derive(Debug, Clone)]
pub(crate) enum CandidateFailure {
    NotAMethod,
    NoReceiver,
    ArgumentCount { min: usize, max: Option<usize>, actual: usize },
    TypeArgumentCount { expected: usize, actual: usize },
    Incompatible { index: usize, from: BType, to: BType },
    Inference { generic: Arc<str> },
    Lambda { index: usize },
    LambdaArity { node: NodeRef, expected: usize, actual: usize },
    /// the lambda body failed to build, with the diagnostics it reported
    LambdaBody { index: usize, diagnostics: Vec<Diagnostic> },
    UnsafeCast,
}

impl Display for CandidateFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateFailure::NotAMethod => write!(f, "not a method"),
            CandidateFailure::NoReceiver => write!(f, "extension method requires a receiver"),
            CandidateFailure::ArgumentCount { min, max, actual } => match max {
                Some(max) => write!(f, "expected {min} to {max} arguments, got {actual}"),
                None => write!(f, "expected at least {min} arguments, got {actual}"),
            },
            CandidateFailure::TypeArgumentCount { expected, actual } => {
                write!(f, "expected {expected} type arguments, got {actual}")
            }
            CandidateFailure::Incompatible { index, from, to } => {
                write!(f, "argument {index} of type {from} is not compatible with {to}")
            }
            CandidateFailure::Inference { generic } => write!(f, "cannot infer {generic}"),
            CandidateFailure::Lambda { index } => {
                write!(f, "lambda argument {index} does not match the parameter")
            }
            CandidateFailure::LambdaArity { expected, actual, .. } => {
                write!(f, "lambda expected to have {expected} parameters, got {actual}")
            }
            CandidateFailure::LambdaBody { index, diagnostics } => write!(
                f,
                "lambda argument {index} failed to build: {}",
                diagnostics.iter().join("; ")
            ),
            CandidateFailure::UnsafeCast => write!(f, "requires an unsafe cast"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct MethodData {
    pub member: Arc<MemberDescriptor>,
    /// declared parameters with every generic resolved
    pub params: Vec<ParamSpec>,
    /// explicit arguments, extension receiver first
    pub args: Vec<HostExpr>,
    pub type_args: Vec<BType>,
    pub ret: BType,
    pub expanded: bool,
    pub weight: f32,
    pub usage: usize,
    pub has_lambda: bool,
    pub is_extension: bool,
    pub has_params_array: bool,
}

impl MethodData {
    fn is_better_than(&self, other: &MethodData) -> bool {
        if self.weight != other.weight {
            return self.weight < other.weight;
        }
        if self.usage != other.usage {
            return self.usage > other.usage;
        }
        if self.has_params_array != other.has_params_array {
            return !self.has_params_array;
        }
        if self.is_extension != other.is_extension {
            return !self.is_extension;
        }
        false
    }
}

pub(crate) struct Resolution {
    pub best: Option<MethodData>,
    pub failures: Vec<(Arc<MemberDescriptor>, CandidateFailure)>,
}

impl Resolution {
    /// the diagnostics explaining why no candidate was selected for the call at `node`
    ///
    /// A single candidate rejected over its lambda argument reports the lambda's own problem.
    pub(crate) fn into_diagnostics(
        self,
        node: &NodeRef,
        owner: &BType,
        name: &str,
        args: &[ArgExpr],
    ) -> Vec<Diagnostic> {
        match self.failures.as_slice() {
            [(_, CandidateFailure::LambdaBody { diagnostics, .. })] if !diagnostics.is_empty() => {
                return diagnostics.clone();
            }
            [(_, CandidateFailure::LambdaArity { node: lambda, expected, actual })] => {
                return vec![Diagnostic {
                    node: lambda.clone(),
                    error: CompilationError::LambdaParameterCountMismatch {
                        expected: *expected,
                        actual: *actual,
                    },
                }];
            }
            _ => {}
        }
        vec![Diagnostic {
            node: node.clone(),
            error: self.into_error(owner, name, args),
        }]
    }

    fn into_error(self, owner: &BType, name: &str, args: &[ArgExpr]) -> CompilationError {
        if let [(_, CandidateFailure::Inference { generic })] = self.failures.as_slice() {
            return CompilationError::TypeInferenceFailed {
                name: name.to_string(),
                generic: generic.to_string(),
            };
        }
        CompilationError::NoOverload {
            owner: owner.clone(),
            name: name.to_string(),
            arg_types: args
                .iter()
                .map(|a| match a {
                    Either::Left(e) if e.is_null_constant() => "null".to_string(),
                    Either::Left(e) => e.ty().to_string(),
                    Either::Right(_) => "lambda".to_string(),
                })
                .collect(),
            failures: self
                .failures
                .iter()
                .map(|(member, failure)| format!("{member}: {failure}"))
                .collect(),
        }
    }
}

fn arg_weight(arg: &HostExpr, param: &BType) -> Option<f32> {
    if arg.is_null_constant() {
        return param.is_nullable().then_some(NOT_EXACT_WEIGHT);
    }
    Some(match arg.ty().conversion_to(param)? {
        Conversion::Identity => EXACT_WEIGHT,
        Conversion::Implicit => NOT_EXACT_WEIGHT,
        Conversion::Boxing => BOX_WEIGHT,
        Conversion::Unsafe => UNSAFE_CAST_WEIGHT,
    })
}

/// the parameter type the argument at `index` is matched against
fn param_type<'p>(params: &[&'p ParamSpec], index: usize, expanded: bool) -> Option<&'p BType> {
    let last = params.len().checked_sub(1)?;
    if expanded && index >= last {
        params[last].ty.element_type()
    } else {
        params.get(index).map(|p| &p.ty)
    }
}

fn lambda_arity(node: &NodeRef) -> usize {
    match node.as_ref() {
        Node::Lambda { parameters, .. } => parameters.len(),
        _ => 0,
    }
}

fn try_candidate(
    ctx: &mut BuildContext,
    member: &Arc<MemberDescriptor>,
    target: Option<&HostExpr>,
    type_args: &[BType],
    args: &[ArgExpr],
) -> Result<MethodData, CandidateFailure> {
    let spec = member.method().ok_or(CandidateFailure::NotAMethod)?;
    let args: Vec<ArgExpr> = if spec.is_extension {
        let receiver = target.ok_or(CandidateFailure::NoReceiver)?;
        std::iter::once(Either::Left(receiver.clone()))
            .chain(args.iter().cloned())
            .collect()
    } else {
        args.to_vec()
    };
    let params: Vec<&ParamSpec> = spec.params.iter().filter(|p| !p.is_metadata()).collect();
    let has_params_array = params.last().map_or(false, |p| p.is_params);

    let required = params
        .iter()
        .filter(|p| p.default.is_none() && !p.is_params)
        .count();
    let max = (!has_params_array).then_some(params.len());
    if args.len() < required || max.map_or(false, |max| args.len() > max) {
        return Err(CandidateFailure::ArgumentCount {
            min: required,
            max,
            actual: args.len(),
        });
    }

    let mut bind = if type_args.is_empty() {
        Bind::new()
    } else {
        if type_args.len() != spec.generic_params.len() {
            return Err(CandidateFailure::TypeArgumentCount {
                expected: spec.generic_params.len(),
                actual: type_args.len(),
            });
        }
        Bind::from_iter(spec.generic_params.iter().cloned().zip(type_args.iter().cloned()))
    };

    // an array passed in the params position is passed as is
    let expanded = has_params_array
        && !(args.len() == params.len()
            && match args.last() {
                Some(Either::Left(e)) => {
                    e.is_null_constant()
                        || params[params.len() - 1]
                            .ty
                            .resolve_bind(&bind)
                            .bind_in_assignment(&e.ty())
                            .is_some()
                }
                _ => false,
            });

    for (index, arg) in args.iter().enumerate() {
        let Either::Left(expr) = arg else { continue };
        if expr.is_null_constant() {
            continue;
        }
        let param = param_type(&params, index, expanded)
            .ok_or(CandidateFailure::ArgumentCount {
                min: required,
                max,
                actual: args.len(),
            })?
            .resolve_bind(&bind);
        let arg_bind = param
            .bind_in_assignment(&expr.ty())
            .ok_or_else(|| CandidateFailure::Incompatible {
                index,
                from: expr.ty(),
                to: param.clone(),
            })?;
        bind = bind.mix(&arg_bind).ok_or_else(|| CandidateFailure::Incompatible {
            index,
            from: expr.ty(),
            to: param.clone(),
        })?;
    }

    let mut built = Vec::with_capacity(args.len());
    let mut has_lambda = false;
    for (index, arg) in args.iter().enumerate() {
        match arg {
            Either::Left(expr) => built.push(expr.clone()),
            Either::Right(node) => {
                has_lambda = true;
                let param = param_type(&params, index, expanded)
                    .map(|p| p.resolve_bind(&bind))
                    .ok_or(CandidateFailure::Lambda { index })?;
                let BType::Delegate(delegate) = &param else {
                    return Err(CandidateFailure::Lambda { index });
                };
                if delegate.params.len() != lambda_arity(node) {
                    return Err(CandidateFailure::LambdaArity {
                        node: node.clone(),
                        expected: delegate.params.len(),
                        actual: lambda_arity(node),
                    });
                }
                if let Some(generic) = delegate.params.iter().find(|p| p.has_generics()) {
                    return Err(CandidateFailure::Inference {
                        generic: match generic {
                            BType::Generic(name) => name.clone(),
                            other => other.to_string().into(),
                        },
                    });
                }
                let checkpoint = ctx.checkpoint();
                let lambda = ctx.build_lambda(node, delegate.clone());
                let lambda = match lambda {
                    Some(lambda) if ctx.checkpoint() == checkpoint => lambda,
                    _ => {
                        let diagnostics = ctx.split_off(checkpoint);
                        return Err(CandidateFailure::LambdaBody { index, diagnostics });
                    }
                };
                let lambda_bind = param
                    .bind_in_assignment(&lambda.ty())
                    .ok_or(CandidateFailure::Lambda { index })?;
                bind = bind
                    .mix(&lambda_bind)
                    .ok_or(CandidateFailure::Lambda { index })?;
                built.push(lambda);
            }
        }
    }

    if let Some(generic) = spec.generic_params.iter().find(|g| bind.get(g).is_none()) {
        return Err(CandidateFailure::Inference {
            generic: generic.clone(),
        });
    }

    let resolved: Vec<ParamSpec> = spec
        .params
        .iter()
        .map(|p| ParamSpec {
            ty: p.ty.resolve_bind(&bind),
            ..p.clone()
        })
        .collect();
    let effective: Vec<&ParamSpec> = resolved.iter().filter(|p| !p.is_metadata()).collect();

    let mut weight = 0.0;
    for (index, arg) in built.iter().enumerate() {
        let param = param_type(&effective, index, expanded).ok_or(CandidateFailure::Lambda { index })?;
        weight += arg_weight(arg, param).ok_or_else(|| CandidateFailure::Incompatible {
            index,
            from: arg.ty(),
            to: param.clone(),
        })?;
    }
    if spec.is_extension {
        weight += EXTENSION_WEIGHT;
    }
    if expanded {
        weight += PARAMS_WEIGHT;
    }
    let usage = if expanded {
        built.len().min(effective.len() - 1)
    } else {
        built.len()
    };

    Ok(MethodData {
        member: member.clone(),
        type_args: spec
            .generic_params
            .iter()
            .map(|g| bind.get(g).cloned().unwrap_or(BType::Object))
            .collect(),
        ret: spec.ret.resolve_bind(&bind),
        params: resolved,
        args: built,
        expanded,
        weight,
        usage,
        has_lambda,
        is_extension: spec.is_extension,
        has_params_array,
    })
}

/// selects the best candidate for the given arguments
pub(crate) fn resolve(
    ctx: &mut BuildContext,
    target: Option<&HostExpr>,
    candidates: &[Arc<MemberDescriptor>],
    type_args: &[BType],
    args: &[ArgExpr],
) -> Resolution {
    let mut best: Option<MethodData> = None;
    let mut failures = vec![];
    for candidate in candidates {
        match try_candidate(ctx, candidate, target, type_args, args) {
            Ok(data) => {
                trace!(candidate = %candidate, weight = data.weight, usage = data.usage, "viable overload");
                if best.as_ref().map_or(true, |b| data.is_better_than(b)) {
                    best = Some(data);
                }
            }
            Err(failure) => {
                trace!(candidate = %candidate, %failure, "overload rejected");
                failures.push((candidate.clone(), failure))
            }
        }
    }
    if let Some(b) = &best {
        if b.weight >= UNSAFE_CAST_WEIGHT && !b.has_lambda {
            failures.push((b.member.clone(), CandidateFailure::UnsafeCast));
            best = None;
        }
    }
    Resolution { best, failures }
}

/// the call expression for a selected candidate, with every parameter supplied
pub(crate) fn make_call(data: MethodData, target: Option<HostExpr>) -> HostExpr {
    let mut explicit = data.args.into_iter();
    let mut args = Vec::with_capacity(data.params.len());
    for param in data.params.iter() {
        if param.is_metadata() {
            args.push(HostExpr::MetadataRef);
            continue;
        }
        if param.is_params {
            let element_type = param.ty.element_type().cloned().unwrap_or(BType::Object);
            if data.expanded {
                let items = explicit
                    .by_ref()
                    .map(|a| a.convert_to(&element_type))
                    .collect_vec();
                args.push(HostExpr::NewArray {
                    element_type,
                    items,
                });
                continue;
            }
            match explicit.next() {
                Some(a) => args.push(a.convert_to(&param.ty)),
                None => args.push(HostExpr::NewArray {
                    element_type,
                    items: vec![],
                }),
            }
            continue;
        }
        match (explicit.next(), &param.default) {
            (Some(a), _) => args.push(a.convert_to(&param.ty)),
            (None, Some(default)) => {
                args.push(HostExpr::Constant(default.clone(), param.ty.clone()))
            }
            // arity was checked when the candidate was accepted
            (None, None) => args.push(HostExpr::Constant(Value::Null, param.ty.clone())),
        }
    }
    let target = if data.is_extension || data.member.is_static {
        None
    } else {
        target.map(Box::new)
    };
    HostExpr::Call {
        target,
        method: data.member,
        args,
        type_args: data.type_args,
        ty: data.ret,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{default_builders, BuilderSet};
    use crate::bvalue::{ArrayValue, Metadata};
    use crate::members::{MemberRegistry, MethodSpec};
    use crate::services::{Services, TypeTable};

    fn returning(params: Vec<ParamSpec>, text: &'static str) -> MethodSpec {
        MethodSpec::new(params, BType::String, move |_| Ok(Value::str(text)))
    }

    fn context(registry: MemberRegistry) -> BuildContext {
        let services = Services::new(Arc::new(registry), Arc::new(TypeTable::new()));
        BuildContext::new(
            Arc::new(BuilderSet::new(services, default_builders())),
            Arc::new(Metadata::new()),
        )
    }

    fn int_array(items: &[i64]) -> ArgExpr {
        Either::Left(HostExpr::Constant(
            ArrayValue::new(BType::Int, items.iter().map(|i| Value::Int(*i)).collect()),
            BType::array(BType::Int),
        ))
    }

    fn int(i: i64) -> ArgExpr {
        Either::Left(HostExpr::Constant(Value::Int(i), BType::Int))
    }

    fn data(member: &Arc<MemberDescriptor>, weight: f32, usage: usize) -> MethodData {
        MethodData {
            member: member.clone(),
            params: vec![],
            args: vec![],
            type_args: vec![],
            ret: BType::String,
            expanded: false,
            weight,
            usage,
            has_lambda: false,
            is_extension: false,
            has_params_array: false,
        }
    }

    #[test]
    fn test_weights_order() {
        let int_arg = HostExpr::Constant(Value::Int(1), BType::Int);
        assert_eq!(arg_weight(&int_arg, &BType::Int), Some(EXACT_WEIGHT));
        assert_eq!(arg_weight(&int_arg, &BType::Double), Some(NOT_EXACT_WEIGHT));
        assert_eq!(arg_weight(&int_arg, &BType::Object), Some(BOX_WEIGHT));
        assert_eq!(arg_weight(&int_arg, &BType::String), None);
        let object_arg = HostExpr::Argument {
            index: 0,
            ty: BType::Object,
        };
        assert_eq!(arg_weight(&object_arg, &BType::Int), Some(UNSAFE_CAST_WEIGHT));
        let null = HostExpr::Constant(Value::Null, BType::Object);
        assert_eq!(arg_weight(&null, &BType::String), Some(NOT_EXACT_WEIGHT));
        assert_eq!(arg_weight(&null, &BType::Int), None);
        assert!(BOX_WEIGHT < EXTENSION_WEIGHT && EXTENSION_WEIGHT < UNSAFE_CAST_WEIGHT);
    }

    #[test]
    fn test_array_argument_prefers_plain_over_params() {
        for params_first in [false, true] {
            let registry = MemberRegistry::new();
            let plain = || returning(vec![ParamSpec::new("values", BType::array(BType::Int))], "plain");
            let packed = || returning(vec![ParamSpec::params("values", BType::Int)], "params");
            let candidates = if params_first {
                vec![
                    registry.add_static_method(BType::Object, "F", packed()),
                    registry.add_static_method(BType::Object, "F", plain()),
                ]
            } else {
                vec![
                    registry.add_static_method(BType::Object, "F", plain()),
                    registry.add_static_method(BType::Object, "F", packed()),
                ]
            };
            let mut ctx = context(registry);
            let best = resolve(&mut ctx, None, &candidates, &[], &[int_array(&[1, 2])])
                .best
                .unwrap();
            assert!(!best.has_params_array);
            assert!(!best.expanded);
            assert_eq!(best.weight, EXACT_WEIGHT);
        }
    }

    #[test]
    fn test_spread_arguments_need_params() {
        let registry = MemberRegistry::new();
        let candidates = vec![
            registry.add_static_method(
                BType::Object,
                "F",
                returning(vec![ParamSpec::new("values", BType::array(BType::Int))], "plain"),
            ),
            registry.add_static_method(
                BType::Object,
                "F",
                returning(vec![ParamSpec::params("values", BType::Int)], "params"),
            ),
        ];
        let mut ctx = context(registry);
        let best = resolve(&mut ctx, None, &candidates, &[], &[int(1), int(2)])
            .best
            .unwrap();
        assert!(best.expanded);
        assert_eq!(best.weight, PARAMS_WEIGHT);
    }

    #[test]
    fn test_tie_breaks() {
        let registry = MemberRegistry::new();
        let member = registry.add_static_method(BType::Object, "F", returning(vec![], "f"));
        let base = data(&member, 100.0, 1);

        let params = MethodData {
            has_params_array: true,
            ..data(&member, 100.0, 1)
        };
        assert!(base.is_better_than(&params));
        assert!(!params.is_better_than(&base));

        let extension = MethodData {
            is_extension: true,
            ..data(&member, 100.0, 1)
        };
        assert!(base.is_better_than(&extension));
        assert!(!extension.is_better_than(&base));

        // params is weighed before the extension flag
        let params_instance = MethodData {
            has_params_array: true,
            ..data(&member, 100.0, 1)
        };
        assert!(extension.is_better_than(&params_instance));

        // usage and weight come first
        let more_used = MethodData {
            has_params_array: true,
            is_extension: true,
            ..data(&member, 100.0, 2)
        };
        assert!(more_used.is_better_than(&base));
        assert!(data(&member, 1.0, 0).is_better_than(&more_used));

        // an exact tie keeps the first registered candidate
        assert!(!base.is_better_than(&data(&member, 100.0, 1)));
    }
}
