use crate::btype::BType;
use crate::bvalue::Value;
use crate::node::{BinaryToken, Node, NodeExt, NodeRef, UnaryToken};
use crate::services::TypeResolver;
use crate::util::str_escapes::apply_escapes;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use strum::IntoStaticStr;

#[derive(Parser)]
#[grammar = "binding.pest"]
pub struct BindingParser;

lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::coalesce_op, Assoc::Right))
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::bit_or_op, Assoc::Left))
        .op(Op::infix(Rule::bit_xor_op, Assoc::Left))
        .op(Op::infix(Rule::bit_and_op, Assoc::Left))
        .op(Op::infix(Rule::eq_op, Assoc::Left) | Op::infix(Rule::ne_op, Assoc::Left))
        .op(Op::infix(Rule::lt_op, Assoc::Left)
            | Op::infix(Rule::gt_op, Assoc::Left)
            | Op::infix(Rule::le_op, Assoc::Left)
            | Op::infix(Rule::ge_op, Assoc::Left))
        .op(Op::infix(Rule::shl_op, Assoc::Left) | Op::infix(Rule::shr_op, Assoc::Left))
        .op(Op::infix(Rule::add_op, Assoc::Left) | Op::infix(Rule::sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_op, Assoc::Left)
            | Op::infix(Rule::div_op, Assoc::Left)
            | Op::infix(Rule::mod_op, Assoc::Left))
        .op(Op::prefix(Rule::neg)
            | Op::prefix(Rule::plus)
            | Op::prefix(Rule::not)
            | Op::prefix(Rule::bit_not));
}

#[derive(Debug, IntoStaticStr)]
pub enum ParseError {
    Syntax(Box<pest::error::Error<Rule>>),
    BadEscapeSequence { sequence: String },
    BadNumber { text: String },
    UnexpectedRule { rule: Rule },
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Syntax(e) => write!(f, "{e}"),
            ParseError::BadEscapeSequence { sequence } => {
                write!(f, "bad escape sequence {sequence}")
            }
            ParseError::BadNumber { text } => write!(f, "bad number literal {text}"),
            ParseError::UnexpectedRule { rule } => write!(f, "unexpected {rule:?}"),
        }
    }
}

impl Error for ParseError {}

fn next<'i>(pairs: &mut Pairs<'i, Rule>) -> Result<Pair<'i, Rule>, ParseError> {
    pairs.next().ok_or(ParseError::UnexpectedRule { rule: Rule::EOI })
}

fn unary_token(op: &Pair<Rule>) -> Result<UnaryToken, ParseError> {
    Ok(match op.as_rule() {
        Rule::neg => UnaryToken::MINUS,
        Rule::plus => UnaryToken::PLUS,
        Rule::not => UnaryToken::NOT,
        Rule::bit_not => UnaryToken::BIT_NOT,
        rule => return Err(ParseError::UnexpectedRule { rule }),
    })
}

fn binary_token(op: &Pair<Rule>) -> Result<BinaryToken, ParseError> {
    Ok(match op.as_rule() {
        Rule::coalesce_op => BinaryToken::NULL_COALESCING,
        Rule::or_op => BinaryToken::OR,
        Rule::and_op => BinaryToken::AND,
        Rule::eq_op => BinaryToken::EQUALITY,
        Rule::ne_op => BinaryToken::NOT_EQUAL,
        Rule::le_op => BinaryToken::LESS_THAN_OR_EQUAL,
        Rule::ge_op => BinaryToken::GREATER_THAN_OR_EQUAL,
        Rule::lt_op => BinaryToken::LESS_THAN,
        Rule::gt_op => BinaryToken::GREATER_THAN,
        Rule::shl_op => BinaryToken::LEFT_SHIFT,
        Rule::shr_op => BinaryToken::RIGHT_SHIFT,
        Rule::bit_or_op => BinaryToken::BIT_OR,
        Rule::bit_xor_op => BinaryToken::EXCLUSIVE_OR,
        Rule::bit_and_op => BinaryToken::BIT_AND,
        Rule::add_op => BinaryToken::ADD,
        Rule::sub_op => BinaryToken::SUBTRACT,
        Rule::mul_op => BinaryToken::MULTIPLY,
        Rule::div_op => BinaryToken::DIVIDE,
        Rule::mod_op => BinaryToken::REMAINDER,
        rule => return Err(ParseError::UnexpectedRule { rule }),
    })
}

struct NodeBuilder<'a> {
    types: &'a dyn TypeResolver,
    binding_types: &'a [BType],
    /// parameters of the enclosing lambdas
    parameters: Vec<Arc<str>>,
}

impl NodeBuilder<'_> {
    fn expression(&mut self, pair: Pair<Rule>) -> Result<NodeRef, ParseError> {
        let inner = next(&mut pair.into_inner())?;
        match inner.as_rule() {
            Rule::lambda => self.lambda(inner),
            Rule::conditional => self.conditional(inner),
            rule => Err(ParseError::UnexpectedRule { rule }),
        }
    }

    fn lambda(&mut self, pair: Pair<Rule>) -> Result<NodeRef, ParseError> {
        let mut inner = pair.into_inner();
        let parameters: Vec<Arc<str>> = next(&mut inner)?
            .into_inner()
            .map(|p| Arc::from(p.as_str()))
            .collect();
        let depth = self.parameters.len();
        self.parameters.extend(parameters.iter().cloned());
        let body = next(&mut inner).and_then(|body| self.expression(body));
        self.parameters.truncate(depth);
        Ok(Arc::new(Node::Lambda {
            parameters,
            body: body?,
        }))
    }

    fn conditional(&mut self, pair: Pair<Rule>) -> Result<NodeRef, ParseError> {
        let mut inner = pair.into_inner();
        let condition = self.operation(next(&mut inner)?)?;
        match (inner.next(), inner.next()) {
            (Some(if_true), Some(if_false)) => Ok(Node::conditional(
                condition,
                self.expression(if_true)?,
                self.expression(if_false)?,
            )),
            _ => Ok(condition),
        }
    }

    fn operation(&mut self, pair: Pair<Rule>) -> Result<NodeRef, ParseError> {
        PRATT
            .map_primary(|primary| self.postfix_expr(primary))
            .map_prefix(|op, operand| Ok(Node::unary(unary_token(&op)?, operand?)))
            .map_infix(|left, op, right| Ok(Node::binary(binary_token(&op)?, left?, right?)))
            .parse(pair.into_inner())
    }

    fn postfix_expr(&mut self, pair: Pair<Rule>) -> Result<NodeRef, ParseError> {
        let mut inner = pair.into_inner();
        let mut node = self.primary(next(&mut inner)?)?;
        for postfix in inner {
            node = match postfix.as_rule() {
                Rule::member_access => self.member_access(node, postfix)?,
                Rule::nc_member_access => self.member_access(node.null_conditional(), postfix)?,
                Rule::index => node.index(self.all(postfix.into_inner())?),
                Rule::nc_index => node.null_conditional().index(self.all(postfix.into_inner())?),
                rule => return Err(ParseError::UnexpectedRule { rule }),
            };
        }
        Ok(node)
    }

    fn all(&mut self, pairs: Pairs<Rule>) -> Result<Vec<NodeRef>, ParseError> {
        pairs.map(|p| self.expression(p)).collect()
    }

    /// the optional type arguments and argument list following a member name
    fn call_parts(
        &mut self,
        parts: Pairs<Rule>,
    ) -> Result<(Vec<Arc<str>>, Option<Vec<NodeRef>>), ParseError> {
        let mut type_args = vec![];
        let mut args = None;
        for part in parts {
            match part.as_rule() {
                Rule::type_args => {
                    type_args = part.into_inner().map(|t| Arc::from(t.as_str())).collect()
                }
                Rule::call_args => args = Some(self.all(part.into_inner())?),
                rule => return Err(ParseError::UnexpectedRule { rule }),
            }
        }
        Ok((type_args, args))
    }

    fn member_access(&mut self, target: NodeRef, pair: Pair<Rule>) -> Result<NodeRef, ParseError> {
        let mut inner = pair.into_inner();
        let name: Arc<str> = next(&mut inner)?.as_str().into();
        let (type_args, args) = self.call_parts(inner)?;
        Ok(Arc::new(match args {
            Some(args) => Node::MethodCall {
                target: Some(target),
                name,
                args,
                type_args,
            },
            None => Node::Member {
                target: Some(target),
                name,
            },
        }))
    }

    fn primary(&mut self, pair: Pair<Rule>) -> Result<NodeRef, ParseError> {
        let bad_number = |pair: &Pair<Rule>| ParseError::BadNumber {
            text: pair.as_str().to_string(),
        };
        match pair.as_rule() {
            Rule::expression => self.expression(pair),
            Rule::null_lit => Ok(Node::constant(Value::Null)),
            Rule::true_lit => Ok(Node::constant(true)),
            Rule::false_lit => Ok(Node::constant(false)),
            Rule::int_lit => {
                let value: i64 = pair.as_str().parse().map_err(|_| bad_number(&pair))?;
                Ok(Node::constant(value))
            }
            Rule::double_lit => {
                let value: f64 = pair.as_str().parse().map_err(|_| bad_number(&pair))?;
                Ok(Node::constant(value))
            }
            Rule::string_lit => {
                let raw = next(&mut pair.into_inner())?;
                Ok(Node::constant(apply_escapes(raw.as_str())?))
            }
            Rule::binding_value => {
                let index: usize = pair.as_str()[1..]
                    .parse()
                    .map_err(|_| bad_number(&pair))?;
                let ty = self
                    .binding_types
                    .get(index)
                    .cloned()
                    .unwrap_or(BType::Object);
                Ok(Node::typed_binding(index, "", ty))
            }
            Rule::target_call => {
                let mut inner = pair.into_inner();
                let name: Arc<str> = next(&mut inner)?.as_str().into();
                let (type_args, args) = self.call_parts(inner)?;
                Ok(Arc::new(Node::MethodCall {
                    target: None,
                    name,
                    args: args.unwrap_or_default(),
                    type_args,
                }))
            }
            Rule::ident => Ok(self.identifier(pair.as_str())),
            rule => Err(ParseError::UnexpectedRule { rule }),
        }
    }

    /// a lambda parameter, a type, or otherwise a member of the invocation target
    fn identifier(&self, name: &str) -> NodeRef {
        if self.parameters.iter().any(|p| p.as_ref() == name) {
            Node::parameter(name)
        } else if let Some(ty) = self.types.try_resolve_type(name) {
            Node::type_access(ty)
        } else {
            Node::target_member(name)
        }
    }
}

/// parses binding expression text, every `$N` value typed as `object`
pub fn parse(text: &str, types: &dyn TypeResolver) -> Result<NodeRef, ParseError> {
    parse_with_bindings(text, types, &[])
}

/// parses binding expression text, `$N` typed by `binding_types[N]` where given
pub fn parse_with_bindings(
    text: &str,
    types: &dyn TypeResolver,
    binding_types: &[BType],
) -> Result<NodeRef, ParseError> {
    let mut pairs = BindingParser::parse(Rule::binding, text)
        .map_err(|e| ParseError::Syntax(Box::new(e)))?;
    let binding = next(&mut pairs)?;
    let expression = next(&mut binding.into_inner())?;
    NodeBuilder {
        types,
        binding_types,
        parameters: vec![],
    }
    .expression(expression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TypeTable;

    fn parse_str(text: &str) -> NodeRef {
        parse(text, &TypeTable::new()).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse_str("1 + 2 * 3").to_string(), "(1 + (2 * 3))");
        assert_eq!(parse_str("a || b && c").to_string(), "(a || (b && c))");
    }

    #[test]
    fn test_member_chain() {
        let node = parse_str("Person?.Name.ToUpper()");
        let expected = Node::target_member("Person")
            .null_conditional()
            .member("Name")
            .call("ToUpper", vec![]);
        assert_eq!(node, expected);
    }

    #[test]
    fn test_lambda_parameters() {
        let node = parse_str("Items.Where(x => x > 1)");
        let lambda = Node::lambda(
            &["x"],
            Node::binary(BinaryToken::GREATER_THAN, Node::parameter("x"), Node::constant(1)),
        );
        assert_eq!(node, Node::target_member("Items").call("Where", vec![lambda]));
    }

    #[test]
    fn test_static_access() {
        let node = parse_str("string.IsNullOrEmpty($0)");
        assert_eq!(
            node,
            Node::type_access(BType::String).call("IsNullOrEmpty", vec![Node::binding(0, "")])
        );
    }

    #[test]
    fn test_generic_call() {
        let node = parse_str("Convert<int>($1)");
        let Node::MethodCall { type_args, target, .. } = node.as_ref() else {
            panic!("expected a call")
        };
        assert!(target.is_none());
        assert_eq!(type_args, &vec![Arc::from("int")]);
    }

    #[test]
    fn test_conditional_and_coalesce() {
        let node = parse_str("a ? b ?? c : 'd'");
        let expected = Node::conditional(
            Node::target_member("a"),
            Node::binary(
                BinaryToken::NULL_COALESCING,
                Node::target_member("b"),
                Node::target_member("c"),
            ),
            Node::constant("d"),
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            parse("1 +", &TypeTable::new()),
            Err(ParseError::Syntax(_))
        ));
    }
}
