//! Pest parser integration for the query grammar.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{ErrorContext, QueryError, Result};
use crate::parser::ast::{
    Alias, AliasedExpr, ApplyItem, ApplyKind, BinaryOp, Expr, ExprKind, FromClause, FromItem,
    FunctionDefinition, GroupByClause, JoinItem, JoinKind, NodeId, OrderByClause, OrderItem,
    ParameterDefinition, QueryExpr, SelectClause, SelectKind, Statement, TypeRef,
};
use crate::types::Value;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct QueryParser;

/// Parses query text into a [`Statement`].
///
/// # Errors
///
/// Returns a `ParseError` if the text is syntactically invalid.
pub fn parse_query(query: &str) -> Result<Statement> {
    let mut pairs = QueryParser::parse(Rule::statement, query).map_err(|e| {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c))
            | pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        QueryError::ParseError {
            line,
            col,
            message: e.variant.message().to_string(),
        }
    })?;

    let statement = pairs.next().ok_or_else(|| QueryError::ParseError {
        line: 0,
        col: 0,
        message: "No statement found".into(),
    })?;
    AstBuilder::default().build_statement(statement)
}

fn context_of(pair: &Pair<Rule>) -> ErrorContext {
    let (line, col) = pair.as_span().start_pos().line_col();
    ErrorContext::new(line, col)
}

fn malformed(pair: &Pair<Rule>, what: &str) -> QueryError {
    let (line, col) = pair.as_span().start_pos().line_col();
    QueryError::ParseError {
        line,
        col,
        message: format!("malformed {what}"),
    }
}

fn identifier_text(pair: &Pair<Rule>) -> String {
    let s = pair.as_str();
    if s.starts_with('[') && s.ends_with(']') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Builds AST nodes from parse pairs, numbering every expression node.
#[derive(Default)]
struct AstBuilder {
    next_id: u32,
}

impl AstBuilder {
    fn node(&mut self, context: ErrorContext, kind: ExprKind) -> Expr {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Expr { id, context, kind }
    }

    fn build_statement(&mut self, pair: Pair<Rule>) -> Result<Statement> {
        let mut functions = Vec::new();
        let mut query = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::function_definition => functions.push(self.build_function_definition(inner)?),
                Rule::query_expression => {
                    let context = context_of(&inner);
                    let block = self.build_query(inner)?;
                    query = Some(self.node(context, ExprKind::Query(Box::new(block))));
                }
                Rule::expression => query = Some(self.build_expr(inner)?),
                _ => {}
            }
        }
        let query = query.ok_or_else(|| QueryError::ParseError {
            line: 0,
            col: 0,
            message: "No query found".into(),
        })?;
        Ok(Statement { functions, query })
    }

    fn build_function_definition(&mut self, pair: Pair<Rule>) -> Result<FunctionDefinition> {
        let context = context_of(&pair);
        let mut name = None;
        let mut parameters = Vec::new();
        let mut body = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => name = Some(identifier_text(&inner)),
                Rule::parameter_definition => {
                    let param_context = context_of(&inner);
                    let mut parts = inner.into_inner();
                    let (Some(param_name), Some(type_pair)) = (parts.next(), parts.next()) else {
                        return Err(QueryError::ParseError {
                            line: param_context.line,
                            col: param_context.col,
                            message: "malformed parameter definition".into(),
                        });
                    };
                    parameters.push(ParameterDefinition {
                        name: identifier_text(&param_name),
                        type_ref: build_type_ref(type_pair)?,
                        context: param_context,
                    });
                }
                Rule::query_expression => {
                    let expr_context = context_of(&inner);
                    let block = self.build_query(inner)?;
                    body = Some(self.node(expr_context, ExprKind::Query(Box::new(block))));
                }
                Rule::expression => body = Some(self.build_expr(inner)?),
                _ => {}
            }
        }
        match (name, body) {
            (Some(name), Some(body)) => Ok(FunctionDefinition {
                name,
                parameters,
                body,
                context,
            }),
            _ => Err(QueryError::ParseError {
                line: context.line,
                col: context.col,
                message: "malformed function definition".into(),
            }),
        }
    }

    // ---------------------------------------------------------------------
    // Query blocks
    // ---------------------------------------------------------------------

    fn build_query(&mut self, pair: Pair<Rule>) -> Result<QueryExpr> {
        let context = context_of(&pair);
        let mut select = None;
        let mut from = None;
        let mut where_clause = None;
        let mut group_by = None;
        let mut having = None;
        let mut order_by = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::select_clause => select = Some(self.build_select_clause(inner)?),
                Rule::from_clause => from = Some(self.build_from_clause(inner)?),
                Rule::where_clause => where_clause = Some(self.build_trailing_expr(inner)?),
                Rule::group_by_clause => {
                    let group_context = context_of(&inner);
                    let items = self.build_aliased_list(inner)?;
                    group_by = Some(GroupByClause {
                        items,
                        context: group_context,
                    });
                }
                Rule::having_clause => having = Some(self.build_trailing_expr(inner)?),
                Rule::order_by_clause => order_by = Some(self.build_order_by(inner)?),
                _ => {}
            }
        }

        match (select, from) {
            (Some(select), Some(from)) => Ok(QueryExpr {
                select,
                from,
                where_clause,
                group_by,
                having,
                order_by,
                context,
            }),
            _ => Err(QueryError::ParseError {
                line: context.line,
                col: context.col,
                message: "query requires SELECT and FROM clauses".into(),
            }),
        }
    }

    fn build_select_clause(&mut self, pair: Pair<Rule>) -> Result<SelectClause> {
        let context = context_of(&pair);
        let mut kind = SelectKind::Row;
        let mut distinct = false;
        let mut items = Vec::new();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::kw_value => kind = SelectKind::Value,
                Rule::kw_distinct => distinct = true,
                Rule::aliased_expr => items.push(self.build_aliased_expr(inner)?),
                _ => {}
            }
        }
        Ok(SelectClause {
            kind,
            distinct,
            items,
            context,
        })
    }

    fn build_aliased_list(&mut self, pair: Pair<Rule>) -> Result<Vec<AliasedExpr>> {
        pair.into_inner()
            .filter(|p| p.as_rule() == Rule::aliased_expr)
            .map(|p| self.build_aliased_expr(p))
            .collect()
    }

    fn build_aliased_expr(&mut self, pair: Pair<Rule>) -> Result<AliasedExpr> {
        let mut expr = None;
        let mut alias = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::expression => expr = Some(self.build_expr(inner)?),
                Rule::identifier => {
                    alias = Some(Alias {
                        name: identifier_text(&inner),
                        context: context_of(&inner),
                    });
                }
                _ => {}
            }
        }
        Ok(AliasedExpr {
            expr: expr.ok_or_else(|| QueryError::ParseError {
                line: 0,
                col: 0,
                message: "aliased expression without expression".into(),
            })?,
            alias,
        })
    }

    /// Builds the expression that follows a clause keyword.
    fn build_trailing_expr(&mut self, pair: Pair<Rule>) -> Result<Expr> {
        let err = malformed(&pair, "clause");
        let inner = pair
            .into_inner()
            .find(|p| p.as_rule() == Rule::expression)
            .ok_or(err)?;
        self.build_expr(inner)
    }

    fn build_from_clause(&mut self, pair: Pair<Rule>) -> Result<FromClause> {
        let context = context_of(&pair);
        let items = pair
            .into_inner()
            .filter(|p| p.as_rule() == Rule::from_item)
            .map(|p| self.build_from_item(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(FromClause { items, context })
    }

    fn build_from_item(&mut self, pair: Pair<Rule>) -> Result<FromItem> {
        let err = malformed(&pair, "FROM item");
        let mut inner = pair.into_inner();
        let mut item = self.build_from_source(inner.next().ok_or(err)?)?;

        for tail in inner {
            let context = context_of(&tail);
            match tail.as_rule() {
                Rule::join_tail => {
                    let mut kind = JoinKind::Inner;
                    let mut right = None;
                    let mut on = None;
                    for part in tail.into_inner() {
                        match part.as_rule() {
                            Rule::join_kind => kind = join_kind(&part),
                            Rule::from_source => right = Some(self.build_from_source(part)?),
                            Rule::expression => on = Some(self.build_expr(part)?),
                            _ => {}
                        }
                    }
                    let right = right.ok_or_else(|| QueryError::ParseError {
                        line: context.line,
                        col: context.col,
                        message: "JOIN requires a right side".into(),
                    })?;
                    item = FromItem::Join(Box::new(JoinItem {
                        left: item,
                        right,
                        kind,
                        on,
                        context,
                    }));
                }
                Rule::apply_tail => {
                    let mut kind = ApplyKind::Cross;
                    let mut right = None;
                    for part in tail.into_inner() {
                        match part.as_rule() {
                            Rule::apply_kind => {
                                if part.into_inner().any(|k| k.as_rule() == Rule::outer_apply) {
                                    kind = ApplyKind::Outer;
                                }
                            }
                            Rule::from_source => right = Some(self.build_from_source(part)?),
                            _ => {}
                        }
                    }
                    let right = right.ok_or_else(|| QueryError::ParseError {
                        line: context.line,
                        col: context.col,
                        message: "APPLY requires a right side".into(),
                    })?;
                    item = FromItem::Apply(Box::new(ApplyItem {
                        left: item,
                        right,
                        kind,
                        context,
                    }));
                }
                _ => {}
            }
        }
        Ok(item)
    }

    fn build_from_source(&mut self, pair: Pair<Rule>) -> Result<FromItem> {
        let err = malformed(&pair, "FROM source");
        let inner = pair.into_inner().next().ok_or(err)?;
        match inner.as_rule() {
            Rule::aliased_expr => Ok(FromItem::Aliased(self.build_aliased_expr(inner)?)),
            Rule::from_item => self.build_from_item(inner),
            _ => Err(malformed(&inner, "FROM source")),
        }
    }

    fn build_order_by(&mut self, pair: Pair<Rule>) -> Result<OrderByClause> {
        let context = context_of(&pair);
        let mut items = Vec::new();
        for item in pair.into_inner().filter(|p| p.as_rule() == Rule::order_item) {
            let mut expr = None;
            let mut descending = false;
            for part in item.into_inner() {
                match part.as_rule() {
                    Rule::expression => expr = Some(self.build_expr(part)?),
                    Rule::kw_desc => descending = true,
                    _ => {}
                }
            }
            if let Some(expr) = expr {
                items.push(OrderItem { expr, descending });
            }
        }
        Ok(OrderByClause { items, context })
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn build_expr(&mut self, pair: Pair<Rule>) -> Result<Expr> {
        match pair.as_rule() {
            Rule::expression => {
                let err = malformed(&pair, "expression");
                let inner = pair.into_inner().next().ok_or(err)?;
                self.build_expr(inner)
            }
            Rule::or_expr | Rule::and_expr => self.build_logical(pair),
            Rule::not_expr => self.build_not(pair),
            Rule::is_null_expr => self.build_is_null(pair),
            Rule::comparison | Rule::additive | Rule::multiplicative => self.build_binary_chain(pair),
            Rule::postfix => self.build_postfix(pair),
            _ => self.build_primary(pair),
        }
    }

    fn build_logical(&mut self, pair: Pair<Rule>) -> Result<Expr> {
        let op = if pair.as_rule() == Rule::or_expr {
            BinaryOp::Or
        } else {
            BinaryOp::And
        };
        let err = malformed(&pair, "logical expression");
        let mut operands = pair
            .into_inner()
            .filter(|p| !matches!(p.as_rule(), Rule::kw_or | Rule::kw_and));
        let mut result = self.build_expr(operands.next().ok_or(err)?)?;
        for operand in operands {
            let right = self.build_expr(operand)?;
            result = self.node(
                result.context,
                ExprKind::Binary {
                    op,
                    left: Box::new(result),
                    right: Box::new(right),
                },
            );
        }
        Ok(result)
    }

    fn build_not(&mut self, pair: Pair<Rule>) -> Result<Expr> {
        let context = context_of(&pair);
        let err = malformed(&pair, "NOT expression");
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or(err)?;
        if first.as_rule() == Rule::kw_not {
            let operand_pair = inner.next().ok_or_else(|| malformed(&first, "NOT expression"))?;
            let operand = self.build_expr(operand_pair)?;
            Ok(self.node(context, ExprKind::Not(Box::new(operand))))
        } else {
            self.build_expr(first)
        }
    }

    fn build_is_null(&mut self, pair: Pair<Rule>) -> Result<Expr> {
        let context = context_of(&pair);
        let err = malformed(&pair, "IS NULL expression");
        let mut inner = pair.into_inner();
        let operand = self.build_expr(inner.next().ok_or(err)?)?;
        match inner.next() {
            Some(suffix) => {
                let negated = suffix.into_inner().any(|p| p.as_rule() == Rule::kw_not);
                Ok(self.node(
                    context,
                    ExprKind::IsNull {
                        operand: Box::new(operand),
                        negated,
                    },
                ))
            }
            None => Ok(operand),
        }
    }

    /// Left-folds `operand (op operand)*`.
    fn build_binary_chain(&mut self, pair: Pair<Rule>) -> Result<Expr> {
        let err = malformed(&pair, "expression");
        let mut inner = pair.into_inner();
        let mut result = self.build_expr(inner.next().ok_or(err)?)?;
        while let Some(op_pair) = inner.next() {
            let op = binary_op(&op_pair)?;
            let right_pair = inner.next().ok_or_else(|| malformed(&op_pair, "operator"))?;
            let right = self.build_expr(right_pair)?;
            result = self.node(
                result.context,
                ExprKind::Binary {
                    op,
                    left: Box::new(result),
                    right: Box::new(right),
                },
            );
        }
        Ok(result)
    }

    fn build_postfix(&mut self, pair: Pair<Rule>) -> Result<Expr> {
        let err = malformed(&pair, "expression");
        let mut inner = pair.into_inner();
        let mut result = self.build_expr(inner.next().ok_or(err)?)?;
        for suffix in inner {
            let context = context_of(&suffix);
            let rule = suffix.as_rule();
            let mut parts = suffix.into_inner();
            let member = parts
                .next()
                .map(|p| identifier_text(&p))
                .unwrap_or_default();
            let dot = self.node(
                context,
                ExprKind::Dot {
                    left: Box::new(result),
                    member,
                },
            );
            result = match (rule, parts.next()) {
                (Rule::member_call, Some(args)) => {
                    let (args, distinct) = self.build_call_args(args)?;
                    self.node(
                        context,
                        ExprKind::Call {
                            function: Box::new(dot),
                            args,
                            distinct,
                        },
                    )
                }
                _ => dot,
            };
        }
        Ok(result)
    }

    fn build_call_args(&mut self, pair: Pair<Rule>) -> Result<(Vec<Expr>, bool)> {
        let mut args = Vec::new();
        let mut distinct = false;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::kw_distinct => distinct = true,
                Rule::expression => args.push(self.build_expr(inner)?),
                _ => {}
            }
        }
        Ok((args, distinct))
    }

    fn build_primary(&mut self, pair: Pair<Rule>) -> Result<Expr> {
        let context = context_of(&pair);
        let kind = match pair.as_rule() {
            Rule::integer_literal => {
                let v = pair.as_str().parse::<i64>().map_err(|e| QueryError::ParseError {
                    line: context.line,
                    col: context.col,
                    message: format!("invalid integer literal: {e}"),
                })?;
                ExprKind::Literal(Value::Int64(v))
            }
            Rule::float_literal => {
                let v = pair.as_str().parse::<f64>().map_err(|e| QueryError::ParseError {
                    line: context.line,
                    col: context.col,
                    message: format!("invalid float literal: {e}"),
                })?;
                ExprKind::Literal(Value::Float64(v))
            }
            Rule::string_literal => {
                let s = pair.as_str();
                ExprKind::Literal(Value::String(s[1..s.len() - 1].replace("''", "'")))
            }
            Rule::bool_literal => {
                ExprKind::Literal(Value::Bool(pair.as_str().eq_ignore_ascii_case("true")))
            }
            Rule::null_literal => ExprKind::Null,
            Rule::parameter => ExprKind::Parameter(pair.as_str()[1..].to_string()),
            Rule::identifier => ExprKind::Identifier(identifier_text(&pair)),
            Rule::function_call => {
                let err = malformed(&pair, "function call");
                let mut inner = pair.into_inner();
                let (Some(name), Some(args)) = (inner.next(), inner.next()) else {
                    return Err(err);
                };
                let function = self.node(context_of(&name), ExprKind::Identifier(identifier_text(&name)));
                let (args, distinct) = self.build_call_args(args)?;
                ExprKind::Call {
                    function: Box::new(function),
                    args,
                    distinct,
                }
            }
            Rule::group_partition => {
                let mut distinct = false;
                let mut arg = None;
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::kw_distinct => distinct = true,
                        Rule::expression => arg = Some(self.build_expr(inner)?),
                        _ => {}
                    }
                }
                let arg = arg.ok_or_else(|| QueryError::ParseError {
                    line: context.line,
                    col: context.col,
                    message: "GROUPPARTITION requires an argument".into(),
                })?;
                ExprKind::GroupPartition {
                    arg: Box::new(arg),
                    distinct,
                }
            }
            Rule::collection => {
                let items = pair
                    .into_inner()
                    .map(|p| self.build_expr(p))
                    .collect::<Result<Vec<_>>>()?;
                ExprKind::Collection(items)
            }
            Rule::query_expression => ExprKind::Query(Box::new(self.build_query(pair)?)),
            _ => return Err(malformed(&pair, "expression")),
        };
        Ok(self.node(context, kind))
    }
}

fn join_kind(pair: &Pair<Rule>) -> JoinKind {
    match pair.clone().into_inner().next().map(|p| p.as_rule()) {
        Some(Rule::cross_join) => JoinKind::Cross,
        Some(Rule::left_join) => JoinKind::LeftOuter,
        Some(Rule::right_join) => JoinKind::RightOuter,
        Some(Rule::full_join) => JoinKind::FullOuter,
        _ => JoinKind::Inner,
    }
}

fn binary_op(pair: &Pair<Rule>) -> Result<BinaryOp> {
    let op = match pair.as_str() {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Mod,
        "=" => BinaryOp::Eq,
        "<>" | "!=" => BinaryOp::NotEq,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::LtEq,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::GtEq,
        _ => return Err(malformed(pair, "operator")),
    };
    Ok(op)
}

fn build_type_ref(pair: Pair<Rule>) -> Result<TypeRef> {
    let err = malformed(&pair, "type");
    let inner = pair.into_inner().next().ok_or(err)?;
    match inner.as_rule() {
        Rule::collection_type => {
            let err = malformed(&inner, "collection type");
            let element = inner.into_inner().next().ok_or(err)?;
            Ok(TypeRef::Collection(Box::new(build_type_ref(element)?)))
        }
        Rule::qualified_name => Ok(TypeRef::Named(
            inner.into_inner().map(|p| identifier_text(&p)).collect(),
        )),
        _ => Err(malformed(&inner, "type")),
    }
}
