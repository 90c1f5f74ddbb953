//! Semantic analysis and binding.
//!
//! [`Binder`] is the entry point. The conversion routines are methods of
//! [`Resolver`], so that they move between scopes, regions and aggregate
//! contexts through its guards. A query block is converted in the order
//! FROM, WHERE, GROUP BY, HAVING, ORDER BY, SELECT.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::catalog::{
    resolve_overloads, FunctionOverload, FunctionParameter, Metadata, MetadataMember,
    OverloadResolution,
};
use crate::config::ResolverConfig;
use crate::error::{BindError, Clause, ErrorContext, Result};
use crate::parser::ast::{
    self, AliasedExpr, ApplyItem, BinaryOp, Expr, ExprKind, FromClause, FromItem,
    FunctionDefinition, JoinItem, QueryExpr, SelectClause, SelectKind, Statement, TypeRef,
};
use crate::types::{DataType, Value};

use super::expression::{
    ApplyKind, ArithmeticOp, BoundExpression, ComparisonOp, ExpressionBinding, JoinKind, SortKey,
};
use super::inline::{InlineFunction, InlineFunctionTable};
use super::resolver::{ExpressionResolution, Resolver};
use super::scope::{ScopeEntry, SourceVariable, VarRef};

/// Bound statement after semantic analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    /// The bound query expression.
    pub expression: BoundExpression,
}

impl BoundStatement {
    /// Result type of the statement.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        self.expression.data_type()
    }
}

/// Semantic analyzer that binds parsed statements against metadata.
pub struct Binder<'a> {
    metadata: &'a dyn Metadata,
    config: ResolverConfig,
    parameters: Vec<(String, DataType)>,
    variables: Vec<(String, DataType)>,
}

impl<'a> Binder<'a> {
    /// Creates a binder with the default configuration.
    #[must_use]
    pub fn new(metadata: &'a dyn Metadata) -> Self {
        Binder {
            metadata,
            config: ResolverConfig::default(),
            parameters: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Sets the resolver configuration.
    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Declares a query parameter `@name`.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.parameters.push((name.into(), data_type));
        self
    }

    /// Declares a variable visible to the whole query.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.variables.push((name.into(), data_type));
        self
    }

    /// Binds a parsed statement.
    ///
    /// # Errors
    ///
    /// Returns the first semantic error, positioned at the offending node.
    pub fn bind_statement(&self, statement: &Statement) -> Result<BoundStatement> {
        let mut resolver = Resolver::new(self.metadata, self.config);
        for (name, data_type) in &self.parameters {
            resolver = resolver.with_parameter(name, data_type.clone());
        }
        for (name, data_type) in &self.variables {
            resolver = resolver.with_variable(name, data_type.clone())?;
        }

        let functions = resolver.declare_inline_functions(&statement.functions)?;
        resolver.set_inline_functions(Rc::new(functions));

        let expression = resolver.convert_value_expression(&statement.query)?;
        debug!(data_type = %expression.data_type(), "bound statement");
        Ok(BoundStatement { expression })
    }
}

/// Operator family of a binary expression.
enum OperatorClass {
    Logical { and: bool },
    Value(ValueOperator),
}

/// Operator over typed operands.
enum ValueOperator {
    Arithmetic(ArithmeticOp),
    Comparison(ComparisonOp),
}

fn classify(op: BinaryOp) -> OperatorClass {
    let value = match op {
        BinaryOp::And => return OperatorClass::Logical { and: true },
        BinaryOp::Or => return OperatorClass::Logical { and: false },
        BinaryOp::Add => ValueOperator::Arithmetic(ArithmeticOp::Add),
        BinaryOp::Sub => ValueOperator::Arithmetic(ArithmeticOp::Sub),
        BinaryOp::Mul => ValueOperator::Arithmetic(ArithmeticOp::Mul),
        BinaryOp::Div => ValueOperator::Arithmetic(ArithmeticOp::Div),
        BinaryOp::Mod => ValueOperator::Arithmetic(ArithmeticOp::Mod),
        BinaryOp::Eq => ValueOperator::Comparison(ComparisonOp::Eq),
        BinaryOp::NotEq => ValueOperator::Comparison(ComparisonOp::Neq),
        BinaryOp::Lt => ValueOperator::Comparison(ComparisonOp::Lt),
        BinaryOp::LtEq => ValueOperator::Comparison(ComparisonOp::Lte),
        BinaryOp::Gt => ValueOperator::Comparison(ComparisonOp::Gt),
        BinaryOp::GtEq => ValueOperator::Comparison(ComparisonOp::Gte),
    };
    OperatorClass::Value(value)
}

pub(super) fn overload_parameters(function: &FunctionOverload) -> &[FunctionParameter] {
    &function.parameters
}

fn inline_parameters(function: &Rc<InlineFunction>) -> &[FunctionParameter] {
    &function.parameters
}

/// Display names of argument types; untyped nulls show as `NULL`.
pub(super) fn type_names(arg_types: &[Option<DataType>]) -> Vec<String> {
    arg_types
        .iter()
        .map(|t| t.as_ref().map_or_else(|| "NULL".to_string(), ToString::to_string))
        .collect()
}

/// Replaces untyped null arguments with nulls of the parameter type.
///
/// In group mode the parameter is a collection and the null takes its
/// element type.
pub(super) fn typed_args(
    args: Vec<Option<BoundExpression>>,
    parameters: &[FunctionParameter],
    group_aggregate: bool,
) -> Vec<BoundExpression> {
    args.into_iter()
        .zip(parameters)
        .map(|(arg, param)| {
            arg.unwrap_or_else(|| {
                let data_type = if group_aggregate {
                    param.data_type.element_type().unwrap_or(&param.data_type)
                } else {
                    &param.data_type
                };
                BoundExpression::null(data_type.clone())
            })
        })
        .collect()
}

fn expect_value(resolution: ExpressionResolution, name: &str, context: ErrorContext) -> Result<BoundExpression> {
    match resolution {
        ExpressionResolution::Value(expr) => Ok(expr),
        _ => Err(BindError::NotAValue(name.to_string()).at(context)),
    }
}

fn call_name(function: &Expr) -> String {
    function
        .multipart_identifier()
        .map_or_else(|| "<expression>".to_string(), |parts| parts.join("."))
}

fn row_of_bindings(left: &ExpressionBinding, right: &ExpressionBinding) -> DataType {
    DataType::collection(DataType::row([
        (left.variable.clone(), left.variable_type.clone()),
        (right.variable.clone(), right.variable_type.clone()),
    ]))
}

impl<'m> Resolver<'m> {
    // ---------------------------------------------------------------------
    // Inline functions
    // ---------------------------------------------------------------------

    fn declare_inline_functions(&mut self, definitions: &[FunctionDefinition]) -> Result<InlineFunctionTable> {
        let mut table = InlineFunctionTable::new();
        for definition in definitions {
            let mut parameters = Vec::with_capacity(definition.parameters.len());
            for parameter in &definition.parameters {
                let data_type = self
                    .resolve_type_ref(&parameter.type_ref, parameter.context)
                    .map_err(|e| e.in_clause(Clause::Function))?;
                parameters.push(FunctionParameter::new(parameter.name.clone(), data_type));
            }
            let key = self.config.name_key(&definition.name);
            table
                .declare(key, InlineFunction::new(definition.clone(), parameters))
                .map_err(|e| e.at(definition.context).in_clause(Clause::Function))?;
        }
        Ok(table)
    }

    fn resolve_type_ref(&mut self, type_ref: &TypeRef, context: ErrorContext) -> Result<DataType> {
        match type_ref {
            TypeRef::Collection(element) => {
                Ok(DataType::collection(self.resolve_type_ref(element, context)?))
            }
            TypeRef::Named(parts) => {
                let mut sr = self.ignore_entity_container_names();
                match sr.resolve_metadata_member_name(parts, context)? {
                    MetadataMember::Type { data_type, .. } => Ok(data_type),
                    _ => Err(BindError::NotAType(parts.join(".")).at(context)),
                }
            }
        }
    }

    /// Returns the lambda of an inline function, converting its body on
    /// first use.
    fn inline_function_lambda(&self, function: &InlineFunction) -> Result<BoundExpression> {
        if let Some(lambda) = function.lambda() {
            return Ok(lambda);
        }
        function
            .begin_conversion()
            .map_err(|e| e.at(function.definition.context).in_clause(Clause::Function))?;
        let converted = self.convert_inline_function_body(function);
        match &converted {
            Ok(lambda) => function.complete_conversion(lambda.clone()),
            Err(_) => function.abort_conversion(),
        }
        converted
    }

    fn convert_inline_function_body(&self, function: &InlineFunction) -> Result<BoundExpression> {
        let mut body_resolver = self.fork();
        for parameter in &function.parameters {
            let formal = BoundExpression::variable(parameter.name.clone(), parameter.data_type.clone());
            body_resolver.scopes.add(&parameter.name, ScopeEntry::Free(formal));
        }
        let body = body_resolver
            .convert_value_expression(&function.definition.body)
            .map_err(|e| e.in_clause(Clause::Function))?;
        trace!(function = %function.name, "converted inline function body");

        let data_type = body.data_type().clone();
        Ok(BoundExpression::Lambda {
            parameters: function
                .parameters
                .iter()
                .map(|p| (p.name.clone(), p.data_type.clone()))
                .collect(),
            body: Box::new(body),
            data_type,
        })
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    /// Converts an expression that must have a type.
    pub(super) fn convert_value_expression(&mut self, expr: &Expr) -> Result<BoundExpression> {
        self.convert_value_or_null(expr)?
            .ok_or_else(|| BindError::ExpressionCannotBeNull.at(expr.context))
    }

    /// Converts an expression; `None` stands for an untyped `null`.
    pub(super) fn convert_value_or_null(&mut self, expr: &Expr) -> Result<Option<BoundExpression>> {
        let ctx = expr.context;
        let converted = match &expr.kind {
            ExprKind::Null => return Ok(None),
            ExprKind::Literal(value) => BoundExpression::literal(value.clone()),
            ExprKind::Parameter(name) => self.resolve_parameter(name, ctx)?,
            ExprKind::Identifier(name) => {
                let resolution = self.resolve_simple_name(name, false, ctx)?;
                expect_value(resolution, name, ctx)?
            }
            ExprKind::Dot { left, member } => {
                let resolution = self.convert_dot(expr, left, member)?;
                expect_value(resolution, &call_name(expr), ctx)?
            }
            ExprKind::Call {
                function,
                args,
                distinct,
            } => self.convert_call(expr, function, args, *distinct)?,
            ExprKind::GroupPartition { arg, distinct } => {
                self.convert_group_partition(expr, arg, *distinct)?
            }
            ExprKind::Binary { op, left, right } => self.convert_binary(*op, left, right, ctx)?,
            ExprKind::Not(operand) => BoundExpression::not(self.convert_boolean(operand)?),
            ExprKind::IsNull { operand, negated } => match self.convert_value_or_null(operand)? {
                Some(operand) => BoundExpression::IsNull {
                    operand: Box::new(operand),
                    negated: *negated,
                    data_type: DataType::Bool,
                },
                None => BoundExpression::literal(Value::Bool(!*negated)),
            },
            ExprKind::Collection(items) => self.convert_collection(items, ctx)?,
            ExprKind::Query(query) => self.convert_query(query)?,
        };
        Ok(Some(converted))
    }

    fn convert_boolean(&mut self, expr: &Expr) -> Result<BoundExpression> {
        let converted = self.convert_value_expression(expr)?;
        if converted.data_type() != &DataType::Bool {
            return Err(BindError::ExpressionTypeMustBeBoolean(converted.data_type().to_string())
                .at(expr.context));
        }
        Ok(converted)
    }

    fn convert_dot(&mut self, expr: &Expr, left: &Expr, member: &str) -> Result<ExpressionResolution> {
        if let Some(parts) = expr.multipart_identifier() {
            if let Some(key) = self.try_resolve_group_key_alternative_name(&parts, expr.context)? {
                return Ok(ExpressionResolution::Value(key));
            }
        }
        let resolved_left = match &left.kind {
            ExprKind::Identifier(name) => self.resolve_simple_name(name, true, left.context)?,
            ExprKind::Dot {
                left: inner,
                member: inner_member,
            } => self.convert_dot(left, inner, inner_member)?,
            _ => ExpressionResolution::Value(self.convert_value_expression(left)?),
        };
        self.resolve_member_access(resolved_left, member, expr.context)
    }

    /// Resolves `a.b` written as an unaliased group key, which stays
    /// visible under its dotted name after grouping.
    fn try_resolve_group_key_alternative_name(
        &mut self,
        parts: &[String],
        context: ErrorContext,
    ) -> Result<Option<BoundExpression>> {
        if !self.is_in_any_group_scope() {
            return Ok(None);
        }
        let full_name = parts.join(".");
        let Some((entry, scope_index)) = self.try_scope_lookup(&full_name) else {
            return Ok(None);
        };
        let config = self.config;
        let matches = entry.alternative_name().is_some_and(|alternative| {
            alternative.len() == parts.len()
                && alternative
                    .iter()
                    .zip(parts)
                    .all(|(a, b)| config.names_equal(a, b))
        });
        if !matches {
            return Ok(None);
        }
        self.set_scope_region_correlation_flag(scope_index);
        self.get_expression_from_entry(&entry, scope_index, &full_name)
            .map(Some)
            .map_err(|e| e.at(context))
    }

    fn convert_call(&mut self, expr: &Expr, function: &Expr, args: &[Expr], distinct: bool) -> Result<BoundExpression> {
        let ctx = function.context;
        let member = match &function.kind {
            ExprKind::Identifier(name) => self.resolve_simple_function_name(name, ctx)?,
            ExprKind::Dot { .. } => {
                let Some(parts) = function.multipart_identifier() else {
                    return Err(BindError::NotAFunction(call_name(function)).at(ctx));
                };
                let mut sr = self.ignore_entity_container_names();
                sr.resolve_metadata_member_name(&parts, ctx)?
            }
            _ => return Err(BindError::NotAFunction(call_name(function)).at(ctx)),
        };
        match member {
            MetadataMember::InlineFunctionGroup(name) => {
                self.convert_inline_function_call(expr, &name, args, distinct)
            }
            MetadataMember::FunctionGroup { name, overloads } => {
                self.convert_function_group_call(expr, &name, &overloads, args, distinct)
            }
            other => Err(BindError::NotAFunction(other.name().to_string()).at(ctx)),
        }
    }

    /// Converts call arguments, keeping untyped nulls open.
    pub(super) fn convert_function_args(
        &mut self,
        args: &[Expr],
    ) -> Result<(Vec<Option<BoundExpression>>, Vec<Option<DataType>>)> {
        let mut converted = Vec::with_capacity(args.len());
        for arg in args {
            converted.push(self.convert_value_or_null(arg)?);
        }
        let types = converted
            .iter()
            .map(|arg| arg.as_ref().map(|e| e.data_type().clone()))
            .collect();
        Ok((converted, types))
    }

    fn convert_inline_function_call(
        &mut self,
        expr: &Expr,
        name: &str,
        args: &[Expr],
        distinct: bool,
    ) -> Result<BoundExpression> {
        let ctx = expr.context;
        let overloads: Vec<Rc<InlineFunction>> = self
            .inline_functions
            .group(&self.config.name_key(name))
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        let (converted, arg_types) = self.convert_function_args(args)?;

        match resolve_overloads(&overloads, &arg_types, inline_parameters, false) {
            OverloadResolution::Resolved(index) => {
                let function = &overloads[index];
                let args = typed_args(converted, &function.parameters, false);
                let lambda = self.inline_function_lambda(function)?;
                let data_type = lambda.data_type().clone();
                Ok(BoundExpression::Invoke {
                    lambda: Box::new(lambda),
                    args,
                    data_type,
                })
            }
            OverloadResolution::Ambiguous => {
                Err(BindError::AmbiguousFunctionOverload(name.to_string()).at(ctx))
            }
            OverloadResolution::NotFound => match self.resolve_metadata_function_name(name, ctx)? {
                Some(MetadataMember::FunctionGroup { name, overloads }) => {
                    self.convert_function_group_call(expr, &name, &overloads, args, distinct)
                }
                _ => Err(BindError::FunctionOverloadNotFound {
                    name: name.to_string(),
                    args: type_names(&arg_types),
                }
                .at(ctx)),
            },
        }
    }

    fn convert_function_group_call(
        &mut self,
        expr: &Expr,
        name: &str,
        overloads: &[FunctionOverload],
        args: &[Expr],
        distinct: bool,
    ) -> Result<BoundExpression> {
        if overloads.iter().any(|f| f.is_aggregate) && self.is_in_any_group_scope() {
            return self.convert_aggregate_in_group_scope(expr, name, overloads, args, distinct);
        }
        let (converted, arg_types) = self.convert_function_args(args)?;
        self.resolve_function_call(name, overloads, converted, &arg_types, expr.context)
    }

    /// Resolves an ordinary (non-group) call over converted arguments.
    pub(super) fn resolve_function_call(
        &self,
        name: &str,
        overloads: &[FunctionOverload],
        args: Vec<Option<BoundExpression>>,
        arg_types: &[Option<DataType>],
        context: ErrorContext,
    ) -> Result<BoundExpression> {
        match resolve_overloads(overloads, arg_types, overload_parameters, false) {
            OverloadResolution::Resolved(index) => {
                let function = &overloads[index];
                Ok(BoundExpression::FunctionCall {
                    function: function.full_name(),
                    args: typed_args(args, &function.parameters, false),
                    data_type: function.return_type.clone(),
                })
            }
            OverloadResolution::NotFound => Err(BindError::FunctionOverloadNotFound {
                name: name.to_string(),
                args: type_names(arg_types),
            }
            .at(context)),
            OverloadResolution::Ambiguous => {
                Err(BindError::AmbiguousFunctionOverload(name.to_string()).at(context))
            }
        }
    }

    fn convert_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, ctx: ErrorContext) -> Result<BoundExpression> {
        let operator = match classify(op) {
            OperatorClass::Logical { and } => {
                let operands = vec![self.convert_boolean(left)?, self.convert_boolean(right)?];
                return Ok(if and {
                    BoundExpression::and(operands)
                } else {
                    BoundExpression::or(operands)
                });
            }
            OperatorClass::Value(operator) => operator,
        };

        let (left, right) = match (self.convert_value_or_null(left)?, self.convert_value_or_null(right)?) {
            (Some(l), Some(r)) => (l, r),
            (Some(l), None) => {
                let null = BoundExpression::null(l.data_type().clone());
                (l, null)
            }
            (None, Some(r)) => (BoundExpression::null(r.data_type().clone()), r),
            (None, None) => return Err(BindError::ExpressionCannotBeNull.at(ctx)),
        };
        let (left_type, right_type) = (left.data_type(), right.data_type());
        let common = left_type.common_supertype(right_type);

        match operator {
            ValueOperator::Arithmetic(op) => {
                let Some(data_type) = common.filter(DataType::is_numeric) else {
                    return Err(BindError::TypeMismatch {
                        expected: "numeric operands".into(),
                        actual: format!("{left_type}, {right_type}"),
                    }
                    .at(ctx));
                };
                Ok(BoundExpression::Arithmetic {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                    data_type,
                })
            }
            ValueOperator::Comparison(op) => {
                let Some(common) = common else {
                    return Err(BindError::TypeMismatch {
                        expected: left_type.to_string(),
                        actual: right_type.to_string(),
                    }
                    .at(ctx));
                };
                let comparable = if op.is_equality() {
                    common.is_equal_comparable()
                } else {
                    common.is_order_comparable()
                };
                if !comparable {
                    let expected = if op.is_equality() {
                        "equality-comparable operands"
                    } else {
                        "order-comparable operands"
                    };
                    return Err(BindError::TypeMismatch {
                        expected: expected.into(),
                        actual: common.to_string(),
                    }
                    .at(ctx));
                }
                Ok(BoundExpression::comparison(left, op, right))
            }
        }
    }

    fn convert_collection(&mut self, items: &[Expr], ctx: ErrorContext) -> Result<BoundExpression> {
        let mut converted = Vec::with_capacity(items.len());
        let mut element_type: Option<DataType> = None;
        for item in items {
            let value = self.convert_value_or_null(item)?;
            if let Some(value) = &value {
                element_type = Some(match element_type {
                    None => value.data_type().clone(),
                    Some(current) => current
                        .common_supertype(value.data_type())
                        .ok_or_else(|| BindError::CollectionElementTypesIncompatible.at(item.context))?,
                });
            }
            converted.push(value);
        }
        let element_type = element_type.ok_or_else(|| BindError::ExpressionCannotBeNull.at(ctx))?;
        let items = converted
            .into_iter()
            .map(|item| item.unwrap_or_else(|| BoundExpression::null(element_type.clone())))
            .collect();
        Ok(BoundExpression::NewCollection {
            items,
            data_type: DataType::collection(element_type),
        })
    }

    /// Infers the name of an unaliased FROM, GROUP BY or SELECT item.
    pub(super) fn infer_alias_name(&self, item: &AliasedExpr, converted: &BoundExpression) -> String {
        if let Some(alias) = &item.alias {
            return alias.name.clone();
        }
        if let Some(last) = item.expr.multipart_identifier().and_then(|mut parts| parts.pop()) {
            return last;
        }
        match converted {
            BoundExpression::Scan { entity_set, .. } => entity_set.clone(),
            BoundExpression::Property { property, .. } => property.clone(),
            BoundExpression::VariableRef { variable, .. } => variable.clone(),
            _ => self.generate_internal_name(""),
        }
    }

    // ---------------------------------------------------------------------
    // Query blocks
    // ---------------------------------------------------------------------

    /// Converts a query block inside its own scope region.
    pub(super) fn convert_query(&mut self, query: &QueryExpr) -> Result<BoundExpression> {
        let mut region = self.enter_scope_region();
        region.convert_query_block(query)
    }

    fn convert_query_block(&mut self, query: &QueryExpr) -> Result<BoundExpression> {
        let restricted = self.config.is_restricted();

        let source = self
            .process_from_clause(&query.from)
            .map_err(|e| e.in_clause(Clause::From))?;

        let source = match &query.where_clause {
            Some(predicate) => self
                .process_filter(source, predicate, "where")
                .map_err(|e| e.in_clause(Clause::Where))?,
            None => source,
        };

        if restricted {
            if let Some(group_by) = &query.group_by {
                return Err(BindError::NotSupportedInRestrictedMode("GROUP BY")
                    .at(group_by.context.in_clause(Clause::GroupBy)));
            }
            if let Some(having) = &query.having {
                return Err(BindError::NotSupportedInRestrictedMode("HAVING")
                    .at(having.context.in_clause(Clause::Having)));
            }
            if let Some(order_by) = &query.order_by {
                return Err(BindError::NotSupportedInRestrictedMode("ORDER BY")
                    .at(order_by.context.in_clause(Clause::OrderBy)));
            }
        }
        if let (Some(having), None) = (&query.having, &query.group_by) {
            return Err(BindError::HavingRequiresGroupClause.at(having.context.in_clause(Clause::Having)));
        }

        let source = if restricted {
            source
        } else {
            self.process_group_by_clause(source, query)
                .map_err(|e| e.in_clause(Clause::GroupBy))?
        };

        let source = match &query.having {
            Some(predicate) => self
                .process_filter(source, predicate, "having")
                .map_err(|e| e.in_clause(Clause::Having))?,
            None => source,
        };

        let (source, projection_processed) = self
            .process_order_by_clause(source, query)
            .map_err(|e| e.in_clause(Clause::OrderBy))?;

        let result = self
            .process_select_clause(source, query, projection_processed)
            .map_err(|e| e.in_clause(Clause::Select))?;
        debug!(
            region = self.current_region().index(),
            data_type = %result.data_type(),
            "converted query block"
        );
        Ok(result)
    }

    pub(super) fn process_from_clause(&mut self, from: &FromClause) -> Result<ExpressionBinding> {
        let mut from_binding: Option<ExpressionBinding> = None;
        let mut from_names: Vec<String> = Vec::new();

        for item in &from.items {
            let (binding, names) = self.process_from_item(item)?;
            from_names.extend(names);
            from_binding = Some(match from_binding {
                None => binding,
                Some(previous) => {
                    let data_type = row_of_bindings(&previous, &binding);
                    let apply = BoundExpression::Apply {
                        kind: ApplyKind::Cross,
                        input: previous,
                        apply: binding,
                        data_type,
                    };
                    let combined = ExpressionBinding::new(apply, self.generate_internal_name("lcapply"));
                    self.add_parent_var_to_entries(&from_names, &combined.variable_ref());
                    combined
                }
            });
        }

        from_binding.ok_or_else(|| BindError::UnresolvedIdentifier(String::new()).at(from.context))
    }

    fn process_from_item(&mut self, item: &FromItem) -> Result<(ExpressionBinding, Vec<String>)> {
        match item {
            FromItem::Aliased(aliased) => self.process_aliased_from_item(aliased),
            FromItem::Join(join) => self.process_join(join),
            FromItem::Apply(apply) => self.process_apply(apply),
        }
    }

    fn process_aliased_from_item(&mut self, item: &AliasedExpr) -> Result<(ExpressionBinding, Vec<String>)> {
        let expression = self.convert_value_expression(&item.expr)?;
        if !expression.data_type().is_collection() {
            return Err(BindError::ExpressionMustBeCollection(expression.data_type().to_string())
                .at(item.expr.context));
        }

        let mut alias = self.infer_alias_name(item, &expression);
        if self.scopes.current_scope_contains(&alias) {
            match &item.alias {
                Some(explicit) => return Err(BindError::AliasAlreadyUsed(alias).at(explicit.context)),
                None => alias = self.generate_internal_name("autoFrom"),
            }
        }

        let binding = ExpressionBinding::new(expression, alias.clone());
        let source = SourceVariable::new(VarRef::new(alias.clone(), binding.variable_type.clone()));
        self.scopes.add(&alias, ScopeEntry::Source(source));
        trace!(alias = %alias, "added FROM source");
        Ok((binding, vec![alias]))
    }

    fn process_join(&mut self, join: &JoinItem) -> Result<(ExpressionBinding, Vec<String>)> {
        let (left, left_names) = self.process_from_item(&join.left)?;

        self.set_join_left(&left_names, true);
        let right = self.process_from_item(&join.right);
        self.set_join_left(&left_names, false);
        let (right, right_names) = right?;

        let condition = match (&join.on, join.kind) {
            (Some(on), ast::JoinKind::Cross) => {
                return Err(BindError::InvalidPredicateForCrossJoin.at(on.context));
            }
            (Some(on), _) => self.convert_boolean(on)?,
            (None, ast::JoinKind::Inner) => {
                return Err(BindError::InnerJoinMustHaveOnPredicate.at(join.context));
            }
            (None, _) => BoundExpression::literal(Value::Bool(true)),
        };

        let kind = match join.kind {
            ast::JoinKind::Cross => JoinKind::Cross,
            ast::JoinKind::Inner => JoinKind::Inner,
            ast::JoinKind::LeftOuter | ast::JoinKind::RightOuter => JoinKind::LeftOuter,
            ast::JoinKind::FullOuter => JoinKind::FullOuter,
        };
        let (left, right) = if join.kind == ast::JoinKind::RightOuter {
            (right, left)
        } else {
            (left, right)
        };

        let data_type = row_of_bindings(&left, &right);
        let joined = BoundExpression::Join {
            kind,
            left,
            right,
            condition: Box::new(condition),
            data_type,
        };
        let binding = ExpressionBinding::new(joined, self.generate_internal_name("join"));

        let mut names = left_names;
        names.extend(right_names);
        self.add_parent_var_to_entries(&names, &binding.variable_ref());
        Ok((binding, names))
    }

    fn process_apply(&mut self, apply: &ApplyItem) -> Result<(ExpressionBinding, Vec<String>)> {
        let (input, left_names) = self.process_from_item(&apply.left)?;
        let (applied, right_names) = self.process_from_item(&apply.right)?;

        let kind = match apply.kind {
            ast::ApplyKind::Cross => ApplyKind::Cross,
            ast::ApplyKind::Outer => ApplyKind::Outer,
        };
        let data_type = row_of_bindings(&input, &applied);
        let expression = BoundExpression::Apply {
            kind,
            input,
            apply: applied,
            data_type,
        };
        let binding = ExpressionBinding::new(expression, self.generate_internal_name("apply"));

        let mut names = left_names;
        names.extend(right_names);
        self.add_parent_var_to_entries(&names, &binding.variable_ref());
        Ok((binding, names))
    }

    fn add_parent_var_to_entries(&mut self, names: &[String], parent: &BoundExpression) {
        for name in names {
            let key = self.scopes.key(name);
            if let Some(source) = self
                .scopes
                .current_scope_mut()
                .get_mut(&key)
                .and_then(ScopeEntry::as_source_mut)
            {
                source.add_parent_var(parent);
            }
        }
    }

    fn set_join_left(&mut self, names: &[String], value: bool) {
        for name in names {
            let key = self.scopes.key(name);
            if let Some(source) = self
                .scopes
                .current_scope_mut()
                .get_mut(&key)
                .and_then(ScopeEntry::as_source_mut)
            {
                source.set_join_left(value);
            }
        }
    }

    /// WHERE and HAVING: filters the source and rebinds every entry of the
    /// region to the filtered elements.
    pub(super) fn process_filter(&mut self, source: ExpressionBinding, predicate: &Expr, hint: &str) -> Result<ExpressionBinding> {
        let condition = self.convert_boolean(predicate)?;
        let data_type = DataType::collection(source.variable_type.clone());
        let filter = BoundExpression::Filter {
            input: source,
            predicate: Box::new(condition),
            data_type,
        };
        let binding = ExpressionBinding::new(filter, self.generate_internal_name(hint));
        let parent = binding.variable_ref();
        self.apply_to_region_entries(|entry| {
            if let Some(source) = entry.as_source_mut() {
                source.replace_parent_var(&parent);
            }
        });
        Ok(binding)
    }

    /// Converts the SELECT items and names them.
    fn convert_select_items(&mut self, query: &QueryExpr) -> Result<Vec<(String, BoundExpression)>> {
        let select = &query.select;
        if select.kind == SelectKind::Value {
            if select.items.len() != 1 {
                return Err(BindError::InvalidSelectValueList.at(select.context));
            }
            if let (Some(alias), None) = (&select.items[0].alias, &query.order_by) {
                return Err(BindError::InvalidSelectValueAliasedExpression.at(alias.context));
            }
        }

        let mut items: Vec<(String, BoundExpression)> = Vec::with_capacity(select.items.len());
        for item in &select.items {
            let converted = self.convert_value_expression(&item.expr)?;
            let mut alias = self.infer_alias_name(item, &converted);
            if items.iter().any(|(name, _)| self.config.names_equal(name, &alias)) {
                match &item.alias {
                    Some(explicit) => return Err(BindError::AliasAlreadyUsed(alias).at(explicit.context)),
                    None => alias = self.generate_internal_name("autoProject"),
                }
            }
            items.push((alias, converted));
        }
        Ok(items)
    }

    fn create_project_expression(
        &self,
        source: ExpressionBinding,
        select: &SelectClause,
        items: Vec<(String, BoundExpression)>,
    ) -> Result<BoundExpression> {
        let projection = match select.kind {
            SelectKind::Value => items
                .into_iter()
                .next()
                .map(|(_, expr)| expr)
                .ok_or_else(|| BindError::InvalidSelectValueList.at(select.context))?,
            SelectKind::Row => {
                let data_type = DataType::row(
                    items
                        .iter()
                        .map(|(name, expr)| (name.clone(), expr.data_type().clone())),
                );
                BoundExpression::NewRow {
                    fields: items,
                    data_type,
                }
            }
        };

        let element_type = projection.data_type().clone();
        if select.distinct && !element_type.is_equal_comparable() {
            return Err(BindError::DistinctNotEqualComparable(element_type.to_string()).at(select.context));
        }
        let data_type = DataType::collection(element_type);
        let project = BoundExpression::Project {
            input: source,
            projection: Box::new(projection),
            data_type: data_type.clone(),
        };
        Ok(if select.distinct {
            BoundExpression::Distinct {
                input: Box::new(project),
                data_type,
            }
        } else {
            project
        })
    }

    /// Sorts the source. Returns the sorted binding and whether the
    /// projection was already applied, which happens for SELECT DISTINCT.
    fn process_order_by_clause(
        &mut self,
        source: ExpressionBinding,
        query: &QueryExpr,
    ) -> Result<(ExpressionBinding, bool)> {
        let Some(order_by) = &query.order_by else {
            return Ok((source, false));
        };
        let select = &query.select;

        let items = self
            .convert_select_items(query)
            .map_err(|e| e.in_clause(Clause::Select))?;

        if select.distinct {
            let first = self.current_region().first_scope_index();
            self.rollback_to_scope(first - 1);
        }
        let sort_scope_index = self.current_scope_index();
        self.enter_scope();
        for (name, expr) in &items {
            self.scopes
                .add(name, ScopeEntry::ProjectionItemDefinition(expr.clone()));
        }

        let mut source = source;
        let mut projection_processed = false;
        if select.distinct {
            let names: Vec<(String, DataType)> = items
                .iter()
                .map(|(name, expr)| (name.clone(), expr.data_type().clone()))
                .collect();
            let projection = self
                .create_project_expression(source, select, items)
                .map_err(|e| e.in_clause(Clause::Select))?;
            let binding = ExpressionBinding::new(projection, self.generate_internal_name("distinct"));

            match select.kind {
                SelectKind::Value => {
                    let source = SourceVariable::new(VarRef::new(
                        binding.variable.clone(),
                        binding.variable_type.clone(),
                    ));
                    if let Some((name, _)) = names.first() {
                        let key = self.scopes.key(name);
                        self.scopes
                            .current_scope_mut()
                            .replace(&key, ScopeEntry::Source(source));
                    }
                }
                SelectKind::Row => {
                    let parent = binding.variable_ref();
                    for (name, data_type) in &names {
                        let mut source = SourceVariable::new(VarRef::new(name.clone(), data_type.clone()));
                        source.add_parent_var(&parent);
                        let key = self.scopes.key(name);
                        self.scopes
                            .current_scope_mut()
                            .replace(&key, ScopeEntry::Source(source));
                    }
                }
            }
            source = binding;
            projection_processed = true;
        }

        let mut keys = Vec::with_capacity(order_by.items.len());
        for item in &order_by.items {
            self.current_region_mut().set_resolution_correlated(false);
            let key = self.convert_value_expression(&item.expr)?;
            if !self.current_region().was_resolution_correlated() {
                return Err(BindError::KeyMustBeCorrelated("ORDER BY").at(item.expr.context));
            }
            if !key.data_type().is_order_comparable() {
                return Err(BindError::OrderByKeyNotOrderComparable(key.data_type().to_string())
                    .at(item.expr.context));
            }
            keys.push(if item.descending {
                SortKey::desc(key)
            } else {
                SortKey::asc(key)
            });
        }
        self.rollback_to_scope(sort_scope_index);

        let data_type = DataType::collection(source.variable_type.clone());
        let sort = BoundExpression::Sort {
            input: source,
            keys,
            data_type,
        };
        let binding = ExpressionBinding::new(sort, self.generate_internal_name("sort"));
        if !projection_processed {
            let parent = binding.variable_ref();
            self.apply_to_region_entries(|entry| {
                if let Some(source) = entry.as_source_mut() {
                    source.replace_parent_var(&parent);
                }
            });
        }
        Ok((binding, projection_processed))
    }

    fn process_select_clause(
        &mut self,
        source: ExpressionBinding,
        query: &QueryExpr,
        projection_processed: bool,
    ) -> Result<BoundExpression> {
        if projection_processed {
            return Ok(*source.expression);
        }
        let items = self.convert_select_items(query)?;
        self.create_project_expression(source, &query.select, items)
    }
}
