//! Function and procedure strategies.
//!
//! Routines of a package or object type are flattened into the schema as
//! `schema.parent_name`. Object type members receive the instance as a
//! leading `self` parameter. In spec-only mode bodies are stubs, so every
//! routine can be created before any body references another.

use std::fmt::Write as _;

use tracing::debug;

use crate::error::Result;
use crate::identifier::{pg_identifier, qualify};
use crate::model::{
    Function, OraclePackage, Parameter, ParameterMode, Procedure, RecordType, RoutineBody,
};
use crate::plpgsql::{record_type_name, routine_name, PlpgsqlRenderer};
use crate::resolver::Scope;

use super::{Strategy, StrategyRegistry, TransformContext};

pub trait FunctionStrategy: Strategy {
    fn supports(&self, function: &Function) -> bool;

    fn transform(&self, function: &Function, ctx: &TransformContext<'_>, spec_only: bool) -> Result<String>;

    fn conversion_notes(&self, function: &Function) -> String;
}

pub trait ProcedureStrategy: Strategy {
    fn supports(&self, procedure: &Procedure) -> bool;

    fn transform(&self, procedure: &Procedure, ctx: &TransformContext<'_>, spec_only: bool) -> Result<String>;

    fn conversion_notes(&self, procedure: &Procedure) -> String;
}

pub type FunctionRegistry = StrategyRegistry<dyn FunctionStrategy>;

pub type ProcedureRegistry = StrategyRegistry<dyn ProcedureStrategy>;

impl StrategyRegistry<dyn FunctionStrategy> {
    pub fn with_builtins() -> Self {
        let mut registry = Self::new("function");
        registry.register(Box::new(StandardFunctionStrategy));
        registry
    }

    pub fn select(&self, function: &Function) -> Option<&dyn FunctionStrategy> {
        self.select_where(|s| s.supports(function))
    }

    pub fn transform(&self, function: &Function, ctx: &TransformContext<'_>, spec_only: bool) -> Result<String> {
        self.apply(
            &function.full_name(),
            |s| s.supports(function),
            |s| s.transform(function, ctx, spec_only),
        )
    }

    pub fn conversion_notes(&self, function: &Function) -> Option<String> {
        self.select(function).map(|s| s.conversion_notes(function))
    }
}

impl StrategyRegistry<dyn ProcedureStrategy> {
    pub fn with_builtins() -> Self {
        let mut registry = Self::new("procedure");
        registry.register(Box::new(StandardProcedureStrategy));
        registry
    }

    pub fn select(&self, procedure: &Procedure) -> Option<&dyn ProcedureStrategy> {
        self.select_where(|s| s.supports(procedure))
    }

    pub fn transform(&self, procedure: &Procedure, ctx: &TransformContext<'_>, spec_only: bool) -> Result<String> {
        self.apply(
            &procedure.full_name(),
            |s| s.supports(procedure),
            |s| s.transform(procedure, ctx, spec_only),
        )
    }

    pub fn conversion_notes(&self, procedure: &Procedure) -> Option<String> {
        self.select(procedure).map(|s| s.conversion_notes(procedure))
    }
}

/// Name prefixing the composite types made from a routine's local record types.
pub fn record_owner(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{}_{}", p, name),
        None => name.to_string(),
    }
}

/// `CREATE TYPE name AS (field type, ...);`
pub fn record_type_ddl(renderer: &PlpgsqlRenderer<'_>, type_name: &str, record: &RecordType) -> String {
    if record.fields.is_empty() {
        return format!("CREATE TYPE {} AS ();", type_name);
    }
    let fields: Vec<String> = record
        .fields
        .iter()
        .map(|f| format!("  {} {}", pg_identifier(&f.name), renderer.type_name(&f.data_type)))
        .collect();
    format!("CREATE TYPE {} AS (\n{}\n);", type_name, fields.join(",\n"))
}

/// Composite types standing in for the record types a routine body declares.
pub fn local_record_types(
    ctx: &TransformContext<'_>,
    schema: &str,
    parent: Option<&str>,
    name: &str,
    body: &RoutineBody,
) -> Vec<String> {
    if body.record_types.is_empty() {
        return Vec::new();
    }
    let owner = record_owner(parent, name);
    let scope = Scope {
        parameters: &[],
        body,
        package: owning_package(ctx, schema, parent),
    };
    let renderer = PlpgsqlRenderer::new(ctx.resolver, schema)
        .with_scope(scope)
        .with_record_owner(&owner);
    body.record_types
        .iter()
        .map(|r| record_type_ddl(&renderer, &record_type_name(schema, &owner, &r.name), r))
        .collect()
}

/// Package a routine belongs to, body first.
fn owning_package<'r>(
    ctx: &TransformContext<'r>,
    schema: &str,
    parent: Option<&str>,
) -> Option<&'r OraclePackage> {
    let parent = parent?;
    let registry = ctx.registry();
    registry
        .find_package_body(schema, parent)
        .or_else(|| registry.find_package_spec(schema, parent))
}

/// `self schema.type` for object type members.
fn self_parameter(ctx: &TransformContext<'_>, schema: &str, parent: Option<&str>) -> Option<String> {
    let parent = parent?;
    if ctx.registry().has_package(schema, parent) {
        return None;
    }
    ctx.registry()
        .find_object_type(schema, parent)
        .map(|t| format!("self {}", qualify(&t.schema, &t.name)))
}

fn parameter_list(renderer: &PlpgsqlRenderer<'_>, self_param: Option<String>, parameters: &[Parameter]) -> String {
    let mut list: Vec<String> = self_param.into_iter().collect();
    for parameter in parameters {
        let mode = match parameter.mode {
            ParameterMode::In => "",
            ParameterMode::Out => "OUT ",
            ParameterMode::InOut => "INOUT ",
        };
        let mut param = format!(
            "{}{} {}",
            mode,
            pg_identifier(&parameter.name),
            renderer.type_name(&parameter.data_type)
        );
        if let Some(default) = &parameter.default {
            let _ = write!(param, " DEFAULT {}", renderer.expression(default));
        }
        list.push(param);
    }
    list.join(", ")
}

/// `DECLARE ... BEGIN ... END;` followed by the closing dollar quote.
fn routine_block(renderer: &PlpgsqlRenderer<'_>, body: &RoutineBody, stub: &str, spec_only: bool) -> String {
    let mut block = String::from("DECLARE\n");
    if !spec_only {
        block.push_str(&renderer.declarations(body));
    }
    block.push_str("BEGIN\n");
    if spec_only {
        let _ = writeln!(block, "  {}", stub);
    } else {
        block.push_str(&renderer.statements(&body.statements, 1));
        block.push_str(&renderer.exception_block(&body.exception_handlers, 0));
    }
    block.push_str("END;\n$$\n;\n");
    block
}

/// Renders any function.
pub struct StandardFunctionStrategy;

impl Strategy for StandardFunctionStrategy {
    fn name(&self) -> &'static str {
        "Standard Function"
    }
}

impl FunctionStrategy for StandardFunctionStrategy {
    fn supports(&self, _function: &Function) -> bool {
        true
    }

    fn transform(&self, function: &Function, ctx: &TransformContext<'_>, spec_only: bool) -> Result<String> {
        debug!(
            "Transforming function {} (spec_only={})",
            function.full_name(),
            spec_only
        );
        let parent = function.parent.as_deref();
        let owner = record_owner(parent, &function.name);
        let scope = Scope::of_function(function).in_package(owning_package(ctx, &function.schema, parent));
        let renderer = PlpgsqlRenderer::new(ctx.resolver, &function.schema)
            .with_scope(scope)
            .with_record_owner(&owner);

        let mut sql = format!(
            "CREATE OR REPLACE FUNCTION {}({})\nRETURNS {}\nLANGUAGE plpgsql AS $$\n",
            routine_name(&function.schema, parent, &function.name),
            parameter_list(
                &renderer,
                self_parameter(ctx, &function.schema, parent),
                &function.parameters
            ),
            renderer.type_name(&function.return_type)
        );
        sql.push_str(&routine_block(&renderer, &function.body, "return null;", spec_only));
        Ok(sql)
    }

    fn conversion_notes(&self, function: &Function) -> String {
        let mut notes = String::from("Converted using standard function transformation");
        if function.parent.is_none() {
            notes.push_str("; Standalone function");
        }
        notes
    }
}

/// Renders any procedure.
pub struct StandardProcedureStrategy;

impl Strategy for StandardProcedureStrategy {
    fn name(&self) -> &'static str {
        "Standard Procedure"
    }
}

impl ProcedureStrategy for StandardProcedureStrategy {
    fn supports(&self, _procedure: &Procedure) -> bool {
        true
    }

    fn transform(&self, procedure: &Procedure, ctx: &TransformContext<'_>, spec_only: bool) -> Result<String> {
        debug!(
            "Transforming procedure {} (spec_only={})",
            procedure.full_name(),
            spec_only
        );
        let parent = procedure.parent.as_deref();
        let owner = record_owner(parent, &procedure.name);
        let scope =
            Scope::of_procedure(procedure).in_package(owning_package(ctx, &procedure.schema, parent));
        let renderer = PlpgsqlRenderer::new(ctx.resolver, &procedure.schema)
            .with_scope(scope)
            .with_record_owner(&owner);

        let mut sql = format!(
            "CREATE OR REPLACE PROCEDURE {}({})\nLANGUAGE plpgsql AS $$\n",
            routine_name(&procedure.schema, parent, &procedure.name),
            parameter_list(
                &renderer,
                self_parameter(ctx, &procedure.schema, parent),
                &procedure.parameters
            )
        );
        sql.push_str(&routine_block(&renderer, &procedure.body, "null;", spec_only));
        Ok(sql)
    }

    fn conversion_notes(&self, procedure: &Procedure) -> String {
        let mut notes = String::from("Converted using standard procedure transformation");
        if procedure.parent.is_none() {
            notes.push_str("; Standalone procedure");
        }
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::model::{
        DataType, ExceptionHandler, Expression, ObjectType, RecordField, SchemaRegistry, Statement,
        Variable,
    };

    fn make_bonus_function() -> Function {
        let mut function = Function::new("HR", "GET_BONUS", DataType::native("NUMBER"));
        function.parameters = vec![Parameter::new("P_SALARY", DataType::native("NUMBER"))];
        function.body.variables =
            vec![Variable::new("V_RATE", DataType::native("NUMBER")).with_default(Expression::number("0.1"))];
        function.body.statements = vec![Statement::Return(Some(Expression::binary(
            Expression::reference("p_salary"),
            "*",
            Expression::reference("v_rate"),
        )))];
        function
    }

    fn make_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();

        let mut package = OraclePackage::new("HR", "EMP_PKG");
        package.variables = vec![Variable::new("G_RATE", DataType::native("NUMBER"))];
        let mut get_rate = Function::new("HR", "GET_RATE", DataType::native("NUMBER"));
        get_rate.body.statements = vec![Statement::Return(Some(Expression::reference("g_rate")))];
        package.functions.push(get_rate);
        registry.add_package_body(package);

        let mut point = ObjectType::new("HR", "POINT_T");
        point.functions.push(Function::new("HR", "DISTANCE", DataType::native("NUMBER")));
        registry.add_object_type(point);

        registry
    }

    // =========================================================================
    // Functions
    // =========================================================================

    #[test]
    fn test_standalone_function() {
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);

        let sql = FunctionRegistry::with_builtins()
            .transform(&make_bonus_function(), &ctx, false)
            .unwrap();
        assert_eq!(
            sql,
            "CREATE OR REPLACE FUNCTION hr.get_bonus(p_salary numeric)\n\
             RETURNS numeric\n\
             LANGUAGE plpgsql AS $$\n\
             DECLARE\n\
             \x20 v_rate numeric := 0.1;\n\
             BEGIN\n\
             \x20 RETURN p_salary * v_rate;\n\
             END;\n\
             $$\n\
             ;\n"
        );
    }

    #[test]
    fn test_spec_only_stub() {
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);

        let sql = FunctionRegistry::with_builtins()
            .transform(&make_bonus_function(), &ctx, true)
            .unwrap();
        assert!(sql.ends_with("DECLARE\nBEGIN\n  return null;\nEND;\n$$\n;\n"));
        assert!(!sql.contains("v_rate"));
    }

    #[test]
    fn test_package_function_reads_variable_through_getter() {
        let registry = make_registry();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let function = &registry.package_bodies[0].functions[0];

        let sql = FunctionRegistry::with_builtins()
            .transform(function, &ctx, false)
            .unwrap();
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION hr.emp_pkg_get_rate()\n"));
        assert!(sql.contains("  RETURN hr.emp_pkg_get_g_rate();\n"));
    }

    #[test]
    fn test_object_type_member_takes_self() {
        let registry = make_registry();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let member = &registry.object_types[0].functions[0];

        let sql = FunctionRegistry::with_builtins()
            .transform(member, &ctx, true)
            .unwrap();
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION hr.point_t_distance(self hr.point_t)\n"));
    }

    #[test]
    fn test_exception_block() {
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let mut function = make_bonus_function();
        function.body.exception_handlers = vec![ExceptionHandler {
            exceptions: vec!["ZERO_DIVIDE".into()],
            statements: vec![Statement::Return(Some(Expression::number("0")))],
        }];

        let sql = FunctionRegistry::with_builtins()
            .transform(&function, &ctx, false)
            .unwrap();
        assert!(sql.contains(
            "  RETURN p_salary * v_rate;\nEXCEPTION\n  WHEN DIVISION_BY_ZERO THEN\n    RETURN 0;\nEND;\n"
        ));
    }

    #[test]
    fn test_function_notes() {
        let functions = FunctionRegistry::with_builtins();
        assert_eq!(
            functions.conversion_notes(&make_bonus_function()).unwrap(),
            "Converted using standard function transformation; Standalone function"
        );
        assert_eq!(functions.select(&make_bonus_function()).unwrap().priority(), 0);
    }

    // =========================================================================
    // Procedures
    // =========================================================================

    #[test]
    fn test_procedure_with_out_parameter() {
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let mut procedure = Procedure::new("HR", "RAISE_SALARY");
        let mut out = Parameter::new("P_NEW", DataType::native("NUMBER"));
        out.mode = ParameterMode::Out;
        procedure.parameters = vec![Parameter::new("P_ID", DataType::native("NUMBER")), out];
        procedure.body.statements = vec![Statement::Sql(
            "UPDATE employees SET salary = salary * 1.1 WHERE employee_id = p_id".into(),
        )];

        let procedures = ProcedureRegistry::with_builtins();
        let sql = procedures.transform(&procedure, &ctx, false).unwrap();
        assert_eq!(
            sql,
            "CREATE OR REPLACE PROCEDURE hr.raise_salary(p_id numeric, OUT p_new numeric)\n\
             LANGUAGE plpgsql AS $$\n\
             DECLARE\n\
             BEGIN\n\
             \x20 UPDATE employees SET salary = salary * 1.1 WHERE employee_id = p_id;\n\
             END;\n\
             $$\n\
             ;\n"
        );

        let stub = procedures.transform(&procedure, &ctx, true).unwrap();
        assert!(stub.contains("BEGIN\n  null;\nEND;"));
        assert_eq!(procedures.select(&procedure).unwrap().name(), "Standard Procedure");
    }

    // =========================================================================
    // Record types
    // =========================================================================

    #[test]
    fn test_local_record_types() {
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let mut body = RoutineBody::default();
        body.record_types = vec![RecordType {
            name: "EMP_REC".into(),
            fields: vec![
                RecordField {
                    name: "ID".into(),
                    data_type: DataType::native("NUMBER"),
                },
                RecordField {
                    name: "NAME".into(),
                    data_type: DataType::native("VARCHAR2"),
                },
            ],
        }];

        let types = local_record_types(&ctx, "HR", None, "CALC", &body);
        assert_eq!(
            types,
            vec!["CREATE TYPE hr.calc_emp_rec AS (\n  id numeric,\n  name text\n);".to_string()]
        );
        assert!(local_record_types(&ctx, "HR", None, "CALC", &RoutineBody::default()).is_empty());
    }

    #[test]
    fn test_transform_is_repeatable() {
        let registry = make_registry();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let functions = FunctionRegistry::with_builtins();
        let function = make_bonus_function();
        assert_eq!(
            functions.transform(&function, &ctx, false).unwrap(),
            functions.transform(&function, &ctx, false).unwrap()
        );
    }
}
