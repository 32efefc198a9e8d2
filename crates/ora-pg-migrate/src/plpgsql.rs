//! PL/SQL to PL/pgSQL rendering of expressions, statements and queries.
//!
//! The renderer works on the parsed AST. Names are resolved through the
//! [`SymbolResolver`] so calls land on the converted routine names, package
//! variables turn into getter/setter calls and `name(args)` is split into
//! function calls, collection subscripts and collection constructors.
//!
//! Text the parser left unstructured ([`Expression::Raw`], [`Statement::Sql`])
//! goes through [`rewrite_sql_text`], which only touches text outside string
//! literals.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::identifier::{pg_identifier, qualify};
use crate::model::{
    CallChain, CallSegment, ConditionalBranch, Cursor, DataType, ExceptionHandler, Expression,
    Literal, OraclePackage, RoutineBody, SelectStatement, Statement, TableReference, Variable,
};
use crate::resolver::{ObjectKind, ResolvedName, Scope, SymbolResolver};
use crate::typemap;

const INDENT: &str = "  ";

/// SQL functions that are calls even though they are not PL/SQL scalar builtins.
const SQL_FUNCTIONS: &[&str] = &[
    "COUNT", "SUM", "AVG", "MIN", "MAX", "NULLIF", "INSTR", "REPLACE", "LPAD", "RPAD",
    "CONCAT", "SIGN", "EXISTS", "ADD_MONTHS", "LAST_DAY", "CAST", "EXTRACT",
];

/// Rewrites applied to unquoted SQL text.
static SQL_REWRITES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i):(NEW|OLD)\.", "$1."),
        (r"(?i)\b(SYSTIMESTAMP|SYSDATE)\b", "CURRENT_TIMESTAMP"),
        (r"(?i)\bNVL\s*\(", "COALESCE("),
        (r"(?i)\s+FROM\s+DUAL\b", ""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("sql rewrite pattern is valid"),
            replacement,
        )
    })
    .collect()
});

/// Trigger predicates, rewritten in trigger bodies only.
static TRIGGER_REWRITES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bINSERTING\b", "TG_OP = 'INSERT'"),
        (r"(?i)\bUPDATING\b", "TG_OP = 'UPDATE'"),
        (r"(?i)\bDELETING\b", "TG_OP = 'DELETE'"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("trigger rewrite pattern is valid"),
            replacement,
        )
    })
    .collect()
});

static UPDATING_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bUPDATING\s*\(\s*['"]([A-Za-z_][A-Za-z0-9_$#]*)['"]\s*\)"#)
        .expect("updating pattern is valid")
});

/// Apply `rewrite` to the parts of `text` outside quotes.
///
/// String literals are copied unchanged. Quoted identifiers are rendered with
/// [`pg_identifier`]. An unterminated quote ends rewriting.
pub fn rewrite_outside_literals(text: &str, rewrite: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(|c: char| c == '\'' || c == '"') {
        out.push_str(&rewrite(&rest[..pos]));
        let quote = rest.as_bytes()[pos];
        let body = &rest[pos + 1..];
        let Some(end) = closing_quote(body, quote) else {
            out.push_str(&rest[pos..]);
            return out;
        };
        let inner = &body[..end];
        if quote == b'"' {
            out.push_str(&pg_identifier(&inner.replace("\"\"", "\"")));
        } else {
            out.push('\'');
            out.push_str(inner);
            out.push('\'');
        }
        rest = &body[end + 1..];
    }

    out.push_str(&rewrite(rest));
    out
}

/// Position of the quote closing a quoted run, skipping doubled quotes.
fn closing_quote(body: &str, quote: u8) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Rewrite SQL text the parser did not structure.
///
/// Handles `:NEW.`/`:OLD.`, SYSDATE, NVL and `FROM DUAL`; in trigger bodies
/// also INSERTING/UPDATING/DELETING and `UPDATING('col')`.
pub fn rewrite_sql_text(text: &str, trigger: bool) -> String {
    let text = if trigger {
        UPDATING_COLUMN
            .replace_all(text, |caps: &regex::Captures<'_>| updating_column(&caps[1]))
            .into_owned()
    } else {
        text.to_string()
    };

    rewrite_outside_literals(&text, |part| {
        let rules = SQL_REWRITES
            .iter()
            .chain(TRIGGER_REWRITES.iter().filter(|_| trigger));
        rules.fold(part.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
    })
}

fn updating_column(column: &str) -> String {
    let column = pg_identifier(column);
    format!(
        "(TG_OP = 'UPDATE' AND OLD.{} IS DISTINCT FROM NEW.{})",
        column, column
    )
}

/// PostgreSQL condition name for an Oracle exception.
///
/// User-defined exceptions are raised as `RAISE EXCEPTION`, which uses
/// SQLSTATE P0001, so that is what their handlers catch.
pub fn map_exception_name(oracle: &str) -> String {
    let mapped = match oracle.trim().to_uppercase().as_str() {
        "NO_DATA_FOUND" => "NO_DATA_FOUND",
        "TOO_MANY_ROWS" => "TOO_MANY_ROWS",
        "DUP_VAL_ON_INDEX" => "UNIQUE_VIOLATION",
        "ZERO_DIVIDE" => "DIVISION_BY_ZERO",
        "VALUE_ERROR" => "DATA_EXCEPTION",
        "INVALID_NUMBER" => "INVALID_TEXT_REPRESENTATION",
        "CASE_NOT_FOUND" => "CASE_NOT_FOUND",
        "OTHERS" => "OTHERS",
        _ => return "SQLSTATE 'P0001'".to_string(),
    };
    mapped.to_string()
}

/// Whether `oracle` names a predefined exception with a PostgreSQL condition.
fn is_predefined_exception(oracle: &str) -> bool {
    !map_exception_name(oracle).starts_with("SQLSTATE")
}

/// Converted name of a routine: `schema.parent_name` or `schema.name`.
pub fn routine_name(schema: &str, parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => qualify(schema, &format!("{}_{}", p, name)),
        None => qualify(schema, name),
    }
}

/// Schema-level composite type standing in for a record type.
pub fn record_type_name(schema: &str, owner: &str, record: &str) -> String {
    qualify(schema, &format!("{}_{}", owner, record))
}

/// Table holding the values of a package's variables.
pub fn package_state_table(schema: &str, package: &str) -> String {
    qualify(schema, &format!("{}_state", package))
}

/// Function seeding a package's variables with their defaults.
pub fn package_initializer(schema: &str, package: &str) -> String {
    qualify(schema, &format!("{}_init_variables", package))
}

pub fn package_variable_getter(schema: &str, package: &str, variable: &str) -> String {
    qualify(schema, &format!("{}_get_{}", package, variable))
}

pub fn package_variable_setter(schema: &str, package: &str, variable: &str) -> String {
    qualify(schema, &format!("{}_set_{}", package, variable))
}

/// Variables a body introduces implicitly through FOR loops.
///
/// Numeric loop variables are `integer`, cursor loop records are `record`.
/// Loops inside exception handlers count too. Names already declared in the
/// body are skipped; duplicates are reported once.
pub fn implicit_loop_variables(body: &RoutineBody) -> Vec<(String, &'static str)> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    collect_loop_variables(&body.statements, body, &mut seen, &mut found);
    for handler in &body.exception_handlers {
        collect_loop_variables(&handler.statements, body, &mut seen, &mut found);
    }
    found
}

fn collect_loop_variables(
    statements: &[Statement],
    body: &RoutineBody,
    seen: &mut HashSet<String>,
    found: &mut Vec<(String, &'static str)>,
) {
    for statement in statements {
        let (declared, nested): (Option<(&str, &'static str)>, Vec<&[Statement]>) = match statement {
            Statement::NumericFor {
                variable,
                statements,
                ..
            } => (Some((variable.as_str(), "integer")), vec![statements.as_slice()]),
            Statement::CursorFor {
                variable,
                statements,
                ..
            } => (Some((variable.as_str(), "record")), vec![statements.as_slice()]),
            Statement::If {
                branches,
                otherwise,
            } => {
                let mut nested: Vec<&[Statement]> =
                    branches.iter().map(|b| b.statements.as_slice()).collect();
                nested.push(otherwise.as_slice());
                (None, nested)
            }
            Statement::While { statements, .. } | Statement::Loop { statements } => {
                (None, vec![statements.as_slice()])
            }
            _ => (None, Vec::new()),
        };

        if let Some((name, pg_type)) = declared {
            if !body.declares_variable(name) && seen.insert(name.to_lowercase()) {
                found.push((name.to_string(), pg_type));
            }
        }
        for block in nested {
            collect_loop_variables(block, body, seen, found);
        }
    }
}

/// Renders PL/SQL constructs of one routine (or trigger) as PL/pgSQL.
#[derive(Debug, Clone, Copy)]
pub struct PlpgsqlRenderer<'a> {
    resolver: SymbolResolver<'a>,
    /// Schema the code runs in; unqualified names resolve here.
    schema: &'a str,
    scope: Option<Scope<'a>>,
    /// Routine or package name prefixing local record types.
    record_owner: Option<&'a str>,
    trigger: bool,
}

impl<'a> PlpgsqlRenderer<'a> {
    pub fn new(resolver: SymbolResolver<'a>, schema: &'a str) -> Self {
        Self {
            resolver,
            schema,
            scope: None,
            record_owner: None,
            trigger: false,
        }
    }

    /// Builder-style routine scope for variable shadowing and local types.
    pub fn with_scope(mut self, scope: Scope<'a>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Builder-style owner name for local record types.
    pub fn with_record_owner(mut self, owner: &'a str) -> Self {
        self.record_owner = Some(owner);
        self
    }

    /// Enable trigger rewrites (`:NEW`, `TG_OP`).
    pub fn for_trigger(mut self) -> Self {
        self.trigger = true;
        self
    }

    // =========================================================================
    // Types and declarations
    // =========================================================================

    /// PostgreSQL spelling of a PL/SQL type in this routine's context.
    pub fn type_name(&self, data_type: &DataType) -> String {
        if let DataType::Custom {
            schema: None,
            package: None,
            name,
        } = data_type
        {
            if let Some(scope) = &self.scope {
                if scope
                    .body
                    .record_types
                    .iter()
                    .any(|r| r.name.eq_ignore_ascii_case(name))
                {
                    if let Some(owner) = self.record_owner {
                        return record_type_name(self.schema, owner, name);
                    }
                    return "record".to_string();
                }
                if let Some(pkg) = scope.package {
                    if pkg.record_types.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
                        return record_type_name(&pkg.schema, &pkg.name, name);
                    }
                }
            }
        }
        typemap::data_type_to_postgres(
            data_type,
            self.scope.as_ref().map(|s| s.body),
            self.scope.and_then(|s| s.package),
        )
    }

    /// The DECLARE section of a body, without the `DECLARE` keyword.
    ///
    /// Order: record type notes, variables, cursors, implicit loop variables.
    pub fn declarations(&self, body: &RoutineBody) -> String {
        let mut out = String::new();

        for record in &body.record_types {
            let target = match self.record_owner {
                Some(owner) => record_type_name(self.schema, owner, &record.name),
                None => "record".to_string(),
            };
            let _ = writeln!(out, "{}-- record type {} -> {}", INDENT, record.name, target);
        }
        for variable in &body.variables {
            let _ = writeln!(out, "{}{}", INDENT, self.variable_declaration(variable));
        }
        for cursor in &body.cursors {
            let _ = writeln!(out, "{}{}", INDENT, self.cursor_declaration(cursor));
        }
        for (name, pg_type) in implicit_loop_variables(body) {
            let _ = writeln!(out, "{}{} {};", INDENT, pg_identifier(&name), pg_type);
        }

        out
    }

    pub fn variable_declaration(&self, variable: &Variable) -> String {
        let mut decl = pg_identifier(&variable.name);
        if variable.constant {
            decl.push_str(" CONSTANT");
        }
        let _ = write!(decl, " {}", self.type_name(&variable.data_type));
        if let Some(default) = &variable.default {
            let _ = write!(decl, " := {}", self.expression(default));
        }
        decl.push(';');
        decl
    }

    pub fn cursor_declaration(&self, cursor: &Cursor) -> String {
        let params = if cursor.parameters.is_empty() {
            String::new()
        } else {
            let list: Vec<String> = cursor
                .parameters
                .iter()
                .map(|p| format!("{} {}", pg_identifier(&p.name), self.type_name(&p.data_type)))
                .collect();
            format!(" ({})", list.join(", "))
        };
        format!(
            "{} CURSOR{} FOR {};",
            pg_identifier(&cursor.name),
            params,
            self.select(&cursor.query)
        )
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn expression(&self, expression: &Expression) -> String {
        match expression {
            Expression::Literal(literal) => render_literal(literal),
            Expression::Reference(path) => self.reference(path),
            Expression::Call(chain) => self.call_chain(chain),
            Expression::Binary { op, left, right } => format!(
                "{} {} {}",
                self.operand(left),
                render_operator(op),
                self.operand(right)
            ),
            Expression::Unary { op, operand } => {
                let op = render_operator(op);
                let inner = self.operand(operand);
                if op.starts_with("IS ") {
                    format!("{} {}", inner, op)
                } else if op.chars().all(|c| c.is_ascii_alphabetic()) {
                    format!("{} {}", op, inner)
                } else {
                    format!("{}{}", op, inner)
                }
            }
            Expression::Raw(text) => self.raw(text),
        }
    }

    /// Nested binary operations keep their grouping.
    fn operand(&self, expression: &Expression) -> String {
        match expression {
            Expression::Binary { .. } => format!("({})", self.expression(expression)),
            _ => self.expression(expression),
        }
    }

    /// Raw text that is really a reference or call is rendered structurally.
    fn raw(&self, text: &str) -> String {
        let trimmed = text.trim();
        match Expression::parse_reference(trimmed) {
            Ok(parsed) => self.expression(&parsed),
            Err(_) => rewrite_sql_text(trimmed, self.trigger),
        }
    }

    fn reference(&self, path: &[String]) -> String {
        if let [name] = path {
            let upper = name.to_uppercase();
            match upper.as_str() {
                "SYSDATE" | "SYSTIMESTAMP" => return "CURRENT_TIMESTAMP".to_string(),
                "USER" => return "CURRENT_USER".to_string(),
                "SQLCODE" => return "SQLSTATE".to_string(),
                "INSERTING" if self.trigger => return "TG_OP = 'INSERT'".to_string(),
                "UPDATING" if self.trigger => return "TG_OP = 'UPDATE'".to_string(),
                "DELETING" if self.trigger => return "TG_OP = 'DELETE'".to_string(),
                _ => {}
            }
        }

        if let Some((schema, package, variable)) = self.package_variable(path) {
            return format!("{}()", package_variable_getter(schema, package, variable));
        }

        render_path(path)
    }

    /// Package variable named by `path`, as (schema, package, variable).
    ///
    /// A bare name refers to the current package's variables unless a
    /// parameter or local variable shadows it; `pkg.var` refers to a package
    /// in the current schema.
    fn package_variable(&self, path: &[String]) -> Option<(&'a str, &'a str, &'a str)> {
        let registry = self.resolver.registry();
        match path {
            [name] => {
                let scope = self.scope?;
                if scope.shadows(name) {
                    return None;
                }
                let pkg = scope.package?;
                let candidates = [
                    Some(pkg),
                    registry.find_package_spec(&pkg.schema, &pkg.name),
                    registry.find_package_body(&pkg.schema, &pkg.name),
                ];
                candidates
                    .into_iter()
                    .flatten()
                    .find_map(|p| declared_variable(p, name))
            }
            [package, name] => {
                if self.scope.is_some_and(|s| s.shadows(package)) {
                    return None;
                }
                [
                    registry.find_package_spec(self.schema, package),
                    registry.find_package_body(self.schema, package),
                ]
                .into_iter()
                .flatten()
                .find_map(|p| declared_variable(p, name))
            }
            _ => None,
        }
    }

    fn call_chain(&self, chain: &CallChain) -> String {
        let Some((first, rest)) = chain.segments.split_first() else {
            return String::new();
        };

        if rest.is_empty() && first.qualifier.is_empty() {
            if let Some(special) = self.special_call(first) {
                return special;
            }
        }

        let args = self.arguments(&first.args);
        let head = CallChain {
            segments: vec![first.clone()],
        };
        let mut rendered = match self.resolver.resolve_function(&head, self.schema) {
            Some(f) => format!(
                "{}({})",
                routine_name(&f.schema, f.parent.as_deref(), &f.name),
                args.join(", ")
            ),
            None => self.call_target(first, &args),
        };

        // Member calls take the receiver as first argument.
        let mut resolved = head;
        for segment in rest {
            resolved.segments.push(segment.clone());
            let mut member_args = vec![rendered];
            member_args.extend(self.arguments(&segment.args));
            rendered = match self.resolver.resolve_function(&resolved, self.schema) {
                Some(f) => format!(
                    "{}({})",
                    routine_name(&f.schema, f.parent.as_deref(), &f.name),
                    member_args.join(", ")
                ),
                None => {
                    debug!("Unresolved member call {} in schema {}", segment.name, self.schema);
                    format!("{}({})", pg_identifier(&segment.name), member_args.join(", "))
                }
            };
        }
        rendered
    }

    /// Unqualified calls with a fixed translation, or that are not calls at all.
    fn special_call(&self, call: &CallSegment) -> Option<String> {
        let upper = call.name.to_uppercase();
        let args = || self.arguments(&call.args);

        if self.trigger && upper == "UPDATING" && call.args.len() == 1 {
            if let Some(column) = literal_text(&call.args[0]) {
                return Some(updating_column(&column));
            }
        }

        let scope = self.scope.as_ref();
        if scope.is_some_and(|s| s.shadows(&call.name)) {
            return Some(self.subscript(call));
        }
        if self.resolver.is_collection_type_constructor(&call.name, scope) {
            return Some(
                self.resolver
                    .transform_collection_constructor(&call.name, &args(), scope),
            );
        }

        match upper.as_str() {
            "NVL" => return Some(format!("COALESCE({})", args().join(", "))),
            "NVL2" if call.args.len() == 3 => {
                let a = args();
                return Some(format!(
                    "CASE WHEN {} IS NOT NULL THEN {} ELSE {} END",
                    a[0], a[1], a[2]
                ));
            }
            "DECODE" if call.args.len() >= 3 => return Some(render_decode(&args())),
            _ => {}
        }

        if !self.resolver.is_known_function(&call.name, self.schema, scope)
            && !is_sql_function(&call.name)
            && self.sibling_routine(&call.name).is_none()
        {
            return Some(self.subscript(call));
        }
        None
    }

    /// `a(i)` on a variable is a collection element: `a[i]`.
    fn subscript(&self, call: &CallSegment) -> String {
        let args = self.arguments(&call.args);
        let base = self.reference(std::slice::from_ref(&call.name));
        let indexes: String = args.iter().map(|a| format!("[{}]", a)).collect();
        format!("{}{}", base, indexes)
    }

    fn arguments(&self, args: &[Expression]) -> Vec<String> {
        args.iter().map(|a| self.expression(a)).collect()
    }

    /// Routine of the current package named `name`, called without qualifier.
    fn sibling_routine(&self, name: &str) -> Option<&'a OraclePackage> {
        let pkg = self.scope?.package?;
        let declares = |p: &OraclePackage| p.functions_named(name).next().is_some() || p.has_procedure(name);
        if declares(pkg) {
            return Some(pkg);
        }
        let registry = self.resolver.registry();
        [
            registry.find_package_spec(&pkg.schema, &pkg.name),
            registry.find_package_body(&pkg.schema, &pkg.name),
        ]
        .into_iter()
        .flatten()
        .find(|p| declares(*p))
    }

    /// Converted name of a call the resolver could not pin to a function.
    fn call_target(&self, call: &CallSegment, args: &[String]) -> String {
        let name = self.routine_target(&call.qualifier, &call.name);
        format!("{}({})", name, args.join(", "))
    }

    /// Converted routine name for `qualifier.name`.
    ///
    /// Packages are followed through synonyms; unknown qualifiers are kept as
    /// written, lowercased.
    fn routine_target(&self, qualifier: &[String], name: &str) -> String {
        match qualifier {
            [] => match self.sibling_routine(name) {
                Some(pkg) => routine_name(&pkg.schema, Some(&pkg.name), name),
                None => {
                    let registry = self.resolver.registry();
                    let standalone = registry.standalone_functions(self.schema, name).next().is_some()
                        || registry.has_standalone_procedure(self.schema, name);
                    if standalone {
                        qualify(self.schema, name)
                    } else {
                        pg_identifier(name)
                    }
                }
            },
            [package] => match self.resolve_package(self.schema, package) {
                Some(target) => routine_name(&target.schema, Some(&target.name), name),
                None => format!("{}.{}", pg_identifier(package), pg_identifier(name)),
            },
            [schema, package] => match self.resolve_package(schema, package) {
                Some(target) => routine_name(&target.schema, Some(&target.name), name),
                None => routine_name(schema, Some(package), name),
            },
            _ => {
                let mut parts: Vec<String> = qualifier.iter().map(|q| pg_identifier(q)).collect();
                parts.push(pg_identifier(name));
                parts.join(".")
            }
        }
    }

    fn resolve_package(&self, schema: &str, package: &str) -> Option<ResolvedName> {
        match self
            .resolver
            .resolve_schema_and_name(package, schema, ObjectKind::Package)
        {
            Ok(found) => found,
            Err(e) => {
                warn!("Package {}.{} not resolved: {}", schema, package, e);
                None
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn select(&self, query: &SelectStatement) -> String {
        let mut sql = format!("SELECT {}", self.select_list(query));
        self.push_from_clause(&mut sql, query);
        sql
    }

    fn select_list(&self, query: &SelectStatement) -> String {
        if query.columns.is_empty() {
            return "*".to_string();
        }
        query
            .columns
            .iter()
            .map(|c| match &c.alias {
                Some(alias) => format!("{} AS {}", self.expression(&c.expression), pg_identifier(alias)),
                None => self.expression(&c.expression),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn push_from_clause(&self, sql: &mut String, query: &SelectStatement) {
        let tables: Vec<String> = query
            .from
            .iter()
            .filter(|t| !(t.schema.is_none() && t.name.eq_ignore_ascii_case("DUAL")))
            .map(|t| self.table_reference(t))
            .collect();
        if !tables.is_empty() {
            let _ = write!(sql, " FROM {}", tables.join(", "));
        }
        if let Some(condition) = &query.where_clause {
            let _ = write!(sql, " WHERE {}", self.expression(condition));
        }
        if !query.group_by.is_empty() {
            let _ = write!(sql, " GROUP BY {}", self.arguments(&query.group_by).join(", "));
        }
        if !query.order_by.is_empty() {
            let items: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let e = self.expression(&o.expression);
                    if o.descending {
                        format!("{} DESC", e)
                    } else {
                        e
                    }
                })
                .collect();
            let _ = write!(sql, " ORDER BY {}", items.join(", "));
        }
    }

    /// FROM entry pinned to the real table or view behind synonyms.
    pub fn table_reference(&self, table: &TableReference) -> String {
        let schema = table.schema.as_deref().unwrap_or(self.schema);
        let name = match self.resolver.resolve_table_or_view(&table.name, schema) {
            Ok(target) => qualify(&target.schema, &target.name),
            Err(e) => {
                warn!("Keeping table reference {} as written: {}", table.name, e);
                qualify(schema, &table.name)
            }
        };
        match &table.alias {
            Some(alias) => format!("{} {}", name, pg_identifier(alias)),
            None => name,
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Render statements, one per line, at the given nesting depth.
    pub fn statements(&self, statements: &[Statement], depth: usize) -> String {
        let mut out = String::new();
        for statement in statements {
            self.push_statement(&mut out, statement, depth);
        }
        out
    }

    fn push_statement(&self, out: &mut String, statement: &Statement, depth: usize) {
        let pad = INDENT.repeat(depth);
        match statement {
            Statement::Assignment { target, value } => {
                let path = Expression::reference(target);
                let value = self.expression(value);
                let line = match &path {
                    Expression::Reference(parts) => match self.package_variable(parts) {
                        Some((schema, package, variable)) => format!(
                            "PERFORM {}({});",
                            package_variable_setter(schema, package, variable),
                            value
                        ),
                        None => format!("{} := {};", render_path(parts), value),
                    },
                    _ => format!("{} := {};", target, value),
                };
                let _ = writeln!(out, "{}{}", pad, line);
            }
            Statement::If {
                branches,
                otherwise,
            } => self.push_if(out, branches, otherwise, depth),
            Statement::CursorFor {
                variable,
                query,
                statements,
            } => {
                let _ = writeln!(
                    out,
                    "{}FOR {} IN {} LOOP",
                    pad,
                    pg_identifier(variable),
                    self.select(query)
                );
                out.push_str(&self.statements(statements, depth + 1));
                let _ = writeln!(out, "{}END LOOP;", pad);
            }
            Statement::NumericFor {
                variable,
                lower,
                upper,
                reverse,
                statements,
            } => {
                // PL/pgSQL REVERSE counts from the first bound down to the second.
                let (from, to) = if *reverse { (upper, lower) } else { (lower, upper) };
                let _ = writeln!(
                    out,
                    "{}FOR {} IN {}{}..{} LOOP",
                    pad,
                    pg_identifier(variable),
                    if *reverse { "REVERSE " } else { "" },
                    self.expression(from),
                    self.expression(to)
                );
                out.push_str(&self.statements(statements, depth + 1));
                let _ = writeln!(out, "{}END LOOP;", pad);
            }
            Statement::While {
                condition,
                statements,
            } => {
                let _ = writeln!(out, "{}WHILE {} LOOP", pad, self.expression(condition));
                out.push_str(&self.statements(statements, depth + 1));
                let _ = writeln!(out, "{}END LOOP;", pad);
            }
            Statement::Loop { statements } => {
                let _ = writeln!(out, "{}LOOP", pad);
                out.push_str(&self.statements(statements, depth + 1));
                let _ = writeln!(out, "{}END LOOP;", pad);
            }
            Statement::Exit { when } => match when {
                Some(condition) => {
                    let _ = writeln!(out, "{}EXIT WHEN {};", pad, self.expression(condition));
                }
                None => {
                    let _ = writeln!(out, "{}EXIT;", pad);
                }
            },
            Statement::Return(value) => match value {
                Some(value) => {
                    let _ = writeln!(out, "{}RETURN {};", pad, self.expression(value));
                }
                None => {
                    let _ = writeln!(out, "{}RETURN;", pad);
                }
            },
            Statement::Call(chain) => {
                let _ = writeln!(out, "{}{}", pad, self.call_statement(chain));
            }
            Statement::SelectInto { query, into } => {
                let targets: Vec<String> = into
                    .iter()
                    .map(|t| match Expression::reference(t) {
                        Expression::Reference(parts) => render_path(&parts),
                        _ => t.to_lowercase(),
                    })
                    .collect();
                let mut sql = format!(
                    "SELECT {} INTO {}",
                    self.select_list(query),
                    targets.join(", ")
                );
                self.push_from_clause(&mut sql, query);
                let _ = writeln!(out, "{}{};", pad, sql);
            }
            Statement::Raise { exception } => {
                let line = if exception.trim().is_empty() {
                    "RAISE;".to_string()
                } else if is_predefined_exception(exception) {
                    format!("RAISE {};", map_exception_name(exception))
                } else {
                    format!("RAISE EXCEPTION '{}';", exception.replace('\'', "''"))
                };
                let _ = writeln!(out, "{}{}", pad, line);
            }
            Statement::Null => {
                let _ = writeln!(out, "{}NULL;", pad);
            }
            Statement::Sql(text) => {
                let sql = rewrite_sql_text(text.trim().trim_end_matches(';'), self.trigger);
                let _ = writeln!(out, "{}{};", pad, sql);
            }
        }
    }

    fn push_if(
        &self,
        out: &mut String,
        branches: &[ConditionalBranch],
        otherwise: &[Statement],
        depth: usize,
    ) {
        let pad = INDENT.repeat(depth);
        for (i, branch) in branches.iter().enumerate() {
            let keyword = if i == 0 { "IF" } else { "ELSIF" };
            let _ = writeln!(
                out,
                "{}{} {} THEN",
                pad,
                keyword,
                self.expression(&branch.condition)
            );
            out.push_str(&self.statements(&branch.statements, depth + 1));
        }
        if !otherwise.is_empty() {
            let _ = writeln!(out, "{}ELSE", pad);
            out.push_str(&self.statements(otherwise, depth + 1));
        }
        let _ = writeln!(out, "{}END IF;", pad);
    }

    /// A call used as a statement: `CALL` for procedures, `PERFORM` for functions.
    fn call_statement(&self, chain: &CallChain) -> String {
        let Some(first) = chain.segments.first() else {
            return "NULL;".to_string();
        };
        let args = self.arguments(&first.args);
        let qualified = first
            .qualifier
            .iter()
            .map(|q| q.to_uppercase())
            .collect::<Vec<_>>()
            .join(".");
        let upper = first.name.to_uppercase();

        match (qualified.as_str(), upper.as_str()) {
            ("DBMS_OUTPUT", "PUT_LINE") | ("SYS.DBMS_OUTPUT", "PUT_LINE") => {
                let message = args.first().cloned().unwrap_or_else(|| "''".to_string());
                return format!("RAISE NOTICE '%', {};", message);
            }
            ("", "RAISE_APPLICATION_ERROR") => {
                let message = args.get(1).cloned().unwrap_or_else(|| "''".to_string());
                return format!("RAISE EXCEPTION '%', {};", message);
            }
            _ => {}
        }

        if chain.segments.len() > 1 || self.resolver.resolve_function(chain, self.schema).is_some() {
            return format!("PERFORM {};", self.call_chain(chain));
        }

        let package = match first.qualifier.as_slice() {
            [] => self.sibling_routine(&first.name).map(|p| p.name.as_str()),
            [package] | [_, package] => Some(package.as_str()),
            _ => None,
        };
        let schema = match first.qualifier.as_slice() {
            [schema, _] => schema.as_str(),
            _ => self.schema,
        };
        if self.resolver.is_function(&first.name, package, schema) {
            return format!("PERFORM {};", self.call_target(first, &args));
        }
        if self.resolver.resolve_procedure_schema(&first.name, package, schema).is_none() {
            debug!("Procedure {} not found from schema {}; calling as written", first.name, self.schema);
        }
        format!("CALL {};", self.call_target(first, &args))
    }

    // =========================================================================
    // Exception handlers
    // =========================================================================

    /// The `EXCEPTION` block, or an empty string when there are no handlers.
    pub fn exception_block(&self, handlers: &[ExceptionHandler], depth: usize) -> String {
        if handlers.is_empty() {
            return String::new();
        }
        let pad = INDENT.repeat(depth);
        let mut out = format!("{}EXCEPTION\n", pad);
        for handler in handlers {
            let mut conditions: Vec<String> = Vec::new();
            for name in &handler.exceptions {
                let mapped = map_exception_name(name);
                if !conditions.contains(&mapped) {
                    conditions.push(mapped);
                }
            }
            let _ = writeln!(out, "{}{}WHEN {} THEN", pad, INDENT, conditions.join(" OR "));
            out.push_str(&self.statements(&handler.statements, depth + 2));
        }
        out
    }
}

fn is_sql_function(name: &str) -> bool {
    SQL_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(name))
}

fn declared_variable<'p>(
    package: &'p OraclePackage,
    name: &str,
) -> Option<(&'p str, &'p str, &'p str)> {
    package
        .variables
        .iter()
        .find(|v| v.name.eq_ignore_ascii_case(name))
        .map(|v| (package.schema.as_str(), package.name.as_str(), v.name.as_str()))
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Number(n) => n.clone(),
        Literal::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Literal::Boolean(true) => "TRUE".to_string(),
        Literal::Boolean(false) => "FALSE".to_string(),
        Literal::Null => "NULL".to_string(),
    }
}

/// Dotted path with `:NEW`/`:OLD` and bind prefixes removed.
fn render_path(path: &[String]) -> String {
    path.iter()
        .map(|part| {
            let upper = part.to_uppercase();
            match upper.as_str() {
                ":NEW" | "NEW" => "NEW".to_string(),
                ":OLD" | "OLD" => "OLD".to_string(),
                _ => pg_identifier(part.trim_start_matches(':')),
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn render_operator(op: &str) -> String {
    let op = op.trim();
    if op.chars().any(|c| c.is_ascii_alphabetic()) {
        op.to_uppercase()
    } else {
        op.to_string()
    }
}

/// `DECODE(e, s1, r1, ..., default)` as a simple CASE.
fn render_decode(args: &[String]) -> String {
    let mut sql = format!("CASE {}", args[0]);
    let mut pairs = args[1..].chunks_exact(2);
    for pair in pairs.by_ref() {
        let _ = write!(sql, " WHEN {} THEN {}", pair[0], pair[1]);
    }
    if let [default] = pairs.remainder() {
        let _ = write!(sql, " ELSE {}", default);
    }
    sql.push_str(" END");
    sql
}

/// Text of a string literal argument, also when it arrived as raw text.
fn literal_text(expression: &Expression) -> Option<String> {
    match expression {
        Expression::Literal(Literal::Text(s)) => Some(s.clone()),
        Expression::Raw(text) => {
            let t = text.trim();
            let inner = t
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| t.strip_prefix('"').and_then(|s| s.strip_suffix('"')))?;
            Some(inner.to_string())
        }
        _ => None,
    }
}
