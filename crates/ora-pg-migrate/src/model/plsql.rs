//! Parsed PL/SQL structures.
//!
//! The parser is an external collaborator; these types are the shape it hands
//! over. Names keep their Oracle spelling. Expressions are kept structured so
//! references and call chains can be resolved without re-splitting text.

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// A PL/SQL data type reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Built-in type as written, e.g. `VARCHAR2(100)` or `NUMBER`.
    Native(String),

    /// User-defined type: object type, collection type or package type.
    Custom {
        #[serde(default)]
        schema: Option<String>,
        #[serde(default)]
        package: Option<String>,
        name: String,
    },

    /// `table.column%TYPE`.
    ColumnType {
        #[serde(default)]
        schema: Option<String>,
        table: String,
        column: String,
    },

    /// `table%ROWTYPE`.
    RowType {
        #[serde(default)]
        schema: Option<String>,
        table: String,
    },
}

impl DataType {
    /// Built-in type.
    pub fn native(name: impl Into<String>) -> Self {
        DataType::Native(name.into())
    }

    /// Unqualified user-defined type.
    pub fn custom(name: impl Into<String>) -> Self {
        DataType::Custom {
            schema: None,
            package: None,
            name: name.into(),
        }
    }

    /// Oracle spelling of the type name, without length or precision.
    pub fn oracle_name(&self) -> String {
        match self {
            DataType::Native(name) => match name.find('(') {
                Some(pos) => name[..pos].trim().to_uppercase(),
                None => name.trim().to_uppercase(),
            },
            DataType::Custom { name, .. } => name.clone(),
            DataType::ColumnType { table, column, .. } => format!("{}.{}%TYPE", table, column),
            DataType::RowType { table, .. } => format!("{}%ROWTYPE", table),
        }
    }

    /// Name of the user-defined type, if any.
    pub fn custom_name(&self) -> Option<&str> {
        match self {
            DataType::Custom { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Parameter passing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

/// Routine parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub mode: ParameterMode,
    #[serde(default)]
    pub default: Option<Expression>,
}

impl Parameter {
    /// IN parameter without default.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            mode: ParameterMode::In,
            default: None,
        }
    }
}

/// Variable or constant declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub default: Option<Expression>,
    #[serde(default)]
    pub constant: bool,
}

impl Variable {
    /// Variable without default.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: None,
            constant: false,
        }
    }

    /// Builder-style default value.
    pub fn with_default(mut self, value: Expression) -> Self {
        self.default = Some(value);
        self
    }
}

/// Explicit cursor declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub query: SelectStatement,
}

/// VARRAY or nested TABLE OF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Varray { limit: u32 },
    NestedTable,
}

/// Collection type declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionType {
    pub name: String,
    pub kind: CollectionKind,
    pub element: DataType,
}

/// Field of a record or object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub data_type: DataType,
}

/// `TYPE r IS RECORD (...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<RecordField>,
}

/// Package-level type alias or subtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageType {
    pub name: String,
    pub data_type: DataType,
}

/// Declarations and statements shared by functions, procedures and triggers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutineBody {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub cursors: Vec<Cursor>,
    #[serde(default)]
    pub collection_types: Vec<CollectionType>,
    #[serde(default)]
    pub record_types: Vec<RecordType>,
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl RoutineBody {
    /// Body made of statements only.
    pub fn with_statements(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            ..Self::default()
        }
    }

    /// Local collection type by name.
    pub fn collection_type(&self, name: &str) -> Option<&CollectionType> {
        self.collection_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Whether `name` is declared as a local variable.
    pub fn declares_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name.eq_ignore_ascii_case(name))
    }
}

/// PL/SQL function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// Owning schema.
    pub schema: String,
    /// Package or object type the function belongs to, if any.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub return_type: DataType,
    #[serde(flatten)]
    pub body: RoutineBody,
}

impl Function {
    /// Function with no parameters and an empty body.
    pub fn new(schema: impl Into<String>, name: impl Into<String>, return_type: DataType) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            parent: None,
            parameters: Vec::new(),
            return_type,
            body: RoutineBody::default(),
        }
    }

    /// Whether `argc` arguments fit this function's parameter list.
    pub fn accepts_args(&self, argc: usize) -> bool {
        let required = self.parameters.iter().filter(|p| p.default.is_none()).count();
        argc >= required && argc <= self.parameters.len()
    }

    /// Identity used in logs and errors.
    pub fn full_name(&self) -> String {
        qualified_routine_name(&self.schema, self.parent.as_deref(), &self.name)
    }
}

/// PL/SQL procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    /// Owning schema.
    pub schema: String,
    /// Package or object type the procedure belongs to, if any.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(flatten)]
    pub body: RoutineBody,
}

impl Procedure {
    /// Procedure with no parameters and an empty body.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            parent: None,
            parameters: Vec::new(),
            body: RoutineBody::default(),
        }
    }

    /// Identity used in logs and errors.
    pub fn full_name(&self) -> String {
        qualified_routine_name(&self.schema, self.parent.as_deref(), &self.name)
    }
}

fn qualified_routine_name(schema: &str, parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{}.{}.{}", schema, p, name),
        None => format!("{}.{}", schema, name),
    }
}

/// Oracle object type with its member routines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<RecordField>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

impl ObjectType {
    /// Empty object type.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            attributes: Vec::new(),
            functions: Vec::new(),
            procedures: Vec::new(),
        }
    }

    /// Member functions named `name`, in declaration order.
    pub fn functions_named<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a Function> + 'b
    where
        'a: 'b,
    {
        self.functions
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(name))
    }
}

/// Package specification or body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OraclePackage {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub types: Vec<PackageType>,
    #[serde(default)]
    pub collection_types: Vec<CollectionType>,
    #[serde(default)]
    pub record_types: Vec<RecordType>,
    #[serde(default)]
    pub cursors: Vec<Cursor>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

impl OraclePackage {
    /// Empty package.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            variables: Vec::new(),
            types: Vec::new(),
            collection_types: Vec::new(),
            record_types: Vec::new(),
            cursors: Vec::new(),
            functions: Vec::new(),
            procedures: Vec::new(),
        }
    }

    /// Get the fully qualified package name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Functions named `name`, in declaration order.
    pub fn functions_named<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a Function> + 'b
    where
        'a: 'b,
    {
        self.functions
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(name))
    }

    /// Whether the package declares a procedure named `name`.
    pub fn has_procedure(&self, name: &str) -> bool {
        self.procedures.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Collection type by name.
    pub fn collection_type(&self, name: &str) -> Option<&CollectionType> {
        self.collection_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Point member routines at this package.
    pub fn adopt_members(&mut self) {
        for f in &mut self.functions {
            f.schema = self.schema.clone();
            f.parent = Some(self.name.clone());
        }
        for p in &mut self.procedures {
            p.schema = self.schema.clone();
            p.parent = Some(self.name.clone());
        }
    }
}

/// Parsed trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub schema: String,
    pub name: String,
    pub table_owner: String,
    pub table_name: String,
    /// Timing, e.g. "BEFORE EACH ROW".
    pub trigger_type: String,
    /// Events, e.g. "INSERT OR UPDATE" or "INSERT,UPDATE".
    pub triggering_event: String,
    #[serde(default)]
    pub when_clause: Option<String>,
    #[serde(flatten)]
    pub body: RoutineBody,
}

impl Trigger {
    /// Get the fully qualified trigger name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Table reference in a FROM clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReference {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl TableReference {
    /// Unqualified table reference without alias.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            alias: None,
        }
    }

    /// Builder-style alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Whether `prefix` names this reference by alias or table name.
    pub fn answers_to(&self, prefix: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(prefix))
            || self.name.eq_ignore_ascii_case(prefix)
    }

    /// Parse `table`, `schema.table` with an optional `:alias` suffix.
    pub fn parse(text: &str) -> Result<Self> {
        let (path, alias) = match text.split_once(':') {
            Some((p, a)) => (p, Some(a.trim().to_string())),
            None => (text, None),
        };
        let parts: Vec<&str> = path.split('.').map(str::trim).collect();
        let (schema, name) = match parts.as_slice() {
            [name] => (None, *name),
            [schema, name] => (Some(schema.to_string()), *name),
            _ => {
                return Err(MigrateError::InvalidExpression(format!(
                    "invalid table reference '{}'",
                    text
                )))
            }
        };
        if !is_identifier(name) || schema.as_deref().is_some_and(|s| !is_identifier(s)) {
            return Err(MigrateError::InvalidExpression(format!(
                "invalid table reference '{}'",
                text
            )));
        }
        Ok(Self {
            schema,
            name: name.to_string(),
            alias,
        })
    }
}

/// Output column of a SELECT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectColumn {
    pub expression: Expression,
    #[serde(default)]
    pub alias: Option<String>,
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expression: Expression,
    #[serde(default)]
    pub descending: bool,
}

/// Parsed SELECT statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectStatement {
    #[serde(default)]
    pub columns: Vec<SelectColumn>,
    #[serde(default)]
    pub from: Vec<TableReference>,
    #[serde(default)]
    pub where_clause: Option<Expression>,
    #[serde(default)]
    pub group_by: Vec<Expression>,
    #[serde(default)]
    pub order_by: Vec<OrderItem>,
}

/// Literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Number(String),
    Text(String),
    Boolean(bool),
    Null,
}

/// One call in a chain such as `schema.pkg.f(x).g()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSegment {
    /// Leading qualifiers: `[schema, package]`, `[package]` or empty.
    #[serde(default)]
    pub qualifier: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expression>,
}

/// Call chain: the first segment may be qualified, later ones are member calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallChain {
    pub segments: Vec<CallSegment>,
}

impl CallChain {
    /// Single unqualified call.
    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            segments: vec![CallSegment {
                qualifier: Vec::new(),
                name: name.into(),
                args,
            }],
        }
    }

    /// Parse text such as `HR.PKG.F(a, 'x.y').G()`.
    ///
    /// Arguments are kept as raw text. Dots inside parentheses, string
    /// literals and quoted identifiers do not split segments.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut segments = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Ident(name) => {
                    path.push(name.clone());
                    i += 1;
                    match tokens.get(i) {
                        Some(Token::Dot) => i += 1,
                        Some(Token::Args(args)) => {
                            let name = path.pop().unwrap_or_default();
                            if !segments.is_empty() && !path.is_empty() {
                                return Err(invalid(text));
                            }
                            segments.push(CallSegment {
                                qualifier: std::mem::take(&mut path),
                                name,
                                args: args.iter().map(|a| Expression::Raw(a.clone())).collect(),
                            });
                            i += 1;
                            match tokens.get(i) {
                                Some(Token::Dot) => i += 1,
                                None => {}
                                _ => return Err(invalid(text)),
                            }
                        }
                        None => {
                            // trailing member without parentheses, e.g. `pkg.f`
                            let name = path.pop().unwrap_or_default();
                            if !segments.is_empty() && !path.is_empty() {
                                return Err(invalid(text));
                            }
                            segments.push(CallSegment {
                                qualifier: std::mem::take(&mut path),
                                name,
                                args: Vec::new(),
                            });
                        }
                        _ => return Err(invalid(text)),
                    }
                }
                _ => return Err(invalid(text)),
            }
        }

        if segments.is_empty() || !path.is_empty() {
            return Err(invalid(text));
        }
        if segments[0].qualifier.len() > 2 {
            return Err(invalid(text));
        }
        Ok(Self { segments })
    }
}

fn invalid(text: &str) -> MigrateError {
    MigrateError::InvalidExpression(format!("cannot parse call chain '{}'", text))
}

/// PL/SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Literal(Literal),
    /// Dotted identifier path: `col`, `t.col`, `s.t.col`, `:NEW.col`.
    Reference(Vec<String>),
    Call(CallChain),
    Binary {
        op: String,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: String,
        operand: Box<Expression>,
    },
    /// Text the parser did not structure further.
    Raw(String),
}

impl Expression {
    /// Reference built from dotted text. Does not validate.
    pub fn reference(path: &str) -> Self {
        Expression::Reference(path.split('.').map(|s| s.trim().to_string()).collect())
    }

    /// Numeric literal.
    pub fn number(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::Number(value.into()))
    }

    /// String literal.
    pub fn text(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::Text(value.into()))
    }

    /// Binary operation.
    pub fn binary(left: Expression, op: impl Into<String>, right: Expression) -> Self {
        Expression::Binary {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Parse a column reference or call chain.
    ///
    /// References must have 1 to 3 identifier segments.
    pub fn parse_reference(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.contains('(') {
            return CallChain::parse(trimmed).map(Expression::Call);
        }
        let tokens = tokenize(trimmed)?;
        let mut path = Vec::new();
        let mut expect_ident = true;
        for token in tokens {
            match (token, expect_ident) {
                (Token::Ident(name), true) => {
                    path.push(name);
                    expect_ident = false;
                }
                (Token::Dot, false) => expect_ident = true,
                _ => return Err(invalid_reference(text)),
            }
        }
        if expect_ident || path.is_empty() || path.len() > 3 {
            return Err(invalid_reference(text));
        }
        Ok(Expression::Reference(path))
    }
}

fn invalid_reference(text: &str) -> MigrateError {
    MigrateError::InvalidExpression(format!("'{}' is not a 1 to 3 part identifier", text))
}

/// `WHEN e1 OR e2 THEN ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub exceptions: Vec<String>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// IF / ELSIF branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub condition: Expression,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// PL/SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Assignment {
        target: String,
        value: Expression,
    },
    If {
        branches: Vec<ConditionalBranch>,
        #[serde(default)]
        otherwise: Vec<Statement>,
    },
    /// `FOR rec IN (SELECT ...) LOOP`; `rec` is declared implicitly.
    CursorFor {
        variable: String,
        query: SelectStatement,
        #[serde(default)]
        statements: Vec<Statement>,
    },
    /// `FOR i IN lower..upper LOOP`; `i` is declared implicitly.
    NumericFor {
        variable: String,
        lower: Expression,
        upper: Expression,
        #[serde(default)]
        reverse: bool,
        #[serde(default)]
        statements: Vec<Statement>,
    },
    While {
        condition: Expression,
        #[serde(default)]
        statements: Vec<Statement>,
    },
    Loop {
        #[serde(default)]
        statements: Vec<Statement>,
    },
    Exit {
        #[serde(default)]
        when: Option<Expression>,
    },
    Return(#[serde(default)] Option<Expression>),
    /// Procedure call used as a statement.
    Call(CallChain),
    SelectInto {
        query: SelectStatement,
        into: Vec<String>,
    },
    Raise {
        exception: String,
    },
    Null,
    /// DML or other SQL passed through as written.
    Sql(String),
}

/// Lexical token used by the reference and call-chain parsers.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Dot,
    /// Top-level comma-separated arguments of a parenthesized group.
    Args(Vec<String>),
}

/// Whether `s` is an unquoted Oracle identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#')
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '.' {
            tokens.push(Token::Dot);
            i += 1;
        } else if c == '"' {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|&ch| ch == '"')
                .map(|p| start + p)
                .ok_or_else(|| invalid_reference(text))?;
            tokens.push(Token::Ident(chars[start..end].iter().collect()));
            i = end + 1;
        } else if c == ':' || c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            i += 1;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '$' | '#'))
            {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            if !is_identifier(ident.trim_start_matches(':')) {
                return Err(invalid_reference(text));
            }
            tokens.push(Token::Ident(ident));
        } else if c == '(' {
            let (args, next) = read_args(&chars, i).ok_or_else(|| invalid_reference(text))?;
            tokens.push(Token::Args(args));
            i = next;
        } else {
            return Err(invalid_reference(text));
        }
    }

    Ok(tokens)
}

/// Read a balanced `( ... )` group starting at `open`, splitting on top-level commas.
fn read_args(chars: &[char], open: usize) -> Option<(Vec<String>, usize)> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_quoted = false;
    let mut args = Vec::new();
    let mut current = String::new();
    let mut i = open;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            current.push(c);
            if c == '\'' {
                if chars.get(i + 1) == Some(&'\'') {
                    current.push('\'');
                    i += 1;
                } else {
                    in_string = false;
                }
            }
        } else if in_quoted {
            current.push(c);
            if c == '"' {
                in_quoted = false;
            }
        } else {
            match c {
                '\'' => {
                    in_string = true;
                    current.push(c);
                }
                '"' => {
                    in_quoted = true;
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    if depth > 1 {
                        current.push(c);
                    }
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let last = current.trim().to_string();
                        if !last.is_empty() || !args.is_empty() {
                            args.push(last);
                        }
                        return Some((args, i + 1));
                    }
                    current.push(c);
                }
                ',' if depth == 1 => {
                    args.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            }
        }
        i += 1;
    }

    None
}
