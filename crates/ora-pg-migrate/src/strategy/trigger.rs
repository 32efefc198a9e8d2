//! Trigger strategies.
//!
//! An Oracle trigger becomes two PostgreSQL statements: a function returning
//! `trigger` that holds the body, and a `CREATE TRIGGER` binding it to the
//! table. Parsed triggers have their body rendered from the AST; triggers
//! known only from the dictionary get their raw body rewritten as text.

use std::fmt::Write as _;

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::identifier::{pg_identifier, qualify};
use crate::model::{Trigger, TriggerMetadata};
use crate::plpgsql::{rewrite_sql_text, PlpgsqlRenderer};
use crate::resolver::Scope;

use super::{Strategy, StrategyRegistry, TransformContext};

pub trait TriggerStrategy: Strategy {
    fn supports(&self, trigger: &Trigger) -> bool;

    fn supports_metadata(&self, trigger: &TriggerMetadata) -> bool;

    /// Function and trigger DDL from a parsed trigger.
    fn transform(&self, trigger: &Trigger, ctx: &TransformContext<'_>) -> Result<TriggerDdl>;

    /// Function and trigger DDL from dictionary metadata only.
    fn transform_stub(&self, trigger: &TriggerMetadata, ctx: &TransformContext<'_>) -> Result<TriggerDdl>;

    fn conversion_notes(&self, trigger: &Trigger) -> String;
}

pub type TriggerRegistry = StrategyRegistry<dyn TriggerStrategy>;

impl StrategyRegistry<dyn TriggerStrategy> {
    pub fn with_builtins() -> Self {
        let mut registry = Self::new("trigger");
        registry.register(Box::new(BasicTriggerStrategy));
        registry
    }

    pub fn select(&self, trigger: &Trigger) -> Option<&dyn TriggerStrategy> {
        self.select_where(|s| s.supports(trigger))
    }

    pub fn transform(&self, trigger: &Trigger, ctx: &TransformContext<'_>) -> Result<TriggerDdl> {
        self.apply(
            &trigger.full_name(),
            |s| s.supports(trigger),
            |s| s.transform(trigger, ctx),
        )
    }

    pub fn transform_stub(&self, trigger: &TriggerMetadata, ctx: &TransformContext<'_>) -> Result<TriggerDdl> {
        self.apply(
            &trigger.full_name(),
            |s| s.supports_metadata(trigger),
            |s| s.transform_stub(trigger, ctx),
        )
    }

    pub fn conversion_notes(&self, trigger: &Trigger) -> Option<String> {
        self.select(trigger).map(|s| s.conversion_notes(trigger))
    }
}

/// The two statements a trigger converts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDdl {
    /// `CREATE OR REPLACE FUNCTION ... RETURNS trigger`.
    pub function: String,
    /// `CREATE TRIGGER ... EXECUTE FUNCTION ...`.
    pub definition: String,
}

impl TriggerDdl {
    pub fn to_sql(&self) -> String {
        format!("{}\n{}", self.function, self.definition)
    }
}

/// Timing, events and target shared by parsed and dictionary triggers.
struct TriggerShape<'t> {
    schema: &'t str,
    name: &'t str,
    table_owner: &'t str,
    table_name: &'t str,
    trigger_type: &'t str,
    triggering_event: &'t str,
}

impl<'t> TriggerShape<'t> {
    fn of(trigger: &'t Trigger) -> Self {
        Self {
            schema: &trigger.schema,
            name: &trigger.name,
            table_owner: &trigger.table_owner,
            table_name: &trigger.table_name,
            trigger_type: &trigger.trigger_type,
            triggering_event: &trigger.triggering_event,
        }
    }

    fn of_metadata(trigger: &'t TriggerMetadata) -> Self {
        Self {
            schema: &trigger.schema,
            name: &trigger.name,
            table_owner: &trigger.table_owner,
            table_name: &trigger.table_name,
            trigger_type: &trigger.trigger_type,
            triggering_event: &trigger.triggering_event,
        }
    }

    fn function_name(&self) -> String {
        qualify(self.schema, &format!("{}_func", self.name))
    }

    fn trigger_name(&self) -> String {
        pg_identifier(&format!("{}_pg", self.name))
    }

    fn table(&self) -> String {
        let owner = if self.table_owner.trim().is_empty() {
            self.schema
        } else {
            self.table_owner
        };
        qualify(owner, self.table_name)
    }

    fn timing(&self) -> &'static str {
        let upper = self.trigger_type.to_uppercase();
        if upper.contains("INSTEAD OF") {
            "INSTEAD OF"
        } else if upper.contains("AFTER") {
            "AFTER"
        } else {
            "BEFORE"
        }
    }

    fn row_level(&self) -> bool {
        !self.trigger_type.to_uppercase().contains("STATEMENT")
    }

    /// INSERT, UPDATE and DELETE in declaration order.
    fn events(&self) -> Vec<&'static str> {
        let upper = self.triggering_event.to_uppercase();
        let mut events = Vec::new();
        for part in upper.split(',').flat_map(|p| p.split(" OR ")) {
            let event = match part.split_whitespace().next() {
                Some("INSERT") => "INSERT",
                Some("UPDATE") => "UPDATE",
                Some("DELETE") => "DELETE",
                _ => continue,
            };
            if !events.contains(&event) {
                events.push(event);
            }
        }
        events
    }

    /// Columns named by an `UPDATE OF a, b` event.
    fn update_columns(&self) -> Vec<String> {
        let upper = self.triggering_event.to_uppercase();
        let mut columns = Vec::new();
        for part in upper.split(" OR ") {
            let Some(rest) = part.trim().strip_prefix("UPDATE") else {
                continue;
            };
            let Some(list) = rest.trim_start().strip_prefix("OF ") else {
                continue;
            };
            for column in list.split(',').map(str::trim) {
                if matches!(column, "INSERT" | "UPDATE" | "DELETE") {
                    break;
                }
                if !column.is_empty() {
                    columns.push(pg_identifier(column));
                }
            }
        }
        columns
    }

    /// Events as PostgreSQL lists them, keeping any `UPDATE OF` columns.
    fn event_clause(&self) -> String {
        let columns = self.update_columns();
        self.events()
            .into_iter()
            .map(|event| {
                if event == "UPDATE" && !columns.is_empty() {
                    format!("UPDATE OF {}", columns.join(", "))
                } else {
                    event.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    fn supported(&self) -> bool {
        !self.table_name.trim().is_empty() && !self.events().is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(MigrateError::unsupported(
                format!("{}.{}", self.schema, self.name),
                "trigger has no target table",
            ));
        }
        if self.events().is_empty() {
            return Err(MigrateError::unsupported(
                format!("{}.{}", self.schema, self.name),
                format!("no INSERT, UPDATE or DELETE event in '{}'", self.triggering_event),
            ));
        }
        Ok(())
    }

    fn return_statement(&self) -> &'static str {
        let events = self.events();
        if !self.row_level() {
            "RETURN NULL;"
        } else if events == ["DELETE"] {
            "RETURN OLD;"
        } else if self.timing() == "BEFORE" && !events.contains(&"DELETE") {
            "RETURN NEW;"
        } else {
            "RETURN COALESCE(NEW, OLD);"
        }
    }

    fn function_header(&self) -> String {
        format!(
            "CREATE OR REPLACE FUNCTION {}()\nRETURNS trigger\nLANGUAGE plpgsql AS $$\n",
            self.function_name()
        )
    }

    fn definition(&self, when: Option<&str>) -> String {
        let mut sql = format!(
            "CREATE TRIGGER {}\n  {} {}\n  ON {}\n  FOR EACH {}",
            self.trigger_name(),
            self.timing(),
            self.event_clause(),
            self.table(),
            if self.row_level() { "ROW" } else { "STATEMENT" }
        );
        if let Some(condition) = when.map(str::trim).filter(|w| !w.is_empty()) {
            let _ = write!(sql, "\n  WHEN ({})", rewrite_sql_text(condition, true));
        }
        let _ = write!(sql, "\n  EXECUTE FUNCTION {}();\n", self.function_name());
        sql
    }
}

/// Handles every trigger on a table with at least one DML event.
pub struct BasicTriggerStrategy;

impl Strategy for BasicTriggerStrategy {
    fn name(&self) -> &'static str {
        "Basic Trigger Strategy"
    }

    fn priority(&self) -> i32 {
        10
    }
}

impl TriggerStrategy for BasicTriggerStrategy {
    fn supports(&self, trigger: &Trigger) -> bool {
        TriggerShape::of(trigger).supported()
    }

    fn supports_metadata(&self, trigger: &TriggerMetadata) -> bool {
        TriggerShape::of_metadata(trigger).supported()
    }

    fn transform(&self, trigger: &Trigger, ctx: &TransformContext<'_>) -> Result<TriggerDdl> {
        let shape = TriggerShape::of(trigger);
        shape.check()?;
        debug!(
            "Rendering trigger {} ({} {})",
            trigger.full_name(),
            shape.timing(),
            shape.event_clause()
        );

        let renderer = PlpgsqlRenderer::new(ctx.resolver, &trigger.schema)
            .with_scope(Scope::of_trigger(trigger))
            .with_record_owner(&trigger.name)
            .for_trigger();

        let mut function = shape.function_header();
        let declarations = renderer.declarations(&trigger.body);
        if !declarations.is_empty() {
            function.push_str("DECLARE\n");
            function.push_str(&declarations);
        }
        function.push_str("BEGIN\n");
        if trigger.body.exception_handlers.is_empty() {
            function.push_str(&renderer.statements(&trigger.body.statements, 1));
        } else {
            // Handlers close the block; the RETURN must still run afterwards.
            function.push_str("  BEGIN\n");
            function.push_str(&renderer.statements(&trigger.body.statements, 2));
            function.push_str(&renderer.exception_block(&trigger.body.exception_handlers, 1));
            function.push_str("  END;\n");
        }
        let _ = writeln!(function, "  {}", shape.return_statement());
        function.push_str("END;\n$$;\n");

        Ok(TriggerDdl {
            function,
            definition: shape.definition(trigger.when_clause.as_deref()),
        })
    }

    fn transform_stub(&self, trigger: &TriggerMetadata, _ctx: &TransformContext<'_>) -> Result<TriggerDdl> {
        let shape = TriggerShape::of_metadata(trigger);
        shape.check()?;
        debug!("Rewriting trigger {} from dictionary text", trigger.full_name());

        let mut function = shape.function_header();
        function.push_str("BEGIN\n");
        let _ = writeln!(function, "  -- Original Oracle trigger: {}", trigger.name);
        let _ = writeln!(function, "  -- Target table: {}.{}", trigger.table_owner, trigger.table_name);
        let _ = writeln!(
            function,
            "  -- Trigger type: {} {}",
            trigger.trigger_type, trigger.triggering_event
        );

        let body = trigger.body.trim();
        if body.is_empty() {
            function.push_str("  NULL;\n");
        } else {
            let mut rewritten = rewrite_sql_text(body, true);
            if !rewritten.trim_end().ends_with(';') {
                rewritten.push(';');
            }
            for line in rewritten.lines() {
                if line.trim().is_empty() {
                    function.push('\n');
                } else {
                    let _ = writeln!(function, "  {}", line.trim_end());
                }
            }
        }
        let _ = writeln!(function, "  {}", shape.return_statement());
        function.push_str("END;\n$$;\n");

        Ok(TriggerDdl {
            function,
            definition: shape.definition(None),
        })
    }

    fn conversion_notes(&self, _trigger: &Trigger) -> String {
        "Converted using basic strategy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::model::{
        ConditionalBranch, ExceptionHandler, Expression, RoutineBody, SchemaRegistry, Statement,
    };

    fn make_trigger(trigger_type: &str, events: &str, statements: Vec<Statement>) -> Trigger {
        Trigger {
            schema: "HR".into(),
            name: "TRG_EMP_AUDIT".into(),
            table_owner: "HR".into(),
            table_name: "EMPLOYEES".into(),
            trigger_type: trigger_type.into(),
            triggering_event: events.into(),
            when_clause: None,
            body: RoutineBody::with_statements(statements),
        }
    }

    fn make_metadata(body: &str) -> TriggerMetadata {
        TriggerMetadata {
            schema: "HR".into(),
            name: "TRG_EMP_STAMP".into(),
            trigger_type: "BEFORE EACH ROW".into(),
            triggering_event: "INSERT OR UPDATE".into(),
            table_owner: "HR".into(),
            table_name: "EMPLOYEES".into(),
            status: "ENABLED".into(),
            body: body.into(),
        }
    }

    fn transform(trigger: &Trigger) -> TriggerDdl {
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        TriggerRegistry::with_builtins().transform(trigger, &ctx).unwrap()
    }

    #[test]
    fn test_parsed_trigger() {
        let mut trigger = make_trigger(
            "BEFORE EACH ROW",
            "INSERT OR UPDATE",
            vec![Statement::If {
                branches: vec![ConditionalBranch {
                    condition: Expression::reference("INSERTING"),
                    statements: vec![Statement::Sql(":NEW.created_at := SYSDATE".into())],
                }],
                otherwise: vec![Statement::Sql(":NEW.updated_at := SYSDATE;".into())],
            }],
        );
        trigger.when_clause = Some("NEW.salary > 0".into());

        let ddl = transform(&trigger);
        assert_eq!(
            ddl.function,
            "CREATE OR REPLACE FUNCTION hr.trg_emp_audit_func()\n\
             RETURNS trigger\n\
             LANGUAGE plpgsql AS $$\n\
             BEGIN\n\
             \x20 IF TG_OP = 'INSERT' THEN\n\
             \x20   NEW.created_at := CURRENT_TIMESTAMP;\n\
             \x20 ELSE\n\
             \x20   NEW.updated_at := CURRENT_TIMESTAMP;\n\
             \x20 END IF;\n\
             \x20 RETURN NEW;\n\
             END;\n\
             $$;\n"
        );
        assert_eq!(
            ddl.definition,
            "CREATE TRIGGER trg_emp_audit_pg\n\
             \x20 BEFORE INSERT OR UPDATE\n\
             \x20 ON hr.employees\n\
             \x20 FOR EACH ROW\n\
             \x20 WHEN (NEW.salary > 0)\n\
             \x20 EXECUTE FUNCTION hr.trg_emp_audit_func();\n"
        );
    }

    #[test]
    fn test_return_statements() {
        let delete = make_trigger("AFTER EACH ROW", "DELETE", vec![Statement::Null]);
        assert!(transform(&delete).function.contains("  RETURN OLD;\n"));

        let after = make_trigger("AFTER EACH ROW", "INSERT,UPDATE", vec![Statement::Null]);
        let ddl = transform(&after);
        assert!(ddl.function.contains("  RETURN COALESCE(NEW, OLD);\n"));
        assert!(ddl.definition.contains("  AFTER INSERT OR UPDATE\n"));

        let statement = make_trigger("AFTER STATEMENT", "UPDATE", vec![Statement::Null]);
        let ddl = transform(&statement);
        assert!(ddl.function.contains("  RETURN NULL;\n"));
        assert!(ddl.definition.contains("  FOR EACH STATEMENT\n"));
    }

    #[test]
    fn test_update_of_columns_are_kept() {
        let trigger = make_trigger(
            "BEFORE EACH ROW",
            "INSERT OR UPDATE OF SALARY, DEPARTMENT_ID",
            vec![Statement::Null],
        );
        let ddl = transform(&trigger);
        assert!(ddl
            .definition
            .contains("  BEFORE INSERT OR UPDATE OF salary, department_id\n"));
        assert!(ddl.function.contains("  RETURN NEW;\n"));

        let mut stub = make_metadata("BEGIN NULL; END;");
        stub.triggering_event = "UPDATE OF SALARY".into();
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let ddl = TriggerRegistry::with_builtins()
            .transform_stub(&stub, &ctx)
            .unwrap();
        assert!(ddl.definition.contains("  BEFORE UPDATE OF salary\n"));
    }

    #[test]
    fn test_exception_handlers_keep_return_reachable() {
        let mut trigger = make_trigger("BEFORE EACH ROW", "INSERT", vec![Statement::Null]);
        trigger.body.exception_handlers = vec![ExceptionHandler {
            exceptions: vec!["DUP_VAL_ON_INDEX".into()],
            statements: vec![Statement::Null],
        }];
        let function = transform(&trigger).function;
        assert!(function.contains(
            "BEGIN\n  BEGIN\n    NULL;\n  EXCEPTION\n    WHEN UNIQUE_VIOLATION THEN\n      NULL;\n  END;\n  RETURN NEW;\nEND;"
        ));
    }

    #[test]
    fn test_metadata_stub() {
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let ddl = TriggerRegistry::with_builtins()
            .transform_stub(
                &make_metadata("BEGIN\n  IF UPDATING('SALARY') THEN\n    :NEW.changed := SYSDATE;\n  END IF;\nEND;"),
                &ctx,
            )
            .unwrap();
        assert!(ddl.function.starts_with("CREATE OR REPLACE FUNCTION hr.trg_emp_stamp_func()\n"));
        assert!(ddl.function.contains("  -- Original Oracle trigger: TRG_EMP_STAMP\n"));
        assert!(ddl
            .function
            .contains("IF (TG_OP = 'UPDATE' AND OLD.salary IS DISTINCT FROM NEW.salary) THEN"));
        assert!(ddl.function.contains("NEW.changed := CURRENT_TIMESTAMP;"));
        assert!(ddl.function.ends_with("  RETURN NEW;\nEND;\n$$;\n"));
        assert!(ddl.definition.contains("EXECUTE FUNCTION hr.trg_emp_stamp_func();"));
        assert!(ddl.to_sql().contains("$$;\n\nCREATE TRIGGER"));
    }

    #[test]
    fn test_trigger_without_events_has_no_strategy() {
        let registry = SchemaRegistry::new();
        let options = ConversionConfig::default();
        let ctx = TransformContext::new(&registry, &options);
        let triggers = TriggerRegistry::with_builtins();

        let ddl_event = make_trigger("BEFORE EVENT", "LOGON", vec![]);
        assert!(triggers.select(&ddl_event).is_none());
        let err = triggers.transform(&ddl_event, &ctx).unwrap_err();
        assert!(matches!(err, MigrateError::MissingStrategy { kind: "trigger", .. }));
    }

    #[test]
    fn test_conversion_notes() {
        let trigger = make_trigger("BEFORE EACH ROW", "INSERT", vec![]);
        assert_eq!(
            TriggerRegistry::with_builtins().conversion_notes(&trigger).as_deref(),
            Some("Converted using basic strategy")
        );
    }
}
