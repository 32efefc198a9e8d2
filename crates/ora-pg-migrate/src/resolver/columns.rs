//! Column and expression type lookup.

use tracing::{debug, warn};

use crate::model::{DataType, Expression, TableReference};

use super::SymbolResolver;

impl<'a> SymbolResolver<'a> {
    /// Oracle type of `expression` evaluated in a query running in `schema`.
    ///
    /// Column references (`col`, `t.col`, `s.t.col`) are looked up in the
    /// tables of the FROM clause; call chains resolve to the return type of
    /// the last call. Both report the uppercased base type name without
    /// precision. Anything that cannot be resolved gets the default type.
    pub fn resolve_column_type(
        &self,
        expression: &Expression,
        schema: &str,
        from: &[TableReference],
    ) -> String {
        let resolved = match expression {
            Expression::Reference(path) => self.column_type_of_path(path, schema, from),
            Expression::Call(chain) => self
                .resolve_function_return_type(chain, schema)
                .map(|t| t.oracle_name()),
            _ => None,
        };

        resolved.unwrap_or_else(|| {
            warn!(
                "Could not resolve type of {:?} in schema {}; using {}",
                expression,
                schema,
                self.default_type()
            );
            self.default_type().to_string()
        })
    }

    /// Like [`resolve_column_type`](Self::resolve_column_type), parsing the expression text first.
    pub fn resolve_column_type_text(
        &self,
        text: &str,
        schema: &str,
        from: &[TableReference],
    ) -> String {
        match Expression::parse_reference(text) {
            Ok(expression) => self.resolve_column_type(&expression, schema, from),
            Err(e) => {
                debug!("{}; using {}", e, self.default_type());
                self.default_type().to_string()
            }
        }
    }

    fn column_type_of_path(
        &self,
        path: &[String],
        schema: &str,
        from: &[TableReference],
    ) -> Option<String> {
        match path {
            [column] => self.unqualified_column_type(column, schema, from),
            [prefix, column] => self.prefixed_column_type(prefix, column, schema, from),
            [owner, table, column] => self.column_type_in(owner, table, column),
            _ => None,
        }
    }

    /// An unqualified column must exist in exactly one table of the FROM clause.
    fn unqualified_column_type(
        &self,
        column: &str,
        schema: &str,
        from: &[TableReference],
    ) -> Option<String> {
        let mut found = Vec::new();
        for table in from {
            let owner = table.schema.as_deref().unwrap_or(schema);
            if let Some(data_type) = self.column_type_in(owner, &table.name, column) {
                found.push(data_type);
            }
        }

        match found.len() {
            1 => found.pop(),
            0 => None,
            n => {
                debug!("Column {} matches {} tables; treating as ambiguous", column, n);
                None
            }
        }
    }

    /// `prefix.column`, where prefix is a FROM alias, a FROM table name or a table in `schema`.
    fn prefixed_column_type(
        &self,
        prefix: &str,
        column: &str,
        schema: &str,
        from: &[TableReference],
    ) -> Option<String> {
        match from.iter().find(|t| t.answers_to(prefix)) {
            Some(table) => {
                let owner = table.schema.as_deref().unwrap_or(schema);
                self.column_type_in(owner, &table.name, column)
            }
            None => self.column_type_in(schema, prefix, column),
        }
    }

    /// Type of `column` in the table or view `name` as seen from `schema`.
    fn column_type_in(&self, schema: &str, name: &str, column: &str) -> Option<String> {
        let target = match self.resolve_table_or_view(name, schema) {
            Ok(target) => target,
            Err(e) => {
                debug!("Skipping {}.{}: {}", schema, name, e);
                return None;
            }
        };
        self.registry()
            .columns_of(&target.schema, &target.name)?
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(|c| DataType::native(c.data_type.as_str()).oracle_name())
    }
}
