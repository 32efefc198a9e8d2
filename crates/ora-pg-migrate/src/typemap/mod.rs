//! Type mapping between Oracle and PostgreSQL.

use crate::model::{CollectionType, DataType, OraclePackage, RoutineBody};

/// Map an Oracle type name to PostgreSQL.
///
/// Parameterized spellings (`VARCHAR2(100)`, `NUMBER(10,2)`, `TIMESTAMP(6)`)
/// are matched by prefix and lose their modifiers. Names that are not Oracle
/// built-ins are treated as user-defined types and returned lowercased.
pub fn oracle_to_postgres(oracle_type: &str) -> String {
    let lower = oracle_type.trim().to_lowercase();

    // Parameterized types
    for (prefix, pg) in [
        ("number", "numeric"),
        ("varchar2", "text"),
        ("nvarchar2", "text"),
        ("nchar", "text"),
        ("char", "text"),
        ("raw", "bytea"),
        ("timestamp", "timestamp"),
        ("interval", "interval"),
    ] {
        if lower.starts_with(prefix) && !is_exact_only(&lower) {
            return pg.to_string();
        }
    }

    match lower.as_str() {
        // Integer types
        "binary_integer" | "pls_integer" | "natural" | "naturaln" | "positive" | "positiven"
        | "simple_integer" | "integer" | "int" => "integer".to_string(),
        "signtype" | "smallint" => "smallint".to_string(),

        // Floating point
        "binary_float" | "float" | "real" => "real".to_string(),
        "binary_double" | "double" => "double precision".to_string(),

        // Decimal
        "dec" | "decimal" => "decimal".to_string(),
        "numeric" => "numeric".to_string(),

        // Character types
        "long" | "string" | "varchar" => "varchar".to_string(),
        "character" => "char".to_string(),

        "boolean" => "boolean".to_string(),

        // Date/time types
        "date" | "timestamp_unconstrained" => "timestamp".to_string(),
        "timestamp_tz_unconstrained" | "timestamp_ltz_unconstrained" => {
            "timestamp with time zone".to_string()
        }
        "yminterval_unconstrained" | "dsinterval_unconstrained" => "interval".to_string(),
        "year" | "month" | "day" | "hour" | "minute" | "second" | "timezone_hour"
        | "timezone_minute" => "integer".to_string(),

        "timezone_region" | "timezone_abbr" | "rowid" | "urowid" | "mlslabel" => {
            "text".to_string()
        }

        // Large objects
        "bfile" | "clob" | "nclob" => "text".to_string(),
        "blob" | "long raw" => "bytea".to_string(),

        "xmltype" => "xml".to_string(),
        "httpuritype" | "dburitype" | "xdburitype" => "text".to_string(),

        // Semi-structured
        "anydata" | "json" | "aq$_jms_text_message" | "sys.aq$_jms_text_message"
        | "aq$_sig_prop" | "sys.aq$_sig_prop" | "aq$_recipients" | "sys.aq$_recipients" => {
            "jsonb".to_string()
        }

        "sdo_geometry" => "geometry".to_string(),
        "sys_refcursor" => "refcursor".to_string(),

        // User-defined type
        _ => lower,
    }
}

/// Names that share a prefix with a parameterized type but map differently.
fn is_exact_only(lower: &str) -> bool {
    matches!(lower, "character" | "timestamp_unconstrained" | "timestamp_tz_unconstrained" | "timestamp_ltz_unconstrained")
}

/// Map a table column type, keeping length and precision where PostgreSQL has an equivalent.
pub fn column_to_postgres(
    oracle_type: &str,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<i32>,
) -> String {
    let lower = oracle_type.trim().to_lowercase();
    if lower.contains('(') {
        return oracle_to_postgres(&lower);
    }

    match lower.as_str() {
        "number" => match (precision, scale) {
            (Some(p), Some(s)) if p > 0 && s > 0 => format!("numeric({},{})", p, s),
            (Some(p), _) if p > 0 => format!("numeric({})", p),
            _ => "numeric".to_string(),
        },
        "varchar2" | "nvarchar2" => match length {
            Some(n) if n > 0 => format!("varchar({})", n),
            _ => "text".to_string(),
        },
        "char" | "nchar" => match length {
            Some(n) if n > 0 => format!("char({})", n),
            _ => "text".to_string(),
        },
        _ => oracle_to_postgres(&lower),
    }
}

/// Render a PL/SQL data type for use in PL/pgSQL declarations.
///
/// Local collection types become arrays of their element type; package
/// collection types reference the domain created for the package.
pub fn data_type_to_postgres(
    data_type: &DataType,
    body: Option<&RoutineBody>,
    package: Option<&OraclePackage>,
) -> String {
    match data_type {
        DataType::Native(name) => oracle_to_postgres(name),
        DataType::Custom {
            schema,
            package: owner,
            name,
        } => {
            if let Some(local) = body.and_then(|b| b.collection_type(name)) {
                return collection_to_array(local, body, package);
            }
            if let Some(pkg) = package {
                let declared_here = owner
                    .as_deref()
                    .map_or(true, |o| o.eq_ignore_ascii_case(&pkg.name));
                if declared_here
                    && (pkg.collection_type(name).is_some()
                        || pkg.types.iter().any(|t| t.name.eq_ignore_ascii_case(name)))
                {
                    return package_domain_name(&pkg.schema, &pkg.name, name);
                }
            }
            match (schema, owner) {
                (Some(s), Some(p)) => package_domain_name(s, p, name),
                (Some(s), None) => format!("{}.{}", s.to_lowercase(), name.to_lowercase()),
                (None, Some(p)) => match package {
                    Some(pkg) => package_domain_name(&pkg.schema, p, name),
                    None => format!("{}_{}", p.to_lowercase(), name.to_lowercase()),
                },
                (None, None) => name.to_lowercase(),
            }
        }
        DataType::ColumnType { .. } | DataType::RowType { .. } => oracle_type_anchor(data_type),
    }
}

/// `%TYPE` and `%ROWTYPE` anchors carry over as written, lowercased.
fn oracle_type_anchor(data_type: &DataType) -> String {
    match data_type {
        DataType::ColumnType {
            schema,
            table,
            column,
        } => match schema {
            Some(s) => format!("{}.{}.{}%type", s, table, column).to_lowercase(),
            None => format!("{}.{}%type", table, column).to_lowercase(),
        },
        DataType::RowType { schema, table } => match schema {
            Some(s) => format!("{}.{}%rowtype", s, table).to_lowercase(),
            None => format!("{}%rowtype", table).to_lowercase(),
        },
        other => other.oracle_name().to_lowercase(),
    }
}

/// `elem[]` for a collection type.
pub fn collection_to_array(
    collection: &CollectionType,
    body: Option<&RoutineBody>,
    package: Option<&OraclePackage>,
) -> String {
    format!("{}[]", data_type_to_postgres(&collection.element, body, package))
}

/// Name of the domain emulating a package-level type: `schema_package_type`.
pub fn package_domain_name(schema: &str, package: &str, type_name: &str) -> String {
    format!("{}_{}_{}", schema, package, type_name).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CollectionKind;

    #[test]
    fn test_parameterized_types() {
        assert_eq!(oracle_to_postgres("NUMBER"), "numeric");
        assert_eq!(oracle_to_postgres("NUMBER(10,2)"), "numeric");
        assert_eq!(oracle_to_postgres("VARCHAR2(100)"), "text");
        assert_eq!(oracle_to_postgres("nvarchar2(20 char)"), "text");
        assert_eq!(oracle_to_postgres("CHAR(1)"), "text");
        assert_eq!(oracle_to_postgres("RAW(16)"), "bytea");
        assert_eq!(oracle_to_postgres("TIMESTAMP(6) WITH TIME ZONE"), "timestamp");
        assert_eq!(oracle_to_postgres("INTERVAL DAY TO SECOND"), "interval");
    }

    #[test]
    fn test_exact_types() {
        assert_eq!(oracle_to_postgres("PLS_INTEGER"), "integer");
        assert_eq!(oracle_to_postgres("BINARY_DOUBLE"), "double precision");
        assert_eq!(oracle_to_postgres("DATE"), "timestamp");
        assert_eq!(oracle_to_postgres("CLOB"), "text");
        assert_eq!(oracle_to_postgres("BLOB"), "bytea");
        assert_eq!(oracle_to_postgres("XMLTYPE"), "xml");
        assert_eq!(oracle_to_postgres("SYS_REFCURSOR"), "refcursor");
        assert_eq!(oracle_to_postgres("JSON"), "jsonb");
        assert_eq!(oracle_to_postgres("CHARACTER"), "char");
        assert_eq!(oracle_to_postgres("TIMESTAMP_TZ_UNCONSTRAINED"), "timestamp with time zone");
    }

    #[test]
    fn test_user_defined_type_passes_through() {
        assert_eq!(oracle_to_postgres("T_ADDRESS"), "t_address");
    }

    #[test]
    fn test_column_types_keep_modifiers() {
        assert_eq!(column_to_postgres("NUMBER", None, Some(10), Some(2)), "numeric(10,2)");
        assert_eq!(column_to_postgres("NUMBER", None, Some(10), Some(0)), "numeric(10)");
        assert_eq!(column_to_postgres("NUMBER", None, None, None), "numeric");
        assert_eq!(column_to_postgres("VARCHAR2", Some(100), None, None), "varchar(100)");
        assert_eq!(column_to_postgres("CHAR", Some(1), None, None), "char(1)");
        assert_eq!(column_to_postgres("DATE", None, None, None), "timestamp");
    }

    #[test]
    fn test_data_type_local_collection() {
        let mut body = RoutineBody::default();
        body.collection_types.push(CollectionType {
            name: "T_NUMS".to_string(),
            kind: CollectionKind::NestedTable,
            element: DataType::native("NUMBER"),
        });
        assert_eq!(
            data_type_to_postgres(&DataType::custom("t_nums"), Some(&body), None),
            "numeric[]"
        );
    }

    #[test]
    fn test_data_type_package_collection_uses_domain() {
        let mut pkg = OraclePackage::new("HR", "PKG");
        pkg.collection_types.push(CollectionType {
            name: "T_IDS".to_string(),
            kind: CollectionKind::Varray { limit: 10 },
            element: DataType::native("NUMBER"),
        });
        assert_eq!(
            data_type_to_postgres(&DataType::custom("T_IDS"), None, Some(&pkg)),
            "hr_pkg_t_ids"
        );
        assert_eq!(
            data_type_to_postgres(&DataType::native("VARCHAR2(10)"), None, Some(&pkg)),
            "text"
        );
    }

    #[test]
    fn test_anchored_types() {
        let col = DataType::ColumnType {
            schema: None,
            table: "EMPLOYEES".to_string(),
            column: "SALARY".to_string(),
        };
        assert_eq!(data_type_to_postgres(&col, None, None), "employees.salary%type");
    }
}
