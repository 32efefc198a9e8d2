//! Function, procedure and collection constructor resolution.

use tracing::{debug, warn};

use crate::model::{
    CallChain, CallSegment, CollectionType, DataType, Expression, Function, OraclePackage,
};
use crate::typemap;

use super::{ObjectKind, ResolvedName, Scope, SymbolResolver, SynonymResolution};

/// Oracle scalar functions that are always calls, never collection subscripts.
const BUILTIN_FUNCTIONS: &[&str] = &[
    "SUBSTR", "LENGTH", "UPPER", "LOWER", "TRIM", "LTRIM", "RTRIM", "DECODE", "NVL", "NVL2",
    "COALESCE", "TO_CHAR", "TO_NUMBER", "TO_DATE", "SYSDATE", "GREATEST", "LEAST", "ABS",
    "ROUND", "TRUNC", "FLOOR", "CEIL", "MOD", "POWER", "SQRT",
];

/// Whether `name` is one of the built-in scalar functions.
pub fn is_builtin_function(name: &str) -> bool {
    BUILTIN_FUNCTIONS
        .iter()
        .any(|b| b.eq_ignore_ascii_case(name.trim()))
}

/// Pick the overload that accepts `argc` arguments, or the first candidate.
fn select_overload<'f>(
    candidates: impl Iterator<Item = &'f Function>,
    argc: usize,
) -> Option<&'f Function> {
    let mut first = None;
    for f in candidates {
        if f.accepts_args(argc) {
            return Some(f);
        }
        first.get_or_insert(f);
    }
    first
}

impl<'a> SymbolResolver<'a> {
    /// Return type of the last call in `chain`, called from `schema`.
    pub fn resolve_function_return_type(
        &self,
        chain: &CallChain,
        schema: &str,
    ) -> Option<&'a DataType> {
        self.resolve_function(chain, schema).map(|f| &f.return_type)
    }

    /// The function the last call in `chain` lands on.
    ///
    /// The first segment resolves as a package function, an object type
    /// function, then through object type and package synonyms; an
    /// unqualified first call searches standalone functions, packages and
    /// object types of `schema`. Every later segment is a member function of
    /// the object type returned by the previous one. Any break yields `None`.
    pub fn resolve_function(&self, chain: &CallChain, schema: &str) -> Option<&'a Function> {
        let (first, rest) = chain.segments.split_first()?;
        let mut current = self.resolve_first_call(first, schema)?;

        for segment in rest {
            let type_name = current.return_type.custom_name()?;
            let type_schema = match &current.return_type {
                DataType::Custom {
                    schema: Some(s), ..
                } => s.clone(),
                _ => self.resolve_schema_for_object_type(type_name, &current.schema)?,
            };
            let object_type = self.registry().find_object_type(&type_schema, type_name)?;
            current = select_overload(object_type.functions_named(&segment.name), segment.args.len())?;
            debug!("Chained call {} resolved on {}.{}", segment.name, type_schema, type_name);
        }

        Some(current)
    }

    fn resolve_first_call(&self, call: &CallSegment, schema: &str) -> Option<&'a Function> {
        let argc = call.args.len();
        let registry = self.registry();

        let (target_schema, owner) = match call.qualifier.as_slice() {
            [] => (schema, None),
            [owner] => (schema, Some(owner.as_str())),
            [s, owner] => (s.as_str(), Some(owner.as_str())),
            _ => return None,
        };

        let Some(owner) = owner else {
            let standalone = select_overload(registry.standalone_functions(target_schema, &call.name), argc);
            if standalone.is_some() {
                return standalone;
            }
            for pkg in registry.package_specs_in(target_schema) {
                if let Some(f) = select_overload(pkg.functions_named(&call.name), argc) {
                    return Some(f);
                }
            }
            for ty in registry.object_types_in(target_schema) {
                if let Some(f) = select_overload(ty.functions_named(&call.name), argc) {
                    return Some(f);
                }
            }
            return None;
        };

        if let Some(f) = self.package_function(target_schema, owner, &call.name, argc) {
            return Some(f);
        }
        if let Some(f) = self.object_type_function(target_schema, owner, &call.name, argc) {
            return Some(f);
        }

        for kind in [ObjectKind::ObjectType, ObjectKind::Package] {
            match self.resolve_schema_and_name(owner, target_schema, kind) {
                Ok(Some(ResolvedName { schema: s, name: n }))
                    if !(s.eq_ignore_ascii_case(target_schema) && n.eq_ignore_ascii_case(owner)) =>
                {
                    debug!("{} {}.{} is a synonym for {}.{}", kind.label(), target_schema, owner, s, n);
                    let found = match kind {
                        ObjectKind::Package => self.package_function(&s, &n, &call.name, argc),
                        _ => self.object_type_function(&s, &n, &call.name, argc),
                    };
                    if found.is_some() {
                        return found;
                    }
                }
                Ok(_) => {}
                Err(e) => debug!("Ignoring {} synonym {}.{}: {}", kind.label(), target_schema, owner, e),
            }
        }

        None
    }

    fn package_function(&self, schema: &str, package: &str, name: &str, argc: usize) -> Option<&'a Function> {
        let pkg = self.registry().find_package_spec(schema, package)?;
        select_overload(pkg.functions_named(name), argc)
    }

    fn object_type_function(&self, schema: &str, type_name: &str, name: &str, argc: usize) -> Option<&'a Function> {
        let ty = self.registry().find_object_type(schema, type_name)?;
        select_overload(ty.functions_named(name), argc)
    }

    /// Whether `identifier(...)` is a function call rather than a collection subscript.
    ///
    /// Parameters and local variables of the current routine shadow
    /// everything else. Then standalone, package and object type functions
    /// of `schema` and the built-in scalar functions count as calls.
    pub fn is_known_function(&self, identifier: &str, schema: &str, scope: Option<&Scope<'_>>) -> bool {
        let name = identifier.trim();
        if name.is_empty() {
            return false;
        }
        if scope.is_some_and(|s| s.shadows(name)) {
            return false;
        }

        let registry = self.registry();
        if registry.standalone_functions(schema, name).next().is_some() {
            return true;
        }
        if registry
            .package_specs_in(schema)
            .any(|p| p.functions_named(name).next().is_some())
        {
            return true;
        }
        if registry
            .object_types_in(schema)
            .any(|t| t.functions_named(name).next().is_some())
        {
            return true;
        }

        is_builtin_function(name)
    }

    /// The VARRAY or nested table type `identifier`, with the package declaring it.
    ///
    /// Searched in the current routine, its package, any function in the
    /// registry, then every package spec and body.
    pub fn find_collection_type(
        &self,
        identifier: &str,
        scope: Option<&Scope<'a>>,
    ) -> Option<(&'a CollectionType, Option<&'a OraclePackage>)> {
        if let Some(scope) = scope {
            if let Some(ct) = scope.body.collection_type(identifier) {
                return Some((ct, scope.package));
            }
            if let Some(pkg) = scope.package {
                if let Some(ct) = pkg.collection_type(identifier) {
                    return Some((ct, Some(pkg)));
                }
            }
        }

        let registry = self.registry();
        for f in registry.all_functions() {
            if let Some(ct) = f.body.collection_type(identifier) {
                return Some((ct, None));
            }
        }
        registry
            .package_specs
            .iter()
            .chain(registry.package_bodies.iter())
            .find_map(|p| p.collection_type(identifier).map(|ct| (ct, Some(p))))
    }

    /// Whether `identifier(...)` constructs a collection.
    pub fn is_collection_type_constructor(&self, identifier: &str, scope: Option<&Scope<'a>>) -> bool {
        self.find_collection_type(identifier, scope).is_some()
    }

    /// Render a collection constructor as a PostgreSQL array.
    ///
    /// `args` are already rendered. An empty constructor needs a cast so
    /// PostgreSQL knows the element type.
    pub fn transform_collection_constructor(
        &self,
        identifier: &str,
        args: &[String],
        scope: Option<&Scope<'a>>,
    ) -> String {
        if !args.is_empty() {
            return format!("ARRAY[{}]", args.join(", "));
        }
        let element = self
            .find_collection_type(identifier, scope)
            .map(|(ct, pkg)| typemap::data_type_to_postgres(&ct.element, scope.map(|s| s.body), pkg))
            .unwrap_or_else(|| "text".to_string());
        format!("ARRAY[]::{}[]", element)
    }

    /// Schema that owns `procedure`, optionally inside `package`, called from `schema`.
    ///
    /// Package specs are checked before bodies; package synonyms are
    /// followed up to the configured depth.
    pub fn resolve_procedure_schema(
        &self,
        procedure: &str,
        package: Option<&str>,
        schema: &str,
    ) -> Option<String> {
        let registry = self.registry();

        let Some(package) = package else {
            return registry
                .procedures
                .iter()
                .find(|p| p.schema.eq_ignore_ascii_case(schema) && p.name.eq_ignore_ascii_case(procedure))
                .map(|p| p.schema.clone());
        };

        let declares = |s: &str, n: &str| {
            registry
                .find_package_spec(s, n)
                .filter(|p| p.has_procedure(procedure))
                .or_else(|| registry.find_package_body(s, n).filter(|p| p.has_procedure(procedure)))
                .map(|p| p.schema.clone())
        };

        if let Some(found) = declares(schema, package) {
            return Some(found);
        }

        match self.follow_synonyms(ObjectKind::Package, schema, package, false) {
            Ok(SynonymResolution::Found(target)) => declares(&target.schema, &target.name),
            Ok(_) => None,
            Err(e) => {
                warn!("Procedure lookup {}.{}.{} stopped: {}", schema, package, procedure, e);
                None
            }
        }
    }

    /// Whether `routine` is a function (as opposed to a procedure).
    pub fn is_function(&self, routine: &str, package: Option<&str>, schema: &str) -> bool {
        let registry = self.registry();
        match package {
            Some(package) => {
                for pkg in [
                    registry.find_package_spec(schema, package),
                    registry.find_package_body(schema, package),
                ]
                .into_iter()
                .flatten()
                {
                    if pkg.functions_named(routine).next().is_some() {
                        return true;
                    }
                    if pkg.has_procedure(routine) {
                        return false;
                    }
                }
                false
            }
            None => registry.standalone_functions(schema, routine).next().is_some(),
        }
    }

    /// Schema owning the package or object type a qualified call goes through.
    ///
    /// Returns `None` for plain references and unqualified calls.
    pub fn resolve_schema_for_expression(&self, expression: &Expression, schema: &str) -> Option<String> {
        let Expression::Call(chain) = expression else {
            return None;
        };
        let first = chain.segments.first()?;
        let (target_schema, owner) = match first.qualifier.as_slice() {
            [owner] => (schema, owner.as_str()),
            [s, owner] => (s.as_str(), owner.as_str()),
            _ => return None,
        };

        for kind in [ObjectKind::Package, ObjectKind::ObjectType] {
            match self.resolve_schema_and_name(owner, target_schema, kind) {
                Ok(Some(resolved)) => return Some(resolved.schema),
                Ok(None) => {}
                Err(e) => {
                    debug!("{}", e);
                    return None;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CollectionKind, ObjectType, Parameter, Procedure, RoutineBody, SchemaRegistry,
        SynonymMetadata, Variable,
    };

    fn make_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();

        let mut pkg = OraclePackage::new("REMOTE", "PKG");
        pkg.functions
            .push(Function::new("", "F", DataType::native("NUMBER")));
        pkg.procedures.push(Procedure::new("", "P"));
        registry.add_package_spec(pkg);
        registry.add_synonym(SynonymMetadata::new("HR", "EMP_SYN", "REMOTE", "PKG", "PACKAGE"));

        let mut addr = ObjectType::new("HR", "T_ADDRESS");
        addr.functions
            .push(Function::new("", "CITY", DataType::native("VARCHAR2")));
        registry.add_object_type(addr);

        let mut person = ObjectType::new("HR", "T_PERSON");
        person
            .functions
            .push(Function::new("", "ADDRESS", DataType::custom("T_ADDRESS")));
        registry.add_object_type(person);

        let mut factory = OraclePackage::new("HR", "PEOPLE");
        factory
            .functions
            .push(Function::new("", "FIND", DataType::custom("T_PERSON")));
        let mut overload = Function::new("", "FIND", DataType::native("DATE"));
        overload
            .parameters
            .push(Parameter::new("ID", DataType::native("NUMBER")));
        factory.functions.push(overload);
        factory.collection_types.push(CollectionType {
            name: "T_IDS".to_string(),
            kind: CollectionKind::NestedTable,
            element: DataType::native("NUMBER"),
        });
        registry.add_package_spec(factory);

        registry.add_function(Function::new("HR", "CALC_BONUS", DataType::native("NUMBER")));
        registry.add_procedure(Procedure::new("HR", "LOG_EVENT"));
        registry
    }

    // =========================================================================
    // Return types and call chains
    // =========================================================================

    #[test]
    fn test_package_synonym_call_resolves_number() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);
        let chain = CallChain::parse("HR.EMP_SYN.F()").unwrap();
        assert_eq!(
            resolver.resolve_function_return_type(&chain, "HR"),
            Some(&DataType::native("NUMBER"))
        );
    }

    #[test]
    fn test_chained_calls_follow_object_types() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);
        let chain = CallChain::parse("people.find().address().city()").unwrap();
        assert_eq!(
            resolver
                .resolve_function_return_type(&chain, "HR")
                .map(|t| t.oracle_name()),
            Some("VARCHAR2".to_string())
        );

        let broken = CallChain::parse("people.find().nope()").unwrap();
        assert_eq!(resolver.resolve_function_return_type(&broken, "HR"), None);
    }

    #[test]
    fn test_overload_selected_by_argument_count() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);
        let one_arg = CallChain::parse("people.find(42)").unwrap();
        assert_eq!(
            resolver.resolve_function_return_type(&one_arg, "HR"),
            Some(&DataType::native("DATE"))
        );
        let three_args = CallChain::parse("people.find(1, 2, 3)").unwrap();
        assert_eq!(
            resolver.resolve_function_return_type(&three_args, "HR"),
            Some(&DataType::custom("T_PERSON"))
        );
    }

    #[test]
    fn test_unqualified_call_scans_schema() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);
        let chain = CallChain::parse("calc_bonus()").unwrap();
        assert!(resolver.resolve_function(&chain, "HR").is_some());
        let chain = CallChain::parse("city()").unwrap();
        assert_eq!(
            resolver.resolve_function(&chain, "HR").map(|f| f.full_name()),
            Some("HR.T_ADDRESS.CITY".to_string())
        );
        assert!(resolver.resolve_function(&chain, "SALES").is_none());
    }

    // =========================================================================
    // Function vs. variable disambiguation
    // =========================================================================

    #[test]
    fn test_is_known_function_priority() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);

        let mut current = Function::new("HR", "CURRENT", DataType::native("NUMBER"));
        current
            .parameters
            .push(Parameter::new("CALC_BONUS", DataType::native("NUMBER")));
        current
            .body
            .variables
            .push(Variable::new("NVL", DataType::native("NUMBER")));
        let scope = Scope::of_function(&current);

        assert!(!resolver.is_known_function("calc_bonus", "HR", Some(&scope)));
        assert!(!resolver.is_known_function("nvl", "HR", Some(&scope)));
        assert!(resolver.is_known_function("calc_bonus", "HR", None));
        assert!(resolver.is_known_function("find", "HR", None));
        assert!(resolver.is_known_function("city", "HR", None));
        assert!(resolver.is_known_function("to_char", "HR", None));
        assert!(!resolver.is_known_function("v_items", "HR", None));
        assert!(!resolver.is_known_function("  ", "HR", None));
    }

    // =========================================================================
    // Collections
    // =========================================================================

    #[test]
    fn test_collection_constructor_detection() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);

        let mut body = RoutineBody::default();
        body.collection_types.push(CollectionType {
            name: "T_NAMES".to_string(),
            kind: CollectionKind::Varray { limit: 5 },
            element: DataType::native("VARCHAR2(30)"),
        });
        let current = Function {
            body,
            ..Function::new("HR", "F", DataType::native("NUMBER"))
        };
        let scope = Scope::of_function(&current);

        assert!(resolver.is_collection_type_constructor("t_names", Some(&scope)));
        assert!(resolver.is_collection_type_constructor("T_IDS", None));
        assert!(!resolver.is_collection_type_constructor("T_PERSON", None));
    }

    #[test]
    fn test_transform_collection_constructor() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);
        assert_eq!(
            resolver.transform_collection_constructor("T_IDS", &["1".into(), "2".into()], None),
            "ARRAY[1, 2]"
        );
        assert_eq!(
            resolver.transform_collection_constructor("T_IDS", &[], None),
            "ARRAY[]::numeric[]"
        );
        assert_eq!(
            resolver.transform_collection_constructor("T_UNKNOWN", &[], None),
            "ARRAY[]::text[]"
        );
    }

    // =========================================================================
    // Procedures
    // =========================================================================

    #[test]
    fn test_resolve_procedure_schema() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);
        assert_eq!(
            resolver.resolve_procedure_schema("LOG_EVENT", None, "hr"),
            Some("HR".to_string())
        );
        assert_eq!(
            resolver.resolve_procedure_schema("P", Some("PKG"), "REMOTE"),
            Some("REMOTE".to_string())
        );
        assert_eq!(
            resolver.resolve_procedure_schema("P", Some("EMP_SYN"), "HR"),
            Some("REMOTE".to_string())
        );
        assert_eq!(resolver.resolve_procedure_schema("Q", Some("EMP_SYN"), "HR"), None);
    }

    #[test]
    fn test_is_function() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);
        assert!(resolver.is_function("F", Some("PKG"), "REMOTE"));
        assert!(!resolver.is_function("P", Some("PKG"), "REMOTE"));
        assert!(resolver.is_function("CALC_BONUS", None, "HR"));
        assert!(!resolver.is_function("LOG_EVENT", None, "HR"));
    }

    #[test]
    fn test_resolve_schema_for_expression() {
        let registry = make_registry();
        let resolver = SymbolResolver::new(&registry);
        let call = Expression::Call(CallChain::parse("emp_syn.f()").unwrap());
        assert_eq!(
            resolver.resolve_schema_for_expression(&call, "HR"),
            Some("REMOTE".to_string())
        );
        let plain = Expression::reference("e.salary");
        assert_eq!(resolver.resolve_schema_for_expression(&plain, "HR"), None);
    }
}
