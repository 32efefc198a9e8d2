//! Priority-ranked conversion strategies.
//!
//! Each construct kind (table, constraint, index, trigger, view, package,
//! function, procedure) has its own strategy trait and its own
//! [`StrategyRegistry`]. A registry keeps its strategies sorted by descending
//! priority and hands each input to the first strategy that supports it.
//!
//! Registries are built once, before conversion starts, and only read
//! afterwards. Kinds with a catch-all strategy (table, function, procedure,
//! package, index) always find one; constraint, trigger and view registries
//! report [`MigrateError::MissingStrategy`] when nothing matches.
//!
//! # Example
//!
//! ```rust,ignore
//! let tables = TableRegistry::with_builtins();
//! let ctx = TransformContext::new(&registry, &config.conversion);
//! let ddl = tables.transform(&table, &ctx)?;
//! ```

pub mod constraint;
pub mod index;
pub mod package;
pub mod routine;
pub mod table;
pub mod trigger;
pub mod view;

pub use constraint::{
    CheckConstraintStrategy, ConstraintRegistry, ConstraintStrategy, ForeignKeyConstraintStrategy,
    PrimaryKeyConstraintStrategy, UniqueConstraintStrategy,
};
pub use index::{
    BTreeIndexStrategy, CompositeIndexStrategy, IndexConversionResult, IndexRegistry,
    IndexStrategy, PostgresIndexDdl, UniqueIndexStrategy, UnsupportedIndexStrategy,
};
pub use package::{PackageRegistry, PackageStrategy, RoutineStrategies, StandardPackageStrategy};
pub use routine::{
    FunctionRegistry, FunctionStrategy, ProcedureRegistry, ProcedureStrategy,
    StandardFunctionStrategy, StandardProcedureStrategy,
};
pub use table::{StandardTableStrategy, TableRegistry, TableStrategy};
pub use trigger::{BasicTriggerStrategy, TriggerDdl, TriggerRegistry, TriggerStrategy};
pub use view::{BasicViewStrategy, ViewRegistry, ViewStrategy};

use std::cmp::Reverse;

use tracing::{debug, error};

use crate::config::ConversionConfig;
use crate::error::{MigrateError, Result};
use crate::model::SchemaRegistry;
use crate::resolver::SymbolResolver;

/// Behavior shared by every strategy.
pub trait Strategy: Send + Sync {
    /// Human-readable name used in logs, reports and errors.
    fn name(&self) -> &'static str;

    /// Higher priorities are tried first. Catch-all strategies use 0 or less.
    fn priority(&self) -> i32 {
        0
    }
}

/// Everything a strategy may read while converting one input.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub resolver: SymbolResolver<'a>,
    pub options: &'a ConversionConfig,
}

impl<'a> TransformContext<'a> {
    pub fn new(registry: &'a SchemaRegistry, options: &'a ConversionConfig) -> Self {
        Self {
            resolver: SymbolResolver::with_config(registry, options),
            options,
        }
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.resolver.registry()
    }
}

/// Ordered strategies for one construct kind.
pub struct StrategyRegistry<S: ?Sized> {
    kind: &'static str,
    strategies: Vec<Box<S>>,
}

impl<S: Strategy + ?Sized> StrategyRegistry<S> {
    /// Empty registry for the construct `kind` ("table", "index", ...).
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            strategies: Vec::new(),
        }
    }

    /// Construct kind served by this registry.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Add a strategy and keep the list sorted by descending priority.
    ///
    /// Strategies with equal priority keep their registration order.
    pub fn register(&mut self, strategy: Box<S>) {
        debug!(
            "Registering {} strategy '{}' (priority {})",
            self.kind,
            strategy.name(),
            strategy.priority()
        );
        self.strategies.push(strategy);
        self.strategies.sort_by_key(|s| Reverse(s.priority()));
    }

    /// Registered strategies, highest priority first.
    pub fn strategies(&self) -> impl Iterator<Item = &S> {
        self.strategies.iter().map(|s| s.as_ref())
    }

    /// Strategy names, highest priority first.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// First strategy accepted by `supports`.
    pub fn select_where(&self, supports: impl Fn(&S) -> bool) -> Option<&S> {
        self.strategies().find(|s| supports(*s))
    }

    /// Like [`select_where`](Self::select_where), failing with `MissingStrategy`.
    pub fn require(&self, identity: &str, supports: impl Fn(&S) -> bool) -> Result<&S> {
        self.select_where(supports)
            .ok_or_else(|| MigrateError::missing_strategy(self.kind, identity))
    }

    /// Select a strategy and run `f` with it.
    ///
    /// Failures inside `f` are logged and wrapped with the input identity and
    /// the strategy name.
    pub fn apply<T>(
        &self,
        identity: &str,
        supports: impl Fn(&S) -> bool,
        f: impl FnOnce(&S) -> Result<T>,
    ) -> Result<T> {
        let strategy = self.require(identity, supports)?;
        debug!(
            "Transforming {} {} using strategy '{}'",
            self.kind,
            identity,
            strategy.name()
        );
        f(strategy).map_err(|e| {
            error!(
                "Failed to transform {} {} using strategy '{}': {}",
                self.kind,
                identity,
                strategy.name(),
                e
            );
            MigrateError::strategy_failed(self.kind, identity, strategy.name(), e)
        })
    }
}
