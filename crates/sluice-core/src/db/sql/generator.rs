use crate::{
    config::SluiceConfig,
    db::{
        model::{JoinColumn, JoinModel, TableModel},
        query::{Criteria, Expression, FieldRef, eq},
        sql::{
            CompileError, Statement,
            compile::{BindMode, Compiler},
        },
    },
    value::{Column, Value},
};

///
/// QueryGenerator
///
/// Assembles the five clauses of a select over one primary table:
///
/// SELECT [DISTINCT] <table>.*
/// FROM <table>[, <aux>...]
/// WHERE <compiled criteria>[ AND <implicit join predicates>]
/// ORDER BY <field> <dir>, ...
/// LIMIT [<offset>, ]<limit>
///
/// A declared join is used only when the criteria references one of its
/// tables in an ordering, a field reference or a column-valued operand.
/// Qualified references to any other table fail to compile.
///

pub struct QueryGenerator<'a> {
    table: &'a TableModel,
    criteria: Criteria,
    config: &'a SluiceConfig,
}

impl<'a> QueryGenerator<'a> {
    #[must_use]
    pub const fn new(table: &'a TableModel, criteria: Criteria, config: &'a SluiceConfig) -> Self {
        Self {
            table,
            criteria,
            config,
        }
    }

    #[must_use]
    pub const fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    // ------------------------------------------------------------------
    // Clauses
    // ------------------------------------------------------------------

    #[must_use]
    pub fn select_clause(&self) -> String {
        let distinct = if self.config.select_distinct {
            "DISTINCT "
        } else {
            ""
        };

        format!("SELECT {distinct}{}.*", self.table.name)
    }

    #[must_use]
    pub fn from_clause(&self) -> String {
        let mut sources = vec![self.source(self.table.name)];
        for join in self.used_joins() {
            for table in join.tables {
                let source = self.source(table);
                if !self.table.is_named(table) && !sources.contains(&source) {
                    sources.push(source);
                }
            }
        }

        format!("FROM {}", sources.join(", "))
    }

    /// Compiled WHERE clause with inline literals; empty when there is no
    /// predicate and no join.
    pub fn where_clause(&self) -> Result<String, CompileError> {
        Ok(self.render_where(BindMode::Inline)?.sql)
    }

    #[must_use]
    pub fn order_by_clause(&self) -> String {
        let orderings = self.criteria.orderings();
        if orderings.is_empty() {
            return String::new();
        }

        let parts = orderings
            .iter()
            .map(|o| format!("{} {}", o.field, o.direction))
            .collect::<Vec<_>>();

        format!("ORDER BY {}", parts.join(", "))
    }

    /// An offset with no limit still skips rows; the limit slot then carries
    /// `u64::MAX`, the storage idiom for "to the end".
    #[must_use]
    pub fn limit_clause(&self) -> String {
        let offset = self.criteria.first_result().unwrap_or(0);
        let limit = self.criteria.max_results().unwrap_or(u64::MAX);

        match (offset, limit) {
            (0, u64::MAX) => String::new(),
            (0, limit) => format!("LIMIT {limit}"),
            (offset, limit) => format!("LIMIT {offset}, {limit}"),
        }
    }

    // ------------------------------------------------------------------
    // Assembled queries
    // ------------------------------------------------------------------

    /// Full select text with inline literals.
    pub fn query(&self) -> Result<String, CompileError> {
        Ok(self.assemble(self.where_clause()?))
    }

    /// Row count over the full select, limit window included.
    pub fn count_query(&self) -> Result<String, CompileError> {
        Ok(format!(
            "SELECT COUNT(*) AS row_count FROM ({}) AS counted",
            self.query()?
        ))
    }

    /// Full select with `?` markers and the ordered parameter list.
    pub fn statement(&self) -> Result<Statement, CompileError> {
        let Statement { sql, params } = self.render_where(BindMode::Placeholder)?;

        Ok(Statement {
            sql: self.assemble(sql),
            params,
        })
    }

    /// True when the criteria references `table` anywhere.
    #[must_use]
    pub fn uses_table(&self, table: &str) -> bool {
        if self
            .criteria
            .orderings()
            .iter()
            .any(|o| FieldRef::parse(&o.field).references_table(table))
        {
            return true;
        }

        self.criteria
            .where_expr()
            .is_some_and(|expr| expression_uses_table(expr, table))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn assemble(&self, where_clause: String) -> String {
        [
            self.select_clause(),
            self.from_clause(),
            where_clause,
            self.order_by_clause(),
            self.limit_clause(),
        ]
        .into_iter()
        .filter(|clause| !clause.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    fn render_where(&self, mode: BindMode) -> Result<Statement, CompileError> {
        self.check_tables()?;
        if self.criteria.is_null() {
            return Ok(Statement::default());
        }

        let mut terms = self
            .criteria
            .where_expr()
            .cloned()
            .into_iter()
            .collect::<Vec<_>>();
        terms.extend(
            self.used_joins()
                .flat_map(|join| join.on)
                .map(|(left, right)| join_predicate(left, right)),
        );
        let expr = match terms.len() {
            0 => return Ok(Statement::default()),
            1 => terms.swap_remove(0),
            _ => Expression::And(terms),
        };

        let mut compiler = Compiler::new(self.table, mode);
        let sql = format!("WHERE {}", compiler.compile(&expr)?);

        Ok(Statement {
            sql,
            params: compiler.into_params(),
        })
    }

    fn used_joins(&self) -> impl Iterator<Item = &'static JoinModel> {
        self.table.joins.iter().filter(|join| {
            join.tables
                .iter()
                .any(|table| !self.table.is_named(table) && self.uses_table(table))
        })
    }

    // Every qualified table must be the primary table or come in with a join.
    fn check_tables(&self) -> Result<(), CompileError> {
        let mut tables = self
            .criteria
            .orderings()
            .iter()
            .filter_map(|o| FieldRef::parse(&o.field).table().map(str::to_string))
            .collect::<Vec<_>>();
        if let Some(expr) = self.criteria.where_expr() {
            expression_tables(expr, &mut tables);
        }

        match tables.into_iter().find(|table| !self.table.knows_table(table)) {
            Some(table) => Err(CompileError::UnknownTable { table }),
            None => Ok(()),
        }
    }

    // Physical table reference; prefixed tables keep the bare name as alias.
    fn source(&self, table: &str) -> String {
        let prefix = &self.config.table_prefix;
        if prefix.is_empty() {
            table.to_string()
        } else {
            format!("{prefix}{table} {table}")
        }
    }
}

fn join_predicate(left: &JoinColumn, right: &JoinColumn) -> Expression {
    eq(
        Column::new(left.table, left.column),
        Column::new(right.table, right.column),
    )
}

fn expression_tables(expr: &Expression, tables: &mut Vec<String>) {
    match expr {
        Expression::Compare(cmp) => {
            tables.extend(cmp.field.table().map(str::to_string));
            value_tables(&cmp.value, tables);
        }
        Expression::And(children) | Expression::Or(children) => {
            for child in children {
                expression_tables(child, tables);
            }
        }
    }
}

fn value_tables(value: &Value, tables: &mut Vec<String>) {
    match value {
        Value::Column(column) => tables.push(column.table.clone()),
        Value::List(items) => {
            for item in items {
                value_tables(item, tables);
            }
        }
        _ => {}
    }
}

fn expression_uses_table(expr: &Expression, table: &str) -> bool {
    match expr {
        Expression::Compare(cmp) => {
            cmp.field.references_table(table) || value_uses_table(&cmp.value, table)
        }
        Expression::And(children) | Expression::Or(children) => children
            .iter()
            .any(|child| expression_uses_table(child, table)),
    }
}

fn value_uses_table(value: &Value, table: &str) -> bool {
    match value {
        Value::Column(column) => column.table.eq_ignore_ascii_case(table),
        Value::List(items) => items.iter().any(|item| value_uses_table(item, table)),
        _ => false,
    }
}
