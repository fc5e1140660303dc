use crate::{
    db::{
        model::TableModel,
        query::{CompareOp, Comparison, Expression, FieldRef},
        sql::CompileError,
    },
    value::{Value, quote_text},
};

///
/// BindMode
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BindMode {
    /// Literal values rendered into the text.
    #[default]
    Inline,

    /// `?` markers; values collected in order.
    Placeholder,
}

///
/// Compiler
///
/// Walks an expression tree and renders a WHERE-clause fragment against a
/// context table. Bare field names are qualified with the context table
/// (after alias resolution); qualified references are kept verbatim.
///
/// Rendering is a pure function of the tree, the table model and the bind
/// mode, so compiling equal trees yields identical text.
///

pub struct Compiler<'a> {
    table: &'a TableModel,
    mode: BindMode,
    params: Vec<Value>,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub const fn new(table: &'a TableModel, mode: BindMode) -> Self {
        Self {
            table,
            mode,
            params: Vec::new(),
        }
    }

    /// Values bound so far, in marker order.
    #[must_use]
    pub fn into_params(self) -> Vec<Value> {
        self.params
    }

    pub fn compile(&mut self, expr: &Expression) -> Result<String, CompileError> {
        match expr {
            Expression::And(children) => self.composite(children, " AND "),
            Expression::Or(children) => self.composite(children, " OR "),
            Expression::Compare(cmp) => self.comparison(cmp),
        }
    }

    fn composite(&mut self, children: &[Expression], sep: &str) -> Result<String, CompileError> {
        if children.is_empty() {
            return Err(CompileError::EmptyComposite);
        }

        let parts = children
            .iter()
            .map(|child| self.compile(child))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(format!("({})", parts.join(sep)))
    }

    fn comparison(&mut self, cmp: &Comparison) -> Result<String, CompileError> {
        let columns = self.columns(&cmp.field)?;

        if columns.len() > 1 && cmp.op == CompareOp::In {
            return Err(CompileError::MultiColumnIn {
                field: cmp.field.to_string(),
            });
        }
        if matches!(cmp.value, Value::List(_)) && !cmp.op.is_list() {
            return Err(CompileError::InvalidListOperand { op: cmp.op });
        }

        let parts = columns
            .iter()
            .map(|column| self.condition(column, cmp.op, &cmp.value))
            .collect::<Vec<_>>();

        Ok(parts.join(" AND "))
    }

    // Render one `column op value` condition.
    fn condition(&mut self, column: &str, op: CompareOp, value: &Value) -> String {
        match op {
            CompareOp::Eq if value.is_null() => format!("{column} IS NULL"),
            CompareOp::Ne if value.is_null() => format!("{column} IS NOT NULL"),

            CompareOp::Eq => format!("{column} = {}", self.bind(value)),
            CompareOp::Ne => format!("{column} != {}", self.bind(value)),
            CompareOp::Gt => format!("{column} > {}", self.bind(value)),
            CompareOp::Gte => format!("{column} >= {}", self.bind(value)),
            CompareOp::Lt => format!("{column} < {}", self.bind(value)),
            CompareOp::Lte => format!("{column} <= {}", self.bind(value)),

            CompareOp::In => self.membership(column, value, false),
            CompareOp::NotIn => self.membership(column, value, true),

            CompareOp::Contains => self.like(column, &format!("%{}%", escape_like(value))),
            CompareOp::StartsWith => self.like(column, &format!("{}%", escape_like(value))),
            CompareOp::EndsWith => self.like(column, &format!("%{}", escape_like(value))),
        }
    }

    // IN / NOT IN. Null members become an explicit IS [NOT] NULL arm; an
    // empty list is constant false (IN) or constant true (NOT IN).
    fn membership(&mut self, column: &str, value: &Value, negated: bool) -> String {
        let items = match value {
            Value::List(items) => items.as_slice(),
            scalar => std::slice::from_ref(scalar),
        };
        let has_null = items.iter().any(Value::is_null);
        let members = items.iter().filter(|v| !v.is_null()).collect::<Vec<_>>();

        let (keyword, null_arm, joiner) = if negated {
            ("NOT IN", "IS NOT NULL", "AND")
        } else {
            ("IN", "IS NULL", "OR")
        };

        if members.is_empty() {
            return if has_null {
                format!("{column} {null_arm}")
            } else if negated {
                "1 = 1".to_string()
            } else {
                "1 = 0".to_string()
            };
        }

        let rendered = members
            .into_iter()
            .map(|member| self.bind(member))
            .collect::<Vec<_>>()
            .join(",");
        let list = format!("{column} {keyword} ({rendered})");

        if has_null {
            format!("({list} {joiner} {column} {null_arm})")
        } else {
            list
        }
    }

    fn like(&mut self, column: &str, pattern: &str) -> String {
        match self.mode {
            BindMode::Inline => format!("{column} LIKE {}", quote_text(pattern)),
            BindMode::Placeholder => {
                self.params.push(Value::Text(pattern.to_string()));
                format!("{column} LIKE ?")
            }
        }
    }

    fn bind(&mut self, value: &Value) -> String {
        match (self.mode, value) {
            (_, Value::Column(column)) => column.to_string(),
            (BindMode::Inline, _) => value.to_sql_literal(),
            (BindMode::Placeholder, _) => {
                self.params.push(value.clone());
                "?".to_string()
            }
        }
    }

    // Resolve a field reference into qualified column names.
    fn columns(&self, field: &FieldRef) -> Result<Vec<String>, CompileError> {
        let malformed = || CompileError::MalformedField {
            field: field.to_string(),
        };

        match field {
            FieldRef::Column(column) => {
                if column.table.is_empty() || column.column.is_empty() {
                    return Err(malformed());
                }
                Ok(vec![column.to_string()])
            }
            FieldRef::Name(name) => {
                if name.is_empty() || name.contains('.') {
                    return Err(malformed());
                }
                let table = self.table.name;
                let columns = self.table.alias(name).map_or_else(
                    || vec![format!("{table}.{name}")],
                    |columns| columns.iter().map(|c| format!("{table}.{c}")).collect(),
                );
                Ok(columns)
            }
        }
    }
}

/// Compile an expression with inline literals.
pub fn compile(expr: &Expression, table: &TableModel) -> Result<String, CompileError> {
    Compiler::new(table, BindMode::Inline).compile(expr)
}

// Escape LIKE metacharacters with a backslash.
fn escape_like(value: &Value) -> String {
    let raw = value.to_plain_text();
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
