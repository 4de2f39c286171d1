use crate::types::RowValues;

/// Collects bound parameters and hands out their `$n` placeholders.
///
/// A placeholder is produced only by pushing its value, so the n-th placeholder in the SQL
/// text always refers to the n-th parameter.
#[derive(Debug, Default)]
pub(crate) struct Binder {
    params: Vec<RowValues>,
}

impl Binder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&mut self, value: RowValues) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    pub(crate) fn into_params(self) -> Vec<RowValues> {
        self.params
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
}

impl Comparison {
    fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Neq => "!=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Like => "LIKE",
            Comparison::ILike => "ILIKE",
        }
    }
}

/// One WHERE clause term and the values it binds.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: Comparison,
        value: RowValues,
    },
    /// Membership test; an empty list never matches.
    In {
        column: String,
        values: Vec<RowValues>,
    },
    IsNull { column: String },
    IsNotNull { column: String },
    /// Null-safe equality (`IS NOT DISTINCT FROM`).
    IsValue { column: String, value: RowValues },
}

impl Predicate {
    pub(crate) fn column(&self) -> &str {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::In { column, .. }
            | Predicate::IsNull { column }
            | Predicate::IsNotNull { column }
            | Predicate::IsValue { column, .. } => column,
        }
    }

    /// Number of parameters this predicate binds.
    #[must_use]
    pub fn param_count(&self) -> usize {
        match self {
            Predicate::Compare { .. } => 1,
            Predicate::In { values, .. } => values.len(),
            Predicate::IsNull { .. } | Predicate::IsNotNull { .. } => 0,
            Predicate::IsValue { value, .. } => usize::from(!value.is_null()),
        }
    }

    pub(crate) fn render(&self, binder: &mut Binder) -> String {
        match self {
            Predicate::Compare { column, op, value } => {
                format!("{column} {} {}", op.as_sql(), binder.bind(value.clone()))
            }
            Predicate::In { values, .. } if values.is_empty() => "FALSE".to_string(),
            Predicate::In { column, values } => {
                let placeholders: Vec<String> =
                    values.iter().map(|v| binder.bind(v.clone())).collect();
                format!("{column} IN ({})", placeholders.join(", "))
            }
            Predicate::IsNull { column } => format!("{column} IS NULL"),
            Predicate::IsValue { column, value } if value.is_null() => {
                format!("{column} IS NULL")
            }
            Predicate::IsNotNull { column } => format!("{column} IS NOT NULL"),
            Predicate::IsValue { column, value } => {
                format!("{column} IS NOT DISTINCT FROM {}", binder.bind(value.clone()))
            }
        }
    }
}

/// Render `p1 AND p2 AND ...`, binding values in predicate order.
pub(crate) fn render_where(predicates: &[Predicate], binder: &mut Binder) -> String {
    predicates
        .iter()
        .map(|p| p.render(binder))
        .collect::<Vec<_>>()
        .join(" AND ")
}
