/// An ordered list of SQL statements executed as one unit.
///
/// Statements are kept separate rather than joined into one string:
/// `CREATE DATABASE` refuses to run inside the implicit transaction of a
/// multi-statement query, and `DO` blocks contain semicolons of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    name: String,
    statements: Vec<String>,
    // Replaces the statement text in errors and logs when set.
    labels: Vec<Option<String>>,
    transactional: bool,
}

impl Script {
    /// Statements run one after another; a failure leaves earlier ones applied.
    pub fn autocommit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statements: Vec::new(),
            labels: Vec::new(),
            transactional: false,
        }
    }

    /// Statements run inside a single transaction.
    pub fn transactional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statements: Vec::new(),
            labels: Vec::new(),
            transactional: true,
        }
    }

    pub fn statement(mut self, sql: impl Into<String>) -> Self {
        self.statements.push(sql.into());
        self.labels.push(None);
        self
    }

    /// A statement carrying a secret; only `label` is ever shown.
    pub fn secret_statement(mut self, sql: impl Into<String>, label: impl Into<String>) -> Self {
        self.statements.push(sql.into());
        self.labels.push(Some(label.into()));
        self
    }

    /// Adds a secret statement when `value` is present. `render` returns the
    /// SQL and its label.
    pub fn secret_statement_if<T>(
        self,
        value: Option<T>,
        render: impl FnOnce(T) -> (String, String),
    ) -> Self {
        match value {
            Some(value) => {
                let (sql, label) = render(value);
                self.secret_statement(sql, label)
            }
            None => self,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    /// Printable form of the statement at `index`: its label, or else the
    /// first line of its text.
    pub fn label(&self, index: usize) -> &str {
        if let Some(Some(label)) = self.labels.get(index) {
            return label;
        }
        self.statements
            .get(index)
            .and_then(|sql| sql.trim().lines().next())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_first_line_unless_overridden() {
        let script = Script::autocommit("roles")
            .statement("DO $$\nBEGIN\nEND\n$$")
            .secret_statement("ALTER ROLE \"owner\" PASSWORD 'hunter2'", "ALTER ROLE \"owner\" PASSWORD ***");

        assert_eq!(script.label(0), "DO $$");
        assert_eq!(script.label(1), "ALTER ROLE \"owner\" PASSWORD ***");
        assert_eq!(script.label(2), "");
    }
}
