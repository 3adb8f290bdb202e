#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    CreateTable,
    AlterTable,
    DropTable,
    TruncateTable,
    CreateIndex,
    DropIndex,
    CreateView,
}

/// Schema-changing statement; routed to every node of the tables it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStatementContext {
    pub kind: DdlKind,
    pub tables: Vec<String>,
    pub index: Option<String>,
}

impl DdlStatementContext {
    #[must_use]
    pub fn new(kind: DdlKind, tables: &[&str]) -> Self {
        Self {
            kind,
            tables: tables.iter().map(|t| (*t).to_string()).collect(),
            index: None,
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: &str) -> Self {
        self.index = Some(index.to_string());
        self
    }
}

/// Administrative statement such as `SHOW ...` or `SET ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DalStatementContext {
    pub command: String,
}
