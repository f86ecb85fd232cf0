/// Sort direction; NULLs sort last ascending and first descending, as in
/// PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn is_descending(self) -> bool {
        self == SortOrder::Desc
    }
}
