// src/utils/pagination.rs

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Normalized query descriptor for listing endpoints.
///
/// `sort_by` is always one of the whitelisted column names, never raw client
/// input. `limit` has no upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub skip: i64,
    pub sort_by: &'static str,
    pub sort_order: SortOrder,
}

/// Maps client-facing sort names onto real columns. Unrecognized names fall
/// back to the default column instead of reaching the SQL layer.
fn sort_column(name: &str) -> &'static str {
    match name {
        "createdAt" => "created_at",
        "updatedAt" => "updated_at",
        "title" => "title",
        "views" => "views",
        _ => "created_at",
    }
}

impl Pagination {
    pub fn new(
        page: Option<i64>,
        limit: Option<i64>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE);
        let limit = limit.filter(|l| *l >= 1).unwrap_or(DEFAULT_LIMIT);
        let skip = (page - 1) * limit;

        let sort_by = sort_column(sort_by.unwrap_or("createdAt"));
        let sort_order = match sort_order {
            Some(order) if order.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        };

        Self {
            page,
            limit,
            skip,
            sort_by,
            sort_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_everything_is_omitted() {
        let paging = Pagination::new(None, None, None, None);
        assert_eq!(paging.page, 1);
        assert_eq!(paging.limit, 10);
        assert_eq!(paging.skip, 0);
        assert_eq!(paging.sort_by, "created_at");
        assert_eq!(paging.sort_order, SortOrder::Asc);
    }

    #[test]
    fn skip_is_page_minus_one_times_limit() {
        for (page, limit) in [(1, 10), (2, 10), (3, 25), (7, 1)] {
            let paging = Pagination::new(Some(page), Some(limit), None, None);
            assert_eq!(paging.skip, (page - 1) * limit);
        }
    }

    #[test]
    fn non_positive_values_fall_back_to_defaults() {
        let paging = Pagination::new(Some(0), Some(-5), None, None);
        assert_eq!(paging.page, 1);
        assert_eq!(paging.limit, 10);
        assert_eq!(paging.skip, 0);
    }

    #[test]
    fn sort_field_is_whitelisted() {
        assert_eq!(
            Pagination::new(None, None, Some("views"), None).sort_by,
            "views"
        );
        assert_eq!(
            Pagination::new(None, None, Some("updatedAt"), None).sort_by,
            "updated_at"
        );
        // Arbitrary column names never pass through.
        assert_eq!(
            Pagination::new(None, None, Some("password"), None).sort_by,
            "created_at"
        );
    }

    #[test]
    fn sort_order_parses_case_insensitively() {
        assert_eq!(
            Pagination::new(None, None, None, Some("DESC")).sort_order,
            SortOrder::Desc
        );
        assert_eq!(
            Pagination::new(None, None, None, Some("desc")).sort_order,
            SortOrder::Desc
        );
        assert_eq!(
            Pagination::new(None, None, None, Some("sideways")).sort_order,
            SortOrder::Asc
        );
    }
}
