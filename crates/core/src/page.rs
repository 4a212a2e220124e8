//! Paging and sorting for catalog browse queries.

use serde::Serialize;

use crate::Error;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Product column a listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Description,
    Barcode,
    CreatedAt,
}

impl SortField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            SortField::Description => "description",
            SortField::Barcode => "barcode",
            SortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Ordering of a product listing. Ties are broken by product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl ProductSort {
    /// Parse `field` or `field,direction`, e.g. `description,desc`.
    ///
    /// Fields are `description`, `barcode` and `createdAt` (or `created_at`);
    /// directions are `asc` and `desc`, case-insensitive.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let (field, direction) = match raw.split_once(',') {
            Some((field, direction)) => (field.trim(), Some(direction.trim())),
            None => (raw.trim(), None),
        };

        let field = match field.to_ascii_lowercase().as_str() {
            "description" => SortField::Description,
            "barcode" => SortField::Barcode,
            "createdat" | "created_at" => SortField::CreatedAt,
            _ => return Err(Error::InvalidInput(format!("unknown sort field {field:?}"))),
        };

        let direction = match direction.map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => return Err(Error::InvalidInput(format!("unknown sort direction {other:?}"))),
        };

        Ok(Self { field, direction })
    }

    pub(crate) fn order_by(self) -> String {
        format!("{} {}, id ASC", self.field.column(), self.direction.keyword())
    }
}

/// A zero-based page window over a sorted listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
    pub sort: ProductSort,
}

impl PageRequest {
    /// Validate a page window; `size` must be between 1 and [`MAX_PAGE_SIZE`].
    pub fn new(page: usize, size: usize, sort: ProductSort) -> Result<Self, Error> {
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(Error::InvalidInput(format!("page size must be 1 to {MAX_PAGE_SIZE}, got {size}")));
        }
        Ok(Self { page, size, sort })
    }

    pub(crate) fn limit(&self) -> i64 {
        i64::try_from(self.size).unwrap_or(i64::MAX)
    }

    pub(crate) fn offset(&self) -> i64 {
        i64::try_from(self.page.saturating_mul(self.size)).unwrap_or(i64::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: DEFAULT_PAGE_SIZE, sort: ProductSort::default() }
    }
}

/// One page of a listing plus the size of the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total: u64) -> Self {
        let size = request.size as u64;
        Self { items, page: request.page, size: request.size, total, total_pages: total.div_ceil(size) }
    }

    /// A page with nothing in it and nothing behind it.
    pub fn empty(request: &PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }
}
