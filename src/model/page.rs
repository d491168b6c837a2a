use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw paging parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PageRequestError {
    #[error("page size must be at least 1")]
    ZeroSize,
    #[error("unknown sort field '{0}'")]
    UnknownSortField(String),
    #[error("unknown sort direction '{0}'")]
    UnknownSortDirection(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Content,
    Sender,
}

impl SortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "content" => Some(SortField::Content),
            "sender" => Some(SortField::Sender),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Content => "content",
            SortField::Sender => "sender",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Asc,
        }
    }
}

impl SortSpec {
    /// Parses `field[,asc|desc]`.
    pub fn parse(raw: &str) -> Result<Self, PageRequestError> {
        let mut parts = raw.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default();
        let field = SortField::parse(name)
            .ok_or_else(|| PageRequestError::UnknownSortField(name.to_string()))?;
        let direction = match parts.next() {
            None | Some("") => SortDirection::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(dir) => return Err(PageRequestError::UnknownSortDirection(dir.to_string())),
        };
        Ok(Self { field, direction })
    }
}

/// Validated paging request. The surrogate id is always the last sort key,
/// which keeps pages stable over an unchanged dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: SortSpec,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: SortSpec::default(),
        }
    }
}

impl TryFrom<PageQuery> for PageRequest {
    type Error = PageRequestError;

    fn try_from(query: PageQuery) -> Result<Self, Self::Error> {
        let size = match query.size {
            Some(0) => return Err(PageRequestError::ZeroSize),
            Some(size) => size.min(MAX_PAGE_SIZE),
            None => DEFAULT_PAGE_SIZE,
        };
        let sort = match query.sort.as_deref().map(str::trim) {
            None | Some("") => SortSpec::default(),
            Some(raw) => SortSpec::parse(raw)?,
        };
        Ok(Self {
            page: query.page.unwrap_or(0),
            size,
            sort,
        })
    }
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        let size = u64::from(request.size.max(1));
        let total_pages = total_elements.div_ceil(size);
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let request = PageRequest::try_from(PageQuery::default()).unwrap();
        assert_eq!(request, PageRequest::default());
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn size_is_clamped_and_zero_rejected() {
        let request = PageRequest::try_from(PageQuery {
            page: Some(2),
            size: Some(1000),
            sort: None,
        })
        .unwrap();
        assert_eq!(request.size, MAX_PAGE_SIZE);
        assert_eq!(request.offset(), 200);

        let err = PageRequest::try_from(PageQuery {
            size: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, PageRequestError::ZeroSize);
    }

    #[test]
    fn sort_parsing() {
        let parsed = SortSpec::parse("content,DESC").unwrap();
        assert_eq!(parsed.field, SortField::Content);
        assert_eq!(parsed.direction, SortDirection::Desc);

        let parsed = SortSpec::parse("sender").unwrap();
        assert_eq!(parsed.direction, SortDirection::Asc);

        assert_eq!(
            SortSpec::parse("password").unwrap_err(),
            PageRequestError::UnknownSortField("password".to_string())
        );
        assert_eq!(
            SortSpec::parse("content,sideways").unwrap_err(),
            PageRequestError::UnknownSortDirection("sideways".to_string())
        );
    }

    #[test]
    fn total_pages_rounds_up() {
        let request = PageRequest {
            size: 20,
            ..Default::default()
        };
        let page: Page<u8> = Page::new(vec![], &request, 41);
        assert_eq!(page.total_pages, 3);

        let page: Page<u8> = Page::new(vec![], &request, 0);
        assert_eq!(page.total_pages, 0);
    }
}
