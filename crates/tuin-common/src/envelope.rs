use serde::{Deserialize, Serialize};

/// The `{data, error, success}` shape returned by every service operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub success: bool,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            success: true,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
            success: false,
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Err("Response carried no data".to_string()),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, count: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            count.div_ceil(page_size as u64) as u32
        };
        Self {
            data,
            count,
            page,
            page_size,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortOptions {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_tracks_error() {
        let ok = ServiceResponse::ok(3);
        assert!(ok.success);
        assert_eq!(ok.into_result(), Ok(3));

        let err: ServiceResponse<i32> = ServiceResponse::err("boom");
        assert!(!err.success);
        assert_eq!(err.into_result(), Err("boom".to_string()));
    }

    #[test]
    fn test_envelope_wire_shape() {
        let json = serde_json::to_value(ServiceResponse::ok(true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"data": true, "error": null, "success": true})
        );
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page: Page<u8> = Page::new(vec![], 21, 1, 10);
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
    }
}
