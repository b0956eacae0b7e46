//! Turns page-level intent into canonical cache keys and request URLs.
//!
//! A [`FetchSpecification`] is what a view asks for. A
//! [`CanonicalQueryKey`] is the normalized form of that request: two
//! specifications that mean the same thing always produce equal keys, and
//! the key renders to exactly one URL. Cache lookups and HTTP requests are
//! both derived from the key, so they can never disagree.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::API_ROOT;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Value of the `ordering` parameter: the bare field name ascending,
    /// prefixed with a minus sign descending.
    pub fn ordering(&self) -> String {
        match self.order {
            SortOrder::Asc => self.field.clone(),
            SortOrder::Desc => format!("-{}", self.field),
        }
    }
}

/// Zero-based page index and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Pagination {
    /// Page sizes below one are raised to one.
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page,
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page * self.per_page
    }
}

/// A single filter control. Filters without a value, or whose input is
/// currently invalid, are not sent to the server at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Option<String>,
    #[serde(default)]
    pub error: bool,
}

impl Filter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: Some(value.into()),
            error: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.error && self.value.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Everything a list view wants from a collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchSpecification {
    pub collection: String,
    pub project_id: Option<String>,
    pub pagination: Option<Pagination>,
    pub sort: Option<Sort>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub with_counts: bool,
}

impl FetchSpecification {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    pub fn project(mut self, project_id: impl ToString) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn page(mut self, page: u64, per_page: u64) -> Self {
        self.pagination = Some(Pagination::new(page, per_page));
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(Sort::new(field, order));
        self
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.filters.push(Filter::new(field, value));
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_counts(mut self) -> Self {
        self.with_counts = true;
        self
    }

    pub fn key(&self) -> CanonicalQueryKey {
        CanonicalQueryKey::from_spec(self)
    }
}

/// Normalized identifier of one remote resource, used as the cache index.
///
/// Parameters are stored in canonical order: `project_id`, `limit`,
/// `offset`, `ordering`, `with_counts`, then active filters sorted by
/// field and value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalQueryKey {
    collection: String,
    path: String,
    params: Vec<(String, String)>,
}

impl CanonicalQueryKey {
    pub fn from_spec(spec: &FetchSpecification) -> Self {
        let mut params = Vec::new();
        if let Some(project_id) = &spec.project_id {
            params.push(("project_id".to_string(), project_id.clone()));
        }
        if let Some(pagination) = &spec.pagination {
            params.push(("limit".to_string(), pagination.per_page.to_string()));
            params
                .push(("offset".to_string(), pagination.offset().to_string()));
        }
        if let Some(sort) = &spec.sort {
            params.push(("ordering".to_string(), sort.ordering()));
        }
        if spec.with_counts {
            params.push(("with_counts".to_string(), "true".to_string()));
        }

        let mut filters: Vec<(String, String)> = spec
            .filters
            .iter()
            .filter(|f| f.is_active())
            .filter_map(|f| Some((f.field.clone(), f.value.clone()?)))
            .collect();
        filters.sort();
        params.extend(filters);

        Self {
            collection: spec.collection.clone(),
            path: format!("{API_ROOT}/{}", spec.collection),
            params,
        }
    }

    /// Key of a single resource, scoped the same way as list keys.
    pub fn details(
        collection: &str,
        id: impl fmt::Display,
        project_id: Option<&str>,
    ) -> Self {
        let params = project_id
            .map(|p| vec![("project_id".to_string(), p.to_string())])
            .unwrap_or_default();
        Self {
            collection: collection.to_string(),
            path: format!("{API_ROOT}/{collection}/{id}/"),
            params,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Path and query string, relative to the API address.
    pub fn url(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        format!("{}?{query}", self.path)
    }
}

impl fmt::Display for CanonicalQueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

pub fn build_fetch_url(spec: &FetchSpecification) -> String {
    CanonicalQueryKey::from_spec(spec).url()
}

pub fn build_details_url(
    collection: &str,
    id: impl fmt::Display,
    project_id: Option<&str>,
) -> String {
    CanonicalQueryKey::details(collection, id, project_id).url()
}
