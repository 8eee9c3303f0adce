//! Client-side filter, sort and paginate over an already-fetched collection.
//!
//! The visible page is a pure function of the query and the input slice:
//! filtering keeps input order, sorting is stable, and pages are 1-based.

use std::cmp::Ordering;

use serde::Serialize;

use crate::error::Error;

/// Items that can be searched by free text.
pub trait Searchable {
    /// Text fields matched case-insensitively against the search term.
    fn search_text(&self) -> Vec<&str>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

type Predicate<'a, T> = Box<dyn Fn(&T) -> bool + Send + Sync + 'a>;
type Comparator<'a, T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync + 'a>;

/// A view over a list: search term, filters, sort and page.
pub struct ListQuery<'a, T> {
    search: Option<String>,
    filters: Vec<Predicate<'a, T>>,
    sort: Option<(Comparator<'a, T>, SortDirection)>,
    page: usize,
    per_page: usize,
}

impl<T> std::fmt::Debug for ListQuery<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListQuery")
            .field("search", &self.search)
            .field("filters", &self.filters.len())
            .field("sorted", &self.sort.as_ref().map(|(_, d)| *d))
            .field("page", &self.page)
            .field("per_page", &self.per_page)
            .finish()
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    /// Items matching search and filters, across all pages.
    pub total: usize,
    pub total_pages: usize,
}

impl<'a, T> ListQuery<'a, T> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidPageSize`] if `per_page` is zero.
    pub fn new(per_page: usize) -> Result<Self, Error> {
        if per_page == 0 {
            return Err(Error::InvalidPageSize);
        }
        Ok(Self {
            search: None,
            filters: Vec::new(),
            sort: None,
            page: 1,
            per_page,
        })
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into().trim().to_lowercase();
        self.search = (!term.is_empty()).then_some(term);
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'a) -> Self {
        self.filters.push(Box::new(predicate));
        self
    }

    #[must_use]
    pub fn sort_by(
        mut self,
        compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'a,
        direction: SortDirection,
    ) -> Self {
        self.sort = Some((Box::new(compare), direction));
        self
    }

    /// Sort by a key extracted from each item.
    #[must_use]
    pub fn sort_by_key<K: Ord>(
        self,
        key: impl Fn(&T) -> K + Send + Sync + 'a,
        direction: SortDirection,
    ) -> Self {
        self.sort_by(move |a, b| key(a).cmp(&key(b)), direction)
    }

    /// Select a 1-based page; `0` is treated as the first page.
    #[must_use]
    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }
}

impl<T: Searchable + Clone> ListQuery<'_, T> {
    /// Apply the query to `items`.
    #[must_use]
    pub fn apply(&self, items: &[T]) -> Page<T> {
        let mut matched: Vec<&T> = items
            .iter()
            .filter(|item| self.matches_search(item))
            .filter(|item| self.filters.iter().all(|f| f(*item)))
            .collect();

        if let Some((compare, direction)) = &self.sort {
            matched.sort_by(|a, b| match direction {
                SortDirection::Ascending => compare(*a, *b),
                SortDirection::Descending => compare(*b, *a),
            });
        }

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip((self.page - 1).saturating_mul(self.per_page))
            .take(self.per_page)
            .cloned()
            .collect();

        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            total,
            total_pages: total.div_ceil(self.per_page),
        }
    }

    fn matches_search(&self, item: &T) -> bool {
        match &self.search {
            None => true,
            Some(term) => item
                .search_text()
                .iter()
                .any(|field| field.to_lowercase().contains(term)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Job {
        title: &'static str,
        company: &'static str,
        salary: u32,
        remote: bool,
    }

    impl Searchable for Job {
        fn search_text(&self) -> Vec<&str> {
            vec![self.title, self.company]
        }
    }

    fn jobs() -> Vec<Job> {
        vec![
            Job { title: "Rust Engineer", company: "Ferrous", salary: 120, remote: true },
            Job { title: "Frontend Developer", company: "Acme", salary: 90, remote: false },
            Job { title: "Backend Engineer", company: "Acme", salary: 110, remote: true },
            Job { title: "Data Analyst", company: "Rustic Foods", salary: 80, remote: true },
            Job { title: "Platform Engineer", company: "Globex", salary: 110, remote: false },
        ]
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert!(matches!(ListQuery::<Job>::new(0), Err(Error::InvalidPageSize)));
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let page = ListQuery::<Job>::new(10).unwrap().search("  RUST ").apply(&jobs());
        let titles: Vec<_> = page.items.iter().map(|j| j.title).collect();
        assert_eq!(titles, vec!["Rust Engineer", "Data Analyst"]);
    }

    #[test]
    fn filters_compose() {
        let page = ListQuery::<Job>::new(10)
            .unwrap()
            .filter(|j: &Job| j.remote)
            .filter(|j: &Job| j.salary >= 100)
            .apply(&jobs());
        assert_eq!(page.total, 2);
    }

    #[test]
    fn sort_is_stable_in_both_directions() {
        let asc = ListQuery::<Job>::new(10)
            .unwrap()
            .sort_by_key(|j: &Job| j.salary, SortDirection::Ascending)
            .apply(&jobs());
        let titles: Vec<_> = asc.items.iter().map(|j| j.title).collect();
        assert_eq!(
            titles,
            vec![
                "Data Analyst",
                "Frontend Developer",
                "Backend Engineer",
                "Platform Engineer",
                "Rust Engineer"
            ]
        );

        let desc = ListQuery::<Job>::new(10)
            .unwrap()
            .sort_by_key(|j: &Job| j.salary, SortDirection::Descending)
            .apply(&jobs());
        let titles: Vec<_> = desc.items.iter().map(|j| j.title).collect();
        assert_eq!(
            titles,
            vec![
                "Rust Engineer",
                "Backend Engineer",
                "Platform Engineer",
                "Frontend Developer",
                "Data Analyst"
            ]
        );
    }

    #[test]
    fn pagination_reports_totals() {
        let query = ListQuery::<Job>::new(2).unwrap().page(3);
        let page = query.apply(&jobs());
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);

        let past_end = ListQuery::<Job>::new(2).unwrap().page(9).apply(&jobs());
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 5);
    }

    #[test]
    fn same_query_same_page() {
        let query = ListQuery::<Job>::new(2)
            .unwrap()
            .search("engineer")
            .sort_by_key(|j: &Job| j.company, SortDirection::Ascending)
            .page(2);
        assert_eq!(query.apply(&jobs()), query.apply(&jobs()));
    }
}
