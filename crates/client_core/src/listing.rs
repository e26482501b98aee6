use std::cmp::Ordering;

use shared::domain::{Address, Agreement, Role};

/// Role-based scope over the collection, from the viewer's perspective:
/// `Created` keeps agreements where the viewer is the vendor, `Received`
/// where the viewer is the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleFilter {
    #[default]
    All,
    Created,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Vendor,
    Buyer,
    Amount,
    Description,
    Status,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    // Newest first, matching the dashboard's default view.
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub search: String,
    pub role: RoleFilter,
    pub sort: SortSpec,
    pub page: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            role: RoleFilter::All,
            sort: SortSpec::default(),
            page: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSlice {
    pub items: Vec<Agreement>,
    pub page: usize,
    pub total_pages: usize,
    pub total_filtered: usize,
}

/// Pure filter -> sort -> paginate pipeline. Same inputs always produce the
/// same slice; out-of-range page requests clamp to the nearest valid page.
pub fn page(
    collection: &[Agreement],
    viewer: &Address,
    query: &ListQuery,
    page_size: usize,
) -> PageSlice {
    let page_size = page_size.max(1);
    let needle = query.search.trim().to_lowercase();

    let mut filtered: Vec<Agreement> = collection
        .iter()
        .filter(|a| matches_role(a, viewer, query.role))
        .filter(|a| matches_search(a, &needle))
        .cloned()
        .collect();

    // Vec::sort_by is stable, so ties keep their incoming order.
    filtered.sort_by(|a, b| {
        let ordering = compare(a, b, query.sort.field);
        match query.sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    let total_filtered = filtered.len();
    let total_pages = total_filtered.div_ceil(page_size).max(1);
    let page = query.page.clamp(1, total_pages);

    let start = (page - 1) * page_size;
    let items = filtered
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();

    PageSlice {
        items,
        page,
        total_pages,
        total_filtered,
    }
}

fn matches_role(agreement: &Agreement, viewer: &Address, role: RoleFilter) -> bool {
    match role {
        RoleFilter::All => true,
        RoleFilter::Created => agreement.role_of(viewer) == Some(Role::Vendor),
        RoleFilter::Received => agreement.role_of(viewer) == Some(Role::Buyer),
    }
}

fn matches_search(agreement: &Agreement, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    agreement.description.to_lowercase().contains(needle)
        || agreement.id.0.to_string().contains(needle)
        || agreement.buyer.0.to_lowercase().contains(needle)
        || agreement.vendor.0.to_lowercase().contains(needle)
}

fn compare(a: &Agreement, b: &Agreement, field: SortField) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Vendor => a.vendor.cmp(&b.vendor),
        SortField::Buyer => a.buyer.cmp(&b.buyer),
        SortField::Amount => a.amount.cmp(&b.amount),
        SortField::Description => a.description.cmp(&b.description),
        SortField::Status => a.status.cmp(&b.status),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}
