// Catalogue
pub mod lots;
pub mod products;

// Stock ledger
pub mod movements;

/// Zero-based page index for sea-orm paginators from a 1-based page number.
pub(crate) fn page_index(page: u64) -> u64 {
    page.max(1) - 1
}
