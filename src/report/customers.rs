use crate::api::entities::Customer;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, PartialEq, Eq)]
pub struct CustomerPage<'a> {
    pub customers: Vec<&'a Customer>,
    /// 1-based
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
}

/// Case-insensitive name search, split into pages of [PAGE_SIZE]. Pages past the end show the last
/// page, page 0 shows the first.
pub fn search_customers<'a>(
    customers: &'a [Customer],
    query: &str,
    page: usize,
) -> CustomerPage<'a> {
    let query = query.trim().to_lowercase();
    let matches: Vec<&Customer> = customers
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&query))
        .collect();

    let total_matches = matches.len();
    let total_pages = total_matches.div_ceil(PAGE_SIZE).max(1);
    let page = page.clamp(1, total_pages);
    let customers = matches
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();

    CustomerPage {
        customers,
        page,
        total_pages,
        total_matches,
    }
}
