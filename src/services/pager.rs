/// Default page size for todo-style tables.
pub const TODOS_PER_PAGE: u32 = 7;
/// Default page size for the category table.
pub const CATEGORIES_PER_PAGE: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u32,
    pub limit: u32,
}

/// One-based page cursor. Next/previous availability is derived, not stored:
/// the server sends no total-page count, so a page is assumed to have a
/// successor exactly when it came back full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: u32,
    pub per_page: u32,
}

impl Pager {
    pub fn new(per_page: u32) -> Self {
        Self { page: 1, per_page }
    }

    pub fn at(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page,
        }
    }

    pub fn window(&self) -> PageWindow {
        PageWindow {
            skip: (self.page - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }

    pub fn has_next_page(&self, returned: usize) -> bool {
        returned == self.per_page as usize
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            ..*self
        }
    }

    pub fn previous(&self) -> Self {
        Self {
            page: (self.page - 1).max(1),
            ..*self
        }
    }
}
