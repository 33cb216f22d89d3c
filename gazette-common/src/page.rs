//! Page windows over ordered record sets.
//!
//! Page numbers are resolved leniently: anything that is not a number yields
//! the first page, and numbers outside `1..=num_pages` yield the last page. An
//! empty record set still has a single, empty first page.

use serde::Serialize;

pub const POSTS_PER_PAGE: u64 = 10;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Paginator {
    count: u64,
    per_page: u64,
}

/// The slice of the record set that makes up one page.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub offset: u64,
    pub limit: u64,
}

/// A requested page number before it is resolved against a record count.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum PageNumber {
    First,
    Number(u64),
    Last,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub object_list: Vec<T>,
}

impl PageNumber {
    /// Parses a raw `page` query value. Integers below one, and integers too
    /// large to represent, ask for the last page.
    #[must_use]
    pub fn parse(page: Option<&str>) -> Self {
        let Some(page) = page.map(str::trim) else {
            return Self::First;
        };

        match page.parse::<i64>() {
            Ok(number) => u64::try_from(number)
                .ok()
                .filter(|number| *number > 0)
                .map_or(Self::Last, Self::Number),
            Err(_) if is_integer_literal(page) => Self::Last,
            Err(_) => Self::First,
        }
    }

    /// A key that is equal for requests that always resolve to the same page.
    #[must_use]
    pub fn cache_key(self) -> String {
        match self {
            Self::First | Self::Number(1) => "1".to_owned(),
            Self::Number(number) => number.to_string(),
            Self::Last => "last".to_owned(),
        }
    }
}

fn is_integer_literal(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

impl Paginator {
    /// # Panics
    ///
    /// If `per_page` is zero.
    #[must_use]
    pub fn new(count: u64, per_page: u64) -> Self {
        assert!(per_page > 0, "Pages must hold at least one item.");
        Self { count, per_page }
    }

    #[must_use]
    pub fn num_pages(self) -> u64 {
        self.count.div_ceil(self.per_page).max(1)
    }

    /// Resolves a raw `page` query value to a window.
    #[must_use]
    pub fn get_page(self, page: Option<&str>) -> PageWindow {
        self.resolve(PageNumber::parse(page))
    }

    #[must_use]
    pub fn resolve(self, page: PageNumber) -> PageWindow {
        let num_pages = self.num_pages();
        let number = match page {
            PageNumber::First => 1,
            PageNumber::Number(number) if number <= num_pages => number,
            PageNumber::Number(_) | PageNumber::Last => num_pages,
        };

        let offset = (number - 1) * self.per_page;
        PageWindow {
            number,
            num_pages,
            count: self.count,
            offset,
            limit: self.per_page.min(self.count.saturating_sub(offset)),
        }
    }
}

impl PageWindow {
    #[must_use]
    pub fn has_next(self) -> bool {
        self.number < self.num_pages
    }

    #[must_use]
    pub fn has_previous(self) -> bool {
        self.number > 1
    }

    /// Wraps the records fetched for this window.
    #[must_use]
    pub fn into_page<T>(self, object_list: Vec<T>) -> Page<T> {
        Page {
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next(),
            has_previous: self.has_previous(),
            object_list,
        }
    }

    /// Cuts this window out of a fully loaded record set.
    #[must_use]
    pub fn slice<T>(self, items: Vec<T>) -> Page<T> {
        let object_list = items
            .into_iter()
            .skip(usize::try_from(self.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(usize::MAX))
            .collect();
        self.into_page(object_list)
    }
}

impl<T> Page<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::page::{POSTS_PER_PAGE, PageNumber, PageWindow, Paginator};

    #[test]
    fn thirteen_items_make_two_pages() {
        let paginator = Paginator::new(13, POSTS_PER_PAGE);
        assert_eq!(paginator.num_pages(), 2);

        let first = paginator.get_page(None);
        assert_eq!((first.number, first.offset, first.limit), (1, 0, 10));
        assert!(first.has_next());
        assert!(!first.has_previous());

        let second = paginator.get_page(Some("2"));
        assert_eq!((second.number, second.offset, second.limit), (2, 10, 3));
        assert!(!second.has_next());
        assert!(second.has_previous());
    }

    #[test]
    fn lenient_page_numbers() {
        let paginator = Paginator::new(25, POSTS_PER_PAGE);

        assert_eq!(paginator.get_page(Some("abc")).number, 1);
        assert_eq!(paginator.get_page(Some("")).number, 1);
        assert_eq!(paginator.get_page(Some("99")).number, 3);
        assert_eq!(paginator.get_page(Some("0")).number, 3);
        assert_eq!(paginator.get_page(Some("-1")).number, 3);
        assert_eq!(paginator.get_page(Some(" 2 ")).number, 2);
    }

    #[test]
    fn oversized_page_numbers_yield_the_last_page() {
        let paginator = Paginator::new(25, POSTS_PER_PAGE);

        assert_eq!(paginator.get_page(Some("99999999999999999999")).number, 3);
        assert_eq!(paginator.get_page(Some("-99999999999999999999")).number, 3);
        assert_eq!(paginator.get_page(Some("99999999999999999999x")).number, 1);
    }

    #[test]
    fn cache_keys_collapse_equivalent_requests() {
        let key = |page| PageNumber::parse(page).cache_key();

        assert_eq!(key(None), "1");
        assert_eq!(key(Some("1")), "1");
        assert_eq!(key(Some("abc")), "1");
        assert_eq!(key(Some(" 2")), "2");
        assert_eq!(key(Some("0")), "last");
        assert_eq!(key(Some("99999999999999999999")), "last");
    }

    #[test]
    fn empty_set_has_one_empty_page() {
        let window = Paginator::new(0, POSTS_PER_PAGE).get_page(Some("5"));

        assert_eq!(
            window,
            PageWindow {
                number: 1,
                num_pages: 1,
                count: 0,
                offset: 0,
                limit: 0,
            }
        );
        assert!(window.into_page(Vec::<u8>::new()).is_empty());
    }

    #[test]
    fn slicing_loaded_items() {
        let items: Vec<u64> = (0..13).collect();
        let page = Paginator::new(13, POSTS_PER_PAGE)
            .get_page(Some("2"))
            .slice(items);

        assert_eq!(page.object_list, vec![10, 11, 12]);
        assert_eq!(page.len(), 3);
    }
}
